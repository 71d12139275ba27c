//! Configuration for the cluster reaper.
//!
//! Read once at startup. Only the project id and the poll interval are
//! validated (see `ReaperBuilder::build`).

use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::app::damper::DEFAULT_QUIET_LOG_EVERY;
use crate::domain::IdleBudget;
use crate::ports::FleetScope;

pub const DEFAULT_REGION: &str = "global";
pub const DEFAULT_ENDPOINT: &str = "https://dataproc.googleapis.com/v1";
pub const DEFAULT_POLL_INTERVAL: Duration = Duration::from_secs(10);
pub const DEFAULT_REQUEST_TIMEOUT: Duration = Duration::from_secs(30);

/// Settings of one reaper process.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct ReaperConfig {
    /// Project whose clusters are watched. Required.
    pub project_id: Option<String>,

    /// Single region to watch.
    pub region: String,

    /// Sleep between the end of one cycle and the start of the next.
    #[serde(with = "duration_secs")]
    pub poll_interval: Duration,

    /// Budget for clusters without a `timeout` label.
    pub default_budget: IdleBudget,

    /// Log "no clusters" once per this many consecutive empty polls.
    pub quiet_log_every: u32,

    /// Log delete decisions instead of sending them.
    pub dry_run: bool,

    /// Base URL of the cluster-management REST API.
    pub endpoint: String,

    /// Bearer token for the REST API (obtained outside the reaper).
    #[serde(skip_serializing)]
    pub access_token: Option<String>,

    #[serde(with = "duration_secs")]
    pub request_timeout: Duration,
}

impl Default for ReaperConfig {
    fn default() -> Self {
        Self {
            project_id: None,
            region: DEFAULT_REGION.to_string(),
            poll_interval: DEFAULT_POLL_INTERVAL,
            default_budget: IdleBudget::Disabled,
            quiet_log_every: DEFAULT_QUIET_LOG_EVERY,
            dry_run: false,
            endpoint: DEFAULT_ENDPOINT.to_string(),
            access_token: None,
            request_timeout: DEFAULT_REQUEST_TIMEOUT,
        }
    }
}

impl ReaperConfig {
    pub fn for_project(project_id: impl Into<String>) -> Self {
        Self {
            project_id: Some(project_id.into()),
            ..Self::default()
        }
    }

    pub fn with_region(mut self, region: impl Into<String>) -> Self {
        self.region = region.into();
        self
    }

    pub fn with_poll_interval(mut self, poll_interval: Duration) -> Self {
        self.poll_interval = poll_interval;
        self
    }

    pub fn with_default_budget(mut self, budget: IdleBudget) -> Self {
        self.default_budget = budget;
        self
    }

    /// Project id with surrounding whitespace removed; `None` when blank.
    pub fn project_id(&self) -> Option<&str> {
        self.project_id
            .as_deref()
            .map(str::trim)
            .filter(|id| !id.is_empty())
    }

    pub fn scope(&self) -> Option<FleetScope> {
        self.project_id()
            .map(|project_id| FleetScope::new(project_id, self.region.clone()))
    }
}

mod duration_secs {
    use std::time::Duration;

    use serde::{Deserialize, Deserializer, Serializer};

    pub fn serialize<S: Serializer>(value: &Duration, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_u64(value.as_secs())
    }

    pub fn deserialize<'de, D: Deserializer<'de>>(deserializer: D) -> Result<Duration, D::Error> {
        u64::deserialize(deserializer).map(Duration::from_secs)
    }
}
