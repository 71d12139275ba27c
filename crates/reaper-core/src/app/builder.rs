//! ReaperBuilder - reaper の構築とワイヤリング
//!
//! # Fail-fast 設計
//! - project id がなければ build() で `BuildError::MissingProjectId`
//! - poll interval が 0 なら `BuildError::InvalidPollInterval`
//! - それ以外の検証はしない（ループに入ってからのエラーはすべて非致命的）

use std::sync::Arc;

use crate::config::ReaperConfig;
use crate::ports::{Clock, ClusterService, IdGenerator, SystemClock, UlidGenerator};

use super::damper::QuietFleetDamper;
use super::reaper_loop::ReaperLoop;
use super::reconciler::Reconciler;

/// ReaperBuilder は設定と ports から ReaperLoop を組み立てる
///
/// # 使用例
/// ```ignore
/// let reaper = ReaperBuilder::new(config).build(service)?;
/// reaper.run().await;
/// ```
pub struct ReaperBuilder {
    config: ReaperConfig,
    clock: Arc<dyn Clock>,
    id_gen: Option<Box<dyn IdGenerator>>,
}

/// BuildError は起動時の致命的なエラー
#[derive(Debug, thiserror::Error)]
pub enum BuildError {
    #[error("project id is not configured (set --project-id or GC_PROJECT_ID)")]
    MissingProjectId,

    #[error("poll interval must be greater than zero")]
    InvalidPollInterval,
}

impl ReaperBuilder {
    pub fn new(config: ReaperConfig) -> Self {
        Self {
            config,
            clock: Arc::new(SystemClock),
            id_gen: None,
        }
    }

    /// Clock を差し替え（テスト用）
    pub fn with_clock(mut self, clock: Arc<dyn Clock>) -> Self {
        self.clock = clock;
        self
    }

    pub fn with_id_generator(mut self, id_gen: Box<dyn IdGenerator>) -> Self {
        self.id_gen = Some(id_gen);
        self
    }

    pub fn config(&self) -> &ReaperConfig {
        &self.config
    }

    /// Validate the configuration and wire the reaper around `service`.
    pub fn build<S: ClusterService>(self, service: S) -> Result<ReaperLoop<S>, BuildError> {
        let scope = self.config.scope().ok_or(BuildError::MissingProjectId)?;
        if self.config.poll_interval.is_zero() {
            return Err(BuildError::InvalidPollInterval);
        }

        let id_gen = self
            .id_gen
            .unwrap_or_else(|| Box::new(UlidGenerator::new(self.clock.clone())));

        let reconciler = Reconciler::new(
            service,
            scope,
            self.config.poll_interval,
            self.clock,
            id_gen,
        )
        .with_default_budget(self.config.default_budget)
        .with_damper(QuietFleetDamper::new(self.config.quiet_log_every));

        Ok(ReaperLoop::new(reconciler))
    }
}
