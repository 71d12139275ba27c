//! DataprocClusterService - REST API 経由の ClusterService 実装
//!
//! - list:   `GET    {endpoint}/projects/{project}/regions/{region}/clusters`
//! - jobs:   `GET    {endpoint}/projects/{project}/regions/{region}/jobs?jobStateMatcher=ACTIVE&clusterName={name}`
//! - delete: `DELETE {endpoint}/projects/{project}/regions/{region}/clusters/{name}`
//!
//! 認証情報の取得は reaper の責務外です。bearer token が渡されればそれを付けます。
//!
//! # エラー分類
//! - 通信失敗・タイムアウト・429・5xx → Transient
//! - その他の非 2xx → Permanent
//! - body が解釈できない → Infrastructure
//! - nextPageToken が繰り返す、または MAX_LIST_PAGES を超える → Infrastructure
//!
//! 個々のクラスタ要素が読めない場合はその要素だけを飛ばします（一覧全体は失敗させない）。

use std::collections::{HashMap, HashSet};
use std::time::Duration;

use async_trait::async_trait;
use reqwest::{Client, RequestBuilder, Response, StatusCode, Url};
use serde::Deserialize;
use serde::de::DeserializeOwned;
use thiserror::Error;
use tracing::{debug, warn};

use crate::domain::{
    ClusterId, ClusterObservation, ClusterState, ErrorKind, Operation, ServiceError,
    TIMEOUT_LABEL,
};
use crate::ports::{ClusterService, FleetScope};

/// Errors raised while constructing the client.
#[derive(Debug, Error)]
pub enum SetupError {
    #[error("invalid endpoint {endpoint:?}: {reason}")]
    InvalidEndpoint { endpoint: String, reason: String },

    #[error("failed to build HTTP client: {0}")]
    Client(#[from] reqwest::Error),
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct ListClustersResponse {
    #[serde(default)]
    clusters: Vec<serde_json::Value>,
    #[serde(default)]
    next_page_token: Option<String>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct ClusterResource {
    cluster_name: String,
    cluster_uuid: String,
    #[serde(default)]
    status: ClusterStatus,
    #[serde(default)]
    labels: HashMap<String, String>,
}

#[derive(Debug, Deserialize)]
struct ClusterStatus {
    #[serde(default = "unspecified_state")]
    state: ClusterState,
}

impl Default for ClusterStatus {
    fn default() -> Self {
        Self {
            state: unspecified_state(),
        }
    }
}

fn unspecified_state() -> ClusterState {
    ClusterState::Unrecognized("STATE_UNSPECIFIED".to_string())
}

/// Decode one element of a list page; unreadable elements are logged and skipped.
fn parse_cluster(entry: serde_json::Value) -> Option<ClusterObservation> {
    match serde_json::from_value::<ClusterResource>(entry) {
        Ok(resource) => Some(ClusterObservation::from(resource)),
        Err(err) => {
            warn!(error = %err, "skipping unreadable cluster entry");
            None
        }
    }
}

impl From<ClusterResource> for ClusterObservation {
    fn from(mut resource: ClusterResource) -> Self {
        Self {
            id: ClusterId::new(resource.cluster_uuid),
            name: resource.cluster_name,
            state: resource.status.state,
            timeout_label: resource.labels.remove(TIMEOUT_LABEL),
        }
    }
}

#[derive(Debug, Deserialize)]
struct ListJobsResponse {
    #[serde(default)]
    jobs: Vec<serde_json::Value>,
}

/// Upper bound on pages fetched for one snapshot.
pub const MAX_LIST_PAGES: usize = 1000;

/// REST client for the cluster-management service.
#[derive(Debug, Clone)]
pub struct DataprocClusterService {
    client: Client,
    base: Url,
    access_token: Option<String>,
}

impl DataprocClusterService {
    pub fn new(
        endpoint: &str,
        access_token: Option<String>,
        request_timeout: Duration,
    ) -> Result<Self, SetupError> {
        let invalid = |reason: String| SetupError::InvalidEndpoint {
            endpoint: endpoint.to_string(),
            reason,
        };
        let base = Url::parse(endpoint).map_err(|e| invalid(e.to_string()))?;
        if base.cannot_be_a_base() {
            return Err(invalid("URL cannot carry a path".to_string()));
        }

        let client = Client::builder().timeout(request_timeout).build()?;
        Ok(Self {
            client,
            base,
            access_token,
        })
    }

    fn url(&self, scope: &FleetScope, resource: &[&str]) -> Url {
        let mut url = self.base.clone();
        if let Ok(mut segments) = url.path_segments_mut() {
            segments
                .pop_if_empty()
                .extend([
                    "projects",
                    scope.project_id.as_str(),
                    "regions",
                    scope.region.as_str(),
                ])
                .extend(resource);
        }
        url
    }

    async fn send(
        &self,
        operation: Operation,
        request: RequestBuilder,
    ) -> Result<Response, ServiceError> {
        let request = match &self.access_token {
            Some(token) => request.bearer_auth(token),
            None => request,
        };

        let response = request.send().await.map_err(|e| {
            ServiceError::transient(operation, "request to management service failed")
                .with_source(e)
        })?;

        let status = response.status();
        if status.is_success() {
            return Ok(response);
        }

        let body = response.text().await.unwrap_or_default();
        Err(ServiceError::new(
            classify(status),
            operation,
            format!("HTTP {status}: {}", body.trim()),
        ))
    }

    async fn decode<T: DeserializeOwned>(
        operation: Operation,
        response: Response,
    ) -> Result<T, ServiceError> {
        response.json::<T>().await.map_err(|e| {
            ServiceError::new(
                ErrorKind::Infrastructure,
                operation,
                "undecodable response body",
            )
            .with_source(e)
        })
    }
}

fn classify(status: StatusCode) -> ErrorKind {
    if status == StatusCode::TOO_MANY_REQUESTS || status.is_server_error() {
        ErrorKind::Transient
    } else {
        ErrorKind::Permanent
    }
}

#[async_trait]
impl ClusterService for DataprocClusterService {
    async fn list_clusters(
        &self,
        scope: &FleetScope,
    ) -> Result<Vec<ClusterObservation>, ServiceError> {
        let operation = Operation::ListClusters;
        let url = self.url(scope, &["clusters"]);
        let mut clusters = Vec::new();
        let mut page_token: Option<String> = None;
        let mut seen_tokens = HashSet::new();
        let mut pages = 0usize;

        loop {
            pages += 1;
            if pages > MAX_LIST_PAGES {
                return Err(ServiceError::new(
                    ErrorKind::Infrastructure,
                    operation,
                    format!("listing exceeded {MAX_LIST_PAGES} pages"),
                ));
            }

            let mut request = self.client.get(url.clone());
            if let Some(token) = &page_token {
                request = request.query(&[("pageToken", token.as_str())]);
            }

            let response = self.send(operation, request).await?;
            let page: ListClustersResponse = Self::decode(operation, response).await?;
            clusters.extend(page.clusters.into_iter().filter_map(parse_cluster));

            match page.next_page_token.filter(|token| !token.is_empty()) {
                Some(token) => {
                    if !seen_tokens.insert(token.clone()) {
                        return Err(ServiceError::new(
                            ErrorKind::Infrastructure,
                            operation,
                            format!("page token {token:?} repeated"),
                        ));
                    }
                    page_token = Some(token);
                }
                None => break,
            }
        }

        debug!(count = clusters.len(), "fetched fleet snapshot");
        Ok(clusters)
    }

    async fn has_active_jobs(
        &self,
        scope: &FleetScope,
        cluster_name: &str,
    ) -> Result<bool, ServiceError> {
        let operation = Operation::ListActiveJobs;
        let request = self.client.get(self.url(scope, &["jobs"])).query(&[
            ("jobStateMatcher", "ACTIVE"),
            ("clusterName", cluster_name),
            ("pageSize", "1"),
        ]);

        let response = self.send(operation, request).await?;
        let jobs: ListJobsResponse = Self::decode(operation, response).await?;
        Ok(!jobs.jobs.is_empty())
    }

    async fn delete_cluster(
        &self,
        scope: &FleetScope,
        cluster_name: &str,
    ) -> Result<(), ServiceError> {
        let request = self
            .client
            .delete(self.url(scope, &["clusters", cluster_name]));
        self.send(Operation::DeleteCluster, request).await?;
        Ok(())
    }
}
