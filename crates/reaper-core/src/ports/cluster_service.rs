//! ClusterService port - クラスタ管理サービスへのインターフェース
//!
//! reaper が外部サービスに求めるのは3つの操作だけです：
//! - クラスタ一覧（Fleet Snapshot Fetcher）
//! - active な job の有無（Job Activity Prober）
//! - 表示名によるクラスタ削除
//!
//! # 実装
//! - **DataprocClusterService**: REST API（本番用）
//! - **InMemoryFleet**: テスト・ローカル実行用
//! - **DryRunService**: 削除だけを握りつぶすデコレータ

use async_trait::async_trait;
use serde::{Deserialize, Serialize};

use crate::domain::{ClusterObservation, ServiceError};

/// Project and region the reaper watches.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FleetScope {
    pub project_id: String,
    pub region: String,
}

impl FleetScope {
    pub fn new(project_id: impl Into<String>, region: impl Into<String>) -> Self {
        Self {
            project_id: project_id.into(),
            region: region.into(),
        }
    }
}

/// ClusterService は管理サービスの操作を抽象化
///
/// # 設計原則
/// - どの呼び出しも `ServiceError` で失敗しうる（致命的ではない）
/// - reaper は呼び出しを直列に await する（同時実行しない）
#[async_trait]
pub trait ClusterService: Send + Sync {
    /// Current clusters in the scope, in any order.
    async fn list_clusters(&self, scope: &FleetScope)
    -> Result<Vec<ClusterObservation>, ServiceError>;

    /// Whether at least one job is active on the named cluster.
    async fn has_active_jobs(&self, scope: &FleetScope, cluster_name: &str)
    -> Result<bool, ServiceError>;

    /// Request deletion of the named cluster. Returns once the request is accepted.
    async fn delete_cluster(&self, scope: &FleetScope, cluster_name: &str)
    -> Result<(), ServiceError>;
}

#[async_trait]
impl<S: ClusterService + ?Sized> ClusterService for std::sync::Arc<S> {
    async fn list_clusters(
        &self,
        scope: &FleetScope,
    ) -> Result<Vec<ClusterObservation>, ServiceError> {
        (**self).list_clusters(scope).await
    }

    async fn has_active_jobs(
        &self,
        scope: &FleetScope,
        cluster_name: &str,
    ) -> Result<bool, ServiceError> {
        (**self).has_active_jobs(scope, cluster_name).await
    }

    async fn delete_cluster(
        &self,
        scope: &FleetScope,
        cluster_name: &str,
    ) -> Result<(), ServiceError> {
        (**self).delete_cluster(scope, cluster_name).await
    }
}
