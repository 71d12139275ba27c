//! DryRunService - 削除だけを握りつぶすデコレータ
//!
//! 一覧と job の確認は本物のサービスに委譲し、削除はログに出すだけにします。
//! 本番のクラスタに対して reaper の判断を安全に確認するためのものです。

use async_trait::async_trait;
use tracing::info;

use crate::domain::{ClusterObservation, ServiceError};
use crate::ports::{ClusterService, FleetScope};

pub struct DryRunService<S> {
    inner: S,
}

impl<S: ClusterService> DryRunService<S> {
    pub fn new(inner: S) -> Self {
        Self { inner }
    }

    pub fn inner(&self) -> &S {
        &self.inner
    }
}

#[async_trait]
impl<S: ClusterService> ClusterService for DryRunService<S> {
    async fn list_clusters(
        &self,
        scope: &FleetScope,
    ) -> Result<Vec<ClusterObservation>, ServiceError> {
        self.inner.list_clusters(scope).await
    }

    async fn has_active_jobs(
        &self,
        scope: &FleetScope,
        cluster_name: &str,
    ) -> Result<bool, ServiceError> {
        self.inner.has_active_jobs(scope, cluster_name).await
    }

    async fn delete_cluster(
        &self,
        scope: &FleetScope,
        cluster_name: &str,
    ) -> Result<(), ServiceError> {
        info!(
            cluster = cluster_name,
            project = %scope.project_id,
            region = %scope.region,
            "dry run: skipping delete request"
        );
        Ok(())
    }
}
