//! InMemoryFleet - 開発・テスト用の ClusterService 実装
//!
//! クラスタ一覧と job の有無をメモリ上に持ち、削除リクエストを記録します。
//! 失敗の注入もできるので、reconciler のエラー経路をテストできます。

use std::collections::{HashSet, VecDeque};

use async_trait::async_trait;
use tokio::sync::Mutex;

use crate::domain::{
    ClusterId, ClusterObservation, ClusterState, ErrorKind, Operation, ServiceError,
};
use crate::ports::{ClusterService, FleetScope};

#[derive(Debug, Default)]
struct FleetState {
    clusters: Vec<ClusterObservation>,
    /// Cluster names with at least one active job.
    active: HashSet<String>,
    delete_calls: Vec<String>,
    list_calls: usize,
    probe_calls: Vec<String>,
    /// Failures returned by upcoming `list_clusters` calls, in order.
    list_failures: VecDeque<ErrorKind>,
    failing_probes: HashSet<String>,
    failing_deletes: bool,
}

/// In-memory fleet.
///
/// A successful delete moves the cluster to DELETING, the way the real service
/// reports a cluster that is being torn down.
#[derive(Debug, Default)]
pub struct InMemoryFleet {
    state: Mutex<FleetState>,
}

impl InMemoryFleet {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn from_observations(clusters: Vec<ClusterObservation>) -> Self {
        Self {
            state: Mutex::new(FleetState {
                clusters,
                ..FleetState::default()
            }),
        }
    }

    /// Insert a cluster or replace the one with the same identity.
    pub async fn upsert(&self, cluster: ClusterObservation) {
        let mut state = self.state.lock().await;
        match state.clusters.iter_mut().find(|c| c.id == cluster.id) {
            Some(existing) => *existing = cluster,
            None => state.clusters.push(cluster),
        }
    }

    pub async fn set_state(&self, id: &ClusterId, new_state: ClusterState) {
        let mut state = self.state.lock().await;
        if let Some(cluster) = state.clusters.iter_mut().find(|c| &c.id == id) {
            cluster.state = new_state;
        }
    }

    pub async fn remove(&self, id: &ClusterId) {
        let mut state = self.state.lock().await;
        state.clusters.retain(|c| &c.id != id);
    }

    pub async fn set_active(&self, cluster_name: &str, active: bool) {
        let mut state = self.state.lock().await;
        if active {
            state.active.insert(cluster_name.to_string());
        } else {
            state.active.remove(cluster_name);
        }
    }

    /// Make the next `list_clusters` call fail with `kind`.
    pub async fn fail_next_list(&self, kind: ErrorKind) {
        self.state.lock().await.list_failures.push_back(kind);
    }

    pub async fn fail_probes_for(&self, cluster_name: &str) {
        let mut state = self.state.lock().await;
        state.failing_probes.insert(cluster_name.to_string());
    }

    pub async fn fail_deletes(&self, failing: bool) {
        self.state.lock().await.failing_deletes = failing;
    }

    /// Names passed to `delete_cluster`, including failed attempts.
    pub async fn delete_calls(&self) -> Vec<String> {
        self.state.lock().await.delete_calls.clone()
    }

    pub async fn list_calls(&self) -> usize {
        self.state.lock().await.list_calls
    }

    pub async fn probe_calls(&self) -> Vec<String> {
        self.state.lock().await.probe_calls.clone()
    }
}

#[async_trait]
impl ClusterService for InMemoryFleet {
    async fn list_clusters(
        &self,
        _scope: &FleetScope,
    ) -> Result<Vec<ClusterObservation>, ServiceError> {
        let mut state = self.state.lock().await;
        state.list_calls += 1;
        if let Some(kind) = state.list_failures.pop_front() {
            return Err(ServiceError::new(
                kind,
                Operation::ListClusters,
                "injected failure",
            ));
        }
        Ok(state.clusters.clone())
    }

    async fn has_active_jobs(
        &self,
        _scope: &FleetScope,
        cluster_name: &str,
    ) -> Result<bool, ServiceError> {
        let mut state = self.state.lock().await;
        state.probe_calls.push(cluster_name.to_string());
        if state.failing_probes.contains(cluster_name) {
            return Err(ServiceError::transient(
                Operation::ListActiveJobs,
                "injected failure",
            ));
        }
        Ok(state.active.contains(cluster_name))
    }

    async fn delete_cluster(
        &self,
        _scope: &FleetScope,
        cluster_name: &str,
    ) -> Result<(), ServiceError> {
        let mut state = self.state.lock().await;
        state.delete_calls.push(cluster_name.to_string());
        if state.failing_deletes {
            return Err(ServiceError::transient(
                Operation::DeleteCluster,
                "injected failure",
            ));
        }
        for cluster in state.clusters.iter_mut().filter(|c| c.name == cluster_name) {
            cluster.state = ClusterState::Deleting;
        }
        Ok(())
    }
}
