//! Reconciler - 1 サイクル分の照合
//!
//! # フロー
//! 1. ClusterService::list_clusters() でスナップショットを取得
//! 2. スナップショットにいないクラスタの record を破棄
//! 3. 空なら damper に従って "no clusters" を（間引いて）ログ出力
//! 4. 各クラスタを順に評価（RUNNING かつ追跡中なら job を確認）
//! 5. IdleTracker::update() の Action に従ってログ・削除
//!
//! 一覧・job 確認の失敗はサイクルを打ち切ります（それまでの tracker 更新は残る）。
//! 削除の失敗はサイクルを止めません。record は先に消えているので、
//! クラスタがまだ存在すれば次回以降のポーリングで新規として再評価されます。

use std::sync::Arc;
use std::time::Duration;

use tracing::{Instrument, debug, info, info_span, warn};

use crate::domain::{
    Action, BudgetError, ClusterObservation, ClusterState, CycleId, EvictReason, IdleBudget,
    JobActivity, Observation, ServiceError,
};
use crate::ports::{Clock, ClusterService, FleetScope, IdGenerator};

use super::damper::QuietFleetDamper;
use super::status::{CycleReport, Eviction};
use super::tracker::IdleTracker;

/// Drives the idle tracker against one fleet scope.
pub struct Reconciler<S> {
    service: S,
    scope: FleetScope,
    tracker: IdleTracker,
    damper: QuietFleetDamper,
    id_gen: Box<dyn IdGenerator>,
    poll_interval: Duration,
    default_budget: IdleBudget,
}

impl<S: ClusterService> Reconciler<S> {
    pub fn new(
        service: S,
        scope: FleetScope,
        poll_interval: Duration,
        clock: Arc<dyn Clock>,
        id_gen: Box<dyn IdGenerator>,
    ) -> Self {
        Self {
            service,
            scope,
            tracker: IdleTracker::new(clock),
            damper: QuietFleetDamper::default(),
            id_gen,
            poll_interval,
            default_budget: IdleBudget::Disabled,
        }
    }

    pub fn with_default_budget(mut self, budget: IdleBudget) -> Self {
        self.default_budget = budget;
        self
    }

    pub fn with_damper(mut self, damper: QuietFleetDamper) -> Self {
        self.damper = damper;
        self
    }

    pub fn tracker(&self) -> &IdleTracker {
        &self.tracker
    }

    pub fn service(&self) -> &S {
        &self.service
    }

    pub fn scope(&self) -> &FleetScope {
        &self.scope
    }

    pub fn poll_interval(&self) -> Duration {
        self.poll_interval
    }

    /// Run one poll cycle.
    pub async fn run_cycle(&mut self) -> Result<CycleReport, ServiceError> {
        let cycle_id = self.id_gen.generate_cycle_id();
        let span = info_span!("cycle", id = %cycle_id);
        self.reconcile(cycle_id).instrument(span).await
    }

    async fn reconcile(&mut self, cycle_id: CycleId) -> Result<CycleReport, ServiceError> {
        let clusters = self.service.list_clusters(&self.scope).await?;
        let mut report = CycleReport::new(cycle_id, clusters.len());

        for id in self.tracker.retain_observed(clusters.iter().map(|c| &c.id)) {
            info!(cluster_id = %id, "cluster left the fleet, dropping idle record");
            report.forgotten += 1;
        }

        if clusters.is_empty() {
            if self.damper.observe_empty() {
                debug!("no clusters running");
                report.quiet_logged = true;
            }
        } else {
            self.damper.observe_non_empty();
            for cluster in &clusters {
                self.reconcile_cluster(cluster, &mut report).await?;
            }
        }

        report.tracker = self.tracker.counts();
        Ok(report)
    }

    async fn reconcile_cluster(
        &mut self,
        cluster: &ClusterObservation,
        report: &mut CycleReport,
    ) -> Result<(), ServiceError> {
        let (budget, budget_error) = self.resolve_budget(cluster);

        let probe_jobs =
            cluster.state == ClusterState::Running && self.tracker.is_tracked(&cluster.id);
        let activity = if probe_jobs {
            JobActivity::from(
                self.service
                    .has_active_jobs(&self.scope, &cluster.name)
                    .await?,
            )
        } else {
            JobActivity::NotProbed
        };

        let observation = Observation {
            id: cluster.id.clone(),
            state: cluster.state.clone(),
            activity,
            max_ticks: budget.max_ticks(self.poll_interval),
        };
        let action = self.tracker.update(&observation);

        if let Some(err) = budget_error {
            // Warn once per cluster lifetime; the label is re-read every cycle.
            if action == Action::Track {
                warn!(
                    cluster = %cluster.name,
                    error = %err,
                    "malformed timeout label, auto-delete disabled"
                );
            } else {
                debug!(cluster = %cluster.name, error = %err, "malformed timeout label");
            }
        }

        self.apply(cluster, action, budget, report).await;
        Ok(())
    }

    fn resolve_budget(&self, cluster: &ClusterObservation) -> (IdleBudget, Option<BudgetError>) {
        match cluster.idle_budget(self.default_budget) {
            Ok(budget) => (budget, None),
            Err(err) => (IdleBudget::Disabled, Some(err)),
        }
    }

    async fn apply(
        &mut self,
        cluster: &ClusterObservation,
        action: Action,
        budget: IdleBudget,
        report: &mut CycleReport,
    ) {
        let name = cluster.name.as_str();

        match (action, &cluster.state) {
            (Action::Forget, _) => {
                info!(cluster = name, "processing external delete");
                report.forgotten += 1;
            }
            (Action::Track, _) => {
                info!(
                    cluster = name,
                    cluster_id = %cluster.id,
                    state = %cluster.state,
                    "new cluster found"
                );
                report.tracked_new += 1;
            }
            (Action::Reset, ClusterState::Updating) => {
                debug!(cluster = name, "cluster is updating");
                report.reset += 1;
            }
            (Action::Reset, _) => {
                debug!(cluster = name, "running jobs found");
                report.reset += 1;
            }
            (Action::Increment { idle_ticks }, _) => {
                let idle = self.poll_interval.saturating_mul(saturate_u32(idle_ticks));
                match budget.as_duration() {
                    Some(allowed) => debug!(
                        cluster = name,
                        idle_secs = idle.as_secs(),
                        allowed_secs = allowed.as_secs(),
                        "no running jobs, idle time within budget"
                    ),
                    None => debug!(
                        cluster = name,
                        idle_secs = idle.as_secs(),
                        "no running jobs, no auto-delete"
                    ),
                }
                report.incremented += 1;
            }
            (Action::Evict(reason), _) => {
                match reason {
                    EvictReason::Error => warn!(cluster = name, "cluster has errors, deleting"),
                    EvictReason::Idle => warn!(
                        cluster = name,
                        allowed_secs = budget.seconds(),
                        "cluster was idle for too long, deleting"
                    ),
                }
                self.delete(name, reason, report).await;
            }
            (Action::None, ClusterState::Unrecognized(raw)) => {
                debug!(
                    cluster = name,
                    state = raw.as_str(),
                    "unrecognized cluster state, ignoring"
                );
                report.unrecognized += 1;
            }
            (Action::None, state) => {
                debug!(cluster = name, state = %state, "nothing to do");
            }
        }
    }

    async fn delete(&mut self, name: &str, reason: EvictReason, report: &mut CycleReport) {
        match self.service.delete_cluster(&self.scope, name).await {
            Ok(()) => report.evicted.push(Eviction {
                cluster: name.to_string(),
                reason,
            }),
            Err(err) => {
                warn!(
                    cluster = name,
                    error = %err,
                    "delete request failed, cluster will be re-evaluated if it still exists"
                );
                report.failed_deletes += 1;
            }
        }
    }
}

fn saturate_u32(value: u64) -> u32 {
    u32::try_from(value).unwrap_or(u32::MAX)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::{ClusterId, ErrorKind};
    use crate::impls::InMemoryFleet;
    use crate::ports::{FixedClock, UlidGenerator};
    use chrono::{TimeZone, Utc};

    type TestReconciler = Reconciler<Arc<InMemoryFleet>>;

    fn reconciler(fleet: Arc<InMemoryFleet>) -> TestReconciler {
        let clock: Arc<dyn Clock> = Arc::new(FixedClock::new(
            Utc.with_ymd_and_hms(2024, 1, 1, 12, 0, 0).unwrap(),
        ));
        Reconciler::new(
            fleet,
            FleetScope::new("proj", "global"),
            Duration::from_secs(10),
            clock.clone(),
            Box::new(UlidGenerator::new(clock)),
        )
    }

    fn running(id: &str, name: &str) -> ClusterObservation {
        ClusterObservation::new(id, name, ClusterState::Running)
    }

    async fn cycle(reconciler: &mut TestReconciler) -> CycleReport {
        reconciler.run_cycle().await.unwrap()
    }

    #[tokio::test]
    async fn new_running_cluster_is_tracked_without_probe() {
        let fleet = Arc::new(InMemoryFleet::new());
        fleet.upsert(running("uuid-1", "etl").with_timeout("t15")).await;
        let mut reconciler = reconciler(fleet.clone());

        let report = cycle(&mut reconciler).await;

        assert_eq!(report.tracked_new, 1);
        assert_eq!(reconciler.tracker().record_for(&ClusterId::new("uuid-1")), Some(0));
        assert!(fleet.probe_calls().await.is_empty());
    }

    #[tokio::test]
    async fn active_job_resets_idle_ticks() {
        let fleet = Arc::new(InMemoryFleet::new());
        fleet.upsert(running("uuid-1", "etl").with_timeout("t15")).await;
        let mut reconciler = reconciler(fleet.clone());

        for _ in 0..6 {
            cycle(&mut reconciler).await;
        }
        let id = ClusterId::new("uuid-1");
        assert_eq!(reconciler.tracker().record_for(&id), Some(5));

        fleet.set_active("etl", true).await;
        let report = cycle(&mut reconciler).await;
        assert_eq!(report.reset, 1);
        assert_eq!(reconciler.tracker().record_for(&id), Some(0));
    }

    #[tokio::test]
    async fn idle_budget_exhaustion_deletes_exactly_once() {
        // 10s interval, t15 = 900s budget -> 90 allowed ticks.
        let fleet = Arc::new(InMemoryFleet::new());
        fleet.upsert(running("uuid-1", "etl").with_timeout("t15")).await;
        let mut reconciler = reconciler(fleet.clone());
        let id = ClusterId::new("uuid-1");

        // First sighting, then 89 qualifying idle polls.
        for _ in 0..90 {
            cycle(&mut reconciler).await;
        }
        assert_eq!(reconciler.tracker().record_for(&id), Some(89));
        assert!(fleet.delete_calls().await.is_empty());

        // 90th qualifying poll.
        let report = cycle(&mut reconciler).await;
        assert_eq!(
            report.evicted,
            vec![Eviction {
                cluster: "etl".to_string(),
                reason: EvictReason::Idle
            }]
        );
        assert!(!reconciler.tracker().is_tracked(&id));
        assert_eq!(fleet.delete_calls().await, vec!["etl".to_string()]);

        // The cluster now reports DELETING: no second delete.
        cycle(&mut reconciler).await;
        cycle(&mut reconciler).await;
        assert_eq!(fleet.delete_calls().await.len(), 1);
    }

    #[tokio::test]
    async fn disabled_budget_never_deletes() {
        let fleet = Arc::new(InMemoryFleet::new());
        fleet.upsert(running("uuid-1", "etl").with_timeout("t0")).await;
        let mut reconciler = reconciler(fleet.clone());

        for _ in 0..200 {
            cycle(&mut reconciler).await;
        }

        assert!(fleet.delete_calls().await.is_empty());
        assert_eq!(
            reconciler.tracker().record_for(&ClusterId::new("uuid-1")),
            Some(199)
        );
    }

    #[tokio::test]
    async fn absent_or_malformed_label_disables_eviction_by_default() {
        let fleet = Arc::new(InMemoryFleet::new());
        fleet.upsert(running("uuid-1", "no-label")).await;
        fleet.upsert(running("uuid-2", "bad-label").with_timeout("fifteen")).await;
        let mut reconciler = reconciler(fleet.clone());

        for _ in 0..120 {
            cycle(&mut reconciler).await;
        }

        assert!(fleet.delete_calls().await.is_empty());
        assert_eq!(reconciler.tracker().record_for(&ClusterId::new("uuid-1")), Some(119));
        assert_eq!(reconciler.tracker().record_for(&ClusterId::new("uuid-2")), Some(119));
    }

    #[tokio::test]
    async fn configured_default_budget_applies_to_unlabeled_clusters() {
        let fleet = Arc::new(InMemoryFleet::new());
        fleet.upsert(running("uuid-1", "no-label")).await;
        fleet.upsert(running("uuid-2", "bad-label").with_timeout("fifteen")).await;
        // 60s budget at 10s interval -> 6 ticks.
        let mut reconciler = reconciler(fleet.clone()).with_default_budget(IdleBudget::Seconds(60));

        for _ in 0..7 {
            cycle(&mut reconciler).await;
        }

        // A malformed label never falls back to the default budget.
        assert_eq!(fleet.delete_calls().await, vec!["no-label".to_string()]);
    }

    #[tokio::test]
    async fn error_state_deletes_once_per_observation() {
        let fleet = Arc::new(InMemoryFleet::new());
        fleet.upsert(running("uuid-1", "etl").with_timeout("t15")).await;
        let mut reconciler = reconciler(fleet.clone());
        for _ in 0..4 {
            cycle(&mut reconciler).await;
        }

        let id = ClusterId::new("uuid-1");
        fleet.set_state(&id, ClusterState::Error).await;
        let report = cycle(&mut reconciler).await;

        assert_eq!(report.evicted.len(), 1);
        assert_eq!(report.evicted[0].reason, EvictReason::Error);
        assert!(!reconciler.tracker().is_tracked(&id));
        assert_eq!(fleet.delete_calls().await, vec!["etl".to_string()]);
    }

    #[tokio::test]
    async fn external_delete_is_processed_once() {
        let fleet = Arc::new(InMemoryFleet::new());
        fleet.upsert(running("uuid-1", "etl")).await;
        let mut reconciler = reconciler(fleet.clone());
        cycle(&mut reconciler).await;

        fleet
            .set_state(&ClusterId::new("uuid-1"), ClusterState::Deleting)
            .await;
        let first = cycle(&mut reconciler).await;
        let second = cycle(&mut reconciler).await;

        assert_eq!(first.forgotten, 1);
        assert_eq!(second.forgotten, 0);
        assert!(fleet.delete_calls().await.is_empty());
    }

    #[tokio::test]
    async fn lifecycle_sequence_tracks_expected_ticks() {
        let fleet = Arc::new(InMemoryFleet::new());
        let id = ClusterId::new("uuid-1");
        let mut reconciler = reconciler(fleet.clone());
        let mut ticks = Vec::new();

        fleet
            .upsert(
                ClusterObservation::new("uuid-1", "etl", ClusterState::Creating)
                    .with_timeout("t15"),
            )
            .await;
        cycle(&mut reconciler).await;
        ticks.push(reconciler.tracker().record_for(&id));

        fleet.set_state(&id, ClusterState::Running).await;
        cycle(&mut reconciler).await;
        ticks.push(reconciler.tracker().record_for(&id));

        fleet.set_state(&id, ClusterState::Updating).await;
        cycle(&mut reconciler).await;
        ticks.push(reconciler.tracker().record_for(&id));

        fleet.set_state(&id, ClusterState::Running).await;
        fleet.set_active("etl", true).await;
        cycle(&mut reconciler).await;
        ticks.push(reconciler.tracker().record_for(&id));

        assert_eq!(ticks, vec![Some(0), Some(1), Some(0), Some(0)]);
    }

    #[tokio::test]
    async fn empty_fleet_logs_are_damped() {
        let fleet = Arc::new(InMemoryFleet::new());
        let mut reconciler = reconciler(fleet);

        let mut quiet_lines = 0;
        for _ in 0..25 {
            if cycle(&mut reconciler).await.quiet_logged {
                quiet_lines += 1;
            }
        }
        assert_eq!(quiet_lines, 2);
    }

    #[tokio::test]
    async fn list_failure_abandons_cycle() {
        let fleet = Arc::new(InMemoryFleet::new());
        fleet.upsert(running("uuid-1", "etl")).await;
        let mut reconciler = reconciler(fleet.clone());
        cycle(&mut reconciler).await;

        fleet.fail_next_list(ErrorKind::Transient).await;
        let err = reconciler.run_cycle().await.unwrap_err();
        assert!(err.is_transient());
        assert_eq!(reconciler.tracker().record_for(&ClusterId::new("uuid-1")), Some(0));

        cycle(&mut reconciler).await;
        assert_eq!(reconciler.tracker().record_for(&ClusterId::new("uuid-1")), Some(1));
    }

    #[tokio::test]
    async fn probe_failure_stops_processing_remaining_clusters() {
        let fleet = Arc::new(InMemoryFleet::new());
        fleet.upsert(running("uuid-1", "first")).await;
        fleet.upsert(running("uuid-2", "second")).await;
        let mut reconciler = reconciler(fleet.clone());
        cycle(&mut reconciler).await;

        fleet.fail_probes_for("first").await;
        assert!(reconciler.run_cycle().await.is_err());

        assert_eq!(reconciler.tracker().record_for(&ClusterId::new("uuid-1")), Some(0));
        assert_eq!(reconciler.tracker().record_for(&ClusterId::new("uuid-2")), Some(0));
        assert!(!fleet.probe_calls().await.contains(&"second".to_string()));
    }

    #[tokio::test]
    async fn failed_delete_still_forgets_record() {
        let fleet = Arc::new(InMemoryFleet::new());
        fleet
            .upsert(ClusterObservation::new("uuid-1", "broken", ClusterState::Error))
            .await;
        fleet.fail_deletes(true).await;
        let mut reconciler = reconciler(fleet.clone());

        let report = cycle(&mut reconciler).await;

        assert_eq!(report.failed_deletes, 1);
        assert!(report.evicted.is_empty());
        assert_eq!(report.deletes_issued(), 1);
        assert!(reconciler.tracker().is_empty());

        // Still reported as ERROR next cycle: delete is attempted again.
        fleet.fail_deletes(false).await;
        let report = cycle(&mut reconciler).await;
        assert_eq!(report.evicted.len(), 1);
        assert_eq!(report.deletes_issued(), 1);
        assert_eq!(fleet.delete_calls().await.len(), 2);
    }

    #[tokio::test]
    async fn vanished_cluster_record_is_dropped() {
        let fleet = Arc::new(InMemoryFleet::new());
        fleet.upsert(running("uuid-1", "etl")).await;
        let mut reconciler = reconciler(fleet.clone());
        cycle(&mut reconciler).await;

        fleet.remove(&ClusterId::new("uuid-1")).await;
        let report = cycle(&mut reconciler).await;

        assert_eq!(report.forgotten, 1);
        assert!(reconciler.tracker().is_empty());
    }

    #[tokio::test]
    async fn unrecognized_state_is_counted_not_tracked() {
        let fleet = Arc::new(InMemoryFleet::new());
        fleet
            .upsert(ClusterObservation::new(
                "uuid-1",
                "odd",
                ClusterState::Unrecognized("STOPPED".to_string()),
            ))
            .await;
        let mut reconciler = reconciler(fleet.clone());

        let report = cycle(&mut reconciler).await;

        assert_eq!(report.unrecognized, 1);
        assert!(reconciler.tracker().is_empty());
        assert!(fleet.delete_calls().await.is_empty());
    }

    #[tokio::test]
    async fn evaluation_order_does_not_change_outcome() {
        async fn run(order: [(&str, &str); 2]) -> Vec<String> {
            let fleet = Arc::new(InMemoryFleet::new());
            for (id, name) in order {
                fleet.upsert(running(id, name).with_timeout("t1")).await;
            }
            fleet.set_active("busy", true).await;
            let mut reconciler = reconciler(fleet.clone());
            for _ in 0..7 {
                cycle(&mut reconciler).await;
            }
            fleet.delete_calls().await
        }

        let forward = run([("uuid-1", "idle"), ("uuid-2", "busy")]).await;
        let backward = run([("uuid-2", "busy"), ("uuid-1", "idle")]).await;
        assert_eq!(forward, vec!["idle".to_string()]);
        assert_eq!(forward, backward);
    }
}
