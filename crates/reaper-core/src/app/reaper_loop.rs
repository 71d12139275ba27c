//! ReaperLoop - アイドルクラスタの回収ループ
//!
//! # フロー
//! 1. Reconciler::run_cycle() で1サイクル実行
//! 2. 失敗はログに出すだけ（プロセスは止めない）
//! 3. poll_interval だけ sleep（固定スケジュールではなく、処理後に待つ）
//!
//! キャンセル機構はありません。`run_until` の shutdown は sleep 中にだけ確認され、
//! in-memory の idle 状態はそのまま破棄されます。

use std::future::Future;
use std::time::Duration;

use tracing::{debug, error, info, warn};

use crate::domain::ServiceError;
use crate::ports::ClusterService;

use super::reconciler::Reconciler;
use super::status::CycleReport;

/// ReaperLoop は reconciler を一定間隔で回し続ける
pub struct ReaperLoop<S> {
    reconciler: Reconciler<S>,
    poll_interval: Duration,
}

impl<S: ClusterService> ReaperLoop<S> {
    pub fn new(reconciler: Reconciler<S>) -> Self {
        let poll_interval = reconciler.poll_interval();
        Self {
            reconciler,
            poll_interval,
        }
    }

    pub fn reconciler(&self) -> &Reconciler<S> {
        &self.reconciler
    }

    /// Run until the process is terminated.
    pub async fn run(self) {
        self.run_until(std::future::pending::<()>()).await;
    }

    /// Run until `shutdown` resolves. Returns the number of cycles started.
    pub async fn run_until<F>(mut self, shutdown: F) -> u64
    where
        F: Future<Output = ()>,
    {
        let scope = self.reconciler.scope();
        info!(
            project = %scope.project_id,
            region = %scope.region,
            poll_interval_secs = self.poll_interval.as_secs_f64(),
            "reaper started"
        );

        tokio::pin!(shutdown);
        let mut cycles = 0u64;
        loop {
            cycles += 1;
            self.tick().await;

            tokio::select! {
                _ = &mut shutdown => break,
                _ = tokio::time::sleep(self.poll_interval) => {},
            }
        }

        info!(cycles, tracked = self.reconciler.tracker().len(), "reaper stopped");
        cycles
    }

    /// Run one cycle and log its outcome. Errors never escape.
    pub async fn tick(&mut self) -> Option<CycleReport> {
        match self.reconciler.run_cycle().await {
            Ok(report) => {
                debug!(
                    cycle = %report.cycle_id,
                    observed = report.observed,
                    tracked = report.tracker.tracked,
                    deletes_issued = report.deletes_issued(),
                    failed_deletes = report.failed_deletes,
                    idle = report.tracker.idle,
                    "cycle finished"
                );
                Some(report)
            }
            Err(err) => {
                log_cycle_error(&err);
                None
            }
        }
    }
}

fn log_cycle_error(err: &ServiceError) {
    if err.is_transient() {
        warn!(error = %err, "cycle abandoned, retrying next interval");
    } else {
        error!(error = %err, kind = ?err.kind(), "cycle abandoned, retrying next interval");
    }
}
