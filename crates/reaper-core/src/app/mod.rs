//! App - アプリケーション層
//!
//! このモジュールは、ports を組み合わせて reaper のロジックを実装します。
//!
//! # 主要コンポーネント
//! - **ReaperBuilder**: 設定の検証とワイヤリング
//! - **IdleTracker**: クラスタごとの idle tick と状態機械
//! - **QuietFleetDamper**: 空のフリートのログ間引き
//! - **Reconciler**: 1 サイクル分の照合（一覧→job 確認→tracker 更新→削除）
//! - **ReaperLoop**: 一定間隔で Reconciler を回すループ
//! - **Status**: サイクルの結果と tracker の集計

pub mod builder;
pub mod damper;
pub mod reaper_loop;
pub mod reconciler;
pub mod status;
pub mod tracker;

// 主要な型を再エクスポート
pub use self::builder::{BuildError, ReaperBuilder};
pub use self::damper::QuietFleetDamper;
pub use self::reaper_loop::ReaperLoop;
pub use self::reconciler::Reconciler;
pub use self::status::{CycleReport, Eviction, TrackerCounts};
pub use self::tracker::{IdleRecord, IdleTracker};
