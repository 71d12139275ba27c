//! Impls - ports の実装
//!
//! # 含まれる実装
//! - **DataprocClusterService**: 管理サービスの REST API（本番用）
//! - **InMemoryFleet**: メモリ上のフリート（開発・テスト用）
//! - **DryRunService**: 削除だけをログに置き換えるデコレータ

pub mod dataproc;
pub mod dry_run;
pub mod inmem_fleet;

// 主要な型を再エクスポート
pub use self::dataproc::{DataprocClusterService, SetupError};
pub use self::dry_run::DryRunService;
pub use self::inmem_fleet::InMemoryFleet;
