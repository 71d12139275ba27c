//! Ports - 抽象化レイヤー
//!
//! このモジュールは Hexagonal Architecture の「ポート」を定義します。
//! 管理サービス・時刻・ID 生成を trait の裏に隠し、app 層はこれらだけに依存します。
//!
//! # 設計原則
//! - クラスタの正本は管理サービス側にある
//! - reaper の状態（idle tick）は参考情報で、プロセス終了で失われてよい

pub mod clock;
pub mod cluster_service;
pub mod id_generator;

// 主要な trait を再エクスポート
pub use self::clock::{Clock, FixedClock, SystemClock};
pub use self::cluster_service::{ClusterService, FleetScope};
pub use self::id_generator::{IdGenerator, UlidGenerator};
