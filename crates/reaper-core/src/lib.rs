//! reaper-core
//!
//! Core building blocks for the idle-cluster reaper: a long-lived loop that
//! watches a fleet of ephemeral clusters and deletes the ones that stayed idle
//! longer than their `timeout` label allows.
//!
//! # モジュール構成
//! - **domain**: ドメインモデル（ids, state, budget, cluster, action, errors）
//! - **ports**: 抽象化レイヤー（ClusterService, Clock, IdGenerator）
//! - **app**: アプリケーションロジック（builder, tracker, reconciler, reaper_loop, status）
//! - **impls**: 実装（DataprocClusterService, InMemoryFleet, DryRunService）
//! - **config**: 起動時設定

pub mod app;
pub mod config;
pub mod domain;
pub mod impls;
pub mod ports;

pub use crate::app::{BuildError, CycleReport, ReaperBuilder, ReaperLoop};
pub use crate::config::ReaperConfig;
