//! Domain model (ids, states, budgets, observations, actions, errors).

pub mod action;
pub mod budget;
pub mod cluster;
pub mod errors;
pub mod ids;
pub mod state;

pub use self::action::{Action, EvictReason, JobActivity, Observation};
pub use self::budget::{BudgetError, IdleBudget};
pub use self::cluster::{ClusterObservation, TIMEOUT_LABEL};
pub use self::errors::{ErrorKind, Operation, ServiceError};
pub use self::ids::{ClusterId, CycleId};
pub use self::state::ClusterState;
