//! Budget - クラスタごとの idle 予算
//!
//! クラスタの `timeout` ラベルは「英字1文字 + 分数」のトークンです（例: `t15`）。
//! 先頭の英字は解釈せず、数字部分を分として秒に変換します。
//!
//! - `t15` → 900 秒
//! - `t0`  → 自動削除なし（idle tick の計測は続ける）
//! - 不正なトークンは `BudgetError` で明示的に拒否

use std::fmt;
use std::str::FromStr;
use std::time::Duration;

use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Errors produced while parsing a timeout token.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum BudgetError {
    #[error("timeout token is empty")]
    Empty,

    #[error("timeout token {0:?} must start with a single letter prefix")]
    MissingPrefix(String),

    #[error("timeout token {0:?} must end with a whole number of minutes")]
    InvalidMinutes(String),

    #[error("timeout token {0:?} is too large")]
    Overflow(String),
}

/// Maximum idle time a cluster may accumulate before it is deleted.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub enum IdleBudget {
    /// Idle time is tracked and logged, but the cluster is never evicted.
    #[default]
    Disabled,

    /// Budget in seconds (always > 0).
    Seconds(u64),
}

impl IdleBudget {
    pub fn from_minutes(minutes: u64) -> Option<Self> {
        match minutes {
            0 => Some(Self::Disabled),
            m => m.checked_mul(60).map(Self::Seconds),
        }
    }

    /// Parse a `timeout` label value such as `t15`.
    pub fn parse(token: &str) -> Result<Self, BudgetError> {
        let mut chars = token.chars();
        let prefix = chars.next().ok_or(BudgetError::Empty)?;
        if !prefix.is_ascii_alphabetic() {
            return Err(BudgetError::MissingPrefix(token.to_string()));
        }

        let digits = chars.as_str();
        if digits.is_empty() || !digits.bytes().all(|b| b.is_ascii_digit()) {
            return Err(BudgetError::InvalidMinutes(token.to_string()));
        }

        let minutes: u64 = digits
            .parse()
            .map_err(|_| BudgetError::Overflow(token.to_string()))?;
        Self::from_minutes(minutes).ok_or_else(|| BudgetError::Overflow(token.to_string()))
    }

    pub fn is_enabled(&self) -> bool {
        matches!(self, Self::Seconds(_))
    }

    /// Budget in seconds; 0 when auto-delete is disabled.
    pub fn seconds(&self) -> u64 {
        match self {
            Self::Disabled => 0,
            Self::Seconds(secs) => *secs,
        }
    }

    pub fn as_duration(&self) -> Option<Duration> {
        match self {
            Self::Disabled => None,
            Self::Seconds(secs) => Some(Duration::from_secs(*secs)),
        }
    }

    /// Number of idle ticks allowed at the given poll interval:
    /// `floor(budget / poll_interval)`. `None` when auto-delete is disabled.
    pub fn max_ticks(&self, poll_interval: Duration) -> Option<u64> {
        let budget = self.as_duration()?;
        let ticks = budget
            .as_millis()
            .checked_div(poll_interval.as_millis())
            .unwrap_or(u128::MAX);
        Some(u64::try_from(ticks).unwrap_or(u64::MAX))
    }
}

impl FromStr for IdleBudget {
    type Err = BudgetError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::parse(s)
    }
}

impl fmt::Display for IdleBudget {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Disabled => f.write_str("disabled"),
            Self::Seconds(secs) => write!(f, "{secs}s"),
        }
    }
}
