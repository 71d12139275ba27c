//! Quiet-fleet damping for the "no clusters" log line.

/// Default number of consecutive empty polls per log line.
pub const DEFAULT_QUIET_LOG_EVERY: u32 = 10;

/// Counts consecutive empty fleet snapshots and says when to log.
///
/// With `every = 10`, 25 empty polls produce two log lines (polls 10 and 20).
/// The counter restarts after each emitted line and whenever the fleet is
/// non-empty.
#[derive(Debug, Clone)]
pub struct QuietFleetDamper {
    every: u32,
    empty_polls: u32,
}

impl QuietFleetDamper {
    pub fn new(every: u32) -> Self {
        Self {
            every: every.max(1),
            empty_polls: 0,
        }
    }

    /// Record an empty snapshot. Returns `true` when a line should be logged.
    pub fn observe_empty(&mut self) -> bool {
        self.empty_polls += 1;
        if self.empty_polls >= self.every {
            self.empty_polls = 0;
            return true;
        }
        false
    }

    pub fn observe_non_empty(&mut self) {
        self.empty_polls = 0;
    }

    pub fn empty_polls(&self) -> u32 {
        self.empty_polls
    }
}

impl Default for QuietFleetDamper {
    fn default() -> Self {
        Self::new(DEFAULT_QUIET_LOG_EVERY)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn logs_on_polls_ten_and_twenty() {
        let mut damper = QuietFleetDamper::default();
        let mut logged_at = Vec::new();
        for poll in 1..=25 {
            if damper.observe_empty() {
                logged_at.push(poll);
            }
        }
        assert_eq!(logged_at, vec![10, 20]);
        assert_eq!(damper.empty_polls(), 5);
    }

    #[test]
    fn non_empty_snapshot_restarts_count() {
        let mut damper = QuietFleetDamper::new(3);
        assert!(!damper.observe_empty());
        assert!(!damper.observe_empty());
        damper.observe_non_empty();
        assert!(!damper.observe_empty());
        assert!(!damper.observe_empty());
        assert!(damper.observe_empty());
    }

    #[test]
    fn zero_is_treated_as_one() {
        let mut damper = QuietFleetDamper::new(0);
        assert!(damper.observe_empty());
        assert!(damper.observe_empty());
    }
}
