//! Advisory time budget.
//!
//! Callers may hand the pipeline a timeout; it is forwarded to long-running
//! stages as a budget consulted between sub-steps. It is not a cancellation
//! token: a sub-step that has started runs to completion.

use std::time::{Duration, Instant};

#[derive(Debug, Clone)]
pub struct Budget {
    start: Instant,
    limit: Option<Duration>,
}

impl Budget {
    pub fn new(limit: Option<Duration>) -> Self {
        Self { start: Instant::now(), limit }
    }

    pub fn unlimited() -> Self {
        Self::new(None)
    }

    /// True once the budget is spent. Always false for an unlimited budget.
    pub fn exhausted(&self) -> bool {
        match self.limit {
            Some(limit) => self.start.elapsed() > limit,
            None => false,
        }
    }

    pub fn elapsed(&self) -> Duration {
        self.start.elapsed()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn zero_budget_is_immediately_exhausted() {
        let budget = Budget::new(Some(Duration::from_millis(0)));
        std::thread::sleep(Duration::from_millis(1));
        assert!(budget.exhausted());
    }

    #[test]
    fn unlimited_budget_never_exhausts() {
        assert!(!Budget::unlimited().exhausted());
    }
}
