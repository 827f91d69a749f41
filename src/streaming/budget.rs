//! Point budget accounting for streaming
//!
//! Tracks how many points are spent against a fixed per-frame budget. The
//! same type bounds the resident set, using the budget scaled by the cache
//! factor as its limit.

/// Point budget tracker
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct PointBudget {
    /// Maximum points allowed
    limit: u64,
    /// Points spent so far
    used: u64,
}

impl PointBudget {
    /// Create a new budget of `limit` points
    pub fn new(limit: u64) -> Self {
        Self { limit, used: 0 }
    }

    /// Get the limit
    pub fn limit(&self) -> u64 {
        self.limit
    }

    /// Get points spent
    pub fn used(&self) -> u64 {
        self.used
    }

    /// Get points still available
    pub fn remaining(&self) -> u64 {
        self.limit.saturating_sub(self.used)
    }

    /// Check if `points` more would stay within the limit
    pub fn fits(&self, points: u64) -> bool {
        points <= self.remaining()
    }

    /// Spend `points` if they fit
    ///
    /// # Returns
    /// True if the points were spent, false if the budget was left untouched
    pub fn try_spend(&mut self, points: u64) -> bool {
        if !self.fits(points) {
            return false;
        }
        self.used += points;
        true
    }

    /// Add usage without checking the limit
    pub fn add(&mut self, points: u64) {
        self.used = self.used.saturating_add(points);
    }

    /// Remove usage
    pub fn remove(&mut self, points: u64) {
        self.used = self.used.saturating_sub(points);
    }

    /// Usage relative to the limit (0.0 to 1.0+)
    ///
    /// A zero limit reports 0.0 when unused and infinity otherwise.
    pub fn pressure(&self) -> f64 {
        if self.limit == 0 {
            return if self.used == 0 { 0.0 } else { f64::INFINITY };
        }
        self.used as f64 / self.limit as f64
    }

    /// Check if usage exceeds the limit
    pub fn is_over(&self) -> bool {
        self.used > self.limit
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_budget_new() {
        let budget = PointBudget::new(1000);
        assert_eq!(budget.used(), 0);
        assert_eq!(budget.remaining(), 1000);
        assert!(!budget.is_over());
    }

    #[test]
    fn test_try_spend() {
        let mut budget = PointBudget::new(100);
        assert!(budget.try_spend(60));
        assert!(!budget.try_spend(50));
        assert_eq!(budget.used(), 60);
        assert!(budget.try_spend(40));
        assert_eq!(budget.remaining(), 0);
        assert!(budget.try_spend(0));
    }

    #[test]
    fn test_zero_budget_admits_nothing() {
        let mut budget = PointBudget::new(0);
        assert!(!budget.try_spend(1));
        assert_eq!(budget.pressure(), 0.0);
        budget.add(5);
        assert!(budget.is_over());
        assert!(budget.pressure().is_infinite());
    }

    #[test]
    fn test_add_remove_saturate() {
        let mut budget = PointBudget::new(10);
        budget.remove(5);
        assert_eq!(budget.used(), 0);
        budget.add(u64::MAX);
        budget.add(1);
        assert_eq!(budget.used(), u64::MAX);
        assert!((budget.pressure() - u64::MAX as f64 / 10.0).abs() < 1.0);
    }
}
