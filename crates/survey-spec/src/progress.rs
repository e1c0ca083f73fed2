use serde::Serialize;

/// Monotonic `completed / total` counter over the stages of a timeline.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ProgressTracker {
    completed: usize,
    total: usize,
}

impl ProgressTracker {
    pub fn new(total: usize) -> Self {
        Self {
            completed: 0,
            total,
        }
    }

    /// Marks one more stage as completed and returns the new fraction.
    /// Never moves past `total`.
    pub fn advance(&mut self) -> f64 {
        self.completed = (self.completed + 1).min(self.total);
        self.fraction()
    }

    pub fn completed(&self) -> usize {
        self.completed
    }

    pub fn total(&self) -> usize {
        self.total
    }

    pub fn fraction(&self) -> f64 {
        if self.total == 0 {
            0.0
        } else {
            self.completed as f64 / self.total as f64
        }
    }

    pub fn is_complete(&self) -> bool {
        self.completed == self.total
    }
}

/// Progress as shown to the presentation runtime.
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct ProgressView {
    pub completed: usize,
    pub total: usize,
    pub fraction: f64,
    /// Only paged timelines with more than one stage show a progress bar.
    pub visible: bool,
}

impl ProgressView {
    pub fn new(tracker: &ProgressTracker, visible: bool) -> Self {
        Self {
            completed: tracker.completed(),
            total: tracker.total(),
            fraction: tracker.fraction(),
            visible,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn advances_in_equal_steps() {
        let mut tracker = ProgressTracker::new(4);
        assert_eq!(tracker.fraction(), 0.0);
        assert_eq!(tracker.advance(), 0.25);
        assert_eq!(tracker.advance(), 0.5);
        assert_eq!(tracker.advance(), 0.75);
        assert!(!tracker.is_complete());
        assert_eq!(tracker.advance(), 1.0);
        assert!(tracker.is_complete());
    }

    #[test]
    fn saturates_at_total() {
        let mut tracker = ProgressTracker::new(1);
        tracker.advance();
        assert_eq!(tracker.advance(), 1.0);
        assert_eq!(tracker.completed(), 1);
    }

    #[test]
    fn empty_timeline_reports_zero() {
        let mut tracker = ProgressTracker::new(0);
        assert_eq!(tracker.advance(), 0.0);
        assert!(tracker.is_complete());
    }
}
