//! Coach status aggregation over the full step set.

use std::collections::HashSet;

use super::catalog::{ONBOARDING_STEPS, StepKey};
use super::model::{CoachStatus, Step};

/// Number of catalog steps completed, and the catalog size.
///
/// Duplicate rows for one key count once; steps missing from `steps` count as
/// not completed.
pub fn progress(steps: &[Step]) -> (usize, usize) {
    let done: HashSet<StepKey> = steps.iter().filter(|s| s.completed).map(|s| s.key).collect();
    let completed = ONBOARDING_STEPS
        .iter()
        .filter(|e| done.contains(&e.key))
        .count();
    (completed, ONBOARDING_STEPS.len())
}

/// Derive the overall status from a coach's steps.
pub fn aggregate(steps: &[Step]) -> CoachStatus {
    match progress(steps) {
        (0, _) => CoachStatus::Pending,
        (done, total) if done == total => CoachStatus::Complete,
        _ => CoachStatus::InProgress,
    }
}

/// Status before and after a step mutation.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct StatusChange {
    pub previous: CoachStatus,
    pub current: CoachStatus,
}

impl StatusChange {
    pub fn new(previous: CoachStatus, current: CoachStatus) -> Self {
        Self { previous, current }
    }

    pub fn is_change(&self) -> bool {
        self.previous != self.current
    }

    /// True only on the edge into `complete`.
    pub fn became_complete(&self) -> bool {
        self.current == CoachStatus::Complete && self.previous != CoachStatus::Complete
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use uuid::Uuid;

    fn steps_with(completed: usize) -> Vec<Step> {
        let mut steps = Step::full_set(Uuid::new_v4());
        for s in steps.iter_mut().take(completed) {
            s.completed = true;
        }
        steps
    }

    #[test]
    fn none_completed_is_pending() {
        assert_eq!(aggregate(&steps_with(0)), CoachStatus::Pending);
    }

    #[test]
    fn some_completed_is_in_progress() {
        for n in 1..10 {
            assert_eq!(aggregate(&steps_with(n)), CoachStatus::InProgress, "{n} completed");
        }
    }

    #[test]
    fn all_completed_is_complete() {
        assert_eq!(aggregate(&steps_with(10)), CoachStatus::Complete);
        assert_eq!(progress(&steps_with(10)), (10, 10));
    }

    #[test]
    fn missing_steps_block_completion() {
        let mut steps = steps_with(10);
        steps.pop();
        assert_eq!(aggregate(&steps), CoachStatus::InProgress);
        assert_eq!(aggregate(&[]), CoachStatus::Pending);
    }

    #[test]
    fn duplicates_do_not_inflate_progress() {
        let mut steps = steps_with(1);
        let dup = steps[0].clone();
        steps.push(dup.clone());
        steps.push(dup);
        assert_eq!(progress(&steps), (1, 10));
    }

    #[test]
    fn edge_detection() {
        use CoachStatus::*;
        assert!(StatusChange::new(InProgress, Complete).became_complete());
        assert!(StatusChange::new(Pending, Complete).became_complete());
        assert!(!StatusChange::new(Complete, Complete).became_complete());
        assert!(!StatusChange::new(Complete, InProgress).became_complete());
        assert!(!StatusChange::new(Pending, InProgress).became_complete());
        assert!(!StatusChange::new(Complete, Complete).is_change());
    }
}
