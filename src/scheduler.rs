use crate::lights::Phase;
use std::time::Instant;

/// A pending light transition. Tokens from an older generation are stale.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TransitionToken {
    pub generation: u64,
    pub phase: Phase,
    pub due: Instant,
}

/// Delivers scheduled transitions back to the controller once they are due
pub trait Scheduler {
    fn schedule(&mut self, token: TransitionToken);

    /// Drop every pending transition
    fn cancel_all(&mut self);

    /// Remove and return the earliest transition due at or before `now`
    fn pop_due(&mut self, now: Instant) -> Option<TransitionToken>;

    fn next_deadline(&self) -> Option<Instant>;
}

/// Pending transitions kept ordered by due time
#[derive(Debug, Default, Clone)]
pub struct TimerQueue {
    pending: Vec<TransitionToken>,
}

impl TimerQueue {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn len(&self) -> usize {
        self.pending.len()
    }

    pub fn is_empty(&self) -> bool {
        self.pending.is_empty()
    }
}

impl Scheduler for TimerQueue {
    fn schedule(&mut self, token: TransitionToken) {
        let idx = self.pending.partition_point(|t| t.due <= token.due);
        self.pending.insert(idx, token);
    }

    fn cancel_all(&mut self) {
        self.pending.clear();
    }

    fn pop_due(&mut self, now: Instant) -> Option<TransitionToken> {
        match self.pending.first() {
            Some(first) if first.due <= now => Some(self.pending.remove(0)),
            _ => None,
        }
    }

    fn next_deadline(&self) -> Option<Instant> {
        self.pending.first().map(|t| t.due)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::time::Duration;

    fn token(phase: Phase, due: Instant) -> TransitionToken {
        TransitionToken {
            generation: 1,
            phase,
            due,
        }
    }

    #[test]
    fn test_pop_due_in_order() {
        let t0 = Instant::now();
        let mut queue = TimerQueue::new();
        queue.schedule(token(Phase::Set, t0 + Duration::from_millis(500)));
        queue.schedule(token(Phase::Ready, t0 + Duration::from_millis(100)));

        assert_eq!(queue.len(), 2);
        assert_eq!(queue.next_deadline(), Some(t0 + Duration::from_millis(100)));
        assert_eq!(queue.pop_due(t0), None);

        let first = queue.pop_due(t0 + Duration::from_millis(600)).unwrap();
        assert_eq!(first.phase, Phase::Ready);
        let second = queue.pop_due(t0 + Duration::from_millis(600)).unwrap();
        assert_eq!(second.phase, Phase::Set);
        assert!(queue.is_empty());
    }

    #[test]
    fn test_cancel_all_clears_group() {
        let t0 = Instant::now();
        let mut queue = TimerQueue::new();
        queue.schedule(token(Phase::Ready, t0));
        queue.schedule(token(Phase::Set, t0));

        queue.cancel_all();

        assert!(queue.is_empty());
        assert_eq!(queue.next_deadline(), None);
        assert_eq!(queue.pop_due(t0 + Duration::from_secs(10)), None);
    }
}
