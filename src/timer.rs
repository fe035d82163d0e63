//! One-shot fixed-delay timers.
//!
//! The scan loop re-arms its capture timer after each attempt completes, so
//! the scheduler only ever holds one pending timer per session. Everything is
//! single-threaded and cooperative: timers fire when the owner polls for
//! them, never from another thread.

use std::cmp::Reverse;
use std::collections::{BinaryHeap, HashSet};
use std::time::{Duration, Instant};

/// Opaque token for a scheduled timer. Unique for the scheduler's lifetime.
pub type TimerHandle = u64;

/// One-shot timer scheduler.
pub trait Scheduler {
    /// Arm a timer that becomes due after `delay`.
    fn schedule(&mut self, delay: Duration) -> TimerHandle;

    /// Cancel a pending timer. Cancelling an unknown or already-fired handle
    /// is a no-op.
    fn cancel(&mut self, handle: TimerHandle);

    /// Pop one due timer, if any.
    fn poll_due(&mut self) -> Option<TimerHandle>;
}

// ----------------------------------------------------------------------------
// Wall-clock scheduler for the daemon
// ----------------------------------------------------------------------------

/// Scheduler backed by `Instant::now()`.
pub struct WallClockScheduler {
    queue: BinaryHeap<Reverse<(Instant, TimerHandle)>>,
    cancelled: HashSet<TimerHandle>,
    next_handle: TimerHandle,
}

impl WallClockScheduler {
    pub fn new() -> Self {
        Self {
            queue: BinaryHeap::new(),
            cancelled: HashSet::new(),
            next_handle: 1,
        }
    }

    /// Time until the earliest pending timer is due, for pacing a pump loop.
    pub fn next_due_in(&self) -> Option<Duration> {
        let now = Instant::now();
        self.queue
            .iter()
            .filter(|Reverse((_, handle))| !self.cancelled.contains(handle))
            .map(|Reverse((deadline, _))| deadline.saturating_duration_since(now))
            .min()
    }
}

impl Default for WallClockScheduler {
    fn default() -> Self {
        Self::new()
    }
}

impl Scheduler for WallClockScheduler {
    fn schedule(&mut self, delay: Duration) -> TimerHandle {
        let handle = self.next_handle;
        self.next_handle += 1;
        self.queue.push(Reverse((Instant::now() + delay, handle)));
        handle
    }

    fn cancel(&mut self, handle: TimerHandle) {
        self.cancelled.insert(handle);
    }

    fn poll_due(&mut self) -> Option<TimerHandle> {
        let now = Instant::now();
        while let Some(Reverse((deadline, handle))) = self.queue.peek().copied() {
            if deadline > now {
                return None;
            }
            self.queue.pop();
            if self.cancelled.remove(&handle) {
                continue;
            }
            return Some(handle);
        }
        None
    }
}

// ----------------------------------------------------------------------------
// Manual scheduler for tests
// ----------------------------------------------------------------------------

/// Scheduler driven by an explicit virtual clock. `advance` moves time
/// forward; timers fire only when polled.
pub struct ManualScheduler {
    now: Duration,
    pending: Vec<(Duration, TimerHandle)>,
    next_handle: TimerHandle,
}

impl ManualScheduler {
    pub fn new() -> Self {
        Self {
            now: Duration::ZERO,
            pending: Vec::new(),
            next_handle: 1,
        }
    }

    /// Move the virtual clock forward.
    pub fn advance(&mut self, by: Duration) {
        self.now += by;
    }

    /// Number of timers armed and not yet fired or cancelled.
    pub fn pending_count(&self) -> usize {
        self.pending.len()
    }
}

impl Default for ManualScheduler {
    fn default() -> Self {
        Self::new()
    }
}

impl Scheduler for ManualScheduler {
    fn schedule(&mut self, delay: Duration) -> TimerHandle {
        let handle = self.next_handle;
        self.next_handle += 1;
        self.pending.push((self.now + delay, handle));
        handle
    }

    fn cancel(&mut self, handle: TimerHandle) {
        self.pending.retain(|(_, pending)| *pending != handle);
    }

    fn poll_due(&mut self) -> Option<TimerHandle> {
        let due = self
            .pending
            .iter()
            .enumerate()
            .filter(|(_, (deadline, _))| *deadline <= self.now)
            .min_by_key(|(_, (deadline, handle))| (*deadline, *handle))
            .map(|(index, _)| index)?;
        let (_, handle) = self.pending.remove(due);
        Some(handle)
    }
}

// ----------------------------------------------------------------------------
// Tests
// ----------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn manual_timer_fires_only_after_advance() {
        let mut sched = ManualScheduler::new();
        let handle = sched.schedule(Duration::from_millis(500));

        assert_eq!(sched.poll_due(), None);
        sched.advance(Duration::from_millis(499));
        assert_eq!(sched.poll_due(), None);
        sched.advance(Duration::from_millis(1));
        assert_eq!(sched.poll_due(), Some(handle));
        assert_eq!(sched.poll_due(), None);
    }

    #[test]
    fn cancelled_manual_timer_never_fires() {
        let mut sched = ManualScheduler::new();
        let handle = sched.schedule(Duration::from_millis(100));
        sched.cancel(handle);
        sched.advance(Duration::from_secs(10));
        assert_eq!(sched.poll_due(), None);
        assert_eq!(sched.pending_count(), 0);
    }

    #[test]
    fn cancel_unknown_handle_is_a_no_op() {
        let mut sched = ManualScheduler::new();
        sched.cancel(42);
        assert_eq!(sched.poll_due(), None);
    }

    #[test]
    fn manual_timers_fire_in_deadline_order() {
        let mut sched = ManualScheduler::new();
        let late = sched.schedule(Duration::from_millis(200));
        let early = sched.schedule(Duration::from_millis(100));
        sched.advance(Duration::from_millis(300));
        assert_eq!(sched.poll_due(), Some(early));
        assert_eq!(sched.poll_due(), Some(late));
    }

    #[test]
    fn wall_clock_fires_zero_delay_immediately() {
        let mut sched = WallClockScheduler::new();
        let handle = sched.schedule(Duration::ZERO);
        assert_eq!(sched.poll_due(), Some(handle));
    }

    #[test]
    fn wall_clock_cancel_suppresses_due_timer() {
        let mut sched = WallClockScheduler::new();
        let handle = sched.schedule(Duration::ZERO);
        sched.cancel(handle);
        assert_eq!(sched.poll_due(), None);
    }
}
