use crate::action::{Action, ActionId, ActionRegistry};
use crate::time::{Interval, Time};

use std::cmp::Ordering;
use std::collections::BinaryHeap;
use std::rc::Rc;

/// The timer subsystem's clock. Injected so tests can drive a deterministic
/// clock; defaults to [`Time::now`].
pub type NowFn = Rc<dyn Fn() -> Time>;

/// A deadline with an optional rearm interval.
#[derive(Copy, Clone, Debug)]
pub struct Timer {
    interval: Interval,
    expiration: Time,
    one_shot: bool,
}

impl Timer {
    pub fn new(interval: Interval, expiration: Time, one_shot: bool) -> Timer {
        Timer {
            interval,
            expiration,
            one_shot,
        }
    }

    /// Fires once at `expiration`, then is discarded.
    pub fn one_shot(expiration: Time) -> Timer {
        Timer::new(Interval::ZERO, expiration, true)
    }

    /// Fires at `expiration`, then rearms every `interval` after that.
    /// The interval must be positive: a zero interval never moves the
    /// deadline, so a single harvest pass would rearm it forever.
    pub fn repeating(interval: Interval, expiration: Time) -> Timer {
        debug_assert!(
            interval.positive(),
            "a repeating timer needs a positive interval"
        );
        Timer::new(interval, expiration, false)
    }

    pub fn interval(&self) -> Interval {
        self.interval
    }

    pub fn expiration(&self) -> Time {
        self.expiration
    }

    pub fn is_one_shot(&self) -> bool {
        self.one_shot
    }

    /// Moves the deadline forward by exactly one interval. The queue calls
    /// this once per firing of a repeating timer, so a backlogged timer
    /// drains one missed occurrence at a time instead of skipping to now.
    pub fn advance(&mut self) {
        self.expiration += self.interval;
    }
}

struct Entry {
    timer: Timer,
    action: ActionId,
}

// Min-heap on expiration; ties fall wherever the heap puts them.
impl Ord for Entry {
    fn cmp(&self, other: &Self) -> Ordering {
        other.timer.expiration().cmp(&self.timer.expiration())
    }
}

impl PartialOrd for Entry {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

impl PartialEq for Entry {
    fn eq(&self, other: &Self) -> bool {
        self.timer.expiration() == other.timer.expiration()
    }
}

impl Eq for Entry {}

/// Priority queue of `(Timer, ActionId)` pairs ordered by nearest deadline.
///
/// The queue only borrows actions by handle; ownership stays with the
/// [`ActionRegistry`] the entries were cloned into.
pub struct TimerQueue {
    heap: BinaryHeap<Entry>,
    now: NowFn,
}

impl TimerQueue {
    pub fn new() -> TimerQueue {
        TimerQueue::with_clock(Rc::new(Time::now))
    }

    pub fn with_clock(now: NowFn) -> TimerQueue {
        TimerQueue {
            heap: BinaryHeap::new(),
            now,
        }
    }

    /// Clones `action` into `registry` and schedules it. A deadline already
    /// in the past is legal; it fires on the next harvest.
    pub fn add(&mut self, registry: &mut ActionRegistry, timer: Timer, action: &dyn Action) {
        let action = registry.reproduce(action);
        self.heap.push(Entry { timer, action });
    }

    /// Number of scheduled entries, counting a rearmed repeating timer once.
    pub fn len(&self) -> usize {
        self.heap.len()
    }

    pub fn is_empty(&self) -> bool {
        self.heap.is_empty()
    }

    /// Time left until the nearest deadline, clamped to zero; `None` when no
    /// timer is pending (wait indefinitely).
    pub fn remaining(&self) -> Option<Interval> {
        let entry = self.heap.peek()?;
        let remaining = entry.timer.expiration() - (self.now)();
        Some(if remaining.positive() {
            remaining
        } else {
            Interval::ZERO
        })
    }

    /// Pops the nearest entry if its deadline is not in the future.
    pub(crate) fn pop_due(&mut self) -> Option<(Timer, ActionId)> {
        let now = (self.now)();
        let entry = self.heap.peek()?;
        if (entry.timer.expiration() - now).positive() {
            return None;
        }
        self.heap.pop().map(|entry| (entry.timer, entry.action))
    }

    pub(crate) fn push(&mut self, timer: Timer, action: ActionId) {
        self.heap.push(Entry { timer, action });
    }
}

impl Default for TimerQueue {
    fn default() -> Self {
        TimerQueue::new()
    }
}
