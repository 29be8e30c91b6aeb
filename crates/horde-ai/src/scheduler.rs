//! Cooperative call queue for periodic horde work.
//!
//! Every periodic callback (agent think, ambient voice, spawn wave,
//! population sweep) is a [`TimerTask`] registered here. Whoever schedules a
//! task receives the only [`TimerHandle`] for it and must hand it back to
//! [`CallQueue::cancel`] when the owner goes away. Tasks are popped one at a
//! time so a cancellation made while dispatching an earlier task prevents a
//! later one from firing in the same advance.

use ahash::AHashMap;
use horde_common::{EntityId, TimerId};
use std::cmp::Reverse;
use std::collections::BinaryHeap;

/// Repeating timers further behind than this many periods drop their backlog.
pub const MAX_CATCHUP_PERIODS: u64 = 4;

/// Shortest period accepted for repeating timers (milliseconds).
pub const MIN_PERIOD_MS: u64 = 1;

/// Work a timer triggers.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum TimerTask {
    /// Run one behavior tick for an agent
    AgentThink(EntityId),
    /// Play an ambient vocalisation for an agent
    AgentVoice(EntityId),
    /// Population spawn operation
    SpawnWave,
    /// Population despawn sweep
    ManagePopulation,
}

/// Exclusive ownership of a scheduled timer.
///
/// Not clonable: the owner that scheduled the timer is the only one able to
/// cancel it.
#[derive(Debug, PartialEq, Eq)]
#[must_use = "dropping a handle leaves its timer running with no way to cancel it"]
pub struct TimerHandle {
    id: TimerId,
}

impl TimerHandle {
    /// Underlying timer ID.
    #[must_use]
    pub const fn id(&self) -> TimerId {
        self.id
    }
}

#[derive(Debug, Clone, Copy)]
struct Entry {
    task: TimerTask,
    due: u64,
    period: Option<u64>,
}

/// Converts world seconds to whole queue milliseconds.
fn to_millis(secs: f32) -> u64 {
    (f64::from(secs.max(0.0)) * 1000.0).round() as u64
}

fn to_secs(millis: u64) -> f64 {
    millis as f64 / 1000.0
}

/// Single-threaded timer registry driven by world time.
///
/// Times are kept in integer milliseconds so a repeating timer always moves
/// strictly forward, however large the world clock grows. Due times live in a
/// min-heap; cancelled or rescheduled entries are skipped when they surface.
#[derive(Debug, Default)]
pub struct CallQueue {
    entries: AHashMap<TimerId, Entry>,
    heap: BinaryHeap<Reverse<(u64, TimerId)>>,
    next_id: u64,
    now: u64,
}

impl CallQueue {
    /// Creates an empty queue at time zero.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Current queue time in seconds (last value passed to [`Self::pop_due`]).
    #[must_use]
    pub fn now(&self) -> f64 {
        to_secs(self.now)
    }

    /// Number of live timers.
    #[must_use]
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    /// Returns whether no timers are registered.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Schedules `task` every `period` seconds, first firing one period from now.
    pub fn schedule_repeating(&mut self, task: TimerTask, period: f32) -> TimerHandle {
        let period = to_millis(period).max(MIN_PERIOD_MS);
        self.insert(Entry {
            task,
            due: self.now.saturating_add(period),
            period: Some(period),
        })
    }

    /// Schedules `task` once, `delay` seconds from now.
    pub fn schedule_once(&mut self, task: TimerTask, delay: f32) -> TimerHandle {
        self.insert(Entry {
            task,
            due: self.now.saturating_add(to_millis(delay)),
            period: None,
        })
    }

    /// Cancels a timer. Returns whether it was still pending.
    pub fn cancel(&mut self, handle: TimerHandle) -> bool {
        let removed = self.entries.remove(&handle.id).is_some();
        self.compact();
        removed
    }

    /// Returns whether the handle's timer is still pending.
    #[must_use]
    pub fn is_pending(&self, handle: &TimerHandle) -> bool {
        self.entries.contains_key(&handle.id)
    }

    /// Time in seconds at which the handle's timer next fires.
    #[must_use]
    pub fn due_at(&self, handle: &TimerHandle) -> Option<f64> {
        self.entries.get(&handle.id).map(|e| to_secs(e.due))
    }

    /// Pops the earliest task due at or before `now` (seconds).
    ///
    /// Repeating timers are rescheduled, one-shot timers are removed. Their
    /// handles stay with the owner; cancelling a fired one-shot is a no-op.
    /// A repeating timer whose next due time cannot move past the current
    /// one is stopped.
    pub fn pop_due(&mut self, now: f32) -> Option<TimerTask> {
        let now = to_millis(now);
        if now > self.now {
            self.now = now;
        }

        loop {
            let &Reverse((due, id)) = self.heap.peek()?;
            if due > now {
                return None;
            }
            self.heap.pop();

            let Some(entry) = self.entries.get(&id).copied() else {
                continue;
            };
            if entry.due != due {
                continue;
            }

            match entry.period {
                Some(period) => {
                    let mut next = entry.due.saturating_add(period);
                    if now.saturating_sub(next) > period.saturating_mul(MAX_CATCHUP_PERIODS) {
                        tracing::debug!(task = ?entry.task, "timer fell behind, skipping backlog");
                        next = now.saturating_add(period);
                    }
                    if next <= entry.due {
                        tracing::warn!(task = ?entry.task, "timer cannot advance, stopping it");
                        self.entries.remove(&id);
                    } else {
                        if let Some(e) = self.entries.get_mut(&id) {
                            e.due = next;
                        }
                        self.heap.push(Reverse((next, id)));
                    }
                },
                None => {
                    self.entries.remove(&id);
                },
            }

            return Some(entry.task);
        }
    }

    fn insert(&mut self, entry: Entry) -> TimerHandle {
        self.next_id += 1;
        let id = TimerId::from_raw(self.next_id);
        self.heap.push(Reverse((entry.due, id)));
        self.entries.insert(id, entry);
        TimerHandle { id }
    }

    /// Rebuilds the heap once cancelled entries dominate it.
    fn compact(&mut self) {
        if self.heap.len() <= 2 * self.entries.len() + 64 {
            return;
        }
        self.heap = self
            .entries
            .iter()
            .map(|(&id, e)| Reverse((e.due, id)))
            .collect();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;

    fn drain(queue: &mut CallQueue, now: f32) -> Vec<TimerTask> {
        let mut fired = Vec::new();
        while let Some(task) = queue.pop_due(now) {
            fired.push(task);
        }
        fired
    }

    #[test]
    fn test_repeating_fires_each_period() {
        let mut queue = CallQueue::new();
        let _handle = queue.schedule_repeating(TimerTask::SpawnWave, 10.0);

        assert!(drain(&mut queue, 9.9).is_empty());
        assert_eq!(drain(&mut queue, 10.0), vec![TimerTask::SpawnWave]);
        assert!(drain(&mut queue, 15.0).is_empty());
        assert_eq!(drain(&mut queue, 20.0), vec![TimerTask::SpawnWave]);
    }

    #[test]
    fn test_one_shot_fires_once() {
        let mut queue = CallQueue::new();
        let agent = EntityId::from_raw(3);
        let handle = queue.schedule_once(TimerTask::AgentVoice(agent), 5.0);

        assert_eq!(drain(&mut queue, 6.0), vec![TimerTask::AgentVoice(agent)]);
        assert!(drain(&mut queue, 60.0).is_empty());
        assert!(!queue.is_pending(&handle));
        assert!(!queue.cancel(handle));
    }

    #[test]
    fn test_cancel_prevents_firing() {
        let mut queue = CallQueue::new();
        let handle = queue.schedule_repeating(TimerTask::ManagePopulation, 1.0);
        assert!(queue.is_pending(&handle));
        assert!(queue.cancel(handle));
        assert!(drain(&mut queue, 100.0).is_empty());
        assert!(queue.is_empty());
    }

    #[test]
    fn test_cancel_between_pops() {
        let mut queue = CallQueue::new();
        let a = EntityId::from_raw(1);
        let b = EntityId::from_raw(2);
        let _first = queue.schedule_repeating(TimerTask::AgentThink(a), 0.5);
        let second = queue.schedule_repeating(TimerTask::AgentThink(b), 0.5);

        assert_eq!(queue.pop_due(0.5), Some(TimerTask::AgentThink(a)));
        // Owner of `b` was torn down while `a` was dispatching
        queue.cancel(second);
        assert_eq!(queue.pop_due(0.5), None);
    }

    #[test]
    fn test_catches_up_a_few_periods() {
        let mut queue = CallQueue::new();
        let _handle = queue.schedule_repeating(TimerTask::SpawnWave, 1.0);
        assert_eq!(drain(&mut queue, 3.0).len(), 3);
    }

    #[test]
    fn test_large_jump_skips_backlog() {
        let mut queue = CallQueue::new();
        let handle = queue.schedule_repeating(TimerTask::SpawnWave, 1.0);
        let fired = drain(&mut queue, 1000.0);
        assert!(fired.len() < 10);
        assert!(queue.due_at(&handle).expect("pending") > 1000.0);
    }

    #[test]
    fn test_earliest_due_first() {
        let mut queue = CallQueue::new();
        let _late = queue.schedule_once(TimerTask::ManagePopulation, 2.0);
        let _early = queue.schedule_once(TimerTask::SpawnWave, 1.0);
        assert_eq!(
            drain(&mut queue, 5.0),
            vec![TimerTask::SpawnWave, TimerTask::ManagePopulation]
        );
    }

    #[test]
    fn test_schedule_relative_to_queue_time() {
        let mut queue = CallQueue::new();
        assert!(queue.pop_due(42.0).is_none());
        assert_eq!(queue.now(), 42.0);
        let handle = queue.schedule_once(TimerTask::SpawnWave, 3.0);
        assert_eq!(queue.due_at(&handle), Some(45.0));
    }

    #[test]
    fn test_large_world_time_terminates() {
        let mut queue = CallQueue::new();
        let spawn = queue.schedule_repeating(TimerTask::SpawnWave, 0.5);
        let think = queue.schedule_repeating(TimerTask::AgentThink(EntityId::from_raw(1)), 0.05);

        for now in [1_050_000.0f32, 17_000_000.0, 17_000_002.0] {
            let fired = drain(&mut queue, now);
            assert!(fired.len() <= 2 * (MAX_CATCHUP_PERIODS as usize + 2));
            assert!(queue.due_at(&spawn).expect("pending") > f64::from(now));
            assert!(queue.due_at(&think).expect("pending") > f64::from(now));
        }
    }

    #[test]
    fn test_unreachable_time_stops_timer() {
        let mut queue = CallQueue::new();
        let handle = queue.schedule_repeating(TimerTask::SpawnWave, 1.0);
        let fired = drain(&mut queue, f32::INFINITY);
        assert!(fired.len() <= MAX_CATCHUP_PERIODS as usize + 2);
        assert!(!queue.is_pending(&handle));
    }

    #[test]
    fn test_cancelled_entries_are_compacted() {
        let mut queue = CallQueue::new();
        let handles: Vec<_> = (0..500)
            .map(|i| queue.schedule_once(TimerTask::AgentVoice(EntityId::from_raw(i)), 1.0))
            .collect();
        let _keep = queue.schedule_once(TimerTask::SpawnWave, 2.0);
        for handle in handles {
            queue.cancel(handle);
        }
        assert_eq!(queue.len(), 1);
        assert!(queue.heap.len() <= 2 * queue.len() + 64);
        assert_eq!(drain(&mut queue, 2.0), vec![TimerTask::SpawnWave]);
    }

    proptest! {
        #[test]
        fn prop_dispatch_is_bounded(period in 0.05f32..30.0, now in 0.0f32..1.0e9) {
            let mut queue = CallQueue::new();
            let _handle = queue.schedule_repeating(TimerTask::ManagePopulation, period);
            let fired = drain(&mut queue, now);
            prop_assert!(fired.len() <= MAX_CATCHUP_PERIODS as usize + 2);
            prop_assert!(queue.pop_due(now).is_none());
        }


        #[test]
        fn prop_repeating_never_fires_early(period in 0.1f32..30.0, steps in 1usize..200, dt in 0.01f32..2.0) {
            let mut queue = CallQueue::new();
            let _handle = queue.schedule_repeating(TimerTask::SpawnWave, period);
            // Queue resolution is one millisecond
            let period = (period * 1000.0).round() / 1000.0;
            let mut fired = 0u32;
            let mut now = 0.0f32;
            for _ in 0..steps {
                now += dt;
                while queue.pop_due(now).is_some() {
                    fired += 1;
                    prop_assert!(now >= fired as f32 * period - 1e-3);
                }
            }
        }
    }
}
