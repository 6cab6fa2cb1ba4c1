//! Cooperative one-shot scheduler
//!
//! Tasks queued with [`EventBus::after`](crate::events::EventBus::after) run
//! on the main thread against the current scene once their delay has elapsed,
//! earliest deadline first. Stopping a scene cancels everything pending.

use std::cmp::Ordering;
use std::collections::BinaryHeap;

use crate::events::Task;

struct Pending {
    deadline: f32,
    seq: u64,
    task: Task,
}

impl PartialEq for Pending {
    fn eq(&self, other: &Self) -> bool {
        self.cmp(other) == Ordering::Equal
    }
}

impl Eq for Pending {}

impl PartialOrd for Pending {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

impl Ord for Pending {
    // Reversed: the heap pops the earliest deadline, then the oldest task.
    fn cmp(&self, other: &Self) -> Ordering {
        other
            .deadline
            .total_cmp(&self.deadline)
            .then_with(|| other.seq.cmp(&self.seq))
    }
}

/// Deadline-ordered task queue
#[derive(Default)]
pub struct Scheduler {
    now: f32,
    next_seq: u64,
    pending: BinaryHeap<Pending>,
}

impl Scheduler {
    /// Empty scheduler at time zero
    pub fn new() -> Self {
        Self::default()
    }

    /// Run `task` `delay` seconds from now
    pub fn schedule(&mut self, delay: f32, task: Task) {
        let seq = self.next_seq;
        self.next_seq += 1;
        self.pending.push(Pending {
            deadline: self.now + delay.max(0.0),
            seq,
            task,
        });
    }

    /// Move the clock by `dt` and hand back the tasks now due, in order
    pub fn advance(&mut self, dt: f32) -> Vec<Task> {
        self.now += dt.max(0.0);
        let mut due = Vec::new();
        while self.pending.peek().is_some_and(|p| p.deadline <= self.now) {
            if let Some(pending) = self.pending.pop() {
                due.push(pending.task);
            }
        }
        due
    }

    /// Drop every pending task
    pub fn cancel_all(&mut self) {
        if !self.pending.is_empty() {
            log::debug!("cancelled {} scheduled task(s)", self.pending.len());
        }
        self.pending.clear();
    }

    /// Seconds elapsed on the scheduler clock
    pub const fn now(&self) -> f32 {
        self.now
    }

    /// Tasks waiting
    pub fn len(&self) -> usize {
        self.pending.len()
    }

    /// Whether nothing is waiting
    pub fn is_empty(&self) -> bool {
        self.pending.is_empty()
    }
}

impl std::fmt::Debug for Scheduler {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Scheduler")
            .field("now", &self.now)
            .field("pending", &self.pending.len())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::events::{EventBus, EventData};
    use crate::foundation::math::Vector;
    use crate::scene::Scene;

    fn marker(name: &'static str) -> Task {
        Box::new(move |_scene, bus| bus.defer(EventData::custom(name, ())))
    }

    fn run(tasks: Vec<Task>) -> Vec<String> {
        let mut scene = Scene::new("tasks", Vector::new(640.0, 640.0), 64.0).expect("valid scene");
        let mut bus = EventBus::new();
        for task in tasks {
            task(&mut scene, &mut bus);
        }
        bus.promote();
        std::iter::from_fn(|| bus.pop())
            .map(|e| format!("{:?}", e.kind()))
            .collect()
    }

    #[test]
    fn test_tasks_run_by_deadline() {
        let mut scheduler = Scheduler::new();
        scheduler.schedule(0.5, marker("late"));
        scheduler.schedule(0.1, marker("early"));
        scheduler.schedule(0.1, marker("early2"));
        assert!(scheduler.advance(0.05).is_empty());

        let due = scheduler.advance(0.5);
        assert_eq!(
            run(due),
            vec!["Custom(\"early\")", "Custom(\"early2\")", "Custom(\"late\")"]
        );
        assert!(scheduler.is_empty());
    }

    #[test]
    fn test_cancel_all() {
        let mut scheduler = Scheduler::new();
        scheduler.schedule(1.0, marker("never"));
        assert_eq!(scheduler.len(), 1);
        scheduler.cancel_all();
        assert!(scheduler.advance(2.0).is_empty());
    }
}
