// Licensed under the Apache-2.0 license

use std::collections::BTreeMap;
use std::time::Instant;

pub type TimerCallback = Box<dyn FnOnce()>;

/// Handle returned by [`TimerQueue::schedule`], used to cancel the timer.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct TimerId(u64);

struct PendingTimer {
    deadline: Instant,
    callback: TimerCallback,
}

/// One-shot timers keyed by deadline. The queue never runs callbacks itself;
/// the owner pops expired entries and invokes them, so a callback may freely
/// schedule or cancel other timers on the same queue.
#[derive(Default)]
pub struct TimerQueue {
    next_id: u64,
    timers: BTreeMap<TimerId, PendingTimer>,
}

impl TimerQueue {
    pub fn new() -> Self {
        Self::default()
    }

    /// Schedules `callback` to become due at `deadline`.
    pub fn schedule(&mut self, deadline: Instant, callback: TimerCallback) -> TimerId {
        let id = TimerId(self.next_id);
        self.next_id += 1;
        self.timers.insert(id, PendingTimer { deadline, callback });
        id
    }

    /// Cancels a pending timer. Returns false if it already fired or was
    /// cancelled before.
    pub fn cancel(&mut self, id: TimerId) -> bool {
        self.timers.remove(&id).is_some()
    }

    pub fn is_pending(&self, id: TimerId) -> bool {
        self.timers.contains_key(&id)
    }

    pub fn next_deadline(&self) -> Option<Instant> {
        self.timers.values().map(|t| t.deadline).min()
    }

    /// Removes and returns the earliest timer due at `now`. Timers sharing a
    /// deadline come out in scheduling order.
    pub fn pop_expired(&mut self, now: Instant) -> Option<(TimerId, TimerCallback)> {
        let id = self
            .timers
            .iter()
            .filter(|(_, t)| t.deadline <= now)
            .min_by_key(|(id, t)| (t.deadline, **id))
            .map(|(id, _)| *id)?;
        self.timers.remove(&id).map(|t| (id, t.callback))
    }

    pub fn len(&self) -> usize {
        self.timers.len()
    }

    pub fn is_empty(&self) -> bool {
        self.timers.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::cell::RefCell;
    use std::rc::Rc;
    use std::time::Duration;

    fn fire_all(queue: &mut TimerQueue, now: Instant) -> usize {
        let mut fired = 0;
        while let Some((_, callback)) = queue.pop_expired(now) {
            callback();
            fired += 1;
        }
        fired
    }

    #[test]
    fn test_timer_executes_when_due() {
        let mut queue = TimerQueue::new();
        let shared_data = Rc::new(RefCell::new(0));
        let data = shared_data.clone();
        let start = Instant::now();

        queue.schedule(
            start + Duration::from_millis(100),
            Box::new(move || *data.borrow_mut() += 1),
        );

        assert_eq!(fire_all(&mut queue, start), 0);
        assert_eq!(fire_all(&mut queue, start + Duration::from_millis(100)), 1);
        assert_eq!(*shared_data.borrow(), 1, "Timer callback should have executed");
        assert!(queue.is_empty());
    }

    #[test]
    fn test_timer_is_cancelled() {
        let mut queue = TimerQueue::new();
        let shared_data = Rc::new(RefCell::new(0));
        let data = shared_data.clone();
        let start = Instant::now();

        let id = queue.schedule(
            start + Duration::from_millis(100),
            Box::new(move || *data.borrow_mut() += 1),
        );
        assert!(queue.cancel(id));
        assert!(!queue.cancel(id));

        assert_eq!(fire_all(&mut queue, start + Duration::from_secs(1)), 0);
        assert_eq!(*shared_data.borrow(), 0, "Timer callback should NOT have executed");
    }

    #[test]
    fn test_multiple_timers_fire_in_deadline_order() {
        let mut queue = TimerQueue::new();
        let order = Rc::new(RefCell::new(Vec::new()));
        let start = Instant::now();

        for (tag, delay) in [(1, 200), (2, 100), (3, 100)] {
            let order = order.clone();
            queue.schedule(
                start + Duration::from_millis(delay),
                Box::new(move || order.borrow_mut().push(tag)),
            );
        }

        assert_eq!(queue.next_deadline(), Some(start + Duration::from_millis(100)));
        assert_eq!(fire_all(&mut queue, start + Duration::from_millis(150)), 2);
        assert_eq!(*order.borrow(), vec![2, 3]);
        assert_eq!(fire_all(&mut queue, start + Duration::from_millis(250)), 1);
        assert_eq!(*order.borrow(), vec![2, 3, 1]);
    }

    #[test]
    fn test_cancel_from_earlier_callback() {
        let queue = Rc::new(RefCell::new(TimerQueue::new()));
        let shared_data = Rc::new(RefCell::new(0));
        let start = Instant::now();

        let data = shared_data.clone();
        let victim = queue.borrow_mut().schedule(
            start + Duration::from_millis(20),
            Box::new(move || *data.borrow_mut() += 10),
        );
        let q = queue.clone();
        queue.borrow_mut().schedule(
            start + Duration::from_millis(10),
            Box::new(move || {
                q.borrow_mut().cancel(victim);
            }),
        );

        let now = start + Duration::from_millis(50);
        loop {
            let next = queue.borrow_mut().pop_expired(now);
            match next {
                Some((_, callback)) => callback(),
                None => break,
            }
        }
        assert_eq!(*shared_data.borrow(), 0, "Cancelled timer should not fire");
    }
}
