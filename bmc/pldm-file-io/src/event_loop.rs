// Licensed under the Apache-2.0 license

use crate::timer::{TimerId, TimerQueue};
use bitflags::bitflags;
use log::trace;
use std::cell::{Cell, RefCell};
use std::collections::BTreeMap;
use std::rc::Rc;
use std::thread;
use std::time::{Duration, Instant};

bitflags! {
    /// Readiness conditions an I/O watch waits for.
    #[derive(Debug, Clone, Copy, PartialEq, Eq)]
    pub struct Interest: u32 {
        const READABLE = 0x1;
        const WRITABLE = 0x4;
    }
}

/// Something the loop can poll for readiness, such as a DMA channel.
pub trait EventSource {
    fn readiness(&self) -> Interest;
}

pub type IoCallback = Box<dyn FnMut(Interest)>;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct WatchId(u64);

struct IoWatch {
    source: Rc<dyn EventSource>,
    interest: Interest,
    // Taken out while the callback runs.
    callback: Option<IoCallback>,
}

#[derive(Default)]
struct Inner {
    timers: RefCell<TimerQueue>,
    watches: RefCell<BTreeMap<WatchId, IoWatch>>,
    next_watch: Cell<u64>,
}

/// Single-threaded event loop driving timers and I/O watches.
///
/// Clones share the same loop. Callbacks run on the thread calling
/// [`EventLoop::run_once`] and may add or remove timers and watches,
/// including their own.
#[derive(Clone, Default)]
pub struct EventLoop {
    inner: Rc<Inner>,
}

impl EventLoop {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn add_timer<F>(&self, after: Duration, callback: F) -> TimerId
    where
        F: FnOnce() + 'static,
    {
        self.inner
            .timers
            .borrow_mut()
            .schedule(Instant::now() + after, Box::new(callback))
    }

    pub fn cancel_timer(&self, id: TimerId) -> bool {
        self.inner.timers.borrow_mut().cancel(id)
    }

    pub fn add_io<F>(&self, source: Rc<dyn EventSource>, interest: Interest, callback: F) -> WatchId
    where
        F: FnMut(Interest) + 'static,
    {
        let id = WatchId(self.inner.next_watch.get());
        self.inner.next_watch.set(id.0 + 1);
        self.inner.watches.borrow_mut().insert(
            id,
            IoWatch {
                source,
                interest,
                callback: Some(Box::new(callback)),
            },
        );
        id
    }

    pub fn remove_io(&self, id: WatchId) -> bool {
        self.inner.watches.borrow_mut().remove(&id).is_some()
    }

    pub fn pending_timers(&self) -> usize {
        self.inner.timers.borrow().len()
    }

    pub fn active_watches(&self) -> usize {
        self.inner.watches.borrow().len()
    }

    pub fn is_idle(&self) -> bool {
        self.pending_timers() == 0 && self.active_watches() == 0
    }

    /// Dispatches everything that is ready. If nothing is, waits up to
    /// `max_wait` (or the next timer deadline, if sooner) and tries once more.
    /// Returns the number of callbacks invoked.
    pub fn run_once(&self, max_wait: Duration) -> usize {
        let dispatched = self.dispatch();
        if dispatched > 0 {
            return dispatched;
        }

        let now = Instant::now();
        let wait = match self.inner.timers.borrow().next_deadline() {
            Some(deadline) => deadline.saturating_duration_since(now).min(max_wait),
            None => max_wait,
        };
        if !wait.is_zero() {
            thread::sleep(wait);
        }
        self.dispatch()
    }

    /// Runs the loop until no timer or watch remains. Returns false if `limit`
    /// elapsed first.
    pub fn run_until_idle(&self, limit: Duration) -> bool {
        let start = Instant::now();
        while !self.is_idle() {
            if start.elapsed() > limit {
                return false;
            }
            self.run_once(Duration::from_millis(5));
        }
        true
    }

    fn dispatch(&self) -> usize {
        self.dispatch_io() + self.dispatch_timers(Instant::now())
    }

    fn dispatch_io(&self) -> usize {
        let ready: Vec<(WatchId, Interest)> = self
            .inner
            .watches
            .borrow()
            .iter()
            .filter_map(|(id, watch)| {
                let revents = watch.source.readiness() & watch.interest;
                (!revents.is_empty()).then_some((*id, revents))
            })
            .collect();

        let mut dispatched = 0;
        for (id, revents) in ready {
            // An earlier callback in this round may have removed the watch.
            let callback = self
                .inner
                .watches
                .borrow_mut()
                .get_mut(&id)
                .and_then(|watch| watch.callback.take());
            let Some(mut callback) = callback else {
                continue;
            };

            trace!("Dispatching watch {:?} with {:?}", id, revents);
            callback(revents);
            dispatched += 1;

            if let Some(watch) = self.inner.watches.borrow_mut().get_mut(&id) {
                watch.callback.get_or_insert(callback);
            }
        }
        dispatched
    }

    fn dispatch_timers(&self, now: Instant) -> usize {
        let mut dispatched = 0;
        loop {
            // Pop one at a time so a callback can cancel a later timer.
            let next = self.inner.timers.borrow_mut().pop_expired(now);
            let Some((id, callback)) = next else {
                break;
            };
            trace!("Firing timer {:?}", id);
            callback();
            dispatched += 1;
        }
        dispatched
    }
}
