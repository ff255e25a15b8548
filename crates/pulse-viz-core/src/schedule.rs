//! Explicit tick registration.
//!
//! Scenes register when they start animating and deregister on destroy; the
//! host only drives scenes whose registration is still live.

use std::collections::HashSet;

use tracing::trace;

/// Handle returned by [`Scheduler::register`]
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub struct TickId(u64);

#[derive(Debug, Default)]
pub struct Scheduler {
    next: u64,
    active: HashSet<TickId>,
}

impl Scheduler {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn register(&mut self) -> TickId {
        let id = TickId(self.next);
        self.next += 1;
        self.active.insert(id);
        trace!("Registered tick {:?}", id);
        id
    }

    /// Stop ticking `id`. Returns false if it was not registered.
    pub fn deregister(&mut self, id: TickId) -> bool {
        let removed = self.active.remove(&id);
        if removed {
            trace!("Deregistered tick {:?}", id);
        }
        removed
    }

    pub fn is_registered(&self, id: TickId) -> bool {
        self.active.contains(&id)
    }

    pub fn active_count(&self) -> usize {
        self.active.len()
    }
}
