//! Re-entrancy guard.
//!
//! The sink logs through `tracing` and is itself a `tracing` writer. Events
//! raised while a batch is being delivered would otherwise come back into
//! the sink and deadlock on its lock. Threads that deliver batches are
//! marked, and writes from marked threads are only mirrored locally.

use std::cell::Cell;

thread_local! {
    static DISPATCHING: Cell<bool> = const { Cell::new(false) };
}

/// Mark the current thread for its whole lifetime.
pub fn mark_current_thread() {
    DISPATCHING.with(|flag| flag.set(true));
}

pub fn is_dispatch_thread() -> bool {
    DISPATCHING.with(Cell::get)
}

/// Marks the current thread until dropped.
#[must_use]
pub struct DispatchScope {
    previous: bool,
}

impl DispatchScope {
    pub fn enter() -> Self {
        let previous = DISPATCHING.with(|flag| flag.replace(true));
        Self { previous }
    }
}

impl Drop for DispatchScope {
    fn drop(&mut self) {
        DISPATCHING.with(|flag| flag.set(self.previous));
    }
}
