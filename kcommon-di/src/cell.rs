//! Construct-once cell with blocking waiters and rollback

use parking_lot::{Condvar, Mutex};
use std::fmt;
use std::sync::OnceLock;
use std::thread::{self, ThreadId};

enum CellState<V> {
    NotStarted,
    InProgress(ThreadId),
    Done(V),
}

/// Why [`InstanceCell::get_or_try_init`] did not produce a value
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum InitError<E> {
    /// The calling thread is already constructing this cell
    Reentered,
    /// The initializer failed; the cell is back to not started
    Failed(E),
}

/// Holds an instance constructed at most once
///
/// The first caller runs the initializer without holding the cell's lock.
/// Callers on other threads block until it finishes. If the initializer
/// fails, or unwinds, the cell returns to the not-started state and the
/// waiters are woken so one of them can retry.
///
/// Once constructed, the value is read from a `OnceLock` without touching
/// the mutex.
///
/// Re-entry is only detected on the constructing thread. Two threads whose
/// initializers each wait on the other's cell block forever.
pub struct InstanceCell<V> {
    done: OnceLock<V>,
    state: Mutex<CellState<V>>,
    ready: Condvar,
}

impl<V: Clone> InstanceCell<V> {
    pub fn new() -> Self {
        Self {
            done: OnceLock::new(),
            state: Mutex::new(CellState::NotStarted),
            ready: Condvar::new(),
        }
    }

    /// A cell whose construction is already complete
    pub fn with_value(value: V) -> Self {
        Self {
            done: OnceLock::from(value.clone()),
            state: Mutex::new(CellState::Done(value)),
            ready: Condvar::new(),
        }
    }

    /// The constructed value, if any
    pub fn get(&self) -> Option<V> {
        self.done.get().cloned()
    }

    pub fn is_initialized(&self) -> bool {
        self.done.get().is_some()
    }

    /// Return the value, constructing it with `init` if nobody has yet
    pub fn get_or_try_init<E, F>(&self, init: F) -> Result<V, InitError<E>>
    where
        F: FnOnce() -> Result<V, E>,
    {
        if let Some(value) = self.done.get() {
            return Ok(value.clone());
        }

        let me = thread::current().id();
        {
            let mut state = self.state.lock();
            loop {
                match &*state {
                    CellState::Done(value) => return Ok(value.clone()),
                    CellState::InProgress(owner) if *owner == me => {
                        return Err(InitError::Reentered)
                    }
                    CellState::InProgress(_) => {}
                    CellState::NotStarted => break,
                }
                self.ready.wait(&mut state);
            }
            *state = CellState::InProgress(me);
        }

        let rollback = Rollback { cell: self };
        let value = init().map_err(InitError::Failed)?;
        std::mem::forget(rollback);

        {
            let mut state = self.state.lock();
            // Only the in-progress owner gets here, so `done` is still empty
            let _ = self.done.set(value.clone());
            *state = CellState::Done(value.clone());
        }
        self.ready.notify_all();
        Ok(value)
    }
}

impl<V: Clone> Default for InstanceCell<V> {
    fn default() -> Self {
        Self::new()
    }
}

impl<V> fmt::Debug for InstanceCell<V> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.done.get().is_some() {
            return f.debug_struct("InstanceCell").field("state", &"Done").finish();
        }
        let state = match &*self.state.lock() {
            CellState::NotStarted => "NotStarted",
            CellState::InProgress(_) => "InProgress",
            CellState::Done(_) => "Done",
        };
        f.debug_struct("InstanceCell").field("state", &state).finish()
    }
}

/// Resets an in-progress cell when construction does not complete
struct Rollback<'a, V> {
    cell: &'a InstanceCell<V>,
}

impl<V> Drop for Rollback<'_, V> {
    fn drop(&mut self) {
        *self.cell.state.lock() = CellState::NotStarted;
        self.cell.ready.notify_all();
    }
}
