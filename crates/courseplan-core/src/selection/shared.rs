//! Single-writer handle around a selection.

use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

use super::ScheduleSelection;

/// Cloneable handle that serialises commands for one student's selection.
///
/// Each `write` runs validate-then-commit under the lock, so two concurrent
/// commands can never both pass validation against the same state.
#[derive(Debug, Clone, Default)]
pub struct SharedSelection {
    inner: Arc<Mutex<ScheduleSelection>>,
}

impl SharedSelection {
    pub fn new(selection: ScheduleSelection) -> Self {
        Self {
            inner: Arc::new(Mutex::new(selection)),
        }
    }

    pub fn read<R>(&self, f: impl FnOnce(&ScheduleSelection) -> R) -> R {
        f(&self.lock())
    }

    pub fn write<R>(&self, f: impl FnOnce(&mut ScheduleSelection) -> R) -> R {
        f(&mut self.lock())
    }

    /// Copy of the current state.
    pub fn snapshot(&self) -> ScheduleSelection {
        self.lock().clone()
    }

    // Commands never leave the selection half-updated, so a poisoned lock
    // still guards a consistent value.
    fn lock(&self) -> MutexGuard<'_, ScheduleSelection> {
        self.inner.lock().unwrap_or_else(PoisonError::into_inner)
    }
}
