//! Two-class mutex used to share the tree between workers and a controller.
//!
//! Workers take the low-priority lock once per batch round. The controller
//! takes the high-priority lock for short snapshots. A high-priority waiter
//! goes through the gate directly and so waits for at most the one
//! low-priority section already holding the data; every other low-priority
//! thread queues behind it.
//!
//! Lock order is always `low_priority -> gate -> data`, and the gate is held
//! only long enough to acquire the data lock.

use std::ops::{Deref, DerefMut};
use std::sync::{Mutex, MutexGuard, PoisonError};

#[derive(Debug, Default)]
pub struct PriorityMutex<T> {
    data: Mutex<T>,
    gate: Mutex<()>,
    low_priority: Mutex<()>,
}

/// Guard returned by both lock classes. The data lock is released before the
/// low-priority slot so a queued high-priority thread is served first.
pub struct PriorityGuard<'a, T> {
    data: MutexGuard<'a, T>,
    _low_priority: Option<MutexGuard<'a, ()>>,
}

impl<T> PriorityMutex<T> {
    pub fn new(value: T) -> Self {
        Self {
            data: Mutex::new(value),
            gate: Mutex::new(()),
            low_priority: Mutex::new(()),
        }
    }

    /// Lock for a worker round.
    pub fn lock_low(&self) -> PriorityGuard<'_, T> {
        let low = self
            .low_priority
            .lock()
            .unwrap_or_else(PoisonError::into_inner);
        let gate = self.gate.lock().unwrap_or_else(PoisonError::into_inner);
        let data = self.data.lock().unwrap_or_else(PoisonError::into_inner);
        drop(gate);
        PriorityGuard {
            data,
            _low_priority: Some(low),
        }
    }

    /// Lock for the controller.
    pub fn lock_high(&self) -> PriorityGuard<'_, T> {
        let gate = self.gate.lock().unwrap_or_else(PoisonError::into_inner);
        let data = self.data.lock().unwrap_or_else(PoisonError::into_inner);
        drop(gate);
        PriorityGuard {
            data,
            _low_priority: None,
        }
    }

    pub fn get_mut(&mut self) -> &mut T {
        self.data.get_mut().unwrap_or_else(PoisonError::into_inner)
    }

    pub fn into_inner(self) -> T {
        self.data.into_inner().unwrap_or_else(PoisonError::into_inner)
    }
}

impl<T> Deref for PriorityGuard<'_, T> {
    type Target = T;

    fn deref(&self) -> &T {
        &self.data
    }
}

impl<T> DerefMut for PriorityGuard<'_, T> {
    fn deref_mut(&mut self) -> &mut T {
        &mut self.data
    }
}
