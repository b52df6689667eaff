//! Usage: Mutex extension trait with automatic recovery from poisoned state.

use std::sync::{Mutex, MutexGuard};

/// Extension trait that recovers a poisoned `Mutex` instead of propagating the panic.
pub(crate) trait MutexExt<T> {
    /// Lock the mutex; on poison, recover the inner data and log the incident.
    fn lock_or_recover(&self) -> MutexGuard<'_, T>;
}

impl<T> MutexExt<T> for Mutex<T> {
    #[track_caller]
    fn lock_or_recover(&self) -> MutexGuard<'_, T> {
        match self.lock() {
            Ok(guard) => guard,
            Err(poisoned) => {
                let loc = std::panic::Location::caller();
                tracing::error!(
                    mutex_type = std::any::type_name::<T>(),
                    file = loc.file(),
                    line = loc.line(),
                    column = loc.column(),
                    "mutex poisoned by a panicked thread; recovered, state may be inconsistent"
                );
                poisoned.into_inner()
            }
        }
    }
}
