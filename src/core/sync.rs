//! Mutex poison handling shared by the in-process state holders

use std::sync::LockResult;

/// Convert a poisoned lock result into an area error
///
/// The credential pool and the in-memory stores hold `std::sync::Mutex`
/// guards for very short critical sections; a poisoned lock there means a
/// panic happened mid-update and the caller gets a typed error instead of a
/// second panic.
///
/// # Examples
/// ```
/// use std::sync::Mutex;
/// use commitscan::core::sync::handle_mutex_poison;
/// use commitscan::jobs::StoreError;
///
/// let mutex = Mutex::new(42);
/// let guard = handle_mutex_poison(mutex.lock(), StoreError::Internal).unwrap();
/// assert_eq!(*guard, 42);
/// ```
pub fn handle_mutex_poison<T, E>(
    result: LockResult<T>,
    error_constructor: impl FnOnce(String) -> E,
) -> Result<T, E> {
    result.map_err(|poison_err| {
        error_constructor(format!(
            "Internal synchronisation error (mutex poisoned). A panic occurred while holding a lock. PoisonError: {:?}",
            poison_err
        ))
    })
}
