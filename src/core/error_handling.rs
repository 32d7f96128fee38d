//! Generic error reporting utilities
//!
//! Provides unified fatal-error reporting that works across the per-area
//! error types while keeping system details out of the primary log line.

/// Trait for errors that can distinguish between user-actionable and system errors
///
/// When `is_user_actionable()` returns `true`, `user_message()` should return
/// `Some(message)` with a message the operator can act on (bad configuration,
/// invalid arguments). System errors (git, network, IO) return `None`.
pub trait ContextualError: std::error::Error {
    /// Returns true if this error carries a message that should be shown directly
    fn is_user_actionable(&self) -> bool;

    /// Returns the specific user message if this is a user-actionable error
    fn user_message(&self) -> Option<&str>;
}

/// Log a fatal error with a detail level based on its specificity
///
/// User-actionable errors log their own message; system errors log the
/// operation context and push the full error to debug level.
pub fn log_error_with_context<E: ContextualError + std::fmt::Display + std::fmt::Debug>(
    error: &E,
    operation_context: &str,
) {
    match error.user_message().filter(|_| error.is_user_actionable()) {
        Some(user_msg) => log::error!("FATAL: {}", user_msg),
        None => log::error!("FATAL: {}: {}", operation_context, error),
    }
    log::debug!("DEBUG_DETAILS: {:?}", error);
}
