//! Thread-local last-error record.
//!
//! The `Result` returned by each client operation is the primary error
//! channel. This module keeps a copy of the most recent failure on the
//! current thread for callers that only have a status to go on (logging
//! wrappers, foreign-function shims).
//!
//! Every failing client operation overwrites the record. Successful
//! operations leave it alone, so a caller distinguishing independent
//! operations must call [`reset_error`] between them. Records never cross
//! threads.

use std::cell::RefCell;

use crate::error::{ClientError, ErrorKind};

/// Last failure recorded on this thread.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ErrorRecord {
    /// Status of the failure
    pub kind: ErrorKind,
    /// Human-readable description
    pub message: String,
}

thread_local! {
    static LAST_ERROR: RefCell<Option<ErrorRecord>> = const { RefCell::new(None) };
}

/// Record a failure, replacing any previous record.
pub fn set_error(kind: ErrorKind, message: impl Into<String>) {
    let record = ErrorRecord { kind, message: message.into() };
    LAST_ERROR.with(|slot| *slot.borrow_mut() = Some(record));
}

/// Most recent failure on this thread, if any.
pub fn last_error() -> Option<ErrorRecord> {
    LAST_ERROR.with(|slot| slot.borrow().clone())
}

/// Whether a failure is currently recorded.
pub fn is_error_set() -> bool {
    LAST_ERROR.with(|slot| slot.borrow().is_some())
}

/// Clear the record.
pub fn reset_error() {
    LAST_ERROR.with(|slot| *slot.borrow_mut() = None);
}

/// Mirror the error of a failed result into the thread-local record.
pub(crate) trait RecordError {
    fn record_error(self) -> Self;
}

impl<T> RecordError for Result<T, ClientError> {
    fn record_error(self) -> Self {
        if let Err(e) = &self {
            set_error(e.kind(), e.to_string());
        }
        self
    }
}
