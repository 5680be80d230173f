//! Cooperative cancellation.

use std::sync::{Arc, OnceLock};

use crate::error::Error;

/// A clonable cancellation handle shared between a pipeline driver and the
/// lexer/assembler it controls.
///
/// Cancellation is cooperative: both stages check the handle at token
/// boundaries and surface [`Error::Cancelled`] carrying the reason, so the
/// state machines stay free of control flow escaping from arbitrary depths.
/// The first [`cancel`](Self::cancel) call wins; later calls are ignored.
///
/// Timeouts are expressed through the handle (see `async_stream` for a
/// tokio-based deadline helper); the core never measures time itself.
#[derive(Debug, Clone, Default)]
pub struct CancelToken {
    reason: Arc<OnceLock<String>>,
}

impl CancelToken {
    pub fn new() -> Self {
        Self::default()
    }

    /// Cancel with a reason. Idempotent: only the first reason is kept.
    pub fn cancel(&self, reason: impl Into<String>) {
        let _ = self.reason.set(reason.into());
    }

    pub fn is_cancelled(&self) -> bool {
        self.reason.get().is_some()
    }

    /// The reason passed to the first `cancel` call, if any.
    pub fn reason(&self) -> Option<&str> {
        self.reason.get().map(String::as_str)
    }

    pub(crate) fn check(&self) -> Result<(), Error> {
        match self.reason.get() {
            Some(reason) => Err(Error::Cancelled {
                reason: reason.clone(),
            }),
            None => Ok(()),
        }
    }
}
