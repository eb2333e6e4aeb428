//! Success/error handler resolution.
//!
//! Every operation resolves its handlers from a prioritized list: the per-call
//! [`Callbacks`] first, then the ones configured on the container. Only the first present
//! handler runs. An error with no handler at all is logged and swallowed.

use std::{fmt, sync::Arc};
use tracing::error;

use crate::errors::QueryError;

/// Called with the producer's response
pub type SuccessCallback<T> = Arc<dyn Fn(&T) + Send + Sync>;

/// Called with the producer's error
pub type ErrorCallback = Arc<dyn Fn(&QueryError) + Send + Sync>;

/// An optional pair of handlers. Absent handlers are a legitimate configuration.
pub struct Callbacks<T> {
    pub on_success: Option<SuccessCallback<T>>,
    pub on_error: Option<ErrorCallback>,
}

impl<T> Default for Callbacks<T> {
    fn default() -> Self {
        Self {
            on_success: None,
            on_error: None,
        }
    }
}

impl<T> Clone for Callbacks<T> {
    fn clone(&self) -> Self {
        Self {
            on_success: self.on_success.clone(),
            on_error: self.on_error.clone(),
        }
    }
}

impl<T> fmt::Debug for Callbacks<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Callbacks")
            .field("on_success", &self.on_success.is_some())
            .field("on_error", &self.on_error.is_some())
            .finish()
    }
}

impl<T> Callbacks<T> {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn on_success(mut self, handler: impl Fn(&T) + Send + Sync + 'static) -> Self {
        self.on_success = Some(Arc::new(handler));
        self
    }

    pub fn on_error(mut self, handler: impl Fn(&QueryError) + Send + Sync + 'static) -> Self {
        self.on_error = Some(Arc::new(handler));
        self
    }
}

/// Run the first success handler found in `chain`, if any
pub(crate) fn handle_success<T>(chain: &[&Callbacks<T>], response: &T) {
    if let Some(handler) = chain.iter().find_map(|c| c.on_success.as_ref()) {
        handler(response);
    }
}

/// Run the first error handler found in `chain`, or log the error
pub(crate) fn handle_error<T>(chain: &[&Callbacks<T>], err: &QueryError, operation: &str) {
    match chain.iter().find_map(|c| c.on_error.as_ref()) {
        Some(handler) => handler(err),
        None => error!("❌ [{}] Unhandled error: {}", operation, err),
    }
}
