//! Store calls moved off the async runtime.
//!
//! Store methods lock the shared connection and run SQLite synchronously, so
//! handlers await them on tokio's blocking pool instead of a runtime worker.

use bookchat_core::error::BookchatError;

/// Run a store call on a blocking thread.
pub(crate) async fn run_blocking<F, T>(f: F) -> Result<T, BookchatError>
where
    F: FnOnce() -> Result<T, BookchatError> + Send + 'static,
    T: Send + 'static,
{
    tokio::task::spawn_blocking(f)
        .await
        .map_err(|e| BookchatError::Storage(format!("Store task panicked: {}", e)))?
}
