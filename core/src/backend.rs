use std::future::Future;

use scriptdeck_client::{ApiError, ConsoleApi, HistoryQuery};
use scriptdeck_types::{LogRecord, ScriptId};
use serde_json::Value;

/// The request/response operations the console drives.
///
/// Implemented by [`ConsoleApi`]; tests substitute an in-memory fake.
pub trait Backend {
    fn fetch_config(&self) -> impl Future<Output = Result<Value, ApiError>>;

    /// The newest `limit` persisted records, oldest first.
    fn fetch_history(&self, limit: usize)
    -> impl Future<Output = Result<Vec<LogRecord>, ApiError>>;

    fn clear_history(&self) -> impl Future<Output = Result<(), ApiError>>;

    fn start_script(&self, id: &ScriptId) -> impl Future<Output = Result<(), ApiError>>;

    fn stop_script(&self, id: &ScriptId) -> impl Future<Output = Result<(), ApiError>>;
}

impl Backend for ConsoleApi {
    async fn fetch_config(&self) -> Result<Value, ApiError> {
        self.config().await
    }

    async fn fetch_history(&self, limit: usize) -> Result<Vec<LogRecord>, ApiError> {
        self.history(&HistoryQuery::latest(limit)).await
    }

    async fn clear_history(&self) -> Result<(), ApiError> {
        self.clear_logs().await
    }

    async fn start_script(&self, id: &ScriptId) -> Result<(), ApiError> {
        ConsoleApi::start_script(self, id).await
    }

    async fn stop_script(&self, id: &ScriptId) -> Result<(), ApiError> {
        ConsoleApi::stop_script(self, id).await
    }
}
