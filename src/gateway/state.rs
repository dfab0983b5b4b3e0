use std::sync::Arc;
use std::time::Duration;

use super::types::ApiError;
use crate::ledger::Store;
use crate::user_auth::UserAuthService;

/// Gateway shared state
#[derive(Clone)]
pub struct AppState {
    pub store: Arc<dyn Store>,
    pub user_auth: Arc<UserAuthService>,
    /// Upper bound for one request, including its ledger transaction
    pub request_timeout: Duration,
}

impl AppState {
    pub fn new(
        store: Arc<dyn Store>,
        user_auth: Arc<UserAuthService>,
        request_timeout: Duration,
    ) -> Self {
        Self {
            store,
            user_auth,
            request_timeout,
        }
    }

    /// Run `fut` under the request timeout. On expiry the future is dropped
    /// and any open transaction with it.
    pub async fn with_timeout<T, F>(&self, fut: F) -> Result<T, ApiError>
    where
        F: Future<Output = Result<T, ApiError>>,
    {
        match tokio::time::timeout(self.request_timeout, fut).await {
            Ok(result) => result,
            Err(_) => {
                tracing::warn!(
                    timeout_ms = self.request_timeout.as_millis() as u64,
                    "Request timed out"
                );
                Err(ApiError::timeout())
            }
        }
    }
}
