use crate::error::SyncError;
use crate::sync::types::Service;

/// Supplies bearer tokens for a service. Token internals stay opaque.
#[cfg_attr(test, mockall::automock)]
#[async_trait::async_trait]
pub trait TokenProvider: Send + Sync {
    async fn valid_token(&self, service: Service) -> Result<String, SyncError>;
}
