use std::collections::HashMap;

use crate::error::SyncError;
use crate::ports::auth::TokenProvider;
use crate::sync::types::Service;

/// Serves bearer tokens handed in on the command line or via the environment.
#[derive(Debug, Clone, Default)]
pub struct StaticTokenProvider {
    tokens: HashMap<Service, String>,
}

impl StaticTokenProvider {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a token; blank values are ignored.
    pub fn with_token(mut self, service: Service, token: Option<String>) -> Self {
        if let Some(token) = token.map(|t| t.trim().to_string()).filter(|t| !t.is_empty()) {
            self.tokens.insert(service, token);
        }
        self
    }

    pub fn has_token(&self, service: Service) -> bool {
        self.tokens.contains_key(&service)
    }
}

#[async_trait::async_trait]
impl TokenProvider for StaticTokenProvider {
    async fn valid_token(&self, service: Service) -> Result<String, SyncError> {
        self.tokens
            .get(&service)
            .cloned()
            .ok_or_else(|| SyncError::Auth {
                service,
                reason: "no access token configured".to_string(),
            })
    }
}
