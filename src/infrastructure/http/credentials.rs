//! Credential sources for the live channel handshake.

use async_trait::async_trait;
use parking_lot::RwLock;

use crate::domain::entities::Credential;
use crate::shared::error::AppError;

/// Supplies the bearer credential and refreshes it on demand.
#[async_trait]
pub trait CredentialProvider: Send + Sync {
    fn current(&self) -> Credential;

    /// Obtain a fresh credential after the current one was rejected.
    async fn refresh(&self) -> Result<Credential, AppError>;
}

/// A fixed credential. Refreshing hands back the same token.
pub struct StaticCredentials {
    credential: RwLock<Credential>,
}

impl StaticCredentials {
    pub fn new(token: impl Into<String>) -> Self {
        Self {
            credential: RwLock::new(Credential::new(token)),
        }
    }

    pub fn set(&self, token: impl Into<String>) {
        *self.credential.write() = Credential::new(token);
    }
}

#[async_trait]
impl CredentialProvider for StaticCredentials {
    fn current(&self) -> Credential {
        self.credential.read().clone()
    }

    async fn refresh(&self) -> Result<Credential, AppError> {
        Ok(self.current())
    }
}
