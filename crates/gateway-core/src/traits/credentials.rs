//! Credential provider trait (port)
//!
//! The session engine asks for a credential whenever it has to authenticate,
//! so providers may rotate tokens between connections.

use async_trait::async_trait;

use crate::value_objects::Credential;

#[async_trait]
pub trait CredentialProvider: Send + Sync {
    /// Current credential, or `None` if none is available
    async fn credential(&self) -> Option<Credential>;
}

/// Provider that always returns the same credential
#[derive(Debug, Clone)]
pub struct StaticCredentialProvider {
    credential: Credential,
}

impl StaticCredentialProvider {
    #[must_use]
    pub fn new(credential: Credential) -> Self {
        Self { credential }
    }
}

#[async_trait]
impl CredentialProvider for StaticCredentialProvider {
    async fn credential(&self) -> Option<Credential> {
        self.credential.is_usable().then(|| self.credential.clone())
    }
}
