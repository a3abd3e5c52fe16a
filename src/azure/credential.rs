//! Bearer tokens for the management API.

use crate::error::Result;
use async_trait::async_trait;
use azure_core::auth::TokenCredential;
use azure_identity::DefaultAzureCredentialBuilder;
use std::sync::Arc;

/// Scope for Azure Resource Manager requests.
pub const MANAGEMENT_SCOPE: &str = "https://management.azure.com/.default";

/// Source of bearer tokens for outgoing requests.
#[async_trait]
pub trait Authorizer: Send + Sync {
    async fn bearer_token(&self, scope: &str) -> Result<String>;
}

/// [`Authorizer`] backed by an `azure_identity` credential.
pub struct CredentialAuthorizer {
    credential: Arc<dyn TokenCredential>,
}

impl CredentialAuthorizer {
    pub fn new(credential: Arc<dyn TokenCredential>) -> Self {
        CredentialAuthorizer { credential }
    }

    /// Default credential chain: environment service principal, managed identity,
    /// then `az login`. No token is requested until the first call.
    pub fn from_environment() -> Self {
        let credential = DefaultAzureCredentialBuilder::new().build();
        Self::new(Arc::new(credential))
    }
}

#[async_trait]
impl Authorizer for CredentialAuthorizer {
    async fn bearer_token(&self, scope: &str) -> Result<String> {
        log::trace!("requesting token for {scope}");
        let token = self.credential.get_token(&[scope]).await?;
        Ok(token.token.secret().to_string())
    }
}

/// Fixed token. Used for dry runs and against mock servers.
pub struct StaticTokenAuthorizer {
    token: String,
}

impl StaticTokenAuthorizer {
    pub fn new(token: &str) -> Self {
        StaticTokenAuthorizer {
            token: token.to_string(),
        }
    }
}

#[async_trait]
impl Authorizer for StaticTokenAuthorizer {
    async fn bearer_token(&self, _scope: &str) -> Result<String> {
        Ok(self.token.clone())
    }
}
