//! Backend seam for the management plane.

use crate::config::ResourceIdentity;
use crate::error::Result;
use crate::models::{LongRunningOperation, OperationState, ResourceKind};
use async_trait::async_trait;
use serde_json::Value;

/// Raw create/read/delete access to remote resources, scoped to one identity.
///
/// Implementations must keep create-or-update idempotent and report asynchronous
/// work through [`LongRunningOperation`]s that [`ResourceManager::poll`] can advance.
#[async_trait]
pub trait ResourceManager: Send + Sync {
    fn identity(&self) -> &ResourceIdentity;

    /// Read a resource. `Ok(None)` when it does not exist.
    async fn get(&self, kind: ResourceKind, name: &str) -> Result<Option<Value>>;

    /// Submit a create-or-update request without waiting for it.
    async fn begin_create_or_update(
        &self,
        kind: ResourceKind,
        name: &str,
        body: Value,
    ) -> Result<LongRunningOperation>;

    /// Submit a delete request without waiting for it.
    async fn begin_delete(&self, kind: ResourceKind, name: &str) -> Result<LongRunningOperation>;

    /// Submit a POST action on a resource, e.g. `vpnConfiguration` on a virtual WAN.
    async fn begin_action(
        &self,
        kind: ResourceKind,
        name: &str,
        action: &str,
        body: Value,
    ) -> Result<LongRunningOperation>;

    /// Read the current state of a submitted operation once.
    async fn poll(&self, operation: &LongRunningOperation) -> Result<OperationState>;
}
