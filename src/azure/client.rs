//! Typed per-kind clients.
//!
//! A [`ResourceClient`] is a stateless facade over a [`ResourceManager`]: it turns
//! typed resources into request bodies and responses back into typed resources.
//! Nothing is cached; every `get` goes to the remote side.

use super::{wait_for_completion, ResourceManager};
use crate::config::PollSettings;
use crate::error::{decode, Error, Result};
use crate::models::{
    LongRunningOperation, Resource, ResourceGroupProperties, ResourceProperties,
    StorageContainerProperties, VirtualHubProperties, VirtualWanProperties, VpnGatewayProperties,
    VpnSiteProperties,
};
use std::marker::PhantomData;
use std::sync::Arc;

/// Client for one resource kind, selected by its property type `P`.
pub struct ResourceClient<P: ResourceProperties> {
    manager: Arc<dyn ResourceManager>,
    poll: PollSettings,
    _kind: PhantomData<fn() -> P>,
}

pub type VirtualWansClient = ResourceClient<VirtualWanProperties>;
pub type VirtualHubsClient = ResourceClient<VirtualHubProperties>;
pub type VpnSitesClient = ResourceClient<VpnSiteProperties>;
pub type VpnGatewaysClient = ResourceClient<VpnGatewayProperties>;
pub type ResourceGroupsClient = ResourceClient<ResourceGroupProperties>;
pub type StorageContainersClient = ResourceClient<StorageContainerProperties>;

impl<P: ResourceProperties> ResourceClient<P> {
    pub fn new(manager: Arc<dyn ResourceManager>, poll: PollSettings) -> Self {
        ResourceClient {
            manager,
            poll,
            _kind: PhantomData,
        }
    }

    /// Read the resource; `None` if it does not exist.
    pub async fn get(&self, name: &str) -> Result<Option<Resource<P>>> {
        let found = self
            .manager
            .get(P::KIND, name)
            .await
            .map_err(|e| e.for_resource(P::KIND, name))?;
        match found {
            Some(value) => Ok(Some(
                decode(value).map_err(|e| e.for_resource(P::KIND, name))?,
            )),
            None => Ok(None),
        }
    }

    /// Submit a create-or-update. Does not wait.
    pub async fn create_or_update(
        &self,
        name: &str,
        resource: &Resource<P>,
    ) -> Result<LongRunningOperation> {
        let body = serde_json::to_value(resource)
            .map_err(|e| Error::from(e).for_resource(P::KIND, name))?;
        self.manager
            .begin_create_or_update(P::KIND, name, body)
            .await
            .map_err(|e| e.for_resource(P::KIND, name))
    }

    /// Submit a delete. Does not wait.
    pub async fn delete(&self, name: &str) -> Result<LongRunningOperation> {
        self.manager
            .begin_delete(P::KIND, name)
            .await
            .map_err(|e| e.for_resource(P::KIND, name))
    }

    /// Wait for a create-or-update to finish and return the resource as stored remotely.
    pub async fn await_completion(
        &self,
        mut operation: LongRunningOperation,
    ) -> Result<Resource<P>> {
        wait_for_completion(self.manager.as_ref(), &mut operation, &self.poll)
            .await
            .map_err(|e| e.for_resource(P::KIND, &operation.resource_name))?;
        self.get(&operation.resource_name).await?.ok_or_else(|| {
            Error::operation_failed(
                P::KIND,
                &operation.resource_name,
                "resource not found after the operation succeeded",
            )
        })
    }

    /// Wait for a delete to finish.
    pub async fn await_deletion(&self, mut operation: LongRunningOperation) -> Result<()> {
        wait_for_completion(self.manager.as_ref(), &mut operation, &self.poll)
            .await
            .map_err(|e| e.for_resource(P::KIND, &operation.resource_name))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::azure::{InMemoryResourceManager, StaticTokenAuthorizer};
    use crate::config::ResourceIdentity;
    use crate::models::{OperationState, ProvisioningState, VirtualWan};
    use std::time::Duration;

    fn clients() -> (Arc<InMemoryResourceManager>, VirtualWansClient) {
        let identity = ResourceIdentity::new(
            "sub",
            "rg",
            "westeurope",
            Arc::new(StaticTokenAuthorizer::new("t")),
        )
        .unwrap();
        let manager = Arc::new(InMemoryResourceManager::new(identity).with_pending_polls(2));
        let poll = PollSettings {
            interval: Duration::from_millis(1),
            timeout: Duration::from_secs(5),
        };
        let client = VirtualWansClient::new(manager.clone(), poll);
        (manager, client)
    }

    #[tokio::test]
    async fn test_get_missing_is_none() {
        let (_manager, client) = clients();
        assert!(client.get("nope").await.unwrap().is_none());
    }

    #[tokio::test]
    async fn test_create_then_await() {
        let (_manager, client) = clients();
        let request = VirtualWan::new(
            Some("westeurope"),
            VirtualWanProperties {
                allow_branch_to_branch_traffic: Some(true),
                ..Default::default()
            },
        );
        let op = client.create_or_update("vwan1", &request).await.unwrap();
        assert_eq!(op.state, OperationState::Pending);

        let wan = client.await_completion(op).await.unwrap();
        assert_eq!(wan.name.as_deref(), Some("vwan1"));
        assert_eq!(wan.provisioning_state(), Some(&ProvisioningState::Succeeded));
        assert_eq!(wan.properties.allow_branch_to_branch_traffic, Some(true));
        assert!(wan
            .require_id()
            .unwrap()
            .ends_with("/providers/Microsoft.Network/virtualWans/vwan1"));
    }

    #[tokio::test]
    async fn test_delete_then_await() {
        let (_manager, client) = clients();
        let request = VirtualWan::new(Some("westeurope"), VirtualWanProperties::default());
        let op = client.create_or_update("vwan1", &request).await.unwrap();
        client.await_completion(op).await.unwrap();

        let op = client.delete("vwan1").await.unwrap();
        client.await_deletion(op).await.unwrap();
        assert!(client.get("vwan1").await.unwrap().is_none());
    }
}
