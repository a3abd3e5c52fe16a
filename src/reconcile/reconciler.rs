//! Topology reconciliation.
//!
//! Brings the declared chain `VirtualWan -> VirtualHub -> VpnSite -> VpnGateway`
//! into existence in dependency order. Every step is a create-or-update awaited
//! to completion before the next one is submitted, so existing resources are
//! updated in place and a rerun converges to the same ids.

use super::requests::{
    site_connection, virtual_hub_request, virtual_wan_request, vpn_gateway_request,
    vpn_site_request,
};
use super::state::{ResourceState, StateLedger};
use crate::azure::{
    ResourceClient, ResourceGroupsClient, ResourceManager, StorageContainersClient,
    VirtualHubsClient, VirtualWansClient, VpnGatewaysClient, VpnSitesClient,
};
use crate::config::{PollSettings, ProvisioningDefaults};
use crate::error::{Error, Result};
use crate::models::{
    NetworkSiteConfig, Resource, ResourceGroup, ResourceGroupProperties, ResourceProperties,
    StorageContainer, StorageContainerProperties, Topology, VpnConnection,
};
use colored::Colorize;
use std::sync::Arc;

/// Ids of the resources produced by [`Reconciler::apply`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TopologyReport {
    pub virtual_wan_id: String,
    pub virtual_hub_id: String,
    pub vpn_site_id: Option<String>,
    pub vpn_gateway_id: String,
}

/// Single writer over one identity's topology.
pub struct Reconciler {
    manager: Arc<dyn ResourceManager>,
    defaults: ProvisioningDefaults,
    resource_groups: ResourceGroupsClient,
    containers: StorageContainersClient,
    wans: VirtualWansClient,
    hubs: VirtualHubsClient,
    sites: VpnSitesClient,
    gateways: VpnGatewaysClient,
    ledger: StateLedger,
}

/// Submit, await and record one create-or-update.
async fn converge<P: ResourceProperties>(
    ledger: &mut StateLedger,
    client: &ResourceClient<P>,
    name: &str,
    request: &Resource<P>,
) -> Result<Resource<P>> {
    let kind = P::KIND;
    log::info!("ensure {kind} {}", name.on_blue());
    ledger.transition(kind, name, ResourceState::Creating);

    let outcome = match client.create_or_update(name, request).await {
        Ok(operation) => client.await_completion(operation).await,
        Err(e) => Err(e),
    };
    match outcome {
        Ok(resource) => {
            ledger.transition(kind, name, ResourceState::Present);
            Ok(resource)
        }
        Err(e) => {
            log::warn!("{kind} {} failed: {e}", name.on_blue());
            ledger.transition(kind, name, ResourceState::Error);
            Err(e)
        }
    }
}

/// Delete one resource and wait for it to go away. `Ok(false)` if it was already absent.
async fn remove<P: ResourceProperties>(
    ledger: &mut StateLedger,
    client: &ResourceClient<P>,
    name: &str,
) -> Result<bool> {
    let kind = P::KIND;
    if client.get(name).await?.is_none() {
        log::debug!("{kind} {name} already absent");
        ledger.transition(kind, name, ResourceState::Absent);
        return Ok(false);
    }

    log::info!("delete {kind} {}", name.on_blue());
    ledger.transition(kind, name, ResourceState::Deleting);
    let outcome = match client.delete(name).await {
        Ok(operation) => client.await_deletion(operation).await,
        Err(e) => Err(e),
    };
    match outcome {
        Ok(()) => {
            ledger.transition(kind, name, ResourceState::Absent);
            Ok(true)
        }
        Err(e) => {
            ledger.transition(kind, name, ResourceState::Error);
            Err(e)
        }
    }
}

impl Reconciler {
    /// # Arguments
    /// * `manager` - Backend bound to the target subscription and resource group
    /// * `defaults` - Values for request fields the site file does not carry
    /// * `poll` - How long-running operations are awaited
    pub fn new(
        manager: Arc<dyn ResourceManager>,
        defaults: ProvisioningDefaults,
        poll: PollSettings,
    ) -> Self {
        Reconciler {
            resource_groups: ResourceClient::new(manager.clone(), poll),
            containers: ResourceClient::new(manager.clone(), poll),
            wans: ResourceClient::new(manager.clone(), poll),
            hubs: ResourceClient::new(manager.clone(), poll),
            sites: ResourceClient::new(manager.clone(), poll),
            gateways: ResourceClient::new(manager.clone(), poll),
            manager,
            defaults,
            ledger: StateLedger::new(),
        }
    }

    pub fn ledger(&self) -> &StateLedger {
        &self.ledger
    }

    pub fn defaults(&self) -> &ProvisioningDefaults {
        &self.defaults
    }

    /// Create or update the identity's resource group in its location.
    pub async fn ensure_resource_group(&mut self) -> Result<String> {
        let identity = self.manager.identity();
        let name = identity.resource_group_name().to_string();
        let request = ResourceGroup::new(
            Some(identity.resource_group_location()),
            ResourceGroupProperties::default(),
        );
        let group = converge(&mut self.ledger, &self.resource_groups, &name, &request).await?;
        Ok(group.require_id()?.to_string())
    }

    /// Create or update a private blob container in the identity's storage account.
    pub async fn ensure_storage_container(&mut self, name: &str) -> Result<String> {
        if self.manager.identity().storage_account().is_none() {
            return Err(Error::Configuration(
                "a storage account is required to create a container (set AZURE_STORAGE_ACCOUNT)"
                    .into(),
            ));
        }
        let request = StorageContainer::new(
            None,
            StorageContainerProperties {
                public_access: Some("None".to_string()),
                ..Default::default()
            },
        );
        let container = converge(&mut self.ledger, &self.containers, name, &request).await?;
        Ok(container.require_id()?.to_string())
    }

    /// Create or update the virtual WAN and return its id.
    pub async fn ensure_vwan(&mut self, name: &str, location: &str) -> Result<String> {
        let request = virtual_wan_request(location);
        let wan = converge(&mut self.ledger, &self.wans, name, &request).await?;
        Ok(wan.require_id()?.to_string())
    }

    /// Create or update a hub inside `vwan_id`. Call only with the id returned
    /// by [`Reconciler::ensure_vwan`].
    pub async fn ensure_vhub(
        &mut self,
        name: &str,
        vwan_id: &str,
        address_prefix: &str,
        location: &str,
    ) -> Result<String> {
        let request = virtual_hub_request(vwan_id, address_prefix, location);
        let hub = converge(&mut self.ledger, &self.hubs, name, &request).await?;
        Ok(hub.require_id()?.to_string())
    }

    /// Create or update the VPN site for `site` inside `vwan_id`.
    pub async fn ensure_vpn_site(
        &mut self,
        name: &str,
        vwan_id: &str,
        location: &str,
        site: &NetworkSiteConfig,
    ) -> Result<String> {
        let request = vpn_site_request(vwan_id, location, site, &self.defaults);
        let vpn_site = converge(&mut self.ledger, &self.sites, name, &request).await?;
        Ok(vpn_site.require_id()?.to_string())
    }

    /// Create or update the hub's VPN gateway.
    ///
    /// With a non-empty `site_id` the gateway gets exactly one connection to that
    /// site; with `None` or an empty id it gets none.
    pub async fn ensure_vpn_gateway(
        &mut self,
        name: &str,
        vhub_id: &str,
        location: &str,
        site_id: Option<&str>,
        site: &NetworkSiteConfig,
    ) -> Result<String> {
        let connections = match site_id.filter(|id| !id.is_empty()) {
            Some(id) => vec![site_connection(site, id, &self.defaults)?],
            None => Vec::new(),
        };
        self.update_vpn_gateway_connections(name, vhub_id, location, connections)
            .await
    }

    /// Replace the gateway's full connection list with `connections`.
    pub async fn update_vpn_gateway_connections(
        &mut self,
        name: &str,
        vhub_id: &str,
        location: &str,
        connections: Vec<VpnConnection>,
    ) -> Result<String> {
        log::debug!("gateway {name}: {} connection(s)", connections.len());
        let request = vpn_gateway_request(vhub_id, location, connections, &self.defaults);
        let gateway = converge(&mut self.ledger, &self.gateways, name, &request).await?;
        Ok(gateway.require_id()?.to_string())
    }

    /// Run the whole chain for `topology`.
    ///
    /// The location defaults to the identity's resource group location. A missing
    /// shared key is reported before anything is submitted.
    pub async fn apply(
        &mut self,
        topology: &Topology,
        site: &NetworkSiteConfig,
    ) -> Result<TopologyReport> {
        if topology.vpn_site.is_some() {
            self.defaults.require_shared_key()?;
        }
        let location = topology
            .location
            .clone()
            .unwrap_or_else(|| self.manager.identity().resource_group_location().to_string());

        let virtual_wan_id = self
            .ensure_vwan(&topology.virtual_wan.name, &location)
            .await?;
        let virtual_hub_id = self
            .ensure_vhub(
                &topology.virtual_hub.name,
                &virtual_wan_id,
                &topology.virtual_hub.address_prefix,
                &location,
            )
            .await?;
        let vpn_site_id = match &topology.vpn_site {
            Some(vpn_site) => Some(
                self.ensure_vpn_site(&vpn_site.name, &virtual_wan_id, &location, site)
                    .await?,
            ),
            None => None,
        };
        let vpn_gateway_id = self
            .ensure_vpn_gateway(
                &topology.vpn_gateway.name,
                &virtual_hub_id,
                &location,
                vpn_site_id.as_deref(),
                site,
            )
            .await?;

        log::info!("topology {} ready", topology.virtual_wan.name.on_blue());
        Ok(TopologyReport {
            virtual_wan_id,
            virtual_hub_id,
            vpn_site_id,
            vpn_gateway_id,
        })
    }

    /// Delete the topology children first: gateway, site, hub, then the WAN.
    ///
    /// Each delete is awaited before its parent is touched. Resources that do not
    /// exist are skipped. Returns the number of resources deleted.
    pub async fn teardown(&mut self, topology: &Topology) -> Result<usize> {
        let mut deleted = 0;
        if remove(&mut self.ledger, &self.gateways, &topology.vpn_gateway.name).await? {
            deleted += 1;
        }
        if let Some(vpn_site) = &topology.vpn_site {
            if remove(&mut self.ledger, &self.sites, &vpn_site.name).await? {
                deleted += 1;
            }
        }
        if remove(&mut self.ledger, &self.hubs, &topology.virtual_hub.name).await? {
            deleted += 1;
        }
        if remove(&mut self.ledger, &self.wans, &topology.virtual_wan.name).await? {
            deleted += 1;
        }
        log::info!("teardown removed {deleted} resource(s)");
        Ok(deleted)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::azure::{
        ArmClient, Authorizer, InMemoryResourceManager, JournalEntry, StaticTokenAuthorizer,
    };
    use crate::config::ResourceIdentity;
    use crate::models::{OperationAction, OperationState, ResourceKind};
    use async_trait::async_trait;
    use std::time::Duration;

    struct RejectedSecret;

    #[async_trait]
    impl Authorizer for RejectedSecret {
        async fn bearer_token(&self, _scope: &str) -> Result<String> {
            Err(Error::Credential("AADSTS7000215 invalid client secret".into()))
        }
    }

    fn arm_reconciler(authorizer: Arc<dyn Authorizer>) -> Reconciler {
        let identity = ResourceIdentity::new("sub", "rg", "westeurope", authorizer).unwrap();
        let arm = ArmClient::with_endpoint(identity, "http://127.0.0.1:1");
        let poll = PollSettings {
            interval: Duration::from_millis(1),
            timeout: Duration::from_secs(5),
        };
        Reconciler::new(Arc::new(arm), ProvisioningDefaults::default(), poll)
    }

    fn setup(storage: bool) -> (Arc<InMemoryResourceManager>, Reconciler) {
        let mut identity = ResourceIdentity::new(
            "sub",
            "rg",
            "westeurope",
            Arc::new(StaticTokenAuthorizer::new("t")),
        )
        .unwrap();
        if storage {
            identity = identity.with_storage_account("acct");
        }
        let manager = Arc::new(InMemoryResourceManager::new(identity).with_pending_polls(2));
        let poll = PollSettings {
            interval: Duration::from_millis(1),
            timeout: Duration::from_secs(5),
        };
        let defaults = ProvisioningDefaults {
            shared_key: Some("k3y".into()),
            ..Default::default()
        };
        let reconciler = Reconciler::new(manager.clone(), defaults, poll);
        (manager, reconciler)
    }

    #[tokio::test]
    async fn test_ensure_vwan_idempotent() {
        let (manager, mut reconciler) = setup(false);
        let first = reconciler.ensure_vwan("vwan1", "westeurope").await.unwrap();
        let second = reconciler.ensure_vwan("vwan1", "westeurope").await.unwrap();
        assert_eq!(first, second);
        assert_eq!(manager.resource_count(), 1);
        assert_eq!(
            reconciler.ledger().state(ResourceKind::VirtualWan, "vwan1"),
            ResourceState::Present
        );
    }

    #[tokio::test]
    async fn test_failed_operation_marks_error() {
        let (manager, mut reconciler) = setup(false);
        manager.fail_operation(ResourceKind::VirtualWan, "vwan1");
        let err = reconciler.ensure_vwan("vwan1", "westeurope").await.unwrap_err();
        assert!(matches!(err, Error::OperationFailed { .. }));
        assert_eq!(
            reconciler.ledger().state(ResourceKind::VirtualWan, "vwan1"),
            ResourceState::Error
        );
    }

    #[tokio::test]
    async fn test_credential_failure_names_resource() {
        let mut reconciler = arm_reconciler(Arc::new(RejectedSecret));
        let err = reconciler
            .ensure_vhub("hub1", "vwan-id", "10.0.0.0/24", "westeurope")
            .await
            .unwrap_err();
        match &err {
            Error::Submission { kind, name, message } => {
                assert_eq!(*kind, ResourceKind::VirtualHub);
                assert_eq!(name, "hub1");
                assert!(message.contains("AADSTS7000215"), "{message}");
            }
            other => panic!("unexpected error {other:?}"),
        }
        assert_eq!(
            reconciler.ledger().state(ResourceKind::VirtualHub, "hub1"),
            ResourceState::Error
        );
    }

    #[tokio::test]
    async fn test_unreachable_endpoint_names_resource() {
        let mut reconciler = arm_reconciler(Arc::new(StaticTokenAuthorizer::new("t")));
        let err = reconciler
            .ensure_vhub("hub1", "vwan-id", "10.0.0.0/24", "westeurope")
            .await
            .unwrap_err();
        assert!(matches!(
            err,
            Error::Submission { kind: ResourceKind::VirtualHub, ref name, .. } if name == "hub1"
        ));

        let topology = Topology::from_yaml_str(
            "virtual_wan: {name: vwan1}\n\
             virtual_hub: {name: hub1, address_prefix: 10.0.0.0/24}\n\
             vpn_gateway: {name: gw1}\n",
        )
        .unwrap();
        let err = reconciler.teardown(&topology).await.unwrap_err();
        assert!(matches!(
            err,
            Error::Submission { kind: ResourceKind::VpnGateway, ref name, .. } if name == "gw1"
        ));
    }

    #[tokio::test]
    async fn test_ensure_resource_group() {
        let (manager, mut reconciler) = setup(false);
        let id = reconciler.ensure_resource_group().await.unwrap();
        assert_eq!(id, "/subscriptions/sub/resourceGroups/rg");
        let body = manager.resource(ResourceKind::ResourceGroup, "rg").unwrap();
        assert_eq!(body["location"], "westeurope");
    }

    #[tokio::test]
    async fn test_storage_container_needs_account() {
        let (_manager, mut reconciler) = setup(false);
        let err = reconciler
            .ensure_storage_container("vpnconfig")
            .await
            .unwrap_err();
        assert!(matches!(err, Error::Configuration(_)));

        let (_manager, mut reconciler) = setup(true);
        let id = reconciler.ensure_storage_container("vpnconfig").await.unwrap();
        assert!(id.ends_with("/storageAccounts/acct/blobServices/default/containers/vpnconfig"));
    }

    #[tokio::test]
    async fn test_teardown_skips_absent() {
        let (manager, mut reconciler) = setup(false);
        reconciler.ensure_vwan("vwan1", "westeurope").await.unwrap();
        let topology = Topology::from_yaml_str(
            "virtual_wan: {name: vwan1}\n\
             virtual_hub: {name: hub1, address_prefix: 10.0.0.0/24}\n\
             vpn_gateway: {name: gw1}\n",
        )
        .unwrap();

        assert_eq!(reconciler.teardown(&topology).await.unwrap(), 1);
        assert_eq!(manager.resource_count(), 0);
        let deletes: Vec<_> = manager
            .journal()
            .into_iter()
            .filter_map(|entry| match entry {
                JournalEntry::Finished {
                    action: OperationAction::Delete,
                    kind,
                    state: OperationState::Succeeded,
                    ..
                } => Some(kind),
                _ => None,
            })
            .collect();
        assert_eq!(deletes, vec![ResourceKind::VirtualWan]);
    }
}
