//! ARM payload models.
//!
//! All managed resources share the [`Resource`] envelope; the per-kind body lives in
//! `properties`. Field names serialize in ARM's camelCase. `provisioningState` is
//! read-only and never sent back.

use super::ResourceKind;
use crate::error::{Error, Result};
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};

/// ARM provisioning state reported under `properties.provisioningState`.
#[derive(Serialize, Deserialize, Debug, Clone, PartialEq, Eq)]
pub enum ProvisioningState {
    Succeeded,
    Creating,
    Updating,
    Deleting,
    Failed,
    Canceled,
    #[serde(other)]
    Other,
}

impl ProvisioningState {
    pub fn is_terminal(&self) -> bool {
        matches!(self, Self::Succeeded | Self::Failed | Self::Canceled)
    }
}

/// Reference to another resource by id.
#[derive(Serialize, Deserialize, Debug, Clone, PartialEq, Eq, Default)]
pub struct SubResource {
    pub id: String,
}

impl SubResource {
    pub fn new(id: &str) -> Self {
        SubResource { id: id.to_string() }
    }
}

/// Property bag of one resource kind.
pub trait ResourceProperties:
    Serialize + DeserializeOwned + Default + Clone + Send + Sync + 'static
{
    const KIND: ResourceKind;

    fn provisioning_state(&self) -> Option<&ProvisioningState>;
}

/// ARM resource envelope.
#[derive(Serialize, Deserialize, Debug, Clone, PartialEq, Default)]
pub struct Resource<P> {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub id: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub location: Option<String>,
    #[serde(default)]
    pub properties: P,
}

impl<P: ResourceProperties> Resource<P> {
    /// Build a request body.
    pub fn new(location: Option<&str>, properties: P) -> Self {
        Resource {
            id: None,
            name: None,
            location: location.map(str::to_string),
            properties,
        }
    }

    pub fn kind(&self) -> ResourceKind {
        P::KIND
    }

    pub fn provisioning_state(&self) -> Option<&ProvisioningState> {
        self.properties.provisioning_state()
    }

    /// The resource id, which ARM always returns for a provisioned resource.
    pub fn require_id(&self) -> Result<&str> {
        self.id.as_deref().ok_or_else(|| {
            Error::operation_failed(
                P::KIND,
                self.name.as_deref().unwrap_or("<unnamed>"),
                "response did not include a resource id",
            )
        })
    }
}

#[derive(Serialize, Deserialize, Debug, Clone, PartialEq, Default)]
#[serde(rename_all = "camelCase")]
pub struct VirtualWanProperties {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub allow_branch_to_branch_traffic: Option<bool>,
    #[serde(default, skip_serializing)]
    pub provisioning_state: Option<ProvisioningState>,
}

#[derive(Serialize, Deserialize, Debug, Clone, PartialEq, Default)]
#[serde(rename_all = "camelCase")]
pub struct VirtualHubProperties {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub address_prefix: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub virtual_wan: Option<SubResource>,
    #[serde(default, skip_serializing)]
    pub provisioning_state: Option<ProvisioningState>,
}

#[derive(Serialize, Deserialize, Debug, Clone, PartialEq, Default)]
#[serde(rename_all = "camelCase")]
pub struct DeviceProperties {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub device_vendor: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub device_model: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub link_speed_in_mbps: Option<i32>,
}

#[derive(Serialize, Deserialize, Debug, Clone, PartialEq, Default)]
#[serde(rename_all = "camelCase")]
pub struct AddressSpace {
    #[serde(default)]
    pub address_prefixes: Vec<String>,
}

#[derive(Serialize, Deserialize, Debug, Clone, PartialEq, Default)]
#[serde(rename_all = "camelCase")]
pub struct BgpSettings {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub asn: Option<i64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub bgp_peering_address: Option<String>,
}

#[derive(Serialize, Deserialize, Debug, Clone, PartialEq, Default)]
#[serde(rename_all = "camelCase")]
pub struct VpnSiteProperties {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub virtual_wan: Option<SubResource>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub device_properties: Option<DeviceProperties>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub ip_address: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub address_space: Option<AddressSpace>,
    /// Omitted entirely when BGP is disabled on the site.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub bgp_properties: Option<BgpSettings>,
    #[serde(default, skip_serializing)]
    pub provisioning_state: Option<ProvisioningState>,
}

#[derive(Serialize, Deserialize, Debug, Clone, PartialEq, Default)]
#[serde(rename_all = "camelCase")]
pub struct VpnConnectionProperties {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub shared_key: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub remote_vpn_site: Option<SubResource>,
    #[serde(default, skip_serializing)]
    pub provisioning_state: Option<ProvisioningState>,
}

/// Gateway connection to one VPN site. A child of the gateway, not a top-level resource.
#[derive(Serialize, Deserialize, Debug, Clone, PartialEq, Default)]
pub struct VpnConnection {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub id: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,
    #[serde(default)]
    pub properties: VpnConnectionProperties,
}

impl VpnConnection {
    pub fn new(name: &str, shared_key: &str, remote_site_id: &str) -> Self {
        VpnConnection {
            id: None,
            name: Some(name.to_string()),
            properties: VpnConnectionProperties {
                shared_key: Some(shared_key.to_string()),
                remote_vpn_site: Some(SubResource::new(remote_site_id)),
                provisioning_state: None,
            },
        }
    }
}

#[derive(Serialize, Deserialize, Debug, Clone, PartialEq, Default)]
#[serde(rename_all = "camelCase")]
pub struct VpnGatewayProperties {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub virtual_hub: Option<SubResource>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub bgp_settings: Option<BgpSettings>,
    /// Always sent: an empty list clears every connection.
    #[serde(default)]
    pub connections: Vec<VpnConnection>,
    #[serde(default, skip_serializing)]
    pub provisioning_state: Option<ProvisioningState>,
}

#[derive(Serialize, Deserialize, Debug, Clone, PartialEq, Default)]
#[serde(rename_all = "camelCase")]
pub struct ResourceGroupProperties {
    #[serde(default, skip_serializing)]
    pub provisioning_state: Option<ProvisioningState>,
}

#[derive(Serialize, Deserialize, Debug, Clone, PartialEq, Default)]
#[serde(rename_all = "camelCase")]
pub struct StorageContainerProperties {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub public_access: Option<String>,
    #[serde(default, skip_serializing)]
    pub provisioning_state: Option<ProvisioningState>,
}

macro_rules! resource_properties {
    ($($props:ty => $kind:ident),* $(,)?) => {
        $(
            impl ResourceProperties for $props {
                const KIND: ResourceKind = ResourceKind::$kind;

                fn provisioning_state(&self) -> Option<&ProvisioningState> {
                    self.provisioning_state.as_ref()
                }
            }
        )*
    };
}

resource_properties!(
    VirtualWanProperties => VirtualWan,
    VirtualHubProperties => VirtualHub,
    VpnSiteProperties => VpnSite,
    VpnGatewayProperties => VpnGateway,
    ResourceGroupProperties => ResourceGroup,
    StorageContainerProperties => StorageContainer,
);

pub type VirtualWan = Resource<VirtualWanProperties>;
pub type VirtualHub = Resource<VirtualHubProperties>;
pub type VpnSite = Resource<VpnSiteProperties>;
pub type VpnGateway = Resource<VpnGatewayProperties>;
pub type ResourceGroup = Resource<ResourceGroupProperties>;
pub type StorageContainer = Resource<StorageContainerProperties>;
