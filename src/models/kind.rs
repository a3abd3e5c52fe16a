//! ARM resource kinds and their REST paths.

use crate::error::{Error, Result};
use serde::{Deserialize, Serialize};
use std::fmt;

/// API version used for Microsoft.Network resources.
pub const NETWORK_API_VERSION: &str = "2023-09-01";
/// API version used for resource groups.
pub const RESOURCES_API_VERSION: &str = "2021-04-01";
/// API version used for storage containers.
pub const STORAGE_API_VERSION: &str = "2023-01-01";

/// Resource types managed by this crate.
///
/// Ordering follows the dependency chain, parents first.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub enum ResourceKind {
    ResourceGroup,
    StorageContainer,
    VirtualWan,
    VirtualHub,
    VpnSite,
    VpnGateway,
}

impl ResourceKind {
    /// ARM provider type, e.g. `Microsoft.Network/virtualWans`.
    pub fn resource_type(&self) -> &'static str {
        match self {
            Self::ResourceGroup => "Microsoft.Resources/resourceGroups",
            Self::StorageContainer => "Microsoft.Storage/storageAccounts/blobServices/containers",
            Self::VirtualWan => "Microsoft.Network/virtualWans",
            Self::VirtualHub => "Microsoft.Network/virtualHubs",
            Self::VpnSite => "Microsoft.Network/vpnSites",
            Self::VpnGateway => "Microsoft.Network/vpnGateways",
        }
    }

    /// The `api-version` query parameter for this kind.
    pub fn api_version(&self) -> &'static str {
        match self {
            Self::ResourceGroup => RESOURCES_API_VERSION,
            Self::StorageContainer => STORAGE_API_VERSION,
            _ => NETWORK_API_VERSION,
        }
    }

    /// Map an ARM provider type back to a kind (case-insensitive).
    pub fn from_resource_type(resource_type: &str) -> Option<ResourceKind> {
        [
            Self::ResourceGroup,
            Self::StorageContainer,
            Self::VirtualWan,
            Self::VirtualHub,
            Self::VpnSite,
            Self::VpnGateway,
        ]
        .into_iter()
        .find(|k| k.resource_type().eq_ignore_ascii_case(resource_type))
    }

    /// Build the ARM resource path (the resource id) for `name`.
    ///
    /// # Arguments
    /// * `subscription_id` - Subscription owning the resource
    /// * `resource_group` - Resource group (ignored for [`ResourceKind::ResourceGroup`])
    /// * `storage_account` - Required for [`ResourceKind::StorageContainer`]
    /// * `name` - Resource name
    ///
    /// # Returns
    /// * `Ok(String)` - Path starting with `/subscriptions/`
    /// * `Err` - If a storage container is requested without a storage account
    pub fn resource_path(
        &self,
        subscription_id: &str,
        resource_group: &str,
        storage_account: Option<&str>,
        name: &str,
    ) -> Result<String> {
        match self {
            Self::ResourceGroup => Ok(format!(
                "/subscriptions/{subscription_id}/resourceGroups/{name}"
            )),
            Self::StorageContainer => {
                let account = storage_account.ok_or_else(|| {
                    Error::Configuration(
                        "storage account is required for storage container operations".into(),
                    )
                })?;
                Ok(format!(
                    "/subscriptions/{subscription_id}/resourceGroups/{resource_group}/providers/Microsoft.Storage/storageAccounts/{account}/blobServices/default/containers/{name}"
                ))
            }
            _ => Ok(format!(
                "/subscriptions/{subscription_id}/resourceGroups/{resource_group}/providers/{rtype}/{name}",
                rtype = self.resource_type()
            )),
        }
    }
}

impl fmt::Display for ResourceKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            Self::ResourceGroup => "ResourceGroup",
            Self::StorageContainer => "StorageContainer",
            Self::VirtualWan => "VirtualWan",
            Self::VirtualHub => "VirtualHub",
            Self::VpnSite => "VpnSite",
            Self::VpnGateway => "VpnGateway",
        };
        write!(f, "{s}")
    }
}
