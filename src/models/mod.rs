//! Domain models for the virtual WAN provisioner.
//!
//! This module contains the data structures shared by the clients and the reconciler:
//! - [`ResourceKind`] - The ARM resource types this crate manages
//! - [`Resource`] - ARM payload envelope and the per-kind property types
//! - [`LongRunningOperation`] - Handle for an asynchronous ARM request
//! - [`NetworkSiteConfig`] and [`Topology`] - Declarative inputs
//! - [`VpnConfiguration`] - The exported VPN configuration document

mod kind;
mod operation;
mod resource;
mod resource_id;
mod site;
mod topology;
mod vpn_config;

// Re-export public types
pub use kind::ResourceKind;
pub use operation::{LongRunningOperation, OperationAction, OperationState, PollTarget};
pub use resource::{
    AddressSpace, BgpSettings, DeviceProperties, ProvisioningState, Resource, ResourceGroup,
    ResourceGroupProperties, ResourceProperties, StorageContainer, StorageContainerProperties,
    SubResource, VirtualHub, VirtualHubProperties, VirtualWan, VirtualWanProperties,
    VpnConnection, VpnConnectionProperties, VpnGateway, VpnGatewayProperties, VpnSite,
    VpnSiteProperties,
};
pub use resource_id::ResourceId;
pub use site::NetworkSiteConfig;
pub use topology::{HubSpec, NamedResource, Topology};
pub use vpn_config::{VpnConfiguration, VpnSiteConnection};
