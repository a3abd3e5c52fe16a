//! Request bodies for each step of the topology chain.
//!
//! Pure functions: they derive the ARM payload from the declared site, the
//! parent ids and [`ProvisioningDefaults`]. No remote calls happen here.

use crate::config::ProvisioningDefaults;
use crate::error::Result;
use crate::models::{
    AddressSpace, BgpSettings, DeviceProperties, NetworkSiteConfig, SubResource, VirtualHub,
    VirtualHubProperties, VirtualWan, VirtualWanProperties, VpnConnection, VpnGateway,
    VpnGatewayProperties, VpnSite, VpnSiteProperties,
};
use itertools::Itertools;

/// Virtual WAN with branch-to-branch traffic allowed.
pub fn virtual_wan_request(location: &str) -> VirtualWan {
    VirtualWan::new(
        Some(location),
        VirtualWanProperties {
            allow_branch_to_branch_traffic: Some(true),
            ..Default::default()
        },
    )
}

pub fn virtual_hub_request(vwan_id: &str, address_prefix: &str, location: &str) -> VirtualHub {
    VirtualHub::new(
        Some(location),
        VirtualHubProperties {
            address_prefix: Some(address_prefix.to_string()),
            virtual_wan: Some(SubResource::new(vwan_id)),
            ..Default::default()
        },
    )
}

/// VPN site for a branch.
///
/// `bgpProperties` is left out entirely when the site does not run BGP. With
/// BGP on, the peering address comes from `defaults` and the ASN from the site.
pub fn vpn_site_request(
    vwan_id: &str,
    location: &str,
    site: &NetworkSiteConfig,
    defaults: &ProvisioningDefaults,
) -> VpnSite {
    let bgp_properties = site.bgp_enabled.then(|| BgpSettings {
        asn: Some(site.bgp_asn),
        bgp_peering_address: Some(defaults.bgp_peering_address.clone()),
    });
    log::debug!(
        "site {} ip={} prefixes=[{}] bgp={}",
        site.site_name,
        site.public_ip,
        site.lan_subnets.iter().join(","),
        site.bgp_enabled
    );

    VpnSite::new(
        Some(location),
        VpnSiteProperties {
            virtual_wan: Some(SubResource::new(vwan_id)),
            device_properties: Some(DeviceProperties {
                device_vendor: Some(defaults.device_vendor.clone()),
                device_model: Some(defaults.device_model.clone()),
                link_speed_in_mbps: Some(defaults.link_speed_mbps),
            }),
            ip_address: Some(site.public_ip.clone()),
            address_space: Some(AddressSpace {
                address_prefixes: site.lan_subnets.clone(),
            }),
            bgp_properties,
            ..Default::default()
        },
    )
}

/// Gateway connection from the hub to `site_id`, named after the site.
///
/// Fails with a configuration error when no shared key is configured.
pub fn site_connection(
    site: &NetworkSiteConfig,
    site_id: &str,
    defaults: &ProvisioningDefaults,
) -> Result<VpnConnection> {
    let shared_key = defaults.require_shared_key()?;
    Ok(VpnConnection::new(&site.site_name, shared_key, site_id))
}

/// VPN gateway carrying exactly `connections`.
pub fn vpn_gateway_request(
    vhub_id: &str,
    location: &str,
    connections: Vec<VpnConnection>,
    defaults: &ProvisioningDefaults,
) -> VpnGateway {
    VpnGateway::new(
        Some(location),
        VpnGatewayProperties {
            virtual_hub: Some(SubResource::new(vhub_id)),
            bgp_settings: Some(BgpSettings {
                asn: Some(defaults.gateway_asn),
                bgp_peering_address: None,
            }),
            connections,
            ..Default::default()
        },
    )
}
