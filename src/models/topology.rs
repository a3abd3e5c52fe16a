//! Desired virtual WAN topology.

use crate::config::ProvisioningDefaults;
use crate::error::{Error, Result};
use serde::{Deserialize, Serialize};
use std::path::Path;

/// A resource declared by name only.
#[derive(Serialize, Deserialize, Debug, Clone, PartialEq)]
pub struct NamedResource {
    pub name: String,
}

/// Virtual hub declaration.
#[derive(Serialize, Deserialize, Debug, Clone, PartialEq)]
pub struct HubSpec {
    pub name: String,
    pub address_prefix: String,
}

/// Desired state: one vWAN, one hub, an optional site and one gateway.
#[derive(Serialize, Deserialize, Debug, Clone, PartialEq)]
pub struct Topology {
    /// Region for every resource. Falls back to the resource group location.
    #[serde(default)]
    pub location: Option<String>,
    pub virtual_wan: NamedResource,
    pub virtual_hub: HubSpec,
    #[serde(default)]
    pub vpn_site: Option<NamedResource>,
    pub vpn_gateway: NamedResource,
    #[serde(default)]
    pub defaults: ProvisioningDefaults,
}

impl Topology {
    pub fn from_yaml_str(yaml: &str) -> Result<Topology> {
        let topology: Topology = serde_yaml::from_str(yaml)?;
        topology.validate()?;
        Ok(topology)
    }

    pub fn load(path: impl AsRef<Path>) -> Result<Topology> {
        let path = path.as_ref();
        log::info!("Reading topology: {}", path.display());
        let yaml = std::fs::read_to_string(path)?;
        Self::from_yaml_str(&yaml)
    }

    fn validate(&self) -> Result<()> {
        let names = [
            ("virtual_wan", Some(&self.virtual_wan.name)),
            ("virtual_hub", Some(&self.virtual_hub.name)),
            ("vpn_site", self.vpn_site.as_ref().map(|s| &s.name)),
            ("vpn_gateway", Some(&self.vpn_gateway.name)),
        ];
        for (field, name) in names {
            if let Some(name) = name {
                if name.trim().is_empty() {
                    return Err(Error::Configuration(format!("{field}.name is empty")));
                }
            }
        }
        if self.virtual_hub.address_prefix.trim().is_empty() {
            return Err(Error::Configuration(
                "virtual_hub.address_prefix is empty".into(),
            ));
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_topology() {
        let yaml = r#"
location: westeurope
virtual_wan:
  name: vwan1
virtual_hub:
  name: hub1
  address_prefix: 10.100.0.0/24
vpn_site:
  name: site1
vpn_gateway:
  name: gw1
defaults:
  shared_key: s3cret
"#;
        let topology = Topology::from_yaml_str(yaml).expect("Error parsing topology");
        assert_eq!(topology.location.as_deref(), Some("westeurope"));
        assert_eq!(topology.virtual_hub.address_prefix, "10.100.0.0/24");
        assert_eq!(topology.vpn_site.unwrap().name, "site1");
        assert_eq!(topology.defaults.shared_key.as_deref(), Some("s3cret"));
        assert_eq!(topology.defaults.gateway_asn, 65515);
    }

    #[test]
    fn test_site_is_optional() {
        let yaml = "virtual_wan: {name: w}\nvirtual_hub: {name: h, address_prefix: 10.0.0.0/24}\nvpn_gateway: {name: g}\n";
        let topology = Topology::from_yaml_str(yaml).unwrap();
        assert!(topology.vpn_site.is_none());
        assert!(topology.location.is_none());
    }

    #[test]
    fn test_empty_name_rejected() {
        let yaml = "virtual_wan: {name: ''}\nvirtual_hub: {name: h, address_prefix: 10.0.0.0/24}\nvpn_gateway: {name: g}\n";
        assert!(matches!(
            Topology::from_yaml_str(yaml),
            Err(Error::Configuration(_))
        ));
    }
}
