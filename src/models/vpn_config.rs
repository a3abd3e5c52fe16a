//! Exported VPN site configuration document.
//!
//! This is the JSON the `vpnConfiguration` export writes to blob storage: one entry
//! per VPN site with the hub side of every connection.

use crate::error::{decode_str, Result};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::path::Path;

#[derive(Serialize, Deserialize, Debug, Clone, PartialEq)]
pub struct ConfigurationVersion {
    #[serde(rename = "LastUpdatedTime")]
    pub last_updated_time: DateTime<Utc>,
    #[serde(rename = "Version")]
    pub version: String,
}

#[derive(Serialize, Deserialize, Debug, Clone, PartialEq)]
pub struct SiteDescription {
    #[serde(rename = "Name")]
    pub name: String,
    #[serde(rename = "IPAddress")]
    pub ip_address: String,
}

#[derive(Serialize, Deserialize, Debug, Clone, PartialEq)]
pub struct HubConfiguration {
    #[serde(rename = "AddressSpace")]
    pub address_space: String,
    #[serde(rename = "ConnectedSubnets", default)]
    pub connected_subnets: Vec<String>,
}

#[derive(Serialize, Deserialize, Debug, Clone, PartialEq)]
pub struct GatewayInstances {
    #[serde(rename = "Instance0")]
    pub instance0: String,
    #[serde(rename = "Instance1")]
    pub instance1: String,
}

#[derive(Serialize, Deserialize, Debug, Clone, PartialEq)]
pub struct GatewayConfiguration {
    #[serde(rename = "IpAddresses")]
    pub ip_addresses: GatewayInstances,
}

#[derive(Serialize, Deserialize, Debug, Clone, PartialEq)]
pub struct IpsecParameters {
    #[serde(rename = "SADataSizeInKilobytes")]
    pub sa_data_size_in_kilobytes: u64,
    #[serde(rename = "SALifeTimeInSeconds")]
    pub sa_lifetime_in_seconds: u64,
}

#[derive(Serialize, Deserialize, Debug, Clone, PartialEq)]
pub struct ConnectionConfiguration {
    #[serde(rename = "IsBgpEnabled")]
    pub is_bgp_enabled: bool,
    #[serde(rename = "PSK")]
    pub psk: String,
    #[serde(rename = "IPsecParameters")]
    pub ipsec_parameters: IpsecParameters,
}

/// Hub side of one site connection.
#[derive(Serialize, Deserialize, Debug, Clone, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct VpnSiteConnection {
    pub hub_configuration: HubConfiguration,
    pub gateway_configuration: GatewayConfiguration,
    pub connection_configuration: ConnectionConfiguration,
}

/// One site entry of the exported document.
#[derive(Serialize, Deserialize, Debug, Clone, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct VpnConfiguration {
    pub configuration_version: ConfigurationVersion,
    pub vpn_site_configuration: SiteDescription,
    #[serde(default)]
    pub vpn_site_connections: Vec<VpnSiteConnection>,
}

impl VpnConfiguration {
    /// Parse an exported document. Azure writes a JSON array of sites.
    pub fn from_json_str(json: &str) -> Result<Vec<VpnConfiguration>> {
        decode_str(json)
    }

    pub fn load(path: impl AsRef<Path>) -> Result<Vec<VpnConfiguration>> {
        let json = std::fs::read_to_string(path)?;
        Self::from_json_str(&json)
    }

    /// Public IPs of the hub gateway instances, one pair per connection.
    pub fn gateway_addresses(&self) -> Vec<(&str, &str)> {
        self.vpn_site_connections
            .iter()
            .map(|c| {
                let ips = &c.gateway_configuration.ip_addresses;
                (ips.instance0.as_str(), ips.instance1.as_str())
            })
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::Error;

    const EXPORT_JSON: &str = r#"[
      {
        "configurationVersion": {"LastUpdatedTime": "2019-10-11T12:52:13.0525478Z", "Version": "f2e1a7b4"},
        "vpnSiteConfiguration": {"Name": "branch-01", "IPAddress": "203.0.113.5"},
        "vpnSiteConnections": [
          {
            "hubConfiguration": {"AddressSpace": "10.100.0.0/24", "ConnectedSubnets": ["10.100.0.0/24"]},
            "gatewayConfiguration": {"IpAddresses": {"Instance0": "51.105.1.1", "Instance1": "51.105.1.2"}},
            "connectionConfiguration": {
              "IsBgpEnabled": false,
              "PSK": "from-key-vault",
              "IPsecParameters": {"SADataSizeInKilobytes": 102400000, "SALifeTimeInSeconds": 3600}
            }
          }
        ]
      }
    ]"#;

    #[test]
    fn test_parse_export() {
        let configs = VpnConfiguration::from_json_str(EXPORT_JSON).expect("Error parsing export");
        assert_eq!(configs.len(), 1);
        let cfg = &configs[0];
        assert_eq!(cfg.vpn_site_configuration.name, "branch-01");
        assert_eq!(cfg.configuration_version.version, "f2e1a7b4");
        assert_eq!(cfg.gateway_addresses(), vec![("51.105.1.1", "51.105.1.2")]);
        assert_eq!(
            cfg.vpn_site_connections[0]
                .connection_configuration
                .ipsec_parameters
                .sa_lifetime_in_seconds,
            3600
        );
    }

    #[test]
    fn test_parse_export_reports_path() {
        let broken = EXPORT_JSON.replace("\"IsBgpEnabled\": false", "\"IsBgpEnabled\": \"no\"");
        match VpnConfiguration::from_json_str(&broken).unwrap_err() {
            Error::Parse { path, .. } => assert!(path.contains("IsBgpEnabled"), "{path}"),
            other => panic!("unexpected error {other:?}"),
        }
    }
}
