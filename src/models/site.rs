//! Branch site configuration.
//!
//! Loaded from a YAML document with a top-level `nsg_data` key:
//!
//! ```yaml
//! nsg_data:
//!   enterprise: contoso
//!   nsg_name: branch-01
//!   nsg_port: port1
//!   public_ip: 203.0.113.5
//!   bgp_enabled: true
//!   bgp_nsg_asn: 65001
//!   lan_subnet:
//!     - 10.10.0.0/24
//! ```

use crate::error::{Error, Result};
use serde::{Deserialize, Serialize};
use std::net::IpAddr;
use std::path::Path;

/// Declared state of one branch site.
#[derive(Serialize, Deserialize, Debug, Clone, PartialEq, Default)]
pub struct NetworkSiteConfig {
    #[serde(rename = "enterprise")]
    pub enterprise_name: String,
    #[serde(rename = "nsg_name")]
    pub site_name: String,
    #[serde(rename = "nsg_port", default)]
    pub site_port: String,
    pub public_ip: String,
    #[serde(default)]
    pub bgp_enabled: bool,
    #[serde(rename = "bgp_nsg_asn", default)]
    pub bgp_asn: i64,
    #[serde(rename = "lan_subnet", default)]
    pub lan_subnets: Vec<String>,
}

#[derive(Deserialize)]
struct SiteDocument {
    nsg_data: NetworkSiteConfig,
}

impl NetworkSiteConfig {
    /// Parse and validate a site document.
    pub fn from_yaml_str(yaml: &str) -> Result<NetworkSiteConfig> {
        let doc: SiteDocument = serde_yaml::from_str(yaml)?;
        doc.nsg_data.validate()?;
        Ok(doc.nsg_data)
    }

    /// Read a site document from disk.
    pub fn load(path: impl AsRef<Path>) -> Result<NetworkSiteConfig> {
        let path = path.as_ref();
        log::info!("Reading site config: {}", path.display());
        let yaml = std::fs::read_to_string(path)?;
        Self::from_yaml_str(&yaml)
    }

    /// Check the fields the reconciler relies on.
    pub fn validate(&self) -> Result<()> {
        if self.site_name.trim().is_empty() {
            return Err(Error::Configuration("site name (nsg_name) is empty".into()));
        }
        self.public_ip.parse::<IpAddr>().map_err(|_| {
            Error::Configuration(format!("invalid public_ip '{}'", self.public_ip))
        })?;
        if self.lan_subnets.is_empty() {
            return Err(Error::Configuration(format!(
                "site '{}' declares no lan_subnet",
                self.site_name
            )));
        }
        for cidr in &self.lan_subnets {
            validate_cidr(cidr)?;
        }
        if self.bgp_enabled && !(1..=4_294_967_295).contains(&self.bgp_asn) {
            return Err(Error::Configuration(format!(
                "site '{}' enables BGP with invalid asn {}",
                self.site_name, self.bgp_asn
            )));
        }
        Ok(())
    }
}

fn validate_cidr(cidr: &str) -> Result<()> {
    let invalid = || Error::Configuration(format!("invalid lan_subnet '{cidr}'"));
    let (addr, len) = cidr.trim().split_once('/').ok_or_else(invalid)?;
    let addr: IpAddr = addr.parse().map_err(|_| invalid())?;
    let len: u8 = len.parse().map_err(|_| invalid())?;
    let max = if addr.is_ipv4() { 32 } else { 128 };
    if len > max {
        return Err(invalid());
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    const SITE_YAML: &str = r#"
nsg_data:
  enterprise: contoso
  nsg_name: branch-01
  nsg_port: port1
  public_ip: 203.0.113.5
  bgp_enabled: true
  bgp_nsg_asn: 65001
  lan_subnet:
    - 10.10.0.0/24
    - 10.10.1.0/24
"#;

    #[test]
    fn test_parse_site_yaml() {
        let site = NetworkSiteConfig::from_yaml_str(SITE_YAML).expect("Error parsing site");
        assert_eq!(site.enterprise_name, "contoso");
        assert_eq!(site.site_name, "branch-01");
        assert_eq!(site.site_port, "port1");
        assert!(site.bgp_enabled);
        assert_eq!(site.bgp_asn, 65001);
        assert_eq!(site.lan_subnets, vec!["10.10.0.0/24", "10.10.1.0/24"]);
    }

    #[test]
    fn test_bgp_defaults_off() {
        let yaml = "nsg_data:\n  enterprise: e\n  nsg_name: s\n  public_ip: 198.51.100.1\n  lan_subnet: [192.168.0.0/16]\n";
        let site = NetworkSiteConfig::from_yaml_str(yaml).unwrap();
        assert!(!site.bgp_enabled);
        assert_eq!(site.bgp_asn, 0);
    }

    #[test]
    fn test_invalid_public_ip() {
        let yaml = SITE_YAML.replace("203.0.113.5", "not-an-ip");
        let err = NetworkSiteConfig::from_yaml_str(&yaml).unwrap_err();
        assert!(matches!(err, Error::Configuration(_)));
    }

    #[test]
    fn test_invalid_subnet() {
        let yaml = SITE_YAML.replace("10.10.1.0/24", "10.10.1.0/33");
        assert!(NetworkSiteConfig::from_yaml_str(&yaml).is_err());
    }

    #[test]
    fn test_bgp_enabled_needs_asn() {
        let yaml = SITE_YAML.replace("bgp_nsg_asn: 65001", "bgp_nsg_asn: 0");
        assert!(NetworkSiteConfig::from_yaml_str(&yaml).is_err());
    }

    #[test]
    fn test_malformed_yaml() {
        let err = NetworkSiteConfig::from_yaml_str("nsg_data: [").unwrap_err();
        assert!(matches!(err, Error::Yaml(_)));
    }
}
