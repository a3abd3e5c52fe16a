//! Process configuration.
//!
//! - [`ResourceIdentity`] - Subscription, resource group and the authorizer, built once
//! - [`ProvisioningDefaults`] - Values the reconciler fills into request bodies
//! - [`PollSettings`] - Interval and timeout for long-running operations

use crate::azure::Authorizer;
use crate::error::{Error, Result};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::path::Path;
use std::sync::Arc;
use std::time::Duration;

/// Default polling interval for long-running operations.
pub const POLL_INTERVAL_SECS: u64 = 10;
/// Default upper bound on one long-running operation. Gateways take the longest.
pub const POLL_TIMEOUT_SECS: u64 = 60 * 60;

/// Who we are and where resources live. Immutable once built.
#[derive(Clone)]
pub struct ResourceIdentity {
    subscription_id: String,
    resource_group_name: String,
    resource_group_location: String,
    storage_account: Option<String>,
    authorizer: Arc<dyn Authorizer>,
}

impl ResourceIdentity {
    /// Validate and build an identity.
    ///
    /// # Returns
    /// * `Err(Error::Configuration)` - If any of the three names is empty
    pub fn new(
        subscription_id: &str,
        resource_group_name: &str,
        resource_group_location: &str,
        authorizer: Arc<dyn Authorizer>,
    ) -> Result<ResourceIdentity> {
        let required = [
            ("subscription id", subscription_id),
            ("resource group name", resource_group_name),
            ("resource group location", resource_group_location),
        ];
        for (field, value) in required {
            if value.trim().is_empty() {
                return Err(Error::Configuration(format!("{field} is empty")));
            }
        }
        Ok(ResourceIdentity {
            subscription_id: subscription_id.trim().to_string(),
            resource_group_name: resource_group_name.trim().to_string(),
            resource_group_location: resource_group_location.trim().to_string(),
            storage_account: None,
            authorizer,
        })
    }

    /// Attach the storage account used for configuration export containers.
    pub fn with_storage_account(mut self, account: &str) -> ResourceIdentity {
        let account = account.trim();
        self.storage_account = (!account.is_empty()).then(|| account.to_string());
        self
    }

    /// Build from `AZURE_SUBSCRIPTION_ID`, `AZURE_RESOURCE_GROUP`, `AZURE_LOCATION`
    /// and the optional `AZURE_STORAGE_ACCOUNT`.
    pub fn from_env(authorizer: Arc<dyn Authorizer>) -> Result<ResourceIdentity> {
        let identity = Self::new(
            &env_or_empty("AZURE_SUBSCRIPTION_ID"),
            &env_or_empty("AZURE_RESOURCE_GROUP"),
            &env_or_empty("AZURE_LOCATION"),
            authorizer,
        )?;
        Ok(identity.with_storage_account(&env_or_empty("AZURE_STORAGE_ACCOUNT")))
    }

    /// Build from an Azure SDK auth file, taking `subscriptionId` from it.
    ///
    /// A file that is not valid JSON is an error rather than an empty identity.
    pub fn from_auth_file(
        path: impl AsRef<Path>,
        resource_group_name: &str,
        resource_group_location: &str,
        authorizer: Arc<dyn Authorizer>,
    ) -> Result<ResourceIdentity> {
        let path = path.as_ref();
        let json = std::fs::read_to_string(path).map_err(|e| {
            Error::Configuration(format!("failed to read auth file {}: {e}", path.display()))
        })?;
        let contents: serde_json::Map<String, serde_json::Value> = serde_json::from_str(&json)
            .map_err(|e| {
                Error::Configuration(format!("malformed auth file {}: {e}", path.display()))
            })?;
        let subscription_id = contents
            .get("subscriptionId")
            .and_then(|v| v.as_str())
            .ok_or_else(|| {
                Error::Configuration(format!(
                    "auth file {} has no subscriptionId",
                    path.display()
                ))
            })?;
        Self::new(
            subscription_id,
            resource_group_name,
            resource_group_location,
            authorizer,
        )
    }

    pub fn subscription_id(&self) -> &str {
        &self.subscription_id
    }

    pub fn resource_group_name(&self) -> &str {
        &self.resource_group_name
    }

    pub fn resource_group_location(&self) -> &str {
        &self.resource_group_location
    }

    pub fn storage_account(&self) -> Option<&str> {
        self.storage_account.as_deref()
    }

    pub fn authorizer(&self) -> &Arc<dyn Authorizer> {
        &self.authorizer
    }
}

impl fmt::Debug for ResourceIdentity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ResourceIdentity")
            .field("subscription_id", &self.subscription_id)
            .field("resource_group_name", &self.resource_group_name)
            .field("resource_group_location", &self.resource_group_location)
            .field("storage_account", &self.storage_account)
            .finish_non_exhaustive()
    }
}

/// Values written into request bodies that the site file does not carry.
#[derive(Serialize, Deserialize, Debug, Clone, PartialEq)]
#[serde(default)]
pub struct ProvisioningDefaults {
    /// BGP peering address announced for a site with BGP enabled.
    pub bgp_peering_address: String,
    /// ASN of the hub VPN gateway.
    pub gateway_asn: i64,
    pub device_vendor: String,
    pub device_model: String,
    pub link_speed_mbps: i32,
    /// Pre-shared key for gateway connections. No default: must be configured.
    pub shared_key: Option<String>,
}

impl Default for ProvisioningDefaults {
    fn default() -> Self {
        ProvisioningDefaults {
            bgp_peering_address: "10.0.0.10".to_string(),
            gateway_asn: 65515,
            device_vendor: "Nuage Networks".to_string(),
            device_model: "E306".to_string(),
            link_speed_mbps: 100,
            shared_key: None,
        }
    }
}

impl ProvisioningDefaults {
    /// `VWAN_SHARED_KEY` replaces the configured shared key when set.
    pub fn with_env_overrides(mut self) -> ProvisioningDefaults {
        if let Ok(key) = std::env::var("VWAN_SHARED_KEY") {
            if !key.is_empty() {
                self.shared_key = Some(key);
            }
        }
        self
    }

    pub fn require_shared_key(&self) -> Result<&str> {
        self.shared_key
            .as_deref()
            .filter(|k| !k.is_empty())
            .ok_or_else(|| {
                Error::Configuration(
                    "no shared key configured for the gateway connection (set VWAN_SHARED_KEY)"
                        .into(),
                )
            })
    }
}

/// How long-running operations are awaited.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PollSettings {
    pub interval: Duration,
    pub timeout: Duration,
}

impl Default for PollSettings {
    fn default() -> Self {
        PollSettings {
            interval: Duration::from_secs(POLL_INTERVAL_SECS),
            timeout: Duration::from_secs(POLL_TIMEOUT_SECS),
        }
    }
}

impl PollSettings {
    /// Defaults overridden by `VWAN_POLL_INTERVAL_SECS` and `VWAN_POLL_TIMEOUT_SECS`.
    pub fn from_env() -> Result<PollSettings> {
        let defaults = PollSettings::default();
        Ok(PollSettings {
            interval: env_secs("VWAN_POLL_INTERVAL_SECS")?.unwrap_or(defaults.interval),
            timeout: env_secs("VWAN_POLL_TIMEOUT_SECS")?.unwrap_or(defaults.timeout),
        })
    }
}

fn env_or_empty(key: &str) -> String {
    std::env::var(key).unwrap_or_default()
}

fn env_secs(key: &str) -> Result<Option<Duration>> {
    match std::env::var(key) {
        Ok(raw) => raw
            .trim()
            .parse::<u64>()
            .map(|secs| Some(Duration::from_secs(secs)))
            .map_err(|_| Error::Configuration(format!("{key}='{raw}' is not a number of seconds"))),
        Err(_) => Ok(None),
    }
}
