//! VPN site configuration export.

use crate::azure::{wait_for_completion, ResourceManager, VPN_CONFIGURATION_ACTION};
use crate::config::PollSettings;
use crate::error::{Error, Result};
use crate::models::ResourceKind;
use colored::Colorize;
use reqwest::Url;
use serde::Serialize;
use std::sync::Arc;

/// Body of the `vpnConfiguration` action.
#[derive(Serialize, Debug)]
#[serde(rename_all = "camelCase")]
struct VpnSitesConfigurationRequest<'a> {
    vpn_sites: Vec<&'a str>,
    output_blob_sas_url: &'a str,
}

/// Asks a virtual WAN to write the configuration of its sites to a blob.
pub struct ConfigurationExporter {
    manager: Arc<dyn ResourceManager>,
    poll: PollSettings,
}

impl ConfigurationExporter {
    pub fn new(manager: Arc<dyn ResourceManager>, poll: PollSettings) -> Self {
        ConfigurationExporter { manager, poll }
    }

    /// Export the configuration of `site_id` to `destination_url` and wait for it.
    ///
    /// # Arguments
    /// * `vwan_name` - Virtual WAN the site belongs to
    /// * `site_id` - Resource id of the VPN site
    /// * `destination_url` - Writable blob URL, typically carrying a SAS token
    pub async fn export_site_config(
        &self,
        vwan_name: &str,
        site_id: &str,
        destination_url: &str,
    ) -> Result<()> {
        if site_id.is_empty() {
            return Err(Error::Configuration("site id to export is empty".into()));
        }
        let url = Url::parse(destination_url)
            .map_err(|e| Error::Configuration(format!("invalid export destination: {e}")))?;
        log::info!(
            "export {} site config to {}{}",
            vwan_name.on_blue(),
            url.host_str().unwrap_or_default(),
            url.path()
        );

        let body = serde_json::to_value(VpnSitesConfigurationRequest {
            vpn_sites: vec![site_id],
            output_blob_sas_url: destination_url,
        })?;
        let mut operation = self
            .manager
            .begin_action(
                ResourceKind::VirtualWan,
                vwan_name,
                VPN_CONFIGURATION_ACTION,
                body,
            )
            .await
            .map_err(|e| e.for_resource(ResourceKind::VirtualWan, vwan_name))?;
        wait_for_completion(self.manager.as_ref(), &mut operation, &self.poll)
            .await
            .map_err(|e| e.for_resource(ResourceKind::VirtualWan, vwan_name))
    }
}
