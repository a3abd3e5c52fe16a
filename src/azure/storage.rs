//! Blob download for exported configuration files.

use crate::error::{Error, Result};
use crate::models::VpnConfiguration;
use colored::Colorize;
use reqwest::Url;
use std::path::Path;

/// Download `url` (usually a SAS URL) to `path`.
///
/// # Arguments
/// * `url` - Blob URL; the query string is never logged
/// * `path` - Destination file, overwritten if it exists
///
/// # Returns
/// * `Ok(u64)` - Number of bytes written
pub async fn download_file(url: &str, path: &Path) -> Result<u64> {
    let parsed = Url::parse(url)
        .map_err(|e| Error::Configuration(format!("invalid download url: {e}")))?;
    log::info!(
        "download {}{} -> {}",
        parsed.host_str().unwrap_or_default(),
        parsed.path().on_blue(),
        path.display()
    );

    let response = reqwest::get(parsed).await?.error_for_status()?;
    let bytes = response.bytes().await?;
    tokio::fs::write(path, &bytes).await?;
    Ok(bytes.len() as u64)
}

/// Download an exported VPN configuration to `path` and parse it.
pub async fn download_vpn_configuration(url: &str, path: &Path) -> Result<Vec<VpnConfiguration>> {
    let bytes = download_file(url, path).await?;
    log::debug!("wrote {bytes} bytes to {}", path.display());
    VpnConfiguration::load(path)
}

#[cfg(test)]
mod tests {
    use super::*;
    use wiremock::matchers::{method, path};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    #[tokio::test]
    async fn test_download_writes_file() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/vpnconfig/site1.json"))
            .respond_with(ResponseTemplate::new(200).set_body_string("[]"))
            .mount(&server)
            .await;

        let dir = tempfile::tempdir().unwrap();
        let target = dir.path().join("site1.json");
        let url = format!("{}/vpnconfig/site1.json?sig=secret", server.uri());
        let written = download_file(&url, &target).await.unwrap();
        assert_eq!(written, 2);
        assert_eq!(std::fs::read_to_string(&target).unwrap(), "[]");
    }

    #[tokio::test]
    async fn test_download_vpn_configuration_parses_gateways() {
        let export = r#"[{
          "configurationVersion": {
            "LastUpdatedTime": "2019-10-11T12:52:13Z", "Version": "f2e1a7b4"
          },
          "vpnSiteConfiguration": {"Name": "branch-01", "IPAddress": "203.0.113.5"},
          "vpnSiteConnections": [{
            "hubConfiguration": {"AddressSpace": "10.100.0.0/24", "ConnectedSubnets": []},
            "gatewayConfiguration": {
              "IpAddresses": {"Instance0": "51.105.1.1", "Instance1": "51.105.1.2"}
            },
            "connectionConfiguration": {
              "IsBgpEnabled": false,
              "PSK": "psk",
              "IPsecParameters": {"SADataSizeInKilobytes": 102400000, "SALifeTimeInSeconds": 3600}
            }
          }]
        }]"#;
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/vpnconfig/branch-01.json"))
            .respond_with(ResponseTemplate::new(200).set_body_string(export))
            .mount(&server)
            .await;

        let dir = tempfile::tempdir().unwrap();
        let target = dir.path().join("branch-01.json");
        let url = format!("{}/vpnconfig/branch-01.json", server.uri());
        let configs = download_vpn_configuration(&url, &target).await.unwrap();
        assert_eq!(configs.len(), 1);
        assert_eq!(configs[0].vpn_site_configuration.name, "branch-01");
        assert_eq!(configs[0].gateway_addresses(), vec![("51.105.1.1", "51.105.1.2")]);
        assert!(target.exists());
    }

    #[tokio::test]
    async fn test_download_vpn_configuration_rejects_garbage() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .respond_with(ResponseTemplate::new(200).set_body_string("{\"not\": \"a list\"}"))
            .mount(&server)
            .await;

        let dir = tempfile::tempdir().unwrap();
        let url = format!("{}/x", server.uri());
        let err = download_vpn_configuration(&url, &dir.path().join("x"))
            .await
            .unwrap_err();
        assert!(matches!(err, Error::Parse { .. }));
    }

    #[tokio::test]
    async fn test_download_http_error() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .respond_with(ResponseTemplate::new(403))
            .mount(&server)
            .await;

        let dir = tempfile::tempdir().unwrap();
        let err = download_file(&format!("{}/x", server.uri()), &dir.path().join("x"))
            .await
            .unwrap_err();
        assert!(matches!(err, Error::Transport(_)));
    }

    #[tokio::test]
    async fn test_download_invalid_url() {
        let dir = tempfile::tempdir().unwrap();
        let err = download_file("not a url", &dir.path().join("x"))
            .await
            .unwrap_err();
        assert!(matches!(err, Error::Configuration(_)));
    }
}
