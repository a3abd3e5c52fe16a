//! Azure management plane access.
//!
//! - [`manager`] - The [`ResourceManager`] backend trait
//! - [`arm`] - ARM REST implementation
//! - [`memory`] - In-memory implementation for dry runs and tests
//! - [`client`] - Typed per-kind clients
//! - [`lro`] - Waiting on long-running operations
//! - [`credential`] - Bearer token sources
//! - [`storage`] - Blob download and exported configuration parsing

mod arm;
mod client;
mod credential;
mod lro;
mod manager;
mod memory;
mod storage;

pub use arm::{ArmClient, MANAGEMENT_ENDPOINT, REQUEST_TIMEOUT_SECS};
pub use client::{
    ResourceClient, ResourceGroupsClient, StorageContainersClient, VirtualHubsClient,
    VirtualWansClient, VpnGatewaysClient, VpnSitesClient,
};
pub use credential::{Authorizer, CredentialAuthorizer, StaticTokenAuthorizer, MANAGEMENT_SCOPE};
pub use lro::wait_for_completion;
pub use manager::ResourceManager;
pub use memory::{ExportRequest, InMemoryResourceManager, JournalEntry, VPN_CONFIGURATION_ACTION};
pub use storage::{download_file, download_vpn_configuration};
