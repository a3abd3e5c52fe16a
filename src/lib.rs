//! Azure virtual WAN provisioner.
//!
//! Provisions and tears down a virtual WAN topology (virtual WAN, hub, VPN site,
//! VPN gateway) from a declarative site file, awaiting every long-running ARM
//! operation before the next dependent resource is submitted.
//!
//! - [`azure`] - Management plane backends, typed clients and LRO polling
//! - [`config`] - Identity, provisioning defaults and poll settings
//! - [`models`] - Resource payloads, operations and declarative inputs
//! - [`reconcile`] - The ordered reconciliation workflow and export
//! - [`error`] - Error type shared by all of the above

pub mod azure;
pub mod config;
pub mod error;
pub mod models;
pub mod reconcile;

pub use config::{PollSettings, ProvisioningDefaults, ResourceIdentity};
pub use error::{Error, Result};
pub use reconcile::{ConfigurationExporter, Reconciler, TopologyReport};
