//! Topology reconciliation workflow.
//!
//! - [`requests`] - Request bodies derived from the site and defaults
//! - [`state`] - Per-resource lifecycle ledger
//! - [`reconciler`] - The ordered create/update/delete chain
//! - [`export`] - VPN site configuration export

mod export;
mod reconciler;
mod requests;
mod state;

pub use export::ConfigurationExporter;
pub use reconciler::{Reconciler, TopologyReport};
pub use requests::{
    site_connection, virtual_hub_request, virtual_wan_request, vpn_gateway_request,
    vpn_site_request,
};
pub use state::{ResourceState, StateLedger};
