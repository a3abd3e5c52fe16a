//! ARM resource identifier parsing.

use super::ResourceKind;
use crate::error::{Error, Result};
use regex::Regex;
use std::fmt;
use std::sync::OnceLock;

/// Regex for a provider-scoped ARM id with a single type segment.
static RESOURCE_ID_REGEX: OnceLock<Regex> = OnceLock::new();

fn get_resource_id_regex() -> &'static Regex {
    RESOURCE_ID_REGEX.get_or_init(|| {
        Regex::new(
            r"(?i)^/subscriptions/([^/]+)/resourceGroups/([^/]+)/providers/([^/]+/[^/]+)/([^/]+)$",
        )
        .expect("Invalid Regex")
    })
}

/// Parsed form of an id such as
/// `/subscriptions/s/resourceGroups/rg/providers/Microsoft.Network/virtualWans/vwan1`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ResourceId {
    pub subscription_id: String,
    pub resource_group: String,
    pub resource_type: String,
    pub name: String,
}

impl ResourceId {
    /// Parse an ARM resource id.
    pub fn parse(id: &str) -> Result<ResourceId> {
        let caps = get_resource_id_regex()
            .captures(id.trim())
            .ok_or_else(|| Error::Configuration(format!("Invalid resource id: {id}")))?;
        Ok(ResourceId {
            subscription_id: caps[1].to_string(),
            resource_group: caps[2].to_string(),
            resource_type: caps[3].to_string(),
            name: caps[4].to_string(),
        })
    }

    /// The managed kind this id refers to, if any.
    pub fn kind(&self) -> Option<ResourceKind> {
        ResourceKind::from_resource_type(&self.resource_type)
    }
}

impl fmt::Display for ResourceId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "/subscriptions/{}/resourceGroups/{}/providers/{}/{}",
            self.subscription_id, self.resource_group, self.resource_type, self.name
        )
    }
}
