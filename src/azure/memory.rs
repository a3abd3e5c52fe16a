//! In-memory management plane.
//!
//! Behaves like ARM for the parts the reconciler depends on: idempotent
//! create-or-update, operations that stay pending for a configurable number of
//! polls, references that must point at provisioned resources, and deletes that
//! are refused while children still reference the resource. Every request is
//! recorded in a journal so callers can check ordering afterwards.
//!
//! Used by the `--dry-run` flag and by tests.

use super::ResourceManager;
use crate::config::ResourceIdentity;
use crate::error::{Error, Result};
use crate::models::{
    LongRunningOperation, OperationAction, OperationState, PollTarget, ResourceId, ResourceKind,
};
use async_trait::async_trait;
use parking_lot::Mutex;
use serde_json::{json, Value};
use std::collections::{BTreeMap, HashMap, HashSet};

/// The only POST action supported on a virtual WAN.
pub const VPN_CONFIGURATION_ACTION: &str = "vpnConfiguration";

/// One recorded request or completion.
#[derive(Debug, Clone, PartialEq)]
pub enum JournalEntry {
    Submitted {
        action: OperationAction,
        kind: ResourceKind,
        name: String,
        body: Option<Value>,
    },
    Finished {
        action: OperationAction,
        kind: ResourceKind,
        name: String,
        state: OperationState,
    },
}

/// A recorded `vpnConfiguration` export.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ExportRequest {
    pub virtual_wan: String,
    pub vpn_sites: Vec<String>,
    pub destination_url: String,
}

type Key = (ResourceKind, String);

struct PendingOperation {
    kind: ResourceKind,
    name: String,
    action: OperationAction,
    remaining: u32,
}

#[derive(Default)]
struct MemoryState {
    resources: BTreeMap<Key, Value>,
    operations: HashMap<String, PendingOperation>,
    failing: HashSet<Key>,
    rejecting: HashSet<Key>,
    journal: Vec<JournalEntry>,
    exports: Vec<ExportRequest>,
    next_request: u64,
}

impl MemoryState {
    fn next_request_id(&mut self) -> String {
        self.next_request += 1;
        format!("memory-{:04}", self.next_request)
    }

    fn is_provisioned(&self, key: &Key) -> bool {
        self.resources
            .get(key)
            .and_then(|r| r.pointer("/properties/provisioningState"))
            .and_then(Value::as_str)
            == Some("Succeeded")
    }

    /// Complete an operation and apply its effect.
    fn finish(
        &mut self,
        kind: ResourceKind,
        name: &str,
        action: OperationAction,
    ) -> OperationState {
        let key = (kind, name.to_string());
        let outcome = if self.failing.contains(&key) {
            OperationState::Failed(format!("{kind} '{name}' provisioning failed"))
        } else {
            OperationState::Succeeded
        };

        match (&action, &outcome) {
            (OperationAction::Delete, OperationState::Succeeded) => {
                self.resources.remove(&key);
            }
            (OperationAction::Action(_), _) => {}
            (_, OperationState::Succeeded) => {
                if let Some(resource) = self.resources.get_mut(&key) {
                    set_provisioning_state(resource, "Succeeded");
                }
            }
            (_, _) => {
                if let Some(resource) = self.resources.get_mut(&key) {
                    set_provisioning_state(resource, "Failed");
                }
            }
        }

        self.journal.push(JournalEntry::Finished {
            action,
            kind,
            name: name.to_string(),
            state: outcome.clone(),
        });
        outcome
    }
}

/// Fake remote that keeps resources as JSON in memory.
pub struct InMemoryResourceManager {
    identity: ResourceIdentity,
    pending_polls: u32,
    state: Mutex<MemoryState>,
}

impl InMemoryResourceManager {
    /// Operations are returned pending and finish on their first poll.
    pub fn new(identity: ResourceIdentity) -> Self {
        InMemoryResourceManager {
            identity,
            pending_polls: 1,
            state: Mutex::new(MemoryState::default()),
        }
    }

    /// Number of polls an operation needs to reach its terminal state; the last
    /// one returns it, so `n` reports `Pending` `n - 1` times. Zero finishes every
    /// operation on submission.
    pub fn with_pending_polls(mut self, polls: u32) -> Self {
        self.pending_polls = polls;
        self
    }

    /// Make operations on this resource end in `Failed`.
    pub fn fail_operation(&self, kind: ResourceKind, name: &str) {
        self.state.lock().failing.insert((kind, name.to_string()));
    }

    /// Make the remote side refuse requests for this resource.
    pub fn reject_submission(&self, kind: ResourceKind, name: &str) {
        self.state.lock().rejecting.insert((kind, name.to_string()));
    }

    pub fn journal(&self) -> Vec<JournalEntry> {
        self.state.lock().journal.clone()
    }

    /// Bodies submitted with create-or-update for `kind`, oldest first.
    pub fn submitted_bodies(&self, kind: ResourceKind) -> Vec<Value> {
        self.state
            .lock()
            .journal
            .iter()
            .filter_map(|entry| match entry {
                JournalEntry::Submitted {
                    action: OperationAction::CreateOrUpdate,
                    kind: k,
                    body: Some(body),
                    ..
                } if *k == kind => Some(body.clone()),
                _ => None,
            })
            .collect()
    }

    pub fn exports(&self) -> Vec<ExportRequest> {
        self.state.lock().exports.clone()
    }

    /// Stored state of one resource.
    pub fn resource(&self, kind: ResourceKind, name: &str) -> Option<Value> {
        self.state.lock().resources.get(&(kind, name.to_string())).cloned()
    }

    pub fn resource_count(&self) -> usize {
        self.state.lock().resources.len()
    }

    fn resource_id(&self, kind: ResourceKind, name: &str) -> Result<String> {
        kind.resource_path(
            self.identity.subscription_id(),
            self.identity.resource_group_name(),
            self.identity.storage_account(),
            name,
        )
    }

    /// Register a new operation, or finish it at once when no polls are configured.
    fn start(
        &self,
        state: &mut MemoryState,
        kind: ResourceKind,
        name: &str,
        action: OperationAction,
        request_id: String,
    ) -> LongRunningOperation {
        if self.pending_polls == 0 {
            let outcome = state.finish(kind, name, action.clone());
            return LongRunningOperation::finished(kind, name, action, &request_id, outcome);
        }
        state.operations.insert(
            request_id.clone(),
            PendingOperation {
                kind,
                name: name.to_string(),
                action: action.clone(),
                remaining: self.pending_polls,
            },
        );
        LongRunningOperation::pending(
            kind,
            name,
            action,
            &request_id,
            PollTarget::AsyncOperation(format!("memory://operations/{request_id}")),
        )
    }

    /// Fail unless `id` names a provisioned resource of `expected` kind.
    fn require_provisioned(
        state: &MemoryState,
        kind: ResourceKind,
        name: &str,
        expected: ResourceKind,
        id: &str,
    ) -> Result<()> {
        let parsed = ResourceId::parse(id)
            .map_err(|_| Error::submission(kind, name, format!("invalid reference '{id}'")))?;
        if parsed.kind() != Some(expected) {
            return Err(Error::submission(
                kind,
                name,
                format!("reference '{id}' is not a {expected}"),
            ));
        }
        if !state.is_provisioned(&(expected, parsed.name.clone())) {
            return Err(Error::submission(
                kind,
                name,
                format!("referenced {expected} '{}' is not provisioned", parsed.name),
            ));
        }
        Ok(())
    }
}

/// Ids a resource body points at, with the kind each must be.
fn references(kind: ResourceKind, body: &Value) -> Vec<(ResourceKind, String)> {
    let id_at = |pointer: &str| {
        body.pointer(pointer)
            .and_then(Value::as_str)
            .map(str::to_string)
    };
    let mut refs = Vec::new();
    match kind {
        ResourceKind::VirtualHub | ResourceKind::VpnSite => {
            refs.extend(
                id_at("/properties/virtualWan/id").map(|id| (ResourceKind::VirtualWan, id)),
            );
        }
        ResourceKind::VpnGateway => {
            refs.extend(
                id_at("/properties/virtualHub/id").map(|id| (ResourceKind::VirtualHub, id)),
            );
            if let Some(connections) = body
                .pointer("/properties/connections")
                .and_then(Value::as_array)
            {
                refs.extend(
                    connections
                        .iter()
                        .filter_map(|c| c.pointer("/properties/remoteVpnSite/id"))
                        .filter_map(Value::as_str)
                        .map(|id| (ResourceKind::VpnSite, id.to_string())),
                );
            }
        }
        _ => {}
    }
    refs
}

/// The parent every instance of `kind` must name.
fn required_parent(kind: ResourceKind) -> Option<ResourceKind> {
    match kind {
        ResourceKind::VirtualHub | ResourceKind::VpnSite => Some(ResourceKind::VirtualWan),
        ResourceKind::VpnGateway => Some(ResourceKind::VirtualHub),
        _ => None,
    }
}

fn set_provisioning_state(resource: &mut Value, provisioning_state: &str) {
    if let Some(obj) = resource.as_object_mut() {
        let props = obj.entry("properties").or_insert_with(|| json!({}));
        if let Some(props) = props.as_object_mut() {
            props.insert("provisioningState".to_string(), json!(provisioning_state));
        }
    }
}

#[async_trait]
impl ResourceManager for InMemoryResourceManager {
    fn identity(&self) -> &ResourceIdentity {
        &self.identity
    }

    async fn get(&self, kind: ResourceKind, name: &str) -> Result<Option<Value>> {
        Ok(self.resource(kind, name))
    }

    async fn begin_create_or_update(
        &self,
        kind: ResourceKind,
        name: &str,
        body: Value,
    ) -> Result<LongRunningOperation> {
        let id = self.resource_id(kind, name)?;
        let mut state = self.state.lock();
        let request_id = state.next_request_id();
        state.journal.push(JournalEntry::Submitted {
            action: OperationAction::CreateOrUpdate,
            kind,
            name: name.to_string(),
            body: Some(body.clone()),
        });

        if state.rejecting.contains(&(kind, name.to_string())) {
            return Err(Error::submission(kind, name, "request rejected"));
        }
        if !body.is_object() {
            return Err(Error::submission(kind, name, "body is not a JSON object"));
        }

        let refs = references(kind, &body);
        if let Some(parent) = required_parent(kind) {
            if !refs.iter().any(|(k, _)| *k == parent) {
                return Err(Error::submission(
                    kind,
                    name,
                    format!("a {parent} reference is required"),
                ));
            }
        }
        for (expected, ref_id) in &refs {
            Self::require_provisioned(&state, kind, name, *expected, ref_id)?;
        }

        let mut stored = body;
        if let Some(obj) = stored.as_object_mut() {
            obj.insert("id".to_string(), json!(id));
            obj.insert("name".to_string(), json!(name));
        }
        set_provisioning_state(&mut stored, "Updating");
        state.resources.insert((kind, name.to_string()), stored);

        Ok(self.start(
            &mut state,
            kind,
            name,
            OperationAction::CreateOrUpdate,
            request_id,
        ))
    }

    async fn begin_delete(&self, kind: ResourceKind, name: &str) -> Result<LongRunningOperation> {
        let id = self.resource_id(kind, name)?;
        let mut state = self.state.lock();
        let request_id = state.next_request_id();
        state.journal.push(JournalEntry::Submitted {
            action: OperationAction::Delete,
            kind,
            name: name.to_string(),
            body: None,
        });

        let key = (kind, name.to_string());
        if state.rejecting.contains(&key) {
            return Err(Error::submission(kind, name, "request rejected"));
        }
        if !state.resources.contains_key(&key) {
            return Ok(LongRunningOperation::finished(
                kind,
                name,
                OperationAction::Delete,
                &request_id,
                OperationState::Succeeded,
            ));
        }

        let child = state.resources.iter().find(|((child_kind, _), body)| {
            references(*child_kind, body)
                .iter()
                .any(|(_, ref_id)| ref_id.eq_ignore_ascii_case(&id))
        });
        if let Some(((child_kind, child_name), _)) = child {
            return Err(Error::submission(
                kind,
                name,
                format!("still referenced by {child_kind} '{child_name}'"),
            ));
        }

        if let Some(resource) = state.resources.get_mut(&key) {
            set_provisioning_state(resource, "Deleting");
        }
        Ok(self.start(&mut state, kind, name, OperationAction::Delete, request_id))
    }

    async fn begin_action(
        &self,
        kind: ResourceKind,
        name: &str,
        action: &str,
        body: Value,
    ) -> Result<LongRunningOperation> {
        let mut state = self.state.lock();
        let request_id = state.next_request_id();
        state.journal.push(JournalEntry::Submitted {
            action: OperationAction::Action(action.to_string()),
            kind,
            name: name.to_string(),
            body: Some(body.clone()),
        });

        if kind != ResourceKind::VirtualWan || action != VPN_CONFIGURATION_ACTION {
            return Err(Error::submission(
                kind,
                name,
                format!("unsupported action '{action}'"),
            ));
        }
        if !state.is_provisioned(&(kind, name.to_string())) {
            return Err(Error::submission(kind, name, "virtual WAN is not provisioned"));
        }

        let vpn_sites: Vec<String> = body
            .get("vpnSites")
            .and_then(Value::as_array)
            .map(|sites| {
                sites
                    .iter()
                    .filter_map(Value::as_str)
                    .map(str::to_string)
                    .collect()
            })
            .unwrap_or_default();
        for site_id in &vpn_sites {
            Self::require_provisioned(&state, kind, name, ResourceKind::VpnSite, site_id)?;
        }
        let destination_url = body
            .get("outputBlobSasUrl")
            .and_then(Value::as_str)
            .ok_or_else(|| Error::submission(kind, name, "outputBlobSasUrl is required"))?
            .to_string();

        state.exports.push(ExportRequest {
            virtual_wan: name.to_string(),
            vpn_sites,
            destination_url,
        });
        Ok(self.start(
            &mut state,
            kind,
            name,
            OperationAction::Action(action.to_string()),
            request_id,
        ))
    }

    async fn poll(&self, operation: &LongRunningOperation) -> Result<OperationState> {
        if operation.poll == PollTarget::Completed {
            return Ok(operation.state.clone());
        }
        let mut state = self.state.lock();
        let mut pending = state
            .operations
            .remove(&operation.request_id)
            .ok_or_else(|| {
                Error::operation_failed(
                    operation.kind,
                    &operation.resource_name,
                    format!("unknown operation {}", operation.request_id),
                )
            })?;

        pending.remaining = pending.remaining.saturating_sub(1);
        if pending.remaining > 0 {
            state.operations.insert(operation.request_id.clone(), pending);
            return Ok(OperationState::Pending);
        }
        Ok(state.finish(pending.kind, &pending.name, pending.action))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::azure::StaticTokenAuthorizer;
    use std::sync::Arc;

    fn manager() -> InMemoryResourceManager {
        let identity = ResourceIdentity::new(
            "sub",
            "rg",
            "westeurope",
            Arc::new(StaticTokenAuthorizer::new("t")),
        )
        .unwrap();
        InMemoryResourceManager::new(identity).with_pending_polls(0)
    }

    fn vwan_id(name: &str) -> String {
        format!(
            "/subscriptions/sub/resourceGroups/rg/providers/Microsoft.Network/virtualWans/{name}"
        )
    }

    #[tokio::test]
    async fn test_hub_requires_provisioned_vwan() {
        let manager = manager();
        let err = manager
            .begin_create_or_update(
                ResourceKind::VirtualHub,
                "hub1",
                json!({"properties": {"virtualWan": {"id": vwan_id("vwan1")}}}),
            )
            .await
            .unwrap_err();
        assert!(matches!(err, Error::Submission { kind: ResourceKind::VirtualHub, .. }));
    }

    #[tokio::test]
    async fn test_hub_requires_vwan_reference() {
        let manager = manager();
        let err = manager
            .begin_create_or_update(ResourceKind::VirtualHub, "hub1", json!({"properties": {}}))
            .await
            .unwrap_err();
        assert!(err.to_string().contains("VirtualWan reference is required"));
    }

    #[tokio::test]
    async fn test_delete_with_child_rejected() {
        let manager = manager();
        manager
            .begin_create_or_update(ResourceKind::VirtualWan, "vwan1", json!({"properties": {}}))
            .await
            .unwrap();
        manager
            .begin_create_or_update(
                ResourceKind::VirtualHub,
                "hub1",
                json!({"properties": {"virtualWan": {"id": vwan_id("vwan1")}}}),
            )
            .await
            .unwrap();

        let err = manager
            .begin_delete(ResourceKind::VirtualWan, "vwan1")
            .await
            .unwrap_err();
        assert!(err.to_string().contains("still referenced by VirtualHub 'hub1'"));

        manager.begin_delete(ResourceKind::VirtualHub, "hub1").await.unwrap();
        let op = manager.begin_delete(ResourceKind::VirtualWan, "vwan1").await.unwrap();
        assert_eq!(op.state, OperationState::Succeeded);
        assert_eq!(manager.resource_count(), 0);
    }

    #[tokio::test]
    async fn test_delete_missing_completes() {
        let manager = manager();
        let op = manager.begin_delete(ResourceKind::VpnSite, "gone").await.unwrap();
        assert_eq!(op.state, OperationState::Succeeded);
        assert_eq!(op.poll, PollTarget::Completed);
    }

    #[tokio::test]
    async fn test_pending_until_polled() {
        let manager = manager().with_pending_polls(2);
        let op = manager
            .begin_create_or_update(ResourceKind::VirtualWan, "vwan1", json!({"properties": {}}))
            .await
            .unwrap();
        assert_eq!(
            manager.resource(ResourceKind::VirtualWan, "vwan1").unwrap()["properties"]
                ["provisioningState"],
            "Updating"
        );
        assert_eq!(manager.poll(&op).await.unwrap(), OperationState::Pending);
        assert_eq!(manager.poll(&op).await.unwrap(), OperationState::Succeeded);
        assert!(manager.poll(&op).await.is_err());
    }

    #[tokio::test]
    async fn test_default_finishes_on_first_poll() {
        let manager = InMemoryResourceManager::new(manager().identity);
        let op = manager
            .begin_create_or_update(ResourceKind::VpnSite, "site1", json!({"properties": {}}))
            .await
            .unwrap();
        assert_eq!(op.state, OperationState::Pending);
        assert_eq!(manager.poll(&op).await.unwrap(), OperationState::Succeeded);
    }

    #[tokio::test]
    async fn test_rejected_submission() {
        let manager = manager();
        manager.reject_submission(ResourceKind::VirtualWan, "vwan1");
        let err = manager
            .begin_create_or_update(ResourceKind::VirtualWan, "vwan1", json!({"properties": {}}))
            .await
            .unwrap_err();
        assert!(matches!(err, Error::Submission { .. }));
        assert!(manager.resource(ResourceKind::VirtualWan, "vwan1").is_none());
    }

    #[tokio::test]
    async fn test_export_recorded() {
        let manager = manager();
        manager
            .begin_create_or_update(ResourceKind::VirtualWan, "vwan1", json!({"properties": {}}))
            .await
            .unwrap();
        manager
            .begin_action(
                ResourceKind::VirtualWan,
                "vwan1",
                VPN_CONFIGURATION_ACTION,
                json!({
                    "vpnSites": [],
                    "outputBlobSasUrl": "https://acct.blob.core.windows.net/c/b"
                }),
            )
            .await
            .unwrap();
        assert_eq!(
            manager.exports(),
            vec![ExportRequest {
                virtual_wan: "vwan1".into(),
                vpn_sites: vec![],
                destination_url: "https://acct.blob.core.windows.net/c/b".into(),
            }]
        );
    }
}
