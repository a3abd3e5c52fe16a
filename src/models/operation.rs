//! Long-running operation handle.
//!
//! ARM answers create/update/delete requests before the work is done. The
//! [`LongRunningOperation`] records what was submitted and where to poll for the
//! outcome, so the waiting step is an explicit call instead of a hidden future.

use super::ResourceKind;
use std::fmt;

/// What the operation does to the resource.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum OperationAction {
    CreateOrUpdate,
    Delete,
    /// A POST action on the resource, e.g. `vpnConfiguration`.
    Action(String),
}

/// Poll state of an operation.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum OperationState {
    Pending,
    Succeeded,
    /// Terminal failure with the remote error message.
    Failed(String),
}

impl OperationState {
    pub fn is_terminal(&self) -> bool {
        !matches!(self, Self::Pending)
    }
}

/// Where the outcome of an operation can be read.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PollTarget {
    /// URL from the `Azure-AsyncOperation` header; returns a `status` document.
    AsyncOperation(String),
    /// URL from the `Location` header; 202 while running.
    Location(String),
    /// Re-read the resource and inspect `properties.provisioningState`.
    ProvisioningState,
    /// Finished synchronously, nothing to poll.
    Completed,
}

/// Handle for one submitted request.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LongRunningOperation {
    pub kind: ResourceKind,
    pub resource_name: String,
    pub action: OperationAction,
    /// Request id reported by the remote side (`x-ms-request-id`).
    pub request_id: String,
    pub poll: PollTarget,
    pub state: OperationState,
}

impl LongRunningOperation {
    /// A pending operation.
    pub fn pending(
        kind: ResourceKind,
        resource_name: &str,
        action: OperationAction,
        request_id: &str,
        poll: PollTarget,
    ) -> Self {
        LongRunningOperation {
            kind,
            resource_name: resource_name.to_string(),
            action,
            request_id: request_id.to_string(),
            poll,
            state: OperationState::Pending,
        }
    }

    /// An operation that reached its terminal state on submission.
    pub fn finished(
        kind: ResourceKind,
        resource_name: &str,
        action: OperationAction,
        request_id: &str,
        state: OperationState,
    ) -> Self {
        LongRunningOperation {
            kind,
            resource_name: resource_name.to_string(),
            action,
            request_id: request_id.to_string(),
            poll: PollTarget::Completed,
            state,
        }
    }

    pub fn is_terminal(&self) -> bool {
        self.state.is_terminal()
    }
}

impl fmt::Display for LongRunningOperation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let action = match &self.action {
            OperationAction::CreateOrUpdate => "create_or_update",
            OperationAction::Delete => "delete",
            OperationAction::Action(name) => name.as_str(),
        };
        write!(
            f,
            "{action} {kind} '{name}' [{state:?}] request_id={id}",
            kind = self.kind,
            name = self.resource_name,
            state = self.state,
            id = self.request_id
        )
    }
}
