//! Per-resource lifecycle tracking.

use crate::models::ResourceKind;
use std::collections::BTreeMap;
use std::fmt;

/// Lifecycle of one resource as seen by the reconciler.
///
/// `Absent -> Creating -> Present`, `Present -> Deleting -> Absent`, and any
/// failed operation moves the resource to `Error`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum ResourceState {
    #[default]
    Absent,
    Creating,
    Present,
    Deleting,
    Error,
}

impl ResourceState {
    /// Whether `self -> next` is a step of the lifecycle.
    ///
    /// `Present -> Creating` is an update and `Error -> Creating` a retry.
    pub fn can_transition_to(self, next: ResourceState) -> bool {
        use ResourceState::*;
        matches!(
            (self, next),
            (Absent, Creating)
                | (Absent, Absent)
                | (Creating, Present)
                | (Present, Creating)
                | (Present, Deleting)
                | (Present, Present)
                | (Deleting, Absent)
                | (Error, Creating)
                | (Error, Deleting)
                | (_, Error)
        )
    }
}

impl fmt::Display for ResourceState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        fmt::Debug::fmt(self, f)
    }
}

/// States of every resource the reconciler has touched.
#[derive(Debug, Default, Clone)]
pub struct StateLedger {
    states: BTreeMap<(ResourceKind, String), ResourceState>,
}

impl StateLedger {
    pub fn new() -> Self {
        Self::default()
    }

    /// Current state; resources never touched are `Absent`.
    pub fn state(&self, kind: ResourceKind, name: &str) -> ResourceState {
        self.states
            .get(&(kind, name.to_string()))
            .copied()
            .unwrap_or_default()
    }

    /// Record a new state. Steps outside the lifecycle are logged and applied.
    pub fn transition(&mut self, kind: ResourceKind, name: &str, next: ResourceState) {
        let current = self.state(kind, name);
        if !current.can_transition_to(next) {
            log::warn!("{kind} '{name}' unexpected transition {current} -> {next}");
        } else {
            log::trace!("{kind} '{name}' {current} -> {next}");
        }
        self.states.insert((kind, name.to_string()), next);
    }

    /// Entries in dependency order, parents first.
    pub fn entries(&self) -> impl Iterator<Item = (ResourceKind, &str, ResourceState)> {
        self.states
            .iter()
            .map(|((kind, name), state)| (*kind, name.as_str(), *state))
    }

    /// Resources that ended in `Error`.
    pub fn failed(&self) -> Vec<(ResourceKind, String)> {
        self.entries()
            .filter(|(_, _, state)| *state == ResourceState::Error)
            .map(|(kind, name, _)| (kind, name.to_string()))
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_untouched_is_absent() {
        let ledger = StateLedger::new();
        assert_eq!(
            ledger.state(ResourceKind::VirtualWan, "vwan1"),
            ResourceState::Absent
        );
    }

    #[test]
    fn test_lifecycle() {
        use ResourceState::*;
        assert!(Absent.can_transition_to(Creating));
        assert!(Creating.can_transition_to(Present));
        assert!(Present.can_transition_to(Deleting));
        assert!(Deleting.can_transition_to(Absent));
        assert!(Creating.can_transition_to(Error));
        assert!(!Absent.can_transition_to(Present));
        assert!(!Deleting.can_transition_to(Present));
    }

    #[test]
    fn test_entries_parents_first() {
        let mut ledger = StateLedger::new();
        ledger.transition(ResourceKind::VpnGateway, "gw", ResourceState::Creating);
        ledger.transition(ResourceKind::VirtualWan, "wan", ResourceState::Creating);
        ledger.transition(ResourceKind::VpnGateway, "gw", ResourceState::Error);

        let kinds: Vec<_> = ledger.entries().map(|(kind, _, _)| kind).collect();
        assert_eq!(kinds, vec![ResourceKind::VirtualWan, ResourceKind::VpnGateway]);
        assert_eq!(ledger.failed(), vec![(ResourceKind::VpnGateway, "gw".to_string())]);
    }
}
