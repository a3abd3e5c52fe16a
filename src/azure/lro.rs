//! Waiting on long-running operations.

use super::ResourceManager;
use crate::config::PollSettings;
use crate::error::{Error, Result};
use crate::models::{LongRunningOperation, OperationState};
use tokio::time::Instant;

/// Poll `operation` until it reaches a terminal state.
///
/// Sleeps `settings.interval` between polls and gives up after `settings.timeout`,
/// including while a single poll request is still in flight.
///
/// # Returns
/// * `Ok(())` - The operation succeeded; `operation.state` is `Succeeded`
/// * `Err(Error::OperationFailed)` - The remote side reported a failure
/// * `Err(Error::Timeout)` - No terminal state within the timeout
pub async fn wait_for_completion(
    manager: &dyn ResourceManager,
    operation: &mut LongRunningOperation,
    settings: &PollSettings,
) -> Result<()> {
    let started = Instant::now();
    let mut polls: u32 = 0;

    loop {
        match &operation.state {
            OperationState::Succeeded => {
                log::debug!("{operation} finished after {polls} poll(s)");
                return Ok(());
            }
            OperationState::Failed(message) => {
                log::warn!("{operation} failed: {message}");
                return Err(Error::operation_failed(
                    operation.kind,
                    &operation.resource_name,
                    message.clone(),
                ));
            }
            OperationState::Pending => {}
        }

        let waited = started.elapsed();
        if waited >= settings.timeout {
            return Err(Error::Timeout {
                kind: operation.kind,
                name: operation.resource_name.clone(),
                waited,
            });
        }

        let remaining = settings.timeout - waited;
        let current: &LongRunningOperation = operation;
        let next = async move {
            if polls > 0 {
                tokio::time::sleep(settings.interval).await;
            }
            manager.poll(current).await
        };
        let polled = tokio::time::timeout(remaining, next).await;
        operation.state = match polled {
            Ok(state) => state?,
            Err(_) => {
                return Err(Error::Timeout {
                    kind: operation.kind,
                    name: operation.resource_name.clone(),
                    waited: started.elapsed(),
                })
            }
        };
        polls += 1;
        log::trace!("poll #{polls} {operation}");
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::azure::{InMemoryResourceManager, StaticTokenAuthorizer};
    use crate::config::ResourceIdentity;
    use crate::models::{OperationAction, PollTarget, ResourceKind};
    use serde_json::json;
    use std::sync::Arc;
    use std::time::Duration;

    fn manager(pending_polls: u32) -> InMemoryResourceManager {
        let identity = ResourceIdentity::new(
            "sub",
            "rg",
            "westeurope",
            Arc::new(StaticTokenAuthorizer::new("t")),
        )
        .unwrap();
        InMemoryResourceManager::new(identity).with_pending_polls(pending_polls)
    }

    fn fast() -> PollSettings {
        PollSettings {
            interval: Duration::from_millis(1),
            timeout: Duration::from_secs(5),
        }
    }

    #[tokio::test]
    async fn test_wait_until_succeeded() {
        let manager = manager(3);
        let mut op = manager
            .begin_create_or_update(ResourceKind::VirtualWan, "vwan1", json!({"properties": {}}))
            .await
            .unwrap();
        assert_eq!(op.state, OperationState::Pending);
        wait_for_completion(&manager, &mut op, &fast()).await.unwrap();
        assert_eq!(op.state, OperationState::Succeeded);
    }

    #[tokio::test]
    async fn test_wait_reports_failure() {
        let manager = manager(2);
        manager.fail_operation(ResourceKind::VirtualWan, "vwan1");
        let mut op = manager
            .begin_create_or_update(ResourceKind::VirtualWan, "vwan1", json!({"properties": {}}))
            .await
            .unwrap();
        let err = wait_for_completion(&manager, &mut op, &fast())
            .await
            .unwrap_err();
        assert!(matches!(
            err,
            Error::OperationFailed {
                kind: ResourceKind::VirtualWan,
                ..
            }
        ));
    }

    #[tokio::test]
    async fn test_wait_times_out() {
        let manager = manager(u32::MAX);
        let mut op = manager
            .begin_create_or_update(ResourceKind::VirtualWan, "vwan1", json!({"properties": {}}))
            .await
            .unwrap();
        let settings = PollSettings {
            interval: Duration::from_millis(5),
            timeout: Duration::from_millis(30),
        };
        let err = wait_for_completion(&manager, &mut op, &settings)
            .await
            .unwrap_err();
        assert!(matches!(err, Error::Timeout { .. }));
    }

    #[tokio::test]
    async fn test_finished_operation_needs_no_poll() {
        let manager = manager(0);
        let mut op = LongRunningOperation::finished(
            ResourceKind::ResourceGroup,
            "rg",
            OperationAction::CreateOrUpdate,
            "req",
            OperationState::Succeeded,
        );
        wait_for_completion(&manager, &mut op, &fast()).await.unwrap();
        assert_eq!(op.poll, PollTarget::Completed);
        assert!(manager.journal().is_empty());
    }
}
