use std::sync::Arc;
use std::time::Duration;

use crate::gateway::SharedGateway;
use crate::metrics::METRICS;
use crate::models::{
    BatchAction, BatchJob, BatchResult, Priority, RespawnPolicy, SupervisorError, TargetOutcome,
};
use crate::services::respawn::RespawnRegistry;

/// 把一个用户动作扇出到多个 PID，汇总每个目标的结果
pub struct BatchCoordinator {
    gateway: SharedGateway,
    registry: Arc<RespawnRegistry>,
    kill_timeout: Duration,
    respawn_policy: RespawnPolicy,
}

impl BatchCoordinator {
    pub fn new(gateway: SharedGateway, registry: Arc<RespawnRegistry>, kill_timeout: Duration) -> Self {
        Self {
            gateway,
            registry,
            kill_timeout,
            respawn_policy: RespawnPolicy::default(),
        }
    }

    pub async fn run(&self, pids: Vec<u32>, action: BatchAction) -> Result<BatchResult, SupervisorError> {
        let job = BatchJob::new(pids, action)?;
        let targets = job.targets();

        let mut outcomes = if targets.is_empty() {
            log::warn!("Batch {} has no valid PIDs, nothing dispatched", job.action.label());
            Vec::new()
        } else {
            self.dispatch(job.action, &targets).await?
        };
        outcomes.extend(job.rejected_outcomes());
        outcomes.sort_by_key(|o| o.pid);

        let result = BatchResult::from_outcomes(job.action, outcomes);
        METRICS.record_batch(result.action, result.succeeded, result.failed, result.skipped);
        log::info!("📝 {}", result.summary());
        Ok(result)
    }

    async fn dispatch(&self, action: BatchAction, targets: &[u32]) -> Result<Vec<TargetOutcome>, SupervisorError> {
        let outcomes = match action {
            BatchAction::Kill => {
                log::info!("Batch kill of {} processes", targets.len());
                self.gateway
                    .batch_kill_processes(targets, true, self.kill_timeout)
                    .await
            }
            BatchAction::SetPriority(value) => {
                let priority = Priority::new(value)?;
                log::info!("Batch nice {} for {} processes", value, targets.len());
                self.gateway.batch_set_priority(targets, priority).await
            }
            BatchAction::AutoRespawn => {
                log::info!("Batch auto-respawn for {} processes", targets.len());
                self.registry.subscribe_many(targets, &self.respawn_policy).await
            }
        };
        Ok(outcomes)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::gateway::mock::{Call, MockGateway};
    use crate::models::{GatewayError, TargetStatus};

    fn coordinator(mock: Arc<MockGateway>) -> (BatchCoordinator, Arc<RespawnRegistry>) {
        let registry = Arc::new(RespawnRegistry::new(mock.clone(), None));
        (
            BatchCoordinator::new(mock, registry.clone(), Duration::from_secs(5)),
            registry,
        )
    }

    #[tokio::test]
    async fn test_empty_selection_issues_no_calls() {
        let mock = Arc::new(MockGateway::new());
        let (batch, _) = coordinator(mock.clone());

        for action in [BatchAction::Kill, BatchAction::SetPriority(0), BatchAction::AutoRespawn] {
            assert_eq!(batch.run(vec![], action).await, Err(SupervisorError::NoTargets));
        }
        assert!(mock.calls().is_empty());
    }

    #[tokio::test]
    async fn test_kill_uses_single_aggregated_call() {
        let mock = Arc::new(MockGateway::new());
        mock.fail(2, GatewayError::PermissionDenied(2));
        let (batch, _) = coordinator(mock.clone());

        let result = batch.run(vec![3, 1, 2, 1], BatchAction::Kill).await.unwrap();
        assert_eq!(mock.calls(), vec![Call::BatchKill(vec![1, 2, 3])]);
        assert_eq!((result.succeeded, result.failed), (2, 1));
        assert_eq!(result.outcomes[1].kind, Some("PermissionDenied"));
    }

    #[tokio::test]
    async fn test_invalid_pids_skipped_without_dispatch() {
        let mock = Arc::new(MockGateway::new());
        let (batch, _) = coordinator(mock.clone());

        let result = batch.run(vec![0, 5, u32::MAX], BatchAction::Kill).await.unwrap();
        assert_eq!(mock.calls(), vec![Call::BatchKill(vec![5])]);
        assert_eq!((result.succeeded, result.skipped), (1, 2));
        let pids: Vec<u32> = result.outcomes.iter().map(|o| o.pid).collect();
        assert_eq!(pids, vec![0, 5, u32::MAX]);
    }

    #[tokio::test]
    async fn test_only_invalid_pids_issue_no_calls() {
        let mock = Arc::new(MockGateway::new());
        let (batch, registry) = coordinator(mock.clone());

        let result = batch.run(vec![0, u32::MAX], BatchAction::Kill).await.unwrap();
        assert_eq!((result.succeeded, result.skipped), (0, 2));
        let result = batch.run(vec![0], BatchAction::AutoRespawn).await.unwrap();
        assert_eq!(result.skipped, 1);
        assert!(registry.members().is_empty());
        assert!(mock.calls().is_empty());

        assert_eq!(
            batch.run(vec![0], BatchAction::SetPriority(42)).await,
            Err(SupervisorError::InvalidPriority(42))
        );
    }

    #[tokio::test]
    async fn test_priority_range_checked_before_dispatch() {
        let mock = Arc::new(MockGateway::new());
        let (batch, _) = coordinator(mock.clone());

        assert_eq!(
            batch.run(vec![1], BatchAction::SetPriority(20)).await,
            Err(SupervisorError::InvalidPriority(20))
        );
        assert_eq!(
            batch.run(vec![1], BatchAction::SetPriority(-21)).await,
            Err(SupervisorError::InvalidPriority(-21))
        );
        assert!(mock.calls().is_empty());

        for value in [-20, 19] {
            let result = batch.run(vec![1, 2], BatchAction::SetPriority(value)).await.unwrap();
            assert_eq!(result.priority, Some(value));
            assert_eq!(result.succeeded, 2);
        }
        assert_eq!(
            mock.calls(),
            vec![
                Call::BatchSetPriority(vec![1, 2], -20),
                Call::BatchSetPriority(vec![1, 2], 19)
            ]
        );
    }

    #[tokio::test]
    async fn test_auto_respawn_delegates_to_registry() {
        let mock = Arc::new(MockGateway::new());
        mock.unresolvable.lock().unwrap().insert(20);
        let (batch, registry) = coordinator(mock.clone());

        let result = batch.run(vec![10, 20, 30], BatchAction::AutoRespawn).await.unwrap();
        assert_eq!((result.succeeded, result.skipped), (2, 1));
        assert_eq!(result.outcomes[1].status, TargetStatus::Skipped);
        assert!(registry.is_subscribed(10));
        assert!(!registry.is_subscribed(20));
        assert!(registry.is_subscribed(30));
    }
}
