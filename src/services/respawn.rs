use serde::Serialize;
use std::collections::BTreeMap;
use std::sync::{Arc, RwLock};

use crate::gateway::SharedGateway;
use crate::metrics::METRICS;
use crate::models::{GatewayError, RespawnPolicy, RespawnSpec, SupervisorError, TargetOutcome};
use crate::services::preferences::PreferenceStore;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum SubscriptionState {
    Subscribed,
    /// stop 已发出，等待网关确认
    PendingUnsubscribe,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Membership {
    pub pid: u32,
    pub state: SubscriptionState,
}

/// 自动重启订阅的成员表，重启状态机本身由网关维护
pub struct RespawnRegistry {
    gateway: SharedGateway,
    members: RwLock<BTreeMap<u32, SubscriptionState>>,
    preferences: Option<Arc<PreferenceStore>>,
}

impl RespawnRegistry {
    pub fn new(gateway: SharedGateway, preferences: Option<Arc<PreferenceStore>>) -> Self {
        Self {
            gateway,
            members: RwLock::new(BTreeMap::new()),
            preferences,
        }
    }

    /// 订阅；未给出可执行路径时向网关解析
    pub async fn subscribe(
        &self,
        pid: u32,
        executable_path: Option<String>,
        policy: RespawnPolicy,
    ) -> Result<(), SupervisorError> {
        let executable_path = match executable_path.filter(|p| !p.is_empty()) {
            Some(path) => path,
            None => self.resolve(pid).await?,
        };

        let spec = RespawnSpec {
            executable_path,
            policy,
        };
        self.gateway.start_auto_respawn(pid, &spec).await?;

        let newly = self.write_members(|members| members.insert(pid, SubscriptionState::Subscribed).is_none());
        if newly {
            log::info!("🔁 Auto-respawn subscribed for PID {} ({})", pid, spec.executable_path);
        } else {
            log::info!("🔁 Auto-respawn for PID {} refreshed", pid);
        }
        Ok(())
    }

    /// 两阶段退订：失败时恢复为 Subscribed 并返回错误
    pub async fn unsubscribe(&self, pid: u32) -> Result<(), SupervisorError> {
        let previous = self.write_members(|members| {
            members
                .get_mut(&pid)
                .map(|state| std::mem::replace(state, SubscriptionState::PendingUnsubscribe))
        });

        match self.gateway.stop_auto_respawn(pid).await {
            Ok(()) => {
                self.write_members(|members| members.remove(&pid));
                log::info!("🛑 Auto-respawn unsubscribed for PID {}", pid);
                Ok(())
            }
            Err(e) => {
                if previous.is_some() {
                    self.write_members(|members| {
                        members.insert(pid, SubscriptionState::Subscribed);
                    });
                }
                log::warn!("Failed to stop auto-respawn for PID {}: {}", pid, e);
                Err(e.into())
            }
        }
    }

    pub fn is_subscribed(&self, pid: u32) -> bool {
        self.read_members().get(&pid) == Some(&SubscriptionState::Subscribed)
    }

    pub fn members(&self) -> Vec<Membership> {
        self.read_members()
            .iter()
            .map(|(&pid, &state)| Membership { pid, state })
            .collect()
    }

    /// 逐个解析并订阅，无法解析的目标记为跳过
    pub async fn subscribe_many(&self, pids: &[u32], policy: &RespawnPolicy) -> Vec<TargetOutcome> {
        let mut outcomes = Vec::with_capacity(pids.len());
        for &pid in pids {
            let executable_path = match self.resolve(pid).await {
                Ok(path) => path,
                Err(e) => {
                    log::info!("Skipping auto-respawn for PID {}: {}", pid, e);
                    outcomes.push(TargetOutcome::skipped(pid, &e));
                    continue;
                }
            };
            let outcome = match self.subscribe(pid, Some(executable_path), policy.clone()).await {
                Ok(()) => TargetOutcome::succeeded(pid),
                Err(SupervisorError::Gateway(e)) => TargetOutcome::failed(pid, &e),
                Err(e) => TargetOutcome::skipped(pid, &e),
            };
            outcomes.push(outcome);
        }
        outcomes
    }

    async fn resolve(&self, pid: u32) -> Result<String, SupervisorError> {
        match self.gateway.resolve_executable_path(pid).await {
            Ok(path) if !path.is_empty() => Ok(path),
            Ok(_) | Err(GatewayError::NotFound(_)) | Err(GatewayError::InvalidTarget(_)) => {
                Err(SupervisorError::InvalidTarget(pid))
            }
            Err(e) => Err(e.into()),
        }
    }

    fn read_members(&self) -> std::sync::RwLockReadGuard<'_, BTreeMap<u32, SubscriptionState>> {
        self.members.read().unwrap_or_else(|e| e.into_inner())
    }

    /// 修改成员表后同步指标和偏好文件中的参考列表
    fn write_members<T>(&self, f: impl FnOnce(&mut BTreeMap<u32, SubscriptionState>) -> T) -> T {
        let (result, pids) = {
            let mut members = self.members.write().unwrap_or_else(|e| e.into_inner());
            let result = f(&mut members);
            (result, members.keys().copied().collect::<Vec<u32>>())
        };

        METRICS.respawn_subscriptions.set(pids.len() as i64);
        if let Some(preferences) = &self.preferences {
            if let Err(e) = preferences.set_respawn_pids(pids) {
                log::warn!("Failed to persist auto-respawn list: {}", e);
            }
        }
        result
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::gateway::mock::{Call, MockGateway};
    use crate::models::TargetStatus;

    fn registry(mock: Arc<MockGateway>) -> RespawnRegistry {
        RespawnRegistry::new(mock, None)
    }

    #[tokio::test]
    async fn test_subscribe_twice_keeps_single_member() {
        let mock = Arc::new(MockGateway::new());
        let registry = registry(mock.clone());

        registry.subscribe(10, None, RespawnPolicy::default()).await.unwrap();
        registry.subscribe(10, None, RespawnPolicy::default()).await.unwrap();

        assert_eq!(registry.members().len(), 1);
        assert!(registry.is_subscribed(10));
        let starts = mock
            .calls()
            .into_iter()
            .filter(|c| matches!(c, Call::StartRespawn(10, _)))
            .count();
        assert_eq!(starts, 2);
    }

    #[tokio::test]
    async fn test_unresolvable_target_is_invalid() {
        let mock = Arc::new(MockGateway::new());
        mock.unresolvable.lock().unwrap().insert(20);
        let registry = registry(mock.clone());

        let result = registry.subscribe(20, None, RespawnPolicy::default()).await;
        assert_eq!(result, Err(SupervisorError::InvalidTarget(20)));
        assert!(!registry.is_subscribed(20));
        assert!(!mock.calls().iter().any(|c| matches!(c, Call::StartRespawn(..))));
    }

    #[tokio::test]
    async fn test_subscribe_many_skips_unresolvable() {
        let mock = Arc::new(MockGateway::new());
        mock.unresolvable.lock().unwrap().insert(20);
        let registry = registry(mock.clone());

        let outcomes = registry.subscribe_many(&[10, 20, 30], &RespawnPolicy::default()).await;
        let subscribed = outcomes.iter().filter(|o| o.status == TargetStatus::Succeeded).count();
        assert_eq!(subscribed, 2);
        assert_eq!(outcomes[1].pid, 20);
        assert_eq!(outcomes[1].status, TargetStatus::Skipped);

        let members: Vec<u32> = registry.members().iter().map(|m| m.pid).collect();
        assert_eq!(members, vec![10, 30]);
    }

    #[tokio::test]
    async fn test_unsubscribe_removes_on_success() {
        let mock = Arc::new(MockGateway::new());
        let registry = registry(mock.clone());
        registry.subscribe(10, None, RespawnPolicy::default()).await.unwrap();

        registry.unsubscribe(10).await.unwrap();
        assert!(!registry.is_subscribed(10));
        assert!(registry.members().is_empty());
    }

    #[tokio::test]
    async fn test_unsubscribe_failure_reverts() {
        let mock = Arc::new(MockGateway::new());
        mock.stop_failures.lock().unwrap().insert(10);
        let registry = registry(mock.clone());
        registry.subscribe(10, None, RespawnPolicy::default()).await.unwrap();

        let result = registry.unsubscribe(10).await;
        assert_eq!(result.map_err(|e| e.kind()), Err("Unavailable"));
        assert!(registry.is_subscribed(10));
        assert_eq!(
            registry.members(),
            vec![Membership {
                pid: 10,
                state: SubscriptionState::Subscribed
            }]
        );
    }

    #[tokio::test]
    async fn test_unsubscribe_unknown_pid_still_stops() {
        let mock = Arc::new(MockGateway::new());
        let registry = registry(mock.clone());

        assert_eq!(registry.unsubscribe(77).await, Ok(()));
        assert_eq!(mock.calls(), vec![Call::StopRespawn(77)]);
    }

    #[tokio::test]
    async fn test_gateway_rejection_is_not_a_member() {
        let mock = Arc::new(MockGateway::new());
        mock.fail(10, GatewayError::InvalidTarget(10));
        let registry = registry(mock.clone());

        let result = registry.subscribe(10, Some("/bin/app".into()), RespawnPolicy::default()).await;
        assert_eq!(result, Err(SupervisorError::Gateway(GatewayError::InvalidTarget(10))));
        assert!(registry.members().is_empty());
    }
}
