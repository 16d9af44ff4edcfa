use std::sync::Arc;
use tokio::runtime::Handle;

use crate::gateway::SharedGateway;
use crate::models::command::MAX_KILL_TIMEOUT_SECS;
use crate::models::{
    is_valid_pid, BatchAction, BatchResult, KillOutcome, Priority, ProcessLimits, ProcessSnapshotEntry,
    RespawnPolicy, SharedSnapshot, SupervisorConfig, SupervisorError,
};
use crate::services::batch::BatchCoordinator;
use crate::services::event_log::LogBuffer;
use crate::services::history::{HistoryStore, Sample};
use crate::services::notifications::NotificationCenter;
use crate::services::poller::SnapshotPoller;
use crate::services::preferences::PreferenceStore;
use crate::services::respawn::RespawnRegistry;
use crate::services::watchlist::WatchlistEnforcer;

/// 协调器：持有各组件并把用户意图转成网关命令
pub struct Supervisor {
    pub config: SupervisorConfig,
    pub gateway: SharedGateway,
    pub poller: Arc<SnapshotPoller>,
    pub history: Arc<HistoryStore>,
    pub watchlist: Arc<WatchlistEnforcer>,
    pub registry: Arc<RespawnRegistry>,
    pub batch: BatchCoordinator,
    pub logs: Arc<LogBuffer>,
    pub notifications: NotificationCenter,
    pub preferences: Arc<PreferenceStore>,
}

impl Supervisor {
    pub fn new(config: SupervisorConfig, gateway: SharedGateway, runtime: Handle) -> Self {
        let history = Arc::new(HistoryStore::new(config.history_capacity, config.history_grace_polls));
        let poller = Arc::new(SnapshotPoller::new(gateway.clone(), history.clone()));
        let watchlist = Arc::new(WatchlistEnforcer::new(
            gateway.clone(),
            poller.subscribe(),
            config.watch_interval,
            config.kill_timeout,
            config.dedup_kills,
            runtime,
        ));
        let preferences = Arc::new(PreferenceStore::load(config.preferences_path.clone()));
        let registry = Arc::new(RespawnRegistry::new(gateway.clone(), Some(preferences.clone())));
        let batch = BatchCoordinator::new(gateway.clone(), registry.clone(), config.kill_timeout);

        Self {
            logs: Arc::new(LogBuffer::new(config.log_capacity)),
            notifications: NotificationCenter::new(config.notification_ttl),
            gateway,
            poller,
            history,
            watchlist,
            registry,
            batch,
            preferences,
            config,
        }
    }

    /// 启动快照轮询
    pub fn start(&self, runtime: &Handle) {
        runtime.spawn(self.poller.clone().run(self.config.poll_interval));
    }

    pub fn snapshot(&self) -> SharedSnapshot {
        self.poller.current()
    }

    pub fn process_info(&self, pid: u32) -> Result<ProcessSnapshotEntry, SupervisorError> {
        self.snapshot()
            .get(pid)
            .cloned()
            .ok_or(SupervisorError::NotFound(pid))
    }

    /// 进程仍在快照中时按 (PID, 启动时间) 精确读取，避免混入同 PID 的旧进程
    pub fn history(&self, pid: u32) -> Vec<Sample> {
        match self.snapshot().get(pid) {
            Some(entry) => self.history.series_for(&entry.key()),
            None => self.history.series(pid),
        }
    }

    pub async fn kill_process(
        &self,
        pid: u32,
        kill_children: bool,
        timeout_secs: Option<u64>,
    ) -> Result<KillOutcome, SupervisorError> {
        check_pid(pid)?;
        let timeout = match timeout_secs {
            Some(secs) if secs > MAX_KILL_TIMEOUT_SECS => return Err(SupervisorError::InvalidTimeout(secs)),
            Some(secs) => std::time::Duration::from_secs(secs),
            None => self.config.kill_timeout,
        };
        let result = self.gateway.kill_process(pid, kill_children, timeout).await;
        self.notify(&result, || format!("Killed PID {}", pid));
        Ok(result?)
    }

    /// 结束后用原可执行文件重新启动，返回新 PID
    pub async fn kill_and_restart(&self, pid: u32, args: Vec<String>) -> Result<u32, SupervisorError> {
        check_pid(pid)?;
        let executable_path = match self.snapshot().get(pid) {
            Some(entry) if !entry.executable_path.is_empty() => entry.executable_path.clone(),
            _ => self
                .gateway
                .resolve_executable_path(pid)
                .await
                .map_err(|_| SupervisorError::InvalidTarget(pid))?,
        };

        let result = self
            .gateway
            .kill_and_restart(pid, true, self.config.kill_timeout, &executable_path, &args)
            .await;
        self.notify(&result, || format!("Restarted {}", executable_path));
        Ok(result?)
    }

    pub async fn set_priority(&self, pid: u32, value: i32) -> Result<(), SupervisorError> {
        check_pid(pid)?;
        let priority = Priority::new(value)?;
        let result = self.gateway.set_priority(pid, priority).await;
        self.notify(&result, || format!("Set PID {} nice level to {}", pid, value));
        Ok(result?)
    }

    pub async fn set_limits(&self, pid: u32, limits: ProcessLimits) -> Result<(), SupervisorError> {
        check_pid(pid)?;
        if limits.is_empty() {
            return Err(SupervisorError::InvalidLimits);
        }
        let result = self.gateway.set_limits(pid, &limits).await;
        self.notify(&result, || format!("Applied limits to PID {}", pid));
        Ok(result?)
    }

    pub async fn subscribe_respawn(
        &self,
        pid: u32,
        executable_path: Option<String>,
        policy: RespawnPolicy,
    ) -> Result<(), SupervisorError> {
        check_pid(pid)?;
        let result = self.registry.subscribe(pid, executable_path, policy).await;
        if let Err(e) = &result {
            self.notifications.error(format!("Auto-respawn for PID {} failed: {}", pid, e));
        }
        result
    }

    pub async fn unsubscribe_respawn(&self, pid: u32) -> Result<(), SupervisorError> {
        check_pid(pid)?;
        let result = self.registry.unsubscribe(pid).await;
        if let Err(e) = &result {
            self.notifications.error(format!("Stopping auto-respawn for PID {} failed: {}", pid, e));
        }
        result
    }

    /// 批量操作，只发一条汇总提示
    pub async fn run_batch(&self, pids: Vec<u32>, action: BatchAction) -> Result<BatchResult, SupervisorError> {
        match self.batch.run(pids, action).await {
            Ok(result) => {
                if result.is_clean() {
                    self.notifications.info(result.summary());
                } else {
                    self.notifications.error(result.summary());
                }
                Ok(result)
            }
            Err(e) => {
                self.notifications.error(e.to_string());
                Err(e)
            }
        }
    }

    fn notify<T, E: std::fmt::Display>(&self, result: &Result<T, E>, success: impl FnOnce() -> String) {
        match result {
            Ok(_) => {
                self.notifications.info(success());
            }
            Err(e) => {
                self.notifications.error(e.to_string());
            }
        }
    }
}

/// 超出范围的 PID 在内核里不是单个进程，按不存在处理
fn check_pid(pid: u32) -> Result<(), SupervisorError> {
    if is_valid_pid(pid) {
        Ok(())
    } else {
        Err(SupervisorError::NotFound(pid))
    }
}
