//! 命令网关：核心与操作系统后端之间唯一的接口

pub mod events;
pub mod local;
#[cfg(test)]
pub mod mock;

use async_trait::async_trait;
use std::sync::Arc;
use std::time::Duration;

use crate::models::{
    GatewayError, KillOutcome, Priority, ProcessLimits, ProcessSnapshotEntry, RespawnSpec,
    TargetOutcome,
};

pub use events::EventFeed;
pub use local::LocalGateway;

pub type SharedGateway = Arc<dyn CommandGateway>;

#[async_trait]
pub trait CommandGateway: Send + Sync {
    async fn list_processes(&self) -> Result<Vec<ProcessSnapshotEntry>, GatewayError>;

    /// 结束进程（可选连同子进程），超时后强制结束
    async fn kill_process(
        &self,
        pid: u32,
        kill_children: bool,
        timeout: Duration,
    ) -> Result<KillOutcome, GatewayError>;

    /// 结束进程后用同一可执行文件启动替代进程，返回新 PID
    async fn kill_and_restart(
        &self,
        pid: u32,
        kill_children: bool,
        timeout: Duration,
        executable_path: &str,
        args: &[String],
    ) -> Result<u32, GatewayError>;

    async fn set_priority(&self, pid: u32, priority: Priority) -> Result<(), GatewayError>;

    async fn set_limits(&self, pid: u32, limits: &ProcessLimits) -> Result<(), GatewayError>;

    async fn start_auto_respawn(&self, pid: u32, spec: &RespawnSpec) -> Result<(), GatewayError>;

    /// 未在运行时也返回 Ok
    async fn stop_auto_respawn(&self, pid: u32) -> Result<(), GatewayError>;

    async fn resolve_executable_path(&self, pid: u32) -> Result<String, GatewayError>;

    async fn batch_kill_processes(
        &self,
        pids: &[u32],
        kill_children: bool,
        timeout: Duration,
    ) -> Vec<TargetOutcome> {
        let mut outcomes = Vec::with_capacity(pids.len());
        for &pid in pids {
            let result = self.kill_process(pid, kill_children, timeout).await;
            outcomes.push(TargetOutcome::from_result(pid, &result));
        }
        outcomes
    }

    async fn batch_set_priority(&self, pids: &[u32], priority: Priority) -> Vec<TargetOutcome> {
        let mut outcomes = Vec::with_capacity(pids.len());
        for &pid in pids {
            let result = self.set_priority(pid, priority).await;
            outcomes.push(TargetOutcome::from_result(pid, &result));
        }
        outcomes
    }
}
