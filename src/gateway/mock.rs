//! 测试用网关：记录所有调用，可按 PID 预设失败

use async_trait::async_trait;
use std::collections::{HashMap, HashSet};
use std::sync::Mutex;
use std::time::Duration;

use crate::gateway::CommandGateway;
use crate::models::{
    GatewayError, KillOutcome, Priority, ProcessLimits, ProcessSnapshotEntry, RespawnSpec,
    TargetOutcome,
};

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Call {
    List,
    Kill(u32),
    KillAndRestart(u32, String),
    SetPriority(u32, i32),
    SetLimits(u32),
    StartRespawn(u32, String),
    StopRespawn(u32),
    Resolve(u32),
    BatchKill(Vec<u32>),
    BatchSetPriority(Vec<u32>, i32),
}

pub struct MockGateway {
    pub calls: Mutex<Vec<Call>>,
    pub processes: Mutex<Result<Vec<ProcessSnapshotEntry>, GatewayError>>,
    pub failures: Mutex<HashMap<u32, GatewayError>>,
    pub unresolvable: Mutex<HashSet<u32>>,
    pub stop_failures: Mutex<HashSet<u32>>,
    /// list_processes 在返回前等待的时长
    pub list_delay: Mutex<Option<Duration>>,
    pub kill_delay: Mutex<Option<Duration>>,
}

impl MockGateway {
    pub fn new() -> Self {
        Self {
            calls: Mutex::new(Vec::new()),
            processes: Mutex::new(Ok(Vec::new())),
            failures: Mutex::new(HashMap::new()),
            unresolvable: Mutex::new(HashSet::new()),
            stop_failures: Mutex::new(HashSet::new()),
            list_delay: Mutex::new(None),
            kill_delay: Mutex::new(None),
        }
    }

    pub fn with_processes(list: Vec<ProcessSnapshotEntry>) -> Self {
        let mock = Self::new();
        *mock.processes.lock().unwrap() = Ok(list);
        mock
    }

    pub fn fail(&self, pid: u32, error: GatewayError) {
        self.failures.lock().unwrap().insert(pid, error);
    }

    pub fn calls(&self) -> Vec<Call> {
        self.calls.lock().unwrap().clone()
    }

    pub fn kills(&self) -> Vec<u32> {
        self.calls()
            .into_iter()
            .filter_map(|c| match c {
                Call::Kill(pid) => Some(pid),
                _ => None,
            })
            .collect()
    }

    fn record(&self, call: Call) {
        self.calls.lock().unwrap().push(call);
    }

    fn outcome(&self, pid: u32) -> Result<(), GatewayError> {
        match self.failures.lock().unwrap().get(&pid) {
            Some(e) => Err(e.clone()),
            None => Ok(()),
        }
    }
}

#[async_trait]
impl CommandGateway for MockGateway {
    async fn list_processes(&self) -> Result<Vec<ProcessSnapshotEntry>, GatewayError> {
        self.record(Call::List);
        let delay = *self.list_delay.lock().unwrap();
        if let Some(delay) = delay {
            tokio::time::sleep(delay).await;
        }
        self.processes.lock().unwrap().clone()
    }

    async fn kill_process(
        &self,
        pid: u32,
        _kill_children: bool,
        _timeout: Duration,
    ) -> Result<KillOutcome, GatewayError> {
        self.record(Call::Kill(pid));
        let delay = *self.kill_delay.lock().unwrap();
        if let Some(delay) = delay {
            tokio::time::sleep(delay).await;
        }
        self.outcome(pid).map(|_| KillOutcome::Graceful)
    }

    async fn kill_and_restart(
        &self,
        pid: u32,
        _kill_children: bool,
        _timeout: Duration,
        executable_path: &str,
        _args: &[String],
    ) -> Result<u32, GatewayError> {
        self.record(Call::KillAndRestart(pid, executable_path.to_string()));
        self.outcome(pid).map(|_| pid + 1000)
    }

    async fn set_priority(&self, pid: u32, priority: Priority) -> Result<(), GatewayError> {
        self.record(Call::SetPriority(pid, priority.value()));
        self.outcome(pid)
    }

    async fn set_limits(&self, pid: u32, _limits: &ProcessLimits) -> Result<(), GatewayError> {
        self.record(Call::SetLimits(pid));
        self.outcome(pid)
    }

    async fn start_auto_respawn(&self, pid: u32, spec: &RespawnSpec) -> Result<(), GatewayError> {
        self.record(Call::StartRespawn(pid, spec.executable_path.clone()));
        self.outcome(pid)
    }

    async fn stop_auto_respawn(&self, pid: u32) -> Result<(), GatewayError> {
        self.record(Call::StopRespawn(pid));
        if self.stop_failures.lock().unwrap().contains(&pid) {
            return Err(GatewayError::Unavailable("stop rejected".to_string()));
        }
        Ok(())
    }

    async fn resolve_executable_path(&self, pid: u32) -> Result<String, GatewayError> {
        self.record(Call::Resolve(pid));
        if self.unresolvable.lock().unwrap().contains(&pid) {
            return Err(GatewayError::NotFound(pid));
        }
        Ok(format!("/opt/app/{}", pid))
    }

    async fn batch_kill_processes(
        &self,
        pids: &[u32],
        _kill_children: bool,
        _timeout: Duration,
    ) -> Vec<TargetOutcome> {
        self.record(Call::BatchKill(pids.to_vec()));
        pids.iter()
            .map(|&pid| TargetOutcome::from_result(pid, &self.outcome(pid)))
            .collect()
    }

    async fn batch_set_priority(&self, pids: &[u32], priority: Priority) -> Vec<TargetOutcome> {
        self.record(Call::BatchSetPriority(pids.to_vec(), priority.value()));
        pids.iter()
            .map(|&pid| TargetOutcome::from_result(pid, &self.outcome(pid)))
            .collect()
    }
}
