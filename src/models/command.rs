use serde::{Deserialize, Serialize};

use crate::models::error::{GatewayError, SupervisorError};

pub const MIN_NICE: i32 = -20;
pub const MAX_NICE: i32 = 19;

/// pid_t 能表示的最大 PID
pub const MAX_PID: u32 = i32::MAX as u32;
pub const MAX_KILL_TIMEOUT_SECS: u64 = 3600;

/// 0 和超出 pid_t 的值在内核里表示进程组或广播，不能当作单个进程
pub fn is_valid_pid(pid: u32) -> bool {
    pid > 0 && pid <= MAX_PID
}

/// 经过校验的 nice 值，只能通过 `Priority::new` 构造
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct Priority(i32);

impl Priority {
    pub fn new(value: i32) -> Result<Self, SupervisorError> {
        if (MIN_NICE..=MAX_NICE).contains(&value) {
            Ok(Self(value))
        } else {
            Err(SupervisorError::InvalidPriority(value))
        }
    }

    pub fn value(self) -> i32 {
        self.0
    }
}

/// 资源限制
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ProcessLimits {
    pub max_memory_mb: Option<u64>,
    pub max_open_files: Option<u64>,
}

impl ProcessLimits {
    pub fn is_empty(&self) -> bool {
        self.max_memory_mb.is_none() && self.max_open_files.is_none()
    }
}

/// 自动重启参数
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RespawnPolicy {
    #[serde(default)]
    pub args: Vec<String>,
    #[serde(default = "default_check_interval")]
    pub check_interval_secs: u64,
    #[serde(default = "default_restart_delay")]
    pub restart_delay_secs: u64,
    #[serde(default = "default_max_restarts")]
    pub max_restarts: u32,
}

fn default_check_interval() -> u64 {
    2
}

fn default_restart_delay() -> u64 {
    3
}

fn default_max_restarts() -> u32 {
    777
}

impl Default for RespawnPolicy {
    fn default() -> Self {
        Self {
            args: Vec::new(),
            check_interval_secs: default_check_interval(),
            restart_delay_secs: default_restart_delay(),
            max_restarts: default_max_restarts(),
        }
    }
}

/// 发送给网关的完整订阅
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct RespawnSpec {
    pub executable_path: String,
    pub policy: RespawnPolicy,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum KillOutcome {
    /// SIGTERM 后在超时内退出
    Graceful,
    /// 需要 SIGKILL
    Forced,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum TargetStatus {
    Succeeded,
    Failed,
    Skipped,
}

/// 批量操作中单个目标的结果
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct TargetOutcome {
    pub pid: u32,
    pub status: TargetStatus,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub kind: Option<&'static str>,
}

impl TargetOutcome {
    pub fn succeeded(pid: u32) -> Self {
        Self {
            pid,
            status: TargetStatus::Succeeded,
            error: None,
            kind: None,
        }
    }

    pub fn failed(pid: u32, error: &GatewayError) -> Self {
        Self {
            pid,
            status: TargetStatus::Failed,
            error: Some(error.to_string()),
            kind: Some(error.kind()),
        }
    }

    pub fn skipped(pid: u32, error: &SupervisorError) -> Self {
        Self {
            pid,
            status: TargetStatus::Skipped,
            error: Some(error.to_string()),
            kind: Some(error.kind()),
        }
    }

    pub fn from_result<T>(pid: u32, result: &Result<T, GatewayError>) -> Self {
        match result {
            Ok(_) => Self::succeeded(pid),
            Err(e) => Self::failed(pid, e),
        }
    }
}
