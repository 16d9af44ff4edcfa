use thiserror::Error;

/// 命令网关返回的错误
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum GatewayError {
    #[error("Process backend unavailable: {0}")]
    Unavailable(String),
    #[error("Process {0} not found")]
    NotFound(u32),
    #[error("Permission denied for PID {0}")]
    PermissionDenied(u32),
    #[error("PID {0} did not exit within the timeout")]
    Timeout(u32),
    #[error("Cannot resolve executable path for PID {0}")]
    InvalidTarget(u32),
    #[error("Failed to spawn replacement: {0}")]
    SpawnFailed(String),
    #[error("Unsupported operation: {0}")]
    Unsupported(String),
}

impl GatewayError {
    pub fn kind(&self) -> &'static str {
        match self {
            GatewayError::Unavailable(_) => "Unavailable",
            GatewayError::NotFound(_) => "NotFound",
            GatewayError::PermissionDenied(_) => "PermissionDenied",
            GatewayError::Timeout(_) => "Timeout",
            GatewayError::InvalidTarget(_) => "InvalidTarget",
            GatewayError::SpawnFailed(_) => "SpawnFailed",
            GatewayError::Unsupported(_) => "Unsupported",
        }
    }
}

/// 协调器对外的错误，校验类错误不会到达网关
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum SupervisorError {
    #[error("No target processes selected")]
    NoTargets,
    #[error("Nice level must be between -20 and 19, got {0}")]
    InvalidPriority(i32),
    #[error("At least one limit must be given")]
    InvalidLimits,
    #[error("Kill timeout must be at most 3600 seconds, got {0}")]
    InvalidTimeout(u64),
    #[error("Cannot resolve executable path for PID {0}")]
    InvalidTarget(u32),
    #[error("Process {0} not found")]
    NotFound(u32),
    #[error(transparent)]
    Gateway(#[from] GatewayError),
}

impl SupervisorError {
    pub fn kind(&self) -> &'static str {
        match self {
            SupervisorError::NoTargets => "NoTargets",
            SupervisorError::InvalidPriority(_) => "InvalidPriority",
            SupervisorError::InvalidLimits => "InvalidLimits",
            SupervisorError::InvalidTimeout(_) => "InvalidTimeout",
            SupervisorError::InvalidTarget(_) => "InvalidTarget",
            SupervisorError::NotFound(_) => "NotFound",
            SupervisorError::Gateway(e) => e.kind(),
        }
    }
}
