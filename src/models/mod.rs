pub mod batch;
pub mod command;
pub mod config;
pub mod error;
pub mod process;

pub use batch::{BatchAction, BatchJob, BatchResult};
pub use command::{
    is_valid_pid, KillOutcome, Priority, ProcessLimits, RespawnPolicy, RespawnSpec, TargetOutcome, TargetStatus,
};
pub use config::SupervisorConfig;
pub use error::{GatewayError, SupervisorError};
pub use process::{ProcessKey, ProcessSnapshotEntry, SharedSnapshot, Snapshot};
