use std::path::PathBuf;
use std::time::Duration;

/// 各服务使用的运行参数
#[derive(Debug, Clone)]
pub struct SupervisorConfig {
    pub poll_interval: Duration,
    pub watch_interval: Duration,
    pub history_capacity: usize,
    /// 连续缺席多少次快照后清理历史
    pub history_grace_polls: u32,
    pub kill_timeout: Duration,
    /// 监视列表是否对进行中的 kill 去重
    pub dedup_kills: bool,
    pub log_capacity: usize,
    pub notification_ttl: Duration,
    pub preferences_path: PathBuf,
}

impl Default for SupervisorConfig {
    fn default() -> Self {
        Self {
            poll_interval: Duration::from_millis(2000),
            watch_interval: Duration::from_millis(1000),
            history_capacity: 20,
            history_grace_polls: 3,
            kill_timeout: Duration::from_secs(5),
            dedup_kills: false,
            log_capacity: 200,
            notification_ttl: Duration::from_secs(5),
            preferences_path: PathBuf::from("process-supervisor.json"),
        }
    }
}
