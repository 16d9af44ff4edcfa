use clap::Parser;
use std::path::PathBuf;
use std::time::Duration;

use crate::models::SupervisorConfig;

/// Process Supervisor - 进程监视、监视列表查杀与自动重启
#[derive(Parser, Debug)]
#[command(author, version, about, long_about = None)]
pub struct CommandArgs {
    /// 监听端口
    #[arg(short, long, env = "PORT", default_value_t = 9898)]
    pub port: u16,

    /// 监听地址
    #[arg(short = 'a', long, env = "ADDRESS", default_value = "127.0.0.1")]
    pub address: String,

    /// 快照轮询间隔（毫秒）
    #[arg(long, env = "POLL_INTERVAL_MS", default_value_t = 2000)]
    pub poll_interval_ms: u64,

    /// 监视列表检查间隔（毫秒）
    #[arg(long, env = "WATCH_INTERVAL_MS", default_value_t = 1000)]
    pub watch_interval_ms: u64,

    /// 每个进程保留的历史采样数
    #[arg(long, env = "HISTORY_CAPACITY", default_value_t = 20)]
    pub history_capacity: usize,

    /// 进程连续缺席多少次快照后清理其历史
    #[arg(long, env = "HISTORY_GRACE_POLLS", default_value_t = 3)]
    pub history_grace_polls: u32,

    /// SIGTERM 后等待退出的秒数
    #[arg(long, env = "KILL_TIMEOUT_SECS", default_value_t = 5)]
    pub kill_timeout_secs: u64,

    /// 监视列表对进行中的 kill 去重
    #[arg(long, env = "DEDUP_KILLS", default_value_t = false)]
    pub dedup_kills: bool,

    /// 事件日志保留行数
    #[arg(long, env = "LOG_CAPACITY", default_value_t = 200)]
    pub log_capacity: usize,

    /// 提示自动消失的秒数
    #[arg(long, env = "NOTIFICATION_TTL_SECS", default_value_t = 5)]
    pub notification_ttl_secs: u64,

    /// 偏好设置文件
    #[arg(long = "preferences", env = "PREFERENCES_PATH", default_value = "process-supervisor.json")]
    pub preferences_path: PathBuf,
}

impl From<&CommandArgs> for SupervisorConfig {
    fn from(args: &CommandArgs) -> Self {
        Self {
            poll_interval: Duration::from_millis(args.poll_interval_ms.max(1)),
            watch_interval: Duration::from_millis(args.watch_interval_ms.max(1)),
            history_capacity: args.history_capacity,
            history_grace_polls: args.history_grace_polls,
            kill_timeout: Duration::from_secs(args.kill_timeout_secs),
            dedup_kills: args.dedup_kills,
            log_capacity: args.log_capacity,
            notification_ttl: Duration::from_secs(args.notification_ttl_secs),
            preferences_path: args.preferences_path.clone(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults_match_config_defaults() {
        let args = CommandArgs::parse_from(["process-supervisor"]);
        let config = SupervisorConfig::from(&args);
        let defaults = SupervisorConfig::default();

        assert_eq!(config.poll_interval, defaults.poll_interval);
        assert_eq!(config.watch_interval, defaults.watch_interval);
        assert_eq!(config.history_capacity, defaults.history_capacity);
        assert_eq!(config.kill_timeout, defaults.kill_timeout);
        assert_eq!(config.log_capacity, defaults.log_capacity);
        assert!(!config.dedup_kills);
    }

    #[test]
    fn test_flags_override() {
        let args = CommandArgs::parse_from([
            "process-supervisor",
            "--poll-interval-ms",
            "500",
            "--dedup-kills",
            "--preferences",
            "/tmp/p.json",
        ]);
        let config = SupervisorConfig::from(&args);
        assert_eq!(config.poll_interval, Duration::from_millis(500));
        assert!(config.dedup_kills);
        assert_eq!(config.preferences_path, PathBuf::from("/tmp/p.json"));
    }
}
