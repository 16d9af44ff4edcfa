use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::sync::Arc;

/// 单次轮询时的一个进程
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ProcessSnapshotEntry {
    pub pid: u32,
    pub name: String,
    /// 可执行文件路径，无法解析时为空字符串
    #[serde(default)]
    pub executable_path: String,
    pub cpu_percent: f32,
    pub memory_kb: u64,
    /// nice 值，[-20, 19]
    #[serde(default)]
    pub priority: i32,
    #[serde(default)]
    pub read_bytes: u64,
    #[serde(default)]
    pub written_bytes: u64,
    #[serde(default)]
    pub total_read_bytes: u64,
    #[serde(default)]
    pub total_written_bytes: u64,
    /// 进程启动时间（Unix 秒），后端无法提供时为 None
    #[serde(default)]
    pub start_time: Option<u64>,
}

impl ProcessSnapshotEntry {
    pub fn key(&self) -> ProcessKey {
        ProcessKey {
            pid: self.pid,
            start_time: self.start_time,
        }
    }
}

/// 进程身份：PID 加启动时间，用来区分 PID 复用
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize)]
pub struct ProcessKey {
    pub pid: u32,
    pub start_time: Option<u64>,
}

/// 一次完整的进程快照，发布后不可变
#[derive(Debug, Clone, Default, Serialize)]
pub struct Snapshot {
    /// 采集时间（Unix 毫秒）
    pub taken_at_ms: u64,
    pub entries: BTreeMap<u32, ProcessSnapshotEntry>,
}

pub type SharedSnapshot = Arc<Snapshot>;

impl Snapshot {
    /// 由后端返回的列表构建快照，重复的 PID 以最后一条为准
    pub fn from_entries(taken_at_ms: u64, list: Vec<ProcessSnapshotEntry>) -> Self {
        let mut entries = BTreeMap::new();
        for entry in list {
            if let Some(previous) = entries.insert(entry.pid, entry) {
                log::warn!("Duplicate PID {} in process list, keeping the last entry", previous.pid);
            }
        }
        Self { taken_at_ms, entries }
    }

    pub fn get(&self, pid: u32) -> Option<&ProcessSnapshotEntry> {
        self.entries.get(&pid)
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn iter(&self) -> impl Iterator<Item = &ProcessSnapshotEntry> {
        self.entries.values()
    }
}

#[cfg(test)]
pub fn entry(pid: u32, name: &str) -> ProcessSnapshotEntry {
    ProcessSnapshotEntry {
        pid,
        name: name.to_string(),
        executable_path: format!("/usr/bin/{}", name),
        cpu_percent: 0.0,
        memory_kb: 0,
        priority: 0,
        read_bytes: 0,
        written_bytes: 0,
        total_read_bytes: 0,
        total_written_bytes: 0,
        start_time: None,
    }
}
