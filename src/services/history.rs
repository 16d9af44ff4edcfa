use serde::Serialize;
use std::collections::{HashMap, VecDeque};
use std::sync::RwLock;

use crate::models::{ProcessKey, Snapshot};

/// 单个采样点
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct Sample {
    /// Unix 毫秒
    pub timestamp_ms: u64,
    pub cpu_percent: f32,
    pub memory_kb: u64,
}

#[derive(Debug, Default)]
struct Series {
    samples: VecDeque<Sample>,
    /// 连续缺席的快照数
    missed: u32,
}

/// 每个进程固定容量的 CPU / 内存历史
///
/// 只有快照轮询会写入，读取方拿到的是拷贝。
pub struct HistoryStore {
    capacity: usize,
    grace_polls: u32,
    series: RwLock<HashMap<ProcessKey, Series>>,
}

impl HistoryStore {
    pub fn new(capacity: usize, grace_polls: u32) -> Self {
        Self {
            capacity: capacity.max(1),
            grace_polls: grace_polls.max(1),
            series: RwLock::new(HashMap::new()),
        }
    }

    /// 记录一次快照，返回当前保留的序列数
    pub fn record(&self, snapshot: &Snapshot, now_ms: u64) -> usize {
        let mut map = self.series.write().unwrap_or_else(|e| e.into_inner());

        for entry in snapshot.iter() {
            let series = map.entry(entry.key()).or_default();
            if series.missed > 0 {
                // 缺席后重新出现的 PID 视为新进程
                series.samples.clear();
                series.missed = 0;
            }

            let last = series.samples.back().map(|s| s.timestamp_ms).unwrap_or(0);
            series.samples.push_back(Sample {
                timestamp_ms: now_ms.max(last),
                cpu_percent: entry.cpu_percent,
                memory_kb: entry.memory_kb,
            });
            while series.samples.len() > self.capacity {
                series.samples.pop_front();
            }
        }

        let grace = self.grace_polls;
        map.retain(|key, series| {
            let present = snapshot
                .get(key.pid)
                .map(|e| e.start_time == key.start_time)
                .unwrap_or(false);
            if !present {
                series.missed += 1;
            }
            series.missed < grace
        });

        map.len()
    }

    /// 按 PID 读取历史，未知 PID 返回空序列
    pub fn series(&self, pid: u32) -> Vec<Sample> {
        let map = self.series.read().unwrap_or_else(|e| e.into_inner());
        map.iter()
            .filter(|(key, _)| key.pid == pid)
            .min_by_key(|(_, series)| series.missed)
            .map(|(_, series)| series.samples.iter().copied().collect())
            .unwrap_or_default()
    }

    pub fn series_for(&self, key: &ProcessKey) -> Vec<Sample> {
        let map = self.series.read().unwrap_or_else(|e| e.into_inner());
        map.get(key)
            .map(|series| series.samples.iter().copied().collect())
            .unwrap_or_default()
    }

    pub fn len(&self) -> usize {
        self.series.read().unwrap_or_else(|e| e.into_inner()).len()
    }
}
