use serde::Serialize;
use std::collections::VecDeque;
use std::sync::{Arc, RwLock};
use tokio::sync::mpsc;

use crate::utils::unix_millis;

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct LogLine {
    pub timestamp_ms: u64,
    pub line: String,
}

/// 后端事件的环形缓冲，满了丢弃最旧的
pub struct LogBuffer {
    capacity: usize,
    lines: RwLock<VecDeque<LogLine>>,
}

impl LogBuffer {
    pub fn new(capacity: usize) -> Self {
        Self {
            capacity: capacity.max(1),
            lines: RwLock::new(VecDeque::with_capacity(capacity)),
        }
    }

    pub fn push(&self, line: String) {
        let mut lines = self.lines.write().unwrap_or_else(|e| e.into_inner());
        lines.push_back(LogLine {
            timestamp_ms: unix_millis(),
            line,
        });
        while lines.len() > self.capacity {
            lines.pop_front();
        }
    }

    /// 最新的在前
    pub fn recent(&self) -> Vec<LogLine> {
        let lines = self.lines.read().unwrap_or_else(|e| e.into_inner());
        lines.iter().rev().cloned().collect()
    }

    /// 把事件流转发进缓冲，直到发送端全部关闭
    pub async fn forward(self: Arc<Self>, mut rx: mpsc::UnboundedReceiver<String>) {
        while let Some(line) = rx.recv().await {
            self.push(line);
        }
        log::debug!("Event feed closed");
    }
}
