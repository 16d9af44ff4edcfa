use serde::Serialize;
use std::collections::VecDeque;
use std::sync::Mutex;
use std::sync::atomic::{AtomicU64, Ordering};
use std::time::Duration;

use crate::utils::unix_millis;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum Level {
    Info,
    Error,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Notification {
    pub id: u64,
    pub level: Level,
    pub message: String,
    pub created_at_ms: u64,
}

/// 面向用户的短暂提示，超过 ttl 自动消失
pub struct NotificationCenter {
    ttl_ms: u64,
    next_id: AtomicU64,
    items: Mutex<VecDeque<Notification>>,
}

impl NotificationCenter {
    pub fn new(ttl: Duration) -> Self {
        Self {
            ttl_ms: ttl.as_millis() as u64,
            next_id: AtomicU64::new(1),
            items: Mutex::new(VecDeque::new()),
        }
    }

    pub fn info(&self, message: impl Into<String>) -> u64 {
        self.post_at(Level::Info, message.into(), unix_millis())
    }

    pub fn error(&self, message: impl Into<String>) -> u64 {
        self.post_at(Level::Error, message.into(), unix_millis())
    }

    pub fn post_at(&self, level: Level, message: String, now_ms: u64) -> u64 {
        let id = self.next_id.fetch_add(1, Ordering::Relaxed);
        let mut items = self.items.lock().unwrap_or_else(|e| e.into_inner());
        self.prune(&mut items, now_ms);
        items.push_back(Notification {
            id,
            level,
            message,
            created_at_ms: now_ms,
        });
        id
    }

    pub fn active(&self) -> Vec<Notification> {
        self.active_at(unix_millis())
    }

    /// 清理过期条目并返回仍可见的
    pub fn active_at(&self, now_ms: u64) -> Vec<Notification> {
        let mut items = self.items.lock().unwrap_or_else(|e| e.into_inner());
        self.prune(&mut items, now_ms);
        items.iter().cloned().collect()
    }

    fn prune(&self, items: &mut VecDeque<Notification>, now_ms: u64) {
        let ttl = self.ttl_ms;
        items.retain(|n| now_ms.saturating_sub(n.created_at_ms) < ttl);
    }
}
