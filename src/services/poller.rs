use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::watch;
use tokio::time::MissedTickBehavior;

use crate::gateway::SharedGateway;
use crate::metrics::METRICS;
use crate::models::{GatewayError, SharedSnapshot, Snapshot};
use crate::services::history::HistoryStore;
use crate::utils::unix_millis;

#[derive(Debug, Clone, PartialEq)]
pub enum PollOutcome {
    Published(usize),
    Failed(GatewayError),
    /// 上一次拉取仍未完成
    Skipped,
}

/// tick 结束（包括被取消或 panic）时清除 in_flight
struct InFlight<'a>(&'a AtomicBool);

impl Drop for InFlight<'_> {
    fn drop(&mut self) {
        self.0.store(false, Ordering::Release);
    }
}

/// 周期性拉取进程列表并整体替换快照
pub struct SnapshotPoller {
    gateway: SharedGateway,
    history: Arc<HistoryStore>,
    publisher: watch::Sender<SharedSnapshot>,
    in_flight: AtomicBool,
}

impl SnapshotPoller {
    pub fn new(gateway: SharedGateway, history: Arc<HistoryStore>) -> Self {
        let (publisher, _) = watch::channel(Arc::new(Snapshot::default()));
        Self {
            gateway,
            history,
            publisher,
            in_flight: AtomicBool::new(false),
        }
    }

    /// 当前快照，发布后不可变
    pub fn current(&self) -> SharedSnapshot {
        self.publisher.borrow().clone()
    }

    pub fn subscribe(&self) -> watch::Receiver<SharedSnapshot> {
        self.publisher.subscribe()
    }

    pub async fn tick(&self) -> PollOutcome {
        if self.in_flight.swap(true, Ordering::AcqRel) {
            log::debug!("Previous process fetch still outstanding, skipping tick");
            METRICS.record_poll("skipped");
            return PollOutcome::Skipped;
        }
        let _in_flight = InFlight(&self.in_flight);

        let result = self.gateway.list_processes().await;
        match result {
            Ok(list) => {
                let now = unix_millis();
                let snapshot = Arc::new(Snapshot::from_entries(now, list));
                let count = snapshot.len();
                let series = self.history.record(&snapshot, now);
                self.publisher.send_replace(snapshot);

                METRICS.snapshot_processes.set(count as i64);
                METRICS.history_series.set(series as i64);
                METRICS.record_poll("published");
                PollOutcome::Published(count)
            }
            Err(e) => {
                log::warn!("Failed to list processes, keeping previous snapshot: {}", e);
                METRICS.record_poll("failed");
                PollOutcome::Failed(e)
            }
        }
    }

    /// 轮询循环；每个 tick 独立运行，慢请求不会推迟下一个 tick
    pub async fn run(self: Arc<Self>, period: Duration) {
        let mut interval = tokio::time::interval(period);
        interval.set_missed_tick_behavior(MissedTickBehavior::Skip);
        loop {
            interval.tick().await;
            let poller = self.clone();
            tokio::spawn(async move {
                poller.tick().await;
            });
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::gateway::mock::MockGateway;
    use crate::models::process::entry;

    fn poller_with(mock: Arc<MockGateway>) -> Arc<SnapshotPoller> {
        Arc::new(SnapshotPoller::new(mock, Arc::new(HistoryStore::new(20, 3))))
    }

    #[tokio::test]
    async fn test_publishes_snapshot() {
        let mock = Arc::new(MockGateway::with_processes(vec![entry(1, "a"), entry(2, "b")]));
        let poller = poller_with(mock.clone());
        let mut rx = poller.subscribe();

        assert_eq!(poller.tick().await, PollOutcome::Published(2));
        assert!(rx.has_changed().unwrap());
        assert_eq!(rx.borrow_and_update().len(), 2);
        assert_eq!(poller.current().get(2).map(|e| e.name.as_str()), Some("b"));
        assert_eq!(poller.history.series(1).len(), 1);
    }

    #[tokio::test]
    async fn test_failure_keeps_previous_snapshot() {
        let mock = Arc::new(MockGateway::with_processes(vec![entry(1, "a")]));
        let poller = poller_with(mock.clone());
        poller.tick().await;

        *mock.processes.lock().unwrap() = Err(GatewayError::Unavailable("down".into()));
        let outcome = poller.tick().await;

        assert_eq!(outcome, PollOutcome::Failed(GatewayError::Unavailable("down".into())));
        assert_eq!(poller.current().len(), 1);

        // 下一次 tick 无条件重试
        *mock.processes.lock().unwrap() = Ok(vec![entry(1, "a"), entry(3, "c")]);
        assert_eq!(poller.tick().await, PollOutcome::Published(2));
    }

    #[tokio::test(start_paused = true)]
    async fn test_overlapping_tick_is_skipped() {
        let mock = Arc::new(MockGateway::with_processes(vec![entry(1, "a")]));
        *mock.list_delay.lock().unwrap() = Some(Duration::from_secs(3));
        let poller = poller_with(mock.clone());

        let slow = {
            let poller = poller.clone();
            tokio::spawn(async move { poller.tick().await })
        };
        tokio::task::yield_now().await;

        assert_eq!(poller.tick().await, PollOutcome::Skipped);
        assert_eq!(slow.await.unwrap(), PollOutcome::Published(1));
        assert_eq!(mock.calls().len(), 1);
    }

    #[tokio::test(start_paused = true)]
    async fn test_cancelled_tick_releases_guard() {
        let mock = Arc::new(MockGateway::with_processes(vec![entry(1, "a")]));
        *mock.list_delay.lock().unwrap() = Some(Duration::from_secs(3));
        let poller = poller_with(mock.clone());

        let slow = {
            let poller = poller.clone();
            tokio::spawn(async move { poller.tick().await })
        };
        tokio::task::yield_now().await;
        slow.abort();
        assert!(slow.await.unwrap_err().is_cancelled());

        *mock.list_delay.lock().unwrap() = None;
        assert_eq!(poller.tick().await, PollOutcome::Published(1));
    }
}
