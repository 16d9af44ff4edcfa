use std::collections::{BTreeSet, HashMap};
use std::sync::{Arc, Mutex, MutexGuard, Weak};
use std::time::Duration;
use tokio::runtime::Handle;
use tokio::sync::watch;
use tokio::task::JoinHandle;
use tokio::time::{Instant, MissedTickBehavior};

use crate::gateway::SharedGateway;
use crate::metrics::METRICS;
use crate::models::{GatewayError, KillOutcome, SharedSnapshot, Snapshot};

#[derive(Debug, Clone, Copy, PartialEq, Eq, serde::Serialize)]
#[serde(rename_all = "snake_case")]
pub enum EnforcerState {
    /// 列表为空，无定时器
    Idle,
    Active,
}

struct WatchState {
    names: BTreeSet<String>,
    timer: Option<JoinHandle<()>>,
}

pub type KillHandle = JoinHandle<(u32, Result<KillOutcome, GatewayError>)>;

/// 一次执行的结果；kill 任务已派发，调用方可以选择等待
pub struct EnforcementTick {
    pub targets: Vec<u32>,
    pub kills: Vec<KillHandle>,
}

impl EnforcementTick {
    pub async fn settle(self) -> Vec<(u32, Result<KillOutcome, GatewayError>)> {
        let mut results = Vec::with_capacity(self.kills.len());
        for handle in self.kills {
            if let Ok(result) = handle.await {
                results.push(result);
            }
        }
        results
    }
}

/// 按进程名结束进程的监视列表
pub struct WatchlistEnforcer {
    gateway: SharedGateway,
    snapshots: watch::Receiver<SharedSnapshot>,
    state: Mutex<WatchState>,
    period: Duration,
    kill_timeout: Duration,
    dedup: bool,
    in_flight: Arc<Mutex<HashMap<u32, Instant>>>,
    runtime: Handle,
}

fn lock<T>(mutex: &Mutex<T>) -> MutexGuard<'_, T> {
    mutex.lock().unwrap_or_else(|e| e.into_inner())
}

impl WatchlistEnforcer {
    pub fn new(
        gateway: SharedGateway,
        snapshots: watch::Receiver<SharedSnapshot>,
        period: Duration,
        kill_timeout: Duration,
        dedup: bool,
        runtime: Handle,
    ) -> Self {
        Self {
            gateway,
            snapshots,
            state: Mutex::new(WatchState {
                names: BTreeSet::new(),
                timer: None,
            }),
            period,
            kill_timeout,
            dedup,
            in_flight: Arc::new(Mutex::new(HashMap::new())),
            runtime,
        }
    }

    /// 加入名称；第一个名称会启动定时器。返回是否新加入
    pub fn add(self: &Arc<Self>, name: &str) -> bool {
        let mut state = lock(&self.state);
        if !state.names.insert(name.to_string()) {
            return false;
        }
        if state.timer.is_none() {
            log::info!("Watchlist active, enforcing every {:?}", self.period);
            state.timer = Some(self.runtime.spawn(enforce_loop(Arc::downgrade(self), self.period)));
        }
        METRICS.watchlist_names.set(state.names.len() as i64);
        true
    }

    /// 移除名称；最后一个名称移除时立即停止定时器
    pub fn remove(&self, name: &str) -> bool {
        let mut state = lock(&self.state);
        if !state.names.remove(name) {
            return false;
        }
        if state.names.is_empty() {
            if let Some(timer) = state.timer.take() {
                timer.abort();
                log::info!("Watchlist empty, enforcement stopped");
            }
        }
        METRICS.watchlist_names.set(state.names.len() as i64);
        true
    }

    pub fn names(&self) -> Vec<String> {
        lock(&self.state).names.iter().cloned().collect()
    }

    pub fn state(&self) -> EnforcerState {
        if lock(&self.state).timer.is_some() {
            EnforcerState::Active
        } else {
            EnforcerState::Idle
        }
    }

    /// 对快照中所有匹配名称的进程派发 kill，不等待完成
    pub fn tick(&self, snapshot: &Snapshot) -> EnforcementTick {
        let names = lock(&self.state).names.clone();
        let mut tick = EnforcementTick {
            targets: Vec::new(),
            kills: Vec::new(),
        };
        if names.is_empty() {
            return tick;
        }

        let now = Instant::now();
        for entry in snapshot.iter().filter(|e| names.contains(&e.name)) {
            let pid = entry.pid;
            if self.dedup {
                let mut in_flight = lock(&self.in_flight);
                match in_flight.get(&pid) {
                    Some(&since) if now.duration_since(since) < self.kill_timeout => {
                        log::debug!("Kill for PID {} still in flight, not re-sending", pid);
                        continue;
                    }
                    _ => {
                        in_flight.insert(pid, now);
                    }
                }
            }

            log::info!("☠️ Watchlist match '{}' (PID {}), killing", entry.name, pid);
            METRICS.watchlist_kills_total.inc();
            let gateway = self.gateway.clone();
            let in_flight = self.in_flight.clone();
            let timeout = self.kill_timeout;
            let dedup = self.dedup;
            tick.targets.push(pid);
            tick.kills.push(self.runtime.spawn(async move {
                let result = gateway.kill_process(pid, true, timeout).await;
                if let Err(e) = &result {
                    log::warn!("Watchlist kill of PID {} failed: {}", pid, e);
                }
                if dedup {
                    lock(&in_flight).remove(&pid);
                }
                (pid, result)
            }));
        }
        tick
    }
}

async fn enforce_loop(enforcer: Weak<WatchlistEnforcer>, period: Duration) {
    let mut interval = tokio::time::interval(period);
    interval.set_missed_tick_behavior(MissedTickBehavior::Skip);
    loop {
        interval.tick().await;
        let Some(enforcer) = enforcer.upgrade() else {
            break;
        };
        let snapshot = enforcer.snapshots.borrow().clone();
        // kill 任务在后台运行
        drop(enforcer.tick(&snapshot));
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::gateway::mock::MockGateway;
    use crate::models::process::entry;

    fn enforcer(
        mock: Arc<MockGateway>,
        dedup: bool,
    ) -> (Arc<WatchlistEnforcer>, watch::Sender<SharedSnapshot>) {
        let (tx, rx) = watch::channel(Arc::new(Snapshot::default()));
        let enforcer = WatchlistEnforcer::new(
            mock,
            rx,
            Duration::from_millis(1000),
            Duration::from_secs(5),
            dedup,
            Handle::current(),
        );
        (Arc::new(enforcer), tx)
    }

    #[tokio::test]
    async fn test_kills_only_matching_names() {
        let mock = Arc::new(MockGateway::new());
        let (enforcer, _tx) = enforcer(mock.clone(), false);
        enforcer.add("bad.exe");

        let snapshot = Snapshot::from_entries(0, vec![entry(100, "bad.exe"), entry(200, "good.exe")]);
        let tick = enforcer.tick(&snapshot);
        assert_eq!(tick.targets, vec![100]);
        tick.settle().await;

        assert_eq!(mock.kills(), vec![100]);
    }

    #[tokio::test]
    async fn test_name_match_is_case_sensitive() {
        let mock = Arc::new(MockGateway::new());
        let (enforcer, _tx) = enforcer(mock.clone(), false);
        enforcer.add("Bad.exe");

        let snapshot = Snapshot::from_entries(0, vec![entry(1, "bad.exe")]);
        assert!(enforcer.tick(&snapshot).targets.is_empty());
    }

    #[tokio::test]
    async fn test_state_follows_membership() {
        let mock = Arc::new(MockGateway::new());
        let (enforcer, _tx) = enforcer(mock, false);
        assert_eq!(enforcer.state(), EnforcerState::Idle);

        assert!(enforcer.add("a"));
        assert!(!enforcer.add("a"));
        assert!(enforcer.add("b"));
        assert_eq!(enforcer.state(), EnforcerState::Active);

        assert!(enforcer.remove("a"));
        assert_eq!(enforcer.state(), EnforcerState::Active);
        assert!(enforcer.remove("b"));
        assert!(!enforcer.remove("b"));
        assert_eq!(enforcer.state(), EnforcerState::Idle);
        assert!(enforcer.names().is_empty());
    }

    #[tokio::test(start_paused = true)]
    async fn test_timer_kills_within_two_ticks_and_stops() {
        let mock = Arc::new(MockGateway::new());
        let (enforcer, tx) = enforcer(mock.clone(), false);
        enforcer.add("bad.exe");
        tokio::time::sleep(Duration::from_millis(10)).await;
        assert!(mock.kills().is_empty());

        tx.send_replace(Arc::new(Snapshot::from_entries(0, vec![entry(100, "bad.exe")])));
        tokio::time::sleep(Duration::from_millis(2000)).await;
        assert!(mock.kills().contains(&100));

        enforcer.remove("bad.exe");
        let issued = mock.kills().len();
        tokio::time::sleep(Duration::from_secs(10)).await;
        assert_eq!(mock.kills().len(), issued);
    }

    #[tokio::test(start_paused = true)]
    async fn test_redundant_kills_without_dedup() {
        let mock = Arc::new(MockGateway::new());
        *mock.kill_delay.lock().unwrap() = Some(Duration::from_secs(3));
        let (enforcer, _tx) = enforcer(mock.clone(), false);
        enforcer.add("bad.exe");
        let snapshot = Snapshot::from_entries(0, vec![entry(100, "bad.exe")]);

        let first = enforcer.tick(&snapshot);
        let second = enforcer.tick(&snapshot);
        assert_eq!(first.targets, vec![100]);
        assert_eq!(second.targets, vec![100]);
    }

    #[tokio::test(start_paused = true)]
    async fn test_dedup_skips_in_flight_kill() {
        let mock = Arc::new(MockGateway::new());
        *mock.kill_delay.lock().unwrap() = Some(Duration::from_secs(3));
        let (enforcer, _tx) = enforcer(mock.clone(), true);
        enforcer.add("bad.exe");
        let snapshot = Snapshot::from_entries(0, vec![entry(100, "bad.exe")]);

        let first = enforcer.tick(&snapshot);
        assert_eq!(first.targets, vec![100]);
        assert!(enforcer.tick(&snapshot).targets.is_empty());

        first.settle().await;
        assert_eq!(enforcer.tick(&snapshot).targets, vec![100]);
    }
}
