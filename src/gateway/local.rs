//! 基于 sysinfo / nix / libc 的本机进程控制后端

use async_trait::async_trait;
use nix::errno::Errno;
use nix::sys::signal::{self, Signal};
use nix::unistd::Pid as NixPid;
use std::collections::{HashMap, HashSet};
use std::path::Path;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex, MutexGuard};
use std::time::{Duration, Instant};
use sysinfo::{Pid, ProcessesToUpdate, System};
use tokio::process::Command;
use tokio::runtime::Handle;
use tokio::task::{JoinHandle, JoinSet};

use crate::gateway::{CommandGateway, EventFeed};
use crate::models::command::MAX_KILL_TIMEOUT_SECS;
use crate::models::{
    GatewayError, KillOutcome, Priority, ProcessLimits, ProcessSnapshotEntry, RespawnSpec,
    TargetOutcome,
};

const LIVENESS_STEP: Duration = Duration::from_millis(200);
const FORCE_KILL_GRACE: Duration = Duration::from_millis(300);

struct RespawnHandle {
    generation: u64,
    task: JoinHandle<()>,
}

type RespawnTable = Arc<Mutex<HashMap<u32, RespawnHandle>>>;

pub struct LocalGateway {
    system: Arc<Mutex<System>>,
    respawns: RespawnTable,
    generation: AtomicU64,
    events: EventFeed,
    runtime: Handle,
}

impl LocalGateway {
    pub fn new(events: EventFeed, runtime: Handle) -> Self {
        Self {
            system: Arc::new(Mutex::new(System::new_all())),
            respawns: Arc::new(Mutex::new(HashMap::new())),
            generation: AtomicU64::new(0),
            events,
            runtime,
        }
    }

    async fn with_system<T, F>(&self, f: F) -> Result<T, GatewayError>
    where
        T: Send + 'static,
        F: FnOnce(&mut System) -> T + Send + 'static,
    {
        let system = self.system.clone();
        tokio::task::spawn_blocking(move || {
            let mut sys = lock(&system);
            f(&mut sys)
        })
        .await
        .map_err(|e| GatewayError::Unavailable(format!("process table task failed: {}", e)))
    }

    async fn parent_links(&self) -> Result<Vec<(u32, Option<u32>)>, GatewayError> {
        self.with_system(|sys| {
            sys.refresh_processes(ProcessesToUpdate::All, true);
            sys.processes()
                .iter()
                .map(|(pid, p)| (pid.as_u32(), p.parent().map(|pp| pp.as_u32())))
                .collect()
        })
        .await
    }

    async fn kill_tree(
        &self,
        pid: u32,
        kill_children: bool,
        timeout: Duration,
    ) -> Result<KillOutcome, GatewayError> {
        // PID 0 的后代是整个进程树
        to_nix_pid(pid)?;
        if kill_children {
            let links = self.parent_links().await?;
            let descendants = descendants_by_depth(pid, &links);
            let mut index = 0;
            // 同一深度并发结束，先深后浅
            while index < descendants.len() {
                let depth = descendants[index].1;
                let mut level = JoinSet::new();
                while index < descendants.len() && descendants[index].1 == depth {
                    let child = descendants[index].0;
                    level.spawn(async move { (child, terminate(child, timeout).await) });
                    index += 1;
                }
                while let Some(joined) = level.join_next().await {
                    if let Ok((child, result)) = joined {
                        self.events.emit(describe_kill(child, depth, &result));
                    }
                }
            }
        }

        let result = terminate(pid, timeout).await;
        self.events.emit(describe_kill(pid, 0, &result));
        result
    }
}

fn lock<T>(mutex: &Mutex<T>) -> MutexGuard<'_, T> {
    mutex.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
}

fn map_errno(pid: u32, errno: Errno) -> GatewayError {
    match errno {
        Errno::ESRCH => GatewayError::NotFound(pid),
        Errno::EPERM | Errno::EACCES => GatewayError::PermissionDenied(pid),
        other => GatewayError::Unavailable(format!("PID {}: {}", pid, other)),
    }
}

/// 只接受正的 pid_t；0 和负值会变成进程组或广播
fn to_nix_pid(pid: u32) -> Result<NixPid, GatewayError> {
    match i32::try_from(pid) {
        Ok(raw) if raw > 0 => Ok(NixPid::from_raw(raw)),
        _ => Err(GatewayError::NotFound(pid)),
    }
}

/// 信号 0 探测；EPERM 说明进程存在但无权限
fn is_alive(pid: u32) -> bool {
    match to_nix_pid(pid) {
        Ok(target) => matches!(signal::kill(target, None), Ok(()) | Err(Errno::EPERM)),
        Err(_) => false,
    }
}

/// SIGTERM，等待至超时后 SIGKILL
async fn terminate(pid: u32, timeout: Duration) -> Result<KillOutcome, GatewayError> {
    let target = to_nix_pid(pid)?;
    signal::kill(target, Signal::SIGTERM).map_err(|e| map_errno(pid, e))?;

    let timeout = timeout.min(Duration::from_secs(MAX_KILL_TIMEOUT_SECS));
    let deadline = Instant::now() + timeout;
    while Instant::now() < deadline {
        tokio::time::sleep(LIVENESS_STEP).await;
        if !is_alive(pid) {
            return Ok(KillOutcome::Graceful);
        }
    }

    match signal::kill(target, Signal::SIGKILL) {
        Ok(()) => {}
        Err(Errno::ESRCH) => return Ok(KillOutcome::Graceful),
        Err(e) => return Err(map_errno(pid, e)),
    }
    tokio::time::sleep(FORCE_KILL_GRACE).await;

    if is_alive(pid) {
        Err(GatewayError::Timeout(pid))
    } else {
        Ok(KillOutcome::Forced)
    }
}

fn describe_kill(pid: u32, depth: usize, result: &Result<KillOutcome, GatewayError>) -> String {
    let indent = "  ".repeat(depth);
    match result {
        Ok(KillOutcome::Graceful) => format!("{}✅ PID {} killed gracefully (SIGTERM)", indent, pid),
        Ok(KillOutcome::Forced) => format!("{}⚠️ PID {} required force kill (SIGKILL)", indent, pid),
        Err(e) => format!("{}❌ PID {} could not be killed: {}", indent, pid, e),
    }
}

/// 按父子关系收集后代进程，返回 (pid, 深度)，深的在前
pub(crate) fn descendants_by_depth(root: u32, links: &[(u32, Option<u32>)]) -> Vec<(u32, usize)> {
    let mut children: HashMap<u32, Vec<u32>> = HashMap::new();
    for &(pid, parent) in links {
        if let Some(parent) = parent {
            if parent != pid {
                children.entry(parent).or_default().push(pid);
            }
        }
    }

    let mut collected = Vec::new();
    let mut seen = HashSet::from([root]);
    let mut stack = vec![(root, 0usize)];
    while let Some((pid, depth)) = stack.pop() {
        if let Some(kids) = children.get(&pid) {
            for &kid in kids {
                if seen.insert(kid) {
                    collected.push((kid, depth + 1));
                    stack.push((kid, depth + 1));
                }
            }
        }
    }

    collected.sort_by(|a, b| b.1.cmp(&a.1).then(a.0.cmp(&b.0)));
    collected
}

/// 读取 nice 值；进程已退出时返回 None
fn read_nice(pid: u32) -> Option<i32> {
    let target = to_nix_pid(pid).ok()?;
    // -1 也是合法的 nice 值，只能靠 errno 区分
    Errno::clear();
    let nice = unsafe { libc::getpriority(libc::PRIO_PROCESS, target.as_raw() as libc::id_t) };
    if nice == -1 && Errno::last() != Errno::UnknownErrno {
        None
    } else {
        Some(nice)
    }
}

#[cfg(target_os = "linux")]
fn apply_limits(pid: u32, limits: &ProcessLimits) -> Result<(), GatewayError> {
    let target = to_nix_pid(pid)?.as_raw();
    let check = |rc: libc::c_int| {
        if rc == 0 {
            Ok(())
        } else {
            Err(map_errno(pid, Errno::last()))
        }
    };

    if let Some(mem_mb) = limits.max_memory_mb {
        let bytes = mem_mb.saturating_mul(1024 * 1024) as libc::rlim_t;
        let limit = libc::rlimit {
            rlim_cur: bytes,
            rlim_max: bytes,
        };
        check(unsafe {
            libc::prlimit(target, libc::RLIMIT_AS, &limit, std::ptr::null_mut())
        })?;
    }

    if let Some(files) = limits.max_open_files {
        let limit = libc::rlimit {
            rlim_cur: files as libc::rlim_t,
            rlim_max: files as libc::rlim_t,
        };
        check(unsafe {
            libc::prlimit(target, libc::RLIMIT_NOFILE, &limit, std::ptr::null_mut())
        })?;
    }

    Ok(())
}

#[cfg(not(target_os = "linux"))]
fn apply_limits(_pid: u32, _limits: &ProcessLimits) -> Result<(), GatewayError> {
    Err(GatewayError::Unsupported(
        "per-process limits require Linux prlimit".to_string(),
    ))
}

/// `supervised` 为 true 时句柄释放即结束子进程
fn spawn_replacement(
    executable_path: &str,
    args: &[String],
    supervised: bool,
) -> Result<tokio::process::Child, GatewayError> {
    Command::new(executable_path)
        .args(args)
        .kill_on_drop(supervised)
        .spawn()
        .map_err(|e| GatewayError::SpawnFailed(format!("{}: {}", executable_path, e)))
}

/// 单个 PID 的自动重启循环：等原进程退出后按策略拉起替代进程
async fn supervise(pid: u32, spec: RespawnSpec, events: EventFeed) {
    let check = Duration::from_secs(spec.policy.check_interval_secs.max(1));
    let delay = Duration::from_secs(spec.policy.restart_delay_secs);

    while is_alive(pid) {
        tokio::time::sleep(check).await;
    }
    events.emit(format!("⚰️ PID {} exited, auto-respawn taking over", pid));

    let mut restarts = 0;
    while restarts < spec.policy.max_restarts {
        tokio::time::sleep(delay).await;
        restarts += 1;

        let mut child = match spawn_replacement(&spec.executable_path, &spec.policy.args, true) {
            Ok(child) => child,
            Err(e) => {
                events.emit(format!("❌ Respawn {}/{} for PID {} failed: {}", restarts, spec.policy.max_restarts, pid, e));
                continue;
            }
        };
        events.emit(format!(
            "🚀 Respawned {} as PID {} ({}/{})",
            spec.executable_path,
            child.id().unwrap_or_default(),
            restarts,
            spec.policy.max_restarts
        ));

        loop {
            tokio::time::sleep(check).await;
            match child.try_wait() {
                Ok(Some(status)) => {
                    events.emit(format!("⚰️ Respawned process for PID {} exited with {}", pid, status));
                    break;
                }
                Ok(None) => {}
                Err(e) => {
                    events.emit(format!("❌ Lost track of respawned process for PID {}: {}", pid, e));
                    break;
                }
            }
        }
    }

    events.emit(format!("🛑 Auto-respawn for PID {} finished after {} restarts", pid, restarts));
}

#[async_trait]
impl CommandGateway for LocalGateway {
    async fn list_processes(&self) -> Result<Vec<ProcessSnapshotEntry>, GatewayError> {
        self.with_system(|sys| {
            sys.refresh_processes(ProcessesToUpdate::All, true);
            sys.processes()
                .iter()
                .map(|(pid, process)| {
                    let disk = process.disk_usage();
                    ProcessSnapshotEntry {
                        pid: pid.as_u32(),
                        name: process.name().to_string_lossy().into_owned(),
                        executable_path: process
                            .exe()
                            .map(|p| p.to_string_lossy().into_owned())
                            .unwrap_or_default(),
                        cpu_percent: process.cpu_usage(),
                        memory_kb: process.memory() / 1024,
                        priority: read_nice(pid.as_u32()).unwrap_or(0),
                        read_bytes: disk.read_bytes,
                        written_bytes: disk.written_bytes,
                        total_read_bytes: disk.total_read_bytes,
                        total_written_bytes: disk.total_written_bytes,
                        start_time: Some(process.start_time()),
                    }
                })
                .collect()
        })
        .await
    }

    async fn kill_process(
        &self,
        pid: u32,
        kill_children: bool,
        timeout: Duration,
    ) -> Result<KillOutcome, GatewayError> {
        self.kill_tree(pid, kill_children, timeout).await
    }

    async fn kill_and_restart(
        &self,
        pid: u32,
        kill_children: bool,
        timeout: Duration,
        executable_path: &str,
        args: &[String],
    ) -> Result<u32, GatewayError> {
        // 下面的 kill 容忍 NotFound，非法 PID 要在这里拦下
        to_nix_pid(pid)?;
        match self.kill_tree(pid, kill_children, timeout).await {
            Ok(_) | Err(GatewayError::NotFound(_)) => {}
            Err(e) => return Err(e),
        }

        // 替代进程独立运行，tokio 在后台回收
        let child = spawn_replacement(executable_path, args, false)?;
        let new_pid = child
            .id()
            .ok_or_else(|| GatewayError::SpawnFailed(format!("{} exited immediately", executable_path)))?;
        self.events.emit(format!("🚀 Restarted process {} with PID {}", executable_path, new_pid));
        Ok(new_pid)
    }

    async fn set_priority(&self, pid: u32, priority: Priority) -> Result<(), GatewayError> {
        let target = to_nix_pid(pid)?;
        let rc = unsafe {
            libc::setpriority(libc::PRIO_PROCESS, target.as_raw() as libc::id_t, priority.value())
        };
        if rc == 0 {
            self.events.emit(format!("✅ Set PID {} nice level to {}", pid, priority.value()));
            Ok(())
        } else {
            let err = map_errno(pid, Errno::last());
            self.events.emit(format!("❌ Failed to set nice level for PID {}: {}", pid, err));
            Err(err)
        }
    }

    async fn set_limits(&self, pid: u32, limits: &ProcessLimits) -> Result<(), GatewayError> {
        if !is_alive(pid) {
            return Err(GatewayError::NotFound(pid));
        }
        let result = apply_limits(pid, limits);
        match &result {
            Ok(()) => self.events.emit(format!("✅ Applied limits to PID {}: {:?}", pid, limits)),
            Err(e) => self.events.emit(format!("❌ Failed to apply limits to PID {}: {}", pid, e)),
        }
        result
    }

    async fn start_auto_respawn(&self, pid: u32, spec: &RespawnSpec) -> Result<(), GatewayError> {
        to_nix_pid(pid)?;
        if spec.executable_path.is_empty() || !Path::new(&spec.executable_path).exists() {
            return Err(GatewayError::InvalidTarget(pid));
        }

        let generation = self.generation.fetch_add(1, Ordering::Relaxed);
        let table = self.respawns.clone();
        let events = self.events.clone();
        let spec = spec.clone();

        let previous = {
            let mut guard = lock(&self.respawns);
            let task = self.runtime.spawn(async move {
                supervise(pid, spec, events).await;
                let mut table = lock(&table);
                if table.get(&pid).map(|h| h.generation) == Some(generation) {
                    table.remove(&pid);
                }
            });
            guard.insert(pid, RespawnHandle { generation, task })
        };
        if let Some(previous) = previous {
            previous.task.abort();
            self.events.emit(format!("🔁 Auto-respawn for PID {} restarted with new settings", pid));
        } else {
            self.events.emit(format!("Auto-respawn started for PID {}", pid));
        }
        Ok(())
    }

    async fn stop_auto_respawn(&self, pid: u32) -> Result<(), GatewayError> {
        let removed = lock(&self.respawns).remove(&pid);
        match removed {
            Some(handle) => {
                handle.task.abort();
                self.events.emit(format!("🛑 Auto-respawn for PID {} stopped by user.", pid));
            }
            None => log::debug!("No auto-respawn running for PID {}", pid),
        }
        Ok(())
    }

    async fn resolve_executable_path(&self, pid: u32) -> Result<String, GatewayError> {
        to_nix_pid(pid)?;
        let path = self
            .with_system(move |sys| {
                let target = Pid::from_u32(pid);
                sys.refresh_processes(ProcessesToUpdate::Some(&[target]), true);
                sys.process(target)
                    .map(|p| p.exe().map(|e| e.to_string_lossy().into_owned()).unwrap_or_default())
            })
            .await?;

        match path {
            None => Err(GatewayError::NotFound(pid)),
            Some(path) if path.is_empty() => Err(GatewayError::InvalidTarget(pid)),
            Some(path) => Ok(path),
        }
    }

    async fn batch_kill_processes(
        &self,
        pids: &[u32],
        kill_children: bool,
        timeout: Duration,
    ) -> Vec<TargetOutcome> {
        let mut outcomes = Vec::with_capacity(pids.len());
        for &pid in pids {
            self.events.emit(format!("🔸 Killing PID {}", pid));
            let result = self.kill_tree(pid, kill_children, timeout).await;
            outcomes.push(TargetOutcome::from_result(pid, &result));
        }
        let report: Vec<String> = outcomes
            .iter()
            .map(|o| format!("PID {}: {:?}", o.pid, o.status))
            .collect();
        self.events.emit(format!("📝 Batch Kill Report:\n{}", report.join("\n")));
        outcomes
    }
}
