use serde::{Deserialize, Serialize};
use std::fs;
use std::path::{Path, PathBuf};
use std::sync::{Mutex, MutexGuard};

/// 图表列显示设置
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ChartColumns {
    #[serde(default = "enabled")]
    pub cpu: bool,
    #[serde(default = "enabled")]
    pub memory: bool,
}

fn enabled() -> bool {
    true
}

fn default_theme() -> String {
    "default".to_string()
}

impl Default for ChartColumns {
    fn default() -> Self {
        Self {
            cpu: true,
            memory: true,
        }
    }
}

/// 用户偏好；respawn_pids 仅供参考，不代表后端真实状态
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Preferences {
    #[serde(default = "default_theme")]
    pub theme: String,
    #[serde(default)]
    pub chart_columns: ChartColumns,
    #[serde(default)]
    pub respawn_pids: Vec<u32>,
}

impl Default for Preferences {
    fn default() -> Self {
        Self {
            theme: default_theme(),
            chart_columns: ChartColumns::default(),
            respawn_pids: Vec::new(),
        }
    }
}

/// JSON 文件存储，写入先落临时文件再重命名
pub struct PreferenceStore {
    path: PathBuf,
    current: Mutex<Preferences>,
    /// 启动时读到的自动重启列表
    advisory_respawn: Vec<u32>,
}

impl PreferenceStore {
    pub fn load(path: impl Into<PathBuf>) -> Self {
        let path = path.into();
        let current = match fs::read_to_string(&path) {
            Ok(text) => serde_json::from_str(&text).unwrap_or_else(|e| {
                log::warn!("Ignoring unreadable preferences {}: {}", path.display(), e);
                Preferences::default()
            }),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Preferences::default(),
            Err(e) => {
                log::warn!("Failed to read preferences {}: {}", path.display(), e);
                Preferences::default()
            }
        };

        if !current.respawn_pids.is_empty() {
            log::info!(
                "Previous session had auto-respawn for PIDs {:?}; not re-subscribing",
                current.respawn_pids
            );
        }

        Self {
            path,
            advisory_respawn: current.respawn_pids.clone(),
            current: Mutex::new(current),
        }
    }

    pub fn get(&self) -> Preferences {
        self.lock().clone()
    }

    pub fn advisory_respawn_pids(&self) -> &[u32] {
        &self.advisory_respawn
    }

    /// 更新主题和图表设置，respawn_pids 由注册表维护
    pub fn update(&self, theme: String, chart_columns: ChartColumns) -> anyhow::Result<Preferences> {
        let mut current = self.lock();
        let mut next = current.clone();
        next.theme = theme;
        next.chart_columns = chart_columns;
        write_atomic(&self.path, &next)?;
        *current = next.clone();
        Ok(next)
    }

    pub fn set_respawn_pids(&self, pids: Vec<u32>) -> anyhow::Result<()> {
        let mut current = self.lock();
        if current.respawn_pids == pids {
            return Ok(());
        }
        let mut next = current.clone();
        next.respawn_pids = pids;
        write_atomic(&self.path, &next)?;
        *current = next;
        Ok(())
    }

    fn lock(&self) -> MutexGuard<'_, Preferences> {
        self.current.lock().unwrap_or_else(|e| e.into_inner())
    }
}

fn write_atomic(path: &Path, preferences: &Preferences) -> anyhow::Result<()> {
    let text = serde_json::to_string_pretty(preferences)?;
    let tmp = path.with_extension("json.tmp");
    fs::write(&tmp, text)?;
    fs::rename(&tmp, path)?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_missing_file_gives_defaults() {
        let dir = tempfile::tempdir().unwrap();
        let store = PreferenceStore::load(dir.path().join("prefs.json"));
        assert_eq!(store.get(), Preferences::default());
        assert!(store.advisory_respawn_pids().is_empty());
    }

    #[test]
    fn test_corrupt_file_gives_defaults() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("prefs.json");
        fs::write(&path, "{not json").unwrap();
        assert_eq!(PreferenceStore::load(&path).get(), Preferences::default());
    }

    #[test]
    fn test_respawn_list_is_advisory_after_reload() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("prefs.json");

        let store = PreferenceStore::load(&path);
        store.set_respawn_pids(vec![10, 30]).unwrap();
        store
            .update("dark".to_string(), ChartColumns { cpu: true, memory: false })
            .unwrap();

        let reloaded = PreferenceStore::load(&path);
        assert_eq!(reloaded.advisory_respawn_pids(), &[10, 30]);
        assert_eq!(reloaded.get().theme, "dark");
        assert!(!reloaded.get().chart_columns.memory);
    }

    #[test]
    fn test_partial_file_fills_defaults() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("prefs.json");
        fs::write(&path, r#"{"theme":"solar"}"#).unwrap();

        let prefs = PreferenceStore::load(&path).get();
        assert_eq!(prefs.theme, "solar");
        assert_eq!(prefs.chart_columns, ChartColumns::default());
    }
}
