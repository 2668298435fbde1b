use anyhow::{Context, Result};
use log::warn;
use serde::{Deserialize, Serialize};
use std::{fs, path::PathBuf, sync::RwLock, time::Duration};

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct EngineSettings {
    pub tick_interval_ms: u64,
    pub remote_sync_interval_secs: u64,
    /// While running, rewrite the local snapshot every this many ticks.
    pub local_heartbeat_ticks: u32,
    pub auto_start_on_activate: bool,
    pub clear_remote_on_end: bool,
    pub local_state_key: String,
    pub host_id: Option<String>,
    pub supabase_url: Option<String>,
    pub supabase_key: Option<String>,
    pub remote_table: String,
}

impl Default for EngineSettings {
    fn default() -> Self {
        Self {
            tick_interval_ms: 1_000,
            remote_sync_interval_secs: 30,
            local_heartbeat_ticks: 10,
            auto_start_on_activate: true,
            clear_remote_on_end: false,
            local_state_key: "active_plan_state".into(),
            host_id: None,
            supabase_url: None,
            supabase_key: None,
            remote_table: "show_plans".into(),
        }
    }
}

impl EngineSettings {
    pub fn tick_interval(&self) -> Duration {
        Duration::from_millis(self.tick_interval_ms.max(1))
    }

    pub fn remote_sync_interval(&self) -> Duration {
        Duration::from_secs(self.remote_sync_interval_secs.max(1))
    }

    pub fn heartbeat_every_ticks(&self) -> u32 {
        self.local_heartbeat_ticks.max(1)
    }

    /// `SHOW_TIMELINE_DEBUG` forces a heartbeat on every tick; the Supabase
    /// variables replace the configured credentials.
    pub fn with_env_overrides(mut self) -> Self {
        let debug_mode = std::env::var("SHOW_TIMELINE_DEBUG")
            .map(|value| value == "1" || value.eq_ignore_ascii_case("true"))
            .unwrap_or(false);
        if debug_mode {
            self.local_heartbeat_ticks = 1;
        }
        if let Ok(url) = std::env::var("SUPABASE_URL") {
            if !url.trim().is_empty() {
                self.supabase_url = Some(url);
            }
        }
        if let Ok(key) = std::env::var("SUPABASE_ANON_KEY") {
            if !key.trim().is_empty() {
                self.supabase_key = Some(key);
            }
        }
        self
    }

    pub fn supabase_credentials(&self) -> Option<(&str, &str)> {
        match (self.supabase_url.as_deref(), self.supabase_key.as_deref()) {
            (Some(url), Some(key)) if !url.trim().is_empty() => Some((url, key)),
            _ => None,
        }
    }
}

pub struct SettingsStore {
    path: PathBuf,
    data: RwLock<EngineSettings>,
}

impl SettingsStore {
    pub fn new(path: PathBuf) -> Result<Self> {
        let data = if path.exists() {
            let contents = fs::read_to_string(&path)
                .with_context(|| format!("Failed to read settings from {}", path.display()))?;
            serde_json::from_str(&contents).unwrap_or_else(|err| {
                warn!("Ignoring malformed settings at {}: {}", path.display(), err);
                EngineSettings::default()
            })
        } else {
            EngineSettings::default()
        };

        Ok(Self {
            path,
            data: RwLock::new(data),
        })
    }

    pub fn settings(&self) -> EngineSettings {
        self.data
            .read()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
            .clone()
    }

    pub fn update(&self, settings: EngineSettings) -> Result<()> {
        let mut guard = self
            .data
            .write()
            .unwrap_or_else(|poisoned| poisoned.into_inner());
        *guard = settings;
        self.persist(&guard)
    }

    fn persist(&self, data: &EngineSettings) -> Result<()> {
        if let Some(parent) = self.path.parent() {
            fs::create_dir_all(parent).with_context(|| {
                format!("Failed to create settings directory {}", parent.display())
            })?;
        }
        let serialized = serde_json::to_string_pretty(data)?;
        fs::write(&self.path, serialized)
            .with_context(|| format!("Failed to write settings to {}", self.path.display()))
    }
}
