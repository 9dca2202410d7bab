use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::PathBuf;
use std::time::Duration;

use crate::engine::webseed::EngineOptions;
use crate::retention::DEFAULT_RETENTION;

/// Global configuration loaded from `~/.config/tdm/config.toml`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TdmConfig {
    /// Maximum number of simultaneously active transfers.
    pub max_concurrent: usize,
    /// Scheduler tick period in milliseconds.
    pub tick_interval_ms: u64,
    /// Age after which finished artifacts are deleted.
    pub retention_secs: u64,
    /// Period of the retention sweep.
    pub sweep_interval_secs: u64,
    /// Listen address of the HTTP boundary.
    pub bind: String,
    /// Artifact directory; defaults to `~/.local/share/tdm/downloads`.
    #[serde(default)]
    pub download_dir: Option<PathBuf>,
    /// Optional web-seed engine tuning; if missing, built-in defaults are used.
    #[serde(default)]
    pub engine: Option<EngineOptions>,
}

impl Default for TdmConfig {
    fn default() -> Self {
        Self {
            max_concurrent: 3,
            tick_interval_ms: 1000,
            retention_secs: DEFAULT_RETENTION.as_secs(),
            sweep_interval_secs: 60 * 60,
            bind: "127.0.0.1:3000".to_string(),
            download_dir: None,
            engine: None,
        }
    }
}

impl TdmConfig {
    pub fn tick_interval(&self) -> Duration {
        Duration::from_millis(self.tick_interval_ms)
    }

    pub fn retention(&self) -> Duration {
        Duration::from_secs(self.retention_secs)
    }

    pub fn sweep_interval(&self) -> Duration {
        Duration::from_secs(self.sweep_interval_secs)
    }

    pub fn engine_options(&self) -> EngineOptions {
        self.engine.clone().unwrap_or_default()
    }

    /// Configured artifact directory, or the XDG data default.
    pub fn download_dir(&self) -> Result<PathBuf> {
        match &self.download_dir {
            Some(dir) => Ok(dir.clone()),
            None => default_download_dir(),
        }
    }
}

pub fn default_download_dir() -> Result<PathBuf> {
    let xdg_dirs = xdg::BaseDirectories::with_prefix("tdm")?;
    Ok(xdg_dirs.get_data_home().join("downloads"))
}

pub fn config_path() -> Result<PathBuf> {
    let xdg_dirs = xdg::BaseDirectories::with_prefix("tdm")?;
    Ok(xdg_dirs.place_config_file("config.toml")?)
}

/// Load configuration from disk, creating a default file if none exists.
pub fn load_or_init() -> Result<TdmConfig> {
    let path = config_path()?;
    if !path.exists() {
        let default_cfg = TdmConfig::default();
        let toml = toml::to_string_pretty(&default_cfg)?;
        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent)?;
        }
        fs::write(&path, toml)?;
        tracing::info!("created default config at {}", path.display());
        return Ok(default_cfg);
    }

    let data = fs::read_to_string(&path)?;
    let cfg: TdmConfig =
        toml::from_str(&data).with_context(|| format!("parse {}", path.display()))?;
    Ok(cfg)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_config_values() {
        let cfg = TdmConfig::default();
        assert_eq!(cfg.max_concurrent, 3);
        assert_eq!(cfg.tick_interval(), Duration::from_secs(1));
        assert_eq!(cfg.retention(), Duration::from_secs(86_400));
        assert_eq!(cfg.sweep_interval(), Duration::from_secs(3_600));
        assert_eq!(cfg.bind, "127.0.0.1:3000");
        assert!(cfg.download_dir.is_none());
    }

    #[test]
    fn config_toml_roundtrip() {
        let cfg = TdmConfig::default();
        let toml = toml::to_string_pretty(&cfg).unwrap();
        let parsed: TdmConfig = toml::from_str(&toml).unwrap();
        assert_eq!(parsed.max_concurrent, cfg.max_concurrent);
        assert_eq!(parsed.tick_interval_ms, cfg.tick_interval_ms);
        assert_eq!(parsed.retention_secs, cfg.retention_secs);
        assert_eq!(parsed.bind, cfg.bind);
    }

    #[test]
    fn config_toml_custom_values() {
        let toml = r#"
            max_concurrent = 1
            tick_interval_ms = 250
            retention_secs = 60
            sweep_interval_secs = 30
            bind = "0.0.0.0:8080"
            download_dir = "/srv/tdm"
        "#;
        let cfg: TdmConfig = toml::from_str(toml).unwrap();
        assert_eq!(cfg.max_concurrent, 1);
        assert_eq!(cfg.tick_interval(), Duration::from_millis(250));
        assert_eq!(cfg.bind, "0.0.0.0:8080");
        assert_eq!(cfg.download_dir().unwrap(), PathBuf::from("/srv/tdm"));
        assert!(cfg.engine.is_none());
        assert_eq!(cfg.engine_options().connect_timeout_secs, 30);
    }

    #[test]
    fn config_toml_engine_section() {
        let toml = r#"
            max_concurrent = 2
            tick_interval_ms = 1000
            retention_secs = 86400
            sweep_interval_secs = 3600
            bind = "127.0.0.1:3000"

            [engine]
            connect_timeout_secs = 5
            low_speed_limit = 512
            max_recv_speed = 1_000_000
        "#;
        let cfg: TdmConfig = toml::from_str(toml).unwrap();
        let engine = cfg.engine_options();
        assert_eq!(engine.connect_timeout_secs, 5);
        assert_eq!(engine.low_speed_limit, 512);
        assert_eq!(engine.max_recv_speed, Some(1_000_000));
    }
}
