//! `tdm config` – print the effective configuration.

use anyhow::Result;
use tdm_core::config::{self, TdmConfig};

pub fn run_config(cfg: &TdmConfig) -> Result<()> {
    println!("# {}", config::config_path()?.display());
    print!("{}", toml::to_string_pretty(cfg)?);
    println!("# download_dir resolves to {}", cfg.download_dir()?.display());
    Ok(())
}
