//! CLI command handlers, one file per command.

mod config;
mod serve;
mod sweep;

pub use config::run_config;
pub use serve::run_serve;
pub use sweep::run_sweep;
