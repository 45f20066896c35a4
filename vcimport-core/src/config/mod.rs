//! Configuration management
//!
//! `ConfigManager` loads `config.toml` from the user configuration
//! directory (or `--config DIR`) into [`AppSettings`].

mod manager;
pub mod settings;

pub use manager::ConfigManager;
pub use settings::{
    AppSettings, ENV_ONE_AUTH, ENV_ONE_XMLRPC, LoggingSettings, OneSettings, VcenterSettings,
};
