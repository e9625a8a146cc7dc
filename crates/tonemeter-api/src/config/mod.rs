//! Service config loader (strict parsing).
//!
//! Defaults apply when no file is named. `PORT` overrides `server.port` after
//! the file is read.

pub mod schema;

use std::{env, fs};

use tonemeter_core::error::{Result, TonemeterError};

pub use schema::{MetricsSection, ModelSection, ServerSection, ServiceConfig};

/// Path of an optional YAML config file.
pub const CONFIG_PATH_ENV: &str = "TONEMETER_CONFIG";
/// Listening port override.
pub const PORT_ENV: &str = "PORT";

/// Build the config from the environment.
pub fn load() -> Result<ServiceConfig> {
    let mut cfg = match env::var(CONFIG_PATH_ENV) {
        Ok(path) => load_from_file(&path)?,
        Err(_) => ServiceConfig::default(),
    };
    apply_port_override(&mut cfg, env::var(PORT_ENV).ok().as_deref())?;
    cfg.validate()?;
    Ok(cfg)
}

pub fn load_from_file(path: &str) -> Result<ServiceConfig> {
    let s = fs::read_to_string(path)
        .map_err(|e| TonemeterError::InvalidConfig(format!("read config failed ({path}): {e}")))?;
    load_from_str(&s)
}

pub fn load_from_str(s: &str) -> Result<ServiceConfig> {
    let cfg: ServiceConfig = serde_yaml::from_str(s)
        .map_err(|e| TonemeterError::InvalidConfig(format!("invalid yaml: {e}")))?;
    cfg.validate()?;
    Ok(cfg)
}

/// Apply a raw `PORT` value, if any.
pub fn apply_port_override(cfg: &mut ServiceConfig, raw: Option<&str>) -> Result<()> {
    let Some(raw) = raw else { return Ok(()) };
    let port: u16 = raw
        .trim()
        .parse()
        .map_err(|_| TonemeterError::InvalidConfig(format!("{PORT_ENV} must be a port number, got {raw:?}")))?;
    cfg.server.port = port;
    cfg.server.validate()
}
