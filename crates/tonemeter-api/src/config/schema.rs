use std::net::{IpAddr, SocketAddr};

use serde::Deserialize;
use tonemeter_core::error::{Result, TonemeterError};
use tonemeter_core::model::DEFAULT_MODEL_NAME;

use crate::obs::metrics::{validate_buckets, DEFAULT_BUCKETS};

#[derive(Debug, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct ServiceConfig {
    pub version: u32,

    #[serde(default)]
    pub server: ServerSection,

    #[serde(default)]
    pub model: ModelSection,

    #[serde(default)]
    pub metrics: MetricsSection,
}

impl Default for ServiceConfig {
    fn default() -> Self {
        Self {
            version: 1,
            server: ServerSection::default(),
            model: ModelSection::default(),
            metrics: MetricsSection::default(),
        }
    }
}

impl ServiceConfig {
    pub fn validate(&self) -> Result<()> {
        if self.version != 1 {
            return Err(TonemeterError::InvalidConfig(format!(
                "unsupported config version: {}",
                self.version
            )));
        }
        self.server.validate()?;
        if self.model.name.trim().is_empty() {
            return Err(TonemeterError::InvalidConfig("model.name must not be empty".into()));
        }
        validate_buckets(&self.metrics.latency_buckets)
    }
}

#[derive(Debug, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct ServerSection {
    #[serde(default = "default_host")]
    pub host: String,

    #[serde(default = "default_port")]
    pub port: u16,
}

impl Default for ServerSection {
    fn default() -> Self {
        Self { host: default_host(), port: default_port() }
    }
}

impl ServerSection {
    pub fn validate(&self) -> Result<()> {
        self.host
            .parse::<IpAddr>()
            .map_err(|_| TonemeterError::InvalidConfig(format!("server.host must be an IP address: {}", self.host)))?;
        if self.port == 0 {
            return Err(TonemeterError::InvalidConfig("server.port must be non-zero".into()));
        }
        Ok(())
    }

    pub fn listen_addr(&self) -> Result<SocketAddr> {
        let ip: IpAddr = self
            .host
            .parse()
            .map_err(|_| TonemeterError::InvalidConfig(format!("server.host must be an IP address: {}", self.host)))?;
        Ok(SocketAddr::new(ip, self.port))
    }
}

fn default_host() -> String {
    "0.0.0.0".into()
}
fn default_port() -> u16 {
    8000
}

#[derive(Debug, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct ModelSection {
    #[serde(default = "default_model_name")]
    pub name: String,
}

impl Default for ModelSection {
    fn default() -> Self {
        Self { name: default_model_name() }
    }
}

fn default_model_name() -> String {
    DEFAULT_MODEL_NAME.into()
}

#[derive(Debug, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct MetricsSection {
    /// Histogram upper bounds in seconds.
    #[serde(default = "default_latency_buckets")]
    pub latency_buckets: Vec<f64>,
}

impl Default for MetricsSection {
    fn default() -> Self {
        Self { latency_buckets: default_latency_buckets() }
    }
}

fn default_latency_buckets() -> Vec<f64> {
    DEFAULT_BUCKETS.to_vec()
}
