//! Shared application state.
//!
//! Holds the config, the trained classifier, and the metrics handles. Built
//! once at startup; every request sees the same instances through `Arc`.

use std::sync::Arc;

use tonemeter_core::error::Result;
use tonemeter_core::model::{Classifier, SentimentModel};

use crate::config::ServiceConfig;
use crate::obs::{ApiMetrics, Registry};

#[derive(Clone)]
pub struct AppState {
    inner: Arc<AppStateInner>,
}

struct AppStateInner {
    cfg: ServiceConfig,
    classifier: Arc<dyn Classifier>,
    metrics: Arc<ApiMetrics>,
}

impl AppState {
    /// Train the built-in model and register metrics into a fresh registry.
    pub fn new(cfg: ServiceConfig) -> Result<Self> {
        let model = SentimentModel::train_named(cfg.model.name.clone())?;
        tracing::info!(model = %cfg.model.name, features = model.feature_count(), "model ready");
        Self::with_classifier(cfg, Arc::new(model))
    }

    /// Build state around an already constructed classifier.
    pub fn with_classifier(cfg: ServiceConfig, classifier: Arc<dyn Classifier>) -> Result<Self> {
        let registry = Arc::new(Registry::new());
        let metrics = ApiMetrics::register(registry, &cfg.metrics.latency_buckets)?;

        Ok(Self {
            inner: Arc::new(AppStateInner { cfg, classifier, metrics: Arc::new(metrics) }),
        })
    }

    pub fn cfg(&self) -> &ServiceConfig {
        &self.inner.cfg
    }

    pub fn classifier(&self) -> Arc<dyn Classifier> {
        Arc::clone(&self.inner.classifier)
    }

    pub fn metrics(&self) -> Arc<ApiMetrics> {
        Arc::clone(&self.inner.metrics)
    }
}
