//! In-process metrics registry.
//!
//! Counter/gauge/histogram families with a fixed label schema, backed by
//! `DashMap` shards of atomics so concurrent updates are never lost. Series are
//! keyed by label values in schema order. Histogram buckets are kept in
//! nanoseconds to avoid floating point math on the hot path and rendered in
//! seconds.

use std::fmt::Write;
use std::sync::atomic::{AtomicI64, AtomicU64, Ordering};
use std::sync::Arc;
use std::time::Duration;

use dashmap::mapref::entry::Entry;
use dashmap::DashMap;

use tonemeter_core::error::{Result, TonemeterError};

/// Default latency buckets in seconds.
pub const DEFAULT_BUCKETS: [f64; 14] = [
    0.005, 0.01, 0.025, 0.05, 0.075, 0.1, 0.25, 0.5, 0.75, 1.0, 2.5, 5.0, 7.5, 10.0,
];

/// Helper to escape label values.
fn escape_label(v: &str) -> String {
    v.replace('\\', "\\\\").replace('"', "\\\"").replace('\n', "\\n")
}

fn escape_help(v: &str) -> String {
    v.replace('\\', "\\\\").replace('\n', "\\n")
}

/// `{a="x",b="y"}`, or an empty string when there are no labels.
fn label_block(names: &[String], values: &[String], extra: Option<(&str, &str)>) -> String {
    let mut pairs: Vec<String> = names
        .iter()
        .zip(values)
        .map(|(k, v)| format!("{}=\"{}\"", k, escape_label(v)))
        .collect();
    if let Some((k, v)) = extra {
        pairs.push(format!("{}=\"{}\"", k, escape_label(v)));
    }
    if pairs.is_empty() {
        String::new()
    } else {
        format!("{{{}}}", pairs.join(","))
    }
}

fn valid_name(name: &str) -> bool {
    let mut chars = name.chars();
    match chars.next() {
        Some(c) if c.is_ascii_alphabetic() || c == '_' || c == ':' => {}
        _ => return false,
    }
    chars.all(|c| c.is_ascii_alphanumeric() || c == '_' || c == ':')
}

/// Write `# HELP` / `# TYPE` header lines.
pub(crate) fn write_header(out: &mut String, name: &str, help: &str, kind: &str) {
    let _ = writeln!(out, "# HELP {} {}", name, escape_help(help));
    let _ = writeln!(out, "# TYPE {} {}", name, kind);
}

/// Metric type plus the shape that must match on re-registration.
#[derive(Debug, Clone, PartialEq)]
pub enum MetricKind {
    Counter,
    Gauge,
    /// Upper bounds in seconds, strictly increasing.
    Histogram(Vec<f64>),
}

#[derive(Debug, Clone)]
struct Desc {
    name: String,
    help: String,
    labels: Vec<String>,
}

impl Desc {
    /// Owned series key, or `None` when the arity does not match the schema.
    fn key(&self, values: &[&str]) -> Option<Vec<String>> {
        if values.len() != self.labels.len() {
            tracing::warn!(
                metric = %self.name,
                expected = self.labels.len(),
                got = values.len(),
                "label value count does not match schema; observation dropped"
            );
            return None;
        }
        Some(values.iter().map(|v| v.to_string()).collect())
    }

    fn sorted_keys<V>(map: &DashMap<Vec<String>, V>) -> Vec<Vec<String>> {
        let mut keys: Vec<Vec<String>> = map.iter().map(|r| r.key().clone()).collect();
        keys.sort();
        keys
    }
}

pub struct CounterVec {
    desc: Desc,
    map: DashMap<Vec<String>, AtomicU64>,
}

impl CounterVec {
    fn new(desc: Desc) -> Self {
        let map = DashMap::new();
        if desc.labels.is_empty() {
            map.insert(Vec::new(), AtomicU64::new(0));
        }
        Self { desc, map }
    }

    /// Increment by 1.
    pub fn inc(&self, values: &[&str]) {
        self.add(values, 1);
    }

    /// Increment by an arbitrary value.
    pub fn add(&self, values: &[&str], v: u64) {
        let Some(key) = self.desc.key(values) else { return };
        let counter = self.map.entry(key).or_insert_with(|| AtomicU64::new(0));
        counter.fetch_add(v, Ordering::Relaxed);
    }

    /// Current value of one series (0 if never touched).
    pub fn get(&self, values: &[&str]) -> u64 {
        let key: Vec<String> = values.iter().map(|v| v.to_string()).collect();
        self.map.get(&key).map(|c| c.load(Ordering::Relaxed)).unwrap_or(0)
    }

    /// Render in Prometheus text exposition format.
    fn render(&self, out: &mut String) {
        write_header(out, &self.desc.name, &self.desc.help, "counter");
        for key in Desc::sorted_keys(&self.map) {
            let Some(val) = self.map.get(&key).map(|c| c.load(Ordering::Relaxed)) else { continue };
            let labels = label_block(&self.desc.labels, &key, None);
            let _ = writeln!(out, "{}{} {}", self.desc.name, labels, val);
        }
    }
}

pub struct GaugeVec {
    desc: Desc,
    map: DashMap<Vec<String>, AtomicI64>,
}

impl GaugeVec {
    fn new(desc: Desc) -> Self {
        let map = DashMap::new();
        if desc.labels.is_empty() {
            map.insert(Vec::new(), AtomicI64::new(0));
        }
        Self { desc, map }
    }

    /// Increment by 1.
    pub fn inc(&self, values: &[&str]) { self.add(values, 1); }
    /// Decrement by 1.
    pub fn dec(&self, values: &[&str]) { self.add(values, -1); }

    /// Add an arbitrary signed delta.
    pub fn add(&self, values: &[&str], v: i64) {
        let Some(key) = self.desc.key(values) else { return };
        let gauge = self.map.entry(key).or_insert_with(|| AtomicI64::new(0));
        gauge.fetch_add(v, Ordering::Relaxed);
    }

    pub fn get(&self, values: &[&str]) -> i64 {
        let key: Vec<String> = values.iter().map(|v| v.to_string()).collect();
        self.map.get(&key).map(|g| g.load(Ordering::Relaxed)).unwrap_or(0)
    }

    fn render(&self, out: &mut String) {
        write_header(out, &self.desc.name, &self.desc.help, "gauge");
        for key in Desc::sorted_keys(&self.map) {
            let Some(val) = self.map.get(&key).map(|g| g.load(Ordering::Relaxed)) else { continue };
            let labels = label_block(&self.desc.labels, &key, None);
            let _ = writeln!(out, "{}{} {}", self.desc.name, labels, val);
        }
    }
}

struct AtomicHistogram {
    count: AtomicU64,
    sum_nanos: AtomicU64,
    buckets: Vec<AtomicU64>,
}

impl AtomicHistogram {
    fn new(n: usize) -> Self {
        Self {
            count: AtomicU64::new(0),
            sum_nanos: AtomicU64::new(0),
            buckets: (0..n).map(|_| AtomicU64::new(0)).collect(),
        }
    }
}

/// Count and sum of one histogram series.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct HistogramSnapshot {
    pub count: u64,
    pub sum_seconds: f64,
}

pub struct HistogramVec {
    desc: Desc,
    bounds_secs: Vec<f64>,
    bounds_nanos: Vec<u64>,
    map: DashMap<Vec<String>, AtomicHistogram>,
}

impl HistogramVec {
    fn new(desc: Desc, bounds_secs: Vec<f64>) -> Self {
        let bounds_nanos = bounds_secs.iter().map(|s| (s * 1e9).round() as u64).collect();
        let map = DashMap::new();
        if desc.labels.is_empty() {
            map.insert(Vec::new(), AtomicHistogram::new(bounds_secs.len()));
        }
        Self { desc, bounds_secs, bounds_nanos, map }
    }

    /// Observe a duration and increment cumulative buckets.
    pub fn observe(&self, values: &[&str], duration: Duration) {
        let Some(key) = self.desc.key(values) else { return };
        let n = self.bounds_nanos.len();
        let hist = self.map.entry(key).or_insert_with(|| AtomicHistogram::new(n));
        let nanos = u64::try_from(duration.as_nanos()).unwrap_or(u64::MAX);

        hist.count.fetch_add(1, Ordering::Relaxed);
        hist.sum_nanos.fetch_add(nanos, Ordering::Relaxed);

        // Cumulative: every bucket whose bound covers the value.
        for (i, &b) in self.bounds_nanos.iter().enumerate() {
            if nanos <= b {
                hist.buckets[i].fetch_add(1, Ordering::Relaxed);
            }
        }
    }

    pub fn snapshot(&self, values: &[&str]) -> HistogramSnapshot {
        let key: Vec<String> = values.iter().map(|v| v.to_string()).collect();
        self.map
            .get(&key)
            .map(|h| HistogramSnapshot {
                count: h.count.load(Ordering::Relaxed),
                sum_seconds: h.sum_nanos.load(Ordering::Relaxed) as f64 / 1e9,
            })
            .unwrap_or(HistogramSnapshot { count: 0, sum_seconds: 0.0 })
    }

    fn render(&self, out: &mut String) {
        let name = &self.desc.name;
        write_header(out, name, &self.desc.help, "histogram");
        for key in Desc::sorted_keys(&self.map) {
            let Some(hist) = self.map.get(&key) else { continue };

            for (i, le) in self.bounds_secs.iter().enumerate() {
                let count = hist.buckets[i].load(Ordering::Relaxed);
                let le = le.to_string();
                let labels = label_block(&self.desc.labels, &key, Some(("le", le.as_str())));
                let _ = writeln!(out, "{}_bucket{} {}", name, labels, count);
            }
            let count = hist.count.load(Ordering::Relaxed);
            let labels = label_block(&self.desc.labels, &key, Some(("le", "+Inf")));
            let _ = writeln!(out, "{}_bucket{} {}", name, labels, count);

            let plain = label_block(&self.desc.labels, &key, None);
            let sum = hist.sum_nanos.load(Ordering::Relaxed) as f64 / 1e9;
            let _ = writeln!(out, "{}_sum{} {}", name, plain, sum);
            let _ = writeln!(out, "{}_count{} {}", name, plain, count);
        }
    }
}

/// Handle returned by [`Registry::register`].
#[derive(Clone)]
pub enum MetricHandle {
    Counter(Arc<CounterVec>),
    Gauge(Arc<GaugeVec>),
    Histogram(Arc<HistogramVec>),
}

impl MetricHandle {
    fn kind(&self) -> MetricKind {
        match self {
            MetricHandle::Counter(_) => MetricKind::Counter,
            MetricHandle::Gauge(_) => MetricKind::Gauge,
            MetricHandle::Histogram(h) => MetricKind::Histogram(h.bounds_secs.clone()),
        }
    }

    fn desc(&self) -> &Desc {
        match self {
            MetricHandle::Counter(c) => &c.desc,
            MetricHandle::Gauge(g) => &g.desc,
            MetricHandle::Histogram(h) => &h.desc,
        }
    }

    fn render(&self, out: &mut String) {
        match self {
            MetricHandle::Counter(c) => c.render(out),
            MetricHandle::Gauge(g) => g.render(out),
            MetricHandle::Histogram(h) => h.render(out),
        }
    }
}

/// Source of samples rendered at scrape time (e.g. process statistics).
pub trait Collector: Send + Sync {
    /// Unique collector name; a second collector with the same name is refused.
    fn name(&self) -> &'static str;
    /// Append exposition lines (with their own HELP/TYPE headers).
    fn collect(&self, out: &mut String);
}

/// Process-wide metric registry, shared through `Arc` in application state.
#[derive(Default)]
pub struct Registry {
    metrics: DashMap<String, MetricHandle>,
    collectors: DashMap<&'static str, Arc<dyn Collector>>,
}

impl Registry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a metric family.
    ///
    /// Registering the same name, kind and label schema again returns the
    /// existing handle. A different kind or schema under the same name is a
    /// [`TonemeterError::RegistrationConflict`].
    pub fn register(&self, name: &str, help: &str, kind: MetricKind, labels: &[&str]) -> Result<MetricHandle> {
        if !valid_name(name) {
            return Err(TonemeterError::InvalidConfig(format!("invalid metric name: {name}")));
        }
        if let Some(bad) = labels.iter().find(|l| !valid_name(l) || l.contains(':') || **l == "le") {
            return Err(TonemeterError::InvalidConfig(format!("invalid label name for {name}: {bad}")));
        }
        if let MetricKind::Histogram(bounds) = &kind {
            validate_buckets(bounds)?;
        }

        let labels: Vec<String> = labels.iter().map(|l| l.to_string()).collect();
        match self.metrics.entry(name.to_string()) {
            Entry::Occupied(existing) => {
                let existing = existing.get();
                if existing.kind() == kind && existing.desc().labels == labels {
                    tracing::debug!(metric = %name, "metric already registered; reusing");
                    Ok(existing.clone())
                } else {
                    Err(TonemeterError::RegistrationConflict { name: name.to_string() })
                }
            }
            Entry::Vacant(slot) => {
                let desc = Desc { name: name.to_string(), help: help.to_string(), labels };
                let handle = match kind {
                    MetricKind::Counter => MetricHandle::Counter(Arc::new(CounterVec::new(desc))),
                    MetricKind::Gauge => MetricHandle::Gauge(Arc::new(GaugeVec::new(desc))),
                    MetricKind::Histogram(bounds) => {
                        MetricHandle::Histogram(Arc::new(HistogramVec::new(desc, bounds)))
                    }
                };
                slot.insert(handle.clone());
                Ok(handle)
            }
        }
    }

    pub fn counter(&self, name: &str, help: &str, labels: &[&str]) -> Result<Arc<CounterVec>> {
        match self.register(name, help, MetricKind::Counter, labels)? {
            MetricHandle::Counter(c) => Ok(c),
            _ => Err(TonemeterError::RegistrationConflict { name: name.to_string() }),
        }
    }

    pub fn gauge(&self, name: &str, help: &str, labels: &[&str]) -> Result<Arc<GaugeVec>> {
        match self.register(name, help, MetricKind::Gauge, labels)? {
            MetricHandle::Gauge(g) => Ok(g),
            _ => Err(TonemeterError::RegistrationConflict { name: name.to_string() }),
        }
    }

    pub fn histogram(&self, name: &str, help: &str, labels: &[&str], buckets: &[f64]) -> Result<Arc<HistogramVec>> {
        match self.register(name, help, MetricKind::Histogram(buckets.to_vec()), labels)? {
            MetricHandle::Histogram(h) => Ok(h),
            _ => Err(TonemeterError::RegistrationConflict { name: name.to_string() }),
        }
    }

    /// Add a scrape-time collector. Refuses a second collector with the same name.
    pub fn register_collector(&self, collector: Arc<dyn Collector>) -> Result<()> {
        match self.collectors.entry(collector.name()) {
            Entry::Occupied(_) => Err(TonemeterError::RegistrationConflict {
                name: collector.name().to_string(),
            }),
            Entry::Vacant(slot) => {
                slot.insert(collector);
                Ok(())
            }
        }
    }

    /// Render every family, sorted by name, then every collector.
    pub fn render(&self) -> String {
        let mut handles: Vec<(String, MetricHandle)> =
            self.metrics.iter().map(|r| (r.key().clone(), r.value().clone())).collect();
        handles.sort_by(|a, b| a.0.cmp(&b.0));

        let mut collectors: Vec<Arc<dyn Collector>> = self.collectors.iter().map(|r| Arc::clone(r.value())).collect();
        collectors.sort_by_key(|c| c.name());

        let mut out = String::new();
        for (_, handle) in &handles {
            handle.render(&mut out);
        }
        for c in &collectors {
            c.collect(&mut out);
        }
        out
    }
}

/// Buckets must be finite, positive, and strictly increasing.
pub fn validate_buckets(bounds: &[f64]) -> Result<()> {
    if bounds.is_empty() {
        return Err(TonemeterError::InvalidConfig("histogram buckets must not be empty".into()));
    }
    if bounds.iter().any(|b| !b.is_finite() || *b <= 0.0) {
        return Err(TonemeterError::InvalidConfig("histogram buckets must be finite and positive".into()));
    }
    if bounds.windows(2).any(|w| w[0] >= w[1]) {
        return Err(TonemeterError::InvalidConfig("histogram buckets must be strictly increasing".into()));
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn same_shape_registration_reuses_handle() {
        let reg = Registry::new();
        let a = reg.counter("jobs_total", "Jobs", &["status"]).unwrap();
        let b = reg.counter("jobs_total", "Jobs", &["status"]).unwrap();
        a.inc(&["ok"]);
        assert_eq!(b.get(&["ok"]), 1);
        assert!(Arc::ptr_eq(&a, &b));
    }

    #[test]
    fn different_shape_registration_conflicts() {
        let reg = Registry::new();
        reg.counter("jobs_total", "Jobs", &["status"]).unwrap();
        let err = reg.gauge("jobs_total", "Jobs", &["status"]).err().unwrap();
        assert_eq!(err.client_code().as_str(), "REGISTRATION_CONFLICT");
        let err = reg.counter("jobs_total", "Jobs", &["kind"]).err().unwrap();
        assert_eq!(err.client_code().as_str(), "REGISTRATION_CONFLICT");
    }

    #[test]
    fn rejects_bad_names_and_buckets() {
        let reg = Registry::new();
        assert!(reg.counter("1bad", "x", &[]).is_err());
        assert!(reg.counter("ok_total", "x", &["le"]).is_err());
        assert!(reg.histogram("h", "x", &[], &[0.5, 0.1]).is_err());
        assert!(reg.histogram("h", "x", &[], &[]).is_err());
    }

    #[test]
    fn wrong_arity_is_dropped() {
        let reg = Registry::new();
        let c = reg.counter("calls_total", "Calls", &["a", "b"]).unwrap();
        c.inc(&["only-one"]);
        assert!(!reg.render().contains("only-one"));
    }

    #[test]
    fn gauge_goes_up_and_down() {
        let reg = Registry::new();
        let g = reg.gauge("busy", "Busy", &[]).unwrap();
        g.inc(&[]);
        g.inc(&[]);
        g.dec(&[]);
        assert_eq!(g.get(&[]), 1);
    }

    #[test]
    fn histogram_buckets_are_cumulative() {
        let reg = Registry::new();
        let h = reg.histogram("lat_seconds", "Latency", &["route"], &[0.01, 0.1, 1.0]).unwrap();
        h.observe(&["/a"], Duration::from_millis(5));
        h.observe(&["/a"], Duration::from_millis(50));
        h.observe(&["/a"], Duration::from_secs(2));

        let text = reg.render();
        assert!(text.contains("lat_seconds_bucket{route=\"/a\",le=\"0.01\"} 1"));
        assert!(text.contains("lat_seconds_bucket{route=\"/a\",le=\"0.1\"} 2"));
        assert!(text.contains("lat_seconds_bucket{route=\"/a\",le=\"1\"} 2"));
        assert!(text.contains("lat_seconds_bucket{route=\"/a\",le=\"+Inf\"} 3"));
        assert!(text.contains("lat_seconds_count{route=\"/a\"} 3"));
        assert!(text.contains("lat_seconds_sum{route=\"/a\"} 2.055"));

        let snap = h.snapshot(&["/a"]);
        assert_eq!(snap.count, 3);
    }

    #[test]
    fn unlabelled_families_render_from_zero() {
        let reg = Registry::new();
        reg.gauge("inflight", "In flight", &[]).unwrap();
        reg.histogram("infer_seconds", "Inference", &[], &[0.1]).unwrap();
        let text = reg.render();
        assert!(text.contains("# TYPE inflight gauge\ninflight 0\n"));
        assert!(text.contains("infer_seconds_bucket{le=\"+Inf\"} 0"));
        assert!(text.contains("infer_seconds_count 0"));
    }

    #[test]
    fn label_values_are_escaped() {
        let reg = Registry::new();
        let c = reg.counter("odd_total", "Odd", &["path"]).unwrap();
        c.inc(&["a\"b\\c"]);
        assert!(reg.render().contains(r#"odd_total{path="a\"b\\c"} 1"#));
    }

    struct Fixed;

    impl Collector for Fixed {
        fn name(&self) -> &'static str {
            "fixed"
        }
        fn collect(&self, out: &mut String) {
            out.push_str("fixed_value 7\n");
        }
    }

    #[test]
    fn duplicate_collector_is_refused() {
        let reg = Registry::new();
        reg.register_collector(Arc::new(Fixed)).unwrap();
        assert!(reg.register_collector(Arc::new(Fixed)).is_err());
        assert_eq!(reg.render().matches("fixed_value 7").count(), 1);
    }

    #[test]
    fn concurrent_increments_are_not_lost() {
        let reg = Arc::new(Registry::new());
        let c = reg.counter("hits_total", "Hits", &["k"]).unwrap();
        let threads: Vec<_> = (0..8)
            .map(|_| {
                let c = Arc::clone(&c);
                std::thread::spawn(move || {
                    for _ in 0..1000 {
                        c.inc(&["x"]);
                    }
                })
            })
            .collect();
        for t in threads {
            t.join().unwrap();
        }
        assert_eq!(c.get(&["x"]), 8000);
    }
}
