//! Scrape-time process and platform collectors.
//!
//! Process statistics come from `/proc/self` and are only available on Linux;
//! elsewhere the collector renders nothing. Each value is best-effort: a file
//! that cannot be read simply omits its metric.

use std::fmt::Write;

use super::metrics::{write_header, Collector};

/// `process_*` metrics under their conventional names.
#[derive(Debug, Default)]
pub struct ProcessCollector;

impl ProcessCollector {
    pub fn new() -> Self {
        Self
    }
}

impl Collector for ProcessCollector {
    fn name(&self) -> &'static str {
        "process"
    }

    fn collect(&self, out: &mut String) {
        let stats = linux::read();
        let mut sample = |name: &str, help: &str, kind: &str, value: Option<f64>| {
            if let Some(v) = value {
                write_header(out, name, help, kind);
                let _ = writeln!(out, "{} {}", name, v);
            }
        };
        sample(
            "process_cpu_seconds_total",
            "Total user and system CPU time spent in seconds.",
            "counter",
            stats.cpu_seconds,
        );
        sample(
            "process_virtual_memory_bytes",
            "Virtual memory size in bytes.",
            "gauge",
            stats.virtual_memory_bytes,
        );
        sample(
            "process_resident_memory_bytes",
            "Resident memory size in bytes.",
            "gauge",
            stats.resident_memory_bytes,
        );
        sample(
            "process_start_time_seconds",
            "Start time of the process since unix epoch in seconds.",
            "gauge",
            stats.start_time_seconds,
        );
        sample("process_open_fds", "Number of open file descriptors.", "gauge", stats.open_fds);
        sample("process_max_fds", "Maximum number of open file descriptors.", "gauge", stats.max_fds);
    }
}

/// Build and platform identity, a constant gauge of 1.
#[derive(Debug)]
pub struct BuildInfoCollector {
    version: &'static str,
}

impl BuildInfoCollector {
    pub fn new() -> Self {
        Self { version: env!("CARGO_PKG_VERSION") }
    }
}

impl Default for BuildInfoCollector {
    fn default() -> Self {
        Self::new()
    }
}

impl Collector for BuildInfoCollector {
    fn name(&self) -> &'static str {
        "build_info"
    }

    fn collect(&self, out: &mut String) {
        write_header(out, "tonemeter_build_info", "Build and platform information.", "gauge");
        let _ = writeln!(
            out,
            "tonemeter_build_info{{version=\"{}\",rustc_target_os=\"{}\"}} 1",
            self.version,
            std::env::consts::OS
        );
    }
}

#[derive(Debug, Default, PartialEq)]
pub(crate) struct ProcStats {
    pub cpu_seconds: Option<f64>,
    pub virtual_memory_bytes: Option<f64>,
    pub resident_memory_bytes: Option<f64>,
    pub start_time_seconds: Option<f64>,
    pub open_fds: Option<f64>,
    pub max_fds: Option<f64>,
}

#[cfg(target_os = "linux")]
mod linux {
    use std::fs;

    use super::ProcStats;

    /// USER_HZ is fixed at 100 by the kernel ABI.
    const CLOCK_TICKS: f64 = 100.0;

    pub(crate) fn read() -> ProcStats {
        let mut stats = ProcStats::default();

        if let Ok(stat) = fs::read_to_string("/proc/self/stat") {
            apply_stat(&stat, boot_time(), &mut stats);
        }
        if let Ok(status) = fs::read_to_string("/proc/self/status") {
            stats.resident_memory_bytes = status_kib(&status, "VmRSS:").map(|kib| kib * 1024.0);
        }
        if let Ok(entries) = fs::read_dir("/proc/self/fd") {
            stats.open_fds = Some(entries.count() as f64);
        }
        if let Ok(limits) = fs::read_to_string("/proc/self/limits") {
            stats.max_fds = max_open_files(&limits);
        }
        stats
    }

    fn boot_time() -> Option<f64> {
        let stat = fs::read_to_string("/proc/stat").ok()?;
        stat.lines()
            .find_map(|l| l.strip_prefix("btime "))
            .and_then(|v| v.trim().parse().ok())
    }

    /// Fields of `/proc/self/stat`; the command name may contain spaces, so
    /// parsing starts after the last `)`.
    pub(crate) fn apply_stat(stat: &str, boot_time: Option<f64>, stats: &mut ProcStats) {
        let Some(rest) = stat.rfind(')').map(|i| &stat[i + 1..]) else { return };
        let fields: Vec<&str> = rest.split_whitespace().collect();
        // `fields[0]` is field 3 (state) of proc(5).
        let field = |n: usize| fields.get(n - 3).and_then(|v| v.parse::<f64>().ok());

        if let (Some(utime), Some(stime)) = (field(14), field(15)) {
            stats.cpu_seconds = Some((utime + stime) / CLOCK_TICKS);
        }
        if let (Some(start), Some(btime)) = (field(22), boot_time) {
            stats.start_time_seconds = Some(btime + start / CLOCK_TICKS);
        }
        stats.virtual_memory_bytes = field(23);
    }

    pub(crate) fn status_kib(status: &str, key: &str) -> Option<f64> {
        status
            .lines()
            .find_map(|l| l.strip_prefix(key))
            .and_then(|v| v.split_whitespace().next())
            .and_then(|v| v.parse().ok())
    }

    pub(crate) fn max_open_files(limits: &str) -> Option<f64> {
        let line = limits.lines().find(|l| l.starts_with("Max open files"))?;
        line["Max open files".len()..]
            .split_whitespace()
            .next()
            .and_then(|v| v.parse().ok())
    }
}

#[cfg(not(target_os = "linux"))]
mod linux {
    use super::ProcStats;

    pub(crate) fn read() -> ProcStats {
        ProcStats::default()
    }
}
