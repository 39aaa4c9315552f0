//! Runtime information for the `/check` command.

use std::sync::Mutex;

use sysinfo::System;

use crate::formatting::format_duration;

/// Source of the status text shown to `/check`.
///
/// The output is opaque human-readable text; callers never parse it.
pub trait RuntimeInfoProvider: Send + Sync {
    fn snapshot(&self) -> String;
}

/// Live system stats via `sysinfo`.
pub struct SystemRuntimeInfo {
    sys: Mutex<System>,
}

impl SystemRuntimeInfo {
    pub fn new() -> Self {
        let mut sys = System::new();
        // CPU usage is computed between consecutive refreshes; prime it once so
        // the first snapshot already has a baseline.
        sys.refresh_cpu_all();
        sys.refresh_memory();
        Self {
            sys: Mutex::new(sys),
        }
    }
}

impl Default for SystemRuntimeInfo {
    fn default() -> Self {
        Self::new()
    }
}

impl RuntimeInfoProvider for SystemRuntimeInfo {
    fn snapshot(&self) -> String {
        let mut sys = self.sys.lock().unwrap_or_else(|p| p.into_inner());
        sys.refresh_cpu_all();
        sys.refresh_memory();

        let host = System::host_name().unwrap_or_else(|| "unknown".to_string());
        let uptime = format_duration(System::uptime() as i64);
        let load = System::load_average();

        let cpu_usage = sys.global_cpu_usage();
        let total_memory = sys.total_memory();
        let used_memory = sys.used_memory();
        let memory_percent = if total_memory > 0 {
            (used_memory as f64 / total_memory as f64) * 100.0
        } else {
            0.0
        };
        let mib = |bytes: u64| bytes / 1024 / 1024;

        format!(
            "Host: {host}\n\
Uptime: {uptime}\n\
Load: {:.2} {:.2} {:.2}\n\
CPU: {cpu_usage:.1}%\n\
Memory: {} MiB / {} MiB ({memory_percent:.1}%)",
            load.one,
            load.five,
            load.fifteen,
            mib(used_memory),
            mib(total_memory),
        )
    }
}
