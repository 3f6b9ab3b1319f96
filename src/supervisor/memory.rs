//! Supervisor self memory sampling

use sysinfo::{Pid, ProcessesToUpdate, System};

/// One memory sample of the supervisor process
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct MemorySample {
    /// Resident memory in bytes
    pub resident_bytes: u64,
    /// Whether the sample is above the warning threshold
    pub over_threshold: bool,
}

/// Samples the memory of the current process
pub struct MemorySampler {
    system: System,
    pid: Option<Pid>,
    threshold_bytes: u64,
}

impl MemorySampler {
    /// Create a sampler warning above `threshold_bytes`
    #[must_use]
    pub fn new(threshold_bytes: u64) -> Self {
        let pid = sysinfo::get_current_pid()
            .map_err(|e| log::warn!("Memory sampling unavailable: {e}"))
            .ok();
        Self {
            system: System::new(),
            pid,
            threshold_bytes,
        }
    }

    /// Take a sample, logging a warning when above the threshold
    pub fn sample(&mut self) -> Option<MemorySample> {
        let pid = self.pid?;
        let _ = self
            .system
            .refresh_processes(ProcessesToUpdate::Some(&[pid]), false);
        let resident_bytes = self.system.process(pid)?.memory();

        let over_threshold = resident_bytes > self.threshold_bytes;
        if over_threshold {
            log::warn!(
                "[supervisor] High memory usage: {} MiB (threshold {} MiB)",
                resident_bytes / (1024 * 1024),
                self.threshold_bytes / (1024 * 1024)
            );
        } else {
            log::debug!(
                "[supervisor] Memory usage: {} MiB",
                resident_bytes / (1024 * 1024)
            );
        }

        Some(MemorySample {
            resident_bytes,
            over_threshold,
        })
    }
}
