//! Process memory sampling and reclamation checkpoints.
//!
//! Sampling is coarse: the converter only looks at memory at the
//! [`Checkpoint`]s below, never continuously. Releasing memory itself is
//! scope-bound (converter handles and page readers are dropped before the
//! checkpoint fires); the checkpoint hook is where an implementation
//! observes or forces anything further.

use std::fmt;
use std::sync::Mutex;

use sysinfo::{Pid, ProcessRefreshKind, ProcessesToUpdate, System};

const BYTES_PER_MB: f64 = 1024.0 * 1024.0;

/// Points in a conversion where resources are released.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Checkpoint {
    /// Before the primary strategy runs
    Baseline,
    /// Primary strategy aborted right after opening the input
    AfterOpen,
    /// Primary strategy finished (success or failure)
    AfterConversion,
    /// Text-only fallback finished this many pages
    FallbackPages(u32),
    /// Between two batch items
    BetweenItems,
    /// A single conversion is returning
    Exit,
}

impl fmt::Display for Checkpoint {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Checkpoint::Baseline => write!(f, "baseline"),
            Checkpoint::AfterOpen => write!(f, "after-open"),
            Checkpoint::AfterConversion => write!(f, "after-conversion"),
            Checkpoint::FallbackPages(n) => write!(f, "fallback page {}", n),
            Checkpoint::BetweenItems => write!(f, "between-items"),
            Checkpoint::Exit => write!(f, "exit"),
        }
    }
}

/// Source of process memory readings.
pub trait MemoryMonitor: Send + Sync {
    /// Current resident memory in MB; 0.0 when the OS cannot be queried.
    fn current_memory_mb(&self) -> f64;

    /// Release resources now. Invoked at every [`Checkpoint`].
    fn reclaim(&self, checkpoint: Checkpoint) {
        log::debug!(
            "Checkpoint {}: {:.1} MB resident",
            checkpoint,
            self.current_memory_mb()
        );
    }
}

/// [`MemoryMonitor`] reading this process's RSS through `sysinfo`.
pub struct SystemMonitor {
    pid: Option<Pid>,
    system: Mutex<System>,
}

impl SystemMonitor {
    pub fn new() -> Self {
        let pid = sysinfo::get_current_pid()
            .map_err(|e| log::warn!("Cannot determine current pid, memory reads as 0: {}", e))
            .ok();
        Self {
            pid,
            system: Mutex::new(System::new()),
        }
    }

    fn resident_bytes(&self) -> Option<u64> {
        let pid = self.pid?;
        let mut system = self.system.lock().ok()?;
        system.refresh_processes_specifics(
            ProcessesToUpdate::Some(&[pid]),
            true,
            ProcessRefreshKind::new().with_memory(),
        );
        system.process(pid).map(|p| p.memory())
    }
}

impl Default for SystemMonitor {
    fn default() -> Self {
        Self::new()
    }
}

impl MemoryMonitor for SystemMonitor {
    fn current_memory_mb(&self) -> f64 {
        self.resident_bytes()
            .map(|bytes| bytes as f64 / BYTES_PER_MB)
            .unwrap_or(0.0)
    }
}

/// Fires [`Checkpoint::Exit`] exactly once when dropped.
pub(crate) struct ExitCheckpoint<'a> {
    monitor: &'a dyn MemoryMonitor,
}

impl<'a> ExitCheckpoint<'a> {
    pub(crate) fn new(monitor: &'a dyn MemoryMonitor) -> Self {
        Self { monitor }
    }
}

impl Drop for ExitCheckpoint<'_> {
    fn drop(&mut self) {
        self.monitor.reclaim(Checkpoint::Exit);
    }
}
