//! Background session expiry and memory-pressure eviction.

use std::fs;
use std::sync::Arc;
use std::time::Duration;

use agent_core::{ReleaseHook, ReleaseReason};
use tokio::task::JoinHandle;
use tokio::time::{interval, MissedTickBehavior};
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

use crate::config::GuardConfig;
use crate::error::OrchestratorError;
use crate::session::{SessionId, SessionStore};

/// Shortest period the background sweep runs at.
const MIN_SWEEP_INTERVAL: Duration = Duration::from_secs(1);

/// Source of the process's resident memory size.
pub trait MemoryProbe: Send + Sync {
    /// Resident set size in bytes, or `None` when it cannot be measured.
    fn resident_bytes(&self) -> Option<u64>;
}

/// Reads `VmRSS` from `/proc/self/status`.
#[derive(Debug, Clone, Copy, Default)]
pub struct ProcStatusProbe;

impl MemoryProbe for ProcStatusProbe {
    fn resident_bytes(&self) -> Option<u64> {
        let status = fs::read_to_string("/proc/self/status").ok()?;
        parse_vm_rss(&status)
    }
}

/// Extract `VmRSS` (reported in kB) from a `/proc/<pid>/status` body.
pub fn parse_vm_rss(status: &str) -> Option<u64> {
    let line = status.lines().find(|l| l.starts_with("VmRSS:"))?;
    let kb: u64 = line
        .trim_start_matches("VmRSS:")
        .split_whitespace()
        .next()?
        .parse()
        .ok()?;
    Some(kb * 1024)
}

/// What one sweep did.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct SweepReport {
    /// Sessions removed for exceeding the session timeout.
    pub expired: Vec<SessionId>,
    /// Active sessions evicted under memory pressure.
    pub evicted: Vec<SessionId>,
    /// Resident memory sampled during the sweep.
    pub resident_bytes: Option<u64>,
}

/// Periodic worker enforcing the session TTL and the memory threshold.
pub struct MemoryGuard {
    store: Arc<SessionStore>,
    probe: Arc<dyn MemoryProbe>,
    release: Arc<dyn ReleaseHook>,
    config: GuardConfig,
}

impl MemoryGuard {
    pub fn new(
        store: Arc<SessionStore>,
        probe: Arc<dyn MemoryProbe>,
        release: Arc<dyn ReleaseHook>,
        config: GuardConfig,
    ) -> Self {
        Self {
            store,
            probe,
            release,
            config,
        }
    }

    pub fn config(&self) -> &GuardConfig {
        &self.config
    }

    /// Run one tick: expire old sessions, then check memory.
    pub async fn sweep(&self) -> SweepReport {
        let expired = self.store.remove_expired(self.config.session_timeout).await;
        for id in &expired {
            info!(session_id = %id, "SESSION_EXPIRED");
        }

        let resident_bytes = self.probe.resident_bytes();
        let mut evicted = Vec::new();

        match resident_bytes {
            Some(bytes) if bytes > self.config.memory_threshold_bytes => {
                warn!(
                    resident_mb = bytes / (1024 * 1024),
                    threshold_mb = self.config.memory_threshold_bytes / (1024 * 1024),
                    "MEMORY_PRESSURE"
                );
                evicted = self.store.evict_oldest_active(self.config.evict_batch).await;
                for id in &evicted {
                    let reason = OrchestratorError::ResourceEviction(id.clone());
                    warn!(session_id = %id, reason = %reason, "SESSION_EVICTED");
                }
                self.release.release(ReleaseReason::MemoryPressure).await;
            }
            Some(bytes) => debug!(resident_mb = bytes / (1024 * 1024), "MEMORY_OK"),
            None => debug!("Resident memory unavailable, skipping pressure check"),
        }

        SweepReport {
            expired,
            evicted,
            resident_bytes,
        }
    }

    /// Sweep on every interval tick until `shutdown` fires.
    ///
    /// The first sweep happens one interval after the call. Intervals shorter
    /// than one second are raised to one second.
    pub fn spawn(self: Arc<Self>, shutdown: CancellationToken) -> JoinHandle<()> {
        tokio::spawn(async move {
            let period = self.config.interval.max(MIN_SWEEP_INTERVAL);
            let mut ticker = interval(period);
            ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);
            ticker.tick().await;

            info!(interval = ?period, "MEMORY_GUARD_STARTED");
            loop {
                tokio::select! {
                    _ = shutdown.cancelled() => {
                        info!("MEMORY_GUARD_STOPPED");
                        break;
                    }
                    _ = ticker.tick() => {
                        let report = self.sweep().await;
                        if !report.expired.is_empty() || !report.evicted.is_empty() {
                            info!(
                                expired = report.expired.len(),
                                evicted = report.evicted.len(),
                                "MEMORY_GUARD_SWEEP"
                            );
                        }
                    }
                }
            }
        })
    }
}
