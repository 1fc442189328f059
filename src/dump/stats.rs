use std::{
    fmt::Display,
    sync::{
        atomic::{AtomicU64, Ordering},
        Arc,
    },
    time::{Duration, Instant},
};

pub type SharedDumpStats = Arc<DumpStats>;

/// Counter shared by all units of a run.
#[derive(Debug)]
pub struct DumpStats {
    written: AtomicU64,
    started_at: Instant,
}

impl DumpStats {
    pub fn new(started_at: Instant) -> Self {
        Self {
            written: AtomicU64::new(0),
            started_at,
        }
    }

    pub fn shared(started_at: Instant) -> SharedDumpStats {
        Arc::new(Self::new(started_at))
    }

    pub fn increment_written(&self) {
        self.written.fetch_add(1, Ordering::Relaxed);
    }

    /// Exact once every unit finished, approximate while the run is in progress.
    pub fn written(&self) -> u64 {
        self.written.load(Ordering::Relaxed)
    }

    pub fn summary(&self) -> DumpSummary {
        DumpSummary {
            written: self.written(),
            elapsed: self.started_at.elapsed(),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct DumpSummary {
    pub written: u64,
    pub elapsed: Duration,
}

impl DumpSummary {
    fn elapsed_millis(&self) -> Duration {
        Duration::from_millis(self.elapsed.as_millis() as u64)
    }
}

impl Display for DumpSummary {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(
            f,
            "loaded {} manifests in {:?}",
            self.written,
            self.elapsed_millis()
        )
    }
}
