//! Run progress tracking.
//!
//! A single synchronization can take minutes against the real feeds,
//! so the orchestrator publishes phase and step counters here and the
//! CLI polls snapshots to drive its progress bar.

use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::RwLock;

#[derive(Debug, Default)]
pub struct ProgressTracker {
    phase: RwLock<String>,
    region: RwLock<Option<String>>,
    done: AtomicU64,
    workload: AtomicU64,
}

/// A point-in-time copy of the tracker, safe to hand across tasks.
#[derive(Debug, Clone, PartialEq)]
pub struct ProgressSnapshot {
    pub phase: String,
    pub region: Option<String>,
    pub done: u64,
    pub workload: u64,
}

impl ProgressTracker {
    pub fn set_phase(&self, phase: &str) {
        *self.phase.write().unwrap_or_else(|e| e.into_inner()) = phase.to_string();
    }

    pub fn set_region(&self, region: Option<&str>) {
        *self.region.write().unwrap_or_else(|e| e.into_inner()) = region.map(str::to_string);
    }

    /// Declare the total number of work units for this run.
    pub fn set_workload(&self, workload: u64) {
        self.workload.store(workload, Ordering::Relaxed);
        self.done.store(0, Ordering::Relaxed);
    }

    /// Mark `units` work units as completed.
    pub fn step(&self, units: u64) {
        self.done.fetch_add(units, Ordering::Relaxed);
    }

    pub fn snapshot(&self) -> ProgressSnapshot {
        ProgressSnapshot {
            phase: self.phase.read().unwrap_or_else(|e| e.into_inner()).clone(),
            region: self.region.read().unwrap_or_else(|e| e.into_inner()).clone(),
            done: self.done.load(Ordering::Relaxed),
            workload: self.workload.load(Ordering::Relaxed),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_progress_steps_accumulate() {
        let tracker = ProgressTracker::default();
        tracker.set_workload(10);
        tracker.set_phase("compute");
        tracker.step(3);
        tracker.step(2);
        let snap = tracker.snapshot();
        assert_eq!(snap.done, 5);
        assert_eq!(snap.workload, 10);
        assert_eq!(snap.phase, "compute");
    }

    #[test]
    fn test_set_workload_resets_done() {
        let tracker = ProgressTracker::default();
        tracker.set_workload(4);
        tracker.step(4);
        tracker.set_workload(8);
        assert_eq!(tracker.snapshot().done, 0);
    }
}
