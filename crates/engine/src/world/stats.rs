use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, RwLock};

use tracing::warn;

static STATS_LOCK_POISON_WARNED: AtomicBool = AtomicBool::new(false);

fn warn_stats_lock_poison_once(operation: &'static str) {
    if STATS_LOCK_POISON_WARNED
        .compare_exchange(false, true, Ordering::Relaxed, Ordering::Relaxed)
        .is_ok()
    {
        warn!(operation, "stats lock poisoned; recovered inner value");
    }
}

/// Counters for one `World::update` call.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct FrameStats {
    pub frame: u64,
    pub advanced: usize,
    pub collisions: usize,
    pub purged: usize,
    pub spawned: usize,
    pub live: usize,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct StatsSnapshot {
    pub last_frame: FrameStats,
    pub total_collisions: u64,
    pub total_purged: u64,
    pub total_spawned: u64,
}

impl StatsSnapshot {
    fn record(&mut self, frame: FrameStats) {
        self.last_frame = frame;
        self.total_collisions = self.total_collisions.saturating_add(frame.collisions as u64);
        self.total_purged = self.total_purged.saturating_add(frame.purged as u64);
        self.total_spawned = self.total_spawned.saturating_add(frame.spawned as u64);
    }
}

/// Read-only window onto the world's counters. Clones share the same
/// snapshot and may be read from other threads while the world itself stays
/// on the simulation thread.
#[derive(Clone, Debug)]
pub struct StatsHandle {
    snapshot: Arc<RwLock<StatsSnapshot>>,
}

impl Default for StatsHandle {
    fn default() -> Self {
        Self {
            snapshot: Arc::new(RwLock::new(StatsSnapshot::default())),
        }
    }
}

impl StatsHandle {
    pub fn snapshot(&self) -> StatsSnapshot {
        match self.snapshot.read() {
            Ok(guard) => *guard,
            Err(poisoned) => {
                warn_stats_lock_poison_once("read");
                *poisoned.into_inner()
            }
        }
    }

    pub(crate) fn publish(&self, frame: FrameStats) {
        match self.snapshot.write() {
            Ok(mut guard) => guard.record(frame),
            Err(poisoned) => {
                warn_stats_lock_poison_once("write");
                let mut guard = poisoned.into_inner();
                guard.record(frame);
            }
        }
    }

    pub(crate) fn reset(&self) {
        match self.snapshot.write() {
            Ok(mut guard) => *guard = StatsSnapshot::default(),
            Err(poisoned) => {
                warn_stats_lock_poison_once("reset");
                *poisoned.into_inner() = StatsSnapshot::default();
            }
        }
    }
}
