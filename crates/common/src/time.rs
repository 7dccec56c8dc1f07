use std::sync::atomic::{AtomicU64, Ordering};
use std::time::{SystemTime, UNIX_EPOCH};

pub const USECS_PER_SECOND: u64 = 1_000_000;

/// Source of "now" in microseconds.
///
/// Renderers never read the wall clock directly so fades and pulses can be
/// replayed deterministically.
pub trait Clock: Send + Sync {
    fn now_usec(&self) -> u64;
}

/// Wall clock, microseconds since the Unix epoch.
#[derive(Debug, Default, Clone, Copy)]
pub struct SystemClock;

impl Clock for SystemClock {
    fn now_usec(&self) -> u64 {
        SystemTime::now()
            .duration_since(UNIX_EPOCH)
            .map(|d| d.as_micros() as u64)
            .unwrap_or(0)
    }
}

/// Clock that only moves when told to.
#[derive(Debug, Default)]
pub struct ManualClock {
    now: AtomicU64,
}

impl ManualClock {
    pub fn new(start_usec: u64) -> Self {
        Self {
            now: AtomicU64::new(start_usec),
        }
    }

    pub fn set(&self, usec: u64) {
        self.now.store(usec, Ordering::Release);
    }

    pub fn advance(&self, usec: u64) {
        self.now.fetch_add(usec, Ordering::AcqRel);
    }

    pub fn advance_secs(&self, secs: f32) {
        self.advance((secs * USECS_PER_SECOND as f32) as u64);
    }
}

impl Clock for ManualClock {
    fn now_usec(&self) -> u64 {
        self.now.load(Ordering::Acquire)
    }
}

/// Seconds elapsed between two microsecond timestamps, zero if `now < start`.
pub fn elapsed_secs(start_usec: u64, now_usec: u64) -> f32 {
    now_usec.saturating_sub(start_usec) as f32 / USECS_PER_SECOND as f32
}
