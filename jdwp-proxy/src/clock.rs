// Cache invalidation clock
//
// A single generation counter owned by the session. Every mutation of the
// target's run state bumps it; proxies hold a plain integer snapshot and
// compare lazily. Nothing is ever pushed to proxies: a proxy that is never
// touched after an invalidation never pays a refresh cost.

use std::sync::atomic::{AtomicU64, Ordering};

#[derive(Debug, Default)]
pub struct InvalidationClock {
    generation: AtomicU64,
}

impl InvalidationClock {
    pub fn new() -> Self {
        Self::default()
    }

    /// Invalidate every proxy attached to this clock.
    pub fn bump(&self) -> u64 {
        self.generation.fetch_add(1, Ordering::SeqCst) + 1
    }

    pub fn now(&self) -> u64 {
        self.generation.load(Ordering::SeqCst)
    }
}

/// A proxy's last-observed generation.
///
/// The owning proxy calls `refresh` before exposing any cached field and
/// clears its caches iff it returns true. Validity is a pure function of
/// `seen == clock.now()`.
#[derive(Debug, Clone, Copy)]
pub struct CacheStamp {
    seen: u64,
}

impl CacheStamp {
    pub fn new(clock: &InvalidationClock) -> Self {
        Self { seen: clock.now() }
    }

    /// Adopt the current generation; true means the stamp was stale and
    /// the caller must clear its cached fields.
    pub fn refresh(&mut self, clock: &InvalidationClock) -> bool {
        let now = clock.now();
        if self.seen != now {
            self.seen = now;
            true
        } else {
            false
        }
    }

    pub fn is_fresh(&self, clock: &InvalidationClock) -> bool {
        self.seen == clock.now()
    }
}
