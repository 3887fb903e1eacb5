//! Tick sources
//!
//! One tick is one millisecond in both clocks provided here.
use evq_core::tick::{Modulus, Tick, TickClock, TickDiff};
use std::{
    sync::atomic::{AtomicU32, Ordering},
    time::{Duration, Instant},
};

/// A [`TickClock`] that can also wait for a given number of ticks to pass.
pub trait WaitClock: TickClock {
    /// Wait until `ticks` ticks have passed. Does nothing if `ticks <= 0`.
    fn wait(&self, ticks: TickDiff);
}

impl<T: WaitClock + ?Sized> WaitClock for &T {
    #[inline]
    fn wait(&self, ticks: TickDiff) {
        (**self).wait(ticks)
    }
}

/// Milliseconds elapsed since the clock was created, reduced modulo `M`.
#[derive(Debug, Clone, Copy)]
pub struct StdTickClock {
    origin: Instant,
    modulus: Modulus,
}

impl StdTickClock {
    pub fn new(modulus: Modulus) -> Self {
        Self {
            origin: Instant::now(),
            modulus,
        }
    }
}

impl Default for StdTickClock {
    fn default() -> Self {
        Self::new(Modulus::DEFAULT)
    }
}

impl TickClock for StdTickClock {
    #[inline]
    fn now(&self) -> Tick {
        // `M <= 2^32`, so truncating to `u32` first doesn't change the result
        self.modulus.wrap(self.origin.elapsed().as_millis() as u32)
    }

    #[inline]
    fn modulus(&self) -> Modulus {
        self.modulus
    }
}

impl WaitClock for StdTickClock {
    fn wait(&self, ticks: TickDiff) {
        if ticks > 0 {
            std::thread::sleep(Duration::from_millis(ticks as u64));
        }
    }
}

/// A clock that only moves when told to. Waiting on it advances it instantly.
///
/// # Examples
///
/// ```
/// use evq_core::tick::{Modulus, TickClock};
/// use evq_port_std::clock::ManualClock;
///
/// let clock = ManualClock::new(Modulus::U16, 65530);
/// clock.advance(10);
/// assert_eq!(clock.now(), 4);
/// ```
#[derive(Debug)]
pub struct ManualClock {
    now: AtomicU32,
    modulus: Modulus,
}

impl ManualClock {
    pub fn new(modulus: Modulus, start: Tick) -> Self {
        Self {
            now: AtomicU32::new(modulus.wrap(start)),
            modulus,
        }
    }

    pub fn set(&self, now: Tick) {
        self.now.store(self.modulus.wrap(now), Ordering::Relaxed);
    }

    /// Move the clock by `delta` ticks, which may be negative.
    pub fn advance(&self, delta: TickDiff) {
        let now = self.now.load(Ordering::Relaxed);
        self.now
            .store(self.modulus.ticks_add(now, delta), Ordering::Relaxed);
    }
}

impl TickClock for ManualClock {
    #[inline]
    fn now(&self) -> Tick {
        self.now.load(Ordering::Relaxed)
    }

    #[inline]
    fn modulus(&self) -> Modulus {
        self.modulus
    }
}

impl WaitClock for ManualClock {
    fn wait(&self, ticks: TickDiff) {
        if ticks > 0 {
            self.advance(ticks);
        }
    }
}
