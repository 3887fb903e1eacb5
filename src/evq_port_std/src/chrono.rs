//! Stopwatch
use evq_core::{
    error::ChronometerError,
    tick::{Tick, TickClock, TickDiff},
};
use std::time::Duration;

/// Measures the time elapsed since it was created or last reset.
///
/// The measurement is only correct for intervals shorter than `M / 2` ticks.
/// Longer intervals wrap around.
///
/// # Examples
///
/// ```
/// use evq_core::{tick::Modulus, ChronometerError};
/// use evq_port_std::{chrono::Chronometer, clock::ManualClock};
/// use std::time::Duration;
///
/// let clock = ManualClock::new(Modulus::U16, 65000);
/// let mut chrono = Chronometer::new(&clock);
/// clock.advance(1000);
/// assert_eq!(chrono.elapsed(), Ok(Duration::from_millis(1000)));
///
/// chrono.deinit();
/// assert_eq!(chrono.elapsed_ticks(), Err(ChronometerError::InvalidState));
/// ```
#[derive(Debug)]
pub struct Chronometer<C> {
    clock: C,
    start: Tick,
    deinited: bool,
}

impl<C: TickClock> Chronometer<C> {
    /// Construct a `Chronometer` and start measuring.
    pub fn new(clock: C) -> Self {
        let start = clock.now();
        Self {
            clock,
            start,
            deinited: false,
        }
    }

    /// Get the number of ticks elapsed since the start.
    pub fn elapsed_ticks(&self) -> Result<TickDiff, ChronometerError> {
        self.check()?;
        Ok(self.clock.ticks_since(self.start))
    }

    /// Get the time elapsed since the start, assuming one tick is one
    /// millisecond.
    pub fn elapsed(&self) -> Result<Duration, ChronometerError> {
        let ticks = self.elapsed_ticks()?;
        Ok(Duration::from_millis(ticks.max(0) as u64))
    }

    /// Restart the measurement from now.
    pub fn reset(&mut self) -> Result<(), ChronometerError> {
        self.check()?;
        self.start = self.clock.now();
        Ok(())
    }

    /// Tear down the `Chronometer`. Idempotent.
    ///
    /// All other operations fail with `InvalidState` afterwards.
    pub fn deinit(&mut self) {
        self.deinited = true;
    }

    #[inline]
    pub fn is_deinited(&self) -> bool {
        self.deinited
    }

    #[inline]
    fn check(&self) -> Result<(), ChronometerError> {
        if self.deinited {
            Err(ChronometerError::InvalidState)
        } else {
            Ok(())
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::clock::ManualClock;
    use evq_core::tick::Modulus;

    #[test]
    fn measures_across_wraparound() {
        let clock = ManualClock::new(Modulus::U16, 65530);
        let mut chrono = Chronometer::new(&clock);
        assert_eq!(chrono.elapsed_ticks(), Ok(0));

        clock.advance(16);
        assert_eq!(clock.now(), 10);
        assert_eq!(chrono.elapsed_ticks(), Ok(16));

        chrono.reset().unwrap();
        clock.advance(5);
        assert_eq!(chrono.elapsed(), Ok(Duration::from_millis(5)));
    }

    #[test]
    fn negative_interval_is_clamped() {
        let clock = ManualClock::new(Modulus::DEFAULT, 100);
        let chrono = Chronometer::new(&clock);
        clock.advance(-10);
        assert_eq!(chrono.elapsed_ticks(), Ok(-10));
        assert_eq!(chrono.elapsed(), Ok(Duration::ZERO));
    }

    #[test]
    fn deinit_is_idempotent() {
        let clock = ManualClock::new(Modulus::DEFAULT, 0);
        let mut chrono = Chronometer::new(&clock);
        chrono.deinit();
        chrono.deinit();
        assert!(chrono.is_deinited());
        assert_eq!(chrono.elapsed_ticks(), Err(ChronometerError::InvalidState));
        assert_eq!(chrono.elapsed(), Err(ChronometerError::InvalidState));
        assert_eq!(chrono.reset(), Err(ChronometerError::InvalidState));
    }
}
