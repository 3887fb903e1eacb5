//! Wrapping tick arithmetic.
//!
//! A tick counter counts up from `0` to `M - 1` and then wraps back to `0`.
//! `M` (the *modulus*) is a power of two fixed at configuration time.
//! Two tick values can't be ordered by comparing them directly. Instead, they
//! are compared by their shortest cyclic distance:
//!
//! ```text
//!                start            end
//!  ──────────────────┴──────────────┴────────────── ↻ (wraps at M)
//!                    ╰── diff < M/2 ─╯
//! ```
//!
//! This is only meaningful as long as the two values are less than `M / 2`
//! apart. Values further apart are not orderable.
use crate::error::NewModulusError;

/// A value of the tick counter, always in range `0..M`.
pub type Tick = u32;

/// The signed distance between two [`Tick`]s, in range `-M/2..M/2`.
pub type TickDiff = i32;

/// The modulus `M` of a tick counter.
///
/// `M` is a power of two in range `2..=2^32`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct Modulus {
    /// `M - 1`
    mask: u32,
}

impl Modulus {
    /// `2^30`, the period of the small-integer millisecond counter found on
    /// 32-bit targets.
    pub const DEFAULT: Self = Self::from_bits(30);

    /// `2^16`
    pub const U16: Self = Self::from_bits(16);

    /// `2^32`
    pub const U32: Self = Self::from_bits(32);

    /// Construct `Modulus` representing `2^bits`.
    ///
    /// # Panics
    ///
    /// Panics if `bits` is not in range `1..=32`.
    pub const fn from_bits(bits: u32) -> Self {
        assert!(bits >= 1 && bits <= 32);
        Self {
            mask: if bits == 32 {
                u32::MAX
            } else {
                (1u32 << bits) - 1
            },
        }
    }

    /// Construct `Modulus` from `M`.
    ///
    /// # Examples
    ///
    /// ```
    /// use evq_core::tick::Modulus;
    /// assert_eq!(Modulus::new(65536), Ok(Modulus::U16));
    /// assert!(Modulus::new(1000).is_err());
    /// assert!(Modulus::new(1).is_err());
    /// ```
    pub const fn new(value: u64) -> Result<Self, NewModulusError> {
        if value < 2 || value > (1 << 32) || !value.is_power_of_two() {
            return Err(NewModulusError::ConfigurationError);
        }
        Ok(Self {
            mask: (value - 1) as u32,
        })
    }

    /// Get `M`.
    #[inline]
    pub const fn get(self) -> u64 {
        self.mask as u64 + 1
    }

    /// Get `M / 2`.
    #[inline]
    pub const fn half(self) -> u32 {
        (self.mask >> 1) + 1
    }

    /// Reduce an arbitrary counter value into the range `0..M`.
    #[inline]
    pub const fn wrap(self, value: u32) -> Tick {
        value & self.mask
    }

    /// Compute `end - start`, taking into account a single wraparound.
    ///
    /// The result is in range `-M/2..M/2`.
    ///
    /// # Examples
    ///
    /// ```
    /// use evq_core::tick::Modulus;
    /// let m = Modulus::U16;
    /// assert_eq!(m.ticks_diff(10, 65530), 16);
    /// assert_eq!(m.ticks_diff(65530, 10), -16);
    /// assert_eq!(m.ticks_diff(500, 200), 300);
    /// ```
    #[inline]
    pub const fn ticks_diff(self, end: Tick, start: Tick) -> TickDiff {
        // Shift the difference forward by `M / 2`, wrap it, and then shift it
        // back
        let shifted = end.wrapping_sub(start).wrapping_add(self.half()) & self.mask;
        shifted.wrapping_sub(self.half()) as TickDiff
    }

    /// Compute `(start + delta) mod M`.
    ///
    /// `delta` may be negative.
    ///
    /// # Examples
    ///
    /// ```
    /// use evq_core::tick::Modulus;
    /// let m = Modulus::U16;
    /// assert_eq!(m.ticks_add(65530, 16), 10);
    /// assert_eq!(m.ticks_add(10, -16), 65530);
    /// ```
    #[inline]
    pub const fn ticks_add(self, start: Tick, delta: TickDiff) -> Tick {
        start.wrapping_add(delta as u32) & self.mask
    }

    /// Return `true` iff `a` comes strictly before `b`, i.e., the forward
    /// distance from `a` to `b` is non-zero and less than `M / 2`.
    #[inline]
    pub const fn ticks_less(self, a: Tick, b: Tick) -> bool {
        let forward = b.wrapping_sub(a) & self.mask;
        forward != 0 && forward < self.half()
    }
}

impl Default for Modulus {
    #[inline]
    fn default() -> Self {
        Self::DEFAULT
    }
}

/// A monotonic source of wrapping ticks.
pub trait TickClock {
    /// Get the current value of the counter.
    fn now(&self) -> Tick;

    /// Get the modulus of the counter.
    fn modulus(&self) -> Modulus;

    /// Get the number of ticks elapsed since `start`.
    #[inline]
    fn ticks_since(&self, start: Tick) -> TickDiff {
        self.modulus().ticks_diff(self.now(), start)
    }

    /// Get the tick value `delta` ticks from now.
    #[inline]
    fn deadline_in(&self, delta: TickDiff) -> Tick {
        self.modulus().ticks_add(self.now(), delta)
    }
}

impl<T: TickClock + ?Sized> TickClock for &T {
    #[inline]
    fn now(&self) -> Tick {
        (**self).now()
    }

    #[inline]
    fn modulus(&self) -> Modulus {
        (**self).modulus()
    }
}

/// [`Modulus::ticks_diff`] over [`Modulus::DEFAULT`].
#[inline]
pub const fn ticks_diff(end: Tick, start: Tick) -> TickDiff {
    Modulus::DEFAULT.ticks_diff(end, start)
}

/// [`Modulus::ticks_add`] over [`Modulus::DEFAULT`].
#[inline]
pub const fn ticks_add(start: Tick, delta: TickDiff) -> Tick {
    Modulus::DEFAULT.ticks_add(start, delta)
}

#[cfg(test)]
mod tests {
    use super::*;
    use quickcheck_macros::quickcheck;

    #[test]
    fn modulus_bounds() {
        assert_eq!(Modulus::new(2).map(Modulus::get), Ok(2));
        assert_eq!(Modulus::new(1 << 32), Ok(Modulus::U32));
        assert_eq!(Modulus::new(0), Err(NewModulusError::ConfigurationError));
        assert_eq!(
            Modulus::new(1 << 33),
            Err(NewModulusError::ConfigurationError)
        );
        assert_eq!(Modulus::new(3), Err(NewModulusError::ConfigurationError));
        assert_eq!(Modulus::DEFAULT.get(), 1 << 30);
        assert_eq!(Modulus::U32.half(), 1 << 31);
    }

    #[test]
    fn diff_range_edges() {
        let m = Modulus::U16;
        assert_eq!(m.ticks_diff(32768, 0), -32768);
        assert_eq!(m.ticks_diff(32767, 0), 32767);
        assert_eq!(m.ticks_diff(0, 0), 0);

        let m = Modulus::U32;
        assert_eq!(m.ticks_diff(5, u32::MAX), 6);
        assert_eq!(m.ticks_diff(1 << 31, 0), i32::MIN);
    }

    #[test]
    fn less_across_wrap() {
        let m = Modulus::U16;
        assert!(m.ticks_less(65530, 10));
        assert!(!m.ticks_less(10, 65530));
        assert!(!m.ticks_less(7, 7));
        // Exactly half a period apart is not orderable in either direction
        assert!(!m.ticks_less(0, 32768));
        assert!(!m.ticks_less(32768, 0));
    }

    #[test]
    fn default_free_functions() {
        assert_eq!(ticks_add((1 << 30) - 1, 1), 0);
        assert_eq!(ticks_diff(0, (1 << 30) - 1), 1);
    }

    #[quickcheck]
    fn add_then_diff(bits: u8, start: u32, delta: i32) -> bool {
        let m = Modulus::from_bits(u32::from(bits % 32) + 1);
        let start = m.wrap(start);
        // Restrict `delta` to `-M/2..M/2`
        let delta = m.ticks_diff(m.wrap(delta as u32), 0);
        m.ticks_diff(m.ticks_add(start, delta), start) == delta
    }

    #[quickcheck]
    fn less_agrees_with_diff(bits: u8, a: u32, b: u32) -> bool {
        let m = Modulus::from_bits(u32::from(bits % 32) + 1);
        let (a, b) = (m.wrap(a), m.wrap(b));
        let diff = m.ticks_diff(b, a);
        m.ticks_less(a, b) == (diff > 0)
    }
}
