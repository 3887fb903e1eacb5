use evq_core::tick::{Modulus, TickDiff};

/// Sizing parameters of the hosted environment.
///
/// Every capacity is fixed when the corresponding object is created.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Config {
    /// The number of interrupt channels.
    pub num_channels: usize,
    /// The capacity of the event FIFO between interrupt handlers and the
    /// dispatcher.
    pub event_capacity: usize,
    /// The maximum number of pending scheduled callbacks.
    pub queue_capacity: usize,
    /// The modulus of the tick counter.
    pub modulus: Modulus,
    /// The longest time [`Dispatcher::run_for`] sleeps without checking for
    /// new events.
    ///
    /// [`Dispatcher::run_for`]: crate::dispatch::Dispatcher::run_for
    pub max_idle_wait: TickDiff,
}

impl Config {
    pub const DEFAULT: Self = Self {
        num_channels: 8,
        event_capacity: 32,
        queue_capacity: 16,
        modulus: Modulus::DEFAULT,
        max_idle_wait: 10,
    };
}

impl Default for Config {
    #[inline]
    fn default() -> Self {
        Self::DEFAULT
    }
}
