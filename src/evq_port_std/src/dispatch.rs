//! The dispatcher loop
//!
//! [`Dispatcher`] is the consumer side of the system. It owns
//!
//!  - an event FIFO that interrupt handlers feed through an [`EventSink`],
//!  - per-channel event handlers, and
//!  - a table of scheduled callbacks, each tracked by a [`Timer`], and
//!  - a [`WaitQueue`] of the timers' upcoming deadlines.
//!
//! [`Dispatcher::run_once`] first drains the event FIFO and then runs every
//! callback whose deadline has been reached. It never runs in interrupt
//! context, so the callbacks may do anything a normal function can.
use evq_core::{
    error::{GetError, NewDispatcherError, PutError, ScheduleError, TimerError},
    fifo::AtomicFifoPair,
    tick::{Tick, TickClock, TickDiff},
    wait_queue::WaitQueue,
};
use slab::Slab;
use std::{
    collections::HashMap,
    fmt,
    sync::{
        atomic::{AtomicBool, AtomicU32, Ordering},
        Arc,
    },
};

use crate::{clock::WaitClock, interrupt::Channel, Config};


type EventHandler = Box<dyn FnMut(Channel, Tick)>;
type Callback = Box<dyn FnMut(&Timer)>;

/// The producer end of a [`Dispatcher`]'s event FIFO.
///
/// This is safe to use from interrupt handlers.
#[derive(Debug, Clone)]
pub struct EventSink {
    fifo: Arc<AtomicFifoPair<Channel, Tick>>,
}

impl EventSink {
    /// Report an event. Returns `false` if the FIFO is full.
    #[inline]
    pub fn put(&self, channel: Channel, timestamp: Tick) -> bool {
        self.fifo.put(channel, timestamp)
    }

    #[inline]
    pub fn try_put(&self, channel: Channel, timestamp: Tick) -> Result<(), PutError> {
        self.fifo.try_put(channel, timestamp)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TimerMode {
    /// Fire once and then become inactive.
    OneShot,
    /// Fire every `period` ticks until stopped.
    Periodic,
}

struct TimerState {
    mode: TimerMode,
    /// The delay of a one-shot timer or the period of a periodic one
    interval: TickDiff,
    /// The key in the owning dispatcher's timer table
    key: usize,
    active: AtomicBool,
    deinited: AtomicBool,
    /// Incremented by every restart. Wait queue entries carrying an older
    /// generation are stale.
    generation: AtomicU32,
    started_at: AtomicU32,
    fire_count: AtomicU32,
}

/// A handle to a callback scheduled on a [`Dispatcher`].
///
/// A timer is *active* while its callback is going to be called. It becomes
/// inactive when it's stopped or, for a one-shot timer, when it fires.
/// [`Dispatcher::restart`] makes it active again.
///
/// Stopping a timer doesn't remove its entry from the wait queue right away.
/// The entry stays there until its deadline and is discarded when the
/// dispatcher pops it.
#[derive(Clone)]
pub struct Timer {
    state: Arc<TimerState>,
}

impl Timer {
    #[inline]
    pub fn mode(&self) -> TimerMode {
        self.state.mode
    }

    /// Get the period of a periodic timer.
    #[inline]
    pub fn period(&self) -> Option<TickDiff> {
        match self.state.mode {
            TimerMode::OneShot => None,
            TimerMode::Periodic => Some(self.state.interval),
        }
    }

    /// Prevent any further invocation of the callback until the timer is
    /// restarted. Stopping an inactive timer is a no-op.
    ///
    /// This may be called from the callback itself or from an interrupt
    /// handler.
    pub fn stop(&self) -> Result<(), TimerError> {
        self.check()?;
        if self.state.active.swap(false, Ordering::Relaxed) {
            log::trace!("stopped a timer {:p}", Arc::as_ptr(&self.state));
        }
        Ok(())
    }

    /// Tear down the timer. Idempotent.
    ///
    /// The callback is never called again and is dropped by the dispatcher
    /// the next time it schedules or pops something. Other operations on the
    /// timer fail with `InvalidState` afterwards.
    pub fn deinit(&self) {
        self.state.active.store(false, Ordering::Relaxed);
        if !self.state.deinited.swap(true, Ordering::Relaxed) {
            log::trace!("deinitialized a timer {:p}", Arc::as_ptr(&self.state));
        }
    }

    #[inline]
    pub fn is_deinited(&self) -> bool {
        self.state.deinited.load(Ordering::Relaxed)
    }

    /// Return `true` iff the callback is still going to be called.
    #[inline]
    pub fn is_active(&self) -> bool {
        self.state.active.load(Ordering::Relaxed)
    }

    /// Get the number of times the callback has been called.
    #[inline]
    pub fn fire_count(&self) -> u32 {
        self.state.fire_count.load(Ordering::Relaxed)
    }

    #[inline]
    fn check(&self) -> Result<(), TimerError> {
        if self.is_deinited() {
            Err(TimerError::InvalidState)
        } else {
            Ok(())
        }
    }

    #[inline]
    fn generation(&self) -> u32 {
        self.state.generation.load(Ordering::Relaxed)
    }
}

impl fmt::Debug for Timer {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        f.debug_struct("Timer")
            .field("mode", &self.mode())
            .field("interval", &self.state.interval)
            .field("active", &self.is_active())
            .field("deinited", &self.is_deinited())
            .field("fire_count", &self.fire_count())
            .finish()
    }
}

/// An element of the dispatcher's timer table.
struct TimerSlot {
    timer: Timer,
    callback: Callback,
}

/// An entry of the dispatcher's wait queue.
struct Scheduled {
    timer: Timer,
    generation: u32,
}

/// Runs event handlers and scheduled callbacks.
///
/// # Examples
///
/// ```
/// use evq_core::tick::Modulus;
/// use evq_port_std::{clock::ManualClock, dispatch::Dispatcher, Config};
/// use std::{cell::Cell, rc::Rc};
///
/// let clock = ManualClock::new(Modulus::DEFAULT, 0);
/// let mut dispatcher = Dispatcher::new(&clock, &Config::default()).unwrap();
///
/// let fired = Rc::new(Cell::new(false));
/// let fired2 = Rc::clone(&fired);
/// dispatcher.call_later(100, move |_| fired2.set(true)).unwrap();
///
/// dispatcher.run_for(99);
/// assert!(!fired.get());
/// dispatcher.run_for(1);
/// assert!(fired.get());
/// ```
pub struct Dispatcher<C> {
    clock: C,
    events: Arc<AtomicFifoPair<Channel, Tick>>,
    event_handlers: HashMap<Channel, EventHandler>,
    timers: Slab<TimerSlot>,
    queue: WaitQueue<Scheduled>,
    max_idle_wait: TickDiff,
}

impl<C: TickClock> Dispatcher<C> {
    pub fn new(clock: C, config: &Config) -> Result<Self, NewDispatcherError> {
        if clock.modulus() != config.modulus || config.max_idle_wait <= 0 {
            return Err(NewDispatcherError::ConfigurationError);
        }

        let events = AtomicFifoPair::new(config.event_capacity)
            .map_err(|_| NewDispatcherError::ConfigurationError)?;
        let queue = WaitQueue::new(config.queue_capacity, config.modulus)
            .map_err(|_| NewDispatcherError::ConfigurationError)?;

        log::debug!(
            "created a dispatcher (event_capacity = {}, queue_capacity = {})",
            config.event_capacity,
            config.queue_capacity
        );

        Ok(Self {
            clock,
            events: Arc::new(events),
            event_handlers: HashMap::new(),
            timers: Slab::new(),
            queue,
            max_idle_wait: config.max_idle_wait,
        })
    }

    #[inline]
    pub fn clock(&self) -> &C {
        &self.clock
    }

    /// Get a handle through which interrupt handlers can report events.
    pub fn event_sink(&self) -> EventSink {
        EventSink {
            fifo: Arc::clone(&self.events),
        }
    }

    /// Register `handler` to be called for every event reported on `channel`,
    /// replacing the previous one.
    ///
    /// Events on channels without a handler are discarded.
    pub fn on_event(&mut self, channel: Channel, handler: impl FnMut(Channel, Tick) + 'static) {
        self.event_handlers.insert(channel, Box::new(handler));
    }

    /// Stop handling events on `channel`. Returns `false` if no handler was
    /// registered.
    pub fn remove_event_handler(&mut self, channel: Channel) -> bool {
        self.event_handlers.remove(&channel).is_some()
    }

    /// Call `callback` once when the clock reaches `deadline`.
    ///
    /// A deadline that is in the past (by less than `M / 2`) is due
    /// immediately.
    pub fn call_at(
        &mut self,
        deadline: Tick,
        callback: impl FnMut(&Timer) + 'static,
    ) -> Result<Timer, ScheduleError> {
        let delay = self
            .queue
            .modulus()
            .ticks_diff(deadline, self.clock.now())
            .max(0);
        self.schedule(deadline, TimerMode::OneShot, delay, Box::new(callback))
    }

    /// Call `callback` once after `delay` ticks.
    ///
    /// `delay` must be in range `0..M/2`.
    pub fn call_later(
        &mut self,
        delay: TickDiff,
        callback: impl FnMut(&Timer) + 'static,
    ) -> Result<Timer, ScheduleError> {
        self.check_interval(delay)?;
        let deadline = self.clock.deadline_in(delay);
        self.schedule(deadline, TimerMode::OneShot, delay, Box::new(callback))
    }

    /// Call `callback` every `period` ticks, starting `period` ticks from now.
    ///
    /// `period` must be in range `1..M/2`. Deadlines are computed from the
    /// previous deadline, not from the time the callback actually ran, so the
    /// timer doesn't drift. If the dispatcher falls behind, the missed calls
    /// are made back to back.
    pub fn call_every(
        &mut self,
        period: TickDiff,
        callback: impl FnMut(&Timer) + 'static,
    ) -> Result<Timer, ScheduleError> {
        if period == 0 {
            return Err(ScheduleError::ConfigurationError);
        }
        self.check_interval(period)?;
        let deadline = self.clock.deadline_in(period);
        self.schedule(deadline, TimerMode::Periodic, period, Box::new(callback))
    }

    fn check_interval(&self, ticks: TickDiff) -> Result<(), ScheduleError> {
        let half = self.queue.modulus().half();
        if ticks < 0 || ticks as u32 >= half {
            Err(ScheduleError::ConfigurationError)
        } else {
            Ok(())
        }
    }

    fn schedule(
        &mut self,
        deadline: Tick,
        mode: TimerMode,
        interval: TickDiff,
        callback: Callback,
    ) -> Result<Timer, ScheduleError> {
        self.timers.retain(|_, slot| !slot.timer.is_deinited());

        let slot = self.timers.vacant_entry();
        let timer = Timer {
            state: Arc::new(TimerState {
                mode,
                interval,
                key: slot.key(),
                active: AtomicBool::new(true),
                deinited: AtomicBool::new(false),
                generation: AtomicU32::new(0),
                started_at: AtomicU32::new(self.clock.now()),
                fire_count: AtomicU32::new(0),
            }),
        };

        self.queue
            .push(
                deadline,
                Scheduled {
                    timer: timer.clone(),
                    generation: 0,
                },
            )
            .map_err(|_| ScheduleError::CapacityExceeded)?;
        slot.insert(TimerSlot {
            timer: timer.clone(),
            callback,
        });

        log::trace!("scheduled a {mode:?} timer at {deadline}");

        Ok(timer)
    }

    /// Start `timer` over from now, whether or not it's running.
    ///
    /// The next call is made one interval (the delay of a one-shot timer or
    /// the period of a periodic one) from now. A pending call from before the
    /// restart is cancelled. Its wait queue entry still occupies space until
    /// its deadline.
    pub fn restart(&mut self, timer: &Timer) -> Result<(), TimerError> {
        timer.check()?;
        if !self.owns(timer) {
            return Err(TimerError::BadId);
        }

        let now = self.clock.now();
        let generation = timer.generation().wrapping_add(1);
        let deadline = self.queue.modulus().ticks_add(now, timer.state.interval);
        self.queue
            .push(
                deadline,
                Scheduled {
                    timer: timer.clone(),
                    generation,
                },
            )
            .map_err(|_| TimerError::CapacityExceeded)?;

        let state = &timer.state;
        state.generation.store(generation, Ordering::Relaxed);
        state.started_at.store(now, Ordering::Relaxed);
        state.active.store(true, Ordering::Relaxed);

        log::trace!("restarted a {:?} timer, next call at {deadline}", state.mode);

        Ok(())
    }

    /// Get the number of ticks elapsed since `timer` was scheduled or last
    /// restarted.
    pub fn elapsed(&self, timer: &Timer) -> Result<TickDiff, TimerError> {
        timer.check()?;
        if !self.owns(timer) {
            return Err(TimerError::BadId);
        }
        let started_at = timer.state.started_at.load(Ordering::Relaxed);
        Ok(self.clock.ticks_since(started_at))
    }

    /// Get the number of timers whose callbacks are retained, i.e., the
    /// timers that can still be restarted plus torn-down ones that haven't
    /// been dropped yet.
    #[inline]
    pub fn num_timers(&self) -> usize {
        self.timers.len()
    }

    fn owns(&self, timer: &Timer) -> bool {
        self.timers
            .get(timer.state.key)
            .map_or(false, |slot| Arc::ptr_eq(&slot.timer.state, &timer.state))
    }

    /// Drop the callback of a torn-down timer.
    fn release(&mut self, timer: &Timer) {
        if self.owns(timer) {
            self.timers.remove(timer.state.key);
            log::trace!("released a timer {:p}", Arc::as_ptr(&timer.state));
        }
    }

    /// Handle all pending events and then run every callback that is due.
    ///
    /// Returns the number of handlers and callbacks that were called.
    pub fn run_once(&mut self) -> usize {
        self.dispatch_events() + self.dispatch_due()
    }

    fn dispatch_events(&mut self) -> usize {
        let mut count = 0;
        loop {
            match self.events.get() {
                Ok((channel, timestamp)) => {
                    if let Some(handler) = self.event_handlers.get_mut(&channel) {
                        log::trace!("event on channel {channel} at {timestamp}");
                        handler(channel, timestamp);
                        count += 1;
                    } else {
                        log::debug!("discarding an event on channel {channel} (no handler)");
                    }
                }
                Err(GetError::Empty) => break,
                Err(e) => {
                    log::warn!("failed to retrieve an event: {e:?}");
                    break;
                }
            }
        }
        count
    }

    fn dispatch_due(&mut self) -> usize {
        let now = self.clock.now();
        let modulus = self.queue.modulus();
        let mut count = 0;

        while let Ok(deadline) = self.queue.peek_deadline() {
            if modulus.ticks_less(now, deadline) {
                break;
            }

            let Scheduled { timer, generation } = match self.queue.pop() {
                Ok(x) => x,
                Err(_) => break,
            };

            if timer.is_deinited() {
                self.release(&timer);
                continue;
            }
            if generation != timer.generation() || !timer.is_active() {
                log::trace!("discarding a cancelled timer call due at {deadline}");
                continue;
            }

            if timer.mode() == TimerMode::OneShot {
                timer.state.active.store(false, Ordering::Relaxed);
            }
            timer.state.fire_count.fetch_add(1, Ordering::Relaxed);

            let slot = match self.timers.get_mut(timer.state.key) {
                Some(slot) => slot,
                None => {
                    log::warn!("a live timer is missing from the timer table");
                    continue;
                }
            };

            log::trace!("running a timer due at {deadline} (now = {now})");
            (slot.callback)(&timer);
            count += 1;

            if timer.is_deinited() {
                self.release(&timer);
            } else if timer.mode() == TimerMode::Periodic && timer.is_active() {
                let next = modulus.ticks_add(deadline, timer.state.interval);
                let entry = Scheduled {
                    timer: timer.clone(),
                    generation,
                };
                // We've just popped an entry, so there's room for this
                if self.queue.push(next, entry).is_err() {
                    log::warn!("failed to reschedule a periodic timer");
                    timer.state.active.store(false, Ordering::Relaxed);
                }
            }
        }

        count
    }

    /// Get the number of ticks until the earliest scheduled deadline, or
    /// `None` if nothing is scheduled. Returns `0` if the deadline has
    /// already passed.
    ///
    /// Stopped timers that haven't been discarded yet are taken into account.
    pub fn next_deadline_in(&self) -> Option<TickDiff> {
        let deadline = self.queue.peek_deadline().ok()?;
        let modulus = self.queue.modulus();
        Some(modulus.ticks_diff(deadline, self.clock.now()).max(0))
    }

    /// Get the number of scheduled callbacks, including stopped timers that
    /// haven't been discarded yet.
    #[inline]
    pub fn num_scheduled(&self) -> usize {
        self.queue.len()
    }

    /// Return `true` iff there are no pending events and no scheduled
    /// callbacks.
    pub fn is_idle(&self) -> bool {
        self.events.is_empty() && self.queue.is_empty()
    }
}

impl<C: WaitClock> Dispatcher<C> {
    /// Keep dispatching for `ticks` ticks, waiting on the clock in between.
    ///
    /// `ticks` must be less than `M / 2`. Returns the number of handlers and
    /// callbacks that were called.
    pub fn run_for(&mut self, ticks: TickDiff) -> usize {
        let start = self.clock.now();
        let mut count = 0;

        loop {
            count += self.run_once();

            let remaining = ticks - self.clock.ticks_since(start);
            if remaining <= 0 {
                break;
            }
            if !self.events.is_empty() {
                continue;
            }

            let wait = self
                .next_deadline_in()
                .map_or(remaining, |d| d.min(remaining))
                .min(self.max_idle_wait);
            self.clock.wait(wait);
        }

        count
    }
}

impl<C: fmt::Debug> fmt::Debug for Dispatcher<C> {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        f.debug_struct("Dispatcher")
            .field("clock", &self.clock)
            .field("events", &self.events)
            .field("event_channels", &self.event_handlers.keys())
            .field("num_timers", &self.timers.len())
            .field("queue", &self.queue)
            .finish()
    }
}
