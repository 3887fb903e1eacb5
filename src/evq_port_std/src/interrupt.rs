//! Simulated interrupt controller
//!
//! There's no real interrupt hardware in a hosted environment. Instead,
//! [`InterruptLine::pend`] runs the attached handler immediately on the
//! calling thread, which is marked as being in interrupt context while the
//! handler runs. A handler may pend another line, in which case the second
//! handler runs nested inside the first, just like a higher-priority
//! interrupt would.
use evq_core::error::{AttachError, PendError};
use slab::Slab;
use spin::Mutex as SpinMutex;
use std::{
    cell::Cell,
    fmt,
    sync::{
        atomic::{AtomicBool, Ordering},
        Arc,
    },
};

use crate::Config;

/// Identifies an interrupt channel. The valid range is
/// `0..Config::num_channels`.
pub type Channel = usize;

type Handler = Arc<dyn Fn(Channel) + Send + Sync>;

thread_local! {
    /// The number of interrupt handlers currently running on this thread.
    static NESTING_DEPTH: Cell<usize> = Cell::new(0);
}

/// Return `true` iff the calling thread is running an interrupt handler.
pub fn is_interrupt_context() -> bool {
    nesting_depth() > 0
}

/// Get the number of interrupt handlers currently running on the calling
/// thread.
pub fn nesting_depth() -> usize {
    NESTING_DEPTH.with(|d| d.get())
}

/// Marks the current thread as running an interrupt handler for its
/// lifetime.
struct InterruptContextGuard;

impl InterruptContextGuard {
    fn enter() -> Self {
        NESTING_DEPTH.with(|d| d.set(d.get() + 1));
        Self
    }
}

impl Drop for InterruptContextGuard {
    fn drop(&mut self) {
        NESTING_DEPTH.with(|d| d.set(d.get() - 1));
    }
}

struct State {
    handlers: SpinMutex<Slab<Handler>>,
    num_channels: usize,
    deinited: AtomicBool,
}

/// A fixed set of interrupt channels that handlers can be attached to.
///
/// # Examples
///
/// ```
/// use evq_core::AttachError;
/// use evq_port_std::{interrupt::InterruptController, Config};
///
/// let controller = InterruptController::new(&Config {
///     num_channels: 1,
///     ..Config::default()
/// });
/// let line = controller.attach(|_| {}).unwrap();
/// assert_eq!(controller.attach(|_| {}).err(), Some(AttachError::ResourceBusy));
///
/// line.deinit();
/// assert!(controller.attach(|_| {}).is_ok());
/// ```
#[derive(Clone)]
pub struct InterruptController {
    state: Arc<State>,
}

impl InterruptController {
    pub fn new(config: &Config) -> Self {
        log::debug!(
            "creating an interrupt controller with {} channels",
            config.num_channels
        );
        Self {
            state: Arc::new(State {
                handlers: SpinMutex::new(Slab::with_capacity(config.num_channels)),
                num_channels: config.num_channels,
                deinited: AtomicBool::new(false),
            }),
        }
    }

    /// Attach `handler` to a free channel.
    ///
    /// The handler receives the channel number when it's called.
    pub fn attach(
        &self,
        handler: impl Fn(Channel) + Send + Sync + 'static,
    ) -> Result<InterruptLine, AttachError> {
        let mut handlers = self.state.handlers.lock();

        if self.state.deinited.load(Ordering::Relaxed) {
            return Err(AttachError::InvalidState);
        }

        // `Slab` fills vacant entries first, so the new key is within
        // `0..num_channels` as long as `len < num_channels`
        if handlers.len() >= self.state.num_channels {
            log::debug!("attach: all {} channels are in use", handlers.len());
            return Err(AttachError::ResourceBusy);
        }
        let channel = handlers.insert(Arc::new(handler));
        drop(handlers);

        log::debug!("attached a handler to channel {channel}");

        Ok(InterruptLine {
            state: Arc::clone(&self.state),
            channel,
            released: AtomicBool::new(false),
        })
    }

    #[inline]
    pub fn num_channels(&self) -> usize {
        self.state.num_channels
    }

    /// Get the number of channels that currently have a handler attached.
    pub fn num_attached(&self) -> usize {
        self.state.handlers.lock().len()
    }

    /// Detach every handler and refuse further attachments. Idempotent.
    ///
    /// Existing [`InterruptLine`]s fail to pend afterwards.
    pub fn deinit(&self) {
        let mut handlers = self.state.handlers.lock();
        if !self.state.deinited.swap(true, Ordering::Relaxed) {
            log::debug!("interrupt controller deinitialized");
        }
        // Drop the handlers after releasing the lock
        let detached = std::mem::take(&mut *handlers);
        drop(handlers);
        drop(detached);
    }

    #[inline]
    pub fn is_deinited(&self) -> bool {
        self.state.deinited.load(Ordering::Relaxed)
    }
}

impl fmt::Debug for InterruptController {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        f.debug_struct("InterruptController")
            .field("num_channels", &self.state.num_channels)
            .field("num_attached", &self.num_attached())
            .field("deinited", &self.is_deinited())
            .finish()
    }
}

/// A channel with a handler attached. The channel is released when this is
/// dropped or [`Self::deinit`] is called.
pub struct InterruptLine {
    state: Arc<State>,
    channel: Channel,
    released: AtomicBool,
}

impl InterruptLine {
    #[inline]
    pub fn channel(&self) -> Channel {
        self.channel
    }

    /// Run the attached handler in interrupt context and wait for it to
    /// complete.
    ///
    /// This may be called from another handler.
    pub fn pend(&self) -> Result<(), PendError> {
        let handler = {
            let handlers = self.state.handlers.lock();
            if self.released.load(Ordering::Relaxed)
                || self.state.deinited.load(Ordering::Relaxed)
            {
                return Err(PendError::InvalidState);
            }
            handlers
                .get(self.channel)
                .cloned()
                .ok_or(PendError::InvalidState)?
        };

        // The lock is released at this point, so the handler is free to pend
        // other lines or to attach new handlers
        let _guard = InterruptContextGuard::enter();
        log::trace!(
            "pend({}): entering the handler (depth = {})",
            self.channel,
            nesting_depth()
        );
        handler(self.channel);
        log::trace!("pend({}): leaving the handler", self.channel);

        Ok(())
    }

    /// Detach the handler and release the channel. Idempotent.
    pub fn deinit(&self) {
        let mut handlers = self.state.handlers.lock();
        if self.released.swap(true, Ordering::Relaxed) {
            return;
        }
        // The controller's teardown may have removed it already
        let detached = handlers
            .contains(self.channel)
            .then(|| handlers.remove(self.channel));
        drop(handlers);
        drop(detached);

        log::debug!("released channel {}", self.channel);
    }

    #[inline]
    pub fn is_deinited(&self) -> bool {
        self.released.load(Ordering::Relaxed)
    }
}

impl Drop for InterruptLine {
    fn drop(&mut self) {
        self.deinit();
    }
}

impl fmt::Debug for InterruptLine {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        f.debug_struct("InterruptLine")
            .field("channel", &self.channel)
            .field("released", &self.is_deinited())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::{
        atomic::{AtomicUsize, Ordering},
        Mutex,
    };

    fn controller(num_channels: usize) -> InterruptController {
        let _ = env_logger::builder().is_test(true).try_init();
        InterruptController::new(&Config {
            num_channels,
            ..Config::default()
        })
    }

    #[test]
    fn channels_are_finite() {
        let c = controller(2);
        let a = c.attach(|_| {}).unwrap();
        let b = c.attach(|_| {}).unwrap();
        assert_ne!(a.channel(), b.channel());
        assert!(a.channel() < 2 && b.channel() < 2);
        assert_eq!(c.attach(|_| {}).err(), Some(AttachError::ResourceBusy));
        assert_eq!(c.num_attached(), 2);

        drop(a);
        let a2 = c.attach(|_| {}).unwrap();
        assert!(a2.channel() < 2);
    }

    #[test]
    fn no_channels() {
        let c = controller(0);
        assert_eq!(c.attach(|_| {}).err(), Some(AttachError::ResourceBusy));
    }

    #[test]
    fn pend_runs_in_interrupt_context() {
        let c = controller(1);
        let hits = Arc::new(AtomicUsize::new(0));
        let line = {
            let hits = Arc::clone(&hits);
            c.attach(move |_| {
                assert!(is_interrupt_context());
                hits.fetch_add(1, Ordering::Relaxed);
            })
            .unwrap()
        };

        assert!(!is_interrupt_context());
        line.pend().unwrap();
        line.pend().unwrap();
        assert!(!is_interrupt_context());
        assert_eq!(hits.load(Ordering::Relaxed), 2);
    }

    #[test]
    fn nested_pend() {
        let c = controller(2);
        let log = Arc::new(Mutex::new(Vec::new()));

        let inner = {
            let log = Arc::clone(&log);
            Arc::new(
                c.attach(move |ch| log.lock().unwrap().push(("inner", ch, nesting_depth())))
                    .unwrap(),
            )
        };
        let outer = {
            let log = Arc::clone(&log);
            let inner = Arc::clone(&inner);
            c.attach(move |ch| {
                log.lock().unwrap().push(("outer-enter", ch, nesting_depth()));
                inner.pend().unwrap();
                log.lock().unwrap().push(("outer-leave", ch, nesting_depth()));
            })
            .unwrap()
        };

        outer.pend().unwrap();
        let (i, o) = (inner.channel(), outer.channel());
        assert_eq!(
            *log.lock().unwrap(),
            [("outer-enter", o, 1), ("inner", i, 2), ("outer-leave", o, 1)]
        );
        assert_eq!(nesting_depth(), 0);
    }

    #[test]
    fn released_line_fails_to_pend() {
        let c = controller(1);
        let line = c.attach(|_| {}).unwrap();
        line.deinit();
        line.deinit();
        assert!(line.is_deinited());
        assert_eq!(line.pend(), Err(PendError::InvalidState));

        // The channel number is reused, but the old handle stays dead
        let new_line = c.attach(|_| {}).unwrap();
        assert_eq!(new_line.channel(), line.channel());
        assert_eq!(line.pend(), Err(PendError::InvalidState));
        assert_eq!(new_line.pend(), Ok(()));
    }

    #[test]
    fn controller_teardown() {
        let c = controller(1);
        let line = c.attach(|_| {}).unwrap();
        c.deinit();
        c.deinit();
        assert_eq!(line.pend(), Err(PendError::InvalidState));
        assert_eq!(c.attach(|_| {}).err(), Some(AttachError::InvalidState));
        assert_eq!(c.num_attached(), 0);
    }

    #[test]
    fn depth_is_restored_after_panic() {
        let c = controller(1);
        let line = c.attach(|_| panic!("handler failed")).unwrap();
        let result = std::panic::catch_unwind(std::panic::AssertUnwindSafe(|| line.pend()));
        assert!(result.is_err());
        assert!(!is_interrupt_context());
    }
}
