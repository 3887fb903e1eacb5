//! Error types
use core::{fmt, mem::transmute};

/// The macro to define [`ResultCode`].
macro_rules! define_result_code {
    (
        $( #[$meta:meta] )*
        pub enum ResultCode {
            $(
                $( #[$vmeta:meta] )*
                $vname:ident = $vd:expr
            ),* $(,)*
        }
    ) => {
        $( #[$meta] )*
        pub enum ResultCode {
            $(
                $( #[$vmeta] )*
                $vname = $vd
            ),*
        }

        impl ResultCode {
            /// Get the short name of the result code.
            ///
            /// # Examples
            ///
            /// ```
            /// use evq_core::ResultCode;
            /// assert_eq!(ResultCode::InvalidState.as_str(), "InvalidState");
            /// ```
            pub fn as_str(self) -> &'static str {
                match self {
                    $(
                        Self::$vname => stringify!($vname),
                    )*
                }
            }

            fn fmt(self, f: &mut fmt::Formatter) -> fmt::Result {
                f.write_str(self.as_str())
            }
        }

        impl fmt::Debug for ResultCode {
            #[inline]
            fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
                (*self).fmt(f)
            }
        }

        impl fmt::Display for ResultCode {
            #[inline]
            fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
                (*self).fmt(f)
            }
        }
    };
}

define_result_code! {
    /// All result codes (including success) that an operation of this crate
    /// can produce.
    ///
    /// Every error is reported synchronously to the caller of the failing
    /// operation. Nothing is retried internally.
    #[derive(Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
    #[repr(i8)]
    pub enum ResultCode {
        /// The operation was successful. No additional information is available.
        Success = 0,
        /// A capacity or another construction parameter is invalid. The object
        /// was not created.
        ConfigurationError = -17,
        /// The object doesn't belong to the one it was passed to.
        BadId = -18,
        /// The current context disallows the operation, e.g., the consumer
        /// side of a FIFO was entered while another consumer call was still
        /// in progress.
        BadContext = -25,
        /// No free interrupt channel is available.
        ResourceBusy = -33,
        /// The object was torn down and can't be used anymore.
        InvalidState = -41,
        /// The FIFO is full.
        Full = -43,
        /// The wait queue is full.
        CapacityExceeded = -44,
        /// There is nothing to retrieve.
        Empty = -50,
    }
}

impl ResultCode {
    /// Get a flag indicating whether the code represents a failure.
    ///
    /// Failure codes have negative values.
    #[inline]
    pub fn is_err(self) -> bool {
        (self as i8) < 0
    }

    /// Get a flag indicating whether the code represents a success.
    ///
    /// Success codes have non-negative values.
    #[inline]
    pub fn is_ok(self) -> bool {
        !self.is_err()
    }
}

macro_rules! define_error {
    (
        mod $mod_name:ident {}
        $( #[$meta:meta] )*
        $vis:vis enum $name:ident {
            $(
                $( #[$vmeta:meta] )*
                $vname:ident
            ),* $(,)*
        }
    ) => {
        $( #[$meta] )*
        ///
        /// See [`ResultCode`] for all result codes and generic descriptions.
        #[derive(Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
        #[repr(i8)]
        $vis enum $name {
            $(
                $( #[$vmeta] )*
                // Use the same discriminants as `ResultCode` for cost-free
                // conversion
                $vname = ResultCode::$vname as i8
            ),*
        }

        impl fmt::Debug for $name {
            #[inline]
            fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
                ResultCode::from(*self).fmt(f)
            }
        }

        impl fmt::Display for $name {
            #[inline]
            fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
                ResultCode::from(*self).fmt(f)
            }
        }

        impl From<Result<(), $name>> for ResultCode {
            #[inline]
            fn from(x: Result<(), $name>) -> Self {
                match x {
                    Ok(()) => Self::Success,
                    Err(e) => Self::from(e),
                }
            }
        }

        impl From<$name> for ResultCode {
            #[inline]
            fn from(x: $name) -> Self {
                // Safety: `ResultCode` and `$name` has the same representation
                //         type, and the representation of `ResultCode` is a
                //         superset of `x`.
                unsafe { transmute(x) }
            }
        }

        #[cfg(test)]
        mod $mod_name {
            use super::*;

            #[test]
            fn to_result_code() {
                $(
                    assert_eq!(
                        ResultCode::$vname,
                        ResultCode::from($name::$vname),
                    );
                )*
            }

            #[test]
            fn result_to_result_code() {
                $(
                    assert_eq!(
                        ResultCode::$vname,
                        ResultCode::from(Err($name::$vname)),
                    );
                )*
                assert_eq!(
                    ResultCode::Success,
                    ResultCode::from(Result::<(), $name>::Ok(())),
                );
            }
        }
    };
}

define_error! {
    mod new_modulus_error {}
    /// Error type for [`Modulus::new`].
    ///
    /// [`Modulus::new`]: crate::tick::Modulus::new
    pub enum NewModulusError {
        /// The modulus is not a power of two or is out of range.
        ConfigurationError,
    }
}

define_error! {
    mod new_fifo_error {}
    /// Error type for [`AtomicFifo::new`] and [`AtomicFifoPair::new`].
    ///
    /// [`AtomicFifo::new`]: crate::fifo::AtomicFifo::new
    /// [`AtomicFifoPair::new`]: crate::fifo::AtomicFifoPair::new
    pub enum NewFifoError {
        /// The capacity is zero or too large to be indexed.
        ConfigurationError,
    }
}

define_error! {
    mod put_error {}
    /// Error type for [`AtomicFifo::try_put`] and [`AtomicFifoPair::try_put`].
    ///
    /// [`AtomicFifo::try_put`]: crate::fifo::AtomicFifo::try_put
    /// [`AtomicFifoPair::try_put`]: crate::fifo::AtomicFifoPair::try_put
    pub enum PutError {
        /// The FIFO was torn down.
        InvalidState,
        /// All slots are occupied.
        Full,
    }
}

define_error! {
    mod get_error {}
    /// Error type for [`AtomicFifo::get`] and [`AtomicFifoPair::get`].
    ///
    /// [`AtomicFifo::get`]: crate::fifo::AtomicFifo::get
    /// [`AtomicFifoPair::get`]: crate::fifo::AtomicFifoPair::get
    pub enum GetError {
        /// Another consumer call is in progress.
        BadContext,
        /// The FIFO was torn down.
        InvalidState,
        /// No committed item is available.
        Empty,
    }
}

define_error! {
    mod new_wait_queue_error {}
    /// Error type for [`WaitQueue::new`] and [`WaitQueue::with_storage`].
    ///
    /// [`WaitQueue::new`]: crate::wait_queue::WaitQueue::new
    /// [`WaitQueue::with_storage`]: crate::wait_queue::WaitQueue::with_storage
    pub enum NewWaitQueueError {
        /// The capacity is zero, or the supplied storage is not empty.
        ConfigurationError,
    }
}

define_error! {
    mod push_error {}
    /// Error type for [`WaitQueue::push`].
    ///
    /// [`WaitQueue::push`]: crate::wait_queue::WaitQueue::push
    pub enum PushError {
        /// `len() == capacity()`.
        CapacityExceeded,
    }
}

define_error! {
    mod pop_error {}
    /// Error type for [`WaitQueue::pop`].
    ///
    /// [`WaitQueue::pop`]: crate::wait_queue::WaitQueue::pop
    pub enum PopError {
        /// The queue is empty.
        Empty,
    }
}

define_error! {
    mod peek_error {}
    /// Error type for [`WaitQueue::peek_deadline`].
    ///
    /// [`WaitQueue::peek_deadline`]: crate::wait_queue::WaitQueue::peek_deadline
    pub enum PeekError {
        /// The queue is empty.
        Empty,
    }
}

define_error! {
    mod attach_error {}
    /// Error type for attaching a handler to an interrupt channel.
    pub enum AttachError {
        /// Every interrupt channel is in use.
        ResourceBusy,
        /// The interrupt controller was torn down.
        InvalidState,
    }
}

define_error! {
    mod pend_error {}
    /// Error type for raising an interrupt on an attached channel.
    pub enum PendError {
        /// The channel was released.
        InvalidState,
    }
}

define_error! {
    mod chronometer_error {}
    /// Error type for operations on a stopwatch-like object.
    pub enum ChronometerError {
        /// The object was torn down.
        InvalidState,
    }
}

define_error! {
    mod schedule_error {}
    /// Error type for scheduling a callback on a dispatcher.
    pub enum ScheduleError {
        /// The delay or period is out of range.
        ConfigurationError,
        /// The dispatcher's wait queue is full.
        CapacityExceeded,
    }
}

define_error! {
    mod new_dispatcher_error {}
    /// Error type for constructing a dispatcher.
    pub enum NewDispatcherError {
        /// A capacity is zero, or the clock's modulus doesn't match the
        /// configured one.
        ConfigurationError,
    }
}


define_error! {
    mod timer_error {}
    /// Error type for operations on a scheduled timer.
    pub enum TimerError {
        /// The timer doesn't belong to this dispatcher.
        BadId,
        /// The timer was torn down.
        InvalidState,
        /// The dispatcher's wait queue is full.
        CapacityExceeded,
    }
}
