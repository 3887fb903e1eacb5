//! Interrupt-safe FIFOs
//!
//! [`AtomicFifo`] moves single items, and [`AtomicFifoPair`] moves two-item
//! records, from interrupt handlers to a consumer running outside of
//! interrupt context.
//!
//! # Contexts
//!
//! | Operation          | Interrupt context | Normal context       |
//! | ------------------ | ----------------- | -------------------- |
//! | `put`, `try_put`   | ✓ (may nest)      | ✓                    |
//! | `get`              |                   | ✓ (one caller)       |
//! | `len`, `is_empty`  |                   | ✓ (consumer's side)  |
//! | `deinit`           | ✓                 | ✓                    |
//!
//! `len` and `is_empty` are exact (up to puts completing concurrently) only
//! when called by the consumer. Called from anywhere else, they race with
//! `get` and only give an estimate in range `0..=capacity`.
//!
//! `put` never blocks, never allocates, and completes in a bounded number of
//! steps as long as it's only preempted by other puts (not by a concurrently
//! running thread). It may be invoked from a handler that preempted another
//! `put` on the same FIFO. Producers running in parallel on multiple cores
//! are not supported.
//!
//! Items are delivered in the order in which their `put`s completed. When a
//! `put` is preempted by a handler that puts more items, the handler's items
//! come first.
//!
//! Only `Copy` types can be transported so that a failed `put` never has to
//! run a destructor in interrupt context.
use crate::error::{GetError, NewFifoError, PutError};

mod ring;
#[cfg(test)]
mod tests;

use self::ring::Ring;

/// Fixed-capacity, interrupt-reentrant, allocation-free (after construction)
/// single-item FIFO.
///
/// # Examples
///
/// ```
/// use evq_core::{fifo::AtomicFifo, GetError};
///
/// let fifo = AtomicFifo::new(2).unwrap();
/// assert!(fifo.put(1u32));
/// assert!(fifo.put(2));
/// assert!(!fifo.put(3));
///
/// assert_eq!(fifo.get(), Ok(1));
/// assert_eq!(fifo.get(), Ok(2));
/// assert_eq!(fifo.get(), Err(GetError::Empty));
/// ```
#[derive(Debug)]
pub struct AtomicFifo<T> {
    ring: Ring<T>,
}

impl<T: Copy> AtomicFifo<T> {
    /// Construct a FIFO that can hold up to `capacity` items.
    ///
    /// This is the only operation that allocates memory.
    pub fn new(capacity: usize) -> Result<Self, NewFifoError> {
        Ok(Self {
            ring: Ring::new(capacity)?,
        })
    }

    /// Add an item. Returns `false` if the FIFO is full or was torn down.
    ///
    /// This method is safe to call from an interrupt handler, including
    /// nested calls.
    #[inline]
    pub fn put(&self, item: T) -> bool {
        self.ring.put(item).is_ok()
    }

    /// Add an item, reporting why it was refused.
    ///
    /// This method is safe to call from an interrupt handler, including
    /// nested calls.
    #[inline]
    pub fn try_put(&self, item: T) -> Result<(), PutError> {
        self.ring.put(item)
    }

    /// Remove the oldest committed item.
    ///
    /// This method must not be called from an interrupt handler. Calling it
    /// while another call is in progress fails with
    /// [`GetError::BadContext`].
    #[inline]
    pub fn get(&self) -> Result<T, GetError> {
        self.ring.get()
    }

    /// Get the number of items that can be retrieved by [`Self::get`].
    ///
    /// The value is informational. It can be stale by the time it's returned
    /// if a `put` is in flight.
    #[inline]
    pub fn len(&self) -> usize {
        self.ring.len()
    }

    /// Get a flag indicating whether [`Self::len`] is zero.
    #[inline]
    pub fn is_empty(&self) -> bool {
        self.ring.len() == 0
    }

    #[inline]
    pub fn capacity(&self) -> usize {
        self.ring.capacity()
    }

    /// Tear down the FIFO. Idempotent.
    ///
    /// Afterwards, `put` returns `false`, and `try_put` and `get` fail with
    /// `InvalidState`. Items still in the FIFO are discarded.
    #[inline]
    pub fn deinit(&self) {
        self.ring.deinit()
    }

    #[inline]
    pub fn is_deinited(&self) -> bool {
        self.ring.is_deinited()
    }
}

/// [`AtomicFifo`] that moves a pair of values as one indivisible unit.
///
/// The consumer always receives both values of a pair together.
///
/// # Examples
///
/// ```
/// use evq_core::fifo::AtomicFifoPair;
///
/// let fifo = AtomicFifoPair::new(4).unwrap();
/// assert!(fifo.put(7u8, 1000u32));
/// assert_eq!(fifo.get(), Ok((7, 1000)));
/// ```
#[derive(Debug)]
pub struct AtomicFifoPair<A, B> {
    ring: Ring<(A, B)>,
}

impl<A: Copy, B: Copy> AtomicFifoPair<A, B> {
    /// Construct a FIFO that can hold up to `capacity` pairs.
    ///
    /// This is the only operation that allocates memory.
    pub fn new(capacity: usize) -> Result<Self, NewFifoError> {
        Ok(Self {
            ring: Ring::new(capacity)?,
        })
    }

    /// Add a pair. Returns `false` if the FIFO is full or was torn down.
    ///
    /// This method is safe to call from an interrupt handler, including
    /// nested calls.
    #[inline]
    pub fn put(&self, first: A, second: B) -> bool {
        self.ring.put((first, second)).is_ok()
    }

    /// Add a pair, reporting why it was refused.
    #[inline]
    pub fn try_put(&self, first: A, second: B) -> Result<(), PutError> {
        self.ring.put((first, second))
    }

    /// Remove the oldest committed pair.
    ///
    /// This method must not be called from an interrupt handler.
    #[inline]
    pub fn get(&self) -> Result<(A, B), GetError> {
        self.ring.get()
    }

    /// Get the number of pairs that can be retrieved by [`Self::get`].
    #[inline]
    pub fn len(&self) -> usize {
        self.ring.len()
    }

    #[inline]
    pub fn is_empty(&self) -> bool {
        self.ring.len() == 0
    }

    #[inline]
    pub fn capacity(&self) -> usize {
        self.ring.capacity()
    }

    /// Tear down the FIFO. Idempotent.
    #[inline]
    pub fn deinit(&self) {
        self.ring.deinit()
    }

    #[inline]
    pub fn is_deinited(&self) -> bool {
        self.ring.is_deinited()
    }
}
