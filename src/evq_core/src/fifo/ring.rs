//! The ring shared by [`AtomicFifo`] and [`AtomicFifoPair`].
//!
//! [`AtomicFifo`]: super::AtomicFifo
//! [`AtomicFifoPair`]: super::AtomicFifoPair
//!
//! # Structure
//!
//! Items are stored in `capacity` data slots. Which slot comes next is
//! recorded separately, in an *order ring* of `capacity + 1` slot indices:
//!
//! ```text
//!  free list          data slots                order ring
//!  ┌───┐           ┌────┬────┬────┬────┐    ┌───┬───┬───┬───┬───┐
//!  │ 3 ├─► NIL     │ x₀ │ x₁ │ x₂ │    │    │   │ 2 │ 0 │   │   │
//!  └───┘           └────┴────┴────┴────┘    └───┴───┴───┴───┴───┘
//!                     ▲ held by a put            ▲       ▲
//!                       still in flight         head    tail
//! ```
//!
//! `put` goes through three steps:
//!
//!  1. Pop a data slot from the free list (a Treiber stack). An empty free
//!     list means the FIFO is full.
//!  2. Write the item into the slot. The slot is private to this `put`, so a
//!     nested `put` can't observe it.
//!  3. Publish the slot index by compare-and-swapping the order ring entry at
//!     `tail` from `EMPTY` to the index, and then advance `tail`. A `put` that
//!     finds the entry already taken helps advance `tail` and tries again.
//!
//! The compare-and-swap in step 3 is where a `put` takes effect, so items are
//! delivered in the order in which their `put`s completed. A nested `put` that
//! preempts another `put` before step 3 is delivered first.
//!
//! `get` reads the entry at `head`, copies the item out, clears the entry,
//! advances `head`, and returns the data slot to the free list.
//!
//! # ABA
//!
//! Only producers pop from the free list and only the consumer pushes to it.
//! Between a producer's read of the list head and its compare-and-swap, the
//! only code that can run is a nested producer (interrupt model) or the
//! consumer (single-producer threads). Neither can put the same head back, so
//! the swap can't succeed on a stale view.
use alloc::boxed::Box;
use core::{
    cell::UnsafeCell,
    fmt,
    mem::MaybeUninit,
    sync::atomic::{AtomicBool, AtomicUsize, Ordering},
};

use crate::error::{GetError, NewFifoError, PutError};

/// Terminates the free list.
const NIL: usize = usize::MAX;

/// Marks an order ring entry as unused.
const EMPTY: usize = usize::MAX;

pub(super) struct Ring<E> {
    slots: Box<[UnsafeCell<MaybeUninit<E>>]>,
    /// The next free slot after each free slot
    free_next: Box<[AtomicUsize]>,
    free_head: AtomicUsize,
    /// Published slot indices, in delivery order
    order: Box<[AtomicUsize]>,
    head: AtomicUsize,
    tail: AtomicUsize,
    /// Set while a consumer-side call is in progress.
    pub(super) consumer_busy: AtomicBool,
    deinited: AtomicBool,
}

// Safety: A data slot is accessed only by the producer that popped it from
//         the free list (until it's published) or by the single consumer
//         (after it's published and until it's returned to the free list).
//         `E: Copy` means there's no drop glue to run on either side.
unsafe impl<E: Copy + Send> Sync for Ring<E> {}

impl<E: Copy> Ring<E> {
    pub(super) fn new(capacity: usize) -> Result<Self, NewFifoError> {
        let order_len = match capacity.checked_add(1) {
            Some(n) if capacity > 0 && n <= isize::MAX as usize => n,
            _ => return Err(NewFifoError::ConfigurationError),
        };

        log::trace!("allocating a FIFO ring of {capacity} slots");

        Ok(Self {
            slots: (0..capacity)
                .map(|_| UnsafeCell::new(MaybeUninit::uninit()))
                .collect(),
            free_next: (0..capacity)
                .map(|i| AtomicUsize::new(if i + 1 == capacity { NIL } else { i + 1 }))
                .collect(),
            free_head: AtomicUsize::new(0),
            order: (0..order_len).map(|_| AtomicUsize::new(EMPTY)).collect(),
            head: AtomicUsize::new(0),
            tail: AtomicUsize::new(0),
            consumer_busy: AtomicBool::new(false),
            deinited: AtomicBool::new(false),
        })
    }

    #[inline]
    pub(super) fn put(&self, value: E) -> Result<(), PutError> {
        self.put_inner(value, || {})
    }

    /// Like [`Self::put`], but calls `preempt` after the value is written and
    /// before it's published, simulating an interrupt that arrives at the
    /// worst possible moment.
    #[cfg(test)]
    pub(super) fn put_preempted(
        &self,
        value: E,
        preempt: impl FnOnce(),
    ) -> Result<(), PutError> {
        self.put_inner(value, preempt)
    }

    #[inline]
    fn put_inner(&self, value: E, preempt: impl FnOnce()) -> Result<(), PutError> {
        if self.deinited.load(Ordering::Relaxed) {
            return Err(PutError::InvalidState);
        }

        let slot = self.alloc_slot().ok_or(PutError::Full)?;

        // Safety: `slot` was just taken off the free list, so nobody else is
        //         accessing it.
        unsafe { (*self.slots[slot].get()).write(value) };
        preempt();

        self.publish(slot);
        Ok(())
    }

    /// Pop a data slot from the free list.
    #[inline]
    fn alloc_slot(&self) -> Option<usize> {
        let mut top = self.free_head.load(Ordering::Acquire);
        loop {
            if top == NIL {
                return None;
            }
            let next = self.free_next[top].load(Ordering::Relaxed);
            // `Acquire` pairs with the consumer's release of the slot
            match self.free_head.compare_exchange_weak(
                top,
                next,
                Ordering::Acquire,
                Ordering::Acquire,
            ) {
                Ok(_) => return Some(top),
                Err(current) => top = current,
            }
        }
    }

    /// Append `slot` to the order ring.
    fn publish(&self, slot: usize) {
        loop {
            let tail = self.tail.load(Ordering::Acquire);
            let claimed = self.order[tail]
                .compare_exchange(EMPTY, slot, Ordering::AcqRel, Ordering::Acquire)
                .is_ok();

            // Advance `tail` past the entry whether we claimed it or a put
            // that we preempted did. A failure means someone else has
            // advanced it already.
            let _ = self.tail.compare_exchange(
                tail,
                self.next(tail),
                Ordering::AcqRel,
                Ordering::Relaxed,
            );

            if claimed {
                return;
            }
        }
    }

    pub(super) fn get(&self) -> Result<E, GetError> {
        let _guard = ConsumerGuard::new(&self.consumer_busy)?;

        if self.deinited.load(Ordering::Relaxed) {
            return Err(GetError::InvalidState);
        }

        let head = self.head.load(Ordering::Relaxed);
        if head == self.tail.load(Ordering::Acquire) {
            return Err(GetError::Empty);
        }

        // Every entry before `tail` is claimed
        let slot = self.order[head].load(Ordering::Acquire);
        debug_assert_ne!(slot, EMPTY);

        // Safety: `slot` is published, which means the producer has finished
        //         writing it and won't touch it until we return it to the
        //         free list.
        let value = unsafe { (*self.slots[slot].get()).assume_init_read() };

        self.order[head].store(EMPTY, Ordering::Release);
        self.head.store(self.next(head), Ordering::Release);
        self.free_slot(slot);

        Ok(value)
    }

    /// Push a data slot to the free list.
    fn free_slot(&self, slot: usize) {
        let mut top = self.free_head.load(Ordering::Relaxed);
        loop {
            self.free_next[slot].store(top, Ordering::Relaxed);
            match self.free_head.compare_exchange_weak(
                top,
                slot,
                Ordering::Release,
                Ordering::Relaxed,
            ) {
                Ok(_) => return,
                Err(current) => top = current,
            }
        }
    }
}

impl<E> Ring<E> {
    #[inline]
    pub(super) fn capacity(&self) -> usize {
        self.slots.len()
    }

    #[inline]
    fn next(&self, i: usize) -> usize {
        if i + 1 == self.order.len() {
            0
        } else {
            i + 1
        }
    }

    /// The number of published, unread items. This is a snapshot that may be
    /// stale by the time it's returned.
    ///
    /// Outside the consumer, `head` may move between the two loads. The
    /// result is then inexact but still in range `0..order.len()`, i.e.,
    /// never more than the capacity.
    pub(super) fn len(&self) -> usize {
        let head = self.head.load(Ordering::Acquire);
        let tail = self.tail.load(Ordering::Acquire);
        if tail >= head {
            tail - head
        } else {
            tail + self.order.len() - head
        }
    }

    pub(super) fn deinit(&self) {
        if !self.deinited.swap(true, Ordering::AcqRel) {
            log::trace!("FIFO deinitialized");
        }
    }

    #[inline]
    pub(super) fn is_deinited(&self) -> bool {
        self.deinited.load(Ordering::Relaxed)
    }
}

impl<E> fmt::Debug for Ring<E> {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        f.debug_struct("Ring")
            .field("capacity", &self.capacity())
            .field("len", &self.len())
            .field("deinited", &self.is_deinited())
            .finish_non_exhaustive()
    }
}

/// Marks the consumer side busy for its lifetime.
pub(super) struct ConsumerGuard<'a> {
    busy: &'a AtomicBool,
}

impl<'a> ConsumerGuard<'a> {
    #[inline]
    pub(super) fn new(busy: &'a AtomicBool) -> Result<Self, GetError> {
        if busy.swap(true, Ordering::Acquire) {
            return Err(GetError::BadContext);
        }
        Ok(Self { busy })
    }
}

impl Drop for ConsumerGuard<'_> {
    #[inline]
    fn drop(&mut self) {
        self.busy.store(false, Ordering::Release);
    }
}
