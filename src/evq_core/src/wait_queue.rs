//! Deadline-ordered queue of scheduled callbacks
//!
//! [`WaitQueue`] is a fixed-capacity binary min-heap keyed by wrapping
//! [`Tick`] deadlines. Deadlines are compared with [`Modulus::ticks_less`],
//! so the queue keeps working when the tick counter wraps around, as long as
//! no two pending deadlines are `M / 2` or more ticks apart. Entries with
//! equal deadlines are returned in the order in which they were pushed.
//!
//! The queue is meant to be owned by a single dispatcher running outside of
//! interrupt context. It does no locking of its own.
//!
//! There's no way to remove an entry other than popping it. A caller that
//! needs cancellation should mark the payload as cancelled and skip it when
//! it's popped.
use core::{fmt, marker::PhantomData};

use crate::{
    error::{NewWaitQueueError, PeekError, PopError, PushError},
    tick::{Modulus, Tick},
    utils::{
        binary_heap::{BinaryHeap, BinaryHeapCtx, VecLike},
        BoundedVec,
    },
};


/// An element of [`WaitQueue`].
#[derive(Debug, Clone)]
pub struct Entry<F> {
    deadline: Tick,
    /// Assigned by the queue in push order. Breaks ties between equal
    /// deadlines.
    sequence: u64,
    payload: F,
}

impl<F> Entry<F> {
    #[inline]
    pub fn deadline(&self) -> Tick {
        self.deadline
    }

    #[inline]
    pub fn payload(&self) -> &F {
        &self.payload
    }
}

/// The ordering relation of [`WaitQueue`].
struct DeadlineOrder {
    modulus: Modulus,
}

impl<F> BinaryHeapCtx<Entry<F>> for DeadlineOrder {
    #[inline]
    fn lt(&mut self, x: &Entry<F>, y: &Entry<F>) -> bool {
        if x.deadline == y.deadline {
            x.sequence < y.sequence
        } else {
            self.modulus.ticks_less(x.deadline, y.deadline)
        }
    }
}

/// A fixed-capacity priority queue of payloads (usually callbacks) ordered by
/// wrapping deadlines.
///
/// `Storage` determines where the entries live. The default,
/// [`BoundedVec`], allocates its buffer once in [`Self::new`]. An
/// [`arrayvec::ArrayVec`] doesn't allocate at all.
///
/// # Examples
///
/// ```
/// use evq_core::{tick::Modulus, wait_queue::WaitQueue};
///
/// let mut q = WaitQueue::new(4, Modulus::U16).unwrap();
/// q.push(10, "after wraparound").unwrap();
/// q.push(65530, "before wraparound").unwrap();
///
/// assert_eq!(q.peek_deadline(), Ok(65530));
/// assert_eq!(q.pop(), Ok("before wraparound"));
/// assert_eq!(q.pop(), Ok("after wraparound"));
/// ```
pub struct WaitQueue<F, Storage = BoundedVec<Entry<F>>> {
    heap: Storage,
    modulus: Modulus,
    next_sequence: u64,
    _payload: PhantomData<F>,
}

impl<F> WaitQueue<F> {
    /// Construct a `WaitQueue` that can hold up to `capacity` entries.
    ///
    /// Fails with `ConfigurationError` if `capacity` is zero or the buffer
    /// can't be allocated.
    pub fn new(capacity: usize, modulus: Modulus) -> Result<Self, NewWaitQueueError> {
        let storage = BoundedVec::try_with_capacity(capacity).ok_or_else(|| {
            log::warn!("failed to allocate a wait queue of {capacity} entries");
            NewWaitQueueError::ConfigurationError
        })?;
        Self::with_storage(storage, modulus)
    }
}

impl<F, Storage: VecLike<Element = Entry<F>>> WaitQueue<F, Storage> {
    /// Construct a `WaitQueue` on top of the given empty storage. The capacity
    /// of the queue is the capacity of `storage`.
    ///
    /// # Examples
    ///
    /// ```
    /// use arrayvec::ArrayVec;
    /// use evq_core::{tick::Modulus, wait_queue::WaitQueue};
    ///
    /// let mut q = WaitQueue::with_storage(ArrayVec::<_, 8>::new(), Modulus::DEFAULT).unwrap();
    /// q.push(5, ()).unwrap();
    /// assert_eq!(q.capacity(), 8);
    /// ```
    pub fn with_storage(storage: Storage, modulus: Modulus) -> Result<Self, NewWaitQueueError> {
        if storage.capacity() == 0 || !storage.is_empty() {
            return Err(NewWaitQueueError::ConfigurationError);
        }

        log::trace!(
            "created a wait queue (capacity = {}, modulus = {})",
            storage.capacity(),
            modulus.get()
        );

        Ok(Self {
            heap: storage,
            modulus,
            next_sequence: 0,
            _payload: PhantomData,
        })
    }

    /// Schedule `payload` at `deadline`.
    ///
    /// `deadline` is reduced modulo `M` before it's stored.
    pub fn push(&mut self, deadline: Tick, payload: F) -> Result<(), PushError> {
        if self.heap.len() == self.heap.capacity() {
            return Err(PushError::CapacityExceeded);
        }

        let sequence = self.next_sequence;
        self.next_sequence = sequence.wrapping_add(1);

        let deadline = self.modulus.wrap(deadline);
        let order = self.order();
        let pos = self.heap.heap_push(
            Entry {
                deadline,
                sequence,
                payload,
            },
            order,
        );

        log::trace!("push(deadline = {deadline}, sequence = {sequence}) → {pos}");

        Ok(())
    }

    /// Remove the earliest entry and return its payload.
    ///
    /// The queue doesn't retain any reference to the returned payload.
    pub fn pop(&mut self) -> Result<F, PopError> {
        self.pop_entry().map(|e| e.payload)
    }

    /// Remove the earliest entry and return it.
    pub fn pop_entry(&mut self) -> Result<Entry<F>, PopError> {
        let order = self.order();
        let entry = self.heap.heap_pop(order).ok_or(PopError::Empty)?;

        log::trace!(
            "pop() → (deadline = {}, sequence = {})",
            entry.deadline,
            entry.sequence
        );

        Ok(entry)
    }

    /// Get the deadline of the earliest entry.
    pub fn peek_deadline(&self) -> Result<Tick, PeekError> {
        self.heap
            .first()
            .map(|e| e.deadline)
            .ok_or(PeekError::Empty)
    }

    /// Get the payload at `index` in the heap's internal layout.
    ///
    /// Only index `0` is guaranteed to hold the earliest entry. Other indices
    /// do not reflect the overall ordering.
    #[inline]
    pub fn get(&self, index: usize) -> Option<&F> {
        self.heap.get(index).map(|e| &e.payload)
    }

    #[inline]
    pub fn len(&self) -> usize {
        self.heap.len()
    }

    #[inline]
    pub fn is_empty(&self) -> bool {
        self.heap.is_empty()
    }

    #[inline]
    pub fn capacity(&self) -> usize {
        self.heap.capacity()
    }

    #[inline]
    pub fn modulus(&self) -> Modulus {
        self.modulus
    }

    /// Remove and drop all entries.
    pub fn clear(&mut self) {
        self.heap.clear();
    }

    #[inline]
    fn order(&self) -> DeadlineOrder {
        DeadlineOrder {
            modulus: self.modulus,
        }
    }
}

impl<F, Storage: VecLike<Element = Entry<F>>> fmt::Debug for WaitQueue<F, Storage> {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        f.debug_struct("WaitQueue")
            .field("len", &self.heap.len())
            .field("capacity", &self.heap.capacity())
            .field("modulus", &self.modulus.get())
            .field("deadlines", &DebugDeadlines(&self.heap[..]))
            .finish()
    }
}

struct DebugDeadlines<'a, F>(&'a [Entry<F>]);

impl<F> fmt::Debug for DebugDeadlines<'_, F> {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        f.debug_list()
            .entries(self.0.iter().map(|e| e.deadline))
            .finish()
    }
}
