use alloc::vec::Vec;
use core::{fmt, ops};

/// A heap-allocated vector whose capacity is fixed at construction time.
///
/// The backing buffer is allocated exactly once, by
/// [`Self::try_with_capacity`], and is never reallocated. Pushing to a full
/// `BoundedVec` fails instead of growing the buffer.
pub struct BoundedVec<T> {
    inner: Vec<T>,
    capacity: usize,
}

impl<T> BoundedVec<T> {
    /// Allocate a `BoundedVec` that can hold up to `capacity` elements.
    ///
    /// Returns `None` if the buffer's size overflows `isize` or the allocation
    /// fails.
    pub fn try_with_capacity(capacity: usize) -> Option<Self> {
        let mut inner = Vec::new();
        inner.try_reserve_exact(capacity).ok()?;
        Some(Self { inner, capacity })
    }

    #[inline]
    pub fn capacity(&self) -> usize {
        self.capacity
    }

    #[inline]
    pub fn len(&self) -> usize {
        self.inner.len()
    }

    #[inline]
    pub fn is_empty(&self) -> bool {
        self.inner.is_empty()
    }

    #[inline]
    pub fn is_full(&self) -> bool {
        self.inner.len() == self.capacity
    }

    /// Append an element. Returns the element back if the vector is full.
    #[inline]
    pub fn try_push(&mut self, x: T) -> Result<(), T> {
        if self.is_full() {
            Err(x)
        } else {
            self.inner.push(x);
            Ok(())
        }
    }

    /// Remove the last element. The vacated slot doesn't retain the element.
    #[inline]
    pub fn pop(&mut self) -> Option<T> {
        self.inner.pop()
    }

    #[inline]
    pub fn clear(&mut self) {
        self.inner.clear()
    }
}

impl<T> ops::Deref for BoundedVec<T> {
    type Target = [T];

    #[inline]
    fn deref(&self) -> &Self::Target {
        &self.inner
    }
}

impl<T> ops::DerefMut for BoundedVec<T> {
    #[inline]
    fn deref_mut(&mut self) -> &mut Self::Target {
        &mut self.inner
    }
}

impl<T: fmt::Debug> fmt::Debug for BoundedVec<T> {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        f.debug_list().entries(self.inner.iter()).finish()
    }
}
