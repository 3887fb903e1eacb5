use arrayvec::ArrayVec;
use core::ops;

use crate::utils::BoundedVec;

/// A vector-like container with a capacity that never changes after
/// construction.
pub trait VecLike: ops::Deref<Target = [<Self as VecLike>::Element]> + ops::DerefMut {
    type Element;
    fn is_empty(&self) -> bool;
    fn len(&self) -> usize;
    fn capacity(&self) -> usize;
    fn pop(&mut self) -> Option<Self::Element>;
    /// Append an element. The caller must ensure `len() < capacity()`.
    fn push(&mut self, x: Self::Element);
    fn clear(&mut self);
}

impl<T, const N: usize> VecLike for ArrayVec<T, N> {
    type Element = T;
    fn is_empty(&self) -> bool {
        self.is_empty()
    }
    fn len(&self) -> usize {
        self.len()
    }
    fn capacity(&self) -> usize {
        N
    }
    fn pop(&mut self) -> Option<Self::Element> {
        self.pop()
    }
    fn push(&mut self, x: Self::Element) {
        self.push(x)
    }
    fn clear(&mut self) {
        self.clear()
    }
}

impl<T> VecLike for BoundedVec<T> {
    type Element = T;
    fn is_empty(&self) -> bool {
        self.is_empty()
    }
    fn len(&self) -> usize {
        self.len()
    }
    fn capacity(&self) -> usize {
        self.capacity()
    }
    fn pop(&mut self) -> Option<Self::Element> {
        self.pop()
    }
    fn push(&mut self, x: Self::Element) {
        if self.try_push(x).is_err() {
            panic!("capacity exceeded");
        }
    }
    fn clear(&mut self) {
        self.clear()
    }
}
