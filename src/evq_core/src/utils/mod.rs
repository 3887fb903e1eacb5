//! Utility
//!
//! **This module is exempt from the API stability guarantee** unless specified
//! otherwise. It's exposed only because [`WaitQueue`] is generic over its
//! storage.
//!
//! [`WaitQueue`]: crate::wait_queue::WaitQueue
pub mod binary_heap;
mod bounded_vec;
pub use self::bounded_vec::*;
