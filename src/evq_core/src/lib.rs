#![doc = include_str!("./lib.md")]
#![cfg_attr(not(test), no_std)] // Link `std` only when building a test (`cfg(test)`)
#![deny(unsafe_op_in_unsafe_fn)]
extern crate alloc;

pub mod error;
pub mod fifo;
pub mod tick;
pub mod utils;
pub mod wait_queue;

pub use self::{
    error::*,
    fifo::{AtomicFifo, AtomicFifoPair},
    tick::{Modulus, Tick, TickClock, TickDiff},
    wait_queue::WaitQueue,
};
