#![doc = include_str!("./lib.md")]
#![forbid(unsafe_code)]

pub mod chrono;
pub mod clock;
mod config;
pub mod dispatch;
pub mod interrupt;

pub use self::config::Config;

/// Used by [`init_logger`]
#[doc(hidden)]
pub extern crate env_logger;

/// Install `env_logger` as the global logger, reading the filter from the
/// `RUST_LOG` environment variable.
///
/// Does nothing if a logger is already installed.
pub fn init_logger() {
    let _ = env_logger::builder().try_init();
}
