//! Dumper transport traits and abstractions
//!
//! This module defines the trait every dumper link must implement so that
//! the flash and FDS engines can drive the cartridge bus.

mod timeout;
mod traits;

pub use timeout::TimeoutGuard;
pub use traits::*;
