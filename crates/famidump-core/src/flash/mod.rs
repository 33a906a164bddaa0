//! COOLBOY flash programming
//!
//! This module provides revision detection, NOR flash command sequences,
//! and the write/verify session with bad-sector bookkeeping.

pub mod cfi;
mod detect;
mod progress;
mod session;

pub use cfi::{EraseRegion, FlashInfo};
pub use detect::{classify, detect_revision};
pub use progress::{BankProgress, FlashProgress, NoProgress};
pub use session::*;
