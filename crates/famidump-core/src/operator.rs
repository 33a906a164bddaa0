//! Operator interaction
//!
//! Some steps need a human: swapping disk sides, reseating a cartridge
//! before verification. The engines never touch the terminal or the clock
//! directly for this; they go through the traits below so that the CLI can
//! prompt and beep while tests run instantly.

use crate::error::{Error, Result};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Duration;

/// Audible cue kinds
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Cue {
    /// Something failed and the operator should look
    Error,
    /// Waiting for the operator to continue
    Done,
}

/// The human at the dumper
pub trait Operator {
    /// Show a message asking the operator to do something (insert a disk,
    /// remove a disk). Does not block.
    fn announce(&mut self, message: &str);

    /// Play an audible cue
    fn cue(&mut self, cue: Cue);

    /// Block until the operator confirms they are ready to continue
    fn confirm(&mut self, message: &str) -> Result<()>;
}

/// Operator for unattended runs: logs announcements and never blocks
#[derive(Debug, Default, Clone, Copy)]
pub struct Unattended;

impl Operator for Unattended {
    fn announce(&mut self, message: &str) {
        log::info!("{}", message);
    }

    fn cue(&mut self, _cue: Cue) {}

    fn confirm(&mut self, message: &str) -> Result<()> {
        log::info!("{}", message);
        Ok(())
    }
}

/// Cancellation flag shared between the waiting engine and whoever may
/// want to stop it
#[derive(Debug, Clone, Default)]
pub struct CancelToken(Arc<AtomicBool>);

impl CancelToken {
    /// Create a token that is not cancelled
    pub fn new() -> Self {
        Self::default()
    }

    /// Request cancellation
    pub fn cancel(&self) {
        self.0.store(true, Ordering::SeqCst);
    }

    /// Whether cancellation was requested
    pub fn is_cancelled(&self) -> bool {
        self.0.load(Ordering::SeqCst)
    }

    /// Return `Error::Cancelled` if cancellation was requested
    pub fn check(&self) -> Result<()> {
        if self.is_cancelled() {
            Err(Error::Cancelled)
        } else {
            Ok(())
        }
    }
}

/// Wait strategy used between polls of the disk drive
pub trait Waiter {
    /// Wait for one polling interval
    ///
    /// Returns `Error::Cancelled` if the wait was cancelled.
    fn wait(&mut self, interval: Duration) -> Result<()>;
}

/// Sleeps the calling thread, checking a cancel token around each sleep
#[derive(Debug, Clone, Default)]
pub struct SleepWaiter {
    cancel: CancelToken,
}

impl SleepWaiter {
    /// Create a waiter observing `cancel`
    pub fn new(cancel: CancelToken) -> Self {
        Self { cancel }
    }
}

impl Waiter for SleepWaiter {
    fn wait(&mut self, interval: Duration) -> Result<()> {
        self.cancel.check()?;
        std::thread::sleep(interval);
        self.cancel.check()
    }
}

/// Returns immediately; counts how many polls were made
#[derive(Debug, Clone, Default)]
pub struct InstantWaiter {
    /// Number of waits performed
    pub waits: usize,
    /// Cancel after this many waits, if set
    pub cancel_after: Option<usize>,
}

impl Waiter for InstantWaiter {
    fn wait(&mut self, _interval: Duration) -> Result<()> {
        if self.cancel_after.is_some_and(|limit| self.waits >= limit) {
            return Err(Error::Cancelled);
        }
        self.waits += 1;
        Ok(())
    }
}
