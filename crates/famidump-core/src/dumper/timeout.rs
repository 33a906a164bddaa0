//! Scoped timeout override
//!
//! Disk operations need a much longer timeout than ordinary bus traffic.
//! The override lives exactly as long as the guard, and the previous value is
//! put back when the guard is dropped, whatever path the operation took.

use super::Dumper;
use crate::error::Result;
use std::ops::{Deref, DerefMut};
use std::time::Duration;

/// Holds a dumper with a temporary timeout installed
pub struct TimeoutGuard<'a, D: Dumper + ?Sized> {
    dumper: &'a mut D,
    previous: Duration,
}

impl<'a, D: Dumper + ?Sized> TimeoutGuard<'a, D> {
    /// Install `timeout` on the dumper until the guard is dropped
    pub fn new(dumper: &'a mut D, timeout: Duration) -> Result<Self> {
        let previous = dumper.timeout();
        dumper.set_timeout(timeout)?;
        log::debug!(
            "Timeout raised from {} ms to {} ms",
            previous.as_millis(),
            timeout.as_millis()
        );
        Ok(Self { dumper, previous })
    }
}

impl<D: Dumper + ?Sized> Deref for TimeoutGuard<'_, D> {
    type Target = D;

    fn deref(&self) -> &D {
        self.dumper
    }
}

impl<D: Dumper + ?Sized> DerefMut for TimeoutGuard<'_, D> {
    fn deref_mut(&mut self) -> &mut D {
        self.dumper
    }
}

impl<D: Dumper + ?Sized> Drop for TimeoutGuard<'_, D> {
    fn drop(&mut self) {
        if let Err(e) = self.dumper.set_timeout(self.previous) {
            log::error!("Failed to restore dumper timeout: {}", e);
        } else {
            log::debug!("Timeout restored to {} ms", self.previous.as_millis());
        }
    }
}
