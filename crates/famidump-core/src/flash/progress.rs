//! Progress reporting for flash sessions

use crate::error::Error;
use std::time::{Duration, Instant};

/// Where a session is, reported once per bank
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct BankProgress {
    /// Bank index
    pub bank: usize,
    /// Number of banks in the image
    pub total: usize,
    /// Percent complete when this bank started
    pub percent: usize,
    /// Time since the pass started
    pub elapsed: Duration,
    /// Projected total time of the pass
    pub projected: Duration,
}

/// Callback for progress reporting during flash sessions
pub trait FlashProgress {
    /// Called before a sector is erased
    fn erasing(&mut self, sector: usize);

    /// Called before a bank is programmed
    fn writing(&mut self, progress: &BankProgress);

    /// Called after a bank was programmed
    fn written(&mut self, bank: usize);

    /// Called when a bank failed; `retrying` is false when the sector was
    /// given up on
    fn write_failed(&mut self, bank: usize, error: &Error, retrying: bool);

    /// Called when a sector is skipped because it is bad
    fn skipped(&mut self, sector: usize);

    /// Called before a bank CRC is requested
    fn verifying(&mut self, progress: &BankProgress);

    /// Called with the CRC result of a bank
    fn verified(&mut self, bank: usize, expected: u16, actual: u16);
}

/// A no-op progress reporter
pub struct NoProgress;

impl FlashProgress for NoProgress {
    fn erasing(&mut self, _sector: usize) {}
    fn writing(&mut self, _progress: &BankProgress) {}
    fn written(&mut self, _bank: usize) {}
    fn write_failed(&mut self, _bank: usize, _error: &Error, _retrying: bool) {}
    fn skipped(&mut self, _sector: usize) {}
    fn verifying(&mut self, _progress: &BankProgress) {}
    fn verified(&mut self, _bank: usize, _expected: u16, _actual: u16) {}
}

/// Tracks elapsed time and projects the pass length from the last sector
#[derive(Debug, Clone)]
pub(crate) struct PassTimer {
    started: Instant,
    last_sector: Instant,
    projected: Duration,
    total: usize,
}

impl PassTimer {
    pub(crate) fn start(total: usize) -> Self {
        let now = Instant::now();
        Self {
            started: now,
            last_sector: now,
            projected: Duration::ZERO,
            total,
        }
    }

    /// Recompute the projection at a sector boundary
    pub(crate) fn sector_boundary(&mut self, bank: usize) {
        let now = Instant::now();
        let remaining = self.total.saturating_sub(bank) as u32;
        self.projected = (now - self.last_sector) * remaining / 8 + (now - self.started);
        self.last_sector = now;
    }

    pub(crate) fn progress(&self, bank: usize) -> BankProgress {
        BankProgress {
            bank,
            total: self.total,
            percent: if self.total == 0 {
                100
            } else {
                100 * bank / self.total
            },
            elapsed: self.started.elapsed(),
            projected: self.projected,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_percent() {
        let timer = PassTimer::start(16);
        assert_eq!(timer.progress(0).percent, 0);
        assert_eq!(timer.progress(8).percent, 50);
        assert_eq!(timer.progress(15).percent, 93);
        assert_eq!(timer.progress(3).total, 16);
    }

    #[test]
    fn test_projection_grows_with_remaining_banks() {
        let mut timer = PassTimer::start(64);
        std::thread::sleep(Duration::from_millis(5));
        timer.sector_boundary(0);
        let first = timer.progress(0).projected;
        // (time since last boundary) * 64 / 8 + elapsed, at least 8x the sleep
        assert!(first >= Duration::from_millis(40));
    }
}
