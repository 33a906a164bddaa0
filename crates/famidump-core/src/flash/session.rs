//! COOLBOY write and verify sessions
//!
//! A session owns the dumper for the duration of one write and/or verify
//! run. The controller revision and the CFI geometry are read once when the
//! session opens and never change afterwards.

use std::collections::BTreeSet;

use super::cfi::{self, FlashInfo};
use super::detect::detect_revision;
use super::progress::{FlashProgress, PassTimer};
use crate::bank::{
    first_bank_of, sector_of, BankSelector, ControllerRevision, BANKS_PER_SECTOR, BANK_SIZE,
    MAX_BANKS, PRG_WINDOW, SECTOR_SIZE,
};
use crate::crc::crc16;
use crate::dumper::Dumper;
use crate::error::{Error, Result};
use crate::operator::{Cue, Operator};

/// Consecutive failures of one sector before it is given up on
pub const MAX_SECTOR_ATTEMPTS: usize = 5;

/// First protocol version that accepts the flash buffer size
const BUFFER_SIZE_PROTOCOL: u8 = 3;

/// Ordered, deduplicated set of sector indices
pub type SectorSet = BTreeSet<usize>;

/// Options for a write session
#[derive(Debug, Clone, Default)]
pub struct WriteOptions {
    /// Sectors known to be bad before the run; never written or verified
    pub bad_sectors: Vec<usize>,
    /// Run a CRC verification pass after writing
    pub verify: bool,
    /// Ask the operator to confirm before verification starts
    pub pause_before_verify: bool,
    /// Set the persistent protection bit of every written sector
    pub write_protect: bool,
    /// Mark a sector bad after repeated failures instead of aborting
    pub ignore_bad_sectors: bool,
    /// No audible cues
    pub silent: bool,
}

/// Outcome of a session
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct SessionReport {
    /// Failed bank writes over the whole run
    pub total_errors: usize,
    /// Every bad sector, supplied or discovered
    pub bad_sectors: SectorSet,
    /// Bad sectors discovered during this run
    pub new_bad_sectors: SectorSet,
    /// Sectors whose flash CRC differs from the image
    pub wrong_crc_sectors: SectorSet,
    /// Whether a verification pass ran
    pub verified: bool,
}

impl SessionReport {
    /// Turn a verified report with problems into an integrity error
    ///
    /// Write-only runs never fail here; they already returned an error if a
    /// sector could not be handled. A verified run fails on any bad sector,
    /// including the ones listed before the run.
    pub fn into_result(self) -> Result<Self> {
        if self.verified && (!self.bad_sectors.is_empty() || !self.wrong_crc_sectors.is_empty()) {
            return Err(Error::Integrity {
                bad_sectors: self.bad_sectors.iter().copied().collect(),
                wrong_crc_sectors: self.wrong_crc_sectors.iter().copied().collect(),
            });
        }
        Ok(self)
    }
}

/// Facts about the inserted cartridge
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CartridgeInfo {
    /// Detected controller revision
    pub revision: ControllerRevision,
    /// Flash geometry
    pub flash: FlashInfo,
    /// Whether sector 0 has its persistent protection bit set
    pub sector0_protected: bool,
}

/// One write/verify session against a COOLBOY cartridge
pub struct FlashSession<'a, D: Dumper + ?Sized, O: Operator + ?Sized> {
    dumper: &'a mut D,
    operator: &'a mut O,
    silent: bool,
    revision: ControllerRevision,
    info: FlashInfo,
}

impl<'a, D: Dumper + ?Sized, O: Operator + ?Sized> FlashSession<'a, D, O> {
    /// Reset the cartridge, detect the revision and read the flash geometry
    pub fn open(dumper: &'a mut D, operator: &'a mut O, silent: bool) -> Result<Self> {
        dumper.reset()?;
        let revision = detect_revision(dumper)?;
        cfi::reset_flash(dumper)?;
        let info = cfi::query_cfi(dumper)?;
        log::info!(
            "Device size: {} MByte / {} Mbit",
            info.device_size / 1024 / 1024,
            info.device_size / 1024 / 1024 * 8
        );
        log::info!(
            "Maximum number of bytes in multi-byte program: {}",
            info.max_multi_program
        );
        if dumper.protocol_version() >= BUFFER_SIZE_PROTOCOL {
            dumper.set_flash_buffer_size(info.max_multi_program)?;
        }

        Ok(Self {
            dumper,
            operator,
            silent,
            revision,
            info,
        })
    }

    /// Detected controller revision
    pub fn revision(&self) -> ControllerRevision {
        self.revision
    }

    /// Flash geometry
    pub fn info(&self) -> &FlashInfo {
        &self.info
    }

    fn select_bank(&mut self, bank: usize) -> Result<()> {
        BankSelector::new(bank).select(&mut *self.dumper, self.revision)
    }

    fn alert(&mut self, cue: Cue) {
        if !self.silent {
            self.operator.cue(cue);
        }
    }

    fn check_image(&self, prg: &[u8]) -> Result<usize> {
        if prg.is_empty() || prg.len() % BANK_SIZE != 0 {
            return Err(Error::InvalidImage(format!(
                "PRG size {} is not a non-zero multiple of {} bytes",
                prg.len(),
                BANK_SIZE
            )));
        }
        if prg.len() > self.info.device_size || prg.len() / BANK_SIZE > MAX_BANKS {
            return Err(Error::ImageTooLarge {
                image: prg.len(),
                device: self.info.device_size,
            });
        }
        Ok(prg.len() / BANK_SIZE)
    }

    /// Clear all protection bits; failures are tolerated
    fn clear_protection(&mut self) {
        let result = self
            .select_bank(0)
            .and_then(|_| cfi::ppb_clear(&mut *self.dumper));
        if let Err(e) = result {
            self.alert(Cue::Error);
            log::error!("ERROR! {}. Lets continue anyway.", e);
        }
    }

    fn write_bank<P: FlashProgress + ?Sized>(
        &mut self,
        prg: &[u8],
        bank: usize,
        banks: usize,
        write_protect: bool,
        timer: &mut PassTimer,
        progress: &mut P,
    ) -> Result<()> {
        self.select_bank(bank)?;

        let pos = bank * BANK_SIZE;
        if pos % SECTOR_SIZE == 0 {
            timer.sector_boundary(bank);
            progress.erasing(sector_of(bank));
            log::debug!("Erasing sector #{}", sector_of(bank));
            self.dumper.erase_flash_sector()?;
        }

        progress.writing(&timer.progress(bank));
        self.dumper
            .write_flash(0x0000, &prg[pos..pos + BANK_SIZE])?;

        // After last bank in sector
        if write_protect && (bank % BANKS_PER_SECTOR == BANKS_PER_SECTOR - 1 || bank == banks - 1)
        {
            cfi::ppb_set(&mut *self.dumper)?;
        }
        progress.written(bank);
        Ok(())
    }

    /// Erase and program the image bank by bank
    ///
    /// Sectors in `options.bad_sectors` are never touched. A failing bank
    /// restarts its sector from the first bank after a cartridge and flash
    /// reset; the fifth consecutive failure of a sector either aborts the
    /// run or, with `ignore_bad_sectors`, marks the sector bad.
    pub fn write<P: FlashProgress + ?Sized>(
        &mut self,
        prg: &[u8],
        options: &WriteOptions,
        progress: &mut P,
    ) -> Result<SessionReport> {
        let banks = self.check_image(prg)?;

        let mut report = SessionReport {
            bad_sectors: options.bad_sectors.iter().copied().collect(),
            ..Default::default()
        };

        self.clear_protection();

        let mut timer = PassTimer::start(banks);
        let mut sector_errors = 0;
        let mut bank = 0;
        while bank < banks {
            let sector = sector_of(bank);
            if report.bad_sectors.contains(&sector) {
                log::warn!("Skipping bad sector #{}", sector);
                progress.skipped(sector);
                bank = first_bank_of(sector + 1);
                continue;
            }

            match self.write_bank(prg, bank, banks, options.write_protect, &mut timer, progress) {
                Ok(()) => {
                    if bank % BANKS_PER_SECTOR == BANKS_PER_SECTOR - 1 || bank == banks - 1 {
                        sector_errors = 0;
                    }
                    bank += 1;
                }
                Err(e) => {
                    report.total_errors += 1;
                    sector_errors += 1;
                    log::error!("Error writing bank #{}: {}", bank, e);
                    self.alert(Cue::Error);

                    if sector_errors >= MAX_SECTOR_ATTEMPTS {
                        progress.write_failed(bank, &e, false);
                        if !options.ignore_bad_sectors {
                            return Err(Error::SectorFailed {
                                sector,
                                attempts: sector_errors,
                                source: Box::new(e),
                            });
                        }
                        log::warn!("Lets skip sector #{}", sector);
                        report.bad_sectors.insert(sector);
                        report.new_bad_sectors.insert(sector);
                        sector_errors = 0;
                    } else {
                        progress.write_failed(bank, &e, true);
                        log::warn!("Lets try again");
                    }

                    bank = first_bank_of(sector);
                    self.dumper.reset()?;
                    cfi::reset_flash(&mut *self.dumper)?;
                }
            }
        }

        if report.total_errors > 0 {
            log::warn!("Write error count: {}", report.total_errors);
        }
        if !report.new_bad_sectors.is_empty() {
            log::warn!("Can't write sectors: {:?}", report.new_bad_sectors);
        }
        Ok(report)
    }

    /// Compare the flash CRC of every bank against the image
    ///
    /// Read-only: only bank selections and CRC requests reach the dumper.
    /// Returns the sectors with at least one mismatching bank.
    pub fn verify<P: FlashProgress + ?Sized>(
        &mut self,
        prg: &[u8],
        skip: &SectorSet,
        progress: &mut P,
    ) -> Result<SectorSet> {
        let banks = self.check_image(prg)?;
        log::info!("Starting verification process");
        self.dumper.reset()?;

        let mut wrong_crc = SectorSet::new();
        let mut timer = PassTimer::start(banks);
        let mut bank = 0;
        while bank < banks {
            let sector = sector_of(bank);
            if skip.contains(&sector) {
                progress.skipped(sector);
                bank = first_bank_of(sector + 1);
                continue;
            }

            self.select_bank(bank)?;
            if bank % BANKS_PER_SECTOR == 0 {
                timer.sector_boundary(bank);
            }

            let pos = bank * BANK_SIZE;
            let expected = crc16(&prg[pos..pos + BANK_SIZE]);
            progress.verifying(&timer.progress(bank));
            let actual = self.dumper.read_cpu_crc(PRG_WINDOW, BANK_SIZE)?;
            progress.verified(bank, expected, actual);

            if actual != expected {
                log::error!(
                    "Verification failed on bank #{}: {:04X} != {:04X}",
                    bank,
                    actual,
                    expected
                );
                self.alert(Cue::Error);
                wrong_crc.insert(sector);
            } else {
                log::debug!("Bank #{} OK (CRC = {:04X})", bank, actual);
            }
            bank += 1;
        }

        if !wrong_crc.is_empty() {
            log::error!("Sectors with wrong CRC: {:?}", wrong_crc);
        }
        Ok(wrong_crc)
    }

    /// Wait for the operator before verification (e.g. to reseat the cartridge)
    pub fn pause(&mut self) -> Result<()> {
        self.alert(Cue::Done);
        self.operator.confirm("Press enter to continue")
    }
}

/// Write a PRG image to a COOLBOY cartridge, optionally verifying it
///
/// With `options.verify`, a verification problem fails the session with
/// `Error::Integrity`.
pub fn write_prg<D, O, P>(
    dumper: &mut D,
    operator: &mut O,
    prg: &[u8],
    options: &WriteOptions,
    progress: &mut P,
) -> Result<SessionReport>
where
    D: Dumper + ?Sized,
    O: Operator + ?Sized,
    P: FlashProgress + ?Sized,
{
    let mut session = FlashSession::open(dumper, operator, options.silent)?;
    let mut report = session.write(prg, options, progress)?;

    if options.verify {
        if options.pause_before_verify {
            session.pause()?;
        }
        report.wrong_crc_sectors = session.verify(prg, &report.bad_sectors, progress)?;
        report.verified = true;
    }

    report.into_result()
}

/// Verify a COOLBOY cartridge against a PRG image without writing
pub fn verify_prg<D, O, P>(
    dumper: &mut D,
    operator: &mut O,
    prg: &[u8],
    bad_sectors: &[usize],
    silent: bool,
    progress: &mut P,
) -> Result<SessionReport>
where
    D: Dumper + ?Sized,
    O: Operator + ?Sized,
    P: FlashProgress + ?Sized,
{
    let mut session = FlashSession::open(dumper, operator, silent)?;
    let bad: SectorSet = bad_sectors.iter().copied().collect();
    let wrong_crc_sectors = session.verify(prg, &bad, progress)?;
    SessionReport {
        bad_sectors: bad,
        wrong_crc_sectors,
        verified: true,
        ..Default::default()
    }
    .into_result()
}

/// Detect the cartridge and read its flash geometry and protection state
pub fn cartridge_info<D: Dumper + ?Sized>(dumper: &mut D) -> Result<CartridgeInfo> {
    dumper.reset()?;
    let revision = detect_revision(dumper)?;
    BankSelector::new(0).select(dumper, revision)?;
    cfi::reset_flash(dumper)?;
    let flash = cfi::query_cfi(dumper)?;
    let sector0_protected = cfi::ppb_status(dumper)?;
    Ok(CartridgeInfo {
        revision,
        flash,
        sector0_protected,
    })
}
