//! famidump-dummy - In-memory dumper emulator for testing
//!
//! This crate provides a dumper that emulates a COOLBOY cartridge (bank
//! register, CHR RAM, NOR flash with CFI and protection bits) and an FDS
//! RAM adapter with a disk drive. Faults can be injected per bank or sector,
//! and every flash operation is journaled so tests can check exactly what
//! reached the hardware.

mod disk;
mod flash;

pub use disk::{DiskDrive, SWAP_POLLS};

use std::collections::{BTreeMap, BTreeSet};
use std::time::Duration;

use famidump_core::bank::{
    BankSelector, ControllerRevision, BANKS_PER_SECTOR, BANK_SIZE, PRG_WINDOW,
};
use famidump_core::crc::crc16;
use famidump_core::dumper::{Dumper, UNLIMITED_PACKET_SIZE};
use famidump_core::error::{Error, Result};
use famidump_core::fds::{framed_len, FdsBlock, GROUP_OVERHEAD};

use flash::NorFlash;

const CHR_BANKS: usize = 16;
const CHR_BANK_SIZE: usize = 0x2000;

/// Configuration for the dummy dumper
#[derive(Debug, Clone)]
pub struct DummyConfig {
    /// COOLBOY revision of the inserted cartridge, `None` for a cartridge
    /// that is not a COOLBOY
    pub revision: Option<ControllerRevision>,
    /// Flash size in bytes
    pub flash_size: usize,
    /// Multi-byte program buffer reported through CFI
    pub max_multi_program: usize,
    /// Protocol version
    pub protocol_version: u8,
    /// Maximum read packet size
    pub max_read_packet_size: usize,
    /// Maximum write packet size
    pub max_write_packet_size: usize,
    /// FDS RAM adapter connected
    pub fds_adapter: bool,
    /// RAM adapter reports low battery
    pub battery_low: bool,
}

impl Default for DummyConfig {
    fn default() -> Self {
        Self {
            revision: Some(ControllerRevision::A),
            flash_size: 32 * 1024 * 1024,
            max_multi_program: 64,
            protocol_version: 3,
            max_read_packet_size: UNLIMITED_PACKET_SIZE,
            max_write_packet_size: 16 * 1024,
            fds_adapter: true,
            battery_low: false,
        }
    }
}

/// What reached the emulated hardware
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Journal {
    /// Cartridge resets
    pub resets: usize,
    /// Sectors erased, in order
    pub erased: Vec<usize>,
    /// Banks programmed, in order
    pub programmed: Vec<usize>,
    /// Banks whose CRC was requested, in order
    pub crc_requests: Vec<usize>,
    /// Last flash buffer size set by the host
    pub flash_buffer_size: Option<usize>,
    /// Every timeout set by the host
    pub timeouts: Vec<Duration>,
}

/// Dummy dumper
///
/// Emulates the dumper and whatever is plugged into it.
pub struct DummyDumper {
    config: DummyConfig,
    timeout: Duration,
    register: [u8; 4],
    chr: Vec<[u8; CHR_BANK_SIZE]>,
    flash: NorFlash,
    open_bus: u8,
    ext_output: u8,
    drive: DiskDrive,
    write_failures: BTreeMap<usize, usize>,
    failing_sectors: BTreeSet<usize>,
    corrupt_banks: BTreeSet<usize>,
    journal: Journal,
}

impl DummyDumper {
    /// Create a dummy dumper with the given configuration
    pub fn new(config: DummyConfig) -> Self {
        let flash = NorFlash::new(config.flash_size, config.max_multi_program);
        Self {
            config,
            timeout: Duration::from_millis(1000),
            register: [0; 4],
            chr: vec![[0; CHR_BANK_SIZE]; CHR_BANKS],
            flash,
            open_bus: 0xFF,
            ext_output: 0,
            drive: DiskDrive::new(Vec::new()),
            write_failures: BTreeMap::new(),
            failing_sectors: BTreeSet::new(),
            corrupt_banks: BTreeSet::new(),
            journal: Journal::default(),
        }
    }

    /// Create a dummy dumper with the default configuration (revision A,
    /// 32MB flash)
    pub fn new_default() -> Self {
        Self::new(DummyConfig::default())
    }

    /// Put disks in the queue; the first one goes straight into the drive
    pub fn with_disks(mut self, disks: Vec<Vec<FdsBlock>>) -> Self {
        self.drive = DiskDrive::new(disks);
        self
    }

    /// Make the next `count` programs of `bank` fail
    pub fn fail_bank_writes(&mut self, bank: usize, count: usize) {
        *self.write_failures.entry(bank).or_default() += count;
    }

    /// Make every erase and program in `sector` fail
    pub fn fail_sector(&mut self, sector: usize) {
        self.failing_sectors.insert(sector);
    }

    /// Report a wrong CRC for `bank`
    pub fn corrupt_crc(&mut self, bank: usize) {
        self.corrupt_banks.insert(bank);
    }

    /// Set the protection bit of a sector
    pub fn protect_sector(&mut self, sector: usize) {
        self.flash.protect(sector);
    }

    /// Whether a sector's protection bit is set
    pub fn is_protected(&self, sector: usize) -> bool {
        self.flash.is_protected(sector)
    }

    /// Flash contents
    pub fn flash_data(&self) -> &[u8] {
        self.flash.data()
    }

    /// Mutable flash contents
    pub fn flash_data_mut(&mut self) -> &mut [u8] {
        self.flash.data_mut()
    }

    /// Operation journal
    pub fn journal(&self) -> &Journal {
        &self.journal
    }

    /// The disk drive
    pub fn drive(&self) -> &DiskDrive {
        &self.drive
    }

    /// Get the configuration
    pub fn config(&self) -> &DummyConfig {
        &self.config
    }

    fn live_register(&self) -> Option<u16> {
        self.config.revision.map(ControllerRevision::register)
    }

    fn selected_bank(&self) -> Option<usize> {
        self.live_register()?;
        BankSelector::decode(self.register).filter(|&bank| {
            bank * BANK_SIZE < self.config.flash_size
        })
    }

    fn selected_chr(&self) -> usize {
        self.register[2] as usize % CHR_BANKS
    }

    fn write_cpu_byte(&mut self, addr: u16, value: u8) {
        if let Some(base) = self.live_register() {
            if (base..base + 4).contains(&addr) {
                self.register[(addr - base) as usize] = value;
                return;
            }
        }
        match addr {
            0x0000 => self.open_bus = value,
            0x4026 => self.ext_output = value,
            0x4020..=0x4025 => {}
            0x8000..=0xBFFF => {
                let bank = self.selected_bank();
                self.flash.command(bank, (addr - PRG_WINDOW) as usize, value);
            }
            _ => {}
        }
    }

    fn read_cpu_byte(&mut self, addr: u16) -> u8 {
        match addr {
            0x4032 => self.drive.status().bits(),
            0x4033 if self.config.fds_adapter => {
                let battery = if self.config.battery_low { self.ext_output & 0x80 } else { 0 };
                (self.ext_output & 0x7F) | battery
            }
            0x8000..=0xBFFF => self
                .flash
                .read(self.selected_bank(), (addr - PRG_WINDOW) as usize),
            _ => self.open_bus,
        }
    }

    fn current_sector(&self) -> Result<(usize, usize)> {
        let bank = self
            .selected_bank()
            .ok_or_else(|| Error::FlashOperation("no flash bank selected".into()))?;
        Ok((bank, bank / BANKS_PER_SECTOR))
    }

    fn require_fds(&self) -> Result<()> {
        if self.config.protocol_version < 3 {
            return Err(Error::InvalidResponse("unknown command".into()));
        }
        Ok(())
    }
}

impl Dumper for DummyDumper {
    fn protocol_version(&self) -> u8 {
        self.config.protocol_version
    }

    fn max_write_packet_size(&self) -> usize {
        self.config.max_write_packet_size
    }

    fn max_read_packet_size(&self) -> usize {
        self.config.max_read_packet_size
    }

    fn timeout(&self) -> Duration {
        self.timeout
    }

    fn set_timeout(&mut self, timeout: Duration) -> Result<()> {
        self.timeout = timeout;
        self.journal.timeouts.push(timeout);
        Ok(())
    }

    fn reset(&mut self) -> Result<()> {
        self.register = [0; 4];
        self.flash.reset();
        self.journal.resets += 1;
        Ok(())
    }

    fn write_cpu(&mut self, addr: u16, data: &[u8]) -> Result<()> {
        for (i, &value) in data.iter().enumerate() {
            self.write_cpu_byte(addr.wrapping_add(i as u16), value);
        }
        Ok(())
    }

    fn write_ppu(&mut self, addr: u16, data: &[u8]) -> Result<()> {
        let bank = self.selected_chr();
        for (i, &value) in data.iter().enumerate() {
            let addr = addr as usize + i;
            if addr < CHR_BANK_SIZE && self.config.revision.is_some() {
                self.chr[bank][addr] = value;
            }
        }
        Ok(())
    }

    fn read_cpu(&mut self, addr: u16, len: usize) -> Result<Vec<u8>> {
        Ok((0..len)
            .map(|i| self.read_cpu_byte(addr.wrapping_add(i as u16)))
            .collect())
    }

    fn read_ppu(&mut self, addr: u16, len: usize) -> Result<Vec<u8>> {
        let bank = self.selected_chr();
        Ok((0..len)
            .map(|i| {
                let addr = addr as usize + i;
                match self.config.revision {
                    Some(_) if addr < CHR_BANK_SIZE => self.chr[bank][addr],
                    _ => 0xFF,
                }
            })
            .collect())
    }

    fn erase_flash_sector(&mut self) -> Result<()> {
        let (_, sector) = self.current_sector()?;
        if self.failing_sectors.contains(&sector) {
            return Err(Error::FlashOperation(format!("erase of sector #{} failed", sector)));
        }
        self.flash.erase_sector(sector)?;
        self.journal.erased.push(sector);
        log::debug!("dummy: erased sector #{}", sector);
        Ok(())
    }

    fn write_flash(&mut self, offset: u16, data: &[u8]) -> Result<()> {
        let (bank, sector) = self.current_sector()?;
        if self.failing_sectors.contains(&sector) {
            return Err(Error::FlashOperation(format!("program of bank #{} failed", bank)));
        }
        if let Some(remaining) = self.write_failures.get_mut(&bank) {
            if *remaining > 0 {
                *remaining -= 1;
                return Err(Error::FlashOperation(format!("program of bank #{} failed", bank)));
            }
        }
        self.flash.program(bank, offset as usize, data)?;
        self.journal.programmed.push(bank);
        Ok(())
    }

    fn read_cpu_crc(&mut self, addr: u16, len: usize) -> Result<u16> {
        let data = self.read_cpu(addr, len)?;
        let mut crc = crc16(&data);
        if let Some(bank) = self.selected_bank() {
            self.journal.crc_requests.push(bank);
            if self.corrupt_banks.contains(&bank) {
                crc ^= 0x5A5A;
            }
        }
        Ok(crc)
    }

    fn set_flash_buffer_size(&mut self, size: usize) -> Result<()> {
        self.journal.flash_buffer_size = Some(size);
        Ok(())
    }

    fn read_fds_blocks(&mut self, start: u8, count: u8) -> Result<Vec<FdsBlock>> {
        self.require_fds()?;
        self.drive.read_blocks(start as usize, count as usize)
    }

    fn read_fds_disk(&mut self) -> Result<Vec<FdsBlock>> {
        self.require_fds()?;
        self.drive.read_all()
    }

    fn write_fds_blocks(&mut self, indices: &[u8], blocks: &[FdsBlock]) -> Result<()> {
        self.require_fds()?;
        let size = GROUP_OVERHEAD + blocks.iter().map(framed_len).sum::<usize>();
        if size > self.config.max_write_packet_size {
            return Err(Error::InvalidResponse(format!(
                "write packet of {} bytes exceeds {}",
                size, self.config.max_write_packet_size
            )));
        }
        self.drive.write_blocks(indices, blocks)
    }
}

#[cfg(test)]
mod scenarios;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_bank_select_maps_window() {
        let mut dumper = DummyDumper::new_default();
        dumper.flash_data_mut()[5 * BANK_SIZE] = 0x42;
        BankSelector::new(5)
            .select(&mut dumper, ControllerRevision::A)
            .unwrap();
        assert_eq!(dumper.read_cpu(0x8000, 1).unwrap(), vec![0x42]);
    }

    #[test]
    fn test_dead_register_is_ignored() {
        let mut dumper = DummyDumper::new_default();
        BankSelector::new(5)
            .select(&mut dumper, ControllerRevision::B)
            .unwrap();
        assert!(dumper.erase_flash_sector().is_err());
    }

    #[test]
    fn test_crc_matches_host() {
        let mut dumper = DummyDumper::new_default();
        dumper.flash_data_mut()[..BANK_SIZE].fill(0x11);
        BankSelector::new(0)
            .select(&mut dumper, ControllerRevision::A)
            .unwrap();
        assert_eq!(
            dumper.read_cpu_crc(0x8000, BANK_SIZE).unwrap(),
            crc16(&[0x11; BANK_SIZE])
        );
    }

    #[test]
    fn test_injected_write_failures_run_out() {
        let mut dumper = DummyDumper::new_default();
        dumper.fail_bank_writes(0, 2);
        BankSelector::new(0)
            .select(&mut dumper, ControllerRevision::A)
            .unwrap();
        assert!(dumper.write_flash(0, &[0]).is_err());
        assert!(dumper.write_flash(0, &[0]).is_err());
        assert!(dumper.write_flash(0, &[0]).is_ok());
        assert_eq!(dumper.journal().programmed, vec![0]);
    }
}
