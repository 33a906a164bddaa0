//! Emulated byte-mode NOR flash with CFI and persistent protection bits

use famidump_core::bank::{BANK_SIZE, BANKS_PER_SECTOR, SECTOR_SIZE};
use famidump_core::error::{Error, Result};

const CFI_TABLE_LEN: usize = 0x100;

/// Command state of the chip
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Mode {
    ReadArray,
    Unlock1,
    Unlock2,
    CfiQuery,
    Ppb,
    PpbErase,
    PpbProgram,
    PpbExit,
}

/// The flash chip behind the PRG window
pub struct NorFlash {
    data: Vec<u8>,
    ppb: Vec<bool>,
    cfi: Vec<u8>,
    mode: Mode,
}

impl NorFlash {
    pub fn new(size: usize, max_multi_program: usize) -> Self {
        let sectors = size / SECTOR_SIZE;
        Self {
            data: vec![0xFF; size],
            ppb: vec![false; sectors],
            cfi: cfi_table(size, max_multi_program),
            mode: Mode::ReadArray,
        }
    }

    pub fn data(&self) -> &[u8] {
        &self.data
    }

    pub fn data_mut(&mut self) -> &mut [u8] {
        &mut self.data
    }

    pub fn is_protected(&self, sector: usize) -> bool {
        self.ppb.get(sector).copied().unwrap_or(false)
    }

    pub fn protect(&mut self, sector: usize) {
        if let Some(bit) = self.ppb.get_mut(sector) {
            *bit = true;
        }
    }

    /// Back to read-array mode
    pub fn reset(&mut self) {
        self.mode = Mode::ReadArray;
    }

    /// A byte written into the window while `bank` is selected
    pub fn command(&mut self, bank: Option<usize>, offset: usize, value: u8) {
        if value == 0xF0 && !self.in_ppb() {
            self.mode = Mode::ReadArray;
            return;
        }
        self.mode = match (self.mode, offset, value) {
            (Mode::ReadArray | Mode::CfiQuery, 0xAAA, 0x98) => Mode::CfiQuery,
            (Mode::ReadArray, 0xAAA, 0xAA) => Mode::Unlock1,
            (Mode::Unlock1, 0x555, 0x55) => Mode::Unlock2,
            (Mode::Unlock2, 0xAAA, 0xC0) => Mode::Ppb,
            (Mode::Ppb, _, 0x80) => Mode::PpbErase,
            (Mode::Ppb, _, 0xA0) => Mode::PpbProgram,
            (Mode::Ppb, _, 0x90) => Mode::PpbExit,
            (Mode::PpbErase, _, 0x30) => {
                self.ppb.fill(false);
                Mode::Ppb
            }
            (Mode::PpbProgram, _, 0x00) => {
                if let Some(bank) = bank {
                    self.protect(bank / BANKS_PER_SECTOR);
                }
                Mode::Ppb
            }
            (Mode::PpbExit, _, 0x00) => Mode::ReadArray,
            (Mode::Ppb, _, _) => Mode::Ppb,
            (Mode::CfiQuery, _, _) => Mode::CfiQuery,
            _ => Mode::ReadArray,
        };
    }

    fn in_ppb(&self) -> bool {
        matches!(
            self.mode,
            Mode::Ppb | Mode::PpbErase | Mode::PpbProgram | Mode::PpbExit
        )
    }

    /// A byte read from the window while `bank` is selected
    pub fn read(&self, bank: Option<usize>, offset: usize) -> u8 {
        match self.mode {
            Mode::CfiQuery => self.cfi.get(offset).copied().unwrap_or(0),
            Mode::Ppb | Mode::PpbErase | Mode::PpbProgram | Mode::PpbExit => {
                match bank {
                    // DQ0 = 0 when protected
                    Some(bank) if self.is_protected(bank / BANKS_PER_SECTOR) => 0x00,
                    _ => 0x01,
                }
            }
            _ => match bank {
                Some(bank) => self
                    .data
                    .get(bank * BANK_SIZE + offset)
                    .copied()
                    .unwrap_or(0xFF),
                None => 0xFF,
            },
        }
    }

    fn sector_range(&self, sector: usize) -> Result<std::ops::Range<usize>> {
        let start = sector * SECTOR_SIZE;
        if start + SECTOR_SIZE > self.data.len() {
            return Err(Error::FlashOperation(format!(
                "sector #{} is outside the chip",
                sector
            )));
        }
        Ok(start..start + SECTOR_SIZE)
    }

    pub fn erase_sector(&mut self, sector: usize) -> Result<()> {
        let range = self.sector_range(sector)?;
        if self.is_protected(sector) {
            return Err(Error::FlashOperation(format!(
                "sector #{} is protected",
                sector
            )));
        }
        self.data[range].fill(0xFF);
        Ok(())
    }

    pub fn program(&mut self, bank: usize, offset: usize, data: &[u8]) -> Result<()> {
        let sector = bank / BANKS_PER_SECTOR;
        self.sector_range(sector)?;
        if offset + data.len() > BANK_SIZE {
            return Err(Error::FlashOperation("write crosses the bank window".into()));
        }
        if self.is_protected(sector) {
            return Err(Error::FlashOperation(format!(
                "sector #{} is protected",
                sector
            )));
        }
        let start = bank * BANK_SIZE + offset;
        // Programming can only clear bits
        for (cell, &byte) in self.data[start..start + data.len()].iter_mut().zip(data) {
            *cell &= byte;
        }
        Ok(())
    }
}

/// Byte-mode CFI table: word address n at byte 2n
fn cfi_table(size: usize, max_multi_program: usize) -> Vec<u8> {
    let mut table = vec![0u8; CFI_TABLE_LEN];
    let mut set = |word: usize, value: u8| table[word * 2] = value;
    set(0x10, b'Q');
    set(0x11, b'R');
    set(0x12, b'Y');
    // AMD/Fujitsu standard command set
    set(0x13, 0x02);
    set(0x27, size.trailing_zeros() as u8);
    set(0x2A, max_multi_program.trailing_zeros() as u8);
    set(0x2C, 1);
    let blocks = (size / SECTOR_SIZE).saturating_sub(1) as u16;
    let [lo, hi] = blocks.to_le_bytes();
    set(0x2D, lo);
    set(0x2E, hi);
    let [lo, hi] = ((SECTOR_SIZE / 256) as u16).to_le_bytes();
    set(0x2F, lo);
    set(0x30, hi);
    table
}

#[cfg(test)]
mod tests {
    use super::*;
    use famidump_core::flash::FlashInfo;

    #[test]
    fn test_cfi_table_parses() {
        let flash = NorFlash::new(4 * 1024 * 1024, 32);
        let info = FlashInfo::parse(&flash.cfi).unwrap();
        assert_eq!(info.device_size, 4 * 1024 * 1024);
        assert_eq!(info.max_multi_program, 32);
        assert_eq!(info.erase_regions[0].count, 32);
        assert_eq!(info.erase_regions[0].size, SECTOR_SIZE);
    }

    #[test]
    fn test_program_only_clears_bits() {
        let mut flash = NorFlash::new(SECTOR_SIZE, 32);
        flash.program(0, 0, &[0x0F]).unwrap();
        flash.program(0, 0, &[0xF3]).unwrap();
        assert_eq!(flash.data()[0], 0x03);
        flash.erase_sector(0).unwrap();
        assert_eq!(flash.data()[0], 0xFF);
    }

    #[test]
    fn test_ppb_sequence() {
        let mut flash = NorFlash::new(2 * SECTOR_SIZE, 32);
        let bank = Some(9);
        for (offset, value) in [(0xAAA, 0xAA), (0x555, 0x55), (0xAAA, 0xC0), (0, 0xA0), (0, 0x00)] {
            flash.command(bank, offset, value);
        }
        assert_eq!(flash.read(bank, 0), 0x00);
        assert_eq!(flash.read(Some(0), 0), 0x01);
        flash.command(bank, 0, 0x90);
        flash.command(bank, 0, 0x00);
        assert!(flash.is_protected(1));
        assert!(flash.erase_sector(1).is_err());
        assert!(flash.program(8, 0, &[0]).is_err());
    }
}
