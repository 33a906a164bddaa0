//! Mapper 58 multicarts
//!
//! The bank number is latched from the address lines of the write, the
//! written value is ignored.

use super::{read_banks, Mapper, Window};
use crate::dumper::{write_cpu_byte, Dumper};
use crate::error::{Error, Result};

const PRG_BANK: usize = 0x4000;
const CHR_BANK: usize = 0x2000;
/// Three address lines each for the PRG and CHR bank
const MAX_BANKS: usize = 8;

fn check_size(what: &str, size: usize, bank_size: usize) -> Result<()> {
    if size > MAX_BANKS * bank_size {
        return Err(Error::InvalidImage(format!(
            "{} size {} KB is more than mapper 58 can address ({} KB)",
            what,
            size / 1024,
            MAX_BANKS * bank_size / 1024
        )));
    }
    Ok(())
}

/// Mapper 58 (address-latch multicart)
#[derive(Debug, Clone, Copy, Default)]
pub struct Mapper58;

impl Mapper for Mapper58 {
    fn name(&self) -> &'static str {
        "Mapper 58"
    }

    fn number(&self) -> u16 {
        58
    }

    fn default_prg_size(&self) -> usize {
        8 * PRG_BANK
    }

    fn default_chr_size(&self) -> usize {
        8 * CHR_BANK
    }

    fn dump_prg(&self, dumper: &mut dyn Dumper, size: usize) -> Result<Vec<u8>> {
        check_size("PRG", size, PRG_BANK)?;
        // A6 selects 16KB mode
        read_banks(dumper, "PRG", size, PRG_BANK, Window::Cpu(0x8000), |d, bank| {
            write_cpu_byte(d, 0x8040 | (bank & 0x07) as u16, 0)
        })
    }

    fn dump_chr(&self, dumper: &mut dyn Dumper, size: usize) -> Result<Vec<u8>> {
        check_size("CHR", size, CHR_BANK)?;
        read_banks(dumper, "CHR", size, CHR_BANK, Window::Ppu(0x0000), |d, bank| {
            write_cpu_byte(d, 0x8000 | (((bank & 0x07) as u16) << 3), 0)
        })
    }
}
