//! Konami VRC2b/VRC4f/VRC4e (mapper 23)
//!
//! The boards differ in which address lines reach the register select
//! inputs, so every register write goes to an address that satisfies both
//! wirings at once.

use super::{read_banks, Mapper, Window};
use crate::dumper::{write_cpu_byte, Dumper};
use crate::error::Result;

const PRG_BANK: usize = 0x2000;
const CHR_BANK: usize = 0x0400;

/// Konami VRC2b, VRC4f and VRC4e
#[derive(Debug, Clone, Copy, Default)]
pub struct Vrc2b4f4e;

impl Mapper for Vrc2b4f4e {
    fn name(&self) -> &'static str {
        "VRC2b/VRC4f/VRC4e"
    }

    fn number(&self) -> u16 {
        23
    }

    fn default_prg_size(&self) -> usize {
        256 * 1024
    }

    fn default_chr_size(&self) -> usize {
        512 * 1024
    }

    fn dump_prg(&self, dumper: &mut dyn Dumper, size: usize) -> Result<Vec<u8>> {
        // swap mode off
        write_cpu_byte(dumper, 0x9002 | 0x9008, 0)?;
        read_banks(dumper, "PRG", size, PRG_BANK, Window::Cpu(0x8000), |d, bank| {
            write_cpu_byte(d, 0x8000, bank as u8)
        })
    }

    fn dump_chr(&self, dumper: &mut dyn Dumper, size: usize) -> Result<Vec<u8>> {
        read_banks(dumper, "CHR", size, CHR_BANK, Window::Ppu(0x0000), |d, bank| {
            write_cpu_byte(d, 0xB000, (bank & 0x0F) as u8)?;
            write_cpu_byte(d, 0xB001 | 0xB004, (bank >> 4) as u8)
        })
    }
}
