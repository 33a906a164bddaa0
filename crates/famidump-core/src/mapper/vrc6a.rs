//! Konami VRC6a (mapper 24)

use super::{read_banks, Mapper, Window};
use crate::dumper::{write_cpu_byte, Dumper};
use crate::error::Result;

const PRG_BANK: usize = 0x4000;
const CHR_BANK: usize = 0x0400;

/// PPU banking style / PRG RAM enable register
const BANKING_CONTROL: u16 = 0xB003;
/// 1KB CHR mode, PRG RAM enabled
const BANKING_MODE: u8 = 0xE0;

/// Konami VRC6a
#[derive(Debug, Clone, Copy, Default)]
pub struct Vrc6a;

impl Mapper for Vrc6a {
    fn name(&self) -> &'static str {
        "VRC6a"
    }

    fn number(&self) -> u16 {
        24
    }

    fn default_prg_size(&self) -> usize {
        256 * 1024
    }

    fn default_chr_size(&self) -> usize {
        256 * 1024
    }

    fn dump_prg(&self, dumper: &mut dyn Dumper, size: usize) -> Result<Vec<u8>> {
        read_banks(dumper, "PRG", size, PRG_BANK, Window::Cpu(0x8000), |d, bank| {
            write_cpu_byte(d, 0x8000, bank as u8)
        })
    }

    fn dump_chr(&self, dumper: &mut dyn Dumper, size: usize) -> Result<Vec<u8>> {
        write_cpu_byte(dumper, BANKING_CONTROL, BANKING_MODE)?;
        read_banks(dumper, "CHR", size, CHR_BANK, Window::Ppu(0x0000), |d, bank| {
            write_cpu_byte(d, 0xD000, bank as u8)
        })
    }

    fn enable_prg_ram(&self, dumper: &mut dyn Dumper) -> Result<()> {
        write_cpu_byte(dumper, BANKING_CONTROL, BANKING_MODE)
    }
}
