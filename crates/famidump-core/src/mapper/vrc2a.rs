//! Konami VRC2a (mapper 22)

use super::{read_banks, Mapper, Window};
use crate::dumper::{write_cpu_byte, Dumper};
use crate::error::Result;

const PRG_BANK: usize = 0x2000;
const CHR_BANK: usize = 0x0400;

/// Konami VRC2a
///
/// CHR select registers ignore the low bit of the bank number.
#[derive(Debug, Clone, Copy, Default)]
pub struct Vrc2a;

impl Mapper for Vrc2a {
    fn name(&self) -> &'static str {
        "VRC2a"
    }

    fn number(&self) -> u16 {
        22
    }

    fn default_prg_size(&self) -> usize {
        256 * 1024
    }

    fn default_chr_size(&self) -> usize {
        256 * 1024
    }

    fn dump_prg(&self, dumper: &mut dyn Dumper, size: usize) -> Result<Vec<u8>> {
        // swap mode off
        write_cpu_byte(dumper, 0x9001, 0)?;
        read_banks(dumper, "PRG", size, PRG_BANK, Window::Cpu(0x8000), |d, bank| {
            write_cpu_byte(d, 0x8000, bank as u8)
        })
    }

    fn dump_chr(&self, dumper: &mut dyn Dumper, size: usize) -> Result<Vec<u8>> {
        read_banks(dumper, "CHR", size, CHR_BANK, Window::Ppu(0x0000), |d, bank| {
            write_cpu_byte(d, 0xB000, ((bank >> 1) & 0x0F) as u8)?;
            write_cpu_byte(d, 0xB002, (bank >> 5) as u8)
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::mapper::testing::RecordingDumper;

    #[test]
    fn test_prg_bank_selects() {
        let mut dumper = RecordingDumper::default();
        Vrc2a.dump_prg(&mut dumper, 2 * PRG_BANK).unwrap();
        assert_eq!(dumper.writes(), vec![(0x9001, 0), (0x8000, 0), (0x8000, 1)]);
    }

    #[test]
    fn test_chr_select_drops_low_bit() {
        let mut dumper = RecordingDumper::default();
        Vrc2a.dump_chr(&mut dumper, 0x22 * CHR_BANK).unwrap();
        let writes = dumper.writes();
        // bank 0x21: low = (0x21 >> 1) & 0x0F = 0, high = 0x21 >> 5 = 1
        assert_eq!(&writes[writes.len() - 2..], &[(0xB000, 0x00), (0xB002, 0x01)]);
        // bank 3: low = 1, high = 0
        assert_eq!(&writes[6..8], &[(0xB000, 0x01), (0xB002, 0x00)]);
    }
}
