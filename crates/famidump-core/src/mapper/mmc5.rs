//! MMC5 (mapper 5)

use super::{read_banks, Mapper, Window};
use crate::dumper::{write_cpu_byte, Dumper};
use crate::error::Result;

const PRG_BANK: usize = 0x2000;
const CHR_BANK: usize = 0x2000;

/// Nintendo MMC5 (ExROM)
#[derive(Debug, Clone, Copy, Default)]
pub struct Mmc5;

impl Mapper for Mmc5 {
    fn name(&self) -> &'static str {
        "MMC5"
    }

    fn number(&self) -> u16 {
        5
    }

    fn default_prg_size(&self) -> usize {
        1024 * 1024
    }

    fn default_chr_size(&self) -> usize {
        1024 * 1024
    }

    fn dump_prg(&self, dumper: &mut dyn Dumper, size: usize) -> Result<Vec<u8>> {
        // PRG mode 3: four 8KB banks
        write_cpu_byte(dumper, 0x5100, 3)?;
        read_banks(dumper, "PRG", size, PRG_BANK, Window::Cpu(0x8000), |d, bank| {
            write_cpu_byte(d, 0x5114, bank as u8 | 0x80)
        })
    }

    fn dump_chr(&self, dumper: &mut dyn Dumper, size: usize) -> Result<Vec<u8>> {
        // 8x8 sprites, CHR mode 0: one 8KB bank
        write_cpu_byte(dumper, 0x2000, 0)?;
        write_cpu_byte(dumper, 0x5101, 0)?;
        read_banks(dumper, "CHR", size, CHR_BANK, Window::Ppu(0x0000), |d, bank| {
            write_cpu_byte(d, 0x5127, bank as u8)
        })
    }

    fn enable_prg_ram(&self, dumper: &mut dyn Dumper) -> Result<()> {
        // unlock both RAM protect registers
        write_cpu_byte(dumper, 0x5102, 0x02)?;
        write_cpu_byte(dumper, 0x5103, 0x01)?;
        write_cpu_byte(dumper, 0x5100, 3)?;
        write_cpu_byte(dumper, 0x5113, 7)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::mapper::testing::RecordingDumper;

    #[test]
    fn test_prg_bank_selects() {
        let mut dumper = RecordingDumper::default();
        let prg = Mmc5.dump_prg(&mut dumper, 3 * PRG_BANK).unwrap();
        assert_eq!(prg.len(), 3 * PRG_BANK);
        assert_eq!(
            dumper.writes(),
            vec![(0x5100, 3), (0x5114, 0x80), (0x5114, 0x81), (0x5114, 0x82)]
        );
    }

    #[test]
    fn test_chr_bank_selects() {
        let mut dumper = RecordingDumper::default();
        Mmc5.dump_chr(&mut dumper, 2 * CHR_BANK).unwrap();
        assert_eq!(
            dumper.writes(),
            vec![(0x2000, 0), (0x5101, 0), (0x5127, 0), (0x5127, 1)]
        );
    }

    #[test]
    fn test_prg_ram() {
        let mut dumper = RecordingDumper::default();
        Mmc5.enable_prg_ram(&mut dumper).unwrap();
        assert_eq!(
            dumper.writes(),
            vec![(0x5102, 2), (0x5103, 1), (0x5100, 3), (0x5113, 7)]
        );
    }
}
