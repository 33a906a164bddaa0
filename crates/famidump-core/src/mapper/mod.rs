//! Mapper capability registry
//!
//! Each supported cartridge board knows how to page its PRG and CHR memory
//! through the dumper and report its nametable mirroring. Boards are looked
//! up by their iNES mapper number.

mod mapper58;
mod mmc5;
mod vrc2a;
mod vrc2b4f4e;
mod vrc6a;

pub use mapper58::Mapper58;
pub use mmc5::Mmc5;
pub use vrc2a::Vrc2a;
pub use vrc2b4f4e::Vrc2b4f4e;
pub use vrc6a::Vrc6a;

use crate::dumper::Dumper;
use crate::error::{Error, Result};

/// iNES header magic
pub const INES_MAGIC: &[u8; 4] = b"NES\x1A";
/// Size of an iNES header
pub const INES_HEADER_SIZE: usize = 16;
const INES_PRG_UNIT: usize = 0x4000;
const INES_CHR_UNIT: usize = 0x2000;

/// Nametable mirroring
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Mirroring {
    /// Horizontal arrangement (vertical mirroring off)
    Horizontal,
    /// Vertical mirroring
    Vertical,
    /// Four-screen VRAM on the board
    FourScreen,
    /// Selected at run time by a mapper register
    MapperControlled,
}

/// What a board can do for the dumper
pub trait Mapper {
    /// Board name
    fn name(&self) -> &'static str;

    /// iNES mapper number
    fn number(&self) -> u16;

    /// PRG size read when none is given
    fn default_prg_size(&self) -> usize;

    /// CHR size read when none is given
    fn default_chr_size(&self) -> usize;

    /// Read `size` bytes of PRG memory
    fn dump_prg(&self, dumper: &mut dyn Dumper, size: usize) -> Result<Vec<u8>>;

    /// Read `size` bytes of CHR memory
    fn dump_chr(&self, dumper: &mut dyn Dumper, size: usize) -> Result<Vec<u8>>;

    /// Map battery-backed PRG RAM into `$6000-$7FFF`
    fn enable_prg_ram(&self, _dumper: &mut dyn Dumper) -> Result<()> {
        Err(Error::NotSupported("PRG RAM is not supported by this mapper"))
    }

    /// Nametable mirroring of the board
    fn mirroring(&self, _dumper: &mut dyn Dumper) -> Result<Mirroring> {
        Ok(Mirroring::MapperControlled)
    }
}

static MAPPERS: &[&(dyn Mapper + Sync)] = &[&Mmc5, &Vrc2a, &Vrc2b4f4e, &Vrc6a, &Mapper58];

/// Every supported board, in mapper number order
pub fn mappers() -> impl Iterator<Item = &'static dyn Mapper> {
    MAPPERS.iter().map(|&m| m as &'static dyn Mapper)
}

/// Look up a board by iNES mapper number
pub fn mapper_by_number(number: u16) -> Result<&'static dyn Mapper> {
    mappers()
        .find(|m| m.number() == number)
        .ok_or(Error::UnknownMapper(number))
}

/// Which bus a bank is read from, and where
#[derive(Debug, Clone, Copy)]
pub(crate) enum Window {
    Cpu(u16),
    Ppu(u16),
}

/// Read a memory in fixed-size banks, selecting each bank with `select`
pub(crate) fn read_banks(
    dumper: &mut dyn Dumper,
    what: &str,
    size: usize,
    bank_size: usize,
    window: Window,
    mut select: impl FnMut(&mut dyn Dumper, usize) -> Result<()>,
) -> Result<Vec<u8>> {
    if size % bank_size != 0 {
        return Err(Error::InvalidImage(format!(
            "{} size {} is not a multiple of {} bytes",
            what, size, bank_size
        )));
    }
    let banks = size / bank_size;
    let mut data = Vec::with_capacity(size);
    for bank in 0..banks {
        log::info!("Reading {} bank #{}/{}", what, bank, banks);
        select(&mut *dumper, bank)?;
        let chunk = match window {
            Window::Cpu(addr) => dumper.read_cpu(addr, bank_size)?,
            Window::Ppu(addr) => dumper.read_ppu(addr, bank_size)?,
        };
        data.extend_from_slice(&chunk);
    }
    Ok(data)
}

/// A dumped cartridge
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NesImage {
    /// iNES mapper number
    pub mapper: u16,
    /// PRG memory
    pub prg: Vec<u8>,
    /// CHR memory
    pub chr: Vec<u8>,
    /// Nametable mirroring
    pub mirroring: Mirroring,
    /// Battery-backed PRG RAM present
    pub battery: bool,
}

impl NesImage {
    /// Encode as iNES 1.0
    pub fn to_ines(&self) -> Result<Vec<u8>> {
        let prg_units = self.prg.len().div_ceil(INES_PRG_UNIT);
        let chr_units = self.chr.len().div_ceil(INES_CHR_UNIT);
        if prg_units > u8::MAX as usize || chr_units > u8::MAX as usize || self.mapper > 0xFF {
            return Err(Error::InvalidImage(
                "image does not fit in an iNES 1.0 header".into(),
            ));
        }

        let mut flags6 = ((self.mapper as u8) & 0x0F) << 4;
        match self.mirroring {
            Mirroring::Vertical => flags6 |= 0x01,
            Mirroring::FourScreen => flags6 |= 0x08,
            Mirroring::Horizontal | Mirroring::MapperControlled => {}
        }
        if self.battery {
            flags6 |= 0x02;
        }
        let flags7 = (self.mapper as u8) & 0xF0;

        let mut out = Vec::with_capacity(INES_HEADER_SIZE + self.prg.len() + self.chr.len());
        out.extend_from_slice(INES_MAGIC);
        out.push(prg_units as u8);
        out.push(chr_units as u8);
        out.push(flags6);
        out.push(flags7);
        out.resize(INES_HEADER_SIZE, 0);
        out.extend_from_slice(&self.prg);
        out.resize(INES_HEADER_SIZE + prg_units * INES_PRG_UNIT, 0xFF);
        out.extend_from_slice(&self.chr);
        out.resize(
            INES_HEADER_SIZE + prg_units * INES_PRG_UNIT + chr_units * INES_CHR_UNIT,
            0xFF,
        );
        Ok(out)
    }
}

/// Read PRG and CHR from a cartridge
///
/// Sizes default to the board's defaults. The cartridge is reset first.
pub fn dump_cartridge(
    dumper: &mut dyn Dumper,
    mapper: &dyn Mapper,
    prg_size: Option<usize>,
    chr_size: Option<usize>,
    battery: bool,
) -> Result<NesImage> {
    let prg_size = prg_size.unwrap_or_else(|| mapper.default_prg_size());
    let chr_size = chr_size.unwrap_or_else(|| mapper.default_chr_size());
    log::info!(
        "Dumping {} (mapper {}): PRG {} KB, CHR {} KB",
        mapper.name(),
        mapper.number(),
        prg_size / 1024,
        chr_size / 1024
    );

    dumper.reset()?;
    let prg = if prg_size > 0 {
        mapper.dump_prg(dumper, prg_size)?
    } else {
        Vec::new()
    };
    let chr = if chr_size > 0 {
        mapper.dump_chr(dumper, chr_size)?
    } else {
        Vec::new()
    };
    let mirroring = mapper.mirroring(dumper)?;

    Ok(NesImage {
        mapper: mapper.number(),
        prg,
        chr,
        mirroring,
        battery,
    })
}

#[cfg(test)]
pub(crate) mod testing {
    use crate::dumper::Dumper;
    use crate::error::Result;
    use crate::fds::FdsBlock;
    use std::time::Duration;

    /// Bus access seen by the recording dumper
    #[derive(Debug, Clone, PartialEq, Eq)]
    pub enum Access {
        Reset,
        CpuWrite(u16, u8),
        CpuRead(u16, usize),
        PpuRead(u16, usize),
    }

    /// Records every bus access; reads return the number of accesses so far
    #[derive(Default)]
    pub struct RecordingDumper {
        pub log: Vec<Access>,
    }

    impl RecordingDumper {
        pub fn writes(&self) -> Vec<(u16, u8)> {
            self.log
                .iter()
                .filter_map(|a| match a {
                    Access::CpuWrite(addr, value) => Some((*addr, *value)),
                    _ => None,
                })
                .collect()
        }
    }

    impl Dumper for RecordingDumper {
        fn protocol_version(&self) -> u8 {
            3
        }
        fn max_write_packet_size(&self) -> usize {
            1024
        }
        fn max_read_packet_size(&self) -> usize {
            1024
        }
        fn timeout(&self) -> Duration {
            Duration::from_secs(1)
        }
        fn set_timeout(&mut self, _timeout: Duration) -> Result<()> {
            Ok(())
        }
        fn reset(&mut self) -> Result<()> {
            self.log.push(Access::Reset);
            Ok(())
        }
        fn write_cpu(&mut self, addr: u16, data: &[u8]) -> Result<()> {
            for (i, &value) in data.iter().enumerate() {
                self.log.push(Access::CpuWrite(addr + i as u16, value));
            }
            Ok(())
        }
        fn write_ppu(&mut self, _addr: u16, _data: &[u8]) -> Result<()> {
            Ok(())
        }
        fn read_cpu(&mut self, addr: u16, len: usize) -> Result<Vec<u8>> {
            self.log.push(Access::CpuRead(addr, len));
            Ok(vec![self.log.len() as u8; len])
        }
        fn read_ppu(&mut self, addr: u16, len: usize) -> Result<Vec<u8>> {
            self.log.push(Access::PpuRead(addr, len));
            Ok(vec![self.log.len() as u8; len])
        }
        fn erase_flash_sector(&mut self) -> Result<()> {
            Ok(())
        }
        fn write_flash(&mut self, _offset: u16, _data: &[u8]) -> Result<()> {
            Ok(())
        }
        fn read_cpu_crc(&mut self, _addr: u16, _len: usize) -> Result<u16> {
            Ok(0)
        }
        fn read_fds_blocks(&mut self, _start: u8, _count: u8) -> Result<Vec<FdsBlock>> {
            Ok(Vec::new())
        }
        fn read_fds_disk(&mut self) -> Result<Vec<FdsBlock>> {
            Ok(Vec::new())
        }
        fn write_fds_blocks(&mut self, _indices: &[u8], _blocks: &[FdsBlock]) -> Result<()> {
            Ok(())
        }
    }
}

#[cfg(test)]
mod tests {
    use super::testing::{Access, RecordingDumper};
    use super::*;

    #[test]
    fn test_registry_lookup() {
        assert_eq!(mapper_by_number(5).unwrap().name(), "MMC5");
        assert_eq!(mapper_by_number(22).unwrap().name(), "VRC2a");
        assert_eq!(mapper_by_number(23).unwrap().name(), "VRC2b/VRC4f/VRC4e");
        assert_eq!(mapper_by_number(24).unwrap().name(), "VRC6a");
        assert_eq!(mapper_by_number(58).unwrap().name(), "Mapper 58");
        assert!(matches!(mapper_by_number(4), Err(Error::UnknownMapper(4))));
    }

    #[test]
    fn test_registry_numbers_are_unique() {
        let mut numbers: Vec<u16> = mappers().map(|m| m.number()).collect();
        let len = numbers.len();
        numbers.dedup();
        assert_eq!(numbers.len(), len);
    }

    #[test]
    fn test_dump_cartridge_reads_prg_then_chr() {
        let mut dumper = RecordingDumper::default();
        let image = dump_cartridge(&mut dumper, &Mapper58, Some(0x8000), Some(0x2000), false)
            .unwrap();
        assert_eq!(image.prg.len(), 0x8000);
        assert_eq!(image.chr.len(), 0x2000);
        assert_eq!(dumper.log[0], Access::Reset);
        let last_prg = dumper
            .log
            .iter()
            .rposition(|a| matches!(a, Access::CpuRead(..)))
            .unwrap();
        let first_chr = dumper
            .log
            .iter()
            .position(|a| matches!(a, Access::PpuRead(..)))
            .unwrap();
        assert!(last_prg < first_chr);
    }

    #[test]
    fn test_ines_header() {
        let image = NesImage {
            mapper: 23,
            prg: vec![0; 0x8000],
            chr: vec![0; 0x2000],
            mirroring: Mirroring::Vertical,
            battery: true,
        };
        let rom = image.to_ines().unwrap();
        assert_eq!(&rom[..4], INES_MAGIC);
        assert_eq!(rom[4], 2);
        assert_eq!(rom[5], 1);
        assert_eq!(rom[6], 0x73);
        assert_eq!(rom[7], 0x10);
        assert_eq!(rom.len(), 16 + 0x8000 + 0x2000);
    }

    #[test]
    fn test_ines_pads_partial_units() {
        let image = NesImage {
            mapper: 5,
            prg: vec![0; 0x2000],
            chr: Vec::new(),
            mirroring: Mirroring::MapperControlled,
            battery: false,
        };
        let rom = image.to_ines().unwrap();
        assert_eq!(rom[4], 1);
        assert_eq!(rom[5], 0);
        assert_eq!(rom.len(), 16 + 0x4000);
        assert_eq!(rom[16 + 0x2000], 0xFF);
    }

    #[test]
    fn test_unsupported_prg_ram() {
        let mut dumper = RecordingDumper::default();
        assert!(matches!(
            Vrc2a.enable_prg_ram(&mut dumper),
            Err(Error::NotSupported(_))
        ));
    }

    #[test]
    fn test_size_must_be_whole_banks() {
        let mut dumper = RecordingDumper::default();
        assert!(matches!(
            Mapper58.dump_prg(&mut dumper, 0x5000),
            Err(Error::InvalidImage(_))
        ));
    }
}
