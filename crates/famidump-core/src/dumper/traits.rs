//! Dumper trait definitions
//!
//! The dumper is a single request/response channel: every call below is one
//! round trip and no two may overlap. Implementations are synchronous.

use crate::error::Result;
use crate::fds::FdsBlock;
use std::time::Duration;

/// Packet size reported by dumpers that accept transfers of any length
pub const UNLIMITED_PACKET_SIZE: usize = u16::MAX as usize;

/// Dumper trait
///
/// This trait represents a connected dumper that can drive the CPU and PPU
/// buses of the cartridge slot, program NOR flash through the currently
/// selected bank, and talk to the FDS RAM adapter.
///
/// ## Flash programming
///
/// `erase_flash_sector()` and `write_flash()` act on the flash chip behind
/// the CPU window at `$8000`, so the caller must select the target bank
/// through the cartridge's bank register first. `write_flash()` takes an
/// offset within that window.
///
/// ## Example
///
/// ```ignore
/// fn read_first_prg_bank<D: Dumper + ?Sized>(dumper: &mut D) -> Result<Vec<u8>> {
///     dumper.reset()?;
///     dumper.read_cpu(0x8000, 0x4000)
/// }
/// ```
pub trait Dumper {
    /// Protocol version reported by the dumper firmware
    fn protocol_version(&self) -> u8;

    /// Maximum number of bytes the dumper accepts in one write packet
    fn max_write_packet_size(&self) -> usize;

    /// Maximum number of bytes the dumper returns in one read packet
    ///
    /// [`UNLIMITED_PACKET_SIZE`] means reads are not constrained.
    fn max_read_packet_size(&self) -> usize;

    /// Current communication timeout
    fn timeout(&self) -> Duration;

    /// Change the communication timeout
    fn set_timeout(&mut self, timeout: Duration) -> Result<()>;

    /// Reset the cartridge (pulse M2 low, mappers return to power-on state)
    fn reset(&mut self) -> Result<()>;

    /// Write bytes to consecutive CPU bus addresses
    fn write_cpu(&mut self, addr: u16, data: &[u8]) -> Result<()>;

    /// Write bytes to consecutive PPU bus addresses
    fn write_ppu(&mut self, addr: u16, data: &[u8]) -> Result<()>;

    /// Read bytes from consecutive CPU bus addresses
    fn read_cpu(&mut self, addr: u16, len: usize) -> Result<Vec<u8>>;

    /// Read bytes from consecutive PPU bus addresses
    fn read_ppu(&mut self, addr: u16, len: usize) -> Result<Vec<u8>>;

    /// Erase the flash sector behind the currently selected bank
    fn erase_flash_sector(&mut self) -> Result<()>;

    /// Program bytes into flash at an offset within the `$8000` window
    fn write_flash(&mut self, offset: u16, data: &[u8]) -> Result<()>;

    /// Compute the CRC-16/ARC of a CPU bus range on the dumper side
    fn read_cpu_crc(&mut self, addr: u16, len: usize) -> Result<u16>;

    /// Tell the dumper how many bytes the flash accepts in one program command
    ///
    /// Only meaningful with protocol version 3 or newer.
    fn set_flash_buffer_size(&mut self, _size: usize) -> Result<()> {
        Ok(())
    }

    /// Read `count` FDS blocks starting at block index `start`
    ///
    /// The dumper stops early when it meets an unreadable block or the end
    /// of the disk head, so fewer blocks than requested may be returned.
    fn read_fds_blocks(&mut self, start: u8, count: u8) -> Result<Vec<FdsBlock>>;

    /// Read every block of the inserted disk side in one transfer
    fn read_fds_disk(&mut self) -> Result<Vec<FdsBlock>>;

    /// Write FDS blocks at the given block indices
    fn write_fds_blocks(&mut self, indices: &[u8], blocks: &[FdsBlock]) -> Result<()>;
}

// Blanket impl for boxed dumpers to allow trait objects
impl Dumper for Box<dyn Dumper + Send> {
    fn protocol_version(&self) -> u8 {
        (**self).protocol_version()
    }

    fn max_write_packet_size(&self) -> usize {
        (**self).max_write_packet_size()
    }

    fn max_read_packet_size(&self) -> usize {
        (**self).max_read_packet_size()
    }

    fn timeout(&self) -> Duration {
        (**self).timeout()
    }

    fn set_timeout(&mut self, timeout: Duration) -> Result<()> {
        (**self).set_timeout(timeout)
    }

    fn reset(&mut self) -> Result<()> {
        (**self).reset()
    }

    fn write_cpu(&mut self, addr: u16, data: &[u8]) -> Result<()> {
        (**self).write_cpu(addr, data)
    }

    fn write_ppu(&mut self, addr: u16, data: &[u8]) -> Result<()> {
        (**self).write_ppu(addr, data)
    }

    fn read_cpu(&mut self, addr: u16, len: usize) -> Result<Vec<u8>> {
        (**self).read_cpu(addr, len)
    }

    fn read_ppu(&mut self, addr: u16, len: usize) -> Result<Vec<u8>> {
        (**self).read_ppu(addr, len)
    }

    fn erase_flash_sector(&mut self) -> Result<()> {
        (**self).erase_flash_sector()
    }

    fn write_flash(&mut self, offset: u16, data: &[u8]) -> Result<()> {
        (**self).write_flash(offset, data)
    }

    fn read_cpu_crc(&mut self, addr: u16, len: usize) -> Result<u16> {
        (**self).read_cpu_crc(addr, len)
    }

    fn set_flash_buffer_size(&mut self, size: usize) -> Result<()> {
        (**self).set_flash_buffer_size(size)
    }

    fn read_fds_blocks(&mut self, start: u8, count: u8) -> Result<Vec<FdsBlock>> {
        (**self).read_fds_blocks(start, count)
    }

    fn read_fds_disk(&mut self) -> Result<Vec<FdsBlock>> {
        (**self).read_fds_disk()
    }

    fn write_fds_blocks(&mut self, indices: &[u8], blocks: &[FdsBlock]) -> Result<()> {
        (**self).write_fds_blocks(indices, blocks)
    }
}

/// Helper for the many single-byte register writes
pub fn write_cpu_byte<D: Dumper + ?Sized>(dumper: &mut D, addr: u16, value: u8) -> Result<()> {
    dumper.write_cpu(addr, &[value])
}

/// Helper for the many single-byte register reads
pub fn read_cpu_byte<D: Dumper + ?Sized>(dumper: &mut D, addr: u16) -> Result<u8> {
    let data = dumper.read_cpu(addr, 1)?;
    data.first().copied().ok_or_else(|| {
        crate::error::Error::InvalidResponse(format!("empty read at ${:04X}", addr))
    })
}

/// Information about a dumper backend
#[derive(Debug, Clone)]
pub struct DumperInfo {
    /// Name of the dumper
    pub name: &'static str,
    /// Alternative names/aliases
    pub aliases: &'static [&'static str],
    /// Description
    pub description: &'static str,
}
