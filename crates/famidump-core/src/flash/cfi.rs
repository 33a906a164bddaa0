//! NOR flash command sequences
//!
//! The cartridge flash is an AMD-command-set parallel NOR chip in byte mode
//! behind the `$8000` window. Everything here is plain CPU bus writes and
//! reads; the currently selected bank decides which sector a sector-scoped
//! command hits.

use crate::dumper::{read_cpu_byte, write_cpu_byte, Dumper};
use crate::error::{Error, Result};

/// First unlock address (0xAAA in byte mode)
const UNLOCK1: u16 = 0x8AAA;
/// Second unlock address (0x555 in byte mode)
const UNLOCK2: u16 = 0x8555;
/// Start of the flash window
const BASE: u16 = 0x8000;

/// Reset / read-array command
const CMD_RESET: u8 = 0xF0;
/// CFI query command
const CMD_CFI_QUERY: u8 = 0x98;
/// PPB command set entry
const CMD_PPB_ENTRY: u8 = 0xC0;
/// PPB program
const CMD_PPB_PROGRAM: u8 = 0xA0;
/// PPB erase setup
const CMD_PPB_ERASE_SETUP: u8 = 0x80;
/// PPB erase confirm
const CMD_PPB_ERASE: u8 = 0x30;
/// Command set exit, first cycle
const CMD_SET_EXIT: u8 = 0x90;

/// Bytes of CFI table read back (byte mode doubles every address)
const CFI_TABLE_LEN: usize = 0x100;

/// Largest device size exponent accepted (2 GB)
const MAX_SIZE_EXPONENT: u16 = 31;
/// Largest multi-byte program exponent accepted (64 KB)
const MAX_MULTI_EXPONENT: u16 = 16;

/// Toggle bit polls before giving up
const POLL_LIMIT: usize = 1000;

/// DQ6 toggles while an embedded algorithm runs
const DQ6_TOGGLE: u8 = 1 << 6;

/// One uniform erase block region from the CFI table
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct EraseRegion {
    /// Number of blocks in the region
    pub count: usize,
    /// Size of each block in bytes
    pub size: usize,
}

/// Flash geometry reported by the chip
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FlashInfo {
    /// Primary vendor command set ID
    pub command_set: u16,
    /// Total size in bytes
    pub device_size: usize,
    /// Maximum number of bytes in one multi-byte program command
    pub max_multi_program: usize,
    /// Erase block regions
    pub erase_regions: Vec<EraseRegion>,
}

impl FlashInfo {
    /// Decode a byte-mode CFI query table as read from `$8000`
    pub fn parse(table: &[u8]) -> Result<Self> {
        // byte mode: CFI word address n lives at byte 2n
        let at = |addr: usize| table.get(addr * 2).copied().unwrap_or(0);

        if at(0x10) != b'Q' || at(0x11) != b'R' || at(0x12) != b'Y' {
            return Err(Error::CfiNotFound);
        }

        let command_set = u16::from_le_bytes([at(0x13), at(0x14)]);
        let device_size = power_of_two(at(0x27).into(), MAX_SIZE_EXPONENT, "device size")?;
        let multi = u16::from_le_bytes([at(0x2A), at(0x2B)]);
        let max_multi_program =
            power_of_two(multi, MAX_MULTI_EXPONENT, "multi-byte program size")?;

        let region_count = at(0x2C) as usize;
        let erase_regions = (0..region_count)
            .map(|i| {
                let base = 0x2D + i * 4;
                let count = u16::from_le_bytes([at(base), at(base + 1)]) as usize + 1;
                let size = u16::from_le_bytes([at(base + 2), at(base + 3)]) as usize * 256;
                EraseRegion { count, size }
            })
            .collect();

        Ok(Self {
            command_set,
            device_size,
            max_multi_program,
            erase_regions,
        })
    }
}

/// `2^exponent`, rejecting exponents no real chip reports
fn power_of_two(exponent: u16, max: u16, what: &str) -> Result<usize> {
    if exponent > max {
        return Err(Error::InvalidResponse(format!(
            "CFI {} exponent {} is out of range",
            what, exponent
        )));
    }
    1usize
        .checked_shl(exponent.into())
        .ok_or_else(|| Error::InvalidResponse(format!("CFI {} does not fit", what)))
}

/// Return the chip to read-array mode
pub fn reset_flash<D: Dumper + ?Sized>(dumper: &mut D) -> Result<()> {
    write_cpu_byte(dumper, BASE, CMD_RESET)
}

/// Query the CFI table and decode it
///
/// Leaves the chip in read-array mode.
pub fn query_cfi<D: Dumper + ?Sized>(dumper: &mut D) -> Result<FlashInfo> {
    write_cpu_byte(dumper, UNLOCK1, CMD_CFI_QUERY)?;
    let table = dumper.read_cpu(BASE, CFI_TABLE_LEN);
    reset_flash(dumper)?;
    let info = FlashInfo::parse(&table?)?;
    log::debug!(
        "CFI: command set 0x{:04X}, {} bytes, {} byte program buffer, {} erase region(s)",
        info.command_set,
        info.device_size,
        info.max_multi_program,
        info.erase_regions.len()
    );
    Ok(info)
}

fn unlock<D: Dumper + ?Sized>(dumper: &mut D) -> Result<()> {
    write_cpu_byte(dumper, UNLOCK1, 0xAA)?;
    write_cpu_byte(dumper, UNLOCK2, 0x55)
}

fn enter_ppb<D: Dumper + ?Sized>(dumper: &mut D) -> Result<()> {
    unlock(dumper)?;
    write_cpu_byte(dumper, UNLOCK1, CMD_PPB_ENTRY)
}

fn exit_command_set<D: Dumper + ?Sized>(dumper: &mut D) -> Result<()> {
    write_cpu_byte(dumper, BASE, CMD_SET_EXIT)?;
    write_cpu_byte(dumper, BASE, 0x00)
}

/// Wait until DQ6 stops toggling
fn wait_ready<D: Dumper + ?Sized>(dumper: &mut D, operation: &str) -> Result<()> {
    let mut last = read_cpu_byte(dumper, BASE)?;
    for _ in 0..POLL_LIMIT {
        let current = read_cpu_byte(dumper, BASE)?;
        if (current ^ last) & DQ6_TOGGLE == 0 {
            return Ok(());
        }
        last = current;
    }
    Err(Error::FlashOperation(format!("{} timed out", operation)))
}

/// Runs `body` inside the PPB command set, always leaving it afterwards
fn with_ppb<D: Dumper + ?Sized, T>(
    dumper: &mut D,
    body: impl FnOnce(&mut D) -> Result<T>,
) -> Result<T> {
    enter_ppb(dumper)?;
    let result = body(dumper);
    let exit = exit_command_set(dumper);
    let value = result?;
    exit?;
    Ok(value)
}

/// Erase every persistent protection bit on the chip
pub fn ppb_clear<D: Dumper + ?Sized>(dumper: &mut D) -> Result<()> {
    with_ppb(dumper, |dumper| {
        write_cpu_byte(dumper, BASE, CMD_PPB_ERASE_SETUP)?;
        write_cpu_byte(dumper, BASE, CMD_PPB_ERASE)?;
        wait_ready(dumper, "PPB erase")
    })?;
    if ppb_status(dumper)? {
        return Err(Error::FlashOperation(
            "protection bits are still set after PPB erase".into(),
        ));
    }
    Ok(())
}

/// Set the persistent protection bit of the currently selected sector
pub fn ppb_set<D: Dumper + ?Sized>(dumper: &mut D) -> Result<()> {
    with_ppb(dumper, |dumper| {
        write_cpu_byte(dumper, BASE, CMD_PPB_PROGRAM)?;
        write_cpu_byte(dumper, BASE, 0x00)?;
        wait_ready(dumper, "PPB program")
    })?;
    if !ppb_status(dumper)? {
        return Err(Error::FlashOperation(
            "protection bit did not stick after PPB program".into(),
        ));
    }
    Ok(())
}

/// Whether the currently selected sector is protected by its PPB
pub fn ppb_status<D: Dumper + ?Sized>(dumper: &mut D) -> Result<bool> {
    with_ppb(dumper, |dumper| {
        // DQ0 = 0 means protected
        Ok(read_cpu_byte(dumper, BASE)? & 0x01 == 0)
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    fn cfi_table(size_log2: u8, multi_log2: u8) -> Vec<u8> {
        let mut table = vec![0u8; CFI_TABLE_LEN];
        let mut set = |addr: usize, value: u8| table[addr * 2] = value;
        set(0x10, b'Q');
        set(0x11, b'R');
        set(0x12, b'Y');
        set(0x13, 0x02);
        set(0x27, size_log2);
        set(0x2A, multi_log2);
        set(0x2C, 1);
        // 256 blocks of 128KB
        set(0x2D, 0xFF);
        set(0x2F, 0x00);
        set(0x30, 0x02);
        table
    }

    #[test]
    fn test_parse_cfi() {
        let info = FlashInfo::parse(&cfi_table(25, 6)).unwrap();
        assert_eq!(info.command_set, 0x0002);
        assert_eq!(info.device_size, 32 * 1024 * 1024);
        assert_eq!(info.max_multi_program, 64);
        assert_eq!(
            info.erase_regions,
            vec![EraseRegion {
                count: 256,
                size: 128 * 1024
            }]
        );
    }

    #[test]
    fn test_parse_cfi_without_signature() {
        let table = vec![0xFFu8; CFI_TABLE_LEN];
        assert!(matches!(FlashInfo::parse(&table), Err(Error::CfiNotFound)));
    }

    #[test]
    fn test_parse_cfi_short_table() {
        assert!(matches!(FlashInfo::parse(&[]), Err(Error::CfiNotFound)));
    }

    #[test]
    fn test_parse_cfi_rejects_huge_exponents() {
        assert!(matches!(
            FlashInfo::parse(&cfi_table(0xFF, 6)),
            Err(Error::InvalidResponse(_))
        ));
        assert!(matches!(
            FlashInfo::parse(&cfi_table(25, 0x40)),
            Err(Error::InvalidResponse(_))
        ));
        let info = FlashInfo::parse(&cfi_table(31, 16)).unwrap();
        assert_eq!(info.max_multi_program, 0x10000);
    }
}
