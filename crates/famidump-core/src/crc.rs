//! CRC-16/ARC as computed by the dumper firmware
//!
//! Polynomial 0xA001 (reflected 0x8005), initial value 0, no final XOR.
//! The host computes it over image windows and compares it against the value
//! the dumper reports for the same window of flash.

use crc::{Crc, CRC_16_ARC};

/// CRC-16/ARC algorithm
const CRC16: Crc<u16> = Crc::<u16>::new(&CRC_16_ARC);

/// Calculate CRC-16/ARC of data
pub fn crc16(data: &[u8]) -> u16 {
    CRC16.checksum(data)
}
