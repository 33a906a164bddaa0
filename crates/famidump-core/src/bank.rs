//! COOLBOY bank addressing
//!
//! The COOLBOY multicart controller selects its PRG window through four
//! register bytes with the bank number scattered across them. The same
//! encoding is used for detection, writing, verification and reading, so it
//! lives here and nowhere else.

use core::fmt;

/// Size of one PRG bank in bytes
pub const BANK_SIZE: usize = 0x4000;

/// Number of banks in one flash sector
pub const BANKS_PER_SECTOR: usize = 8;

/// Size of one flash sector (the erase unit) in bytes
pub const SECTOR_SIZE: usize = BANK_SIZE * BANKS_PER_SECTOR;

/// Highest bank number the register can address, plus one
pub const MAX_BANKS: usize = 2048;

/// CPU address of the PRG window
pub const PRG_WINDOW: u16 = 0x8000;

/// Byte 0: resets the 4th mask bit
const R0_MASK_RESET: u8 = 1 << 6;
/// Byte 1: resets the 5th mask bit
const R1_MASK_RESET: u8 = 1 << 7;
/// Byte 3: NROM mode
const R3_NROM_MODE: u8 = 1 << 4;

/// COOLBOY controller revision
///
/// Revisions differ only in where the bank register is mapped.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ControllerRevision {
    /// Register at `$6000`
    A,
    /// Register at `$5000`
    B,
}

impl ControllerRevision {
    /// CPU address of the bank register
    pub const fn register(self) -> u16 {
        match self {
            Self::A => 0x6000,
            Self::B => 0x5000,
        }
    }

    /// Version number shown to the user
    pub const fn number(self) -> u8 {
        match self {
            Self::A => 1,
            Self::B => 2,
        }
    }
}

impl fmt::Display for ControllerRevision {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} (register ${:04X})", self.number(), self.register())
    }
}

/// Register value selecting one 16KB PRG bank in NROM mode
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct BankSelector([u8; 4]);

impl BankSelector {
    /// Encode a bank number
    ///
    /// Only the low 11 bits of `bank` are addressable.
    pub const fn new(bank: usize) -> Self {
        let r0 = (((bank >> 3) & 0x07) // 5, 4, 3 bits
            | (((bank >> 9) & 0x03) << 4)) as u8 // 10, 9 bits
            | R0_MASK_RESET;
        let r1 = ((((bank >> 7) & 0x03) << 2) // 8, 7 bits
            | (((bank >> 6) & 1) << 4)) as u8 // 6 bit
            | R1_MASK_RESET;
        let r2 = 0;
        let r3 = R3_NROM_MODE | ((bank & 0x07) << 1) as u8; // 2, 1, 0 bits
        Self([r0, r1, r2, r3])
    }

    /// Register bytes in write order
    pub const fn bytes(&self) -> [u8; 4] {
        self.0
    }

    /// Recover the bank number from register bytes
    ///
    /// Returns `None` when the fixed mode bits are not set, i.e. the bytes
    /// were not produced by [`BankSelector::new`].
    pub fn decode(bytes: [u8; 4]) -> Option<usize> {
        let [r0, r1, _, r3] = bytes;
        if r0 & R0_MASK_RESET == 0 || r1 & R1_MASK_RESET == 0 || r3 & R3_NROM_MODE == 0 {
            return None;
        }
        let bank = ((r3 as usize >> 1) & 0x07)
            | ((r0 as usize & 0x07) << 3)
            | (((r1 as usize >> 4) & 1) << 6)
            | (((r1 as usize >> 2) & 0x03) << 7)
            | (((r0 as usize >> 4) & 0x03) << 9);
        Some(bank)
    }

    /// Write this selection through the revision's register
    pub fn select<D: crate::dumper::Dumper + ?Sized>(
        &self,
        dumper: &mut D,
        revision: ControllerRevision,
    ) -> crate::Result<()> {
        dumper.write_cpu(revision.register(), &self.0)
    }
}

/// Sector index containing a bank
pub const fn sector_of(bank: usize) -> usize {
    bank / BANKS_PER_SECTOR
}

/// First bank of a sector
pub const fn first_bank_of(sector: usize) -> usize {
    sector * BANKS_PER_SECTOR
}
