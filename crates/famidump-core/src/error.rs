//! Error types for famidump-core
//!
//! One error type covers transport failures, flash session failures and FDS
//! transfer failures so that both engines can propagate with `?` all the way
//! up to the CLI.

use core::fmt;
use thiserror::Error;

/// Why an FDS block was rejected
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BlockFault {
    /// The device returned no block at this position
    Missing,
    /// The block is structurally malformed or has the wrong block code
    Structure,
    /// The block checksum does not match its payload
    Crc,
}

impl fmt::Display for BlockFault {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Missing => write!(f, "missing"),
            Self::Structure => write!(f, "invalid"),
            Self::Crc => write!(f, "CRC mismatch"),
        }
    }
}

/// Core error type
#[derive(Debug, Error)]
pub enum Error {
    // Transport errors
    /// The device did not answer in time
    #[error("device communication timeout")]
    Timeout,

    /// The device link failed (disconnect, I/O error)
    #[error("transport error: {0}")]
    Transport(String),

    /// The device sent something we did not expect
    #[error("invalid response from device: {0}")]
    InvalidResponse(String),

    /// A flash command was rejected or did not complete
    #[error("flash operation failed: {0}")]
    FlashOperation(String),

    /// Device firmware is too old for the requested operation
    #[error("dumper protocol version {version} is too old, version {required} or newer is required")]
    UnsupportedProtocol {
        /// Reported protocol version
        version: u8,
        /// Minimum protocol version for the operation
        required: u8,
    },

    // Flash session errors
    /// The COOLBOY controller revision could not be determined
    #[error("can't detect COOLBOY version (read 0x{v6000:02X} via $6000, 0x{v5000:02X} via $5000)")]
    DetectionFailed {
        /// CHR byte read back after selecting bank 0 through $6000
        v6000: u8,
        /// CHR byte read back after selecting bank 0 through $5000
        v5000: u8,
    },

    /// The flash chip did not answer the CFI query
    #[error("CFI query failed: no QRY signature")]
    CfiNotFound,

    /// The image does not fit in the flash chip
    #[error("image is too big for this cartridge ({image} bytes, flash is {device} bytes)")]
    ImageTooLarge {
        /// Image size in bytes
        image: usize,
        /// Flash size in bytes
        device: usize,
    },

    /// The image can't be written as given
    #[error("invalid image: {0}")]
    InvalidImage(String),

    /// A sector failed too many consecutive times
    #[error("sector #{sector} failed {attempts} times in a row: {source}")]
    SectorFailed {
        /// Sector index
        sector: usize,
        /// Consecutive failures
        attempts: usize,
        /// The last failure
        source: Box<Error>,
    },

    /// The cartridge does not hold the image after the session
    #[error("cartridge is not written correctly (can't write sectors: {bad_sectors:?}, sectors with wrong CRC: {wrong_crc_sectors:?})")]
    Integrity {
        /// Sectors that could not be written
        bad_sectors: Vec<usize>,
        /// Sectors whose CRC differs from the image
        wrong_crc_sectors: Vec<usize>,
    },

    // FDS errors
    /// The RAM adapter did not respond
    #[error("RAM adapter IO error, is it connected?")]
    AdapterNotConnected,

    /// The RAM adapter reports low battery voltage
    #[error("battery voltage is low")]
    BatteryLow,

    /// A block before the hidden-file boundary was rejected
    #[error("{fault} {kind} block #{index}")]
    InvalidBlock {
        /// Block index within the disk side
        index: usize,
        /// Block kind expected at this position
        kind: &'static str,
        /// What was wrong with it
        fault: BlockFault,
    },

    /// The disk ended before the declared files were read
    #[error("only {received} of {declared} valid files received")]
    IncompleteDisk {
        /// Complete files received
        received: usize,
        /// Files declared by the file amount block
        declared: usize,
    },

    /// A single block does not fit in one transfer
    #[error("dumper has not enough memory to write block #{block} ({size} bytes, budget {budget} bytes)")]
    InsufficientDeviceMemory {
        /// Block index within the disk side
        block: usize,
        /// Framed size of the block
        size: usize,
        /// Device write packet budget
        budget: usize,
    },

    /// The FDS image or disk layout is malformed
    #[error("invalid FDS image: {0}")]
    InvalidFdsImage(String),

    // Operator and mapper errors
    /// The operation was cancelled while waiting for the operator
    #[error("operation cancelled")]
    Cancelled,

    /// No mapper implementation for this number
    #[error("unknown mapper {0}")]
    UnknownMapper(u16),

    /// The mapper or device does not support this operation
    #[error("{0}")]
    NotSupported(&'static str),
}

impl Error {
    /// Whether this error came from the device link itself
    pub fn is_transport(&self) -> bool {
        matches!(
            self,
            Self::Timeout | Self::Transport(_) | Self::InvalidResponse(_)
        )
    }
}

impl From<std::io::Error> for Error {
    fn from(e: std::io::Error) -> Self {
        if e.kind() == std::io::ErrorKind::TimedOut {
            Error::Timeout
        } else {
            Error::Transport(e.to_string())
        }
    }
}

/// Result type alias using the core Error type
pub type Result<T> = core::result::Result<T, Error>;
