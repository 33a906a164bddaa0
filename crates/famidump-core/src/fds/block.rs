//! FDS block model
//!
//! A disk side is a chain of blocks: disk info, file amount, then a header
//! and a data block per file. Each block starts with its block code. The
//! dumper reports two flags with every block it reads: whether the block was
//! structurally readable and whether its on-disk CRC matched.

use core::fmt;

/// Block code of the disk info block
pub const DISK_INFO_CODE: u8 = 0x01;
/// Block code of the file amount block
pub const FILE_AMOUNT_CODE: u8 = 0x02;
/// Block code of a file header block
pub const FILE_HEADER_CODE: u8 = 0x03;
/// Block code of a file data block
pub const FILE_DATA_CODE: u8 = 0x04;

/// Encoded length of the disk info block, code included
pub const DISK_INFO_LEN: usize = 56;
/// Encoded length of the file amount block, code included
pub const FILE_AMOUNT_LEN: usize = 2;
/// Encoded length of a file header block, code included
pub const FILE_HEADER_LEN: usize = 16;

/// Verification string at the start of every disk info block
const DISK_VERIFICATION: &[u8; 14] = b"*NINTENDO-HVC*";

/// Block code expected at a position of the chain
pub const fn expected_code(index: usize) -> u8 {
    match index {
        0 => DISK_INFO_CODE,
        1 => FILE_AMOUNT_CODE,
        n if n % 2 == 0 => FILE_HEADER_CODE,
        _ => FILE_DATA_CODE,
    }
}

/// Human-readable name of the block kind expected at a position
pub const fn kind_name_at(index: usize) -> &'static str {
    match expected_code(index) {
        DISK_INFO_CODE => "disk info",
        FILE_AMOUNT_CODE => "file amount",
        FILE_HEADER_CODE => "file header",
        _ => "file data",
    }
}

fn bcd(value: u8) -> u8 {
    (value >> 4) * 10 + (value & 0x0F)
}

fn to_bcd(value: u8) -> u8 {
    ((value / 10) << 4) | (value % 10)
}

fn ascii(bytes: &[u8]) -> String {
    bytes
        .iter()
        .map(|&b| if b.is_ascii_graphic() || b == b' ' { b as char } else { '?' })
        .collect()
}

/// Date stored as Showa-era BCD
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct FdsDate {
    /// Gregorian year
    pub year: u16,
    /// Month 1-12
    pub month: u8,
    /// Day 1-31
    pub day: u8,
}

impl FdsDate {
    fn from_bcd(raw: &[u8]) -> Self {
        Self {
            year: 1925 + bcd(raw[0]) as u16,
            month: bcd(raw[1]),
            day: bcd(raw[2]),
        }
    }

    fn to_bcd(self) -> [u8; 3] {
        [
            to_bcd(self.year.saturating_sub(1925).min(99) as u8),
            to_bcd(self.month),
            to_bcd(self.day),
        ]
    }
}

impl fmt::Display for FdsDate {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{:04}.{:02}.{:02}", self.year, self.month, self.day)
    }
}

/// The disk info block (block 0 of every side)
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DiskInfo {
    raw: [u8; DISK_INFO_LEN],
}

impl DiskInfo {
    /// Build a disk info block for a new disk side
    pub fn new(game_name: &str, disk_number: u8, disk_side: u8) -> Self {
        let mut raw = [0u8; DISK_INFO_LEN];
        raw[0] = DISK_INFO_CODE;
        raw[1..15].copy_from_slice(DISK_VERIFICATION);
        let mut name = [b' '; 3];
        for (dst, src) in name.iter_mut().zip(game_name.bytes()) {
            *dst = src;
        }
        raw[16..19].copy_from_slice(&name);
        raw[19] = b' ';
        raw[21] = disk_side;
        raw[22] = disk_number;
        raw[26..31].fill(0xFF);
        raw[31..34].copy_from_slice(&[0x61, 0x01, 0x01]);
        raw[34] = 0x49;
        raw[44..47].copy_from_slice(&[0x61, 0x01, 0x01]);
        raw[53] = disk_side;
        Self { raw }
    }

    /// Wrap raw block bytes (block code included)
    pub fn from_raw(raw: [u8; DISK_INFO_LEN]) -> Self {
        Self { raw }
    }

    /// Raw block bytes (block code included)
    pub fn raw(&self) -> &[u8; DISK_INFO_LEN] {
        &self.raw
    }

    /// Whether the block code and verification string are right
    pub fn is_well_formed(&self) -> bool {
        self.raw[0] == DISK_INFO_CODE && &self.raw[1..15] == DISK_VERIFICATION
    }

    /// Licensee code
    pub fn manufacturer_code(&self) -> u8 {
        self.raw[15]
    }

    /// Three-letter game code
    pub fn game_name(&self) -> String {
        ascii(&self.raw[16..19])
    }

    /// Game type character
    pub fn game_type(&self) -> char {
        self.raw[19] as char
    }

    /// Game version
    pub fn game_version(&self) -> u8 {
        self.raw[20]
    }

    /// Side number (0 = A, 1 = B)
    pub fn disk_side(&self) -> u8 {
        self.raw[21]
    }

    /// Disk number
    pub fn disk_number(&self) -> u8 {
        self.raw[22]
    }

    /// Disk type
    pub fn disk_type(&self) -> u8 {
        self.raw[23]
    }

    /// Files with an ID up to this value are loaded at boot
    pub fn boot_file(&self) -> u8 {
        self.raw[25]
    }

    /// Manufacturing date
    pub fn manufacturing_date(&self) -> FdsDate {
        FdsDate::from_bcd(&self.raw[31..34])
    }

    /// Set the manufacturing date
    pub fn set_manufacturing_date(&mut self, date: FdsDate) {
        self.raw[31..34].copy_from_slice(&date.to_bcd());
    }

    /// Country code
    pub fn country_code(&self) -> u8 {
        self.raw[34]
    }

    /// Date the disk was last rewritten
    pub fn rewritten_date(&self) -> FdsDate {
        FdsDate::from_bcd(&self.raw[44..47])
    }

    /// Serial number of the disk writer kiosk
    pub fn writer_serial(&self) -> u16 {
        u16::from_be_bytes([self.raw[49], self.raw[50]])
    }

    /// Number of times the disk was rewritten
    pub fn rewrite_count(&self) -> u8 {
        bcd(self.raw[52])
    }

    /// Side as physically stamped on the disk
    pub fn actual_disk_side(&self) -> u8 {
        self.raw[53]
    }

    /// Price code
    pub fn price(&self) -> u8 {
        self.raw[55]
    }
}

impl fmt::Display for DiskInfo {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        writeln!(f, "Disk info block:")?;
        writeln!(f, " Game name: {}", self.game_name())?;
        writeln!(f, " Manufacturer code: ${:02X}", self.manufacturer_code())?;
        let game_type = match self.game_type() {
            ' ' => "normal disk".to_string(),
            'E' => "event".to_string(),
            'R' => "reduction in price".to_string(),
            other => other.to_string(),
        };
        writeln!(f, " Game type: {}", game_type)?;
        writeln!(f, " Game version: {}", self.game_version())?;
        writeln!(f, " Disk number: {}", self.disk_number())?;
        writeln!(f, " Disk side: {}", self.disk_side())?;
        if self.actual_disk_side() <= 1 {
            writeln!(f, " Actual disk side: {}", self.actual_disk_side())?;
        } else {
            writeln!(f, " Actual disk side: ${:02X}", self.actual_disk_side())?;
        }
        writeln!(f, " Disk type: {}", self.disk_type())?;
        writeln!(f, " Boot file ID: ${:02X}", self.boot_file())?;
        writeln!(f, " Manufacturing date: {}", self.manufacturing_date())?;
        match self.country_code() {
            0x49 => writeln!(f, " Country code: Japan")?,
            code => writeln!(f, " Country code: ${:02X}", code)?,
        }
        let rewritten = self.rewritten_date();
        if rewritten.year > 1925 && rewritten != self.manufacturing_date() {
            writeln!(f, " Rewritten date: {}", rewritten)?;
        }
        writeln!(f, " Disk writer serial number: ${:04X}", self.writer_serial())?;
        writeln!(f, " Disk rewrite count: {}", self.rewrite_count())?;
        write!(f, " Price code: ${:02X}", self.price())
    }
}

/// What a file holds
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FileKind {
    /// CPU memory
    Program,
    /// Pattern tables
    Character,
    /// Name tables
    NameTable,
    /// Anything else
    Other(u8),
}

impl From<u8> for FileKind {
    fn from(value: u8) -> Self {
        match value {
            0 => Self::Program,
            1 => Self::Character,
            2 => Self::NameTable,
            other => Self::Other(other),
        }
    }
}

impl From<FileKind> for u8 {
    fn from(kind: FileKind) -> Self {
        match kind {
            FileKind::Program => 0,
            FileKind::Character => 1,
            FileKind::NameTable => 2,
            FileKind::Other(other) => other,
        }
    }
}

/// A file header block
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FileHeader {
    raw: [u8; FILE_HEADER_LEN],
}

impl FileHeader {
    /// Build a header
    pub fn new(
        number: u8,
        indicate_code: u8,
        name: &str,
        address: u16,
        size: u16,
        kind: FileKind,
    ) -> Self {
        let mut raw = [0u8; FILE_HEADER_LEN];
        raw[0] = FILE_HEADER_CODE;
        raw[1] = number;
        raw[2] = indicate_code;
        let mut padded = [b' '; 8];
        for (dst, src) in padded.iter_mut().zip(name.bytes()) {
            *dst = src;
        }
        raw[3..11].copy_from_slice(&padded);
        raw[11..13].copy_from_slice(&address.to_le_bytes());
        raw[13..15].copy_from_slice(&size.to_le_bytes());
        raw[15] = kind.into();
        Self { raw }
    }

    /// Wrap raw block bytes (block code included)
    pub fn from_raw(raw: [u8; FILE_HEADER_LEN]) -> Self {
        Self { raw }
    }

    /// Raw block bytes (block code included)
    pub fn raw(&self) -> &[u8; FILE_HEADER_LEN] {
        &self.raw
    }

    /// File number
    pub fn number(&self) -> u8 {
        self.raw[1]
    }

    /// File indicate code (ID used by the boot loader)
    pub fn indicate_code(&self) -> u8 {
        self.raw[2]
    }

    /// File name
    pub fn name(&self) -> String {
        ascii(&self.raw[3..11])
    }

    /// Load address
    pub fn address(&self) -> u16 {
        u16::from_le_bytes([self.raw[11], self.raw[12]])
    }

    /// Size of the file data
    pub fn size(&self) -> u16 {
        u16::from_le_bytes([self.raw[13], self.raw[14]])
    }

    /// Destination kind
    pub fn kind(&self) -> FileKind {
        FileKind::from(self.raw[15])
    }
}

impl fmt::Display for FileHeader {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        writeln!(f, " File name: {}", self.name())?;
        writeln!(f, " File indicate code: ${:02X}", self.indicate_code())?;
        writeln!(f, " File kind: {:?}", self.kind())?;
        writeln!(f, " File destination address: ${:04X}", self.address())?;
        write!(f, " File size: {} bytes (${:04X})", self.size(), self.size())
    }
}

/// Payload of an FDS block
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum FdsBlockKind {
    /// Block 0
    DiskInfo(DiskInfo),
    /// Block 1: number of non-hidden files
    FileAmount(u8),
    /// File header
    FileHeader(FileHeader),
    /// File contents
    FileData(Vec<u8>),
    /// Block with an unexpected code
    Unknown {
        /// Block code
        code: u8,
        /// Bytes after the code
        data: Vec<u8>,
    },
}

/// One block of a disk side
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FdsBlock {
    /// Decoded payload
    pub kind: FdsBlockKind,
    /// Structurally well formed
    pub valid: bool,
    /// On-disk CRC matched
    pub crc_ok: bool,
    /// The drive reached the end of the disk head after this block
    pub end_of_head: bool,
}

impl FdsBlock {
    /// Wrap a payload; validity follows from its structure
    pub fn new(kind: FdsBlockKind) -> Self {
        let valid = match &kind {
            FdsBlockKind::DiskInfo(info) => info.is_well_formed(),
            FdsBlockKind::FileHeader(header) => header.raw[0] == FILE_HEADER_CODE,
            FdsBlockKind::FileAmount(_) | FdsBlockKind::FileData(_) => true,
            FdsBlockKind::Unknown { .. } => false,
        };
        Self {
            kind,
            valid,
            crc_ok: true,
            end_of_head: false,
        }
    }

    /// Disk info block
    pub fn disk_info(info: DiskInfo) -> Self {
        Self::new(FdsBlockKind::DiskInfo(info))
    }

    /// File amount block
    pub fn file_amount(count: u8) -> Self {
        Self::new(FdsBlockKind::FileAmount(count))
    }

    /// File header block
    pub fn file_header(header: FileHeader) -> Self {
        Self::new(FdsBlockKind::FileHeader(header))
    }

    /// File data block
    pub fn file_data(data: Vec<u8>) -> Self {
        Self::new(FdsBlockKind::FileData(data))
    }

    /// Decode raw block bytes (block code included)
    ///
    /// Never fails: anything that does not decode becomes an invalid
    /// `Unknown` block.
    pub fn from_bytes(raw: &[u8]) -> Self {
        let Some((&code, rest)) = raw.split_first() else {
            return Self::new(FdsBlockKind::Unknown {
                code: 0,
                data: Vec::new(),
            });
        };
        let unknown = || {
            Self::new(FdsBlockKind::Unknown {
                code,
                data: rest.to_vec(),
            })
        };
        match code {
            DISK_INFO_CODE => match <[u8; DISK_INFO_LEN]>::try_from(raw) {
                Ok(raw) => Self::disk_info(DiskInfo::from_raw(raw)),
                Err(_) => unknown(),
            },
            FILE_AMOUNT_CODE if raw.len() == FILE_AMOUNT_LEN => Self::file_amount(rest[0]),
            FILE_HEADER_CODE => match <[u8; FILE_HEADER_LEN]>::try_from(raw) {
                Ok(raw) => Self::file_header(FileHeader::from_raw(raw)),
                Err(_) => unknown(),
            },
            FILE_DATA_CODE => Self::file_data(rest.to_vec()),
            _ => unknown(),
        }
    }

    /// Block code
    pub fn code(&self) -> u8 {
        match &self.kind {
            FdsBlockKind::DiskInfo(_) => DISK_INFO_CODE,
            FdsBlockKind::FileAmount(_) => FILE_AMOUNT_CODE,
            FdsBlockKind::FileHeader(_) => FILE_HEADER_CODE,
            FdsBlockKind::FileData(_) => FILE_DATA_CODE,
            FdsBlockKind::Unknown { code, .. } => *code,
        }
    }

    /// Raw block bytes (block code included)
    pub fn to_bytes(&self) -> Vec<u8> {
        match &self.kind {
            FdsBlockKind::DiskInfo(info) => info.raw.to_vec(),
            FdsBlockKind::FileAmount(count) => vec![FILE_AMOUNT_CODE, *count],
            FdsBlockKind::FileHeader(header) => header.raw.to_vec(),
            FdsBlockKind::FileData(data) | FdsBlockKind::Unknown { data, .. } => {
                let mut raw = Vec::with_capacity(data.len() + 1);
                raw.push(self.code());
                raw.extend_from_slice(data);
                raw
            }
        }
    }

    /// Length of the raw block (block code included)
    pub fn encoded_len(&self) -> usize {
        match &self.kind {
            FdsBlockKind::DiskInfo(_) => DISK_INFO_LEN,
            FdsBlockKind::FileAmount(_) => FILE_AMOUNT_LEN,
            FdsBlockKind::FileHeader(_) => FILE_HEADER_LEN,
            FdsBlockKind::FileData(data) | FdsBlockKind::Unknown { data, .. } => data.len() + 1,
        }
    }

    /// Valid and CRC-correct
    pub fn is_good(&self) -> bool {
        self.valid && self.crc_ok
    }

    /// Number of declared files, for file amount blocks
    pub fn file_count(&self) -> Option<usize> {
        match self.kind {
            FdsBlockKind::FileAmount(count) => Some(count as usize),
            _ => None,
        }
    }

    /// Mark the block as read with a bad CRC
    pub fn with_bad_crc(mut self) -> Self {
        self.crc_ok = false;
        self
    }

    /// Mark the block as structurally unreadable
    pub fn with_invalid(mut self) -> Self {
        self.valid = false;
        self
    }

    /// Mark the block as the last one before the end of the head
    pub fn with_end_of_head(mut self) -> Self {
        self.end_of_head = true;
        self
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_expected_codes() {
        assert_eq!(expected_code(0), DISK_INFO_CODE);
        assert_eq!(expected_code(1), FILE_AMOUNT_CODE);
        assert_eq!(expected_code(2), FILE_HEADER_CODE);
        assert_eq!(expected_code(3), FILE_DATA_CODE);
        assert_eq!(expected_code(10), FILE_HEADER_CODE);
        assert_eq!(expected_code(11), FILE_DATA_CODE);
        assert_eq!(kind_name_at(1), "file amount");
    }

    #[test]
    fn test_disk_info_fields() {
        let mut info = DiskInfo::new("ZEL", 0, 1);
        info.set_manufacturing_date(FdsDate {
            year: 1986,
            month: 2,
            day: 21,
        });
        assert!(info.is_well_formed());
        assert_eq!(info.game_name(), "ZEL");
        assert_eq!(info.disk_side(), 1);
        assert_eq!(info.manufacturing_date().to_string(), "1986.02.21");
        assert_eq!(info.country_code(), 0x49);
        let text = info.to_string();
        assert!(text.contains("Game name: ZEL"));
        assert!(text.contains("Country code: Japan"));

        let mut raw = *info.raw();
        raw[25] = 0x0F;
        let info = DiskInfo::from_raw(raw);
        assert_eq!(info.boot_file(), 0x0F);
        assert!(info.to_string().contains("Boot file ID: $0F"));
    }

    #[test]
    fn test_file_header_fields() {
        let header = FileHeader::new(0, 0x0F, "KYODAKU-", 0x2800, 0x00E0, FileKind::NameTable);
        assert_eq!(header.name(), "KYODAKU-");
        assert_eq!(header.address(), 0x2800);
        assert_eq!(header.size(), 0x00E0);
        assert_eq!(header.kind(), FileKind::NameTable);
        assert!(header.to_string().contains("File size: 224 bytes ($00E0)"));
    }

    #[test]
    fn test_from_bytes_recognises_each_kind() {
        let info = FdsBlock::disk_info(DiskInfo::new("ABC", 0, 0));
        assert_eq!(FdsBlock::from_bytes(&info.to_bytes()), info);

        let amount = FdsBlock::from_bytes(&[FILE_AMOUNT_CODE, 3]);
        assert_eq!(amount.file_count(), Some(3));

        let data = FdsBlock::from_bytes(&[FILE_DATA_CODE, 1, 2, 3]);
        assert_eq!(data.encoded_len(), 4);
        assert_eq!(data.kind, FdsBlockKind::FileData(vec![1, 2, 3]));
    }

    #[test]
    fn test_from_bytes_rejects_garbage() {
        assert!(!FdsBlock::from_bytes(&[]).valid);
        assert!(!FdsBlock::from_bytes(&[0x07, 1, 2]).valid);
        assert!(!FdsBlock::from_bytes(&[DISK_INFO_CODE, 0, 0]).valid);

        let mut raw = *DiskInfo::new("ABC", 0, 0).raw();
        raw[3] = b'X';
        assert!(!FdsBlock::from_bytes(&raw).valid);
    }
}
