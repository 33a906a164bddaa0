//! `.fds` disk images
//!
//! An image is a sequence of 65500-byte sides, optionally preceded by a
//! 16-byte header (`FDS\x1A`, side count, zero padding). Each side stores
//! its blocks back to back without CRCs or gaps and is zero padded.

use super::block::{
    DiskInfo, FdsBlock, FdsBlockKind, FileHeader, DISK_INFO_CODE, DISK_INFO_LEN, FILE_AMOUNT_CODE,
    FILE_AMOUNT_LEN, FILE_DATA_CODE, FILE_HEADER_CODE, FILE_HEADER_LEN,
};
use crate::error::{Error, Result};

/// Size of one side in an image
pub const SIDE_SIZE: usize = 65500;
/// Size of the optional image header
pub const HEADER_SIZE: usize = 16;
/// Image header magic
pub const HEADER_MAGIC: &[u8; 4] = b"FDS\x1A";

/// One side of a disk: disk info, file amount, then header/data pairs
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DiskSide {
    blocks: Vec<FdsBlock>,
}

impl DiskSide {
    /// Wrap a block chain, checking that it starts with disk info and file amount
    pub fn new(blocks: Vec<FdsBlock>) -> Result<Self> {
        match blocks.as_slice() {
            [first, second, ..]
                if matches!(first.kind, FdsBlockKind::DiskInfo(_))
                    && matches!(second.kind, FdsBlockKind::FileAmount(_)) =>
            {
                Ok(Self { blocks })
            }
            _ => Err(Error::InvalidFdsImage(
                "disk side must start with disk info and file amount blocks".into(),
            )),
        }
    }

    /// Every block of the side
    pub fn blocks(&self) -> &[FdsBlock] {
        &self.blocks
    }

    /// The disk info block
    pub fn disk_info(&self) -> Option<&DiskInfo> {
        match &self.blocks[0].kind {
            FdsBlockKind::DiskInfo(info) => Some(info),
            _ => None,
        }
    }

    /// Number of files declared by the file amount block
    pub fn file_amount(&self) -> usize {
        self.blocks[1].file_count().unwrap_or(0)
    }

    /// Headers of every stored file, hidden ones included
    pub fn file_headers(&self) -> impl Iterator<Item = &FileHeader> {
        self.blocks[2..].iter().filter_map(|block| match &block.kind {
            FdsBlockKind::FileHeader(header) => Some(header),
            _ => None,
        })
    }

    /// Files stored beyond the declared amount
    pub fn hidden_files(&self) -> usize {
        ((self.blocks.len() - 2) / 2).saturating_sub(self.file_amount())
    }

    fn encode(&self) -> Result<Vec<u8>> {
        let mut out = Vec::with_capacity(SIDE_SIZE);
        for block in &self.blocks {
            out.extend_from_slice(&block.to_bytes());
        }
        if out.len() > SIDE_SIZE {
            return Err(Error::InvalidFdsImage(format!(
                "disk side is {} bytes, a side holds at most {}",
                out.len(),
                SIDE_SIZE
            )));
        }
        out.resize(SIDE_SIZE, 0);
        Ok(out)
    }

    fn decode(data: &[u8]) -> Result<Self> {
        let mut blocks = Vec::new();
        let mut pos = 0;
        let mut pending_size = None;
        while pos < data.len() {
            let len = match data[pos] {
                DISK_INFO_CODE => DISK_INFO_LEN,
                FILE_AMOUNT_CODE => FILE_AMOUNT_LEN,
                FILE_HEADER_CODE => FILE_HEADER_LEN,
                FILE_DATA_CODE => match pending_size.take() {
                    Some(size) => size + 1,
                    None => {
                        return Err(Error::InvalidFdsImage(format!(
                            "file data block at offset {} without a header",
                            pos
                        )))
                    }
                },
                // padding
                _ => break,
            };
            let Some(raw) = data.get(pos..pos + len) else {
                return Err(Error::InvalidFdsImage(format!(
                    "block at offset {} runs past the end of the side",
                    pos
                )));
            };
            let block = FdsBlock::from_bytes(raw);
            if !block.valid {
                return Err(Error::InvalidFdsImage(format!("invalid block at offset {}", pos)));
            }
            if let FdsBlockKind::FileHeader(header) = &block.kind {
                pending_size = Some(header.size() as usize);
            }
            blocks.push(block);
            pos += len;
        }
        Self::new(blocks)
    }
}

/// A whole disk: one or more sides
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct FdsImage {
    sides: Vec<DiskSide>,
}

impl FdsImage {
    /// Create an image from sides
    pub fn new(sides: Vec<DiskSide>) -> Self {
        Self { sides }
    }

    /// Sides in disk order
    pub fn sides(&self) -> &[DiskSide] {
        &self.sides
    }

    /// Append a side
    pub fn push(&mut self, side: DiskSide) {
        self.sides.push(side);
    }

    /// Parse an image, with or without the 16-byte header
    pub fn from_bytes(data: &[u8]) -> Result<Self> {
        let body = if data.starts_with(HEADER_MAGIC) {
            &data[HEADER_SIZE.min(data.len())..]
        } else {
            data
        };
        if body.is_empty() || body.len() % SIDE_SIZE != 0 {
            return Err(Error::InvalidFdsImage(format!(
                "image body is {} bytes, expected a multiple of {}",
                body.len(),
                SIDE_SIZE
            )));
        }
        let sides = body
            .chunks(SIDE_SIZE)
            .map(DiskSide::decode)
            .collect::<Result<Vec<_>>>()?;
        Ok(Self { sides })
    }

    /// Encode the image, optionally with the 16-byte header
    pub fn to_bytes(&self, with_header: bool) -> Result<Vec<u8>> {
        let mut out = Vec::with_capacity(HEADER_SIZE + self.sides.len() * SIDE_SIZE);
        if with_header {
            out.extend_from_slice(HEADER_MAGIC);
            out.push(self.sides.len() as u8);
            out.resize(HEADER_SIZE, 0);
        }
        for side in &self.sides {
            out.extend_from_slice(&side.encode()?);
        }
        Ok(out)
    }
}
