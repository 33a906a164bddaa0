//! Famicom Disk System transfers
//!
//! Dumping and writing disk cards through the RAM adapter, plus the block
//! model and the `.fds` image format.

pub mod block;
mod engine;
mod image;
mod pack;

pub use block::{DiskInfo, FdsBlock, FdsBlockKind, FdsDate, FileHeader, FileKind};
pub use engine::{
    check_adapter, drive_status, dump, read_side_fast, read_side_slow, wait_for_disk, write,
    DriveStatus, DumpOptions, ExtInput, FDS_PROTOCOL, FDS_TIMEOUT, POLL_INTERVAL,
};
pub use image::{DiskSide, FdsImage, HEADER_SIZE, SIDE_SIZE};
pub use pack::{framed_len, pack_blocks, BLOCK_OVERHEAD, GROUP_OVERHEAD};
