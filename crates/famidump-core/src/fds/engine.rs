//! FDS dump and write sessions
//!
//! Both sessions run with the dumper timeout raised to [`FDS_TIMEOUT`] and
//! put the previous timeout back on every exit path.
//!
//! Blocks up to the hidden-file boundary (`2 + 2 * file amount`) must all be
//! present and good. Past the boundary a missing or bad block just ends the
//! side: whatever follows is unlisted data some games hide on the disk.

use std::time::Duration;

use bitflags::bitflags;

use super::block::{expected_code, kind_name_at, FdsBlock, FdsBlockKind};
use super::image::{DiskSide, FdsImage};
use super::pack::pack_blocks;
use crate::dumper::{read_cpu_byte, write_cpu_byte, Dumper, TimeoutGuard, UNLIMITED_PACKET_SIZE};
use crate::error::{BlockFault, Error, Result};
use crate::operator::{Operator, Waiter};

/// Timeout for disk transfers
pub const FDS_TIMEOUT: Duration = Duration::from_secs(30);
/// Delay between drive status polls
pub const POLL_INTERVAL: Duration = Duration::from_millis(100);
/// Oldest dumper protocol with FDS commands
pub const FDS_PROTOCOL: u8 = 3;

const DISK_IO_ENABLE: u16 = 0x4023;
const FDS_CONTROL: u16 = 0x4025;
const EXT_OUTPUT: u16 = 0x4026;
const DRIVE_STATUS: u16 = 0x4032;
const EXT_INPUT: u16 = 0x4033;

bitflags! {
    /// Drive status register (`$4032`)
    #[derive(Debug, Clone, Copy, PartialEq, Eq)]
    pub struct DriveStatus: u8 {
        /// No disk in the drive
        const DISK_MISSING = 1 << 0;
        /// Drive motor not ready
        const NOT_READY = 1 << 1;
        /// Inserted disk is write protected
        const WRITE_PROTECTED = 1 << 2;
    }
}

bitflags! {
    /// External connector input (`$4033`)
    #[derive(Debug, Clone, Copy, PartialEq, Eq)]
    pub struct ExtInput: u8 {
        /// Lines that echo the output register when the adapter is present
        const ECHO = 0x7B;
        /// Battery voltage is low
        const BATTERY_LOW = 0x80;
    }
}

/// Options for a dump session
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct DumpOptions {
    /// Number of disk sides to read
    pub sides: usize,
    /// Keep reading past the declared files
    pub hidden_files: bool,
}

impl Default for DumpOptions {
    fn default() -> Self {
        Self {
            sides: 1,
            hidden_files: true,
        }
    }
}

fn require_protocol<D: Dumper + ?Sized>(dumper: &D) -> Result<()> {
    let version = dumper.protocol_version();
    if version < FDS_PROTOCOL {
        return Err(Error::UnsupportedProtocol {
            version,
            required: FDS_PROTOCOL,
        });
    }
    Ok(())
}

/// Check that the RAM adapter answers and its battery is good
pub fn check_adapter<D: Dumper + ?Sized>(dumper: &mut D) -> Result<()> {
    // enable disk I/O, reset
    write_cpu_byte(dumper, DISK_IO_ENABLE, 0x01)?;
    write_cpu_byte(dumper, EXT_OUTPUT, 0x00)?;
    write_cpu_byte(dumper, FDS_CONTROL, 0b0010_0110)?;
    // keep open bus away from the value we expect
    write_cpu_byte(dumper, 0x0000, 0xFF)?;
    let low = ExtInput::from_bits_retain(read_cpu_byte(dumper, EXT_INPUT)?);

    write_cpu_byte(dumper, EXT_OUTPUT, 0xFF)?;
    write_cpu_byte(dumper, 0x0000, 0x00)?;
    let high = ExtInput::from_bits_retain(read_cpu_byte(dumper, EXT_INPUT)?);

    if !low.is_empty() || !high.contains(ExtInput::ECHO) {
        return Err(Error::AdapterNotConnected);
    }
    if high.contains(ExtInput::BATTERY_LOW) {
        return Err(Error::BatteryLow);
    }
    Ok(())
}

/// Read the drive status register
pub fn drive_status<D: Dumper + ?Sized>(dumper: &mut D) -> Result<DriveStatus> {
    Ok(DriveStatus::from_bits_retain(read_cpu_byte(
        dumper,
        DRIVE_STATUS,
    )?))
}

/// Poll the drive until a disk is present (`inserted`) or absent
///
/// The operator is asked once, and only if the drive is not already in the
/// wanted state.
pub fn wait_for_disk<D, W, O>(
    dumper: &mut D,
    waiter: &mut W,
    operator: &mut O,
    inserted: bool,
    prompt: &str,
) -> Result<()>
where
    D: Dumper + ?Sized,
    W: Waiter + ?Sized,
    O: Operator + ?Sized,
{
    let wanted = |status: DriveStatus| status.contains(DriveStatus::DISK_MISSING) != inserted;
    if wanted(drive_status(dumper)?) {
        return Ok(());
    }
    operator.announce(prompt);
    loop {
        waiter.wait(POLL_INTERVAL)?;
        if wanted(drive_status(dumper)?) {
            log::info!("OK");
            return Ok(());
        }
    }
}

fn block_fault(block: &FdsBlock, index: usize) -> Option<BlockFault> {
    if !block.valid || block.code() != expected_code(index) {
        Some(BlockFault::Structure)
    } else if !block.crc_ok {
        Some(BlockFault::Crc)
    } else {
        None
    }
}

fn reject(index: usize, fault: BlockFault) -> Error {
    Error::InvalidBlock {
        index,
        kind: kind_name_at(index),
        fault,
    }
}

fn hidden_boundary(file_amount: usize) -> usize {
    2 + 2 * file_amount
}

fn describe(block: &FdsBlock, index: usize, file_amount: Option<usize>) {
    match &block.kind {
        FdsBlockKind::DiskInfo(info) => log::info!("{}", info),
        FdsBlockKind::FileAmount(count) => log::info!("Number of non-hidden files: {}", count),
        FdsBlockKind::FileHeader(header) => {
            let file = (index - 2) / 2;
            let hidden = file_amount.is_some_and(|n| file >= n);
            log::info!(
                "File #{}{}:\n{}",
                file,
                if hidden { " (hidden)" } else { "" },
                header
            );
        }
        FdsBlockKind::FileData(data) => log::debug!("File data: {} bytes", data.len()),
        FdsBlockKind::Unknown { code, .. } => log::debug!("Unknown block ${:02X}", code),
    }
}

/// Checks that the declared files all arrived and drops a trailing
/// header whose data block did not make it
fn finish(mut blocks: Vec<FdsBlock>, file_amount: usize, hidden_files: bool) -> Result<DiskSide> {
    let files = (blocks.len().saturating_sub(2)) / 2;
    if files < file_amount {
        return Err(Error::IncompleteDisk {
            received: files,
            declared: file_amount,
        });
    }
    if blocks.len() % 2 != 0 {
        log::warn!("Dropping hidden file header #{} without data", files);
        blocks.pop();
    }
    if hidden_files {
        let hidden = files - file_amount;
        if hidden > 0 {
            log::info!("Hidden files: {}", hidden);
        } else {
            log::info!("Hidden files: not found");
        }
    }
    DiskSide::new(blocks)
}

/// Read a side one block per request
pub fn read_side_slow<D: Dumper + ?Sized>(dumper: &mut D, hidden_files: bool) -> Result<DiskSide> {
    let mut blocks: Vec<FdsBlock> = Vec::new();
    let mut file_amount = None;
    loop {
        let index = blocks.len();
        let beyond = file_amount.is_some_and(|n| index >= hidden_boundary(n));
        if !hidden_files && beyond {
            break;
        }
        let Ok(start) = u8::try_from(index) else {
            log::warn!("Block limit reached, stopping");
            break;
        };

        let mut answer = dumper.read_fds_blocks(start, 1)?;
        if answer.len() != 1 {
            if beyond {
                log::info!("Block #{} not found, end of disk data", index);
                break;
            }
            return Err(reject(index, BlockFault::Missing));
        }
        let block = answer.remove(0);

        if let Some(fault) = block_fault(&block, index) {
            if beyond {
                log::warn!("Block #{} is {}, it's a hidden file, stopping", index, fault);
                break;
            }
            return Err(reject(index, fault));
        }

        describe(&block, index, file_amount);
        if index == 1 {
            file_amount = block.file_count();
        }
        let end_of_head = block.end_of_head;
        blocks.push(block);
        if end_of_head {
            log::info!("End of head reached");
            break;
        }
    }

    match file_amount {
        Some(n) => finish(blocks, n, hidden_files),
        None => Err(reject(blocks.len(), BlockFault::Missing)),
    }
}

/// Read a side with a single request
pub fn read_side_fast<D: Dumper + ?Sized>(dumper: &mut D, hidden_files: bool) -> Result<DiskSide> {
    let mut blocks = dumper.read_fds_disk()?;

    for index in 0..2 {
        let block = blocks.get(index).ok_or_else(|| reject(index, BlockFault::Missing))?;
        if let Some(fault) = block_fault(block, index) {
            return Err(reject(index, fault));
        }
    }
    let file_amount = blocks[1].file_count().unwrap_or(0);
    let boundary = hidden_boundary(file_amount);

    let mut keep = if hidden_files {
        blocks.len()
    } else {
        boundary.min(blocks.len())
    };
    for (index, block) in blocks.iter().enumerate().take(keep) {
        if let Some(fault) = block_fault(block, index) {
            if index < boundary {
                return Err(reject(index, fault));
            }
            log::warn!("Block #{} is {}, it's a hidden file, stopping", index, fault);
            keep = index;
            break;
        }
        describe(block, index, Some(file_amount));
    }
    blocks.truncate(keep);

    finish(blocks, file_amount, hidden_files)
}

/// Dump one or more sides from the drive
///
/// Uses one request per block when the dumper limits read packets, a single
/// request per side otherwise.
pub fn dump<D, W, O>(
    dumper: &mut D,
    waiter: &mut W,
    operator: &mut O,
    options: &DumpOptions,
) -> Result<FdsImage>
where
    D: Dumper + ?Sized,
    W: Waiter + ?Sized,
    O: Operator + ?Sized,
{
    require_protocol(dumper)?;
    let mut dumper = TimeoutGuard::new(dumper, FDS_TIMEOUT)?;
    check_adapter(&mut *dumper)?;

    let slow = dumper.max_read_packet_size() != UNLIMITED_PACKET_SIZE;
    if slow {
        log::debug!("Limited read packets, reading block by block");
    }

    let mut image = FdsImage::default();
    for side in 1..=options.sides {
        wait_for_disk(
            &mut *dumper,
            waiter,
            operator,
            true,
            &format!("Please set disk card, side #{}", side),
        )?;
        log::info!("Reading disk side #{}", side);
        let blocks = if slow {
            read_side_slow(&mut *dumper, options.hidden_files)?
        } else {
            read_side_fast(&mut *dumper, options.hidden_files)?
        };
        image.push(blocks);

        if side < options.sides {
            wait_for_disk(&mut *dumper, waiter, operator, false, "Please remove disk card")?;
        }
    }
    Ok(image)
}

/// Write every side of an image to disks
pub fn write<D, W, O>(
    dumper: &mut D,
    waiter: &mut W,
    operator: &mut O,
    image: &FdsImage,
) -> Result<()>
where
    D: Dumper + ?Sized,
    W: Waiter + ?Sized,
    O: Operator + ?Sized,
{
    require_protocol(dumper)?;
    let mut dumper = TimeoutGuard::new(dumper, FDS_TIMEOUT)?;
    check_adapter(&mut *dumper)?;

    let sides = image.sides();
    for (n, side) in sides.iter().enumerate() {
        let blocks = side.blocks();
        if blocks.len() > u8::MAX as usize + 1 {
            return Err(Error::InvalidFdsImage(format!(
                "side #{} has {} blocks",
                n + 1,
                blocks.len()
            )));
        }
        let groups = pack_blocks(blocks, dumper.max_write_packet_size())?;

        if let Some(info) = side.disk_info() {
            log::info!("{}", info);
        }
        wait_for_disk(
            &mut *dumper,
            waiter,
            operator,
            true,
            &format!("Please set disk card, side #{}", n + 1),
        )?;

        for group in groups {
            let indices: Vec<u8> = group.clone().map(|i| i as u8).collect();
            log::info!(
                "Writing block(s): {}",
                indices
                    .iter()
                    .map(u8::to_string)
                    .collect::<Vec<_>>()
                    .join(", ")
            );
            dumper.write_fds_blocks(&indices, &blocks[group])?;
        }
        log::info!("Side #{} written", n + 1);

        if n + 1 < sides.len() {
            wait_for_disk(&mut *dumper, waiter, operator, false, "Please remove disk card")?;
        }
    }
    Ok(())
}
