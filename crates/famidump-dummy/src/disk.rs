//! Emulated FDS drive with a patient operator
//!
//! Disks wait in a queue. Once the loaded disk has been read or written,
//! polling the drive status makes the operator take it out, and polling an
//! empty drive makes them insert the next one. Each swap takes a few polls.

use std::collections::VecDeque;

use famidump_core::error::{Error, Result};
use famidump_core::fds::{DriveStatus, FdsBlock};

/// Status polls the operator needs for one insertion or removal
pub const SWAP_POLLS: usize = 3;

enum Slot {
    Empty { polls: usize },
    Loaded { disk: Vec<FdsBlock>, used: bool, polls: usize },
}

/// Disk drive behind the RAM adapter
pub struct DiskDrive {
    queue: VecDeque<Vec<FdsBlock>>,
    slot: Slot,
    ejected: Vec<Vec<FdsBlock>>,
    insertions: usize,
}

impl DiskDrive {
    /// The first disk starts in the drive
    pub fn new(disks: Vec<Vec<FdsBlock>>) -> Self {
        let mut queue: VecDeque<_> = disks.into();
        let slot = match queue.pop_front() {
            Some(disk) => Slot::Loaded {
                disk,
                used: false,
                polls: 0,
            },
            None => Slot::Empty { polls: 0 },
        };
        Self {
            queue,
            slot,
            ejected: Vec::new(),
            insertions: 0,
        }
    }

    /// Disks taken out of the drive, in order
    pub fn ejected(&self) -> &[Vec<FdsBlock>] {
        &self.ejected
    }

    /// Disk currently in the drive
    pub fn loaded(&self) -> Option<&[FdsBlock]> {
        match &self.slot {
            Slot::Loaded { disk, .. } => Some(disk),
            Slot::Empty { .. } => None,
        }
    }

    /// Disks inserted by the operator after the first one
    pub fn insertions(&self) -> usize {
        self.insertions
    }

    /// `$4032`, letting the operator act
    pub fn status(&mut self) -> DriveStatus {
        match &mut self.slot {
            Slot::Loaded { used: true, polls, .. } => {
                *polls += 1;
                if *polls >= SWAP_POLLS {
                    if let Slot::Loaded { disk, .. } =
                        std::mem::replace(&mut self.slot, Slot::Empty { polls: 0 })
                    {
                        self.ejected.push(disk);
                    }
                }
            }
            Slot::Empty { polls } if !self.queue.is_empty() => {
                *polls += 1;
                if *polls >= SWAP_POLLS {
                    if let Some(disk) = self.queue.pop_front() {
                        self.slot = Slot::Loaded {
                            disk,
                            used: false,
                            polls: 0,
                        };
                        self.insertions += 1;
                    }
                }
            }
            _ => {}
        }
        match self.slot {
            Slot::Loaded { .. } => DriveStatus::empty(),
            Slot::Empty { .. } => DriveStatus::DISK_MISSING | DriveStatus::NOT_READY,
        }
    }

    fn disk_mut(&mut self) -> Result<&mut Vec<FdsBlock>> {
        match &mut self.slot {
            Slot::Loaded { disk, used, .. } => {
                *used = true;
                Ok(disk)
            }
            Slot::Empty { .. } => Err(Error::InvalidResponse("disk not inserted".into())),
        }
    }

    /// Blocks from `start`, stopping after an unreadable block or the end
    /// of the head
    pub fn read_blocks(&mut self, start: usize, count: usize) -> Result<Vec<FdsBlock>> {
        let disk = self.disk_mut()?;
        let mut out = Vec::new();
        for block in disk.iter().skip(start).take(count) {
            out.push(block.clone());
            if !block.is_good() || block.end_of_head {
                break;
            }
        }
        Ok(out)
    }

    /// Every block on the disk, stopping like [`DiskDrive::read_blocks`]
    pub fn read_all(&mut self) -> Result<Vec<FdsBlock>> {
        self.read_blocks(0, usize::MAX)
    }

    /// Write blocks at contiguous indices; everything after them is lost
    pub fn write_blocks(&mut self, indices: &[u8], blocks: &[FdsBlock]) -> Result<()> {
        let disk = self.disk_mut()?;
        let Some(&first) = indices.first() else {
            return Ok(());
        };
        let contiguous = indices
            .iter()
            .enumerate()
            .all(|(i, &index)| index as usize == first as usize + i);
        if !contiguous || indices.len() != blocks.len() || first as usize > disk.len() {
            return Err(Error::InvalidResponse(format!(
                "bad block indices {:?} for a disk with {} blocks",
                indices,
                disk.len()
            )));
        }
        disk.truncate(first as usize);
        disk.extend(blocks.iter().cloned());
        Ok(())
    }
}
