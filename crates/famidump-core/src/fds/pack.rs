//! Grouping of blocks into write transfers

use super::block::FdsBlock;
use crate::error::{Error, Result};
use std::ops::Range;

/// Framing bytes per transfer
pub const GROUP_OVERHEAD: usize = 1;
/// Framing bytes per block inside a transfer
pub const BLOCK_OVERHEAD: usize = 3;

/// Framed size of a block inside a transfer
pub fn framed_len(block: &FdsBlock) -> usize {
    block.encoded_len() + BLOCK_OVERHEAD
}

/// Split a side's blocks into contiguous groups that each fit in `budget`
///
/// Greedy: each group takes as many following blocks as fit. Fails when a
/// single block does not fit in an empty group.
pub fn pack_blocks(blocks: &[FdsBlock], budget: usize) -> Result<Vec<Range<usize>>> {
    let mut groups = Vec::new();
    let mut start = 0;
    while start < blocks.len() {
        let mut total = GROUP_OVERHEAD;
        let mut end = start;
        while let Some(block) = blocks.get(end) {
            let size = framed_len(block);
            if total + size > budget {
                break;
            }
            total += size;
            end += 1;
        }
        if end == start {
            return Err(Error::InsufficientDeviceMemory {
                block: start,
                size: framed_len(&blocks[start]),
                budget,
            });
        }
        groups.push(start..end);
        start = end;
    }
    Ok(groups)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn data_blocks(sizes: &[usize]) -> Vec<FdsBlock> {
        sizes.iter().map(|&n| FdsBlock::file_data(vec![0; n])).collect()
    }

    #[test]
    fn test_everything_fits_in_one_group() {
        let blocks = data_blocks(&[10, 20, 30]);
        assert_eq!(pack_blocks(&blocks, 1024).unwrap(), vec![0..3]);
    }

    #[test]
    fn test_groups_cover_blocks_in_order() {
        let blocks = data_blocks(&[100, 50, 200, 10, 10, 300, 1]);
        let budget = 320;
        let groups = pack_blocks(&blocks, budget).unwrap();

        let mut next = 0;
        for group in &groups {
            assert_eq!(group.start, next);
            assert!(group.end > group.start);
            let total: usize =
                GROUP_OVERHEAD + blocks[group.clone()].iter().map(framed_len).sum::<usize>();
            assert!(total <= budget);
            next = group.end;
        }
        assert_eq!(next, blocks.len());
    }

    #[test]
    fn test_exact_fit() {
        // 1 + (9 + 1 + 3) = 14
        let blocks = data_blocks(&[9, 9]);
        assert_eq!(pack_blocks(&blocks, 14).unwrap(), vec![0..1, 1..2]);
        assert_eq!(pack_blocks(&blocks, 27).unwrap(), vec![0..2]);
    }

    #[test]
    fn test_block_too_big() {
        let blocks = data_blocks(&[10, 5000]);
        match pack_blocks(&blocks, 1000) {
            Err(Error::InsufficientDeviceMemory { block, size, budget }) => {
                assert_eq!(block, 1);
                assert_eq!(size, 5004);
                assert_eq!(budget, 1000);
            }
            other => panic!("unexpected {:?}", other),
        }
    }

    #[test]
    fn test_empty_side() {
        assert!(pack_blocks(&[], 10).unwrap().is_empty());
    }
}
