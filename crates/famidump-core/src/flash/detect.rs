//! COOLBOY revision detection
//!
//! Both candidate register addresses get the same CHR bank selections, a
//! marker byte is written into CHR bank 0 and bank 1, and then bank 0 is
//! selected through one address at a time. Only the live register changes
//! what the PPU sees.

use crate::bank::ControllerRevision;
use crate::dumper::Dumper;
use crate::error::{Error, Result};

/// Register value selecting CHR bank `n` (byte 2) in NROM mode
const fn chr_select(bank: u8) -> [u8; 4] {
    [0, 0, bank, 0x10]
}

/// Decide the revision from the two read-back bytes
pub fn classify(v6000: u8, v5000: u8) -> Result<ControllerRevision> {
    match (v6000, v5000) {
        (0, 1) => Ok(ControllerRevision::A),
        (1, 0) => Ok(ControllerRevision::B),
        _ => Err(Error::DetectionFailed { v6000, v5000 }),
    }
}

/// Probe which register address the cartridge responds to
pub fn detect_revision<D: Dumper + ?Sized>(dumper: &mut D) -> Result<ControllerRevision> {
    let a = ControllerRevision::A.register();
    let b = ControllerRevision::B.register();

    // 0th CHR bank using both methods, mark it with 0
    dumper.write_cpu(b, &chr_select(0))?;
    dumper.write_cpu(a, &chr_select(0))?;
    dumper.write_ppu(0x0000, &[0])?;
    // 1st CHR bank using both methods, mark it with 1
    dumper.write_cpu(b, &chr_select(1))?;
    dumper.write_cpu(a, &chr_select(1))?;
    dumper.write_ppu(0x0000, &[1])?;

    // 0th bank through $6000 only
    dumper.write_cpu(a, &chr_select(0))?;
    let v6000 = first_byte(dumper.read_ppu(0x0000, 1)?)?;
    // back to bank 1, then 0th bank through $5000 only
    dumper.write_cpu(a, &chr_select(1))?;
    dumper.write_cpu(b, &chr_select(0))?;
    let v5000 = first_byte(dumper.read_ppu(0x0000, 1)?)?;

    let revision = classify(v6000, v5000)?;
    log::info!("COOLBOY version: {}", revision);
    Ok(revision)
}

fn first_byte(data: Vec<u8>) -> Result<u8> {
    data.first()
        .copied()
        .ok_or_else(|| Error::InvalidResponse("empty PPU read".into()))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_classify_revisions() {
        assert_eq!(classify(0, 1).unwrap(), ControllerRevision::A);
        assert_eq!(classify(1, 0).unwrap(), ControllerRevision::B);
    }

    #[test]
    fn test_classify_is_symmetric() {
        for (x, y) in [(0u8, 1u8), (1, 0)] {
            let forward = classify(x, y).unwrap();
            let swapped = classify(y, x).unwrap();
            assert_ne!(forward, swapped);
        }
    }

    #[test]
    fn test_classify_rejects_everything_else() {
        for v6000 in 0..=255u8 {
            for v5000 in [0u8, 1, 2, 0xFF] {
                if (v6000, v5000) == (0, 1) || (v6000, v5000) == (1, 0) {
                    continue;
                }
                assert!(matches!(
                    classify(v6000, v5000),
                    Err(Error::DetectionFailed { .. })
                ));
            }
        }
    }
}
