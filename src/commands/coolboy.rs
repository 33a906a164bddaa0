//! COOLBOY commands

use super::progress::{BarProgress, TerminalOperator};
use super::read_file;
use crate::cli::SectorArgs;
use famidump_core::bank::BANK_SIZE;
use famidump_core::dumper::Dumper;
use famidump_core::flash::{cartridge_info, verify_prg, write_prg, SessionReport, WriteOptions};
use famidump_core::mapper::{INES_HEADER_SIZE, INES_MAGIC};
use std::path::Path;

/// iNES flags 6 bit: 512-byte trainer before PRG
const INES_TRAINER: u8 = 0x04;
const INES_TRAINER_SIZE: usize = 512;

/// Extract the PRG payload from a raw PRG dump or an iNES file
pub fn prg_from_file(data: Vec<u8>) -> Result<Vec<u8>, Box<dyn std::error::Error>> {
    if data.len() < INES_HEADER_SIZE || &data[..4] != INES_MAGIC {
        return Ok(data);
    }
    let prg_size = data[4] as usize * BANK_SIZE;
    let mut start = INES_HEADER_SIZE;
    if data[6] & INES_TRAINER != 0 {
        start += INES_TRAINER_SIZE;
    }
    let prg = data
        .get(start..start + prg_size)
        .ok_or("iNES file is shorter than its PRG size")?;
    log::info!("iNES file, PRG size {} KB", prg_size / 1024);
    Ok(prg.to_vec())
}

fn print_report(report: &SessionReport) {
    println!("Write errors: {}", report.total_errors);
    if !report.bad_sectors.is_empty() {
        println!("Bad sectors: {:?}", report.bad_sectors);
    }
    if report.verified {
        println!("Verification passed");
    }
}

/// Show revision, flash geometry and sector 0 protection
pub fn run_info(dumper: &mut (dyn Dumper + Send)) -> Result<(), Box<dyn std::error::Error>> {
    let info = cartridge_info(dumper)?;
    println!("COOLBOY version: {}", info.revision);
    println!(
        "Device size: {} MByte / {} Mbit",
        info.flash.device_size / 1024 / 1024,
        info.flash.device_size / 1024 / 1024 * 8
    );
    println!(
        "Maximum number of bytes in multi-byte program: {}",
        info.flash.max_multi_program
    );
    for (i, region) in info.flash.erase_regions.iter().enumerate() {
        println!(
            "Erase region #{}: {} blocks of {} KB",
            i,
            region.count,
            region.size / 1024
        );
    }
    println!(
        "Sector 0 protection: {}",
        if info.sector0_protected {
            "protected"
        } else {
            "unprotected"
        }
    );
    Ok(())
}

/// Write a PRG image
pub fn run_write(
    dumper: &mut (dyn Dumper + Send),
    input: &Path,
    sectors: &SectorArgs,
    options: WriteOptions,
) -> Result<(), Box<dyn std::error::Error>> {
    let prg = prg_from_file(read_file(input)?)?;
    let options = WriteOptions {
        bad_sectors: sectors.bad_sectors.clone(),
        silent: sectors.silent,
        ..options
    };

    let mut operator = TerminalOperator::new(sectors.silent);
    let mut progress = BarProgress::default();
    let result = write_prg(dumper, &mut operator, &prg, &options, &mut progress);
    progress.finish();

    let report = result?;
    print_report(&report);
    Ok(())
}

/// Verify flash against a PRG image
pub fn run_verify(
    dumper: &mut (dyn Dumper + Send),
    input: &Path,
    sectors: &SectorArgs,
) -> Result<(), Box<dyn std::error::Error>> {
    let prg = prg_from_file(read_file(input)?)?;

    let mut operator = TerminalOperator::new(sectors.silent);
    let mut progress = BarProgress::default();
    let result = verify_prg(
        dumper,
        &mut operator,
        &prg,
        &sectors.bad_sectors,
        sectors.silent,
        &mut progress,
    );
    progress.finish();

    print_report(&result?);
    Ok(())
}
