//! Cartridge dump command

use super::write_file;
use famidump_core::dumper::Dumper;
use famidump_core::mapper::{dump_cartridge, mapper_by_number};
use std::path::Path;

/// Battery-backed PRG RAM window
const PRG_RAM_ADDR: u16 = 0x6000;
const PRG_RAM_SIZE: usize = 0x2000;

/// Dump a cartridge with the given mapper to an iNES file
///
/// With `battery`, PRG RAM is also saved next to the image as `.sav`.
pub fn run_dump(
    dumper: &mut (dyn Dumper + Send),
    mapper: u16,
    output: &Path,
    prg_size: Option<usize>,
    chr_size: Option<usize>,
    battery: bool,
) -> Result<(), Box<dyn std::error::Error>> {
    let mapper = mapper_by_number(mapper)?;
    let image = dump_cartridge(dumper, mapper, prg_size, chr_size, battery)?;
    write_file(output, &image.to_ines()?)?;

    if battery {
        mapper.enable_prg_ram(dumper)?;
        let ram = dumper.read_cpu(PRG_RAM_ADDR, PRG_RAM_SIZE)?;
        write_file(&output.with_extension("sav"), &ram)?;
    }
    Ok(())
}
