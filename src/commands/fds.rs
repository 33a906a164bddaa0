//! Famicom Disk System commands

use super::progress::TerminalOperator;
use super::{read_file, write_file};
use famidump_core::dumper::Dumper;
use famidump_core::fds::{self, DumpOptions, FdsImage};
use famidump_core::operator::{CancelToken, SleepWaiter};
use std::path::Path;

/// A waiter that stops when the user presses Ctrl-C
fn interruptible_waiter() -> Result<SleepWaiter, Box<dyn std::error::Error>> {
    let cancel = CancelToken::new();
    let handler_token = cancel.clone();
    ctrlc::set_handler(move || handler_token.cancel())?;
    Ok(SleepWaiter::new(cancel))
}

fn print_image(image: &FdsImage) {
    for (n, side) in image.sides().iter().enumerate() {
        println!("=== Side #{} ===", n + 1);
        if let Some(info) = side.disk_info() {
            println!("{}", info);
        }
        println!("Declared files: {}", side.file_amount());
        for header in side.file_headers() {
            println!("{}", header);
        }
        if side.hidden_files() > 0 {
            println!("Hidden files: {}", side.hidden_files());
        }
    }
}

/// Dump disk sides to a `.fds` file
pub fn run_dump(
    dumper: &mut (dyn Dumper + Send),
    output: &Path,
    options: &DumpOptions,
    with_header: bool,
) -> Result<(), Box<dyn std::error::Error>> {
    let mut waiter = interruptible_waiter()?;
    let mut operator = TerminalOperator::new(false);

    let image = fds::dump(dumper, &mut waiter, &mut operator, options)?;
    write_file(output, &image.to_bytes(with_header)?)?;
    Ok(())
}

/// Write a `.fds` file to disks
pub fn run_write(
    dumper: &mut (dyn Dumper + Send),
    input: &Path,
) -> Result<(), Box<dyn std::error::Error>> {
    let image = FdsImage::from_bytes(&read_file(input)?)?;
    let mut waiter = interruptible_waiter()?;
    let mut operator = TerminalOperator::new(false);

    fds::write(dumper, &mut waiter, &mut operator, &image)?;
    println!("Done");
    Ok(())
}

/// Describe a `.fds` file
pub fn run_info(input: &Path) -> Result<(), Box<dyn std::error::Error>> {
    let image = FdsImage::from_bytes(&read_file(input)?)?;
    print_image(&image);
    Ok(())
}
