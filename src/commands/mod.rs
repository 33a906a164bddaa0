//! CLI command implementations
//!
//! Every command takes an opened dumper and does its work through the
//! `famidump-core` engines; this layer only adds files, progress bars and
//! the operator at the terminal.

pub mod coolboy;
pub mod dump;
pub mod fds;
mod list;
mod progress;

pub use list::{list_mappers, list_programmers};

use std::path::Path;

/// Read file contents into a Vec
fn read_file(path: &Path) -> Result<Vec<u8>, Box<dyn std::error::Error>> {
    let data = std::fs::read(path).map_err(|e| format!("{}: {}", path.display(), e))?;
    println!("Read {} bytes from {:?}", data.len(), path);
    Ok(data)
}

/// Write data to a file
fn write_file(path: &Path, data: &[u8]) -> Result<(), Box<dyn std::error::Error>> {
    std::fs::write(path, data).map_err(|e| format!("{}: {}", path.display(), e))?;
    println!("Wrote {} bytes to {:?}", data.len(), path);
    Ok(())
}
