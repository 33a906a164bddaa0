//! famidump-core - Core library for Famicom cartridge and disk tools
//!
//! This crate drives a Famicom dumper to program COOLBOY multicart flash,
//! dump and write Famicom Disk System cards through the RAM adapter, and
//! read cartridges with the supported mappers. The dumper itself is behind
//! the [`dumper::Dumper`] trait.
//!
//! # Example
//!
//! ```ignore
//! use famidump_core::flash::{write_prg, NoProgress, WriteOptions};
//! use famidump_core::operator::Unattended;
//!
//! fn flash<D: Dumper>(dumper: &mut D, prg: &[u8]) -> Result<()> {
//!     let options = WriteOptions { verify: true, ..Default::default() };
//!     let report = write_prg(dumper, &mut Unattended, prg, &options, &mut NoProgress)?;
//!     println!("{} write errors", report.total_errors);
//!     Ok(())
//! }
//! ```

#![warn(missing_docs)]
#![warn(rust_2018_idioms)]

pub mod bank;
pub mod crc;
pub mod dumper;
pub mod error;
pub mod fds;
pub mod flash;
pub mod mapper;
pub mod operator;

pub use error::{Error, Result};
