//! CLI argument parsing

use crate::programmers;
use clap::{Parser, Subcommand};
use std::path::PathBuf;

/// Parse a string as a hex or decimal usize
fn parse_hex_usize(s: &str) -> Result<usize, String> {
    if let Some(hex) = s.strip_prefix("0x").or_else(|| s.strip_prefix("0X")) {
        usize::from_str_radix(hex, 16).map_err(|e| format!("Invalid hex value: {}", e))
    } else {
        s.parse::<usize>().map_err(|e| format!("Invalid number: {}", e))
    }
}

/// Parse a size with an optional K/M suffix ("256K", "0x40000", "2M")
pub fn parse_size(s: &str) -> Result<usize, String> {
    let s = s.trim();
    let (digits, unit) = match s.char_indices().last() {
        Some((i, 'K' | 'k')) => (&s[..i], 1024),
        Some((i, 'M' | 'm')) => (&s[..i], 1024 * 1024),
        _ => (s, 1),
    };
    let value = parse_hex_usize(digits.trim())?;
    value
        .checked_mul(unit)
        .ok_or_else(|| format!("Size too large: {}", s))
}

/// Generate dynamic help text for the programmer argument
fn programmer_help() -> String {
    format!(
        "Programmer to use [available: {}]",
        programmers::programmer_names_short()
    )
}

#[derive(Parser)]
#[command(name = "famidump")]
#[command(author, version, about = "Famicom cartridge and disk dumper", long_about = None)]
pub struct Cli {
    /// Verbosity level (-v, -vv)
    #[arg(short, long, action = clap::ArgAction::Count, global = true)]
    pub verbose: u8,

    #[command(subcommand)]
    pub command: Commands,
}

/// Programmer selection shared across commands
#[derive(clap::Args, Debug, Clone)]
pub struct ProgrammerArgs {
    /// Programmer, optionally with parameters (name:key=value,...)
    #[arg(short, long, help = programmer_help(), default_value = "dummy")]
    pub programmer: String,
}

/// Options shared by COOLBOY write and verify
#[derive(clap::Args, Debug, Clone, Default)]
pub struct SectorArgs {
    /// Sectors known to be bad, skipped entirely (comma-separated)
    #[arg(long, value_delimiter = ',', value_parser = parse_hex_usize)]
    pub bad_sectors: Vec<usize>,

    /// No beeps
    #[arg(long)]
    pub silent: bool,
}

#[derive(Subcommand)]
pub enum Commands {
    /// COOLBOY multicart flash operations
    #[command(subcommand)]
    Coolboy(CoolboyCommands),

    /// Famicom Disk System operations
    #[command(subcommand)]
    Fds(FdsCommands),

    /// Dump a cartridge to an iNES file
    Dump {
        #[command(flatten)]
        programmer: ProgrammerArgs,

        /// iNES mapper number
        #[arg(short, long)]
        mapper: u16,

        /// Output file path
        #[arg(short, long)]
        output: PathBuf,

        /// PRG size (e.g. 256K), defaults to the mapper's size
        #[arg(long, value_parser = parse_size)]
        prg_size: Option<usize>,

        /// CHR size (e.g. 128K), defaults to the mapper's size
        #[arg(long, value_parser = parse_size)]
        chr_size: Option<usize>,

        /// Enable and mark battery-backed PRG RAM
        #[arg(long)]
        battery: bool,
    },

    /// List supported programmers
    ListProgrammers,

    /// List supported mappers
    ListMappers,
}

/// COOLBOY subcommands
#[derive(Subcommand)]
pub enum CoolboyCommands {
    /// Show controller revision, flash geometry and protection state
    Info {
        #[command(flatten)]
        programmer: ProgrammerArgs,
    },

    /// Write a PRG image (raw or .nes) to flash
    Write {
        #[command(flatten)]
        programmer: ProgrammerArgs,

        /// Input file path
        #[arg(short, long)]
        input: PathBuf,

        #[command(flatten)]
        sectors: SectorArgs,

        /// Verify CRCs after writing
        #[arg(long)]
        verify: bool,

        /// Ask before verification (to reseat the cartridge)
        #[arg(long, requires = "verify")]
        check_pause: bool,

        /// Set the protection bit of every written sector
        #[arg(long)]
        lock: bool,

        /// Mark failing sectors bad and continue
        #[arg(long)]
        ignore_bad_sectors: bool,
    },

    /// Compare flash CRCs against a PRG image
    Verify {
        #[command(flatten)]
        programmer: ProgrammerArgs,

        /// Input file path
        #[arg(short, long)]
        input: PathBuf,

        #[command(flatten)]
        sectors: SectorArgs,
    },
}

/// FDS subcommands
#[derive(Subcommand)]
pub enum FdsCommands {
    /// Dump disk sides to a .fds file
    Dump {
        #[command(flatten)]
        programmer: ProgrammerArgs,

        /// Output file path
        #[arg(short, long)]
        output: PathBuf,

        /// Number of disk sides
        #[arg(long, default_value_t = 1)]
        sides: usize,

        /// Stop after the declared files
        #[arg(long)]
        no_hidden: bool,

        /// Write the 16-byte fwNES header
        #[arg(long)]
        header: bool,
    },

    /// Write a .fds file to disks
    Write {
        #[command(flatten)]
        programmer: ProgrammerArgs,

        /// Input file path
        #[arg(short, long)]
        input: PathBuf,
    },

    /// Describe the sides and files of a .fds file
    Info {
        /// Input file path
        #[arg(short, long)]
        input: PathBuf,
    },
}
