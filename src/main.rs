//! famidump - Famicom cartridge and disk dumper
//!
//! Writes and verifies COOLBOY multicart flash, dumps and writes Famicom
//! Disk System cards through the RAM adapter, and dumps cartridges with the
//! supported mappers.
//!
//! # Architecture
//!
//! All hardware access goes through the `Dumper` trait from `famidump-core`.
//! The programmer named on the command line (`-p name:key=value,...`) is
//! opened once and handed to the command, which drives one of the core
//! engines and adds files, progress bars and terminal prompts around it.

mod cli;
mod commands;
mod programmers;

use clap::Parser;
use cli::{Cli, Commands, CoolboyCommands, FdsCommands};
use famidump_core::fds::DumpOptions;
use famidump_core::flash::WriteOptions;

fn main() -> Result<(), Box<dyn std::error::Error>> {
    // Initialize logger
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info")).init();

    let cli = Cli::parse();

    // Set log level based on verbosity
    match cli.verbose {
        0 => {} // default (info)
        1 => log::set_max_level(log::LevelFilter::Debug),
        _ => log::set_max_level(log::LevelFilter::Trace),
    }

    let result = match cli.command {
        Commands::Coolboy(CoolboyCommands::Info { programmer }) => {
            let mut dumper = programmers::open_dumper(&programmer.programmer)?;
            commands::coolboy::run_info(dumper.as_mut())
        }
        Commands::Coolboy(CoolboyCommands::Write {
            programmer,
            input,
            sectors,
            verify,
            check_pause,
            lock,
            ignore_bad_sectors,
        }) => {
            let mut dumper = programmers::open_dumper(&programmer.programmer)?;
            let options = WriteOptions {
                verify,
                pause_before_verify: check_pause,
                write_protect: lock,
                ignore_bad_sectors,
                ..Default::default()
            };
            commands::coolboy::run_write(dumper.as_mut(), &input, &sectors, options)
        }
        Commands::Coolboy(CoolboyCommands::Verify {
            programmer,
            input,
            sectors,
        }) => {
            let mut dumper = programmers::open_dumper(&programmer.programmer)?;
            commands::coolboy::run_verify(dumper.as_mut(), &input, &sectors)
        }
        Commands::Fds(FdsCommands::Dump {
            programmer,
            output,
            sides,
            no_hidden,
            header,
        }) => {
            let mut dumper = programmers::open_dumper(&programmer.programmer)?;
            let options = DumpOptions {
                sides,
                hidden_files: !no_hidden,
            };
            commands::fds::run_dump(dumper.as_mut(), &output, &options, header)
        }
        Commands::Fds(FdsCommands::Write { programmer, input }) => {
            let mut dumper = programmers::open_dumper(&programmer.programmer)?;
            commands::fds::run_write(dumper.as_mut(), &input)
        }
        Commands::Fds(FdsCommands::Info { input }) => commands::fds::run_info(&input),
        Commands::Dump {
            programmer,
            mapper,
            output,
            prg_size,
            chr_size,
            battery,
        } => {
            let mut dumper = programmers::open_dumper(&programmer.programmer)?;
            commands::dump::run_dump(dumper.as_mut(), mapper, &output, prg_size, chr_size, battery)
        }
        Commands::ListProgrammers => {
            commands::list_programmers();
            Ok(())
        }
        Commands::ListMappers => {
            commands::list_mappers();
            Ok(())
        }
    };

    if let Err(e) = &result {
        if let Some(core) = e.downcast_ref::<famidump_core::Error>() {
            if core.is_transport() {
                log::error!("Lost contact with the dumper, check the connection");
            }
        }
    }
    result
}
