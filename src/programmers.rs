//! Programmer registration and dispatch
//!
//! This module provides a centralized registry for all dumper backends, with
//! support for feature-gated inclusion and dynamic help text generation.

use famidump_core::dumper::{Dumper, DumperInfo};
use thiserror::Error;

/// Errors while selecting or opening a programmer
#[derive(Debug, Error)]
pub enum ProgrammerError {
    /// No programmer with that name is compiled in
    #[error("unknown programmer: {name}\n\n{help}\nUse 'famidump list-programmers' for more details")]
    Unknown {
        /// Requested name
        name: String,
        /// Available programmers
        help: String,
    },

    /// A parameter could not be used
    #[error("invalid {programmer} parameter {key}={value}: {reason}")]
    InvalidParam {
        /// Programmer name
        programmer: &'static str,
        /// Parameter key
        key: String,
        /// Parameter value
        value: String,
        /// What was wrong
        reason: String,
    },

    /// Opening the device failed
    #[error(transparent)]
    Device(#[from] famidump_core::Error),

    /// Reading a file named by a parameter failed
    #[error("{path}: {source}")]
    Io {
        /// File path
        path: String,
        /// Underlying error
        source: std::io::Error,
    },
}

/// Get information about all available programmers (enabled at compile time)
#[allow(unused_mut, clippy::vec_init_then_push)]
pub fn available_programmers() -> Vec<DumperInfo> {
    let mut programmers = Vec::new();

    #[cfg(feature = "dummy")]
    programmers.push(DumperInfo {
        name: "dummy",
        aliases: &["emulator"],
        description: "In-memory COOLBOY cartridge and FDS drive emulator \
                      (revision=a|b|none,size=<bytes>,fds=<file>,blanks=<n>,fast=<bool>,adapter=<bool>)",
    });

    programmers
}

/// Generate help text listing all available programmers
pub fn programmer_help() -> String {
    let programmers = available_programmers();

    if programmers.is_empty() {
        return "No programmers available (recompile with programmer features enabled)".to_string();
    }

    let mut help = String::from("Available programmers:\n");
    for p in &programmers {
        help.push_str(&format!("  {:12} - {}\n", p.name, p.description));
    }
    help
}

/// Generate a short list of programmer names for CLI help
pub fn programmer_names_short() -> String {
    available_programmers()
        .iter()
        .map(|p| p.name)
        .collect::<Vec<_>>()
        .join(", ")
}

/// Find the canonical name for a programmer name or alias
pub fn find_programmer(name: &str) -> Option<&'static str> {
    available_programmers()
        .into_iter()
        .find(|p| p.name == name || p.aliases.iter().any(|alias| *alias == name))
        .map(|p| p.name)
}

/// Parse a programmer string into name and parameters
///
/// Format: "name" or "name:key1=value1,key2=value2"
pub fn parse_programmer_params(s: &str) -> (&str, Vec<(&str, &str)>) {
    if let Some((name, opts)) = s.split_once(':') {
        let options: Vec<_> = opts
            .split(',')
            .filter_map(|opt| opt.split_once('='))
            .map(|(k, v)| (k.trim(), v.trim()))
            .collect();
        (name, options)
    } else {
        (s, Vec::new())
    }
}

/// Open the dumper named by a programmer string
#[allow(unused_variables)]
pub fn open_dumper(programmer: &str) -> Result<Box<dyn Dumper + Send>, ProgrammerError> {
    let (name, options) = parse_programmer_params(programmer);

    let unknown = || ProgrammerError::Unknown {
        name: name.to_string(),
        help: programmer_help(),
    };
    let canonical = find_programmer(name).ok_or_else(unknown)?;

    match canonical {
        #[cfg(feature = "dummy")]
        "dummy" => {
            log::info!("Opening dummy dumper...");
            Ok(Box::new(dummy::open(&options)?))
        }
        _ => Err(unknown()),
    }
}

#[cfg(feature = "dummy")]
mod dummy {
    use super::ProgrammerError;
    use crate::cli::parse_size;
    use famidump_core::bank::ControllerRevision;
    use famidump_core::dumper::UNLIMITED_PACKET_SIZE;
    use famidump_core::fds::{FdsBlock, FdsImage};
    use famidump_dummy::{DummyConfig, DummyDumper};

    /// Read packet size used when fast reads are disabled
    const SLOW_READ_PACKET_SIZE: usize = 0x100;

    /// Blank disks queued when no image is given
    const DEFAULT_BLANKS: usize = 2;

    fn invalid(key: &str, value: &str, reason: impl ToString) -> ProgrammerError {
        ProgrammerError::InvalidParam {
            programmer: "dummy",
            key: key.to_string(),
            value: value.to_string(),
            reason: reason.to_string(),
        }
    }

    fn parse_bool(key: &str, value: &str) -> Result<bool, ProgrammerError> {
        match value.to_ascii_lowercase().as_str() {
            "1" | "true" | "yes" | "on" => Ok(true),
            "0" | "false" | "no" | "off" => Ok(false),
            _ => Err(invalid(key, value, "expected true or false")),
        }
    }

    fn load_disks(path: &str) -> Result<Vec<Vec<FdsBlock>>, ProgrammerError> {
        let data = std::fs::read(path).map_err(|source| ProgrammerError::Io {
            path: path.to_string(),
            source,
        })?;
        let image = FdsImage::from_bytes(&data)?;
        Ok(image
            .sides()
            .iter()
            .map(|side| side.blocks().to_vec())
            .collect())
    }

    pub fn open(options: &[(&str, &str)]) -> Result<DummyDumper, ProgrammerError> {
        let mut config = DummyConfig::default();
        let mut disks = None;
        let mut blanks = DEFAULT_BLANKS;

        for &(key, value) in options {
            match key {
                "revision" => {
                    config.revision = match value.to_ascii_lowercase().as_str() {
                        "a" => Some(ControllerRevision::A),
                        "b" => Some(ControllerRevision::B),
                        "none" => None,
                        _ => return Err(invalid(key, value, "expected a, b or none")),
                    }
                }
                "size" => {
                    config.flash_size = parse_size(value).map_err(|e| invalid(key, value, e))?
                }
                "fds" => disks = Some(load_disks(value)?),
                "blanks" => blanks = value.parse().map_err(|e| invalid(key, value, e))?,
                "fast" => {
                    config.max_read_packet_size = if parse_bool(key, value)? {
                        UNLIMITED_PACKET_SIZE
                    } else {
                        SLOW_READ_PACKET_SIZE
                    }
                }
                "adapter" => config.fds_adapter = parse_bool(key, value)?,
                _ => log::warn!("Ignoring unknown dummy parameter {}={}", key, value),
            }
        }

        let disks = disks.unwrap_or_else(|| vec![Vec::new(); blanks]);
        Ok(DummyDumper::new(config).with_disks(disks))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_programmer_params() {
        assert_eq!(parse_programmer_params("dummy"), ("dummy", vec![]));
        assert_eq!(
            parse_programmer_params("dummy:revision=b, fast=false"),
            ("dummy", vec![("revision", "b"), ("fast", "false")])
        );
    }

    #[test]
    fn test_unknown_programmer() {
        assert!(matches!(
            open_dumper("ch341a"),
            Err(ProgrammerError::Unknown { .. })
        ));
    }

    #[cfg(feature = "dummy")]
    #[test]
    fn test_open_dummy_with_params() {
        let dumper = open_dumper("emulator:revision=b,fast=false").unwrap();
        assert_eq!(dumper.max_read_packet_size(), 0x100);
        assert!(matches!(
            open_dumper("dummy:revision=c"),
            Err(ProgrammerError::InvalidParam { .. })
        ));
    }
}
