//! List commands implementation

use crate::programmers;
use famidump_core::mapper;

/// List all supported programmers
pub fn list_programmers() {
    println!("Supported programmers:");
    println!();
    for p in programmers::available_programmers() {
        let aliases = if p.aliases.is_empty() {
            String::new()
        } else {
            format!(" (aliases: {})", p.aliases.join(", "))
        };
        println!("  {:<10} - {}{}", p.name, p.description, aliases);
    }
}

/// List all supported mappers
pub fn list_mappers() {
    println!("Supported mappers:");
    println!();
    println!("{:>6}  {:<20} {:>10} {:>10}", "Number", "Name", "PRG", "CHR");
    println!("{}", "-".repeat(50));

    for m in mapper::mappers() {
        println!(
            "{:>6}  {:<20} {:>10} {:>10}",
            m.number(),
            m.name(),
            format_size(m.default_prg_size()),
            format_size(m.default_chr_size())
        );
    }
}

fn format_size(bytes: usize) -> String {
    if bytes >= 1024 * 1024 {
        format!("{} MiB", bytes / (1024 * 1024))
    } else if bytes >= 1024 {
        format!("{} KiB", bytes / 1024)
    } else {
        format!("{} B", bytes)
    }
}
