//! Terminal progress bars and operator prompts

use famidump_core::error::{Error, Result};
use famidump_core::flash::{BankProgress, FlashProgress};
use famidump_core::operator::{Cue, Operator};
use indicatif::{ProgressBar, ProgressStyle};
use std::io::{BufRead, Write};

/// Create a bank progress bar with a phase message
fn create_bank_bar(total: usize, phase: &str) -> ProgressBar {
    let pb = ProgressBar::new(total as u64);
    if let Ok(style) = ProgressStyle::default_bar()
        .template("{spinner:.green} [{elapsed_precise}] [{bar:40.cyan/blue}] {pos}/{len} banks {msg}")
    {
        pb.set_style(style.progress_chars("#>-"));
    }
    pb.set_message(phase.to_string());
    pb
}

/// Progress bars for the write and verify passes
#[derive(Default)]
pub struct BarProgress {
    write: Option<ProgressBar>,
    verify: Option<ProgressBar>,
}

impl BarProgress {
    /// Finish both bars
    pub fn finish(&mut self) {
        if let Some(pb) = self.write.take() {
            pb.finish_with_message("written");
        }
        if let Some(pb) = self.verify.take() {
            pb.finish_with_message("verified");
        }
    }

    fn active(&self) -> Option<&ProgressBar> {
        self.verify.as_ref().or(self.write.as_ref())
    }
}

impl FlashProgress for BarProgress {
    fn erasing(&mut self, sector: usize) {
        if let Some(pb) = &self.write {
            pb.set_message(format!("erasing sector #{}", sector));
        }
    }

    fn writing(&mut self, progress: &BankProgress) {
        let pb = self
            .write
            .get_or_insert_with(|| create_bank_bar(progress.total, "writing"));
        pb.set_position(progress.bank as u64);
        pb.set_message(format!(
            "writing bank #{} ({}%, ~{}s left)",
            progress.bank,
            progress.percent,
            progress.projected.saturating_sub(progress.elapsed).as_secs()
        ));
    }

    fn written(&mut self, bank: usize) {
        if let Some(pb) = &self.write {
            pb.set_position(bank as u64 + 1);
        }
    }

    fn write_failed(&mut self, bank: usize, error: &Error, retrying: bool) {
        if let Some(pb) = &self.write {
            let action = if retrying { "retrying sector" } else { "giving up" };
            pb.println(format!("bank #{}: {} ({})", bank, error, action));
        }
    }

    fn skipped(&mut self, sector: usize) {
        if let Some(pb) = self.active() {
            pb.println(format!("skipping bad sector #{}", sector));
        }
    }

    fn verifying(&mut self, progress: &BankProgress) {
        if let Some(pb) = self.write.take() {
            pb.finish_with_message("written");
        }
        let pb = self
            .verify
            .get_or_insert_with(|| create_bank_bar(progress.total, "verifying"));
        pb.set_position(progress.bank as u64);
    }

    fn verified(&mut self, bank: usize, expected: u16, actual: u16) {
        if let Some(pb) = &self.verify {
            if expected != actual {
                pb.println(format!(
                    "bank #{}: CRC {:04X}, expected {:04X}",
                    bank, actual, expected
                ));
            }
            pb.set_position(bank as u64 + 1);
        }
    }
}

/// The operator at the terminal: prompts on stdout, confirms with Enter
pub struct TerminalOperator {
    silent: bool,
}

impl TerminalOperator {
    /// Create an operator; `silent` suppresses the terminal bell
    pub fn new(silent: bool) -> Self {
        Self { silent }
    }
}

impl Operator for TerminalOperator {
    fn announce(&mut self, message: &str) {
        println!("{}", message);
    }

    fn cue(&mut self, cue: Cue) {
        if self.silent {
            return;
        }
        // One bell for done, two for errors
        let bells = match cue {
            Cue::Done => "\x07",
            Cue::Error => "\x07\x07",
        };
        print!("{}", bells);
        let _ = std::io::stdout().flush();
    }

    fn confirm(&mut self, message: &str) -> Result<()> {
        print!("{}... ", message);
        std::io::stdout().flush()?;
        let mut line = String::new();
        let read = std::io::stdin().lock().read_line(&mut line)?;
        if read == 0 {
            return Err(Error::Cancelled);
        }
        Ok(())
    }
}
