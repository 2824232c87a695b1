//! Console interaction for attended runs. Unattended runs never block on input.

use i2c_probe::{AddressSet, BusAddress};
use mll_reset::{Confirm, Resolve, Snapshot};
use std::io::{self, BufRead, Write};

/// Answers confirmations and ambiguous scans, on the console or automatically.
#[derive(Debug, Clone, Copy)]
pub struct Prompt {
    interactive: bool,
}

impl Prompt {
    /// An attended prompt if `interactive`, otherwise one that confirms and never picks an
    /// address.
    pub fn new(interactive: bool) -> Self {
        Self { interactive }
    }
}

fn ask(question: &str) -> Option<String> {
    println!("{question}");
    io::stdout().flush().ok()?;
    let mut line = String::new();
    io::stdin().lock().read_line(&mut line).ok()?;
    Some(line.trim().to_owned())
}

impl Confirm for Prompt {
    fn confirm(&mut self, snapshot: &Snapshot) -> bool {
        if !self.interactive {
            return true;
        }
        println!("EEPROM data: {snapshot}");
        println!("Timer registers: {:?}", snapshot.timer());
        let answer = ask("Does the data look sane? Type yes to write zeroes over the timer only:");
        matches!(answer.as_deref().map(str::to_lowercase).as_deref(), Some("yes" | "y"))
    }
}

impl Resolve for Prompt {
    fn resolve(&mut self, candidates: AddressSet) -> Option<BusAddress> {
        if !self.interactive {
            return None;
        }
        println!("Found devices at: {candidates}");
        let answer = ask("Enter the device address (prefix 0x for hexadecimal), empty to abort:")?;
        if answer.is_empty() {
            return None;
        }
        match answer.parse() {
            Ok(addr) => Some(addr),
            Err(e) => {
                println!("{answer:?}: {e}");
                None
            }
        }
    }
}
