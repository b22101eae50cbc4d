//! Argument parsing and output for each skillkit binary.
//!
//! Every tool exposes a clap [`Parser`](clap::Parser) named `Cli` and an async
//! `run(cli)` that the binary (and the integration tests) call. Business logic
//! stays in `skillkit-core`; these modules only turn flags into client calls and
//! responses into text.

pub mod confluence;
pub mod convert;
pub mod gworkspace;
pub mod image;
pub mod jira;

use std::io::BufRead;
use std::path::Path;

use anyhow::{Context, Result};
use skillkit_core::config::Settings;

/// Loads tool settings from `--config`, `SKILLKIT_CONFIG` or defaults.
pub fn load_settings(config: Option<&Path>) -> Result<Settings> {
    Settings::load(config).context("Failed to load skillkit settings")
}

/// Asks a yes/no question on stdout and reads the answer from `input`. Anything but `y`/`yes` is no.
pub fn confirm<R: BufRead>(prompt: &str, input: &mut R) -> Result<bool> {
    use std::io::Write;
    print!("{prompt} [y/N]: ");
    std::io::stdout().flush()?;
    let mut answer = String::new();
    input.read_line(&mut answer)?;
    let answer = answer.trim().to_ascii_lowercase();
    Ok(answer == "y" || answer == "yes")
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Cursor;

    #[test]
    fn confirm_accepts_only_yes() {
        assert!(confirm("Delete?", &mut Cursor::new("y\n")).unwrap());
        assert!(confirm("Delete?", &mut Cursor::new("YES\n")).unwrap());
        assert!(!confirm("Delete?", &mut Cursor::new("\n")).unwrap());
        assert!(!confirm("Delete?", &mut Cursor::new("")).unwrap());
    }
}
