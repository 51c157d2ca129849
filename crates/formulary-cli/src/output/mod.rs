//! Terminal output formatting.
//!
//! Every command reports through [`OutputHandler`] so colour handling and
//! stream selection stay consistent.

pub mod colors;
pub mod errors;

use std::io::Write;

/// Output handler for consistent terminal formatting
pub struct OutputHandler {
    colors: colors::ColorSupport,
}

impl OutputHandler {
    /// Create a new output handler
    pub fn new() -> Self {
        Self {
            colors: colors::ColorSupport::detect(),
        }
    }

    /// Print an info message
    pub fn info(&self, message: &str) {
        println!("{}", self.colors.dim(message));
    }

    /// Print a success message
    pub fn success(&self, message: &str) {
        println!("{} {}", self.colors.green("✓"), message);
    }

    /// Print a warning message
    pub fn warn(&self, message: &str) {
        println!("{} {}", self.colors.yellow("⚠"), message);
    }

    /// Print an error message
    pub fn error(&self, message: &str) {
        eprintln!("{} {}", self.colors.red("✗"), message);
    }

    /// Print a step message with a leading marker
    pub fn step(&self, marker: &str, message: &str) {
        println!("{} {}", marker, message);
    }

    /// Print a line of plain content
    pub fn line(&self, message: &str) {
        println!("{}", message);
    }

    /// Print a `label: value` pair with the label dimmed
    pub fn field(&self, label: &str, value: &str) {
        println!("  {} {}", self.colors.dim(&format!("{}:", label)), value);
    }

    /// Print a question on stderr and leave the cursor after it
    pub fn prompt(&self, message: &str) {
        eprint!("{} {} ", self.colors.yellow("?"), message);
        let _ = std::io::stderr().flush();
    }
}

impl Default for OutputHandler {
    fn default() -> Self {
        Self::new()
    }
}
