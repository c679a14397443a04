//! Where operator facing lines go.
//!
//! Diagnostics use the `log` facade and end up on stderr. The lines written through [`Output`]
//! are the dump itself.

use std::{
    io::Write,
    sync::{Arc, Mutex},
};

/// A line oriented sink shared by every partition
pub trait Output: Send + Sync {
    /// Writes one line. Lines from different partitions may interleave, but each line is whole.
    fn write_line(&self, line: &str);
}

impl<T: Output + ?Sized> Output for Arc<T> {
    fn write_line(&self, line: &str) {
        (**self).write_line(line)
    }
}

/// Writes lines to the process' standard output
#[derive(Debug, Clone, Copy, Default)]
pub struct Stdout;

impl Output for Stdout {
    fn write_line(&self, line: &str) {
        let mut stdout = std::io::stdout().lock();
        if let Err(err) = writeln!(stdout, "{}", line) {
            log::error!("Failed to write to stdout: {}", err);
        }
    }
}

/// Keeps lines in memory. Clones share the same buffer.
#[derive(Debug, Clone, Default)]
pub struct MemoryOutput {
    lines: Arc<Mutex<Vec<String>>>,
}

impl MemoryOutput {
    /// Creates an empty buffer
    pub fn new() -> Self {
        Default::default()
    }

    /// A copy of every line written so far
    pub fn lines(&self) -> Vec<String> {
        self.lines
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
            .clone()
    }
}

impl Output for MemoryOutput {
    fn write_line(&self, line: &str) {
        self.lines
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
            .push(line.to_string());
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn memory_output_clones_share_lines() {
        let output = MemoryOutput::new();
        let shared: Arc<dyn Output> = Arc::new(output.clone());
        shared.write_line("first");
        shared.write_line("second");
        assert_eq!(output.lines(), vec!["first", "second"]);
    }
}
