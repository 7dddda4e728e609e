//! Console log buffer
//!
//! Ordered, append-only store of raw console lines (ANSI codes intact).
//! The only operation that may shrink or reorder it is [`LogBuffer::replace_all`],
//! used for the history replay the daemon sends after authentication.

use chrono::Utc;
use serde::{Deserialize, Serialize};

/// Single line of console output
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ConsoleLine {
    /// Raw text, escape sequences preserved
    pub text: String,
    /// Capture time (Unix milliseconds)
    pub timestamp: u64,
}

impl ConsoleLine {
    /// Create a new console line with current timestamp
    pub fn new(text: impl Into<String>) -> Self {
        Self {
            text: text.into(),
            timestamp: Utc::now().timestamp_millis() as u64,
        }
    }
}

/// Buffer statistics
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct BufferStats {
    /// Current number of lines in buffer
    pub current_lines: usize,
    /// Total lines ever written, replayed history included
    pub total_lines: u64,
    /// Number of wholesale replacements
    pub replacements: u64,
}

#[derive(Debug, Default)]
pub struct LogBuffer {
    lines: Vec<ConsoleLine>,
    total_lines: u64,
    replacements: u64,
}

impl LogBuffer {
    pub fn new() -> Self {
        Self::default()
    }

    /// Append a new line to the end of the buffer
    pub fn append(&mut self, text: impl Into<String>) -> &ConsoleLine {
        self.lines.push(ConsoleLine::new(text));
        self.total_lines += 1;
        &self.lines[self.lines.len() - 1]
    }

    /// Replace the whole buffer with replayed history, keeping its order
    pub fn replace_all<I>(&mut self, history: I)
    where
        I: IntoIterator<Item = String>,
    {
        self.lines = history.into_iter().map(ConsoleLine::new).collect();
        self.total_lines += self.lines.len() as u64;
        self.replacements += 1;
    }

    pub fn lines(&self) -> &[ConsoleLine] {
        &self.lines
    }

    /// Get the last N lines from the buffer
    pub fn tail(&self, count: usize) -> &[ConsoleLine] {
        let start = self.lines.len().saturating_sub(count);
        &self.lines[start..]
    }

    pub fn len(&self) -> usize {
        self.lines.len()
    }

    pub fn is_empty(&self) -> bool {
        self.lines.is_empty()
    }

    pub fn stats(&self) -> BufferStats {
        BufferStats {
            current_lines: self.lines.len(),
            total_lines: self.total_lines,
            replacements: self.replacements,
        }
    }
}
