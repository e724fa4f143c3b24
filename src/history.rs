use std::collections::VecDeque;
use std::io::{self, Write};

use crate::line::BoundedLine;

/// Fixed-size sliding window over the most recent input lines.
///
/// Recording into a full buffer evicts the oldest entry; entries are never
/// rejected.
#[derive(Debug, Clone)]
pub struct History {
    entries: VecDeque<BoundedLine>,
    capacity: usize,
    line_capacity: usize,
}

impl History {
    pub fn new(capacity: usize, line_capacity: usize) -> Self {
        Self {
            entries: VecDeque::with_capacity(capacity),
            capacity,
            line_capacity,
        }
    }

    /// Append `line`, bounded to the line capacity, dropping the oldest entry
    /// when the buffer is full.
    pub fn record(&mut self, line: &str) {
        if self.capacity == 0 {
            return;
        }
        if self.entries.len() == self.capacity {
            self.entries.pop_front();
        }
        self.entries
            .push_back(BoundedLine::new(line, self.line_capacity));
    }

    /// Write the 1-indexed listing, oldest first.
    pub fn show(&self, out: &mut dyn Write) -> io::Result<()> {
        writeln!(out, "Command History:")?;
        for (i, entry) in self.iter().enumerate() {
            writeln!(out, "{}: {}", i + 1, entry)?;
        }
        Ok(())
    }

    pub fn iter(&self) -> impl Iterator<Item = &str> {
        self.entries.iter().map(BoundedLine::as_str)
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn capacity(&self) -> usize {
        self.capacity
    }
}
