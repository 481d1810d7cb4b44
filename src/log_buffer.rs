//! Bounded, oldest-trimmed history of lines shown in the log view.
//!
//! The buffer knows nothing about rendering: the GUI iterates it every frame
//! and the console pushes into it. Pushing past capacity drops lines from the
//! front, so the buffer always holds the most recent `capacity` lines in
//! arrival order.

use chrono::{DateTime, Local};
use std::collections::VecDeque;

/// What produced a log line. Only used for colouring.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LineKind {
    /// Text received from the device
    Received,
    /// Echo of a command written to the device
    Sent,
    /// Connection status messages
    Status,
    /// A failed open, write or read
    Error,
}

/// One line of the log view.
#[derive(Debug, Clone, PartialEq)]
pub struct LogLine {
    /// Local time the line was appended
    pub timestamp: DateTime<Local>,
    /// Origin of the line
    pub kind: LineKind,
    /// The text, without a trailing newline
    pub text: String,
}

impl LogLine {
    /// Stamp `text` with the current local time.
    pub fn new(kind: LineKind, text: impl Into<String>) -> Self {
        Self {
            timestamp: Local::now(),
            kind,
            text: text.into(),
        }
    }
}

/// Fixed-capacity deque of [`LogLine`]s.
#[derive(Debug, Clone)]
pub struct LogBuffer {
    lines: VecDeque<LogLine>,
    capacity: usize,
}

impl LogBuffer {
    /// Create an empty buffer. A capacity of zero is treated as one.
    pub fn new(capacity: usize) -> Self {
        let capacity = capacity.max(1);
        Self {
            lines: VecDeque::with_capacity(capacity),
            capacity,
        }
    }

    /// Append a line, dropping the oldest ones past capacity.
    pub fn push(&mut self, line: LogLine) {
        self.lines.push_back(line);
        while self.lines.len() > self.capacity {
            self.lines.pop_front();
        }
    }

    /// Shorthand for `push(LogLine::new(kind, text))`.
    pub fn append(&mut self, kind: LineKind, text: impl Into<String>) {
        self.push(LogLine::new(kind, text));
    }

    /// Lines from oldest to newest.
    pub fn iter(&self) -> impl ExactSizeIterator<Item = &LogLine> + '_ {
        self.lines.iter()
    }

    /// Line at `index`, oldest first.
    pub fn get(&self, index: usize) -> Option<&LogLine> {
        self.lines.get(index)
    }

    /// Text of every line, oldest first.
    pub fn lines(&self) -> Vec<&str> {
        self.lines.iter().map(|line| line.text.as_str()).collect()
    }

    /// Number of lines currently held.
    pub fn len(&self) -> usize {
        self.lines.len()
    }

    /// True when no line has been kept.
    pub fn is_empty(&self) -> bool {
        self.lines.is_empty()
    }

    /// Maximum number of lines held.
    pub fn capacity(&self) -> usize {
        self.capacity
    }

    /// Drop every line.
    pub fn clear(&mut self) {
        self.lines.clear();
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_push_below_capacity_keeps_everything() {
        let mut buffer = LogBuffer::new(5);
        buffer.append(LineKind::Received, "a");
        buffer.append(LineKind::Sent, "b");
        assert_eq!(buffer.len(), 2);
        assert_eq!(buffer.lines(), vec!["a", "b"]);
    }

    #[test]
    fn test_overflow_keeps_most_recent_in_order() {
        let mut buffer = LogBuffer::new(100);
        for i in 0..250 {
            buffer.append(LineKind::Received, format!("line {i}"));
        }
        assert_eq!(buffer.len(), 100);
        assert_eq!(buffer.get(0).unwrap().text, "line 150");
        assert_eq!(buffer.get(99).unwrap().text, "line 249");

        let texts = buffer.lines();
        let expected: Vec<String> = (150..250).map(|i| format!("line {i}")).collect();
        assert_eq!(texts, expected.iter().map(String::as_str).collect::<Vec<_>>());
    }

    #[test]
    fn test_length_never_exceeds_capacity() {
        let mut buffer = LogBuffer::new(3);
        for i in 0..10 {
            buffer.append(LineKind::Status, i.to_string());
            assert!(buffer.len() <= buffer.capacity());
        }
    }

    #[test]
    fn test_zero_capacity_is_clamped() {
        let mut buffer = LogBuffer::new(0);
        assert_eq!(buffer.capacity(), 1);
        buffer.append(LineKind::Received, "x");
        buffer.append(LineKind::Received, "y");
        assert_eq!(buffer.lines(), vec!["y"]);
    }

    #[test]
    fn test_clear() {
        let mut buffer = LogBuffer::new(4);
        buffer.append(LineKind::Error, "boom");
        buffer.clear();
        assert!(buffer.is_empty());
        assert_eq!(buffer.capacity(), 4);
    }
}
