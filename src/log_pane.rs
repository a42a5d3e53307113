//! Scrolling, timestamped log shown to the user
//!
//! Every engine and controller message ends up here as `[HH:MM:SS] message`.
//! Appending must never take the harness down, so output failures are only
//! reported to the diagnostic log.

use crate::engine::LogSink;
use crate::lock;
use chrono::Local;
use log::trace;
use std::collections::VecDeque;
use std::io::{self, Write};
use std::sync::{Arc, Mutex};

/// Lines kept for the `log` command
pub const DEFAULT_CAPACITY: usize = 500;

/// Bounded in-memory log, optionally echoed to stdout
pub struct LogPane {
    lines: Mutex<VecDeque<String>>,
    capacity: usize,
    echo: bool,
}

impl LogPane {
    pub fn new(capacity: usize, echo: bool) -> Self {
        Self {
            lines: Mutex::new(VecDeque::with_capacity(capacity.min(1024))),
            capacity: capacity.max(1),
            echo,
        }
    }

    /// A pane that only keeps lines in memory
    pub fn quiet() -> Self {
        Self::new(DEFAULT_CAPACITY, false)
    }

    /// Append a message with the current local time
    pub fn append(&self, message: &str) {
        let line = format!("[{}] {}", Local::now().format("%H:%M:%S"), message);

        if self.echo {
            if let Err(e) = writeln!(io::stdout(), "{}", line) {
                trace!("Failed to write log line to terminal: {}", e);
            }
        }

        let mut lines = lock(&self.lines);
        if lines.len() == self.capacity {
            lines.pop_front();
        }
        lines.push_back(line);
    }

    /// A sink that appends to this pane
    pub fn sink(self: &Arc<Self>) -> LogSink {
        let pane = Arc::clone(self);
        Arc::new(move |message: &str| pane.append(message))
    }

    /// Show a message that needs the user's attention
    ///
    /// Stands in for a modal dialog: the message is logged and printed as a
    /// framed block on stderr.
    pub fn notify(&self, title: &str, message: &str) {
        self.append(&format!("{}: {}", title, message));

        let mut stderr = io::stderr().lock();
        let result = writeln!(stderr, "\n*** {} ***\n{}\n", title, message);
        if let Err(e) = result {
            trace!("Failed to show notification: {}", e);
        }
    }

    /// The most recent `count` lines, oldest first
    pub fn tail(&self, count: usize) -> Vec<String> {
        let lines = lock(&self.lines);
        let skip = lines.len().saturating_sub(count);
        lines.iter().skip(skip).cloned().collect()
    }

    pub fn len(&self) -> usize {
        lock(&self.lines).len()
    }

    pub fn is_empty(&self) -> bool {
        lock(&self.lines).is_empty()
    }

    /// Lines containing `needle`
    pub fn count_matching(&self, needle: &str) -> usize {
        lock(&self.lines)
            .iter()
            .filter(|line| line.contains(needle))
            .count()
    }
}

impl Default for LogPane {
    fn default() -> Self {
        Self::new(DEFAULT_CAPACITY, true)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use regex::Regex;

    #[test]
    fn test_append_timestamp_format() {
        let pane = LogPane::quiet();
        pane.append("hello");

        let lines = pane.tail(1);
        let re = Regex::new(r"^\[\d{2}:\d{2}:\d{2}\] hello$").unwrap();
        assert!(re.is_match(&lines[0]), "unexpected line {:?}", lines[0]);
    }

    #[test]
    fn test_capacity_drops_oldest() {
        let pane = LogPane::new(3, false);
        for i in 0..5 {
            pane.append(&format!("line {}", i));
        }
        assert_eq!(pane.len(), 3);

        let lines = pane.tail(10);
        assert!(lines[0].ends_with("line 2"));
        assert!(lines[2].ends_with("line 4"));
    }

    #[test]
    fn test_sink_appends() {
        let pane = Arc::new(LogPane::quiet());
        let sink = pane.sink();
        sink("from sink");
        sink("again");
        assert_eq!(pane.count_matching("sink"), 1);
        assert_eq!(pane.len(), 2);
    }

    #[test]
    fn test_tail_fewer_than_requested() {
        let pane = LogPane::quiet();
        assert!(pane.is_empty());
        pane.append("only");
        assert_eq!(pane.tail(5).len(), 1);
    }
}
