//! Line buffer for stdin bytes
//!
//! Stdin is read in raw chunks that may split a line or a multi-byte
//! character; complete lines are drained one at a time.

use log::debug;

/// Accumulates input bytes until a newline arrives
pub struct LineBuffer {
    buffer: Vec<u8>,
}

impl LineBuffer {
    /// Create a new empty line buffer
    pub fn new() -> Self {
        Self { buffer: Vec::new() }
    }

    /// Append raw input
    pub fn write(&mut self, bytes: &[u8]) {
        self.buffer.extend_from_slice(bytes);
    }

    /// Take the next complete line, without its terminator
    ///
    /// `\r\n` and `\n` both end a line. Invalid UTF-8 is replaced rather than
    /// rejected.
    pub fn next_line(&mut self) -> Option<String> {
        let end = self.buffer.iter().position(|&b| b == b'\n')?;
        let mut line: Vec<u8> = self.buffer.drain(..=end).collect();
        line.pop();
        if line.last() == Some(&b'\r') {
            line.pop();
        }
        Some(String::from_utf8_lossy(&line).into_owned())
    }

    /// Take whatever is left, even without a newline (used at EOF)
    pub fn flush(&mut self) -> Option<String> {
        if self.buffer.is_empty() {
            return None;
        }
        debug!("Flushing {} unterminated input bytes", self.buffer.len());
        let rest = std::mem::take(&mut self.buffer);
        Some(String::from_utf8_lossy(&rest).trim_end_matches('\r').to_string())
    }

    pub fn is_empty(&self) -> bool {
        self.buffer.is_empty()
    }

    pub fn len(&self) -> usize {
        self.buffer.len()
    }
}

impl Default for LineBuffer {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_new_buffer() {
        let mut buffer = LineBuffer::new();
        assert!(buffer.is_empty());
        assert_eq!(buffer.next_line(), None);
    }

    #[test]
    fn test_partial_then_complete() {
        let mut buffer = LineBuffer::new();
        buffer.write(b"spe");
        assert_eq!(buffer.next_line(), None);

        buffer.write(b"ak\r\nstop\n");
        assert_eq!(buffer.next_line().as_deref(), Some("speak"));
        assert_eq!(buffer.next_line().as_deref(), Some("stop"));
        assert_eq!(buffer.next_line(), None);
    }

    #[test]
    fn test_split_utf8_character() {
        let text = "text 测试\n".as_bytes();
        let mut buffer = LineBuffer::new();
        buffer.write(&text[..7]);
        buffer.write(&text[7..]);
        assert_eq!(buffer.next_line().as_deref(), Some("text 测试"));
    }

    #[test]
    fn test_flush() {
        let mut buffer = LineBuffer::new();
        buffer.write(b"quit");
        assert_eq!(buffer.len(), 4);
        assert_eq!(buffer.flush().as_deref(), Some("quit"));
        assert!(buffer.is_empty());
        assert_eq!(buffer.flush(), None);
    }
}
