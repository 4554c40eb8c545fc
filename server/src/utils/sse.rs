/// Incremental scanner over a Server-Sent Events byte stream.
///
/// The accounting side of the response tee only cares about event payloads
/// (the concatenated `data:` lines), so this parser yields one `String` per
/// completed event and ignores `id`, `event` and `retry` fields. State is
/// kept between chunks so events split across network reads parse correctly.
#[derive(Debug, Default)]
pub struct SseDataScanner {
    buffer: Vec<u8>,
    data: String,
    has_data: bool,
    bom_checked: bool,
}

impl SseDataScanner {
    pub fn new() -> Self {
        Self::default()
    }

    /// Feeds one chunk and returns the data payloads of all events that
    /// completed inside it.
    pub fn feed(&mut self, chunk: &[u8]) -> Vec<String> {
        self.buffer.extend_from_slice(chunk);

        if !self.bom_checked {
            const BOM: [u8; 3] = [0xEF, 0xBB, 0xBF];
            if self.buffer.len() >= 3 {
                if self.buffer[..3] == BOM {
                    self.buffer.drain(..3);
                }
                self.bom_checked = true;
            } else if self.buffer == BOM[..self.buffer.len()] {
                // Could still turn out to be a BOM; wait for more bytes.
                return Vec::new();
            } else {
                self.bom_checked = true;
            }
        }

        let mut payloads = Vec::new();
        while let Some((end, skip)) = self.find_line_end() {
            let line = String::from_utf8_lossy(&self.buffer[..end]).into_owned();
            self.buffer.drain(..end + skip);

            if line.is_empty() {
                // Blank line terminates the event.
                if self.has_data {
                    payloads.push(std::mem::take(&mut self.data));
                    self.has_data = false;
                }
            } else {
                self.take_line(&line);
            }
        }
        payloads
    }

    fn find_line_end(&self) -> Option<(usize, usize)> {
        for (i, &b) in self.buffer.iter().enumerate() {
            match b {
                b'\n' => return Some((i, 1)),
                b'\r' => {
                    // A trailing \r may be half of \r\n; wait for the next chunk.
                    if i + 1 >= self.buffer.len() {
                        return None;
                    }
                    let skip = if self.buffer[i + 1] == b'\n' { 2 } else { 1 };
                    return Some((i, skip));
                }
                _ => {}
            }
        }
        None
    }

    fn take_line(&mut self, line: &str) {
        if line.starts_with(':') {
            return;
        }
        let (field, value) = match line.split_once(':') {
            Some((f, v)) => (f, v.strip_prefix(' ').unwrap_or(v)),
            None => (line, ""),
        };
        if field == "data" {
            if self.has_data {
                self.data.push('\n');
            }
            self.data.push_str(value);
            self.has_data = true;
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn single_event() {
        let mut scanner = SseDataScanner::new();
        let payloads = scanner.feed(b"data: hello world\n\n");
        assert_eq!(payloads, vec!["hello world".to_string()]);
    }

    #[test]
    fn multiple_events_in_one_chunk() {
        let mut scanner = SseDataScanner::new();
        let payloads = scanner.feed(b"data: first\n\ndata: second\n\n");
        assert_eq!(payloads, vec!["first".to_string(), "second".to_string()]);
    }

    #[test]
    fn event_split_across_chunks() {
        let mut scanner = SseDataScanner::new();
        assert!(scanner.feed(b"data: hel").is_empty());
        assert_eq!(scanner.feed(b"lo\n\n"), vec!["hello".to_string()]);
    }

    #[test]
    fn multiline_data_joined() {
        let mut scanner = SseDataScanner::new();
        let payloads = scanner.feed(b"data: line1\ndata: line2\n\n");
        assert_eq!(payloads, vec!["line1\nline2".to_string()]);
    }

    #[test]
    fn other_fields_and_comments_ignored() {
        let mut scanner = SseDataScanner::new();
        let payloads = scanner.feed(b": keepalive\nid: 7\nevent: delta\ndata: payload\n\n");
        assert_eq!(payloads, vec!["payload".to_string()]);
    }

    #[test]
    fn crlf_split_between_chunks() {
        let mut scanner = SseDataScanner::new();
        assert!(scanner.feed(b"data: test\r").is_empty());
        assert_eq!(scanner.feed(b"\n\r\n"), vec!["test".to_string()]);
    }

    #[test]
    fn mixed_line_endings() {
        let mut scanner = SseDataScanner::new();
        let payloads = scanner.feed(b"data: a\r\ndata: b\r\n\r\ndata: c\n\n");
        assert_eq!(payloads, vec!["a\nb".to_string(), "c".to_string()]);
    }

    #[test]
    fn byte_by_byte() {
        let mut scanner = SseDataScanner::new();
        let mut payloads = Vec::new();
        for b in b"data: hello\n\n" {
            payloads.extend(scanner.feed(&[*b]));
        }
        assert_eq!(payloads, vec!["hello".to_string()]);
    }

    #[test]
    fn bom_skipped_even_when_split() {
        let mut scanner = SseDataScanner::new();
        assert!(scanner.feed(&[0xEF]).is_empty());
        assert!(scanner.feed(&[0xBB]).is_empty());
        assert!(scanner.feed(&[0xBF]).is_empty());
        assert_eq!(scanner.feed(b"data: hello\n\n"), vec!["hello".to_string()]);
    }

    #[test]
    fn blank_lines_without_data_yield_nothing() {
        let mut scanner = SseDataScanner::new();
        assert!(scanner.feed(b"\n\n\n").is_empty());
    }
}
