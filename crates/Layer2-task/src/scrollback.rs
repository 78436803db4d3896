//! Scrollback buffer - bounded per-task output history
//!
//! Append-only text log with a fixed byte cap. Eviction removes the oldest
//! data first, so a subscriber attaching late always sees the most recent
//! output a process produced. Raw ANSI sequences are kept as-is; the buffer
//! is replayed into terminal renderers.

/// Scrollback retained per task
pub const DEFAULT_SCROLLBACK_BYTES: usize = 250_000;

#[derive(Debug)]
pub struct ScrollbackBuffer {
    data: String,
    max_bytes: usize,
}

impl ScrollbackBuffer {
    pub fn new(max_bytes: usize) -> Self {
        Self {
            data: String::new(),
            max_bytes,
        }
    }

    /// Append a chunk, evicting from the front once the cap is exceeded.
    ///
    /// The cut point is nudged forward to the next char boundary, so the
    /// retained length never exceeds `max_bytes` and never splits a
    /// multi-byte sequence.
    pub fn push(&mut self, chunk: &str) {
        self.data.push_str(chunk);
        if self.data.len() > self.max_bytes {
            let mut cut = self.data.len() - self.max_bytes;
            while !self.data.is_char_boundary(cut) {
                cut += 1;
            }
            self.data.drain(..cut);
        }
    }

    pub fn contents(&self) -> &str {
        &self.data
    }

    pub fn len(&self) -> usize {
        self.data.len()
    }

    pub fn is_empty(&self) -> bool {
        self.data.is_empty()
    }

    pub fn clear(&mut self) {
        self.data.clear();
    }
}

impl Default for ScrollbackBuffer {
    fn default() -> Self {
        Self::new(DEFAULT_SCROLLBACK_BYTES)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_append_below_cap() {
        let mut buf = ScrollbackBuffer::new(16);
        buf.push("hello ");
        buf.push("world");
        assert_eq!(buf.contents(), "hello world");
        assert_eq!(buf.len(), 11);
    }

    #[test]
    fn test_eviction_keeps_most_recent() {
        let mut buf = ScrollbackBuffer::new(8);
        buf.push("abcdefgh");
        buf.push("ij");
        assert_eq!(buf.contents(), "cdefghij");
        assert_eq!(buf.len(), 8);
    }

    #[test]
    fn test_oversized_chunk_keeps_tail() {
        let mut buf = ScrollbackBuffer::new(4);
        buf.push("0123456789");
        assert_eq!(buf.contents(), "6789");
    }

    #[test]
    fn test_cap_round_trip_at_default_size() {
        let mut buf = ScrollbackBuffer::default();
        buf.push(&"a".repeat(DEFAULT_SCROLLBACK_BYTES));
        buf.push("XYZ");
        assert_eq!(buf.len(), DEFAULT_SCROLLBACK_BYTES);
        assert!(buf.contents().ends_with("XYZ"));
        assert!(buf.contents().starts_with('a'));
    }

    #[test]
    fn test_eviction_respects_char_boundaries() {
        let mut buf = ScrollbackBuffer::new(4);
        buf.push("ab");
        buf.push("éé");
        assert_eq!(buf.contents(), "éé");
        buf.push("x");
        // cutting one byte would split the leading 'é'
        assert_eq!(buf.contents(), "éx");
        assert!(buf.len() <= 4);
    }

    #[test]
    fn test_clear_resets_but_keeps_cap() {
        let mut buf = ScrollbackBuffer::new(8);
        buf.push("abcdefghij");
        buf.clear();
        assert!(buf.is_empty());
        buf.push("0123456789");
        assert_eq!(buf.contents(), "23456789");
    }
}
