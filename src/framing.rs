use std::fmt::Write as _;

pub const LINE_TERMINATOR: u8 = b'\n';

/// Turns an arbitrary byte stream into terminator-delimited text lines.
///
/// Bytes are kept raw until a terminator arrives so that a multi-byte
/// character split across two reads still decodes cleanly.
#[derive(Debug, Default)]
pub struct LineFramer {
    pending: Vec<u8>,
    lines_emitted: usize,
}

impl LineFramer {
    pub fn new() -> Self {
        Self::default()
    }

    /// Append a chunk and return every line it completes, in order
    pub fn push(&mut self, chunk: &[u8]) -> Vec<String> {
        let mut lines = Vec::new();
        // Only the newly appended bytes can contain a fresh terminator
        let mut search = self.pending.len();
        let mut consumed = 0;
        self.pending.extend_from_slice(chunk);

        while let Some(offset) = self.pending[search..]
            .iter()
            .position(|&b| b == LINE_TERMINATOR)
        {
            let end = search + offset;
            lines.push(decode_line(&self.pending[consumed..end]));
            consumed = end + 1;
            search = consumed;
        }
        if consumed > 0 {
            self.pending.drain(..consumed);
        }

        self.lines_emitted += lines.len();
        lines
    }

    /// End of stream: drop the unterminated remainder, returning its size
    pub fn finish(&mut self) -> usize {
        let discarded = self.pending.len();
        self.pending.clear();
        discarded
    }

    pub fn lines_emitted(&self) -> usize {
        self.lines_emitted
    }

    pub fn has_partial(&self) -> bool {
        !self.pending.is_empty()
    }
}

/// Decode one line, escaping undecodable bytes as `\xNN` and dropping
/// trailing carriage returns.
pub fn decode_line(raw: &[u8]) -> String {
    let mut line = String::with_capacity(raw.len());
    for chunk in raw.utf8_chunks() {
        line.push_str(chunk.valid());
        for byte in chunk.invalid() {
            let _ = write!(line, "\\x{:02x}", byte);
        }
    }
    let trimmed = line.trim_end_matches('\r').len();
    line.truncate(trimmed);
    line
}
