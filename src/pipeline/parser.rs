use crate::format::{field, is_marker, FormatKind};
use crate::pipeline::context::{ParseOutcome, Record};

/// Applies the committed format to each line of a session
#[derive(Debug)]
pub struct RecordParser {
    format: FormatKind,
    entry: Option<LongEntry>,
}

/// Header of the `long` entry currently being read
#[derive(Debug)]
struct LongEntry {
    header: Record,
    emitted: bool,
}

impl RecordParser {
    pub fn new(format: FormatKind) -> Self {
        Self {
            format,
            entry: None,
        }
    }

    pub fn format(&self) -> FormatKind {
        self.format
    }

    /// Parse `line` into `scratch`. The scratch record is only written to
    /// when the outcome is [`ParseOutcome::Record`].
    pub fn parse(&mut self, line: &str, scratch: &mut Record) -> ParseOutcome {
        if is_marker(line) {
            return ParseOutcome::Marker;
        }

        if self.format.is_multiline() {
            return self.parse_long(line, scratch);
        }

        if self.format.extract(line, scratch) {
            ParseOutcome::Record
        } else {
            ParseOutcome::NoMatch
        }
    }

    fn parse_long(&mut self, line: &str, scratch: &mut Record) -> ParseOutcome {
        let mut header = Record::new();
        if self.format.extract(line, &mut header) {
            self.entry = Some(LongEntry {
                header,
                emitted: false,
            });
            return ParseOutcome::NoMatch;
        }

        let Some(entry) = self.entry.as_mut() else {
            return ParseOutcome::NoMatch;
        };

        if line.is_empty() {
            // blank separator closes the entry once its message was seen
            if entry.emitted {
                self.entry = None;
            }
            return ParseOutcome::NoMatch;
        }

        for (name, value) in entry.header.fields() {
            scratch.set(name, value);
        }
        scratch.set(field::MESSAGE, line);
        if entry.emitted {
            scratch.set_line(line);
        } else {
            scratch.set_line(&format!("{}\n{}", entry.header.line(), line));
            entry.emitted = true;
        }
        ParseOutcome::Record
    }
}
