use crate::format::field;
use indexmap::IndexMap;
use std::time::Duration;

/// Structured fields extracted from one log line.
///
/// A session keeps a single scratch `Record` and clears it after every
/// render attempt, so nothing from a previous line can leak into the next.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Record {
    fields: IndexMap<&'static str, String>,
    line: String,
}

impl Record {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn get(&self, name: &str) -> Option<&str> {
        self.fields.get(name).map(String::as_str)
    }

    pub fn set(&mut self, name: &'static str, value: impl Into<String>) {
        self.fields.insert(name, value.into());
    }

    pub fn priority(&self) -> &str {
        self.get(field::PRIORITY).unwrap_or_default()
    }

    pub fn tag(&self) -> &str {
        self.get(field::TAG).unwrap_or_default()
    }

    pub fn pid(&self) -> &str {
        self.get(field::PID).unwrap_or_default()
    }

    pub fn message(&self) -> &str {
        self.get(field::MESSAGE).unwrap_or_default()
    }

    /// The record's canonical text, as it appeared in the stream
    pub fn line(&self) -> &str {
        &self.line
    }

    pub fn set_line(&mut self, line: &str) {
        self.line.clear();
        self.line.push_str(line);
    }

    pub fn fields(&self) -> impl Iterator<Item = (&'static str, &str)> {
        self.fields.iter().map(|(k, v)| (*k, v.as_str()))
    }

    pub fn is_empty(&self) -> bool {
        self.fields.is_empty()
    }

    pub fn clear(&mut self) {
        self.fields.clear();
        self.line.clear();
    }

    pub fn to_json(&self) -> serde_json::Value {
        let map: serde_json::Map<String, serde_json::Value> = self
            .fields
            .iter()
            .map(|(k, v)| (k.to_string(), serde_json::Value::String(v.clone())))
            .collect();
        serde_json::Value::Object(map)
    }
}

/// Context passed to each filter predicate
pub struct FilterContext<'a> {
    pub line_number: usize,
    pub profile: Option<&'a str>,
}

/// What the parser made of one line
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ParseOutcome {
    /// Buffer banner, rendered verbatim
    Marker,
    /// The scratch record was populated
    Record,
    /// Line is not part of the committed grammar (or only advanced a
    /// multi-line entry)
    NoMatch,
}

/// Runtime statistics
#[derive(Debug, Default, Clone)]
pub struct ProcessingStats {
    pub lines_read: usize,
    pub markers: usize,
    pub records_matched: usize,
    pub records_output: usize,
    pub records_filtered: usize,
    pub lines_unmatched: usize,
    pub bytes_discarded: usize,
    pub sessions: usize,
    pub processing_time: Duration,
}

impl ProcessingStats {
    pub fn merge(&mut self, other: &ProcessingStats) {
        self.lines_read += other.lines_read;
        self.markers += other.markers;
        self.records_matched += other.records_matched;
        self.records_output += other.records_output;
        self.records_filtered += other.records_filtered;
        self.lines_unmatched += other.lines_unmatched;
        self.bytes_discarded += other.bytes_discarded;
        self.sessions += other.sessions;
        self.processing_time += other.processing_time;
    }
}
