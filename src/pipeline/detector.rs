use crate::format::{FormatKind, DEFAULT_FORMAT, DETECTION_ORDER};
use tracing::debug;

/// Lines sampled before committing to a format
pub const DETECT_COUNT: usize = 3;

#[derive(Debug, PartialEq)]
pub enum Detection {
    /// Still sampling; nothing to emit yet
    Pending,
    /// A format was chosen; replay these lines (in order) through it
    Committed {
        format: FormatKind,
        replay: Vec<String>,
    },
}

/// First variant (in detection order) that explains every sampled line
pub fn detect_format(lines: &[String]) -> Option<FormatKind> {
    DETECTION_ORDER
        .into_iter()
        .find(|kind| kind.accepts_sample(lines))
}

/// Buffers the first few lines of a session until a format can be chosen
#[derive(Debug, Default)]
pub struct FormatDetector {
    buffer: Vec<String>,
}

impl FormatDetector {
    pub fn new() -> Self {
        Self {
            buffer: Vec::with_capacity(DETECT_COUNT),
        }
    }

    pub fn offer(&mut self, line: String) -> Detection {
        self.buffer.push(line);
        if self.buffer.len() < DETECT_COUNT {
            return Detection::Pending;
        }

        let format = match detect_format(&self.buffer) {
            Some(format) => {
                debug!(format = format.name(), "detected log format");
                format
            }
            None => {
                debug!(format = DEFAULT_FORMAT.name(), "no format matched sample, using default");
                DEFAULT_FORMAT
            }
        };

        Detection::Committed {
            format,
            replay: std::mem::take(&mut self.buffer),
        }
    }

    /// Session closed before the sample filled up
    pub fn flush_default(&mut self) -> Option<Detection> {
        if self.buffer.is_empty() {
            return None;
        }
        Some(Detection::Committed {
            format: DEFAULT_FORMAT,
            replay: std::mem::take(&mut self.buffer),
        })
    }

    /// Drop the sample without emitting it, returning how many lines were lost
    pub fn discard(&mut self) -> usize {
        let dropped = self.buffer.len();
        self.buffer.clear();
        dropped
    }

    pub fn buffered(&self) -> usize {
        self.buffer.len()
    }
}
