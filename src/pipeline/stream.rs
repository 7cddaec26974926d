// src/pipeline/stream.rs
use std::io::Write;
use std::sync::Arc;
use std::time::Instant;
use tracing::{debug, trace};

use crate::error::ProcessingError;
use crate::format::FormatKind;
use crate::formatters::{build_layout, LineLayout};
use crate::framing::LineFramer;
use crate::pipeline::config::PipelineConfig;
use crate::pipeline::context::{FilterContext, ParseOutcome, ProcessingStats, Record};
use crate::pipeline::detector::{Detection, FormatDetector};
use crate::pipeline::filters::FilterStage;
use crate::pipeline::parser::RecordParser;

/// Format and layout a finished session hands to the next one
pub struct Committed {
    pub format: FormatKind,
    pub layout: Box<dyn LineLayout>,
}

struct Active {
    parser: RecordParser,
    layout: Box<dyn LineLayout>,
}

/// One session's framer → detector → parser → filters → layout chain
pub struct LogStream {
    config: PipelineConfig,
    filters: Arc<FilterStage>,
    framer: LineFramer,
    detector: FormatDetector,
    active: Option<Active>,
    scratch: Record,
    line_number: usize,
    stats: ProcessingStats,
    started: Instant,
}

impl LogStream {
    /// `carried` skips detection entirely; otherwise a forced format in
    /// `config` does, and failing both the first lines are sampled
    pub fn new(
        config: PipelineConfig,
        filters: Arc<FilterStage>,
        carried: Option<Committed>,
    ) -> Self {
        let active = match (carried, config.format) {
            (Some(committed), _) => Some(Active {
                parser: RecordParser::new(committed.format),
                layout: committed.layout,
            }),
            (None, Some(format)) => Some(Active {
                parser: RecordParser::new(format),
                layout: build_layout(format, &config),
            }),
            (None, None) => None,
        };

        LogStream {
            config,
            filters,
            framer: LineFramer::new(),
            detector: FormatDetector::new(),
            active,
            scratch: Record::new(),
            line_number: 0,
            stats: ProcessingStats::default(),
            started: Instant::now(),
        }
    }

    pub fn format(&self) -> Option<FormatKind> {
        self.active.as_ref().map(|active| active.parser.format())
    }

    pub fn stats(&self) -> &ProcessingStats {
        &self.stats
    }

    /// Process every complete line in `chunk`
    pub fn feed<W: Write>(&mut self, chunk: &[u8], output: &mut W) -> Result<(), ProcessingError> {
        for line in self.framer.push(chunk) {
            self.process_line(line, output)?;
        }
        output.flush()?;
        Ok(())
    }

    pub fn process_line<W: Write>(
        &mut self,
        line: String,
        output: &mut W,
    ) -> Result<(), ProcessingError> {
        self.stats.lines_read += 1;

        if self.active.is_some() {
            return self.render_line(&line, output);
        }

        match self.detector.offer(line) {
            Detection::Pending => Ok(()),
            Detection::Committed { format, replay } => self.commit_and_replay(format, replay, output),
        }
    }

    /// End of stream: drop any partial line and flush an under-sampled
    /// detection buffer through the default format
    pub fn finish<W: Write>(&mut self, output: &mut W) -> Result<ProcessingStats, ProcessingError> {
        let discarded = self.framer.finish();
        if discarded > 0 {
            debug!(bytes = discarded, "discarding unterminated trailing data");
            self.stats.bytes_discarded += discarded;
        }

        if let Some(Detection::Committed { format, replay }) = self.detector.flush_default() {
            debug!(
                lines = replay.len(),
                format = format.name(),
                "session closed before detection, using default format"
            );
            self.commit_and_replay(format, replay, output)?;
        }

        output.flush()?;
        self.stats.processing_time = self.started.elapsed();
        Ok(self.stats.clone())
    }

    /// Interrupted: nothing still pending is emitted
    pub fn abandon(&mut self) -> ProcessingStats {
        let dropped = self.detector.discard();
        let discarded = self.framer.finish();
        if dropped > 0 || discarded > 0 {
            debug!(lines = dropped, bytes = discarded, "abandoning session");
        }
        self.stats.bytes_discarded += discarded;
        self.stats.processing_time = self.started.elapsed();
        self.stats.clone()
    }

    /// Hand the committed format and layout on to the next session
    pub fn carry(self) -> Option<Committed> {
        self.active.map(|active| Committed {
            format: active.parser.format(),
            layout: active.layout,
        })
    }

    fn commit_and_replay<W: Write>(
        &mut self,
        format: FormatKind,
        replay: Vec<String>,
        output: &mut W,
    ) -> Result<(), ProcessingError> {
        self.active = Some(Active {
            parser: RecordParser::new(format),
            layout: build_layout(format, &self.config),
        });
        for line in replay {
            self.render_line(&line, output)?;
        }
        Ok(())
    }

    fn render_line<W: Write>(&mut self, line: &str, output: &mut W) -> Result<(), ProcessingError> {
        let Some(active) = self.active.as_mut() else {
            return Ok(());
        };
        self.line_number += 1;
        let line_number = self.line_number;

        let result = match active.parser.parse(line, &mut self.scratch) {
            ParseOutcome::Marker => {
                self.stats.markers += 1;
                match active.layout.layout_marker(line) {
                    Some(text) => write_line(output, &text),
                    None => Ok(()),
                }
            }
            ParseOutcome::NoMatch => {
                trace!(line = line_number, "line does not match {}", active.parser.format());
                self.stats.lines_unmatched += 1;
                Ok(())
            }
            ParseOutcome::Record => {
                self.stats.records_matched += 1;
                let ctx = FilterContext {
                    line_number,
                    profile: self.config.profile.as_deref(),
                };
                if self.filters.accept(&self.scratch, &ctx) {
                    match active.layout.layout_record(&self.scratch, line_number) {
                        Ok(Some(text)) => {
                            self.stats.records_output += 1;
                            write_line(output, &text)
                        }
                        Ok(None) => Ok(()),
                        Err(e) => Err(e),
                    }
                } else {
                    self.stats.records_filtered += 1;
                    Ok(())
                }
            }
        };

        self.scratch.clear();
        result
    }
}

fn write_line<W: Write>(output: &mut W, text: &str) -> Result<(), ProcessingError> {
    output.write_all(text.as_bytes())?;
    output.write_all(b"\n")?;
    Ok(())
}
