use crate::error::ProcessingError;
use crate::format::FormatKind;
use crate::pipeline::config::{LayoutMode, PipelineConfig};
use crate::pipeline::context::Record;

/// Turns parsed records and marker lines into output text.
///
/// Returned strings carry no trailing newline; the stream writes exactly one
/// after each. `None` means nothing is written for that line.
pub trait LineLayout: Send {
    fn layout_record(
        &mut self,
        record: &Record,
        line_number: usize,
    ) -> Result<Option<String>, ProcessingError>;

    fn layout_marker(&self, line: &str) -> Option<String>;

    fn name(&self) -> &str;
}

/// Pick the layout for a session once its format is known
pub fn build_layout(format: FormatKind, config: &PipelineConfig) -> Box<dyn LineLayout> {
    match config.layout {
        LayoutMode::Plain => Box::new(PlainLayout),
        LayoutMode::Color => Box::new(ColumnLayout::new(format, config)),
    }
}

pub mod column;
pub mod plain;

pub use column::ColumnLayout;
pub use plain::PlainLayout;
