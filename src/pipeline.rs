// src/pipeline.rs - per-session line pipeline
pub mod config;
pub mod context;
pub mod detector;
pub mod filters;
pub mod parser;
pub mod stream;

pub use config::{ColumnWidths, LayoutMode, PipelineConfig};
pub use context::{FilterContext, ParseOutcome, ProcessingStats, Record};
pub use detector::{Detection, FormatDetector, DETECT_COUNT};
pub use filters::{FilterPredicate, FilterStage};
pub use parser::RecordParser;
pub use stream::{Committed, LogStream};
