use crate::format::FormatKind;

/// Configuration for one session's pipeline (read-only for its lifetime)
#[derive(Debug, Clone)]
pub struct PipelineConfig {
    /// Forced format; `None` means auto-detect
    pub format: Option<FormatKind>,
    pub layout: LayoutMode,
    pub width: usize,
    pub wrap: bool,
    pub columns: ColumnWidths,
    /// Carry the committed format and layout into the next session
    pub reuse_format: bool,
    pub buffer_size: usize,
    pub profile: Option<String>,
}

impl Default for PipelineConfig {
    fn default() -> Self {
        PipelineConfig {
            format: None,
            layout: LayoutMode::Color,
            width: 80,
            wrap: true,
            columns: ColumnWidths::default(),
            reuse_format: false,
            buffer_size: 65536, // 64KB
            profile: None,
        }
    }
}

/// Picked once per session, never per line
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LayoutMode {
    /// Columns, colors and wrapping
    Color,
    /// Canonical text only
    Plain,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ColumnWidths {
    pub timestamp: usize,
    pub pid: usize,
    pub tid: usize,
    pub tag: usize,
    pub priority: usize,
}

impl Default for ColumnWidths {
    fn default() -> Self {
        ColumnWidths {
            timestamp: 18, // "01-02 03:04:05.678"
            pid: 8,
            tid: 8,
            tag: 20,
            priority: 3,
        }
    }
}
