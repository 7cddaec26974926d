use crate::colors::ColorScheme;
use crate::error::ProcessingError;
use crate::format::{field, FormatKind};
use crate::formatters::LineLayout;
use crate::pipeline::config::{ColumnWidths, PipelineConfig};
use crate::pipeline::context::Record;
use std::collections::HashMap;

/// Narrowest message column worth wrapping into
const MIN_MESSAGE_WIDTH: usize = 10;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Column {
    Timestamp,
    Pid,
    Tid,
    Tag,
    Priority,
}

/// Colorized fixed-width columns followed by the (optionally wrapped) message
pub struct ColumnLayout {
    colors: ColorScheme,
    columns: Vec<Column>,
    widths: ColumnWidths,
    width: usize,
    wrap: bool,
    tag_colors: HashMap<String, &'static str>,
}

impl ColumnLayout {
    pub fn new(format: FormatKind, config: &PipelineConfig) -> Self {
        Self::with_colors(format, config, ColorScheme::new(true))
    }

    pub fn with_colors(format: FormatKind, config: &PipelineConfig, colors: ColorScheme) -> Self {
        Self {
            colors,
            columns: columns_for(format),
            widths: config.columns,
            width: config.width,
            wrap: config.wrap,
            tag_colors: HashMap::new(),
        }
    }

    /// Visible width of everything left of the message
    fn prefix_width(&self) -> usize {
        self.columns
            .iter()
            .map(|column| self.column_width(*column) + 1)
            .sum()
    }

    fn column_width(&self, column: Column) -> usize {
        match column {
            Column::Timestamp => self.widths.timestamp,
            Column::Pid => self.widths.pid,
            Column::Tid => self.widths.tid,
            Column::Tag => self.widths.tag,
            Column::Priority => self.widths.priority,
        }
    }

    /// Tags keep the color they were first given for the whole session
    fn tag_color(&mut self, tag: &str) -> &'static str {
        if self.colors.tags.is_empty() {
            return "";
        }
        if let Some(color) = self.tag_colors.get(tag) {
            return *color;
        }
        let color = self.colors.tags[self.tag_colors.len() % self.colors.tags.len()];
        self.tag_colors.insert(tag.to_string(), color);
        color
    }

    fn paint(&self, color: &str, text: &str) -> String {
        if color.is_empty() {
            text.to_string()
        } else {
            format!("{}{}{}", color, text, self.colors.reset)
        }
    }

    fn render_column(
        &mut self,
        column: Column,
        record: &Record,
        line_number: usize,
    ) -> Result<String, ProcessingError> {
        let width = self.column_width(column);
        let text = match column {
            Column::Timestamp => {
                let date = required(record, field::DATE, line_number)?;
                let time = required(record, field::TIME, line_number)?;
                let stamp = format!("{} {}", date, time);
                self.paint(self.colors.timestamp, &pad_right(&stamp, width))
            }
            Column::Pid => {
                let pid = required(record, field::PID, line_number)?;
                self.paint(self.colors.pid, &pad_left(pid, width))
            }
            Column::Tid => {
                let tid = required(record, field::TID, line_number)?;
                self.paint(self.colors.tid, &pad_left(tid, width))
            }
            Column::Tag => {
                let tag = required(record, field::TAG, line_number)?.to_string();
                let color = self.tag_color(&tag);
                self.paint(color, &pad_left(&tag, width))
            }
            Column::Priority => {
                let priority = required(record, field::PRIORITY, line_number)?;
                let badge = center(priority, width);
                self.paint(self.colors.priority_badge(priority), &badge)
            }
        };
        Ok(text)
    }

    /// Split the message into lines that fit the space right of the columns
    fn wrap_message<'a>(&self, message: &'a str) -> Vec<&'a str> {
        let available = self.width.saturating_sub(self.prefix_width());
        if !self.wrap || available < MIN_MESSAGE_WIDTH {
            return vec![message];
        }

        let mut pieces = Vec::new();
        let mut rest = message;
        while rest.chars().count() > available {
            let split = rest
                .char_indices()
                .nth(available)
                .map(|(idx, _)| idx)
                .unwrap_or(rest.len());
            let (head, tail) = rest.split_at(split);
            pieces.push(head);
            rest = tail;
        }
        pieces.push(rest);
        pieces
    }
}

impl LineLayout for ColumnLayout {
    fn layout_record(
        &mut self,
        record: &Record,
        line_number: usize,
    ) -> Result<Option<String>, ProcessingError> {
        let mut prefix = String::new();
        for column in self.columns.clone() {
            prefix.push_str(&self.render_column(column, record, line_number)?);
            prefix.push(' ');
        }

        let message = required(record, field::MESSAGE, line_number)?;
        let color = self.colors.priority_text(record.priority());
        let indent = " ".repeat(self.prefix_width());

        let mut output = prefix;
        for (i, piece) in self.wrap_message(message).into_iter().enumerate() {
            if i > 0 {
                output.push('\n');
                output.push_str(&indent);
            }
            output.push_str(&self.paint(color, piece));
        }
        Ok(Some(output))
    }

    fn layout_marker(&self, line: &str) -> Option<String> {
        Some(self.paint(self.colors.marker, line))
    }

    fn name(&self) -> &str {
        "column"
    }
}

fn columns_for(format: FormatKind) -> Vec<Column> {
    let fields = format.fields();
    let mut columns = Vec::new();
    if fields.contains(&field::TIME) {
        columns.push(Column::Timestamp);
    }
    if fields.contains(&field::PID) {
        columns.push(Column::Pid);
    }
    if fields.contains(&field::TID) {
        columns.push(Column::Tid);
    }
    if fields.contains(&field::TAG) {
        columns.push(Column::Tag);
    }
    if fields.contains(&field::PRIORITY) {
        columns.push(Column::Priority);
    }
    columns
}

fn required<'r>(
    record: &'r Record,
    name: &str,
    line_number: usize,
) -> Result<&'r str, ProcessingError> {
    record.get(name).ok_or_else(|| ProcessingError::RenderError {
        layout: "column".to_string(),
        line: line_number,
        message: format!("record has no '{}' field", name),
    })
}

/// Right-align, keeping the tail of values that are too long
fn pad_left(text: &str, width: usize) -> String {
    let len = text.chars().count();
    if len > width {
        text.chars().skip(len - width).collect()
    } else {
        format!("{:>width$}", text, width = width)
    }
}

fn pad_right(text: &str, width: usize) -> String {
    format!("{:<width$}", text, width = width)
}

fn center(text: &str, width: usize) -> String {
    format!("{:^width$}", text, width = width)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn config(width: usize, wrap: bool) -> PipelineConfig {
        PipelineConfig {
            width,
            wrap,
            ..PipelineConfig::default()
        }
    }

    fn brief(line: &str) -> Record {
        let mut record = Record::new();
        assert!(FormatKind::Brief.extract(line, &mut record));
        record
    }

    #[test]
    fn test_brief_columns_without_colors() {
        let mut layout =
            ColumnLayout::with_colors(FormatKind::Brief, &config(200, true), ColorScheme::new(false));
        let out = layout
            .layout_record(&brief("I/Tag1(  123): hello"), 1)
            .unwrap()
            .unwrap();
        // pid(8) tag(20) priority(3), one space after each
        assert_eq!(out, format!("{:>8} {:>20} {:^3} hello", "123", "Tag1", "I"));
    }

    #[test]
    fn test_wraps_under_message_column() {
        let mut layout =
            ColumnLayout::with_colors(FormatKind::Tag, &config(44, true), ColorScheme::new(false));
        // tag(20) + priority(3) + 2 spaces = 25 prefix, 19 chars per message line
        let message = "a".repeat(30);
        let mut record = Record::new();
        assert!(FormatKind::Tag.extract(&format!("W/Wrap: {}", message), &mut record));

        let out = layout.layout_record(&record, 1).unwrap().unwrap();
        let lines: Vec<&str> = out.split('\n').collect();
        assert_eq!(lines.len(), 2);
        assert!(lines[0].ends_with(&"a".repeat(19)));
        assert_eq!(lines[1], format!("{}{}", " ".repeat(25), "a".repeat(11)));
    }

    #[test]
    fn test_no_wrap_keeps_one_line() {
        let mut layout =
            ColumnLayout::with_colors(FormatKind::Tag, &config(30, false), ColorScheme::new(false));
        let mut record = Record::new();
        assert!(FormatKind::Tag.extract(&format!("I/T: {}", "b".repeat(100)), &mut record));
        let out = layout.layout_record(&record, 1).unwrap().unwrap();
        assert!(!out.contains('\n'));
    }

    #[test]
    fn test_tag_colors_follow_first_seen_order() {
        let mut layout = ColumnLayout::new(FormatKind::Brief, &config(200, true));
        let first = layout.tag_color("Alpha");
        let second = layout.tag_color("Beta");
        assert_ne!(first, second);
        assert_eq!(layout.tag_color("Alpha"), first);
        assert_eq!(first, ColorScheme::new(true).tags[0]);
    }

    #[test]
    fn test_missing_field_is_render_error() {
        let mut layout = ColumnLayout::new(FormatKind::ThreadTime, &config(200, true));
        let record = brief("I/Tag(  1): no timestamp here");
        let err = layout.layout_record(&record, 7).unwrap_err();
        assert!(matches!(err, ProcessingError::RenderError { line: 7, .. }));
    }

    #[test]
    fn test_marker_is_painted() {
        let layout = ColumnLayout::new(FormatKind::Brief, &config(80, true));
        let out = layout.layout_marker("--------- beginning of main").unwrap();
        assert!(out.starts_with("\x1b["));
        assert!(out.contains("--------- beginning of main"));
    }
}
