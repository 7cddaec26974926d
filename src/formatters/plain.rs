use crate::error::ProcessingError;
use crate::formatters::LineLayout;
use crate::pipeline::context::Record;

/// Writes each record's text exactly as it was read, so an unfiltered plain
/// run reproduces the input
pub struct PlainLayout;

impl LineLayout for PlainLayout {
    fn layout_record(
        &mut self,
        record: &Record,
        _line_number: usize,
    ) -> Result<Option<String>, ProcessingError> {
        if record.is_empty() {
            return Ok(None);
        }
        Ok(Some(record.line().to_string()))
    }

    fn layout_marker(&self, line: &str) -> Option<String> {
        Some(line.to_string())
    }

    fn name(&self) -> &str {
        "plain"
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::format::FormatKind;

    #[test]
    fn test_plain_is_source_text() {
        let line = "I/Tag1(  123): message";
        let mut record = Record::new();
        assert!(FormatKind::Brief.extract(line, &mut record));

        let mut layout = PlainLayout;
        assert_eq!(layout.layout_record(&record, 1).unwrap().as_deref(), Some(line));
        assert_eq!(
            layout.layout_marker("--------- beginning of main").as_deref(),
            Some("--------- beginning of main")
        );
    }

    #[test]
    fn test_blank_raw_line_is_kept() {
        let mut record = Record::new();
        assert!(FormatKind::Raw.extract("", &mut record));

        let mut layout = PlainLayout;
        assert_eq!(layout.layout_record(&record, 1).unwrap().as_deref(), Some(""));
        assert_eq!(layout.layout_record(&Record::new(), 2).unwrap(), None);
    }
}
