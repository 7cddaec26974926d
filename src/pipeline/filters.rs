// src/pipeline/filters.rs - record predicates and the filter stage
use crate::pipeline::context::{FilterContext, Record};
use regex::Regex;
use std::collections::HashSet;
use std::io::Write;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex};
use tracing::{trace, warn};

/// Accept/reject decision for one record
pub trait FilterPredicate: Send + Sync {
    fn accept(&self, record: &Record, ctx: &FilterContext) -> bool;
    fn name(&self) -> &str;
}

impl FilterPredicate for Box<dyn FilterPredicate> {
    fn accept(&self, record: &Record, ctx: &FilterContext) -> bool {
        (**self).accept(record, ctx)
    }

    fn name(&self) -> &str {
        (**self).name()
    }
}

/// Ordered set of predicates; a record passes only if every one accepts it
#[derive(Default)]
pub struct FilterStage {
    predicates: Vec<Box<dyn FilterPredicate>>,
}

impl FilterStage {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn add_predicate(&mut self, predicate: Box<dyn FilterPredicate>) {
        self.predicates.push(predicate);
    }

    /// Stops at the first rejection; each predicate runs at most once
    pub fn accept(&self, record: &Record, ctx: &FilterContext) -> bool {
        self.predicates.iter().all(|predicate| {
            let accepted = predicate.accept(record, ctx);
            if !accepted {
                trace!(filter = predicate.name(), line = ctx.line_number, "record rejected");
            }
            accepted
        })
    }

    /// Wrap every predicate so its decisions are written to `sink`
    pub fn recorded(self, sink: SharedSink) -> Self {
        let predicates = self
            .predicates
            .into_iter()
            .map(|p| Box::new(Recorded::new(p, sink.clone())) as Box<dyn FilterPredicate>)
            .collect();
        Self { predicates }
    }

    pub fn len(&self) -> usize {
        self.predicates.len()
    }

    pub fn is_empty(&self) -> bool {
        self.predicates.is_empty()
    }
}

/// Only records whose tag is listed
pub struct TagFilter {
    tags: HashSet<String>,
}

impl TagFilter {
    pub fn new<I, S>(tags: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self {
            tags: tags.into_iter().map(Into::into).collect(),
        }
    }
}

impl FilterPredicate for TagFilter {
    fn accept(&self, record: &Record, _ctx: &FilterContext) -> bool {
        self.tags.contains(record.tag())
    }

    fn name(&self) -> &str {
        "tags"
    }
}

/// Drops records whose tag is listed
pub struct ExcludeTagFilter {
    tags: HashSet<String>,
}

impl ExcludeTagFilter {
    pub fn new<I, S>(tags: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self {
            tags: tags.into_iter().map(Into::into).collect(),
        }
    }
}

impl FilterPredicate for ExcludeTagFilter {
    fn accept(&self, record: &Record, _ctx: &FilterContext) -> bool {
        !self.tags.contains(record.tag())
    }

    fn name(&self) -> &str {
        "exclude_tags"
    }
}

/// Only records with one of the listed priorities.
/// Accepts letters (`W`) or names (`warn`); the first letter is what counts.
pub struct PriorityFilter {
    priorities: HashSet<char>,
}

impl PriorityFilter {
    pub fn new<I, S>(priorities: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        Self {
            priorities: priorities
                .into_iter()
                .filter_map(|p| p.as_ref().trim().chars().next())
                .map(|c| c.to_ascii_uppercase())
                .collect(),
        }
    }
}

impl FilterPredicate for PriorityFilter {
    fn accept(&self, record: &Record, _ctx: &FilterContext) -> bool {
        record
            .priority()
            .chars()
            .next()
            .is_some_and(|c| self.priorities.contains(&c))
    }

    fn name(&self) -> &str {
        "priorities"
    }
}

/// Only records whose message matches a regex
pub struct MessageFilter {
    pattern: Regex,
}

impl MessageFilter {
    pub fn new(pattern: Regex) -> Self {
        Self { pattern }
    }
}

impl FilterPredicate for MessageFilter {
    fn accept(&self, record: &Record, _ctx: &FilterContext) -> bool {
        self.pattern.is_match(record.message())
    }

    fn name(&self) -> &str {
        self.pattern.as_str()
    }
}

/// Closure-backed predicate
pub struct FnPredicate<F> {
    name: String,
    func: F,
}

impl<F> FnPredicate<F>
where
    F: Fn(&Record) -> bool + Send + Sync,
{
    pub fn new(name: &str, func: F) -> Self {
        Self {
            name: name.to_string(),
            func,
        }
    }
}

impl<F> FilterPredicate for FnPredicate<F>
where
    F: Fn(&Record) -> bool + Send + Sync,
{
    fn accept(&self, record: &Record, _ctx: &FilterContext) -> bool {
        (self.func)(record)
    }

    fn name(&self) -> &str {
        &self.name
    }
}

pub type SharedSink = Arc<Mutex<Box<dyn Write + Send>>>;

/// Decorator writing one JSON line per decision:
/// `{"filter": ..., "line": ..., "data": {...}, "result": bool}`
pub struct Recorded<P> {
    inner: P,
    sink: SharedSink,
    write_failed: AtomicBool,
}

impl<P: FilterPredicate> Recorded<P> {
    pub fn new(inner: P, sink: SharedSink) -> Self {
        Self {
            inner,
            sink,
            write_failed: AtomicBool::new(false),
        }
    }

    /// Whether any decision could not be written to the sink
    pub fn write_failed(&self) -> bool {
        self.write_failed.load(Ordering::Relaxed)
    }

    fn write_entry(&self, entry: &serde_json::Value) -> std::io::Result<()> {
        let mut sink = self
            .sink
            .lock()
            .map_err(|_| std::io::Error::new(std::io::ErrorKind::Other, "filter log lock poisoned"))?;
        writeln!(sink, "{}", entry)?;
        sink.flush()
    }
}

impl<P: FilterPredicate> FilterPredicate for Recorded<P> {
    fn accept(&self, record: &Record, ctx: &FilterContext) -> bool {
        let result = self.inner.accept(record, ctx);
        let entry = serde_json::json!({
            "filter": self.inner.name(),
            "line": ctx.line_number,
            "data": record.to_json(),
            "result": result,
        });
        if let Err(e) = self.write_entry(&entry) {
            // reported once per filter; decisions still apply
            if !self.write_failed.swap(true, Ordering::Relaxed) {
                warn!(filter = self.inner.name(), "could not write filter log: {}", e);
            }
        }
        result
    }

    fn name(&self) -> &str {
        self.inner.name()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::format::field;
    use std::sync::atomic::AtomicUsize;

    fn record(priority: &str, tag: &str, message: &str) -> Record {
        let mut record = Record::new();
        record.set(field::PRIORITY, priority);
        record.set(field::TAG, tag);
        record.set(field::MESSAGE, message);
        record
    }

    fn ctx() -> FilterContext<'static> {
        FilterContext {
            line_number: 1,
            profile: None,
        }
    }

    #[test]
    fn test_empty_stage_accepts() {
        let stage = FilterStage::new();
        assert!(stage.is_empty());
        assert!(stage.accept(&record("I", "Tag", "hi"), &ctx()));
    }

    #[test]
    fn test_short_circuits_on_first_rejection() {
        static SECOND_CALLS: AtomicUsize = AtomicUsize::new(0);

        let mut stage = FilterStage::new();
        stage.add_predicate(Box::new(TagFilter::new(["Wanted"])));
        stage.add_predicate(Box::new(FnPredicate::new("count", |_: &Record| {
            SECOND_CALLS.fetch_add(1, Ordering::SeqCst);
            true
        })));

        assert!(!stage.accept(&record("I", "Other", "x"), &ctx()));
        assert_eq!(SECOND_CALLS.load(Ordering::SeqCst), 0);

        assert!(stage.accept(&record("I", "Wanted", "x"), &ctx()));
        assert_eq!(SECOND_CALLS.load(Ordering::SeqCst), 1);
    }

    #[test]
    fn test_priority_filter_names_and_letters() {
        let filter = PriorityFilter::new(["warn", "E"]);
        assert!(filter.accept(&record("W", "T", "m"), &ctx()));
        assert!(filter.accept(&record("E", "T", "m"), &ctx()));
        assert!(!filter.accept(&record("I", "T", "m"), &ctx()));
    }

    #[test]
    fn test_exclude_and_message_filters() {
        let exclude = ExcludeTagFilter::new(vec!["chatty".to_string()]);
        assert!(!exclude.accept(&record("I", "chatty", "m"), &ctx()));
        assert!(exclude.accept(&record("I", "quiet", "m"), &ctx()));

        let message = MessageFilter::new(Regex::new(r"^GC_").unwrap());
        assert!(message.accept(&record("D", "dalvikvm", "GC_CONCURRENT freed"), &ctx()));
        assert!(!message.accept(&record("D", "dalvikvm", "other"), &ctx()));
    }

    #[derive(Clone, Default)]
    struct Capture(Arc<Mutex<Vec<u8>>>);

    impl Write for Capture {
        fn write(&mut self, buf: &[u8]) -> std::io::Result<usize> {
            self.0.lock().unwrap().extend_from_slice(buf);
            Ok(buf.len())
        }

        fn flush(&mut self) -> std::io::Result<()> {
            Ok(())
        }
    }

    #[test]
    fn test_recorded_writes_decisions() {
        let capture = Capture::default();
        let sink: SharedSink = Arc::new(Mutex::new(Box::new(capture.clone())));

        let mut stage = FilterStage::new();
        stage.add_predicate(Box::new(TagFilter::new(["Tag2"])));
        let stage = stage.recorded(sink);

        assert!(!stage.accept(&record("I", "Tag1", "one"), &ctx()));
        assert!(stage.accept(&record("I", "Tag2", "two"), &ctx()));

        let text = String::from_utf8(capture.0.lock().unwrap().clone()).unwrap();
        let entries: Vec<serde_json::Value> = text
            .lines()
            .map(|l| serde_json::from_str(l).unwrap())
            .collect();
        assert_eq!(entries.len(), 2);
        assert_eq!(entries[0]["result"], false);
        assert_eq!(entries[0]["data"]["tag"], "Tag1");
        assert_eq!(entries[1]["result"], true);
        assert_eq!(entries[1]["filter"], "tags");
    }

    struct Broken;

    impl Write for Broken {
        fn write(&mut self, _buf: &[u8]) -> std::io::Result<usize> {
            Err(std::io::Error::new(std::io::ErrorKind::Other, "disk full"))
        }

        fn flush(&mut self) -> std::io::Result<()> {
            Ok(())
        }
    }

    #[test]
    fn test_recorded_write_failure_keeps_decision() {
        let sink: SharedSink = Arc::new(Mutex::new(Box::new(Broken)));
        let recorded = Recorded::new(TagFilter::new(["Tag2"]), sink);
        assert!(!recorded.write_failed());

        assert!(recorded.accept(&record("I", "Tag2", "two"), &ctx()));
        assert!(!recorded.accept(&record("I", "Tag1", "one"), &ctx()));
        assert!(recorded.write_failed());
    }
}
