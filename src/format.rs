// src/format.rs - logcat line grammars and the name-keyed registry

use crate::error::ConfigError;
use crate::pipeline::context::Record;
use once_cell::sync::Lazy;
use regex::{Captures, Regex};

/// Field names shared by every grammar
pub mod field {
    pub const PRIORITY: &str = "priority";
    pub const TAG: &str = "tag";
    pub const PID: &str = "pid";
    pub const TID: &str = "tid";
    pub const DATE: &str = "date";
    pub const TIME: &str = "time";
    pub const MESSAGE: &str = "message";
}

const PRIORITY_RE: &str = r"(?P<priority>[VDIWEFAS])";
const DATE_TIME_RE: &str = r"(?P<date>\d{2}-\d{2}) (?P<time>\d{2}:\d{2}:\d{2}\.\d{3})";

static MARKER_REGEX: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"^-{9} (?:beginning of|switch to) \S+").unwrap());

static BRIEF_REGEX: Lazy<Regex> = Lazy::new(|| {
    Regex::new(&format!(
        r"^{PRIORITY_RE}/(?P<tag>[^(]*?)\s*\(\s*(?P<pid>\d+)\): ?(?P<message>.*)$"
    ))
    .unwrap()
});

static PROCESS_REGEX: Lazy<Regex> = Lazy::new(|| {
    Regex::new(&format!(
        r"^{PRIORITY_RE}\(\s*(?P<pid>\d+)\) (?P<message>.*?)\s*\((?P<tag>[^()]*)\)$"
    ))
    .unwrap()
});

static TAG_REGEX: Lazy<Regex> = Lazy::new(|| {
    Regex::new(&format!(r"^{PRIORITY_RE}/(?P<tag>[^:]*?)\s*: ?(?P<message>.*)$")).unwrap()
});

static TIME_REGEX: Lazy<Regex> = Lazy::new(|| {
    Regex::new(&format!(
        r"^{DATE_TIME_RE} {PRIORITY_RE}/(?P<tag>[^(]*?)\s*\(\s*(?P<pid>\d+)\): ?(?P<message>.*)$"
    ))
    .unwrap()
});

static THREADTIME_REGEX: Lazy<Regex> = Lazy::new(|| {
    Regex::new(&format!(
        r"^{DATE_TIME_RE}\s+(?P<pid>\d+)\s+(?P<tid>\d+) {PRIORITY_RE} (?P<tag>.*?)\s*: ?(?P<message>.*)$"
    ))
    .unwrap()
});

static LONG_HEADER_REGEX: Lazy<Regex> = Lazy::new(|| {
    Regex::new(&format!(
        r"^\[ {DATE_TIME_RE}\s+(?P<pid>\d+):\s*(?P<tid>\S+) {PRIORITY_RE}/(?P<tag>.*?)\s*\]$"
    ))
    .unwrap()
});

static RAW_REGEX: Lazy<Regex> = Lazy::new(|| Regex::new(r"^(?P<message>.*)$").unwrap());

/// One of the line layouts `adb logcat -v <format>` can produce
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, clap::ValueEnum)]
pub enum FormatKind {
    #[value(name = "brief")]
    Brief,
    #[value(name = "process")]
    Process,
    #[value(name = "tag")]
    Tag,
    #[value(name = "time")]
    Time,
    #[value(name = "threadtime")]
    ThreadTime,
    #[value(name = "long")]
    Long,
    #[value(name = "raw")]
    Raw,
}

pub const DEFAULT_FORMAT: FormatKind = FormatKind::Brief;

/// Stricter grammars first: `tag` accepts most `brief` lines, `brief` never
/// accepts `time` lines and so on. `raw` matches anything and is only used
/// when forced.
pub const DETECTION_ORDER: [FormatKind; 6] = [
    FormatKind::ThreadTime,
    FormatKind::Time,
    FormatKind::Long,
    FormatKind::Brief,
    FormatKind::Process,
    FormatKind::Tag,
];

static REGISTRY: [(&str, FormatKind); 7] = [
    ("brief", FormatKind::Brief),
    ("process", FormatKind::Process),
    ("tag", FormatKind::Tag),
    ("time", FormatKind::Time),
    ("threadtime", FormatKind::ThreadTime),
    ("long", FormatKind::Long),
    ("raw", FormatKind::Raw),
];

/// All known formats keyed by their `-v` name
pub fn registry() -> &'static [(&'static str, FormatKind)] {
    &REGISTRY
}

/// Buffer banners such as `--------- beginning of main`
pub fn is_marker(line: &str) -> bool {
    MARKER_REGEX.is_match(line)
}

impl FormatKind {
    pub fn from_name(name: &str) -> Result<Self, ConfigError> {
        let wanted = name.trim().to_lowercase();
        registry()
            .iter()
            .find(|(n, _)| *n == wanted)
            .map(|(_, kind)| *kind)
            .ok_or_else(|| ConfigError::UnknownFormat(name.to_string()))
    }

    pub fn name(self) -> &'static str {
        registry()
            .iter()
            .find(|(_, kind)| *kind == self)
            .map(|(n, _)| *n)
            .unwrap_or("brief")
    }

    /// Field names in canonical (on-the-wire) order
    pub fn fields(self) -> &'static [&'static str] {
        use field::*;
        match self {
            FormatKind::Brief => &[PRIORITY, TAG, PID, MESSAGE],
            FormatKind::Process => &[PRIORITY, PID, MESSAGE, TAG],
            FormatKind::Tag => &[PRIORITY, TAG, MESSAGE],
            FormatKind::Time => &[DATE, TIME, PRIORITY, TAG, PID, MESSAGE],
            FormatKind::ThreadTime => &[DATE, TIME, PID, TID, PRIORITY, TAG, MESSAGE],
            FormatKind::Long => &[DATE, TIME, PID, TID, PRIORITY, TAG, MESSAGE],
            FormatKind::Raw => &[MESSAGE],
        }
    }

    /// For `long` this is the entry header; the message follows on later lines
    fn regex(self) -> &'static Regex {
        match self {
            FormatKind::Brief => &*BRIEF_REGEX,
            FormatKind::Process => &*PROCESS_REGEX,
            FormatKind::Tag => &*TAG_REGEX,
            FormatKind::Time => &*TIME_REGEX,
            FormatKind::ThreadTime => &*THREADTIME_REGEX,
            FormatKind::Long => &*LONG_HEADER_REGEX,
            FormatKind::Raw => &*RAW_REGEX,
        }
    }

    pub fn is_multiline(self) -> bool {
        self == FormatKind::Long
    }

    pub fn matches(self, line: &str) -> bool {
        self.regex().is_match(line)
    }

    /// Populate `record` from `line`. Returns false (leaving `record`
    /// untouched) when the grammar does not match.
    pub fn extract(self, line: &str, record: &mut Record) -> bool {
        match self.regex().captures(line) {
            Some(caps) => {
                self.fill(&caps, record);
                record.set_line(line);
                true
            }
            None => false,
        }
    }

    fn fill(self, caps: &Captures<'_>, record: &mut Record) {
        for &name in self.fields() {
            if let Some(value) = caps.name(name) {
                record.set(name, value.as_str());
            }
        }
    }

    /// Would this grammar explain every line of a detection sample?
    /// Marker lines are neutral; a sample without data lines is never accepted.
    pub fn accepts_sample(self, lines: &[String]) -> bool {
        let mut data_lines = lines.iter().filter(|line| !is_marker(line)).peekable();
        if data_lines.peek().is_none() {
            return false;
        }

        if self.is_multiline() {
            // header, then message lines / blank separators
            let mut in_entry = false;
            for line in data_lines {
                if self.matches(line) {
                    in_entry = true;
                } else if !in_entry {
                    return false;
                }
            }
            return in_entry;
        }

        data_lines.all(|line| self.matches(line))
    }
}

impl std::fmt::Display for FormatKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.name())
    }
}

impl std::str::FromStr for FormatKind {
    type Err = ConfigError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        FormatKind::from_name(s)
    }
}
