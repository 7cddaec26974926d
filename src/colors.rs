/// ANSI color codes for the column layout
#[derive(Debug, Clone)]
pub struct ColorScheme {
    pub timestamp: &'static str, // Blue for date/time
    pub pid: &'static str,       // Dim white for process id
    pub tid: &'static str,       // Dim white for thread id
    pub marker: &'static str,    // Dim white on black for buffer banners
    pub verbose: &'static str,
    pub debug: &'static str,
    pub info: &'static str,
    pub warn: &'static str,
    pub error: &'static str,
    pub fatal: &'static str,
    pub badge_verbose: &'static str,
    pub badge_debug: &'static str,
    pub badge_info: &'static str,
    pub badge_warn: &'static str,
    pub badge_error: &'static str,
    pub badge_fatal: &'static str,
    pub tags: &'static [&'static str], // Palette handed out to tags in first-seen order
    pub reset: &'static str,
}

const TAG_PALETTE: &[&str] = &[
    "\x1b[31m", // Red
    "\x1b[32m", // Green
    "\x1b[33m", // Yellow
    "\x1b[34m", // Blue
    "\x1b[35m", // Magenta
    "\x1b[36m", // Cyan
    "\x1b[91m", // Bright red
    "\x1b[92m", // Bright green
    "\x1b[93m", // Bright yellow
    "\x1b[94m", // Bright blue
    "\x1b[95m", // Bright magenta
    "\x1b[96m", // Bright cyan
];

impl ColorScheme {
    pub fn new(use_colors: bool) -> Self {
        if use_colors {
            Self {
                timestamp: "\x1b[34m",
                pid: "\x1b[2;37m",
                tid: "\x1b[2;37m",
                marker: "\x1b[2;37;40m",
                verbose: "\x1b[37m",
                debug: "\x1b[36m",
                info: "\x1b[32m",
                warn: "\x1b[33m",
                error: "\x1b[31m",
                fatal: "\x1b[1;31m",
                badge_verbose: "\x1b[30;47m",
                badge_debug: "\x1b[30;46m",
                badge_info: "\x1b[30;42m",
                badge_warn: "\x1b[30;43m",
                badge_error: "\x1b[30;41m",
                badge_fatal: "\x1b[1;37;41m",
                tags: TAG_PALETTE,
                reset: "\x1b[0m",
            }
        } else {
            // All empty strings for no-color mode
            Self {
                timestamp: "",
                pid: "",
                tid: "",
                marker: "",
                verbose: "",
                debug: "",
                info: "",
                warn: "",
                error: "",
                fatal: "",
                badge_verbose: "",
                badge_debug: "",
                badge_info: "",
                badge_warn: "",
                badge_error: "",
                badge_fatal: "",
                tags: &[],
                reset: "",
            }
        }
    }

    /// Color for message text of the given priority letter
    pub fn priority_text(&self, priority: &str) -> &'static str {
        match priority {
            "V" => self.verbose,
            "D" => self.debug,
            "I" => self.info,
            "W" => self.warn,
            "E" => self.error,
            "F" | "A" => self.fatal,
            _ => "",
        }
    }

    /// Background color for the priority badge
    pub fn priority_badge(&self, priority: &str) -> &'static str {
        match priority {
            "V" => self.badge_verbose,
            "D" => self.badge_debug,
            "I" => self.badge_info,
            "W" => self.badge_warn,
            "E" => self.badge_error,
            "F" | "A" => self.badge_fatal,
            _ => "",
        }
    }

    pub fn is_plain(&self) -> bool {
        self.reset.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_no_color_scheme_is_empty() {
        let colors = ColorScheme::new(false);
        assert!(colors.is_plain());
        assert_eq!(colors.priority_text("E"), "");
        assert!(colors.tags.is_empty());
    }

    #[test]
    fn test_priority_colors() {
        let colors = ColorScheme::new(true);
        assert_eq!(colors.priority_text("W"), "\x1b[33m");
        assert_eq!(colors.priority_badge("F"), colors.priority_badge("A"));
        assert_eq!(colors.priority_text("?"), "");
    }
}
