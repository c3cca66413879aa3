//! Denylist of interface decoration ("chrome") lines.
//!
//! The entries describe how one particular target draws its screen. They are
//! not derivable from any protocol, so they live in a table that the config
//! file can extend.

use crate::Result;
use regex::Regex;

/// Substrings that mark a line as chrome wherever they appear.
const CHROME_SUBSTRINGS: &[&str] = &[
    "Auto-run",
    "shift+tab",
    "/ commands",
    "@ files",
    "! shell",
    "Claude 4.5",
    "Claude 3",
    "Generating",
    "Thinking",
    "Running",
    "tokens",
    "ctrl+c",
    "ctrl+o",
    "INSERT",
    "Plan, search, build",
    "truncated",
    "Add a follow-up",
];

/// Whole-line rules, checked against the trimmed line.
const CHROME_LINE_PATTERNS: &[&str] = &[
    // Box drawing borders and the input field
    r"^[│┌┐└┘├┤┬┴┼─→]",
    // Slash-command menu entries
    r"^/\w+",
    // Bullet-only lines
    r"^[⬡⬢⬣▶︎■•\s]+$",
    // Shell command timing, e.g. "$ pip install ipython 404ms"
    r"^\$.*\d+ms$",
    // Bare version fragments, e.g. "(5.2.1)"
    r"^\(\d+\.\d+\.\d+\)$",
];

/// Leading bullet or marker glyphs removed from content lines.
const BULLET_PATTERN: &str = r"^[⬡⬢⬣▶︎■•\s]+";

#[derive(Debug, Clone)]
pub struct ChromeFilter {
    substrings: Vec<String>,
    patterns: Vec<Regex>,
    bullets: Regex,
}

impl ChromeFilter {
    /// The built-in table.
    pub fn builtin() -> Result<Self> {
        Self::builtin_with::<&str>(&[], &[])
    }

    /// The built-in table plus extra substrings and line regexes.
    pub fn builtin_with<S: AsRef<str>>(extra_substrings: &[S], extra_patterns: &[S]) -> Result<Self> {
        let substrings = CHROME_SUBSTRINGS
            .iter()
            .map(|s| s.to_string())
            .chain(extra_substrings.iter().map(|s| s.as_ref().to_string()))
            .filter(|s| !s.is_empty())
            .collect();

        let patterns = CHROME_LINE_PATTERNS
            .iter()
            .copied()
            .chain(extra_patterns.iter().map(|s| s.as_ref()))
            .map(Regex::new)
            .collect::<std::result::Result<Vec<_>, _>>()?;

        Ok(Self {
            substrings,
            patterns,
            bullets: Regex::new(BULLET_PATTERN)?,
        })
    }

    /// True when a trimmed line is decoration rather than content.
    pub fn is_chrome(&self, line: &str) -> bool {
        self.substrings.iter().any(|s| line.contains(s.as_str()))
            || self.patterns.iter().any(|re| re.is_match(line))
    }

    /// Remove leading bullets and marker glyphs.
    pub fn strip_bullets<'a>(&self, line: &'a str) -> &'a str {
        match self.bullets.find(line) {
            Some(m) => &line[m.end()..],
            None => line,
        }
    }
}
