//! Reduce a redraw-heavy terminal transcript to the final answer text.
//!
//! The target repaints the same screen region on every keystroke or streamed
//! token, so the raw stream holds many overlapping partial copies of each
//! logical line. This is not a terminal emulator: the stream is treated as an
//! approximately append-only log, filtered and collapsed line by line.

use crate::chrome::ChromeFilter;
use once_cell::sync::Lazy;
use regex::Regex;
use std::collections::HashSet;
use tracing::debug;

/// Number of leading characters that identify a redraw of the same line.
const REDRAW_PREFIX_CHARS: usize = 20;

static ANSI_REGEX: Lazy<Regex> = Lazy::new(|| {
    Regex::new(concat!(
        r"\x1b\[[0-9;?<>=]*[ -/]*[@-~]", // CSI sequences (colors, cursor, etc.)
        r"|\x1b\][^\x07\x1b]*(?:\x07|\x1b\\)", // OSC sequences ending with BEL or ST
        r"|\x1b[()][A-Z0-9]",           // Character set selection
        r"|\x1b[=>MNOP78c]",            // Other single-char escapes
        r"|\x1b",                       // Catch any remaining bare ESC
    ))
    .unwrap()
});

/// C0 controls other than newline and tab, plus DEL. Includes `\r`.
static CONTROL_REGEX: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"[\x00-\x08\x0b-\x1f\x7f]").unwrap());

/// Remove escape sequences, carriage returns and other control characters.
pub fn strip_control_sequences(text: &str) -> String {
    let without_ansi = ANSI_REGEX.replace_all(text, "");
    CONTROL_REGEX.replace_all(&without_ansi, "").into_owned()
}

pub struct Reconstructor {
    chrome: ChromeFilter,
}

impl Reconstructor {
    pub fn new(chrome: ChromeFilter) -> Self {
        Self { chrome }
    }

    /// Produce the cleaned answer for a raw transcript.
    ///
    /// When `prompt` is given, lines that echo it are dropped: a line equal to
    /// the prompt, contained in it, or starting with it. The containment rule
    /// also drops short answer lines that happen to be fragments of the prompt.
    pub fn reconstruct(&self, raw: &str, prompt: Option<&str>) -> String {
        let text = strip_control_sequences(raw);
        let prompt = prompt.map(str::trim).filter(|p| !p.is_empty());

        let mut seen: HashSet<&str> = HashSet::new();
        let mut content: Vec<&str> = Vec::new();
        let mut dropped = 0usize;

        for line in text.split('\n') {
            let stripped = line.trim();
            if stripped.is_empty() {
                continue;
            }
            if self.chrome.is_chrome(stripped) {
                dropped += 1;
                continue;
            }

            let cleaned = self.chrome.strip_bullets(stripped);
            if cleaned.is_empty() {
                continue;
            }
            if let Some(prompt) = prompt {
                if is_prompt_echo(cleaned, prompt) {
                    dropped += 1;
                    continue;
                }
            }
            if seen.insert(cleaned) {
                content.push(cleaned);
            }
        }

        let lines = collapse_redraws(&content);
        debug!(
            target: "tuirun::reconstruct",
            "Reconstructed {} lines ({} unique, {} chrome/echo dropped)",
            lines.len(),
            content.len(),
            dropped
        );
        lines.join("\n")
    }
}

fn is_prompt_echo(line: &str, prompt: &str) -> bool {
    line == prompt || prompt.contains(line) || line.starts_with(prompt)
}

/// First `n` characters of `s`, respecting char boundaries.
fn char_prefix(s: &str, n: usize) -> &str {
    match s.char_indices().nth(n) {
        Some((idx, _)) => &s[..idx],
        None => s,
    }
}

/// Replace each redraw run with its last, most complete member.
///
/// A run continues while the next line starts with the first
/// [`REDRAW_PREFIX_CHARS`] characters of the line accumulated so far.
fn collapse_redraws<'a>(lines: &[&'a str]) -> Vec<&'a str> {
    let mut out = Vec::new();
    let mut i = 0;
    while i < lines.len() {
        let mut current = lines[i];
        let mut j = i + 1;
        while j < lines.len() && lines[j].starts_with(char_prefix(current, REDRAW_PREFIX_CHARS)) {
            current = lines[j];
            j += 1;
        }
        out.push(current);
        i = j;
    }
    out
}
