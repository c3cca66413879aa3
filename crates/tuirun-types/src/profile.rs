//! Description of the TUI program being driven.
//!
//! Everything here is coupled to how one particular target renders its
//! interface: which fragments mean "ready", which mean "busy", and which lines
//! are decoration. Keeping it in a data table lets it be retuned from the
//! config file without touching the protocol code.

use serde::{Deserialize, Serialize};

/// Keystrokes that switch the target into auto-execute mode.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AutoExecute {
    /// A slash command typed character by character, then submitted.
    Command(String),
    /// A raw key sequence sent in one write (e.g. shift+tab, `"\x1b[Z"`).
    Keys(String),
}

impl Default for AutoExecute {
    fn default() -> Self {
        AutoExecute::Command("/auto-run on".to_string())
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TargetProfile {
    #[serde(default = "default_program")]
    pub program: String,
    #[serde(default = "default_model_flag")]
    pub model_flag: String,
    #[serde(default = "default_rows")]
    pub rows: u16,
    #[serde(default = "default_cols")]
    pub cols: u16,
    /// Chrome fragments that appear once the input field is rendered.
    #[serde(default = "default_ready_markers")]
    pub ready_markers: Vec<String>,
    /// Fragments that show the target has started working on the prompt.
    #[serde(default = "default_activity_markers")]
    pub activity_markers: Vec<String>,
    /// Fragments that keep recurring while the target is producing output.
    #[serde(default = "default_busy_markers")]
    pub busy_markers: Vec<String>,
    /// Regexes tried after the literal ready markers.
    #[serde(default)]
    pub ready_patterns: Vec<String>,
    #[serde(default)]
    pub activity_patterns: Vec<String>,
    #[serde(default)]
    pub busy_patterns: Vec<String>,
    #[serde(default)]
    pub auto_execute: AutoExecute,
    #[serde(default = "default_submit_key")]
    pub submit_key: String,
    /// Keys re-sent when the first submission appears to have been dropped.
    #[serde(default = "default_retry_keys")]
    pub retry_keys: Vec<String>,
    #[serde(default = "default_quit_command")]
    pub quit_command: String,
    /// Appended to the built-in chrome substring denylist.
    #[serde(default)]
    pub extra_chrome_substrings: Vec<String>,
    /// Regexes appended to the built-in chrome line denylist.
    #[serde(default)]
    pub extra_chrome_patterns: Vec<String>,
}

fn default_program() -> String {
    "cursor-agent".to_string()
}

fn default_model_flag() -> String {
    "--model".to_string()
}

fn default_rows() -> u16 {
    50
}

fn default_cols() -> u16 {
    120
}

fn default_ready_markers() -> Vec<String> {
    ["│", "→", "Auto-run"].iter().map(|s| s.to_string()).collect()
}

fn default_activity_markers() -> Vec<String> {
    ["...", "…", "Thinking", "Running", "Generating", "tokens"]
        .iter()
        .map(|s| s.to_string())
        .collect()
}

fn default_busy_markers() -> Vec<String> {
    vec!["...".to_string()]
}

fn default_submit_key() -> String {
    "\r".to_string()
}

fn default_retry_keys() -> Vec<String> {
    vec!["\r".to_string(), "\n".to_string()]
}

fn default_quit_command() -> String {
    "/exit\r".to_string()
}

impl Default for TargetProfile {
    fn default() -> Self {
        Self {
            program: default_program(),
            model_flag: default_model_flag(),
            rows: default_rows(),
            cols: default_cols(),
            ready_markers: default_ready_markers(),
            activity_markers: default_activity_markers(),
            busy_markers: default_busy_markers(),
            ready_patterns: Vec::new(),
            activity_patterns: Vec::new(),
            busy_patterns: Vec::new(),
            auto_execute: AutoExecute::default(),
            submit_key: default_submit_key(),
            retry_keys: default_retry_keys(),
            quit_command: default_quit_command(),
            extra_chrome_substrings: Vec::new(),
            extra_chrome_patterns: Vec::new(),
        }
    }
}

impl TargetProfile {
    /// Command-line arguments for the target: the model flag, then any extras.
    pub fn args(&self, model: &str, extra_args: &[String]) -> Vec<String> {
        let mut args = vec![self.model_flag.clone(), model.to_string()];
        args.extend(extra_args.iter().cloned());
        args
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_args_model_first() {
        let profile = TargetProfile::default();
        let args = profile.args("gpt-5", &["--foo".to_string()]);
        assert_eq!(args, vec!["--model", "gpt-5", "--foo"]);
    }

    #[test]
    fn test_partial_toml_keeps_defaults() {
        let profile: TargetProfile = toml::from_str(
            r#"
            program = "/usr/local/bin/agent"
            busy_markers = ["...", "⠋"]
            "#,
        )
        .unwrap();
        assert_eq!(profile.program, "/usr/local/bin/agent");
        assert_eq!(profile.busy_markers, vec!["...", "⠋"]);
        assert_eq!(profile.quit_command, "/exit\r");
        assert_eq!(profile.auto_execute, AutoExecute::Command("/auto-run on".into()));
        assert!(profile.busy_patterns.is_empty());
    }

    #[test]
    fn test_marker_patterns_from_toml() {
        let profile: TargetProfile = toml::from_str(
            r#"
            busy_patterns = ['[⠋⠙⠹⠸]\s+\d+s']
            activity_patterns = ['\d+ tokens']
            "#,
        )
        .unwrap();
        assert_eq!(profile.busy_patterns, vec![r"[⠋⠙⠹⠸]\s+\d+s"]);
        assert_eq!(profile.activity_patterns, vec![r"\d+ tokens"]);
        assert_eq!(profile.busy_markers, vec!["..."]);
        assert!(profile.ready_patterns.is_empty());
    }

    #[test]
    fn test_auto_execute_keys_variant() {
        let profile: TargetProfile = toml::from_str(
            r#"
            auto_execute = { keys = "\u001b[Z" }
            "#,
        )
        .unwrap();
        assert_eq!(profile.auto_execute, AutoExecute::Keys("\x1b[Z".into()));
    }
}
