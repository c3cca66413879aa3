//! Runtime configuration: built-in defaults, then a TOML file, then flags.

use anyhow::{Context, Result};
use serde::Deserialize;
use std::path::{Path, PathBuf};
use std::time::Duration;
use tuirun_core::SessionConfig;
use tuirun_types::{TargetProfile, TimingConfig};

/// Looked up relative to the working directory.
const LOCAL_CONFIG: &str = "config/default.toml";

#[derive(Debug, Clone, Deserialize)]
pub struct Config {
    #[serde(default = "default_timeout_secs")]
    pub timeout_secs: u64,
    #[serde(default = "default_idle_timeout_secs")]
    pub idle_timeout_secs: u64,
    #[serde(default = "default_auto_execute")]
    pub auto_execute: bool,
    /// Passed to the target after `--model <model>`.
    #[serde(default)]
    pub extra_args: Vec<String>,
    #[serde(default)]
    pub target: TargetProfile,
    #[serde(default)]
    pub timing: TimingConfig,
}

fn default_timeout_secs() -> u64 {
    900
}

fn default_idle_timeout_secs() -> u64 {
    60
}

fn default_auto_execute() -> bool {
    true
}

impl Default for Config {
    fn default() -> Self {
        Self {
            timeout_secs: default_timeout_secs(),
            idle_timeout_secs: default_idle_timeout_secs(),
            auto_execute: default_auto_execute(),
            extra_args: Vec::new(),
            target: TargetProfile::default(),
            timing: TimingConfig::default(),
        }
    }
}

impl Config {
    /// Load config from a specific file path.
    pub fn load_from(path: &Path) -> Result<Self> {
        let content = std::fs::read_to_string(path)
            .with_context(|| format!("reading config file {}", path.display()))?;
        let config: Config = toml::from_str(&content)
            .with_context(|| format!("parsing config file {}", path.display()))?;
        Ok(config)
    }

    /// Load from `config/default.toml`, then the user config directory, else defaults.
    ///
    /// Returns the file that was used, if any.
    pub fn load() -> Result<(Self, Option<PathBuf>)> {
        let user_config = dirs::config_dir().map(|dir| dir.join("tuirun").join("config.toml"));
        match locate(Path::new(LOCAL_CONFIG), user_config.as_deref()) {
            Some(path) => Ok((Self::load_from(&path)?, Some(path))),
            None => Ok((Config::default(), None)),
        }
    }

    pub fn session_config(&self) -> SessionConfig {
        let mut session = SessionConfig::new(self.target.clone(), self.timing.clone());
        session.overall_timeout = Duration::from_secs(self.timeout_secs);
        session.idle_timeout = Duration::from_secs(self.idle_timeout_secs);
        session.auto_execute = self.auto_execute;
        session
    }
}

fn locate(local: &Path, user: Option<&Path>) -> Option<PathBuf> {
    if local.exists() {
        return Some(local.to_path_buf());
    }
    user.filter(|p| p.exists()).map(Path::to_path_buf)
}

#[cfg(test)]
mod tests {
    use super::*;
    use tuirun_types::AutoExecute;

    fn write(dir: &tempfile::TempDir, name: &str, content: &str) -> PathBuf {
        let path = dir.path().join(name);
        std::fs::write(&path, content).unwrap();
        path
    }

    #[test]
    fn test_empty_file_gives_defaults() {
        let dir = tempfile::tempdir().unwrap();
        let path = write(&dir, "empty.toml", "");

        let config = Config::load_from(&path).unwrap();
        assert_eq!(config.timeout_secs, 900);
        assert_eq!(config.idle_timeout_secs, 60);
        assert!(config.auto_execute);
        assert_eq!(config.target, TargetProfile::default());
        assert_eq!(config.timing, TimingConfig::default());
    }

    #[test]
    fn test_nested_tables() {
        let dir = tempfile::tempdir().unwrap();
        let path = write(
            &dir,
            "tuirun.toml",
            r#"
timeout_secs = 120
auto_execute = false
extra_args = ["--print-logs"]

[target]
program = "/usr/local/bin/agent"
busy_markers = ["esc to interrupt"]
auto_execute = { keys = "\u001b[Z" }
extra_chrome_patterns = ["^Tip:"]

[timing]
startup_delay_ms = 500
max_submit_retries = 1
"#,
        );

        let config = Config::load_from(&path).unwrap();
        assert_eq!(config.timeout_secs, 120);
        assert_eq!(config.idle_timeout_secs, 60);
        assert!(!config.auto_execute);
        assert_eq!(config.extra_args, vec!["--print-logs"]);
        assert_eq!(config.target.program, "/usr/local/bin/agent");
        assert_eq!(config.target.busy_markers, vec!["esc to interrupt"]);
        assert_eq!(config.target.auto_execute, AutoExecute::Keys("\x1b[Z".into()));
        assert_eq!(config.target.model_flag, "--model");
        assert_eq!(config.timing.startup_delay_ms, 500);
        assert_eq!(config.timing.max_submit_retries, 1);
        assert_eq!(config.timing.poll_interval_ms, 1000);
    }

    #[test]
    fn test_example_config_matches_defaults() {
        let path = Path::new(env!("CARGO_MANIFEST_DIR")).join("../../config/example.toml");
        let config = Config::load_from(&path).unwrap();
        let defaults = Config::default();

        assert_eq!(config.timeout_secs, defaults.timeout_secs);
        assert_eq!(config.idle_timeout_secs, defaults.idle_timeout_secs);
        assert_eq!(config.auto_execute, defaults.auto_execute);
        assert_eq!(config.extra_args, defaults.extra_args);
        assert_eq!(config.target, defaults.target);
        assert_eq!(config.timing, defaults.timing);
    }

    #[test]
    fn test_bad_toml_names_the_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = write(&dir, "broken.toml", "timeout_secs = \"soon\"");

        let err = Config::load_from(&path).unwrap_err();
        assert!(format!("{err:#}").contains("broken.toml"));
    }

    #[test]
    fn test_missing_file_is_an_error() {
        let dir = tempfile::tempdir().unwrap();
        assert!(Config::load_from(&dir.path().join("nope.toml")).is_err());
    }

    #[test]
    fn test_locate_prefers_local() {
        let dir = tempfile::tempdir().unwrap();
        let local = write(&dir, "local.toml", "");
        let user = write(&dir, "user.toml", "");

        assert_eq!(locate(&local, Some(&user)), Some(local.clone()));
        assert_eq!(
            locate(&dir.path().join("missing.toml"), Some(&user)),
            Some(user.clone())
        );
        assert_eq!(locate(&dir.path().join("missing.toml"), None), None);
    }

    #[test]
    fn test_session_config_carries_timeouts() {
        let config = Config {
            timeout_secs: 30,
            idle_timeout_secs: 5,
            auto_execute: false,
            ..Config::default()
        };
        let session = config.session_config();
        assert_eq!(session.overall_timeout, Duration::from_secs(30));
        assert_eq!(session.idle_timeout, Duration::from_secs(5));
        assert!(!session.auto_execute);
    }
}
