//! Error types for tuirun.

use thiserror::Error;
use tuirun_types::Phase;

#[derive(Error, Debug)]
pub enum TuirunError {
    #[error("Process spawn failed: {0}")]
    ProcessSpawnFailed(String),

    #[error("PTY error: {0}")]
    PtyError(String),

    #[error("Target exited during {phase}{}", trailing_suffix(.trailing))]
    PrematureExit { phase: Phase, trailing: String },

    #[error(
        "Target exited while enabling auto-execute mode (rerun with --no-auto-run to skip this step){}",
        trailing_suffix(.trailing)
    )]
    AutoExecuteFailed { trailing: String },

    #[error("Invalid pattern: {0}")]
    InvalidPattern(#[from] regex::Error),

    #[error("IO error: {0}")]
    IoError(#[from] std::io::Error),
}

fn trailing_suffix(trailing: &str) -> String {
    if trailing.trim().is_empty() {
        String::new()
    } else {
        format!("; last output:\n{}", trailing)
    }
}
