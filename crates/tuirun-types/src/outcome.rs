//! Protocol phases, completion reasons and output modes.

use serde::{Deserialize, Serialize};
use std::fmt;

/// Where the monitored output ends up.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum OutputMode {
    /// Buffer the transcript and print the reconstructed answer at the end.
    #[default]
    Clean,
    /// Forward the terminal byte stream to stdout as it arrives.
    Raw,
}

/// Step of the interaction protocol, in order.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Phase {
    Spawned,
    AwaitingReady,
    SubmittingPrompt,
    AwaitingProcessingStart,
}

impl Phase {
    pub fn as_str(&self) -> &'static str {
        match self {
            Phase::Spawned => "startup",
            Phase::AwaitingReady => "ready wait",
            Phase::SubmittingPrompt => "prompt submission",
            Phase::AwaitingProcessingStart => "processing-start wait",
        }
    }
}

impl fmt::Display for Phase {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Why the activity monitor stopped.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum CompletionReason {
    /// The busy marker stopped recurring.
    BusyMarkerStopped,
    /// Output went quiet for longer than the idle timeout.
    IdleTimeout,
    /// The hard ceiling on total elapsed time was reached.
    OverallTimeout,
    /// The target closed its end of the terminal.
    StreamEnded,
}

impl fmt::Display for CompletionReason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            CompletionReason::BusyMarkerStopped => "busy indicator stopped",
            CompletionReason::IdleTimeout => "idle timeout",
            CompletionReason::OverallTimeout => "overall timeout",
            CompletionReason::StreamEnded => "process ended",
        };
        f.write_str(s)
    }
}
