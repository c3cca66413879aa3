//! Shared types for tuirun.

mod outcome;
mod profile;
mod timing;

pub use outcome::{CompletionReason, OutputMode, Phase};
pub use profile::{AutoExecute, TargetProfile};
pub use timing::TimingConfig;
