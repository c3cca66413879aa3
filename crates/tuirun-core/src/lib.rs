//! Drive a full-screen TUI program through a pseudo-terminal as if it had a
//! batch mode: submit one prompt, watch the screen until the work is done, and
//! reduce the redraw noise to a final answer.

mod chrome;
mod error;
mod monitor;
mod patterns;
mod process;
mod reconstruct;
mod session;
mod terminal;
mod waiter;

pub use chrome::ChromeFilter;
pub use error::TuirunError;
pub use monitor::{ActivityMonitor, MonitorLimits, MonitorReport, OutputSink, Poll, Verdict};
pub use patterns::{Pattern, PatternSet};
pub use process::{ProcessCommand, PtyProcess};
pub use reconstruct::{Reconstructor, strip_control_sequences};
pub use session::{Session, SessionConfig, SessionOutcome};
pub use terminal::{Control, ReadOutcome, Terminal};
pub use waiter::{WaitEnd, WaitOutcome, wait_for_any};

/// Result type for tuirun operations.
pub type Result<T> = std::result::Result<T, TuirunError>;
