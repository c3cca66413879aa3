//! Block until one of several markers shows up in the output.

use crate::patterns::PatternSet;
use crate::terminal::{ReadOutcome, Terminal};
use crate::Result;
use std::time::Duration;
use tokio::time::Instant;
use tracing::{debug, trace};

/// Read size for each waiter iteration.
const WAIT_READ_BYTES: usize = 65536;

/// Why [`wait_for_any`] returned.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum WaitEnd {
    /// A pattern matched; holds its tag.
    Matched(String),
    TimedOut,
    StreamEnded,
    ProcessExited,
}

#[derive(Debug, Clone)]
pub struct WaitOutcome {
    /// Everything read during the wait.
    pub captured: Vec<u8>,
    pub end: WaitEnd,
}

impl WaitOutcome {
    pub fn matched(&self) -> Option<&str> {
        match &self.end {
            WaitEnd::Matched(tag) => Some(tag),
            _ => None,
        }
    }

    pub fn captured_text(&self) -> String {
        String::from_utf8_lossy(&self.captured).into_owned()
    }
}

/// Read until the accumulated output contains any of `patterns`.
///
/// Never fails on timeout: a missing marker is an ordinary outcome that the
/// caller inspects. Errors only come from the terminal itself.
pub async fn wait_for_any<T: Terminal>(
    term: &mut T,
    patterns: &PatternSet,
    timeout: Duration,
    read_timeout: Duration,
) -> Result<WaitOutcome> {
    let deadline = Instant::now() + timeout;
    let read_timeout = read_timeout.max(Duration::from_millis(1));
    let mut captured = Vec::new();

    let end = loop {
        if !term.is_alive() {
            // Pick up whatever the process wrote before it died.
            while let ReadOutcome::Data(bytes) = term.read_available(WAIT_READ_BYTES, Duration::ZERO).await? {
                captured.extend_from_slice(&bytes);
            }
            break WaitEnd::ProcessExited;
        }

        let now = Instant::now();
        if now >= deadline {
            break WaitEnd::TimedOut;
        }
        let remaining = deadline - now;

        match term.read_available(WAIT_READ_BYTES, read_timeout.min(remaining)).await? {
            ReadOutcome::Data(bytes) => {
                trace!(target: "tuirun::waiter", "Read {} bytes", bytes.len());
                captured.extend_from_slice(&bytes);
                if let Some(tag) = patterns.find(&String::from_utf8_lossy(&captured)) {
                    break WaitEnd::Matched(tag.to_string());
                }
            }
            ReadOutcome::WouldBlock | ReadOutcome::TimedOut => {}
            ReadOutcome::Eof => break WaitEnd::StreamEnded,
        }
    };

    debug!(
        target: "tuirun::waiter",
        "Wait finished: {:?} ({} bytes captured)",
        end,
        captured.len()
    );
    Ok(WaitOutcome { captured, end })
}

/// Read for `duration` and return everything that arrived.
pub(crate) async fn drain_for<T: Terminal>(
    term: &mut T,
    duration: Duration,
    read_timeout: Duration,
) -> Result<Vec<u8>> {
    let outcome = wait_for_any(term, &PatternSet::default(), duration, read_timeout).await?;
    Ok(outcome.captured)
}
