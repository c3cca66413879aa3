//! The seam between the interaction protocol and the process it drives.

use crate::Result;
use std::time::Duration;

/// Result of one bounded read.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ReadOutcome {
    /// Some bytes arrived.
    Data(Vec<u8>),
    /// Nothing buffered and the read was a non-blocking poll.
    WouldBlock,
    /// Nothing arrived before the timeout.
    TimedOut,
    /// The target closed its end of the terminal.
    Eof,
}

/// Control keys the protocol sends.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Control {
    /// Ctrl-C.
    Interrupt,
}

impl Control {
    pub fn as_bytes(&self) -> &'static [u8] {
        match self {
            Control::Interrupt => b"\x03",
        }
    }
}

/// An interactive program attached to a terminal.
///
/// Every method is bounded in time: no call may block without a timeout.
#[allow(async_fn_in_trait)]
pub trait Terminal {
    fn is_alive(&mut self) -> bool;

    /// Write `text`, sleeping `char_delay` after each character when non-zero.
    async fn send_text(&mut self, text: &str, char_delay: Duration) -> Result<()>;

    async fn send_control(&mut self, control: Control) -> Result<()>;

    /// Read at most `max_bytes`. A zero `timeout` polls without waiting.
    async fn read_available(&mut self, max_bytes: usize, timeout: Duration)
    -> Result<ReadOutcome>;

    /// Stop the process. `force` skips straight to SIGKILL.
    fn terminate(&mut self, force: bool) -> Result<()>;
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_control_bytes() {
        assert_eq!(Control::Interrupt.as_bytes(), b"\x03");
    }
}
