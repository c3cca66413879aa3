//! Named timing constants for driving the target.
//!
//! These values are tuned against the target's redraw latency. They are kept
//! in milliseconds so a config file can override any of them.

use serde::{Deserialize, Serialize};
use std::time::Duration;

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct TimingConfig {
    /// Pause after spawn before looking at the screen.
    pub startup_delay_ms: u64,
    /// How long to wait for a ready marker before proceeding anyway.
    pub ready_timeout_ms: u64,
    pub post_ready_delay_ms: u64,
    /// Gap between the warm-up character and its delete.
    pub warmup_gap_ms: u64,
    pub warmup_settle_ms: u64,
    pub command_first_char_delay_ms: u64,
    pub command_char_delay_ms: u64,
    pub prompt_first_char_delay_ms: u64,
    pub prompt_char_delay_ms: u64,
    /// Pause between the last typed character and the submit key.
    pub pre_submit_delay_ms: u64,
    /// Time spent draining echo after the auto-execute toggle.
    pub auto_execute_settle_ms: u64,
    /// How long to look for activity markers after submitting.
    pub activity_wait_ms: u64,
    /// Read timeout of one monitor iteration.
    pub poll_interval_ms: u64,
    /// Read timeout of one pattern-waiter iteration.
    pub waiter_read_ms: u64,
    /// Busy-marker silence that counts as completion.
    pub busy_idle_threshold_ms: u64,
    /// Silence before the submit key is re-sent.
    pub bootstrap_threshold_ms: u64,
    pub max_submit_retries: u32,
    pub retry_key_gap_ms: u64,
    /// Pause between the interrupt and the quit command.
    pub interrupt_gap_ms: u64,
    /// How long to wait for the stream to close after quitting.
    pub exit_wait_ms: u64,
    /// Maximum bytes returned by one monitor read.
    pub chunk_size: usize,
}

impl Default for TimingConfig {
    fn default() -> Self {
        Self {
            startup_delay_ms: 3000,
            ready_timeout_ms: 15_000,
            post_ready_delay_ms: 1000,
            warmup_gap_ms: 100,
            warmup_settle_ms: 200,
            command_first_char_delay_ms: 100,
            command_char_delay_ms: 20,
            prompt_first_char_delay_ms: 50,
            prompt_char_delay_ms: 10,
            pre_submit_delay_ms: 500,
            auto_execute_settle_ms: 1500,
            activity_wait_ms: 1500,
            poll_interval_ms: 1000,
            waiter_read_ms: 100,
            busy_idle_threshold_ms: 10_000,
            bootstrap_threshold_ms: 10_000,
            max_submit_retries: 3,
            retry_key_gap_ms: 300,
            interrupt_gap_ms: 300,
            exit_wait_ms: 3000,
            chunk_size: 4096,
        }
    }
}

impl TimingConfig {
    /// Convert one of the millisecond fields to a `Duration`.
    pub fn ms(value: u64) -> Duration {
        Duration::from_millis(value)
    }

    pub fn poll_interval(&self) -> Duration {
        Self::ms(self.poll_interval_ms)
    }

    pub fn waiter_read(&self) -> Duration {
        Self::ms(self.waiter_read_ms)
    }

    pub fn busy_idle_threshold(&self) -> Duration {
        Self::ms(self.busy_idle_threshold_ms)
    }

    pub fn bootstrap_threshold(&self) -> Duration {
        Self::ms(self.bootstrap_threshold_ms)
    }

    /// Every delay zeroed. Used by tests that script the terminal by hand.
    pub fn immediate() -> Self {
        Self {
            startup_delay_ms: 0,
            ready_timeout_ms: 0,
            post_ready_delay_ms: 0,
            warmup_gap_ms: 0,
            warmup_settle_ms: 0,
            command_first_char_delay_ms: 0,
            command_char_delay_ms: 0,
            prompt_first_char_delay_ms: 0,
            prompt_char_delay_ms: 0,
            pre_submit_delay_ms: 0,
            auto_execute_settle_ms: 0,
            activity_wait_ms: 0,
            retry_key_gap_ms: 0,
            interrupt_gap_ms: 0,
            exit_wait_ms: 0,
            ..Self::default()
        }
    }
}
