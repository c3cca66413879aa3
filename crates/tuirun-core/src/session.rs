//! The interaction protocol: one prompt, one target process, one answer.
//!
//! Order of steps:
//! 1. give the process time to start, then warm up the input field
//! 2. wait for a ready marker (proceed anyway on timeout)
//! 3. optionally switch the target into auto-execute mode
//! 4. warm up again, type the prompt and submit it
//! 5. look for a processing marker (proceed anyway on timeout)
//! 6. monitor until a stopping rule fires
//! 7. interrupt, quit, and kill if the target will not go
//!
//! Step 7 runs on every exit path, including errors.

use crate::monitor::{ActivityMonitor, MonitorLimits, OutputSink};
use crate::patterns::PatternSet;
use crate::reconstruct::strip_control_sequences;
use crate::terminal::{Control, ReadOutcome, Terminal};
use crate::waiter::{WaitEnd, drain_for, wait_for_any};
use crate::{Result, TuirunError};
use std::time::Duration;
use tokio::time::{Instant, sleep};
use tracing::{debug, info, warn};
use tuirun_types::{AutoExecute, CompletionReason, Phase, TargetProfile, TimingConfig};

/// Bytes of recent output kept for error messages.
const RECENT_OUTPUT_BYTES: usize = 16 * 1024;
/// Characters of recent output shown in an error message.
const TRAILING_CHARS: usize = 400;
/// Read size while waiting for the target to exit.
const EXIT_READ_BYTES: usize = 65536;

#[derive(Debug, Clone)]
pub struct SessionConfig {
    pub profile: TargetProfile,
    pub timing: TimingConfig,
    pub overall_timeout: Duration,
    pub idle_timeout: Duration,
    /// Send the auto-execute toggle before the prompt.
    pub auto_execute: bool,
}

impl SessionConfig {
    pub fn new(profile: TargetProfile, timing: TimingConfig) -> Self {
        Self {
            profile,
            timing,
            overall_timeout: Duration::from_secs(900),
            idle_timeout: Duration::from_secs(60),
            auto_execute: true,
        }
    }

    fn monitor_limits(&self) -> MonitorLimits {
        MonitorLimits::new(self.overall_timeout, self.idle_timeout, &self.timing)
    }
}

#[derive(Debug, Clone)]
pub struct SessionOutcome {
    /// A busy marker was seen at least once.
    pub work_started: bool,
    pub reason: CompletionReason,
    pub retries: u32,
    /// Time from prompt submission to completion.
    pub elapsed: Duration,
    /// The activity marker seen right after submitting, if any.
    pub processing_marker: Option<String>,
    /// Raw transcript in clean mode; `None` in raw mode.
    pub transcript: Option<Vec<u8>>,
}

impl SessionOutcome {
    /// Process exit status for this outcome.
    pub fn exit_code(&self) -> u8 {
        if self.work_started { 0 } else { 1 }
    }

    pub fn transcript_text(&self) -> Option<String> {
        self.transcript
            .as_ref()
            .map(|t| String::from_utf8_lossy(t).into_owned())
    }
}

/// Owns the terminal for the whole interaction.
pub struct Session<T: Terminal> {
    term: T,
    config: SessionConfig,
    ready: PatternSet,
    activity: PatternSet,
    busy: PatternSet,
    recent: Vec<u8>,
}

impl<T: Terminal> Session<T> {
    /// Fails only when a configured marker regex does not compile.
    pub fn new(term: T, config: SessionConfig) -> Result<Self> {
        let profile = &config.profile;
        let ready = PatternSet::markers(&profile.ready_markers, &profile.ready_patterns)?;
        let activity = PatternSet::markers(&profile.activity_markers, &profile.activity_patterns)?;
        let busy = PatternSet::markers(&profile.busy_markers, &profile.busy_patterns)?;
        if busy.is_empty() {
            warn!(
                target: "tuirun::session",
                "No busy markers configured; every run will report that no work started"
            );
        }
        Ok(Self {
            term,
            config,
            ready,
            activity,
            busy,
            recent: Vec::new(),
        })
    }

    pub fn terminal(&self) -> &T {
        &self.term
    }

    /// Run the whole protocol for `prompt`, then shut the target down.
    pub async fn run(&mut self, prompt: &str, sink: OutputSink) -> Result<SessionOutcome> {
        let result = self.drive(prompt, sink).await;
        if let Err(e) = &result {
            warn!(target: "tuirun::session", "Session failed: {}", e);
        }
        self.shutdown().await;
        result
    }

    async fn drive(&mut self, prompt: &str, mut sink: OutputSink) -> Result<SessionOutcome> {
        let timing = self.config.timing.clone();

        info!(target: "tuirun::session", "Waiting for TUI to initialize...");
        sleep(TimingConfig::ms(timing.startup_delay_ms)).await;
        self.ensure_alive(Phase::Spawned).await?;
        let warmed = self.warm_up().await;
        self.check_step(Phase::Spawned, warmed).await?;

        let ready = wait_for_any(
            &mut self.term,
            &self.ready,
            TimingConfig::ms(timing.ready_timeout_ms),
            timing.waiter_read(),
        )
        .await?;
        self.remember(&ready.captured);
        match &ready.end {
            WaitEnd::Matched(tag) => {
                info!(target: "tuirun::session", "TUI ready indicator found ({:?})", tag)
            }
            WaitEnd::TimedOut => warn!(
                target: "tuirun::session",
                "TUI ready indicator not found, proceeding anyway"
            ),
            WaitEnd::StreamEnded | WaitEnd::ProcessExited => {
                return Err(self.premature_exit(Phase::AwaitingReady).await);
            }
        }
        sleep(TimingConfig::ms(timing.post_ready_delay_ms)).await;

        if self.config.auto_execute {
            self.enable_auto_execute().await?;
        } else {
            info!(target: "tuirun::session", "Skipping auto-execute toggle");
        }

        info!(
            target: "tuirun::session",
            "Sending prompt ({} chars)...",
            prompt.chars().count()
        );
        let submitted = self.submit_prompt(prompt).await;
        self.check_step(Phase::SubmittingPrompt, submitted).await?;
        let submitted_at = Instant::now();
        self.ensure_alive(Phase::SubmittingPrompt).await?;

        let started = wait_for_any(
            &mut self.term,
            &self.activity,
            TimingConfig::ms(timing.activity_wait_ms),
            timing.waiter_read(),
        )
        .await?;
        self.remember(&started.captured);
        let processing_marker = match &started.end {
            WaitEnd::Matched(tag) => {
                info!(target: "tuirun::session", "Processing started ({:?})", tag);
                Some(tag.clone())
            }
            WaitEnd::TimedOut => {
                info!(
                    target: "tuirun::session",
                    "No processing marker yet, monitoring anyway"
                );
                None
            }
            WaitEnd::StreamEnded | WaitEnd::ProcessExited => {
                return Err(self.premature_exit(Phase::AwaitingProcessingStart).await);
            }
        };

        let mut monitor = ActivityMonitor::new(
            self.config.monitor_limits(),
            self.busy.clone(),
            self.config.profile.retry_keys.clone(),
            submitted_at,
        );
        monitor.ingest(&started.captured, &mut sink, Instant::now())?;
        let report = monitor.run(&mut self.term, &mut sink).await?;

        if report.work_started {
            info!(
                target: "tuirun::session",
                "Finished after {}s ({}, {} bytes read)",
                report.elapsed.as_secs(),
                report.reason,
                report.bytes_read
            );
        } else {
            warn!(
                target: "tuirun::session",
                "No busy indicator seen before {} ({} retries)",
                report.reason,
                report.retries
            );
        }

        Ok(SessionOutcome {
            work_started: report.work_started,
            reason: report.reason,
            retries: report.retries,
            elapsed: report.elapsed,
            processing_marker,
            transcript: sink.into_transcript(),
        })
    }

    async fn submit_prompt(&mut self, prompt: &str) -> Result<()> {
        let timing = self.config.timing.clone();
        self.warm_up().await?;
        self.type_text(
            prompt,
            TimingConfig::ms(timing.prompt_first_char_delay_ms),
            TimingConfig::ms(timing.prompt_char_delay_ms),
        )
        .await?;
        sleep(TimingConfig::ms(timing.pre_submit_delay_ms)).await;
        debug!(target: "tuirun::session", "Submitting prompt");
        let submit_key = self.config.profile.submit_key.clone();
        self.term.send_text(&submit_key, Duration::ZERO).await
    }

    async fn enable_auto_execute(&mut self) -> Result<()> {
        info!(target: "tuirun::session", "Enabling auto-execute mode...");
        let result = self.send_auto_execute().await;

        let timing = &self.config.timing;
        let settle = TimingConfig::ms(timing.auto_execute_settle_ms);
        let read = timing.waiter_read();
        if result.is_ok() {
            let echo = drain_for(&mut self.term, settle, read).await?;
            self.remember(&echo);
        }

        if !self.term.is_alive() {
            self.drain_remaining().await;
            return Err(TuirunError::AutoExecuteFailed {
                trailing: self.trailing_output(),
            });
        }
        result
    }

    async fn send_auto_execute(&mut self) -> Result<()> {
        self.warm_up().await?;
        match self.config.profile.auto_execute.clone() {
            AutoExecute::Command(command) => {
                let timing = self.config.timing.clone();
                self.type_text(
                    &command,
                    TimingConfig::ms(timing.command_first_char_delay_ms),
                    TimingConfig::ms(timing.command_char_delay_ms),
                )
                .await?;
                sleep(TimingConfig::ms(timing.pre_submit_delay_ms)).await;
                let submit_key = self.config.profile.submit_key.clone();
                self.term.send_text(&submit_key, Duration::ZERO).await
            }
            AutoExecute::Keys(keys) => self.term.send_text(&keys, Duration::ZERO).await,
        }
    }

    /// Type a character and delete it so the input field redraws.
    async fn warm_up(&mut self) -> Result<()> {
        let timing = &self.config.timing;
        let gap = TimingConfig::ms(timing.warmup_gap_ms);
        let settle = TimingConfig::ms(timing.warmup_settle_ms);

        self.term.send_text(" ", Duration::ZERO).await?;
        sleep(gap).await;
        self.term.send_text("\x7f", Duration::ZERO).await?;
        sleep(settle).await;
        Ok(())
    }

    /// Type `text`, pausing longer after the first character.
    async fn type_text(&mut self, text: &str, first_delay: Duration, char_delay: Duration) -> Result<()> {
        let Some(first) = text.chars().next() else {
            return Ok(());
        };
        let (head, rest) = text.split_at(first.len_utf8());
        self.term.send_text(head, Duration::ZERO).await?;
        sleep(first_delay).await;
        self.term.send_text(rest, char_delay).await
    }

    async fn ensure_alive(&mut self, phase: Phase) -> Result<()> {
        if self.term.is_alive() {
            return Ok(());
        }
        Err(self.premature_exit(phase).await)
    }

    /// Turn a write failure into a premature-exit error when the target is gone.
    async fn check_step(&mut self, phase: Phase, result: Result<()>) -> Result<()> {
        match result {
            Err(e) if !self.term.is_alive() => {
                debug!(target: "tuirun::session", "Write failed after target exit: {}", e);
                Err(self.premature_exit(phase).await)
            }
            other => other,
        }
    }

    async fn premature_exit(&mut self, phase: Phase) -> TuirunError {
        self.drain_remaining().await;
        warn!(target: "tuirun::session", "Target exited during {}", phase);
        TuirunError::PrematureExit {
            phase,
            trailing: self.trailing_output(),
        }
    }

    /// Collect output that is already buffered, without waiting.
    async fn drain_remaining(&mut self) {
        while let Ok(ReadOutcome::Data(bytes)) =
            self.term.read_available(EXIT_READ_BYTES, Duration::ZERO).await
        {
            self.remember(&bytes);
        }
    }

    fn remember(&mut self, bytes: &[u8]) {
        self.recent.extend_from_slice(bytes);
        if self.recent.len() > RECENT_OUTPUT_BYTES {
            let excess = self.recent.len() - RECENT_OUTPUT_BYTES;
            self.recent.drain(..excess);
        }
    }

    /// Last few hundred characters of output, control sequences removed.
    fn trailing_output(&self) -> String {
        let text = strip_control_sequences(&String::from_utf8_lossy(&self.recent));
        let text = text.trim();
        let count = text.chars().count();
        text.chars()
            .skip(count.saturating_sub(TRAILING_CHARS))
            .collect()
    }

    /// Interrupt, ask the target to quit, and kill it if it will not.
    async fn shutdown(&mut self) {
        if !self.term.is_alive() {
            debug!(target: "tuirun::session", "Target already exited");
            return;
        }
        info!(target: "tuirun::session", "Exiting...");

        let timing = self.config.timing.clone();
        if let Err(e) = self.term.send_control(Control::Interrupt).await {
            debug!(target: "tuirun::session", "Failed to send interrupt: {}", e);
        }
        sleep(TimingConfig::ms(timing.interrupt_gap_ms)).await;
        let quit = self.config.profile.quit_command.clone();
        if let Err(e) = self.term.send_text(&quit, Duration::ZERO).await {
            debug!(target: "tuirun::session", "Failed to send quit command: {}", e);
        }

        let deadline = Instant::now() + TimingConfig::ms(timing.exit_wait_ms);
        let read_timeout = timing.waiter_read().max(Duration::from_millis(1));
        loop {
            if !self.term.is_alive() {
                info!(target: "tuirun::session", "Target exited gracefully");
                return;
            }
            let now = Instant::now();
            if now >= deadline {
                break;
            }
            match self
                .term
                .read_available(EXIT_READ_BYTES, read_timeout.min(deadline - now))
                .await
            {
                Ok(ReadOutcome::Eof) | Err(_) => break,
                Ok(_) => {}
            }
        }

        if self.term.is_alive() {
            warn!(target: "tuirun::session", "Target did not exit in time, forcing termination");
            if let Err(e) = self.term.terminate(true) {
                warn!(target: "tuirun::session", "Forced termination failed: {}", e);
            }
        }
    }
}
