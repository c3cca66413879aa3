//! Watch the output stream and decide when the target has finished.
//!
//! The target reports nothing structured about its progress. Completion is
//! inferred from three clocks: time since any output, time since the last
//! busy marker, and total time since the prompt was submitted.

use crate::patterns::PatternSet;
use crate::terminal::{ReadOutcome, Terminal};
use crate::Result;
use std::io::Write;
use std::time::Duration;
use tokio::time::Instant;
use tracing::{debug, info};
use tuirun_types::{CompletionReason, OutputMode, TimingConfig};

/// Idle time after which progress lines start being logged.
const PROGRESS_AFTER: Duration = Duration::from_secs(3);
/// Minimum spacing between progress lines.
const PROGRESS_EVERY: Duration = Duration::from_secs(5);

/// Where monitored chunks go. Chosen once per invocation.
pub enum OutputSink {
    /// Forward every chunk immediately.
    Raw(Box<dyn Write + Send>),
    /// Keep the transcript for reconstruction.
    Clean(Vec<u8>),
}

impl OutputSink {
    pub fn for_mode(mode: OutputMode) -> Self {
        match mode {
            OutputMode::Raw => OutputSink::Raw(Box::new(std::io::stdout())),
            OutputMode::Clean => OutputSink::Clean(Vec::new()),
        }
    }

    pub fn accept(&mut self, bytes: &[u8]) -> Result<()> {
        match self {
            OutputSink::Raw(out) => {
                out.write_all(bytes)?;
                out.flush()?;
            }
            OutputSink::Clean(transcript) => transcript.extend_from_slice(bytes),
        }
        Ok(())
    }

    /// The buffered transcript; `None` in raw mode.
    pub fn into_transcript(self) -> Option<Vec<u8>> {
        match self {
            OutputSink::Raw(_) => None,
            OutputSink::Clean(transcript) => Some(transcript),
        }
    }
}

/// Thresholds for the stopping rules.
#[derive(Debug, Clone)]
pub struct MonitorLimits {
    /// Hard ceiling since the prompt was submitted.
    pub overall_timeout: Duration,
    /// Output silence that counts as completion when no busy marker is known.
    pub idle_timeout: Duration,
    pub busy_idle_threshold: Duration,
    pub bootstrap_threshold: Duration,
    pub max_retries: u32,
    pub poll_interval: Duration,
    pub chunk_size: usize,
    pub retry_key_gap: Duration,
}

impl MonitorLimits {
    pub fn new(overall_timeout: Duration, idle_timeout: Duration, timing: &TimingConfig) -> Self {
        Self {
            overall_timeout,
            idle_timeout,
            busy_idle_threshold: timing.busy_idle_threshold(),
            bootstrap_threshold: timing.bootstrap_threshold(),
            max_retries: timing.max_submit_retries,
            poll_interval: timing.poll_interval(),
            chunk_size: timing.chunk_size,
            retry_key_gap: TimingConfig::ms(timing.retry_key_gap_ms),
        }
    }
}

/// What the latest read looked like, as far as the stopping rules care.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Poll {
    /// A chunk arrived.
    Data,
    /// The read timed out with the stream still open.
    Quiet,
    /// End of stream, or the process is gone.
    Ended,
}

/// Result of evaluating the stopping rules once.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Verdict {
    Continue,
    /// Nothing has arrived yet; press submit again.
    Resubmit,
    Complete(CompletionReason),
}

#[derive(Debug, Clone)]
pub struct MonitorReport {
    /// Whether a busy marker was ever seen. This is the success signal.
    pub work_started: bool,
    pub reason: CompletionReason,
    pub retries: u32,
    pub elapsed: Duration,
    pub bytes_read: usize,
}

pub struct ActivityMonitor {
    limits: MonitorLimits,
    busy: PatternSet,
    retry_keys: Vec<String>,
    submitted_at: Instant,
    last_output: Instant,
    last_busy: Option<Instant>,
    output_seen: bool,
    retries: u32,
    bytes_read: usize,
    last_progress: Option<Instant>,
}

impl ActivityMonitor {
    pub fn new(
        limits: MonitorLimits,
        busy: PatternSet,
        retry_keys: Vec<String>,
        submitted_at: Instant,
    ) -> Self {
        Self {
            limits,
            busy,
            retry_keys,
            submitted_at,
            last_output: submitted_at,
            last_busy: None,
            output_seen: false,
            retries: 0,
            bytes_read: 0,
            last_progress: None,
        }
    }

    pub fn work_started(&self) -> bool {
        self.last_busy.is_some()
    }

    pub fn retries(&self) -> u32 {
        self.retries
    }

    /// Record a chunk that arrived at `now`.
    pub fn observe(&mut self, bytes: &[u8], now: Instant) {
        if bytes.is_empty() {
            return;
        }
        self.output_seen = true;
        self.last_output = now;
        self.bytes_read += bytes.len();

        if let Some(tag) = self.busy.find(&String::from_utf8_lossy(bytes)) {
            if self.last_busy.is_none() {
                info!(target: "tuirun::monitor", "Busy indicator detected ({:?})", tag);
            }
            self.last_busy = Some(now);
        }
    }

    /// Hand a chunk to the sink and record it.
    pub fn ingest(&mut self, bytes: &[u8], sink: &mut OutputSink, now: Instant) -> Result<()> {
        if bytes.is_empty() {
            return Ok(());
        }
        sink.accept(bytes)?;
        self.observe(bytes, now);
        Ok(())
    }

    /// Apply the stopping rules in order; the first that matches wins.
    ///
    /// Only the overall ceiling applies while chunks keep arriving. The other
    /// rules need a quiet poll, so a streaming answer is never cut short.
    pub fn evaluate(&self, now: Instant, poll: Poll) -> Verdict {
        let overall_expired = now.duration_since(self.submitted_at) > self.limits.overall_timeout;
        if poll == Poll::Data {
            return if overall_expired {
                Verdict::Complete(CompletionReason::OverallTimeout)
            } else {
                Verdict::Continue
            };
        }

        if let Some(last_busy) = self.last_busy {
            if now.duration_since(last_busy) > self.limits.busy_idle_threshold {
                return Verdict::Complete(CompletionReason::BusyMarkerStopped);
            }
        }

        let idle = now.duration_since(self.last_output);
        if self.output_seen && idle > self.limits.idle_timeout {
            return Verdict::Complete(CompletionReason::IdleTimeout);
        }

        if !self.output_seen
            && idle > self.limits.bootstrap_threshold
            && self.retries < self.limits.max_retries
        {
            return Verdict::Resubmit;
        }

        if overall_expired {
            return Verdict::Complete(CompletionReason::OverallTimeout);
        }

        if poll == Poll::Ended {
            return Verdict::Complete(CompletionReason::StreamEnded);
        }

        Verdict::Continue
    }

    /// Read and classify output until a stopping rule fires.
    pub async fn run<T: Terminal>(&mut self, term: &mut T, sink: &mut OutputSink) -> Result<MonitorReport> {
        info!(target: "tuirun::monitor", "Monitoring output...");

        loop {
            let read = term
                .read_available(self.limits.chunk_size, self.limits.poll_interval)
                .await?;
            let now = Instant::now();

            let poll = match read {
                ReadOutcome::Data(bytes) => {
                    self.ingest(&bytes, sink, now)?;
                    Poll::Data
                }
                ReadOutcome::WouldBlock | ReadOutcome::TimedOut => {
                    if term.is_alive() { Poll::Quiet } else { Poll::Ended }
                }
                ReadOutcome::Eof => Poll::Ended,
            };

            self.log_progress(now);

            match self.evaluate(now, poll) {
                Verdict::Continue => {}
                Verdict::Resubmit => {
                    self.retries += 1;
                    info!(
                        target: "tuirun::monitor",
                        "Retry #{}: no output yet, pressing submit again",
                        self.retries
                    );
                    self.resubmit(term).await?;
                    self.last_output = Instant::now();
                }
                Verdict::Complete(reason) => {
                    info!(target: "tuirun::monitor", "Task complete ({})", reason);
                    return Ok(MonitorReport {
                        work_started: self.work_started(),
                        reason,
                        retries: self.retries,
                        elapsed: now.duration_since(self.submitted_at),
                        bytes_read: self.bytes_read,
                    });
                }
            }
        }
    }

    async fn resubmit<T: Terminal>(&mut self, term: &mut T) -> Result<()> {
        for (i, key) in self.retry_keys.iter().enumerate() {
            if i > 0 && !self.limits.retry_key_gap.is_zero() {
                tokio::time::sleep(self.limits.retry_key_gap).await;
            }
            term.send_text(key, Duration::ZERO).await?;
        }
        Ok(())
    }

    fn log_progress(&mut self, now: Instant) {
        let idle = now.duration_since(self.last_output);
        if idle <= PROGRESS_AFTER {
            return;
        }
        if let Some(last) = self.last_progress {
            if now.duration_since(last) < PROGRESS_EVERY {
                return;
            }
        }
        self.last_progress = Some(now);

        let status = if self.work_started() { "working" } else { "waiting" };
        let busy_idle = self
            .last_busy
            .map(|t| format!(", busy_idle: {}s", now.duration_since(t).as_secs()))
            .unwrap_or_default();
        debug!(
            target: "tuirun::monitor",
            "{}, idle: {}s{}, elapsed: {}s",
            status,
            idle.as_secs(),
            busy_idle,
            now.duration_since(self.submitted_at).as_secs()
        );
    }
}
