//! The target program running under a pseudo-terminal.

use crate::terminal::{Control, ReadOutcome, Terminal};
use crate::{Result, TuirunError};
use portable_pty::{
    Child as PtyChild, ChildKiller, CommandBuilder, MasterPty, PtySize, native_pty_system,
};
use std::io::{Read, Write};
use std::time::Duration;
use tokio::sync::mpsc::{self, error::TryRecvError};
use tracing::{debug, info, trace, warn};
use tuirun_types::TargetProfile;

/// Longest a single write may block before the target is considered stuck.
const DEFAULT_WRITE_TIMEOUT: Duration = Duration::from_secs(5);

type PtyWriter = Box<dyn Write + Send>;

/// What to run and how big its screen is.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ProcessCommand {
    pub program: String,
    pub args: Vec<String>,
    pub rows: u16,
    pub cols: u16,
}

impl ProcessCommand {
    pub fn from_profile(profile: &TargetProfile, model: &str, extra_args: &[String]) -> Self {
        Self {
            program: profile.program.clone(),
            args: profile.args(model, extra_args),
            rows: profile.rows,
            cols: profile.cols,
        }
    }

    /// Shell-like rendering for logs.
    pub fn display(&self) -> String {
        std::iter::once(self.program.as_str())
            .chain(self.args.iter().map(String::as_str))
            .collect::<Vec<_>>()
            .join(" ")
    }
}

/// A child process attached to a PTY, read through a background thread.
///
/// PTY reads block, so a dedicated thread forwards chunks into a channel and
/// the protocol side reads from the channel with a timeout.
pub struct PtyProcess {
    child: Box<dyn PtyChild + Send + Sync>,
    /// `None` while a write is in flight on the blocking pool, or after one timed out.
    writer: Option<PtyWriter>,
    write_timeout: Duration,
    _master: Box<dyn MasterPty + Send>,
    output_rx: mpsc::UnboundedReceiver<Vec<u8>>,
    /// Bytes received but not yet handed out because of `max_bytes`.
    pending: Vec<u8>,
    exited: bool,
}

impl PtyProcess {
    pub fn spawn(command: &ProcessCommand) -> Result<Self> {
        info!(target: "tuirun::process", "Spawning {}", command.display());

        let pty_system = native_pty_system();
        debug!(
            target: "tuirun::process",
            "Creating PTY with size: {}x{}", command.cols, command.rows
        );

        let pair = pty_system
            .openpty(PtySize {
                rows: command.rows,
                cols: command.cols,
                pixel_width: 0,
                pixel_height: 0,
            })
            .map_err(|e| TuirunError::PtyError(e.to_string()))?;

        let mut cmd = CommandBuilder::new(&command.program);
        cmd.args(&command.args);
        cmd.env("TERM", "xterm-256color");
        if let Ok(cwd) = std::env::current_dir() {
            cmd.cwd(cwd);
        }

        let child = pair
            .slave
            .spawn_command(cmd)
            .map_err(|e| TuirunError::ProcessSpawnFailed(format!("{}: {}", command.program, e)))?;

        // Without this the master never sees EOF after the child exits.
        drop(pair.slave);

        let mut reader = pair
            .master
            .try_clone_reader()
            .map_err(|e| TuirunError::PtyError(e.to_string()))?;

        let writer = pair
            .master
            .take_writer()
            .map_err(|e| TuirunError::PtyError(e.to_string()))?;

        let (output_tx, output_rx) = mpsc::unbounded_channel();

        std::thread::spawn(move || {
            let mut buf = [0u8; 4096];
            let mut total_bytes = 0usize;
            debug!(target: "tuirun::process", "PTY reader thread started");

            loop {
                match reader.read(&mut buf) {
                    Ok(0) => {
                        debug!(target: "tuirun::process", "PTY reader got EOF after {} bytes", total_bytes);
                        break;
                    }
                    Ok(n) => {
                        total_bytes += n;
                        trace!(
                            target: "tuirun::process",
                            "PTY output ({} bytes, total {}): {}",
                            n,
                            total_bytes,
                            String::from_utf8_lossy(&buf[..n]).chars().take(200).collect::<String>()
                        );
                        if output_tx.send(buf[..n].to_vec()).is_err() {
                            break;
                        }
                    }
                    Err(e) if e.kind() == std::io::ErrorKind::Interrupted => continue,
                    Err(e) => {
                        // Linux reports EIO once the slave side is gone.
                        debug!(target: "tuirun::process", "PTY read ended: {}", e);
                        break;
                    }
                }
            }

            debug!(target: "tuirun::process", "PTY reader thread exiting");
        });

        info!(
            target: "tuirun::process",
            "Spawned {} (pid {:?})",
            command.program,
            child.process_id()
        );

        Ok(Self {
            child,
            writer: Some(writer),
            write_timeout: DEFAULT_WRITE_TIMEOUT,
            _master: pair.master,
            output_rx,
            pending: Vec::new(),
            exited: false,
        })
    }

    pub fn with_write_timeout(mut self, timeout: Duration) -> Self {
        self.write_timeout = timeout;
        self
    }

    /// PTY writes block once the target stops draining its input, so they run
    /// on the blocking pool and are abandoned after `write_timeout`.
    async fn write_bytes(&mut self, bytes: &[u8]) -> Result<()> {
        let mut writer = self
            .writer
            .take()
            .ok_or_else(|| TuirunError::PtyError("terminal input is stuck".to_string()))?;
        let len = bytes.len();
        let bytes = bytes.to_vec();

        let write = tokio::task::spawn_blocking(move || {
            let result = writer.write_all(&bytes).and_then(|_| writer.flush());
            (writer, result)
        });

        match tokio::time::timeout(self.write_timeout, write).await {
            Ok(Ok((writer, result))) => {
                self.writer = Some(writer);
                result?;
                Ok(())
            }
            Ok(Err(e)) => Err(TuirunError::PtyError(format!("write task failed: {}", e))),
            Err(_) => {
                warn!(
                    target: "tuirun::process",
                    "Write of {} bytes blocked for {:?}, target is not reading input",
                    len,
                    self.write_timeout
                );
                Err(TuirunError::PtyError(format!(
                    "write blocked for {:?}",
                    self.write_timeout
                )))
            }
        }
    }

    fn take_pending(&mut self, max_bytes: usize) -> Vec<u8> {
        let n = max_bytes.max(1).min(self.pending.len());
        self.pending.drain(..n).collect()
    }

    /// Pull everything already queued by the reader thread into `pending`.
    fn drain_queued(&mut self, max_bytes: usize) {
        while self.pending.len() < max_bytes {
            match self.output_rx.try_recv() {
                Ok(chunk) => self.pending.extend_from_slice(&chunk),
                Err(_) => break,
            }
        }
    }

    fn signal(&mut self, force: bool) {
        let pid = self.child.process_id();

        #[cfg(unix)]
        if let Some(pid) = pid {
            let (sig, name) = if force {
                (libc::SIGKILL, "SIGKILL")
            } else {
                (libc::SIGTERM, "SIGTERM")
            };
            info!(target: "tuirun::process", "Sending {} to process group {}", name, pid);
            unsafe {
                // The child is a session leader, so its pid is also its group id.
                libc::kill(-(pid as i32), sig);
            }
        }

        #[cfg(not(unix))]
        let _ = pid;

        if force {
            if let Err(e) = self.child.kill() {
                debug!(target: "tuirun::process", "Kill after SIGKILL failed: {}", e);
            }
        }
    }
}

impl Terminal for PtyProcess {
    fn is_alive(&mut self) -> bool {
        if self.exited {
            return false;
        }
        match self.child.try_wait() {
            Ok(None) => true,
            Ok(Some(status)) => {
                info!(target: "tuirun::process", "Target exited with {:?}", status);
                self.exited = true;
                false
            }
            Err(e) => {
                warn!(target: "tuirun::process", "Failed to poll target status: {}", e);
                self.exited = true;
                false
            }
        }
    }

    async fn send_text(&mut self, text: &str, char_delay: Duration) -> Result<()> {
        if char_delay.is_zero() {
            return self.write_bytes(text.as_bytes()).await;
        }
        let mut buf = [0u8; 4];
        for ch in text.chars() {
            self.write_bytes(ch.encode_utf8(&mut buf).as_bytes()).await?;
            tokio::time::sleep(char_delay).await;
        }
        Ok(())
    }

    async fn send_control(&mut self, control: Control) -> Result<()> {
        self.write_bytes(control.as_bytes()).await
    }

    async fn read_available(&mut self, max_bytes: usize, timeout: Duration) -> Result<ReadOutcome> {
        if !self.pending.is_empty() {
            return Ok(ReadOutcome::Data(self.take_pending(max_bytes)));
        }

        if timeout.is_zero() {
            return Ok(match self.output_rx.try_recv() {
                Ok(chunk) => {
                    self.pending.extend_from_slice(&chunk);
                    self.drain_queued(max_bytes);
                    ReadOutcome::Data(self.take_pending(max_bytes))
                }
                Err(TryRecvError::Empty) => ReadOutcome::WouldBlock,
                Err(TryRecvError::Disconnected) => ReadOutcome::Eof,
            });
        }

        match tokio::time::timeout(timeout, self.output_rx.recv()).await {
            Ok(Some(chunk)) => {
                self.pending.extend_from_slice(&chunk);
                self.drain_queued(max_bytes);
                Ok(ReadOutcome::Data(self.take_pending(max_bytes)))
            }
            Ok(None) => Ok(ReadOutcome::Eof),
            Err(_) => Ok(ReadOutcome::TimedOut),
        }
    }

    fn terminate(&mut self, force: bool) -> Result<()> {
        if !self.is_alive() {
            return Ok(());
        }
        self.signal(force);

        // Reap if it is already gone.
        if let Ok(Some(status)) = self.child.try_wait() {
            debug!(target: "tuirun::process", "Reaped target: {:?}", status);
            self.exited = true;
        }
        Ok(())
    }
}

impl Drop for PtyProcess {
    fn drop(&mut self) {
        if self.is_alive() {
            warn!(target: "tuirun::process", "Target still running on drop, killing it");
            self.signal(true);
            let _ = self.child.try_wait();
        }
    }
}
