//! A scripted stand-in for a TUI process, driven on tokio's virtual clock.
#![allow(dead_code)]

use std::collections::VecDeque;
use std::io::{self, Write};
use std::sync::{Arc, Mutex};
use std::time::Duration;
use tokio::time::{Instant, sleep, sleep_until};
use tuirun_core::{Control, ReadOutcome, Result, Terminal, TuirunError};

#[derive(Debug, Clone)]
pub enum Event {
    Output(Vec<u8>),
    /// The process exits (output already queued stays readable).
    Exit,
    /// The terminal reports end of stream.
    Close,
}

struct Reaction {
    trigger: String,
    events: Vec<(Duration, Event)>,
    fired: bool,
}

/// Scripted terminal: timed output, plus reactions to typed input.
pub struct ScriptedTerminal {
    start: Instant,
    script: Vec<(Instant, Event)>,
    reactions: Vec<Reaction>,
    pending: VecDeque<Vec<u8>>,
    alive: bool,
    eof: bool,
    input: String,
    terminated: Option<bool>,
}

impl ScriptedTerminal {
    pub fn new() -> Self {
        Self {
            start: Instant::now(),
            script: Vec::new(),
            reactions: Vec::new(),
            pending: VecDeque::new(),
            alive: true,
            eof: false,
            input: String::new(),
            terminated: None,
        }
    }

    /// Emit `text` at `secs` after creation.
    pub fn output_at(mut self, secs: f64, text: &str) -> Self {
        let at = self.start + Duration::from_secs_f64(secs);
        self.schedule(at, Event::Output(text.as_bytes().to_vec()));
        self
    }

    pub fn exit_at(mut self, secs: f64) -> Self {
        let at = self.start + Duration::from_secs_f64(secs);
        self.schedule(at, Event::Exit);
        self.schedule(at, Event::Close);
        self
    }

    /// The process dies but the stream stays open.
    pub fn kill_at(mut self, secs: f64) -> Self {
        let at = self.start + Duration::from_secs_f64(secs);
        self.schedule(at, Event::Exit);
        self
    }

    pub fn close_at(mut self, secs: f64) -> Self {
        let at = self.start + Duration::from_secs_f64(secs);
        self.schedule(at, Event::Close);
        self
    }

    /// Emit `text` every `period` seconds for `count` times, starting at `from`.
    pub fn repeat_output(mut self, from: f64, period: f64, count: usize, text: &str) -> Self {
        for i in 0..count {
            self = self.output_at(from + period * i as f64, text);
        }
        self
    }

    /// Once the accumulated input contains `trigger`, play `events` relative to that moment.
    pub fn on_input(mut self, trigger: &str, events: Vec<(f64, Event)>) -> Self {
        self.reactions.push(Reaction {
            trigger: trigger.to_string(),
            events: events
                .into_iter()
                .map(|(secs, e)| (Duration::from_secs_f64(secs), e))
                .collect(),
            fired: false,
        });
        self
    }

    /// Everything written to the terminal so far.
    pub fn input(&self) -> &str {
        &self.input
    }

    /// `Some(force)` if `terminate` was called.
    pub fn terminated(&self) -> Option<bool> {
        self.terminated
    }

    pub fn count_input(&self, needle: &str) -> usize {
        self.input.matches(needle).count()
    }

    fn schedule(&mut self, at: Instant, event: Event) {
        let idx = self.script.partition_point(|(t, _)| *t <= at);
        self.script.insert(idx, (at, event));
    }

    fn pump(&mut self) {
        let now = Instant::now();
        while let Some((at, _)) = self.script.first() {
            if *at > now {
                break;
            }
            let (_, event) = self.script.remove(0);
            match event {
                Event::Output(bytes) if !self.eof => self.pending.push_back(bytes),
                Event::Output(_) => {}
                Event::Exit => self.alive = false,
                Event::Close => self.eof = true,
            }
        }
    }

    fn record(&mut self, text: &str) -> Result<()> {
        self.pump();
        if !self.alive {
            return Err(TuirunError::IoError(io::Error::new(
                io::ErrorKind::BrokenPipe,
                "terminal closed",
            )));
        }
        self.input.push_str(text);

        let now = Instant::now();
        let mut fired = Vec::new();
        for reaction in self.reactions.iter_mut() {
            if !reaction.fired && self.input.contains(&reaction.trigger) {
                reaction.fired = true;
                fired.extend(reaction.events.iter().map(|(d, e)| (now + *d, e.clone())));
            }
        }
        for (at, event) in fired {
            self.schedule(at, event);
        }
        Ok(())
    }
}

impl Terminal for ScriptedTerminal {
    fn is_alive(&mut self) -> bool {
        self.pump();
        self.alive
    }

    async fn send_text(&mut self, text: &str, char_delay: Duration) -> Result<()> {
        if char_delay.is_zero() {
            return self.record(text);
        }
        for ch in text.chars() {
            self.record(&ch.to_string())?;
            sleep(char_delay).await;
        }
        Ok(())
    }

    async fn send_control(&mut self, control: Control) -> Result<()> {
        self.record(&String::from_utf8_lossy(control.as_bytes()))
    }

    async fn read_available(&mut self, _max_bytes: usize, timeout: Duration) -> Result<ReadOutcome> {
        let deadline = Instant::now() + timeout;
        loop {
            self.pump();
            if let Some(bytes) = self.pending.pop_front() {
                return Ok(ReadOutcome::Data(bytes));
            }
            if self.eof {
                return Ok(ReadOutcome::Eof);
            }
            if timeout.is_zero() {
                return Ok(ReadOutcome::WouldBlock);
            }
            let now = Instant::now();
            if now >= deadline {
                return Ok(ReadOutcome::TimedOut);
            }
            let wake = match self.script.first() {
                Some((at, _)) if *at < deadline => *at,
                _ => deadline,
            };
            sleep_until(wake).await;
        }
    }

    fn terminate(&mut self, force: bool) -> Result<()> {
        self.terminated = Some(force);
        self.alive = false;
        self.eof = true;
        Ok(())
    }
}

/// A `Write` whose contents can be inspected after being boxed.
#[derive(Clone, Default)]
pub struct SharedBuf(pub Arc<Mutex<Vec<u8>>>);

impl SharedBuf {
    pub fn contents(&self) -> Vec<u8> {
        self.0.lock().unwrap().clone()
    }
}

impl Write for SharedBuf {
    fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
        self.0.lock().unwrap().extend_from_slice(buf);
        Ok(buf.len())
    }

    fn flush(&mut self) -> io::Result<()> {
        Ok(())
    }
}
