//! Completion detection against scripted output streams.

mod common;

use common::{ScriptedTerminal, SharedBuf};
use std::time::Duration;
use tokio::time::Instant;
use tuirun_core::{ActivityMonitor, MonitorLimits, OutputSink, PatternSet};
use tuirun_types::{CompletionReason, TimingConfig};

fn monitor(overall_secs: u64, idle_secs: u64) -> ActivityMonitor {
    let limits = MonitorLimits::new(
        Duration::from_secs(overall_secs),
        Duration::from_secs(idle_secs),
        &TimingConfig::default(),
    );
    ActivityMonitor::new(
        limits,
        PatternSet::literals(&["..."]),
        vec!["\r".to_string(), "\n".to_string()],
        Instant::now(),
    )
}

#[tokio::test(start_paused = true)]
async fn test_busy_marker_path_completes_after_threshold() {
    let mut term = ScriptedTerminal::new().output_at(0.0, "...");
    let mut sink = OutputSink::Clean(Vec::new());

    let report = monitor(900, 60).run(&mut term, &mut sink).await.unwrap();

    assert!(report.work_started);
    assert_eq!(report.reason, CompletionReason::BusyMarkerStopped);
    assert!(report.elapsed > Duration::from_secs(10));
    assert!(report.elapsed <= Duration::from_secs(12));
    assert_eq!(sink.into_transcript(), Some(b"...".to_vec()));
}

#[tokio::test(start_paused = true)]
async fn test_recurring_busy_marker_keeps_monitor_running() {
    let mut term = ScriptedTerminal::new()
        .repeat_output(0.0, 4.0, 8, "⬡ Generating...\r\n")
        .output_at(30.0, "final answer\r\n");
    let mut sink = OutputSink::Clean(Vec::new());

    let report = monitor(900, 60).run(&mut term, &mut sink).await.unwrap();

    assert!(report.work_started);
    assert_eq!(report.reason, CompletionReason::BusyMarkerStopped);
    // Last marker at t=28, so completion comes just after t=38.
    assert!(report.elapsed > Duration::from_secs(38));
    assert!(report.elapsed <= Duration::from_secs(40));
    let transcript = String::from_utf8(sink.into_transcript().unwrap()).unwrap();
    assert!(transcript.ends_with("final answer\r\n"));
}

#[tokio::test(start_paused = true)]
async fn test_answer_streaming_past_threshold_is_kept() {
    let mut term = ScriptedTerminal::new().output_at(0.0, "Thinking...\r\n");
    for n in 1..=30 {
        term = term.output_at(n as f64, &format!("answer line {}\r\n", n));
    }
    let mut sink = OutputSink::Clean(Vec::new());

    let report = monitor(900, 60).run(&mut term, &mut sink).await.unwrap();

    assert_eq!(report.reason, CompletionReason::BusyMarkerStopped);
    assert!(report.elapsed > Duration::from_secs(30));
    assert!(report.elapsed <= Duration::from_secs(32));
    let transcript = String::from_utf8(sink.into_transcript().unwrap()).unwrap();
    assert!(transcript.contains("answer line 11\r\n"));
    assert!(transcript.ends_with("answer line 30\r\n"));
}

#[tokio::test(start_paused = true)]
async fn test_no_activity_path_retries_then_gives_up() {
    let mut term = ScriptedTerminal::new();
    let mut sink = OutputSink::Clean(Vec::new());

    let report = monitor(60, 60).run(&mut term, &mut sink).await.unwrap();

    assert!(!report.work_started);
    assert_eq!(report.retries, 3);
    assert_eq!(report.reason, CompletionReason::OverallTimeout);
    assert_eq!(term.count_input("\r"), 3);
    assert_eq!(term.count_input("\n"), 3);
    assert!(report.elapsed > Duration::from_secs(60));
}

#[tokio::test(start_paused = true)]
async fn test_output_stops_retries() {
    let mut term = ScriptedTerminal::new().output_at(15.0, "...");
    let mut sink = OutputSink::Clean(Vec::new());

    let report = monitor(900, 60).run(&mut term, &mut sink).await.unwrap();

    assert!(report.work_started);
    assert_eq!(report.retries, 1);
    assert_eq!(report.reason, CompletionReason::BusyMarkerStopped);
}

#[tokio::test(start_paused = true)]
async fn test_idle_fallback_without_busy_marker() {
    let mut term = ScriptedTerminal::new().output_at(1.0, "some plain output\r\n");
    let mut sink = OutputSink::Clean(Vec::new());

    let report = monitor(900, 20).run(&mut term, &mut sink).await.unwrap();

    assert!(!report.work_started);
    assert_eq!(report.reason, CompletionReason::IdleTimeout);
    assert!(report.elapsed > Duration::from_secs(21));
    assert!(report.elapsed <= Duration::from_secs(23));
}

#[tokio::test(start_paused = true)]
async fn test_stream_end_completes() {
    let mut term = ScriptedTerminal::new()
        .output_at(0.0, "...")
        .output_at(1.0, "bye\r\n")
        .close_at(2.0);
    let mut sink = OutputSink::Clean(Vec::new());

    let report = monitor(900, 60).run(&mut term, &mut sink).await.unwrap();

    assert!(report.work_started);
    assert_eq!(report.reason, CompletionReason::StreamEnded);
    assert!(report.elapsed < Duration::from_secs(3));
}

#[tokio::test(start_paused = true)]
async fn test_process_death_without_eof_completes() {
    // A grandchild can keep the terminal open after the target itself dies.
    let mut term = ScriptedTerminal::new()
        .output_at(0.0, "...")
        .kill_at(2.0);
    let mut sink = OutputSink::Clean(Vec::new());

    let report = monitor(900, 60).run(&mut term, &mut sink).await.unwrap();

    assert!(report.work_started);
    assert_eq!(report.reason, CompletionReason::StreamEnded);
    assert!(report.elapsed < Duration::from_secs(4));
}

#[tokio::test(start_paused = true)]
async fn test_raw_mode_streams_without_buffering() {
    let out = SharedBuf::default();
    let mut term = ScriptedTerminal::new()
        .output_at(0.0, "\x1b[2Ka")
        .output_at(1.0, "b...")
        .close_at(2.0);
    let mut sink = OutputSink::Raw(Box::new(out.clone()));

    let report = monitor(900, 60).run(&mut term, &mut sink).await.unwrap();

    assert!(report.work_started);
    assert_eq!(out.contents(), b"\x1b[2Kab...".to_vec());
    assert_eq!(sink.into_transcript(), None);
}
