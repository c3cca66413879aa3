//! tuirun - run one prompt through an interactive terminal agent and print the answer.

use anyhow::Result;
use clap::Parser;
use std::io::Write;
use std::path::PathBuf;
use std::process::ExitCode;
use tuirun_cli::config::Config;
use tuirun_cli::logging::{self, LogConfig, LogFormat};
use tuirun_cli::prompt;
use tuirun_core::{
    ChromeFilter, OutputSink, ProcessCommand, PtyProcess, Reconstructor, Session, SessionOutcome,
};
use tuirun_types::OutputMode;

/// Drive an interactive terminal agent with a single prompt.
#[derive(Parser, Debug)]
#[command(name = "tuirun")]
#[command(about = "Run one prompt through an interactive terminal agent and print the answer")]
#[command(version)]
struct Cli {
    /// Model passed to the target
    #[arg(short, long)]
    model: String,

    /// Prompt text, or a path to a file containing it
    #[arg(short, long)]
    prompt: String,

    /// Overall timeout in seconds [default: 900]
    #[arg(long, value_name = "SECS")]
    timeout: Option<u64>,

    /// Idle timeout in seconds [default: 60]
    #[arg(long = "idle-timeout", value_name = "SECS")]
    idle_timeout: Option<u64>,

    /// Forward the raw terminal stream instead of the reconstructed answer
    #[arg(long)]
    raw: bool,

    /// Reconstructed output (deprecated, now the default)
    #[arg(short, long, hide = true)]
    clean: bool,

    /// Accepted for compatibility and ignored
    #[arg(short, long, hide = true)]
    flag: bool,

    /// Do not switch the target into auto-execute mode
    #[arg(long = "no-auto-run")]
    no_auto_run: bool,

    /// Target program, overriding the config file
    #[arg(long, value_name = "PATH")]
    program: Option<String>,

    /// Path to config file
    #[arg(long, value_name = "FILE")]
    config: Option<PathBuf>,

    /// Enable verbose logging (protocol phases and progress)
    #[arg(short, long)]
    verbose: bool,

    /// Enable debug logging
    #[arg(short, long)]
    debug: bool,

    /// Enable trace logging (includes raw chunk traffic)
    #[arg(long)]
    trace: bool,

    /// Quiet mode (errors only)
    #[arg(short, long)]
    quiet: bool,

    /// Set log level for specific targets (e.g., "monitor=debug").
    /// Can be specified multiple times. Targets are prefixed with "tuirun::" automatically.
    #[arg(long = "log", value_name = "TARGET=LEVEL")]
    log_overrides: Vec<String>,

    /// Log output format
    #[arg(long = "log-format", value_name = "FORMAT", default_value = "text")]
    log_format: LogFormat,

    /// Extra arguments passed to the target after the model
    #[arg(last = true, value_name = "ARGS")]
    extra_args: Vec<String>,
}

#[tokio::main(flavor = "current_thread")]
async fn main() -> ExitCode {
    let cli = Cli::parse();

    let log_config = LogConfig::from_cli(
        cli.verbose,
        cli.debug,
        cli.trace,
        cli.quiet,
        cli.log_overrides.clone(),
        cli.log_format,
    );
    logging::init(&log_config);

    match run(cli).await {
        Ok(code) => ExitCode::from(code),
        Err(e) => {
            tracing::debug!(target: "tuirun::startup", "Run failed: {:?}", e);
            eprintln!("Error: {:#}", e);
            ExitCode::from(1)
        }
    }
}

async fn run(cli: Cli) -> Result<u8> {
    let mut config = match &cli.config {
        Some(path) => Config::load_from(path)?,
        None => {
            let (config, source) = Config::load()?;
            if let Some(path) = source {
                tracing::info!(target: "tuirun::config", "Using config file {}", path.display());
            }
            config
        }
    };
    apply_overrides(&mut config, &cli);
    tracing::debug!(target: "tuirun::config", "Effective configuration: {:?}", config);

    let prompt = prompt::resolve(&cli.prompt)?;
    tracing::info!(
        target: "tuirun::startup",
        "Prompt length: {} chars",
        prompt.chars().count()
    );

    let chrome = ChromeFilter::builtin_with(
        &config.target.extra_chrome_substrings,
        &config.target.extra_chrome_patterns,
    )?;
    let mode = if cli.raw { OutputMode::Raw } else { OutputMode::Clean };

    let command = ProcessCommand::from_profile(&config.target, &cli.model, &config.extra_args);
    let process = PtyProcess::spawn(&command)?;
    let mut session = Session::new(process, config.session_config())?;
    let outcome = session.run(&prompt, OutputSink::for_mode(mode)).await?;

    report(&outcome, &chrome, &prompt)?;
    Ok(outcome.exit_code())
}

fn apply_overrides(config: &mut Config, cli: &Cli) {
    if let Some(timeout) = cli.timeout {
        config.timeout_secs = timeout;
    }
    if let Some(idle) = cli.idle_timeout {
        config.idle_timeout_secs = idle;
    }
    if cli.no_auto_run {
        config.auto_execute = false;
    }
    if let Some(program) = &cli.program {
        config.target.program = program.clone();
    }
    config.extra_args.extend(cli.extra_args.iter().cloned());
}

/// Print the answer (clean mode) and explain a failed run on stderr.
fn report(outcome: &SessionOutcome, chrome: &ChromeFilter, prompt: &str) -> Result<()> {
    if let Some(raw) = outcome.transcript_text() {
        let answer = Reconstructor::new(chrome.clone()).reconstruct(&raw, Some(prompt));
        if answer.is_empty() {
            eprintln!("Error: no output was produced");
        } else {
            let mut stdout = std::io::stdout().lock();
            writeln!(stdout, "{}", answer)?;
            stdout.flush()?;
        }
    }

    if !outcome.work_started {
        eprintln!(
            "Error: the target never showed that it started working ({}). \
             Verify it runs correctly outside tuirun.",
            outcome.reason
        );
    }
    Ok(())
}
