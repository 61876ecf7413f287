// LogTab - main.rs
//
// Command-line host for the log coordinator. Handles:
// 1. CLI argument parsing
// 2. Config loading and logging initialisation (debug mode support)
// 3. Pattern set construction (built-in + user-defined)
// 4. Either running a job and tailing its log, or following a log file

use logtab::app::coordinator::LogCoordinator;
use logtab::app::diagnostics::TracingSink;
use logtab::app::tail::TailManager;
use logtab::core::model::{JobStatus, StatusSummary};
use logtab::platform;
use logtab::ui::console::{ConsoleRenderer, OutputFormat};
use logtab::util;
use logtab::util::error::LogTabError;

use clap::Parser;
use std::io::{self, BufRead, BufReader};
use std::path::{Path, PathBuf};
use std::process::{Child, Command, ExitStatus, Stdio};
use std::sync::{Arc, Mutex};
use std::time::Duration;

/// Host loop tick: how often events are pumped and the child is checked.
const HOST_TICK: Duration = Duration::from_millis(50);

/// LogTab - live, classified view of a job's log file.
///
/// Follows LOGFILE, colouring error lines and the primary module's own lines.
/// When a COMMAND is given it is run as the job: the log is tailed while it
/// runs and a completion summary is printed when it exits.
#[derive(Parser, Debug)]
#[command(name = "logtab", version, about)]
struct Cli {
    /// Log file to follow.
    logfile: PathBuf,

    /// Job to run; its exit status decides the final summary.
    #[arg(last = true)]
    command: Vec<String>,

    /// Dotted name of the job's primary module (overrides config).
    #[arg(short = 'm', long = "module")]
    module: Option<String>,

    /// Output format.
    #[arg(short = 'f', long = "format", value_enum, default_value_t = OutputFormat::Ansi)]
    format: OutputFormat,

    /// Configuration directory (defaults to the platform config dir).
    #[arg(short = 'c', long = "config-dir")]
    config_dir: Option<PathBuf>,

    /// Enable debug logging (equivalent to RUST_LOG=debug).
    #[arg(short = 'd', long = "debug")]
    debug: bool,

    /// Reveal the log file in the file manager once the job has finished.
    #[arg(long = "reveal")]
    reveal: bool,
}

fn main() {
    let cli = Cli::parse();

    // Config is read before logging exists; its warnings are replayed below.
    let config_dir = cli
        .config_dir
        .clone()
        .unwrap_or_else(|| platform::config::PlatformPaths::resolve().config_dir);
    let (config, config_warnings) = platform::config::load_config(&config_dir);

    util::logging::init(
        cli.debug,
        config.log_level.as_deref(),
        config.log_file.as_deref(),
    );

    tracing::info!(
        version = util::constants::APP_VERSION,
        debug = cli.debug,
        "LogTab starting"
    );
    for warning in &config_warnings {
        tracing::warn!(warning = %warning, "Config warning");
    }

    let module = cli
        .module
        .clone()
        .or_else(|| config.module.clone())
        .unwrap_or_default();
    let patterns = config.pattern_set(&module);
    tracing::info!(module = %module, patterns = patterns.len(), "Classification ready");

    let mut coordinator = LogCoordinator::new(
        patterns,
        TailManager::with_poll_interval(config.poll_interval),
        Box::new(TracingSink::new(module)),
    );
    let mut renderer = ConsoleRenderer::new(cli.format, coordinator.subscribe());

    let code = if cli.command.is_empty() {
        follow(&mut coordinator, &mut renderer, &cli.logfile)
    } else {
        run_job(&mut coordinator, &mut renderer, &cli)
    };

    coordinator.unmount();
    std::process::exit(code);
}

/// Follow `path` until interrupted. Returns 1 straight away if it is missing.
fn follow(coordinator: &mut LogCoordinator, renderer: &mut ConsoleRenderer, path: &Path) -> i32 {
    coordinator.mount(Some(path.to_path_buf()), JobStatus::Running);
    if !coordinator.is_watching() {
        render(renderer);
        return 1;
    }
    loop {
        coordinator.pump();
        render(renderer);
        std::thread::sleep(HOST_TICK);
    }
}

/// Run the job command while tailing its log. Returns the job's exit code.
fn run_job(coordinator: &mut LogCoordinator, renderer: &mut ConsoleRenderer, cli: &Cli) -> i32 {
    let mut child = match spawn_job(&cli.command) {
        Ok(child) => child,
        Err(e) => {
            tracing::error!(error = %e, "Failed to start job");
            eprintln!("Error: {e}");
            return 1;
        }
    };
    tracing::info!(command = ?cli.command, pid = child.id(), "Job started");

    let stderr = Arc::new(Mutex::new(String::new()));
    let reader = child.stderr.take().map(|pipe| {
        let stderr = Arc::clone(&stderr);
        std::thread::spawn(move || capture_stderr(pipe, &stderr))
    });

    // The job creates its log; the path is reported once the file exists.
    coordinator.mount(None, JobStatus::Running);
    eprintln!("{}", banner(&coordinator.summary(None)));

    let exit = loop {
        if coordinator.log_path().is_none() && cli.logfile.is_file() {
            coordinator.set_log_path(Some(cli.logfile.clone()));
        }
        coordinator.pump();
        render(renderer);

        match child.try_wait() {
            Ok(Some(status)) => break Some(status),
            Ok(None) => std::thread::sleep(HOST_TICK),
            Err(e) => {
                tracing::error!(error = %e, "Failed to query job status");
                break None;
            }
        }
    };

    if let Some(handle) = reader {
        if handle.join().is_err() {
            tracing::warn!("stderr reader thread panicked");
        }
    }

    let status = exit.map_or(JobStatus::Error, job_status);
    coordinator.set_job_status(status);
    if coordinator.log_path().is_none() {
        coordinator.set_log_path(Some(cli.logfile.clone()));
    }
    render(renderer);

    let captured = match stderr.lock() {
        Ok(text) => text.clone(),
        Err(poisoned) => poisoned.into_inner().clone(),
    };
    eprintln!("{}", banner(&coordinator.summary(Some(&captured))));
    tracing::info!(status = %status, "Job finished");

    if cli.reveal && !coordinator.reveal_log_file() {
        tracing::warn!("Log file could not be revealed");
    }

    exit.and_then(|s| s.code()).unwrap_or(1)
}

fn spawn_job(command: &[String]) -> util::error::Result<Child> {
    let (program, args) = command.split_first().ok_or_else(|| LogTabError::Io {
        path: PathBuf::new(),
        operation: "start job",
        source: io::Error::new(io::ErrorKind::InvalidInput, "empty command"),
    })?;
    Command::new(program)
        .args(args)
        .stderr(Stdio::piped())
        .spawn()
        .map_err(|source| LogTabError::Io {
            path: PathBuf::from(program),
            operation: "start job",
            source,
        })
}

/// Exit code 0 is success, any other code an error; no code means the job
/// was killed by a signal.
fn job_status(exit: ExitStatus) -> JobStatus {
    match exit.code() {
        Some(0) => JobStatus::Success,
        Some(_) => JobStatus::Error,
        None => JobStatus::Canceled,
    }
}

fn capture_stderr(pipe: impl io::Read, sink: &Mutex<String>) {
    for line in BufReader::new(pipe).lines() {
        let line = match line {
            Ok(line) => line,
            Err(e) => {
                tracing::warn!(error = %e, "Failed to read job stderr");
                break;
            }
        };
        tracing::debug!(line = util::logging::preview(&line), "Job stderr");
        let mut text = match sink.lock() {
            Ok(text) => text,
            Err(poisoned) => poisoned.into_inner(),
        };
        text.push_str(&line);
        text.push('\n');
    }
}

fn render(renderer: &mut ConsoleRenderer) {
    let stdout = io::stdout();
    let mut out = stdout.lock();
    if let Err(e) = renderer.drain(&mut out) {
        tracing::warn!(error = %e, "Failed to write log output");
    }
}

fn banner(summary: &StatusSummary) -> String {
    match summary {
        StatusSummary::None => String::new(),
        StatusSummary::Running { can_cancel: true } => "Running... (Ctrl-C to cancel)".to_string(),
        StatusSummary::Running { can_cancel: false } => "Running...".to_string(),
        StatusSummary::Failed { last_line } => format!("Error: {last_line}"),
        StatusSummary::Complete { message } => message.clone(),
        StatusSummary::Canceled => "Run Canceled".to_string(),
    }
}

