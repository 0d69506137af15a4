use crate::engine::{Clock, ExperimentSession, SessionConfig};
use crate::model::{AppConfig, ExperimentSummary};
use anyhow::{Context, Result};
use clap::Parser;
use std::io::{BufRead, Write};
use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::mpsc;

/// Output line routing for stdout/stderr writer.
#[derive(Debug)]
enum OutputLine {
    Stdout(String),
    Stderr(String),
}

/// Spawn a blocking writer for stdout/stderr to avoid blocking async tasks.
fn spawn_output_writer() -> (
    mpsc::UnboundedSender<OutputLine>,
    tokio::task::JoinHandle<()>,
) {
    let (tx, mut rx) = mpsc::unbounded_channel::<OutputLine>();
    let handle = tokio::task::spawn_blocking(move || {
        let stdout = std::io::stdout();
        let stderr = std::io::stderr();
        let mut out = std::io::LineWriter::new(stdout.lock());
        let mut err = std::io::LineWriter::new(stderr.lock());

        while let Some(line) = rx.blocking_recv() {
            match line {
                OutputLine::Stdout(msg) => {
                    let _ = writeln!(out, "{}", msg);
                }
                OutputLine::Stderr(msg) => {
                    let _ = writeln!(err, "{}", msg);
                }
            }
        }

        let _ = out.flush();
        let _ = err.flush();
    });
    (tx, handle)
}

#[derive(Debug, Parser, Clone)]
#[command(
    name = "labbook",
    version,
    about = "Timestamped experiment notes with optional TUI"
)]
pub struct Cli {
    /// Directory where experiment files are stored (default: ~/labbook)
    #[arg(long, env = "LABBOOK_DIR")]
    pub dir: Option<PathBuf>,

    /// Start an experiment with this title right away
    #[arg(long)]
    pub title: Option<String>,

    /// Line-oriented mode: read notes from stdin (no TUI)
    #[arg(long)]
    pub text: bool,

    /// Like --text, but print finished experiments as JSON
    #[arg(long)]
    pub json: bool,

    /// List past experiments and exit
    #[arg(long)]
    pub list: bool,

    /// Open the storage directory in the system file browser and exit
    #[arg(long)]
    pub open_dir: bool,

    /// Refresh period of the elapsed-time display
    #[arg(long, default_value = "1s")]
    pub tick: humantime::Duration,

    /// Write diagnostic logs here instead of the cache directory
    #[arg(long, env = "LABBOOK_LOG_FILE")]
    pub log_file: Option<PathBuf>,
}

pub async fn run(args: Cli, clock: Arc<dyn Clock>) -> Result<()> {
    let cfg = build_config(&args)?;
    tracing::debug!(dir = %cfg.storage_dir.display(), "storage directory");

    if args.open_dir {
        return crate::storage::open_in_file_browser(&cfg.storage_dir);
    }

    if args.list {
        let experiments = crate::storage::list_experiments(&cfg.storage_dir)?;
        for line in crate::text_summary::build_listing(&experiments).lines {
            println!("{line}");
        }
        return Ok(());
    }

    if !args.json && !args.text {
        #[cfg(feature = "tui")]
        {
            return crate::tui::run(cfg, clock).await;
        }
        #[cfg(not(feature = "tui"))]
        {
            // Fallback when built without TUI support.
            return run_text(cfg, clock, false).await;
        }
    }

    run_text(cfg, clock, args.json).await
}

/// Build an `AppConfig` from CLI arguments.
pub fn build_config(args: &Cli) -> Result<AppConfig> {
    let tick_interval = Duration::from(args.tick);
    if tick_interval.is_zero() {
        return Err(anyhow::anyhow!("--tick must be greater than zero"));
    }
    Ok(AppConfig {
        storage_dir: args
            .dir
            .clone()
            .unwrap_or_else(crate::storage::default_dir),
        title: args
            .title
            .as_deref()
            .map(str::trim)
            .filter(|t| !t.is_empty())
            .map(str::to_string),
        tick_interval,
    })
}

/// A line of text-mode input.
#[derive(Debug, PartialEq, Eq)]
enum TextCommand<'a> {
    Note(&'a str),
    Start(&'a str),
    Stop,
    Elapsed,
    Quit,
}

fn parse_command(line: &str) -> TextCommand<'_> {
    let trimmed = line.trim();
    match trimmed.split_once(char::is_whitespace) {
        Some(("/start", rest)) => TextCommand::Start(rest.trim()),
        _ => match trimmed {
            "/start" => TextCommand::Start(""),
            "/stop" => TextCommand::Stop,
            "/elapsed" => TextCommand::Elapsed,
            "/quit" => TextCommand::Quit,
            _ => TextCommand::Note(line),
        },
    }
}

/// Ask for a title until a non-empty one arrives. `None` on end of input.
fn prompt_title<I>(lines: &mut I, out: &mpsc::UnboundedSender<OutputLine>) -> Result<Option<String>>
where
    I: Iterator<Item = std::io::Result<String>>,
{
    loop {
        let _ = out.send(OutputLine::Stderr("Experiment title:".into()));
        match lines.next() {
            None => return Ok(None),
            Some(line) => {
                let line = line.context("read experiment title")?;
                let title = line.trim();
                if !title.is_empty() {
                    return Ok(Some(title.to_string()));
                }
            }
        }
    }
}

fn start_experiment(
    session: &mut ExperimentSession,
    title: &str,
    summaries: &mut Vec<ExperimentSummary>,
    out: &mpsc::UnboundedSender<OutputLine>,
) -> Result<()> {
    finish_experiment(session, summaries)?;
    let path = session
        .start(title)
        .with_context(|| format!("failed to start experiment \"{title}\""))?;
    tracing::info!(path = %path.display(), title, "experiment started");
    let _ = out.send(OutputLine::Stderr(format!("Recording to {}", path.display())));
    Ok(())
}

fn finish_experiment(
    session: &mut ExperimentSession,
    summaries: &mut Vec<ExperimentSummary>,
) -> Result<()> {
    if !session.is_running() {
        return Ok(());
    }
    let res = session.stop();
    if let Some(summary) = session.summary() {
        tracing::info!(path = %summary.path.display(), entries = summary.entries.len(), "experiment stopped");
        summaries.push(summary);
    }
    res.context("failed to close experiment file")
}

/// Feed lines from `input` into the session until `/quit` or end of input.
///
/// Every experiment that stopped is pushed to `summaries`, even when a later
/// step fails and the error is returned.
fn drive_text<R: BufRead>(
    input: R,
    session: &mut ExperimentSession,
    initial_title: Option<String>,
    echo_to_stdout: bool,
    summaries: &mut Vec<ExperimentSummary>,
    out: &mpsc::UnboundedSender<OutputLine>,
) -> Result<()> {
    let mut lines = input.lines();

    let title = match initial_title {
        Some(t) => t,
        None => match prompt_title(&mut lines, out)? {
            Some(t) => t,
            None => return Ok(()),
        },
    };
    start_experiment(session, &title, summaries, out)?;

    for line in lines {
        let line = line.context("read stdin")?;
        match parse_command(&line) {
            TextCommand::Note(note) => {
                if note.trim().is_empty() {
                    continue;
                }
                match session.add_entry(note) {
                    Ok(Some(entry)) => {
                        let _ = out.send(if echo_to_stdout {
                            OutputLine::Stdout(entry.line())
                        } else {
                            OutputLine::Stderr(entry.line())
                        });
                    }
                    Ok(None) => {
                        let _ = out.send(OutputLine::Stderr(
                            "No experiment running; use /start <title>".into(),
                        ));
                    }
                    Err(e) => {
                        tracing::error!(error = %e, "failed to append entry");
                        let _ = out.send(OutputLine::Stderr(format!(
                            "Error: {e} (entry not recorded)"
                        )));
                    }
                }
            }
            TextCommand::Start("") => {
                let _ = out.send(OutputLine::Stderr("Usage: /start <title>".into()));
            }
            TextCommand::Start(title) => {
                start_experiment(session, title, summaries, out)?;
            }
            TextCommand::Stop => {
                if session.is_running() {
                    let res = finish_experiment(session, summaries);
                    let _ = out.send(OutputLine::Stderr(format!(
                        "Stopped at {} with {} entries",
                        session.elapsed(),
                        session.log().len()
                    )));
                    res?;
                }
            }
            TextCommand::Elapsed => {
                let _ = out.send(OutputLine::Stderr(session.elapsed()));
            }
            TextCommand::Quit => break,
        }
    }

    finish_experiment(session, summaries)
}

async fn run_text(cfg: AppConfig, clock: Arc<dyn Clock>, json: bool) -> Result<()> {
    let (out_tx, out_handle) = spawn_output_writer();

    let session_tx = out_tx.clone();
    let (summaries, result) = tokio::task::spawn_blocking(move || {
        let mut session = ExperimentSession::new(
            SessionConfig {
                storage_dir: cfg.storage_dir.clone(),
            },
            clock,
        );
        let stdin = std::io::stdin();
        let mut summaries = Vec::new();
        let result = drive_text(
            stdin.lock(),
            &mut session,
            cfg.title,
            !json,
            &mut summaries,
            &session_tx,
        );
        (summaries, result)
    })
    .await
    .context("text session task failed")?;

    if json {
        let out = serde_json::to_string_pretty(&summaries)?;
        let _ = out_tx.send(OutputLine::Stdout(out));
    } else {
        for summary in &summaries {
            for line in crate::text_summary::build_text_summary(summary).lines {
                let _ = out_tx.send(OutputLine::Stderr(line));
            }
        }
    }

    drop(out_tx);
    let _ = out_handle.await;
    result
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::engine::SystemClock;
    use std::io::{BufReader, Cursor, Read};
    use tempfile::TempDir;

    fn session(dir: &std::path::Path) -> ExperimentSession {
        ExperimentSession::new(
            SessionConfig {
                storage_dir: dir.to_path_buf(),
            },
            Arc::new(SystemClock::local()),
        )
    }

    fn drain(rx: &mut mpsc::UnboundedReceiver<OutputLine>) -> Vec<OutputLine> {
        let mut v = Vec::new();
        while let Ok(l) = rx.try_recv() {
            v.push(l);
        }
        v
    }

    #[test]
    fn parses_commands() {
        assert_eq!(parse_command("/stop"), TextCommand::Stop);
        assert_eq!(parse_command("  /quit "), TextCommand::Quit);
        assert_eq!(parse_command("/elapsed"), TextCommand::Elapsed);
        assert_eq!(parse_command("/start  Run 2 "), TextCommand::Start("Run 2"));
        assert_eq!(parse_command("/start"), TextCommand::Start(""));
        assert_eq!(parse_command("/stopped"), TextCommand::Note("/stopped"));
        assert_eq!(parse_command("added buffer"), TextCommand::Note("added buffer"));
    }

    #[test]
    fn prompts_until_title_then_records_notes() {
        let tmp = TempDir::new().unwrap();
        let mut s = session(tmp.path());
        let (tx, mut rx) = mpsc::unbounded_channel();

        let input = Cursor::new("\n   \nTitration\nadded NaOH\n\nendpoint reached\n");
        let mut summaries = Vec::new();
        drive_text(input, &mut s, None, true, &mut summaries, &tx).unwrap();

        assert_eq!(summaries.len(), 1);
        assert_eq!(summaries[0].title, "Titration");
        let notes: Vec<_> = summaries[0].entries.iter().map(|e| e.note.as_str()).collect();
        assert_eq!(notes, vec!["added NaOH", "endpoint reached"]);
        assert!(!s.is_running());

        let prompts = drain(&mut rx)
            .into_iter()
            .filter(|l| matches!(l, OutputLine::Stderr(m) if m == "Experiment title:"))
            .count();
        assert_eq!(prompts, 3);

        let content = std::fs::read_to_string(&summaries[0].path).unwrap();
        assert!(content.contains("Title: Titration\n\n"));
        assert!(content.ends_with(": endpoint reached"));
    }

    #[test]
    fn start_and_stop_commands_split_experiments() {
        let tmp = TempDir::new().unwrap();
        let mut s = session(tmp.path());
        let (tx, _rx) = mpsc::unbounded_channel();

        let input = Cursor::new("a\n/start Second\nb\n/stop\nignored\n/quit\nnever read\n");
        let mut summaries = Vec::new();
        drive_text(input, &mut s, Some("First".into()), false, &mut summaries, &tx).unwrap();

        assert_eq!(summaries.len(), 2);
        assert_eq!(summaries[0].title, "First");
        assert_eq!(summaries[0].entries.len(), 1);
        assert_eq!(summaries[1].title, "Second");
        assert_eq!(summaries[1].entries.len(), 1);
        assert_eq!(summaries[1].entries[0].note, "b");
    }

    #[test]
    fn end_of_input_before_title_records_nothing() {
        let tmp = TempDir::new().unwrap();
        let dir = tmp.path().join("store");
        let mut s = session(&dir);
        let (tx, _rx) = mpsc::unbounded_channel();

        let mut summaries = Vec::new();
        drive_text(Cursor::new(""), &mut s, None, true, &mut summaries, &tx).unwrap();
        assert!(summaries.is_empty());
        assert!(!dir.exists());
    }

    /// Reader that runs `hook` once when the bytes before it are used up.
    struct RunOnEof<F: FnOnce()> {
        hook: Option<F>,
    }

    impl<F: FnOnce()> Read for RunOnEof<F> {
        fn read(&mut self, _buf: &mut [u8]) -> std::io::Result<usize> {
            if let Some(hook) = self.hook.take() {
                hook();
            }
            Ok(0)
        }
    }

    #[test]
    fn failed_restart_keeps_finished_summaries() {
        let tmp = TempDir::new().unwrap();
        let dir = tmp.path().join("store");
        let mut s = session(&dir);
        let (tx, _rx) = mpsc::unbounded_channel();

        // After the first note the storage dir is replaced by a plain file.
        let blocked = dir.clone();
        let hook = move || {
            std::fs::remove_dir_all(&blocked).unwrap();
            std::fs::write(&blocked, "not a directory").unwrap();
        };
        let input = BufReader::new(
            Cursor::new("first note\n")
                .chain(RunOnEof { hook: Some(hook) })
                .chain(Cursor::new("/start Second\nnever recorded\n")),
        );

        let mut summaries = Vec::new();
        let err = drive_text(input, &mut s, Some("First".into()), true, &mut summaries, &tx)
            .unwrap_err();

        assert!(format!("{err:#}").contains("storage directory unavailable"), "{err:#}");
        assert_eq!(summaries.len(), 1);
        assert_eq!(summaries[0].title, "First");
        assert_eq!(summaries[0].entries.len(), 1);
        assert_eq!(summaries[0].entries[0].note, "first note");
        assert!(!s.is_running());
    }

    #[test]
    fn config_rejects_zero_tick_and_blank_title() {
        let args = Cli::parse_from(["labbook", "--tick", "0s"]);
        assert!(build_config(&args).is_err());

        let args = Cli::parse_from(["labbook", "--title", "   ", "--dir", "/tmp/lb"]);
        let cfg = build_config(&args).unwrap();
        assert_eq!(cfg.title, None);
        assert_eq!(cfg.storage_dir, PathBuf::from("/tmp/lb"));
        assert_eq!(cfg.tick_interval, Duration::from_secs(1));
    }
}
