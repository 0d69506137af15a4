//! Session lifecycle controller.
//!
//! Sole owner of the `ExperimentSession` while the TUI runs. UI commands come in,
//! session events go out, and a display tick refreshes the elapsed label.

use crate::engine::{Clock, ExperimentSession, SessionConfig};
use crate::model::{AppConfig, InfoEvent, SessionEvent};
use anyhow::Result;
use std::sync::Arc;
use tokio::sync::mpsc::{UnboundedReceiver, UnboundedSender};
use tokio::time::MissedTickBehavior;

/// Commands emitted by UI layers to drive the session.
#[derive(Debug, Clone)]
pub(crate) enum UiCommand {
    Start(String),
    AddEntry(String),
    Stop,
    Quit,
}

fn start_session(
    session: &mut ExperimentSession,
    title: &str,
    event_tx: &UnboundedSender<SessionEvent>,
) {
    let was_running = session.is_running();
    let previous = session.summary();
    let result = session.start(title);

    // The previous experiment is closed whether or not the new one came up.
    if was_running {
        if let Some(summary) = previous {
            tracing::info!(path = %summary.path.display(), "experiment stopped by restart");
            let _ = event_tx.send(SessionEvent::Stopped {
                summary: Box::new(summary),
            });
        }
    }

    match result {
        Ok(path) => {
            tracing::info!(path = %path.display(), title, "experiment started");
            let _ = event_tx.send(SessionEvent::Started {
                title: session.title().to_string(),
                path,
                header: session.header().to_string(),
            });
        }
        Err(e) => {
            tracing::error!(error = %e, "failed to start experiment");
            let _ = event_tx.send(SessionEvent::Info(InfoEvent::Failed(e.to_string())));
        }
    }
}

fn stop_session(session: &mut ExperimentSession, event_tx: &UnboundedSender<SessionEvent>) {
    if !session.is_running() {
        return;
    }
    if let Err(e) = session.stop() {
        tracing::error!(error = %e, "failed to close experiment file");
        let _ = event_tx.send(SessionEvent::Info(InfoEvent::Failed(e.to_string())));
    }
    if let Some(summary) = session.summary() {
        tracing::info!(
            path = %summary.path.display(),
            entries = summary.entries.len(),
            "experiment stopped"
        );
        let _ = event_tx.send(SessionEvent::Stopped {
            summary: Box::new(summary),
        });
    }
}

/// Drive the session from UI commands and emit events back to presentation layers.
pub(crate) async fn run_controller(
    cfg: &AppConfig,
    clock: Arc<dyn Clock>,
    event_tx: UnboundedSender<SessionEvent>,
    mut cmd_rx: UnboundedReceiver<UiCommand>,
) -> Result<()> {
    let mut session = ExperimentSession::new(
        SessionConfig {
            storage_dir: cfg.storage_dir.clone(),
        },
        clock,
    );

    if let Some(title) = cfg.title.as_deref() {
        start_session(&mut session, title, &event_tx);
    }

    // Cosmetic only: skipped ticks just mean a stale label for a moment.
    let mut ticker = tokio::time::interval(cfg.tick_interval);
    ticker.set_missed_tick_behavior(MissedTickBehavior::Skip);

    loop {
        tokio::select! {
            cmd = cmd_rx.recv() => {
                match cmd {
                    Some(UiCommand::Start(title)) => {
                        start_session(&mut session, &title, &event_tx);
                    }
                    Some(UiCommand::AddEntry(note)) => match session.add_entry(&note) {
                        Ok(Some(entry)) => {
                            tracing::debug!(label = %entry.label, "entry added");
                            let _ = event_tx.send(SessionEvent::EntryAdded(entry));
                        }
                        Ok(None) => {
                            let _ = event_tx.send(SessionEvent::Info(InfoEvent::IgnoredWhileIdle));
                        }
                        Err(e) => {
                            tracing::error!(error = %e, "failed to append entry");
                            let _ = event_tx.send(SessionEvent::Info(InfoEvent::Failed(format!(
                                "{e} (entry not recorded)"
                            ))));
                        }
                    },
                    Some(UiCommand::Stop) => stop_session(&mut session, &event_tx),
                    // Quit and a closed channel both finalize the file before leaving.
                    Some(UiCommand::Quit) | None => {
                        stop_session(&mut session, &event_tx);
                        break Ok(());
                    }
                }
            }
            _ = ticker.tick() => {
                if session.is_ticking() {
                    let _ = event_tx.send(SessionEvent::Tick { elapsed: session.elapsed() });
                }
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::engine::SystemClock;
    use std::time::Duration;
    use tempfile::TempDir;
    use tokio::sync::mpsc;

    fn cfg(dir: &std::path::Path, title: Option<&str>) -> AppConfig {
        AppConfig {
            storage_dir: dir.to_path_buf(),
            title: title.map(str::to_string),
            tick_interval: Duration::from_millis(20),
        }
    }

    #[tokio::test]
    async fn start_add_stop_round() {
        let tmp = TempDir::new().unwrap();
        let cfg = cfg(tmp.path(), None);
        let (event_tx, mut event_rx) = mpsc::unbounded_channel();
        let (cmd_tx, cmd_rx) = mpsc::unbounded_channel();

        cmd_tx.send(UiCommand::AddEntry("too early".into())).unwrap();
        cmd_tx.send(UiCommand::Start("Controller".into())).unwrap();
        cmd_tx.send(UiCommand::AddEntry(" first ".into())).unwrap();
        cmd_tx.send(UiCommand::Quit).unwrap();

        run_controller(&cfg, Arc::new(SystemClock::local()), event_tx, cmd_rx)
            .await
            .unwrap();

        let mut events = Vec::new();
        while let Ok(ev) = event_rx.try_recv() {
            if !matches!(ev, SessionEvent::Tick { .. }) {
                events.push(ev);
            }
        }
        assert!(matches!(
            events[0],
            SessionEvent::Info(InfoEvent::IgnoredWhileIdle)
        ));
        let path = match &events[1] {
            SessionEvent::Started { title, path, .. } => {
                assert_eq!(title, "Controller");
                path.clone()
            }
            other => panic!("unexpected event {other:?}"),
        };
        match &events[2] {
            SessionEvent::EntryAdded(e) => assert_eq!(e.note, "first"),
            other => panic!("unexpected event {other:?}"),
        }
        match &events[3] {
            SessionEvent::Stopped { summary } => assert_eq!(summary.entries.len(), 1),
            other => panic!("unexpected event {other:?}"),
        }

        let content = std::fs::read_to_string(path).unwrap();
        assert!(content.starts_with("Date: "));
        assert!(content.contains("\nTitle: Controller\n\n"));
        assert!(content.ends_with(": first"));
    }

    #[tokio::test]
    async fn title_on_launch_starts_immediately_and_restart_stops_previous() {
        let tmp = TempDir::new().unwrap();
        let cfg = cfg(tmp.path(), Some("Launch"));
        let (event_tx, mut event_rx) = mpsc::unbounded_channel();
        let (cmd_tx, cmd_rx) = mpsc::unbounded_channel();

        cmd_tx.send(UiCommand::Start("Again".into())).unwrap();
        drop(cmd_tx);

        run_controller(&cfg, Arc::new(SystemClock::local()), event_tx, cmd_rx)
            .await
            .unwrap();

        let mut kinds = Vec::new();
        while let Ok(ev) = event_rx.try_recv() {
            match ev {
                SessionEvent::Started { title, .. } => kinds.push(format!("start:{title}")),
                SessionEvent::Stopped { summary } => kinds.push(format!("stop:{}", summary.title)),
                _ => {}
            }
        }
        assert_eq!(
            kinds,
            vec!["start:Launch", "stop:Launch", "start:Again", "stop:Again"]
        );
        assert_eq!(crate::storage::list_experiments(tmp.path()).unwrap().len(), 2);
    }
}
