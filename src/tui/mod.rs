mod export;
mod help;
mod state;

use crate::engine::Clock;
use crate::model::{AppConfig, SessionEvent};
use crate::orchestrator::{self, UiCommand};
use anyhow::{Context, Result};
use crossterm::{
    event::{self, Event, KeyCode, KeyEvent, KeyEventKind, KeyModifiers},
    execute,
    terminal::{disable_raw_mode, enable_raw_mode, EnterAlternateScreen, LeaveAlternateScreen},
};
use ratatui::{
    backend::CrosstermBackend,
    layout::{Alignment, Constraint, Direction, Layout, Rect},
    style::{Color, Modifier, Style},
    text::{Line, Span},
    widgets::{Block, Borders, Paragraph, Tabs, Wrap},
    Terminal,
};
use state::{InputMode, UiState, TAB_COUNT, TAB_EXPERIMENTS, TAB_HELP, TAB_NOTEBOOK};
use std::sync::Arc;
use std::{io, time::Duration, time::Instant};
use tokio::sync::mpsc;
use tokio::sync::mpsc::{UnboundedReceiver, UnboundedSender};

// Rows the experiments list can show before scrolling; refined on every draw.
const DEFAULT_VISIBLE_EXPERIMENTS: usize = 20;

pub async fn run(cfg: AppConfig, clock: Arc<dyn Clock>) -> Result<()> {
    let (event_tx, event_rx) = mpsc::unbounded_channel::<SessionEvent>();
    let (cmd_tx, cmd_rx) = mpsc::unbounded_channel::<UiCommand>();

    // TUI runs in a dedicated thread to keep all blocking I/O out of the Tokio runtime.
    let ui_cfg = cfg.clone();
    let ui_handle = std::thread::spawn(move || run_threaded(ui_cfg, event_rx, cmd_tx));

    let res = orchestrator::run_controller(&cfg, clock, event_tx, cmd_rx).await;

    let join_res = tokio::task::spawn_blocking(move || ui_handle.join()).await;
    if let Ok(joined) = join_res {
        match joined {
            Ok(Ok(())) => {}
            Ok(Err(e)) => return Err(e),
            Err(_) => return Err(anyhow::anyhow!("TUI thread panicked")),
        }
    }

    res
}

/// Run the TUI loop on a dedicated thread.
pub fn run_threaded(
    cfg: AppConfig,
    mut event_rx: UnboundedReceiver<SessionEvent>,
    cmd_tx: UnboundedSender<UiCommand>,
) -> Result<()> {
    enable_raw_mode().context("enable raw mode")?;
    let mut stdout = io::stdout();
    execute!(stdout, EnterAlternateScreen).ok();

    let backend = CrosstermBackend::new(stdout);
    let mut terminal = Terminal::new(backend).context("create terminal")?;
    terminal.clear().ok();

    // UiState is owned by the UI thread only; no cross-thread mutation.
    let mut state = UiState {
        storage_dir: cfg.storage_dir.clone(),
        ..Default::default()
    };
    state.set_experiments(crate::storage::list_experiments(&cfg.storage_dir).unwrap_or_default());
    if cfg.title.is_none() {
        state.begin_title_prompt();
    }

    let frame_rate = Duration::from_millis(100);
    let mut last_frame = Instant::now();
    let mut force_redraw = true;
    let mut visible_experiments = DEFAULT_VISIBLE_EXPERIMENTS;

    let res = loop {
        // Drain events without blocking to keep UI responsive.
        while let Ok(ev) = event_rx.try_recv() {
            apply_event(&mut state, ev);
        }

        if force_redraw || last_frame.elapsed() >= frame_rate {
            terminal
                .draw(|f| {
                    visible_experiments = experiments_capacity(f.area());
                    draw(f.area(), f, &state)
                })
                .ok();
            last_frame = Instant::now();
            force_redraw = false;
        }

        // Poll input with a short timeout to avoid blocking the render loop.
        if event::poll(Duration::from_millis(10)).unwrap_or(false) {
            if let Ok(Event::Key(k)) = event::read() {
                if k.kind != KeyEventKind::Press {
                    continue;
                }
                if handle_key(&mut state, k, &cmd_tx, visible_experiments) {
                    break Ok(());
                }
                // Redraw right away so typing feels immediate.
                force_redraw = true;
            }
        }
    };

    disable_raw_mode().ok();
    let mut stdout = io::stdout();
    execute!(stdout, LeaveAlternateScreen).ok();
    res
}

/// Apply a key press to UI state, sending commands to the controller.
/// Returns true when the UI should exit.
fn handle_key(
    state: &mut UiState,
    k: KeyEvent,
    cmd_tx: &UnboundedSender<UiCommand>,
    visible_experiments: usize,
) -> bool {
    let ctrl = k.modifiers.contains(KeyModifiers::CONTROL);
    match (ctrl, k.code) {
        (true, KeyCode::Char('c')) | (true, KeyCode::Char('q')) => {
            let _ = cmd_tx.send(UiCommand::Quit);
            return true;
        }
        (true, KeyCode::Char('n')) => {
            state.begin_title_prompt();
            return false;
        }
        (true, KeyCode::Char('t')) => {
            if state.is_running() {
                let _ = cmd_tx.send(UiCommand::Stop);
            } else {
                state.info = "No experiment running.".into();
            }
            return false;
        }
        (true, KeyCode::Char('o')) => {
            export::open_storage_dir(state);
            return false;
        }
        (true, KeyCode::Char('y')) => {
            export::copy_current_path(state);
            return false;
        }
        (_, KeyCode::Tab) => {
            state.tab = (state.tab + 1) % TAB_COUNT;
            if state.tab == TAB_EXPERIMENTS {
                state.detail_view = false;
            }
            return false;
        }
        (_, KeyCode::F(1)) => {
            state.tab = TAB_HELP;
            return false;
        }
        _ => {}
    }

    match state.tab {
        TAB_NOTEBOOK => handle_notebook_key(state, k, cmd_tx),
        TAB_EXPERIMENTS => handle_experiments_key(state, k, visible_experiments),
        _ => {}
    }
    false
}

fn handle_notebook_key(state: &mut UiState, k: KeyEvent, cmd_tx: &UnboundedSender<UiCommand>) {
    match k.code {
        KeyCode::Esc => {
            if state.input_mode == InputMode::Title {
                state.cancel_title_prompt();
            }
        }
        KeyCode::Enter => match state.input_mode {
            InputMode::Title => {
                let title = state.input.trim();
                if title.is_empty() {
                    // Keep prompting until a title is given.
                    state.info = "The experiment needs a title".into();
                } else {
                    let _ = cmd_tx.send(UiCommand::Start(title.to_string()));
                    state.input_mode = InputMode::Note;
                    state.input.clear();
                }
            }
            InputMode::Note => {
                if !state.is_running() {
                    state.info = crate::model::InfoEvent::IgnoredWhileIdle.to_message();
                } else if !state.input.trim().is_empty() {
                    let _ = cmd_tx.send(UiCommand::AddEntry(std::mem::take(&mut state.input)));
                }
            }
        },
        KeyCode::Backspace => {
            state.input.pop();
        }
        KeyCode::Char(c)
            if !k
                .modifiers
                .intersects(KeyModifiers::CONTROL | KeyModifiers::ALT) =>
        {
            state.input.push(c);
        }
        _ => {}
    }
}

fn handle_experiments_key(state: &mut UiState, k: KeyEvent, visible: usize) {
    match k.code {
        KeyCode::Up | KeyCode::Char('k') => {
            if state.detail_view {
                state.detail_scroll = state.detail_scroll.saturating_sub(1);
            } else {
                state.select_prev();
            }
        }
        KeyCode::Down | KeyCode::Char('j') => {
            if state.detail_view {
                let max = state.detail_text.lines().count().saturating_sub(1);
                state.detail_scroll = (state.detail_scroll + 1).min(max);
            } else {
                state.select_next(visible);
            }
        }
        KeyCode::Enter => state.toggle_detail(),
        KeyCode::Esc => state.detail_view = false,
        KeyCode::Char('r') => state.refresh_experiments(),
        KeyCode::Char('o') => export::open_storage_dir(state),
        _ => {}
    }
}

fn apply_event(state: &mut UiState, ev: SessionEvent) {
    match ev {
        SessionEvent::Started {
            title,
            path,
            header,
        } => state.on_started(title, path, header),
        SessionEvent::EntryAdded(entry) => state.on_entry(&entry),
        SessionEvent::Tick { elapsed } => state.elapsed = elapsed,
        SessionEvent::Stopped { summary } => {
            state.on_stopped(&summary.elapsed);
            let processed = orchestrator::process_stop(&state.storage_dir, &summary);
            state.info = processed.message;
            state.set_experiments(processed.experiments);
        }
        SessionEvent::Info(info) => state.info = info.to_message(),
    }
}

fn experiments_capacity(area: Rect) -> usize {
    // Tabs (3) + borders (2) + header lines (2).
    (area.height as usize).saturating_sub(7).max(1)
}

fn draw(area: Rect, f: &mut ratatui::Frame, state: &UiState) {
    let chunks = Layout::default()
        .direction(Direction::Vertical)
        .constraints([Constraint::Length(3), Constraint::Min(0)].as_ref())
        .split(area);

    let tabs = Tabs::new(vec![
        Line::from("Notebook"),
        Line::from("Experiments"),
        Line::from("Help"),
    ])
    .select(state.tab)
    .block(Block::default().borders(Borders::ALL).title("labbook"))
    .highlight_style(Style::default().fg(Color::Yellow));
    f.render_widget(tabs, chunks[0]);

    match state.tab {
        TAB_NOTEBOOK => draw_notebook(chunks[1], f, state),
        TAB_EXPERIMENTS => draw_experiments(chunks[1], f, state),
        _ => help::draw_help(chunks[1], f),
    }
}

fn draw_notebook(area: Rect, f: &mut ratatui::Frame, state: &UiState) {
    let main = Layout::default()
        .direction(Direction::Vertical)
        .constraints(
            [
                Constraint::Length(6), // Timer + experiment info
                Constraint::Length(3), // Input line
                Constraint::Min(3),    // Transcript
                Constraint::Length(3), // Status row
            ]
            .as_ref(),
        )
        .split(area);

    let top = Layout::default()
        .direction(Direction::Horizontal)
        .constraints([Constraint::Percentage(35), Constraint::Percentage(65)].as_ref())
        .split(main[0]);

    let (badge, badge_color) = if state.is_running() {
        ("● RUNNING", Color::Green)
    } else {
        ("■ IDLE", Color::DarkGray)
    };
    let timer_color = if state.is_running() {
        Color::Yellow
    } else {
        Color::Gray
    };
    let timer = Paragraph::new(vec![
        Line::from(""),
        Line::from(Span::styled(
            state.elapsed.clone(),
            Style::default()
                .fg(timer_color)
                .add_modifier(Modifier::BOLD),
        )),
        Line::from(Span::styled(badge, Style::default().fg(badge_color))),
    ])
    .alignment(Alignment::Center)
    .block(Block::default().borders(Borders::ALL).title("Elapsed"));
    f.render_widget(timer, top[0]);

    let mut info_lines = Vec::new();
    state::push_wrapped_status_kv(
        &mut info_lines,
        "Title",
        state.title.as_deref().unwrap_or("-"),
        top[1].width,
    );
    if let Some(path) = state.current_path.as_ref() {
        state::push_wrapped_status_kv(
            &mut info_lines,
            "File",
            &path.to_string_lossy(),
            top[1].width,
        );
    }
    info_lines.push(Line::from(vec![
        Span::styled("Entries: ", Style::default().fg(Color::Gray)),
        Span::raw(state.entries.to_string()),
    ]));
    let info = Paragraph::new(info_lines)
        .block(Block::default().borders(Borders::ALL).title("Experiment"));
    f.render_widget(info, top[1]);

    let (input_title, input_style, input_text) = match state.input_mode {
        InputMode::Title => (
            "Experiment title (Enter to start, Esc to cancel)",
            Style::default().fg(Color::Yellow),
            state.input.as_str(),
        ),
        InputMode::Note if state.is_running() => (
            "Note (Enter to add)",
            Style::default(),
            state.input.as_str(),
        ),
        InputMode::Note => (
            "Note",
            Style::default().fg(Color::DarkGray),
            "Press Ctrl-N to start an experiment",
        ),
    };
    let input = Paragraph::new(input_text)
        .style(input_style)
        .block(Block::default().borders(Borders::ALL).title(input_title));
    f.render_widget(input, main[1]);
    let typing = state.input_mode == InputMode::Title || state.is_running();
    if typing {
        let x = main[1].x + 1 + (state.input.chars().count() as u16).min(main[1].width.saturating_sub(3));
        f.set_cursor_position((x, main[1].y + 1));
    }

    // Keep the newest lines in view.
    let inner_height = main[2].height.saturating_sub(2) as usize;
    let line_count = state.transcript.lines().count();
    let scroll = line_count.saturating_sub(inner_height) as u16;
    let transcript = Paragraph::new(state.transcript.as_str())
        .scroll((scroll, 0))
        .block(Block::default().borders(Borders::ALL).title("Notes"));
    f.render_widget(transcript, main[2]);

    let mut status_spans = vec![
        Span::styled("Ctrl-N", Style::default().fg(Color::Magenta)),
        Span::raw(" new  "),
    ];
    if state.is_running() {
        status_spans.push(Span::styled("Ctrl-T", Style::default().fg(Color::Magenta)));
        status_spans.push(Span::raw(" stop  "));
    }
    status_spans.extend([
        Span::styled("Ctrl-O", Style::default().fg(Color::Magenta)),
        Span::raw(" open dir  "),
        Span::styled("Ctrl-C", Style::default().fg(Color::Magenta)),
        Span::raw(" quit  "),
    ]);
    if !state.info.is_empty() {
        status_spans.push(Span::styled("| ", Style::default().fg(Color::Gray)));
        status_spans.push(Span::raw(state.info.clone()));
    }
    let status = Paragraph::new(Line::from(status_spans))
        .wrap(Wrap { trim: true })
        .block(Block::default().borders(Borders::ALL).title("Status"));
    f.render_widget(status, main[3]);
}

fn draw_experiments(area: Rect, f: &mut ratatui::Frame, state: &UiState) {
    if state.detail_view {
        let title = state
            .selected_experiment()
            .map(|e| e.path.display().to_string())
            .unwrap_or_else(|| "Experiment".into());
        let p = Paragraph::new(state.detail_text.as_str())
            .scroll((state.detail_scroll as u16, 0))
            .block(Block::default().borders(Borders::ALL).title(title));
        f.render_widget(p, area);
        return;
    }

    let mut lines: Vec<Line> = Vec::new();
    let max_items = experiments_capacity(area).max(1);
    let total_count = state.experiments.len();
    let current_pos = if total_count > 0 {
        state.experiments_selected + 1
    } else {
        0
    };

    lines.push(Line::from(vec![
        Span::raw(format!("Experiments ({current_pos}/{total_count}) - ")),
        Span::styled("↑/↓/j/k", Style::default().fg(Color::Magenta)),
        Span::raw(": navigate, "),
        Span::styled("Enter", Style::default().fg(Color::Magenta)),
        Span::raw(": view, "),
        Span::styled("r", Style::default().fg(Color::Magenta)),
        Span::raw(": refresh, "),
        Span::styled("o", Style::default().fg(Color::Magenta)),
        Span::raw(": open dir"),
    ]));
    lines.push(Line::from(vec![
        Span::styled("Directory: ", Style::default().fg(Color::Gray)),
        Span::raw(state.storage_dir.display().to_string()),
    ]));

    if state.experiments.is_empty() {
        lines.push(Line::from(""));
        lines.push(Line::from("No experiments yet. Press Ctrl-N to start one."));
    }

    // Keep the selected item visible even if the last key press saw a different height.
    let scroll_offset = {
        let mut offset = state
            .experiments_scroll_offset
            .min(total_count.saturating_sub(1));
        if state.experiments_selected < offset {
            offset = state.experiments_selected;
        } else if state.experiments_selected >= offset + max_items {
            offset = state.experiments_selected + 1 - max_items;
        }
        offset
    };

    for (idx, e) in state
        .experiments
        .iter()
        .enumerate()
        .skip(scroll_offset)
        .take(max_items)
    {
        let selected = idx == state.experiments_selected;
        let style = if selected {
            Style::default().fg(Color::Black).bg(Color::Yellow)
        } else {
            Style::default()
        };
        let is_current = state.current_path.as_deref() == Some(e.path.as_path());
        lines.push(Line::from(vec![
            Span::styled(if selected { "> " } else { "  " }, style),
            Span::styled(e.display_date(), style.fg(if selected { Color::Black } else { Color::Cyan })),
            Span::styled(format!("  {:>4} entries  ", e.entries), style),
            Span::styled(e.display_title().to_string(), style),
            Span::styled(
                if is_current && state.is_running() { "  (recording)" } else { "" },
                style.fg(Color::Green),
            ),
        ]));
    }

    let p = Paragraph::new(lines).block(
        Block::default()
            .borders(Borders::ALL)
            .title("Experiments"),
    );
    f.render_widget(p, area);
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::{Entry, ExperimentSummary, InfoEvent};

    fn key(code: KeyCode) -> KeyEvent {
        KeyEvent::new(code, KeyModifiers::NONE)
    }

    fn ctrl(c: char) -> KeyEvent {
        KeyEvent::new(KeyCode::Char(c), KeyModifiers::CONTROL)
    }

    fn type_str(state: &mut UiState, tx: &UnboundedSender<UiCommand>, s: &str) {
        for c in s.chars() {
            handle_key(state, key(KeyCode::Char(c)), tx, 10);
        }
    }

    #[test]
    fn title_prompt_requires_text_then_starts() {
        let (tx, mut rx) = mpsc::unbounded_channel();
        let mut state = UiState::default();
        state.begin_title_prompt();

        handle_key(&mut state, key(KeyCode::Enter), &tx, 10);
        assert!(rx.try_recv().is_err());
        assert_eq!(state.input_mode, InputMode::Title);

        type_str(&mut state, &tx, "  Trial 1 ");
        handle_key(&mut state, key(KeyCode::Enter), &tx, 10);
        match rx.try_recv().unwrap() {
            UiCommand::Start(t) => assert_eq!(t, "Trial 1"),
            other => panic!("unexpected command {other:?}"),
        }
        assert_eq!(state.input_mode, InputMode::Note);
        assert!(state.input.is_empty());
    }

    #[test]
    fn notes_only_sent_while_running() {
        let (tx, mut rx) = mpsc::unbounded_channel();
        let mut state = UiState::default();

        type_str(&mut state, &tx, "early");
        handle_key(&mut state, key(KeyCode::Enter), &tx, 10);
        assert!(rx.try_recv().is_err());

        apply_event(
            &mut state,
            SessionEvent::Started {
                title: "T".into(),
                path: "/tmp/t.txt".into(),
                header: "Date: 01/03/2024 09:00:00\nTitle: T\n".into(),
            },
        );
        state.input.clear();
        type_str(&mut state, &tx, "sample placed");
        handle_key(&mut state, key(KeyCode::Enter), &tx, 10);
        match rx.try_recv().unwrap() {
            UiCommand::AddEntry(n) => assert_eq!(n, "sample placed"),
            other => panic!("unexpected command {other:?}"),
        }
        assert!(state.input.is_empty(), "input clears after submission");

        handle_key(&mut state, ctrl('t'), &tx, 10);
        assert!(matches!(rx.try_recv().unwrap(), UiCommand::Stop));
    }

    #[test]
    fn ctrl_c_quits() {
        let (tx, mut rx) = mpsc::unbounded_channel();
        let mut state = UiState::default();
        assert!(handle_key(&mut state, ctrl('c'), &tx, 10));
        assert!(matches!(rx.try_recv().unwrap(), UiCommand::Quit));
    }

    #[test]
    fn events_update_view() {
        let tmp = tempfile::TempDir::new().unwrap();
        let mut state = UiState {
            storage_dir: tmp.path().to_path_buf(),
            ..Default::default()
        };
        apply_event(
            &mut state,
            SessionEvent::Started {
                title: "T".into(),
                path: tmp.path().join("x.txt"),
                header: "Date: 01/03/2024 09:00:00\nTitle: T\n".into(),
            },
        );
        apply_event(&mut state, SessionEvent::Tick { elapsed: "00:07".into() });
        assert_eq!(state.elapsed, "00:07");
        apply_event(
            &mut state,
            SessionEvent::EntryAdded(Entry {
                label: "00:07".into(),
                note: "go".into(),
            }),
        );
        assert!(state.transcript.ends_with("\n\n00:07: go"));

        apply_event(
            &mut state,
            SessionEvent::Stopped {
                summary: Box::new(ExperimentSummary {
                    title: "T".into(),
                    started_at: "2024-03-01T09:00:00Z".into(),
                    path: tmp.path().join("x.txt"),
                    elapsed: "00:09".into(),
                    entries: Vec::new(),
                }),
            },
        );
        assert!(!state.is_running());
        assert!(state.info.starts_with("Stopped \"T\""));

        apply_event(&mut state, SessionEvent::Info(InfoEvent::Failed("disk full".into())));
        assert_eq!(state.info, "Error: disk full");
    }

    #[test]
    fn tab_cycles_and_f1_opens_help() {
        let (tx, _rx) = mpsc::unbounded_channel();
        let mut state = UiState::default();
        handle_key(&mut state, key(KeyCode::Tab), &tx, 10);
        assert_eq!(state.tab, TAB_EXPERIMENTS);
        handle_key(&mut state, key(KeyCode::Tab), &tx, 10);
        handle_key(&mut state, key(KeyCode::Tab), &tx, 10);
        assert_eq!(state.tab, TAB_NOTEBOOK);
        handle_key(&mut state, key(KeyCode::F(1)), &tx, 10);
        assert_eq!(state.tab, TAB_HELP);
    }
}
