use ratatui::{
    layout::Rect,
    style::Color,
    style::Style,
    text::{Line, Span},
    widgets::{Block, Borders, Paragraph},
    Frame,
};

fn key_line(key: &'static str, pad: usize, what: &'static str) -> Line<'static> {
    Line::from(vec![
        Span::raw("  "),
        Span::styled(key, Style::default().fg(Color::Magenta)),
        Span::raw(" ".repeat(pad)),
        Span::raw(what),
    ])
}

pub fn draw_help(area: Rect, f: &mut Frame) {
    let p = Paragraph::new(vec![
        Line::from("Keybinds:"),
        key_line("Ctrl-N", 6, "New experiment (asks for a title)"),
        key_line("Enter", 7, "Start with the typed title / add the typed note"),
        key_line("Esc", 9, "Cancel the title prompt"),
        key_line("Ctrl-T", 6, "Stop the running experiment"),
        key_line("Ctrl-O", 6, "Open the storage directory"),
        key_line("Ctrl-Y", 6, "Copy the current file path to clipboard"),
        key_line("tab", 9, "Switch tabs"),
        key_line("F1", 10, "Show this help"),
        key_line("Ctrl-C", 6, "Quit (stops the running experiment)"),
        Line::from(""),
        Line::from("Experiments tab:"),
        key_line("↑/↓ j/k", 5, "Navigate / scroll"),
        key_line("Enter", 7, "Show or hide the selected file"),
        key_line("r", 11, "Refresh"),
        key_line("o", 11, "Open the storage directory"),
        Line::from(""),
        Line::from("Notes are stamped with the time since the experiment started (mm:ss)"),
        Line::from("and appended to one text file per experiment."),
    ])
    .block(Block::default().borders(Borders::ALL).title("Help"));
    f.render_widget(p, area);
}
