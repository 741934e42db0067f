use super::{Dashboard, STATUS_BAR_ROWS};
use crate::errors::LintFixError;
use crate::hotkeys::{controls_legend, log_footer_hint, Focus};
use crate::lint::display_command;
use crate::types::{Outcome, Phase, TableItem};
use ratatui::backend::TestBackend;
use ratatui::layout::{Constraint, Direction, Layout, Rect};
use ratatui::style::{Color, Modifier, Style};
use ratatui::text::{Line, Span};
use ratatui::widgets::{Block, Borders, Cell, Paragraph, Row, Table, TableState};
use ratatui::{Frame, Terminal};

/// Styles used by [`draw`]. Passed by value into rendering.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Theme {
    pub header: Style,
    pub directory: Style,
    pub selected: Style,
    pub border: Style,
    pub focused_border: Style,
    pub fixed: Style,
    pub failed: Style,
    pub running: Style,
    pub gutter: Style,
    pub status_bar: Style,
}

impl Default for Theme {
    fn default() -> Self {
        Self {
            header: Style::default()
                .fg(Color::Cyan)
                .add_modifier(Modifier::BOLD),
            directory: Style::default()
                .fg(Color::Blue)
                .add_modifier(Modifier::BOLD),
            selected: Style::default()
                .fg(Color::Yellow)
                .add_modifier(Modifier::BOLD),
            border: Style::default().fg(Color::DarkGray),
            focused_border: Style::default().fg(Color::Cyan),
            fixed: Style::default().fg(Color::Green),
            failed: Style::default().fg(Color::Red),
            running: Style::default().fg(Color::Yellow),
            gutter: Style::default().fg(Color::DarkGray),
            status_bar: Style::default(),
        }
    }
}

impl Theme {
    pub fn monochrome() -> Self {
        Self {
            header: Style::default().add_modifier(Modifier::BOLD),
            directory: Style::default().add_modifier(Modifier::BOLD),
            selected: Style::default().add_modifier(Modifier::REVERSED),
            border: Style::default(),
            focused_border: Style::default().add_modifier(Modifier::BOLD),
            fixed: Style::default(),
            failed: Style::default().add_modifier(Modifier::UNDERLINED),
            running: Style::default().add_modifier(Modifier::ITALIC),
            gutter: Style::default().add_modifier(Modifier::DIM),
            status_bar: Style::default(),
        }
    }

    fn status(&self, phase: Option<Phase>) -> Style {
        match phase {
            Some(Phase::Done(Outcome::Fixed)) => self.fixed,
            Some(Phase::Done(Outcome::Failed)) => self.failed,
            Some(Phase::Running) => self.running,
            Some(Phase::Pending) | None => Style::default(),
        }
    }

    fn pane_border(&self, focused: bool) -> Style {
        if focused {
            self.focused_border
        } else {
            self.border
        }
    }
}

pub fn draw(frame: &mut Frame, dashboard: &Dashboard, theme: &Theme) {
    let outer = Layout::default()
        .direction(Direction::Vertical)
        .constraints([Constraint::Min(0), Constraint::Length(STATUS_BAR_ROWS)])
        .split(frame.area());
    let layout = dashboard.layout();
    let panes = Layout::default()
        .direction(Direction::Horizontal)
        .constraints([
            Constraint::Length(layout.table_width()),
            Constraint::Length(layout.log_width()),
        ])
        .split(outer[0]);

    draw_table(frame, panes[0], dashboard, theme);
    draw_log(frame, panes[1], dashboard, theme);
    draw_status_bar(frame, outer[1], dashboard, theme);
}

fn draw_table(frame: &mut Frame, area: Rect, dashboard: &Dashboard, theme: &Theme) {
    let rows = dashboard
        .items()
        .iter()
        .zip(dashboard.rows())
        .map(|(item, row)| {
            let label_style = if item.is_directory() {
                theme.directory
            } else {
                Style::default()
            };
            Row::new(vec![
                Cell::from(row.label.clone()).style(label_style),
                Cell::from(row.status.clone()).style(theme.status(row.phase)),
                Cell::from(row.attempts.clone()),
            ])
        })
        .collect::<Vec<_>>();

    let widths = [
        Constraint::Percentage(55),
        Constraint::Percentage(30),
        Constraint::Percentage(15),
    ];
    let header = Row::new(vec!["Path", "Status", "Attempts"]).style(theme.header);
    let table = Table::new(rows, widths)
        .header(header)
        .block(
            Block::default()
                .borders(Borders::ALL)
                .border_style(theme.pane_border(dashboard.focus() == Focus::Table))
                .title("Files"),
        )
        .row_highlight_style(theme.selected);

    let mut state = TableState::default().with_selected(Some(dashboard.cursor()));
    frame.render_stateful_widget(table, area, &mut state);
}

fn draw_log(frame: &mut Frame, area: Rect, dashboard: &Dashboard, theme: &Theme) {
    let focused = dashboard.focus() == Focus::Log;
    let block = Block::default()
        .borders(Borders::ALL)
        .border_style(theme.pane_border(focused))
        .title("Log");
    let inner = block.inner(area);
    frame.render_widget(block, area);

    let parts = Layout::default()
        .direction(Direction::Vertical)
        .constraints([
            Constraint::Length(1),
            Constraint::Min(0),
            Constraint::Length(1),
        ])
        .split(inner);

    let title = match dashboard.selected() {
        Some(TableItem::File(record)) => {
            display_command(dashboard.lint_template(), &record.file_name())
        }
        _ => "No file selected".to_string(),
    };
    frame.render_widget(Paragraph::new(title).style(theme.header), parts[0]);

    let lines = dashboard
        .log()
        .visible()
        .iter()
        .map(|line| match line.split_once('│') {
            Some((gutter, text)) => Line::from(vec![
                Span::styled(format!("{gutter}│"), theme.gutter),
                Span::raw(text.to_string()),
            ]),
            None => Line::from(line.clone()),
        })
        .collect::<Vec<_>>();
    frame.render_widget(Paragraph::new(lines), parts[1]);

    let mut footer = format!("{:>3}%", dashboard.log().scroll_percent());
    if focused {
        footer.push_str("  ");
        footer.push_str(&log_footer_hint());
    }
    frame.render_widget(Paragraph::new(footer).style(theme.gutter), parts[2]);
}

fn draw_status_bar(frame: &mut Frame, area: Rect, dashboard: &Dashboard, theme: &Theme) {
    let counts = dashboard.counts();
    let mut text = format!(
        "{} items | fixed={} failed={} running={} pending={}",
        dashboard.items().len(),
        counts.fixed,
        counts.failed,
        counts.running,
        counts.pending
    );
    if dashboard.is_closed() {
        text.push_str(" | stream closed");
    }
    text.push_str(" | ");
    text.push_str(&controls_legend(dashboard.focus()));

    frame.render_widget(
        Paragraph::new(text)
            .style(theme.status_bar)
            .block(Block::default().borders(Borders::ALL)),
        area,
    );
}

/// Renders one frame into plain text, one line per terminal row.
pub fn render_to_string(
    dashboard: &Dashboard,
    theme: &Theme,
    width: u16,
    height: u16,
) -> Result<String, LintFixError> {
    let mut terminal =
        Terminal::new(TestBackend::new(width, height)).map_err(|e| LintFixError::Terminal(e.to_string()))?;
    terminal
        .draw(|frame| draw(frame, dashboard, theme))
        .map_err(|e| LintFixError::Terminal(e.to_string()))?;

    let buffer = terminal.backend().buffer();
    let mut out = String::new();
    for y in 0..height {
        for x in 0..width {
            out.push_str(buffer[(x, y)].symbol());
        }
        out.push('\n');
    }
    Ok(out)
}

#[cfg(test)]
mod tests {
    use super::{render_to_string, Theme};
    use crate::catalog::group_by_directory;
    use crate::protocol::ProgressEvent;
    use crate::tui::Dashboard;
    use crate::types::{FileRecord, Outcome};
    use crossterm::event::{KeyCode, KeyEvent, KeyModifiers};
    use std::path::Path;
    use std::sync::Arc;

    fn dashboard() -> Dashboard {
        let records = vec![
            Arc::new(FileRecord::new("a/x.go")),
            Arc::new(FileRecord::new("b/y.go")),
        ];
        Dashboard::new(group_by_directory(&records), "go vet {{filepath}}", 3, 120, 20)
    }

    #[test]
    fn frame_shows_table_columns_and_placeholder_log() {
        let frame = render_to_string(&dashboard(), &Theme::default(), 120, 20).expect("render");
        assert!(frame.contains("Path"));
        assert!(frame.contains("Status"));
        assert!(frame.contains("Attempts"));
        assert!(frame.contains("a/"));
        assert!(frame.contains("x.go"));
        assert!(frame.contains("0/3"));
        assert!(frame.contains("No file selected"));
        assert!(frame.contains("4 items | fixed=0 failed=0 running=0 pending=2"));
    }

    #[test]
    fn selected_file_shows_command_and_numbered_log() {
        let mut dash = dashboard();
        dash.handle_key(KeyEvent::new(KeyCode::Down, KeyModifiers::NONE));
        dash.apply_event(
            &ProgressEvent::completed(Path::new("a/x.go"), Outcome::Fixed).with_log("Lint passed"),
        );
        let frame = render_to_string(&dash, &Theme::monochrome(), 120, 20).expect("render");
        assert!(frame.contains("go vet x.go"));
        assert!(frame.contains("   1 │ Lint passed"));
        assert!(frame.contains("Fixed"));
        assert!(frame.contains("fixed=1"));
    }

    #[test]
    fn closed_stream_and_focus_legend_appear_in_status_bar() {
        let mut dash = dashboard();
        dash.mark_closed();
        dash.handle_key(KeyEvent::new(KeyCode::Enter, KeyModifiers::NONE));
        let frame = render_to_string(&dash, &Theme::default(), 160, 20).expect("render");
        assert!(frame.contains("stream closed"));
        assert!(frame.contains("esc/q back"));
    }
}
