use crate::hotkeys::{action_for_key, Focus, HotkeyAction};
use crate::logging::append_run_log;
use crate::protocol::ProgressEvent;
use crate::types::{FileRecord, Outcome, Phase, RecordState, TableItem};
use crossterm::event::{Event, KeyEvent, MouseEvent, MouseEventKind};
use serde_json::json;
use std::sync::Arc;

pub mod logview;
pub mod render;
pub mod terminal;

pub use logview::{format_log_lines, LogViewport};
pub use render::{draw, render_to_string, Theme};
pub use terminal::{run_dashboard, run_terminal_dashboard};

/// Rows taken by the bordered status bar.
pub const STATUS_BAR_ROWS: u16 = 3;
/// Rows of the log pane that are not log content: two borders, the
/// command header and the footer.
pub const LOG_CHROME_ROWS: u16 = 4;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PaneLayout {
    pub width: u16,
    pub height: u16,
}

impl PaneLayout {
    pub fn new(width: u16, height: u16) -> Self {
        Self { width, height }
    }

    pub fn table_width(&self) -> u16 {
        self.width / 2
    }

    pub fn log_width(&self) -> u16 {
        self.width - self.table_width()
    }

    pub fn log_viewport_rows(&self) -> usize {
        self.height
            .saturating_sub(STATUS_BAR_ROWS + LOG_CHROME_ROWS) as usize
    }
}

/// Cached display text of one table row. `phase` is `None` for directories.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TableRow {
    pub label: String,
    pub status: String,
    pub phase: Option<Phase>,
    pub attempts: String,
}

impl TableRow {
    fn for_item(item: &TableItem, max_retries: u32) -> Self {
        match item {
            TableItem::Directory { path } => Self {
                label: format!("{}/", path.display()),
                status: String::new(),
                phase: None,
                attempts: String::new(),
            },
            TableItem::File(record) => Self::for_file(record, &record.snapshot(), max_retries),
        }
    }

    fn for_file(record: &FileRecord, state: &RecordState, max_retries: u32) -> Self {
        Self {
            label: format!("  {}", record.file_name()),
            status: state.status.clone(),
            phase: Some(state.phase),
            attempts: format!("{}/{max_retries}", state.retries),
        }
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct ProgressCounts {
    pub fixed: usize,
    pub failed: usize,
    pub running: usize,
    pub pending: usize,
}

impl ProgressCounts {
    pub fn from_records<'a>(records: impl IntoIterator<Item = &'a Arc<FileRecord>>) -> Self {
        let mut counts = Self::default();
        for record in records {
            match record.lock().phase {
                Phase::Done(Outcome::Fixed) => counts.fixed += 1,
                Phase::Done(Outcome::Failed) => counts.failed += 1,
                Phase::Running => counts.running += 1,
                Phase::Pending => counts.pending += 1,
            }
        }
        counts
    }
}

/// Presentation state of the dashboard. Only the dashboard task touches it;
/// record state is reached through each record's own lock.
pub struct Dashboard {
    items: Vec<TableItem>,
    rows: Vec<TableRow>,
    cursor: usize,
    focus: Focus,
    log: LogViewport,
    layout: PaneLayout,
    lint_template: String,
    max_retries: u32,
    closed: bool,
    should_quit: bool,
}

impl Dashboard {
    pub fn new(
        items: Vec<TableItem>,
        lint_template: impl Into<String>,
        max_retries: u32,
        width: u16,
        height: u16,
    ) -> Self {
        let layout = PaneLayout::new(width, height);
        let rows = items
            .iter()
            .map(|item| TableRow::for_item(item, max_retries))
            .collect();
        let mut dashboard = Self {
            items,
            rows,
            cursor: 0,
            focus: Focus::Table,
            log: LogViewport::new(layout.log_viewport_rows()),
            layout,
            lint_template: lint_template.into(),
            max_retries,
            closed: false,
            should_quit: false,
        };
        dashboard.load_selected_log();
        dashboard
    }

    pub fn items(&self) -> &[TableItem] {
        &self.items
    }

    pub fn rows(&self) -> &[TableRow] {
        &self.rows
    }

    pub fn cursor(&self) -> usize {
        self.cursor
    }

    pub fn focus(&self) -> Focus {
        self.focus
    }

    pub fn log(&self) -> &LogViewport {
        &self.log
    }

    pub fn layout(&self) -> PaneLayout {
        self.layout
    }

    pub fn lint_template(&self) -> &str {
        &self.lint_template
    }

    pub fn is_closed(&self) -> bool {
        self.closed
    }

    pub fn should_quit(&self) -> bool {
        self.should_quit
    }

    pub fn selected(&self) -> Option<&TableItem> {
        self.items.get(self.cursor)
    }

    pub fn selected_record(&self) -> Option<&Arc<FileRecord>> {
        self.selected().and_then(TableItem::record)
    }

    pub fn counts(&self) -> ProgressCounts {
        ProgressCounts::from_records(self.items.iter().filter_map(TableItem::record))
    }

    pub fn mark_closed(&mut self) {
        if !self.closed {
            append_run_log("info", "dashboard.stream_closed", json!({}));
        }
        self.closed = true;
    }

    pub fn request_quit(&mut self) {
        self.should_quit = true;
    }

    /// Applies one progress event to its record and refreshes only what it
    /// touches. Returns false when no row carries the event's path.
    pub fn apply_event(&mut self, event: &ProgressEvent) -> bool {
        let Some(index) = self
            .items
            .iter()
            .position(|item| item.record().is_some_and(|r| r.path() == event.path))
        else {
            append_run_log(
                "warn",
                "dashboard.event.unknown_path",
                json!({ "path": event.path.display().to_string() }),
            );
            return false;
        };
        let Some(record) = self.items[index].record().cloned() else {
            return false;
        };

        let state = {
            let mut guard = record.lock();
            event.apply_to(&mut guard);
            guard.clone()
        };
        self.rows[index] = TableRow::for_file(&record, &state, self.max_retries);

        if index == self.cursor {
            let follow = self.log.at_bottom();
            self.log.set_content(format_log_lines(&state.logs));
            if follow {
                self.log.goto_bottom();
            }
        }
        true
    }

    pub fn handle_event(&mut self, event: Event) {
        match event {
            Event::Key(key) => self.handle_key(key),
            Event::Mouse(mouse) => self.handle_mouse(mouse),
            Event::Resize(width, height) => self.handle_resize(width, height),
            _ => {}
        }
    }

    pub fn handle_key(&mut self, key: KeyEvent) {
        let Some(action) = action_for_key(key, self.focus) else {
            return;
        };
        match action {
            HotkeyAction::Quit => self.should_quit = true,
            HotkeyAction::CursorUp => self.select(self.cursor.saturating_sub(1)),
            HotkeyAction::CursorDown => self.select(self.cursor.saturating_add(1)),
            HotkeyAction::FocusLog => self.focus = Focus::Log,
            HotkeyAction::FocusTable => self.focus = Focus::Table,
            HotkeyAction::ScrollUp => self.log.line_up(),
            HotkeyAction::ScrollDown => self.log.line_down(),
            HotkeyAction::HalfPageUp => self.log.half_page_up(),
            HotkeyAction::HalfPageDown => self.log.half_page_down(),
            HotkeyAction::ScrollTop => self.log.goto_top(),
            HotkeyAction::ScrollBottom => self.log.goto_bottom(),
        }
    }

    pub fn handle_mouse(&mut self, mouse: MouseEvent) {
        if self.focus != Focus::Log {
            return;
        }
        match mouse.kind {
            MouseEventKind::ScrollUp => self.log.line_up(),
            MouseEventKind::ScrollDown => self.log.line_down(),
            _ => {}
        }
    }

    pub fn handle_resize(&mut self, width: u16, height: u16) {
        self.layout = PaneLayout::new(width, height);
        self.log.set_height(self.layout.log_viewport_rows());
    }

    fn select(&mut self, index: usize) {
        let last = self.items.len().saturating_sub(1);
        let index = index.min(last);
        if index != self.cursor {
            self.cursor = index;
            self.load_selected_log();
        }
    }

    fn load_selected_log(&mut self) {
        let lines = self
            .selected_record()
            .map(|record| format_log_lines(&record.snapshot().logs))
            .unwrap_or_default();
        self.log.set_content(lines);
        self.log.goto_bottom();
    }
}
