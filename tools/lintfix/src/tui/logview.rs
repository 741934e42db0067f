/// Scroll state for the log pane. Content is the already-numbered display
/// lines of one record; `offset` is the first visible line.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct LogViewport {
    lines: Vec<String>,
    offset: usize,
    height: usize,
}

impl LogViewport {
    pub fn new(height: usize) -> Self {
        Self {
            height,
            ..Self::default()
        }
    }

    pub fn lines(&self) -> &[String] {
        &self.lines
    }

    pub fn offset(&self) -> usize {
        self.offset
    }

    pub fn height(&self) -> usize {
        self.height
    }

    /// Replaces the content and keeps the current offset where it still fits.
    pub fn set_content(&mut self, lines: Vec<String>) {
        self.lines = lines;
        self.clamp();
    }

    pub fn set_height(&mut self, height: usize) {
        self.height = height;
        self.clamp();
    }

    pub fn visible(&self) -> &[String] {
        let end = (self.offset + self.height).min(self.lines.len());
        &self.lines[self.offset.min(end)..end]
    }

    pub fn max_offset(&self) -> usize {
        self.lines.len().saturating_sub(self.height)
    }

    pub fn at_bottom(&self) -> bool {
        self.offset >= self.max_offset()
    }

    pub fn line_up(&mut self) {
        self.offset = self.offset.saturating_sub(1);
    }

    pub fn line_down(&mut self) {
        self.offset = (self.offset + 1).min(self.max_offset());
    }

    pub fn half_page_up(&mut self) {
        self.offset = self.offset.saturating_sub(self.half_page());
    }

    pub fn half_page_down(&mut self) {
        self.offset = (self.offset + self.half_page()).min(self.max_offset());
    }

    pub fn goto_top(&mut self) {
        self.offset = 0;
    }

    pub fn goto_bottom(&mut self) {
        self.offset = self.max_offset();
    }

    /// 100 when everything fits or the view sits at the bottom.
    pub fn scroll_percent(&self) -> u16 {
        let max = self.max_offset();
        if max == 0 {
            return 100;
        }
        ((self.offset.min(max) * 100) / max) as u16
    }

    fn half_page(&self) -> usize {
        (self.height / 2).max(1)
    }

    fn clamp(&mut self) {
        self.offset = self.offset.min(self.max_offset());
    }
}

/// Numbers each log entry with a `%4d │` gutter. Continuation lines of a
/// multi-line entry sit under a blank gutter.
pub fn format_log_lines(entries: &[String]) -> Vec<String> {
    let mut lines = Vec::with_capacity(entries.len());
    for (index, entry) in entries.iter().enumerate() {
        for (part, text) in entry.split('\n').enumerate() {
            if part == 0 {
                lines.push(format!("{:4} │ {text}", index + 1));
            } else {
                lines.push(format!("     │ {text}"));
            }
        }
    }
    lines
}
