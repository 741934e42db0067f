use crossterm::event::{KeyCode, KeyEvent, KeyEventKind, KeyModifiers};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct HotkeyBinding {
    pub key: &'static str,
    pub action: &'static str,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Focus {
    Table,
    Log,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum HotkeyAction {
    Quit,
    CursorUp,
    CursorDown,
    FocusLog,
    FocusTable,
    ScrollUp,
    ScrollDown,
    HalfPageUp,
    HalfPageDown,
    ScrollTop,
    ScrollBottom,
}

pub const TABLE_BINDINGS: [HotkeyBinding; 4] = [
    HotkeyBinding {
        key: "↑/k",
        action: "up",
    },
    HotkeyBinding {
        key: "↓/j",
        action: "down",
    },
    HotkeyBinding {
        key: "enter",
        action: "view log",
    },
    HotkeyBinding {
        key: "q",
        action: "quit",
    },
];

pub const LOG_BINDINGS: [HotkeyBinding; 5] = [
    HotkeyBinding {
        key: "↑/k ↓/j",
        action: "scroll",
    },
    HotkeyBinding {
        key: "pgup/pgdn",
        action: "half page",
    },
    HotkeyBinding {
        key: "g/G",
        action: "top/bottom",
    },
    HotkeyBinding {
        key: "esc/q",
        action: "back",
    },
    HotkeyBinding {
        key: "ctrl+c",
        action: "quit",
    },
];

pub fn controls_legend(focus: Focus) -> String {
    match focus {
        Focus::Table => format_bindings("Keys: ", &TABLE_BINDINGS),
        Focus::Log => format_bindings("Keys: ", &LOG_BINDINGS),
    }
}

/// Scroll hints shown in the log pane footer while it has focus.
pub fn log_footer_hint() -> String {
    format_bindings("", &LOG_BINDINGS[..3])
}

pub fn action_for_key(key: KeyEvent, focus: Focus) -> Option<HotkeyAction> {
    if key.kind == KeyEventKind::Release {
        return None;
    }
    if key.modifiers.contains(KeyModifiers::CONTROL) {
        return match key.code {
            KeyCode::Char('c') | KeyCode::Char('C') => Some(HotkeyAction::Quit),
            _ => None,
        };
    }

    match focus {
        Focus::Table => match key.code {
            KeyCode::Up | KeyCode::Char('k') => Some(HotkeyAction::CursorUp),
            KeyCode::Down | KeyCode::Char('j') => Some(HotkeyAction::CursorDown),
            KeyCode::Enter => Some(HotkeyAction::FocusLog),
            KeyCode::Char('q') => Some(HotkeyAction::Quit),
            _ => None,
        },
        Focus::Log => match key.code {
            KeyCode::Up | KeyCode::Char('k') => Some(HotkeyAction::ScrollUp),
            KeyCode::Down | KeyCode::Char('j') => Some(HotkeyAction::ScrollDown),
            KeyCode::PageUp => Some(HotkeyAction::HalfPageUp),
            KeyCode::PageDown => Some(HotkeyAction::HalfPageDown),
            KeyCode::Home | KeyCode::Char('g') => Some(HotkeyAction::ScrollTop),
            KeyCode::End | KeyCode::Char('G') => Some(HotkeyAction::ScrollBottom),
            KeyCode::Esc | KeyCode::Char('q') => Some(HotkeyAction::FocusTable),
            _ => None,
        },
    }
}

fn format_bindings(prefix: &str, bindings: &[HotkeyBinding]) -> String {
    let parts = bindings
        .iter()
        .map(|binding| format!("{} {}", binding.key, binding.action))
        .collect::<Vec<_>>();
    format!("{prefix}{}", parts.join("  "))
}
