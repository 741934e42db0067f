use super::{draw, Dashboard, Theme};
use crate::errors::LintFixError;
use crate::logging::append_run_log;
use crate::protocol::{EventReceiver, ProgressEvent};
use crossterm::event::{self, DisableMouseCapture, EnableMouseCapture, Event};
use crossterm::execute;
use crossterm::terminal::{
    disable_raw_mode, enable_raw_mode, EnterAlternateScreen, LeaveAlternateScreen,
};
use ratatui::backend::{Backend, CrosstermBackend};
use ratatui::Terminal;
use serde_json::json;
use std::io;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::thread::JoinHandle;
use std::time::Duration;
use tokio::sync::mpsc;

const INPUT_POLL_INTERVAL: Duration = Duration::from_millis(100);

/// Blocking reader that forwards terminal events until stopped.
struct InputThread {
    stop: Arc<AtomicBool>,
    handle: Option<JoinHandle<()>>,
}

impl InputThread {
    fn spawn(tx: mpsc::UnboundedSender<Event>) -> Self {
        let stop = Arc::new(AtomicBool::new(false));
        let flag = Arc::clone(&stop);
        let handle = std::thread::spawn(move || {
            while !flag.load(Ordering::Relaxed) {
                match event::poll(INPUT_POLL_INTERVAL) {
                    Ok(true) => match event::read() {
                        Ok(ev) => {
                            if tx.send(ev).is_err() {
                                break;
                            }
                        }
                        Err(_) => break,
                    },
                    Ok(false) => {}
                    Err(_) => break,
                }
            }
        });
        Self {
            stop,
            handle: Some(handle),
        }
    }
}

impl Drop for InputThread {
    fn drop(&mut self) {
        self.stop.store(true, Ordering::Relaxed);
        if let Some(handle) = self.handle.take() {
            let _ = handle.join();
        }
    }
}

/// Drives the dashboard until the user quits. Each iteration draws once
/// and then handles exactly one input or progress event. A closed input
/// channel also ends the loop.
pub async fn run_dashboard<B: Backend>(
    terminal: &mut Terminal<B>,
    dashboard: &mut Dashboard,
    theme: &Theme,
    events: EventReceiver,
    mut input: mpsc::UnboundedReceiver<Event>,
) -> Result<(), LintFixError> {
    let mut events = Some(events);
    loop {
        terminal
            .draw(|frame| draw(frame, dashboard, theme))
            .map_err(|e| LintFixError::Terminal(format!("draw failed: {e}")))?;
        if dashboard.should_quit() {
            break;
        }

        tokio::select! {
            // Input wins ties with the progress stream.
            biased;
            ev = input.recv() => match ev {
                Some(ev) => dashboard.handle_event(ev),
                None => dashboard.request_quit(),
            },
            progress = next_progress(&mut events) => match progress {
                Some(progress) => {
                    dashboard.apply_event(&progress);
                }
                None => {
                    events = None;
                    dashboard.mark_closed();
                }
            },
        }
    }
    append_run_log("info", "dashboard.quit", json!({ "closed": dashboard.is_closed() }));
    Ok(())
}

async fn next_progress(events: &mut Option<EventReceiver>) -> Option<ProgressEvent> {
    match events {
        Some(rx) => rx.recv().await,
        None => std::future::pending().await,
    }
}

type PanicHook = Box<dyn Fn(&std::panic::PanicHookInfo<'_>) + Sync + Send + 'static>;

/// Chains `cleanup` in front of the current panic hook and puts the
/// previous hook back on drop.
struct PanicHookGuard {
    previous: Option<Arc<PanicHook>>,
}

impl PanicHookGuard {
    fn install(cleanup: fn()) -> Self {
        let previous = Arc::new(std::panic::take_hook());
        let chained = Arc::clone(&previous);
        std::panic::set_hook(Box::new(move |info| {
            cleanup();
            chained(info);
        }));
        Self {
            previous: Some(previous),
        }
    }
}

impl Drop for PanicHookGuard {
    fn drop(&mut self) {
        // Dropping our hook releases its handle on the previous one.
        drop(std::panic::take_hook());
        if let Some(previous) = self.previous.take() {
            if let Ok(hook) = Arc::try_unwrap(previous) {
                std::panic::set_hook(hook);
            }
        }
    }
}

/// Best-effort terminal reset for paths that cannot report errors.
fn reset_terminal() {
    let _ = disable_raw_mode();
    let _ = execute!(io::stdout(), LeaveAlternateScreen, DisableMouseCapture);
}

fn setup_terminal() -> Result<Terminal<CrosstermBackend<io::Stdout>>, LintFixError> {
    enable_raw_mode().map_err(|e| LintFixError::Terminal(format!("enable raw mode: {e}")))?;
    let mut stdout = io::stdout();
    if let Err(e) = execute!(stdout, EnterAlternateScreen, EnableMouseCapture) {
        reset_terminal();
        return Err(LintFixError::Terminal(format!("enter alternate screen: {e}")));
    }
    Terminal::new(CrosstermBackend::new(stdout)).map_err(|e| {
        reset_terminal();
        LintFixError::Terminal(format!("create terminal: {e}"))
    })
}

fn restore_terminal(
    terminal: &mut Terminal<CrosstermBackend<io::Stdout>>,
) -> Result<(), LintFixError> {
    disable_raw_mode().map_err(|e| LintFixError::Terminal(format!("disable raw mode: {e}")))?;
    execute!(
        terminal.backend_mut(),
        LeaveAlternateScreen,
        DisableMouseCapture
    )
    .map_err(|e| LintFixError::Terminal(format!("leave alternate screen: {e}")))?;
    terminal
        .show_cursor()
        .map_err(|e| LintFixError::Terminal(format!("show cursor: {e}")))
}

/// Runs the dashboard on the real terminal. The terminal is restored on
/// every exit path, including panics, and the caller's panic hook is back
/// in place on return.
pub async fn run_terminal_dashboard(
    dashboard: &mut Dashboard,
    theme: &Theme,
    events: EventReceiver,
) -> Result<(), LintFixError> {
    let _hook = PanicHookGuard::install(reset_terminal);

    let mut terminal = setup_terminal()?;
    if let Ok(size) = terminal.size() {
        dashboard.handle_resize(size.width, size.height);
    }

    let (tx, rx) = mpsc::unbounded_channel();
    let input = InputThread::spawn(tx);
    let result = run_dashboard(&mut terminal, dashboard, theme, events, rx).await;
    drop(input);

    restore_terminal(&mut terminal)?;
    result
}
