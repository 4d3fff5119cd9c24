use {
    crate::{
        runtime::{Command, Snapshot},
        ui::renderer::ScatterAdapter,
    },
    crossterm::event::{Event, KeyCode, KeyEvent, KeyEventKind},
    ratatui::{backend::CrosstermBackend, Terminal},
    std::time::Duration,
    tokio::sync::{mpsc, watch},
};

/// How often the key poll runs while no new snapshot arrives
const TICK: Duration = Duration::from_millis(100);

/// Map a key press to a runtime command. `Some(Command::Shutdown)` means quit.
pub fn command_for_key(key: KeyEvent) -> Option<Command> {
    if key.kind != KeyEventKind::Press {
        return None;
    }
    match key.code {
        KeyCode::Char('q') | KeyCode::Esc => Some(Command::Shutdown),
        KeyCode::Char('r') => Some(Command::Refresh),
        KeyCode::Char('t') => Some(Command::ToggleDirection),
        KeyCode::Char('c') => Some(Command::CycleCategory),
        _ => None,
    }
}

/// Run the TUI event loop
///
/// Redraws whenever the runtime publishes a snapshot, and otherwise polls the
/// keyboard every tick. Quitting cancels pending acquisition work before the
/// runtime is shut down.
pub async fn run_ui(
    mut snapshots: watch::Receiver<Snapshot>,
    commands: mpsc::Sender<Command>,
) -> Result<(), Box<dyn std::error::Error>> {
    let stdout = std::io::stdout();
    let backend = CrosstermBackend::new(stdout);
    let mut terminal = Terminal::new(backend)?;

    crossterm::terminal::enable_raw_mode()?;

    // Alternate screen keeps stderr logs off the dashboard
    crossterm::execute!(
        std::io::stdout(),
        crossterm::terminal::EnterAlternateScreen,
        crossterm::cursor::Hide
    )?;

    terminal.clear()?;

    let mut scatter = ScatterAdapter::new();
    let result = event_loop(&mut terminal, &mut snapshots, &commands, &mut scatter).await;

    // Cleanup - restore terminal state even if the loop failed
    crossterm::execute!(
        std::io::stdout(),
        crossterm::terminal::LeaveAlternateScreen,
        crossterm::cursor::Show
    )?;
    crossterm::terminal::disable_raw_mode()?;

    let _ = commands.send(Command::Cancel).await;
    let _ = commands.send(Command::Shutdown).await;

    result
}

async fn event_loop(
    terminal: &mut Terminal<CrosstermBackend<std::io::Stdout>>,
    snapshots: &mut watch::Receiver<Snapshot>,
    commands: &mpsc::Sender<Command>,
    scatter: &mut ScatterAdapter,
) -> Result<(), Box<dyn std::error::Error>> {
    let mut dirty = true;

    loop {
        while crossterm::event::poll(Duration::ZERO)? {
            if let Event::Key(key) = crossterm::event::read()? {
                match command_for_key(key) {
                    Some(Command::Shutdown) => return Ok(()),
                    Some(command) => {
                        if commands.send(command).await.is_err() {
                            log::warn!("Runtime stopped; closing dashboard");
                            return Ok(());
                        }
                    }
                    None => {}
                }
            } else {
                // Resize and focus changes
                dirty = true;
            }
        }

        if dirty {
            let snapshot = snapshots.borrow_and_update().clone();
            let plotted = scatter.plot(&snapshot.views.points);
            let area = terminal.size()?;
            terminal.draw(|f| {
                if let Err(e) = crate::ui::layout::render_layout(f, area, &snapshot, &plotted) {
                    log::error!("Layout render error: {}", e);
                }
            })?;
            dirty = false;
        }

        tokio::select! {
            changed = snapshots.changed() => {
                if changed.is_err() {
                    log::warn!("Runtime stopped; closing dashboard");
                    return Ok(());
                }
                dirty = true;
            }
            _ = tokio::time::sleep(TICK) => {}
        }
    }
}
