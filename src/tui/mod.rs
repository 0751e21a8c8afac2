mod app;
mod event_handler;
mod ui;

use anyhow::Result;
use crossterm::{
    event::{poll, read, DisableMouseCapture, EnableMouseCapture, Event, KeyCode, KeyEventKind, KeyModifiers},
    execute,
    terminal::{disable_raw_mode, enable_raw_mode, EnterAlternateScreen, LeaveAlternateScreen},
};
use ratatui::{backend::CrosstermBackend, Terminal};
use std::io;
use std::time::Duration;

use crate::config::Config;
use crate::db::Database;

use app::{App, AppMode};

/// Run the TUI application
pub async fn run(config: &mut Config, db: &Database) -> Result<()> {
    // Build app state before touching the terminal so setup errors print normally
    let mut app = App::new(config.clone(), db.clone())?;
    app.load_jobs()?;

    // Setup terminal
    enable_raw_mode()?;
    let mut stdout = io::stdout();
    execute!(stdout, EnterAlternateScreen, EnableMouseCapture)?;
    let backend = CrosstermBackend::new(stdout);
    let mut terminal = Terminal::new(backend)?;

    let result = run_app(&mut terminal, &mut app).await;

    // Restore terminal
    disable_raw_mode()?;
    execute!(
        terminal.backend_mut(),
        LeaveAlternateScreen,
        DisableMouseCapture
    )?;
    terminal.show_cursor()?;

    // Save config if changed
    if app.config_changed {
        *config = app.config.clone();
        config.save()?;
    }

    result
}

async fn run_app<B: ratatui::backend::Backend>(
    terminal: &mut Terminal<B>,
    app: &mut App,
) -> Result<()> {
    loop {
        // Pick up finished generations
        app.poll_outcomes()?;

        terminal.draw(|f| ui::draw(f, app))?;
        app.tick = app.tick.wrapping_add(1);

        // Poll without blocking the runtime so spawned requests keep running
        let ready = tokio::task::block_in_place(|| poll(Duration::from_millis(100)))?;
        if ready {
            if let Event::Key(key) = read()? {
                if key.kind != KeyEventKind::Press {
                    continue;
                }

                if key.code == KeyCode::Char('c') && key.modifiers.contains(KeyModifiers::CONTROL) {
                    return Ok(());
                }

                // Result and error overlays take the keyboard first
                if !event_handler::handle_session_input(app, key)? {
                    match app.mode {
                        AppMode::Main => event_handler::handle_main_input(app, key)?,
                        AppMode::Input => event_handler::handle_input_mode(app, key)?,
                        AppMode::JobDetail => event_handler::handle_job_detail_input(app, key)?,
                        AppMode::Settings => event_handler::handle_settings_input(app, key)?,
                    }
                }
            }
        }

        if app.should_quit {
            return Ok(());
        }
    }
}
