use anyhow::Result;
use crossterm::event::{KeyCode, KeyEvent};

use super::app::{App, AppMode, SettingsField};
use crate::core::SessionState;

/// Handle keys while a generation overlay is shown.
///
/// Returns `true` when the key was consumed by the overlay.
pub fn handle_session_input(app: &mut App, key: KeyEvent) -> Result<bool> {
    match app.session.state() {
        SessionState::Idle => Ok(false),
        SessionState::Submitting { .. } => {
            // Input is locked until the result arrives
            if key.code == KeyCode::Esc {
                app.cancel()?;
            }
            Ok(true)
        }
        SessionState::Failed { .. } => {
            match key.code {
                KeyCode::Char('r') | KeyCode::Enter => app.retry()?,
                KeyCode::Esc | KeyCode::Char('q') => {
                    app.cancel()?;
                    app.clear_messages();
                }
                _ => {}
            }
            Ok(true)
        }
        SessionState::Succeeded { .. } => {
            match key.code {
                KeyCode::Esc | KeyCode::Enter | KeyCode::Char('q') => app.cancel()?,
                KeyCode::Char('n') | KeyCode::Char('i') => {
                    app.cancel()?;
                    app.mode = AppMode::Input;
                    app.clear_messages();
                }
                _ => {}
            }
            Ok(true)
        }
    }
}

/// Handle input on the history list
pub fn handle_main_input(app: &mut App, key: KeyEvent) -> Result<()> {
    let last = app.jobs.len().saturating_sub(1);
    match key.code {
        KeyCode::Up | KeyCode::Char('k') => app.select_previous(),
        KeyCode::Down | KeyCode::Char('j') => app.select_next(),
        KeyCode::Home | KeyCode::Char('g') => app.selected_job = 0,
        KeyCode::End | KeyCode::Char('G') => app.selected_job = last,

        KeyCode::Char('i') | KeyCode::Char('/') | KeyCode::Char('n') => {
            app.clear_messages();
            app.mode = AppMode::Input;
        }

        KeyCode::Enter => {
            app.current_job = app.selected_job().cloned();
            if app.current_job.is_some() {
                app.mode = AppMode::JobDetail;
            }
        }

        // Same prompt, negative prompt and model as the selected entry
        KeyCode::Char('R') => {
            if let Some(parent) = app.selected_job().cloned() {
                app.resubmit(&parent)?;
            }
        }

        KeyCode::Char('s') => {
            app.settings_selected = 0;
            app.settings_editing = false;
            app.mode = AppMode::Settings;
        }

        KeyCode::Char('r') => {
            app.load_jobs()?;
            app.set_status(format!("{} entries in history", app.jobs.len()));
        }

        KeyCode::Char('d') | KeyCode::Delete => {
            if let Some(id) = app.selected_job().map(|job| job.id.clone()) {
                if app.db.delete_job(&id)? {
                    app.set_status(format!("Deleted {}", id));
                }
                app.load_jobs()?;
            }
        }

        KeyCode::Char('q') | KeyCode::Esc => app.should_quit = true,

        _ => {}
    }
    Ok(())
}

/// Handle input in prompt input mode
pub fn handle_input_mode(app: &mut App, key: KeyEvent) -> Result<()> {
    match key.code {
        KeyCode::Esc => {
            app.mode = AppMode::Main;
            app.input.clear();
            app.cursor_pos = 0;
        }

        KeyCode::Enter => app.submit_prompt()?,

        KeyCode::Char(c) => {
            let at = byte_offset(&app.input, app.cursor_pos);
            app.input.insert(at, c);
            app.cursor_pos += 1;
        }

        KeyCode::Backspace => {
            if app.cursor_pos > 0 {
                app.cursor_pos -= 1;
                let at = byte_offset(&app.input, app.cursor_pos);
                app.input.remove(at);
            }
        }

        KeyCode::Delete => {
            if app.cursor_pos < app.input.chars().count() {
                let at = byte_offset(&app.input, app.cursor_pos);
                app.input.remove(at);
            }
        }

        KeyCode::Left => {
            if app.cursor_pos > 0 {
                app.cursor_pos -= 1;
            }
        }

        KeyCode::Right => {
            if app.cursor_pos < app.input.chars().count() {
                app.cursor_pos += 1;
            }
        }

        KeyCode::Home => {
            app.cursor_pos = 0;
        }

        KeyCode::End => {
            app.cursor_pos = app.input.chars().count();
        }

        _ => {}
    }
    Ok(())
}

/// Byte index of the `char_pos`-th char
fn byte_offset(s: &str, char_pos: usize) -> usize {
    s.char_indices()
        .nth(char_pos)
        .map(|(i, _)| i)
        .unwrap_or(s.len())
}

/// Handle input in job detail mode
pub fn handle_job_detail_input(app: &mut App, key: KeyEvent) -> Result<()> {
    match key.code {
        KeyCode::Esc | KeyCode::Char('q') | KeyCode::Backspace => {
            app.mode = AppMode::Main;
            app.current_job = None;
        }

        // Put the prompt back in the input box for editing
        KeyCode::Char('e') => {
            if let Some(job) = app.current_job.take() {
                app.input = job.request.prompt().to_string();
                app.cursor_pos = app.input.chars().count();
                app.mode = AppMode::Input;
            }
        }

        _ => {}
    }
    Ok(())
}

/// Handle input in settings mode
pub fn handle_settings_input(app: &mut App, key: KeyEvent) -> Result<()> {
    if app.settings_editing {
        return handle_settings_edit(app, key);
    }

    let fields = SettingsField::all();
    let field = fields[app.settings_selected];
    match key.code {
        KeyCode::Up | KeyCode::Char('k') => {
            app.settings_selected = (app.settings_selected + fields.len() - 1) % fields.len();
        }
        KeyCode::Down | KeyCode::Char('j') | KeyCode::Tab => {
            app.settings_selected = (app.settings_selected + 1) % fields.len();
        }

        // Fields with suggested values cycle; `e` always opens free-form editing
        KeyCode::Enter | KeyCode::Char(' ') if app.get_settings_options(&field).is_some() => {
            match app.cycle_settings_option(&field) {
                Ok(()) => app.set_status(format!("{} = {}", field.label(), app.get_settings_value(&field))),
                Err(e) => app.set_error(format!("{:#}", e)),
            }
        }
        KeyCode::Enter | KeyCode::Char(' ') | KeyCode::Char('e') => {
            app.settings_edit_buffer = app.get_settings_value(&field);
            app.settings_editing = true;
        }

        KeyCode::Esc | KeyCode::Char('q') => {
            app.clear_messages();
            app.mode = AppMode::Main;
        }

        _ => {}
    }
    Ok(())
}

/// Keys while a settings value is being typed
fn handle_settings_edit(app: &mut App, key: KeyEvent) -> Result<()> {
    match key.code {
        KeyCode::Enter => {
            let field = SettingsField::all()[app.settings_selected];
            let value = std::mem::take(&mut app.settings_edit_buffer);
            match app.set_settings_value(&field, &value) {
                Ok(()) => app.set_status(format!("Updated {}", field.label())),
                Err(e) => app.set_error(format!("{:#}", e)),
            }
            app.settings_editing = false;
        }
        KeyCode::Esc => {
            app.settings_edit_buffer.clear();
            app.settings_editing = false;
        }
        KeyCode::Backspace => {
            app.settings_edit_buffer.pop();
        }
        KeyCode::Char(c) => app.settings_edit_buffer.push(c),
        _ => {}
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_byte_offset() {
        assert_eq!(byte_offset("abc", 0), 0);
        assert_eq!(byte_offset("abc", 3), 3);
        assert_eq!(byte_offset("héllo", 2), 3);
        assert_eq!(byte_offset("héllo", 10), 6);
    }
}
