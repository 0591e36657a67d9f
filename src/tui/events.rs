use crossterm::event::{self, Event, KeyCode, KeyEvent, KeyEventKind, KeyModifiers};
use crossterm::execute;
use crossterm::terminal::{
    EnterAlternateScreen, LeaveAlternateScreen, disable_raw_mode, enable_raw_mode, size as terminal_size,
};
use ratatui::Terminal;
use ratatui::backend::CrosstermBackend;
use ratatui::layout::Rect;
use std::io;
use std::time::Duration;

use crate::tui::app::{Mode, Tab, TaskField};
use crate::tui::error::TuiError;
use crate::tui::layout::Layout;
use crate::tui::App;
use crate::utils::parse_key_binding;

/// Raw mode plus alternate screen for as long as it lives; dropping it
/// (including while unwinding) puts the terminal back.
struct TerminalGuard {
    active: bool,
}

impl TerminalGuard {
    fn enter() -> Result<Self, TuiError> {
        enable_raw_mode()?;
        if let Err(e) = execute!(io::stdout(), EnterAlternateScreen) {
            let _ = disable_raw_mode();
            return Err(e.into());
        }
        Ok(Self { active: true })
    }

    fn leave(&mut self) -> io::Result<()> {
        if !std::mem::replace(&mut self.active, false) {
            return Ok(());
        }
        let raw = disable_raw_mode();
        execute!(io::stdout(), LeaveAlternateScreen)?;
        raw
    }
}

impl Drop for TerminalGuard {
    fn drop(&mut self) {
        let _ = self.leave();
    }
}

pub fn run_event_loop(mut app: App) -> Result<(), TuiError> {
    // Checked before entering the alternate screen so the message stays visible
    let (width, height) = terminal_size()?;
    let min_width = Layout::MIN_WIDTH + 2;
    let min_height = Layout::MIN_HEIGHT + 2;
    if width < min_width || height < min_height {
        return Err(TuiError::RenderError(format!(
            "Terminal size too small. Current: {}x{}, Minimum required: {}x{}. Please resize your terminal window.",
            width, height, min_width, min_height
        )));
    }

    let mut guard = TerminalGuard::enter()?;
    let backend = CrosstermBackend::new(io::stdout());
    let mut terminal = Terminal::new(backend)?;
    tracing::info!("tui started");

    loop {
        app.tick();

        let size = terminal.size()?;
        let rect = Rect::new(0, 0, size.width, size.height);
        terminal.draw(|f| {
            let layout = Layout::calculate(rect);
            crate::tui::render::render(f, &mut app, &layout);
        })?;

        // Press events only; Windows also reports releases
        if event::poll(Duration::from_millis(16))? {
            if let Event::Key(key_event) = event::read()? {
                if key_event.kind == KeyEventKind::Press && handle_key_event(&mut app, key_event)? {
                    break;
                }
            }
        }
    }

    if app.store.has_unsaved_changes() {
        tracing::warn!("exiting with unsaved task changes");
    }
    guard.leave()?;
    tracing::info!("tui stopped");
    Ok(())
}

fn handle_key_event(app: &mut App, key_event: KeyEvent) -> Result<bool, TuiError> {
    if app.modals.delete_confirmation.is_some() {
        handle_delete_confirmation_modal(app, key_event);
        return Ok(false);
    }

    match app.ui.mode {
        Mode::Form => handle_form_mode(app, key_event),
        Mode::Help => {
            let help = parse_key_binding(&app.config.key_bindings.help).map_err(TuiError::KeyBindingError)?;
            if key_event.code == KeyCode::Esc || help.matches(&key_event) {
                app.ui.mode = Mode::Normal;
            }
        }
        Mode::ChatInput => match key_event.code {
            KeyCode::Esc => app.ui.mode = Mode::Normal,
            KeyCode::Enter => app.send_chat(),
            KeyCode::Backspace => {
                app.chat.input.pop();
            }
            KeyCode::Char(c) if !key_event.modifiers.contains(KeyModifiers::CONTROL) => app.chat.input.push(c),
            _ => {}
        },
        Mode::SiteInput => match key_event.code {
            KeyCode::Esc => {
                app.site_input.clear();
                app.ui.mode = Mode::Normal;
            }
            KeyCode::Enter => app.submit_site(),
            KeyCode::Backspace => {
                app.site_input.pop();
            }
            KeyCode::Char(c) if !key_event.modifiers.contains(KeyModifiers::CONTROL) => app.site_input.push(c),
            _ => {}
        },
        Mode::Normal => return handle_global_key_bindings(app, key_event),
    }
    Ok(false)
}

fn handle_delete_confirmation_modal(app: &mut App, key_event: KeyEvent) {
    match key_event.code {
        KeyCode::Up | KeyCode::Down | KeyCode::Tab => {
            app.modals.delete_modal_selection = 1 - app.modals.delete_modal_selection.min(1);
        }
        KeyCode::Enter => app.confirm_delete(),
        KeyCode::Char('y') => {
            app.modals.delete_modal_selection = 0;
            app.confirm_delete();
        }
        KeyCode::Esc | KeyCode::Char('n') => app.modals.delete_confirmation = None,
        _ => {}
    }
}

fn handle_form_mode(app: &mut App, key_event: KeyEvent) {
    if key_event.code == KeyCode::Esc {
        app.cancel_form();
        return;
    }
    if key_event.code == KeyCode::Enter {
        app.submit_form();
        return;
    }
    let Some(form) = app.form.as_mut() else {
        app.ui.mode = Mode::Normal;
        return;
    };
    match key_event.code {
        KeyCode::Tab | KeyCode::Down => form.next_field(),
        KeyCode::BackTab | KeyCode::Up => form.prev_field(),
        KeyCode::Left if form.current_field == TaskField::Priority => form.priority = form.priority.prev(),
        KeyCode::Right | KeyCode::Char(' ') if form.current_field == TaskField::Priority => {
            form.priority = form.priority.next();
        }
        KeyCode::Backspace => {
            if let Some(input) = form.input_mut() {
                input.pop();
            }
        }
        KeyCode::Char(c) if !key_event.modifiers.contains(KeyModifiers::CONTROL) => {
            if let Some(input) = form.input_mut() {
                input.push(c);
            }
        }
        _ => {}
    }
}

fn handle_global_key_bindings(app: &mut App, key_event: KeyEvent) -> Result<bool, TuiError> {
    let bindings = app.config.key_bindings.clone();
    let is = |binding: &str| -> Result<bool, TuiError> {
        Ok(parse_key_binding(binding).map_err(TuiError::KeyBindingError)?.matches(&key_event))
    };

    if is(&bindings.quit)? {
        return Ok(true);
    }
    if is(&bindings.help)? {
        app.ui.mode = Mode::Help;
        return Ok(false);
    }
    if is(&bindings.tab_left)? {
        app.prev_tab();
        return Ok(false);
    }
    if is(&bindings.tab_right)? {
        app.next_tab();
        return Ok(false);
    }
    if is(&bindings.list_up)? || key_event.code == KeyCode::Up {
        app.move_selection(false);
        return Ok(false);
    }
    if is(&bindings.list_down)? || key_event.code == KeyCode::Down {
        app.move_selection(true);
        return Ok(false);
    }
    if is(&bindings.focus_toggle)? {
        app.toggle_focus();
        return Ok(false);
    }
    if is(&bindings.yank)? {
        app.yank();
        return Ok(false);
    }

    let tab = app.ui.current_tab;
    match tab {
        Tab::Tasks | Tab::Upcoming => {
            if is(&bindings.new)? {
                app.start_create();
            } else if is(&bindings.edit)? {
                app.start_edit();
            } else if is(&bindings.delete)? {
                app.request_delete();
            } else if is(&bindings.toggle_task_status)? {
                app.toggle_selected_task();
            } else if key_event.code == KeyCode::PageDown {
                app.ui.detail_scroll = app.ui.detail_scroll.saturating_add(5);
            } else if key_event.code == KeyCode::PageUp {
                app.ui.detail_scroll = app.ui.detail_scroll.saturating_sub(5);
            }
        }
        Tab::Focus => {
            if is(&bindings.new)? {
                app.site_input.clear();
                app.ui.mode = Mode::SiteInput;
            } else if is(&bindings.delete)? {
                app.remove_selected_site();
            }
        }
        Tab::Chat => {
            if key_event.code == KeyCode::Enter || is(&bindings.new)? {
                app.ui.mode = Mode::ChatInput;
            } else if is(&bindings.delete)? {
                app.clear_chat();
            } else if key_event.code == KeyCode::PageDown {
                app.chat.scroll = app.chat.scroll.saturating_add(5);
            } else if key_event.code == KeyCode::PageUp {
                app.chat.scroll = app.chat.scroll.saturating_sub(5);
            }
        }
        Tab::Schedule => {}
    }
    Ok(false)
}
