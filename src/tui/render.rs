use ratatui::Frame;
use ratatui::layout::Alignment;
use ratatui::style::Style;
use ratatui::widgets::{Block, Borders, Paragraph};

use crate::focus::format_remaining;
use crate::tui::app::{Mode, Tab};
use crate::tui::widgets::{
    chat_view::render_chat_view,
    color::parse_color,
    confirm_delete::render_confirm_delete,
    focus_view::render_focus_view,
    form::render_task_form,
    help::render_help,
    item_view::{render_markdown_view, task_markdown},
    schedule_view::render_schedule_view,
    status_bar::render_status_bar,
    tabs::render_tabs,
    task_list::render_task_list,
};
use crate::tui::{App, Layout};
use crate::utils::{self, format_key_binding_for_display as key};

pub fn render(f: &mut Frame, app: &mut App, layout: &Layout) {
    let active_theme = app.config.get_active_theme();
    let fg_color = parse_color(&active_theme.fg);
    let bg_color = parse_color(&active_theme.bg);
    let outer_block = Block::default()
        .borders(Borders::ALL)
        .title("Study Helper")
        .title_alignment(Alignment::Center)
        .style(Style::default().fg(fg_color).bg(bg_color));
    f.render_widget(outer_block, f.area());

    let now = utils::now();
    let today = now.date();
    let focus_status = app.focus.status(now);
    let focus_label = focus_status.remaining.map(format_remaining);
    render_tabs(f, layout.tabs_area, app.ui.current_tab, focus_label.as_deref(), &app.config);

    match app.ui.current_tab {
        Tab::Tasks | Tab::Upcoming => {
            let tasks = app.visible_tasks();
            let (list_area, detail_area) = Layout::split_main(layout.main_area, 40);
            let title = app.ui.current_tab.title();
            render_task_list(f, list_area, title, &tasks, &mut app.ui.list_state, &app.config, today);

            if app.ui.mode == Mode::Form {
                if let Some(ref form) = app.form {
                    render_task_form(f, detail_area, form, &app.config);
                }
            } else if let Some(task) = app.ui.list_state.selected().and_then(|i| tasks.get(i)) {
                let markdown = task_markdown(task, today);
                app.ui.detail_scroll =
                    render_markdown_view(f, detail_area, "Task", &markdown, &app.config, app.ui.detail_scroll);
            } else {
                let hint = format!("No task selected. Press {} to add one.", key(&app.config.key_bindings.new));
                let paragraph = Paragraph::new(hint)
                    .block(Block::default().borders(Borders::ALL).title("Task"))
                    .style(Style::default().fg(fg_color));
                f.render_widget(paragraph, detail_area);
            }
        }
        Tab::Schedule => {
            let week = app.store.weekly_schedule(today);
            let slots = app.store.suggest_schedule_at(
                now,
                app.config.schedule.slot_minutes,
                app.config.schedule.gap_minutes,
            );
            render_schedule_view(f, layout.main_area, &week, &slots, today, &app.config);
        }
        Tab::Focus => {
            let site_input = (app.ui.mode == Mode::SiteInput).then_some(app.site_input.as_str());
            render_focus_view(
                f,
                layout.main_area,
                &focus_status,
                app.focus.is_available(),
                app.focus.sites(),
                site_input,
                &mut app.ui.list_state,
                &app.config,
            );
        }
        Tab::Chat => {
            let typing = app.ui.mode == Mode::ChatInput;
            app.chat.scroll = render_chat_view(f, layout.main_area, &app.chat, typing, &app.config);
        }
    }

    if app.ui.mode == Mode::Help {
        render_help(f, f.area(), &app.config);
    }
    if let Some(ref task) = app.modals.delete_confirmation {
        render_confirm_delete(f, f.area(), task, app.modals.delete_modal_selection, &app.config);
    }

    let key_hints = get_key_hints(app);
    render_status_bar(f, layout.status_area, app.status.message.as_deref(), &key_hints, &app.config);
}

fn get_key_hints(app: &App) -> Vec<String> {
    let kb = &app.config.key_bindings;
    match app.ui.mode {
        Mode::Help => vec![format!("Esc or {}: Exit help", key(&kb.help))],
        Mode::Form => vec![
            "Tab/Shift+Tab: Next/previous field".to_string(),
            "←/→: Priority".to_string(),
            "Enter: Save".to_string(),
            "Esc: Cancel".to_string(),
        ],
        Mode::ChatInput => vec!["Enter: Send".to_string(), "Esc: Stop typing".to_string()],
        Mode::SiteInput => vec!["Enter: Block site".to_string(), "Esc: Cancel".to_string()],
        Mode::Normal => {
            let mut hints = vec![format!("{}: Quit", key(&kb.quit))];
            match app.ui.current_tab {
                Tab::Tasks | Tab::Upcoming => {
                    hints.push(format!("{}: New", key(&kb.new)));
                    hints.push(format!("{}: Edit", key(&kb.edit)));
                    hints.push(format!("{}: Delete", key(&kb.delete)));
                    hints.push(format!("{}: Done/undo", key(&kb.toggle_task_status)));
                }
                Tab::Focus => {
                    hints.push(format!("{}: Block site", key(&kb.new)));
                    hints.push(format!("{}: Unblock", key(&kb.delete)));
                }
                Tab::Chat => {
                    hints.push("Enter: Type".to_string());
                    hints.push(format!("{}: Copy reply", key(&kb.yank)));
                    hints.push(format!("{}: Clear", key(&kb.delete)));
                }
                Tab::Schedule => {}
            }
            hints.push(format!("{}: Focus", key(&kb.focus_toggle)));
            hints.push(format!("{}/{}: Tabs", key(&kb.tab_left), key(&kb.tab_right)));
            hints.push(format!("{}: Help", key(&kb.help)));
            hints
        }
    }
}
