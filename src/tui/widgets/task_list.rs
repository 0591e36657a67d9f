use chrono::NaiveDate;
use ratatui::Frame;
use ratatui::layout::Rect;
use ratatui::style::{Color, Modifier, Style};
use ratatui::text::{Line, Span};
use ratatui::widgets::{Block, Borders, List, ListItem, ListState};

use crate::Config;
use crate::models::{Priority, Task};
use crate::tui::widgets::color::{get_contrast_text_color, parse_color};
use crate::utils::truncate;

fn priority_marker(priority: Priority) -> (&'static str, Color) {
    match priority {
        Priority::Urgent => ("!!", Color::Red),
        Priority::High => ("! ", Color::Yellow),
        Priority::Medium => ("  ", Color::Reset),
        Priority::Low => ("  ", Color::DarkGray),
    }
}

pub fn render_task_list(
    f: &mut Frame,
    area: Rect,
    title: &str,
    tasks: &[Task],
    list_state: &mut ListState,
    config: &Config,
    today: NaiveDate,
) {
    // Borders plus the highlight symbol
    let max_width = area.width.saturating_sub(4) as usize;

    let active_theme = config.get_active_theme();
    let fg_color = parse_color(&active_theme.fg);
    let highlight_bg = parse_color(&active_theme.highlight_bg);

    let items: Vec<ListItem> = tasks
        .iter()
        .map(|task| {
            let status = if task.completed { "✓" } else { "○" };
            let (marker, marker_color) = priority_marker(task.priority);
            let due = task.due_date.map(|d| format!(" [{}]", d.format("%m-%d"))).unwrap_or_default();
            let text = truncate(&format!("{} {}{}", status, task.title, due), max_width.saturating_sub(2));

            let style = if task.completed {
                Style::default().fg(Color::DarkGray).add_modifier(Modifier::CROSSED_OUT)
            } else if task.is_overdue(today) {
                Style::default().fg(Color::LightRed)
            } else {
                Style::default().fg(fg_color)
            };
            ListItem::new(Line::from(vec![
                Span::styled(marker, Style::default().fg(marker_color)),
                Span::styled(text, style),
            ]))
        })
        .collect();

    let pending = tasks.iter().filter(|t| !t.completed).count();
    let list = List::new(items)
        .block(
            Block::default()
                .borders(Borders::ALL)
                .title(format!("{} ({} open / {})", title, pending, tasks.len())),
        )
        .highlight_style(
            Style::default()
                .bg(highlight_bg)
                .fg(get_contrast_text_color(highlight_bg)),
        )
        .highlight_symbol("> ");

    f.render_stateful_widget(list, area, list_state);
}
