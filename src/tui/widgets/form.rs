use ratatui::Frame;
use ratatui::layout::{Constraint, Direction, Layout, Position, Rect};
use ratatui::style::{Modifier, Style};
use ratatui::text::{Line, Span};
use ratatui::widgets::{Block, Borders, Paragraph};

use crate::Config;
use crate::models::Priority;
use crate::tui::app::{TaskField, TaskForm};
use crate::tui::widgets::color::{get_contrast_text_color, parse_color};

pub fn render_task_form(f: &mut Frame, area: Rect, form: &TaskForm, config: &Config) {
    let active_theme = config.get_active_theme();
    let fg_color = parse_color(&active_theme.fg);
    let highlight_bg = parse_color(&active_theme.highlight_bg);
    let focused = Style::default().fg(highlight_bg).add_modifier(Modifier::BOLD);
    let normal = Style::default().fg(fg_color);

    let title = if form.editing.is_some() { "Edit Task" } else { "New Task" };
    let block = Block::default().borders(Borders::ALL).title(title);
    let inner = block.inner(area);
    f.render_widget(block, area);

    let rows = Layout::default()
        .direction(Direction::Vertical)
        .constraints([
            Constraint::Length(3),
            Constraint::Length(3),
            Constraint::Length(3),
            Constraint::Length(3),
            Constraint::Min(0),
        ])
        .split(inner);

    let fields = [
        (TaskField::Title, "Title", form.title.as_str()),
        (TaskField::Description, "Description", form.description.as_str()),
        (TaskField::Due, "Due date (YYYY-MM-DD, optional)", form.due.as_str()),
    ];
    for (row, (field, label, value)) in rows.iter().zip(fields) {
        let is_focused = form.current_field == field;
        let style = if is_focused { focused } else { normal };
        let input = Paragraph::new(value.to_string())
            .style(normal)
            .block(Block::default().borders(Borders::ALL).title(label).border_style(style));
        f.render_widget(input, *row);

        if is_focused {
            // Cursor sits after the text; inputs are append-only
            let width = value.chars().count() as u16;
            let x = (row.x + 1 + width).min(row.right().saturating_sub(2));
            f.set_cursor_position(Position::new(x, row.y + 1));
        }
    }

    let priority_focused = form.current_field == TaskField::Priority;
    let spans: Vec<Span> = Priority::ALL
        .iter()
        .flat_map(|p| {
            let style = if *p == form.priority {
                Style::default()
                    .bg(highlight_bg)
                    .fg(get_contrast_text_color(highlight_bg))
            } else {
                normal
            };
            [Span::styled(format!(" {} ", p), style), Span::raw(" ")]
        })
        .collect();
    let priority = Paragraph::new(Line::from(spans)).block(
        Block::default()
            .borders(Borders::ALL)
            .title("Priority (←/→)")
            .border_style(if priority_focused { focused } else { normal }),
    );
    f.render_widget(priority, rows[3]);
}
