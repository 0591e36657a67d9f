use chrono::NaiveDate;
use ratatui::Frame;
use ratatui::layout::{Constraint, Direction, Layout as RatLayout, Rect};
use ratatui::style::Style;
use ratatui::text::{Line, Span, Text};
use ratatui::widgets::{Block, Borders, Paragraph, Scrollbar, ScrollbarOrientation, ScrollbarState};
use ratskin::RatSkin;
use termimad::minimad::Text as MinimadText;

use crate::Config;
use crate::models::Task;
use crate::tui::widgets::color::parse_color;

/// Markdown description of a task for the detail pane and the clipboard
pub fn task_markdown(task: &Task, today: NaiveDate) -> String {
    let status = if task.completed { "done" } else { "pending" };
    let mut content = format!("**Title:** {}\n", task.title);
    content.push_str(&format!("**Status:** {}\n", status));
    content.push_str(&format!("**Priority:** {}\n", task.priority));

    if let Some(due) = task.due_date {
        let note = if task.is_overdue(today) {
            " *(overdue)*"
        } else if due == today {
            " *(today)*"
        } else {
            ""
        };
        content.push_str(&format!("**Due:** {}{}\n", due.format("%a %Y-%m-%d"), note));
    }
    content.push_str(&format!("**Created:** {}\n", task.created_at.format("%Y-%m-%d %H:%M")));
    if let Some(done) = task.completed_at {
        content.push_str(&format!("**Completed:** {}\n", done.format("%Y-%m-%d %H:%M")));
    }
    if let Some(ref description) = task.description {
        content.push_str("\n**Description:**\n\n");
        content.push_str(description);
        content.push('\n');
    }
    content
}

/// Render markdown with ratskin inside a bordered, scrollable pane.
/// Returns the scroll offset actually used; `usize::MAX` pins the view to the bottom.
pub fn render_markdown_view(f: &mut Frame, area: Rect, title: &str, markdown: &str, config: &Config, scroll: usize) -> usize {
    if area.width < 3 || area.height < 3 {
        return 0;
    }

    let horizontal = RatLayout::default()
        .direction(Direction::Horizontal)
        .constraints([Constraint::Min(1), Constraint::Length(1)])
        .split(area);
    let content_area = horizontal[0];
    let scrollbar_area = horizontal[1];

    let viewport_height = area.height.saturating_sub(2) as usize;
    let text_width = content_area.width.saturating_sub(2);

    // ratskin wraps to the given width itself
    let lines: Vec<Line> = RatSkin::default()
        .parse(MinimadText::from(markdown), text_width)
        .into_iter()
        .map(|line| {
            let spans: Vec<Span> = line
                .spans
                .into_iter()
                .map(|span| Span::styled(span.content.to_string(), span.style))
                .collect();
            Line::from(spans)
        })
        .collect();

    let total_lines = lines.len();
    let max_scroll = total_lines.saturating_sub(viewport_height);
    let scroll = scroll.min(max_scroll);
    let end = (scroll + viewport_height).min(total_lines);
    let visible = Text::from(lines.get(scroll..end).map(|s| s.to_vec()).unwrap_or_default());

    let base_style = Style::default().fg(parse_color(&config.get_active_theme().fg));
    let paragraph = Paragraph::new(visible)
        .block(Block::default().borders(Borders::ALL).title(title.to_string()))
        .style(base_style)
        .wrap(ratatui::widgets::Wrap { trim: false });
    f.render_widget(paragraph, content_area);

    if total_lines > viewport_height {
        let scrollbar_inner_area = Rect::new(
            scrollbar_area.x,
            content_area.y + 1,
            scrollbar_area.width,
            content_area.height.saturating_sub(2),
        );
        let mut scrollbar_state = ScrollbarState::new(total_lines)
            .viewport_content_length(viewport_height)
            .position(scroll);
        let scrollbar = Scrollbar::default()
            .orientation(ScrollbarOrientation::VerticalRight)
            .begin_symbol(Some("↑"))
            .end_symbol(Some("↓"))
            .track_symbol(Some("│"))
            .thumb_symbol("█");
        f.render_stateful_widget(scrollbar, scrollbar_inner_area, &mut scrollbar_state);
    }
    scroll
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::Priority;

    fn date(d: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(2024, 6, d).unwrap()
    }

    #[test]
    fn markdown_flags_overdue_and_lists_description() {
        let task = Task {
            id: 1,
            title: "Essay draft".to_string(),
            description: Some("Intro and outline".to_string()),
            due_date: Some(date(1)),
            priority: Priority::Urgent,
            completed: false,
            created_at: date(1).and_hms_opt(9, 0, 0).unwrap(),
            completed_at: None,
        };
        let md = task_markdown(&task, date(3));
        assert!(md.contains("**Priority:** urgent"));
        assert!(md.contains("(overdue)"));
        assert!(md.ends_with("Intro and outline\n"));
        assert!(task_markdown(&task, date(1)).contains("(today)"));
    }
}
