use ratatui::Frame;
use ratatui::layout::{Constraint, Direction, Layout, Position, Rect};
use ratatui::style::Style;
use ratatui::widgets::{Block, Borders, Paragraph};

use crate::Config;
use crate::tui::app::ChatState;
use crate::tui::widgets::color::parse_color;
use crate::tui::widgets::item_view::render_markdown_view;

/// Returns the transcript scroll offset that was drawn
pub fn render_chat_view(f: &mut Frame, area: Rect, chat: &ChatState, typing: bool, config: &Config) -> usize {
    let fg_color = parse_color(&config.get_active_theme().fg);
    let rows = Layout::default()
        .direction(Direction::Vertical)
        .constraints([Constraint::Min(3), Constraint::Length(3)])
        .split(area);

    let transcript = if chat.transcript.is_empty() && !chat.waiting {
        "*Ask about study techniques, planning or staying focused.*".to_string()
    } else {
        chat.to_markdown()
    };
    let title = format!("Study Assistant ({})", chat.backend_name);
    let scroll = render_markdown_view(f, rows[0], &title, &transcript, config, chat.scroll);

    let input_title = if typing { "Message (Enter to send, Esc to stop typing)" } else { "Press Enter to type" };
    let input = Paragraph::new(chat.input.as_str())
        .style(Style::default().fg(fg_color))
        .block(Block::default().borders(Borders::ALL).title(input_title));
    f.render_widget(input, rows[1]);

    if typing {
        let width = chat.input.chars().count() as u16;
        let x = (rows[1].x + 1 + width).min(rows[1].right().saturating_sub(2));
        f.set_cursor_position(Position::new(x, rows[1].y + 1));
    }
    scroll
}
