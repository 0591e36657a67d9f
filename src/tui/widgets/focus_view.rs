use ratatui::Frame;
use ratatui::layout::{Alignment, Constraint, Direction, Layout, Rect};
use ratatui::style::{Color, Modifier, Style};
use ratatui::text::Line;
use ratatui::widgets::{Block, Borders, List, ListItem, ListState, Paragraph};

use crate::Config;
use crate::focus::{FocusStatus, format_remaining};
use crate::tui::widgets::color::{get_contrast_text_color, parse_color};
use crate::utils::format_key_binding_for_display as key;

pub fn render_focus_view(
    f: &mut Frame,
    area: Rect,
    status: &FocusStatus,
    available: bool,
    sites: &[String],
    site_input: Option<&str>,
    list_state: &mut ListState,
    config: &Config,
) {
    let active_theme = config.get_active_theme();
    let fg_color = parse_color(&active_theme.fg);
    let highlight_bg = parse_color(&active_theme.highlight_bg);

    let input_height = if site_input.is_some() { 3 } else { 0 };
    let rows = Layout::default()
        .direction(Direction::Vertical)
        .constraints([Constraint::Length(5), Constraint::Min(3), Constraint::Length(input_height)])
        .split(area);

    let toggle = key(&config.key_bindings.focus_toggle);
    let (headline, detail, color) = match status.remaining {
        _ if !available => ("Focus mode is disabled".to_string(), "Enable it in config.toml".to_string(), Color::DarkGray),
        Some(remaining) => (
            format!("Focusing: {} left", format_remaining(remaining)),
            format!("Press {} to end the session early", toggle),
            Color::Green,
        ),
        None => (
            "No focus session running".to_string(),
            format!("Press {} to start a {} minute session", toggle, config.focus.default_minutes),
            fg_color,
        ),
    };
    let summary = Paragraph::new(vec![
        Line::styled(headline, Style::default().fg(color).add_modifier(Modifier::BOLD)),
        Line::styled(detail, Style::default().fg(fg_color)),
        Line::styled(format!("{} sites on the block list", status.blocked_sites_count), Style::default().fg(fg_color)),
    ])
    .alignment(Alignment::Center)
    .block(Block::default().borders(Borders::ALL).title("Focus Session"));
    f.render_widget(summary, rows[0]);

    let items: Vec<ListItem> = sites.iter().map(|s| ListItem::new(s.as_str())).collect();
    let list = List::new(items)
        .block(Block::default().borders(Borders::ALL).title("Blocked Sites"))
        .style(Style::default().fg(fg_color))
        .highlight_style(
            Style::default()
                .bg(highlight_bg)
                .fg(get_contrast_text_color(highlight_bg)),
        )
        .highlight_symbol("> ");
    f.render_stateful_widget(list, rows[1], list_state);

    if let Some(input) = site_input {
        let input = Paragraph::new(input.to_string())
            .style(Style::default().fg(fg_color))
            .block(Block::default().borders(Borders::ALL).title("Block site (Enter to add, Esc to cancel)"));
        f.render_widget(input, rows[2]);
    }
}
