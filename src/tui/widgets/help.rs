use ratatui::Frame;
use ratatui::layout::{Alignment, Rect};
use ratatui::style::Style;
use ratatui::widgets::{Block, Borders, Clear, Paragraph};

use crate::Config;
use crate::tui::widgets::color::parse_color;
use crate::tui::widgets::popup_area;
use crate::utils::format_key_binding_for_display as key;

pub fn render_help(f: &mut Frame, area: Rect, config: &Config) {
    let active_theme = config.get_active_theme();
    let style = Style::default()
        .fg(parse_color(&active_theme.fg))
        .bg(parse_color(&active_theme.bg));

    let popup_area = popup_area(area, 60, 80);
    f.render_widget(Clear, popup_area);

    let paragraph = Paragraph::new(build_help_text(config))
        .block(
            Block::default()
                .borders(Borders::ALL)
                .title("Help - Key Bindings")
                .title_alignment(Alignment::Center)
                .style(style),
        )
        .style(style)
        .wrap(ratatui::widgets::Wrap { trim: false });

    f.render_widget(paragraph, popup_area);
}

fn build_help_text(config: &Config) -> String {
    let kb = &config.key_bindings;
    let mut text = String::new();

    text.push_str("Navigation:\n");
    text.push_str(&format!("  {} / {}: Switch tabs\n", key(&kb.tab_left), key(&kb.tab_right)));
    text.push_str(&format!("  {} / {} or ↑/↓: Move selection\n", key(&kb.list_up), key(&kb.list_down)));
    text.push_str("  PageUp / PageDown: Scroll details or chat\n\n");

    text.push_str("Tasks and Upcoming:\n");
    text.push_str(&format!("  {}: New task\n", key(&kb.new)));
    text.push_str(&format!("  {}: Edit task\n", key(&kb.edit)));
    text.push_str(&format!("  {}: Delete task\n", key(&kb.delete)));
    text.push_str(&format!("  {}: Toggle done\n", key(&kb.toggle_task_status)));
    text.push_str(&format!("  {}: Copy task\n\n", key(&kb.yank)));

    text.push_str("Task form:\n");
    text.push_str("  Tab / Shift+Tab: Next / previous field\n");
    text.push_str("  ←/→ or Space: Change priority\n");
    text.push_str("  Enter: Save   Esc: Cancel\n\n");

    text.push_str("Focus:\n");
    text.push_str(&format!("  {}: Start / end a focus session (any tab)\n", key(&kb.focus_toggle)));
    text.push_str(&format!("  {}: Block a site   {}: Unblock selected\n\n", key(&kb.new), key(&kb.delete)));

    text.push_str("Chat:\n");
    text.push_str("  Enter: Type a message, Enter again to send\n");
    text.push_str(&format!("  {}: Copy last reply   {}: Clear conversation\n\n", key(&kb.yank), key(&kb.delete)));

    text.push_str("General:\n");
    text.push_str(&format!("  {}: Quit\n", key(&kb.quit)));
    text.push_str(&format!("  {} or Esc: Close help\n", key(&kb.help)));
    text
}
