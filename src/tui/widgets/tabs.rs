use ratatui::Frame;
use ratatui::layout::Rect;
use ratatui::style::{Modifier, Style};
use ratatui::text::{Line, Span};
use ratatui::widgets::Tabs;

use crate::Config;
use crate::tui::app::Tab;
use crate::tui::widgets::color::{get_contrast_text_color, parse_color};

pub fn render_tabs(f: &mut Frame, area: Rect, current_tab: Tab, focus_label: Option<&str>, config: &Config) {
    let active_theme = config.get_active_theme();
    let highlight_bg = parse_color(&active_theme.highlight_bg);
    let fg_color = parse_color(&active_theme.fg);
    let bg_color = parse_color(&active_theme.bg);
    let tab_bg = parse_color(&active_theme.tab_bg);
    let tab_fg = get_contrast_text_color(tab_bg);

    // Padded background spans make each tab look like a box
    let titles: Vec<Line> = Tab::ALL
        .iter()
        .map(|tab| {
            let label = match (tab, focus_label) {
                (Tab::Focus, Some(remaining)) => format!("Focus {}", remaining),
                _ => tab.title().to_string(),
            };
            Line::from(vec![
                Span::styled("  ", Style::default().bg(tab_bg)),
                Span::styled(label, Style::default().fg(tab_fg).bg(tab_bg)),
                Span::styled("  ", Style::default().bg(tab_bg)),
            ])
        })
        .collect();

    let tabs = Tabs::new(titles)
        .select(current_tab.index())
        .style(Style::default().fg(fg_color).bg(bg_color))
        .highlight_style(
            Style::default()
                .fg(get_contrast_text_color(highlight_bg))
                .bg(highlight_bg)
                .add_modifier(Modifier::BOLD),
        )
        .divider("  ")
        .padding("", "");

    f.render_widget(tabs, area);
}
