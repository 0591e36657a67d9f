use ratatui::Frame;
use ratatui::layout::Rect;
use ratatui::style::{Modifier, Style};
use ratatui::widgets::Paragraph;

use crate::Config;
use crate::tui::widgets::color::{get_contrast_text_color, parse_color};
use crate::utils::truncate;

const SEPARATOR: &str = " • ";

/// As many hints as fit in `max_width`, with "..." when some are dropped
pub fn fit_hints(key_hints: &[String], max_width: usize) -> String {
    let mut text = String::new();
    for (i, hint) in key_hints.iter().enumerate() {
        let extra = if i == 0 { 0 } else { SEPARATOR.chars().count() };
        let would_be = text.chars().count() + extra + hint.chars().count();
        if would_be > max_width {
            if text.is_empty() {
                return truncate(hint, max_width);
            }
            if text.chars().count() + 3 > max_width {
                text = text.chars().take(max_width.saturating_sub(3)).collect();
            }
            text.push_str("...");
            break;
        }
        if i > 0 {
            text.push_str(SEPARATOR);
        }
        text.push_str(hint);
    }
    text
}

pub fn render_status_bar(f: &mut Frame, area: Rect, message: Option<&str>, key_hints: &[String], config: &Config) {
    let active_theme = config.get_active_theme();
    let fg_color = parse_color(&active_theme.fg);
    let bg_color = parse_color(&active_theme.bg);
    let highlight_bg = parse_color(&active_theme.highlight_bg);
    let max_width = area.width as usize;

    let (content, style) = match message {
        Some(msg) => (
            truncate(msg, max_width),
            Style::default()
                .fg(get_contrast_text_color(highlight_bg))
                .bg(highlight_bg)
                .add_modifier(Modifier::BOLD),
        ),
        None => (fit_hints(key_hints, max_width), Style::default().fg(fg_color).bg(bg_color)),
    };

    f.render_widget(Paragraph::new(content).style(style), area);
}

#[cfg(test)]
mod tests {
    use super::*;

    fn hints() -> Vec<String> {
        vec!["q: Quit".to_string(), "n: New".to_string(), "F1: Help".to_string()]
    }

    #[test]
    fn all_hints_fit_on_wide_bars() {
        assert_eq!(fit_hints(&hints(), 80), "q: Quit • n: New • F1: Help");
    }

    #[test]
    fn narrow_bars_end_with_ellipsis() {
        let text = fit_hints(&hints(), 20);
        assert_eq!(text, "q: Quit • n: New...");
        assert!(text.chars().count() <= 20);
    }
}
