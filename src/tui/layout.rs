use ratatui::layout::{Constraint, Layout as RatLayout, Margin, Rect};

/// Screen regions inside the outer border: tab bar, content, status line
pub struct Layout {
    pub inner_area: Rect,
    pub tabs_area: Rect,
    pub main_area: Rect,
    pub status_area: Rect,
}

impl Layout {
    /// Minimum inner terminal size: a usable list plus detail split and the status line
    pub const MIN_WIDTH: u16 = 40;
    pub const MIN_HEIGHT: u16 = 10;

    pub fn calculate(area: Rect) -> Self {
        let frame = Rect {
            width: area.width.max(Self::MIN_WIDTH + 2),
            height: area.height.max(Self::MIN_HEIGHT + 2),
            ..area
        };
        let inner_area = frame.inner(Margin::new(1, 1));

        let [tabs_area, main_area, status_area] =
            RatLayout::vertical([Constraint::Length(1), Constraint::Min(1), Constraint::Length(1)])
                .areas(inner_area);

        Self {
            inner_area,
            tabs_area,
            main_area,
            status_area,
        }
    }

    /// List on the left, detail pane on the right
    pub fn split_main(area: Rect, list_percent: u16) -> (Rect, Rect) {
        let list_width = ((area.width * list_percent) / 100).max(20).min(area.width.saturating_sub(10));
        let [list, detail] =
            RatLayout::horizontal([Constraint::Length(list_width), Constraint::Min(1)]).areas(area);
        (list, detail)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn small_terminals_are_clamped_to_minimum() {
        let layout = Layout::calculate(Rect::new(0, 0, 10, 5));
        assert_eq!(layout.inner_area.width, Layout::MIN_WIDTH);
        assert_eq!(layout.tabs_area.height, 1);
        assert_eq!(layout.status_area.height, 1);
        assert_eq!(layout.main_area.height, Layout::MIN_HEIGHT - 2);
    }

    #[test]
    fn main_split_leaves_room_for_detail() {
        let (list, detail) = Layout::split_main(Rect::new(0, 0, 100, 20), 40);
        assert_eq!(list.width, 40);
        assert_eq!(detail.width, 60);
    }
}
