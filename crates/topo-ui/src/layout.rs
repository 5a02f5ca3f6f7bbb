use ratatui::layout::{Constraint, Direction, Layout, Rect};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct HudRects {
    pub top: Rect,
    pub scene: Rect,
    pub status: Rect,
    /// Log tail; zero-sized unless debug mode is on.
    pub log: Rect,
}

/// Split the screen into a title bar, the scene, a status strip and, in debug
/// mode, a log tail. The scene always keeps at least one row.
pub fn hud_layout(area: Rect, debug: bool, log_height: u16) -> HudRects {
    let log_height = if debug {
        log_height.min(area.height.saturating_sub(5))
    } else {
        0
    };

    let rows = Layout::default()
        .direction(Direction::Vertical)
        .constraints([
            Constraint::Length(1),          // title
            Constraint::Min(1),             // scene
            Constraint::Length(3),          // status
            Constraint::Length(log_height), // log
        ])
        .split(area);

    HudRects {
        top: rows[0],
        scene: rows[1],
        status: rows[2],
        log: rows[3],
    }
}
