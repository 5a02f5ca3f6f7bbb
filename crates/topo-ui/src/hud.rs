use std::time::Duration;

use ratatui::{
    layout::{Constraint, Direction, Layout, Rect},
    style::{Color, Style},
    symbols::Marker,
    text::{Line, Span},
    widgets::{
        canvas::{Canvas, Circle, Points},
        Block, Borders, LineGauge, Paragraph,
    },
    Frame,
};

use topo_core::logging::LogLine;
use topo_core::sizes::Viewport;

use crate::layout::HudRects;

/// Loading state as reported by the resource events.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Loading {
    pub percent: u8,
    pub ready: bool,
    pub failed: usize,
}

/// Everything the HUD shows for one frame.
pub struct HudView<'a> {
    pub title: &'a str,
    pub clear_color: Color,
    /// Orbit angle of the camera around the scene origin, in radians.
    pub orbit_angle: f64,
    pub frame: u64,
    pub fps: f64,
    pub elapsed: Duration,
    pub delta: Duration,
    pub viewport: Viewport,
    pub loading: Loading,
    pub log_lines: Vec<LogLine>,
    /// Listener count per event, shown next to the log tail.
    pub listeners: Vec<(&'static str, usize)>,
}

pub fn render_hud(f: &mut Frame, rects: HudRects, view: &HudView<'_>) {
    let top = Paragraph::new(Line::from(format!(
        "TOPO | {} | frame {}",
        view.title, view.frame
    )))
    .style(Style::default().fg(Color::Black).bg(Color::Magenta));
    f.render_widget(top, rects.top);

    render_scene(f, rects.scene, view);
    render_status(f, rects.status, view);

    if rects.log.height > 0 {
        render_log(f, rects.log, &view.log_lines, &view.listeners);
    }
}

/// A stand-in for the 3D scene: a ring with a marker orbiting it. The
/// x-range follows the viewport aspect so the ring stays round.
fn render_scene(f: &mut Frame, area: Rect, view: &HudView<'_>) {
    let aspect = if view.viewport.aspect() > 0.0 {
        view.viewport.aspect()
    } else {
        1.0
    };
    let (sin, cos) = view.orbit_angle.sin_cos();
    let marker = [(cos * 0.8, sin * 0.8)];

    let canvas = Canvas::default()
        .block(Block::default().borders(Borders::ALL).title("SCENE"))
        .background_color(view.clear_color)
        .marker(Marker::Braille)
        .x_bounds([-aspect, aspect])
        .y_bounds([-1.0, 1.0])
        .paint(move |ctx| {
            ctx.draw(&Circle {
                x: 0.0,
                y: 0.0,
                radius: 0.8,
                color: Color::Magenta,
            });
            ctx.draw(&Points {
                coords: &marker,
                color: Color::Yellow,
            });
            ctx.print(
                marker[0].0,
                marker[0].1,
                Span::styled("o", Style::default().fg(Color::Yellow)),
            );
        });
    f.render_widget(canvas, area);
}

fn render_status(f: &mut Frame, area: Rect, view: &HudView<'_>) {
    let block = Block::default().borders(Borders::ALL).title("STATUS");
    let inner = block.inner(area);
    f.render_widget(block, area);

    let cols = Layout::default()
        .direction(Direction::Horizontal)
        .constraints([Constraint::Percentage(60), Constraint::Percentage(40)])
        .split(inner);

    let clock = Line::from(vec![
        Span::raw(format!("FPS {:>5.1}", view.fps)),
        Span::raw(format!("  dt {:>3}ms", view.delta.as_millis())),
        Span::raw(format!("  t {:.1}s", view.elapsed.as_secs_f64())),
        Span::raw(format!(
            "  {}x{} @{:.1}x",
            view.viewport.width, view.viewport.height, view.viewport.pixel_ratio
        )),
    ]);
    f.render_widget(Paragraph::new(clock), cols[0]);

    let label = loading_label(&view.loading);
    let gauge = LineGauge::default()
        .filled_style(Style::default().fg(loading_color(&view.loading)))
        .unfilled_style(Style::default().fg(Color::DarkGray))
        .label(label)
        .ratio(f64::from(view.loading.percent.min(100)) / 100.0);
    f.render_widget(gauge, cols[1]);
}

fn render_log(f: &mut Frame, area: Rect, lines: &[LogLine], listeners: &[(&str, usize)]) {
    let visible = usize::from(area.height.saturating_sub(2));
    let skip = lines.len().saturating_sub(visible);
    let text: Vec<Line> = lines
        .iter()
        .skip(skip)
        .map(|line| Line::styled(line.to_string(), Style::default().fg(level_color(line))))
        .collect();

    let mut title = String::from("LOG");
    for (event, count) in listeners {
        title.push_str(&format!(" | {event}:{count}"));
    }

    let log = Paragraph::new(text).block(Block::default().borders(Borders::ALL).title(title));
    f.render_widget(log, area);
}

fn loading_label(loading: &Loading) -> String {
    match (loading.ready, loading.failed) {
        (true, 0) => "READY".to_string(),
        (true, failed) => format!("READY ({failed} failed)"),
        (false, _) => format!("LOADING {:>3}%", loading.percent),
    }
}

fn loading_color(loading: &Loading) -> Color {
    if loading.failed > 0 {
        Color::Yellow
    } else if loading.ready {
        Color::Green
    } else {
        Color::Cyan
    }
}

fn level_color(line: &LogLine) -> Color {
    match line.level.as_str() {
        "ERROR" => Color::Red,
        "WARN" => Color::Yellow,
        "INFO" => Color::White,
        _ => Color::DarkGray,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::layout::hud_layout;
    use ratatui::{backend::TestBackend, Terminal};

    fn view(loading: Loading, log_lines: Vec<LogLine>) -> HudView<'static> {
        view_with_listeners(loading, log_lines, Vec::new())
    }

    fn view_with_listeners(
        loading: Loading,
        log_lines: Vec<LogLine>,
        listeners: Vec<(&'static str, usize)>,
    ) -> HudView<'static> {
        HudView {
            title: "demo",
            clear_color: Color::Rgb(8, 0, 31),
            orbit_angle: 0.5,
            frame: 42,
            fps: 59.9,
            elapsed: Duration::from_millis(1500),
            delta: Duration::from_millis(16),
            viewport: Viewport {
                width: 80,
                height: 24,
                pixel_ratio: 1.0,
            },
            loading,
            log_lines,
            listeners,
        }
    }

    fn render_text(width: u16, height: u16, debug: bool, view: &HudView<'_>) -> String {
        let backend = TestBackend::new(width, height);
        let mut terminal = Terminal::new(backend).unwrap();
        terminal
            .draw(|f| {
                let rects = hud_layout(f.area(), debug, 6);
                render_hud(f, rects, view);
            })
            .unwrap();
        terminal
            .backend()
            .buffer()
            .content()
            .iter()
            .map(|c| c.symbol().to_string())
            .collect()
    }

    #[test]
    fn shows_title_clock_and_loading() {
        let text = render_text(100, 24, false, &view(Loading::default(), Vec::new()));
        assert!(text.contains("TOPO | demo | frame 42"));
        assert!(text.contains("FPS"));
        assert!(text.contains("LOADING"));
        assert!(text.contains("SCENE"));
        assert!(!text.contains("LOG"));
    }

    #[test]
    fn debug_shows_log_tail() {
        let lines = vec![LogLine {
            level: tracing_level_warn(),
            target: "topo_core::bus".into(),
            message: "rejected event names".into(),
        }];
        let text = render_text(100, 24, true, &view(Loading::default(), lines));
        assert!(text.contains("LOG"));
        assert!(text.contains("rejected event names"));
    }

    #[test]
    fn debug_log_title_lists_listener_counts() {
        let listeners = vec![("tick", 2), ("resize", 2)];
        let debug_view = view_with_listeners(Loading::default(), Vec::new(), listeners.clone());
        let text = render_text(100, 24, true, &debug_view);
        assert!(text.contains("LOG | tick:2 | resize:2"));

        let hidden = view_with_listeners(Loading::default(), Vec::new(), listeners);
        assert!(!render_text(100, 24, false, &hidden).contains("tick:2"));
    }

    #[test]
    fn no_panic_on_tiny_screen() {
        let _ = render_text(4, 4, true, &view(Loading::default(), Vec::new()));
    }

    #[test]
    fn labels_follow_loading_state() {
        assert_eq!(loading_label(&Loading::default()), "LOADING   0%");
        let ready = Loading {
            percent: 100,
            ready: true,
            failed: 0,
        };
        assert_eq!(loading_label(&ready), "READY");
        let partial = Loading {
            percent: 50,
            ready: true,
            failed: 1,
        };
        assert_eq!(loading_label(&partial), "READY (1 failed)");
        assert_eq!(loading_color(&partial), Color::Yellow);
    }

    fn tracing_level_warn() -> topo_core::logging::Level {
        topo_core::logging::Level::WARN
    }
}
