mod scene;

use std::io::{self, Stdout};
use std::time::{Duration, Instant};

use anyhow::Result;
use crossterm::{
    event::{self, Event as CEvent, KeyCode, KeyEventKind},
    execute,
    terminal::{disable_raw_mode, enable_raw_mode, EnterAlternateScreen, LeaveAlternateScreen},
};
use ratatui::{backend::CrosstermBackend, Terminal};

use topo_config::AppConfig;
use topo_core::logging::{self, LogRing};
use topo_ui::{hud::render_hud, layout::hud_layout};

use scene::Scene;

const LOG_TAIL_HEIGHT: u16 = 8;

fn setup_terminal() -> Result<Terminal<CrosstermBackend<Stdout>>> {
    enable_raw_mode()?;
    let mut stdout = io::stdout();
    execute!(stdout, EnterAlternateScreen)?;
    let backend = CrosstermBackend::new(stdout);
    Ok(Terminal::new(backend)?)
}

fn restore_terminal(mut terminal: Terminal<CrosstermBackend<Stdout>>) -> Result<()> {
    disable_raw_mode()?;
    execute!(terminal.backend_mut(), LeaveAlternateScreen)?;
    terminal.show_cursor()?;
    Ok(())
}

fn main() -> Result<()> {
    let log_ring = logging::init();
    tracing::info!("topo starting up");

    let config = AppConfig::load()?;

    let mut terminal = setup_terminal()?;
    let res = run(&mut terminal, config, log_ring);
    restore_terminal(terminal)?;
    res
}

fn run(
    terminal: &mut Terminal<CrosstermBackend<Stdout>>,
    config: AppConfig,
    log_ring: LogRing,
) -> Result<()> {
    let tick_interval = Duration::from_millis(config.clock.tick_interval_ms);
    let size = terminal.size()?;
    let mut scene = Scene::new(config, size.width, size.height, Instant::now())?;
    scene.start();

    let mut last_tick = Instant::now();
    let res = loop {
        if scene.take_redraw() {
            let log_lines = if scene.debug() {
                log_ring.recent(usize::from(LOG_TAIL_HEIGHT))
            } else {
                Vec::new()
            };
            let view = scene.view(log_lines);
            let debug = scene.debug();
            terminal.draw(|f| {
                let rects = hud_layout(f.area(), debug, LOG_TAIL_HEIGHT);
                render_hud(f, rects, &view);
            })?;
        }

        let timeout = tick_interval.saturating_sub(last_tick.elapsed());
        if event::poll(timeout)? {
            match event::read()? {
                CEvent::Key(key) if key.kind == KeyEventKind::Press => match key.code {
                    KeyCode::Char('q') | KeyCode::Esc => break Ok(()),
                    KeyCode::Char('d') => scene.toggle_debug(),
                    _ => {}
                },
                CEvent::Resize(cols, rows) => scene.resize(cols, rows),
                _ => {}
            }
        }

        if last_tick.elapsed() >= tick_interval {
            last_tick = Instant::now();
            scene.tick(last_tick);
        }
    };

    scene.destroy();
    res
}
