use std::collections::VecDeque;
use std::fmt;
use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex};
use std::time::{Duration, SystemTime};

use tracing::field::{Field, Visit};
pub use tracing::Level;
use tracing_appender::rolling;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt, EnvFilter, Layer};

const LOG_FILE_PREFIX: &str = "topo.log";
const RING_CAPACITY: usize = 200;
const RETENTION: Duration = Duration::from_secs(7 * 86_400);

/// One captured diagnostic, as shown in the debug HUD.
#[derive(Debug, Clone, PartialEq)]
pub struct LogLine {
    pub level: Level,
    pub target: String,
    pub message: String,
}

impl fmt::Display for LogLine {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{:>5} {}", self.level.as_str(), self.message)
    }
}

/// Bounded, shareable buffer of the most recent [`LogLine`]s.
#[derive(Debug, Clone)]
pub struct LogRing {
    lines: Arc<Mutex<VecDeque<LogLine>>>,
    capacity: usize,
}

impl LogRing {
    pub fn new(capacity: usize) -> Self {
        Self {
            lines: Arc::new(Mutex::new(VecDeque::with_capacity(capacity))),
            capacity,
        }
    }

    pub fn push(&self, line: LogLine) {
        if let Ok(mut lines) = self.lines.lock() {
            while lines.len() >= self.capacity.max(1) {
                lines.pop_front();
            }
            lines.push_back(line);
        }
    }

    /// The newest `n` lines, oldest first.
    pub fn recent(&self, n: usize) -> Vec<LogLine> {
        match self.lines.lock() {
            Ok(lines) => {
                let skip = lines.len().saturating_sub(n);
                lines.iter().skip(skip).cloned().collect()
            }
            Err(_) => Vec::new(),
        }
    }

    pub fn len(&self) -> usize {
        self.lines.lock().map(|l| l.len()).unwrap_or(0)
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

/// Directory for rolling log files.
///
/// `TOPO_LOG_DIR` wins; otherwise the platform data directory
/// (`~/.local/share/topo/logs`, `~/Library/Application Support/topo/logs`),
/// falling back to `./logs`.
pub fn log_dir() -> PathBuf {
    if let Some(dir) = std::env::var_os("TOPO_LOG_DIR") {
        return PathBuf::from(dir);
    }
    dirs::data_dir()
        .map(|data| data.join("topo").join("logs"))
        .unwrap_or_else(|| PathBuf::from("logs"))
}

/// Delete rolled log files older than `max_age`. Only files carrying our
/// prefix are touched.
fn prune_stale_logs(dir: &Path, max_age: Duration) -> usize {
    let Some(cutoff) = SystemTime::now().checked_sub(max_age) else {
        return 0;
    };
    let Ok(entries) = std::fs::read_dir(dir) else {
        return 0;
    };

    let mut removed = 0;
    for entry in entries.flatten() {
        if !entry.file_name().to_string_lossy().starts_with(LOG_FILE_PREFIX) {
            continue;
        }
        let stale = entry
            .metadata()
            .and_then(|meta| meta.modified())
            .map(|modified| modified <= cutoff)
            .unwrap_or(false);
        if stale && std::fs::remove_file(entry.path()).is_ok() {
            removed += 1;
        }
    }
    removed
}

/// Tracing layer that copies every event into a [`LogRing`].
struct RingLayer {
    ring: LogRing,
}

impl<S: tracing::Subscriber> Layer<S> for RingLayer {
    fn on_event(
        &self,
        event: &tracing::Event<'_>,
        _ctx: tracing_subscriber::layer::Context<'_, S>,
    ) {
        let mut fields = FieldCollector::default();
        event.record(&mut fields);

        self.ring.push(LogLine {
            level: *event.metadata().level(),
            target: event.metadata().target().to_string(),
            message: fields.into_message(),
        });
    }
}

#[derive(Default)]
struct FieldCollector {
    message: String,
    extra: Vec<String>,
}

impl FieldCollector {
    fn into_message(self) -> String {
        let mut parts = Vec::with_capacity(self.extra.len() + 1);
        if !self.message.is_empty() {
            parts.push(self.message);
        }
        parts.extend(self.extra);
        parts.join(" ")
    }
}

impl Visit for FieldCollector {
    fn record_str(&mut self, field: &Field, value: &str) {
        if field.name() == "message" {
            self.message = value.to_string();
        } else {
            self.extra.push(format!("{}={}", field.name(), value));
        }
    }

    fn record_debug(&mut self, field: &Field, value: &dyn fmt::Debug) {
        if field.name() == "message" {
            self.message = format!("{value:?}");
        } else {
            self.extra.push(format!("{}={:?}", field.name(), value));
        }
    }
}

/// Install the global subscriber and return the ring the HUD reads from.
///
/// Filter: `TOPO_LOG`, then `RUST_LOG`, then `info`. Files roll daily in
/// [`log_dir`] and are kept for a week. Installing twice keeps the first
/// subscriber.
pub fn init() -> LogRing {
    let ring = LogRing::new(RING_CAPACITY);

    let filter = EnvFilter::try_from_env("TOPO_LOG")
        .or_else(|_| EnvFilter::try_from_env("RUST_LOG"))
        .unwrap_or_else(|_| EnvFilter::new("info"));

    let dir = log_dir();
    if let Err(err) = std::fs::create_dir_all(&dir) {
        eprintln!("warning: cannot create log directory {}: {err}", dir.display());
    }
    prune_stale_logs(&dir, RETENTION);

    let file_layer = tracing_subscriber::fmt::layer()
        .with_writer(rolling::daily(&dir, LOG_FILE_PREFIX))
        .with_ansi(false)
        .with_target(true);

    let installed = tracing_subscriber::registry()
        .with(filter)
        .with(file_layer)
        .with(RingLayer { ring: ring.clone() })
        .try_init();
    if let Err(err) = installed {
        eprintln!("warning: logging already initialised: {err}");
    }

    ring
}
