use std::cell::RefCell;
use std::collections::BTreeMap;
use std::rc::Rc;

use serde_json::{json, Value};

use topo_config::ResourceSpec;
use topo_core::{Emitter, EventBus};

use crate::loader::Loader;

type Items = Rc<RefCell<BTreeMap<String, Value>>>;

/// Loaded assets, keyed by resource name.
///
/// Wraps a [`Loader`] and re-publishes its progress:
/// - `progress` with `[percent]` after every loaded file, percent being
///   `round(loaded / to_load * 100)`.
/// - `ready` once the loader reports `end`.
pub struct Resources {
    events: Rc<EventBus>,
    loader: Rc<Loader>,
    items: Items,
}

impl Default for Resources {
    fn default() -> Self {
        Self::new()
    }
}

impl Resources {
    pub fn new() -> Self {
        Self::with_loader(Loader::new())
    }

    pub fn with_loader(loader: Loader) -> Self {
        let events = Rc::new(EventBus::new());
        let loader = Rc::new(loader);
        let items: Items = Rc::default();

        {
            let events = Rc::clone(&events);
            let items = Rc::clone(&items);
            let loader_ref = Rc::downgrade(&loader);
            let wired = loader.events().on("fileEnd.resources", move |args| {
                let name = args
                    .first()
                    .and_then(|r| r["name"].as_str())
                    .unwrap_or_default()
                    .to_string();
                let data = args.get(1).cloned().unwrap_or(Value::Null);
                items.borrow_mut().insert(name, data);

                if let Some(loader) = loader_ref.upgrade() {
                    let percent = percent(loader.loaded(), loader.to_load());
                    let _ = events.trigger("progress", &[json!(percent)]);
                }
                None
            });
            if let Err(err) = wired {
                tracing::error!(error = %err, "failed to wire loader progress");
            }
        }

        {
            let events = Rc::clone(&events);
            let wired = loader.events().on("end.resources", move |_| {
                let _ = events.trigger("ready", &[]);
                None
            });
            if let Err(err) = wired {
                tracing::error!(error = %err, "failed to wire loader completion");
            }
        }

        Self {
            events,
            loader,
            items,
        }
    }

    /// Load `resources` through the wrapped loader.
    pub fn load(&self, resources: &[ResourceSpec]) {
        tracing::info!(count = resources.len(), "loading resources");
        self.loader.load(resources);
    }

    pub fn loader(&self) -> &Loader {
        &self.loader
    }

    pub fn item(&self, name: &str) -> Option<Value> {
        self.items.borrow().get(name).cloned()
    }

    pub fn items(&self) -> BTreeMap<String, Value> {
        self.items.borrow().clone()
    }

    /// Percentage of requested files loaded so far.
    pub fn progress(&self) -> u8 {
        percent(self.loader.loaded(), self.loader.to_load())
    }

    pub fn is_ready(&self) -> bool {
        self.loader.to_load() > 0 && self.loader.is_finished()
    }
}

impl Emitter for Resources {
    fn events(&self) -> &EventBus {
        &self.events
    }
}

fn percent(loaded: usize, to_load: usize) -> u8 {
    if to_load == 0 {
        return 0;
    }
    let ratio = (loaded as f64 / to_load as f64 * 100.0).round();
    ratio.clamp(0.0, 100.0) as u8
}
