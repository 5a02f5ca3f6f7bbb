use std::cell::Cell;
use std::path::Path;

use anyhow::{Context, Result};
use image::GenericImageView;
use serde_json::{json, Value};

use topo_config::ResourceSpec;
use topo_core::{Emitter, EventBus};

/// Loads one kind of file.
///
/// The [`Loader`] picks the first registered action whose
/// [`extensions`](LoaderAction::extensions) contain the resource's extension.
pub trait LoaderAction {
    /// Lowercase extensions this action handles, without the dot.
    fn extensions(&self) -> &[&str];

    /// Load `resource` and describe the result.
    fn load(&self, resource: &ResourceSpec) -> Result<Value>;
}

/// Decodes images and reports their dimensions.
pub struct TextureAction;

impl LoaderAction for TextureAction {
    fn extensions(&self) -> &[&str] {
        &["jpg", "jpeg", "png"]
    }

    fn load(&self, resource: &ResourceSpec) -> Result<Value> {
        let texture = image::open(&resource.source)
            .with_context(|| format!("failed to decode texture {}", resource.source))?;
        let (width, height) = texture.dimensions();

        Ok(json!({
            "kind": "texture",
            "source": resource.source,
            "width": width,
            "height": height,
            "bytes": u64::from(width) * u64::from(height) * 4,
        }))
    }
}

/// Runs loader actions and reports progress on its bus.
///
/// Events:
/// - `fileEnd` with `[resource, data]` after each successful file.
/// - `fileError` with `[resource, message]` when a file cannot be loaded or
///   no action claims its extension.
/// - `end` once every requested file has settled.
pub struct Loader {
    events: EventBus,
    actions: Vec<Box<dyn LoaderAction>>,
    to_load: Cell<usize>,
    loaded: Cell<usize>,
    failed: Cell<usize>,
}

impl Default for Loader {
    fn default() -> Self {
        Self::new()
    }
}

impl Loader {
    /// A loader with the built-in texture action.
    pub fn new() -> Self {
        let mut loader = Self::empty();
        loader.add_action(Box::new(TextureAction));
        loader
    }

    /// A loader without any action.
    pub fn empty() -> Self {
        Self {
            events: EventBus::new(),
            actions: Vec::new(),
            to_load: Cell::new(0),
            loaded: Cell::new(0),
            failed: Cell::new(0),
        }
    }

    pub fn add_action(&mut self, action: Box<dyn LoaderAction>) {
        self.actions.push(action);
    }

    /// Queue and load `resources`, in order.
    ///
    /// Counters accumulate across calls, so a second batch extends the first.
    pub fn load(&self, resources: &[ResourceSpec]) {
        self.to_load.set(self.to_load.get() + resources.len());

        for resource in resources {
            let Some(extension) = extension_of(&resource.source) else {
                self.file_failed(resource, "missing file extension".to_string());
                continue;
            };

            let Some(action) = self
                .actions
                .iter()
                .find(|a| a.extensions().contains(&extension.as_str()))
            else {
                self.file_failed(resource, format!("no loader for .{extension} files"));
                continue;
            };

            match action.load(resource) {
                Ok(data) => self.file_loaded(resource, data),
                Err(err) => self.file_failed(resource, format!("{err:#}")),
            }
        }
    }

    pub fn to_load(&self) -> usize {
        self.to_load.get()
    }

    pub fn loaded(&self) -> usize {
        self.loaded.get()
    }

    pub fn failed(&self) -> usize {
        self.failed.get()
    }

    pub fn is_finished(&self) -> bool {
        self.loaded.get() + self.failed.get() == self.to_load.get()
    }

    fn file_loaded(&self, resource: &ResourceSpec, data: Value) {
        self.loaded.set(self.loaded.get() + 1);
        tracing::debug!(name = %resource.name, source = %resource.source, "file loaded");

        let _ = self.events.trigger("fileEnd", &[describe(resource), data]);
        self.settle();
    }

    fn file_failed(&self, resource: &ResourceSpec, message: String) {
        self.failed.set(self.failed.get() + 1);
        tracing::error!(
            name = %resource.name,
            source = %resource.source,
            error = %message,
            "cannot load resource"
        );

        let _ = self
            .events
            .trigger("fileError", &[describe(resource), Value::String(message)]);
        self.settle();
    }

    fn settle(&self) {
        if self.is_finished() {
            tracing::info!(
                loaded = self.loaded.get(),
                failed = self.failed.get(),
                "all resources settled"
            );
            let _ = self.events.trigger("end", &[]);
        }
    }
}

impl Emitter for Loader {
    fn events(&self) -> &EventBus {
        &self.events
    }
}

/// Lowercase extension of `source`, if it is purely alphabetic.
fn extension_of(source: &str) -> Option<String> {
    let file_name = Path::new(source).file_name()?.to_str()?;
    let (_, ext) = file_name.rsplit_once('.')?;
    if ext.is_empty() || !ext.chars().all(|c| c.is_ascii_alphabetic()) {
        return None;
    }
    Some(ext.to_ascii_lowercase())
}

fn describe(resource: &ResourceSpec) -> Value {
    json!({ "name": resource.name, "source": resource.source })
}
