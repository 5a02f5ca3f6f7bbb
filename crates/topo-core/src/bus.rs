use std::cell::RefCell;
use std::fmt;
use std::rc::Rc;

use serde_json::Value;

use crate::name::{parse_names, EventName};

/// A listener callback. Receives the positional arguments of a dispatch and
/// may answer with a value.
pub type Listener<T = Value> = Rc<dyn Fn(&[T]) -> Option<T>>;

/// Caller errors reported by the bus.
///
/// Every error is also emitted as a `warn` diagnostic; the registry is never
/// modified by a call that returns an error.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum BusError {
    /// The name list was empty or contained no usable names.
    InvalidNames(String),
    /// An exact-namespace dispatch had no event value (`".camera"`).
    MissingValue { namespace: String },
}

impl fmt::Display for BusError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::InvalidNames(raw) => write!(f, "invalid event names: {raw:?}"),
            Self::MissingValue { namespace } => {
                write!(f, "missing event value for namespace {namespace:?}")
            }
        }
    }
}

impl std::error::Error for BusError {}

struct Slot<T> {
    value: String,
    listeners: Vec<Listener<T>>,
}

struct Namespace<T> {
    name: String,
    slots: Vec<Slot<T>>,
}

impl<T> Namespace<T> {
    fn slot(&self, value: &str) -> Option<&Slot<T>> {
        self.slots.iter().find(|s| s.value == value)
    }

    fn remove_slot(&mut self, value: &str) -> bool {
        let before = self.slots.len();
        self.slots.retain(|s| s.value != value);
        self.slots.len() != before
    }
}

/// namespace -> value -> listeners, all in first-insertion order.
struct Registry<T> {
    namespaces: Vec<Namespace<T>>,
}

impl<T> Registry<T> {
    fn new() -> Self {
        Self {
            namespaces: Vec::new(),
        }
    }

    fn namespace(&self, name: &str) -> Option<&Namespace<T>> {
        self.namespaces.iter().find(|ns| ns.name == name)
    }

    fn push(&mut self, name: &EventName, listener: Listener<T>) {
        let idx = match self.namespaces.iter().position(|ns| ns.name == name.namespace) {
            Some(idx) => idx,
            None => {
                self.namespaces.push(Namespace {
                    name: name.namespace.clone(),
                    slots: Vec::new(),
                });
                self.namespaces.len() - 1
            }
        };

        let namespace = &mut self.namespaces[idx];
        match namespace.slots.iter_mut().find(|s| s.value == name.value) {
            Some(slot) => slot.listeners.push(listener),
            None => namespace.slots.push(Slot {
                value: name.value.clone(),
                listeners: vec![listener],
            }),
        }
    }

    fn remove_namespace(&mut self, name: &str) -> bool {
        let before = self.namespaces.len();
        self.namespaces.retain(|ns| ns.name != name);
        self.namespaces.len() != before
    }

    /// Remove `value` from the listed namespaces, then prune the ones left
    /// empty. Targets are collected before anything is deleted.
    fn remove_value_in(&mut self, targets: &[String], value: &str) -> usize {
        let mut removed = 0;
        for ns in self
            .namespaces
            .iter_mut()
            .filter(|ns| targets.contains(&ns.name))
        {
            if ns.remove_slot(value) {
                removed += 1;
            }
        }
        self.namespaces.retain(|ns| !ns.slots.is_empty());
        removed
    }

    fn namespaces_defining(&self, value: &str) -> Vec<String> {
        self.namespaces
            .iter()
            .filter(|ns| ns.slot(value).is_some())
            .map(|ns| ns.name.clone())
            .collect()
    }

    fn snapshot(&self, name: &EventName) -> Vec<Listener<T>> {
        if name.is_base() {
            self.namespaces
                .iter()
                .filter_map(|ns| ns.slot(&name.value))
                .flat_map(|slot| slot.listeners.iter().cloned())
                .collect()
        } else {
            self.namespace(&name.namespace)
                .and_then(|ns| ns.slot(&name.value))
                .map(|slot| slot.listeners.clone())
                .unwrap_or_default()
        }
    }
}

/// A namespaced, synchronous, multicast event bus.
///
/// Listeners are registered under `value` or `value.namespace` names and run
/// in-line when a matching name is triggered:
///
/// - `trigger("tick")` runs every `tick` listener in every namespace,
///   namespaces in first-registration order, listeners in insertion order.
/// - `trigger("tick.camera")` runs only the `tick` listeners in `camera`.
///
/// The first listener to answer with `Some` supplies the dispatch result;
/// later listeners still run. Listeners may call back into the bus that is
/// dispatching them: the listener set is snapshotted before the first call,
/// so changes only affect later dispatches.
pub struct EventBus<T = Value> {
    registry: RefCell<Registry<T>>,
}

impl<T> Default for EventBus<T> {
    fn default() -> Self {
        Self::new()
    }
}

impl<T> fmt::Debug for EventBus<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let registry = self.registry.borrow();
        let namespaces: Vec<&str> = registry
            .namespaces
            .iter()
            .map(|ns| ns.name.as_str())
            .collect();
        f.debug_struct("EventBus")
            .field("namespaces", &namespaces)
            .finish()
    }
}

impl<T> EventBus<T> {
    /// Create a bus with an empty registry.
    pub fn new() -> Self {
        Self {
            registry: RefCell::new(Registry::new()),
        }
    }

    /// Register `listener` under every name in `names`.
    ///
    /// `names` is a list such as `"resize/tick.camera"`. The same listener is
    /// appended once per resolved name; registering twice means being called
    /// twice. Names with an empty value (`".camera"`) cannot be dispatched and
    /// are skipped with a warning; a list made only of such names is rejected.
    pub fn on<F>(&self, names: &str, listener: F) -> Result<&Self, BusError>
    where
        F: Fn(&[T]) -> Option<T> + 'static,
    {
        let resolved = resolve(names)?;
        if resolved.iter().all(|name| name.value.is_empty()) {
            let err = BusError::InvalidNames(names.to_string());
            tracing::warn!(error = %err, "no event value to register under");
            return Err(err);
        }
        let listener: Listener<T> = Rc::new(listener);

        let mut registry = self.registry.borrow_mut();
        for name in &resolved {
            if name.value.is_empty() {
                tracing::warn!(
                    names,
                    namespace = %name.namespace,
                    "skipping listener without event value"
                );
                continue;
            }
            registry.push(name, Rc::clone(&listener));
            tracing::trace!(event = %name, "listener registered");
        }

        Ok(self)
    }

    /// Remove listeners.
    ///
    /// - `"tick.camera"` removes `tick` from `camera` only.
    /// - `"tick"` removes `tick` from every namespace.
    /// - `".camera"` removes the whole `camera` namespace.
    ///
    /// Namespaces left without any event are pruned. Removing something that
    /// is not registered is a no-op.
    pub fn off(&self, names: &str) -> Result<&Self, BusError> {
        let resolved = resolve(names)?;

        let mut registry = self.registry.borrow_mut();
        for name in &resolved {
            if name.is_whole_namespace() {
                if registry.remove_namespace(&name.namespace) {
                    tracing::debug!(namespace = %name.namespace, "namespace removed");
                }
                continue;
            }

            let targets = if name.is_base() {
                registry.namespaces_defining(&name.value)
            } else {
                vec![name.namespace.clone()]
            };
            let removed = registry.remove_value_in(&targets, &name.value);
            if removed > 0 {
                tracing::debug!(event = %name, namespaces = removed, "listeners removed");
            }
        }

        Ok(self)
    }

    /// Dispatch `name` with positional `args` and return the first answer.
    ///
    /// Only the first name of a list is dispatched; the rest are ignored.
    /// Returns `Ok(None)` when no listener answered or none is registered.
    pub fn trigger(&self, name: &str, args: &[T]) -> Result<Option<T>, BusError> {
        let resolved = resolve(name)?;
        if resolved.len() > 1 {
            tracing::debug!(names = name, "trigger only dispatches the first name");
        }
        let target = &resolved[0];

        if !target.is_base() && target.value.is_empty() {
            let err = BusError::MissingValue {
                namespace: target.namespace.clone(),
            };
            tracing::warn!(error = %err, "trigger aborted");
            return Err(err);
        }

        // Release the borrow before calling out so listeners may use the bus.
        let listeners = self.registry.borrow().snapshot(target);

        let mut answer = None;
        for listener in &listeners {
            let out = listener(args);
            if answer.is_none() {
                answer = out;
            }
        }

        Ok(answer)
    }

    /// Number of listeners `trigger(name, ..)` would call right now.
    pub fn listener_count(&self, name: &str) -> usize {
        match parse_names(name).first() {
            Some(target) => self.registry.borrow().snapshot(target).len(),
            None => 0,
        }
    }

    pub fn has_listeners(&self, name: &str) -> bool {
        self.listener_count(name) > 0
    }

    /// Registered namespaces, in first-registration order.
    pub fn namespaces(&self) -> Vec<String> {
        self.registry
            .borrow()
            .namespaces
            .iter()
            .map(|ns| ns.name.clone())
            .collect()
    }

    /// Event values registered in `namespace`, in first-registration order.
    pub fn events_in(&self, namespace: &str) -> Vec<String> {
        self.registry
            .borrow()
            .namespace(namespace)
            .map(|ns| ns.slots.iter().map(|s| s.value.clone()).collect())
            .unwrap_or_default()
    }

    pub fn is_empty(&self) -> bool {
        self.registry.borrow().namespaces.is_empty()
    }
}

fn resolve(names: &str) -> Result<Vec<EventName>, BusError> {
    let resolved = parse_names(names);
    if resolved.is_empty() {
        let err = BusError::InvalidNames(names.to_string());
        tracing::warn!(error = %err, "rejected event names");
        return Err(err);
    }
    Ok(resolved)
}
