use serde_json::Value;

use crate::bus::{BusError, EventBus};

/// Something that owns an [`EventBus`] and lets callers subscribe to it.
///
/// The frame clock, the viewport tracker and the asset loaders all expose
/// their events this way: implement [`events`](Emitter::events) and the
/// `on`/`off`/`trigger` pass-throughs come for free.
pub trait Emitter {
    fn events(&self) -> &EventBus<Value>;

    fn on<F>(&self, names: &str, listener: F) -> Result<&Self, BusError>
    where
        Self: Sized,
        F: Fn(&[Value]) -> Option<Value> + 'static,
    {
        self.events().on(names, listener)?;
        Ok(self)
    }

    fn off(&self, names: &str) -> Result<&Self, BusError>
    where
        Self: Sized,
    {
        self.events().off(names)?;
        Ok(self)
    }

    fn trigger(&self, name: &str, args: &[Value]) -> Result<Option<Value>, BusError> {
        self.events().trigger(name, args)
    }
}
