use std::fmt;

/// Namespace used when an event name carries no qualifier.
pub const BASE_NAMESPACE: &str = "base";

/// A resolved `value.namespace` pair.
///
/// `"tick"` resolves to value `tick` in the [`BASE_NAMESPACE`];
/// `"tick.camera"` resolves to value `tick` in namespace `camera`;
/// `".camera"` resolves to an empty value in namespace `camera`, which
/// [`EventBus::off`](crate::bus::EventBus::off) treats as "the whole namespace".
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct EventName {
    pub value: String,
    pub namespace: String,
}

impl EventName {
    /// Resolve a single name. Segments past the second `.` are ignored and an
    /// empty namespace segment falls back to `base`.
    pub fn parse(name: &str) -> Self {
        let mut segments = name.split('.');
        let value = segments.next().unwrap_or_default();
        let namespace = segments
            .next()
            .filter(|ns| !ns.is_empty())
            .unwrap_or(BASE_NAMESPACE);

        Self {
            value: value.to_string(),
            namespace: namespace.to_string(),
        }
    }

    pub fn is_base(&self) -> bool {
        self.namespace == BASE_NAMESPACE
    }

    /// True for the bare-namespace form (`.ns`) that addresses a whole
    /// non-base namespace.
    pub fn is_whole_namespace(&self) -> bool {
        !self.is_base() && self.value.is_empty()
    }
}

impl fmt::Display for EventName {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.is_base() {
            write!(f, "{}", self.value)
        } else {
            write!(f, "{}.{}", self.value, self.namespace)
        }
    }
}

/// Resolve a name list such as `"resize/tick.camera, end"`.
///
/// Characters outside `[A-Za-z0-9,/.]` are stripped, then the input is split
/// on runs of `,` and `/`. Empty tokens left behind by leading or trailing
/// separators are dropped.
pub fn parse_names(names: &str) -> Vec<EventName> {
    let cleaned: String = names
        .chars()
        .filter(|c| c.is_ascii_alphanumeric() || matches!(c, ',' | '/' | '.'))
        .collect();

    cleaned
        .split([',', '/'])
        .filter(|token| !token.is_empty())
        .map(EventName::parse)
        .collect()
}
