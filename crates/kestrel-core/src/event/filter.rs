use crate::event::types::{BusEvent, EventKind, EventPriority};

/// A predicate over [`BusEvent`] fields.
///
/// Each populated constraint must hold for an event to match (AND
/// semantics); an empty filter matches everything. Matching is a pure
/// function of the event and the filter, with no side effects.
#[derive(Debug, Clone, Default)]
pub struct EventFilter {
    /// Match any of these kinds; empty means any kind.
    pub kinds: Vec<EventKind>,
    /// Match events at or above this priority.
    pub min_priority: Option<EventPriority>,
    /// Match any of these categories; empty means any category.
    pub categories: Vec<String>,
    /// Match any of these sources; empty means any source.
    pub sources: Vec<String>,
    /// Match any of these plugin instance ids; empty means any plugin.
    pub plugin_ids: Vec<String>,
    /// Inclusive Unix-timestamp lower bound.
    pub from_time: Option<i64>,
    /// Inclusive Unix-timestamp upper bound.
    pub to_time: Option<i64>,
    /// Require the presence (true) or absence (false) of an attached error.
    pub has_error: Option<bool>,
}

impl EventFilter {
    /// A filter with no constraints; matches every event.
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_kind(mut self, kind: EventKind) -> Self {
        self.kinds.push(kind);
        self
    }

    pub fn with_min_priority(mut self, priority: EventPriority) -> Self {
        self.min_priority = Some(priority);
        self
    }

    pub fn with_category(mut self, category: impl Into<String>) -> Self {
        self.categories.push(category.into());
        self
    }

    pub fn with_source(mut self, source: impl Into<String>) -> Self {
        self.sources.push(source.into());
        self
    }

    pub fn with_plugin_id(mut self, plugin_id: impl Into<String>) -> Self {
        self.plugin_ids.push(plugin_id.into());
        self
    }

    pub fn with_time_range(mut self, from: i64, to: i64) -> Self {
        self.from_time = Some(from);
        self.to_time = Some(to);
        self
    }

    pub fn with_error(mut self, has_error: bool) -> Self {
        self.has_error = Some(has_error);
        self
    }

    /// Whether the event satisfies every populated constraint.
    pub fn matches(&self, event: &BusEvent) -> bool {
        if !self.kinds.is_empty() && !self.kinds.contains(&event.kind) {
            return false;
        }
        if let Some(min) = self.min_priority {
            if event.priority < min {
                return false;
            }
        }
        if !self.categories.is_empty() && !self.categories.contains(&event.category) {
            return false;
        }
        if !self.sources.is_empty() && !self.sources.contains(&event.source) {
            return false;
        }
        if !self.plugin_ids.is_empty() && !self.plugin_ids.contains(&event.plugin_id) {
            return false;
        }
        if let Some(from) = self.from_time {
            if event.timestamp < from {
                return false;
            }
        }
        if let Some(to) = self.to_time {
            if event.timestamp > to {
                return false;
            }
        }
        if let Some(has_error) = self.has_error {
            if event.error.is_some() != has_error {
                return false;
            }
        }
        true
    }
}
