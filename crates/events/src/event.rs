use chrono::{DateTime, Utc};

/// A domain-agnostic event.
///
/// Events are facts about something that already happened and was persisted
/// (e.g. a production run being recorded). They are never mutated after being
/// emitted.
pub trait Event: Clone + core::fmt::Debug + Send + Sync + 'static {
    /// Stable event name/type identifier (e.g. "production.run.produced").
    fn event_type(&self) -> &'static str;

    /// Schema version for this event type.
    fn version(&self) -> u32;

    /// When the event occurred (business time).
    fn occurred_at(&self) -> DateTime<Utc>;
}
