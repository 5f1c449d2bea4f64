//! Analytics event logs
//!
//! Generic analytics events buffered with a two-tier priority.

use std::collections::BTreeMap;
use std::fmt;

use serde::{Deserialize, Serialize};

use crate::traits::LogRecord;

/// Identifier of a local learner profile
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct ProfileId(pub u32);

impl fmt::Display for ProfileId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "profile#{}", self.0)
    }
}

/// Priority of an analytics event
///
/// Under capacity pressure `Optional` events are evicted before any
/// `Essential` event.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum EventPriority {
    /// Must be kept as long as anything less important can be dropped
    Essential,
    /// Nice to have; first to go when the cache is full
    Optional,
}

/// Structured payload of an analytics event
///
/// The pipeline treats this as opaque: it is stored, evicted and uploaded
/// as a unit.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct EventContext {
    /// Event kind, e.g. `open_lesson`
    pub kind: String,
    /// Event-specific attributes
    pub attributes: BTreeMap<String, String>,
}

impl EventContext {
    /// Create a context with no attributes
    pub fn new(kind: impl Into<String>) -> Self {
        Self {
            kind: kind.into(),
            attributes: BTreeMap::new(),
        }
    }

    /// Add an attribute
    pub fn with_attribute(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.attributes.insert(key.into(), value.into());
        self
    }
}

/// A buffered analytics event
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct EventLog {
    /// Milliseconds since the Unix epoch
    pub timestamp: i64,
    pub priority: EventPriority,
    pub context: EventContext,
    /// Profile the event was logged under, if any
    pub profile_id: Option<ProfileId>,
}

impl EventLog {
    /// Create a new event log
    pub fn new(
        timestamp: i64,
        priority: EventPriority,
        context: EventContext,
        profile_id: Option<ProfileId>,
    ) -> Self {
        Self {
            timestamp,
            priority,
            context,
            profile_id,
        }
    }
}

impl LogRecord for EventLog {
    fn timestamp_millis(&self) -> i64 {
        self.timestamp
    }
}
