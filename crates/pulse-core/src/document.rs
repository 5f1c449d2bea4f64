//! Durable cloud-sync documents
//!
//! Documents have no priority: under capacity pressure the globally
//! oldest document is dropped.

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

use crate::event::ProfileId;
use crate::traits::LogRecord;

/// Structured payload of a cloud-sync document
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DocumentContext {
    /// Remote collection the document is written to
    pub collection: String,
    /// Document fields
    pub fields: BTreeMap<String, String>,
}

impl DocumentContext {
    /// Create an empty document for a collection
    pub fn new(collection: impl Into<String>) -> Self {
        Self {
            collection: collection.into(),
            fields: BTreeMap::new(),
        }
    }

    /// Add a field
    pub fn with_field(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.fields.insert(key.into(), value.into());
        self
    }
}

/// A buffered cloud-sync document
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DocumentLog {
    /// Milliseconds since the Unix epoch
    pub timestamp: i64,
    pub context: DocumentContext,
    pub profile_id: Option<ProfileId>,
}

impl DocumentLog {
    pub fn new(timestamp: i64, context: DocumentContext, profile_id: Option<ProfileId>) -> Self {
        Self {
            timestamp,
            context,
            profile_id,
        }
    }
}

impl LogRecord for DocumentLog {
    fn timestamp_millis(&self) -> i64 {
        self.timestamp
    }
}
