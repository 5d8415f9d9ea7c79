//! Wire envelope for lifecycle events.
//!
//! Field names are camelCase on the wire, event types and statuses are
//! SCREAMING_SNAKE, and timestamps are UTC at second precision. Unknown
//! fields — top-level or nested — are ignored on read so the schema can
//! grow without breaking older consumers.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use batchpipe_core::{BatchStatus, Metadata, Outcome};

/// Lifecycle event type.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum EventType {
    #[serde(rename = "OBJECT_CREATED")]
    ObjectCreated,
    #[serde(rename = "OBJECT_UPDATED")]
    ObjectUpdated,
    #[serde(rename = "ITEM_CREATED")]
    ItemCreated,
    #[serde(rename = "ITEM_UPDATED")]
    ItemUpdated,
}

impl EventType {
    pub fn is_item(self) -> bool {
        matches!(self, Self::ItemCreated | Self::ItemUpdated)
    }

    /// Audit action derived from the event type.
    pub fn action(self) -> &'static str {
        match self {
            Self::ObjectCreated | Self::ItemCreated => "CREATED",
            Self::ObjectUpdated | Self::ItemUpdated => "UPDATED",
        }
    }
}

/// Class of object a payload describes.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum ObjectType {
    #[serde(rename = "batch")]
    Batch,
    #[serde(rename = "item")]
    Item,
}

impl ObjectType {
    pub fn is_batch(self) -> bool {
        matches!(self, Self::Batch)
    }

    pub fn is_item(self) -> bool {
        matches!(self, Self::Item)
    }

    pub fn as_str(self) -> &'static str {
        match self {
            Self::Batch => "batch",
            Self::Item => "item",
        }
    }
}

impl core::fmt::Display for ObjectType {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// One lifecycle event as published to the stream.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct BatchEvent {
    pub event_type: EventType,
    #[serde(with = "wire_time")]
    pub timestamp: DateTime<Utc>,
    pub payload: BatchPayload,
}

/// State of a batch or item object at the moment of emission.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct BatchPayload {
    pub object_id: String,
    pub object_type: ObjectType,
    pub status: BatchStatus,
    pub outcome: Outcome,
    pub metadata: Metadata,
    #[serde(with = "wire_time")]
    pub created: DateTime<Utc>,
    #[serde(with = "wire_time")]
    pub updated: DateTime<Utc>,
}

impl BatchPayload {
    /// Parent object id: items point at their batch through metadata,
    /// batches are their own parent.
    pub fn parent_id(&self) -> &str {
        if self.object_type.is_item() {
            if let Some(parent) = self.metadata.get(batchpipe_core::metadata::keys::PARENT_ID) {
                return parent;
            }
        }
        &self.object_id
    }
}

/// Second-precision UTC timestamps (`2024-05-01T12:30:45Z`).
mod wire_time {
    use chrono::{DateTime, NaiveDateTime, Utc};
    use serde::{Deserialize, Deserializer, Serializer, de};

    const FORMAT: &str = "%Y-%m-%dT%H:%M:%SZ";

    pub fn serialize<S>(ts: &DateTime<Utc>, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: Serializer,
    {
        serializer.serialize_str(&ts.format(FORMAT).to_string())
    }

    pub fn deserialize<'de, D>(deserializer: D) -> Result<DateTime<Utc>, D::Error>
    where
        D: Deserializer<'de>,
    {
        let raw = String::deserialize(deserializer)?;
        let naive = NaiveDateTime::parse_from_str(&raw, FORMAT).map_err(de::Error::custom)?;
        Ok(naive.and_utc())
    }
}
