//! Item event derivation.
//!
//! Every batch event fans out into one event per item. Items inherit the
//! batch metadata, carry their cent-exact share of the batch amount, and
//! mirror the batch status and outcome. The derived set is checked
//! against the batch total before it is returned.

use chrono::{DateTime, Utc};
use tracing::debug;

use batchpipe_core::metadata::keys;
use batchpipe_core::{DomainError, DomainResult, amount};
use batchpipe_events::{BatchEvent, BatchPayload, EventType, ObjectType};

use crate::directory;

/// Deterministic item id: batch id plus a zero-padded sequence number.
pub fn item_object_id(batch_id: &str, sequence: usize) -> String {
    format!("{batch_id}-{sequence:04}")
}

/// Derive the per-item events for a batch event.
///
/// `event_type` must be one of the item event types; the items mirror
/// the batch payload's status and outcome.
pub fn derive_item_events(
    batch: &BatchPayload,
    event_type: EventType,
    now: DateTime<Utc>,
) -> DomainResult<Vec<BatchEvent>> {
    let item_count: usize = batch
        .metadata
        .get(keys::RECORDS)
        .map(String::as_str)
        .unwrap_or("1")
        .parse()
        .map_err(|_| {
            DomainError::validation(format!(
                "batch {} has unparseable record count",
                batch.object_id
            ))
        })?;

    let batch_amount: f64 = batch
        .metadata
        .get(keys::AMOUNT)
        .map(String::as_str)
        .unwrap_or("0.0")
        .parse()
        .unwrap_or(0.0);
    let region = batch
        .metadata
        .get(keys::REGION)
        .map(String::as_str)
        .unwrap_or("US");
    let (_, symbol) = directory::currency_for(region);

    let shares = amount::distribute(batch_amount, item_count)?;

    let mut events = Vec::with_capacity(item_count);
    for (index, share) in shares.iter().enumerate() {
        let sequence = index + 1;
        let mut metadata = batch.metadata.clone();

        for (key, value) in directory::currency_fields(region, *share) {
            metadata.insert(key.to_string(), value);
        }
        metadata.insert(keys::RECORDS.to_string(), "1".to_string());
        metadata.insert(keys::PARENT_ID.to_string(), batch.object_id.clone());
        metadata.insert(keys::PARENT_TYPE.to_string(), "batch".to_string());
        metadata.insert(keys::ITEM_SEQUENCE.to_string(), sequence.to_string());
        metadata.insert(keys::ITEM_COUNT.to_string(), item_count.to_string());
        metadata.insert(keys::BATCH_TOTAL.to_string(), amount::format(batch_amount));
        metadata.insert(
            keys::BATCH_FORMATTED_TOTAL.to_string(),
            format!("{symbol}{batch_amount:.2}"),
        );

        if let Some(summary) = batch.metadata.get(keys::SUMMARY) {
            metadata.insert(keys::DESCRIPTION.to_string(), summary.clone());
            metadata.insert(keys::COMPANY.to_string(), summary.clone());
            metadata.insert(
                keys::INDUSTRY.to_string(),
                directory::industry_for(summary).to_string(),
            );
        }

        events.push(BatchEvent {
            event_type,
            timestamp: now,
            payload: BatchPayload {
                object_id: item_object_id(&batch.object_id, sequence),
                object_type: ObjectType::Item,
                status: batch.status,
                outcome: batch.outcome,
                metadata,
                created: batch.created,
                updated: now,
            },
        });
    }

    validate_amount_distribution(batch, batch_amount, &events)?;

    Ok(events)
}

/// Re-sum the derived item amounts and reject the whole set if they
/// drift from the batch total by a cent or more.
fn validate_amount_distribution(
    batch: &BatchPayload,
    batch_amount: f64,
    events: &[BatchEvent],
) -> DomainResult<()> {
    let item_total: f64 = events
        .iter()
        .filter_map(|e| e.payload.metadata.get(keys::AMOUNT))
        .filter_map(|raw| raw.parse::<f64>().ok())
        .sum();

    if (item_total - batch_amount).abs() >= 0.01 {
        return Err(DomainError::invariant(format!(
            "batch {} item amounts sum to {} but batch total is {}",
            batch.object_id,
            amount::format(item_total),
            amount::format(batch_amount)
        )));
    }

    debug!(
        batch_id = %batch.object_id,
        items = events.len(),
        total = %amount::format(batch_amount),
        "item amounts reconcile"
    );
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    use batchpipe_core::{BatchStatus, Metadata, Outcome};

    fn batch(records: &str, amount: &str) -> BatchPayload {
        let created = Utc.with_ymd_and_hms(2024, 5, 1, 12, 0, 0).unwrap();
        let mut metadata = Metadata::new();
        metadata.insert("records".to_string(), records.to_string());
        metadata.insert("amount".to_string(), amount.to_string());
        metadata.insert("region".to_string(), "UK".to_string());
        metadata.insert("currency".to_string(), "GBP".to_string());
        metadata.insert("summary".to_string(), "Octopus Energy".to_string());
        BatchPayload {
            object_id: "b-1".to_string(),
            object_type: ObjectType::Batch,
            status: BatchStatus::Received,
            outcome: Outcome::Pending,
            metadata,
            created,
            updated: created,
        }
    }

    #[test]
    fn item_ids_are_zero_padded() {
        assert_eq!(item_object_id("b-1", 1), "b-1-0001");
        assert_eq!(item_object_id("b-1", 12), "b-1-0012");
    }

    #[test]
    fn shares_cover_the_batch_total() {
        let now = Utc.with_ymd_and_hms(2024, 5, 1, 12, 5, 0).unwrap();
        let events = derive_item_events(&batch("3", "100.01"), EventType::ItemCreated, now).unwrap();

        assert_eq!(events.len(), 3);
        let amounts: Vec<&str> = events
            .iter()
            .map(|e| e.payload.metadata["amount"].as_str())
            .collect();
        assert_eq!(amounts, vec!["33.34", "33.34", "33.33"]);
    }

    #[test]
    fn items_link_back_to_the_batch() {
        let now = Utc.with_ymd_and_hms(2024, 5, 1, 12, 5, 0).unwrap();
        let events = derive_item_events(&batch("2", "80.00"), EventType::ItemCreated, now).unwrap();

        for (index, event) in events.iter().enumerate() {
            let meta = &event.payload.metadata;
            assert_eq!(event.payload.object_id, item_object_id("b-1", index + 1));
            assert_eq!(meta["parent_id"], "b-1");
            assert_eq!(meta["parent_type"], "batch");
            assert_eq!(meta["item_sequence"], (index + 1).to_string());
            assert_eq!(meta["item_count"], "2");
            assert_eq!(meta["records"], "1");
            assert_eq!(meta["batch_total"], "80.00");
            assert_eq!(meta["batch_formatted_total"], "£80.00");
            assert_eq!(meta["description"], "Octopus Energy");
            assert_eq!(meta["company"], "Octopus Energy");
            assert_eq!(meta["industry"], "energy");
            assert_eq!(event.payload.parent_id(), "b-1");
        }
    }

    #[test]
    fn items_mirror_batch_status_and_outcome() {
        let now = Utc.with_ymd_and_hms(2024, 5, 1, 12, 5, 0).unwrap();
        let mut batch = batch("2", "80.00");
        batch.status = BatchStatus::Complete;
        batch.outcome = Outcome::Success;

        let events = derive_item_events(&batch, EventType::ItemUpdated, now).unwrap();
        for event in events {
            assert_eq!(event.event_type, EventType::ItemUpdated);
            assert_eq!(event.payload.status, BatchStatus::Complete);
            assert_eq!(event.payload.outcome, Outcome::Success);
            assert_eq!(event.payload.created, batch.created);
            assert_eq!(event.payload.updated, now);
        }
    }

    #[test]
    fn missing_records_defaults_to_one_item() {
        let now = Utc.with_ymd_and_hms(2024, 5, 1, 12, 5, 0).unwrap();
        let mut batch = batch("2", "55.00");
        batch.metadata.remove("records");

        let events = derive_item_events(&batch, EventType::ItemCreated, now).unwrap();
        assert_eq!(events.len(), 1);
        assert_eq!(events[0].payload.metadata["amount"], "55.00");
    }

    #[test]
    fn unparseable_record_count_is_rejected() {
        let now = Utc.with_ymd_and_hms(2024, 5, 1, 12, 5, 0).unwrap();
        let batch = batch("many", "55.00");
        assert!(derive_item_events(&batch, EventType::ItemCreated, now).is_err());
    }
}
