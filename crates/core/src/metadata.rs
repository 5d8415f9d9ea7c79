//! Shared metadata vocabulary.
//!
//! Every batch/item payload carries a free-form string map; consumers
//! ignore keys they do not recognize. The constants below are the keys
//! the pipeline itself reads and writes.

use std::collections::HashMap;

/// String-keyed metadata carried on every batch/item payload.
pub type Metadata = HashMap<String, String>;

/// Well-known metadata keys.
pub mod keys {
    pub const AMOUNT: &str = "amount";
    pub const FORMATTED_AMOUNT: &str = "formatted_amount";
    pub const CURRENCY: &str = "currency";
    pub const REGION: &str = "region";
    pub const SUMMARY: &str = "summary";
    pub const RECORDS: &str = "records";
    pub const SOURCE: &str = "source";
    pub const BATCH: &str = "batch";
    pub const PRIORITY: &str = "priority";

    // Item-only keys.
    pub const PARENT_ID: &str = "parent_id";
    pub const PARENT_TYPE: &str = "parent_type";
    pub const ITEM_SEQUENCE: &str = "item_sequence";
    pub const ITEM_COUNT: &str = "item_count";
    pub const BATCH_TOTAL: &str = "batch_total";
    pub const BATCH_FORMATTED_TOTAL: &str = "batch_formatted_total";
    pub const DESCRIPTION: &str = "description";
    pub const COMPANY: &str = "company";
    pub const INDUSTRY: &str = "industry";

    // Keys read defensively by the analytics projection.
    pub const BATCH_ID: &str = "batch_id";
    pub const COMPANY_ID: &str = "company_id";
    pub const COMPANY_NAME: &str = "company_name";
}
