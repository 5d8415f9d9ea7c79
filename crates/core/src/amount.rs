//! Cent-accurate monetary amount handling.
//!
//! Amounts travel through metadata as two-decimal currency strings; all
//! allocation arithmetic happens in integer cents so item shares never
//! drift from the batch total.

use crate::error::{DomainError, DomainResult};

/// Convert a two-decimal currency value to integer cents (rounded).
pub fn to_cents(amount: f64) -> i64 {
    (amount * 100.0).round() as i64
}

/// Convert integer cents back to a currency value.
pub fn from_cents(cents: i64) -> f64 {
    cents as f64 / 100.0
}

/// Format a currency value with exactly two decimals.
pub fn format(amount: f64) -> String {
    format!("{amount:.2}")
}

/// Split `total` into `item_count` shares that sum exactly to the
/// cent-rounded total.
///
/// Every share gets the integer-cent base; the remainder R (0 ≤ R < N) is
/// distributed as one extra cent onto the first R shares, in sequence
/// order. The front-loading is deliberate and must not change: downstream
/// audit reconciliation depends on exact reproducibility.
pub fn distribute(total: f64, item_count: usize) -> DomainResult<Vec<f64>> {
    if item_count == 0 {
        return Err(DomainError::validation("item count must be at least 1"));
    }

    let total_cents = to_cents(total);
    let base = total_cents / item_count as i64;
    let remainder = total_cents % item_count as i64;

    let mut cents = vec![base; item_count];
    for share in cents.iter_mut().take(remainder as usize) {
        *share += 1;
    }

    Ok(cents.into_iter().map(from_cents).collect())
}
