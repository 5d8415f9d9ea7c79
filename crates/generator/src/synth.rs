//! Synthetic batch data.
//!
//! Amounts follow a three-band mixture so dashboards show a realistic
//! spread: 70% mid-range Gaussian, 20% low uniform, 10% high uniform.
//! Generated metadata is validated before any event is published.

use rand::Rng;
use rand_distr::{Distribution, Normal};

use batchpipe_core::metadata::keys;
use batchpipe_core::{DomainError, DomainResult, Metadata};

use crate::directory;

/// Draw a batch amount from the three-band mixture.
///
/// 70%: Normal(65, 8) clamped to [50, 80]. 20%: uniform [20, 49).
/// 10%: uniform [81, 200).
pub fn generate_amount(rng: &mut impl Rng) -> f64 {
    let band = rng.random::<f64>();
    if band < 0.70 {
        let normal = Normal::<f64>::new(65.0, 8.0).expect("valid distribution parameters");
        normal.sample(rng).clamp(50.0, 80.0)
    } else if band < 0.90 {
        20.0 + rng.random::<f64>() * 29.0
    } else {
        81.0 + rng.random::<f64>() * 119.0
    }
}

/// Pick a region, then a company within it, both uniformly.
pub fn pick_company(rng: &mut impl Rng) -> (&'static str, &'static str) {
    let region = directory::REGIONS[rng.random_range(0..directory::REGIONS.len())];
    let companies = directory::companies_for(region);
    let company = companies[rng.random_range(0..companies.len())];
    (region, company)
}

/// Build the metadata for a new batch.
pub fn build_metadata(rng: &mut impl Rng, size_min: u32, size_max: u32) -> Metadata {
    let (region, company) = pick_company(rng);
    let amount = generate_amount(rng);

    let mut metadata = Metadata::new();
    metadata.insert(
        keys::RECORDS.to_string(),
        rng.random_range(size_min..=size_max).to_string(),
    );
    metadata.insert(keys::SOURCE.to_string(), "automated".to_string());
    metadata.insert(
        keys::BATCH.to_string(),
        rng.random_range(0..1000).to_string(),
    );
    metadata.insert(
        keys::PRIORITY.to_string(),
        if rng.random_bool(0.5) { "high" } else { "normal" }.to_string(),
    );
    metadata.insert(keys::SUMMARY.to_string(), company.to_string());
    metadata.insert(keys::REGION.to_string(), region.to_string());
    for (key, value) in directory::currency_fields(region, amount) {
        metadata.insert(key.to_string(), value);
    }

    metadata
}

/// Check that freshly generated batch metadata is publishable.
pub fn validate_batch_metadata(object_id: &str, metadata: &Metadata) -> DomainResult<()> {
    for key in [keys::AMOUNT, keys::SUMMARY, keys::CURRENCY, keys::REGION] {
        if metadata.get(key).is_none_or(|v| v.is_empty()) {
            return Err(DomainError::validation(format!(
                "batch {object_id} missing metadata key {key}"
            )));
        }
    }

    let raw = &metadata[keys::AMOUNT];
    let amount: f64 = raw.parse().map_err(|_| {
        DomainError::validation(format!("batch {object_id} has unparseable amount {raw:?}"))
    })?;
    if amount <= 0.0 {
        return Err(DomainError::validation(format!(
            "batch {object_id} has non-positive amount {raw}"
        )));
    }

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn amounts_stay_in_band() {
        let mut rng = rand::rng();
        for _ in 0..2000 {
            let amount = generate_amount(&mut rng);
            assert!((20.0..200.0).contains(&amount), "out of band: {amount}");
        }
    }

    #[test]
    fn most_amounts_land_in_the_gaussian_band() {
        let mut rng = rand::rng();
        let mid = (0..2000)
            .map(|_| generate_amount(&mut rng))
            .filter(|a| (50.0..=80.0).contains(a))
            .count();
        // 70% by construction; allow generous slack.
        assert!(mid > 1200, "only {mid}/2000 in [50, 80]");
    }

    #[test]
    fn picked_company_belongs_to_its_region() {
        let mut rng = rand::rng();
        for _ in 0..64 {
            let (region, company) = pick_company(&mut rng);
            assert!(directory::companies_for(region).contains(&company));
        }
    }

    #[test]
    fn generated_metadata_is_complete_and_valid() {
        let mut rng = rand::rng();
        for _ in 0..64 {
            let metadata = build_metadata(&mut rng, 2, 5);

            validate_batch_metadata("b-test", &metadata).unwrap();

            let records: u32 = metadata["records"].parse().unwrap();
            assert!((2..=5).contains(&records));
            assert_eq!(metadata["source"], "automated");
            assert!(["high", "normal"].contains(&metadata["priority"].as_str()));

            let (code, symbol) = directory::currency_for(&metadata["region"]);
            assert_eq!(metadata["currency"], code);
            assert!(metadata["formatted_amount"].starts_with(symbol));
        }
    }

    #[test]
    fn validation_rejects_broken_metadata() {
        let mut rng = rand::rng();
        let good = build_metadata(&mut rng, 2, 5);

        let mut missing = good.clone();
        missing.remove("summary");
        assert!(validate_batch_metadata("b", &missing).is_err());

        let mut garbled = good.clone();
        garbled.insert("amount".to_string(), "sixty".to_string());
        assert!(validate_batch_metadata("b", &garbled).is_err());

        let mut negative = good;
        negative.insert("amount".to_string(), "-4.00".to_string());
        assert!(validate_batch_metadata("b", &negative).is_err());
    }
}
