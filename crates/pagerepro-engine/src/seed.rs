//! Fixture rows written before the scan sequence.

use std::ops::RangeInclusive;

use pagerepro_cql::{CqlSession, DriverError};
use pagerepro_types::UserRecord;
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};

/// Table the fixture rows go into.
pub const USERS_TABLE: &str = "users";

pub const LAST_NAME: &str = "smith";

pub const FIRST_NAMES: [&str; 12] = [
    "bill", "mary", "bob", "june", "peter", "sally", "rich", "patty", "henry", "nancy", "george",
    "allie",
];

pub const AGE_RANGE: RangeInclusive<i32> = 20..=49;

/// Seeded generator when `seed` is set, OS entropy otherwise.
#[must_use]
pub fn age_rng(seed: Option<u64>) -> StdRng {
    match seed {
        Some(seed) => StdRng::seed_from_u64(seed),
        None => StdRng::from_entropy(),
    }
}

/// One `smith` per first name, each with a random age.
pub fn fixture_records<R: Rng>(rng: &mut R) -> Vec<UserRecord> {
    FIRST_NAMES
        .iter()
        .map(|first| UserRecord::new(*first, LAST_NAME, rng.gen_range(AGE_RANGE)))
        .collect()
}

/// Insert `records` one at a time, stopping at the first failure.
///
/// # Errors
///
/// Returns the driver error of the first insert that fails.
pub async fn seed_records<S: CqlSession>(
    session: &S,
    table: &str,
    records: &[UserRecord],
) -> Result<(), DriverError> {
    for record in records {
        session.insert_user(table, record).await?;
    }
    tracing::info!(table, rows = records.len(), "Seeded fixture rows");
    Ok(())
}
