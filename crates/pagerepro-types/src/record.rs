//! Test payload rows written by the seeding step and read back by scans.

use serde::{Deserialize, Serialize};

/// A row of the `users` table.
///
/// `(first_name, last_name)` is the primary key: `first_name` is the
/// partition key and `last_name` the clustering column. `age` is plain data.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct UserRecord {
    pub first_name: String,
    pub last_name: String,
    pub age: i32,
}

impl UserRecord {
    #[must_use]
    pub fn new(first_name: impl Into<String>, last_name: impl Into<String>, age: i32) -> Self {
        Self {
            first_name: first_name.into(),
            last_name: last_name.into(),
            age,
        }
    }

    /// Primary-key view of the record.
    #[must_use]
    pub fn key(&self) -> (&str, &str) {
        (&self.first_name, &self.last_name)
    }
}

impl std::fmt::Display for UserRecord {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{} {}, {}", self.first_name, self.last_name, self.age)
    }
}
