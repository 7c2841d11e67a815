//! Opaque continuation tokens for paginated scans.

use serde::{Deserialize, Serialize};

/// Driver-produced paging state.
///
/// An empty state means "start from the beginning" when passed into a scan
/// and "no further pages" when returned from one. Only driver
/// implementations read or build the raw bytes; callers hand the token back
/// unchanged, and only to the same query shape that produced it.
#[derive(Debug, Clone, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct PageState(Vec<u8>);

impl PageState {
    /// The "from the beginning" / "exhausted" token.
    #[must_use]
    pub fn start() -> Self {
        Self(Vec::new())
    }

    /// Wrap raw driver bytes. Intended for driver implementations only.
    #[must_use]
    pub fn from_driver_bytes(bytes: impl Into<Vec<u8>>) -> Self {
        Self(bytes.into())
    }

    /// Raw driver bytes. Intended for driver implementations only.
    #[must_use]
    pub fn as_driver_bytes(&self) -> &[u8] {
        &self.0
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    /// Token length in bytes, for diagnostics.
    #[must_use]
    pub fn len(&self) -> usize {
        self.0.len()
    }
}
