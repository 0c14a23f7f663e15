//! Identity of a cleaned dataset.

use serde::{Deserialize, Serialize};
use std::fmt;

use super::price::CleanPriceRow;

/// BLAKE3 digest of a cleaned price series.
///
/// Two fetches that clean to the same rows hash the same, regardless of the
/// provider they came from.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct DatasetHash(pub String);

impl DatasetHash {
    /// Hash the rows in order. Missing optional fields hash as a marker byte
    /// so `None` and `0.0` differ.
    pub fn of_rows(rows: &[CleanPriceRow]) -> Self {
        let mut hasher = blake3::Hasher::new();
        for row in rows {
            hasher.update(row.date.to_string().as_bytes());
            hasher.update(&row.close.to_le_bytes());
            for field in [row.open, row.high, row.low, row.volume] {
                match field {
                    Some(v) => hasher.update(&v.to_le_bytes()),
                    None => hasher.update(&[0xff]),
                };
            }
        }
        Self(hasher.finalize().to_hex().to_string())
    }

    /// First 12 hex characters, for logs.
    pub fn short(&self) -> &str {
        self.0.get(..12).unwrap_or(&self.0)
    }
}

impl fmt::Display for DatasetHash {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}
