//! Content fingerprints for reproducible output.

use serde::Serialize;
use sha2::{Digest, Sha256};

use crate::{Error, Result};

/// SHA-256 hex digest of the canonical JSON encoding of `value`.
///
/// Every map in the synthesized IR is ordered, so equal values always hash
/// to the same digest.
pub fn fingerprint<T: Serialize>(value: &T) -> Result<String> {
    let bytes = serde_json::to_vec(value).map_err(|e| Error::Internal(e.to_string()))?;
    Ok(hex::encode(Sha256::digest(&bytes)))
}
