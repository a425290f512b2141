//! Deterministic fingerprint of generated builders.
//!
//! Builders and pipelines serialize with a fixed field order and pipelines
//! are keyed in a `BTreeMap`, so identical settings always produce identical
//! bytes and therefore an identical digest.

use serde::Serialize;
use sha2::{Digest, Sha256};

use crate::report::model::CatalogueDigest;

pub const DIGEST_ALGORITHM: &str = "sha256";

/// Hashes the compact JSON encoding of `value`.
pub fn digest_of<T: Serialize>(value: &T) -> Result<CatalogueDigest, serde_json::Error> {
    let bytes = serde_json::to_vec(value)?;

    let mut hasher = Sha256::new();
    hasher.update(&bytes);

    Ok(CatalogueDigest {
        algorithm: DIGEST_ALGORITHM.to_string(),
        value: hex::encode(hasher.finalize()),
    })
}
