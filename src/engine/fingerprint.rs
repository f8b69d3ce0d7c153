//! Drift fingerprinting — stable dedup identifiers.
//!
//! A fingerprint is a function of (domain, resource type, field path) only,
//! never the values: two detections of the same field-level drift collapse
//! to the same fingerprint across cycles and across processes.

use sha2::{Digest, Sha256};

use crate::model::Domain;

/// Hex characters kept from the SHA-256 digest. 64 bits — collision
/// resistance drops to ~2^32 by the birthday bound, accepted for dedup.
const FINGERPRINT_LEN: usize = 16;

/// Compute the stable fingerprint for one field-level drift.
pub fn drift_fingerprint(domain: Domain, resource_type: &str, field_path: &str) -> String {
    let mut hasher = Sha256::new();
    hasher.update(domain.as_str().as_bytes());
    hasher.update(b"|");
    hasher.update(resource_type.as_bytes());
    hasher.update(b"|");
    hasher.update(field_path.as_bytes());
    let digest = hasher.finalize();
    let mut hex = hex::encode(digest);
    hex.truncate(FINGERPRINT_LEN);
    hex
}
