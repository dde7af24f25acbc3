//! Deterministic point identity for feedback items.

use uuid::Uuid;

/// Derive the stable point ID for a feedback item.
///
/// UUIDv5 (namespace `DNS`) over `"{source}-{external_id}"`: the same logical
/// item always maps to the same point, so re-ingestion overwrites instead of
/// appending.
#[must_use]
pub fn point_id(source: &str, external_id: &str) -> Uuid {
    let key = format!("{source}-{external_id}");
    Uuid::new_v5(&Uuid::NAMESPACE_DNS, key.as_bytes())
}
