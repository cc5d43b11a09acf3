//! SQLite helper utilities for type conversion
//!
//! SQLite has no array or UUID column types, so genres are stored as JSON
//! text and identifiers as UUID strings.

use uuid::Uuid;

use super::error::{StoreError, StoreResult};

/// Generate a fresh document identifier
#[inline]
pub fn new_id() -> String {
    Uuid::new_v4().to_string()
}

/// Get current UTC timestamp as ISO8601 string for SQLite
#[inline]
pub fn now_iso8601() -> String {
    chrono::Utc::now().to_rfc3339()
}

/// Serialize a string list to a JSON array for SQLite storage
pub fn strings_to_json(values: &[String]) -> StoreResult<String> {
    serde_json::to_string(values).map_err(|e| StoreError::Decode {
        entity: "json",
        reason: e.to_string(),
    })
}

/// Deserialize a JSON array column back into a string list
pub fn json_to_strings(entity: &'static str, raw: &str) -> StoreResult<Vec<String>> {
    serde_json::from_str(raw).map_err(|e| StoreError::Decode {
        entity,
        reason: format!("invalid JSON array '{}': {}", raw, e),
    })
}

/// Reject blank values for a required text field. The value is stored as given
/// so exact-match lookups keep working.
pub fn required_text(entity: &'static str, field: &str, value: &str) -> StoreResult<()> {
    if value.trim().is_empty() {
        return Err(StoreError::invalid(entity, format!("{} is required", field)));
    }
    Ok(())
}
