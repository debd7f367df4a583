//! Small helpers that encode the store's capability boundary.
//!
//! The backing store supports get-by-id, field-equality queries, "value in
//! set" queries of at most [`VALUE_IN_SET_LIMIT`] values, and single-row
//! atomic updates. Callers that need a larger set must batch through
//! [`value_set_chunks`]; the reconciler depends on this.

use crate::{AppError, AppResult};

/// Hard ceiling on the number of values a single "value in set" query may carry.
pub const VALUE_IN_SET_LIMIT: usize = 10;

/// Split a value set into store-sized batches.
pub fn value_set_chunks<T>(values: &[T]) -> impl Iterator<Item = &[T]> {
    values.chunks(VALUE_IN_SET_LIMIT)
}

/// Placeholder list for a bound value set, e.g. `?,?,?`.
///
/// Panics in debug builds when the batch exceeds the store limit; release
/// callers get a structured error from [`bind_limit_checked`] first.
pub fn in_placeholders(len: usize) -> String {
    debug_assert!(len <= VALUE_IN_SET_LIMIT);
    vec!["?"; len].join(",")
}

/// Reject value sets that exceed the store's per-query ceiling.
pub fn bind_limit_checked(len: usize) -> AppResult<()> {
    if len == 0 || len > VALUE_IN_SET_LIMIT {
        return Err(
            AppError::new("STORE/VALUE_SET_LIMIT", "Value set outside store limits")
                .with_context("len", len.to_string())
                .with_context("limit", VALUE_IN_SET_LIMIT.to_string()),
        );
    }
    Ok(())
}

/// Validate a required string field, returning it trimmed.
pub fn require_field<'a>(field: &str, value: &'a str) -> AppResult<&'a str> {
    let trimmed = value.trim();
    if trimmed.is_empty() {
        return Err(
            AppError::new("VALIDATION/MISSING_FIELD", "Required field is missing")
                .with_context("field", field.to_string()),
        );
    }
    Ok(trimmed)
}
