use serde::{Deserialize, Serialize};
use sqlx::{Executor, FromRow, Sqlite};
use ts_rs::TS;

use crate::id::new_uuid_v7;
use crate::time::now_ms;
use crate::{AppError, AppResult};

/// Secondary index entry mapping an identity to its household.
///
/// Written whenever a uid is admitted, independently of the profile record,
/// so roster reads survive the lag between admission and profile linkage.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, FromRow, TS)]
#[serde(rename_all = "camelCase")]
#[ts(export, export_to = "bindings/")]
pub struct LinkageRecord {
    pub id: String,
    pub uid: String,
    pub household_id: String,
    pub created_at: i64,
}

/// Record `(uid, household_id)`. Re-inserting an equivalent record is a
/// no-op, which keeps join retries idempotent.
pub async fn ensure_linkage(
    ex: impl Executor<'_, Database = Sqlite>,
    uid: &str,
    household_id: &str,
) -> AppResult<()> {
    sqlx::query(
        "INSERT OR IGNORE INTO linkage (id, uid, household_id, created_at) VALUES (?, ?, ?, ?)",
    )
    .bind(new_uuid_v7())
    .bind(uid)
    .bind(household_id)
    .bind(now_ms())
    .execute(ex)
    .await
    .map_err(AppError::from)?;
    Ok(())
}

pub async fn linkages_for_household(
    ex: impl Executor<'_, Database = Sqlite>,
    household_id: &str,
) -> AppResult<Vec<LinkageRecord>> {
    sqlx::query_as::<_, LinkageRecord>(
        "SELECT id, uid, household_id, created_at FROM linkage
         WHERE household_id = ? ORDER BY created_at, uid",
    )
    .bind(household_id)
    .fetch_all(ex)
    .await
    .map_err(AppError::from)
}

pub async fn linkage_for_uid(
    ex: impl Executor<'_, Database = Sqlite>,
    uid: &str,
    household_id: &str,
) -> AppResult<Option<LinkageRecord>> {
    sqlx::query_as::<_, LinkageRecord>(
        "SELECT id, uid, household_id, created_at FROM linkage
         WHERE uid = ? AND household_id = ?",
    )
    .bind(uid)
    .bind(household_id)
    .fetch_optional(ex)
    .await
    .map_err(AppError::from)
}
