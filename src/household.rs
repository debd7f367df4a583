use serde::{Deserialize, Serialize};
use sqlx::{Executor, FromRow, Row, Sqlite};
use ts_rs::TS;

use crate::id::new_uuid_v7;
use crate::time::now_ms;
use crate::{AppError, AppResult};

/// Canonical household record. The member set lives in `household_member`
/// rows keyed by `(household_id, uid)` so admission is a set union at the
/// storage layer rather than a read-modify-write of an array.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, FromRow, TS)]
#[serde(rename_all = "camelCase")]
#[ts(export, export_to = "bindings/")]
pub struct Household {
    pub id: String,
    pub name: String,
    pub owner_id: String,
    pub invite_code: Option<String>,
    pub invite_code_created_at: Option<i64>,
    pub created_at: i64,
    pub updated_at: i64,
}

/// Insert a new household row with the owner as sole member.
///
/// Linkage and profile side effects belong to the join protocol, which runs
/// this inside the same transaction.
pub async fn insert_household(
    conn: &mut sqlx::SqliteConnection,
    name: &str,
    owner_uid: &str,
) -> AppResult<Household> {
    let id = new_uuid_v7();
    let now = now_ms();
    sqlx::query(
        "INSERT INTO household (id, name, owner_id, invite_code, invite_code_created_at, created_at, updated_at)
         VALUES (?, ?, ?, NULL, NULL, ?, ?)",
    )
    .bind(&id)
    .bind(name)
    .bind(owner_uid)
    .bind(now)
    .bind(now)
    .execute(&mut *conn)
    .await
    .map_err(AppError::from)?;

    add_member(&mut *conn, &id, owner_uid).await?;

    Ok(Household {
        id,
        name: name.to_string(),
        owner_id: owner_uid.to_string(),
        invite_code: None,
        invite_code_created_at: None,
        created_at: now,
        updated_at: now,
    })
}

/// Admit a uid into the member set. Idempotent and safe under concurrency:
/// `INSERT OR IGNORE` against the composite primary key means two racing
/// admissions both land, neither dropping the other.
pub async fn add_member(
    ex: impl Executor<'_, Database = Sqlite>,
    household_id: &str,
    uid: &str,
) -> AppResult<bool> {
    let res = sqlx::query(
        "INSERT OR IGNORE INTO household_member (household_id, uid, created_at) VALUES (?, ?, ?)",
    )
    .bind(household_id)
    .bind(uid)
    .bind(now_ms())
    .execute(ex)
    .await
    .map_err(AppError::from)?;
    Ok(res.rows_affected() > 0)
}

pub async fn get_household(
    ex: impl Executor<'_, Database = Sqlite>,
    household_id: &str,
) -> AppResult<Option<Household>> {
    sqlx::query_as::<_, Household>(
        "SELECT id, name, owner_id, invite_code, invite_code_created_at, created_at, updated_at
         FROM household WHERE id = ?",
    )
    .bind(household_id)
    .fetch_optional(ex)
    .await
    .map_err(AppError::from)
}

/// Member uids in admission order (insertion order is not meaningful to
/// callers, but a stable order keeps responses deterministic).
pub async fn member_uids(
    ex: impl Executor<'_, Database = Sqlite>,
    household_id: &str,
) -> AppResult<Vec<String>> {
    let rows = sqlx::query(
        "SELECT uid FROM household_member WHERE household_id = ? ORDER BY created_at, uid",
    )
    .bind(household_id)
    .fetch_all(ex)
    .await
    .map_err(AppError::from)?;
    rows.into_iter()
        .map(|row| row.try_get::<String, _>("uid").map_err(AppError::from))
        .collect()
}

pub async fn is_member(
    ex: impl Executor<'_, Database = Sqlite>,
    household_id: &str,
    uid: &str,
) -> AppResult<bool> {
    let row = sqlx::query("SELECT 1 FROM household_member WHERE household_id = ? AND uid = ?")
        .bind(household_id)
        .bind(uid)
        .fetch_optional(ex)
        .await
        .map_err(AppError::from)?;
    Ok(row.is_some())
}
