use serde::{Deserialize, Serialize};
use sqlx::sqlite::SqliteRow;
use sqlx::{Executor, Row, Sqlite, SqlitePool};
use ts_rs::TS;

use crate::id::new_uuid_v7;
use crate::repo::{bind_limit_checked, in_placeholders};
use crate::time::now_ms;
use crate::{AppError, AppResult};

/// Per-user dietary profile, optionally linked to a household.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, TS)]
#[serde(rename_all = "camelCase")]
#[ts(export, export_to = "bindings/")]
pub struct Profile {
    pub id: String,
    pub email: String,
    pub uid: String,
    pub household_id: Option<String>,
    pub name: String,
    pub allergies: Vec<String>,
    pub intolerances: Vec<String>,
    pub preferred_foods: Vec<String>,
    pub disliked_foods: Vec<String>,
    pub created_at: i64,
    pub updated_at: i64,
}

/// Caller-supplied profile fields at signup.
#[derive(Debug, Clone, Default, Serialize, Deserialize, TS)]
#[serde(rename_all = "camelCase")]
#[ts(export, export_to = "bindings/")]
pub struct ProfileData {
    pub uid: String,
    #[serde(default)]
    pub name: String,
    #[serde(default)]
    pub household_id: Option<String>,
    #[serde(default)]
    pub allergies: Vec<String>,
    #[serde(default)]
    pub intolerances: Vec<String>,
    #[serde(default)]
    pub preferred_foods: Vec<String>,
    #[serde(default)]
    pub disliked_foods: Vec<String>,
}

fn list_column(row: &SqliteRow, name: &str) -> AppResult<Vec<String>> {
    let raw: String = row.try_get(name).map_err(AppError::from)?;
    serde_json::from_str(&raw)
        .map_err(|e| AppError::from(e).with_context("column", name.to_string()))
}

fn profile_from_row(row: &SqliteRow) -> AppResult<Profile> {
    Ok(Profile {
        id: row.try_get("id").map_err(AppError::from)?,
        email: row.try_get("email").map_err(AppError::from)?,
        uid: row.try_get("uid").map_err(AppError::from)?,
        household_id: row.try_get("household_id").map_err(AppError::from)?,
        name: row.try_get("name").map_err(AppError::from)?,
        allergies: list_column(row, "allergies")?,
        intolerances: list_column(row, "intolerances")?,
        preferred_foods: list_column(row, "preferred_foods")?,
        disliked_foods: list_column(row, "disliked_foods")?,
        created_at: row.try_get("created_at").map_err(AppError::from)?,
        updated_at: row.try_get("updated_at").map_err(AppError::from)?,
    })
}

const PROFILE_COLUMNS: &str = "id, email, uid, household_id, name, allergies, intolerances, preferred_foods, disliked_foods, created_at, updated_at";

fn encode_list(values: &[String]) -> AppResult<String> {
    serde_json::to_string(values).map_err(AppError::from)
}

/// Insert a new profile. `household_id` stays NULL unless supplied.
pub async fn create_profile(
    pool: &SqlitePool,
    email: &str,
    data: ProfileData,
) -> AppResult<Profile> {
    let now = now_ms();
    let profile = Profile {
        id: new_uuid_v7(),
        email: email.to_string(),
        uid: data.uid,
        household_id: data.household_id,
        name: data.name,
        allergies: data.allergies,
        intolerances: data.intolerances,
        preferred_foods: data.preferred_foods,
        disliked_foods: data.disliked_foods,
        created_at: now,
        updated_at: now,
    };
    sqlx::query(
        "INSERT INTO profile (id, email, uid, household_id, name, allergies, intolerances, preferred_foods, disliked_foods, created_at, updated_at)
         VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?)",
    )
    .bind(&profile.id)
    .bind(&profile.email)
    .bind(&profile.uid)
    .bind(&profile.household_id)
    .bind(&profile.name)
    .bind(encode_list(&profile.allergies)?)
    .bind(encode_list(&profile.intolerances)?)
    .bind(encode_list(&profile.preferred_foods)?)
    .bind(encode_list(&profile.disliked_foods)?)
    .bind(profile.created_at)
    .bind(profile.updated_at)
    .execute(pool)
    .await
    .map_err(AppError::from)?;
    Ok(profile)
}

/// Single-field household link, keyed by profile id.
///
/// Deliberately verifies nothing: membership must already have been granted
/// by the caller. Ordering is a caller obligation, not enforced here.
pub async fn link_profile_to_household(
    ex: impl Executor<'_, Database = Sqlite>,
    profile_id: &str,
    household_id: &str,
) -> AppResult<()> {
    sqlx::query("UPDATE profile SET household_id = ?, updated_at = ? WHERE id = ?")
        .bind(household_id)
        .bind(now_ms())
        .bind(profile_id)
        .execute(ex)
        .await
        .map_err(AppError::from)?;
    Ok(())
}

/// Same single-field link keyed by uid, used by the join protocol where only
/// the identity is known. A uid without a profile yet is tolerated; the
/// reconciler picks the profile up once it exists.
pub async fn link_profile_by_uid(
    ex: impl Executor<'_, Database = Sqlite>,
    uid: &str,
    household_id: &str,
) -> AppResult<u64> {
    let res = sqlx::query("UPDATE profile SET household_id = ?, updated_at = ? WHERE uid = ?")
        .bind(household_id)
        .bind(now_ms())
        .bind(uid)
        .execute(ex)
        .await
        .map_err(AppError::from)?;
    Ok(res.rows_affected())
}

pub async fn get_profile(
    ex: impl Executor<'_, Database = Sqlite>,
    profile_id: &str,
) -> AppResult<Option<Profile>> {
    let row = sqlx::query(&format!(
        "SELECT {PROFILE_COLUMNS} FROM profile WHERE id = ?"
    ))
    .bind(profile_id)
    .fetch_optional(ex)
    .await
    .map_err(AppError::from)?;
    row.as_ref().map(profile_from_row).transpose()
}

/// Primary reconciler query: profiles already pointing at the household.
pub async fn profiles_by_household(
    ex: impl Executor<'_, Database = Sqlite>,
    household_id: &str,
) -> AppResult<Vec<Profile>> {
    let rows = sqlx::query(&format!(
        "SELECT {PROFILE_COLUMNS} FROM profile WHERE household_id = ? ORDER BY created_at, id"
    ))
    .bind(household_id)
    .fetch_all(ex)
    .await
    .map_err(AppError::from)?;
    rows.iter().map(profile_from_row).collect()
}

/// One "value in set" batch of profile lookups by uid. Callers batch through
/// `repo::value_set_chunks`; a set larger than the store limit is an error.
pub async fn profiles_by_uids(
    ex: impl Executor<'_, Database = Sqlite>,
    uids: &[String],
) -> AppResult<Vec<Profile>> {
    bind_limit_checked(uids.len())?;
    let sql = format!(
        "SELECT {PROFILE_COLUMNS} FROM profile WHERE uid IN ({}) ORDER BY created_at, id",
        in_placeholders(uids.len())
    );
    let mut query = sqlx::query(&sql);
    for uid in uids {
        query = query.bind(uid);
    }
    let rows = query.fetch_all(ex).await.map_err(AppError::from)?;
    rows.iter().map(profile_from_row).collect()
}
