use once_cell::sync::Lazy;
use rand::Rng;
use regex::Regex;
use serde::{Deserialize, Serialize};
use sqlx::{Executor, FromRow, Row, Sqlite, SqlitePool};
use thiserror::Error;
use ts_rs::TS;

use crate::household::is_member;
use crate::id::new_uuid_v7;
use crate::time::now_ms;
use crate::{AppError, AppResult};

/// Permanent codes and one-time grants share the same shape: six uppercase
/// alphanumeric characters.
pub const CODE_LEN: usize = 6;
const CODE_ALPHABET: &[u8] = b"ABCDEFGHIJKLMNOPQRSTUVWXYZ0123456789";
/// Attempts before giving up when every generated code collides.
const MAX_CODE_ATTEMPTS: usize = 5;
/// One-time grants expire after seven days.
pub const GRANT_TTL_MS: i64 = 7 * 24 * 60 * 60 * 1000;

static CODE_SHAPE: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"^[A-Z0-9]{6}$").unwrap_or_else(|e| panic!("invalid code regex: {e}"))
});

/// Legacy one-time invite. `used` flips false -> true exactly once.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, FromRow, TS)]
#[serde(rename_all = "camelCase")]
#[ts(export, export_to = "bindings/")]
pub struct InviteGrant {
    pub id: String,
    pub household_id: String,
    pub code: String,
    pub created_by: String,
    pub used: bool,
    pub used_by: Option<String>,
    pub created_at: i64,
    pub used_at: Option<i64>,
    pub expires_at: i64,
}

/// Outcome of code validation, before any membership mutation.
#[derive(Debug, Error)]
pub enum InviteValidationError {
    #[error("invite code is invalid, expired, or already used")]
    InvalidCode,
    #[error("identity is already a member of this household")]
    AlreadyMember,
    #[error(transparent)]
    Store(#[from] AppError),
}

impl From<InviteValidationError> for AppError {
    fn from(err: InviteValidationError) -> Self {
        match err {
            InviteValidationError::InvalidCode => AppError::new(
                "CONFLICT/INVALID_CODE",
                "Invite code is invalid, expired, or already used",
            ),
            InviteValidationError::AlreadyMember => AppError::new(
                "CONFLICT/ALREADY_MEMBER",
                "Already a member of this household",
            ),
            InviteValidationError::Store(inner) => inner,
        }
    }
}

impl From<sqlx::Error> for InviteValidationError {
    fn from(err: sqlx::Error) -> Self {
        InviteValidationError::Store(AppError::from(err))
    }
}

fn generate_code() -> String {
    let mut rng = rand::thread_rng();
    (0..CODE_LEN)
        .map(|_| CODE_ALPHABET[rng.gen_range(0..CODE_ALPHABET.len())] as char)
        .collect()
}

/// Codes are compared case-insensitively; stored form is uppercase.
pub fn normalize_code(raw: &str) -> String {
    raw.trim().to_ascii_uppercase()
}

fn is_unique_violation(err: &AppError) -> bool {
    // SQLite extended codes: 2067 unique index, 1555 primary key.
    err.code() == "STORE/SQLITE_2067" || err.code() == "STORE/SQLITE_1555"
}

/// Return the household's permanent code, minting one on first request.
///
/// Idempotent: once a code exists it is never regenerated. The write is
/// conditional on `invite_code IS NULL`, so a lost race re-reads the winner's
/// code; a unique-index collision with another household retries generation.
pub async fn get_or_create_code(pool: &SqlitePool, household_id: &str) -> AppResult<String> {
    for _ in 0..MAX_CODE_ATTEMPTS {
        let existing = sqlx::query("SELECT invite_code FROM household WHERE id = ?")
            .bind(household_id)
            .fetch_optional(pool)
            .await
            .map_err(AppError::from)?;
        let Some(row) = existing else {
            return Err(AppError::new("NOT_FOUND/HOUSEHOLD", "Household not found")
                .with_context("household_id", household_id.to_string()));
        };
        if let Some(code) = row.try_get::<Option<String>, _>("invite_code").map_err(AppError::from)? {
            return Ok(code);
        }

        let code = generate_code();
        let now = now_ms();
        match sqlx::query(
            "UPDATE household
             SET invite_code = ?, invite_code_created_at = ?, updated_at = ?
             WHERE id = ? AND invite_code IS NULL",
        )
        .bind(&code)
        .bind(now)
        .bind(now)
        .bind(household_id)
        .execute(pool)
        .await
        {
            Ok(res) if res.rows_affected() == 1 => return Ok(code),
            // Raced with another minter; next iteration reads the stored code.
            Ok(_) => continue,
            Err(err) => {
                let app = AppError::from(err);
                if is_unique_violation(&app) {
                    tracing::warn!(
                        target = "larder",
                        event = "invite_code_collision",
                        household_id
                    );
                    continue;
                }
                return Err(app);
            }
        }
    }
    Err(
        AppError::new("STORE/CODE_GENERATION", "Could not mint a unique invite code")
            .with_context("household_id", household_id.to_string()),
    )
}

/// Create a legacy one-time grant with a seven-day expiry.
pub async fn generate_one_time_code(
    pool: &SqlitePool,
    household_id: &str,
    created_by: &str,
) -> AppResult<InviteGrant> {
    let now = now_ms();
    let grant = InviteGrant {
        id: new_uuid_v7(),
        household_id: household_id.to_string(),
        code: generate_code(),
        created_by: created_by.to_string(),
        used: false,
        used_by: None,
        created_at: now,
        used_at: None,
        expires_at: now + GRANT_TTL_MS,
    };
    sqlx::query(
        "INSERT INTO invite_grant (id, household_id, code, created_by, used, used_by, created_at, used_at, expires_at)
         VALUES (?, ?, ?, ?, 0, NULL, ?, NULL, ?)",
    )
    .bind(&grant.id)
    .bind(&grant.household_id)
    .bind(&grant.code)
    .bind(&grant.created_by)
    .bind(grant.created_at)
    .bind(grant.expires_at)
    .execute(pool)
    .await
    .map_err(AppError::from)?;
    Ok(grant)
}

/// All grants for a household, newest first.
pub async fn list_grants(
    ex: impl Executor<'_, Database = Sqlite>,
    household_id: &str,
) -> AppResult<Vec<InviteGrant>> {
    sqlx::query_as::<_, InviteGrant>(
        "SELECT id, household_id, code, created_by, used, used_by, created_at, used_at, expires_at
         FROM invite_grant WHERE household_id = ? ORDER BY created_at DESC",
    )
    .bind(household_id)
    .fetch_all(ex)
    .await
    .map_err(AppError::from)
}

/// Resolve a code to its household and, for one-time grants, consume it.
///
/// Permanent codes resolve through the indexed `household.invite_code`
/// column; the grant fallback requires an unused, unexpired match and flips
/// `used` with a guarded UPDATE so exactly one acceptor wins a race.
/// Already-member detection happens before any mutation.
pub async fn validate_and_consume(
    conn: &mut sqlx::SqliteConnection,
    code: &str,
    uid: &str,
) -> Result<String, InviteValidationError> {
    let code = normalize_code(code);
    if !CODE_SHAPE.is_match(&code) {
        return Err(InviteValidationError::InvalidCode);
    }

    let permanent = sqlx::query("SELECT id FROM household WHERE invite_code = ?")
        .bind(&code)
        .fetch_optional(&mut *conn)
        .await?;
    if let Some(row) = permanent {
        let household_id: String = row.try_get("id").map_err(AppError::from)?;
        if is_member(&mut *conn, &household_id, uid).await? {
            return Err(InviteValidationError::AlreadyMember);
        }
        return Ok(household_id);
    }

    let now = now_ms();
    let grant = sqlx::query(
        "SELECT id, household_id FROM invite_grant
         WHERE code = ? AND used = 0 AND expires_at > ?
         ORDER BY created_at DESC LIMIT 1",
    )
    .bind(&code)
    .bind(now)
    .fetch_optional(&mut *conn)
    .await?;
    let Some(row) = grant else {
        return Err(InviteValidationError::InvalidCode);
    };
    let grant_id: String = row.try_get("id").map_err(AppError::from)?;
    let household_id: String = row.try_get("household_id").map_err(AppError::from)?;

    if is_member(&mut *conn, &household_id, uid).await? {
        return Err(InviteValidationError::AlreadyMember);
    }

    let consumed = sqlx::query(
        "UPDATE invite_grant SET used = 1, used_by = ?, used_at = ? WHERE id = ? AND used = 0",
    )
    .bind(uid)
    .bind(now)
    .bind(&grant_id)
    .execute(&mut *conn)
    .await?;
    if consumed.rows_affected() == 0 {
        // Another acceptor consumed it between the read and the update.
        return Err(InviteValidationError::InvalidCode);
    }

    Ok(household_id)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn generated_codes_have_fixed_shape() {
        for _ in 0..100 {
            let code = generate_code();
            assert_eq!(code.len(), CODE_LEN);
            assert!(CODE_SHAPE.is_match(&code));
        }
    }

    #[test]
    fn normalize_uppercases_and_trims() {
        assert_eq!(normalize_code("  x7k2qp "), "X7K2QP");
        assert_eq!(normalize_code("X7K2QP"), "X7K2QP");
    }

    #[test]
    fn malformed_codes_fail_shape_check() {
        for bad in ["", "ABC", "ABCDEFG", "abc-12", "ABC 12"] {
            assert!(!CODE_SHAPE.is_match(&normalize_code(bad)), "{bad:?}");
        }
    }

    #[test]
    fn unique_violations_are_recognized() {
        assert!(is_unique_violation(&AppError::new("STORE/SQLITE_2067", "x")));
        assert!(is_unique_violation(&AppError::new("STORE/SQLITE_1555", "x")));
        assert!(!is_unique_violation(&AppError::new("STORE/DATABASE", "x")));
    }

    #[test]
    fn validation_errors_map_to_conflict_codes() {
        let invalid: AppError = InviteValidationError::InvalidCode.into();
        assert_eq!(invalid.code(), "CONFLICT/INVALID_CODE");
        let member: AppError = InviteValidationError::AlreadyMember.into();
        assert_eq!(member.code(), "CONFLICT/ALREADY_MEMBER");
        assert!(member.is_family("CONFLICT"));
    }
}
