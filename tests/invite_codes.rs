use anyhow::Result;
use larder_lib::invite::{self, normalize_code, CODE_LEN, GRANT_TTL_MS};
use larder_lib::join;
use proptest::prelude::*;
use sqlx::Row;

#[path = "util.rs"]
mod util;

#[tokio::test]
async fn get_or_create_is_idempotent() -> Result<()> {
    let pool = util::memory_pool().await;
    let created = join::create_household(&pool, "Hill House", "uid-ana").await?;

    let first = invite::get_or_create_code(&pool, &created.id).await?;
    let second = invite::get_or_create_code(&pool, &created.id).await?;
    assert_eq!(first, second);

    assert_eq!(first.len(), CODE_LEN);
    assert!(first
        .chars()
        .all(|c| c.is_ascii_uppercase() || c.is_ascii_digit()));
    Ok(())
}

#[tokio::test]
async fn get_or_create_unknown_household_fails() -> Result<()> {
    let pool = util::memory_pool().await;
    let err = invite::get_or_create_code(&pool, "no-such-id")
        .await
        .unwrap_err();
    assert_eq!(err.code(), "NOT_FOUND/HOUSEHOLD");
    Ok(())
}

#[tokio::test]
async fn permanent_code_survives_on_household_record() -> Result<()> {
    let pool = util::memory_pool().await;
    let created = join::create_household(&pool, "Hill House", "uid-ana").await?;
    let code = invite::get_or_create_code(&pool, &created.id).await?;

    let row = sqlx::query("SELECT invite_code, invite_code_created_at FROM household WHERE id = ?")
        .bind(&created.id)
        .fetch_one(&pool)
        .await?;
    assert_eq!(row.try_get::<Option<String>, _>("invite_code")?, Some(code));
    assert!(row
        .try_get::<Option<i64>, _>("invite_code_created_at")?
        .is_some());
    Ok(())
}

#[tokio::test]
async fn one_time_grant_has_seven_day_expiry() -> Result<()> {
    let pool = util::memory_pool().await;
    let created = join::create_household(&pool, "Hill House", "uid-ana").await?;

    let grant = invite::generate_one_time_code(&pool, &created.id, "uid-ana").await?;
    assert!(!grant.used);
    assert_eq!(grant.used_by, None);
    assert_eq!(grant.expires_at, grant.created_at + GRANT_TTL_MS);
    assert_eq!(grant.code.len(), CODE_LEN);

    let listed = invite::list_grants(&pool, &created.id).await?;
    assert_eq!(listed, vec![grant]);
    Ok(())
}

#[tokio::test]
async fn grant_is_consumed_exactly_once() -> Result<()> {
    let pool = util::memory_pool().await;
    let created = join::create_household(&pool, "Hill House", "uid-ana").await?;
    let grant = invite::generate_one_time_code(&pool, &created.id, "uid-ana").await?;

    let joined = join::accept_code(&pool, &grant.code, "uid-ben").await?;
    assert_eq!(joined, created.id);

    let replay = join::accept_code(&pool, &grant.code, "uid-cara")
        .await
        .unwrap_err();
    assert_eq!(replay.code(), "CONFLICT/INVALID_CODE");

    let listed = invite::list_grants(&pool, &created.id).await?;
    assert!(listed[0].used);
    assert_eq!(listed[0].used_by.as_deref(), Some("uid-ben"));
    assert!(listed[0].used_at.is_some());
    Ok(())
}

#[tokio::test]
async fn expired_grant_fails_even_when_unused() -> Result<()> {
    let pool = util::memory_pool().await;
    let created = join::create_household(&pool, "Hill House", "uid-ana").await?;
    let grant = invite::generate_one_time_code(&pool, &created.id, "uid-ana").await?;

    sqlx::query("UPDATE invite_grant SET expires_at = 1 WHERE id = ?")
        .bind(&grant.id)
        .execute(&pool)
        .await?;

    let err = join::accept_code(&pool, &grant.code, "uid-ben")
        .await
        .unwrap_err();
    assert_eq!(err.code(), "CONFLICT/INVALID_CODE");

    let listed = invite::list_grants(&pool, &created.id).await?;
    assert!(!listed[0].used, "expiry must not consume the grant");
    Ok(())
}

#[tokio::test]
async fn codes_are_accepted_case_insensitively() -> Result<()> {
    let pool = util::memory_pool().await;
    let created = join::create_household(&pool, "Hill House", "uid-ana").await?;
    let code = invite::get_or_create_code(&pool, &created.id).await?;

    let joined = join::accept_code(&pool, &format!("  {}  ", code.to_lowercase()), "uid-ben").await?;
    assert_eq!(joined, created.id);
    Ok(())
}

proptest! {
    #[test]
    fn normalize_uppercases_any_code_shaped_input(raw in "[a-zA-Z0-9]{6}") {
        let normalized = normalize_code(&raw);
        prop_assert_eq!(normalized.len(), CODE_LEN);
        prop_assert!(normalized.chars().all(|c| c.is_ascii_uppercase() || c.is_ascii_digit()));
        prop_assert_eq!(normalized.clone(), normalize_code(&normalized));
    }
}
