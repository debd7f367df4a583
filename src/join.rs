//! Orchestration of household creation and invite acceptance.
//!
//! The store supports multi-row atomic commits, so both flows run as a single
//! transaction instead of a chain of dependent writes: code consumption,
//! member admission, linkage and profile link commit together or roll back
//! together. A retry after a failure never observes a burned one-time code
//! without the matching membership. The individual steps stay idempotent
//! (`INSERT OR IGNORE`, unconditional single-field update) so a replayed
//! request is harmless.

use futures::FutureExt;
use sqlx::SqlitePool;
use tracing::info;

use crate::db::{run_in_tx, with_store_timeout};
use crate::household::{add_member, insert_household, Household};
use crate::invite::validate_and_consume;
use crate::linkage::ensure_linkage;
use crate::profile::link_profile_by_uid;
use crate::repo::require_field;
use crate::{AppError, AppResult};

/// Create a household owned by `owner_uid`, with the owner admitted, linked,
/// and their profile (when one exists) pointed at the new household.
pub async fn create_household(
    pool: &SqlitePool,
    name: &str,
    owner_uid: &str,
) -> AppResult<Household> {
    let name = require_field("name", name)?.to_string();
    let owner_uid = require_field("ownerUid", owner_uid)?.to_string();

    let household = with_store_timeout(
        "create_household",
        run_in_tx(pool, |tx| {
            async move {
                let household = insert_household(&mut *tx, &name, &owner_uid).await?;
                ensure_linkage(&mut *tx, &owner_uid, &household.id).await?;
                link_profile_by_uid(&mut *tx, &owner_uid, &household.id).await?;
                Ok::<_, AppError>(household)
            }
            .boxed()
        }),
    )
    .await
    .map_err(|err| err.with_context("operation", "create_household"))?;

    info!(
        target = "larder",
        event = "household_created",
        household_id = %household.id,
        owner_uid = %household.owner_id
    );
    Ok(household)
}

/// Accept an invite code for `uid`, returning the joined household's id.
///
/// Validation and consumption happen first; a code that resolves to a
/// household the uid already belongs to fails with `CONFLICT/ALREADY_MEMBER`
/// before anything is mutated.
pub async fn accept_code(pool: &SqlitePool, code: &str, uid: &str) -> AppResult<String> {
    let code = require_field("code", code)?.to_string();
    let uid = require_field("uid", uid)?.to_string();

    let (household_id, uid) = with_store_timeout(
        "accept_code",
        run_in_tx(pool, |tx| {
            async move {
                let household_id = validate_and_consume(&mut *tx, &code, &uid)
                    .await
                    .map_err(AppError::from)?;
                add_member(&mut *tx, &household_id, &uid).await?;
                ensure_linkage(&mut *tx, &uid, &household_id).await?;
                link_profile_by_uid(&mut *tx, &uid, &household_id).await?;
                Ok::<_, AppError>((household_id, uid))
            }
            .boxed()
        }),
    )
    .await
    .map_err(|err| err.with_context("operation", "accept_code"))?;

    info!(
        target = "larder",
        event = "member_joined",
        household_id = %household_id,
        uid = %uid
    );
    Ok(household_id)
}
