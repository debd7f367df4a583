//! Drift repair between the household member set and per-user records.
//!
//! Roster reads for the rest of the application come through here, never
//! straight off the profile table: a uid can be admitted before its profile
//! points back at the household, and these reads must not lose such members.

use std::collections::{HashMap, HashSet};

use serde::{Deserialize, Serialize};
use sqlx::SqlitePool;
use ts_rs::TS;

use crate::household::member_uids;
use crate::linkage::linkages_for_household;
use crate::profile::{profiles_by_household, profiles_by_uids, Profile};
use crate::repo::value_set_chunks;
use crate::AppResult;

/// One roster entry per member uid, regardless of profile state.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, TS)]
#[serde(rename_all = "camelCase")]
#[ts(export, export_to = "bindings/")]
pub struct MemberEntry {
    pub uid: String,
    pub household_id: String,
}

/// Resolve every member uid against the linkage index.
///
/// A member whose linkage record has not landed yet still gets an entry;
/// membership is the source of truth here.
pub async fn get_household_members(
    pool: &SqlitePool,
    household_id: &str,
) -> AppResult<Vec<MemberEntry>> {
    let uids = member_uids(pool, household_id).await?;
    let linkages = linkages_for_household(pool, household_id).await?;
    let linked: HashMap<String, String> = linkages
        .into_iter()
        .map(|l| (l.uid, l.household_id))
        .collect();

    let entries = uids
        .into_iter()
        .map(|uid| {
            let household_id = linked
                .get(&uid)
                .cloned()
                .unwrap_or_else(|| household_id.to_string());
            MemberEntry { uid, household_id }
        })
        .collect();
    Ok(entries)
}

/// Load the household roster's profiles.
///
/// Primary query selects profiles already linked to the household; a second
/// pass fetches members the primary query missed, batched to the store's
/// "value in set" ceiling, then merges and dedupes by profile id.
pub async fn load_profiles(pool: &SqlitePool, household_id: &str) -> AppResult<Vec<Profile>> {
    let mut profiles = profiles_by_household(pool, household_id).await?;

    let members = member_uids(pool, household_id).await?;
    let found: HashSet<&str> = profiles.iter().map(|p| p.uid.as_str()).collect();
    let missing: Vec<String> = members
        .into_iter()
        .filter(|uid| !found.contains(uid.as_str()))
        .collect();

    if !missing.is_empty() {
        tracing::debug!(
            target = "larder",
            event = "roster_reconcile",
            household_id,
            missing = missing.len()
        );
        for chunk in value_set_chunks(&missing) {
            let batch = profiles_by_uids(pool, chunk).await?;
            profiles.extend(batch);
        }
    }

    let mut seen: HashSet<String> = HashSet::with_capacity(profiles.len());
    profiles.retain(|p| seen.insert(p.id.clone()));
    Ok(profiles)
}
