use anyhow::Result;
use larder_lib::{join, profile, ProfileData};

#[path = "util.rs"]
mod util;

#[tokio::test]
async fn create_profile_defaults_to_unlinked() -> Result<()> {
    let pool = util::memory_pool().await;
    let created = profile::create_profile(
        &pool,
        "ana@example.com",
        ProfileData {
            uid: "uid-ana".into(),
            name: "Ana".into(),
            allergies: vec!["shellfish".into()],
            ..Default::default()
        },
    )
    .await?;

    let found = profile::get_profile(&pool, &created.id)
        .await?
        .expect("profile exists");
    assert_eq!(found, created);
    assert_eq!(found.household_id, None);
    assert_eq!(found.allergies, vec!["shellfish".to_string()]);
    assert!(found.preferred_foods.is_empty());
    Ok(())
}

#[tokio::test]
async fn create_profile_honors_supplied_household_id() -> Result<()> {
    let pool = util::memory_pool().await;
    let household = join::create_household(&pool, "Hill House", "uid-owner").await?;

    let created = profile::create_profile(
        &pool,
        "ben@example.com",
        ProfileData {
            uid: "uid-ben".into(),
            household_id: Some(household.id.clone()),
            ..Default::default()
        },
    )
    .await?;
    assert_eq!(created.household_id.as_deref(), Some(household.id.as_str()));
    Ok(())
}

#[tokio::test]
async fn link_by_profile_id_sets_pointer_without_verification() -> Result<()> {
    let pool = util::memory_pool().await;
    let created = profile::create_profile(
        &pool,
        "ana@example.com",
        ProfileData {
            uid: "uid-ana".into(),
            ..Default::default()
        },
    )
    .await?;

    // The linker verifies nothing; ordering relative to membership is the
    // caller's obligation. Even a dangling household id is accepted.
    profile::link_profile_to_household(&pool, &created.id, "hh-not-verified").await?;

    let found = profile::get_profile(&pool, &created.id)
        .await?
        .expect("profile exists");
    assert_eq!(found.household_id.as_deref(), Some("hh-not-verified"));
    Ok(())
}

#[tokio::test]
async fn link_by_uid_tolerates_missing_profile() -> Result<()> {
    let pool = util::memory_pool().await;
    let updated = profile::link_profile_by_uid(&pool, "uid-nobody", "hh-1").await?;
    assert_eq!(updated, 0);
    Ok(())
}
