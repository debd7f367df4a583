use anyhow::Result;
use larder_lib::{household, join, linkage, profile, ProfileData};

#[path = "util.rs"]
mod util;

#[tokio::test]
async fn create_seeds_owner_member_linkage_and_profile_link() -> Result<()> {
    let pool = util::memory_pool().await;
    profile::create_profile(
        &pool,
        "ana@example.com",
        ProfileData {
            uid: "uid-ana".into(),
            name: "Ana".into(),
            ..Default::default()
        },
    )
    .await?;

    let created = join::create_household(&pool, "Hill House", "uid-ana").await?;

    let found = household::get_household(&pool, &created.id)
        .await?
        .expect("household exists");
    assert_eq!(found.name, "Hill House");
    assert_eq!(found.owner_id, "uid-ana");
    assert_eq!(found.invite_code, None);

    let members = household::member_uids(&pool, &created.id).await?;
    assert_eq!(members, vec!["uid-ana".to_string()]);

    let link = linkage::linkage_for_uid(&pool, "uid-ana", &created.id).await?;
    assert!(link.is_some(), "owner linkage record missing");

    let profiles = profile::profiles_by_household(&pool, &created.id).await?;
    assert_eq!(profiles.len(), 1);
    assert_eq!(profiles[0].household_id.as_deref(), Some(created.id.as_str()));
    Ok(())
}

#[tokio::test]
async fn create_without_profile_still_succeeds() -> Result<()> {
    let pool = util::memory_pool().await;
    let created = join::create_household(&pool, "No Profile Yet", "uid-solo").await?;
    assert_eq!(
        household::member_uids(&pool, &created.id).await?,
        vec!["uid-solo".to_string()]
    );
    Ok(())
}

#[tokio::test]
async fn create_rejects_blank_name() -> Result<()> {
    let pool = util::memory_pool().await;
    let err = join::create_household(&pool, "   ", "uid-ana").await.unwrap_err();
    assert_eq!(err.code(), "VALIDATION/MISSING_FIELD");
    Ok(())
}

#[tokio::test]
async fn add_member_is_idempotent() -> Result<()> {
    let pool = util::memory_pool().await;
    let created = join::create_household(&pool, "Hill House", "uid-ana").await?;

    assert!(household::add_member(&pool, &created.id, "uid-ben").await?);
    assert!(!household::add_member(&pool, &created.id, "uid-ben").await?);

    let members = household::member_uids(&pool, &created.id).await?;
    assert_eq!(members.len(), 2);
    assert!(household::is_member(&pool, &created.id, "uid-ben").await?);
    Ok(())
}

#[tokio::test]
async fn get_household_missing_returns_none() -> Result<()> {
    let pool = util::memory_pool().await;
    assert!(household::get_household(&pool, "no-such-id").await?.is_none());
    Ok(())
}
