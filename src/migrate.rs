use sha2::{Digest, Sha256};
use sqlx::{Executor, Row, SqlitePool};
use tracing::{error, info};

use crate::time::now_ms;

static MIGRATIONS: &[(&str, &str)] = &[
    (
        "202608181200_households.sql",
        include_str!("../migrations/202608181200_households.sql"),
    ),
    (
        "202608181210_invites.sql",
        include_str!("../migrations/202608181210_invites.sql"),
    ),
    (
        "202608181220_profiles.sql",
        include_str!("../migrations/202608181220_profiles.sql"),
    ),
];

fn checksum(sql: &str) -> String {
    let mut hasher = Sha256::new();
    hasher.update(sql.as_bytes());
    format!("{:x}", hasher.finalize())
}

/// Apply pending migrations in order. Each script runs inside its own
/// transaction and is recorded with a checksum; a script that changed after
/// being applied is a hard error.
pub async fn apply_migrations(pool: &SqlitePool) -> anyhow::Result<()> {
    pool.execute(
        "CREATE TABLE IF NOT EXISTS schema_migrations (
            name TEXT PRIMARY KEY,
            checksum TEXT NOT NULL,
            applied_at INTEGER NOT NULL
        )",
    )
    .await?;

    for (name, sql) in MIGRATIONS {
        let sum = checksum(sql);
        let applied = sqlx::query("SELECT checksum FROM schema_migrations WHERE name = ?")
            .bind(name)
            .fetch_optional(pool)
            .await?;

        if let Some(row) = applied {
            let recorded: String = row.try_get("checksum")?;
            if recorded != sum {
                error!(
                    target = "larder",
                    event = "migration_checksum_mismatch",
                    migration = name
                );
                anyhow::bail!("migration {name} changed after being applied");
            }
            continue;
        }

        let mut tx = pool.begin().await?;
        tx.execute(*sql).await.map_err(|e| {
            error!(
                target = "larder",
                event = "migration_failed",
                migration = name,
                error = %e
            );
            e
        })?;
        sqlx::query("INSERT INTO schema_migrations (name, checksum, applied_at) VALUES (?, ?, ?)")
            .bind(name)
            .bind(&sum)
            .bind(now_ms())
            .execute(&mut *tx)
            .await?;
        tx.commit().await?;
        info!(target = "larder", event = "migration_applied", migration = name);
    }

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use sqlx::sqlite::SqlitePoolOptions;

    #[tokio::test]
    async fn migrations_apply_and_are_idempotent() {
        let pool = SqlitePoolOptions::new()
            .max_connections(1)
            .connect("sqlite::memory:")
            .await
            .expect("connect sqlite::memory:");
        apply_migrations(&pool).await.expect("first run");
        apply_migrations(&pool).await.expect("second run");

        let (count,): (i64,) = sqlx::query_as("SELECT COUNT(*) FROM schema_migrations")
            .fetch_one(&pool)
            .await
            .expect("count");
        assert_eq!(count as usize, MIGRATIONS.len());
    }
}
