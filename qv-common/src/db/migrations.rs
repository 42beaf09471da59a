//! Database schema migrations
//!
//! Versioned, idempotent migrations tracked in the `schema_version` table.
//! Tables themselves are created with `CREATE TABLE IF NOT EXISTS` in
//! [`crate::db::init`]; migrations hold everything layered on top.
//!
//! Never modify an existing migration. Add a new `migrate_vN` and bump
//! [`CURRENT_SCHEMA_VERSION`].

use sqlx::SqlitePool;
use tracing::{info, warn};

use crate::Result;

/// Current schema version
///
/// **IMPORTANT:** Increment this when adding new migrations
pub const CURRENT_SCHEMA_VERSION: i32 = 2;

/// Get current schema version from database
///
/// Returns 0 if schema_version table doesn't exist or has no rows
pub async fn get_schema_version(pool: &SqlitePool) -> Result<i32> {
    let table_exists: bool = sqlx::query_scalar(
        r#"
        SELECT EXISTS(
            SELECT 1 FROM sqlite_master
            WHERE type='table' AND name='schema_version'
        )
        "#,
    )
    .fetch_one(pool)
    .await?;

    if !table_exists {
        return Ok(0);
    }

    let version: Option<i32> =
        sqlx::query_scalar("SELECT version FROM schema_version ORDER BY version DESC LIMIT 1")
            .fetch_optional(pool)
            .await?;

    Ok(version.unwrap_or(0))
}

async fn set_schema_version(pool: &SqlitePool, version: i32) -> Result<()> {
    sqlx::query("INSERT OR IGNORE INTO schema_version (version) VALUES (?)")
        .bind(version)
        .execute(pool)
        .await?;

    Ok(())
}

/// Run all pending migrations
pub async fn run_migrations(pool: &SqlitePool) -> Result<()> {
    let current_version = get_schema_version(pool).await?;

    if current_version == CURRENT_SCHEMA_VERSION {
        info!("Database schema is up to date (v{})", current_version);
        return Ok(());
    }

    if current_version > CURRENT_SCHEMA_VERSION {
        warn!(
            "Database schema version ({}) is newer than code version ({})",
            current_version, CURRENT_SCHEMA_VERSION
        );
        warn!("This may indicate a downgrade. Proceeding with caution.");
        return Ok(());
    }

    info!(
        "Running database migrations: v{} -> v{}",
        current_version, CURRENT_SCHEMA_VERSION
    );

    if current_version < 1 {
        migrate_v1(pool).await?;
        set_schema_version(pool, 1).await?;
        info!("✓ Migration v1 completed");
    }

    if current_version < 2 {
        migrate_v2(pool).await?;
        set_schema_version(pool, 2).await?;
        info!("✓ Migration v2 completed");
    }

    info!("All migrations completed successfully");
    Ok(())
}

/// Migration v1: make the audit tables append-only
///
/// Equipment check history and approval history rows may be inserted but
/// never updated or deleted.
async fn migrate_v1(pool: &SqlitePool) -> Result<()> {
    info!("Running migration v1: append-only audit tables");

    for table in ["equipment_check_history", "approval_history"] {
        for op in ["UPDATE", "DELETE"] {
            let sql = format!(
                r#"
                CREATE TRIGGER IF NOT EXISTS {table}_no_{op_lower}
                BEFORE {op} ON {table}
                BEGIN
                    SELECT RAISE(ABORT, '{table} is append-only');
                END
                "#,
                table = table,
                op = op,
                op_lower = op.to_lowercase(),
            );
            sqlx::query(&sql).execute(pool).await?;
        }
    }

    info!("  ✓ Added append-only triggers");
    Ok(())
}

/// Migration v2: indexes for report and dashboard queries
async fn migrate_v2(pool: &SqlitePool) -> Result<()> {
    info!("Running migration v2: reporting indexes");

    let statements = [
        "CREATE INDEX IF NOT EXISTS idx_verification_date ON verification_statuses(date, shift)",
        "CREATE INDEX IF NOT EXISTS idx_ftq_date ON ftq_records(date)",
        "CREATE INDEX IF NOT EXISTS idx_defects_ftq ON defect_records(ftq_id)",
        "CREATE INDEX IF NOT EXISTS idx_history_record ON approval_history(record_type, record_id)",
        "CREATE INDEX IF NOT EXISTS idx_equipment_history_check ON equipment_check_history(check_id)",
    ];
    for sql in statements {
        sqlx::query(sql).execute(pool).await?;
    }

    info!("  ✓ Created reporting indexes");
    Ok(())
}
