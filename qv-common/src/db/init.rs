//! Database initialization
//!
//! Creates the database on first run, creates every table idempotently,
//! runs versioned migrations and seeds default settings.

use sqlx::{sqlite::SqlitePoolOptions, SqlitePool};
use std::path::Path;
use tracing::{info, warn};
use uuid::Uuid;

use crate::config::QvConfig;
use crate::Result;

/// Bootstrap administrator created on first run
pub const BOOTSTRAP_ADMIN_ID: &str = "00000000-0000-0000-0000-000000000001";
pub const BOOTSTRAP_ADMIN_USERNAME: &str = "admin";

/// Runtime setting keys
pub const SETTING_SHIFT_PATTERN: &str = "shift_pattern";
pub const SETTING_SAMPLING_INTERVAL: &str = "sampling_interval_minutes";
pub const SETTING_MAX_SUBGROUPS: &str = "sampling_max_subgroups";

/// Initialize database connection and create tables if needed
pub async fn init_database(db_path: &Path, config: &QvConfig) -> Result<SqlitePool> {
    let newly_created = !db_path.exists();

    // Create parent directory if it doesn't exist
    if let Some(parent) = db_path.parent() {
        std::fs::create_dir_all(parent)?;
    }

    let db_url = format!("sqlite://{}?mode=rwc", db_path.display());
    let pool = SqlitePoolOptions::new()
        .max_connections(10)
        .min_connections(1)
        .connect(&db_url)
        .await?;

    if newly_created {
        info!("Initialized new database: {}", db_path.display());
    } else {
        info!("Opened existing database: {}", db_path.display());
    }

    // WAL lets dashboards read while a review is being written
    sqlx::query("PRAGMA journal_mode = WAL")
        .execute(&pool)
        .await?;

    sqlx::query("PRAGMA busy_timeout = 5000")
        .execute(&pool)
        .await?;

    init_schema(&pool, config).await?;

    Ok(pool)
}

/// Single-connection in-memory database with the full schema
pub async fn init_memory_database(config: &QvConfig) -> Result<SqlitePool> {
    let pool = SqlitePoolOptions::new()
        .max_connections(1)
        .connect("sqlite::memory:")
        .await?;

    init_schema(&pool, config).await?;
    Ok(pool)
}

/// Create tables, run migrations and seed defaults (idempotent)
pub async fn init_schema(pool: &SqlitePool, config: &QvConfig) -> Result<()> {
    sqlx::query("PRAGMA foreign_keys = ON")
        .execute(pool)
        .await?;

    create_schema_version_table(pool).await?;
    create_settings_table(pool).await?;
    create_users_table(pool).await?;
    create_sampling_configs_table(pool).await?;
    create_verification_statuses_table(pool).await?;
    create_checklists_table(pool).await?;
    create_subgroups_table(pool).await?;
    create_equipment_tables(pool).await?;
    create_ftq_tables(pool).await?;
    create_approval_history_table(pool).await?;

    crate::db::migrations::run_migrations(pool).await?;

    init_default_settings(pool, config).await?;
    ensure_default_sampling_config(pool, config).await?;

    Ok(())
}

async fn create_schema_version_table(pool: &SqlitePool) -> Result<()> {
    sqlx::query(
        r#"
        CREATE TABLE IF NOT EXISTS schema_version (
            version INTEGER PRIMARY KEY,
            applied_at TIMESTAMP NOT NULL DEFAULT CURRENT_TIMESTAMP
        )
        "#,
    )
    .execute(pool)
    .await?;

    Ok(())
}

/// Stores runtime configuration key-value pairs
pub async fn create_settings_table(pool: &SqlitePool) -> Result<()> {
    sqlx::query(
        r#"
        CREATE TABLE IF NOT EXISTS settings (
            key TEXT PRIMARY KEY,
            value TEXT,
            updated_at TIMESTAMP NOT NULL DEFAULT CURRENT_TIMESTAMP
        )
        "#,
    )
    .execute(pool)
    .await?;

    Ok(())
}

async fn create_users_table(pool: &SqlitePool) -> Result<()> {
    sqlx::query(
        r#"
        CREATE TABLE IF NOT EXISTS users (
            id TEXT PRIMARY KEY,
            username TEXT NOT NULL UNIQUE,
            display_name TEXT NOT NULL,
            role TEXT NOT NULL CHECK (role IN ('operator', 'shift_supervisor', 'quality_supervisor', 'admin')),
            active INTEGER NOT NULL DEFAULT 1,
            created_at TIMESTAMP NOT NULL DEFAULT CURRENT_TIMESTAMP
        )
        "#,
    )
    .execute(pool)
    .await?;

    // Bootstrap administrator so the first real accounts can be created
    sqlx::query(
        r#"
        INSERT OR IGNORE INTO users (id, username, display_name, role)
        VALUES (?, ?, 'Administrator', 'admin')
        "#,
    )
    .bind(BOOTSTRAP_ADMIN_ID)
    .bind(BOOTSTRAP_ADMIN_USERNAME)
    .execute(pool)
    .await?;

    Ok(())
}

async fn create_sampling_configs_table(pool: &SqlitePool) -> Result<()> {
    sqlx::query(
        r#"
        CREATE TABLE IF NOT EXISTS sampling_configs (
            id TEXT PRIMARY KEY,
            name TEXT NOT NULL,
            interval_minutes INTEGER NOT NULL,
            max_subgroups INTEGER NOT NULL,
            active INTEGER NOT NULL DEFAULT 1,
            created_at TIMESTAMP NOT NULL DEFAULT CURRENT_TIMESTAMP
        )
        "#,
    )
    .execute(pool)
    .await?;

    Ok(())
}

async fn create_verification_statuses_table(pool: &SqlitePool) -> Result<()> {
    sqlx::query(
        r#"
        CREATE TABLE IF NOT EXISTS verification_statuses (
            id TEXT PRIMARY KEY,
            operator_id TEXT NOT NULL REFERENCES users(id),
            date DATE NOT NULL,
            shift TEXT NOT NULL,
            status TEXT NOT NULL DEFAULT 'pending',
            notify_supervisor INTEGER NOT NULL DEFAULT 0,
            notify_quality INTEGER NOT NULL DEFAULT 0,
            notify_operator INTEGER NOT NULL DEFAULT 0,
            created_at TIMESTAMP NOT NULL,
            updated_at TIMESTAMP NOT NULL,
            UNIQUE (operator_id, date, shift)
        )
        "#,
    )
    .execute(pool)
    .await?;

    Ok(())
}

async fn create_checklists_table(pool: &SqlitePool) -> Result<()> {
    sqlx::query(
        r#"
        CREATE TABLE IF NOT EXISTS checklists (
            id TEXT PRIMARY KEY,
            verification_id TEXT NOT NULL UNIQUE
                REFERENCES verification_statuses(id) ON DELETE CASCADE,
            model TEXT NOT NULL,
            line TEXT NOT NULL,
            machine TEXT NOT NULL,
            shift_start TIMESTAMP NOT NULL,
            sampling_config_id TEXT REFERENCES sampling_configs(id),
            readings TEXT NOT NULL DEFAULT '{}',
            status TEXT NOT NULL DEFAULT 'pending',
            supervisor_by TEXT,
            supervisor_at TIMESTAMP,
            quality_by TEXT,
            quality_at TIMESTAMP,
            rejected_by TEXT,
            rejected_at TIMESTAMP,
            rejection_reason TEXT,
            created_at TIMESTAMP NOT NULL,
            updated_at TIMESTAMP NOT NULL
        )
        "#,
    )
    .execute(pool)
    .await?;

    Ok(())
}

async fn create_subgroups_table(pool: &SqlitePool) -> Result<()> {
    sqlx::query(
        r#"
        CREATE TABLE IF NOT EXISTS subgroups (
            id TEXT PRIMARY KEY,
            checklist_id TEXT NOT NULL REFERENCES checklists(id) ON DELETE CASCADE,
            sequence INTEGER NOT NULL,
            recorded_at TIMESTAMP NOT NULL,
            readings TEXT NOT NULL DEFAULT '[]',
            status TEXT NOT NULL DEFAULT 'pending',
            supervisor_by TEXT,
            supervisor_at TIMESTAMP,
            quality_by TEXT,
            quality_at TIMESTAMP,
            rejected_by TEXT,
            rejected_at TIMESTAMP,
            rejection_reason TEXT,
            UNIQUE (checklist_id, sequence)
        )
        "#,
    )
    .execute(pool)
    .await?;

    Ok(())
}

async fn create_equipment_tables(pool: &SqlitePool) -> Result<()> {
    sqlx::query(
        r#"
        CREATE TABLE IF NOT EXISTS equipment_checks (
            id TEXT PRIMARY KEY,
            verification_id TEXT NOT NULL UNIQUE
                REFERENCES verification_statuses(id) ON DELETE CASCADE,
            kind TEXT NOT NULL,
            status TEXT NOT NULL DEFAULT 'pending',
            supervisor_by TEXT,
            supervisor_at TIMESTAMP,
            quality_by TEXT,
            quality_at TIMESTAMP,
            rejected_by TEXT,
            rejected_at TIMESTAMP,
            rejection_reason TEXT,
            created_at TIMESTAMP NOT NULL,
            updated_at TIMESTAMP NOT NULL
        )
        "#,
    )
    .execute(pool)
    .await?;

    sqlx::query(
        r#"
        CREATE TABLE IF NOT EXISTS equipment_check_entries (
            check_id TEXT NOT NULL REFERENCES equipment_checks(id) ON DELETE CASCADE,
            code TEXT NOT NULL,
            position INTEGER NOT NULL,
            description TEXT NOT NULL,
            status TEXT CHECK (status IS NULL OR status IN ('OK', 'NG', 'NA')),
            comment TEXT,
            PRIMARY KEY (check_id, code)
        )
        "#,
    )
    .execute(pool)
    .await?;

    sqlx::query(
        r#"
        CREATE TABLE IF NOT EXISTS equipment_check_history (
            id INTEGER PRIMARY KEY AUTOINCREMENT,
            check_id TEXT NOT NULL REFERENCES equipment_checks(id),
            checkpoint_code TEXT NOT NULL,
            field TEXT NOT NULL,
            old_value TEXT,
            new_value TEXT,
            changed_by TEXT NOT NULL,
            changed_at TIMESTAMP NOT NULL
        )
        "#,
    )
    .execute(pool)
    .await?;

    Ok(())
}

async fn create_ftq_tables(pool: &SqlitePool) -> Result<()> {
    sqlx::query(
        r#"
        CREATE TABLE IF NOT EXISTS ftq_records (
            id TEXT PRIMARY KEY,
            verification_id TEXT NOT NULL UNIQUE
                REFERENCES verification_statuses(id) ON DELETE CASCADE,
            date DATE NOT NULL,
            shift TEXT NOT NULL,
            model TEXT NOT NULL,
            total_inspected INTEGER NOT NULL DEFAULT 0,
            total_defects INTEGER NOT NULL DEFAULT 0,
            status TEXT NOT NULL DEFAULT 'pending',
            supervisor_by TEXT,
            supervisor_at TIMESTAMP,
            quality_by TEXT,
            quality_at TIMESTAMP,
            rejected_by TEXT,
            rejected_at TIMESTAMP,
            rejection_reason TEXT,
            created_at TIMESTAMP NOT NULL,
            updated_at TIMESTAMP NOT NULL
        )
        "#,
    )
    .execute(pool)
    .await?;

    sqlx::query(
        r#"
        CREATE TABLE IF NOT EXISTS defect_records (
            id TEXT PRIMARY KEY,
            ftq_id TEXT NOT NULL REFERENCES ftq_records(id) ON DELETE CASCADE,
            operation TEXT NOT NULL,
            defect_type TEXT NOT NULL,
            count INTEGER NOT NULL CHECK (count >= 0),
            created_at TIMESTAMP NOT NULL
        )
        "#,
    )
    .execute(pool)
    .await?;

    Ok(())
}

async fn create_approval_history_table(pool: &SqlitePool) -> Result<()> {
    sqlx::query(
        r#"
        CREATE TABLE IF NOT EXISTS approval_history (
            id INTEGER PRIMARY KEY AUTOINCREMENT,
            record_type TEXT NOT NULL,
            record_id TEXT NOT NULL,
            from_status TEXT,
            to_status TEXT NOT NULL,
            action TEXT NOT NULL,
            actor_id TEXT NOT NULL,
            comment TEXT,
            at TIMESTAMP NOT NULL
        )
        "#,
    )
    .execute(pool)
    .await?;

    Ok(())
}

/// Ensure all runtime settings exist, seeding them from the bootstrap config
async fn init_default_settings(pool: &SqlitePool, config: &QvConfig) -> Result<()> {
    ensure_setting(pool, SETTING_SHIFT_PATTERN, config.shifts.pattern.as_str()).await?;
    ensure_setting(
        pool,
        SETTING_SAMPLING_INTERVAL,
        &config.sampling.interval_minutes.to_string(),
    )
    .await?;
    ensure_setting(
        pool,
        SETTING_MAX_SUBGROUPS,
        &config.sampling.max_subgroups.to_string(),
    )
    .await?;

    Ok(())
}

/// Insert a setting if missing; reset NULL values to the default
async fn ensure_setting(pool: &SqlitePool, key: &str, default_value: &str) -> Result<()> {
    let value: Option<Option<String>> =
        sqlx::query_scalar("SELECT value FROM settings WHERE key = ?")
            .bind(key)
            .fetch_optional(pool)
            .await?;

    match value {
        None => {
            sqlx::query("INSERT OR IGNORE INTO settings (key, value) VALUES (?, ?)")
                .bind(key)
                .bind(default_value)
                .execute(pool)
                .await?;
            info!("Initialized setting '{}' with default value: {}", key, default_value);
        }
        Some(None) => {
            sqlx::query("UPDATE settings SET value = ?, updated_at = CURRENT_TIMESTAMP WHERE key = ?")
                .bind(default_value)
                .bind(key)
                .execute(pool)
                .await?;
            warn!("Setting '{}' was NULL, reset to default: {}", key, default_value);
        }
        Some(Some(_)) => {}
    }

    Ok(())
}

/// Make sure one active sampling config exists
async fn ensure_default_sampling_config(pool: &SqlitePool, config: &QvConfig) -> Result<()> {
    let active: i64 = sqlx::query_scalar("SELECT COUNT(*) FROM sampling_configs WHERE active = 1")
        .fetch_one(pool)
        .await?;

    if active == 0 {
        sqlx::query(
            r#"
            INSERT INTO sampling_configs (id, name, interval_minutes, max_subgroups, active)
            VALUES (?, 'default', ?, ?, 1)
            "#,
        )
        .bind(Uuid::new_v4().to_string())
        .bind(config.sampling.interval_minutes)
        .bind(config.sampling.max_subgroups)
        .execute(pool)
        .await?;
        info!(
            "Created default sampling config ({} min, {} subgroups)",
            config.sampling.interval_minutes, config.sampling.max_subgroups
        );
    }

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_memory_database_has_schema_and_defaults() {
        let pool = init_memory_database(&QvConfig::default()).await.unwrap();

        let pattern: String =
            sqlx::query_scalar("SELECT value FROM settings WHERE key = 'shift_pattern'")
                .fetch_one(&pool)
                .await
                .unwrap();
        assert_eq!(pattern, "rotating");

        let admins: i64 = sqlx::query_scalar("SELECT COUNT(*) FROM users WHERE role = 'admin'")
            .fetch_one(&pool)
            .await
            .unwrap();
        assert_eq!(admins, 1);

        let configs: i64 = sqlx::query_scalar("SELECT COUNT(*) FROM sampling_configs")
            .fetch_one(&pool)
            .await
            .unwrap();
        assert_eq!(configs, 1);
    }

    #[tokio::test]
    async fn test_init_schema_is_idempotent() {
        let config = QvConfig::default();
        let pool = init_memory_database(&config).await.unwrap();
        init_schema(&pool, &config).await.unwrap();

        let configs: i64 = sqlx::query_scalar("SELECT COUNT(*) FROM sampling_configs")
            .fetch_one(&pool)
            .await
            .unwrap();
        assert_eq!(configs, 1);
    }

    #[tokio::test]
    async fn test_null_setting_reset_to_default() {
        let config = QvConfig::default();
        let pool = init_memory_database(&config).await.unwrap();
        sqlx::query("UPDATE settings SET value = NULL WHERE key = 'sampling_max_subgroups'")
            .execute(&pool)
            .await
            .unwrap();

        init_schema(&pool, &config).await.unwrap();

        let value: String =
            sqlx::query_scalar("SELECT value FROM settings WHERE key = 'sampling_max_subgroups'")
                .fetch_one(&pool)
                .await
                .unwrap();
        assert_eq!(value, "6");
    }
}
