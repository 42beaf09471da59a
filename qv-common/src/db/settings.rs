//! Runtime settings access
//!
//! Key-value rows in the `settings` table. Supervisors change these while
//! the service runs; the TOML file only seeds them.

use serde::{Deserialize, Serialize};
use sqlx::{Executor, Pool, Sqlite, SqliteConnection};
use std::str::FromStr;

use crate::db::init::{SETTING_MAX_SUBGROUPS, SETTING_SAMPLING_INTERVAL, SETTING_SHIFT_PATTERN};
use crate::sampling::{check_bounds, SamplingPlan};
use crate::shift::ShiftPattern;
use crate::{Error, Result};

/// Settings exposed through the settings endpoint
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct RuntimeSettings {
    pub shift_pattern: ShiftPattern,
    pub sampling_interval_minutes: i64,
    pub sampling_max_subgroups: i64,
}

impl RuntimeSettings {
    /// Default plan for checklists without an attached sampling config
    pub fn sampling_plan(&self) -> SamplingPlan {
        SamplingPlan::from_minutes(
            Some(self.sampling_interval_minutes),
            Some(self.sampling_max_subgroups),
        )
    }
}

/// Generic setting getter
///
/// Returns `None` for missing keys and NULL values.
pub async fn get_setting<T: FromStr>(db: &Pool<Sqlite>, key: &str) -> Result<Option<T>> {
    let value: Option<Option<String>> =
        sqlx::query_scalar("SELECT value FROM settings WHERE key = ?")
            .bind(key)
            .fetch_optional(db)
            .await?;

    match value.flatten() {
        Some(s) => match s.parse::<T>() {
            Ok(parsed) => Ok(Some(parsed)),
            Err(_) => Err(Error::Config(format!(
                "Failed to parse setting '{}' value: {}",
                key, s
            ))),
        },
        None => Ok(None),
    }
}

/// Generic setting setter (insert or update)
pub async fn set_setting<'e, E, T>(db: E, key: &str, value: T) -> Result<()>
where
    E: Executor<'e, Database = Sqlite>,
    T: ToString,
{
    sqlx::query(
        r#"
        INSERT INTO settings (key, value, updated_at)
        VALUES (?, ?, CURRENT_TIMESTAMP)
        ON CONFLICT(key) DO UPDATE SET value = excluded.value, updated_at = excluded.updated_at
        "#,
    )
    .bind(key)
    .bind(value.to_string())
    .execute(db)
    .await?;

    Ok(())
}

pub async fn get_shift_pattern(db: &Pool<Sqlite>) -> Result<ShiftPattern> {
    Ok(get_setting::<ShiftPattern>(db, SETTING_SHIFT_PATTERN)
        .await?
        .unwrap_or_default())
}

pub async fn load_runtime_settings(db: &Pool<Sqlite>) -> Result<RuntimeSettings> {
    let defaults = SamplingPlan::default();
    Ok(RuntimeSettings {
        shift_pattern: get_shift_pattern(db).await?,
        sampling_interval_minutes: get_setting::<i64>(db, SETTING_SAMPLING_INTERVAL)
            .await?
            .unwrap_or(defaults.interval_minutes()),
        sampling_max_subgroups: get_setting::<i64>(db, SETTING_MAX_SUBGROUPS)
            .await?
            .unwrap_or(defaults.max_subgroups as i64),
    })
}

/// Validate and store all runtime settings
///
/// Takes a connection so callers can pair the write with other changes in
/// one transaction.
pub async fn save_runtime_settings(
    conn: &mut SqliteConnection,
    settings: &RuntimeSettings,
) -> Result<()> {
    check_bounds(
        settings.sampling_interval_minutes,
        settings.sampling_max_subgroups,
    )?;

    set_setting(&mut *conn, SETTING_SHIFT_PATTERN, settings.shift_pattern.as_str()).await?;
    set_setting(&mut *conn, SETTING_SAMPLING_INTERVAL, settings.sampling_interval_minutes).await?;
    set_setting(&mut *conn, SETTING_MAX_SUBGROUPS, settings.sampling_max_subgroups).await?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::QvConfig;
    use crate::db::init::init_memory_database;
    use crate::sampling::{MAX_INTERVAL_MINUTES, MAX_SUBGROUPS_LIMIT};

    #[tokio::test]
    async fn test_get_missing_setting() {
        let pool = init_memory_database(&QvConfig::default()).await.unwrap();
        let value: Option<String> = get_setting(&pool, "nonexistent").await.unwrap();
        assert_eq!(value, None);
    }

    #[tokio::test]
    async fn test_set_and_get_setting() {
        let pool = init_memory_database(&QvConfig::default()).await.unwrap();
        set_setting(&pool, "export_title", "Line 4").await.unwrap();
        set_setting(&pool, "export_title", "Line 5").await.unwrap();

        let value: Option<String> = get_setting(&pool, "export_title").await.unwrap();
        assert_eq!(value.as_deref(), Some("Line 5"));
    }

    #[tokio::test]
    async fn test_unparseable_setting_is_config_error() {
        let pool = init_memory_database(&QvConfig::default()).await.unwrap();
        set_setting(&pool, SETTING_MAX_SUBGROUPS, "many").await.unwrap();

        let err = get_setting::<i64>(&pool, SETTING_MAX_SUBGROUPS).await.unwrap_err();
        assert!(matches!(err, Error::Config(_)));
    }

    #[tokio::test]
    async fn test_runtime_settings_round_trip() {
        let pool = init_memory_database(&QvConfig::default()).await.unwrap();
        let mut settings = load_runtime_settings(&pool).await.unwrap();
        assert_eq!(settings.shift_pattern, ShiftPattern::Rotating);
        assert_eq!(settings.sampling_plan(), SamplingPlan::default());

        settings.shift_pattern = ShiftPattern::TwelveHour;
        settings.sampling_interval_minutes = 60;
        let mut conn = pool.acquire().await.unwrap();
        save_runtime_settings(&mut conn, &settings).await.unwrap();
        drop(conn);

        let reloaded = load_runtime_settings(&pool).await.unwrap();
        assert_eq!(reloaded, settings);
        assert_eq!(reloaded.sampling_plan().interval_minutes(), 60);
    }

    #[tokio::test]
    async fn test_non_positive_values_rejected() {
        let pool = init_memory_database(&QvConfig::default()).await.unwrap();
        let mut settings = load_runtime_settings(&pool).await.unwrap();
        settings.sampling_max_subgroups = 0;
        let mut conn = pool.acquire().await.unwrap();
        assert!(matches!(
            save_runtime_settings(&mut conn, &settings).await,
            Err(Error::InvalidInput(_))
        ));
    }

    #[tokio::test]
    async fn test_oversized_sampling_values_rejected() {
        let pool = init_memory_database(&QvConfig::default()).await.unwrap();
        let original = load_runtime_settings(&pool).await.unwrap();
        let mut conn = pool.acquire().await.unwrap();

        let mut settings = original;
        settings.sampling_interval_minutes = 100_000_000_000;
        assert!(matches!(
            save_runtime_settings(&mut conn, &settings).await,
            Err(Error::InvalidInput(_))
        ));

        let mut settings = original;
        settings.sampling_interval_minutes = MAX_INTERVAL_MINUTES + 1;
        assert!(matches!(
            save_runtime_settings(&mut conn, &settings).await,
            Err(Error::InvalidInput(_))
        ));

        let mut settings = original;
        settings.sampling_max_subgroups = i64::from(MAX_SUBGROUPS_LIMIT) + 1;
        assert!(matches!(
            save_runtime_settings(&mut conn, &settings).await,
            Err(Error::InvalidInput(_))
        ));
        drop(conn);

        assert_eq!(load_runtime_settings(&pool).await.unwrap(), original);
    }
}
