//! Sampling frequency configurations

use sqlx::sqlite::SqliteRow;
use sqlx::{Row, SqliteConnection};
use uuid::Uuid;

use qv_common::models::SamplingConfig;
use qv_common::sampling::SamplingPlan;
use qv_common::Result;

use super::parse_uuid;

fn config_from_row(row: &SqliteRow) -> Result<SamplingConfig> {
    let id: String = row.get("id");
    Ok(SamplingConfig {
        id: parse_uuid(&id)?,
        name: row.get("name"),
        interval_minutes: row.get("interval_minutes"),
        max_subgroups: row.get("max_subgroups"),
        active: row.get("active"),
    })
}

pub async fn get(conn: &mut SqliteConnection, id: Uuid) -> Result<Option<SamplingConfig>> {
    let row = sqlx::query(
        "SELECT id, name, interval_minutes, max_subgroups, active FROM sampling_configs WHERE id = ?",
    )
    .bind(id.to_string())
    .fetch_optional(&mut *conn)
    .await?;

    row.as_ref().map(config_from_row).transpose()
}

/// Most recently created active config
pub async fn active(conn: &mut SqliteConnection) -> Result<Option<SamplingConfig>> {
    let row = sqlx::query(
        r#"
        SELECT id, name, interval_minutes, max_subgroups, active
        FROM sampling_configs
        WHERE active = 1
        ORDER BY created_at DESC, rowid DESC
        LIMIT 1
        "#,
    )
    .fetch_optional(&mut *conn)
    .await?;

    row.as_ref().map(config_from_row).transpose()
}

pub async fn insert(
    conn: &mut SqliteConnection,
    name: &str,
    plan: &SamplingPlan,
) -> Result<SamplingConfig> {
    let config = SamplingConfig {
        id: Uuid::new_v4(),
        name: name.to_string(),
        interval_minutes: plan.interval_minutes(),
        max_subgroups: plan.max_subgroups as i64,
        active: true,
    };

    sqlx::query(
        r#"
        INSERT INTO sampling_configs (id, name, interval_minutes, max_subgroups, active)
        VALUES (?, ?, ?, ?, 1)
        "#,
    )
    .bind(config.id.to_string())
    .bind(&config.name)
    .bind(config.interval_minutes)
    .bind(config.max_subgroups)
    .execute(&mut *conn)
    .await?;

    Ok(config)
}

/// Make `plan` the active config; checklists keep the config they were
/// attached to
pub async fn replace_active(
    conn: &mut SqliteConnection,
    name: &str,
    plan: &SamplingPlan,
) -> Result<SamplingConfig> {
    sqlx::query("UPDATE sampling_configs SET active = 0 WHERE active = 1")
        .execute(&mut *conn)
        .await?;
    insert(conn, name, plan).await
}

#[cfg(test)]
mod tests {
    use super::*;
    use qv_common::config::QvConfig;
    use qv_common::db::init::init_memory_database;
    use qv_common::db::settings::{load_runtime_settings, save_runtime_settings};

    #[tokio::test]
    async fn test_settings_and_active_config_roll_back_together() {
        let pool = init_memory_database(&QvConfig::default()).await.unwrap();
        let original = load_runtime_settings(&pool).await.unwrap();

        let mut updated = original;
        updated.sampling_interval_minutes = 30;
        updated.sampling_max_subgroups = 3;

        let mut tx = pool.begin().await.unwrap();
        save_runtime_settings(&mut tx, &updated).await.unwrap();
        replace_active(&mut tx, "settings", &updated.sampling_plan())
            .await
            .unwrap();
        tx.rollback().await.unwrap();

        assert_eq!(load_runtime_settings(&pool).await.unwrap(), original);
        let mut conn = pool.acquire().await.unwrap();
        let config = active(&mut conn).await.unwrap().unwrap();
        assert_eq!(config.interval_minutes, original.sampling_interval_minutes);
        assert_eq!(config.max_subgroups, original.sampling_max_subgroups);
    }

    #[tokio::test]
    async fn test_settings_and_active_config_commit_together() {
        let pool = init_memory_database(&QvConfig::default()).await.unwrap();
        let mut updated = load_runtime_settings(&pool).await.unwrap();
        updated.sampling_interval_minutes = 45;

        let mut tx = pool.begin().await.unwrap();
        save_runtime_settings(&mut tx, &updated).await.unwrap();
        replace_active(&mut tx, "settings", &updated.sampling_plan())
            .await
            .unwrap();
        tx.commit().await.unwrap();

        assert_eq!(load_runtime_settings(&pool).await.unwrap(), updated);
        let mut conn = pool.acquire().await.unwrap();
        let config = active(&mut conn).await.unwrap().unwrap();
        assert_eq!(config.interval_minutes, 45);
    }
}
