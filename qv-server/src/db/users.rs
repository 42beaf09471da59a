//! User accounts

use chrono::NaiveDateTime;
use sqlx::sqlite::SqliteRow;
use sqlx::{Row, SqliteConnection};
use uuid::Uuid;

use qv_common::models::{Role, User};
use qv_common::Result;

use super::parse_uuid;

fn user_from_row(row: &SqliteRow) -> Result<User> {
    let id: String = row.get("id");
    let role: String = row.get("role");
    Ok(User {
        id: parse_uuid(&id)?,
        username: row.get("username"),
        display_name: row.get("display_name"),
        role: role.parse()?,
        active: row.get("active"),
        created_at: row.get("created_at"),
    })
}

pub async fn insert_user(
    conn: &mut SqliteConnection,
    username: &str,
    display_name: &str,
    role: Role,
    created_at: NaiveDateTime,
) -> Result<User> {
    let user = User {
        id: Uuid::new_v4(),
        username: username.to_string(),
        display_name: display_name.to_string(),
        role,
        active: true,
        created_at,
    };

    sqlx::query(
        r#"
        INSERT INTO users (id, username, display_name, role, active, created_at)
        VALUES (?, ?, ?, ?, 1, ?)
        "#,
    )
    .bind(user.id.to_string())
    .bind(&user.username)
    .bind(&user.display_name)
    .bind(role.as_str())
    .bind(created_at)
    .execute(&mut *conn)
    .await?;

    Ok(user)
}

pub async fn find_by_username(conn: &mut SqliteConnection, username: &str) -> Result<Option<User>> {
    let row = sqlx::query(
        "SELECT id, username, display_name, role, active, created_at FROM users WHERE username = ?",
    )
    .bind(username)
    .fetch_optional(&mut *conn)
    .await?;

    row.as_ref().map(user_from_row).transpose()
}

pub async fn find_by_id(conn: &mut SqliteConnection, id: Uuid) -> Result<Option<User>> {
    let row = sqlx::query(
        "SELECT id, username, display_name, role, active, created_at FROM users WHERE id = ?",
    )
    .bind(id.to_string())
    .fetch_optional(&mut *conn)
    .await?;

    row.as_ref().map(user_from_row).transpose()
}

pub async fn list_users(conn: &mut SqliteConnection) -> Result<Vec<User>> {
    let rows = sqlx::query(
        "SELECT id, username, display_name, role, active, created_at FROM users ORDER BY username",
    )
    .fetch_all(&mut *conn)
    .await?;

    rows.iter().map(user_from_row).collect()
}

pub async fn set_active(conn: &mut SqliteConnection, id: Uuid, active: bool) -> Result<bool> {
    let result = sqlx::query("UPDATE users SET active = ? WHERE id = ?")
        .bind(active)
        .bind(id.to_string())
        .execute(&mut *conn)
        .await?;

    Ok(result.rows_affected() > 0)
}
