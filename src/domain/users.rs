//! Usage: Bot user persistence keyed by the Telegram user id.

use crate::shared::error::AppResult;
use crate::shared::time::now_unix_seconds;
use rusqlite::{params, Connection, OptionalExtension};

#[derive(Debug, Clone)]
pub struct User {
    pub id: i64,
    pub telegram_user_id: i64,
    pub created_at: i64,
    pub updated_at: i64,
}

fn row_to_user(row: &rusqlite::Row<'_>) -> Result<User, rusqlite::Error> {
    Ok(User {
        id: row.get("id")?,
        telegram_user_id: row.get("telegram_user_id")?,
        created_at: row.get("created_at")?,
        updated_at: row.get("updated_at")?,
    })
}

pub fn get_by_telegram_id(conn: &Connection, telegram_user_id: i64) -> AppResult<Option<User>> {
    let user = conn
        .query_row(
            "SELECT id, telegram_user_id, created_at, updated_at FROM users WHERE telegram_user_id = ?1",
            params![telegram_user_id],
            row_to_user,
        )
        .optional()?;
    Ok(user)
}

/// Look up the user row for a Telegram id, creating it (with default
/// preferences) on first contact.
pub fn get_or_create(conn: &Connection, telegram_user_id: i64) -> AppResult<User> {
    if telegram_user_id <= 0 {
        return Err("SEC_INVALID_INPUT: telegram_user_id must be > 0".into());
    }

    if let Some(user) = get_by_telegram_id(conn, telegram_user_id)? {
        return Ok(user);
    }

    let now = now_unix_seconds();
    conn.execute(
        "INSERT INTO users (telegram_user_id, created_at, updated_at) VALUES (?1, ?2, ?2)",
        params![telegram_user_id, now],
    )?;
    let user_id = conn.last_insert_rowid();

    crate::domain::preferences::ensure_defaults(conn, user_id)?;

    get_by_telegram_id(conn, telegram_user_id)?
        .ok_or_else(|| "DB_ERROR: user row missing right after insert".into())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::infra::db::test_util::temp_db;

    #[test]
    fn get_or_create_is_idempotent() {
        let (_dir, db) = temp_db();
        let conn = db.open_connection().expect("conn");

        let first = get_or_create(&conn, 42).expect("create");
        let second = get_or_create(&conn, 42).expect("lookup");
        assert_eq!(first.id, second.id);
        assert_eq!(second.telegram_user_id, 42);
    }

    #[test]
    fn creation_seeds_default_preferences() {
        let (_dir, db) = temp_db();
        let conn = db.open_connection().expect("conn");

        let user = get_or_create(&conn, 7).expect("create");
        let prefs = crate::domain::preferences::get(&conn, user.id)
            .expect("query")
            .expect("seeded");
        assert_eq!(prefs.salary_from, 100_000);
        assert_eq!(prefs.professional_roles, "4,6,8,9,34");
    }

    #[test]
    fn non_positive_ids_are_rejected() {
        let (_dir, db) = temp_db();
        let conn = db.open_connection().expect("conn");
        let err = get_or_create(&conn, 0).expect_err("invalid id");
        assert_eq!(err.code(), "SEC_INVALID_INPUT");
    }
}
