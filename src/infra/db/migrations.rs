//! Usage: SQLite schema migrations (user_version + incremental upgrades).

use rusqlite::Connection;

const LATEST_SCHEMA_VERSION: i64 = 1;

pub(super) fn apply_migrations(conn: &mut Connection) -> crate::shared::error::AppResult<()> {
    let mut user_version = read_user_version(conn)?;

    if user_version < 0 || user_version > LATEST_SCHEMA_VERSION {
        return Err(format!(
            "unsupported sqlite schema version: user_version={user_version} (expected 0..={LATEST_SCHEMA_VERSION})"
        )
        .into());
    }

    let start_version = user_version;

    // Fresh install: create the complete schema at v1.
    if user_version == 0 {
        create_baseline_v1(conn)?;
        user_version = read_user_version(conn)?;
        tracing::info!(to_version = user_version, "sqlite baseline schema created");
    }

    if start_version < user_version {
        tracing::info!(
            from_version = start_version,
            to_version = user_version,
            "sqlite migrations completed"
        );
    }

    Ok(())
}

fn read_user_version(conn: &Connection) -> crate::shared::error::AppResult<i64> {
    conn.query_row("SELECT user_version FROM pragma_user_version", [], |row| {
        row.get(0)
    })
    .map_err(|e| format!("failed to read user_version: {e}").into())
}

fn create_baseline_v1(conn: &mut Connection) -> crate::shared::error::AppResult<()> {
    let tx = conn
        .transaction()
        .map_err(|e| format!("failed to start sqlite transaction: {e}"))?;

    tx.execute_batch(
        r#"
CREATE TABLE IF NOT EXISTS users (
  id INTEGER PRIMARY KEY AUTOINCREMENT,
  telegram_user_id INTEGER NOT NULL UNIQUE,
  created_at INTEGER NOT NULL,
  updated_at INTEGER NOT NULL
);

CREATE TABLE IF NOT EXISTS user_preferences (
  id INTEGER PRIMARY KEY AUTOINCREMENT,
  user_id INTEGER NOT NULL UNIQUE,
  professional_roles TEXT NOT NULL DEFAULT '4,6,8,9,34',
  salary_from INTEGER NOT NULL DEFAULT 100000,
  remote INTEGER NOT NULL DEFAULT 1,
  flexible INTEGER NOT NULL DEFAULT 1,
  exclude_text TEXT NOT NULL DEFAULT 'ux ui',
  browse_page INTEGER NOT NULL DEFAULT 0,
  created_at INTEGER NOT NULL,
  updated_at INTEGER NOT NULL,
  FOREIGN KEY(user_id) REFERENCES users(id) ON DELETE CASCADE
);

CREATE TABLE IF NOT EXISTS hh_credentials (
  id INTEGER PRIMARY KEY AUTOINCREMENT,
  user_id INTEGER NOT NULL UNIQUE,
  access_token TEXT NOT NULL,
  refresh_token TEXT,
  expires_at INTEGER,
  created_at INTEGER NOT NULL,
  updated_at INTEGER NOT NULL,
  FOREIGN KEY(user_id) REFERENCES users(id) ON DELETE CASCADE
);

PRAGMA user_version = 1;
"#,
    )
    .map_err(|e| format!("failed to create baseline schema: {e}"))?;

    tx.commit()
        .map_err(|e| format!("failed to commit sqlite transaction: {e}"))?;

    Ok(())
}
