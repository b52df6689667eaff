//! Usage: Stored hh.ru OAuth credentials per bot user (the credential sink).

use crate::shared::error::AppResult;
use crate::shared::time::now_unix_seconds;
use rusqlite::{params, Connection, OptionalExtension};

/// Refresh this long before the recorded expiry instead of racing it.
const EXPIRY_LEAD_SECS: i64 = 60;

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct HhCredential {
    pub access_token: String,
    pub refresh_token: Option<String>,
    pub expires_at: Option<i64>,
}

impl HhCredential {
    /// True when the access token is past (or within the lead window of) its expiry.
    pub fn needs_refresh(&self, now_unix: i64) -> bool {
        match self.expires_at {
            Some(expires_at) => now_unix >= expires_at.saturating_sub(EXPIRY_LEAD_SECS),
            None => false,
        }
    }
}

fn row_to_credential(row: &rusqlite::Row<'_>) -> Result<HhCredential, rusqlite::Error> {
    Ok(HhCredential {
        access_token: row.get("access_token")?,
        refresh_token: row.get("refresh_token")?,
        expires_at: row.get("expires_at")?,
    })
}

pub fn get(conn: &Connection, user_id: i64) -> AppResult<Option<HhCredential>> {
    let credential = conn
        .query_row(
            "SELECT access_token, refresh_token, expires_at FROM hh_credentials WHERE user_id = ?1",
            params![user_id],
            row_to_credential,
        )
        .optional()?;
    Ok(credential)
}

pub fn put(conn: &Connection, user_id: i64, credential: &HhCredential) -> AppResult<()> {
    if credential.access_token.trim().is_empty() {
        return Err("SEC_INVALID_INPUT: access_token must not be empty".into());
    }

    let now = now_unix_seconds();
    conn.execute(
        r#"
INSERT INTO hh_credentials (user_id, access_token, refresh_token, expires_at, created_at, updated_at)
VALUES (?1, ?2, ?3, ?4, ?5, ?5)
ON CONFLICT(user_id) DO UPDATE SET
  access_token = excluded.access_token,
  refresh_token = excluded.refresh_token,
  expires_at = excluded.expires_at,
  updated_at = excluded.updated_at
"#,
        params![
            user_id,
            credential.access_token,
            credential.refresh_token,
            credential.expires_at,
            now
        ],
    )?;
    Ok(())
}

pub fn clear(conn: &Connection, user_id: i64) -> AppResult<()> {
    conn.execute(
        "DELETE FROM hh_credentials WHERE user_id = ?1",
        params![user_id],
    )?;
    Ok(())
}
