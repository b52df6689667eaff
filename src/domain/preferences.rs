//! Usage: Per-user vacancy browse preferences and the filter view derived from them.

use crate::shared::error::AppResult;
use crate::shared::time::now_unix_seconds;
use rusqlite::{params, Connection, OptionalExtension};

pub const DEFAULT_PROFESSIONAL_ROLES: &str = "4,6,8,9,34";
pub const DEFAULT_SALARY_FROM: i64 = 100_000;
pub const DEFAULT_EXCLUDE_TEXT: &str = "ux ui";
const MAX_EXCLUDE_TEXT_LEN: usize = 200;

#[derive(Debug, Clone)]
pub struct UserPreference {
    pub id: i64,
    pub user_id: i64,
    pub professional_roles: String,
    pub salary_from: i64,
    pub remote: bool,
    pub flexible: bool,
    pub exclude_text: String,
    pub browse_page: i64,
    pub created_at: i64,
    pub updated_at: i64,
}

/// Filter values in the shape the hh.ru search call expects.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct VacancyFilters {
    pub professional_roles: Vec<i64>,
    pub salary_from: i64,
    pub remote: bool,
    pub flexible: bool,
    pub exclude_text: String,
}

impl VacancyFilters {
    pub fn from_preference(pref: &UserPreference) -> Self {
        let roles: Vec<i64> = pref
            .professional_roles
            .split(',')
            .filter_map(|part| part.trim().parse::<i64>().ok())
            .collect();
        Self {
            professional_roles: if roles.is_empty() {
                DEFAULT_PROFESSIONAL_ROLES
                    .split(',')
                    .filter_map(|part| part.parse::<i64>().ok())
                    .collect()
            } else {
                roles
            },
            salary_from: if pref.salary_from > 0 {
                pref.salary_from
            } else {
                DEFAULT_SALARY_FROM
            },
            remote: pref.remote,
            flexible: pref.flexible,
            exclude_text: pref.exclude_text.clone(),
        }
    }

    pub fn exclude_terms(&self) -> Vec<String> {
        self.exclude_text
            .split_whitespace()
            .map(|term| term.to_lowercase())
            .collect()
    }

    /// True when any exclude term occurs in `text` (case-insensitive).
    pub fn matches_exclude(&self, text: &str) -> bool {
        let haystack = text.to_lowercase();
        self.exclude_terms()
            .iter()
            .any(|term| haystack.contains(term))
    }
}

fn row_to_preference(row: &rusqlite::Row<'_>) -> Result<UserPreference, rusqlite::Error> {
    Ok(UserPreference {
        id: row.get("id")?,
        user_id: row.get("user_id")?,
        professional_roles: row.get("professional_roles")?,
        salary_from: row.get("salary_from")?,
        remote: row.get::<_, i64>("remote")? != 0,
        flexible: row.get::<_, i64>("flexible")? != 0,
        exclude_text: row.get("exclude_text")?,
        browse_page: row.get("browse_page")?,
        created_at: row.get("created_at")?,
        updated_at: row.get("updated_at")?,
    })
}

pub fn get(conn: &Connection, user_id: i64) -> AppResult<Option<UserPreference>> {
    let pref = conn
        .query_row(
            r#"
SELECT id, user_id, professional_roles, salary_from, remote, flexible,
       exclude_text, browse_page, created_at, updated_at
FROM user_preferences
WHERE user_id = ?1
"#,
            params![user_id],
            row_to_preference,
        )
        .optional()?;
    Ok(pref)
}

/// Insert a defaults row for the user if one does not exist yet.
pub fn ensure_defaults(conn: &Connection, user_id: i64) -> AppResult<UserPreference> {
    let now = now_unix_seconds();
    conn.execute(
        "INSERT OR IGNORE INTO user_preferences (user_id, created_at, updated_at) VALUES (?1, ?2, ?2)",
        params![user_id, now],
    )?;
    get(conn, user_id)?.ok_or_else(|| "DB_ERROR: preference row missing after ensure".into())
}

fn normalize_roles(input: &str) -> AppResult<String> {
    let roles: Vec<String> = input
        .split(',')
        .map(str::trim)
        .filter(|part| !part.is_empty())
        .map(|part| {
            part.parse::<i64>()
                .map(|id| id.to_string())
                .map_err(|_| format!("SEC_INVALID_INPUT: professional role id '{part}' is not numeric"))
        })
        .collect::<Result<_, _>>()?;
    if roles.is_empty() {
        return Err("SEC_INVALID_INPUT: professional roles must not be empty".into());
    }
    Ok(roles.join(","))
}

pub fn set_professional_roles(conn: &Connection, user_id: i64, roles: &str) -> AppResult<()> {
    let normalized = normalize_roles(roles)?;
    let now = now_unix_seconds();
    ensure_defaults(conn, user_id)?;
    conn.execute(
        "UPDATE user_preferences SET professional_roles = ?2, updated_at = ?3 WHERE user_id = ?1",
        params![user_id, normalized, now],
    )?;
    Ok(())
}

pub fn set_exclude_text(conn: &Connection, user_id: i64, exclude_text: &str) -> AppResult<()> {
    let value = exclude_text.trim();
    if value.len() > MAX_EXCLUDE_TEXT_LEN {
        return Err(format!(
            "SEC_INVALID_INPUT: exclude text must be <= {MAX_EXCLUDE_TEXT_LEN} chars"
        )
        .into());
    }
    let now = now_unix_seconds();
    ensure_defaults(conn, user_id)?;
    conn.execute(
        "UPDATE user_preferences SET exclude_text = ?2, updated_at = ?3 WHERE user_id = ?1",
        params![user_id, value, now],
    )?;
    Ok(())
}

pub fn set_browse_page(conn: &Connection, user_id: i64, page: i64) -> AppResult<()> {
    let now = now_unix_seconds();
    conn.execute(
        "UPDATE user_preferences SET browse_page = ?2, updated_at = ?3 WHERE user_id = ?1",
        params![user_id, page.max(0), now],
    )?;
    Ok(())
}
