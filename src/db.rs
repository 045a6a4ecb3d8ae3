use crate::registry::Submission;
use anyhow::Context;
use rusqlite::{Connection, OptionalExtension};
use std::path::Path;

pub const DB_FILE: &str = "submissions.sqlite3";

pub const KEY_SUBMISSIONS: &str = "submissions";
pub const KEY_USERS: &str = "users";
pub const KEY_AUTH_TOKEN: &str = "authToken";

pub fn open_db(workspace: &Path) -> anyhow::Result<Connection> {
    std::fs::create_dir_all(workspace)?;
    let db_path = workspace.join(DB_FILE);
    let conn = Connection::open(db_path)?;

    conn.execute(
        "CREATE TABLE IF NOT EXISTS kv_store(
            key TEXT PRIMARY KEY,
            value TEXT NOT NULL,
            updated_at TEXT
        )",
        [],
    )?;

    // Workspaces created before change stamps existed lack updated_at.
    ensure_kv_updated_at(&conn)?;

    Ok(conn)
}

pub fn kv_get_json(conn: &Connection, key: &str) -> anyhow::Result<Option<serde_json::Value>> {
    let raw: Option<String> = conn
        .query_row("SELECT value FROM kv_store WHERE key = ?", [key], |r| {
            r.get(0)
        })
        .optional()?;
    match raw {
        Some(text) => {
            let v = serde_json::from_str(&text)
                .with_context(|| format!("stored value for {} is invalid JSON", key))?;
            Ok(Some(v))
        }
        None => Ok(None),
    }
}

pub fn kv_set_json(conn: &Connection, key: &str, value: &serde_json::Value) -> anyhow::Result<()> {
    let text = serde_json::to_string(value)?;
    let now = chrono::Utc::now().to_rfc3339();
    conn.execute(
        "INSERT INTO kv_store(key, value, updated_at) VALUES(?, ?, ?)
         ON CONFLICT(key) DO UPDATE SET value = excluded.value, updated_at = excluded.updated_at",
        (key, &text, &now),
    )?;
    Ok(())
}

/// Returns whether a row was removed.
pub fn kv_remove(conn: &Connection, key: &str) -> anyhow::Result<bool> {
    let n = conn.execute("DELETE FROM kv_store WHERE key = ?", [key])?;
    Ok(n > 0)
}

pub fn load_submissions(conn: &Connection) -> anyhow::Result<Option<Vec<Submission>>> {
    let Some(v) = kv_get_json(conn, KEY_SUBMISSIONS)? else {
        return Ok(None);
    };
    let records = serde_json::from_value(v).context("stored submissions snapshot is malformed")?;
    Ok(Some(records))
}

pub fn save_submissions(conn: &Connection, submissions: &[Submission]) -> anyhow::Result<()> {
    let v = serde_json::to_value(submissions)?;
    kv_set_json(conn, KEY_SUBMISSIONS, &v)
}

fn ensure_kv_updated_at(conn: &Connection) -> anyhow::Result<()> {
    if table_has_column(conn, "kv_store", "updated_at")? {
        return Ok(());
    }
    conn.execute("ALTER TABLE kv_store ADD COLUMN updated_at TEXT", [])?;
    Ok(())
}

fn table_has_column(conn: &Connection, table: &str, column: &str) -> anyhow::Result<bool> {
    let sql = format!("PRAGMA table_info({})", table);
    let mut stmt = conn.prepare(&sql)?;
    let mut rows = stmt.query([])?;
    while let Some(row) = rows.next()? {
        let name: String = row.get(1)?;
        if name == column {
            return Ok(true);
        }
    }
    Ok(false)
}
