use crate::db::models::Preference;
use chrono::{DateTime, NaiveDateTime, Utc};
use duckdb::{params, Connection, Result as DbResult, Row};

pub struct DbService;

impl DbService {
    fn row_to_preference(row: &Row) -> DbResult<Preference> {
        // Timestamps are selected AS VARCHAR; DuckDB renders them without a zone.
        let updated_str: String = row.get(2)?;
        let updated_at = NaiveDateTime::parse_from_str(&updated_str, "%Y-%m-%d %H:%M:%S%.f")
            .map(|naive| DateTime::<Utc>::from_naive_utc_and_offset(naive, Utc))
            .unwrap_or_else(|_| Utc::now());

        Ok(Preference {
            key: row.get::<_, String>(0)?,
            value: row.get::<_, String>(1)?,
            updated_at,
        })
    }

    pub fn get_preference(conn: &Connection, key: &str) -> DbResult<Option<Preference>> {
        let mut stmt = conn.prepare(
            "SELECT key, value, CAST(updated_at AS VARCHAR) FROM preferences WHERE key = ?",
        )?;
        let mut rows = stmt.query_map(params![key], Self::row_to_preference)?;

        match rows.next() {
            Some(row) => Ok(Some(row?)),
            None => Ok(None),
        }
    }

    pub fn set_preference(conn: &Connection, key: &str, value: &str) -> DbResult<()> {
        conn.execute(
            "INSERT INTO preferences (key, value) VALUES (?, ?)
             ON CONFLICT (key) DO UPDATE SET value = excluded.value, updated_at = CURRENT_TIMESTAMP",
            params![key, value],
        )?;
        Ok(())
    }

    pub fn delete_preference(conn: &Connection, key: &str) -> DbResult<bool> {
        let affected = conn.execute("DELETE FROM preferences WHERE key = ?", params![key])?;
        Ok(affected > 0)
    }

    pub fn list_preferences(conn: &Connection) -> DbResult<Vec<Preference>> {
        let mut stmt = conn.prepare(
            "SELECT key, value, CAST(updated_at AS VARCHAR) FROM preferences ORDER BY key ASC",
        )?;
        let rows = stmt.query_map([], Self::row_to_preference)?;

        let mut prefs = Vec::new();
        for row in rows {
            prefs.push(row?);
        }
        Ok(prefs)
    }
}
