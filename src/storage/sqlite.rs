//! SQLite storage backend for adapter descriptions

use super::traits::{AdapterStore, OpenStore, StorageError, StorageResult};
use crate::model::{AdapterDescription, AdapterId};
use chrono::{DateTime, Utc};
use rusqlite::{params, Connection};
use std::path::Path;
use std::sync::{Mutex, MutexGuard};

/// SQLite-backed descriptor store
///
/// One row per adapter; the description itself is stored as JSON next to
/// the columns used for ordering and bookkeeping. Thread-safe via internal
/// mutex on the connection.
pub struct SqliteStore {
    conn: Mutex<Connection>,
}

impl SqliteStore {
    fn init_schema(conn: &Connection) -> StorageResult<()> {
        conn.execute_batch(
            r#"
            CREATE TABLE IF NOT EXISTS adapters (
                id TEXT PRIMARY KEY,
                name TEXT NOT NULL,
                kind TEXT NOT NULL,
                description_json TEXT NOT NULL,
                created_at TEXT NOT NULL,
                updated_at TEXT NOT NULL
            );

            CREATE INDEX IF NOT EXISTS idx_adapters_created
                ON adapters(created_at);

            -- WAL lets the CLI read while a running engine writes
            PRAGMA journal_mode = WAL;
            "#,
        )?;
        Ok(())
    }

    fn conn(&self) -> StorageResult<MutexGuard<'_, Connection>> {
        self.conn
            .lock()
            .map_err(|e| StorageError::Unavailable(e.to_string()))
    }

    fn parse_time(raw: &str) -> StorageResult<DateTime<Utc>> {
        DateTime::parse_from_rfc3339(raw)
            .map(|t| t.with_timezone(&Utc))
            .map_err(|e| StorageError::DateParse(format!("{raw}: {e}")))
    }
}

impl OpenStore for SqliteStore {
    fn open(path: impl AsRef<Path>) -> StorageResult<Self> {
        // Ensure parent directory exists
        if let Some(parent) = path.as_ref().parent() {
            std::fs::create_dir_all(parent)?;
        }

        let conn = Connection::open(path)?;
        Self::init_schema(&conn)?;

        Ok(Self {
            conn: Mutex::new(conn),
        })
    }

    fn open_in_memory() -> StorageResult<Self> {
        let conn = Connection::open_in_memory()?;
        Self::init_schema(&conn)?;

        Ok(Self {
            conn: Mutex::new(conn),
        })
    }
}

impl AdapterStore for SqliteStore {
    fn get_all_adapters(&self) -> StorageResult<Option<Vec<AdapterDescription>>> {
        let conn = self.conn()?;
        let mut stmt = conn.prepare(
            "SELECT description_json, created_at, updated_at FROM adapters ORDER BY created_at, id",
        )?;
        let rows = stmt.query_map([], |row| {
            Ok((
                row.get::<_, String>(0)?,
                row.get::<_, String>(1)?,
                row.get::<_, String>(2)?,
            ))
        })?;

        let mut adapters = Vec::new();
        for row in rows {
            let (json, created_at, updated_at) = row?;
            let mut description: AdapterDescription = serde_json::from_str(&json)?;
            description.created_at = Some(Self::parse_time(&created_at)?);
            description.updated_at = Some(Self::parse_time(&updated_at)?);
            adapters.push(description);
        }
        Ok(Some(adapters))
    }

    fn save_adapter(&self, description: &AdapterDescription) -> StorageResult<()> {
        let now = Utc::now();
        let created_at = description.created_at.unwrap_or(now);
        let json = serde_json::to_string(description)?;

        let conn = self.conn()?;
        conn.execute(
            r#"
            INSERT INTO adapters (id, name, kind, description_json, created_at, updated_at)
            VALUES (?1, ?2, ?3, ?4, ?5, ?6)
            ON CONFLICT(id) DO UPDATE SET
                name = excluded.name,
                kind = excluded.kind,
                description_json = excluded.description_json,
                updated_at = excluded.updated_at
            "#,
            params![
                description.id.as_str(),
                description.name,
                description.kind.to_string(),
                json,
                created_at.to_rfc3339(),
                now.to_rfc3339(),
            ],
        )?;
        Ok(())
    }

    fn delete_adapter(&self, id: &AdapterId) -> StorageResult<bool> {
        let conn = self.conn()?;
        let removed = conn.execute("DELETE FROM adapters WHERE id = ?1", params![id.as_str()])?;
        Ok(removed > 0)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::{AdapterKind, ConfigValue, FormatConfig, ProtocolConfig, TransformRule};

    fn create_test_store() -> SqliteStore {
        SqliteStore::open_in_memory().unwrap()
    }

    fn create_test_adapter(id: &str) -> AdapterDescription {
        AdapterDescription::new(
            id,
            AdapterKind::Pull,
            ProtocolConfig {
                id: "http".into(),
                config: vec![
                    ConfigValue::new("url", "http://localhost/data"),
                    ConfigValue::new("interval", "5"),
                ],
            },
            FormatConfig {
                id: "json".into(),
                config: vec![],
            },
            "sensors",
        )
        .with_rule(TransformRule::Delete {
            field: "noise".into(),
        })
    }

    #[test]
    fn empty_store_yields_empty_collection() {
        let store = create_test_store();
        assert_eq!(store.get_all_adapters().unwrap(), Some(vec![]));
    }

    #[test]
    fn save_and_load_round_trip() {
        let store = create_test_store();
        let adapter = create_test_adapter("a1");
        store.save_adapter(&adapter).unwrap();

        let loaded = store.get_all_adapters().unwrap().unwrap();
        assert_eq!(loaded.len(), 1);
        assert_eq!(loaded[0].id, adapter.id);
        assert_eq!(loaded[0].rules, adapter.rules);
        assert_eq!(loaded[0].protocol, adapter.protocol);
        assert!(loaded[0].updated_at.is_some());
    }

    #[test]
    fn update_preserves_creation_time() {
        let store = create_test_store();
        let adapter = create_test_adapter("a1");
        store.save_adapter(&adapter).unwrap();
        let created = store.get_all_adapters().unwrap().unwrap()[0].created_at;

        let mut changed = adapter.clone().with_name("renamed");
        changed.created_at = None;
        store.save_adapter(&changed).unwrap();

        let loaded = store.get_all_adapters().unwrap().unwrap();
        assert_eq!(loaded.len(), 1);
        assert_eq!(loaded[0].name, "renamed");
        assert_eq!(loaded[0].created_at, created);
    }

    #[test]
    fn delete_reports_whether_row_existed() {
        let store = create_test_store();
        store.save_adapter(&create_test_adapter("a1")).unwrap();
        assert!(store.delete_adapter(&AdapterId::from("a1")).unwrap());
        assert!(!store.delete_adapter(&AdapterId::from("a1")).unwrap());
        assert_eq!(store.get_all_adapters().unwrap(), Some(vec![]));
    }

    #[test]
    fn file_store_persists_across_opens() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("nested").join("sluice.db");
        {
            let store = SqliteStore::open(&path).unwrap();
            store.save_adapter(&create_test_adapter("a1")).unwrap();
        }
        let reopened = SqliteStore::open(&path).unwrap();
        assert_eq!(reopened.get_all_adapters().unwrap().unwrap().len(), 1);
    }
}
