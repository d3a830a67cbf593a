use chrono::Utc;
use futures::future::BoxFuture;
use rusqlite::{params, Connection, OptionalExtension};
use std::path::Path;
use std::sync::Mutex;
use tracing::debug;

use formflow_core::error::{FlowError, Result};
use formflow_core::traits::InstanceStore;
use formflow_core::types::{Instance, InstanceId};

const SCHEMA: &str = "CREATE TABLE IF NOT EXISTS instances (
        id TEXT PRIMARY KEY,
        version INTEGER NOT NULL,
        body TEXT NOT NULL,
        updated_at TEXT NOT NULL
    );";

fn db_err(e: impl std::fmt::Display) -> FlowError {
    FlowError::Store(e.to_string())
}

/// SQLite-backed instance store. Each row holds the instance as JSON next
/// to its version, which guards every update.
pub struct SqliteInstanceStore {
    conn: Mutex<Connection>,
}

impl SqliteInstanceStore {
    /// Open or create a SQLite database at the given path.
    pub fn open(path: &Path) -> Result<Self> {
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent)
                .map_err(|e| FlowError::Store(format!("Failed to create db directory: {}", e)))?;
        }

        let conn = Connection::open(path).map_err(db_err)?;
        conn.execute_batch("PRAGMA journal_mode=WAL; PRAGMA synchronous=NORMAL;")
            .map_err(db_err)?;
        conn.execute_batch(SCHEMA).map_err(db_err)?;

        debug!(path = %path.display(), "Instance store opened");
        Ok(Self {
            conn: Mutex::new(conn),
        })
    }

    /// Open an in-memory database (for testing).
    pub fn in_memory() -> Result<Self> {
        let conn = Connection::open_in_memory().map_err(db_err)?;
        conn.execute_batch(SCHEMA).map_err(db_err)?;
        Ok(Self {
            conn: Mutex::new(conn),
        })
    }

    /// Add a new instance. Fails if the id is already taken.
    pub fn insert(&self, instance: &Instance) -> Result<()> {
        let body = serde_json::to_string(instance)?;
        let conn = self.conn.lock().map_err(db_err)?;
        conn.execute(
            "INSERT INTO instances (id, version, body, updated_at) VALUES (?1, ?2, ?3, ?4)",
            params![
                instance.id.0,
                instance.version as i64,
                body,
                Utc::now().to_rfc3339()
            ],
        )
        .map_err(db_err)?;
        debug!(instance_id = %instance.id, "Instance inserted");
        Ok(())
    }

    /// Number of stored instances.
    pub fn count(&self) -> Result<usize> {
        let conn = self.conn.lock().map_err(db_err)?;
        let n: i64 = conn
            .query_row("SELECT COUNT(*) FROM instances", [], |row| row.get(0))
            .map_err(db_err)?;
        Ok(n as usize)
    }
}

impl InstanceStore for SqliteInstanceStore {
    fn get_instance(&self, id: &InstanceId) -> BoxFuture<'_, Result<Instance>> {
        let id = id.clone();

        Box::pin(async move {
            let conn = self.conn.lock().map_err(db_err)?;
            let row: Option<(i64, String)> = conn
                .query_row(
                    "SELECT version, body FROM instances WHERE id = ?1",
                    params![id.0],
                    |row| Ok((row.get(0)?, row.get(1)?)),
                )
                .optional()
                .map_err(db_err)?;

            let (version, body) = row.ok_or_else(|| FlowError::InstanceNotFound(id.to_string()))?;
            let mut instance: Instance = serde_json::from_str(&body)?;
            // The column is authoritative.
            instance.version = version as u64;
            Ok(instance)
        })
    }

    fn update_instance(&self, mut instance: Instance) -> BoxFuture<'_, Result<Instance>> {
        Box::pin(async move {
            let expected = instance.version;
            instance.version = expected + 1;
            let body = serde_json::to_string(&instance)?;

            let conn = self.conn.lock().map_err(db_err)?;
            let changed = conn
                .execute(
                    "UPDATE instances SET version = ?1, body = ?2, updated_at = ?3
                     WHERE id = ?4 AND version = ?5",
                    params![
                        instance.version as i64,
                        body,
                        Utc::now().to_rfc3339(),
                        instance.id.0,
                        expected as i64
                    ],
                )
                .map_err(db_err)?;

            if changed == 0 {
                let found: Option<i64> = conn
                    .query_row(
                        "SELECT version FROM instances WHERE id = ?1",
                        params![instance.id.0],
                        |row| row.get(0),
                    )
                    .optional()
                    .map_err(db_err)?;
                return Err(match found {
                    None => FlowError::InstanceNotFound(instance.id.to_string()),
                    Some(found) => FlowError::VersionConflict {
                        id: instance.id.to_string(),
                        expected,
                        found: found as u64,
                    },
                });
            }

            debug!(instance_id = %instance.id, version = instance.version, "Instance updated");
            Ok(instance)
        })
    }
}
