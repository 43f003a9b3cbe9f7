//! SQLite implementation of the database port.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use rusqlite::{params, Connection, OptionalExtension, Transaction};
use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex, MutexGuard};
use tracing::debug;

use super::port::{
    ArtifactIndex, DeleteOutcome, IndexedFile, IndexedVersion, UpsertMode, UpsertOutcome,
};
use super::record::VersionRecord;
use crate::error::{MirrorError, Result};
use crate::layout::ArtifactKey;
use crate::models::ModelType;

/// SQLite-backed artifact index.
///
/// Version and model rows keep the manifest JSON as a blob for replay, next to
/// normalized keys for base model, base model type and creator lookups.
pub struct SqliteIndex {
    db_path: Option<PathBuf>,
    conn: Arc<Mutex<Connection>>,
}

impl SqliteIndex {
    /// Create or open an index at the given path.
    pub fn new(db_path: impl Into<PathBuf>) -> Result<Self> {
        let db_path = db_path.into();

        if let Some(parent) = db_path.parent() {
            if !parent.as_os_str().is_empty() && !parent.exists() {
                std::fs::create_dir_all(parent)
                    .map_err(|e| MirrorError::io_with_path(e, parent))?;
            }
        }

        let conn = Connection::open(&db_path)?;
        Self::configure_connection(&conn)?;
        Self::ensure_schema(&conn)?;

        debug!("Opened artifact index at {}", db_path.display());
        Ok(Self {
            db_path: Some(db_path),
            conn: Arc::new(Mutex::new(conn)),
        })
    }

    /// Open a private in-memory index.
    pub fn in_memory() -> Result<Self> {
        let conn = Connection::open_in_memory()?;
        Self::configure_connection(&conn)?;
        Self::ensure_schema(&conn)?;
        Ok(Self {
            db_path: None,
            conn: Arc::new(Mutex::new(conn)),
        })
    }

    /// Database file path; `None` for in-memory indexes.
    pub fn db_path(&self) -> Option<&Path> {
        self.db_path.as_deref()
    }

    fn configure_connection(conn: &Connection) -> Result<()> {
        conn.execute_batch(
            "
            PRAGMA journal_mode=WAL;
            PRAGMA busy_timeout=30000;
            PRAGMA synchronous=NORMAL;
            PRAGMA foreign_keys=ON;
            ",
        )?;
        Ok(())
    }

    fn ensure_schema(conn: &Connection) -> Result<()> {
        conn.execute_batch(
            "
            CREATE TABLE IF NOT EXISTS base_models (
                id INTEGER PRIMARY KEY AUTOINCREMENT,
                name TEXT NOT NULL UNIQUE
            );

            CREATE TABLE IF NOT EXISTS base_model_types (
                id INTEGER PRIMARY KEY AUTOINCREMENT,
                name TEXT NOT NULL UNIQUE
            );

            CREATE TABLE IF NOT EXISTS creators (
                id INTEGER PRIMARY KEY AUTOINCREMENT,
                username TEXT NOT NULL UNIQUE,
                image TEXT
            );

            CREATE TABLE IF NOT EXISTS models (
                id INTEGER PRIMARY KEY,
                name TEXT NOT NULL,
                model_type TEXT NOT NULL,
                creator_id INTEGER REFERENCES creators(id),
                model_json TEXT NOT NULL,
                updated_at TEXT NOT NULL
            );

            CREATE TABLE IF NOT EXISTS model_versions (
                id INTEGER PRIMARY KEY,
                model_id INTEGER NOT NULL REFERENCES models(id),
                name TEXT NOT NULL,
                base_model_id INTEGER NOT NULL REFERENCES base_models(id),
                base_model_type_id INTEGER REFERENCES base_model_types(id),
                version_json TEXT NOT NULL,
                indexed_at TEXT NOT NULL
            );

            CREATE TABLE IF NOT EXISTS files (
                version_id INTEGER NOT NULL REFERENCES model_versions(id) ON DELETE CASCADE,
                id INTEGER NOT NULL,
                name TEXT NOT NULL,
                size_kb REAL NOT NULL,
                file_type TEXT NOT NULL,
                download_url TEXT NOT NULL,
                hashes_json TEXT,
                is_primary INTEGER,
                PRIMARY KEY (version_id, id)
            );

            CREATE TABLE IF NOT EXISTS images (
                version_id INTEGER NOT NULL REFERENCES model_versions(id) ON DELETE CASCADE,
                id INTEGER NOT NULL,
                url TEXT NOT NULL,
                width INTEGER NOT NULL,
                height INTEGER NOT NULL,
                hash TEXT,
                PRIMARY KEY (version_id, id)
            );

            CREATE INDEX IF NOT EXISTS idx_model_versions_model ON model_versions(model_id);
            ",
        )?;
        Ok(())
    }

    fn lock(&self) -> Result<MutexGuard<'_, Connection>> {
        self.conn.lock().map_err(|_| MirrorError::Database {
            message: "Failed to acquire connection lock".to_string(),
            model_id: None,
            version_id: None,
            source: None,
        })
    }

    fn exists_blocking(&self, version_id: i64) -> Result<bool> {
        let conn = self.lock()?;
        let found: Option<i64> = conn
            .query_row(
                "SELECT 1 FROM model_versions WHERE id = ?1",
                params![version_id],
                |row| row.get(0),
            )
            .optional()?;
        Ok(found.is_some())
    }

    fn upsert_blocking(&self, record: &VersionRecord, mode: UpsertMode) -> Result<UpsertOutcome> {
        let key = record.key;
        let mut conn = self.lock()?;
        let tx = conn.transaction()?;

        let exists: Option<i64> = tx
            .query_row(
                "SELECT 1 FROM model_versions WHERE id = ?1",
                params![key.version_id],
                |row| row.get(0),
            )
            .optional()?;
        if exists.is_some() && mode == UpsertMode::InsertOnly {
            return Ok(UpsertOutcome::AlreadyPresent);
        }

        write_version(&tx, record, mode)
            .map_err(|e| e.with_version_context(key.model_id, key.version_id))?;
        tx.commit()
            .map_err(|e| MirrorError::from(e).with_version_context(key.model_id, key.version_id))?;

        if exists.is_some() {
            debug!("Replaced index row for {}", key);
            Ok(UpsertOutcome::Replaced)
        } else {
            debug!("Indexed {}", key);
            Ok(UpsertOutcome::Inserted)
        }
    }

    fn delete_blocking(&self, version_id: i64) -> Result<DeleteOutcome> {
        let mut conn = self.lock()?;
        let tx = conn.transaction()?;

        let model_id: Option<i64> = tx
            .query_row(
                "SELECT model_id FROM model_versions WHERE id = ?1",
                params![version_id],
                |row| row.get(0),
            )
            .optional()?;
        let Some(model_id) = model_id else {
            return Ok(DeleteOutcome::default());
        };

        tx.execute("DELETE FROM files WHERE version_id = ?1", params![version_id])?;
        tx.execute("DELETE FROM images WHERE version_id = ?1", params![version_id])?;
        tx.execute("DELETE FROM model_versions WHERE id = ?1", params![version_id])?;

        let model_deleted = delete_model_if_orphaned(&tx, model_id)?;

        tx.commit()
            .map_err(|e| MirrorError::from(e).with_version_context(model_id, version_id))?;

        debug!(
            "Deleted index row for version {} (model removed: {})",
            version_id, model_deleted
        );
        Ok(DeleteOutcome {
            deleted: true,
            model_deleted,
        })
    }

    fn get_blocking(&self, version_id: i64) -> Result<Option<IndexedVersion>> {
        let conn = self.lock()?;
        let head = conn
            .query_row(
                &format!("{VERSION_SELECT} WHERE v.id = ?1"),
                params![version_id],
                read_head,
            )
            .optional()?;
        match head {
            Some(head) => Ok(Some(hydrate(&conn, head)?)),
            None => Ok(None),
        }
    }

    fn list_blocking(&self) -> Result<Vec<IndexedVersion>> {
        let conn = self.lock()?;
        let heads = {
            let mut stmt = conn.prepare(&format!("{VERSION_SELECT} ORDER BY v.id"))?;
            let rows = stmt.query_map([], read_head)?;
            rows.collect::<rusqlite::Result<Vec<_>>>()?
        };
        heads.into_iter().map(|head| hydrate(&conn, head)).collect()
    }

    fn count_blocking(&self) -> Result<usize> {
        let conn = self.lock()?;
        let count: i64 = conn.query_row("SELECT COUNT(*) FROM model_versions", [], |row| row.get(0))?;
        Ok(count as usize)
    }
}

#[async_trait]
impl ArtifactIndex for SqliteIndex {
    async fn version_exists(&self, version_id: i64) -> Result<bool> {
        self.exists_blocking(version_id)
    }

    async fn upsert_model_version(
        &self,
        record: &VersionRecord,
        mode: UpsertMode,
    ) -> Result<UpsertOutcome> {
        self.upsert_blocking(record, mode)
    }

    async fn delete_model_version(&self, version_id: i64) -> Result<DeleteOutcome> {
        self.delete_blocking(version_id)
    }

    async fn get_version(&self, version_id: i64) -> Result<Option<IndexedVersion>> {
        self.get_blocking(version_id)
    }

    async fn list_versions(&self) -> Result<Vec<IndexedVersion>> {
        self.list_blocking()
    }

    async fn count_versions(&self) -> Result<usize> {
        self.count_blocking()
    }
}

const VERSION_SELECT: &str = "SELECT v.id, v.model_id, m.model_type, m.name, v.name, b.name, v.indexed_at
     FROM model_versions v
     JOIN models m ON m.id = v.model_id
     JOIN base_models b ON b.id = v.base_model_id";

/// Columns of a version row before its sub-records are loaded.
struct VersionHead {
    version_id: i64,
    model_id: i64,
    model_type: String,
    model_name: String,
    version_name: String,
    base_model: String,
    indexed_at: String,
}

fn read_head(row: &rusqlite::Row<'_>) -> rusqlite::Result<VersionHead> {
    Ok(VersionHead {
        version_id: row.get(0)?,
        model_id: row.get(1)?,
        model_type: row.get(2)?,
        model_name: row.get(3)?,
        version_name: row.get(4)?,
        base_model: row.get(5)?,
        indexed_at: row.get(6)?,
    })
}

fn hydrate(conn: &Connection, head: VersionHead) -> Result<IndexedVersion> {
    let corrupt = |message: String| MirrorError::Database {
        message,
        model_id: Some(head.model_id),
        version_id: Some(head.version_id),
        source: None,
    };

    let model_type: ModelType = head.model_type.parse().map_err(corrupt)?;
    let indexed_at = DateTime::parse_from_rfc3339(&head.indexed_at)
        .map_err(|e| corrupt(format!("bad indexed_at {:?}: {}", head.indexed_at, e)))?
        .with_timezone(&Utc);

    let files = {
        let mut stmt = conn.prepare("SELECT id, name FROM files WHERE version_id = ?1 ORDER BY id")?;
        let rows = stmt.query_map(params![head.version_id], |row| {
            Ok(IndexedFile {
                id: row.get(0)?,
                name: row.get(1)?,
            })
        })?;
        rows.collect::<rusqlite::Result<Vec<_>>>()?
    };
    let image_ids = {
        let mut stmt = conn.prepare("SELECT id FROM images WHERE version_id = ?1 ORDER BY id")?;
        let rows = stmt.query_map(params![head.version_id], |row| row.get(0))?;
        rows.collect::<rusqlite::Result<Vec<i64>>>()?
    };

    Ok(IndexedVersion {
        key: ArtifactKey::new(model_type, head.model_id, head.version_id),
        model_name: head.model_name,
        version_name: head.version_name,
        base_model: head.base_model,
        files,
        image_ids,
        indexed_at,
    })
}

/// Remove the model row once no version refers to it.
fn delete_model_if_orphaned(tx: &Transaction<'_>, model_id: i64) -> Result<bool> {
    let remaining: i64 = tx.query_row(
        "SELECT COUNT(*) FROM model_versions WHERE model_id = ?1",
        params![model_id],
        |row| row.get(0),
    )?;
    if remaining > 0 {
        return Ok(false);
    }
    Ok(tx.execute("DELETE FROM models WHERE id = ?1", params![model_id])? > 0)
}

/// Id of the row named `name` in a two-column lookup table, creating it if needed.
fn find_or_create(tx: &Transaction<'_>, table: &str, name: &str) -> Result<i64> {
    tx.execute(
        &format!("INSERT INTO {table} (name) VALUES (?1) ON CONFLICT(name) DO NOTHING"),
        params![name],
    )?;
    let id = tx.query_row(
        &format!("SELECT id FROM {table} WHERE name = ?1"),
        params![name],
        |row| row.get(0),
    )?;
    Ok(id)
}

fn write_version(tx: &Transaction<'_>, record: &VersionRecord, mode: UpsertMode) -> Result<()> {
    let VersionRecord {
        key,
        model,
        version,
        image_ids,
    } = record;
    let now = Utc::now().to_rfc3339();

    let base_model_id = find_or_create(tx, "base_models", &version.base_model)?;
    let base_model_type_id = match &version.base_model_type {
        Some(name) => Some(find_or_create(tx, "base_model_types", name)?),
        None => None,
    };

    let creator_id = match &model.creator {
        Some(creator) => {
            tx.execute(
                "INSERT INTO creators (username, image) VALUES (?1, ?2)
                 ON CONFLICT(username) DO UPDATE SET image = COALESCE(excluded.image, image)",
                params![creator.username, creator.image],
            )?;
            Some(tx.query_row(
                "SELECT id FROM creators WHERE username = ?1",
                params![creator.username],
                |row| row.get::<_, i64>(0),
            )?)
        }
        None => None,
    };

    let model_json = serde_json::to_string(model)?;
    let model_sql = match mode {
        UpsertMode::InsertOnly => {
            "INSERT INTO models (id, name, model_type, creator_id, model_json, updated_at)
             VALUES (?1, ?2, ?3, ?4, ?5, ?6)
             ON CONFLICT(id) DO NOTHING"
        }
        UpsertMode::Overwrite => {
            "INSERT INTO models (id, name, model_type, creator_id, model_json, updated_at)
             VALUES (?1, ?2, ?3, ?4, ?5, ?6)
             ON CONFLICT(id) DO UPDATE SET
                 name=excluded.name,
                 model_type=excluded.model_type,
                 creator_id=excluded.creator_id,
                 model_json=excluded.model_json,
                 updated_at=excluded.updated_at"
        }
    };
    tx.execute(
        model_sql,
        params![
            model.id,
            model.name,
            model.model_type.as_str(),
            creator_id,
            model_json,
            now
        ],
    )?;

    let previous_model_id: Option<i64> = tx
        .query_row(
            "SELECT model_id FROM model_versions WHERE id = ?1",
            params![key.version_id],
            |row| row.get(0),
        )
        .optional()?;

    tx.execute("DELETE FROM files WHERE version_id = ?1", params![key.version_id])?;
    tx.execute("DELETE FROM images WHERE version_id = ?1", params![key.version_id])?;

    let version_json = serde_json::to_string(version)?;
    tx.execute(
        "INSERT INTO model_versions (id, model_id, name, base_model_id, base_model_type_id,
                                     version_json, indexed_at)
         VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7)
         ON CONFLICT(id) DO UPDATE SET
             model_id=excluded.model_id,
             name=excluded.name,
             base_model_id=excluded.base_model_id,
             base_model_type_id=excluded.base_model_type_id,
             version_json=excluded.version_json,
             indexed_at=excluded.indexed_at",
        params![
            key.version_id,
            key.model_id,
            version.name,
            base_model_id,
            base_model_type_id,
            version_json,
            now
        ],
    )?;

    if let Some(previous) = previous_model_id.filter(|id| *id != key.model_id) {
        if delete_model_if_orphaned(tx, previous)? {
            debug!("Version {} moved off model {}, which is now gone", key.version_id, previous);
        }
    }

    for file in &version.files {
        let hashes_json = file.hashes.as_ref().map(serde_json::to_string).transpose()?;
        tx.execute(
            "INSERT INTO files (version_id, id, name, size_kb, file_type, download_url,
                                hashes_json, is_primary)
             VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8)",
            params![
                key.version_id,
                file.id,
                file.name,
                file.size_kb,
                file.file_type,
                file.download_url,
                hashes_json,
                file.primary
            ],
        )?;
    }

    for (image, image_id) in version.images.iter().zip(image_ids) {
        tx.execute(
            "INSERT OR REPLACE INTO images (version_id, id, url, width, height, hash)
             VALUES (?1, ?2, ?3, ?4, ?5, ?6)",
            params![
                key.version_id,
                image_id,
                image.url,
                image.width,
                image.height,
                image.hash
            ],
        )?;
    }

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::{Model, ModelVersion};
    use tempfile::TempDir;

    fn record(model_id: i64, version_id: i64, file_ids: &[i64]) -> VersionRecord {
        let model: Model = serde_json::from_value(serde_json::json!({
            "id": model_id, "name": "Dreamy", "type": "Checkpoint",
            "creator": {"username": "someone"}
        }))
        .unwrap();
        let files: Vec<_> = file_ids
            .iter()
            .map(|id| serde_json::json!({"id": id, "name": format!("f{id}.safetensors")}))
            .collect();
        let version: ModelVersion = serde_json::from_value(serde_json::json!({
            "id": version_id, "name": "v1", "baseModel": "SD 1.5", "baseModelType": "Standard",
            "files": files,
            "images": [{"url": "https://img.example.invalid/a/77.jpeg", "width": 4, "height": 3}]
        }))
        .unwrap();
        VersionRecord::from_manifests(&model, &version).unwrap()
    }

    #[tokio::test]
    async fn test_upsert_and_get() {
        let index = SqliteIndex::in_memory().unwrap();

        let outcome = index
            .upsert_model_version(&record(100, 200, &[1, 2]), UpsertMode::InsertOnly)
            .await
            .unwrap();
        assert_eq!(outcome, UpsertOutcome::Inserted);
        assert!(index.version_exists(200).await.unwrap());

        let row = index.get_version(200).await.unwrap().unwrap();
        assert_eq!(row.key, ArtifactKey::new(ModelType::Checkpoint, 100, 200));
        assert_eq!(row.file_ids().collect::<Vec<_>>(), vec![1, 2]);
        assert_eq!(row.image_ids, vec![77]);
        assert_eq!(row.base_model, "SD 1.5");
        assert!(index.get_version(999).await.unwrap().is_none());
    }

    #[tokio::test]
    async fn test_insert_only_never_overwrites() {
        let index = SqliteIndex::in_memory().unwrap();
        index
            .upsert_model_version(&record(100, 200, &[1]), UpsertMode::InsertOnly)
            .await
            .unwrap();

        let outcome = index
            .upsert_model_version(&record(100, 200, &[1, 2, 3]), UpsertMode::InsertOnly)
            .await
            .unwrap();
        assert_eq!(outcome, UpsertOutcome::AlreadyPresent);
        let row = index.get_version(200).await.unwrap().unwrap();
        assert_eq!(row.files.len(), 1);

        let outcome = index
            .upsert_model_version(&record(100, 200, &[2, 3]), UpsertMode::Overwrite)
            .await
            .unwrap();
        assert_eq!(outcome, UpsertOutcome::Replaced);
        let row = index.get_version(200).await.unwrap().unwrap();
        assert_eq!(row.file_ids().collect::<Vec<_>>(), vec![2, 3]);
        assert_eq!(index.count_versions().await.unwrap(), 1);
    }

    #[tokio::test]
    async fn test_delete_cascades_to_orphaned_model() {
        let index = SqliteIndex::in_memory().unwrap();
        index
            .upsert_model_version(&record(100, 200, &[1]), UpsertMode::InsertOnly)
            .await
            .unwrap();
        index
            .upsert_model_version(&record(100, 201, &[2]), UpsertMode::InsertOnly)
            .await
            .unwrap();

        let first = index.delete_model_version(200).await.unwrap();
        assert_eq!(
            first,
            DeleteOutcome {
                deleted: true,
                model_deleted: false
            }
        );

        let second = index.delete_model_version(201).await.unwrap();
        assert!(second.deleted && second.model_deleted);

        let again = index.delete_model_version(201).await.unwrap();
        assert_eq!(again, DeleteOutcome::default());
        assert_eq!(index.count_versions().await.unwrap(), 0);
    }

    #[tokio::test]
    async fn test_overwrite_moving_version_drops_old_model() {
        let index = SqliteIndex::in_memory().unwrap();
        index
            .upsert_model_version(&record(100, 200, &[1]), UpsertMode::InsertOnly)
            .await
            .unwrap();
        index
            .upsert_model_version(&record(101, 200, &[1]), UpsertMode::Overwrite)
            .await
            .unwrap();

        let row = index.get_version(200).await.unwrap().unwrap();
        assert_eq!(row.key.model_id, 101);

        let conn = index.lock().unwrap();
        let model_ids: Vec<i64> = conn
            .prepare("SELECT id FROM models ORDER BY id")
            .unwrap()
            .query_map([], |row| row.get(0))
            .unwrap()
            .collect::<rusqlite::Result<_>>()
            .unwrap();
        assert_eq!(model_ids, vec![101]);
    }

    #[tokio::test]
    async fn test_file_backed_index_persists() {
        let temp_dir = TempDir::new().unwrap();
        let path = temp_dir.path().join("nested").join("mirror.db");

        {
            let index = SqliteIndex::new(&path).unwrap();
            index
                .upsert_model_version(&record(100, 200, &[1]), UpsertMode::InsertOnly)
                .await
                .unwrap();
            assert_eq!(index.db_path(), Some(path.as_path()));
        }

        let reopened = SqliteIndex::new(&path).unwrap();
        let rows = reopened.list_versions().await.unwrap();
        assert_eq!(rows.len(), 1);
        assert_eq!(rows[0].model_name, "Dreamy");
    }
}
