// SPDX-License-Identifier: MIT
// SPDX-FileCopyrightText: 2025 Jonathan D. A. Jewell <hyperpolymath>

//! Local cache of matched photos

use chrono::{DateTime, Utc};
use rusqlite::types::Type;
use rusqlite::{params, Connection, OptionalExtension, Row};
use serde::{Deserialize, Serialize};
use std::path::Path;
use std::sync::{Arc, Mutex};
use uuid::Uuid;

use crate::similarity::Descriptor;
use crate::{FinderError, Result};

/// Matched photo store (thread-safe wrapper)
#[derive(Clone)]
pub struct Database {
    conn: Arc<Mutex<Connection>>,
}

/// A photo that matched the registered face
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MatchedPhoto {
    pub id: String,
    pub filename: String,
    pub source_path: String,
    #[serde(skip)]
    pub blob: Vec<u8>,
    pub face_vector: Descriptor,
    pub similarity: f32,
    pub content_hash: String,
    pub created_at: DateTime<Utc>,
}

/// Cache statistics
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DbStats {
    pub photo_count: i64,
    pub total_bytes: i64,
    pub best_similarity: Option<f64>,
}

const PHOTO_COLUMNS: &str =
    "id, filename, source_path, blob, face_vector, similarity, content_hash, created_at";

/// Same shape as `PHOTO_COLUMNS` with the image bytes replaced by an empty blob
const META_COLUMNS: &str =
    "id, filename, source_path, X'' AS blob, face_vector, similarity, content_hash, created_at";

impl Database {
    /// Open or create the database
    pub fn open<P: AsRef<Path>>(path: P) -> Result<Self> {
        let conn = Connection::open(path)?;
        let db = Self {
            conn: Arc::new(Mutex::new(conn)),
        };
        db.initialize()?;
        Ok(db)
    }

    /// Open an in-memory database (for testing)
    pub fn in_memory() -> Result<Self> {
        let conn = Connection::open_in_memory()?;
        let db = Self {
            conn: Arc::new(Mutex::new(conn)),
        };
        db.initialize()?;
        Ok(db)
    }

    fn lock_conn(&self) -> Result<std::sync::MutexGuard<'_, Connection>> {
        self.conn.lock().map_err(|_| FinderError::Config("Database lock poisoned".to_string()))
    }

    /// Initialize database schema
    fn initialize(&self) -> Result<()> {
        let conn = self.lock_conn()?;
        conn.execute_batch(r#"
            CREATE TABLE IF NOT EXISTS photos (
                id TEXT PRIMARY KEY,
                filename TEXT NOT NULL,
                source_path TEXT NOT NULL,
                blob BLOB NOT NULL,
                face_vector TEXT NOT NULL,
                similarity REAL NOT NULL DEFAULT 0.0,
                content_hash TEXT NOT NULL,
                created_at TEXT NOT NULL
            );

            CREATE INDEX IF NOT EXISTS idx_photos_hash ON photos(content_hash);
        "#)?;
        Ok(())
    }

    /// Store a new match under a freshly generated id
    pub fn add_photo(
        &self,
        filename: &str,
        source_path: &str,
        blob: Vec<u8>,
        face_vector: Descriptor,
        similarity: f32,
    ) -> Result<MatchedPhoto> {
        let photo = MatchedPhoto {
            id: new_photo_id(),
            filename: filename.to_string(),
            source_path: source_path.to_string(),
            content_hash: content_hash(&blob),
            blob,
            face_vector,
            similarity,
            created_at: Utc::now(),
        };
        self.insert_photo(&photo)?;
        Ok(photo)
    }

    /// Insert a record; an existing id is rejected, never overwritten
    pub fn insert_photo(&self, photo: &MatchedPhoto) -> Result<()> {
        let conn = self.lock_conn()?;
        let vector_json = serde_json::to_string(&photo.face_vector)?;

        let result = conn.execute(
            r#"INSERT INTO photos (id, filename, source_path, blob, face_vector, similarity, content_hash, created_at)
               VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8)"#,
            params![
                photo.id,
                photo.filename,
                photo.source_path,
                photo.blob,
                vector_json,
                photo.similarity as f64,
                photo.content_hash,
                photo.created_at.to_rfc3339(),
            ],
        );

        match result {
            Ok(_) => Ok(()),
            Err(rusqlite::Error::SqliteFailure(e, _))
                if e.code == rusqlite::ErrorCode::ConstraintViolation =>
            {
                Err(FinderError::DuplicateId(photo.id.clone()))
            }
            Err(e) => Err(e.into()),
        }
    }

    /// Fetch a single photo
    pub fn get_photo(&self, id: &str) -> Result<Option<MatchedPhoto>> {
        let conn = self.lock_conn()?;
        let sql = format!("SELECT {} FROM photos WHERE id = ?1", PHOTO_COLUMNS);
        let photo = conn.query_row(&sql, params![id], row_to_photo).optional()?;
        Ok(photo)
    }

    /// All photos with their image bytes, oldest first
    pub fn get_all_photos(&self) -> Result<Vec<MatchedPhoto>> {
        self.select_all(PHOTO_COLUMNS)
    }

    /// All photos without image bytes (`blob` is left empty), oldest first
    pub fn list_photos(&self) -> Result<Vec<MatchedPhoto>> {
        self.select_all(META_COLUMNS)
    }

    fn select_all(&self, columns: &str) -> Result<Vec<MatchedPhoto>> {
        let conn = self.lock_conn()?;
        let sql = format!("SELECT {} FROM photos ORDER BY rowid", columns);
        let mut stmt = conn.prepare(&sql)?;
        let photos = stmt
            .query_map([], row_to_photo)?
            .collect::<rusqlite::Result<Vec<_>>>()?;
        Ok(photos)
    }

    /// Check for an already stored image by content hash
    pub fn find_by_hash(&self, hash: &str) -> Result<Option<String>> {
        let conn = self.lock_conn()?;
        let id = conn
            .query_row(
                "SELECT id FROM photos WHERE content_hash = ?1 LIMIT 1",
                params![hash],
                |row| row.get(0),
            )
            .optional()?;
        Ok(id)
    }

    /// Delete one photo, returning whether it existed
    pub fn delete_photo(&self, id: &str) -> Result<bool> {
        let conn = self.lock_conn()?;
        let removed = conn.execute("DELETE FROM photos WHERE id = ?1", params![id])?;
        Ok(removed > 0)
    }

    pub fn count(&self) -> Result<i64> {
        let conn = self.lock_conn()?;
        conn.query_row("SELECT COUNT(*) FROM photos", [], |row| row.get(0))
            .map_err(Into::into)
    }

    /// Remove every stored photo
    pub fn clear(&self) -> Result<usize> {
        let conn = self.lock_conn()?;
        let removed = conn.execute("DELETE FROM photos", [])?;
        Ok(removed)
    }

    /// Get cache statistics
    pub fn stats(&self) -> Result<DbStats> {
        let conn = self.lock_conn()?;
        let stats = conn.query_row(
            "SELECT COUNT(*), COALESCE(SUM(LENGTH(blob)), 0), MAX(similarity) FROM photos",
            [],
            |row| {
                Ok(DbStats {
                    photo_count: row.get(0)?,
                    total_bytes: row.get(1)?,
                    best_similarity: row.get(2)?,
                })
            },
        )?;
        Ok(stats)
    }

    /// Vacuum database
    pub fn vacuum(&self) -> Result<()> {
        let conn = self.lock_conn()?;
        conn.execute("VACUUM", [])?;
        Ok(())
    }
}

fn row_to_photo(row: &Row<'_>) -> rusqlite::Result<MatchedPhoto> {
    let vector_json: String = row.get(4)?;
    let created_str: String = row.get(7)?;
    let similarity: f64 = row.get(5)?;
    let face_vector: Descriptor = serde_json::from_str(&vector_json)
        .map_err(|e| rusqlite::Error::FromSqlConversionFailure(4, Type::Text, Box::new(e)))?;
    let created_at = DateTime::parse_from_rfc3339(&created_str)
        .map_err(|e| rusqlite::Error::FromSqlConversionFailure(7, Type::Text, Box::new(e)))?
        .with_timezone(&Utc);
    Ok(MatchedPhoto {
        id: row.get(0)?,
        filename: row.get(1)?,
        source_path: row.get(2)?,
        blob: row.get(3)?,
        face_vector,
        similarity: similarity as f32,
        content_hash: row.get(6)?,
        created_at,
    })
}

/// Generate a new UUID for photo records
pub fn new_photo_id() -> String {
    Uuid::new_v4().to_string()
}

/// Content hash used to recognise an image seen before
pub fn content_hash(data: &[u8]) -> String {
    blake3::hash(data).to_hex().to_string()
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sample(db: &Database, name: &str, bytes: &[u8]) -> MatchedPhoto {
        db.add_photo(name, &format!("/photos/{}", name), bytes.to_vec(), Descriptor::new(vec![0.1, 0.2]), 72.5)
            .unwrap()
    }

    #[test]
    fn test_add_and_get_photo() {
        let db = Database::in_memory().unwrap();
        let stored = sample(&db, "dance.jpg", b"jpeg-bytes");

        let loaded = db.get_photo(&stored.id).unwrap().unwrap();
        assert_eq!(loaded.filename, "dance.jpg");
        assert_eq!(loaded.blob, b"jpeg-bytes");
        assert_eq!(loaded.face_vector, Descriptor::new(vec![0.1, 0.2]));
        assert!((loaded.similarity - 72.5).abs() < 1e-4);
        assert_eq!(loaded.content_hash, content_hash(b"jpeg-bytes"));
    }

    #[test]
    fn test_generated_ids_are_unique() {
        let db = Database::in_memory().unwrap();
        let a = sample(&db, "a.jpg", b"same");
        let b = sample(&db, "a.jpg", b"same");
        assert_ne!(a.id, b.id);
        assert_eq!(db.count().unwrap(), 2);
    }

    #[test]
    fn test_duplicate_id_is_rejected() {
        let db = Database::in_memory().unwrap();
        let mut photo = sample(&db, "first.jpg", b"one");
        photo.filename = "second.jpg".to_string();

        let err = db.insert_photo(&photo).unwrap_err();
        assert!(matches!(err, FinderError::DuplicateId(id) if id == photo.id));
        assert_eq!(db.get_photo(&photo.id).unwrap().unwrap().filename, "first.jpg");
        assert_eq!(db.count().unwrap(), 1);
    }

    #[test]
    fn test_all_photos_in_insertion_order() {
        let db = Database::in_memory().unwrap();
        sample(&db, "1.jpg", b"1");
        sample(&db, "2.jpg", b"2");
        sample(&db, "3.jpg", b"3");

        let names: Vec<_> = db.get_all_photos().unwrap().into_iter().map(|p| p.filename).collect();
        assert_eq!(names, vec!["1.jpg", "2.jpg", "3.jpg"]);
    }

    #[test]
    fn test_list_photos_leaves_out_image_bytes() {
        let db = Database::in_memory().unwrap();
        let stored = sample(&db, "stage.jpg", b"large-jpeg-bytes");
        sample(&db, "crowd.jpg", b"more-bytes");

        let listed = db.list_photos().unwrap();
        assert_eq!(listed.len(), 2);
        assert_eq!(listed[0].id, stored.id);
        assert_eq!(listed[0].filename, "stage.jpg");
        assert_eq!(listed[0].face_vector, Descriptor::new(vec![0.1, 0.2]));
        assert_eq!(listed[0].content_hash, content_hash(b"large-jpeg-bytes"));
        assert_eq!(listed[0].created_at, stored.created_at);
        assert!(listed.iter().all(|p| p.blob.is_empty()));

        let full = db.get_all_photos().unwrap();
        assert_eq!(full[0].blob, b"large-jpeg-bytes");
        assert_eq!(full[1].blob, b"more-bytes");
    }

    #[test]
    fn test_corrupt_rows_are_reported() {
        let db = Database::in_memory().unwrap();
        let bad_vector = sample(&db, "a.jpg", b"a");
        db.lock_conn()
            .unwrap()
            .execute("UPDATE photos SET face_vector = 'garbage' WHERE id = ?1", params![bad_vector.id])
            .unwrap();
        assert!(matches!(db.get_photo(&bad_vector.id), Err(FinderError::Database(_))));
        assert!(matches!(db.get_all_photos(), Err(FinderError::Database(_))));

        db.clear().unwrap();
        let bad_time = sample(&db, "b.jpg", b"b");
        db.lock_conn()
            .unwrap()
            .execute("UPDATE photos SET created_at = 'yesterday' WHERE id = ?1", params![bad_time.id])
            .unwrap();
        assert!(matches!(db.get_photo(&bad_time.id), Err(FinderError::Database(_))));
        assert!(matches!(db.list_photos(), Err(FinderError::Database(_))));
    }

    #[test]
    fn test_find_by_hash() {
        let db = Database::in_memory().unwrap();
        let stored = sample(&db, "x.png", b"pixels");
        assert_eq!(db.find_by_hash(&content_hash(b"pixels")).unwrap(), Some(stored.id));
        assert_eq!(db.find_by_hash(&content_hash(b"other")).unwrap(), None);
    }

    #[test]
    fn test_delete_and_clear() {
        let db = Database::in_memory().unwrap();
        let a = sample(&db, "a.jpg", b"a");
        sample(&db, "b.jpg", b"b");

        assert!(db.delete_photo(&a.id).unwrap());
        assert!(!db.delete_photo(&a.id).unwrap());
        assert_eq!(db.count().unwrap(), 1);

        assert_eq!(db.clear().unwrap(), 1);
        assert_eq!(db.count().unwrap(), 0);
    }

    #[test]
    fn test_stats() {
        let db = Database::in_memory().unwrap();
        assert_eq!(db.stats().unwrap().photo_count, 0);
        assert_eq!(db.stats().unwrap().best_similarity, None);

        sample(&db, "a.jpg", b"abcd");
        let stats = db.stats().unwrap();
        assert_eq!(stats.photo_count, 1);
        assert_eq!(stats.total_bytes, 4);
    }

    #[test]
    fn test_reopen_file_database() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("cache.db");
        let id = {
            let db = Database::open(&path).unwrap();
            sample(&db, "kept.jpg", b"kept").id
        };
        let db = Database::open(&path).unwrap();
        assert!(db.get_photo(&id).unwrap().is_some());
    }
}
