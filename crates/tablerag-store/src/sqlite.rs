//! Durable vector index on SQLite.
//!
//! Records live in one table keyed by row id; embeddings are stored as raw
//! f32 blobs and searched through an in-memory normalized matrix that is
//! loaded lazily and kept in sync with inserts.

use std::path::{Path, PathBuf};

use ndarray::Array1;
use parking_lot::Mutex;
use rusqlite::{params, Connection, OptionalExtension};
use tracing::{debug, info};

use crate::embedding::{decode_f32_blob, encode_f32_blob, CosineMatrix};
use crate::schema::{META_EMBEDDING_DIM, SCHEMA_SQL};
use crate::types::{VectorHit, VectorRecord};
use crate::vector::VectorIndex;
use tablerag_core::{Attributes, CellValue, Error, Result};

fn db_err(e: rusqlite::Error) -> Error {
    Error::Database(e.to_string())
}

/// Key wrapping floats JSON cannot represent (`inf`, `-inf`, `NaN`).
const NON_FINITE_KEY: &str = "$float";

fn metadata_to_json(metadata: &Attributes) -> Result<String> {
    let map: serde_json::Map<String, serde_json::Value> = metadata
        .iter()
        .map(|(key, value)| -> Result<(String, serde_json::Value)> {
            let json = match value {
                CellValue::Float(v) if !v.is_finite() => {
                    let mut wrapped = serde_json::Map::new();
                    wrapped.insert(NON_FINITE_KEY.to_string(), v.to_string().into());
                    serde_json::Value::Object(wrapped)
                }
                other => serde_json::to_value(other)?,
            };
            Ok((key.clone(), json))
        })
        .collect::<Result<_>>()?;
    Ok(serde_json::Value::Object(map).to_string())
}

fn metadata_from_json(raw: &str) -> Result<Attributes> {
    let map: serde_json::Map<String, serde_json::Value> = serde_json::from_str(raw)?;
    map.into_iter()
        .map(|(key, json)| -> Result<(String, CellValue)> {
            let wrapped = json
                .as_object()
                .and_then(|obj| obj.get(NON_FINITE_KEY))
                .and_then(|v| v.as_str())
                .and_then(|v| v.parse::<f64>().ok());
            let value = match wrapped {
                Some(v) => CellValue::Float(v),
                None => serde_json::from_value(json)?,
            };
            Ok((key, value))
        })
        .collect()
}

pub struct SqliteVectorIndex {
    conn: Mutex<Connection>,
    db_path: PathBuf,
    embedding_dim: usize,
    matrix: Mutex<MatrixCache>,
}

struct MatrixCache {
    matrix: CosineMatrix,
    /// Whether the matrix must be reloaded from disk before searching.
    dirty: bool,
}

impl SqliteVectorIndex {
    /// Open or create the index.
    ///
    /// `db_dir` is the directory (e.g., `data/vectordb/`). The file will be
    /// `db_dir/tablerag.db`. Fails if the file already holds vectors of a
    /// different dimension.
    pub fn open(db_dir: impl AsRef<Path>, embedding_dim: usize) -> Result<Self> {
        let db_dir = db_dir.as_ref();
        std::fs::create_dir_all(db_dir).map_err(|e| Error::Storage(e.to_string()))?;
        let db_path = db_dir.join("tablerag.db");

        let conn = Self::create_connection(&db_path)?;
        conn.execute_batch(SCHEMA_SQL)
            .map_err(|e| Error::Database(format!("Schema init failed: {}", e)))?;
        Self::check_dimension(&conn, embedding_dim, &db_path)?;

        let index = Self {
            conn: Mutex::new(conn),
            db_path,
            embedding_dim,
            matrix: Mutex::new(MatrixCache {
                matrix: CosineMatrix::new(embedding_dim),
                dirty: true,
            }),
        };

        info!(
            "SqliteVectorIndex opened: {} records, dim={}, path={}",
            index.len()?,
            embedding_dim,
            index.db_path.display()
        );
        Ok(index)
    }

    fn create_connection(db_path: &Path) -> Result<Connection> {
        let conn = Connection::open(db_path).map_err(db_err)?;
        conn.execute_batch(
            "PRAGMA journal_mode = WAL;
             PRAGMA cache_size = -65536;
             PRAGMA synchronous = NORMAL;",
        )
        .map_err(db_err)?;
        Ok(conn)
    }

    fn check_dimension(conn: &Connection, dim: usize, db_path: &Path) -> Result<()> {
        let stored: Option<String> = conn
            .query_row(
                "SELECT value FROM index_meta WHERE key = ?1",
                params![META_EMBEDDING_DIM],
                |row| row.get(0),
            )
            .optional()
            .map_err(db_err)?;

        if let Some(stored) = stored {
            if stored != dim.to_string() {
                let count: i64 = conn
                    .query_row("SELECT COUNT(*) FROM vector_records", [], |row| row.get(0))
                    .map_err(db_err)?;
                if count > 0 {
                    return Err(Error::Config(format!(
                        "{} holds {}-dim vectors but the encoder produces {}; remove it or switch encoders",
                        db_path.display(),
                        stored,
                        dim
                    )));
                }
            }
        }

        conn.execute(
            "INSERT OR REPLACE INTO index_meta (key, value) VALUES (?1, ?2)",
            params![META_EMBEDDING_DIM, dim.to_string()],
        )
        .map_err(db_err)?;
        Ok(())
    }

    pub fn path(&self) -> &Path {
        &self.db_path
    }

    fn ensure_matrix_loaded(&self) -> Result<()> {
        if !self.matrix.lock().dirty {
            return Ok(());
        }

        let mut loaded = CosineMatrix::new(self.embedding_dim);
        {
            let conn = self.conn.lock();
            let mut stmt = conn
                .prepare("SELECT id, embedding FROM vector_records ORDER BY seq")
                .map_err(db_err)?;
            let rows = stmt
                .query_map([], |row| {
                    let id: String = row.get(0)?;
                    let blob: Vec<u8> = row.get(1)?;
                    Ok((id, blob))
                })
                .map_err(db_err)?;

            for row in rows {
                let (id, blob) = row.map_err(db_err)?;
                let embedding = decode_f32_blob(&blob)?;
                loaded.push(id, &embedding)?;
            }
        } // conn and stmt dropped here

        debug!("Loaded {} vectors into matrix", loaded.len());
        let mut cache = self.matrix.lock();
        cache.matrix = loaded;
        cache.dirty = false;
        Ok(())
    }
}

impl VectorIndex for SqliteVectorIndex {
    fn clear(&self) -> Result<()> {
        let removed = self
            .conn
            .lock()
            .execute("DELETE FROM vector_records", [])
            .map_err(db_err)?;

        let mut cache = self.matrix.lock();
        cache.matrix.clear();
        cache.dirty = false;
        debug!("Cleared {} vector records", removed);
        Ok(())
    }

    fn insert_batch(&self, records: Vec<VectorRecord>) -> Result<()> {
        for record in &records {
            if record.embedding.len() != self.embedding_dim {
                return Err(Error::Storage(format!(
                    "vector {} has dimension {}, index expects {}",
                    record.id,
                    record.embedding.len(),
                    self.embedding_dim
                )));
            }
        }

        let now = std::time::SystemTime::now()
            .duration_since(std::time::UNIX_EPOCH)
            .unwrap_or_default()
            .as_millis() as i64;

        {
            let mut conn = self.conn.lock();
            // Dropping an uncommitted transaction rolls the batch back.
            let tx = conn.transaction().map_err(db_err)?;
            {
                let mut stmt = tx
                    .prepare_cached(
                        "INSERT INTO vector_records (id, embedding, metadata_json, document, created_at) \
                         VALUES (?1, ?2, ?3, ?4, ?5)",
                    )
                    .map_err(db_err)?;
                for record in &records {
                    let meta_json = metadata_to_json(&record.metadata)?;
                    stmt.execute(params![
                        record.id,
                        encode_f32_blob(&record.embedding),
                        meta_json,
                        record.document,
                        now
                    ])
                    .map_err(|e| {
                        if e.to_string().contains("UNIQUE constraint") {
                            Error::Storage(format!("duplicate vector id: {}", record.id))
                        } else {
                            db_err(e)
                        }
                    })?;
                }
            }
            tx.commit().map_err(db_err)?;
        }

        let mut cache = self.matrix.lock();
        if !cache.dirty {
            for record in &records {
                cache.matrix.push(record.id.clone(), &record.embedding)?;
            }
        }
        debug!("Inserted {} vector records", records.len());
        Ok(())
    }

    fn query_knn(&self, embedding: &Array1<f32>, k: usize) -> Result<Vec<VectorHit>> {
        self.ensure_matrix_loaded()?;
        self.matrix.lock().matrix.knn(embedding, k)
    }

    fn len(&self) -> Result<usize> {
        let count: i64 = self
            .conn
            .lock()
            .query_row("SELECT COUNT(*) FROM vector_records", [], |row| row.get(0))
            .map_err(db_err)?;
        Ok(count as usize)
    }

    fn get(&self, id: &str) -> Result<Option<VectorRecord>> {
        let conn = self.conn.lock();
        let row = conn
            .prepare_cached(
                "SELECT id, embedding, metadata_json, document FROM vector_records WHERE id = ?1",
            )
            .map_err(db_err)?
            .query_row(params![id], |row| {
                Ok((
                    row.get::<_, String>(0)?,
                    row.get::<_, Vec<u8>>(1)?,
                    row.get::<_, String>(2)?,
                    row.get::<_, String>(3)?,
                ))
            })
            .optional()
            .map_err(db_err)?;

        match row {
            Some((id, blob, meta_json, document)) => {
                let metadata = metadata_from_json(&meta_json)?;
                Ok(Some(VectorRecord {
                    id,
                    embedding: decode_f32_blob(&blob)?,
                    metadata,
                    document,
                }))
            }
            None => Ok(None),
        }
    }

    fn dimension(&self) -> usize {
        self.embedding_dim
    }
}
