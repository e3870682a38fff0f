//! Chunk and embedding storage.

use crate::database::Database;
use crate::error::{DbError, DbResult};
use crate::operations::vectors::{vector_from_bytes, vector_to_bytes};
use chrono::{DateTime, Utc};
use quarry_core::{Chunk, ChunkId, ChunkStrategy, DocumentId};
use rusqlite::{params, Row};

pub(crate) fn map_chunk_row(row: &Row<'_>) -> rusqlite::Result<Chunk> {
    let strategy_str: String = row.get(6)?;
    let created_at_str: String = row.get(8)?;

    Ok(Chunk {
        id: row.get(0)?,
        document_id: row.get(1)?,
        chunk_index: row.get(2)?,
        content: row.get(3)?,
        char_count: row.get(4)?,
        token_count: row.get(5)?,
        strategy: ChunkStrategy::from_str(&strategy_str).unwrap_or_default(),
        heading: row.get(7)?,
        created_at: DateTime::parse_from_rfc3339(&created_at_str)
            .map(|dt| dt.with_timezone(&Utc))
            .unwrap_or_else(|_| Utc::now()),
    })
}

pub(crate) const CHUNK_COLUMNS: &str =
    "id, document_id, chunk_index, content, char_count, token_count, strategy, heading, created_at";

impl Database {
    /// Get a single chunk by ID.
    pub fn get_chunk(&self, id: &ChunkId) -> DbResult<Chunk> {
        let conn = self.conn()?;
        conn.query_row(
            &format!("SELECT {CHUNK_COLUMNS} FROM chunks WHERE id = ?1"),
            params![id],
            map_chunk_row,
        )
        .map_err(|e| match e {
            rusqlite::Error::QueryReturnedNoRows => {
                DbError::NotFound(format!("Chunk not found: {}", id))
            }
            _ => DbError::from(e),
        })
    }

    /// All chunks of a document, in index order.
    pub fn get_chunks_by_document(&self, document_id: &DocumentId) -> DbResult<Vec<Chunk>> {
        let conn = self.conn()?;
        let mut stmt = conn.prepare(&format!(
            "SELECT {CHUNK_COLUMNS} FROM chunks WHERE document_id = ?1 ORDER BY chunk_index"
        ))?;

        let chunks = stmt.query_map(params![document_id], map_chunk_row)?;
        chunks.collect::<Result<Vec<_>, _>>().map_err(DbError::from)
    }

    /// Chunks of a document whose index falls in `[lo, hi]`, in index order.
    /// Used for surrounding-context expansion around a search hit.
    pub fn get_chunks_in_range(
        &self,
        document_id: &DocumentId,
        lo: i32,
        hi: i32,
    ) -> DbResult<Vec<Chunk>> {
        let conn = self.conn()?;
        let mut stmt = conn.prepare(&format!(
            "SELECT {CHUNK_COLUMNS} FROM chunks \
             WHERE document_id = ?1 AND chunk_index BETWEEN ?2 AND ?3 \
             ORDER BY chunk_index"
        ))?;

        let chunks = stmt.query_map(params![document_id, lo, hi], map_chunk_row)?;
        chunks.collect::<Result<Vec<_>, _>>().map_err(DbError::from)
    }

    /// Store (or replace) the embedding vector for a chunk.
    pub fn store_embedding(&self, chunk_id: &ChunkId, vector: &[f32], model: &str) -> DbResult<()> {
        let conn = self.conn()?;
        conn.execute(
            r#"
            INSERT OR REPLACE INTO embeddings (chunk_id, vector, model, dimensions)
            VALUES (?1, ?2, ?3, ?4)
            "#,
            params![chunk_id, vector_to_bytes(vector), model, vector.len() as i32],
        )?;
        Ok(())
    }

    /// Fetch the embedding vector for a chunk, if one has been stored.
    pub fn get_embedding(&self, chunk_id: &ChunkId) -> DbResult<Option<Vec<f32>>> {
        let conn = self.conn()?;
        let result = conn.query_row(
            "SELECT vector FROM embeddings WHERE chunk_id = ?1",
            params![chunk_id],
            |row| row.get::<_, Vec<u8>>(0),
        );

        match result {
            Ok(bytes) => Ok(Some(vector_from_bytes(&bytes))),
            Err(rusqlite::Error::QueryReturnedNoRows) => Ok(None),
            Err(e) => Err(DbError::from(e)),
        }
    }

    /// Total number of chunks across all documents.
    pub fn count_chunks(&self) -> DbResult<i64> {
        let conn = self.conn()?;
        let count = conn.query_row("SELECT COUNT(*) FROM chunks", [], |row| row.get(0))?;
        Ok(count)
    }
}
