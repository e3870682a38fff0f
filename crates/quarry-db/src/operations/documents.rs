//! Document CRUD operations.

use crate::database::Database;
use crate::error::{DbError, DbResult};
use crate::operations::vectors::vector_to_bytes;
use chrono::{DateTime, Utc};
use quarry_core::{Chunk, ContentType, Document, DocumentId, DocumentStatus};
use rusqlite::{params, Row};

pub(crate) fn map_document_row(row: &Row<'_>) -> rusqlite::Result<Document> {
    let content_type_str: String = row.get(4)?;
    let status_str: String = row.get(6)?;
    let metadata_str: String = row.get(8)?;
    let created_at_str: String = row.get(9)?;
    let processed_at_str: Option<String> = row.get(10)?;

    Ok(Document {
        id: row.get(0)?,
        filename: row.get(1)?,
        source_path: row.get(2)?,
        content_hash: row.get(3)?,
        content_type: ContentType::from_str(&content_type_str).unwrap_or(ContentType::Text),
        file_size: row.get(5)?,
        status: DocumentStatus::from_str(&status_str).unwrap_or_default(),
        chunk_count: row.get(7)?,
        metadata: serde_json::from_str(&metadata_str).unwrap_or_default(),
        created_at: DateTime::parse_from_rfc3339(&created_at_str)
            .map(|dt| dt.with_timezone(&Utc))
            .unwrap_or_else(|_| Utc::now()),
        processed_at: processed_at_str.and_then(|s| {
            DateTime::parse_from_rfc3339(&s)
                .map(|dt| dt.with_timezone(&Utc))
                .ok()
        }),
    })
}

const DOCUMENT_COLUMNS: &str = "id, filename, source_path, content_hash, content_type, \
     file_size, status, chunk_count, metadata, created_at, processed_at";

impl Database {
    /// Create a new document row.
    ///
    /// A UNIQUE violation on `content_hash` comes back as `DbError::Duplicate`
    /// so callers can record a skip instead of an error.
    pub fn create_document(&self, doc: &Document) -> DbResult<()> {
        let conn = self.conn()?;
        let result = conn.execute(
            r#"
            INSERT INTO documents (id, filename, source_path, content_hash, content_type,
                                   file_size, status, chunk_count, metadata, created_at, processed_at)
            VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10, ?11)
            "#,
            params![
                doc.id,
                doc.filename,
                doc.source_path,
                doc.content_hash,
                doc.content_type.as_str(),
                doc.file_size,
                doc.status.as_str(),
                doc.chunk_count,
                doc.metadata.to_string(),
                doc.created_at.to_rfc3339(),
                doc.processed_at.map(|dt| dt.to_rfc3339()),
            ],
        );

        match result {
            Ok(_) => Ok(()),
            Err(e) => {
                let err = DbError::from(e);
                if err.is_unique_violation() {
                    Err(DbError::Duplicate(doc.content_hash.clone()))
                } else {
                    Err(err)
                }
            }
        }
    }

    /// Get a document by ID.
    pub fn get_document(&self, id: &DocumentId) -> DbResult<Document> {
        let conn = self.conn()?;
        conn.query_row(
            &format!("SELECT {DOCUMENT_COLUMNS} FROM documents WHERE id = ?1"),
            params![id],
            map_document_row,
        )
        .map_err(|e| match e {
            rusqlite::Error::QueryReturnedNoRows => {
                DbError::NotFound(format!("Document not found: {}", id))
            }
            _ => DbError::from(e),
        })
    }

    /// Find a document by its content hash.
    pub fn find_document_by_hash(&self, content_hash: &str) -> DbResult<Option<Document>> {
        let conn = self.conn()?;
        let result = conn.query_row(
            &format!("SELECT {DOCUMENT_COLUMNS} FROM documents WHERE content_hash = ?1"),
            params![content_hash],
            map_document_row,
        );

        match result {
            Ok(doc) => Ok(Some(doc)),
            Err(rusqlite::Error::QueryReturnedNoRows) => Ok(None),
            Err(e) => Err(DbError::from(e)),
        }
    }

    /// Find a document by its source path.
    pub fn find_document_by_path(&self, source_path: &str) -> DbResult<Option<Document>> {
        let conn = self.conn()?;
        let result = conn.query_row(
            &format!("SELECT {DOCUMENT_COLUMNS} FROM documents WHERE source_path = ?1"),
            params![source_path],
            map_document_row,
        );

        match result {
            Ok(doc) => Ok(Some(doc)),
            Err(rusqlite::Error::QueryReturnedNoRows) => Ok(None),
            Err(e) => Err(DbError::from(e)),
        }
    }

    /// List the most recently ingested documents.
    pub fn list_recent_documents(&self, limit: i64) -> DbResult<Vec<Document>> {
        let conn = self.conn()?;
        let mut stmt = conn.prepare(&format!(
            "SELECT {DOCUMENT_COLUMNS} FROM documents ORDER BY created_at DESC LIMIT ?1"
        ))?;

        let docs = stmt.query_map(params![limit], map_document_row)?;
        docs.collect::<Result<Vec<_>, _>>().map_err(DbError::from)
    }

    /// Persist a document together with its chunks and their embeddings as
    /// one transaction. Partial persistence of a document's chunks is never
    /// observable.
    pub fn insert_document_tree(
        &self,
        doc: &Document,
        chunks: &[Chunk],
        embeddings: &[Vec<f32>],
        model: &str,
    ) -> DbResult<()> {
        debug_assert_eq!(chunks.len(), embeddings.len());

        let mut conn = self.conn()?;
        let tx = conn.transaction()?;

        let inserted = tx.execute(
            r#"
            INSERT INTO documents (id, filename, source_path, content_hash, content_type,
                                   file_size, status, chunk_count, metadata, created_at, processed_at)
            VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10, ?11)
            "#,
            params![
                doc.id,
                doc.filename,
                doc.source_path,
                doc.content_hash,
                doc.content_type.as_str(),
                doc.file_size,
                doc.status.as_str(),
                doc.chunk_count,
                doc.metadata.to_string(),
                doc.created_at.to_rfc3339(),
                doc.processed_at.map(|dt| dt.to_rfc3339()),
            ],
        );

        if let Err(e) = inserted {
            let err = DbError::from(e);
            if err.is_unique_violation() {
                return Err(DbError::Duplicate(doc.content_hash.clone()));
            }
            return Err(err);
        }

        insert_chunk_rows(&tx, chunks, embeddings, model)?;

        tx.commit()?;
        Ok(())
    }

    /// Replace the chunks of an existing document in one transaction and
    /// refresh its hash, size, status, and chunk count.
    pub fn replace_document_tree(
        &self,
        doc: &Document,
        chunks: &[Chunk],
        embeddings: &[Vec<f32>],
        model: &str,
    ) -> DbResult<()> {
        debug_assert_eq!(chunks.len(), embeddings.len());

        let mut conn = self.conn()?;
        let tx = conn.transaction()?;

        tx.execute("DELETE FROM chunks WHERE document_id = ?1", params![doc.id])?;

        let rows = tx.execute(
            r#"
            UPDATE documents
            SET content_hash = ?2, file_size = ?3, status = ?4, chunk_count = ?5,
                metadata = ?6, processed_at = ?7
            WHERE id = ?1
            "#,
            params![
                doc.id,
                doc.content_hash,
                doc.file_size,
                doc.status.as_str(),
                doc.chunk_count,
                doc.metadata.to_string(),
                doc.processed_at.map(|dt| dt.to_rfc3339()),
            ],
        )?;

        if rows == 0 {
            return Err(DbError::NotFound(format!("Document not found: {}", doc.id)));
        }

        insert_chunk_rows(&tx, chunks, embeddings, model)?;

        tx.commit()?;
        Ok(())
    }

    /// Update a document's status (and processed timestamp when terminal).
    pub fn update_document_status(
        &self,
        id: &DocumentId,
        status: DocumentStatus,
        chunk_count: i64,
    ) -> DbResult<()> {
        let conn = self.conn()?;
        let rows = conn.execute(
            "UPDATE documents SET status = ?2, chunk_count = ?3, processed_at = ?4 WHERE id = ?1",
            params![
                id,
                status.as_str(),
                chunk_count,
                Utc::now().to_rfc3339(),
            ],
        )?;

        if rows == 0 {
            return Err(DbError::NotFound(format!("Document not found: {}", id)));
        }

        Ok(())
    }

    /// Delete a document by content hash. Chunks and embeddings cascade.
    /// Returns true if a row was deleted.
    pub fn delete_document_by_hash(&self, content_hash: &str) -> DbResult<bool> {
        let conn = self.conn()?;
        let rows = conn.execute(
            "DELETE FROM documents WHERE content_hash = ?1",
            params![content_hash],
        )?;
        Ok(rows > 0)
    }
}

fn insert_chunk_rows(
    tx: &rusqlite::Transaction<'_>,
    chunks: &[Chunk],
    embeddings: &[Vec<f32>],
    model: &str,
) -> DbResult<()> {
    let mut chunk_stmt = tx.prepare(
        r#"
        INSERT INTO chunks (id, document_id, chunk_index, content, char_count,
                            token_count, strategy, heading, created_at)
        VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9)
        "#,
    )?;
    let mut embedding_stmt = tx.prepare(
        "INSERT INTO embeddings (chunk_id, vector, model, dimensions) VALUES (?1, ?2, ?3, ?4)",
    )?;

    for (chunk, vector) in chunks.iter().zip(embeddings) {
        chunk_stmt.execute(params![
            chunk.id,
            chunk.document_id,
            chunk.chunk_index,
            chunk.content,
            chunk.char_count,
            chunk.token_count,
            chunk.strategy.as_str(),
            chunk.heading,
            chunk.created_at.to_rfc3339(),
        ])?;
        embedding_stmt.execute(params![
            chunk.id,
            vector_to_bytes(vector),
            model,
            vector.len() as i32,
        ])?;
    }

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use quarry_core::ChunkStrategy;

    fn sample_document(hash: &str) -> Document {
        Document::new("notes.txt", "/tmp/notes.txt", hash, ContentType::Text, 64)
    }

    #[test]
    fn test_document_crud() {
        let db = Database::open_in_memory().unwrap();

        let doc = sample_document("hash-a");
        db.create_document(&doc).unwrap();

        let fetched = db.get_document(&doc.id).unwrap();
        assert_eq!(fetched.filename, "notes.txt");
        assert_eq!(fetched.content_hash, "hash-a");
        assert_eq!(fetched.status, DocumentStatus::Pending);

        db.update_document_status(&doc.id, DocumentStatus::Processed, 3)
            .unwrap();
        let fetched = db.get_document(&doc.id).unwrap();
        assert_eq!(fetched.status, DocumentStatus::Processed);
        assert_eq!(fetched.chunk_count, 3);

        assert!(db.delete_document_by_hash("hash-a").unwrap());
        assert!(!db.delete_document_by_hash("hash-a").unwrap());
    }

    #[test]
    fn test_duplicate_hash_rejected() {
        let db = Database::open_in_memory().unwrap();

        db.create_document(&sample_document("same-hash")).unwrap();
        let err = db.create_document(&sample_document("same-hash")).unwrap_err();

        assert!(matches!(err, DbError::Duplicate(_)));
        assert!(err.is_unique_violation());
    }

    #[test]
    fn test_find_by_hash_and_path() {
        let db = Database::open_in_memory().unwrap();

        let doc = sample_document("hash-b");
        db.create_document(&doc).unwrap();

        assert!(db.find_document_by_hash("hash-b").unwrap().is_some());
        assert!(db.find_document_by_hash("missing").unwrap().is_none());
        assert!(db.find_document_by_path("/tmp/notes.txt").unwrap().is_some());
        assert!(db.find_document_by_path("/tmp/other.txt").unwrap().is_none());
    }

    #[test]
    fn test_insert_document_tree_is_atomic() {
        let db = Database::open_in_memory().unwrap();

        let mut doc = sample_document("hash-c");
        doc.mark_processed(2);

        let chunks = vec![
            Chunk::new(doc.id.clone(), 0, "first chunk", ChunkStrategy::Sentence),
            Chunk::new(doc.id.clone(), 1, "second chunk", ChunkStrategy::Sentence),
        ];
        let embeddings = vec![vec![1.0, 0.0], vec![0.0, 1.0]];

        db.insert_document_tree(&doc, &chunks, &embeddings, "test-model")
            .unwrap();

        let stored = db.get_chunks_by_document(&doc.id).unwrap();
        assert_eq!(stored.len(), 2);
        assert_eq!(stored[0].chunk_index, 0);
        assert_eq!(stored[1].chunk_index, 1);
        assert!(db.get_embedding(&stored[0].id).unwrap().is_some());
    }

    #[test]
    fn test_replace_document_tree() {
        let db = Database::open_in_memory().unwrap();

        let mut doc = sample_document("hash-d");
        doc.mark_processed(1);
        let chunks = vec![Chunk::new(doc.id.clone(), 0, "old text", ChunkStrategy::Sentence)];
        db.insert_document_tree(&doc, &chunks, &[vec![1.0]], "test-model")
            .unwrap();

        doc.content_hash = "hash-d2".to_string();
        doc.mark_processed(2);
        let new_chunks = vec![
            Chunk::new(doc.id.clone(), 0, "new text a", ChunkStrategy::Sentence),
            Chunk::new(doc.id.clone(), 1, "new text b", ChunkStrategy::Sentence),
        ];
        db.replace_document_tree(&doc, &new_chunks, &[vec![1.0], vec![2.0]], "test-model")
            .unwrap();

        let stored = db.get_chunks_by_document(&doc.id).unwrap();
        assert_eq!(stored.len(), 2);
        assert_eq!(stored[0].content, "new text a");

        let fetched = db.get_document(&doc.id).unwrap();
        assert_eq!(fetched.content_hash, "hash-d2");
    }

    #[test]
    fn test_cascade_delete_removes_chunks() {
        let db = Database::open_in_memory().unwrap();

        let mut doc = sample_document("hash-e");
        doc.mark_processed(1);
        let chunks = vec![Chunk::new(doc.id.clone(), 0, "text", ChunkStrategy::Sentence)];
        db.insert_document_tree(&doc, &chunks, &[vec![1.0]], "test-model")
            .unwrap();

        assert!(db.delete_document_by_hash("hash-e").unwrap());
        let remaining = db.get_chunks_by_document(&doc.id).unwrap();
        assert!(remaining.is_empty());
    }
}
