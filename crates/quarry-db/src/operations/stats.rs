//! Database statistics operations.

use crate::database::Database;
use crate::error::DbResult;
use quarry_core::DatabaseStats;
use std::collections::HashMap;

impl Database {
    /// Corpus-wide counts for the stats command.
    pub fn get_stats(&self) -> DbResult<DatabaseStats> {
        let conn = self.conn()?;

        let total_documents: i64 =
            conn.query_row("SELECT COUNT(*) FROM documents", [], |row| row.get(0))?;

        let mut documents_by_status = HashMap::new();
        {
            let mut stmt =
                conn.prepare("SELECT status, COUNT(*) FROM documents GROUP BY status")?;
            let rows = stmt.query_map([], |row| {
                Ok((row.get::<_, String>(0)?, row.get::<_, i64>(1)?))
            })?;
            for row in rows {
                let (status, count) = row?;
                documents_by_status.insert(status, count);
            }
        }

        let mut documents_by_type = HashMap::new();
        {
            let mut stmt =
                conn.prepare("SELECT content_type, COUNT(*) FROM documents GROUP BY content_type")?;
            let rows = stmt.query_map([], |row| {
                Ok((row.get::<_, String>(0)?, row.get::<_, i64>(1)?))
            })?;
            for row in rows {
                let (content_type, count) = row?;
                documents_by_type.insert(content_type, count);
            }
        }

        let total_chunks: i64 =
            conn.query_row("SELECT COUNT(*) FROM chunks", [], |row| row.get(0))?;

        let total_embeddings: i64 =
            conn.query_row("SELECT COUNT(*) FROM embeddings", [], |row| row.get(0))?;

        // Database size (page_count * page_size)
        let page_count: i64 = conn.pragma_query_value(None, "page_count", |row| row.get(0))?;
        let page_size: i64 = conn.pragma_query_value(None, "page_size", |row| row.get(0))?;
        let database_size_bytes = page_count * page_size;

        Ok(DatabaseStats {
            total_documents,
            documents_by_status,
            documents_by_type,
            total_chunks,
            total_embeddings,
            database_size_bytes,
        })
    }
}
