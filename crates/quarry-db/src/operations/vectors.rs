//! Vector similarity search over stored embeddings.

use crate::database::Database;
use crate::error::DbResult;
use crate::operations::chunks::map_chunk_row;
use quarry_core::{ContentType, DocumentMatch, SearchQuery};
use rusqlite::types::Value;

/// Serialize a vector as little-endian f32 bytes.
pub fn vector_to_bytes(vector: &[f32]) -> Vec<u8> {
    let mut bytes = Vec::with_capacity(vector.len() * 4);
    for value in vector {
        bytes.extend_from_slice(&value.to_le_bytes());
    }
    bytes
}

/// Deserialize little-endian f32 bytes back into a vector.
pub fn vector_from_bytes(bytes: &[u8]) -> Vec<f32> {
    bytes
        .chunks_exact(4)
        .map(|b| f32::from_le_bytes([b[0], b[1], b[2], b[3]]))
        .collect()
}

/// Euclidean (L2) distance between two vectors.
///
/// Mismatched or empty vectors return infinity so they rank last.
pub fn l2_distance(a: &[f32], b: &[f32]) -> f32 {
    if a.len() != b.len() || a.is_empty() {
        return f32::INFINITY;
    }

    let mut sum = 0.0f32;
    for i in 0..a.len() {
        let diff = a[i] - b[i];
        sum += diff * diff;
    }
    sum.sqrt()
}

/// Map an L2 distance into a (0, 1] similarity score: `1 / (1 + distance)`.
/// Distance 0 scores exactly 1.0; larger distances decay toward 0. A NaN
/// distance (corrupt stored vector) scores 0.0 so it ranks last.
pub fn similarity_from_distance(distance: f32) -> f32 {
    if distance.is_nan() {
        return 0.0;
    }
    1.0 / (1.0 + distance)
}

impl Database {
    /// Find the chunks nearest to a query vector.
    ///
    /// Scalar filters from the query (document IDs, content types, date range)
    /// are pushed into the SQL WHERE clause so the brute-force distance scan
    /// only touches candidate rows. Results come back sorted by similarity
    /// descending; `min_similarity` is NOT applied here, callers filter.
    pub fn vector_search(
        &self,
        query_vector: &[f32],
        query: &SearchQuery,
        limit: usize,
    ) -> DbResult<Vec<DocumentMatch>> {
        let conn = self.conn()?;

        let mut sql = String::from(
            "SELECT c.id, c.document_id, c.chunk_index, c.content, c.char_count, \
                    c.token_count, c.strategy, c.heading, c.created_at, \
                    e.vector, d.filename, d.source_path, d.content_type \
             FROM embeddings e \
             JOIN chunks c ON c.id = e.chunk_id \
             JOIN documents d ON d.id = c.document_id",
        );

        let mut clauses: Vec<String> = Vec::new();
        let mut params: Vec<Value> = Vec::new();

        if let Some(document_ids) = &query.document_ids {
            if !document_ids.is_empty() {
                let placeholders = placeholder_list(params.len(), document_ids.len());
                clauses.push(format!("c.document_id IN ({placeholders})"));
                params.extend(document_ids.iter().map(|id| Value::from(id.clone())));
            }
        }

        if let Some(content_types) = &query.content_types {
            if !content_types.is_empty() {
                let placeholders = placeholder_list(params.len(), content_types.len());
                clauses.push(format!("d.content_type IN ({placeholders})"));
                params.extend(
                    content_types
                        .iter()
                        .map(|ct| Value::from(ct.as_str().to_string())),
                );
            }
        }

        if let Some((start, end)) = &query.date_range {
            clauses.push(format!(
                "d.created_at >= ?{} AND d.created_at <= ?{}",
                params.len() + 1,
                params.len() + 2
            ));
            params.push(Value::from(start.to_rfc3339()));
            params.push(Value::from(end.to_rfc3339()));
        }

        if !clauses.is_empty() {
            sql.push_str(" WHERE ");
            sql.push_str(&clauses.join(" AND "));
        }

        let mut stmt = conn.prepare(&sql)?;

        let rows = stmt.query_map(rusqlite::params_from_iter(params), |row| {
            let chunk = map_chunk_row(row)?;
            let vector_bytes: Vec<u8> = row.get(9)?;
            let filename: String = row.get(10)?;
            let filepath: String = row.get(11)?;
            let content_type: String = row.get(12)?;
            Ok((chunk, vector_bytes, filename, filepath, content_type))
        })?;

        let mut matches: Vec<DocumentMatch> = Vec::new();
        for row_result in rows {
            let (chunk, vector_bytes, filename, filepath, content_type) = row_result?;

            let vector = vector_from_bytes(&vector_bytes);
            let distance = l2_distance(query_vector, &vector);
            let similarity = similarity_from_distance(distance);

            matches.push(DocumentMatch {
                chunk,
                similarity,
                filename,
                filepath,
                content_type: ContentType::from_str(&content_type).unwrap_or(ContentType::Text),
            });
        }

        // total_cmp keeps the sort total even if a stored vector held a NaN
        matches.sort_by(|a, b| b.similarity.total_cmp(&a.similarity));
        matches.truncate(limit);

        Ok(matches)
    }
}

fn placeholder_list(offset: usize, count: usize) -> String {
    (1..=count)
        .map(|i| format!("?{}", offset + i))
        .collect::<Vec<_>>()
        .join(", ")
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::{Duration, Utc};
    use quarry_core::{Chunk, ChunkStrategy, ContentType, Document};

    #[test]
    fn test_l2_distance() {
        assert_eq!(l2_distance(&[0.0, 0.0], &[3.0, 4.0]), 5.0);
        assert_eq!(l2_distance(&[1.0, 2.0], &[1.0, 2.0]), 0.0);

        // Mismatched and empty vectors rank last
        assert_eq!(l2_distance(&[1.0], &[1.0, 2.0]), f32::INFINITY);
        assert_eq!(l2_distance(&[], &[]), f32::INFINITY);
    }

    #[test]
    fn test_similarity_bounds_and_monotonicity() {
        // Identical vectors score exactly 1.0
        assert_eq!(similarity_from_distance(0.0), 1.0);

        // Strictly decreasing in distance, always positive
        let mut prev = similarity_from_distance(0.0);
        for d in [0.5, 1.0, 2.0, 10.0, 1000.0] {
            let sim = similarity_from_distance(d);
            assert!(sim < prev);
            assert!(sim > 0.0 && sim <= 1.0);
            prev = sim;
        }

        assert_eq!(similarity_from_distance(f32::INFINITY), 0.0);
        assert_eq!(similarity_from_distance(f32::NAN), 0.0);
    }

    #[test]
    fn test_vector_bytes_round_trip() {
        let vector = vec![0.0_f32, -1.25, 3.5, f32::MAX];
        assert_eq!(vector_from_bytes(&vector_to_bytes(&vector)), vector);
    }

    fn seed_doc(
        db: &Database,
        name: &str,
        content_type: ContentType,
        texts_and_vectors: &[(&str, Vec<f32>)],
    ) -> Document {
        let mut doc = Document::new(
            name,
            format!("/tmp/{name}"),
            format!("hash-{name}"),
            content_type,
            100,
        );
        doc.mark_processed(texts_and_vectors.len() as i64);
        let chunks: Vec<Chunk> = texts_and_vectors
            .iter()
            .enumerate()
            .map(|(i, (text, _))| {
                Chunk::new(doc.id.clone(), i as i32, *text, ChunkStrategy::Sentence)
            })
            .collect();
        let embeddings: Vec<Vec<f32>> =
            texts_and_vectors.iter().map(|(_, v)| v.clone()).collect();
        db.insert_document_tree(&doc, &chunks, &embeddings, "test-model")
            .unwrap();
        doc
    }

    #[test]
    fn test_vector_search_ranks_by_distance() {
        let db = Database::open_in_memory().unwrap();
        seed_doc(
            &db,
            "a.txt",
            ContentType::Text,
            &[
                ("near", vec![1.0, 0.0]),
                ("far", vec![0.0, 10.0]),
                ("middle", vec![2.0, 0.0]),
            ],
        );

        let query = SearchQuery::new("anything");
        let matches = db.vector_search(&[1.0, 0.0], &query, 10).unwrap();

        assert_eq!(matches.len(), 3);
        assert_eq!(matches[0].chunk.content, "near");
        assert_eq!(matches[0].similarity, 1.0);
        assert_eq!(matches[1].chunk.content, "middle");
        assert_eq!(matches[2].chunk.content, "far");

        let limited = db.vector_search(&[1.0, 0.0], &query, 1).unwrap();
        assert_eq!(limited.len(), 1);
    }

    #[test]
    fn test_vector_search_tolerates_nan_embedding() {
        let db = Database::open_in_memory().unwrap();
        seed_doc(
            &db,
            "a.txt",
            ContentType::Text,
            &[("good", vec![1.0, 0.0]), ("bad", vec![f32::NAN, 0.0])],
        );

        // A corrupt stored vector must not panic the sort
        let matches = db.vector_search(&[1.0, 0.0], &SearchQuery::new("anything"), 10).unwrap();
        assert_eq!(matches[0].chunk.content, "good");
        assert_eq!(matches[0].similarity, 1.0);
    }

    #[test]
    fn test_vector_search_content_type_filter() {
        let db = Database::open_in_memory().unwrap();
        seed_doc(&db, "a.txt", ContentType::Text, &[("text", vec![1.0, 0.0])]);
        seed_doc(&db, "b.md", ContentType::Markdown, &[("md", vec![1.0, 0.0])]);

        let query = SearchQuery::new("anything").with_content_types(vec![ContentType::Markdown]);
        let matches = db.vector_search(&[1.0, 0.0], &query, 10).unwrap();

        assert_eq!(matches.len(), 1);
        assert_eq!(matches[0].chunk.content, "md");
        assert_eq!(matches[0].content_type, ContentType::Markdown);
    }

    #[test]
    fn test_vector_search_document_filter() {
        let db = Database::open_in_memory().unwrap();
        let doc_a = seed_doc(&db, "a.txt", ContentType::Text, &[("alpha", vec![1.0])]);
        seed_doc(&db, "b.txt", ContentType::Text, &[("beta", vec![1.0])]);

        let query = SearchQuery::new("anything").in_documents(vec![doc_a.id.clone()]);
        let matches = db.vector_search(&[1.0], &query, 10).unwrap();

        assert_eq!(matches.len(), 1);
        assert_eq!(matches[0].chunk.document_id, doc_a.id);
    }

    #[test]
    fn test_vector_search_date_filter() {
        let db = Database::open_in_memory().unwrap();
        seed_doc(&db, "a.txt", ContentType::Text, &[("recent", vec![1.0])]);

        let now = Utc::now();
        let query = SearchQuery::new("anything")
            .with_date_range(now - Duration::hours(1), now + Duration::hours(1));
        assert_eq!(db.vector_search(&[1.0], &query, 10).unwrap().len(), 1);

        let stale = SearchQuery::new("anything")
            .with_date_range(now - Duration::days(10), now - Duration::days(5));
        assert!(db.vector_search(&[1.0], &stale, 10).unwrap().is_empty());
    }
}
