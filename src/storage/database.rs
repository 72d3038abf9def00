//! SQLite database management with migrations
//!
//! Provides structured storage for knowledge bases, documents and chunks

use crate::storage::{Chunk, Document, DocumentStore, KnowledgeBase, StoreError};
use r2d2::Pool;
use r2d2_sqlite::SqliteConnectionManager;
use rusqlite::{params, OptionalExtension};
use std::path::Path;

/// Database connection pool
pub type DbPool = Pool<SqliteConnectionManager>;

/// Database manager with migration support
#[derive(Clone)]
pub struct Database {
    pool: DbPool,
}

impl Database {
    /// Create a new database connection
    pub fn new(db_path: &Path) -> Result<Self, StoreError> {
        // Ensure parent directory exists
        if let Some(parent) = db_path.parent() {
            std::fs::create_dir_all(parent).map_err(|e| StoreError::Io {
                source: e,
                context: format!("Failed to create database directory: {:?}", parent),
            })?;
        }

        let manager = SqliteConnectionManager::file(db_path);

        let pool = Pool::builder().max_size(16).build(manager)?;

        // Configure connection
        {
            let conn = pool.get()?;

            // Enable WAL mode for better concurrency
            conn.execute_batch(
                "
                PRAGMA journal_mode = WAL;
                PRAGMA synchronous = NORMAL;
                PRAGMA foreign_keys = ON;
                PRAGMA busy_timeout = 5000;
                ",
            )?;
        }

        let db = Self { pool };

        db.migrate()?;

        Ok(db)
    }

    /// Get a connection from the pool
    pub fn get_conn(
        &self,
    ) -> Result<r2d2::PooledConnection<SqliteConnectionManager>, StoreError> {
        Ok(self.pool.get()?)
    }

    /// Run database migrations
    fn migrate(&self) -> Result<(), StoreError> {
        let conn = self.get_conn()?;

        conn.execute(
            "CREATE TABLE IF NOT EXISTS _migrations (
                version INTEGER PRIMARY KEY,
                applied_at TEXT NOT NULL
            )",
            [],
        )?;

        let current_version: i32 = conn
            .query_row(
                "SELECT COALESCE(MAX(version), 0) FROM _migrations",
                [],
                |row| row.get(0),
            )
            .unwrap_or(0);

        for (version, migration) in MIGRATIONS.iter().enumerate() {
            let version = version as i32 + 1;

            if version > current_version {
                tracing::info!("Applying migration {}", version);

                conn.execute_batch(migration)?;

                conn.execute(
                    "INSERT INTO _migrations (version, applied_at) VALUES (?1, datetime('now'))",
                    params![version],
                )?;
            }
        }

        Ok(())
    }

    /// Create a new knowledge base
    pub fn create_knowledge_base(
        &self,
        name: &str,
        description: Option<&str>,
    ) -> Result<KnowledgeBase, StoreError> {
        let conn = self.get_conn()?;

        let existing: Option<String> = conn
            .query_row(
                "SELECT id FROM knowledge_bases WHERE name = ?1",
                params![name],
                |row| row.get(0),
            )
            .optional()?;

        if existing.is_some() {
            return Err(StoreError::DuplicateKnowledgeBase {
                name: name.to_string(),
            });
        }

        let kb = KnowledgeBase {
            id: uuid::Uuid::new_v4().to_string(),
            name: name.to_string(),
            description: description.map(|d| d.to_string()),
            created_at: chrono::Utc::now().timestamp(),
        };

        conn.execute(
            "INSERT INTO knowledge_bases (id, name, description, created_at)
             VALUES (?1, ?2, ?3, ?4)",
            params![kb.id, kb.name, kb.description, kb.created_at],
        )?;

        tracing::info!("Created knowledge base {} ({})", kb.name, kb.id);
        Ok(kb)
    }

    /// Get a knowledge base by id
    pub fn get_knowledge_base(&self, kb_id: &str) -> Result<Option<KnowledgeBase>, StoreError> {
        let conn = self.get_conn()?;

        let kb = conn
            .query_row(
                "SELECT id, name, description, created_at FROM knowledge_bases WHERE id = ?1",
                params![kb_id],
                |row| {
                    Ok(KnowledgeBase {
                        id: row.get(0)?,
                        name: row.get(1)?,
                        description: row.get(2)?,
                        created_at: row.get(3)?,
                    })
                },
            )
            .optional()?;

        Ok(kb)
    }

    /// List all knowledge bases, newest first
    pub fn list_knowledge_bases(&self) -> Result<Vec<KnowledgeBase>, StoreError> {
        let conn = self.get_conn()?;

        let mut stmt = conn.prepare(
            "SELECT id, name, description, created_at FROM knowledge_bases
             ORDER BY created_at DESC",
        )?;

        let rows = stmt.query_map([], |row| {
            Ok(KnowledgeBase {
                id: row.get(0)?,
                name: row.get(1)?,
                description: row.get(2)?,
                created_at: row.get(3)?,
            })
        })?;

        let mut kbs = Vec::new();
        for kb in rows {
            kbs.push(kb?);
        }
        Ok(kbs)
    }

    /// Delete a knowledge base and everything belonging to it
    pub fn delete_knowledge_base(&self, kb_id: &str) -> Result<(), StoreError> {
        let conn = self.get_conn()?;

        let deleted = conn.execute(
            "DELETE FROM knowledge_bases WHERE id = ?1",
            params![kb_id],
        )?;

        if deleted == 0 {
            return Err(StoreError::KnowledgeBaseNotFound {
                kb_id: kb_id.to_string(),
            });
        }

        tracing::info!("Deleted knowledge base {}", kb_id);
        Ok(())
    }

    /// Insert a document and its chunks transactionally
    pub fn insert_document(
        &self,
        kb_id: &str,
        name: &str,
        chunks: &[String],
    ) -> Result<Document, StoreError> {
        if self.get_knowledge_base(kb_id)?.is_none() {
            return Err(StoreError::KnowledgeBaseNotFound {
                kb_id: kb_id.to_string(),
            });
        }

        let mut conn = self.get_conn()?;
        let tx = conn.transaction()?;

        let doc = Document {
            id: uuid::Uuid::new_v4().to_string(),
            kb_id: kb_id.to_string(),
            name: name.to_string(),
            chunk_count: chunks.len(),
            created_at: chrono::Utc::now().timestamp(),
        };

        tx.execute(
            "INSERT INTO documents (id, kb_id, name, created_at) VALUES (?1, ?2, ?3, ?4)",
            params![doc.id, doc.kb_id, doc.name, doc.created_at],
        )?;

        for (index, content) in chunks.iter().enumerate() {
            tx.execute(
                "INSERT INTO chunks (id, doc_id, kb_id, chunk_index, content)
                 VALUES (?1, ?2, ?3, ?4, ?5)",
                params![
                    uuid::Uuid::new_v4().to_string(),
                    doc.id,
                    doc.kb_id,
                    index as i64,
                    content
                ],
            )?;
        }

        tx.commit()?;

        tracing::info!(
            "Inserted document {} with {} chunks into {}",
            doc.name,
            doc.chunk_count,
            kb_id
        );
        Ok(doc)
    }

    /// Get database statistics
    pub fn stats(&self) -> Result<DbStats, StoreError> {
        let conn = self.get_conn()?;

        let kb_count: i64 =
            conn.query_row("SELECT COUNT(*) FROM knowledge_bases", [], |row| row.get(0))?;

        let document_count: i64 =
            conn.query_row("SELECT COUNT(*) FROM documents", [], |row| row.get(0))?;

        let chunk_count: i64 =
            conn.query_row("SELECT COUNT(*) FROM chunks", [], |row| row.get(0))?;

        Ok(DbStats {
            kb_count: kb_count as usize,
            document_count: document_count as usize,
            chunk_count: chunk_count as usize,
        })
    }
}

impl DocumentStore for Database {
    fn fetch_chunks(&self, kb_id: &str) -> Result<Vec<Chunk>, StoreError> {
        if self.get_knowledge_base(kb_id)?.is_none() {
            return Err(StoreError::KnowledgeBaseNotFound {
                kb_id: kb_id.to_string(),
            });
        }

        let conn = self.get_conn()?;

        let mut stmt = conn.prepare(
            "SELECT c.id, c.content, c.doc_id, d.name
             FROM chunks c
             JOIN documents d ON d.id = c.doc_id
             WHERE c.kb_id = ?1
             ORDER BY d.created_at, c.chunk_index",
        )?;

        let rows = stmt.query_map(params![kb_id], |row| {
            Ok(Chunk {
                id: row.get(0)?,
                content: row.get(1)?,
                doc_id: row.get(2)?,
                doc_name: row.get(3)?,
            })
        })?;

        let mut chunks = Vec::new();
        for chunk in rows {
            chunks.push(chunk?);
        }
        Ok(chunks)
    }
}

/// Database statistics
#[derive(Debug)]
pub struct DbStats {
    pub kb_count: usize,
    pub document_count: usize,
    pub chunk_count: usize,
}

/// Database migrations (each string is one migration)
const MIGRATIONS: &[&str] = &[
    // Migration 1: Initial schema
    r#"
    CREATE TABLE knowledge_bases (
        id TEXT PRIMARY KEY,
        name TEXT NOT NULL UNIQUE,
        description TEXT,
        created_at INTEGER NOT NULL
    );

    CREATE TABLE documents (
        id TEXT PRIMARY KEY,
        kb_id TEXT NOT NULL REFERENCES knowledge_bases(id) ON DELETE CASCADE,
        name TEXT NOT NULL,
        created_at INTEGER NOT NULL
    );

    CREATE INDEX idx_documents_kb_id ON documents(kb_id);

    CREATE TABLE chunks (
        id TEXT PRIMARY KEY,
        doc_id TEXT NOT NULL REFERENCES documents(id) ON DELETE CASCADE,
        kb_id TEXT NOT NULL,
        chunk_index INTEGER NOT NULL,
        content TEXT NOT NULL
    );

    CREATE INDEX idx_chunks_kb_id ON chunks(kb_id);
    CREATE INDEX idx_chunks_doc_id ON chunks(doc_id);
    "#,
];

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    fn test_db() -> (TempDir, Database) {
        let temp = TempDir::new().unwrap();
        let db = Database::new(&temp.path().join("test.sqlite")).unwrap();
        (temp, db)
    }

    #[test]
    fn test_create_and_get_knowledge_base() {
        let (_temp, db) = test_db();

        let kb = db.create_knowledge_base("docs", Some("product docs")).unwrap();
        let fetched = db.get_knowledge_base(&kb.id).unwrap().unwrap();

        assert_eq!(fetched.name, "docs");
        assert_eq!(fetched.description.as_deref(), Some("product docs"));
    }

    #[test]
    fn test_duplicate_knowledge_base_rejected() {
        let (_temp, db) = test_db();

        db.create_knowledge_base("docs", None).unwrap();
        let err = db.create_knowledge_base("docs", None).unwrap_err();

        assert!(matches!(err, StoreError::DuplicateKnowledgeBase { .. }));
    }

    #[test]
    fn test_insert_document_and_fetch_chunks() {
        let (_temp, db) = test_db();

        let kb = db.create_knowledge_base("docs", None).unwrap();
        let chunks = vec!["first chunk".to_string(), "second chunk".to_string()];
        let doc = db.insert_document(&kb.id, "guide.txt", &chunks).unwrap();

        assert_eq!(doc.chunk_count, 2);

        let fetched = db.fetch_chunks(&kb.id).unwrap();
        assert_eq!(fetched.len(), 2);
        assert_eq!(fetched[0].content, "first chunk");
        assert_eq!(fetched[0].doc_name, "guide.txt");
        assert_eq!(fetched[1].content, "second chunk");
    }

    #[test]
    fn test_fetch_chunks_unknown_kb() {
        let (_temp, db) = test_db();

        let err = db.fetch_chunks("missing").unwrap_err();
        assert!(matches!(err, StoreError::KnowledgeBaseNotFound { .. }));
    }

    #[test]
    fn test_fetch_chunks_empty_kb() {
        let (_temp, db) = test_db();

        let kb = db.create_knowledge_base("empty", None).unwrap();
        let chunks = db.fetch_chunks(&kb.id).unwrap();
        assert!(chunks.is_empty());
    }

    #[test]
    fn test_delete_knowledge_base_cascades() {
        let (_temp, db) = test_db();

        let kb = db.create_knowledge_base("docs", None).unwrap();
        db.insert_document(&kb.id, "guide.txt", &["chunk".to_string()])
            .unwrap();

        db.delete_knowledge_base(&kb.id).unwrap();

        let stats = db.stats().unwrap();
        assert_eq!(stats.kb_count, 0);
        assert_eq!(stats.document_count, 0);
        assert_eq!(stats.chunk_count, 0);
    }
}
