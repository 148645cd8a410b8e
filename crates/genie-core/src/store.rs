// SQLite persistence for workspace documents, their version history and
// small pieces of session state.

use std::sync::{Mutex, MutexGuard};

use anyhow::{Context, Result};
use rusqlite::{params, Connection, OptionalExtension};
use serde::Serialize;

use crate::workspace::WorkspaceDocument;

/// Latest-body listing entry.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct DocumentSummary {
    pub id: String,
    pub doc_type: String,
    pub title: String,
    pub version: String,
    pub updated_at: String,
}

/// One entry in a document's append-only history.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct VersionRecord {
    pub seq: i64,
    pub doc_id: String,
    pub version: String,
    pub note: String,
    pub created_at: String,
}

pub struct Store {
    conn: Mutex<Connection>,
}

impl Store {
    /// Open (or create) a store at `path`. `":memory:"` gives an ephemeral
    /// store.
    pub fn open(path: &str) -> Result<Self> {
        let conn = Connection::open(path)
            .with_context(|| format!("failed to open document store at {path}"))?;

        conn.execute_batch(
            "PRAGMA journal_mode = WAL;
             PRAGMA busy_timeout = 5000;
             PRAGMA foreign_keys = ON;",
        )
        .context("failed to set database pragmas")?;

        conn.execute_batch(
            "
            CREATE TABLE IF NOT EXISTS documents (
                id         TEXT PRIMARY KEY,
                doc_type   TEXT NOT NULL,
                title      TEXT NOT NULL,
                version    TEXT NOT NULL,
                body       TEXT NOT NULL,
                updated_at TEXT NOT NULL DEFAULT (strftime('%Y-%m-%dT%H:%M:%fZ', 'now'))
            );

            CREATE TABLE IF NOT EXISTS document_versions (
                seq        INTEGER PRIMARY KEY AUTOINCREMENT,
                doc_id     TEXT NOT NULL REFERENCES documents(id),
                version    TEXT NOT NULL,
                note       TEXT NOT NULL,
                body       TEXT NOT NULL,
                created_at TEXT NOT NULL DEFAULT (strftime('%Y-%m-%dT%H:%M:%fZ', 'now'))
            );

            CREATE INDEX IF NOT EXISTS idx_document_versions_doc_id
                ON document_versions(doc_id);

            CREATE TABLE IF NOT EXISTS session_state (
                key   TEXT PRIMARY KEY,
                value TEXT NOT NULL
            );
            ",
        )
        .context("failed to create database schema")?;

        Ok(Self {
            conn: Mutex::new(conn),
        })
    }

    /// Recovers the connection from a poisoned lock.
    fn conn(&self) -> MutexGuard<'_, Connection> {
        self.conn.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
    }

    // -----------------------------------------------------------------
    // Documents
    // -----------------------------------------------------------------

    /// Store `doc` as the latest body for its id and append a history entry.
    /// Returns the history sequence number.
    pub fn save_document(&self, doc: &WorkspaceDocument, note: &str) -> Result<i64> {
        let body = serde_json::to_string(doc).context("failed to serialize document")?;
        let mut conn = self.conn();
        let tx = conn
            .transaction()
            .context("failed to begin document transaction")?;

        tx.execute(
            "INSERT INTO documents (id, doc_type, title, version, body)
             VALUES (?1, ?2, ?3, ?4, ?5)
             ON CONFLICT(id) DO UPDATE SET
                doc_type = excluded.doc_type,
                title = excluded.title,
                version = excluded.version,
                body = excluded.body,
                updated_at = strftime('%Y-%m-%dT%H:%M:%fZ', 'now')",
            params![doc.id, doc.kind.as_str(), doc.title, doc.version, body],
        )
        .with_context(|| format!("failed to upsert document {}", doc.id))?;

        tx.execute(
            "INSERT INTO document_versions (doc_id, version, note, body)
             VALUES (?1, ?2, ?3, ?4)",
            params![doc.id, doc.version, note, body],
        )
        .with_context(|| format!("failed to append history for {}", doc.id))?;
        let seq = tx.last_insert_rowid();

        tx.commit().context("failed to commit document")?;
        Ok(seq)
    }

    pub fn load_document(&self, id: &str) -> Result<Option<WorkspaceDocument>> {
        let conn = self.conn();
        let body: Option<String> = conn
            .query_row(
                "SELECT body FROM documents WHERE id = ?1",
                params![id],
                |row| row.get(0),
            )
            .optional()
            .with_context(|| format!("failed to query document {id}"))?;

        body.map(|json| {
            serde_json::from_str(&json).with_context(|| format!("corrupt body for document {id}"))
        })
        .transpose()
    }

    /// Every stored document, ordered by id.
    pub fn list_documents(&self) -> Result<Vec<DocumentSummary>> {
        let conn = self.conn();
        let mut stmt = conn
            .prepare(
                "SELECT id, doc_type, title, version, updated_at
                 FROM documents ORDER BY id",
            )
            .context("failed to prepare list_documents query")?;

        let docs = stmt
            .query_map([], |row| {
                Ok(DocumentSummary {
                    id: row.get(0)?,
                    doc_type: row.get(1)?,
                    title: row.get(2)?,
                    version: row.get(3)?,
                    updated_at: row.get(4)?,
                })
            })
            .context("failed to query documents")?
            .collect::<std::result::Result<Vec<_>, _>>()
            .context("failed to map document rows")?;

        Ok(docs)
    }

    /// History of `doc_id`, oldest first.
    pub fn history(&self, doc_id: &str) -> Result<Vec<VersionRecord>> {
        let conn = self.conn();
        let mut stmt = conn
            .prepare(
                "SELECT seq, doc_id, version, note, created_at
                 FROM document_versions WHERE doc_id = ?1 ORDER BY seq",
            )
            .context("failed to prepare history query")?;

        let versions = stmt
            .query_map(params![doc_id], |row| {
                Ok(VersionRecord {
                    seq: row.get(0)?,
                    doc_id: row.get(1)?,
                    version: row.get(2)?,
                    note: row.get(3)?,
                    created_at: row.get(4)?,
                })
            })
            .context("failed to query document history")?
            .collect::<std::result::Result<Vec<_>, _>>()
            .context("failed to map history rows")?;

        Ok(versions)
    }

    /// Document body as it was at history entry `seq`.
    pub fn load_version(&self, seq: i64) -> Result<Option<WorkspaceDocument>> {
        let conn = self.conn();
        let body: Option<String> = conn
            .query_row(
                "SELECT body FROM document_versions WHERE seq = ?1",
                params![seq],
                |row| row.get(0),
            )
            .optional()
            .with_context(|| format!("failed to query version {seq}"))?;

        body.map(|json| {
            serde_json::from_str(&json).with_context(|| format!("corrupt body for version {seq}"))
        })
        .transpose()
    }

    // -----------------------------------------------------------------
    // Session state (key-value)
    // -----------------------------------------------------------------

    /// Persist a JSON value under `key`, replacing any previous value.
    pub fn set_state(&self, key: &str, value: &serde_json::Value) -> Result<()> {
        let conn = self.conn();
        let json_str = serde_json::to_string(value).context("failed to serialize state value")?;
        conn.execute(
            "INSERT OR REPLACE INTO session_state (key, value) VALUES (?1, ?2)",
            params![key, json_str],
        )
        .context("failed to save state")?;
        Ok(())
    }

    pub fn get_state(&self, key: &str) -> Result<Option<serde_json::Value>> {
        let conn = self.conn();
        let json_str: Option<String> = conn
            .query_row(
                "SELECT value FROM session_state WHERE key = ?1",
                params![key],
                |row| row.get(0),
            )
            .optional()
            .context("failed to query session state")?;

        json_str
            .map(|s| serde_json::from_str(&s).context("failed to deserialize state value"))
            .transpose()
    }

    pub fn clear_state(&self, key: &str) -> Result<()> {
        let conn = self.conn();
        conn.execute("DELETE FROM session_state WHERE key = ?1", params![key])
            .context("failed to clear state")?;
        Ok(())
    }
}
