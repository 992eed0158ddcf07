use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;

use bson::oid::ObjectId;
use rand::Rng;
use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::auth::Identity;
use crate::error::{EngineError, EngineResult};
use crate::store::{SharedStateStore, keys};

/// Cursor marks older than this are dropped from the presence view;
/// this bounds memory from abandoned editing sessions without an
/// explicit leave signal.
pub const CURSOR_TTL: Duration = Duration::from_secs(300);
const CURSOR_TTL_MS: i64 = 300_000;

/// A named, versioned text buffer. `version` increments by exactly 1
/// per accepted write and never decreases; content is last-write-wins
/// by dispatcher arrival order. This is a deliberate simplification —
/// concurrent-edit fidelity would need an OT/CRDT text structure in
/// this component's place, not conflict heuristics bolted on here.
#[derive(Debug, Clone, Serialize)]
pub struct CodeDocument {
    pub id: ObjectId,
    pub room_id: ObjectId,
    pub filename: String,
    pub language: String,
    pub content: String,
    pub version: i64,
    pub last_modified_by: Option<ObjectId>,
    /// Unix millis.
    pub last_modified_at: i64,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CursorMark {
    pub doc_id: ObjectId,
    pub user_id: ObjectId,
    pub position: i64,
    /// Unix millis.
    pub updated_at: i64,
}

#[derive(Debug, Serialize)]
pub struct RunResult {
    pub success: bool,
    pub output: String,
    pub execution_time_ms: u64,
}

pub struct CodeEditorService {
    store: Arc<dyn SharedStateStore>,
}

impl CodeEditorService {
    pub fn new(store: Arc<dyn SharedStateStore>) -> Self {
        Self { store }
    }

    pub async fn create_document(
        &self,
        room_id: &ObjectId,
        identity: &Identity,
        filename: &str,
        language: &str,
    ) -> EngineResult<CodeDocument> {
        if filename.trim().is_empty() {
            return Err(EngineError::Validation("filename is empty".to_string()));
        }

        let doc = CodeDocument {
            id: ObjectId::new(),
            room_id: *room_id,
            filename: filename.to_string(),
            language: language.to_string(),
            content: String::new(),
            version: 1,
            last_modified_by: Some(identity.user_id),
            last_modified_at: bson::DateTime::now().timestamp_millis(),
        };

        self.store
            .hash_set(
                &keys::document(room_id, &doc.id),
                &[
                    ("filename", doc.filename.clone()),
                    ("language", doc.language.clone()),
                    ("content", String::new()),
                    ("version", doc.version.to_string()),
                    ("last_modified_by", identity.user_id.to_hex()),
                    ("last_modified_at", doc.last_modified_at.to_string()),
                ],
            )
            .await?;
        self.store
            .set_add(&keys::documents(room_id), &doc.id.to_hex())
            .await?;

        Ok(doc)
    }

    pub async fn get_document(
        &self,
        room_id: &ObjectId,
        doc_id: &ObjectId,
    ) -> EngineResult<CodeDocument> {
        let fields = self
            .store
            .hash_get_all(&keys::document(room_id, doc_id))
            .await?;
        if fields.is_empty() {
            return Err(EngineError::NotFound(format!(
                "document {}",
                doc_id.to_hex()
            )));
        }
        Ok(document_from_fields(*room_id, *doc_id, fields))
    }

    pub async fn documents(&self, room_id: &ObjectId) -> EngineResult<Vec<CodeDocument>> {
        let ids = self.store.set_members(&keys::documents(room_id)).await?;
        let mut docs = Vec::with_capacity(ids.len());
        for hex in ids {
            let Ok(doc_id) = ObjectId::parse_str(&hex) else {
                continue;
            };
            if let Ok(doc) = self.get_document(room_id, &doc_id).await {
                docs.push(doc);
            }
        }
        docs.sort_by(|a, b| a.filename.cmp(&b.filename));
        Ok(docs)
    }

    /// Accepts the write unconditionally: the version counter is
    /// bumped atomically in the store (no gaps, multi-process safe)
    /// and the content becomes whatever arrived last.
    pub async fn update_content(
        &self,
        room_id: &ObjectId,
        doc_id: &ObjectId,
        identity: &Identity,
        content: &str,
    ) -> EngineResult<i64> {
        let key = keys::document(room_id, doc_id);
        if self.store.hash_get(&key, "filename").await?.is_none() {
            return Err(EngineError::NotFound(format!(
                "document {}",
                doc_id.to_hex()
            )));
        }

        let new_version = self.store.hash_incr(&key, "version", 1).await?;
        self.store
            .hash_set(
                &key,
                &[
                    ("content", content.to_string()),
                    ("last_modified_by", identity.user_id.to_hex()),
                    (
                        "last_modified_at",
                        bson::DateTime::now().timestamp_millis().to_string(),
                    ),
                ],
            )
            .await?;

        debug!(doc_id = %doc_id.to_hex(), new_version, "Document content updated");
        Ok(new_version)
    }

    /// Cursor moves are independent of content writes and expire on
    /// their own; nothing here touches the document hash. Cursor keys
    /// live under the room prefix so room deactivation sweeps them
    /// along with the rest of the hot state.
    pub async fn update_cursor(
        &self,
        room_id: &ObjectId,
        doc_id: &ObjectId,
        identity: &Identity,
        position: i64,
    ) -> EngineResult<CursorMark> {
        let mark = CursorMark {
            doc_id: *doc_id,
            user_id: identity.user_id,
            position,
            updated_at: bson::DateTime::now().timestamp_millis(),
        };
        let body = serde_json::to_string(&mark)
            .map_err(|e| EngineError::Internal(e.to_string()))?;

        self.store
            .set_with_ttl(
                &keys::cursor(room_id, doc_id, &identity.user_id),
                &body,
                CURSOR_TTL,
            )
            .await?;
        self.store
            .set_add(
                &keys::cursor_index(room_id, doc_id),
                &identity.user_id.to_hex(),
            )
            .await?;
        Ok(mark)
    }

    /// Marks younger than five minutes; one written 4 m 59 s ago is
    /// still in. Index entries whose key already expired are pruned on
    /// the way through.
    pub async fn active_cursors(
        &self,
        room_id: &ObjectId,
        doc_id: &ObjectId,
    ) -> EngineResult<Vec<CursorMark>> {
        let now = bson::DateTime::now().timestamp_millis();
        let index_key = keys::cursor_index(room_id, doc_id);
        let user_ids = self.store.set_members(&index_key).await?;

        let mut marks = Vec::new();
        for hex in user_ids {
            let Ok(user_id) = ObjectId::parse_str(&hex) else {
                continue;
            };
            match self.store.get(&keys::cursor(room_id, doc_id, &user_id)).await? {
                Some(body) => {
                    if let Ok(mark) = serde_json::from_str::<CursorMark>(&body)
                        && now - mark.updated_at < CURSOR_TTL_MS
                    {
                        marks.push(mark);
                    }
                }
                None => {
                    self.store.set_remove(&index_key, &hex).await?;
                }
            }
        }
        marks.sort_by_key(|m| m.updated_at);
        Ok(marks)
    }

    /// Simulated execution. A production deployment must swap this
    /// for isolated sandboxed execution; nothing here runs user code.
    pub async fn run_code(
        &self,
        room_id: &ObjectId,
        doc_id: &ObjectId,
    ) -> EngineResult<RunResult> {
        let doc = self.get_document(room_id, doc_id).await?;
        let line_count = doc.content.lines().count();
        let execution_time_ms = rand::rng().random_range(5..150);

        Ok(RunResult {
            success: true,
            output: format!(
                "[simulated] {} ({}, {} lines) executed without errors",
                doc.filename, doc.language, line_count
            ),
            execution_time_ms,
        })
    }
}

fn document_from_fields(
    room_id: ObjectId,
    doc_id: ObjectId,
    fields: HashMap<String, String>,
) -> CodeDocument {
    CodeDocument {
        id: doc_id,
        room_id,
        filename: fields.get("filename").cloned().unwrap_or_default(),
        language: fields.get("language").cloned().unwrap_or_default(),
        content: fields.get("content").cloned().unwrap_or_default(),
        version: fields
            .get("version")
            .and_then(|v| v.parse().ok())
            .unwrap_or(1),
        last_modified_by: fields
            .get("last_modified_by")
            .and_then(|v| ObjectId::parse_str(v).ok()),
        last_modified_at: fields
            .get("last_modified_at")
            .and_then(|v| v.parse().ok())
            .unwrap_or(0),
    }
}
