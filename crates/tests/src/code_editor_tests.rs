use bson::oid::ObjectId;
use huddle_services::EngineError;
use huddle_services::code_editor::CursorMark;
use huddle_services::store::{SharedStateStore, keys};

use crate::fixtures::engine::{TestEngine, identity};

#[tokio::test]
async fn new_document_starts_at_version_one() {
    let engine = TestEngine::new();
    let room_id = ObjectId::new();
    let author = identity("author");

    let doc = engine
        .code_editor
        .create_document(&room_id, &author, "main.rs", "rust")
        .await
        .unwrap();

    assert_eq!(doc.version, 1);
    assert_eq!(doc.content, "");

    let fetched = engine.code_editor.get_document(&room_id, &doc.id).await.unwrap();
    assert_eq!(fetched.version, 1);
    assert_eq!(fetched.filename, "main.rs");
}

#[tokio::test]
async fn sequential_edits_increment_version_by_one() {
    let engine = TestEngine::new();
    let room_id = ObjectId::new();
    let author = identity("author");

    let doc = engine
        .code_editor
        .create_document(&room_id, &author, "notes.md", "markdown")
        .await
        .unwrap();

    for (i, content) in ["a", "ab", "abc"].iter().enumerate() {
        let version = engine
            .code_editor
            .update_content(&room_id, &doc.id, &author, content)
            .await
            .unwrap();
        assert_eq!(version, 2 + i as i64);
    }

    let fetched = engine.code_editor.get_document(&room_id, &doc.id).await.unwrap();
    assert_eq!(fetched.version, 4);
    assert_eq!(fetched.content, "abc");
}

#[tokio::test]
async fn concurrent_edits_get_distinct_versions() {
    let engine = TestEngine::new();
    let room_id = ObjectId::new();
    let author = identity("author");

    let doc = engine
        .code_editor
        .create_document(&room_id, &author, "shared.py", "python")
        .await
        .unwrap();
    engine
        .code_editor
        .update_content(&room_id, &doc.id, &author, "v2")
        .await
        .unwrap();
    engine
        .code_editor
        .update_content(&room_id, &doc.id, &author, "v3")
        .await
        .unwrap();

    // Two racing writers from version 3. The counter bump is atomic,
    // so they must land on 4 and 5 in some order, never the same
    // version twice and never a gap.
    let left = {
        let editor = engine.code_editor.clone();
        let writer = identity("left");
        let doc_id = doc.id;
        tokio::spawn(async move {
            editor
                .update_content(&room_id, &doc_id, &writer, "left wins")
                .await
                .unwrap()
        })
    };
    let right = {
        let editor = engine.code_editor.clone();
        let writer = identity("right");
        let doc_id = doc.id;
        tokio::spawn(async move {
            editor
                .update_content(&room_id, &doc_id, &writer, "right wins")
                .await
                .unwrap()
        })
    };

    let mut versions = vec![left.await.unwrap(), right.await.unwrap()];
    versions.sort();
    assert_eq!(versions, vec![4, 5]);

    let fetched = engine.code_editor.get_document(&room_id, &doc.id).await.unwrap();
    assert_eq!(fetched.version, 5);
    // Content is whichever write arrived last.
    assert!(fetched.content == "left wins" || fetched.content == "right wins");
}

#[tokio::test]
async fn editing_a_missing_document_is_not_found() {
    let engine = TestEngine::new();
    let room_id = ObjectId::new();
    let author = identity("author");

    let err = engine
        .code_editor
        .update_content(&room_id, &ObjectId::new(), &author, "ghost")
        .await
        .unwrap_err();
    assert!(matches!(err, EngineError::NotFound(_)));
}

#[tokio::test]
async fn fresh_cursor_is_active() {
    let engine = TestEngine::new();
    let room_id = ObjectId::new();
    let doc_id = ObjectId::new();
    let editor = identity("editor");

    engine
        .code_editor
        .update_cursor(&room_id, &doc_id, &editor, 42)
        .await
        .unwrap();

    let cursors = engine.code_editor.active_cursors(&room_id, &doc_id).await.unwrap();
    assert_eq!(cursors.len(), 1);
    assert_eq!(cursors[0].position, 42);
    assert_eq!(cursors[0].user_id, editor.user_id);
}

#[tokio::test]
async fn cursor_expiry_boundary_is_strict() {
    let engine = TestEngine::new();
    let room_id = ObjectId::new();
    let doc_id = ObjectId::new();
    let now = bson::DateTime::now().timestamp_millis();

    // Two marks written straight into the store: one exactly at the
    // five-minute boundary, one a second inside it.
    let expired_user = ObjectId::new();
    let live_user = ObjectId::new();
    for (user_id, age_ms) in [(expired_user, 300_000), (live_user, 299_000)] {
        let mark = CursorMark {
            doc_id,
            user_id,
            position: 7,
            updated_at: now - age_ms,
        };
        engine
            .store
            .set_with_ttl(
                &keys::cursor(&room_id, &doc_id, &user_id),
                &serde_json::to_string(&mark).unwrap(),
                std::time::Duration::from_secs(60),
            )
            .await
            .unwrap();
        engine
            .store
            .set_add(&keys::cursor_index(&room_id, &doc_id), &user_id.to_hex())
            .await
            .unwrap();
    }

    let cursors = engine.code_editor.active_cursors(&room_id, &doc_id).await.unwrap();
    assert_eq!(cursors.len(), 1);
    assert_eq!(cursors[0].user_id, live_user);
}

#[tokio::test]
async fn room_deactivation_sweeps_cursor_state() {
    let engine = TestEngine::new();
    let room_id = ObjectId::new();
    let editor = identity("editor");

    let doc = engine
        .code_editor
        .create_document(&room_id, &editor, "scratch.rs", "rust")
        .await
        .unwrap();
    engine
        .code_editor
        .update_cursor(&room_id, &doc.id, &editor, 12)
        .await
        .unwrap();
    assert_eq!(
        engine.code_editor.active_cursors(&room_id, &doc.id).await.unwrap().len(),
        1
    );

    // Deactivation clears everything under the room prefix in one
    // sweep; cursor marks and their index must go with it.
    engine
        .store
        .clear_prefix(&keys::room_prefix(&room_id))
        .await
        .unwrap();

    assert!(engine.code_editor.active_cursors(&room_id, &doc.id).await.unwrap().is_empty());
    assert!(
        engine
            .store
            .set_members(&keys::cursor_index(&room_id, &doc.id))
            .await
            .unwrap()
            .is_empty()
    );
}

#[tokio::test]
async fn run_reports_simulated_output() {
    let engine = TestEngine::new();
    let room_id = ObjectId::new();
    let author = identity("runner");

    let doc = engine
        .code_editor
        .create_document(&room_id, &author, "script.js", "javascript")
        .await
        .unwrap();
    engine
        .code_editor
        .update_content(&room_id, &doc.id, &author, "console.log(1);\nconsole.log(2);")
        .await
        .unwrap();

    let result = engine.code_editor.run_code(&room_id, &doc.id).await.unwrap();
    assert!(result.success);
    assert!(result.output.contains("script.js"));
    assert!(result.output.contains("2 lines"));
    assert!((5..150).contains(&result.execution_time_ms));
}
