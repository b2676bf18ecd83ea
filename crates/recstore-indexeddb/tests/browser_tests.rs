//! IndexedDB engine tests (run with `wasm-pack test --headless --firefox`)

#![cfg(target_arch = "wasm32")]

use recstore_core::{
    CursorReport, DatabaseConfig, IndexDecl, Key, KeyRange, Session, Status, StoreDecl,
    StoreError,
};
use recstore_indexeddb::IndexedDbEngine;
use serde_json::json;
use wasm_bindgen_test::*;

wasm_bindgen_test_configure!(run_in_browser);

/// Open a fresh database; any leftover from a previous run is deleted first.
async fn fresh_session(name: &str) -> Session<IndexedDbEngine> {
    let config = DatabaseConfig::new(name).with_store(
        StoreDecl::new("users", "id")
            .with_index(IndexDecl::new("by_email", "email").unique())
            .with_index(IndexDecl::new("by_tag", "tags").multi_entry())
            .with_index(IndexDecl::new("by_age", "age")),
    );
    let session = Session::new(IndexedDbEngine::new(), config).unwrap();
    session.delete_database().await.unwrap();
    session.open().await.unwrap();
    session
}

async fn seed(session: &Session<IndexedDbEngine>) {
    let users = vec![
        json!({"id": 1, "email": "ada@x", "age": 36, "tags": ["math", "rust"]}),
        json!({"id": 2, "email": "tim@x", "age": 29, "tags": ["web"]}),
        json!({"id": 3, "email": "grace@x", "age": 45, "tags": ["rust"]}),
    ];
    assert_eq!(
        session.set_batch("users", &users).await.unwrap(),
        Status::BatchInsertOk
    );
}

#[wasm_bindgen_test]
async fn test_open_creates_declared_stores() {
    let session = fresh_session("recstore-open").await;
    assert_eq!(session.store_names().unwrap(), vec!["users"]);
    assert!(matches!(session.open().await, Err(StoreError::AlreadyOpen)));
    session.close().unwrap();
}

#[wasm_bindgen_test]
async fn test_crud_roundtrip() {
    let session = fresh_session("recstore-crud").await;

    let ada = json!({"id": 1, "email": "ada@x"});
    assert_eq!(session.set("users", &ada).await.unwrap(), Status::InsertOk);
    assert_eq!(session.get("users", 1).await.unwrap(), Some(ada));

    let renamed = json!({"id": 1, "email": "lovelace@x"});
    assert_eq!(session.set("users", &renamed).await.unwrap(), Status::UpdateOk);
    assert_eq!(session.count("users").await.unwrap(), Some(1));

    assert_eq!(
        session.set("users", &json!({"email": "none"})).await.unwrap(),
        Status::NoKeyField
    );

    assert_eq!(session.remove("users", 1).await.unwrap(), Status::DeleteOk);
    assert_eq!(session.get("users", 1).await.unwrap(), None);
    session.close().unwrap();
}

#[wasm_bindgen_test]
async fn test_unique_index_violation_rejects() {
    let session = fresh_session("recstore-unique").await;
    session
        .set("users", &json!({"id": 1, "email": "a@x"}))
        .await
        .unwrap();

    let result = session.set("users", &json!({"id": 2, "email": "a@x"})).await;
    assert_eq!(
        result.err().and_then(|e| e.status()),
        Some(Status::InsertFailed)
    );
    session.close().unwrap();
}

#[wasm_bindgen_test]
async fn test_index_queries() {
    let session = fresh_session("recstore-index").await;
    seed(&session).await;

    let grace = session
        .get_by_index("users", "by_email", Key::from("grace@x"))
        .await
        .unwrap()
        .unwrap();
    assert_eq!(grace["id"], 3);

    let rust = session
        .get_all_keys_by_index("users", "by_tag", Key::from("rust"))
        .await
        .unwrap();
    assert_eq!(rust, Some(vec![Key::from(1), Key::from(3)]));

    let over_30 = session
        .get_count_by_index("users", "by_age", KeyRange::lower_bound(30, false))
        .await
        .unwrap();
    assert_eq!(over_30, Some(2));

    let youngest = session
        .get_key_by_index("users", "by_age", KeyRange::all())
        .await
        .unwrap();
    assert_eq!(youngest, Some(Key::from(2)));

    let unknown = session
        .get_all_by_index("users", "by_nothing", KeyRange::all())
        .await
        .unwrap();
    assert_eq!(unknown, None);
    session.close().unwrap();
}

#[wasm_bindgen_test]
async fn test_cursor_scan_and_mutations() {
    let session = fresh_session("recstore-cursor").await;
    seed(&session).await;

    let all = session.get_all_by_cursor("users").await.unwrap().unwrap();
    assert_eq!(all.len(), 3);

    let report = session
        .update_by_cursor(
            "users",
            "email",
            &json!("tim@x"),
            &json!({"id": 2, "email": "tim@x", "age": 30}),
        )
        .await
        .unwrap();
    assert_eq!(
        report,
        CursorReport {
            status: Status::UpdateOk,
            matched: 1,
            applied: 1
        }
    );
    assert_eq!(session.get("users", 2).await.unwrap().unwrap()["age"], 30);

    let refused = session
        .update_by_cursor("users", "id", &json!(3), &json!({"id": 7}))
        .await
        .unwrap();
    assert_eq!(refused.status, Status::PrimaryKeyImmutable);

    let deleted = session
        .delete_by_cursor("users", "age", &json!(36))
        .await
        .unwrap();
    assert_eq!(deleted.status, Status::DeleteOk);
    assert_eq!(
        session.get_all_keys("users").await.unwrap(),
        Some(vec![Key::from(2), Key::from(3)])
    );

    let missing = session
        .delete_by_cursor("users", "age", &json!(99))
        .await
        .unwrap();
    assert_eq!(missing.status, Status::NotFound);
    session.close().unwrap();
}

#[wasm_bindgen_test]
async fn test_remove_all_clears_store() {
    let session = fresh_session("recstore-clear").await;
    seed(&session).await;

    assert_eq!(session.remove_all("users").await.unwrap(), Status::ClearOk);
    assert_eq!(session.get_all("users").await.unwrap(), Some(vec![]));
    assert_eq!(session.get_all_by_cursor("users").await.unwrap(), Some(vec![]));
    session.close().unwrap();
}
