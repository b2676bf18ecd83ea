//! CRUD operation tests for Session over the memory engine

use pretty_assertions::assert_eq;
use recstore_core::{
    logging, DatabaseConfig, IndexDecl, IndexInstaller, IndexTarget, Key, MemoryEngine, Session,
    Status, StoreDecl, StoreError, StoreResult,
};
use serde_json::json;

/// Helper to create an opened session with a `users` store keyed by `id`
async fn open_session() -> Session<MemoryEngine> {
    logging::try_init_for_tests();
    let config = DatabaseConfig::new("crud").with_store(
        StoreDecl::new("users", "id").with_index(IndexDecl::new("by_email", "email").unique()),
    );
    let session = Session::new(MemoryEngine::new(), config).unwrap();
    session.open().await.unwrap();
    session
}

#[tokio::test]
async fn test_set_then_get() {
    let session = open_session().await;
    let ada = json!({"id": 1, "name": "Ada", "email": "ada@x"});

    let status = session.set("users", &ada).await.unwrap();
    assert_eq!(status, Status::InsertOk);

    let retrieved = session.get("users", 1).await.unwrap();
    assert_eq!(retrieved, Some(ada));
}

#[tokio::test]
async fn test_set_without_key_field() {
    let session = open_session().await;

    let status = session.set("users", &json!({"name": "nobody"})).await.unwrap();
    assert_eq!(status, Status::NoKeyField);

    // Store unchanged
    assert_eq!(session.get_all("users").await.unwrap(), Some(vec![]));
}

#[tokio::test]
async fn test_set_existing_key_updates() {
    let session = open_session().await;
    session.set("users", &json!({"id": 1, "name": "Ada"})).await.unwrap();

    let status = session
        .set("users", &json!({"id": 1, "name": "Ada Lovelace"}))
        .await
        .unwrap();
    assert_eq!(status, Status::UpdateOk);

    let all = session.get_all("users").await.unwrap().unwrap();
    assert_eq!(all, vec![json!({"id": 1, "name": "Ada Lovelace"})]);
}

#[tokio::test]
async fn test_set_unique_violation_rejects() {
    let session = open_session().await;
    session.set("users", &json!({"id": 1, "email": "a@x"})).await.unwrap();

    let result = session.set("users", &json!({"id": 2, "email": "a@x"})).await;
    match result {
        Err(StoreError::Rejected { status, .. }) => assert_eq!(status, Status::InsertFailed),
        other => panic!("expected InsertFailed rejection, got {:?}", other),
    }
}

#[tokio::test]
async fn test_set_batch_success() {
    let session = open_session().await;
    let records: Vec<_> = (1..=3).map(|id| json!({ "id": id })).collect();

    let status = session.set_batch("users", &records).await.unwrap();
    assert_eq!(status, Status::BatchInsertOk);
    assert_eq!(session.count("users").await.unwrap(), Some(3));
}

#[tokio::test]
async fn test_set_batch_single_failure_flips_status() {
    let session = open_session().await;
    let records = vec![
        json!({"id": 1, "email": "same@x"}),
        json!({"id": 2, "email": "same@x"}),
        json!({"id": 3}),
    ];

    let result = session.set_batch("users", &records).await;
    assert_eq!(
        result.err().and_then(|e| e.status()),
        Some(Status::BatchInsertFailed)
    );
}

#[tokio::test]
async fn test_set_batch_missing_key_counts_as_failure() {
    let session = open_session().await;
    let records = vec![json!({"id": 1}), json!({"name": "keyless"})];

    let result = session.set_batch("users", &records).await;
    assert!(matches!(
        result,
        Err(StoreError::Rejected {
            status: Status::BatchInsertFailed,
            ..
        })
    ));
}

#[tokio::test]
async fn test_set_batch_empty_succeeds() {
    let session = open_session().await;
    let status = session.set_batch("users", &[]).await.unwrap();
    assert_eq!(status, Status::BatchInsertOk);
}

#[tokio::test]
async fn test_remove_leaves_other_keys() {
    let session = open_session().await;
    for id in 1..=3 {
        session.set("users", &json!({ "id": id })).await.unwrap();
    }

    let status = session.remove("users", 2).await.unwrap();
    assert_eq!(status, Status::DeleteOk);

    let keys = session.get_all_keys("users").await.unwrap();
    assert_eq!(keys, Some(vec![Key::from(1), Key::from(3)]));
}

#[tokio::test]
async fn test_remove_all_then_get_all_is_empty() {
    let session = open_session().await;
    session.set("users", &json!({"id": "a"})).await.unwrap();
    session.set("users", &json!({"id": "b"})).await.unwrap();

    assert_eq!(session.remove_all("users").await.unwrap(), Status::ClearOk);
    assert_eq!(session.get_all("users").await.unwrap(), Some(vec![]));
}

#[tokio::test]
async fn test_update_is_upsert() {
    let session = open_session().await;
    let status = session.update("users", &json!({"id": 9})).await.unwrap();
    assert_eq!(status, Status::UpdateOk);
    assert!(session.get("users", 9).await.unwrap().is_some());
}

#[tokio::test]
async fn test_update_without_key_rejects() {
    let session = open_session().await;
    let result = session.update("users", &json!({"name": "x"})).await;
    assert_eq!(result.err().and_then(|e| e.status()), Some(Status::UpdateFailed));
}

#[tokio::test]
async fn test_fetch_failures_resolve_absent() {
    let session = open_session().await;

    // Unknown store: the engine request fails, fetches report absence
    assert_eq!(session.get("nope", 1).await.unwrap(), None);
    assert_eq!(session.get_all("nope").await.unwrap(), None);
    assert_eq!(session.get_all_keys("nope").await.unwrap(), None);
    assert_eq!(session.count("nope").await.unwrap(), None);
}

#[tokio::test]
async fn test_status_failures_reject() {
    let session = open_session().await;

    let remove = session.remove("nope", 1).await;
    assert_eq!(remove.err().and_then(|e| e.status()), Some(Status::DeleteFailed));

    let clear = session.remove_all("nope").await;
    assert_eq!(clear.err().and_then(|e| e.status()), Some(Status::ClearFailed));

    let set = session.set("nope", &json!({"id": 1})).await;
    assert_eq!(set.err().and_then(|e| e.status()), Some(Status::InsertFailed));
}

#[tokio::test]
async fn test_get_missing_key_is_none() {
    let session = open_session().await;
    assert_eq!(session.get("users", "missing").await.unwrap(), None);
}

#[tokio::test]
async fn test_nested_key_path() {
    let config = DatabaseConfig::new("nested").with_store(StoreDecl::new("docs", "meta.id"));
    let session = Session::new(MemoryEngine::new(), config).unwrap();
    session.open().await.unwrap();

    let doc = json!({"meta": {"id": "d1"}, "body": "hello"});
    assert_eq!(session.set("docs", &doc).await.unwrap(), Status::InsertOk);
    assert_eq!(session.get("docs", "d1").await.unwrap(), Some(doc));
    assert_eq!(
        session.set("docs", &json!({"meta": {}})).await.unwrap(),
        Status::NoKeyField
    );
}

// ============================================================================
// Connection lifecycle
// ============================================================================

#[tokio::test]
async fn test_unsupported_engine_fails_open() {
    let config = DatabaseConfig::new("db").with_store(StoreDecl::new("s", "id"));
    let session = Session::new(MemoryEngine::unsupported(), config).unwrap();

    let err = session.open().await.unwrap_err();
    assert!(matches!(err, StoreError::NotSupported(_)));
    assert_eq!(err.status(), Some(Status::NotSupported));
    assert!(!session.is_open());
}

#[tokio::test]
async fn test_reopen_sees_previous_writes() {
    let engine = MemoryEngine::new();
    let config = DatabaseConfig::new("persist").with_store(StoreDecl::new("s", "id"));

    let session = Session::new(engine.clone(), config.clone()).unwrap();
    session.open().await.unwrap();
    session.set("s", &json!({"id": 1})).await.unwrap();
    session.close().unwrap();

    let again = Session::new(engine, config).unwrap();
    again.open().await.unwrap();
    assert_eq!(again.get("s", 1).await.unwrap(), Some(json!({"id": 1})));
    assert_eq!(again.store_names().unwrap(), vec!["s"]);
}

#[tokio::test]
async fn test_delete_database_requires_closed_session() {
    let engine = MemoryEngine::new();
    let config = DatabaseConfig::new("doomed").with_store(StoreDecl::new("s", "id"));
    let session = Session::new(engine.clone(), config).unwrap();
    session.open().await.unwrap();

    assert!(matches!(
        session.delete_database().await,
        Err(StoreError::AlreadyOpen)
    ));

    session.close().unwrap();
    session.delete_database().await.unwrap();
    assert!(engine.database_names().is_empty());
}

#[tokio::test]
async fn test_custom_installer_controls_indexes() {
    struct SkipIndexes;

    impl IndexInstaller for SkipIndexes {
        fn install(&self, _: &[IndexDecl], _: &mut dyn IndexTarget) -> StoreResult<()> {
            Ok(())
        }
    }

    let config = DatabaseConfig::new("no-index").with_store(
        StoreDecl::new("users", "id").with_index(IndexDecl::new("by_email", "email").unique()),
    );
    let session = Session::new(MemoryEngine::new(), config).unwrap();
    session.open_with(SkipIndexes).await.unwrap();

    // Without the unique index both records are accepted
    session.set("users", &json!({"id": 1, "email": "a@x"})).await.unwrap();
    let status = session.set("users", &json!({"id": 2, "email": "a@x"})).await.unwrap();
    assert_eq!(status, Status::InsertOk);
}

#[tokio::test]
async fn test_failing_installer_fails_open() {
    let config = DatabaseConfig::new("broken").with_store(
        StoreDecl::new("users", "id").with_index(IndexDecl::new("by_email", "email")),
    );
    let session = Session::new(MemoryEngine::new(), config).unwrap();

    let failing = |_: &[IndexDecl], _: &mut dyn IndexTarget| -> StoreResult<()> {
        Err(StoreError::Config("refused".into()))
    };
    let err = session.open_with(failing).await.unwrap_err();
    assert_eq!(err.status(), Some(Status::OpenFailed));
}
