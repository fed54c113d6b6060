use mira_store::{Store, StoreConfig};
use mira_store::{api_call, budget, consent, conversations, jobs, learnings, messages, revocations, sanitization_log, uploads};
use mira_types::{Detection, DetectionStage, Id, JobType, LearningCategory, Role};

async fn test_store() -> Store {
    Store::connect(&StoreConfig::in_memory()).await.unwrap()
}

#[tokio::test]
async fn message_sequence_is_monotonic_per_conversation() {
    let store = test_store().await;
    let mut tx = store.begin().await.unwrap();
    let conv = conversations::upsert_by_session_key(&mut tx, "S1").await.unwrap();

    let (_, seq1) = messages::insert(
        &mut tx,
        messages::NewMessage {
            conversation_id: &conv,
            role: Role::User,
            content: "hello",
            sanitization_version: 1,
        },
    )
    .await
    .unwrap();
    let (_, seq2) = messages::insert(
        &mut tx,
        messages::NewMessage {
            conversation_id: &conv,
            role: Role::Assistant,
            content: "hi there",
            sanitization_version: 1,
        },
    )
    .await
    .unwrap();
    tx.commit().await.unwrap();

    assert_eq!(seq1, 1);
    assert_eq!(seq2, 2);
}

#[tokio::test]
async fn same_session_key_reuses_one_conversation() {
    let store = test_store().await;

    let mut tx = store.begin().await.unwrap();
    let conv1 = conversations::upsert_by_session_key(&mut tx, "S2").await.unwrap();
    tx.commit().await.unwrap();

    let mut tx = store.begin().await.unwrap();
    let conv2 = conversations::upsert_by_session_key(&mut tx, "S2").await.unwrap();
    tx.commit().await.unwrap();

    assert_eq!(conv1, conv2);
}

#[tokio::test]
async fn ai_validation_updates_content_and_flag() {
    let store = test_store().await;
    let mut tx = store.begin().await.unwrap();
    let conv = conversations::upsert_by_session_key(&mut tx, "S3").await.unwrap();
    let (message_id, _) = messages::insert(
        &mut tx,
        messages::NewMessage {
            conversation_id: &conv,
            role: Role::User,
            content: "John Smith shared credentials",
            sanitization_version: 1,
        },
    )
    .await
    .unwrap();
    tx.commit().await.unwrap();

    let detections = vec![Detection {
        category: "PERSON".to_string(),
        placeholder: "[REDACTED_PERSON]".to_string(),
        start: 0,
        end: 18,
        confidence: 0.95,
        detector: "ai_validator".to_string(),
        detector_version: 1,
    }];

    let mut tx = store.begin().await.unwrap();
    messages::apply_ai_validation(
        &mut tx,
        &message_id,
        "[REDACTED_PERSON] shared credentials",
        &detections,
    )
    .await
    .unwrap();
    sanitization_log::append(&mut tx, &message_id, DetectionStage::AiValidation, &detections)
        .await
        .unwrap();
    tx.commit().await.unwrap();

    let mut tx = store.begin().await.unwrap();
    let row = messages::fetch_by_id(&mut tx, &message_id).await.unwrap().unwrap();
    assert_eq!(row.content, "[REDACTED_PERSON] shared credentials");
    assert!(row.ai_validated);

    let logs = sanitization_log::fetch_by_message(&mut tx, &message_id).await.unwrap();
    assert_eq!(logs.len(), 1);
    assert_eq!(logs[0].stage, "ai_validation");
}

#[tokio::test]
async fn job_insert_is_idempotent_by_key() {
    let store = test_store().await;
    let mut tx = store.begin().await.unwrap();

    let new_job = || jobs::NewJob {
        job_type: JobType::AiSanitizationValidation,
        payload_json: "{}",
        priority: 5,
        scheduled_at: "2026-01-01T00:00:00Z",
        idempotency_key: Some("validate-m1"),
        max_attempts: 3,
    };

    let first = jobs::insert(&mut tx, new_job()).await.unwrap();
    let second = jobs::insert(&mut tx, new_job()).await.unwrap();
    tx.commit().await.unwrap();

    assert_eq!(first.id, second.id);
}

#[tokio::test]
async fn claim_marks_in_progress_and_sets_lease() {
    let store = test_store().await;
    let mut tx = store.begin().await.unwrap();
    jobs::insert(
        &mut tx,
        jobs::NewJob {
            job_type: JobType::ExtractLearning,
            payload_json: "{}",
            priority: 5,
            scheduled_at: "2026-01-01T00:00:00Z",
            idempotency_key: None,
            max_attempts: 3,
        },
    )
    .await
    .unwrap();
    tx.commit().await.unwrap();

    let mut tx = store.begin().await.unwrap();
    jobs::reap_expired_leases(&mut tx, JobType::ExtractLearning, "2026-01-01T00:00:01Z")
        .await
        .unwrap();
    let claimed = jobs::claim(
        &mut tx,
        JobType::ExtractLearning,
        "2026-01-01T00:00:01Z",
        "2026-01-01T00:01:01Z",
    )
    .await
    .unwrap()
    .unwrap();
    tx.commit().await.unwrap();

    assert_eq!(claimed.status, "in_progress");
    assert_eq!(claimed.lease_expires_at.as_deref(), Some("2026-01-01T00:01:01Z"));
}

#[tokio::test]
async fn complete_rejects_a_job_that_is_not_in_progress() {
    let store = test_store().await;
    let mut tx = store.begin().await.unwrap();
    let job = jobs::insert(
        &mut tx,
        jobs::NewJob {
            job_type: JobType::PublishLearning,
            payload_json: "{}",
            priority: 5,
            scheduled_at: "2026-01-01T00:00:00Z",
            idempotency_key: None,
            max_attempts: 3,
        },
    )
    .await
    .unwrap();

    let err = jobs::complete(&mut tx, &job.id, None).await.unwrap_err();
    assert!(matches!(err, mira_store::StoreError::Constraint(_)));
}

#[tokio::test]
async fn fail_dead_letters_once_max_attempts_reached() {
    let store = test_store().await;
    let mut tx = store.begin().await.unwrap();
    let job = jobs::insert(
        &mut tx,
        jobs::NewJob {
            job_type: JobType::AiSanitizationValidation,
            payload_json: "{}",
            priority: 5,
            scheduled_at: "2026-01-01T00:00:00Z",
            idempotency_key: None,
            max_attempts: 1,
        },
    )
    .await
    .unwrap();
    jobs::claim(
        &mut tx,
        JobType::AiSanitizationValidation,
        "2026-01-01T00:00:00Z",
        "2026-01-01T00:01:00Z",
    )
    .await
    .unwrap();

    let outcome = jobs::fail(&mut tx, &job.id, "oracle timeout", "2026-01-02T00:00:00Z")
        .await
        .unwrap();
    tx.commit().await.unwrap();

    assert_eq!(outcome, jobs::FailOutcome::DeadLettered);

    let mut tx = store.begin().await.unwrap();
    let count = jobs::count_by_status(
        &mut tx,
        JobType::AiSanitizationValidation,
        mira_types::JobStatus::DeadLetter,
    )
    .await
    .unwrap();
    assert_eq!(count, 1);
}

#[tokio::test]
async fn budget_reservation_is_idempotent_and_adjustable() {
    let store = test_store().await;
    let mut tx = store.begin().await.unwrap();
    let ledger = budget::ensure_singleton(&mut tx, 10_000, 100_000, 1_000).await.unwrap();

    let first = api_call::reserve(
        &mut tx,
        "call-1",
        "validate",
        "claude-haiku",
        100,
        50,
        5,
        "corr-1",
    )
    .await
    .unwrap();
    let again = api_call::reserve(
        &mut tx,
        "call-1",
        "validate",
        "claude-haiku",
        100,
        50,
        5,
        "corr-1",
    )
    .await
    .unwrap();
    assert_eq!(first.id, again.id);

    budget::adjust_spend(&mut tx, &ledger.id, 5, 5).await.unwrap();
    tx.commit().await.unwrap();

    let mut tx = store.begin().await.unwrap();
    let row = budget::fetch_singleton(&mut tx).await.unwrap().unwrap();
    assert_eq!(row.current_daily_spend_cents, 5);
    assert_eq!(row.current_monthly_spend_cents, 5);
}

#[tokio::test]
async fn api_call_finalize_updates_actuals() {
    let store = test_store().await;
    let mut tx = store.begin().await.unwrap();
    let reserved = api_call::reserve(&mut tx, "call-2", "extract", "claude-sonnet", 200, 100, 10, "corr-2")
        .await
        .unwrap();
    api_call::finalize(&mut tx, &reserved.id, mira_types::ApiCallStatus::Success, 210, 95, 11)
        .await
        .unwrap();
    tx.commit().await.unwrap();

    let mut tx = store.begin().await.unwrap();
    let row = api_call::fetch_by_idempotency_key(&mut tx, "call-2")
        .await
        .unwrap()
        .unwrap();
    assert_eq!(row.status, "success");
    assert_eq!(row.cost_cents, Some(11));
}

#[tokio::test]
async fn learnings_round_trip_with_embedding() {
    let store = test_store().await;
    let mut tx = store.begin().await.unwrap();
    let conv = conversations::upsert_by_session_key(&mut tx, "S4").await.unwrap();

    let content = "a".repeat(120);
    let tags = vec!["rust".to_string(), "testing".to_string()];
    let embedding = vec![0.1_f32, 0.2, 0.3];

    let id = learnings::insert(
        &mut tx,
        learnings::NewLearning {
            category: LearningCategory::BugFix,
            title: "fixed a race",
            content: &content,
            tags: &tags,
            confidence: 0.9,
            embedding: Some(&embedding),
            source_conversation_id: &conv,
            sanitizer_version: 1,
            extractor_version: 1,
        },
    )
    .await
    .unwrap();
    tx.commit().await.unwrap();

    let mut tx = store.begin().await.unwrap();
    let row = learnings::fetch_by_id(&mut tx, &id).await.unwrap().unwrap();
    assert_eq!(row.category, "bug_fix");
    assert!(row.embedding.is_some());

    let with_embeddings = learnings::fetch_with_embeddings(&mut tx, 10).await.unwrap();
    assert_eq!(with_embeddings.len(), 1);
}

#[tokio::test]
async fn consent_fetch_active_excludes_withdrawn_and_disabled() {
    let store = test_store().await;
    let mut tx = store.begin().await.unwrap();

    let withdrawn_id = consent::record(
        &mut tx,
        "2026-01-01T00:00:00Z",
        "v1",
        "hash1",
        true,
        true,
        consent::Attribution::Anonymous,
        true,
        None,
    )
    .await
    .unwrap();
    consent::withdraw(&mut tx, &withdrawn_id, "2026-01-02T00:00:00Z")
        .await
        .unwrap();

    consent::record(
        &mut tx,
        "2026-01-03T00:00:00Z",
        "v1",
        "hash2",
        false,
        true,
        consent::Attribution::Pseudonymous,
        true,
        None,
    )
    .await
    .unwrap();

    assert!(consent::fetch_active(&mut tx).await.unwrap().is_none());

    let active_id = consent::record(
        &mut tx,
        "2026-01-04T00:00:00Z",
        "v1",
        "hash3",
        true,
        false,
        consent::Attribution::Attributed,
        true,
        None,
    )
    .await
    .unwrap();
    tx.commit().await.unwrap();

    let mut tx = store.begin().await.unwrap();
    let active = consent::fetch_active(&mut tx).await.unwrap().unwrap();
    assert_eq!(active.id, active_id);
}

#[tokio::test]
async fn revoked_content_address_is_excluded() {
    let store = test_store().await;
    let mut tx = store.begin().await.unwrap();
    let conv = conversations::upsert_by_session_key(&mut tx, "S5").await.unwrap();
    let content = "b".repeat(120);
    let learning_id = learnings::insert(
        &mut tx,
        learnings::NewLearning {
            category: LearningCategory::Pattern,
            title: "a pattern",
            content: &content,
            tags: &[],
            confidence: 0.8,
            embedding: None,
            source_conversation_id: &conv,
            sanitizer_version: 1,
            extractor_version: 1,
        },
    )
    .await
    .unwrap();

    uploads::insert(&mut tx, &learning_id, "bafy-address", Some("anchor-tx-1"))
        .await
        .unwrap();
    revocations::insert(&mut tx, "bafy-address", "user requested deletion")
        .await
        .unwrap();
    tx.commit().await.unwrap();

    let mut tx = store.begin().await.unwrap();
    assert!(revocations::is_revoked(&mut tx, "bafy-address").await.unwrap());
    assert!(!revocations::is_revoked(&mut tx, "bafy-other").await.unwrap());

    let uploads = uploads::fetch_by_learning(&mut tx, &learning_id).await.unwrap();
    assert_eq!(uploads.len(), 1);
}

#[tokio::test]
async fn store_file_is_created_with_owner_only_permissions() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("mira.db");
    let config = StoreConfig {
        path: path.clone(),
        max_connections: 1,
    };
    let _store = Store::connect(&config).await.unwrap();

    #[cfg(unix)]
    {
        use std::os::unix::fs::PermissionsExt;
        let mode = std::fs::metadata(&path).unwrap().permissions().mode() & 0o777;
        assert_eq!(mode, 0o600);
    }
}

#[tokio::test]
async fn message_id_is_a_valid_ulid() {
    let store = test_store().await;
    let mut tx = store.begin().await.unwrap();
    let conv = conversations::upsert_by_session_key(&mut tx, "S6").await.unwrap();
    let (message_id, _) = messages::insert(
        &mut tx,
        messages::NewMessage {
            conversation_id: &conv,
            role: Role::User,
            content: "hi",
            sanitization_version: 1,
        },
    )
    .await
    .unwrap();
    tx.commit().await.unwrap();

    assert_eq!(message_id.len(), 26);
    assert!(message_id.parse::<Id>().is_ok());
}
