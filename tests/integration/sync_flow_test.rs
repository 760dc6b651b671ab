//! End-to-end sync flows against a mock backend

use crate::common::*;
use crate::{assert_ok, assert_status};
use fitsync::handlers::SyncOperation;
use fitsync::offline::QueueJournal;
use fitsync::shared::{EntityKind, SyncStatus};
use pretty_assertions::assert_eq;
use serde_json::json;
use std::time::Duration;
use wiremock::matchers::{body_partial_json, header, method, path, path_regex};
use wiremock::{Mock, ResponseTemplate};

#[tokio::test]
async fn test_body_measurement_create_reaches_server() {
    let fixture = TestDatabase::new();
    let db = fixture.open().await;
    let api = MockApi::start().await;
    Mock::given(method("POST"))
        .and(path("/api/users/u1/body-measurements"))
        .and(header("Authorization", "Bearer test-token"))
        .and(body_partial_json(json!({
            "measurements": { "waist": 80.0 },
            "timestamp": MEASURED_AT,
        })))
        .respond_with(ResponseTemplate::new(201).set_body_json(json!({
            "CreatedAt": "2024-01-01T00:00:05Z",
            "UpdatedAt": "2024-01-01T00:00:06Z",
        })))
        .expect(1)
        .mount(&api.server)
        .await;

    seed_measurement(&db, "bm1").await;
    let manager = api.manager(&db, 3);
    assert_ok!(manager.enqueue(EntityKind::BodyMeasurement, SyncOperation::create("bm1")).await);

    let report = manager.process_due().await;

    assert_eq!(report.synced, 1);
    let record = load(&db, EntityKind::BodyMeasurement, "bm1").await;
    assert_status!(record, SyncStatus::Synced);
    assert_eq!(record.server_created_at.as_deref(), Some("2024-01-01T00:00:05Z"));
    assert_eq!(record.server_updated_at.as_deref(), Some("2024-01-01T00:00:06Z"));
    assert!(db.load().await.unwrap().is_empty());
}

#[tokio::test]
async fn test_server_error_is_retried_until_success() {
    let fixture = TestDatabase::new();
    let db = fixture.open().await;
    let api = MockApi::start().await;
    Mock::given(method("POST"))
        .respond_with(ResponseTemplate::new(500).set_body_string("boom"))
        .up_to_n_times(1)
        .mount(&api.server)
        .await;
    Mock::given(method("POST"))
        .respond_with(ResponseTemplate::new(201).set_body_json(json!({})))
        .mount(&api.server)
        .await;

    seed_measurement(&db, "bm1").await;
    let manager = api.manager(&db, 3);
    manager
        .enqueue(EntityKind::BodyMeasurement, SyncOperation::create("bm1"))
        .await
        .unwrap();

    let first = manager.process_due().await;
    assert_eq!(first.retried, 1);
    let record = load(&db, EntityKind::BodyMeasurement, "bm1").await;
    assert_status!(record, SyncStatus::Failed);
    assert_eq!(record.retry_count, 1);
    assert_eq!(record.last_error.as_deref(), Some("Request failed: 500 - boom"));
    assert_eq!(db.load().await.unwrap()[0].attempts, 1);

    let second = manager.process_due().await;
    assert_eq!(second.synced, 1);
    let record = load(&db, EntityKind::BodyMeasurement, "bm1").await;
    assert_status!(record, SyncStatus::Synced);
    assert_eq!(record.last_error, None);
}

#[tokio::test]
async fn test_persistent_failure_is_dead_lettered() {
    let fixture = TestDatabase::new();
    let db = fixture.open().await;
    let api = MockApi::start().await;
    Mock::given(method("POST"))
        .respond_with(ResponseTemplate::new(503).set_body_string("unavailable"))
        .mount(&api.server)
        .await;

    seed_measurement(&db, "bm1").await;
    let manager = api.manager(&db, 2);
    manager
        .enqueue(EntityKind::BodyMeasurement, SyncOperation::create("bm1"))
        .await
        .unwrap();

    manager.process_due().await;
    let report = manager.process_due().await;

    assert_eq!(report.dead_lettered, 1);
    assert_eq!(api.requests().await.len(), 2);
    let stats = db.get_stats().await.unwrap();
    assert_eq!(stats.queued_operations, 0);
    assert_eq!(stats.dead_letters, 1);
    assert_eq!(manager.process_due().await.attempted, 0);
}

#[tokio::test]
async fn test_conflict_marks_record_and_drops_operation() {
    let fixture = TestDatabase::new();
    let db = fixture.open().await;
    let api = MockApi::start().await;
    Mock::given(method("POST"))
        .respond_with(ResponseTemplate::new(409).set_body_string("stale"))
        .mount(&api.server)
        .await;

    seed_measurement(&db, "bm1").await;
    let manager = api.manager(&db, 3);
    manager
        .enqueue(EntityKind::BodyMeasurement, SyncOperation::create("bm1"))
        .await
        .unwrap();

    let report = manager.process_due().await;

    assert_eq!(report.conflicts, 1);
    assert_status!(load(&db, EntityKind::BodyMeasurement, "bm1").await, SyncStatus::Conflict);
    assert!(db.load().await.unwrap().is_empty());
    assert!(manager.dead_letters().await.is_empty());
}

#[tokio::test]
async fn test_operations_on_one_record_run_in_order() {
    let fixture = TestDatabase::new();
    let db = fixture.open().await;
    let api = MockApi::start().await;
    Mock::given(method("POST"))
        .respond_with(ResponseTemplate::new(201).set_body_json(json!({})))
        .mount(&api.server)
        .await;
    Mock::given(method("PUT"))
        .and(path_regex(r"^/api/users/u1/body-measurements/.+$"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({})))
        .mount(&api.server)
        .await;

    seed_measurement(&db, "bm1").await;
    seed_measurement(&db, "bm2").await;
    let manager = api.manager(&db, 3);
    manager.enqueue(EntityKind::BodyMeasurement, SyncOperation::create("bm1")).await.unwrap();
    manager.enqueue(EntityKind::BodyMeasurement, SyncOperation::update("bm1")).await.unwrap();
    manager.enqueue(EntityKind::BodyMeasurement, SyncOperation::create("bm2")).await.unwrap();

    let first = manager.process_due().await;
    assert_eq!(first.attempted, 2);
    let methods: Vec<_> = api.requests().await.into_iter().map(|(method, _)| method).collect();
    assert_eq!(methods, vec!["POST", "POST"]);

    let second = manager.process_due().await;
    assert_eq!(second.attempted, 1);
    let (method, path) = api.requests().await.pop().unwrap();
    assert_eq!(method, "PUT");
    assert!(path.starts_with("/api/users/u1/body-measurements/2024-01-01T00"));
}

#[tokio::test]
async fn test_set_modification_update_uses_server_id_from_create() {
    let fixture = TestDatabase::new();
    let db = fixture.open().await;
    let api = MockApi::start().await;
    Mock::given(method("POST"))
        .and(path("/api/users/u1/exercise-set-modifications"))
        .respond_with(ResponseTemplate::new(201).set_body_json(json!({ "ModificationId": 42 })))
        .mount(&api.server)
        .await;
    Mock::given(method("PUT"))
        .and(path("/api/users/u1/exercise-set-modifications/42"))
        .and(body_partial_json(json!({ "AdditionalSets": 2 })))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({ "ModificationId": 42 })))
        .expect(1)
        .mount(&api.server)
        .await;

    let data = json!({ "ExerciseId": 7, "ProgramId": 3, "OriginalSets": 3, "AdditionalSets": 1 });
    save(&db, EntityKind::ExerciseSetModification, "m1", data).await;
    let manager = api.manager(&db, 3);
    manager
        .enqueue(EntityKind::ExerciseSetModification, SyncOperation::create("m1"))
        .await
        .unwrap();
    assert_eq!(manager.process_due().await.synced, 1);

    save(&db, EntityKind::ExerciseSetModification, "m1", json!({ "AdditionalSets": 2 })).await;
    manager
        .enqueue(EntityKind::ExerciseSetModification, SyncOperation::update("m1"))
        .await
        .unwrap();
    let report = manager.process_due().await;

    assert_eq!(report.synced, 1);
    let record = load(&db, EntityKind::ExerciseSetModification, "m1").await;
    assert_status!(record, SyncStatus::Synced);
    assert_eq!(record.data["ModificationId"], json!(42));
}

#[tokio::test]
async fn test_mutation_during_sync_stays_pending() {
    let fixture = TestDatabase::new();
    let db = fixture.open().await;
    let api = MockApi::start().await;
    Mock::given(method("POST"))
        .respond_with(
            ResponseTemplate::new(201)
                .set_body_json(json!({}))
                .set_delay(Duration::from_millis(300)),
        )
        .mount(&api.server)
        .await;

    seed_measurement(&db, "bm1").await;
    let manager = api.manager(&db, 3);
    manager
        .enqueue(EntityKind::BodyMeasurement, SyncOperation::create("bm1"))
        .await
        .unwrap();

    let sync = manager.process_due();
    let edit = async {
        tokio::time::sleep(Duration::from_millis(100)).await;
        save(&db, EntityKind::BodyMeasurement, "bm1", json!({ "waist": 78 })).await
    };
    let (report, edited) = tokio::join!(sync, edit);

    assert_eq!(report.synced, 1);
    let record = load(&db, EntityKind::BodyMeasurement, "bm1").await;
    assert_eq!(record.version, edited.version);
    assert_status!(record, SyncStatus::Pending);
    assert_eq!(record.data["waist"], json!(78));
}

#[tokio::test]
async fn test_edit_during_create_keeps_server_id_for_update() {
    let fixture = TestDatabase::new();
    let db = fixture.open().await;
    let api = MockApi::start().await;
    Mock::given(method("POST"))
        .and(path("/api/users/u1/exercise-substitutions"))
        .respond_with(
            ResponseTemplate::new(201)
                .set_body_json(json!({ "SubstitutionId": 77, "CreatedAt": "2024-01-01T00:00:00Z" }))
                .set_delay(Duration::from_millis(300)),
        )
        .expect(1)
        .mount(&api.server)
        .await;
    Mock::given(method("PUT"))
        .and(path("/api/users/u1/exercise-substitutions/77"))
        .and(body_partial_json(json!({ "IsTemporary": true })))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({ "SubstitutionId": 77 })))
        .expect(1)
        .mount(&api.server)
        .await;

    let data = json!({ "OriginalExerciseId": 1, "SubstituteExerciseId": 2, "ProgramId": 3 });
    save(&db, EntityKind::ExerciseSubstitution, "s1", data).await;
    let manager = api.manager(&db, 3);
    manager
        .enqueue(EntityKind::ExerciseSubstitution, SyncOperation::create("s1"))
        .await
        .unwrap();

    let sync = manager.process_due();
    let edit = async {
        tokio::time::sleep(Duration::from_millis(100)).await;
        save(&db, EntityKind::ExerciseSubstitution, "s1", json!({ "IsTemporary": true })).await
    };
    let (report, _) = tokio::join!(sync, edit);
    assert_eq!(report.synced, 1);

    let record = load(&db, EntityKind::ExerciseSubstitution, "s1").await;
    assert_status!(record, SyncStatus::Pending);
    assert_eq!(record.data["SubstitutionId"], json!(77));

    manager
        .enqueue(EntityKind::ExerciseSubstitution, SyncOperation::update("s1"))
        .await
        .unwrap();
    let report = manager.process_due().await;

    assert_eq!(report.synced, 1);
    assert_eq!(report.dead_lettered, 0);
    assert_status!(load(&db, EntityKind::ExerciseSubstitution, "s1").await, SyncStatus::Synced);
}

#[tokio::test]
async fn test_program_day_completion_uses_logged_day() {
    let fixture = TestDatabase::new();
    let db = fixture.open().await;
    let api = MockApi::start().await;
    Mock::given(method("POST"))
        .and(path("/api/users/u1/program-progress/days/12/complete"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({ "CurrentDay": 13 })))
        .expect(1)
        .mount(&api.server)
        .await;

    let data = json!({
        "ProgramId": 5,
        "CurrentDay": 13,
        "CompletedDays": [11, 12],
        "LastAction": "COMPLETE_DAY",
        "CompletionLog": [
            { "DayId": 11, "Action": "COMPLETE_DAY", "Timestamp": "2024-01-01T00:00:00Z" },
            { "DayId": 12, "Action": "COMPLETE_DAY", "Timestamp": "2024-01-02T00:00:00Z" }
        ]
    });
    save(&db, EntityKind::ProgramProgress, "p1", data).await;
    let manager = api.manager(&db, 3);
    manager
        .enqueue(EntityKind::ProgramProgress, SyncOperation::update("p1"))
        .await
        .unwrap();

    assert_eq!(manager.process_due().await.synced, 1);
    assert_status!(load(&db, EntityKind::ProgramProgress, "p1").await, SyncStatus::Synced);
}
