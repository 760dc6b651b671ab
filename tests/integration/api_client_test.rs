//! ApiClient request shapes and error mapping

use crate::common::*;
use assert_matches::assert_matches;
use fitsync::api::{
    Acknowledged, BodyMeasurementService, NutritionGoalFields, NutritionGoalService,
    NutritionProfileService, ProgramProgressService, SubstitutionFields, ExerciseSubstitutionService,
};
use fitsync::shared::ApiError;
use serde_json::{json, Value};
use wiremock::matchers::{body_json, header, method, path};
use wiremock::{Mock, ResponseTemplate};

#[tokio::test]
async fn test_empty_body_decodes_to_null() {
    let api = MockApi::start().await;
    Mock::given(method("POST"))
        .and(path("/api/users/u1/program-progress/days/3/complete"))
        .and(body_json(json!({ "autoComplete": true })))
        .respond_with(ResponseTemplate::new(200))
        .mount(&api.server)
        .await;

    let payload = api.client.complete_day("u1", "3", true).await.unwrap();

    assert_eq!(payload, Value::Null);
}

#[tokio::test]
async fn test_non_success_maps_to_status_error() {
    let api = MockApi::start().await;
    Mock::given(method("DELETE"))
        .respond_with(ResponseTemplate::new(404).set_body_string("no such measurement"))
        .mount(&api.server)
        .await;

    let result = api.client.delete_body_measurement("u1", MEASURED_AT).await;

    assert_matches!(result, Err(ApiError::Status { status: 404, ref body }) if body == "no such measurement");
}

#[tokio::test]
async fn test_conflict_status_is_detected() {
    let api = MockApi::start().await;
    Mock::given(method("PUT"))
        .and(path("/api/users/u1/nutrition-profile"))
        .respond_with(ResponseTemplate::new(409).set_body_string("stale"))
        .mount(&api.server)
        .await;

    let error = api
        .client
        .update_user_nutrition_profile("u1", &json!({ "Height": 180 }))
        .await
        .unwrap_err();

    assert!(error.is_conflict());
}

#[tokio::test]
async fn test_malformed_json_is_a_decode_error() {
    let api = MockApi::start().await;
    Mock::given(method("POST"))
        .respond_with(ResponseTemplate::new(200).set_body_string("{not json"))
        .mount(&api.server)
        .await;

    let result = api.client.end_program("u1").await;

    assert_matches!(result, Err(ApiError::Decode { .. }));
}

#[tokio::test]
async fn test_unreachable_server_is_a_network_error() {
    let config = fitsync::shared::AppConfig::builder()
        .server_url("http://127.0.0.1:9")
        .request_timeout_secs(2)
        .build()
        .unwrap();
    let client = fitsync::api::ApiClient::new(&config).unwrap();

    let result = client.reset_program("u1").await;

    assert_matches!(result, Err(ApiError::Network { .. }));
}

#[tokio::test]
async fn test_goal_update_addresses_effective_date() {
    let api = MockApi::start().await;
    Mock::given(method("PUT"))
        .and(path("/api/users/u1/nutrition-goals/2024-02-01"))
        .and(header("Authorization", "Bearer test-token"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!([{ "EffectiveDate": "2024-02-01" }])))
        .expect(1)
        .mount(&api.server)
        .await;
    let goal = NutritionGoalFields {
        effective_date: "2024-02-01".to_string(),
        goal_type: Some("cut".to_string()),
        target_weight: None,
        weekly_change_rate: None,
        activity_level: None,
    };

    let payload = api
        .client
        .update_nutrition_goal("u1", &goal, Some("plateau"), None)
        .await
        .unwrap();

    assert!(payload.is_array());
}

#[tokio::test]
async fn test_substitution_update_addresses_server_id() {
    let api = MockApi::start().await;
    Mock::given(method("PUT"))
        .and(path("/api/users/u1/exercise-substitutions/77"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({ "SubstitutionId": 77 })))
        .expect(1)
        .mount(&api.server)
        .await;
    let substitution = Acknowledged {
        server_id: "77".to_string(),
        fields: SubstitutionFields {
            original_exercise_id: "1".to_string(),
            substitute_exercise_id: "2".to_string(),
            program_id: "3".to_string(),
            is_temporary: false,
            temporary_date: None,
        },
    };

    let payload = api.client.update_exercise_substitution("u1", &substitution).await.unwrap();

    assert_eq!(payload["SubstitutionId"], json!(77));
}
