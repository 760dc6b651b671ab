/**
 * Remote API Client
 *
 * HTTP implementation of every remote entity service. Requests are JSON,
 * authenticated with an optional bearer token, and bounded by the configured
 * request timeout.
 */

use super::{
    Acknowledged, ApiResult, BodyMeasurementService, ExerciseSetModificationService,
    ExerciseSubstitutionService, Measurements, NutritionGoalFields, NutritionGoalService,
    NutritionProfileService, ProgramProgressService, SetModificationFields, SubstitutionFields,
};
use crate::shared::{ApiError, AppConfig};
use async_trait::async_trait;
use reqwest::{Client, Method, Url};
use serde_json::{json, Value};
use std::time::Duration;

/// HTTP client for the fitness backend
#[derive(Debug, Clone)]
pub struct ApiClient {
    client: Client,
    base_url: Url,
    token: Option<String>,
}

impl ApiClient {
    /// Build a client from the application configuration
    pub fn new(config: &AppConfig) -> Result<Self, ApiError> {
        let base_url = Url::parse(&config.server_url).map_err(|e| ApiError::InvalidRequest {
            message: format!("bad server URL {}: {}", config.server_url, e),
        })?;

        let client = Client::builder()
            .timeout(Duration::from_secs(config.request_timeout_secs))
            .build()
            .map_err(|e| ApiError::network(format!("Failed to build HTTP client: {}", e)))?;

        Ok(Self {
            client,
            base_url,
            token: config.api_token.clone(),
        })
    }

    /// Replace the bearer token
    pub fn set_token(&mut self, token: Option<String>) {
        self.token = token;
    }

    /// Full URL for a path given as segments; each segment is percent-encoded
    fn endpoint(&self, segments: &[&str]) -> Result<Url, ApiError> {
        let mut url = self.base_url.clone();
        url.path_segments_mut()
            .map_err(|_| ApiError::InvalidRequest {
                message: format!("server URL cannot be a base: {}", self.base_url),
            })?
            .pop_if_empty()
            .extend(segments);
        Ok(url)
    }

    async fn send(&self, method: Method, segments: &[&str], body: Option<Value>) -> ApiResult {
        let url = self.endpoint(segments)?;
        tracing::debug!(%method, %url, "Sending API request");

        let mut request = self.client.request(method.clone(), url.clone());
        if let Some(token) = &self.token {
            request = request.header("Authorization", format!("Bearer {}", token));
        }
        if let Some(body) = body {
            request = request.json(&body);
        }

        let response = request.send().await?;

        if !response.status().is_success() {
            let status = response.status();
            let error_text = response
                .text()
                .await
                .unwrap_or_else(|_| status.to_string());
            tracing::warn!(%method, %url, status = status.as_u16(), "API request failed");
            return Err(ApiError::status(status.as_u16(), error_text));
        }

        let text = response.text().await?;
        if text.trim().is_empty() {
            return Ok(Value::Null);
        }
        serde_json::from_str(&text).map_err(|e| ApiError::Decode {
            message: e.to_string(),
        })
    }
}

#[async_trait]
impl BodyMeasurementService for ApiClient {
    async fn log_body_measurement(
        &self,
        user_id: &str,
        measurements: &Measurements,
        timestamp: &str,
    ) -> ApiResult {
        let body = json!({ "measurements": measurements, "timestamp": timestamp });
        self.send(Method::POST, &["api", "users", user_id, "body-measurements"], Some(body))
            .await
    }

    async fn update_body_measurement(
        &self,
        user_id: &str,
        timestamp: &str,
        measurements: &Measurements,
    ) -> ApiResult {
        let body = json!({ "measurements": measurements });
        self.send(
            Method::PUT,
            &["api", "users", user_id, "body-measurements", timestamp],
            Some(body),
        )
        .await
    }

    async fn delete_body_measurement(&self, user_id: &str, timestamp: &str) -> ApiResult {
        self.send(
            Method::DELETE,
            &["api", "users", user_id, "body-measurements", timestamp],
            None,
        )
        .await
    }
}

#[async_trait]
impl ExerciseSetModificationService for ApiClient {
    async fn create_exercise_set_modification(
        &self,
        user_id: &str,
        modification: &SetModificationFields,
    ) -> ApiResult {
        let body = serde_json::to_value(modification).map_err(|e| ApiError::InvalidRequest {
            message: e.to_string(),
        })?;
        self.send(
            Method::POST,
            &["api", "users", user_id, "exercise-set-modifications"],
            Some(body),
        )
        .await
    }

    async fn update_exercise_set_modification(
        &self,
        user_id: &str,
        modification: &Acknowledged<SetModificationFields>,
    ) -> ApiResult {
        let body = serde_json::to_value(&modification.fields).map_err(|e| ApiError::InvalidRequest {
            message: e.to_string(),
        })?;
        self.send(
            Method::PUT,
            &["api", "users", user_id, "exercise-set-modifications", &modification.server_id],
            Some(body),
        )
        .await
    }

    async fn delete_exercise_set_modification(&self, user_id: &str, modification_id: &str) -> ApiResult {
        self.send(
            Method::DELETE,
            &["api", "users", user_id, "exercise-set-modifications", modification_id],
            None,
        )
        .await
    }
}

#[async_trait]
impl ExerciseSubstitutionService for ApiClient {
    async fn create_exercise_substitution(
        &self,
        user_id: &str,
        substitution: &SubstitutionFields,
    ) -> ApiResult {
        let body = serde_json::to_value(substitution).map_err(|e| ApiError::InvalidRequest {
            message: e.to_string(),
        })?;
        self.send(
            Method::POST,
            &["api", "users", user_id, "exercise-substitutions"],
            Some(body),
        )
        .await
    }

    async fn update_exercise_substitution(
        &self,
        user_id: &str,
        substitution: &Acknowledged<SubstitutionFields>,
    ) -> ApiResult {
        let body = serde_json::to_value(&substitution.fields).map_err(|e| ApiError::InvalidRequest {
            message: e.to_string(),
        })?;
        self.send(
            Method::PUT,
            &["api", "users", user_id, "exercise-substitutions", &substitution.server_id],
            Some(body),
        )
        .await
    }

    async fn delete_exercise_substitution(&self, user_id: &str, substitution_id: &str) -> ApiResult {
        self.send(
            Method::DELETE,
            &["api", "users", user_id, "exercise-substitutions", substitution_id],
            None,
        )
        .await
    }
}

fn goal_body(goal: &NutritionGoalFields, reason: Option<&str>, notes: Option<&str>) -> Value {
    json!({
        "goal": goal,
        "adjustmentReason": reason,
        "adjustmentNotes": notes,
    })
}

#[async_trait]
impl NutritionGoalService for ApiClient {
    async fn create_nutrition_goal(
        &self,
        user_id: &str,
        goal: &NutritionGoalFields,
        adjustment_reason: Option<&str>,
        adjustment_notes: Option<&str>,
    ) -> ApiResult {
        self.send(
            Method::POST,
            &["api", "users", user_id, "nutrition-goals"],
            Some(goal_body(goal, adjustment_reason, adjustment_notes)),
        )
        .await
    }

    async fn update_nutrition_goal(
        &self,
        user_id: &str,
        goal: &NutritionGoalFields,
        adjustment_reason: Option<&str>,
        adjustment_notes: Option<&str>,
    ) -> ApiResult {
        self.send(
            Method::PUT,
            &["api", "users", user_id, "nutrition-goals", &goal.effective_date],
            Some(goal_body(goal, adjustment_reason, adjustment_notes)),
        )
        .await
    }
}

#[async_trait]
impl NutritionProfileService for ApiClient {
    async fn update_user_nutrition_profile(&self, user_id: &str, profile: &Value) -> ApiResult {
        self.send(
            Method::PUT,
            &["api", "users", user_id, "nutrition-profile"],
            Some(json!({ "profile": profile })),
        )
        .await
    }
}

#[async_trait]
impl ProgramProgressService for ApiClient {
    async fn start_program(&self, user_id: &str, program_id: &str) -> ApiResult {
        self.send(
            Method::POST,
            &["api", "users", user_id, "program-progress", "start"],
            Some(json!({ "programId": program_id })),
        )
        .await
    }

    async fn complete_day(&self, user_id: &str, day_id: &str, auto_complete: bool) -> ApiResult {
        self.send(
            Method::POST,
            &["api", "users", user_id, "program-progress", "days", day_id, "complete"],
            Some(json!({ "autoComplete": auto_complete })),
        )
        .await
    }

    async fn uncomplete_day(&self, user_id: &str, day_id: &str) -> ApiResult {
        self.send(
            Method::POST,
            &["api", "users", user_id, "program-progress", "days", day_id, "uncomplete"],
            None,
        )
        .await
    }

    async fn end_program(&self, user_id: &str) -> ApiResult {
        self.send(
            Method::POST,
            &["api", "users", user_id, "program-progress", "end"],
            None,
        )
        .await
    }

    async fn reset_program(&self, user_id: &str) -> ApiResult {
        self.send(
            Method::POST,
            &["api", "users", user_id, "program-progress", "reset"],
            None,
        )
        .await
    }
}
