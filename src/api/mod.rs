//! # Remote Entity Services
//!
//! One async trait per entity describing the calls its sync handler makes
//! against the backend. [`ApiClient`] implements all of them over HTTP; tests
//! substitute recording fakes.
//!
//! Every call resolves to the server's JSON payload (`null` for empty
//! bodies) or an [`ApiError`].

pub mod client;
pub mod types;

pub use client::ApiClient;
pub use types::{
    Acknowledged, Measurements, NutritionGoalFields, SetModificationFields, SubstitutionFields,
};

use crate::shared::ApiError;
use async_trait::async_trait;
use serde_json::Value;

/// Result of a remote call
pub type ApiResult = Result<Value, ApiError>;

#[async_trait]
pub trait BodyMeasurementService: Send + Sync {
    async fn log_body_measurement(
        &self,
        user_id: &str,
        measurements: &Measurements,
        timestamp: &str,
    ) -> ApiResult;

    async fn update_body_measurement(
        &self,
        user_id: &str,
        timestamp: &str,
        measurements: &Measurements,
    ) -> ApiResult;

    async fn delete_body_measurement(&self, user_id: &str, timestamp: &str) -> ApiResult;
}

#[async_trait]
pub trait ExerciseSetModificationService: Send + Sync {
    async fn create_exercise_set_modification(
        &self,
        user_id: &str,
        modification: &SetModificationFields,
    ) -> ApiResult;

    /// Only records acknowledged by an earlier create can be updated
    async fn update_exercise_set_modification(
        &self,
        user_id: &str,
        modification: &Acknowledged<SetModificationFields>,
    ) -> ApiResult;

    async fn delete_exercise_set_modification(&self, user_id: &str, modification_id: &str) -> ApiResult;
}

#[async_trait]
pub trait ExerciseSubstitutionService: Send + Sync {
    async fn create_exercise_substitution(
        &self,
        user_id: &str,
        substitution: &SubstitutionFields,
    ) -> ApiResult;

    /// Only records acknowledged by an earlier create can be updated
    async fn update_exercise_substitution(
        &self,
        user_id: &str,
        substitution: &Acknowledged<SubstitutionFields>,
    ) -> ApiResult;

    async fn delete_exercise_substitution(&self, user_id: &str, substitution_id: &str) -> ApiResult;
}

/// Goal writes answer with the user's complete goal list
#[async_trait]
pub trait NutritionGoalService: Send + Sync {
    async fn create_nutrition_goal(
        &self,
        user_id: &str,
        goal: &NutritionGoalFields,
        adjustment_reason: Option<&str>,
        adjustment_notes: Option<&str>,
    ) -> ApiResult;

    async fn update_nutrition_goal(
        &self,
        user_id: &str,
        goal: &NutritionGoalFields,
        adjustment_reason: Option<&str>,
        adjustment_notes: Option<&str>,
    ) -> ApiResult;
}

#[async_trait]
pub trait NutritionProfileService: Send + Sync {
    /// Upsert; answers `{ "userNutritionProfile": ... }`
    async fn update_user_nutrition_profile(&self, user_id: &str, profile: &Value) -> ApiResult;
}

#[async_trait]
pub trait ProgramProgressService: Send + Sync {
    async fn start_program(&self, user_id: &str, program_id: &str) -> ApiResult;

    /// Answers `null` once the final day of the program is completed
    async fn complete_day(&self, user_id: &str, day_id: &str, auto_complete: bool) -> ApiResult;

    async fn uncomplete_day(&self, user_id: &str, day_id: &str) -> ApiResult;

    async fn end_program(&self, user_id: &str) -> ApiResult;

    async fn reset_program(&self, user_id: &str) -> ApiResult;
}
