//! Request payloads sent to the remote entity services.
//!
//! Field names follow the backend's PascalCase JSON. Ids may arrive from the
//! local payload as strings or integers and are normalized to strings.

use serde::{Deserialize, Deserializer, Serialize};
use std::collections::BTreeMap;

/// Sparse map of measurement name to value
pub type Measurements = BTreeMap<String, f64>;

/// Exercise set modification as sent on create and update
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "PascalCase")]
pub struct SetModificationFields {
    #[serde(deserialize_with = "string_or_number")]
    pub exercise_id: String,
    #[serde(deserialize_with = "string_or_number")]
    pub program_id: String,
    pub original_sets: u32,
    pub additional_sets: i32,
    #[serde(default)]
    pub is_temporary: bool,
    #[serde(default)]
    pub temporary_date: Option<String>,
}

/// Exercise substitution as sent on create and update
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "PascalCase")]
pub struct SubstitutionFields {
    #[serde(deserialize_with = "string_or_number")]
    pub original_exercise_id: String,
    #[serde(deserialize_with = "string_or_number")]
    pub substitute_exercise_id: String,
    #[serde(deserialize_with = "string_or_number")]
    pub program_id: String,
    #[serde(default)]
    pub is_temporary: bool,
    #[serde(default)]
    pub temporary_date: Option<String>,
}

/// Nutrition goal fields accepted by the goal upsert endpoints
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "PascalCase")]
pub struct NutritionGoalFields {
    pub effective_date: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub goal_type: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub target_weight: Option<f64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub weekly_change_rate: Option<f64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub activity_level: Option<String>,
}

/// A record the server has already created, addressed by its server id
#[derive(Debug, Clone, PartialEq)]
pub struct Acknowledged<T> {
    pub server_id: String,
    pub fields: T,
}

#[derive(Deserialize)]
#[serde(untagged)]
enum RawId {
    Text(String),
    Number(i64),
}

impl From<RawId> for String {
    fn from(raw: RawId) -> Self {
        match raw {
            RawId::Text(text) => text,
            RawId::Number(n) => n.to_string(),
        }
    }
}

pub(crate) fn string_or_number<'de, D>(deserializer: D) -> Result<String, D::Error>
where
    D: Deserializer<'de>,
{
    RawId::deserialize(deserializer).map(String::from)
}

pub(crate) fn optional_string_or_number<'de, D>(deserializer: D) -> Result<Option<String>, D::Error>
where
    D: Deserializer<'de>,
{
    Option::<RawId>::deserialize(deserializer).map(|raw| raw.map(String::from))
}
