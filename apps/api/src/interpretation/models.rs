use chrono::{DateTime, FixedOffset};
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

use crate::models::interpretation::{InterpretationItemRow, InterpretationRow};

/// Closed set of interpretation kinds. Only `todo` exists today.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum InterpretationType {
    Todo,
}

impl InterpretationType {
    /// Missing or empty means `todo`; anything else must name a known kind.
    fn parse(raw: Option<&str>) -> Result<Self, String> {
        match raw.map(str::trim) {
            None | Some("") | Some("todo") => Ok(InterpretationType::Todo),
            Some(other) => Err(format!("unsupported interpretation type '{other}'")),
        }
    }
}

/// Structured model output, stored as `structured_result`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(try_from = "RawInterpretationResult")]
pub struct InterpretationResult {
    #[serde(rename = "type")]
    pub kind: InterpretationType,
    pub title: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
    pub metadata: InterpretationMetadata,
}

/// Lenient shape the model is allowed to answer with.
#[derive(Deserialize)]
struct RawInterpretationResult {
    #[serde(rename = "type")]
    kind: Option<String>,
    title: Option<String>,
    description: Option<String>,
    metadata: Option<Map<String, Value>>,
}

impl TryFrom<RawInterpretationResult> for InterpretationResult {
    type Error = String;

    fn try_from(raw: RawInterpretationResult) -> Result<Self, Self::Error> {
        let kind = InterpretationType::parse(raw.kind.as_deref())?;

        let title = raw.title.unwrap_or_default().trim().to_string();
        if title.is_empty() {
            return Err("title must be a non-empty string".to_string());
        }

        Ok(InterpretationResult {
            kind,
            title,
            description: raw.description.filter(|d| !d.trim().is_empty()),
            metadata: raw.metadata.map(InterpretationMetadata::from).unwrap_or_default(),
        })
    }
}

/// `deadline` survives only when it is RFC3339. Non-string tags are dropped.
/// Keys the pipeline does not know about are kept in `extra` and written back
/// alongside the known ones.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(from = "Map<String, Value>")]
pub struct InterpretationMetadata {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub deadline: Option<DateTime<FixedOffset>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub priority: Option<String>,
    pub tags: Vec<String>,
    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

impl From<Map<String, Value>> for InterpretationMetadata {
    fn from(mut raw: Map<String, Value>) -> Self {
        let deadline = match raw.remove("deadline") {
            Some(Value::String(s)) => DateTime::parse_from_rfc3339(&s).ok(),
            _ => None,
        };
        let priority = match raw.remove("priority") {
            Some(Value::String(s)) => Some(s),
            _ => None,
        };
        let tags = match raw.remove("tags") {
            Some(Value::Array(values)) => values
                .into_iter()
                .filter_map(|v| match v {
                    Value::String(s) => Some(s),
                    _ => None,
                })
                .collect(),
            _ => Vec::new(),
        };

        InterpretationMetadata {
            deadline,
            priority,
            tags,
            extra: raw,
        }
    }
}

// ────────────────────────────────────────────────────────────────────────────
// Request / response bodies
// ────────────────────────────────────────────────────────────────────────────

#[derive(Debug, Deserialize)]
pub struct CreateInterpretationRequest {
    pub input_text: String,
}

#[derive(Debug, Serialize)]
pub struct InterpretationResponse {
    #[serde(rename = "type")]
    pub kind: InterpretationType,
    pub interpretation: InterpretationRow,
    pub items: Vec<InterpretationItemRow>,
    pub message: Option<String>,
}

#[derive(Debug, Default, Deserialize)]
pub struct ListParams {
    pub limit: Option<i64>,
    pub offset: Option<i64>,
}

#[derive(Debug, Serialize)]
pub struct InterpretationPage {
    pub interpretations: Vec<InterpretationRow>,
    pub total: i64,
    pub limit: i64,
    pub offset: i64,
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn parse(value: Value) -> Result<InterpretationResult, serde_json::Error> {
        serde_json::from_value(value)
    }

    #[test]
    fn test_missing_type_defaults_to_todo() {
        let result = parse(json!({"title": "Buy milk"})).unwrap();
        assert_eq!(result.kind, InterpretationType::Todo);
        assert_eq!(result.metadata, InterpretationMetadata::default());
    }

    #[test]
    fn test_unknown_type_and_empty_title_are_rejected() {
        assert!(parse(json!({"type": "event", "title": "Party"})).is_err());
        assert!(parse(json!({"type": "todo", "title": "  "})).is_err());
        assert!(parse(json!({"type": "todo"})).is_err());
    }

    #[test]
    fn test_invalid_deadline_is_dropped_without_failing() {
        let result = parse(json!({
            "title": "Pay rent",
            "metadata": {"deadline": "next friday", "priority": "high"}
        }))
        .unwrap();
        assert!(result.metadata.deadline.is_none());
        assert_eq!(result.metadata.priority.as_deref(), Some("high"));
    }

    #[test]
    fn test_non_string_tags_are_dropped_and_unknown_keys_kept() {
        let result = parse(json!({
            "title": "Gym",
            "metadata": {"tags": ["health", 3, null, "routine"], "location": "downtown"}
        }))
        .unwrap();
        assert_eq!(result.metadata.tags, vec!["health", "routine"]);
        assert_eq!(result.metadata.extra["location"], "downtown");
    }

    #[test]
    fn test_result_round_trips_through_json() {
        let input = json!({
            "type": "todo",
            "title": "Buy milk",
            "description": "2 litres",
            "metadata": {
                "deadline": "2030-01-01T09:00:00+09:00",
                "priority": "medium",
                "tags": ["shopping"],
                "store": "corner shop"
            }
        });

        let parsed = parse(input.clone()).unwrap();
        let serialized = serde_json::to_value(&parsed).unwrap();
        assert_eq!(serialized, input);
        assert_eq!(parse(serialized).unwrap(), parsed);
    }
}
