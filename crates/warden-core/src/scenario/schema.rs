//! JSON Schema validation for scenario files.
//!
//! Scenarios are validated against spec/scenario.schema.json before they are
//! deserialized, so malformed files fail with the schema's messages.

use std::sync::OnceLock;

/// Embedded scenario schema (loaded at compile time).
const SCENARIO_SCHEMA_JSON: &str = include_str!("../../../../spec/scenario.schema.json");

/// Compiled JSON Schema validator (initialized once, reused).
static COMPILED_SCHEMA: OnceLock<Result<jsonschema::Validator, String>> = OnceLock::new();

fn get_validator() -> Result<&'static jsonschema::Validator, String> {
    let result = COMPILED_SCHEMA.get_or_init(|| {
        let schema_value: serde_json::Value = serde_json::from_str(SCENARIO_SCHEMA_JSON)
            .map_err(|e| format!("Invalid schema JSON: {}", e))?;

        jsonschema::options()
            .build(&schema_value)
            .map_err(|e| format!("Failed to compile schema: {}", e))
    });

    result.as_ref().map_err(|e| format!("Failed to load schema: {}", e))
}

/// Validate a scenario document against the schema.
///
/// Returns every violation as `"<message> at <path>"`.
pub fn validate_scenario_schema(scenario_json: &serde_json::Value) -> Result<(), Vec<String>> {
    let validator = get_validator().map_err(|e| vec![e])?;

    let errors: Vec<String> = validator
        .iter_errors(scenario_json)
        .map(|e| format!("{} at {}", e, e.instance_path))
        .collect();

    if errors.is_empty() {
        Ok(())
    } else {
        Err(errors)
    }
}

/// Check whether a scenario document is valid against the schema.
pub fn is_valid_scenario(scenario_json: &serde_json::Value) -> bool {
    get_validator()
        .map(|v| v.is_valid(scenario_json))
        .unwrap_or(false)
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_valid_scenario_passes_schema() {
        let value = json!({
            "id": "cannabis_business",
            "name": "Cannabis Business",
            "questions": {
                "Q1": { "text": "Is income from cannabis?", "next_if_yes": null, "next_if_no": "Q2" },
                "Q2": { "text": "Is the client licensed?", "documents": "Licence" }
            }
        });
        assert!(validate_scenario_schema(&value).is_ok());
        assert!(is_valid_scenario(&value));
    }

    #[test]
    fn test_missing_questions_fails() {
        let value = json!({ "name": "No tree" });
        let errors = validate_scenario_schema(&value).unwrap_err();
        assert!(!errors.is_empty());
    }

    #[test]
    fn test_empty_question_text_fails() {
        let value = json!({
            "name": "Empty",
            "questions": { "Q1": { "text": "" } }
        });
        assert!(!is_valid_scenario(&value));
    }

    #[test]
    fn test_unknown_question_field_fails() {
        let value = json!({
            "name": "Typo",
            "questions": { "Q1": { "text": "Question?", "next_if_yse": "Q2" } }
        });
        let errors = validate_scenario_schema(&value).unwrap_err();
        assert!(errors.iter().any(|e| e.contains("Q1")));
    }

    #[test]
    fn test_additional_top_level_properties_fail() {
        let value = json!({
            "name": "Extra",
            "questions": { "Q1": { "text": "Question?" } },
            "verdict": "HIT"
        });
        assert!(validate_scenario_schema(&value).is_err());
    }
}
