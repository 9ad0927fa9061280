//! Pure validators for identifiers, model strings, inheritance modes and the
//! registry document shape.

use std::collections::HashSet;

use once_cell::sync::Lazy;
use regex::Regex;

use crate::error::ValidationError;
use crate::types::{InheritanceMode, Registry};

static UUID_V4: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"(?i)^[0-9a-f]{8}-[0-9a-f]{4}-4[0-9a-f]{3}-[89ab][0-9a-f]{3}-[0-9a-f]{12}$")
        .expect("uuid pattern compiles")
});

static MODEL_SHAPE: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"^[A-Za-z0-9][A-Za-z0-9_.-]*,[A-Za-z0-9][A-Za-z0-9_.:/@+-]*$")
        .expect("model pattern compiles")
});

/// Substrings that never appear in a provider or model name but routinely
/// appear when someone pastes a credential.
const SECRET_MARKERS: &[&str] = &[
    "api_key",
    "apikey",
    "api-key",
    "secret",
    "password",
    "passwd",
    "token",
    "bearer",
    "private_key",
    "credential",
];

/// Vendor key prefixes, anchored at a word boundary.
static CREDENTIAL_PREFIXES: Lazy<Vec<(&'static str, Regex)>> = Lazy::new(|| {
    [
        ("sk-ant-", r"\bsk-ant-[A-Za-z0-9_-]+"),
        ("sk-", r"\bsk-[A-Za-z0-9_-]{3,}"),
        ("AIza", r"\bAIza[0-9A-Za-z_-]{10,}"),
        ("ghp_", r"\bgh[pousr]_[A-Za-z0-9]{10,}"),
        ("github_pat_", r"\bgithub_pat_[A-Za-z0-9_]{10,}"),
        ("xox?-", r"\bxox[abprs]-[A-Za-z0-9-]+"),
        ("AKIA", r"\bAKIA[0-9A-Z]{16}\b"),
        ("hf_", r"\bhf_[A-Za-z0-9]{10,}"),
        ("gsk_", r"\bgsk_[A-Za-z0-9]{10,}"),
    ]
    .into_iter()
    .map(|(label, pattern)| (label, Regex::new(pattern).expect("credential pattern compiles")))
    .collect()
});

const MAX_MODEL_LEN: usize = 256;

/// Strict v4 UUID check, case-insensitive.
pub fn is_valid_id(value: &str) -> bool {
    UUID_V4.is_match(value)
}

pub fn validate_id(value: &str) -> Result<(), ValidationError> {
    if is_valid_id(value) {
        Ok(())
    } else {
        Err(ValidationError::InvalidId {
            value: value.to_string(),
        })
    }
}

/// Returns the label of the first credential pattern `value` matches.
pub fn detect_secret(value: &str) -> Option<&'static str> {
    let lower = value.to_ascii_lowercase();
    if let Some(marker) = SECRET_MARKERS.iter().find(|m| lower.contains(**m)) {
        return Some(*marker);
    }
    CREDENTIAL_PREFIXES
        .iter()
        .find(|(_, re)| re.is_match(value))
        .map(|(label, _)| *label)
}

/// Validate a `provider,model` routing string.
///
/// Secret detection runs first so that a pasted key is reported as such even
/// when it also happens to be malformed.
pub fn validate_model(value: &str) -> Result<(), ValidationError> {
    if let Some(pattern) = detect_secret(value) {
        return Err(ValidationError::SecretDetected {
            pattern: pattern.to_string(),
        });
    }
    if value.len() > MAX_MODEL_LEN || !MODEL_SHAPE.is_match(value) {
        return Err(ValidationError::InvalidModel {
            value: value.to_string(),
        });
    }
    Ok(())
}

pub fn parse_inheritance_mode(value: Option<&str>) -> Result<Option<InheritanceMode>, ValidationError> {
    value.map(str::parse::<InheritanceMode>).transpose()
}

/// Shape check on a raw document: a top-level object with a `projects`
/// object. Extra members are allowed.
pub fn validate_document_shape(doc: &serde_json::Value) -> Result<(), String> {
    let Some(obj) = doc.as_object() else {
        return Err("top level is not an object".to_string());
    };
    match obj.get("projects") {
        Some(serde_json::Value::Object(_)) => Ok(()),
        None => Err("missing `projects`".to_string()),
        Some(serde_json::Value::Null) => Err("`projects` is null".to_string()),
        Some(serde_json::Value::Array(_)) => Err("`projects` is an array".to_string()),
        Some(_) => Err("`projects` is not an object".to_string()),
    }
}

/// Full invariant check on a typed registry, run before every save.
///
/// Checks map keys against project ids, identifier formats, per-project
/// identifier uniqueness, and every stored model string.
pub fn validate_registry(registry: &Registry) -> Result<(), ValidationError> {
    for (key, project) in &registry.projects {
        validate_id(&key.0)?;
        if key != &project.id {
            return Err(ValidationError::InvalidId {
                value: format!("{} (stored under key {})", project.id, key),
            });
        }

        let mut seen = HashSet::new();
        for agent in &project.agents {
            validate_id(&agent.id.0)?;
            if !seen.insert(agent.id.0.to_ascii_lowercase()) {
                return Err(ValidationError::DuplicateId {
                    project: project.id.0.clone(),
                    kind: "agent",
                    id: agent.id.0.clone(),
                });
            }
            if let Some(model) = &agent.model {
                validate_model(model)?;
            }
        }

        let mut seen = HashSet::new();
        for workflow in &project.workflows {
            validate_id(&workflow.id.0)?;
            if !seen.insert(workflow.id.0.to_ascii_lowercase()) {
                return Err(ValidationError::DuplicateId {
                    project: project.id.0.clone(),
                    kind: "workflow",
                    id: workflow.id.0.clone(),
                });
            }
            if let Some(model) = &workflow.model {
                validate_model(model)?;
            }
        }
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use rstest::rstest;

    #[rstest]
    #[case("6f1f2a4e-8d3b-4c6a-9e2f-1a2b3c4d5e6f", true)]
    #[case("6F1F2A4E-8D3B-4C6A-9E2F-1A2B3C4D5E6F", true)]
    #[case("6f1f2a4e-8d3b-1c6a-9e2f-1a2b3c4d5e6f", false)]
    #[case("6f1f2a4e-8d3b-4c6a-7e2f-1a2b3c4d5e6f", false)]
    #[case("6f1f2a4e8d3b4c6a9e2f1a2b3c4d5e6f", false)]
    #[case("", false)]
    #[case(" 6f1f2a4e-8d3b-4c6a-9e2f-1a2b3c4d5e6f", false)]
    fn uuid_v4_format(#[case] value: &str, #[case] ok: bool) {
        assert_eq!(is_valid_id(value), ok, "{value}");
    }

    #[test]
    fn generated_ids_validate() {
        for _ in 0..32 {
            assert!(is_valid_id(&uuid::Uuid::new_v4().to_string()));
        }
    }

    #[rstest]
    #[case("openrouter,anthropic/claude-sonnet-4")]
    #[case("deepseek,deepseek-chat")]
    #[case("ollama,qwen2.5-coder:latest")]
    #[case("gemini,gemini-2.5-pro")]
    fn accepts_routing_strings(#[case] model: &str) {
        validate_model(model).expect("valid model");
    }

    #[rstest]
    #[case("gpt-4o")]
    #[case(",gpt-4o")]
    #[case("openai,")]
    #[case("openai,gpt 4o")]
    #[case("a,b,c")]
    fn rejects_malformed(#[case] model: &str) {
        assert!(matches!(
            validate_model(model),
            Err(ValidationError::InvalidModel { .. })
        ));
    }

    #[rstest]
    #[case("sk-test-abc123,gpt-4o")]
    #[case("openai,sk-proj-abcdef")]
    #[case("anthropic,sk-ant-api03-xyz")]
    #[case("google,AIzaSyA1234567890abcdef")]
    #[case("openai,my_api_key")]
    #[case("provider,SECRET-model")]
    #[case("github,ghp_abcdefghijklmnop")]
    fn rejects_credentials(#[case] model: &str) {
        assert!(matches!(
            validate_model(model),
            Err(ValidationError::SecretDetected { .. })
        ));
    }

    #[test]
    fn secret_error_does_not_echo_value() {
        let err = validate_model("sk-test-abc123,gpt-4o").unwrap_err();
        assert!(!err.to_string().contains("abc123"));
    }

    #[test]
    fn task_like_names_are_not_credentials() {
        validate_model("openai,task-model").expect("`task-` is not an `sk-` prefix");
    }

    #[test]
    fn inheritance_mode_optional() {
        assert_eq!(parse_inheritance_mode(None).unwrap(), None);
        assert_eq!(
            parse_inheritance_mode(Some("inherit")).unwrap(),
            Some(InheritanceMode::Inherit)
        );
        assert!(parse_inheritance_mode(Some("always")).is_err());
    }

    #[rstest]
    #[case(r#"{"projects":{}}"#, true)]
    #[case(r#"{"schemaVersion":"1.0.0","projects":{},"future":true}"#, true)]
    #[case(r#"{}"#, false)]
    #[case(r#"{"schemaVersion":"1.0.0"}"#, false)]
    #[case(r#"{"projects":[]}"#, false)]
    #[case(r#"{"projects":null}"#, false)]
    #[case(r#"{"projects":"x"}"#, false)]
    #[case(r#"[]"#, false)]
    fn document_shape(#[case] json: &str, #[case] ok: bool) {
        let doc: serde_json::Value = serde_json::from_str(json).unwrap();
        assert_eq!(validate_document_shape(&doc).is_ok(), ok, "{json}");
    }
}
