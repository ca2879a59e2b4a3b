// Input validation for event and registration payloads.
//
// The request body is checked against a JSON Schema after its keys have been
// canonicalized, so snake_case and camelCase payloads meet the same rules.
// Every problem found is reported as a `ValidationIssue` so the caller can
// show them all at once. Unknown fields are not checked here; the models
// already pass them through.

use std::sync::OnceLock;

use jsonschema::error::ValidationErrorKind;
use jsonschema::{ValidationError, Validator};
use serde::Serialize;
use serde_json::{json, Value};

use super::registration_models::{
    canonicalize_keys, CustomFieldList, KeyAliases, ADDITIONAL_INFO_KEYS, EVENT_KEYS,
    REGISTRATION_KEYS, TEAM_MEMBER_KEYS,
};

/// Top-level keys of a create or update body.
pub const SUBMISSION_KEYS: KeyAliases = &[("eventData", &["event_data", "event"])];

/// Anchored so the whole value has to look like an address. Not RFC 5322.
const EMAIL_PATTERN: &str = r"^\s*[^@\s]+@[^@\s.]+(\.[^@\s.]+)+\s*$";
const NOT_BLANK_PATTERN: &str = r"\S";

/// One problem with the submitted payload.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ValidationIssue {
    /// Path to the offending field, e.g. `registrations[2].participantEmail`.
    pub field: String,
    pub message: String,
}

impl ValidationIssue {
    pub fn new(field: impl Into<String>, message: impl Into<String>) -> Self {
        Self {
            field: field.into(),
            message: message.into(),
        }
    }
}

fn submission_schema() -> Value {
    let text = json!({"type": ["string", "number", "boolean", "null"]});
    let required_text = json!({"type": ["string", "number"], "pattern": NOT_BLANK_PATTERN});

    let team_member = json!({
        "type": "object",
        "properties": {
            "name": text, "email": text, "phone": text, "studentId": text,
            "department": text, "year": text, "role": text
        }
    });

    let registration = json!({
        "type": "object",
        "required": ["participantName", "participantEmail"],
        "properties": {
            "participantName": required_text,
            "participantEmail": {"type": "string", "pattern": EMAIL_PATTERN},
            "phone": text, "studentId": text, "department": text, "year": text,
            "registrationType": text, "status": text, "createdAt": text,
            "attendanceStatus": text, "attendanceTimestamp": text,
            "paymentStatus": text, "paymentAmount": text, "paymentScreenshotUrl": text,
            "additionalInfo": {
                "type": ["object", "null"],
                "properties": {
                    "department": text, "year": text, "teamName": text,
                    "teamMembers": {"type": ["array", "null"], "items": team_member},
                    "customFieldValues": {"type": ["object", "null"]}
                }
            }
        }
    });

    json!({
        "$schema": "https://json-schema.org/draft/2020-12/schema",
        "type": "object",
        "required": ["eventData", "registrations"],
        "properties": {
            "eventData": {
                "type": "object",
                "required": ["id", "title"],
                "properties": {
                    "id": required_text,
                    "title": required_text,
                    "paymentAmount": text
                }
            },
            "registrations": {"type": "array", "items": registration}
        }
    })
}

fn validator() -> Result<&'static Validator, &'static str> {
    static VALIDATOR: OnceLock<Result<Validator, String>> = OnceLock::new();
    VALIDATOR
        .get_or_init(|| {
            jsonschema::validator_for(&submission_schema()).map_err(|e| e.to_string())
        })
        .as_ref()
        .map_err(String::as_str)
}

/// Applies the same key canonicalization the models use, at every level the
/// schema inspects.
fn canonical_submission(body: &Value) -> Value {
    let mut body = body.clone();
    canonicalize_keys(&mut body, SUBMISSION_KEYS);

    if let Some(event) = body.get_mut("eventData") {
        canonicalize_keys(event, EVENT_KEYS);
    }

    let registrations = body.get_mut("registrations").and_then(Value::as_array_mut);
    for registration in registrations.into_iter().flatten() {
        canonicalize_keys(registration, REGISTRATION_KEYS);
        let Some(info) = registration.get_mut("additionalInfo") else {
            continue;
        };
        canonicalize_keys(info, ADDITIONAL_INFO_KEYS);
        if let Some(members) = info.get_mut("teamMembers").and_then(Value::as_array_mut) {
            for member in members {
                canonicalize_keys(member, TEAM_MEMBER_KEYS);
            }
        }
    }

    body
}

/// `/registrations/0/participantEmail` becomes `registrations[0].participantEmail`.
fn field_path(pointer: &str) -> String {
    let mut path = String::new();
    for segment in pointer.split('/').skip(1) {
        let segment = segment.replace("~1", "/").replace("~0", "~");
        if segment.parse::<usize>().is_ok() {
            path.push_str(&format!("[{segment}]"));
        } else {
            if !path.is_empty() {
                path.push('.');
            }
            path.push_str(&segment);
        }
    }
    path
}

fn join_path(parent: &str, child: &str) -> String {
    if parent.is_empty() {
        child.to_string()
    } else {
        format!("{parent}.{child}")
    }
}

fn to_issue(error: &ValidationError<'_>) -> ValidationIssue {
    let field = field_path(&error.instance_path.to_string());

    match &error.kind {
        ValidationErrorKind::Required { property } => {
            let name = property
                .as_str()
                .map(str::to_string)
                .unwrap_or_else(|| property.to_string());
            ValidationIssue::new(join_path(&field, &name), format!("{name} is required"))
        }
        ValidationErrorKind::Pattern { pattern } if pattern == EMAIL_PATTERN => {
            let value = error.instance.as_str().unwrap_or_default().trim().to_string();
            ValidationIssue::new(field, format!("'{value}' is not a valid email address"))
        }
        ValidationErrorKind::Pattern { .. } => {
            let message = format!("{field} must not be blank");
            ValidationIssue::new(field, message)
        }
        _ => ValidationIssue::new(field, error.to_string()),
    }
}

/// Full payload check run at the HTTP boundary against the raw request body.
pub fn validate_submission(body: &Value) -> Result<(), Vec<ValidationIssue>> {
    let validator = match validator() {
        Ok(validator) => validator,
        Err(e) => {
            tracing::error!("Submission schema failed to compile: {}", e);
            return Err(vec![ValidationIssue::new("", "Payload schema is unavailable")]);
        }
    };

    let issues: Vec<ValidationIssue> = validator
        .iter_errors(&canonical_submission(body))
        .map(|e| to_issue(&e))
        .collect();

    if issues.is_empty() {
        Ok(())
    } else {
        Err(issues)
    }
}

/// Strict check used before creating a spreadsheet: every custom field
/// definition must carry an id and a label.
pub fn validate_custom_fields(fields: &CustomFieldList) -> Vec<ValidationIssue> {
    if !fields.was_list() {
        return vec![ValidationIssue::new(
            "eventData.customFields",
            "Custom fields must be a list",
        )];
    }

    fields
        .invalid()
        .map(|bad| {
            ValidationIssue::new(
                format!("eventData.customFields[{}]", bad.position),
                format!("Invalid custom field definition: {}", bad.reason),
            )
        })
        .collect()
}
