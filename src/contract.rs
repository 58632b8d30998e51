use crate::errors::{ApiError, ApiResult, FieldError};
use crate::models::{
    CreateIncidentPayload, CreateSeasonPayload, CreateTaskPayload, IncidentStatusPayload,
    SeasonStatusPayload, TaskStatusPayload, UpdateIncidentPayload, UpdateSeasonPayload,
    UpdateTaskPayload,
};
use chrono::NaiveDate;
use once_cell::sync::Lazy;
use serde_json::{json, Value};

const DATE_PATTERN: &str = "^\\d{4}-\\d{2}-\\d{2}$";

static SEASON_CREATE_SCHEMA: Lazy<Value> = Lazy::new(|| {
    json!({
        "type": "object",
        "additionalProperties": false,
        "required": ["plotId", "name", "startDate"],
        "properties": {
            "plotId": { "type": "integer", "minimum": 1 },
            "name": { "type": "string", "minLength": 1 },
            "cropName": { "type": ["string", "null"] },
            "startDate": { "type": "string", "pattern": DATE_PATTERN },
            "endDate": { "type": ["string", "null"], "pattern": DATE_PATTERN },
            "notes": { "type": ["string", "null"] }
        }
    })
});

static SEASON_UPDATE_SCHEMA: Lazy<Value> = Lazy::new(|| {
    json!({
        "type": "object",
        "additionalProperties": false,
        "properties": {
            "name": { "type": "string", "minLength": 1 },
            "cropName": { "type": ["string", "null"] },
            "startDate": { "type": ["string", "null"], "pattern": DATE_PATTERN },
            "endDate": { "type": ["string", "null"], "pattern": DATE_PATTERN },
            "notes": { "type": ["string", "null"] }
        }
    })
});

static SEASON_STATUS_SCHEMA: Lazy<Value> = Lazy::new(|| {
    json!({
        "type": "object",
        "additionalProperties": false,
        "required": ["status"],
        "properties": {
            "status": { "enum": ["PLANNED", "ACTIVE", "COMPLETED", "CANCELLED", "ARCHIVED"] },
            "actualStartDate": { "type": ["string", "null"], "pattern": DATE_PATTERN },
            "actualEndDate": { "type": ["string", "null"], "pattern": DATE_PATTERN }
        }
    })
});

static TASK_CREATE_SCHEMA: Lazy<Value> = Lazy::new(|| {
    json!({
        "type": "object",
        "additionalProperties": false,
        "required": ["title"],
        "properties": {
            "seasonId": { "type": ["integer", "null"], "minimum": 1 },
            "title": { "type": "string", "minLength": 1 },
            "notes": { "type": ["string", "null"] },
            "dueDate": { "type": ["string", "null"], "pattern": DATE_PATTERN },
            "estimatedHours": { "type": ["number", "null"], "minimum": 0 }
        }
    })
});

static TASK_UPDATE_SCHEMA: Lazy<Value> = Lazy::new(|| {
    json!({
        "type": "object",
        "additionalProperties": false,
        "properties": {
            "title": { "type": "string", "minLength": 1 },
            "notes": { "type": ["string", "null"] },
            "dueDate": { "type": ["string", "null"], "pattern": DATE_PATTERN },
            "estimatedHours": { "type": ["number", "null"], "minimum": 0 }
        }
    })
});

static TASK_STATUS_SCHEMA: Lazy<Value> = Lazy::new(|| {
    json!({
        "type": "object",
        "additionalProperties": false,
        "required": ["status"],
        "properties": {
            "status": { "enum": ["PENDING", "IN_PROGRESS", "DONE", "OVERDUE", "CANCELLED"] },
            "actualStartDate": { "type": ["string", "null"], "pattern": DATE_PATTERN },
            "actualEndDate": { "type": ["string", "null"], "pattern": DATE_PATTERN }
        }
    })
});

static INCIDENT_CREATE_SCHEMA: Lazy<Value> = Lazy::new(|| {
    json!({
        "type": "object",
        "additionalProperties": false,
        "required": ["seasonId", "title", "severity", "occurredOn"],
        "properties": {
            "seasonId": { "type": "integer", "minimum": 1 },
            "title": { "type": "string", "minLength": 1 },
            "description": { "type": ["string", "null"] },
            "severity": { "enum": ["LOW", "MEDIUM", "HIGH", "CRITICAL"] },
            "occurredOn": { "type": "string", "pattern": DATE_PATTERN },
            "affectedArea": { "type": ["number", "null"], "minimum": 0 }
        }
    })
});

static INCIDENT_UPDATE_SCHEMA: Lazy<Value> = Lazy::new(|| {
    json!({
        "type": "object",
        "additionalProperties": false,
        "properties": {
            "title": { "type": "string", "minLength": 1 },
            "description": { "type": ["string", "null"] },
            "severity": { "enum": ["LOW", "MEDIUM", "HIGH", "CRITICAL"] },
            "occurredOn": { "type": ["string", "null"], "pattern": DATE_PATTERN },
            "affectedArea": { "type": ["number", "null"], "minimum": 0 }
        }
    })
});

static INCIDENT_STATUS_SCHEMA: Lazy<Value> = Lazy::new(|| {
    json!({
        "type": "object",
        "additionalProperties": false,
        "required": ["status"],
        "properties": {
            "status": { "enum": ["OPEN", "INVESTIGATING", "RESOLVED", "DISMISSED"] },
            "resolutionNotes": { "type": ["string", "null"] }
        }
    })
});

pub fn validate_season_create(payload: &Value) -> ApiResult<CreateSeasonPayload> {
    validate_against(&SEASON_CREATE_SCHEMA, payload, &["startDate", "endDate"])
}

pub fn validate_season_update(payload: &Value) -> ApiResult<UpdateSeasonPayload> {
    validate_against(&SEASON_UPDATE_SCHEMA, payload, &["startDate", "endDate"])
}

pub fn validate_season_status(payload: &Value) -> ApiResult<SeasonStatusPayload> {
    validate_against(
        &SEASON_STATUS_SCHEMA,
        payload,
        &["actualStartDate", "actualEndDate"],
    )
}

pub fn validate_task_create(payload: &Value) -> ApiResult<CreateTaskPayload> {
    validate_against(&TASK_CREATE_SCHEMA, payload, &["dueDate"])
}

pub fn validate_task_update(payload: &Value) -> ApiResult<UpdateTaskPayload> {
    validate_against(&TASK_UPDATE_SCHEMA, payload, &["dueDate"])
}

pub fn validate_task_status(payload: &Value) -> ApiResult<TaskStatusPayload> {
    validate_against(
        &TASK_STATUS_SCHEMA,
        payload,
        &["actualStartDate", "actualEndDate"],
    )
}

pub fn validate_incident_create(payload: &Value) -> ApiResult<CreateIncidentPayload> {
    validate_against(&INCIDENT_CREATE_SCHEMA, payload, &["occurredOn"])
}

pub fn validate_incident_update(payload: &Value) -> ApiResult<UpdateIncidentPayload> {
    validate_against(&INCIDENT_UPDATE_SCHEMA, payload, &["occurredOn"])
}

pub fn validate_incident_status(payload: &Value) -> ApiResult<IncidentStatusPayload> {
    validate_against(&INCIDENT_STATUS_SCHEMA, payload, &[])
}

fn validate_against<T: serde::de::DeserializeOwned>(
    schema: &Value,
    payload: &Value,
    date_fields: &[&str],
) -> ApiResult<T> {
    let normalized = normalize_dates(payload, date_fields);

    let compiled = jsonschema::JSONSchema::compile(schema)
        .map_err(|error| ApiError::Decode(format!("payload schema failed to compile: {}", error)))?;

    let errors: Vec<FieldError> = compiled
        .validate(&normalized)
        .err()
        .map(|errors| {
            errors
                .map(|error| {
                    let path = error.instance_path.to_string();
                    let field = if path.is_empty() {
                        "payload".to_string()
                    } else {
                        path.trim_start_matches('/').replace('/', ".")
                    };
                    FieldError::new(field, error.to_string())
                })
                .collect::<Vec<_>>()
        })
        .unwrap_or_default();

    if !errors.is_empty() {
        return Err(ApiError::validation(errors));
    }

    serde_json::from_value(normalized).map_err(ApiError::from)
}

fn normalize_dates(payload: &Value, fields: &[&str]) -> Value {
    let mut normalized = payload.clone();
    let Value::Object(map) = &mut normalized else {
        return normalized;
    };
    for field in fields {
        let Some(Value::String(raw)) = map.get(*field) else {
            continue;
        };
        if let Some(date) = truncate_to_date(raw) {
            map.insert((*field).to_string(), Value::String(date));
        }
    }
    normalized
}

fn truncate_to_date(raw: &str) -> Option<String> {
    let prefix = raw.get(0..10)?;
    let rest = raw.get(10..)?;
    if rest.is_empty() || !(rest.starts_with('T') || rest.starts_with(' ')) {
        return None;
    }
    NaiveDate::parse_from_str(prefix, "%Y-%m-%d")
        .ok()
        .map(|date| date.to_string())
}

#[cfg(test)]
mod tests {
    use super::{validate_task_create, validate_task_status, validate_task_update};
    use crate::errors::ApiError;
    use chrono::NaiveDate;
    use serde_json::json;

    #[test]
    fn reports_every_offending_field_not_just_the_first() {
        let payload = json!({
            "estimatedHours": -2,
            "dueDate": "not-a-date"
        });
        let error = validate_task_create(&payload).expect_err("payload is invalid");
        let ApiError::Validation(failure) = error else {
            panic!("expected validation failure, got {error:?}");
        };
        let fields: Vec<&str> = failure
            .errors
            .iter()
            .map(|entry| entry.field.as_str())
            .collect();
        assert!(fields.contains(&"estimatedHours"), "fields: {fields:?}");
        assert!(fields.contains(&"dueDate"), "fields: {fields:?}");
        // missing required title is reported at the payload root
        assert!(fields.contains(&"payload"), "fields: {fields:?}");
    }

    #[test]
    fn unknown_status_enum_value_is_rejected() {
        let payload = json!({ "status": "PAUSED" });
        assert!(matches!(
            validate_task_status(&payload),
            Err(ApiError::Validation(_))
        ));
    }

    #[test]
    fn unknown_top_level_field_is_rejected() {
        let payload = json!({ "title": "Weed rows", "priority": 3 });
        assert!(matches!(
            validate_task_create(&payload),
            Err(ApiError::Validation(_))
        ));
    }

    #[test]
    fn timestamp_is_truncated_to_its_date_component() {
        let payload = json!({
            "title": "Irrigate",
            "dueDate": "2025-04-01T10:30:00Z"
        });
        let validated = validate_task_create(&payload).expect("payload normalizes");
        assert_eq!(
            validated.due_date,
            Some(NaiveDate::from_ymd_opt(2025, 4, 1).expect("valid date"))
        );
    }

    #[test]
    fn empty_update_payload_is_valid() {
        let validated = validate_task_update(&json!({})).expect("empty update is a no-op");
        assert_eq!(validated, crate::models::UpdateTaskPayload::default());
    }

    #[test]
    fn negative_area_is_rejected_where_physically_meaningless() {
        let payload = json!({
            "seasonId": 3,
            "title": "Hail damage",
            "severity": "HIGH",
            "occurredOn": "2025-05-10",
            "affectedArea": -0.5
        });
        assert!(matches!(
            super::validate_incident_create(&payload),
            Err(ApiError::Validation(_))
        ));
    }
}
