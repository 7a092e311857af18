use chrono::{DateTime, NaiveDate, NaiveDateTime, Utc};
use serde::Deserialize;
use serde_json::Value;
use validator::{Validate, ValidationError};

/// Body of a booking request. Fields stay loosely typed so that a wrong type
/// is reported as a validation failure instead of a decoding failure.
#[derive(Debug, Clone, Default, Deserialize, Validate)]
pub struct CreateAppointmentRequest {
    #[validate(required, custom(function = "validate_provider_id"))]
    pub provider_id: Option<Value>,
    #[validate(required, custom(function = "validate_date"))]
    pub date: Option<Value>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ValidatedRequest {
    pub provider_id: i32,
    pub date: DateTime<Utc>,
}

impl CreateAppointmentRequest {
    /// Reads the request from a decoded body. Only JSON objects qualify.
    pub fn from_body(body: Value) -> Option<Self> {
        match body {
            Value::Object(_) => serde_json::from_value(body).ok(),
            _ => None,
        }
    }

    /// Runs the field checks and returns the typed values.
    pub fn validated(&self) -> Option<ValidatedRequest> {
        self.validate().ok()?;
        Some(ValidatedRequest {
            provider_id: self.provider_id.as_ref().and_then(parse_provider_id)?,
            date: self.date.as_ref().and_then(parse_date)?,
        })
    }
}

pub fn parse_provider_id(value: &Value) -> Option<i32> {
    match value {
        Value::Number(number) => number.as_i64().and_then(|id| i32::try_from(id).ok()),
        Value::String(text) => text.trim().parse().ok(),
        _ => None,
    }
}

/// Accepts RFC 3339 timestamps, naive date-times and plain dates. Values
/// without an offset are read as UTC.
pub fn parse_date(value: &Value) -> Option<DateTime<Utc>> {
    let text = value.as_str()?.trim();

    if let Ok(date) = DateTime::parse_from_rfc3339(text) {
        return Some(date.with_timezone(&Utc));
    }
    for format in ["%Y-%m-%dT%H:%M:%S%.f", "%Y-%m-%dT%H:%M"] {
        if let Ok(date) = NaiveDateTime::parse_from_str(text, format) {
            return Some(date.and_utc());
        }
    }
    NaiveDate::parse_from_str(text, "%Y-%m-%d")
        .ok()
        .and_then(|date| date.and_hms_opt(0, 0, 0))
        .map(|date| date.and_utc())
}

fn validate_provider_id(value: &Value) -> Result<(), ValidationError> {
    match parse_provider_id(value) {
        Some(_) => Ok(()),
        None => Err(ValidationError::new("provider_id")),
    }
}

fn validate_date(value: &Value) -> Result<(), ValidationError> {
    match parse_date(value) {
        Some(_) => Ok(()),
        None => Err(ValidationError::new("date")),
    }
}
