use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use diesel::result::DatabaseErrorKind;
use serde_json::json;
use thiserror::Error;
use tracing::error;

pub const VALIDATION_FAILED: &str = "data validation error";
pub const NOT_A_PROVIDER: &str = "you can only schedule appointments with providers";
pub const PAST_DATE: &str = "past dates are not allowed";
pub const SLOT_UNAVAILABLE: &str = "scheduling time unavailable";

/// Failures of the storage layer.
#[derive(Error, Debug)]
pub enum BackendError {
    #[error("Database connection failed: {0}")]
    Connection(#[from] diesel::ConnectionError),

    #[error("Database query failed: {0}")]
    Query(diesel::result::Error),

    #[error("Storage lock poisoned")]
    LockPoisoned,

    /// The provider already has an active appointment at that hour.
    #[error("Slot already taken")]
    SlotTaken,
}

impl From<diesel::result::Error> for BackendError {
    fn from(err: diesel::result::Error) -> Self {
        match err {
            diesel::result::Error::DatabaseError(DatabaseErrorKind::UniqueViolation, _) => {
                BackendError::SlotTaken
            }
            err => BackendError::Query(err),
        }
    }
}

#[derive(Error, Debug)]
pub enum AppointmentError {
    #[error("{0}")]
    Validation(String),

    #[error("{0}")]
    Authorization(String),

    #[error("{0}")]
    Conflict(String),

    #[error("Backend error: {0}")]
    Backend(BackendError),
}

impl AppointmentError {
    pub fn validation() -> Self {
        AppointmentError::Validation(VALIDATION_FAILED.into())
    }
}

impl From<BackendError> for AppointmentError {
    fn from(err: BackendError) -> Self {
        match err {
            BackendError::SlotTaken => AppointmentError::Conflict(SLOT_UNAVAILABLE.into()),
            err => AppointmentError::Backend(err),
        }
    }
}

impl IntoResponse for AppointmentError {
    fn into_response(self) -> Response {
        let (status, message) = match self {
            AppointmentError::Validation(msg) => (StatusCode::BAD_REQUEST, msg),
            AppointmentError::Authorization(msg) => (StatusCode::UNAUTHORIZED, msg),
            AppointmentError::Conflict(msg) => (StatusCode::BAD_REQUEST, msg),
            AppointmentError::Backend(err) => {
                error!(?err, "Request failed in storage backend");
                (
                    StatusCode::INTERNAL_SERVER_ERROR,
                    "internal server error".to_string(),
                )
            }
        };

        (status, Json(json!({ "error": message }))).into_response()
    }
}

#[cfg(test)]
mod test {
    use super::*;

    #[test]
    fn slot_taken_becomes_conflict() {
        let err = AppointmentError::from(BackendError::SlotTaken);
        assert!(matches!(err, AppointmentError::Conflict(msg) if msg == SLOT_UNAVAILABLE));
    }

    #[test]
    fn unique_violation_becomes_slot_taken() {
        let err = diesel::result::Error::DatabaseError(
            DatabaseErrorKind::UniqueViolation,
            Box::new(String::from("duplicate key value violates unique constraint")),
        );
        assert!(matches!(BackendError::from(err), BackendError::SlotTaken));
    }

    #[test]
    fn status_codes() {
        let response = AppointmentError::validation().into_response();
        assert_eq!(response.status(), StatusCode::BAD_REQUEST);

        let response = AppointmentError::Authorization(NOT_A_PROVIDER.into()).into_response();
        assert_eq!(response.status(), StatusCode::UNAUTHORIZED);

        let response = AppointmentError::Conflict(SLOT_UNAVAILABLE.into()).into_response();
        assert_eq!(response.status(), StatusCode::BAD_REQUEST);

        let response = AppointmentError::Backend(BackendError::LockPoisoned).into_response();
        assert_eq!(response.status(), StatusCode::INTERNAL_SERVER_ERROR);
    }
}
