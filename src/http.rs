use crate::appointment_service::AppointmentService;
use crate::auth::{require_user, AuthSecret};
use crate::backend::AppointmentBackend;
use crate::configuration::Configuration;
use crate::error::AppointmentError;
use crate::request::CreateAppointmentRequest;
use crate::types::{Appointment, AppointmentSummary, AuthenticatedUser};
use axum::extract::rejection::{JsonRejection, QueryRejection};
use axum::extract::{Query, State};
use axum::middleware;
use axum::{routing::get, Extension, Json, Router};
use serde::Deserialize;
use serde_json::Value;
use std::sync::Arc;
use tower_http::cors::{Any, CorsLayer};
use tower_http::trace::TraceLayer;
use tracing::debug;

pub struct AppState<B> {
    service: Arc<AppointmentService<B>>,
}

impl<B> Clone for AppState<B> {
    fn clone(&self) -> Self {
        Self {
            service: self.service.clone(),
        }
    }
}

#[derive(Debug, Deserialize)]
struct ListAppointmentsQuery {
    page: Option<i64>,
}

pub fn create_app<B: AppointmentBackend, C: Configuration>(
    backend: B,
    configuration: C,
) -> Router {
    let cors = CorsLayer::new()
        .allow_origin(Any)
        .allow_methods(Any)
        .allow_headers(Any);

    let state = AppState {
        service: Arc::new(AppointmentService::new(backend, configuration.files_url())),
    };
    let secret = AuthSecret(Arc::new(configuration.app_secret()));

    Router::new()
        .route(
            "/appointments",
            get(list_appointments::<B>).post(create_appointment::<B>),
        )
        .route_layer(middleware::from_fn_with_state(secret, require_user))
        .with_state(state)
        .layer(TraceLayer::new_for_http())
        .layer(cors)
}

async fn list_appointments<B: AppointmentBackend>(
    State(state): State<AppState<B>>,
    Extension(user): Extension<AuthenticatedUser>,
    query: Result<Query<ListAppointmentsQuery>, QueryRejection>,
) -> Result<Json<Vec<AppointmentSummary>>, AppointmentError> {
    let Query(query) = query.map_err(|rejection| {
        debug!(%rejection, "Unreadable appointment listing query");
        AppointmentError::validation()
    })?;
    let appointments = state.service.list_appointments(user, query.page)?;
    Ok(Json(appointments))
}

async fn create_appointment<B: AppointmentBackend>(
    State(state): State<AppState<B>>,
    Extension(user): Extension<AuthenticatedUser>,
    payload: Result<Json<Value>, JsonRejection>,
) -> Result<Json<Appointment>, AppointmentError> {
    let Json(body) = payload.map_err(|rejection| {
        debug!(%rejection, "Unreadable appointment request");
        AppointmentError::validation()
    })?;
    let request = CreateAppointmentRequest::from_body(body).ok_or_else(|| {
        debug!("Appointment request is not a JSON object");
        AppointmentError::validation()
    })?;

    let appointment = state.service.create_appointment(user, request)?;
    Ok(Json(appointment))
}
