//! # API REST
//!
//! REST API implementation for carelog.
//!
//! Handles:
//! - HTTP endpoints with axum
//! - OpenAPI/Swagger documentation
//! - REST-specific concerns (JSON serialization, status mapping)
//!
//! All record semantics live in `carelog-core`; this crate only maps
//! requests onto the stores and store errors onto status codes.

#![warn(rust_2018_idioms)]

pub mod error;

use axum::extract::{Path, Query, State};
use axum::http::StatusCode;
use axum::response::Json;
use axum::routing::get;
use axum::Router;
use serde::Serialize;
use utoipa::{OpenApi, ToSchema};

use carelog_core::{
    Database, NewPatient, NewVisit, Patient, PatientListQuery, PatientPage, PatientService,
    PatientStats, PatientUpdate, Visit, VisitListQuery, VisitPage, VisitService, VisitStats,
    VisitUpdate, VisitWithPatient,
};
use carelog_types::RecordId;

pub use error::{ApiError, ErrorBody};

/// Application state shared across REST API handlers.
#[derive(Clone)]
pub struct AppState {
    pub patients: PatientService,
    pub visits: VisitService,
}

impl AppState {
    /// Wires both services over one shared store handle.
    pub fn new(db: Database) -> Self {
        let patients = PatientService::new(db.clone());
        let visits = VisitService::new(db, patients.clone());
        Self { patients, visits }
    }
}

/// Health check response.
#[derive(Serialize, ToSchema)]
pub struct HealthRes {
    pub ok: bool,
    pub message: String,
}

/// Confirmation body for delete endpoints.
#[derive(Serialize, ToSchema)]
pub struct MessageRes {
    pub message: String,
}

#[derive(OpenApi)]
#[openapi(
    paths(
        health,
        create_patient,
        list_patients,
        get_patient,
        update_patient,
        delete_patient,
        patient_stats,
        create_visit,
        list_patient_visits,
        patient_visit_stats,
        list_visits,
        get_visit,
        update_visit,
        delete_visit,
    ),
    components(schemas(
        HealthRes,
        MessageRes,
        ErrorBody,
        Patient,
        NewPatient,
        PatientUpdate,
        PatientStats,
        Visit,
        NewVisit,
        VisitUpdate,
        VisitWithPatient,
        VisitStats,
        carelog_core::PatientSummary,
        carelog_core::VisitTypeCounts,
        carelog_core::VisitType,
        carelog_core::SortOrder,
        carelog_core::VisitSortField,
        PatientPage,
        VisitPage,
    ))
)]
pub struct ApiDoc;

/// Builds the application router over the given state.
pub fn router(state: AppState) -> Router {
    Router::new()
        .route("/health", get(health))
        .route("/patients", get(list_patients).post(create_patient))
        .route(
            "/patients/:id",
            get(get_patient).put(update_patient).delete(delete_patient),
        )
        .route("/patients/:id/stats", get(patient_stats))
        .route(
            "/patients/:id/visits",
            get(list_patient_visits).post(create_visit),
        )
        .route("/patients/:id/visits/stats", get(patient_visit_stats))
        .route("/visits", get(list_visits))
        .route(
            "/visits/:id",
            get(get_visit).put(update_visit).delete(delete_visit),
        )
        .with_state(state)
}

fn parse_id(raw: &str) -> Result<RecordId, ApiError> {
    RecordId::parse(raw).map_err(|_| ApiError::bad_request(format!("invalid id: {raw}")))
}

#[utoipa::path(
    get,
    path = "/health",
    responses(
        (status = 200, description = "Health check response", body = HealthRes)
    )
)]
async fn health() -> Json<HealthRes> {
    Json(HealthRes {
        ok: true,
        message: "carelog is alive".into(),
    })
}

#[utoipa::path(
    post,
    path = "/patients",
    request_body = NewPatient,
    responses(
        (status = 201, description = "Patient created", body = Patient),
        (status = 409, description = "Email already exists", body = ErrorBody),
        (status = 400, description = "Invalid input", body = ErrorBody)
    )
)]
async fn create_patient(
    State(state): State<AppState>,
    Json(req): Json<NewPatient>,
) -> Result<(StatusCode, Json<Patient>), ApiError> {
    let patient = state.patients.create(req).await?;
    Ok((StatusCode::CREATED, Json(patient)))
}

#[utoipa::path(
    get,
    path = "/patients",
    params(PatientListQuery),
    responses(
        (status = 200, description = "Paginated patient list", body = PatientPage),
        (status = 400, description = "Invalid paging parameters", body = ErrorBody)
    )
)]
async fn list_patients(
    State(state): State<AppState>,
    Query(query): Query<PatientListQuery>,
) -> Result<Json<PatientPage>, ApiError> {
    Ok(Json(state.patients.list(query).await?))
}

#[utoipa::path(
    get,
    path = "/patients/{id}",
    params(("id" = String, Path, description = "Patient id")),
    responses(
        (status = 200, description = "Patient details", body = Patient),
        (status = 404, description = "Patient not found", body = ErrorBody)
    )
)]
async fn get_patient(
    State(state): State<AppState>,
    Path(id): Path<String>,
) -> Result<Json<Patient>, ApiError> {
    let id = parse_id(&id)?;
    Ok(Json(state.patients.get(id).await?))
}

#[utoipa::path(
    put,
    path = "/patients/{id}",
    params(("id" = String, Path, description = "Patient id")),
    request_body = PatientUpdate,
    responses(
        (status = 200, description = "Patient updated", body = Patient),
        (status = 404, description = "Patient not found", body = ErrorBody),
        (status = 409, description = "Email already exists", body = ErrorBody)
    )
)]
async fn update_patient(
    State(state): State<AppState>,
    Path(id): Path<String>,
    Json(req): Json<PatientUpdate>,
) -> Result<Json<Patient>, ApiError> {
    let id = parse_id(&id)?;
    Ok(Json(state.patients.update(id, req).await?))
}

#[utoipa::path(
    delete,
    path = "/patients/{id}",
    params(("id" = String, Path, description = "Patient id")),
    responses(
        (status = 200, description = "Patient and all its visits deleted", body = MessageRes),
        (status = 404, description = "Patient not found", body = ErrorBody)
    )
)]
async fn delete_patient(
    State(state): State<AppState>,
    Path(id): Path<String>,
) -> Result<Json<MessageRes>, ApiError> {
    let id = parse_id(&id)?;
    state.patients.delete(id).await?;
    Ok(Json(MessageRes {
        message: "Patient Deleted".into(),
    }))
}

#[utoipa::path(
    get,
    path = "/patients/{id}/stats",
    params(("id" = String, Path, description = "Patient id")),
    responses(
        (status = 200, description = "Patient with visit-count breakdown", body = PatientStats),
        (status = 404, description = "Patient not found", body = ErrorBody)
    )
)]
async fn patient_stats(
    State(state): State<AppState>,
    Path(id): Path<String>,
) -> Result<Json<PatientStats>, ApiError> {
    let id = parse_id(&id)?;
    Ok(Json(state.patients.stats(id).await?))
}

#[utoipa::path(
    post,
    path = "/patients/{id}/visits",
    params(("id" = String, Path, description = "Patient id")),
    request_body = NewVisit,
    responses(
        (status = 201, description = "Visit created", body = Visit),
        (status = 404, description = "Patient not found", body = ErrorBody),
        (status = 400, description = "Invalid visit date", body = ErrorBody)
    )
)]
async fn create_visit(
    State(state): State<AppState>,
    Path(id): Path<String>,
    Json(req): Json<NewVisit>,
) -> Result<(StatusCode, Json<Visit>), ApiError> {
    let patient_id = parse_id(&id)?;
    let visit = state.visits.create(patient_id, req).await?;
    Ok((StatusCode::CREATED, Json(visit)))
}

#[utoipa::path(
    get,
    path = "/patients/{id}/visits",
    params(("id" = String, Path, description = "Patient id")),
    responses(
        (status = 200, description = "All visits for the patient, newest first", body = [Visit]),
        (status = 404, description = "Patient not found", body = ErrorBody)
    )
)]
async fn list_patient_visits(
    State(state): State<AppState>,
    Path(id): Path<String>,
) -> Result<Json<Vec<Visit>>, ApiError> {
    let patient_id = parse_id(&id)?;
    Ok(Json(state.visits.list_by_patient(patient_id).await?))
}

#[utoipa::path(
    get,
    path = "/patients/{id}/visits/stats",
    params(("id" = String, Path, description = "Patient id")),
    responses(
        (status = 200, description = "Visit statistics for the patient", body = VisitStats),
        (status = 404, description = "Patient not found", body = ErrorBody)
    )
)]
async fn patient_visit_stats(
    State(state): State<AppState>,
    Path(id): Path<String>,
) -> Result<Json<VisitStats>, ApiError> {
    let patient_id = parse_id(&id)?;
    Ok(Json(state.visits.stats(patient_id).await?))
}

#[utoipa::path(
    get,
    path = "/visits",
    params(VisitListQuery),
    responses(
        (status = 200, description = "Paginated visit list with patient summaries", body = VisitPage),
        (status = 400, description = "Invalid paging parameters", body = ErrorBody)
    )
)]
async fn list_visits(
    State(state): State<AppState>,
    Query(query): Query<VisitListQuery>,
) -> Result<Json<VisitPage>, ApiError> {
    Ok(Json(state.visits.list(query).await?))
}

#[utoipa::path(
    get,
    path = "/visits/{id}",
    params(("id" = String, Path, description = "Visit id")),
    responses(
        (status = 200, description = "Visit details with patient summary", body = VisitWithPatient),
        (status = 404, description = "Visit not found", body = ErrorBody)
    )
)]
async fn get_visit(
    State(state): State<AppState>,
    Path(id): Path<String>,
) -> Result<Json<VisitWithPatient>, ApiError> {
    let id = parse_id(&id)?;
    Ok(Json(state.visits.get(id).await?))
}

#[utoipa::path(
    put,
    path = "/visits/{id}",
    params(("id" = String, Path, description = "Visit id")),
    request_body = VisitUpdate,
    responses(
        (status = 200, description = "Visit updated", body = VisitWithPatient),
        (status = 404, description = "Visit not found", body = ErrorBody),
        (status = 400, description = "Invalid visit date", body = ErrorBody)
    )
)]
async fn update_visit(
    State(state): State<AppState>,
    Path(id): Path<String>,
    Json(req): Json<VisitUpdate>,
) -> Result<Json<VisitWithPatient>, ApiError> {
    let id = parse_id(&id)?;
    Ok(Json(state.visits.update(id, req).await?))
}

#[utoipa::path(
    delete,
    path = "/visits/{id}",
    params(("id" = String, Path, description = "Visit id")),
    responses(
        (status = 200, description = "Visit deleted", body = MessageRes),
        (status = 404, description = "Visit not found", body = ErrorBody)
    )
)]
async fn delete_visit(
    State(state): State<AppState>,
    Path(id): Path<String>,
) -> Result<Json<MessageRes>, ApiError> {
    let id = parse_id(&id)?;
    state.visits.delete(id).await?;
    Ok(Json(MessageRes {
        message: "Visit deleted successfully".into(),
    }))
}
