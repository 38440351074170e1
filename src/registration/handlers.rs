use axum::{
    extract::{rejection::JsonRejection, Path, State},
    http::StatusCode,
    response::{IntoResponse, Response},
    routing::get,
    Json, Router,
};
use tracing::{instrument, warn};
use uuid::Uuid;

use crate::{
    error::ApiError,
    registration::{
        dto::{
            DatabaseStats, ListResponse, PublicRegistration, RegisterResponse,
            RegistrationRequest, SheetRowsResponse, Stats, StatsResponse, UserResponse,
        },
        services,
    },
    state::AppState,
};

pub fn registration_routes() -> Router<AppState> {
    Router::new()
        .route("/registration", get(list_registrations).post(create_registration))
        .route("/registration/excel", get(list_spreadsheet_rows))
        .route("/registration/stats", get(stats))
        .route("/registration/:id", get(get_registration))
}

#[instrument(skip(state, payload))]
pub async fn create_registration(
    State(state): State<AppState>,
    payload: Result<Json<RegistrationRequest>, JsonRejection>,
) -> Result<Response, ApiError> {
    let Json(req) = payload.map_err(|e| {
        warn!(error = %e, "rejected registration payload");
        ApiError::MalformedPayload
    })?;

    let out = services::register(&state, req).await?;
    let message = if out.spreadsheet_path.is_some() {
        "User registered successfully! Data saved to database and Excel file."
    } else {
        "User registered successfully, but the spreadsheet copy could not be written."
    };

    Ok((
        StatusCode::CREATED,
        Json(RegisterResponse {
            success: true,
            message,
            user: PublicRegistration::from(&out.registration),
            excel_file: out.spreadsheet_path,
        }),
    )
        .into_response())
}

#[instrument(skip(state))]
pub async fn list_registrations(State(state): State<AppState>) -> Result<Response, ApiError> {
    let records = state
        .registrations
        .list_recent_first()
        .await
        .map_err(ApiError::storage("Error fetching users"))?;

    Ok(Json(ListResponse {
        success: true,
        count: records.len(),
        users: records.iter().map(PublicRegistration::from).collect(),
    })
    .into_response())
}

#[instrument(skip(state))]
pub async fn get_registration(
    State(state): State<AppState>,
    Path(id): Path<String>,
) -> Result<Response, ApiError> {
    // a malformed id cannot match any record
    let id = Uuid::parse_str(&id).map_err(|_| ApiError::NotFound)?;
    let record = state
        .registrations
        .get(id)
        .await
        .map_err(ApiError::storage("Error fetching user"))?
        .ok_or(ApiError::NotFound)?;

    Ok(Json(UserResponse {
        success: true,
        user: PublicRegistration::from(&record),
    })
    .into_response())
}

#[instrument(skip(state))]
pub async fn list_spreadsheet_rows(
    State(state): State<AppState>,
) -> Result<Json<SheetRowsResponse>, ApiError> {
    let registrations = state
        .spreadsheet
        .read_all_rows()
        .await
        .map_err(ApiError::storage("Error fetching Excel data"))?;

    Ok(Json(SheetRowsResponse {
        success: true,
        count: registrations.len(),
        registrations,
    }))
}

#[instrument(skip(state))]
pub async fn stats(State(state): State<AppState>) -> Result<Json<StatsResponse>, ApiError> {
    let total_registrations = state
        .registrations
        .count()
        .await
        .map_err(ApiError::storage("Error fetching statistics"))?;
    let spreadsheet = state
        .spreadsheet
        .file_stats()
        .await
        .map_err(ApiError::storage("Error fetching statistics"))?;

    Ok(Json(StatsResponse {
        success: true,
        stats: Stats {
            database: DatabaseStats {
                total_registrations,
            },
            spreadsheet,
        },
    }))
}
