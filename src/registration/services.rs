use time::OffsetDateTime;
use tracing::{error, info, warn};

use crate::error::ApiError;
use crate::registration::{
    dto::RegistrationRequest,
    password::hash_password_blocking,
    projection::project,
    repo::InsertError,
    repo_types::Registration,
    validate::{missing_required_fields, validate},
};
use crate::state::AppState;

/// Outcome of a registration that reached the primary store.
#[derive(Debug)]
pub struct Registered {
    pub registration: Registration,
    /// Path of the spreadsheet copy, `None` if the append failed.
    pub spreadsheet_path: Option<String>,
}

/// Validates, hashes, writes the database record, then mirrors it into the
/// spreadsheet.
///
/// The two writes are not atomic. A spreadsheet failure after the database
/// insert is logged and reported through `spreadsheet_path`, and the database
/// record stays.
pub async fn register(state: &AppState, req: RegistrationRequest) -> Result<Registered, ApiError> {
    let missing = missing_required_fields(&req);
    if !missing.is_empty() {
        warn!(?missing, "registration missing required fields");
        return Err(ApiError::MissingFields(missing));
    }

    let now = now_micros();
    let valid = validate(req, now.date()).map_err(|errors| {
        warn!(?errors, "registration failed validation");
        ApiError::Validation(errors)
    })?;

    let existing = state
        .registrations
        .find_by_email(&valid.email)
        .await
        .map_err(ApiError::storage("Internal server error"))?;
    if existing.is_some() {
        warn!(email = %valid.email, "email already registered");
        return Err(ApiError::DuplicateEmail);
    }

    let hash = hash_password_blocking(valid.password.clone())
        .await
        .map_err(ApiError::storage("Internal server error"))?;
    let record = valid.into_record(hash, now);

    match state.registrations.insert(&record).await {
        Ok(()) => {}
        Err(InsertError::DuplicateEmail) => {
            warn!(email = %record.email, "email registered concurrently");
            return Err(ApiError::DuplicateEmail);
        }
        Err(InsertError::Backend(e)) => {
            return Err(ApiError::storage("Internal server error")(e));
        }
    }

    let spreadsheet_path = match state.spreadsheet.append_row(project(&record)).await {
        Ok(row) => {
            info!(id = %record.id, row, "registration stored in database and spreadsheet");
            Some(state.spreadsheet.display_path())
        }
        Err(e) => {
            let reason = format!("{e:#}");
            error!(id = %record.id, error = %reason, "spreadsheet append failed after database insert");
            None
        }
    };

    Ok(Registered {
        registration: record,
        spreadsheet_path,
    })
}

/// Current time at the microsecond precision Postgres keeps, so the created
/// record serializes the same as when it is read back.
fn now_micros() -> OffsetDateTime {
    let now = OffsetDateTime::now_utc();
    now.replace_nanosecond(now.nanosecond() / 1_000 * 1_000)
        .unwrap_or(now)
}
