use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use serde::Serialize;
use thiserror::Error;

#[derive(Error, Debug)]
pub enum ApiError {
    #[error("Malformed payload")]
    MalformedPayload,

    #[error("Please provide all required fields")]
    MissingFields(Vec<String>),

    #[error("Validation failed")]
    Validation(Vec<String>),

    #[error("User with this email already exists")]
    DuplicateEmail,

    #[error("User not found")]
    NotFound,

    #[error("{message}")]
    Storage {
        message: &'static str,
        #[source]
        source: anyhow::Error,
    },
}

impl ApiError {
    pub fn storage(message: &'static str) -> impl FnOnce(anyhow::Error) -> Self {
        move |source| ApiError::Storage { message, source }
    }

    pub fn status(&self) -> StatusCode {
        match self {
            ApiError::MalformedPayload
            | ApiError::MissingFields(_)
            | ApiError::Validation(_)
            | ApiError::DuplicateEmail => StatusCode::BAD_REQUEST,
            ApiError::NotFound => StatusCode::NOT_FOUND,
            ApiError::Storage { .. } => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }
}

/// JSON envelope shared by every failed request.
#[derive(Debug, Serialize)]
pub struct ErrorBody {
    pub success: bool,
    pub message: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub errors: Option<Vec<String>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let status = self.status();
        let message = self.to_string();
        let (errors, error) = match self {
            ApiError::MissingFields(list) | ApiError::Validation(list) => (Some(list), None),
            ApiError::Storage { source, .. } => {
                tracing::error!(error = %source, %message, "storage failure");
                (None, Some(format!("{:#}", source)))
            }
            _ => (None, None),
        };

        (
            status,
            Json(ErrorBody {
                success: false,
                message,
                errors,
                error,
            }),
        )
            .into_response()
    }
}
