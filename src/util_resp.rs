use axum::{
    Json,
    http::StatusCode,
    response::{IntoResponse, Response},
};
use serde::Serialize;

use crate::error::{EngineError, ErrorBody};

pub type StandardResponse<T> = Result<SuccessResponse<T>, FailureResponse>;

pub fn success<T: Serialize>(body: T) -> StandardResponse<T> {
    Ok(SuccessResponse::Success(body))
}

pub fn created<T: Serialize>(body: T) -> StandardResponse<T> {
    Ok(SuccessResponse::Created(body))
}

pub fn no_content() -> StandardResponse<()> {
    Ok(SuccessResponse::NoContent)
}

pub fn bad_request(message: impl Into<String>) -> FailureResponse {
    FailureResponse::BadRequest(message.into())
}

#[derive(Debug)]
pub enum SuccessResponse<T> {
    Success(T),
    Created(T),
    NoContent,
}

impl<T: Serialize> IntoResponse for SuccessResponse<T> {
    fn into_response(self) -> Response {
        match self {
            SuccessResponse::Success(body) => Json(body).into_response(),
            SuccessResponse::Created(body) => {
                (StatusCode::CREATED, Json(body)).into_response()
            }
            SuccessResponse::NoContent => {
                StatusCode::NO_CONTENT.into_response()
            }
        }
    }
}

#[derive(Debug)]
pub enum FailureResponse {
    /// The engine rejected the request.
    Engine(EngineError),
    BadRequest(String),
    ServerError(String),
}

impl From<EngineError> for FailureResponse {
    fn from(e: EngineError) -> Self {
        FailureResponse::Engine(e)
    }
}

impl From<diesel::r2d2::PoolError> for FailureResponse {
    fn from(e: diesel::r2d2::PoolError) -> Self {
        FailureResponse::ServerError(e.to_string())
    }
}

impl From<tokio::task::JoinError> for FailureResponse {
    fn from(e: tokio::task::JoinError) -> Self {
        FailureResponse::ServerError(e.to_string())
    }
}

impl IntoResponse for FailureResponse {
    fn into_response(self) -> Response {
        let (status, body) = match self {
            FailureResponse::Engine(e) => {
                let status = match &e {
                    EngineError::Validation(_) => {
                        StatusCode::UNPROCESSABLE_ENTITY
                    }
                    EngineError::NotFound { .. } => StatusCode::NOT_FOUND,
                    EngineError::Conflict(_) => StatusCode::CONFLICT,
                    EngineError::Database(_) => {
                        tracing::error!(error = %e, "database error");
                        StatusCode::INTERNAL_SERVER_ERROR
                    }
                };
                (status, ErrorBody::from(&e))
            }
            FailureResponse::BadRequest(message) => (
                StatusCode::BAD_REQUEST,
                ErrorBody {
                    error: "BAD_REQUEST",
                    message,
                },
            ),
            FailureResponse::ServerError(message) => {
                tracing::error!(%message, "request failed");
                (
                    StatusCode::INTERNAL_SERVER_ERROR,
                    ErrorBody {
                        error: "INTERNAL",
                        message,
                    },
                )
            }
        };
        (status, Json(body)).into_response()
    }
}
