use axum::{
    Json,
    http::StatusCode,
    response::{IntoResponse, Response},
};
use sy_core::SyError;
use sy_core::protocol::ErrorBody;
use thiserror::Error;
use tracing::{error, warn};

#[derive(Error, Debug)]
pub enum ServerError {
    #[error("Invalid request: {0}")]
    InvalidRequest(String),

    #[error(transparent)]
    Core(#[from] SyError),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

impl ServerError {
    pub fn status(&self) -> StatusCode {
        match self {
            ServerError::InvalidRequest(_) => StatusCode::BAD_REQUEST,
            ServerError::Core(e) => match e {
                SyError::Protocol(_) | SyError::InvalidChunkId(_) => StatusCode::BAD_REQUEST,
                SyError::UnsupportedMethod(_) => StatusCode::NOT_IMPLEMENTED,
                _ => StatusCode::INTERNAL_SERVER_ERROR,
            },
            ServerError::Io(_) => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }

    pub fn exit_code(&self) -> u8 {
        match self {
            ServerError::Core(e) => e.exit_code(),
            ServerError::InvalidRequest(_) => 4,
            // bind/accept failures
            ServerError::Io(_) => 3,
        }
    }
}

impl IntoResponse for ServerError {
    fn into_response(self) -> Response {
        let status = self.status();
        if status.is_server_error() {
            error!(%status, error = %self, "request failed");
        } else {
            warn!(%status, error = %self, "request rejected");
        }
        let body = ErrorBody {
            error: self.to_string(),
        };
        (status, Json(body)).into_response()
    }
}

pub type Result<T> = std::result::Result<T, ServerError>;
