use accrual_tools::AccrualApiError;
use actix_web::{
    error::ResponseError,
    http::{header::ContentType, StatusCode},
    HttpResponse,
};
use ledger_engine::SqliteDatabaseError;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum ServerError {
    #[error("Could not initialize server. {0}")]
    InitializeError(String),
    #[error("An error occurred on the backend of the server. {0}")]
    BackendError(String),
    #[error("An I/O error happened in the server. {0}")]
    IOError(#[from] std::io::Error),
    #[error("Invalid server configuration. {0}")]
    ConfigurationError(String),
    #[error("UnspecifiedError. {0}")]
    Unspecified(String),
}

impl ResponseError for ServerError {
    fn status_code(&self) -> StatusCode {
        match self {
            Self::InitializeError(_) => StatusCode::INTERNAL_SERVER_ERROR,
            Self::BackendError(_) => StatusCode::INTERNAL_SERVER_ERROR,
            Self::IOError(_) => StatusCode::INTERNAL_SERVER_ERROR,
            Self::ConfigurationError(_) => StatusCode::INTERNAL_SERVER_ERROR,
            Self::Unspecified(_) => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }

    fn error_response(&self) -> HttpResponse {
        HttpResponse::build(self.status_code())
            .insert_header(ContentType::json())
            .body(serde_json::json!({ "error": self.to_string() }).to_string())
    }
}

impl From<SqliteDatabaseError> for ServerError {
    fn from(e: SqliteDatabaseError) -> Self {
        match e {
            SqliteDatabaseError::MigrationError(e) => Self::InitializeError(format!("Database migration failed. {e}")),
            e => Self::BackendError(format!("Database error: {e}")),
        }
    }
}

impl From<AccrualApiError> for ServerError {
    fn from(e: AccrualApiError) -> Self {
        match e {
            AccrualApiError::Initialization(s) => Self::ConfigurationError(format!("Accrual client: {s}")),
            e => Self::BackendError(format!("Accrual service error: {e}")),
        }
    }
}
