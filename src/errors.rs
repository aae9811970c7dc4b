// src/errors.rs
use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use serde_json::json;
use thiserror::Error;

#[derive(Error, Debug)]
pub enum AppError {
    #[error("MongoDB error: {0}")]
    MongoDB(#[from] mongodb::error::Error),

    #[error("Validation error: {0}")]
    ValidationError(String),

    #[error("Criteria not met: {0}")]
    CriteriaNotMet(String),

    #[error("Insufficient wallet balance")]
    InsufficientFunds,

    #[error("User not found: {0}")]
    UserNotFound(String),

    #[error("Plan not found or inactive")]
    PlanNotFound,

    #[error("Offer not found or inactive")]
    OfferNotFound,

    #[error("AutoPay not found")]
    AutoPayNotFound,

    #[error("Invalid ObjectId: {0}")]
    InvalidObjectId(String),

    #[error("Transaction conflict, retries exhausted")]
    TransactionConflict,

    #[error("Authentication error: {0}")]
    AuthError(String),

    #[error("Unauthorized access")]
    Unauthorized,

    #[error("Service error: {0}")]
    ServiceError(String),
}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        let (status, error_message) = match &self {
            AppError::MongoDB(_) => (StatusCode::INTERNAL_SERVER_ERROR, "Database error".to_string()),
            AppError::ValidationError(_) => (StatusCode::BAD_REQUEST, "Validation failed".to_string()),
            AppError::CriteriaNotMet(_) => (StatusCode::BAD_REQUEST, "Eligibility criteria not met".to_string()),
            AppError::InsufficientFunds => (StatusCode::PAYMENT_REQUIRED, "Insufficient wallet balance".to_string()),
            AppError::UserNotFound(_) => (StatusCode::NOT_FOUND, "User not found".to_string()),
            AppError::PlanNotFound => (StatusCode::NOT_FOUND, "Plan not found".to_string()),
            AppError::OfferNotFound => (StatusCode::NOT_FOUND, "Offer not found".to_string()),
            AppError::AutoPayNotFound => (StatusCode::NOT_FOUND, "AutoPay not found".to_string()),
            AppError::InvalidObjectId(_) => (StatusCode::BAD_REQUEST, "Invalid ID format".to_string()),
            AppError::TransactionConflict => (StatusCode::CONFLICT, "Transaction conflict".to_string()),
            AppError::AuthError(_) => (StatusCode::UNAUTHORIZED, "Authentication failed".to_string()),
            AppError::Unauthorized => (StatusCode::FORBIDDEN, "Unauthorized access".to_string()),
            AppError::ServiceError(_) => (StatusCode::INTERNAL_SERVER_ERROR, "Service error".to_string()),
        };

        let body = Json(json!({
            "error": error_message,
            "message": self.to_string(),
            "success": false,
            "timestamp": chrono::Utc::now().to_rfc3339(),
        }));

        (status, body).into_response()
    }
}

// Manual From implementations
impl From<serde_json::Error> for AppError {
    fn from(err: serde_json::Error) -> Self {
        AppError::ValidationError(format!("JSON parsing error: {}", err))
    }
}

impl From<mongodb::bson::ser::Error> for AppError {
    fn from(err: mongodb::bson::ser::Error) -> Self {
        AppError::ServiceError(format!("BSON encoding error: {}", err))
    }
}

impl From<mongodb::bson::oid::Error> for AppError {
    fn from(err: mongodb::bson::oid::Error) -> Self {
        AppError::InvalidObjectId(err.to_string())
    }
}

impl From<validator::ValidationErrors> for AppError {
    fn from(err: validator::ValidationErrors) -> Self {
        AppError::ValidationError(err.to_string())
    }
}

// Helper conversion functions
impl AppError {
    pub fn invalid_data(msg: impl Into<String>) -> Self {
        AppError::ValidationError(msg.into())
    }

    pub fn criteria(msg: impl Into<String>) -> Self {
        AppError::CriteriaNotMet(msg.into())
    }
}

pub type Result<T> = std::result::Result<T, AppError>;
