//! Error handling for the Optica inventory ledger
//!
//! Every ledger failure is surfaced verbatim with a stable code and messages in
//! English and Spanish.

use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use serde::Serialize;
use shared::{MovementViolation, PermissionDenied};
use thiserror::Error;
use uuid::Uuid;

/// Application error types
#[derive(Error, Debug)]
pub enum AppError {
    // Ledger errors
    #[error("Stock record not found: {0}")]
    RecordNotFound(String),

    #[error("An active stock record already exists for this product, branch, color and brand")]
    DuplicateRecord,

    #[error("Invalid movement: {0}")]
    InvalidMovement(#[from] MovementViolation),

    #[error("Insufficient stock: available {available}, requested {requested}")]
    InsufficientStock {
        record_id: Uuid,
        available: i64,
        requested: i64,
    },

    #[error("Movement not found: {0}")]
    MovementNotFound(Uuid),

    #[error("Movement {0} has already been reversed")]
    AlreadyReversed(Uuid),

    #[error("Movement {0} is a compensating entry and cannot be reversed")]
    NotReversible(Uuid),

    // Authentication errors
    #[error("Invalid token")]
    InvalidToken,

    #[error("Unauthorized: {0}")]
    Unauthorized(String),

    #[error("Insufficient permissions")]
    InsufficientPermissions,

    // Validation errors
    #[error("Validation error: {0}")]
    ValidationError(String),

    // Database errors
    #[error("Database error: {0}")]
    DatabaseError(#[from] sqlx::Error),

    #[error("Commit outcome unknown: {0}")]
    CommitUncertain(#[source] sqlx::Error),

    // Internal errors
    #[error("Internal server error: {0}")]
    Internal(String),

    #[error("Internal server error")]
    InternalError(#[from] anyhow::Error),
}

impl AppError {
    /// Whether the failure is a transient storage fault worth retrying.
    ///
    /// Only faults raised before commit qualify; logical rejections never do.
    pub fn is_transient(&self) -> bool {
        match self {
            AppError::DatabaseError(err) => is_retryable_db_error(err),
            _ => false,
        }
    }
}

/// Classify a failure raised by COMMIT itself.
///
/// Serialization failures and deadlocks guarantee the transaction rolled back.
/// Anything else (a dropped connection, a pool fault) may have landed, so it is
/// reported as an unknown outcome and never retried.
pub fn commit_error(err: sqlx::Error) -> AppError {
    let rolled_back = match &err {
        // serialization_failure, deadlock_detected
        sqlx::Error::Database(db_err) => {
            matches!(db_err.code().as_deref(), Some("40001") | Some("40P01"))
        }
        _ => false,
    };

    if rolled_back {
        AppError::DatabaseError(err)
    } else {
        AppError::CommitUncertain(err)
    }
}

/// Check if a database error is transient
pub fn is_retryable_db_error(err: &sqlx::Error) -> bool {
    match err {
        sqlx::Error::Io(_) => true,
        sqlx::Error::PoolTimedOut => true,
        sqlx::Error::Database(db_err) => {
            let code = db_err.code().unwrap_or_default();
            // serialization_failure, deadlock_detected
            code == "40001"
                || code == "40P01"
                // connection_exception class
                || code.starts_with("08")
                // operator_intervention class
                || code.starts_with("57")
        }
        _ => false,
    }
}

impl From<PermissionDenied> for AppError {
    fn from(denied: PermissionDenied) -> Self {
        tracing::warn!(actor_id = %denied.actor_id, "Administrative operation denied");
        AppError::InsufficientPermissions
    }
}

impl From<validator::ValidationErrors> for AppError {
    fn from(errors: validator::ValidationErrors) -> Self {
        let mut fields: Vec<String> = errors
            .field_errors()
            .into_iter()
            .map(|(field, errs)| {
                let messages: Vec<String> = errs
                    .iter()
                    .map(|e| {
                        e.message
                            .as_ref()
                            .map(|m| m.to_string())
                            .unwrap_or_else(|| e.code.to_string())
                    })
                    .collect();
                format!("{}: {}", field, messages.join(", "))
            })
            .collect();
        fields.sort();
        AppError::ValidationError(fields.join("; "))
    }
}

/// Error response structure
#[derive(Serialize)]
pub struct ErrorResponse {
    pub error: ErrorDetail,
}

#[derive(Serialize)]
pub struct ErrorDetail {
    pub code: String,
    pub message_en: String,
    pub message_es: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub field: Option<String>,
}

impl ErrorDetail {
    fn new(code: &str, message_en: String, message_es: String) -> Self {
        Self {
            code: code.to_string(),
            message_en,
            message_es,
            field: None,
        }
    }
}

impl AppError {
    /// Stable status and body for each error kind
    pub fn status_and_detail(&self) -> (StatusCode, ErrorDetail) {
        match self {
            AppError::RecordNotFound(what) => (
                StatusCode::NOT_FOUND,
                ErrorDetail::new(
                    "RECORD_NOT_FOUND",
                    format!("Stock record {} not found", what),
                    format!("No se encontró el registro de stock {}", what),
                ),
            ),
            AppError::DuplicateRecord => (
                StatusCode::CONFLICT,
                ErrorDetail::new(
                    "DUPLICATE_RECORD",
                    self.to_string(),
                    "Ya existe un registro de stock activo para este producto, sucursal, color y marca"
                        .to_string(),
                ),
            ),
            AppError::InvalidMovement(violation) => {
                let mut detail = ErrorDetail::new(
                    "INVALID_MOVEMENT",
                    violation.to_string(),
                    format!("Movimiento inválido: {}", violation),
                );
                detail.field = Some(
                    match violation {
                        MovementViolation::EmptyReason | MovementViolation::ReasonTooLong { .. } => {
                            "reason"
                        }
                        _ => "delta",
                    }
                    .to_string(),
                );
                (StatusCode::BAD_REQUEST, detail)
            }
            AppError::InsufficientStock {
                available,
                requested,
                ..
            } => (
                StatusCode::UNPROCESSABLE_ENTITY,
                ErrorDetail::new(
                    "INSUFFICIENT_STOCK",
                    self.to_string(),
                    format!(
                        "Stock insuficiente: disponible {}, solicitado {}",
                        available, requested
                    ),
                ),
            ),
            AppError::MovementNotFound(id) => (
                StatusCode::NOT_FOUND,
                ErrorDetail::new(
                    "MOVEMENT_NOT_FOUND",
                    self.to_string(),
                    format!("No se encontró el movimiento {}", id),
                ),
            ),
            AppError::AlreadyReversed(id) => (
                StatusCode::CONFLICT,
                ErrorDetail::new(
                    "ALREADY_REVERSED",
                    self.to_string(),
                    format!("El movimiento {} ya fue revertido", id),
                ),
            ),
            AppError::NotReversible(id) => (
                StatusCode::CONFLICT,
                ErrorDetail::new(
                    "NOT_REVERSIBLE",
                    self.to_string(),
                    format!(
                        "El movimiento {} es una reversión y no puede revertirse",
                        id
                    ),
                ),
            ),
            AppError::InvalidToken => (
                StatusCode::UNAUTHORIZED,
                ErrorDetail::new(
                    "INVALID_TOKEN",
                    "Invalid token".to_string(),
                    "Token inválido".to_string(),
                ),
            ),
            AppError::Unauthorized(message) => (
                StatusCode::UNAUTHORIZED,
                ErrorDetail::new(
                    "UNAUTHORIZED",
                    message.clone(),
                    "No autorizado".to_string(),
                ),
            ),
            AppError::InsufficientPermissions => (
                StatusCode::FORBIDDEN,
                ErrorDetail::new(
                    "INSUFFICIENT_PERMISSIONS",
                    "You do not have permission to perform this action".to_string(),
                    "No tiene permisos para realizar esta acción".to_string(),
                ),
            ),
            AppError::ValidationError(msg) => (
                StatusCode::BAD_REQUEST,
                ErrorDetail::new(
                    "VALIDATION_ERROR",
                    msg.clone(),
                    format!("Datos inválidos: {}", msg),
                ),
            ),
            AppError::DatabaseError(_) => {
                let status = if self.is_transient() {
                    StatusCode::SERVICE_UNAVAILABLE
                } else {
                    StatusCode::INTERNAL_SERVER_ERROR
                };
                (
                    status,
                    ErrorDetail::new(
                        "DATABASE_ERROR",
                        "A database error occurred".to_string(),
                        "Ocurrió un error de base de datos".to_string(),
                    ),
                )
            }
            AppError::CommitUncertain(_) => (
                StatusCode::INTERNAL_SERVER_ERROR,
                ErrorDetail::new(
                    "COMMIT_OUTCOME_UNKNOWN",
                    "The change may or may not have been applied; check the ledger before retrying"
                        .to_string(),
                    "El cambio pudo o no haberse aplicado; revise el libro de movimientos antes de reintentar"
                        .to_string(),
                ),
            ),
            AppError::Internal(msg) => (
                StatusCode::INTERNAL_SERVER_ERROR,
                ErrorDetail::new(
                    "INTERNAL_ERROR",
                    msg.clone(),
                    "Error interno del servidor".to_string(),
                ),
            ),
            AppError::InternalError(_) => (
                StatusCode::INTERNAL_SERVER_ERROR,
                ErrorDetail::new(
                    "INTERNAL_ERROR",
                    "An internal server error occurred".to_string(),
                    "Error interno del servidor".to_string(),
                ),
            ),
        }
    }
}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        let (status, error_detail) = self.status_and_detail();

        if status.is_server_error() {
            tracing::error!("Error: {:?}", self);
        } else {
            tracing::debug!(code = %error_detail.code, "Request rejected: {}", self);
        }

        (status, Json(ErrorResponse { error: error_detail })).into_response()
    }
}

/// Result type alias for handlers
pub type AppResult<T> = Result<T, AppError>;
