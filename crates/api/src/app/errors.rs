use axum::http::StatusCode;
use axum::response::IntoResponse;
use rust_decimal::prelude::ToPrimitive;
use serde_json::json;

use walletd_fraud::FraudRejection;
use walletd_infra::{GateError, LedgerError, StoreError};

/// Error body: `{"error": <message>, "code": <code>}`.
pub fn json_error(
    status: StatusCode,
    code: &'static str,
    message: impl Into<String>,
) -> axum::response::Response {
    (
        status,
        axum::Json(json!({
            "error": message.into(),
            "code": code,
        })),
    )
        .into_response()
}

pub fn ledger_error_to_response(err: LedgerError) -> axum::response::Response {
    let code = err.code();
    match err {
        LedgerError::Validation(msg) => json_error(StatusCode::BAD_REQUEST, code, msg),
        LedgerError::InsufficientBalance => {
            json_error(StatusCode::BAD_REQUEST, code, "Insufficient balance")
        }
        LedgerError::NotFound(msg) => json_error(StatusCode::NOT_FOUND, code, msg),
        LedgerError::FraudRejected(rejection) => fraud_rejection_to_response(rejection),
        LedgerError::MissingFraudContext => json_error(
            StatusCode::INTERNAL_SERVER_ERROR,
            code,
            "Fraud detection metadata missing",
        ),
        LedgerError::StoreUnavailable(e) => store_error_to_response(e),
        LedgerError::Conflict(msg) => json_error(StatusCode::CONFLICT, code, msg),
        LedgerError::TransferFailed { .. } => json_error(
            StatusCode::INTERNAL_SERVER_ERROR,
            code,
            "Error processing transfer",
        ),
        LedgerError::LedgerInconsistency { transaction_id, .. } => (
            StatusCode::INTERNAL_SERVER_ERROR,
            axum::Json(json!({
                "error": "Ledger inconsistency detected; the operation requires manual reconciliation",
                "code": code,
                "transactionId": transaction_id,
            })),
        )
            .into_response(),
        LedgerError::Internal(msg) => {
            tracing::error!(error = %msg, "internal ledger error");
            json_error(StatusCode::INTERNAL_SERVER_ERROR, code, "Internal server error")
        }
    }
}

pub fn fraud_rejection_to_response(rejection: FraudRejection) -> axum::response::Response {
    let code = rejection.code();
    let message = rejection.to_string();
    match rejection {
        FraudRejection::AmountOutOfRange { min, max } => (
            StatusCode::BAD_REQUEST,
            axum::Json(json!({
                "error": message,
                "code": code,
                "details": { "min": min.to_f64(), "max": max.to_f64() },
            })),
        )
            .into_response(),
        _ => json_error(StatusCode::BAD_REQUEST, code, message),
    }
}

pub fn gate_error_to_response(err: GateError) -> axum::response::Response {
    match err {
        GateError::Rejected(rejection) => fraud_rejection_to_response(rejection),
        GateError::Store(e) => {
            tracing::error!(error = %e, "fraud gate could not read history");
            json_error(
                StatusCode::INTERNAL_SERVER_ERROR,
                "fraud_check_failed",
                "Error in fraud detection",
            )
        }
    }
}

pub fn store_error_to_response(err: StoreError) -> axum::response::Response {
    match err {
        StoreError::NotFound(what) => {
            json_error(StatusCode::NOT_FOUND, "not_found", format!("{what} not found"))
        }
        StoreError::Conflict(msg) => json_error(StatusCode::CONFLICT, "conflict", msg),
        StoreError::Duplicate(what) => json_error(
            StatusCode::BAD_REQUEST,
            "validation_error",
            format!("already exists: {what}"),
        ),
        other => {
            tracing::warn!(error = %other, "store unavailable");
            json_error(
                StatusCode::SERVICE_UNAVAILABLE,
                "store_unavailable",
                "Service temporarily unavailable",
            )
        }
    }
}

/// 400 for bodies, paths, and queries that do not parse.
pub fn bad_request(rejection: impl std::fmt::Display) -> axum::response::Response {
    json_error(StatusCode::BAD_REQUEST, "validation_error", rejection.to_string())
}
