//! Operator routes: reports, soft deletes, account opening, manual scans.
//!
//! Guarded by `middleware::admin_middleware`.

use std::sync::Arc;

use axum::{
    extract::{
        rejection::{JsonRejection, PathRejection, QueryRejection},
        Extension, Path, Query,
    },
    http::StatusCode,
    response::{IntoResponse, Response},
    routing::{delete, get, post},
    Json, Router,
};

use walletd_core::{AccountId, TransactionId};

use crate::app::{dto, errors, services::AppServices};
use crate::middleware::admin_middleware;

const DEFAULT_TOP_LIMIT: usize = 10;

pub fn router() -> Router {
    Router::new()
        .route("/flagged-transactions", get(flagged_transactions))
        .route("/total-balances", get(total_balances))
        .route("/top-users/balance", get(top_by_balance))
        .route("/top-users/volume", get(top_by_volume))
        .route("/users/:id", delete(delete_user))
        .route("/transactions/:id", delete(delete_transaction))
        .route("/accounts", post(open_account))
        .route("/fraud-scan", post(trigger_scan))
        .route_layer(axum::middleware::from_fn(admin_middleware))
}

pub async fn flagged_transactions(
    Extension(services): Extension<Arc<AppServices>>,
    query: Result<Query<dto::PageQuery>, QueryRejection>,
) -> Response {
    let Query(q) = match query {
        Ok(q) => q,
        Err(e) => return errors::bad_request(e),
    };

    let pagination = walletd_infra::Pagination::new(q.page, q.limit);
    match services.admin.flagged_transactions(pagination).await {
        Ok(page) => (StatusCode::OK, Json(dto::TransactionPageView::from(page))).into_response(),
        Err(e) => errors::store_error_to_response(e),
    }
}

pub async fn total_balances(Extension(services): Extension<Arc<AppServices>>) -> Response {
    match services.admin.total_balances().await {
        Ok(totals) => {
            let balances = totals
                .into_iter()
                .map(|(currency, total)| {
                    let total = rust_decimal::prelude::ToPrimitive::to_f64(&total);
                    (currency.code().to_string(), serde_json::json!(total))
                })
                .collect::<serde_json::Map<_, _>>();
            (StatusCode::OK, Json(serde_json::json!({ "balances": balances }))).into_response()
        }
        Err(e) => errors::store_error_to_response(e),
    }
}

pub async fn top_by_balance(
    Extension(services): Extension<Arc<AppServices>>,
    query: Result<Query<dto::TopQuery>, QueryRejection>,
) -> Response {
    let Query(q) = match query {
        Ok(q) => q,
        Err(e) => return errors::bad_request(e),
    };

    let currency = q.currency.unwrap_or_default();
    let limit = q.limit.unwrap_or(DEFAULT_TOP_LIMIT);
    match services.admin.top_by_balance(currency, limit).await {
        Ok(rows) => standings(rows),
        Err(e) => errors::store_error_to_response(e),
    }
}

pub async fn top_by_volume(
    Extension(services): Extension<Arc<AppServices>>,
    query: Result<Query<dto::TopQuery>, QueryRejection>,
) -> Response {
    let Query(q) = match query {
        Ok(q) => q,
        Err(e) => return errors::bad_request(e),
    };

    let currency = q.currency.unwrap_or_default();
    let limit = q.limit.unwrap_or(DEFAULT_TOP_LIMIT);
    match services.admin.top_by_volume(currency, limit).await {
        Ok(rows) => standings(rows),
        Err(e) => errors::store_error_to_response(e),
    }
}

fn standings(rows: Vec<walletd_infra::AccountStanding>) -> Response {
    let users = rows
        .into_iter()
        .map(dto::StandingView::from)
        .collect::<Vec<_>>();
    (StatusCode::OK, Json(serde_json::json!({ "users": users }))).into_response()
}

pub async fn delete_user(
    Extension(services): Extension<Arc<AppServices>>,
    id: Result<Path<AccountId>, PathRejection>,
) -> Response {
    let Path(id) = match id {
        Ok(id) => id,
        Err(e) => return errors::bad_request(e),
    };

    match services.ledger.close_account(id).await {
        Ok(account) => (
            StatusCode::OK,
            Json(serde_json::json!({
                "message": "User deleted",
                "user": dto::AccountView::from(&account),
            })),
        )
            .into_response(),
        Err(e) => errors::ledger_error_to_response(e),
    }
}

pub async fn delete_transaction(
    Extension(services): Extension<Arc<AppServices>>,
    id: Result<Path<TransactionId>, PathRejection>,
) -> Response {
    let Path(id) = match id {
        Ok(id) => id,
        Err(e) => return errors::bad_request(e),
    };

    match services.admin.delete_transaction(id).await {
        Ok(tx) => (
            StatusCode::OK,
            Json(serde_json::json!({
                "message": "Transaction deleted",
                "transaction": dto::TransactionView::from(tx),
            })),
        )
            .into_response(),
        Err(e) => errors::store_error_to_response(e),
    }
}

pub async fn open_account(
    Extension(services): Extension<Arc<AppServices>>,
    body: Result<Json<dto::OpenAccountBody>, JsonRejection>,
) -> Response {
    let Json(body) = match body {
        Ok(body) => body,
        Err(e) => return errors::bad_request(e),
    };

    match services.ledger.open_account(&body.username, &body.email).await {
        Ok(account) => (StatusCode::CREATED, Json(dto::AccountView::from(&account))).into_response(),
        Err(e) => errors::ledger_error_to_response(e),
    }
}

pub async fn trigger_scan(Extension(services): Extension<Arc<AppServices>>) -> Response {
    match services.trigger_scan().await {
        Ok(None) => (
            StatusCode::ACCEPTED,
            Json(serde_json::json!({ "message": "Fraud scan triggered" })),
        )
            .into_response(),
        Ok(Some(report)) => (
            StatusCode::OK,
            Json(serde_json::json!({
                "message": "Fraud scan completed",
                "report": dto::ScanReportView::from(report),
            })),
        )
            .into_response(),
        Err(e) => errors::store_error_to_response(e),
    }
}
