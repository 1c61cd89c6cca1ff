//! Caller-scoped wallet routes. The account is always the token subject.

use std::sync::Arc;

use axum::{
    extract::{rejection::JsonRejection, rejection::QueryRejection, Extension, Query},
    http::StatusCode,
    response::{IntoResponse, Response},
    routing::{get, post},
    Json, Router,
};

use walletd_core::Currency;
use walletd_fraud::FraudContext;
use walletd_infra::{Deposit, Pagination, ReceiverRef, Transfer, Withdraw};
use walletd_wallet::TransactionType;

use crate::app::{dto, errors, services::AppServices};
use crate::context::PrincipalContext;
use crate::middleware::{fraud_gate_middleware, FraudGateState};

pub fn router(services: Arc<AppServices>) -> Router {
    let gate = |kind: TransactionType| {
        axum::middleware::from_fn_with_state(
            FraudGateState {
                services: services.clone(),
                kind,
            },
            fraud_gate_middleware,
        )
    };

    Router::new()
        .route("/deposit", post(deposit).layer(gate(TransactionType::Deposit)))
        .route("/withdraw", post(withdraw).layer(gate(TransactionType::Withdrawal)))
        .route("/transfer", post(transfer).layer(gate(TransactionType::Transfer)))
        .route("/balance", get(balance))
        .route("/balances", get(balances))
        .route("/transactions", get(transactions))
}

pub async fn deposit(
    Extension(services): Extension<Arc<AppServices>>,
    Extension(principal): Extension<PrincipalContext>,
    fraud: Option<Extension<FraudContext>>,
    body: Result<Json<dto::MovementBody>, JsonRejection>,
) -> Response {
    let Json(body) = match body {
        Ok(body) => body,
        Err(e) => return errors::bad_request(e),
    };

    let cmd = Deposit {
        account: principal.account_id(),
        amount: body.amount,
        currency: body.currency,
        description: body.description,
        fraud: fraud.map(|Extension(ctx)| ctx),
    };
    match services.ledger.deposit(cmd).await {
        Ok(receipt) => (
            StatusCode::OK,
            Json(dto::MovementView::new("Deposit successful", receipt)),
        )
            .into_response(),
        Err(e) => errors::ledger_error_to_response(e),
    }
}

pub async fn withdraw(
    Extension(services): Extension<Arc<AppServices>>,
    Extension(principal): Extension<PrincipalContext>,
    fraud: Option<Extension<FraudContext>>,
    body: Result<Json<dto::MovementBody>, JsonRejection>,
) -> Response {
    let Json(body) = match body {
        Ok(body) => body,
        Err(e) => return errors::bad_request(e),
    };

    let cmd = Withdraw {
        account: principal.account_id(),
        amount: body.amount,
        currency: body.currency,
        description: body.description,
        fraud: fraud.map(|Extension(ctx)| ctx),
    };
    match services.ledger.withdraw(cmd).await {
        Ok(receipt) => (
            StatusCode::OK,
            Json(dto::MovementView::new("Withdrawal successful", receipt)),
        )
            .into_response(),
        Err(e) => errors::ledger_error_to_response(e),
    }
}

pub async fn transfer(
    Extension(services): Extension<Arc<AppServices>>,
    Extension(principal): Extension<PrincipalContext>,
    fraud: Option<Extension<FraudContext>>,
    body: Result<Json<dto::TransferBody>, JsonRejection>,
) -> Response {
    let Json(body) = match body {
        Ok(body) => body,
        Err(e) => return errors::bad_request(e),
    };

    let receiver = match (body.receiver_id, body.receiver_email) {
        (Some(id), _) => ReceiverRef::Id(id),
        (None, Some(email)) if !email.trim().is_empty() => ReceiverRef::Email(email),
        _ => {
            return errors::json_error(
                StatusCode::BAD_REQUEST,
                "validation_error",
                "Receiver email or id is required",
            );
        }
    };

    let cmd = Transfer {
        sender: principal.account_id(),
        receiver,
        amount: body.amount,
        currency: body.currency,
        description: body.description,
        fraud: fraud.map(|Extension(ctx)| ctx),
    };
    match services.ledger.transfer(cmd).await {
        Ok(receipt) => (
            StatusCode::OK,
            Json(dto::MovementView::new("Transfer successful", receipt)),
        )
            .into_response(),
        Err(e) => errors::ledger_error_to_response(e),
    }
}

/// Balance of the caller's USD wallet.
pub async fn balance(
    Extension(services): Extension<Arc<AppServices>>,
    Extension(principal): Extension<PrincipalContext>,
) -> Response {
    match services.ledger.balance(principal.account_id(), Currency::Usd).await {
        Ok(balance) => (
            StatusCode::OK,
            Json(dto::BalanceView {
                balance: balance.value(),
            }),
        )
            .into_response(),
        Err(e) => errors::ledger_error_to_response(e),
    }
}

pub async fn balances(
    Extension(services): Extension<Arc<AppServices>>,
    Extension(principal): Extension<PrincipalContext>,
) -> Response {
    match services.ledger.balances(principal.account_id()).await {
        Ok(wallets) => {
            let wallets = wallets
                .into_iter()
                .map(dto::WalletView::from)
                .collect::<Vec<_>>();
            (StatusCode::OK, Json(serde_json::json!({ "wallets": wallets }))).into_response()
        }
        Err(e) => errors::ledger_error_to_response(e),
    }
}

pub async fn transactions(
    Extension(services): Extension<Arc<AppServices>>,
    Extension(principal): Extension<PrincipalContext>,
    query: Result<Query<dto::PageQuery>, QueryRejection>,
) -> Response {
    let Query(q) = match query {
        Ok(q) => q,
        Err(e) => return errors::bad_request(e),
    };

    let pagination = Pagination::new(q.page, q.limit);
    match services.ledger.history(principal.account_id(), pagination).await {
        Ok(page) => (StatusCode::OK, Json(dto::TransactionPageView::from(page))).into_response(),
        Err(e) => errors::ledger_error_to_response(e),
    }
}
