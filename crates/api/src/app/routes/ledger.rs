use std::sync::Arc;

use axum::{
    extract::{Extension, Path, Query},
    http::StatusCode,
    response::IntoResponse,
    routing::{get, post},
    Json, Router,
};
use chrono::Utc;

use crate::app::dto::{self, ListResponse};
use crate::app::errors;
use crate::app::services::AppServices;
use crate::context::TenantContext;

pub fn router() -> Router {
    Router::new()
        .route("/open", post(open_ledger))
        .route("/accounts", get(list_accounts).post(open_account))
        .route("/accounts/:code", get(get_account))
        .route("/accounts/:code/register", get(get_register))
        .route("/journal", get(list_journal).post(post_journal_entry))
}

pub async fn open_ledger(
    Extension(services): Extension<Arc<AppServices>>,
    Extension(tenant): Extension<TenantContext>,
    Json(body): Json<dto::OpenLedgerRequest>,
) -> axum::response::Response {
    if let Err(e) = services.ledger.open(tenant.tenant_id(), body.accounts) {
        return errors::dispatch_error_to_response(e);
    }

    (
        StatusCode::CREATED,
        Json(serde_json::json!({ "tenant_id": tenant.tenant_id().to_string() })),
    )
        .into_response()
}

pub async fn list_accounts(
    Extension(services): Extension<Arc<AppServices>>,
    Extension(tenant): Extension<TenantContext>,
) -> axum::response::Response {
    let items = services
        .projections
        .balances
        .list(tenant.tenant_id())
        .into_iter()
        .map(dto::account_balance_to_response)
        .collect::<Vec<_>>();
    (StatusCode::OK, Json(ListResponse { items })).into_response()
}

pub async fn open_account(
    Extension(services): Extension<Arc<AppServices>>,
    Extension(tenant): Extension<TenantContext>,
    Json(body): Json<dto::OpenAccountRequest>,
) -> axum::response::Response {
    let account = match dto::to_account(&body) {
        Ok(a) => a,
        Err(resp) => return resp,
    };
    let opened_on = body.opened_on.unwrap_or_else(|| Utc::now().date_naive());

    match services
        .ledger
        .open_account(tenant.tenant_id(), account.clone(), body.opening_balance, opened_on)
    {
        Ok(opening_entry) => (
            StatusCode::CREATED,
            Json(dto::OpenAccountResponse { account, opening_entry }),
        )
            .into_response(),
        Err(e) => errors::dispatch_error_to_response(e),
    }
}

pub async fn get_account(
    Extension(services): Extension<Arc<AppServices>>,
    Extension(tenant): Extension<TenantContext>,
    Path(code): Path<String>,
) -> axum::response::Response {
    let code = match dto::parse_account_code(&code) {
        Ok(c) => c,
        Err(resp) => return resp,
    };

    match services.projections.balances.get(tenant.tenant_id(), &code) {
        Some(b) => (StatusCode::OK, Json(dto::account_balance_to_response(b))).into_response(),
        None => errors::json_error(StatusCode::NOT_FOUND, "not_found", "account not found"),
    }
}

/// Cash/bank register of a money account.
pub async fn get_register(
    Extension(services): Extension<Arc<AppServices>>,
    Extension(tenant): Extension<TenantContext>,
    Path(code): Path<String>,
) -> axum::response::Response {
    let code = match dto::parse_account_code(&code) {
        Ok(c) => c,
        Err(resp) => return resp,
    };

    match services.projections.cash_book.get(tenant.tenant_id(), &code) {
        Some(register) => (StatusCode::OK, Json(register)).into_response(),
        None => errors::json_error(
            StatusCode::NOT_FOUND,
            "not_found",
            "no cash or bank register for this account",
        ),
    }
}

pub async fn list_journal(
    Extension(services): Extension<Arc<AppServices>>,
    Extension(tenant): Extension<TenantContext>,
    Query(range): Query<dto::DateRangeQuery>,
) -> axum::response::Response {
    let items = services
        .projections
        .journal
        .list(tenant.tenant_id(), range.from, range.to);
    (StatusCode::OK, Json(ListResponse { items })).into_response()
}

pub async fn post_journal_entry(
    Extension(services): Extension<Arc<AppServices>>,
    Extension(tenant): Extension<TenantContext>,
    Json(body): Json<dto::PostJournalEntryRequest>,
) -> axum::response::Response {
    let manual = match dto::to_manual_entry(body) {
        Ok(m) => m,
        Err(resp) => return resp,
    };

    match services.ledger.post_manual(tenant.tenant_id(), manual) {
        Ok(entry) => (StatusCode::CREATED, Json(entry)).into_response(),
        Err(e) => errors::dispatch_error_to_response(e),
    }
}
