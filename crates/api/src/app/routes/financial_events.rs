//! Financial events: the record / amend / void lifecycle of business documents.

use std::sync::Arc;

use axum::{
    extract::{Extension, Path, Query},
    http::StatusCode,
    response::IntoResponse,
    routing::{post, put},
    Json, Router,
};

use ledgerforge_accounting::FinancialEvent;

use crate::app::{dto, errors};
use crate::app::services::AppServices;
use crate::context::TenantContext;

pub fn router() -> Router {
    Router::new()
        .route("/", post(record_event))
        .route("/:kind/:id", put(amend_event).delete(void_event))
}

pub async fn record_event(
    Extension(services): Extension<Arc<AppServices>>,
    Extension(tenant): Extension<TenantContext>,
    Json(event): Json<FinancialEvent>,
) -> axum::response::Response {
    match services.ledger.post(tenant.tenant_id(), event) {
        Ok(entry) => (StatusCode::CREATED, Json(entry)).into_response(),
        Err(e) => errors::dispatch_error_to_response(e),
    }
}

/// PUT /financial-events/:kind/:id
///
/// Replaces the posting of an existing document: the active entry is reversed
/// and the new one posted in one append.
pub async fn amend_event(
    Extension(services): Extension<Arc<AppServices>>,
    Extension(tenant): Extension<TenantContext>,
    Path((kind, id)): Path<(String, String)>,
    Json(event): Json<FinancialEvent>,
) -> axum::response::Response {
    let source = match dto::parse_source(&kind, &id) {
        Ok(s) => s,
        Err(resp) => return resp,
    };
    match event.source() {
        Ok(body_source) if body_source == source => {}
        Ok(body_source) => {
            return errors::json_error(
                StatusCode::BAD_REQUEST,
                "validation_error",
                format!("body describes {body_source} but the path names {source}"),
            );
        }
        Err(e) => return errors::ledger_error_to_response(e),
    }

    match services.ledger.amend(tenant.tenant_id(), event) {
        Ok(entry) => (StatusCode::OK, Json(entry)).into_response(),
        Err(e) => errors::dispatch_error_to_response(e),
    }
}

/// DELETE /financial-events/:kind/:id?date=YYYY-MM-DD&reason=...
///
/// Voids a document by posting the reversal of its active entry.
pub async fn void_event(
    Extension(services): Extension<Arc<AppServices>>,
    Extension(tenant): Extension<TenantContext>,
    Path((kind, id)): Path<(String, String)>,
    Query(query): Query<dto::ReverseQuery>,
) -> axum::response::Response {
    let source = match dto::parse_source(&kind, &id) {
        Ok(s) => s,
        Err(resp) => return resp,
    };

    match services
        .ledger
        .reverse(tenant.tenant_id(), source, query.date, query.reason)
    {
        Ok(reversal) => (StatusCode::OK, Json(reversal)).into_response(),
        Err(e) => errors::dispatch_error_to_response(e),
    }
}
