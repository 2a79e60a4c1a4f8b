use std::sync::Arc;

use axum::{
    extract::{Extension, Path},
    http::StatusCode,
    response::IntoResponse,
    routing::get,
    Json, Router,
};

use crate::app::dto::{self, ListResponse};
use crate::app::errors;
use crate::app::services::AppServices;
use crate::context::TenantContext;

pub fn router() -> Router {
    Router::new()
        .route("/:control", get(list_parties))
        .route("/:control/:party", get(get_party))
}

/// Every customer (or vendor) under a receivable (or payable) control account.
pub async fn list_parties(
    Extension(services): Extension<Arc<AppServices>>,
    Extension(tenant): Extension<TenantContext>,
    Path(control): Path<String>,
) -> axum::response::Response {
    let control = match dto::parse_account_code(&control) {
        Ok(c) => c,
        Err(resp) => return resp,
    };

    let items = services.projections.party_ledger.list(tenant.tenant_id(), &control);
    (StatusCode::OK, Json(ListResponse { items })).into_response()
}

pub async fn get_party(
    Extension(services): Extension<Arc<AppServices>>,
    Extension(tenant): Extension<TenantContext>,
    Path((control, party)): Path<(String, String)>,
) -> axum::response::Response {
    let control = match dto::parse_account_code(&control) {
        Ok(c) => c,
        Err(resp) => return resp,
    };

    match services
        .projections
        .party_ledger
        .get(tenant.tenant_id(), &control, &party)
    {
        Some(account) => (StatusCode::OK, Json(account)).into_response(),
        None => errors::json_error(StatusCode::NOT_FOUND, "not_found", "party not found"),
    }
}
