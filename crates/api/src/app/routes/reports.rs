use std::sync::Arc;

use axum::{
    extract::{Extension, Query},
    http::StatusCode,
    response::IntoResponse,
    routing::get,
    Json, Router,
};

use crate::app::{dto, errors};
use crate::app::services::AppServices;
use crate::context::TenantContext;

pub fn router() -> Router {
    Router::new()
        .route("/trial-balance", get(trial_balance))
        .route("/profit-and-loss", get(profit_and_loss))
}

pub async fn trial_balance(
    Extension(services): Extension<Arc<AppServices>>,
    Extension(tenant): Extension<TenantContext>,
) -> axum::response::Response {
    let report = services.projections.trial_balance(tenant.tenant_id());
    if !report.is_balanced() {
        tracing::error!(
            tenant_id = %tenant.tenant_id(),
            total_debits = %report.total_debits,
            total_credits = %report.total_credits,
            "trial balance does not balance"
        );
    }
    (StatusCode::OK, Json(report)).into_response()
}

/// GET /reports/profit-and-loss?from=YYYY-MM-DD&to=YYYY-MM-DD
pub async fn profit_and_loss(
    Extension(services): Extension<Arc<AppServices>>,
    Extension(tenant): Extension<TenantContext>,
    Query(range): Query<dto::DateRangeQuery>,
) -> axum::response::Response {
    let (Some(from), Some(to)) = (range.from, range.to) else {
        return errors::json_error(
            StatusCode::BAD_REQUEST,
            "validation_error",
            "both `from` and `to` are required",
        );
    };

    match services.projections.profit_and_loss(tenant.tenant_id(), from, to) {
        Ok(report) => (StatusCode::OK, Json(report)).into_response(),
        Err(e) => errors::ledger_error_to_response(e),
    }
}
