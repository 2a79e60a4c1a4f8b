use axum::{
    http::{HeaderMap, StatusCode},
    middleware::Next,
    response::Response,
};

use ledgerforge_core::TenantId;

use crate::app::errors::json_error;
use crate::context::TenantContext;

pub const TENANT_HEADER: &str = "x-tenant-id";

/// Resolve the tenant from `X-Tenant-Id` and attach a [`TenantContext`].
pub async fn tenant_middleware(
    mut req: axum::http::Request<axum::body::Body>,
    next: Next,
) -> Response {
    let tenant_id = match extract_tenant(req.headers()) {
        Ok(t) => t,
        Err(msg) => return json_error(StatusCode::BAD_REQUEST, "invalid_tenant", msg),
    };

    req.extensions_mut().insert(TenantContext::new(tenant_id));
    next.run(req).await
}

fn extract_tenant(headers: &HeaderMap) -> Result<TenantId, &'static str> {
    let header = headers
        .get(TENANT_HEADER)
        .ok_or("missing X-Tenant-Id header")?;

    let header = header
        .to_str()
        .map_err(|_| "X-Tenant-Id header is not valid ASCII")?;

    header
        .trim()
        .parse()
        .map_err(|_| "X-Tenant-Id header is not a valid tenant id")
}
