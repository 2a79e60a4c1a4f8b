use axum::Router;

pub mod financial_events;
pub mod ledger;
pub mod parties;
pub mod reports;
pub mod system;

/// Router for all tenant-scoped endpoints.
pub fn router() -> Router {
    Router::new()
        .nest("/ledger", ledger::router())
        .nest("/financial-events", financial_events::router())
        .nest("/parties", parties::router())
        .nest("/reports", reports::router())
}
