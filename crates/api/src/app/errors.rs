use axum::http::StatusCode;
use axum::response::IntoResponse;
use serde_json::json;

use ledgerforge_accounting::{ErrorClass, LedgerError};
use ledgerforge_infra::command_dispatcher::DispatchError;

pub fn dispatch_error_to_response(err: DispatchError) -> axum::response::Response {
    match err {
        DispatchError::Ledger(e) => ledger_error_to_response(e),
        DispatchError::Concurrency(msg) => json_error(StatusCode::CONFLICT, "conflict", msg),
        DispatchError::TenantIsolation(msg) => {
            json_error(StatusCode::UNPROCESSABLE_ENTITY, "tenant_isolation", msg)
        }
        DispatchError::Deserialize(msg) => {
            json_error(StatusCode::INTERNAL_SERVER_ERROR, "deserialize_error", msg)
        }
        DispatchError::Store(e) => {
            tracing::error!(error = %e, "event store failure");
            json_error(StatusCode::INTERNAL_SERVER_ERROR, "store_error", e.to_string())
        }
        DispatchError::Unexpected(msg) => {
            json_error(StatusCode::INTERNAL_SERVER_ERROR, "internal_error", msg)
        }
    }
}

pub fn ledger_error_to_response(err: LedgerError) -> axum::response::Response {
    json_error(status_for(err.class()), ledger_error_code(&err), err.to_string())
}

fn status_for(class: ErrorClass) -> StatusCode {
    match class {
        ErrorClass::Validation => StatusCode::BAD_REQUEST,
        ErrorClass::NotFound => StatusCode::NOT_FOUND,
        ErrorClass::Conflict => StatusCode::CONFLICT,
        ErrorClass::Inconsistency => StatusCode::UNPROCESSABLE_ENTITY,
    }
}

fn ledger_error_code(err: &LedgerError) -> &'static str {
    match err {
        LedgerError::Validation(_) => "validation_error",
        LedgerError::Unbalanced { .. } => "unbalanced_entry",
        LedgerError::UnknownAccount(_) => "unknown_account",
        LedgerError::AccountResolution(_) => "account_resolution",
        LedgerError::NotFound(_) => "not_found",
        LedgerError::LedgerNotOpened => "ledger_not_opened",
        LedgerError::AlreadyOpened => "ledger_already_opened",
        LedgerError::DuplicatePosting(_) => "duplicate_posting",
        LedgerError::AlreadyReversed(_) => "already_reversed",
        LedgerError::DuplicateAccount(_) => "duplicate_account",
        LedgerError::TenantMismatch => "tenant_mismatch",
    }
}

pub fn json_error(
    status: StatusCode,
    code: &'static str,
    message: impl Into<String>,
) -> axum::response::Response {
    (
        status,
        axum::Json(json!({
            "error": code,
            "message": message.into(),
        })),
    )
        .into_response()
}

#[cfg(test)]
mod tests {
    use super::*;
    use ledgerforge_accounting::{AccountCode, SourceDocument, SourceKind};

    #[test]
    fn ledger_errors_map_by_class() {
        let source = SourceDocument::new(SourceKind::Expense, "exp-1").unwrap();
        let cases = [
            (LedgerError::validation("bad"), StatusCode::BAD_REQUEST),
            (LedgerError::UnknownAccount(AccountCode::new("9999").unwrap()), StatusCode::BAD_REQUEST),
            (LedgerError::NotFound(source.clone()), StatusCode::NOT_FOUND),
            (LedgerError::LedgerNotOpened, StatusCode::NOT_FOUND),
            (LedgerError::DuplicatePosting(source), StatusCode::CONFLICT),
            (LedgerError::resolution("no cash account"), StatusCode::UNPROCESSABLE_ENTITY),
        ];
        for (err, status) in cases {
            assert_eq!(ledger_error_to_response(err).status(), status);
        }
    }

    #[test]
    fn infrastructure_errors_are_server_side() {
        assert_eq!(
            dispatch_error_to_response(DispatchError::Concurrency("stale".into())).status(),
            StatusCode::CONFLICT
        );
        assert_eq!(
            dispatch_error_to_response(DispatchError::Unexpected("empty".into())).status(),
            StatusCode::INTERNAL_SERVER_ERROR
        );
    }
}
