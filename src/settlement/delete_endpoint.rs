use std::sync::{Arc, Mutex};

use axum::{
    Extension,
    extract::{FromRef, Path, State},
    http::StatusCode,
    response::{IntoResponse, Response},
};
use axum_htmx::HxRedirect;
use rusqlite::Connection;

use crate::{
    AppState, Error,
    auth::UserID,
    database_id::SettlementId,
    endpoints,
    settlement::delete_settlement,
    timezone::{get_local_offset, local_now},
};

/// The state needed to delete a settlement.
#[derive(Debug, Clone)]
pub struct DeleteSettlementState {
    /// The database connection for managing settlements.
    pub db_connection: Arc<Mutex<Connection>>,
    /// The local timezone as a canonical timezone name, e.g. "Pacific/Auckland".
    pub local_timezone: String,
}

impl FromRef<AppState> for DeleteSettlementState {
    fn from_ref(state: &AppState) -> Self {
        Self {
            db_connection: state.db_connection.clone(),
            local_timezone: state.local_timezone.clone(),
        }
    }
}

/// Delete a settlement and send the user back to the income page, where its
/// entries are listed as unsettled again.
pub async fn delete_settlement_endpoint(
    State(state): State<DeleteSettlementState>,
    Extension(user_id): Extension<UserID>,
    Path(settlement_id): Path<SettlementId>,
) -> Response {
    let Some(local_offset) = get_local_offset(&state.local_timezone) else {
        tracing::error!("Invalid timezone {}", state.local_timezone);
        return Error::InvalidTimezoneError(state.local_timezone).into_alert_response();
    };

    let connection = match state.db_connection.lock() {
        Ok(connection) => connection,
        Err(error) => {
            tracing::error!("could not acquire database lock: {error}");
            return Error::DatabaseLockError.into_alert_response();
        }
    };

    match delete_settlement(user_id, settlement_id, local_now(local_offset), &connection) {
        Ok(_) => (
            HxRedirect(endpoints::INCOME_VIEW.to_owned()),
            StatusCode::SEE_OTHER,
        )
            .into_response(),
        Err(Error::DeleteMissingSettlement) => {
            Error::DeleteMissingSettlement.into_alert_response()
        }
        Err(error) => {
            tracing::error!("Could not delete settlement {settlement_id}: {error}");
            error.into_alert_response()
        }
    }
}

#[cfg(test)]
mod delete_settlement_endpoint_tests {
    use axum::{
        Extension,
        extract::{Path, State},
        http::StatusCode,
    };
    use time::macros::{date, datetime};

    use crate::{
        endpoints,
        income::get_unsettled_entries,
        settlement::{
            delete_endpoint::{DeleteSettlementState, delete_settlement_endpoint},
            get_settlement, settle,
        },
        test_utils::{
            assert_hx_redirect, get_shared_test_connection, insert_test_entry, insert_test_user,
        },
    };

    #[tokio::test]
    async fn deletes_settlement_and_restores_entries() {
        let db_connection = get_shared_test_connection();
        let (user, result) = {
            let connection = db_connection.lock().unwrap();
            let user = insert_test_user("driver", false, &connection);
            insert_test_entry(user.id, date!(2025 - 03 - 01), "ONT8", 20_000, &connection);
            insert_test_entry(user.id, date!(2025 - 03 - 02), "FUEL", 6_000, &connection);
            let result = settle(user.id, datetime!(2025-03-03 09:00:00), &connection).unwrap();
            (user, result)
        };
        let state = DeleteSettlementState {
            db_connection: db_connection.clone(),
            local_timezone: "Etc/UTC".to_owned(),
        };

        let response =
            delete_settlement_endpoint(State(state), Extension(user.id), Path(result.settlement_id))
                .await;

        assert_eq!(response.status(), StatusCode::SEE_OTHER);
        assert_hx_redirect(&response, endpoints::INCOME_VIEW);
        let connection = db_connection.lock().unwrap();
        assert!(get_settlement(user.id, result.settlement_id, &connection).is_err());
        assert_eq!(get_unsettled_entries(user.id, &connection).unwrap().len(), 2);
    }

    #[tokio::test]
    async fn other_users_settlement_is_not_found() {
        let db_connection = get_shared_test_connection();
        let (owner, other, result) = {
            let connection = db_connection.lock().unwrap();
            let owner = insert_test_user("owner", false, &connection);
            let other = insert_test_user("other", false, &connection);
            insert_test_entry(owner.id, date!(2025 - 03 - 01), "ONT8", 20_000, &connection);
            let result = settle(owner.id, datetime!(2025-03-02 09:00:00), &connection).unwrap();
            (owner, other, result)
        };
        let state = DeleteSettlementState {
            db_connection: db_connection.clone(),
            local_timezone: "Etc/UTC".to_owned(),
        };

        let response = delete_settlement_endpoint(
            State(state),
            Extension(other.id),
            Path(result.settlement_id),
        )
        .await;

        assert_eq!(response.status(), StatusCode::NOT_FOUND);
        assert!(
            get_settlement(owner.id, result.settlement_id, &db_connection.lock().unwrap()).is_ok()
        );
    }
}
