//! Defines the "settle now" endpoint.
use std::sync::{Arc, Mutex};

use axum::{
    Extension,
    extract::{FromRef, State},
    http::StatusCode,
    response::{IntoResponse, Response},
};
use axum_htmx::HxRedirect;
use rusqlite::Connection;

use crate::{
    AppState, Error,
    auth::UserID,
    endpoints::{self, format_endpoint},
    settlement::settle,
    timezone::{get_local_offset, local_now},
};

/// The state needed to settle a user's income entries.
#[derive(Debug, Clone)]
pub struct CreateSettlementState {
    /// The database connection for settling entries.
    pub db_connection: Arc<Mutex<Connection>>,
    /// The local timezone as a canonical timezone name, e.g. "Pacific/Auckland".
    pub local_timezone: String,
}

impl FromRef<AppState> for CreateSettlementState {
    fn from_ref(state: &AppState) -> Self {
        Self {
            db_connection: state.db_connection.clone(),
            local_timezone: state.local_timezone.clone(),
        }
    }
}

/// Settle every unsettled entry of the logged in user, redirecting to the new settlement.
///
/// The request has no body, the user comes from the session.
pub async fn create_settlement_endpoint(
    State(state): State<CreateSettlementState>,
    Extension(user_id): Extension<UserID>,
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

    match settle(user_id, local_now(local_offset), &connection) {
        Ok(result) => (
            HxRedirect(format_endpoint(
                endpoints::SETTLEMENT_VIEW,
                result.settlement_id,
            )),
            StatusCode::SEE_OTHER,
        )
            .into_response(),
        // `settle` has already logged the outcome.
        Err(error) => error.into_alert_response(),
    }
}
