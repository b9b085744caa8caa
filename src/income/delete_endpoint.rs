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
    database_id::IncomeEntryId,
    endpoints,
    income::delete_unsettled_income_entry,
};

/// The state needed to delete an income entry.
#[derive(Debug, Clone)]
pub struct DeleteIncomeState {
    /// The database connection for managing income entries.
    pub db_connection: Arc<Mutex<Connection>>,
}

impl FromRef<AppState> for DeleteIncomeState {
    fn from_ref(state: &AppState) -> Self {
        Self {
            db_connection: state.db_connection.clone(),
        }
    }
}

/// A route handler for deleting an unsettled income entry, redirects to the income page on success.
pub async fn delete_income_endpoint(
    State(state): State<DeleteIncomeState>,
    Extension(user_id): Extension<UserID>,
    Path(entry_id): Path<IncomeEntryId>,
) -> Response {
    let connection = match state.db_connection.lock() {
        Ok(connection) => connection,
        Err(error) => {
            tracing::error!("could not acquire database lock: {error}");
            return Error::DatabaseLockError.into_alert_response();
        }
    };

    match delete_unsettled_income_entry(user_id, entry_id, &connection) {
        Ok(()) => (
            HxRedirect(endpoints::INCOME_VIEW.to_owned()),
            StatusCode::SEE_OTHER,
        )
            .into_response(),
        Err(error @ (Error::DeleteMissingIncomeEntry | Error::EntryAlreadySettled)) => {
            tracing::debug!("user {user_id} could not delete income entry {entry_id}: {error}");
            error.into_alert_response()
        }
        Err(error) => {
            tracing::error!("Could not delete income entry {entry_id}: {error}");
            error.into_alert_response()
        }
    }
}
