use std::sync::{Arc, Mutex};

use axum::{
    Extension,
    extract::{FromRef, Path, State},
    http::StatusCode,
    response::{IntoResponse, Response},
};
use axum_htmx::HxRedirect;
use rusqlite::Connection;

use crate::{AppState, Error, admin::delete_user, auth::UserID, endpoints};

/// The state needed to delete a user.
#[derive(Debug, Clone)]
pub struct DeleteUserState {
    pub db_connection: Arc<Mutex<Connection>>,
}

impl FromRef<AppState> for DeleteUserState {
    fn from_ref(state: &AppState) -> Self {
        Self {
            db_connection: state.db_connection.clone(),
        }
    }
}

/// Delete a non-admin user with all of their data and reload the users page.
pub async fn delete_user_endpoint(
    State(state): State<DeleteUserState>,
    Extension(admin_id): Extension<UserID>,
    Path(target_id): Path<UserID>,
) -> Response {
    let connection = match state.db_connection.lock() {
        Ok(connection) => connection,
        Err(error) => {
            tracing::error!("could not acquire database lock: {error}");
            return Error::DatabaseLockError.into_alert_response();
        }
    };

    match delete_user(admin_id, target_id, &connection) {
        Ok(()) => (
            HxRedirect(endpoints::ADMIN_USERS_VIEW.to_owned()),
            StatusCode::SEE_OTHER,
        )
            .into_response(),
        Err(error @ (Error::CannotDeleteAdmin | Error::DeleteMissingUser)) => {
            tracing::warn!("admin {admin_id} could not delete user {target_id}: {error}");
            error.into_alert_response()
        }
        Err(error) => {
            tracing::error!("Could not delete user {target_id}: {error}");
            error.into_alert_response()
        }
    }
}
