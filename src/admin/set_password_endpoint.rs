use std::sync::{Arc, Mutex};

use axum::{
    Extension, Form,
    extract::{FromRef, Path, State},
    response::{IntoResponse, Response},
};
use rusqlite::Connection;
use serde::Deserialize;

use crate::{
    AppState, Error,
    alert::Alert,
    auth::{PasswordHash, UserID, ValidatedPassword, get_user_by_id, update_password},
};

/// The state needed to set another user's password.
#[derive(Debug, Clone)]
pub struct SetPasswordState {
    pub db_connection: Arc<Mutex<Connection>>,
}

impl FromRef<AppState> for SetPasswordState {
    fn from_ref(state: &AppState) -> Self {
        Self {
            db_connection: state.db_connection.clone(),
        }
    }
}

/// The data sent by the set password form on the users page.
#[derive(Deserialize)]
pub struct SetPasswordForm {
    pub new_password: String,
    pub confirm_password: String,
}

/// Replace the password of the user `target_id`.
///
/// Administrators must use the account page for their own password.
pub async fn set_password_endpoint(
    State(state): State<SetPasswordState>,
    Extension(admin_id): Extension<UserID>,
    Path(target_id): Path<UserID>,
    Form(form): Form<SetPasswordForm>,
) -> Response {
    if admin_id == target_id {
        return Error::CannotModifyOwnAccount.into_alert_response();
    }

    let connection = match state.db_connection.lock() {
        Ok(connection) => connection,
        Err(error) => {
            tracing::error!("could not acquire database lock: {error}");
            return Error::DatabaseLockError.into_alert_response();
        }
    };

    match set_password(target_id, &form, &connection) {
        Ok(username) => {
            tracing::info!("admin {admin_id} set the password of user {target_id}");

            Alert::SuccessSimple {
                message: format!("Password set for {username}"),
            }
            .into_html()
            .into_response()
        }
        Err(error) => error.into_alert_response(),
    }
}

fn set_password(
    target_id: UserID,
    form: &SetPasswordForm,
    connection: &Connection,
) -> Result<String, Error> {
    let user = match get_user_by_id(target_id, connection) {
        Ok(user) => user,
        Err(Error::NotFound) => return Err(Error::UpdateMissingUser),
        Err(error) => return Err(error),
    };

    let validated_password = ValidatedPassword::new(&form.new_password, &[user.username.as_str()])?;

    if form.new_password != form.confirm_password {
        return Err(Error::PasswordMismatch);
    }

    let password_hash = PasswordHash::new(validated_password, PasswordHash::DEFAULT_COST)?;
    update_password(target_id, &password_hash, connection)?;

    Ok(user.username.to_string())
}
