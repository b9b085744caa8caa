//! The account page where users change their own password.

use std::sync::{Arc, Mutex};

use axum::{
    Extension, Form,
    extract::{FromRef, State},
    response::{IntoResponse, Response},
};
use maud::{Markup, html};
use rusqlite::Connection;
use serde::Deserialize;

use crate::{
    AppState, Error,
    alert::Alert,
    auth::{PasswordHash, UserID, ValidatedPassword, get_user_by_id, update_password},
    endpoints,
    html::{BUTTON_PRIMARY_STYLE, FORM_CONTAINER_STYLE, base, loading_spinner, password_input},
    navigation::NavBar,
};

use super::register::PASSWORD_INPUT_MIN_LENGTH;

/// The state needed for the account page and password changes.
#[derive(Debug, Clone)]
pub struct AccountState {
    /// The database connection for reading and updating the user.
    pub db_connection: Arc<Mutex<Connection>>,
}

impl FromRef<AppState> for AccountState {
    fn from_ref(state: &AppState) -> Self {
        Self {
            db_connection: state.db_connection.clone(),
        }
    }
}

fn change_password_form() -> Markup {
    html! {
        form
            hx-put=(endpoints::ACCOUNT_PASSWORD)
            hx-swap="none"
            hx-target-error="#alert-container"
            hx-indicator="#indicator"
            hx-on--after-request="if(event.detail.successful) this.reset()"
            class="w-full space-y-4 md:space-y-6"
        {
            (password_input("current_password", "Current password", 0, None))
            (password_input("new_password", "New password", PASSWORD_INPUT_MIN_LENGTH, None))
            (password_input(
                "confirm_password",
                "Confirm new password",
                PASSWORD_INPUT_MIN_LENGTH,
                None
            ))

            button type="submit" id="submit-button" tabindex="0" class=(BUTTON_PRIMARY_STYLE)
            {
                span class="inline htmx-indicator" id="indicator"
                {
                    (loading_spinner())
                }
                "Change password"
            }
        }
    }
}

/// Display the account page for the logged in user.
pub async fn get_account_page(
    State(state): State<AccountState>,
    Extension(user_id): Extension<UserID>,
) -> Result<Response, Error> {
    let user = {
        let connection = state
            .db_connection
            .lock()
            .inspect_err(|error| tracing::error!("could not acquire database lock: {error}"))
            .map_err(|_| Error::DatabaseLockError)?;

        get_user_by_id(user_id, &connection)?
    };

    let nav_bar = NavBar::new(endpoints::ACCOUNT_VIEW, user.is_admin).into_html();

    let content = html! {
        (nav_bar)

        div class=(FORM_CONTAINER_STYLE)
        {
            div class="w-full max-w-md space-y-6"
            {
                h1 class="text-xl font-bold" { "Account" }

                p id="account-username"
                {
                    "Logged in as "
                    span class="font-semibold" { (user.username.as_str()) }
                    @if user.is_admin {
                        " (administrator)"
                    }
                }

                h2 class="text-lg font-semibold" { "Change password" }

                (change_password_form())
            }
        }
    };

    Ok(base("Account", &content).into_response())
}

/// The data sent by the change password form.
#[derive(Deserialize)]
pub struct ChangePasswordForm {
    pub current_password: String,
    pub new_password: String,
    pub confirm_password: String,
}

/// Change the logged in user's password after checking their current password.
pub async fn change_password_endpoint(
    State(state): State<AccountState>,
    Extension(user_id): Extension<UserID>,
    Form(form): Form<ChangePasswordForm>,
) -> Response {
    let connection = match state.db_connection.lock() {
        Ok(connection) => connection,
        Err(error) => {
            tracing::error!("could not acquire database lock: {error}");
            return Error::DatabaseLockError.into_alert_response();
        }
    };

    match change_password(user_id, &form, &connection) {
        Ok(()) => {
            tracing::info!("user {user_id} changed their password");

            Alert::SuccessSimple {
                message: "Password changed".to_owned(),
            }
            .into_html()
            .into_response()
        }
        Err(error) => error.into_alert_response(),
    }
}

fn change_password(
    user_id: UserID,
    form: &ChangePasswordForm,
    connection: &Connection,
) -> Result<(), Error> {
    let user = get_user_by_id(user_id, connection)?;

    let is_current_password = user
        .password_hash
        .verify(&form.current_password)
        .map_err(|error| Error::HashingError(error.to_string()))?;

    if !is_current_password {
        return Err(Error::InvalidCredentials);
    }

    if form.new_password == form.current_password {
        return Err(Error::PasswordUnchanged);
    }

    let validated_password = ValidatedPassword::new(&form.new_password, &[user.username.as_str()])?;

    if form.new_password != form.confirm_password {
        return Err(Error::PasswordMismatch);
    }

    let password_hash = PasswordHash::new(validated_password, PasswordHash::DEFAULT_COST)?;

    update_password(user_id, &password_hash, connection)
}


#[cfg(test)]
mod change_password_tests {
    use axum::{Extension, Form, extract::State, http::StatusCode, response::Response};

    use crate::{
        auth::{
            UserID,
            account::{AccountState, ChangePasswordForm, change_password_endpoint},
            get_user_by_id,
        },
        test_utils::{TEST_PASSWORD, get_shared_test_connection, insert_test_user},
    };

    const NEW_PASSWORD: &str = "a completely different and long passphrase";

    async fn change(
        state: &AccountState,
        user_id: UserID,
        current: &str,
        new: &str,
        confirm: &str,
    ) -> Response {
        let form = ChangePasswordForm {
            current_password: current.to_owned(),
            new_password: new.to_owned(),
            confirm_password: confirm.to_owned(),
        };

        change_password_endpoint(State(state.clone()), Extension(user_id), Form(form)).await
    }

    fn password_matches(state: &AccountState, user_id: UserID, password: &str) -> bool {
        let connection = state.db_connection.lock().unwrap();
        get_user_by_id(user_id, &connection)
            .unwrap()
            .password_hash
            .verify(password)
            .unwrap()
    }

    fn get_state_and_user() -> (AccountState, UserID) {
        let db_connection = get_shared_test_connection();
        let user = insert_test_user("driver", false, &db_connection.lock().unwrap());

        (AccountState { db_connection }, user.id)
    }

    #[tokio::test]
    async fn changes_password() {
        let (state, user_id) = get_state_and_user();

        let response = change(&state, user_id, TEST_PASSWORD, NEW_PASSWORD, NEW_PASSWORD).await;

        assert_eq!(response.status(), StatusCode::OK);
        assert!(password_matches(&state, user_id, NEW_PASSWORD));
    }

    #[tokio::test]
    async fn wrong_current_password_is_rejected() {
        let (state, user_id) = get_state_and_user();

        let response = change(&state, user_id, "not it", NEW_PASSWORD, NEW_PASSWORD).await;

        assert_eq!(response.status(), StatusCode::BAD_REQUEST);
        assert!(password_matches(&state, user_id, TEST_PASSWORD));
    }

    #[tokio::test]
    async fn unchanged_password_is_rejected() {
        let (state, user_id) = get_state_and_user();

        let response = change(&state, user_id, TEST_PASSWORD, TEST_PASSWORD, TEST_PASSWORD).await;

        assert_eq!(response.status(), StatusCode::BAD_REQUEST);
    }

    #[tokio::test]
    async fn weak_password_is_rejected() {
        let (state, user_id) = get_state_and_user();

        let response = change(&state, user_id, TEST_PASSWORD, "password1", "password1").await;

        assert_eq!(response.status(), StatusCode::BAD_REQUEST);
        assert!(password_matches(&state, user_id, TEST_PASSWORD));
    }

    #[tokio::test]
    async fn mismatched_confirmation_is_rejected() {
        let (state, user_id) = get_state_and_user();

        let response = change(
            &state,
            user_id,
            TEST_PASSWORD,
            NEW_PASSWORD,
            "a completely different and long passphrase!",
        )
        .await;

        assert_eq!(response.status(), StatusCode::BAD_REQUEST);
        assert!(password_matches(&state, user_id, TEST_PASSWORD));
    }
}
