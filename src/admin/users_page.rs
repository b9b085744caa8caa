//! The user management page for administrators.

use std::sync::{Arc, Mutex};

use axum::{
    Extension,
    extract::{FromRef, State},
    response::{IntoResponse, Response},
};
use maud::{Markup, html};
use rusqlite::Connection;

use crate::{
    AppState, Error,
    auth::{PASSWORD_INPUT_MIN_LENGTH, User, UserID, get_all_users},
    endpoints::{self, format_endpoint},
    html::{
        FORM_TEXT_INPUT_STYLE, LINK_STYLE, PAGE_CONTAINER_STYLE, TABLE_CELL_STYLE,
        TABLE_HEADER_STYLE, TABLE_ROW_STYLE, TABLE_STYLE, base, delete_button, format_date_time,
    },
    navigation::NavBar,
};

/// The state needed for the users page.
#[derive(Debug, Clone)]
pub struct UsersPageState {
    pub db_connection: Arc<Mutex<Connection>>,
}

impl FromRef<AppState> for UsersPageState {
    fn from_ref(state: &AppState) -> Self {
        Self {
            db_connection: state.db_connection.clone(),
        }
    }
}

/// List every user with links to their summary and controls to manage them.
pub async fn get_users_page(
    State(state): State<UsersPageState>,
    Extension(admin_id): Extension<UserID>,
) -> Result<Response, Error> {
    let users = {
        let connection = state
            .db_connection
            .lock()
            .inspect_err(|error| tracing::error!("could not acquire database lock: {error}"))
            .map_err(|_| Error::DatabaseLockError)?;

        get_all_users(&connection)?
    };

    let nav_bar = NavBar::new(endpoints::ADMIN_USERS_VIEW, true).into_html();

    let content = html! {
        (nav_bar)

        main class=(PAGE_CONTAINER_STYLE)
        {
            section class="w-full space-y-4"
            {
                h1 class="text-xl font-bold" { "Users" }

                div class="w-full overflow-x-auto"
                {
                    table class=(TABLE_STYLE)
                    {
                        thead class=(TABLE_HEADER_STYLE)
                        {
                            tr
                            {
                                th scope="col" class=(TABLE_CELL_STYLE) { "ID" }
                                th scope="col" class=(TABLE_CELL_STYLE) { "Username" }
                                th scope="col" class=(TABLE_CELL_STYLE) { "Role" }
                                th scope="col" class=(TABLE_CELL_STYLE) { "Registered" }
                                th scope="col" class=(TABLE_CELL_STYLE) { "Actions" }
                            }
                        }

                        tbody id="users"
                        {
                            @for user in &users {
                                (user_row(user, user.id == admin_id))
                            }
                        }
                    }
                }
            }
        }
    };

    Ok(base("Users", &content).into_response())
}

fn user_row(user: &User, is_current_user: bool) -> Markup {
    let summary_url = format!(
        "{}?period=monthly",
        format_endpoint(endpoints::ADMIN_USER_SUMMARY_VIEW, user.id.as_i64())
    );

    html! {
        tr class=(TABLE_ROW_STYLE) data-user-id=(user.id)
        {
            td class=(TABLE_CELL_STYLE) { (user.id) }
            td class=(TABLE_CELL_STYLE)
            {
                (user.username.as_str())
                @if is_current_user {
                    " (you)"
                }
            }
            td class=(TABLE_CELL_STYLE)
            {
                @if user.is_admin { "Administrator" } @else { "User" }
            }
            td class=(TABLE_CELL_STYLE) { (format_date_time(user.created_at)) }
            td class="px-6 py-4 space-y-2"
            {
                a href=(summary_url) class=(LINK_STYLE) { "Summary" }

                @if !is_current_user {
                    (set_password_form(user))
                }

                @if !user.is_admin {
                    (delete_button(
                        &format_endpoint(endpoints::ADMIN_DELETE_USER, user.id.as_i64()),
                        &format!(
                            "Delete {} and all of their income and settlements? This cannot be undone.",
                            user.username
                        ),
                        "Delete user"
                    ))
                }
            }
        }
    }
}

fn set_password_form(user: &User) -> Markup {
    html! {
        form
            hx-put=(format_endpoint(endpoints::ADMIN_USER_PASSWORD, user.id.as_i64()))
            hx-swap="none"
            hx-target-error="#alert-container"
            hx-on--after-request="if(event.detail.successful) this.reset()"
            class="flex flex-wrap gap-2"
        {
            input
                type="password"
                name="new_password"
                aria-label={"New password for " (user.username)}
                placeholder="New password"
                minlength=(PASSWORD_INPUT_MIN_LENGTH)
                class=(FORM_TEXT_INPUT_STYLE)
                required;
            input
                type="password"
                name="confirm_password"
                aria-label={"Confirm new password for " (user.username)}
                placeholder="Confirm"
                minlength=(PASSWORD_INPUT_MIN_LENGTH)
                class=(FORM_TEXT_INPUT_STYLE)
                required;
            button type="submit" class=(LINK_STYLE) { "Set password" }
        }
    }
}
