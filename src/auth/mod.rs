//! User accounts, passwords, session cookies and the middleware that guards routes.

mod account;
pub(crate) mod cookie;
mod log_in;
mod log_out;
mod middleware;
mod password;
mod register;
mod user;

pub use account::{change_password_endpoint, get_account_page};
pub use cookie::{
    COOKIE_TOKEN, DEFAULT_COOKIE_DURATION, Token, get_token_from_cookies, invalidate_auth_cookie,
    set_auth_cookie,
};
pub use log_in::{get_log_in_page, post_log_in};
pub use log_out::get_log_out;
pub use middleware::{AdminState, AuthState, admin_guard, admin_guard_hx, auth_guard, auth_guard_hx};
pub use password::{PasswordHash, ValidatedPassword};
pub use register::{PASSWORD_INPUT_MIN_LENGTH, get_register_page, register_user};
pub use user::{
    User, UserID, Username, count_users, create_user, create_user_table, get_all_users,
    get_user_by_id, get_user_by_username, update_password,
};
