//! The API endpoints URIs.
//!
//! For endpoints that take a parameter, e.g., '/settlements/{settlement_id}', use [format_endpoint].

/// The root route which redirects to the income page or log in page.
pub const ROOT: &str = "/";
/// The landing page for logged in users: new entries, unsettled entries and the settle button.
pub const INCOME_VIEW: &str = "/income";
/// The page listing the user's settlements.
pub const SETTLEMENTS_VIEW: &str = "/settlements";
/// The page showing a single settlement and its entries.
pub const SETTLEMENT_VIEW: &str = "/settlements/{settlement_id}";
/// The page showing monthly and yearly totals.
pub const SUMMARY_VIEW: &str = "/summary";
/// The page for changing the user's own password.
pub const ACCOUNT_VIEW: &str = "/account";
/// The page listing all users (admin only).
pub const ADMIN_USERS_VIEW: &str = "/admin/users";
/// The page showing period totals for a single user (admin only).
pub const ADMIN_USER_SUMMARY_VIEW: &str = "/admin/users/{user_id}/summary";
/// The route for getting the registration page.
pub const REGISTER_VIEW: &str = "/register";
/// The route for getting the log in page.
pub const LOG_IN_VIEW: &str = "/log_in";
/// The page to display when an internal server error occurs.
pub const INTERNAL_ERROR_VIEW: &str = "/error";
/// The route for static files.
pub const STATIC: &str = "/static";

/// The route for logging in a user.
pub const LOG_IN_API: &str = "/api/log_in";
/// The route for the client to log out the current user.
pub const LOG_OUT: &str = "/api/log_out";
/// The route to register users.
pub const USERS: &str = "/api/users";
/// The route for changing the current user's password.
pub const ACCOUNT_PASSWORD: &str = "/api/account/password";
/// The route to create income entries.
pub const INCOME_API: &str = "/api/income";
/// The route to delete a single income entry.
pub const DELETE_INCOME_ENTRY: &str = "/api/income/{entry_id}";
/// The route to settle all unsettled income entries.
pub const SETTLEMENTS_API: &str = "/api/settlements";
/// The route to delete a settlement.
pub const DELETE_SETTLEMENT: &str = "/api/settlements/{settlement_id}";
/// The route to download a settlement as CSV.
pub const EXPORT_SETTLEMENT: &str = "/api/settlements/{settlement_id}/export";
/// The route for an administrator to set another user's password.
pub const ADMIN_USER_PASSWORD: &str = "/api/admin/users/{user_id}/password";
/// The route for an administrator to delete a user and all of their data.
pub const ADMIN_DELETE_USER: &str = "/api/admin/users/{user_id}";

/// Replace the parameter in `endpoint_path` with `id`.
///
/// A parameter is a string that starts with a left brace, followed by
/// lowercase letters or underscores, and ends with a right brace.
/// For example, in the endpoint path '/users/{user_id}', '{user_id}' is the parameter.
///
/// If no parameter is found in `endpoint_path`, the function returns the
/// the original `endpoint_path`.
pub fn format_endpoint(endpoint_path: &str, id: i64) -> String {
    let Some(param_start) = endpoint_path.find('{') else {
        return endpoint_path.to_owned();
    };

    let param_end = endpoint_path[param_start..]
        .find('}')
        .map(|offset| param_start + offset + 1)
        .unwrap_or(endpoint_path.len());

    format!(
        "{}{}{}",
        &endpoint_path[..param_start],
        id,
        &endpoint_path[param_end..]
    )
}
