//! Defines the app level error type and conversions to rendered HTML pages and alerts.
use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
};

use crate::{alert::Alert, error_page::ErrorPage};

/// The errors that may occur in the application.
#[derive(Debug, thiserror::Error, PartialEq)]
pub enum Error {
    /// The user provided an invalid combination of username and password.
    #[error("invalid username or password")]
    InvalidCredentials,

    /// The auth cookie is missing from the cookie jar in the request.
    #[error("no cookies in the cookie jar :(")]
    CookieMissing,

    /// The auth cookie could not be decoded or has expired.
    #[error("the auth token is invalid or has expired")]
    InvalidToken,

    /// The user provided a password that is too easy to guess.
    #[error("password is too weak: {0}")]
    TooWeak(String),

    /// The password and its confirmation differ.
    #[error("the passwords do not match")]
    PasswordMismatch,

    /// The new password is the same as the current password.
    #[error("the new password must be different from the current password")]
    PasswordUnchanged,

    /// An unexpected error occurred with the underlying hashing library.
    ///
    /// The error string should only be logged for debugging on the server.
    /// When communicating with the application client this error should be
    /// replaced with a general error type indicating an internal server error.
    #[error("hashing failed: {0}")]
    HashingError(String),

    /// The username is empty or too long.
    #[error("{0}")]
    InvalidUsername(String),

    /// The username is already taken by another user.
    #[error("that username is already taken")]
    DuplicateUsername,

    /// A money amount could not be parsed or was not positive.
    #[error("\"{0}\" is not a valid amount, expected a positive number up to 1000000 with at most two decimal places")]
    InvalidAmount(String),

    /// The destination of an income entry is empty or too long.
    #[error("{0}")]
    InvalidDestination(String),

    /// The "other" destination was chosen without naming the destination.
    #[error("a custom destination is required when the destination is \"other\"")]
    MissingCustomDestination,

    /// A date string could not be parsed.
    #[error("\"{0}\" is not a valid date")]
    InvalidDate(String),

    /// The parameters for a summary period were missing or out of range.
    #[error("invalid summary period: {0}")]
    InvalidSummaryPeriod(String),

    /// The requested resource was not found.
    ///
    /// For HTTP request handlers, the client should check that the parameters
    /// (e.g., ID) are correct and that the resource has been created.
    ///
    /// Internally, this error may occur when a query returns no rows.
    #[error("the requested resource could not be found")]
    NotFound,

    /// The user is logged in but is not allowed to access the resource.
    #[error("you do not have permission to access this resource")]
    Forbidden,

    /// An unhandled/unexpected SQL error.
    #[error("an unexpected SQL error occurred: {0}")]
    SqlError(rusqlite::Error),

    /// An error occurred while getting the local timezone from a canonical timezone string.
    #[error("invalid timezone {0}")]
    InvalidTimezoneError(String),

    /// An error occurred while serializing a struct as JSON
    #[error("could not serialize as JSON: {0}")]
    JSONSerializationError(String),

    /// An error occurred while writing a CSV export.
    #[error("could not write CSV: {0}")]
    CsvError(String),

    /// Could not acquire the database lock
    #[error("could not acquire the database lock")]
    DatabaseLockError,

    /// Tried to delete an income entry that does not exist or belongs to another user
    #[error("tried to delete an income entry that is not in the database")]
    DeleteMissingIncomeEntry,

    /// Tried to delete an income entry that has already been settled.
    #[error("the income entry has already been settled")]
    EntryAlreadySettled,

    /// The user asked to settle but has no unsettled income entries.
    ///
    /// This is an expected outcome rather than a fault.
    #[error("there are no unsettled income entries to settle")]
    NoUnsettledEntries,

    /// The settlement transaction could not be started.
    ///
    /// Nothing was changed, so the request can be retried.
    #[error("could not start the settlement transaction: {0}")]
    TransactionStartFailed(rusqlite::Error),

    /// Reading, inserting or updating failed during a settlement.
    ///
    /// The transaction was rolled back, so the request can be retried.
    #[error("the settlement failed and was rolled back: {0}")]
    SettlementFailed(rusqlite::Error),

    /// Committing the settlement failed after all writes were issued.
    ///
    /// The database may or may not contain the settlement, so the caller must
    /// check the settlement list before retrying.
    #[error("the settlement may not have been saved: {0}")]
    SettlementAmbiguous(rusqlite::Error),

    /// Tried to delete a settlement that does not exist or belongs to another user
    #[error("tried to delete a settlement that is not in the database")]
    DeleteMissingSettlement,

    /// Tried to update a user that does not exist
    #[error("tried to update a user that is not in the database")]
    UpdateMissingUser,

    /// Tried to delete a user that does not exist
    #[error("tried to delete a user that is not in the database")]
    DeleteMissingUser,

    /// An administrator tried to use an admin action on their own account.
    #[error("administrators cannot use this action on their own account")]
    CannotModifyOwnAccount,

    /// An administrator tried to delete another administrator.
    #[error("administrator accounts cannot be deleted")]
    CannotDeleteAdmin,
}

impl From<rusqlite::Error> for Error {
    fn from(value: rusqlite::Error) -> Self {
        match value {
            // Code 2067 occurs when a UNIQUE constraint failed.
            rusqlite::Error::SqliteFailure(sql_error, Some(ref desc))
                if sql_error.extended_code == 2067 && desc.ends_with("user.username") =>
            {
                Error::DuplicateUsername
            }
            rusqlite::Error::QueryReturnedNoRows => Error::NotFound,
            error => {
                tracing::error!("an unhandled SQL error occurred: {}", error);
                Error::SqlError(error)
            }
        }
    }
}

impl IntoResponse for Error {
    fn into_response(self) -> Response {
        match self {
            Error::NotFound => ErrorPage::not_found().into_response(),
            Error::Forbidden => ErrorPage {
                status: StatusCode::FORBIDDEN,
                description: "Access denied",
                fix: "This page is only available to administrators.",
            }
            .into_response(),
            Error::InvalidSummaryPeriod(reason) => ErrorPage {
                status: StatusCode::BAD_REQUEST,
                description: "Invalid summary period",
                fix: &reason,
            }
            .into_response(),
            Error::InvalidTimezoneError(timezone) => ErrorPage {
                status: StatusCode::INTERNAL_SERVER_ERROR,
                description: "Invalid Timezone Settings",
                fix: &format!(
                    "Could not get local timezone \"{timezone}\". Check your server settings and \
                    ensure the timezone has been set to valid, canonical timezone string"
                ),
            }
            .into_response(),
            Error::DatabaseLockError => ErrorPage::internal_server_error().into_response(),
            // Any errors that are not handled above are not intended to be shown to the client.
            error => {
                tracing::error!("An unexpected error occurred: {}", error);
                ErrorPage::internal_server_error().into_response()
            }
        }
    }
}

impl Error {
    /// Convert the error into an HTTP response with an HTML alert.
    pub fn into_alert_response(self) -> Response {
        let (status_code, alert) = match self {
            Error::InvalidTimezoneError(timezone) => (
                StatusCode::INTERNAL_SERVER_ERROR,
                Alert::Error {
                    message: "Invalid Timezone Settings".to_owned(),
                    details: format!(
                        "Could not get local timezone \"{timezone}\". Check your server settings and \
                    ensure the timezone has been set to valid, canonical timezone string"
                    ),
                },
            ),
            Error::InvalidAmount(_)
            | Error::InvalidDestination(_)
            | Error::MissingCustomDestination
            | Error::InvalidDate(_) => (
                StatusCode::BAD_REQUEST,
                Alert::Error {
                    message: "Invalid income entry".to_owned(),
                    details: self.to_string(),
                },
            ),
            Error::DeleteMissingIncomeEntry => (
                StatusCode::NOT_FOUND,
                Alert::Error {
                    message: "Could not delete income entry".to_owned(),
                    details: "The income entry could not be found. \
                    Try refreshing the page to see if the entry has already been deleted."
                        .to_owned(),
                },
            ),
            Error::EntryAlreadySettled => (
                StatusCode::CONFLICT,
                Alert::Error {
                    message: "Could not delete income entry".to_owned(),
                    details: "The entry belongs to a settlement. \
                    Delete the settlement first if the entry needs to be removed."
                        .to_owned(),
                },
            ),
            Error::NoUnsettledEntries => (
                StatusCode::UNPROCESSABLE_ENTITY,
                Alert::Error {
                    message: "Nothing to settle".to_owned(),
                    details: "Add some income entries before settling.".to_owned(),
                },
            ),
            Error::TransactionStartFailed(_) => (
                StatusCode::SERVICE_UNAVAILABLE,
                Alert::Error {
                    message: "Could not start the settlement".to_owned(),
                    details: "Nothing was changed. Please try again.".to_owned(),
                },
            ),
            Error::SettlementFailed(_) => (
                StatusCode::INTERNAL_SERVER_ERROR,
                Alert::Error {
                    message: "Settlement failed".to_owned(),
                    details: "The settlement was rolled back and nothing was changed. \
                    Please try again."
                        .to_owned(),
                },
            ),
            Error::SettlementAmbiguous(_) => (
                StatusCode::INTERNAL_SERVER_ERROR,
                Alert::Error {
                    message: "Settlement may not have been saved".to_owned(),
                    details: "The settlement was submitted but could not be confirmed. \
                    Check the settlements page before trying again."
                        .to_owned(),
                },
            ),
            Error::DeleteMissingSettlement => (
                StatusCode::NOT_FOUND,
                Alert::Error {
                    message: "Could not delete settlement".to_owned(),
                    details: "The settlement could not be found. \
                    Try refreshing the page to see if the settlement has already been deleted."
                        .to_owned(),
                },
            ),
            Error::UpdateMissingUser => (
                StatusCode::NOT_FOUND,
                Alert::Error {
                    message: "Could not update user".to_owned(),
                    details: "The user could not be found.".to_owned(),
                },
            ),
            Error::DeleteMissingUser => (
                StatusCode::NOT_FOUND,
                Alert::Error {
                    message: "Could not delete user".to_owned(),
                    details: "The user could not be found. \
                    Try refreshing the page to see if the user has already been deleted."
                        .to_owned(),
                },
            ),
            Error::CannotModifyOwnAccount => (
                StatusCode::BAD_REQUEST,
                Alert::Error {
                    message: "Not allowed on your own account".to_owned(),
                    details: "Use the account page to change your own password.".to_owned(),
                },
            ),
            Error::CannotDeleteAdmin => (
                StatusCode::BAD_REQUEST,
                Alert::Error {
                    message: "Could not delete user".to_owned(),
                    details: "Administrator accounts cannot be deleted.".to_owned(),
                },
            ),
            Error::InvalidCredentials => (
                StatusCode::BAD_REQUEST,
                Alert::ErrorSimple {
                    message: "The current password is incorrect".to_owned(),
                },
            ),
            Error::PasswordMismatch => (
                StatusCode::BAD_REQUEST,
                Alert::ErrorSimple {
                    message: "The new passwords do not match".to_owned(),
                },
            ),
            Error::PasswordUnchanged => (
                StatusCode::BAD_REQUEST,
                Alert::Error {
                    message: "Password not changed".to_owned(),
                    details: self.to_string(),
                },
            ),
            Error::TooWeak(feedback) => (
                StatusCode::BAD_REQUEST,
                Alert::Error {
                    message: "Password is too weak".to_owned(),
                    details: feedback,
                },
            ),
            Error::Forbidden => (
                StatusCode::FORBIDDEN,
                Alert::ErrorSimple {
                    message: "Only administrators can do that".to_owned(),
                },
            ),
            Error::InvalidSummaryPeriod(reason) => (
                StatusCode::BAD_REQUEST,
                Alert::Error {
                    message: "Invalid summary period".to_owned(),
                    details: reason,
                },
            ),
            _ => (
                StatusCode::INTERNAL_SERVER_ERROR,
                Alert::Error {
                    message: "Something went wrong".to_owned(),
                    details:
                        "An unexpected error occurred, check the server logs for more details."
                            .to_owned(),
                },
            ),
        };

        (status_code, alert.into_html()).into_response()
    }
}
