//! Defines the endpoint for recording a new income entry.
use std::sync::{Arc, Mutex};

use axum::{
    Extension,
    extract::{FromRef, State},
    http::StatusCode,
    response::{IntoResponse, Response},
};
// Must use axum_extra's Form since that parses an empty string as None instead
// of crashing like axum::Form.
use axum_extra::extract::Form;
use axum_htmx::HxRedirect;
use rusqlite::Connection;
use serde::Deserialize;
use time::{Date, format_description::BorrowedFormatItem, macros::format_description};

use crate::{
    AppState, Error,
    auth::UserID,
    endpoints,
    income::{NewIncomeEntry, create_income_entry},
    money::Amount,
    timezone::{get_local_offset, local_now},
};

const ENTRY_DATE_FORMAT: &[BorrowedFormatItem] = format_description!("[year]-[month]-[day]");

/// The state needed to record an income entry.
#[derive(Debug, Clone)]
pub struct CreateIncomeState {
    /// The database connection for managing income entries.
    pub db_connection: Arc<Mutex<Connection>>,
    /// The local timezone as a canonical timezone name, e.g. "Pacific/Auckland".
    pub local_timezone: String,
}

impl FromRef<AppState> for CreateIncomeState {
    fn from_ref(state: &AppState) -> Self {
        Self {
            db_connection: state.db_connection.clone(),
            local_timezone: state.local_timezone.clone(),
        }
    }
}

/// The form data for recording an income entry.
#[derive(Debug, Deserialize)]
pub struct IncomeForm {
    /// The day of the trip as an ISO 8601 date, e.g. "2025-03-01".
    pub entry_date: String,
    /// A preset destination code, "FUEL" or "OTHER".
    pub destination: String,
    /// The destination typed in when `destination` is "OTHER".
    #[serde(default)]
    pub custom_destination: Option<String>,
    /// The amount in dollars, e.g. "200" or "12.50".
    pub amount: String,
    /// Present when the fuel checkbox is ticked.
    #[serde(default)]
    pub is_fuel_expense: Option<String>,
}

impl IncomeForm {
    fn validate(&self) -> Result<NewIncomeEntry, Error> {
        let entry_date = Date::parse(self.entry_date.trim(), ENTRY_DATE_FORMAT)
            .map_err(|_| Error::InvalidDate(self.entry_date.clone()))?;
        let amount = Amount::parse_positive(&self.amount)?;

        NewIncomeEntry::new(
            entry_date,
            &self.destination,
            self.custom_destination.as_deref(),
            amount,
            self.is_fuel_expense.is_some(),
        )
    }
}

/// A route handler for recording an income entry, redirects to the income page on success.
pub async fn create_income_endpoint(
    State(state): State<CreateIncomeState>,
    Extension(user_id): Extension<UserID>,
    Form(form): Form<IncomeForm>,
) -> Response {
    let Some(local_offset) = get_local_offset(&state.local_timezone) else {
        tracing::error!("Invalid timezone {}", state.local_timezone);
        return Error::InvalidTimezoneError(state.local_timezone).into_alert_response();
    };

    let new_entry = match form.validate() {
        Ok(new_entry) => new_entry,
        Err(error) => return error.into_alert_response(),
    };

    let connection = match state.db_connection.lock() {
        Ok(connection) => connection,
        Err(error) => {
            tracing::error!("could not acquire database lock: {error}");
            return Error::DatabaseLockError.into_alert_response();
        }
    };

    if let Err(error) =
        create_income_entry(user_id, new_entry, local_now(local_offset), &connection)
    {
        tracing::error!("could not create income entry: {error}");

        return error.into_alert_response();
    }

    (
        HxRedirect(endpoints::INCOME_VIEW.to_owned()),
        StatusCode::SEE_OTHER,
    )
        .into_response()
}
