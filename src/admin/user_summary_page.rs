//! Lets administrators look up any user's totals for a year, month or week.

use std::sync::{Arc, Mutex};

use axum::{
    extract::{FromRef, Path, Query, State},
    response::{IntoResponse, Response},
};
use maud::{Markup, html};
use rusqlite::Connection;
use serde::Deserialize;

use crate::{
    AppState, Error,
    auth::{UserID, get_user_by_id},
    endpoints::{self, format_endpoint},
    html::{
        BUTTON_PRIMARY_STYLE, FORM_LABEL_STYLE, FORM_TEXT_INPUT_STYLE, PAGE_CONTAINER_STYLE, base,
        totals_cards,
    },
    navigation::NavBar,
    summary::{MAX_WEEK, SummaryPeriod, get_period_totals},
};

/// The state needed for the user summary page.
#[derive(Debug, Clone)]
pub struct UserSummaryState {
    pub db_connection: Arc<Mutex<Connection>>,
}

impl FromRef<AppState> for UserSummaryState {
    fn from_ref(state: &AppState) -> Self {
        Self {
            db_connection: state.db_connection.clone(),
        }
    }
}

/// The raw summary parameters. They are validated by [SummaryPeriod::from_query].
#[derive(Debug, Default, Deserialize)]
pub struct UserSummaryQuery {
    pub period: Option<String>,
    pub year: Option<String>,
    pub month: Option<String>,
    pub week: Option<String>,
}

/// Render the totals of the user `user_id` for the requested period.
///
/// Missing or invalid parameters answer 400.
pub async fn get_user_summary_page(
    State(state): State<UserSummaryState>,
    Path(user_id): Path<UserID>,
    Query(query): Query<UserSummaryQuery>,
) -> Result<Response, Error> {
    let period = SummaryPeriod::from_query(
        query.period.as_deref(),
        query.year.as_deref(),
        query.month.as_deref(),
        query.week.as_deref(),
    )?;

    let (user, totals) = {
        let connection = state
            .db_connection
            .lock()
            .inspect_err(|error| tracing::error!("could not acquire database lock: {error}"))
            .map_err(|_| Error::DatabaseLockError)?;

        (
            get_user_by_id(user_id, &connection)?,
            get_period_totals(user_id, period, &connection)?,
        )
    };

    let nav_bar = NavBar::new(endpoints::ADMIN_USERS_VIEW, true).into_html();
    let page_url = format_endpoint(endpoints::ADMIN_USER_SUMMARY_VIEW, user_id.as_i64());

    let content = html! {
        (nav_bar)

        main class=(PAGE_CONTAINER_STYLE)
        {
            section class="w-full space-y-4"
            {
                h1 class="text-xl font-bold" id="summary-user"
                {
                    "Summary for " (user.username)
                }

                (period_form(&page_url, &query))

                h2 class="text-lg font-semibold" id="period-label" { (period.label()) }

                (totals_cards(
                    totals.total_amount,
                    totals.total_amount_excluding_fuel,
                    totals.total_fuel_expense
                ))
            }
        }
    };

    Ok(base("User Summary", &content).into_response())
}

fn period_form(page_url: &str, query: &UserSummaryQuery) -> Markup {
    let selected_period = query.period.as_deref().unwrap_or("monthly");

    html! {
        form method="get" action=(page_url) class="flex flex-wrap items-end gap-4"
        {
            div
            {
                label for="period" class=(FORM_LABEL_STYLE) { "Period" }
                select name="period" id="period" class=(FORM_TEXT_INPUT_STYLE)
                {
                    @for (value, label) in [("yearly", "Yearly"), ("monthly", "Monthly"), ("weekly", "Weekly")] {
                        option value=(value) selected[selected_period == value] { (label) }
                    }
                }
            }

            div
            {
                label for="year" class=(FORM_LABEL_STYLE) { "Year" }
                input
                    type="number"
                    name="year"
                    id="year"
                    value=[query.year.as_deref()]
                    min="1"
                    class=(FORM_TEXT_INPUT_STYLE)
                    required;
            }

            div
            {
                label for="month" class=(FORM_LABEL_STYLE) { "Month" }
                input
                    type="number"
                    name="month"
                    id="month"
                    value=[query.month.as_deref()]
                    min="1"
                    max="12"
                    class=(FORM_TEXT_INPUT_STYLE);
            }

            div
            {
                label for="week" class=(FORM_LABEL_STYLE) { "Week" }
                input
                    type="number"
                    name="week"
                    id="week"
                    value=[query.week.as_deref()]
                    min="0"
                    max=(MAX_WEEK)
                    class=(FORM_TEXT_INPUT_STYLE);
            }

            div
            {
                button type="submit" class=(BUTTON_PRIMARY_STYLE) { "Show" }
            }
        }
    }
}

#[cfg(test)]
mod user_summary_page_tests {
    use axum::{
        extract::{Path, Query, State},
        http::StatusCode,
        response::IntoResponse,
    };
    use time::macros::{date, datetime};

    use crate::{
        Error,
        admin::user_summary_page::{UserSummaryQuery, UserSummaryState, get_user_summary_page},
        auth::UserID,
        settlement::settle,
        test_utils::{
            assert_valid_html, get_shared_test_connection, insert_test_entry, insert_test_user,
            must_get_text_by_id, parse_html_document,
        },
    };

    fn query(period: &str, year: &str, month: Option<&str>, week: Option<&str>) -> UserSummaryQuery {
        UserSummaryQuery {
            period: Some(period.to_owned()),
            year: Some(year.to_owned()),
            month: month.map(str::to_owned),
            week: week.map(str::to_owned),
        }
    }

    #[tokio::test]
    async fn shows_weekly_totals_for_user() {
        let db_connection = get_shared_test_connection();
        let driver = {
            let connection = db_connection.lock().unwrap();
            insert_test_user("admin", true, &connection);
            let driver = insert_test_user("driver", false, &connection);
            insert_test_entry(driver.id, date!(2025 - 01 - 06), "ONT8", 20_000, &connection);
            insert_test_entry(driver.id, date!(2025 - 01 - 07), "FUEL", 6_000, &connection);
            // Monday of week 1 in 2025.
            settle(driver.id, datetime!(2025-01-06 18:00:00), &connection).unwrap();
            insert_test_entry(driver.id, date!(2025 - 01 - 13), "LOCAL", 10_000, &connection);
            settle(driver.id, datetime!(2025-01-13 18:00:00), &connection).unwrap();
            driver
        };
        let state = UserSummaryState { db_connection };

        let response = get_user_summary_page(
            State(state),
            Path(driver.id),
            Query(query("weekly", "2025", None, Some("1"))),
        )
        .await
        .unwrap();

        assert_eq!(response.status(), StatusCode::OK);
        let document = parse_html_document(response).await;
        assert_valid_html(&document);
        assert_eq!(
            must_get_text_by_id(&document, "summary-user"),
            "Summary for driver"
        );
        assert_eq!(must_get_text_by_id(&document, "period-label"), "Week 1 of 2025");
        assert_eq!(must_get_text_by_id(&document, "total-amount"), "Total $260.00");
        assert_eq!(must_get_text_by_id(&document, "total-fuel"), "Fuel $60.00");
    }

    #[tokio::test]
    async fn invalid_parameters_are_bad_request() {
        let db_connection = get_shared_test_connection();
        let driver = insert_test_user("driver", false, &db_connection.lock().unwrap());
        let state = UserSummaryState { db_connection };

        for query in [
            UserSummaryQuery::default(),
            query("daily", "2025", None, None),
            query("monthly", "2025", Some("13"), None),
            query("weekly", "2025", None, None),
        ] {
            let result =
                get_user_summary_page(State(state.clone()), Path(driver.id), Query(query)).await;

            let error = result.unwrap_err();
            assert!(matches!(error, Error::InvalidSummaryPeriod(_)));
            assert_eq!(error.into_response().status(), StatusCode::BAD_REQUEST);
        }
    }

    #[tokio::test]
    async fn missing_user_is_not_found() {
        let state = UserSummaryState {
            db_connection: get_shared_test_connection(),
        };

        let result = get_user_summary_page(
            State(state),
            Path(UserID::new(999)),
            Query(query("yearly", "2025", None, None)),
        )
        .await;

        assert_eq!(result.err(), Some(Error::NotFound));
    }
}
