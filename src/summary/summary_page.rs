//! The summary page: the caller's settlement totals for a month and its year.

use std::sync::{Arc, Mutex};

use axum::{
    Extension,
    extract::{FromRef, Query, State},
    response::{IntoResponse, Response},
};
use maud::{Markup, html};
use rusqlite::Connection;
use serde::Deserialize;
use time::{Date, Month};

use crate::{
    AppState, Error,
    auth::{UserID, get_user_by_id},
    endpoints,
    html::{
        BUTTON_PRIMARY_STYLE, FORM_LABEL_STYLE, FORM_TEXT_INPUT_STYLE, PAGE_CONTAINER_STYLE,
        TABLE_CELL_STYLE, TABLE_HEADER_STYLE, TABLE_ROW_STYLE, TABLE_STYLE, base,
        format_currency,
    },
    navigation::NavBar,
    summary::{PeriodTotals, SummaryPeriod, get_period_totals},
    timezone::{get_local_offset, local_now},
};

/// The state needed for the summary page.
#[derive(Debug, Clone)]
pub struct SummaryPageState {
    /// The database connection for reading settlements.
    pub db_connection: Arc<Mutex<Connection>>,
    /// The local timezone as a canonical timezone name, e.g. "Pacific/Auckland".
    pub local_timezone: String,
}

impl FromRef<AppState> for SummaryPageState {
    fn from_ref(state: &AppState) -> Self {
        Self {
            db_connection: state.db_connection.clone(),
            local_timezone: state.local_timezone.clone(),
        }
    }
}

/// The month to summarise. Values are kept as text so bad input falls back to
/// the current month instead of rejecting the request.
#[derive(Debug, Default, Deserialize)]
pub struct SummaryQuery {
    pub year: Option<String>,
    pub month: Option<String>,
}

/// Pick the year and month to show, using `today` for anything missing or invalid.
fn resolve_month(query: &SummaryQuery, today: Date) -> (SummaryPeriod, SummaryPeriod) {
    let year = query
        .year
        .as_deref()
        .and_then(|year| year.trim().parse::<i32>().ok())
        .filter(|&year| SummaryPeriod::yearly(year).is_ok())
        .unwrap_or(today.year());

    let month = query
        .month
        .as_deref()
        .and_then(|month| month.trim().parse::<u8>().ok())
        .and_then(|month| SummaryPeriod::monthly(year, month).ok())
        .unwrap_or(SummaryPeriod::Monthly {
            year,
            month: today.month(),
        });

    (month, SummaryPeriod::Yearly { year })
}

/// Render the monthly and yearly totals of the logged in user.
pub async fn get_summary_page(
    State(state): State<SummaryPageState>,
    Extension(user_id): Extension<UserID>,
    Query(query): Query<SummaryQuery>,
) -> Result<Response, Error> {
    let local_offset = get_local_offset(&state.local_timezone)
        .ok_or_else(|| Error::InvalidTimezoneError(state.local_timezone.clone()))?;
    let (month, year) = resolve_month(&query, local_now(local_offset).date());

    let (user, monthly_totals, yearly_totals) = {
        let connection = state
            .db_connection
            .lock()
            .inspect_err(|error| tracing::error!("could not acquire database lock: {error}"))
            .map_err(|_| Error::DatabaseLockError)?;

        (
            get_user_by_id(user_id, &connection)?,
            get_period_totals(user_id, month, &connection)?,
            get_period_totals(user_id, year, &connection)?,
        )
    };

    let nav_bar = NavBar::new(endpoints::SUMMARY_VIEW, user.is_admin).into_html();

    let content = html! {
        (nav_bar)

        main class=(PAGE_CONTAINER_STYLE)
        {
            section class="w-full max-w-md space-y-4"
            {
                h1 class="text-xl font-bold" { "Summary" }
                (period_form(month))
            }

            section class="w-full"
            {
                (totals_table(&[
                    ("monthly", month.label(), monthly_totals),
                    ("yearly", year.label(), yearly_totals),
                ]))
            }
        }
    };

    Ok(base("Summary", &content).into_response())
}

fn period_form(period: SummaryPeriod) -> Markup {
    let (year, selected_month) = match period {
        SummaryPeriod::Monthly { year, month } => (year, Some(month)),
        SummaryPeriod::Yearly { year } | SummaryPeriod::Weekly { year, .. } => (year, None),
    };

    let months = (1..=12).filter_map(|number| Month::try_from(number).ok());

    html! {
        form method="get" action=(endpoints::SUMMARY_VIEW) class="flex items-end gap-4"
        {
            div
            {
                label for="year" class=(FORM_LABEL_STYLE) { "Year" }
                input
                    type="number"
                    name="year"
                    id="year"
                    value=(year)
                    min="1"
                    class=(FORM_TEXT_INPUT_STYLE)
                    required;
            }

            div
            {
                label for="month" class=(FORM_LABEL_STYLE) { "Month" }
                select name="month" id="month" class=(FORM_TEXT_INPUT_STYLE)
                {
                    @for month in months {
                        option value=(month as u8) selected[selected_month == Some(month)]
                        {
                            (month)
                        }
                    }
                }
            }

            div
            {
                button type="submit" class=(BUTTON_PRIMARY_STYLE) { "Show" }
            }
        }
    }
}

fn totals_table(rows: &[(&str, String, PeriodTotals)]) -> Markup {
    html! {
        div class="w-full overflow-x-auto"
        {
            table class=(TABLE_STYLE)
            {
                thead class=(TABLE_HEADER_STYLE)
                {
                    tr
                    {
                        th scope="col" class=(TABLE_CELL_STYLE) { "Period" }
                        th scope="col" class="px-6 py-3 text-right" { "Total" }
                        th scope="col" class="px-6 py-3 text-right" { "Excluding fuel" }
                        th scope="col" class="px-6 py-3 text-right" { "Fuel" }
                    }
                }

                tbody
                {
                    @for (id, label, totals) in rows {
                        tr class=(TABLE_ROW_STYLE)
                        {
                            th scope="row" id={(id) "-label"} class=(TABLE_CELL_STYLE) { (label) }
                            td id={(id) "-total"} class="px-6 py-4 text-right tabular-nums"
                            {
                                (format_currency(totals.total_amount))
                            }
                            td
                                id={(id) "-excluding-fuel"}
                                class="px-6 py-4 text-right tabular-nums"
                            {
                                (format_currency(totals.total_amount_excluding_fuel))
                            }
                            td id={(id) "-fuel"} class="px-6 py-4 text-right tabular-nums"
                            {
                                (format_currency(totals.total_fuel_expense))
                            }
                        }
                    }
                }
            }
        }
    }
}

#[cfg(test)]
mod summary_page_tests {
    use axum::{
        Extension,
        extract::{Query, State},
        http::StatusCode,
    };
    use time::{
        Month,
        macros::{date, datetime},
    };

    use crate::{
        settlement::settle,
        summary::{
            SummaryPeriod,
            summary_page::{SummaryPageState, SummaryQuery, get_summary_page, resolve_month},
        },
        test_utils::{
            assert_valid_html, get_shared_test_connection, insert_test_entry, insert_test_user,
            must_get_text_by_id, parse_html_document,
        },
    };

    fn query(year: &str, month: &str) -> SummaryQuery {
        SummaryQuery {
            year: Some(year.to_owned()),
            month: Some(month.to_owned()),
        }
    }

    #[tokio::test]
    async fn shows_monthly_and_yearly_totals() {
        let db_connection = get_shared_test_connection();
        let user = {
            let connection = db_connection.lock().unwrap();
            let user = insert_test_user("driver", false, &connection);
            insert_test_entry(user.id, date!(2025 - 03 - 01), "ONT8", 20_000, &connection);
            insert_test_entry(user.id, date!(2025 - 03 - 02), "FUEL", 6_000, &connection);
            settle(user.id, datetime!(2025-03-10 09:00:00), &connection).unwrap();
            insert_test_entry(user.id, date!(2025 - 04 - 01), "LOCAL", 10_000, &connection);
            settle(user.id, datetime!(2025-04-02 09:00:00), &connection).unwrap();
            user
        };
        let state = SummaryPageState {
            db_connection,
            local_timezone: "Etc/UTC".to_owned(),
        };

        let response = get_summary_page(State(state), Extension(user.id), Query(query("2025", "3")))
            .await
            .unwrap();

        assert_eq!(response.status(), StatusCode::OK);
        let document = parse_html_document(response).await;
        assert_valid_html(&document);
        assert_eq!(must_get_text_by_id(&document, "monthly-label"), "March 2025");
        assert_eq!(must_get_text_by_id(&document, "monthly-total"), "$260.00");
        assert_eq!(
            must_get_text_by_id(&document, "monthly-excluding-fuel"),
            "$200.00"
        );
        assert_eq!(must_get_text_by_id(&document, "monthly-fuel"), "$60.00");
        assert_eq!(must_get_text_by_id(&document, "yearly-label"), "2025");
        assert_eq!(must_get_text_by_id(&document, "yearly-total"), "$360.00");
    }

    #[test]
    fn invalid_query_falls_back_to_today() {
        let today = date!(2025 - 06 - 15);

        assert_eq!(
            resolve_month(&query("abc", "13"), today),
            (
                SummaryPeriod::Monthly {
                    year: 2025,
                    month: Month::June
                },
                SummaryPeriod::Yearly { year: 2025 }
            )
        );
        assert_eq!(
            resolve_month(&SummaryQuery::default(), today),
            (
                SummaryPeriod::Monthly {
                    year: 2025,
                    month: Month::June
                },
                SummaryPeriod::Yearly { year: 2025 }
            )
        );
    }

    #[test]
    fn valid_year_keeps_default_month_when_month_is_invalid() {
        assert_eq!(
            resolve_month(&query("2023", "0"), date!(2025 - 06 - 15)),
            (
                SummaryPeriod::Monthly {
                    year: 2023,
                    month: Month::June
                },
                SummaryPeriod::Yearly { year: 2023 }
            )
        );
    }
}
