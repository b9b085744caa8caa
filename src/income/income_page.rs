//! The income page: the new entry form, the unsettled entries and the settle button.

use std::sync::{Arc, Mutex};

use axum::{
    Extension,
    extract::{FromRef, State},
    response::{IntoResponse, Response},
};
use maud::{Markup, html};
use rusqlite::Connection;
use time::Date;

use crate::{
    AppState, Error,
    auth::{UserID, get_user_by_id},
    endpoints::{self, format_endpoint},
    html::{
        BUTTON_PRIMARY_STYLE, FORM_LABEL_STYLE, FORM_TEXT_INPUT_STYLE, FUEL_BADGE_STYLE,
        PAGE_CONTAINER_STYLE, TABLE_CELL_STYLE, TABLE_HEADER_STYLE, TABLE_ROW_STYLE, TABLE_STYLE,
        base, delete_button, format_currency, loading_spinner, totals_cards,
    },
    income::{
        FUEL_DESTINATION, IncomeEntry, OTHER_DESTINATION, PRESET_DESTINATIONS,
        get_unsettled_entries,
    },
    money::Amount,
    navigation::NavBar,
    timezone::{get_local_offset, local_now},
};

/// The state needed for the income page.
#[derive(Debug, Clone)]
pub struct IncomePageState {
    /// The database connection for reading income entries.
    pub db_connection: Arc<Mutex<Connection>>,
    /// The local timezone as a canonical timezone name, e.g. "Pacific/Auckland".
    pub local_timezone: String,
}

impl FromRef<AppState> for IncomePageState {
    fn from_ref(state: &AppState) -> Self {
        Self {
            db_connection: state.db_connection.clone(),
            local_timezone: state.local_timezone.clone(),
        }
    }
}

/// Render the income page for the logged in user.
pub async fn get_income_page(
    State(state): State<IncomePageState>,
    Extension(user_id): Extension<UserID>,
) -> Result<Response, Error> {
    let local_offset = get_local_offset(&state.local_timezone)
        .ok_or_else(|| Error::InvalidTimezoneError(state.local_timezone.clone()))?;
    let today = local_now(local_offset).date();

    let (user, entries) = {
        let connection = state
            .db_connection
            .lock()
            .inspect_err(|error| tracing::error!("could not acquire database lock: {error}"))
            .map_err(|_| Error::DatabaseLockError)?;

        (
            get_user_by_id(user_id, &connection)?,
            get_unsettled_entries(user_id, &connection)?,
        )
    };

    let totals = preview_totals(&entries);
    let nav_bar = NavBar::new(endpoints::INCOME_VIEW, user.is_admin).into_html();

    let content = html! {
        (nav_bar)

        main class=(PAGE_CONTAINER_STYLE)
        {
            section class="w-full max-w-md space-y-4"
            {
                h1 class="text-xl font-bold" { "New entry" }
                (new_entry_form(today))
            }

            section class="w-full space-y-4"
            {
                header class="flex justify-between flex-wrap items-end gap-4"
                {
                    h2 class="text-xl font-bold" { "Unsettled entries" }
                    (settle_button(entries.is_empty() || totals.is_none()))
                }

                (preview_totals_view(totals))
                (unsettled_entries_table(&entries))
            }
        }
    };

    Ok(base("Income", &content).into_response())
}

fn new_entry_form(today: Date) -> Markup {
    // Picking a preset fills in the amount usually paid for that destination.
    let fill_suggested_amount = "const amount = this.selectedOptions[0].dataset.suggestedAmount; \
        if (amount) document.getElementById('amount').value = amount;";

    html! {
        form
            hx-post=(endpoints::INCOME_API)
            hx-target-error="#alert-container"
            hx-indicator="#indicator"
            class="space-y-4"
        {
            div
            {
                label for="entry_date" class=(FORM_LABEL_STYLE) { "Date" }
                input
                    type="date"
                    name="entry_date"
                    id="entry_date"
                    value=(today)
                    max=(today)
                    class=(FORM_TEXT_INPUT_STYLE)
                    required;
            }

            div
            {
                label for="destination" class=(FORM_LABEL_STYLE) { "Destination" }
                select
                    name="destination"
                    id="destination"
                    onchange=(fill_suggested_amount)
                    class=(FORM_TEXT_INPUT_STYLE)
                    required
                {
                    @for preset in PRESET_DESTINATIONS {
                        option
                            value=(preset.code)
                            data-suggested-amount=(preset.suggested_amount)
                        {
                            (preset.code)
                        }
                    }
                    option value=(FUEL_DESTINATION) { "Fuel" }
                    option value=(OTHER_DESTINATION) { "Other" }
                }
            }

            div
            {
                label for="custom_destination" class=(FORM_LABEL_STYLE)
                {
                    "Custom destination (for \"Other\")"
                }
                input
                    type="text"
                    name="custom_destination"
                    id="custom_destination"
                    maxlength="64"
                    class=(FORM_TEXT_INPUT_STYLE);
            }

            div
            {
                label for="amount" class=(FORM_LABEL_STYLE) { "Amount" }
                input
                    type="text"
                    inputmode="decimal"
                    name="amount"
                    id="amount"
                    pattern="[0-9]+(\\.[0-9]{1,2})?"
                    value=(PRESET_DESTINATIONS[0].suggested_amount)
                    class=(FORM_TEXT_INPUT_STYLE)
                    required;
            }

            div class="flex items-center gap-x-3"
            {
                input
                    type="checkbox"
                    name="is_fuel_expense"
                    id="is_fuel_expense"
                    class="rounded-xs";
                label for="is_fuel_expense" class="text-sm font-medium" { "Fuel expense" }
            }

            button type="submit" id="submit-button" class=(BUTTON_PRIMARY_STYLE)
            {
                span class="inline htmx-indicator" id="indicator"
                {
                    (loading_spinner())
                }
                "Add entry"
            }
        }
    }
}

fn settle_button(is_disabled: bool) -> Markup {
    html! {
        button
            type="button"
            id="settle-button"
            hx-post=(endpoints::SETTLEMENTS_API)
            hx-confirm="Settle all unsettled entries now?"
            hx-target-error="#alert-container"
            disabled[is_disabled]
            class="px-4 py-2 bg-blue-500 dark:bg-blue-600 disabled:bg-gray-400
                hover:enabled:bg-blue-600 text-white rounded"
        {
            "Settle now"
        }
    }
}

/// What settling now would produce, classified by destination like the settlement
/// itself, as `(total, excluding_fuel, fuel)`. `None` if a total overflows.
fn preview_totals(entries: &[IncomeEntry]) -> Option<(Amount, Amount, Amount)> {
    let (excluding_fuel, fuel): (Vec<_>, Vec<_>) =
        entries.iter().partition(|entry| !entry.destination.is_fuel());

    let excluding_fuel = Amount::checked_sum(excluding_fuel.iter().map(|entry| entry.amount))?;
    let fuel = Amount::checked_sum(fuel.iter().map(|entry| entry.amount))?;

    Some((excluding_fuel.checked_add(fuel)?, excluding_fuel, fuel))
}

fn preview_totals_view(totals: Option<(Amount, Amount, Amount)>) -> Markup {
    match totals {
        Some((total, excluding_fuel, fuel)) => totals_cards(total, excluding_fuel, fuel),
        None => html! {
            p id="totals-overflow" class="text-red-600 dark:text-red-400"
            {
                "These entries add up to more than can be settled. \
                Delete the oversized entries before settling."
            }
        },
    }
}

fn unsettled_entries_table(entries: &[IncomeEntry]) -> Markup {
    html! {
        div class="w-full overflow-x-auto"
        {
            table class=(TABLE_STYLE)
            {
                thead class=(TABLE_HEADER_STYLE)
                {
                    tr
                    {
                        th scope="col" class=(TABLE_CELL_STYLE) { "Date" }
                        th scope="col" class=(TABLE_CELL_STYLE) { "Destination" }
                        th scope="col" class="px-6 py-3 text-right" { "Amount" }
                        th scope="col" class=(TABLE_CELL_STYLE) { "Actions" }
                    }
                }

                tbody id="unsettled-entries"
                {
                    @for entry in entries {
                        tr class=(TABLE_ROW_STYLE) data-entry-id=(entry.id)
                        {
                            td class=(TABLE_CELL_STYLE) { (entry.entry_date) }
                            td class=(TABLE_CELL_STYLE)
                            {
                                (entry.display_destination())
                                @if entry.is_fuel_expense {
                                    " "
                                    span class=(FUEL_BADGE_STYLE) { "Fuel" }
                                }
                            }
                            td class="px-6 py-4 text-right tabular-nums"
                            {
                                (format_currency(entry.amount))
                            }
                            td class=(TABLE_CELL_STYLE)
                            {
                                (delete_button(
                                    &format_endpoint(endpoints::DELETE_INCOME_ENTRY, entry.id),
                                    "Delete this entry? This cannot be undone.",
                                    "Delete"
                                ))
                            }
                        }
                    }

                    @if entries.is_empty() {
                        tr
                        {
                            td colspan="4" class="px-6 py-4 text-center"
                            {
                                "Nothing to settle. Add an entry above."
                            }
                        }
                    }
                }
            }
        }
    }
}

#[cfg(test)]
mod income_page_tests {
    use axum::{Extension, extract::State, http::StatusCode};
    use scraper::Selector;
    use time::macros::date;

    use crate::{
        endpoints,
        income::income_page::{IncomePageState, get_income_page},
        test_utils::{
            assert_form_input, assert_hx_endpoint, assert_valid_html, get_shared_test_connection,
            insert_test_entry, insert_test_user, must_get_form, must_get_text_by_id,
            parse_html_document,
        },
    };

    #[tokio::test]
    async fn shows_form_entries_and_totals() {
        let db_connection = get_shared_test_connection();
        let user = {
            let connection = db_connection.lock().unwrap();
            let user = insert_test_user("driver", false, &connection);
            insert_test_entry(user.id, date!(2025 - 03 - 01), "ONT8", 20_000, &connection);
            insert_test_entry(user.id, date!(2025 - 03 - 02), "LBG8", 15_000, &connection);
            insert_test_entry(user.id, date!(2025 - 03 - 03), "FUEL", 6_000, &connection);
            user
        };
        let state = IncomePageState {
            db_connection,
            local_timezone: "Etc/UTC".to_owned(),
        };

        let response = get_income_page(State(state), Extension(user.id))
            .await
            .unwrap();

        assert_eq!(response.status(), StatusCode::OK);
        let document = parse_html_document(response).await;
        assert_valid_html(&document);

        let form = must_get_form(&document);
        assert_hx_endpoint(&form, endpoints::INCOME_API, "hx-post");
        assert_form_input(&form, "entry_date", "date");
        assert_form_input(&form, "destination", "select");
        assert_form_input(&form, "amount", "text");

        let rows = document
            .select(&Selector::parse("#unsettled-entries tr[data-entry-id]").unwrap())
            .count();
        assert_eq!(rows, 3);

        assert_eq!(must_get_text_by_id(&document, "total-amount"), "Total $410.00");
        assert_eq!(
            must_get_text_by_id(&document, "total-excluding-fuel"),
            "Excluding fuel $350.00"
        );
        assert_eq!(must_get_text_by_id(&document, "total-fuel"), "Fuel $60.00");

        let settle_button = document
            .select(&Selector::parse("#settle-button").unwrap())
            .next()
            .unwrap();
        assert_hx_endpoint(&settle_button, endpoints::SETTLEMENTS_API, "hx-post");
        assert!(settle_button.value().attr("disabled").is_none());
    }

    #[tokio::test]
    async fn settle_button_is_disabled_without_entries() {
        let db_connection = get_shared_test_connection();
        let user = insert_test_user("driver", false, &db_connection.lock().unwrap());
        let state = IncomePageState {
            db_connection,
            local_timezone: "Etc/UTC".to_owned(),
        };

        let response = get_income_page(State(state), Extension(user.id))
            .await
            .unwrap();

        let document = parse_html_document(response).await;
        let settle_button = document
            .select(&Selector::parse("#settle-button").unwrap())
            .next()
            .unwrap();
        assert!(settle_button.value().attr("disabled").is_some());
    }

    #[tokio::test]
    async fn only_shows_own_entries() {
        let db_connection = get_shared_test_connection();
        let user = {
            let connection = db_connection.lock().unwrap();
            let user = insert_test_user("driver", false, &connection);
            let other = insert_test_user("other", false, &connection);
            insert_test_entry(other.id, date!(2025 - 03 - 01), "ONT8", 20_000, &connection);
            user
        };
        let state = IncomePageState {
            db_connection,
            local_timezone: "Etc/UTC".to_owned(),
        };

        let response = get_income_page(State(state), Extension(user.id))
            .await
            .unwrap();

        let document = parse_html_document(response).await;
        let rows = document
            .select(&Selector::parse("#unsettled-entries tr[data-entry-id]").unwrap())
            .count();
        assert_eq!(rows, 0);
        assert_eq!(must_get_text_by_id(&document, "total-amount"), "Total $0.00");
    }

    #[tokio::test]
    async fn overflowing_totals_disable_settling() {
        let db_connection = get_shared_test_connection();
        let user = {
            let connection = db_connection.lock().unwrap();
            let user = insert_test_user("driver", false, &connection);
            insert_test_entry(user.id, date!(2025 - 03 - 01), "ONT8", i64::MAX, &connection);
            insert_test_entry(user.id, date!(2025 - 03 - 02), "LBG8", i64::MAX, &connection);
            user
        };
        let state = IncomePageState {
            db_connection,
            local_timezone: "Etc/UTC".to_owned(),
        };

        let response = get_income_page(State(state), Extension(user.id))
            .await
            .unwrap();

        assert_eq!(response.status(), StatusCode::OK);
        let document = parse_html_document(response).await;
        assert!(
            document
                .select(&Selector::parse("#totals-overflow").unwrap())
                .next()
                .is_some()
        );
        let settle_button = document
            .select(&Selector::parse("#settle-button").unwrap())
            .next()
            .unwrap();
        assert!(settle_button.value().attr("disabled").is_some());
    }
}
