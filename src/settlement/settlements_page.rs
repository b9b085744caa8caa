//! Lists the logged in user's settlements.

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
    auth::{UserID, get_user_by_id},
    endpoints::{self, format_endpoint},
    html::{
        LINK_STYLE, PAGE_CONTAINER_STYLE, TABLE_CELL_STYLE, TABLE_HEADER_STYLE, TABLE_ROW_STYLE,
        TABLE_STYLE, base, format_currency, format_date_time,
    },
    navigation::NavBar,
    settlement::{SettlementListing, get_settlements},
};

/// The state needed for the settlements page.
#[derive(Debug, Clone)]
pub struct SettlementsPageState {
    pub db_connection: Arc<Mutex<Connection>>,
}

impl FromRef<AppState> for SettlementsPageState {
    fn from_ref(state: &AppState) -> Self {
        Self {
            db_connection: state.db_connection.clone(),
        }
    }
}

/// Render the settlements of the logged in user, newest first.
pub async fn get_settlements_page(
    State(state): State<SettlementsPageState>,
    Extension(user_id): Extension<UserID>,
) -> Result<Response, Error> {
    let (user, listings) = {
        let connection = state
            .db_connection
            .lock()
            .inspect_err(|error| tracing::error!("could not acquire database lock: {error}"))
            .map_err(|_| Error::DatabaseLockError)?;

        (
            get_user_by_id(user_id, &connection)?,
            get_settlements(user_id, &connection)?,
        )
    };

    let nav_bar = NavBar::new(endpoints::SETTLEMENTS_VIEW, user.is_admin).into_html();

    let content = html! {
        (nav_bar)

        main class=(PAGE_CONTAINER_STYLE)
        {
            section class="w-full space-y-4"
            {
                h1 class="text-xl font-bold" { "Settlements" }
                (settlements_table(&listings))
            }
        }
    };

    Ok(base("Settlements", &content).into_response())
}

fn settlements_table(listings: &[SettlementListing]) -> Markup {
    html! {
        div class="w-full overflow-x-auto"
        {
            table class=(TABLE_STYLE)
            {
                thead class=(TABLE_HEADER_STYLE)
                {
                    tr
                    {
                        th scope="col" class=(TABLE_CELL_STYLE) { "Settled" }
                        th scope="col" class="px-6 py-3 text-right" { "Entries" }
                        th scope="col" class="px-6 py-3 text-right" { "Total" }
                        th scope="col" class="px-6 py-3 text-right" { "Excluding fuel" }
                        th scope="col" class="px-6 py-3 text-right" { "Fuel" }
                    }
                }

                tbody id="settlements"
                {
                    @for listing in listings {
                        @let settlement = &listing.settlement;
                        tr class=(TABLE_ROW_STYLE) data-settlement-id=(settlement.id)
                        {
                            td class=(TABLE_CELL_STYLE)
                            {
                                a
                                    href=(format_endpoint(endpoints::SETTLEMENT_VIEW, settlement.id))
                                    class=(LINK_STYLE)
                                {
                                    (format_date_time(settlement.settlement_time))
                                }
                            }
                            td class="px-6 py-4 text-right tabular-nums" { (listing.entry_count) }
                            td class="px-6 py-4 text-right tabular-nums"
                            {
                                (format_currency(settlement.total_amount))
                            }
                            td class="px-6 py-4 text-right tabular-nums"
                            {
                                (format_currency(settlement.total_amount_excluding_fuel))
                            }
                            td class="px-6 py-4 text-right tabular-nums"
                            {
                                (format_currency(settlement.total_fuel_expense))
                            }
                        }
                    }

                    @if listings.is_empty() {
                        tr
                        {
                            td colspan="5" class="px-6 py-4 text-center"
                            {
                                "No settlements yet. Settle your entries from the "
                                a href=(endpoints::INCOME_VIEW) class=(LINK_STYLE) { "income page" }
                                "."
                            }
                        }
                    }
                }
            }
        }
    }
}
