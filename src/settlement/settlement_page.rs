//! Shows one settlement with its totals and entries.

use std::sync::{Arc, Mutex};

use axum::{
    Extension,
    extract::{FromRef, Path, State},
    response::{IntoResponse, Response},
};
use maud::{Markup, html};
use rusqlite::Connection;

use crate::{
    AppState, Error,
    auth::{UserID, get_user_by_id},
    database_id::SettlementId,
    endpoints::{self, format_endpoint},
    html::{
        FUEL_BADGE_STYLE, LINK_STYLE, PAGE_CONTAINER_STYLE, TABLE_CELL_STYLE, TABLE_HEADER_STYLE,
        TABLE_ROW_STYLE, TABLE_STYLE, base, delete_button, format_currency, format_date_time,
        totals_cards,
    },
    income::{IncomeEntry, get_settlement_entries},
    navigation::NavBar,
    settlement::get_settlement,
};

/// The state needed for the settlement page.
#[derive(Debug, Clone)]
pub struct SettlementPageState {
    pub db_connection: Arc<Mutex<Connection>>,
}

impl FromRef<AppState> for SettlementPageState {
    fn from_ref(state: &AppState) -> Self {
        Self {
            db_connection: state.db_connection.clone(),
        }
    }
}

/// Render a settlement of the logged in user.
///
/// Settlements of other users are reported as not found.
pub async fn get_settlement_page(
    State(state): State<SettlementPageState>,
    Extension(user_id): Extension<UserID>,
    Path(settlement_id): Path<SettlementId>,
) -> Result<Response, Error> {
    let (user, settlement, entries) = {
        let connection = state
            .db_connection
            .lock()
            .inspect_err(|error| tracing::error!("could not acquire database lock: {error}"))
            .map_err(|_| Error::DatabaseLockError)?;

        (
            get_user_by_id(user_id, &connection)?,
            get_settlement(user_id, settlement_id, &connection)?,
            get_settlement_entries(user_id, settlement_id, &connection)?,
        )
    };

    let nav_bar = NavBar::new(endpoints::SETTLEMENTS_VIEW, user.is_admin).into_html();
    let settlement_time = format_date_time(settlement.settlement_time);

    let content = html! {
        (nav_bar)

        main class=(PAGE_CONTAINER_STYLE)
        {
            section class="w-full space-y-4"
            {
                header class="flex justify-between flex-wrap items-end gap-4"
                {
                    h1 class="text-xl font-bold" id="settlement-time"
                    {
                        "Settlement of " (settlement_time)
                    }

                    div class="flex gap-4 items-center"
                    {
                        a
                            id="export-link"
                            href=(format_endpoint(endpoints::EXPORT_SETTLEMENT, settlement.id))
                            download
                            class=(LINK_STYLE)
                        {
                            "Export CSV"
                        }

                        (delete_button(
                            &format_endpoint(endpoints::DELETE_SETTLEMENT, settlement.id),
                            "Delete this settlement? Its entries will become unsettled again.",
                            "Delete settlement"
                        ))
                    }
                }

                (totals_cards(
                    settlement.total_amount,
                    settlement.total_amount_excluding_fuel,
                    settlement.total_fuel_expense
                ))

                (entries_table(&entries))
            }
        }
    };

    Ok(base("Settlement", &content).into_response())
}

fn entries_table(entries: &[IncomeEntry]) -> Markup {
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
                    }
                }

                tbody id="settlement-entries"
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
                        }
                    }
                }
            }
        }
    }
}
