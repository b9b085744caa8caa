//! Income entries: one per trip, or per fuel expense.
//!
//! This module contains:
//! - The `IncomeEntry` model, its destinations and the presets offered by the form
//! - Database functions for recording, listing and deleting entries
//! - The income page and the endpoints for creating and deleting entries

mod core;
mod create_endpoint;
mod delete_endpoint;
mod income_page;

pub use core::{
    FUEL_DESTINATION, IncomeEntry, NewIncomeEntry, OTHER_DESTINATION, PRESET_DESTINATIONS,
    create_income_entry, create_income_entry_table, delete_unsettled_income_entry,
    get_income_entry, get_settlement_entries, get_unsettled_entries,
};
pub use create_endpoint::create_income_endpoint;
pub use delete_endpoint::delete_income_endpoint;
pub use income_page::get_income_page;
