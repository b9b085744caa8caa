//! Settlements: snapshots of a batch of income entries with their totals.
//!
//! This module contains:
//! - The `Settlement` model and its queries
//! - The settlement engine, [settle] and [delete_settlement]
//! - The settlement pages and the endpoints for settling, deleting and exporting

mod core;
mod create_endpoint;
mod delete_endpoint;
mod engine;
mod export_endpoint;
mod settlement_page;
mod settlements_page;

pub use core::{
    Settlement, SettlementListing, create_settlement_table, get_settlement, get_settlements,
};
pub use create_endpoint::create_settlement_endpoint;
pub use delete_endpoint::delete_settlement_endpoint;
pub use engine::{SettlementResult, delete_settlement, settle};
pub use export_endpoint::export_settlement_endpoint;
pub use settlement_page::get_settlement_page;
pub use settlements_page::get_settlements_page;
