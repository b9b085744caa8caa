//! Database ID type definitions.

/// The ID of an income entry.
pub type IncomeEntryId = i64;

/// The ID of a settlement.
pub type SettlementId = i64;
