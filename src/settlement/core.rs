//! Defines the settlement model and its read-only queries.

use rusqlite::{Connection, Row};
use time::PrimitiveDateTime;

use crate::{Error, auth::UserID, database_id::SettlementId, money::Amount};

/// A snapshot of a batch of income entries, with their totals.
///
/// `total_amount` always equals `total_amount_excluding_fuel + total_fuel_expense`.
#[derive(Debug, Clone, PartialEq)]
pub struct Settlement {
    /// The ID of the settlement.
    pub id: SettlementId,
    /// The user the settlement belongs to.
    pub user_id: UserID,
    /// When the user settled, in server local time.
    pub settlement_time: PrimitiveDateTime,
    /// The sum of every settled entry.
    pub total_amount: Amount,
    /// The sum of the entries that are not fuel.
    pub total_amount_excluding_fuel: Amount,
    /// The sum of the fuel entries.
    pub total_fuel_expense: Amount,
    /// When the row was written.
    pub created_at: PrimitiveDateTime,
}

/// Create the settlement table in the database.
///
/// # Errors
/// Returns an error if the table cannot be created or if there is an SQL error.
pub fn create_settlement_table(connection: &Connection) -> Result<(), rusqlite::Error> {
    connection.execute_batch(
        "CREATE TABLE IF NOT EXISTS settlement (
            id INTEGER PRIMARY KEY AUTOINCREMENT,
            user_id INTEGER NOT NULL,
            settlement_time TEXT NOT NULL,
            total_amount INTEGER NOT NULL,
            total_amount_excluding_fuel INTEGER NOT NULL,
            total_fuel_expense INTEGER NOT NULL,
            created_at TEXT NOT NULL,
            FOREIGN KEY(user_id) REFERENCES user(id) ON DELETE CASCADE,
            CHECK (total_amount = total_amount_excluding_fuel + total_fuel_expense)
        );

        CREATE INDEX IF NOT EXISTS idx_settlement_user_time
            ON settlement(user_id, settlement_time);",
    )
}

const SETTLEMENT_COLUMNS: &str = "id, user_id, settlement_time, total_amount, \
    total_amount_excluding_fuel, total_fuel_expense, created_at";

/// Map a database row to a settlement.
fn map_settlement_row(row: &Row) -> Result<Settlement, rusqlite::Error> {
    Ok(Settlement {
        id: row.get(0)?,
        user_id: row.get(1)?,
        settlement_time: row.get(2)?,
        total_amount: row.get(3)?,
        total_amount_excluding_fuel: row.get(4)?,
        total_fuel_expense: row.get(5)?,
        created_at: row.get(6)?,
    })
}

/// Get the settlement `settlement_id` if it belongs to `user_id`.
///
/// # Errors
/// Returns [Error::NotFound] if the settlement does not exist or belongs to another user.
pub fn get_settlement(
    user_id: UserID,
    settlement_id: SettlementId,
    connection: &Connection,
) -> Result<Settlement, Error> {
    let settlement = connection
        .prepare(&format!(
            "SELECT {SETTLEMENT_COLUMNS} FROM settlement WHERE id = :id AND user_id = :user_id"
        ))?
        .query_row(
            rusqlite::named_params! {":id": settlement_id, ":user_id": user_id},
            map_settlement_row,
        )?;

    Ok(settlement)
}

/// A settlement with the number of entries it holds, for listing.
#[derive(Debug, Clone, PartialEq)]
pub struct SettlementListing {
    /// The settlement.
    pub settlement: Settlement,
    /// How many income entries belong to the settlement.
    pub entry_count: usize,
}

/// Get the settlements of `user_id`, most recent first.
///
/// # Errors
/// Returns a [Error::SqlError] if there is an SQL error.
pub fn get_settlements(
    user_id: UserID,
    connection: &Connection,
) -> Result<Vec<SettlementListing>, Error> {
    connection
        .prepare(
            "SELECT s.id, s.user_id, s.settlement_time, s.total_amount,
                s.total_amount_excluding_fuel, s.total_fuel_expense, s.created_at,
                (SELECT COUNT(*) FROM income_entry e WHERE e.settlement_id = s.id)
             FROM settlement s
             WHERE s.user_id = :user_id
             ORDER BY s.settlement_time DESC, s.id DESC",
        )?
        .query_map(&[(":user_id", &user_id)], |row| {
            let entry_count: i64 = row.get(7)?;

            Ok(SettlementListing {
                settlement: map_settlement_row(row)?,
                entry_count: usize::try_from(entry_count)
                    .map_err(|_| rusqlite::Error::IntegralValueOutOfRange(7, entry_count))?,
            })
        })?
        .map(|maybe_listing| maybe_listing.map_err(Error::from))
        .collect()
}
