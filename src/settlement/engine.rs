//! Settling a user's income entries and undoing a settlement.
//!
//! Both operations run in an `IMMEDIATE` transaction, which takes SQLite's
//! write lock up front. A second settle for the same user on another
//! connection waits for the first to finish and then sees no unsettled
//! entries, so every entry is claimed by at most one settlement.

use rusqlite::{Connection, Transaction, TransactionBehavior};
use time::PrimitiveDateTime;

use crate::{
    Error,
    auth::UserID,
    database_id::{IncomeEntryId, SettlementId},
    income::FUEL_DESTINATION,
    money::Amount,
};

/// The outcome of a successful [settle].
#[derive(Debug, Clone, PartialEq)]
pub struct SettlementResult {
    /// The ID of the new settlement.
    pub settlement_id: SettlementId,
    /// The sum of every settled entry.
    pub total_amount: Amount,
    /// The sum of the settled entries that are not fuel.
    pub total_amount_excluding_fuel: Amount,
    /// The sum of the settled fuel entries.
    pub total_fuel_expense: Amount,
    /// How many entries were moved into the settlement.
    pub settled_entries_count: usize,
}

struct UnsettledEntry {
    id: IncomeEntryId,
    destination_is_fuel: bool,
    amount: Amount,
}

#[derive(Debug, Default, PartialEq)]
struct Totals {
    total_amount: Amount,
    total_amount_excluding_fuel: Amount,
    total_fuel_expense: Amount,
}

impl Totals {
    /// Sum the entries in one pass, putting each amount in exactly one of the
    /// fuel and non-fuel totals.
    ///
    /// Fails with [rusqlite::Error::IntegralValueOutOfRange] for the amount
    /// column if a total would overflow.
    fn accumulate(entries: &[UnsettledEntry]) -> Result<Self, rusqlite::Error> {
        let mut totals = Totals::default();

        for entry in entries {
            let add = |total: Amount| {
                total.checked_add(entry.amount).ok_or(
                    rusqlite::Error::IntegralValueOutOfRange(2, entry.amount.cents()),
                )
            };

            totals.total_amount = add(totals.total_amount)?;

            if entry.destination_is_fuel {
                totals.total_fuel_expense = add(totals.total_fuel_expense)?;
            } else {
                totals.total_amount_excluding_fuel = add(totals.total_amount_excluding_fuel)?;
            }
        }

        Ok(totals)
    }
}

/// Move every unsettled entry of `user_id` into a new settlement stamped with
/// `settlement_time`.
///
/// Either the settlement row exists and every entry that was unsettled when
/// the transaction started points at it, or nothing changed.
///
/// # Errors
///
/// Returns:
/// - [Error::TransactionStartFailed] if the transaction could not be started, e.g. the
///   database stayed locked longer than the busy timeout,
/// - [Error::NoUnsettledEntries] if the user has nothing to settle,
/// - [Error::SettlementFailed] if reading, totalling, inserting or updating
///   failed. The transaction has been rolled back,
/// - [Error::SettlementAmbiguous] if the commit failed. The caller must check
///   the settlements before trying again.
pub fn settle(
    user_id: UserID,
    settlement_time: PrimitiveDateTime,
    connection: &Connection,
) -> Result<SettlementResult, Error> {
    let transaction = Transaction::new_unchecked(connection, TransactionBehavior::Immediate)
        .map_err(|error| {
            tracing::error!("could not start settlement for user {user_id}: {error}");
            Error::TransactionStartFailed(error)
        })?;

    let result = match write_settlement(&transaction, user_id, settlement_time) {
        Ok(Some(result)) => result,
        Ok(None) => {
            roll_back(transaction);
            tracing::info!("user {user_id} tried to settle with no unsettled entries");
            return Err(Error::NoUnsettledEntries);
        }
        Err(error) => {
            roll_back(transaction);
            tracing::error!("settlement for user {user_id} failed and was rolled back: {error}");
            return Err(Error::SettlementFailed(error));
        }
    };

    transaction.commit().map_err(|error| {
        tracing::error!("could not commit settlement for user {user_id}: {error}");
        Error::SettlementAmbiguous(error)
    })?;

    tracing::info!(
        "user {user_id} settled {} entries into settlement {} totalling {}",
        result.settled_entries_count,
        result.settlement_id,
        result.total_amount
    );

    Ok(result)
}

/// Read, total, insert and claim inside `transaction`.
///
/// Returns `Ok(None)` when there is nothing to settle.
fn write_settlement(
    transaction: &Transaction,
    user_id: UserID,
    settlement_time: PrimitiveDateTime,
) -> Result<Option<SettlementResult>, rusqlite::Error> {
    let entries = transaction
        .prepare(
            "SELECT id, destination = :fuel, amount FROM income_entry
             WHERE user_id = :user_id AND settlement_id IS NULL",
        )?
        .query_map(
            rusqlite::named_params! {":fuel": FUEL_DESTINATION, ":user_id": user_id},
            |row| {
                Ok(UnsettledEntry {
                    id: row.get(0)?,
                    destination_is_fuel: row.get(1)?,
                    amount: row.get(2)?,
                })
            },
        )?
        .collect::<Result<Vec<_>, _>>()?;

    if entries.is_empty() {
        return Ok(None);
    }

    let totals = Totals::accumulate(&entries)?;

    let settlement_id: SettlementId = transaction
        .prepare(
            "INSERT INTO settlement
                (user_id, settlement_time, total_amount, total_amount_excluding_fuel,
                 total_fuel_expense, created_at)
             VALUES (?1, ?2, ?3, ?4, ?5, ?2)
             RETURNING id",
        )?
        .query_row(
            (
                user_id,
                settlement_time,
                totals.total_amount,
                totals.total_amount_excluding_fuel,
                totals.total_fuel_expense,
            ),
            |row| row.get(0),
        )?;

    // Claim exactly the entries read above so entries added since are left for the next settlement.
    let mut claim_entry = transaction.prepare(
        "UPDATE income_entry SET settlement_id = ?1, updated_at = ?2
         WHERE id = ?3 AND user_id = ?4 AND settlement_id IS NULL",
    )?;

    for entry in &entries {
        let rows_affected =
            claim_entry.execute((settlement_id, settlement_time, entry.id, user_id))?;

        if rows_affected != 1 {
            return Err(rusqlite::Error::StatementChangedRows(rows_affected));
        }
    }

    Ok(Some(SettlementResult {
        settlement_id,
        total_amount: totals.total_amount,
        total_amount_excluding_fuel: totals.total_amount_excluding_fuel,
        total_fuel_expense: totals.total_fuel_expense,
        settled_entries_count: entries.len(),
    }))
}

fn roll_back(transaction: Transaction) {
    if let Err(error) = transaction.rollback() {
        tracing::error!("could not roll back settlement transaction: {error}");
    }
}

/// Delete the settlement `settlement_id` of `user_id` and return its entries to
/// the unsettled state.
///
/// Returns the number of entries that are unsettled again.
///
/// # Errors
///
/// Returns:
/// - [Error::DeleteMissingSettlement] if the settlement does not exist or belongs to another user,
/// - or [Error::SqlError] if there is an SQL error, in which case nothing changed.
pub fn delete_settlement(
    user_id: UserID,
    settlement_id: SettlementId,
    now: PrimitiveDateTime,
    connection: &Connection,
) -> Result<usize, Error> {
    let transaction = Transaction::new_unchecked(connection, TransactionBehavior::Immediate)?;

    let is_owner: bool = transaction.query_row(
        "SELECT EXISTS(SELECT 1 FROM settlement WHERE id = ?1 AND user_id = ?2)",
        (settlement_id, user_id),
        |row| row.get(0),
    )?;

    if !is_owner {
        return Err(Error::DeleteMissingSettlement);
    }

    // Done explicitly so `updated_at` is refreshed, the foreign key would only null the ID.
    let restored_entries = transaction.execute(
        "UPDATE income_entry SET settlement_id = NULL, updated_at = ?1
         WHERE settlement_id = ?2 AND user_id = ?3",
        (now, settlement_id, user_id),
    )?;

    transaction.execute(
        "DELETE FROM settlement WHERE id = ?1 AND user_id = ?2",
        (settlement_id, user_id),
    )?;

    transaction.commit()?;

    tracing::info!(
        "user {user_id} deleted settlement {settlement_id}, {restored_entries} entries are unsettled again"
    );

    Ok(restored_entries)
}
