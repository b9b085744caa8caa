//! Defines the income entry model and its database queries.

use std::fmt::Display;

use rusqlite::{
    Connection, Row,
    types::{FromSql, FromSqlResult, ToSql, ToSqlOutput, ValueRef},
};
use time::{Date, PrimitiveDateTime};

use crate::{
    Error,
    auth::UserID,
    database_id::{IncomeEntryId, SettlementId},
    money::Amount,
};

// ============================================================================
// MODELS
// ============================================================================

/// The destination that marks an entry as a fuel expense.
///
/// This is the only destination counted towards a settlement's fuel total.
pub const FUEL_DESTINATION: &str = "FUEL";

/// The destination chosen when the trip went somewhere without a preset.
pub const OTHER_DESTINATION: &str = "OTHER";

/// A destination offered in the new entry form, with the amount usually paid for it.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct PresetDestination {
    /// The destination code, e.g. "ONT8".
    pub code: &'static str,
    /// The amount to pre-fill when this destination is picked.
    pub suggested_amount: Amount,
}

const fn preset(code: &'static str, suggested_cents: i64) -> PresetDestination {
    PresetDestination {
        code,
        suggested_amount: Amount::from_cents(suggested_cents),
    }
}

/// The trip destinations listed before [FUEL_DESTINATION] and [OTHER_DESTINATION].
pub const PRESET_DESTINATIONS: [PresetDestination; 10] = [
    preset("ONT8", 20_000),
    preset("LBG8", 20_000),
    preset("SBD1", 20_000),
    preset("LAX9", 20_000),
    preset("IUSP", 20_000),
    preset("XLX7", 20_000),
    preset("IUSJ", 20_000),
    preset("POC1", 20_000),
    preset("POC3", 20_000),
    preset("LOCAL", 10_000),
];

/// Where a trip went, or [FUEL_DESTINATION] for a fuel expense.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Destination(String);

impl Destination {
    /// The maximum number of characters in a destination.
    pub const MAX_LENGTH: usize = 64;

    /// Trim and validate a destination.
    ///
    /// # Errors
    ///
    /// Returns [Error::InvalidDestination] if the trimmed text is empty or too long.
    pub fn new(raw_destination: &str) -> Result<Self, Error> {
        let destination = raw_destination.trim();

        if destination.is_empty() {
            return Err(Error::InvalidDestination(
                "Destination cannot be empty".to_owned(),
            ));
        }

        if destination.chars().count() > Self::MAX_LENGTH {
            return Err(Error::InvalidDestination(format!(
                "Destination cannot be longer than {} characters",
                Self::MAX_LENGTH
            )));
        }

        Ok(Self(destination.to_owned()))
    }

    /// Create a destination without validation.
    ///
    /// The caller should ensure `destination` is trimmed and not empty.
    pub fn new_unchecked(destination: &str) -> Self {
        Self(destination.to_owned())
    }

    /// Whether entries with this destination count as fuel expenses.
    pub fn is_fuel(&self) -> bool {
        self.0 == FUEL_DESTINATION
    }

    /// Whether the trip's real destination is in the custom destination field.
    pub fn is_other(&self) -> bool {
        self.0 == OTHER_DESTINATION
    }

    /// The destination as a string slice.
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl Display for Destination {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(&self.0)
    }
}

impl ToSql for Destination {
    fn to_sql(&self) -> rusqlite::Result<ToSqlOutput<'_>> {
        self.0.to_sql()
    }
}

impl FromSql for Destination {
    fn column_result(value: ValueRef<'_>) -> FromSqlResult<Self> {
        String::column_result(value).map(Self)
    }
}

/// The income from one trip, or a fuel expense.
#[derive(Debug, Clone, PartialEq)]
pub struct IncomeEntry {
    /// The ID of the entry.
    pub id: IncomeEntryId,
    /// The user the entry belongs to.
    pub user_id: UserID,
    /// The day the trip happened.
    pub entry_date: Date,
    /// Where the trip went.
    pub destination: Destination,
    /// The destination typed in by the user when [Destination::is_other] is true.
    pub custom_destination: Option<String>,
    /// How much was earned, or spent for fuel. Always positive.
    pub amount: Amount,
    /// Set for fuel entries. Totals are classified by the destination, not this flag.
    pub is_fuel_expense: bool,
    /// The settlement this entry belongs to, `None` while unsettled.
    pub settlement_id: Option<SettlementId>,
    /// When the entry was recorded.
    pub created_at: PrimitiveDateTime,
    /// When the entry was last changed, e.g. by being settled.
    pub updated_at: PrimitiveDateTime,
}

impl IncomeEntry {
    /// The destination to show the user, preferring the custom destination for "other" trips.
    pub fn display_destination(&self) -> &str {
        match &self.custom_destination {
            Some(custom) if self.destination.is_other() => custom,
            _ => self.destination.as_str(),
        }
    }
}

/// The validated data needed to record a new income entry.
#[derive(Debug, Clone, PartialEq)]
pub struct NewIncomeEntry {
    /// The day the trip happened.
    pub entry_date: Date,
    /// Where the trip went.
    pub destination: Destination,
    /// Only kept when `destination` is [OTHER_DESTINATION].
    pub custom_destination: Option<String>,
    /// Must be greater than zero.
    pub amount: Amount,
    /// Always true when `destination` is [FUEL_DESTINATION].
    pub is_fuel_expense: bool,
}

impl NewIncomeEntry {
    /// Validate the destination fields of a new entry.
    ///
    /// "OTHER" needs a non-empty `custom_destination`. Any other destination
    /// drops the custom destination, and "FUEL" always marks the entry as a
    /// fuel expense.
    ///
    /// # Errors
    ///
    /// Returns [Error::InvalidDestination] or [Error::MissingCustomDestination].
    pub fn new(
        entry_date: Date,
        destination: &str,
        custom_destination: Option<&str>,
        amount: Amount,
        is_fuel_expense: bool,
    ) -> Result<Self, Error> {
        let destination = Destination::new(destination)?;

        let custom_destination = if destination.is_other() {
            let custom = custom_destination
                .map(str::trim)
                .filter(|custom| !custom.is_empty())
                .ok_or(Error::MissingCustomDestination)?;

            Some(Destination::new(custom)?.to_string())
        } else {
            None
        };

        let is_fuel_expense = is_fuel_expense || destination.is_fuel();

        Ok(Self {
            entry_date,
            destination,
            custom_destination,
            amount,
            is_fuel_expense,
        })
    }
}

// ============================================================================
// DATABASE FUNCTIONS
// ============================================================================

/// Create the income entry table in the database.
///
/// The settlement table must be created first.
///
/// # Errors
/// Returns an error if the table cannot be created or if there is an SQL error.
pub fn create_income_entry_table(connection: &Connection) -> Result<(), rusqlite::Error> {
    connection.execute_batch(
        "CREATE TABLE IF NOT EXISTS income_entry (
            id INTEGER PRIMARY KEY AUTOINCREMENT,
            user_id INTEGER NOT NULL,
            entry_date TEXT NOT NULL,
            destination TEXT NOT NULL,
            custom_destination TEXT,
            amount INTEGER NOT NULL CHECK (amount > 0),
            is_fuel_expense INTEGER NOT NULL DEFAULT 0,
            settlement_id INTEGER,
            created_at TEXT NOT NULL,
            updated_at TEXT NOT NULL,
            FOREIGN KEY(user_id) REFERENCES user(id) ON DELETE CASCADE,
            FOREIGN KEY(settlement_id) REFERENCES settlement(id) ON DELETE SET NULL
        );

        CREATE INDEX IF NOT EXISTS idx_income_entry_user_settlement
            ON income_entry(user_id, settlement_id);",
    )
}

const INCOME_ENTRY_COLUMNS: &str = "id, user_id, entry_date, destination, custom_destination, \
    amount, is_fuel_expense, settlement_id, created_at, updated_at";

/// Map a database row to an income entry.
///
/// The row must have the columns in [INCOME_ENTRY_COLUMNS] order.
fn map_income_entry_row(row: &Row) -> Result<IncomeEntry, rusqlite::Error> {
    Ok(IncomeEntry {
        id: row.get(0)?,
        user_id: row.get(1)?,
        entry_date: row.get(2)?,
        destination: row.get(3)?,
        custom_destination: row.get(4)?,
        amount: row.get(5)?,
        is_fuel_expense: row.get(6)?,
        settlement_id: row.get(7)?,
        created_at: row.get(8)?,
        updated_at: row.get(9)?,
    })
}

/// Record a new, unsettled income entry for `user_id`.
///
/// `created_at` is also used as the initial `updated_at`.
///
/// # Errors
/// Returns a [Error::SqlError] if there is an SQL error.
pub fn create_income_entry(
    user_id: UserID,
    entry: NewIncomeEntry,
    created_at: PrimitiveDateTime,
    connection: &Connection,
) -> Result<IncomeEntry, Error> {
    let entry = connection
        .prepare(&format!(
            "INSERT INTO income_entry
                (user_id, entry_date, destination, custom_destination, amount, is_fuel_expense,
                 settlement_id, created_at, updated_at)
             VALUES (?1, ?2, ?3, ?4, ?5, ?6, NULL, ?7, ?7)
             RETURNING {INCOME_ENTRY_COLUMNS}"
        ))?
        .query_row(
            (
                user_id,
                entry.entry_date,
                entry.destination,
                entry.custom_destination,
                entry.amount,
                entry.is_fuel_expense,
                created_at,
            ),
            map_income_entry_row,
        )?;

    Ok(entry)
}

/// Get the income entry `entry_id` if it belongs to `user_id`.
///
/// # Errors
/// Returns [Error::NotFound] if the entry does not exist or belongs to another user.
pub fn get_income_entry(
    user_id: UserID,
    entry_id: IncomeEntryId,
    connection: &Connection,
) -> Result<IncomeEntry, Error> {
    let entry = connection
        .prepare(&format!(
            "SELECT {INCOME_ENTRY_COLUMNS} FROM income_entry WHERE id = :id AND user_id = :user_id"
        ))?
        .query_row(
            rusqlite::named_params! {":id": entry_id, ":user_id": user_id},
            map_income_entry_row,
        )?;

    Ok(entry)
}

/// Get the unsettled entries of `user_id`, most recently recorded first.
///
/// # Errors
/// Returns a [Error::SqlError] if there is an SQL error.
pub fn get_unsettled_entries(
    user_id: UserID,
    connection: &Connection,
) -> Result<Vec<IncomeEntry>, Error> {
    connection
        .prepare(&format!(
            "SELECT {INCOME_ENTRY_COLUMNS} FROM income_entry
             WHERE user_id = :user_id AND settlement_id IS NULL
             ORDER BY created_at DESC, id DESC"
        ))?
        .query_map(&[(":user_id", &user_id)], map_income_entry_row)?
        .map(|maybe_entry| maybe_entry.map_err(Error::from))
        .collect()
}

/// Get the entries of `user_id` that belong to `settlement_id`, oldest trip first.
///
/// # Errors
/// Returns a [Error::SqlError] if there is an SQL error.
pub fn get_settlement_entries(
    user_id: UserID,
    settlement_id: SettlementId,
    connection: &Connection,
) -> Result<Vec<IncomeEntry>, Error> {
    connection
        .prepare(&format!(
            "SELECT {INCOME_ENTRY_COLUMNS} FROM income_entry
             WHERE user_id = :user_id AND settlement_id = :settlement_id
             ORDER BY entry_date ASC, id ASC"
        ))?
        .query_map(
            rusqlite::named_params! {":user_id": user_id, ":settlement_id": settlement_id},
            map_income_entry_row,
        )?
        .map(|maybe_entry| maybe_entry.map_err(Error::from))
        .collect()
}

/// Delete the entry `entry_id` of `user_id` while it is still unsettled.
///
/// # Errors
/// This function will return a:
/// - [Error::DeleteMissingIncomeEntry] if the entry does not exist or belongs to another user,
/// - [Error::EntryAlreadySettled] if the entry belongs to a settlement,
/// - or [Error::SqlError] if there is some other SQL error.
pub fn delete_unsettled_income_entry(
    user_id: UserID,
    entry_id: IncomeEntryId,
    connection: &Connection,
) -> Result<(), Error> {
    let rows_affected = connection.execute(
        "DELETE FROM income_entry
         WHERE id = :id AND user_id = :user_id AND settlement_id IS NULL",
        rusqlite::named_params! {":id": entry_id, ":user_id": user_id},
    )?;

    if rows_affected > 0 {
        return Ok(());
    }

    match get_income_entry(user_id, entry_id, connection) {
        Ok(_) => Err(Error::EntryAlreadySettled),
        Err(Error::NotFound) => Err(Error::DeleteMissingIncomeEntry),
        Err(error) => Err(error),
    }
}

// ============================================================================
// TESTS
// ============================================================================


#[cfg(test)]
mod database_tests {
    use time::macros::{date, datetime};

    use crate::{
        Error,
        income::{
            create_income_entry, delete_unsettled_income_entry, get_income_entry,
            get_unsettled_entries,
        },
        test_utils::{get_test_connection, insert_test_entry, insert_test_user, new_test_entry},
    };

    #[test]
    fn create_succeeds() {
        let connection = get_test_connection();
        let user = insert_test_user("driver", false, &connection);

        let entry = create_income_entry(
            user.id,
            new_test_entry(date!(2025 - 03 - 01), "ONT8", 20_000),
            datetime!(2025-03-01 18:00:00),
            &connection,
        )
        .unwrap();

        assert!(entry.id > 0);
        assert_eq!(entry.user_id, user.id);
        assert_eq!(entry.settlement_id, None);
        assert_eq!(entry.created_at, entry.updated_at);
        assert_eq!(get_income_entry(user.id, entry.id, &connection), Ok(entry));
    }

    #[test]
    fn get_entry_of_other_user_fails() {
        let connection = get_test_connection();
        let owner = insert_test_user("owner", false, &connection);
        let other = insert_test_user("other", false, &connection);
        let entry = insert_test_entry(owner.id, date!(2025 - 03 - 01), "ONT8", 20_000, &connection);

        assert_eq!(
            get_income_entry(other.id, entry.id, &connection),
            Err(Error::NotFound)
        );
    }

    #[test]
    fn unsettled_entries_are_newest_first_and_owner_scoped() {
        let connection = get_test_connection();
        let owner = insert_test_user("owner", false, &connection);
        let other = insert_test_user("other", false, &connection);
        let first = insert_test_entry(owner.id, date!(2025 - 03 - 01), "ONT8", 20_000, &connection);
        let second =
            insert_test_entry(owner.id, date!(2025 - 02 - 01), "LBG8", 15_000, &connection);
        insert_test_entry(other.id, date!(2025 - 03 - 01), "ONT8", 20_000, &connection);

        let entries = get_unsettled_entries(owner.id, &connection).unwrap();

        assert_eq!(entries, vec![second, first]);
    }

    #[test]
    fn delete_unsettled_entry_succeeds() {
        let connection = get_test_connection();
        let user = insert_test_user("driver", false, &connection);
        let entry = insert_test_entry(user.id, date!(2025 - 03 - 01), "ONT8", 20_000, &connection);

        delete_unsettled_income_entry(user.id, entry.id, &connection).unwrap();

        assert_eq!(
            get_income_entry(user.id, entry.id, &connection),
            Err(Error::NotFound)
        );
    }

    #[test]
    fn delete_entry_of_other_user_fails() {
        let connection = get_test_connection();
        let owner = insert_test_user("owner", false, &connection);
        let other = insert_test_user("other", false, &connection);
        let entry = insert_test_entry(owner.id, date!(2025 - 03 - 01), "ONT8", 20_000, &connection);

        let result = delete_unsettled_income_entry(other.id, entry.id, &connection);

        assert_eq!(result, Err(Error::DeleteMissingIncomeEntry));
        assert!(get_income_entry(owner.id, entry.id, &connection).is_ok());
    }

    #[test]
    fn delete_settled_entry_fails() {
        let connection = get_test_connection();
        let user = insert_test_user("driver", false, &connection);
        let entry = insert_test_entry(user.id, date!(2025 - 03 - 01), "ONT8", 20_000, &connection);
        crate::settlement::settle(user.id, datetime!(2025-03-02 09:00:00), &connection).unwrap();

        let result = delete_unsettled_income_entry(user.id, entry.id, &connection);

        assert_eq!(result, Err(Error::EntryAlreadySettled));
    }
}
