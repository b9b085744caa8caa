use std::sync::{Arc, Mutex};

use rusqlite::Connection;
use time::{Date, macros::datetime};

use crate::{
    auth::{PasswordHash, User, Username, ValidatedPassword, create_user},
    db::initialize,
    income::{IncomeEntry, NewIncomeEntry, create_income_entry},
    money::Amount,
};

/// The password of every user made by [insert_test_user].
pub(crate) const TEST_PASSWORD: &str = "correct horse battery staple";

pub(crate) fn get_test_connection() -> Connection {
    let connection = Connection::open_in_memory().expect("Could not open in-memory database");
    initialize(&connection).expect("Could not initialize database");
    connection
}

pub(crate) fn get_shared_test_connection() -> Arc<Mutex<Connection>> {
    Arc::new(Mutex::new(get_test_connection()))
}

#[track_caller]
pub(crate) fn insert_test_user(username: &str, is_admin: bool, connection: &Connection) -> User {
    // The minimum bcrypt cost keeps the tests fast.
    let password_hash = PasswordHash::new(ValidatedPassword::new_unchecked(TEST_PASSWORD), 4)
        .expect("Could not hash test password");

    create_user(
        Username::new(username).expect("Invalid test username"),
        password_hash,
        is_admin,
        datetime!(2025-01-01 08:00:00),
        connection,
    )
    .expect("Could not create test user")
}

#[track_caller]
pub(crate) fn new_test_entry(entry_date: Date, destination: &str, cents: i64) -> NewIncomeEntry {
    NewIncomeEntry::new(
        entry_date,
        destination,
        None,
        Amount::from_cents(cents),
        false,
    )
    .expect("Invalid test entry")
}

#[track_caller]
pub(crate) fn insert_test_entry(
    user_id: crate::auth::UserID,
    entry_date: Date,
    destination: &str,
    cents: i64,
    connection: &Connection,
) -> IncomeEntry {
    create_income_entry(
        user_id,
        new_test_entry(entry_date, destination, cents),
        datetime!(2025-03-01 18:00:00),
        connection,
    )
    .expect("Could not create test entry")
}
