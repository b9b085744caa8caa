//! User accounts and their storage.

use std::fmt::Display;

use rusqlite::{
    Connection, Row,
    types::{FromSql, FromSqlResult, ToSql, ToSqlOutput, ValueRef},
};
use serde::{Deserialize, Serialize};
use time::PrimitiveDateTime;

use crate::{Error, auth::PasswordHash};

/// The ID of a registered user.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct UserID(i64);

impl UserID {
    /// Create a new user ID.
    pub fn new(id: i64) -> Self {
        Self(id)
    }

    /// Cast the user ID to a 64 bit integer.
    pub fn as_i64(&self) -> i64 {
        self.0
    }
}

impl Display for UserID {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        self.0.fmt(f)
    }
}

impl ToSql for UserID {
    fn to_sql(&self) -> rusqlite::Result<ToSqlOutput<'_>> {
        Ok(ToSqlOutput::from(self.0))
    }
}

impl FromSql for UserID {
    fn column_result(value: ValueRef<'_>) -> FromSqlResult<Self> {
        i64::column_result(value).map(Self)
    }
}

/// A trimmed, non-empty username of at most [Username::MAX_LENGTH] characters.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Username(String);

impl Username {
    /// The maximum number of characters in a username.
    pub const MAX_LENGTH: usize = 64;

    /// Trim and validate a username.
    ///
    /// # Errors
    ///
    /// Returns [Error::InvalidUsername] if the trimmed username is empty or too long.
    pub fn new(raw_username: &str) -> Result<Self, Error> {
        let username = raw_username.trim();

        if username.is_empty() {
            return Err(Error::InvalidUsername(
                "Username cannot be empty".to_owned(),
            ));
        }

        if username.chars().count() > Self::MAX_LENGTH {
            return Err(Error::InvalidUsername(format!(
                "Username cannot be longer than {} characters",
                Self::MAX_LENGTH
            )));
        }

        Ok(Self(username.to_owned()))
    }

    /// The username as a string slice.
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl Display for Username {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(&self.0)
    }
}

/// A registered user of the application.
#[derive(Debug, Clone, PartialEq)]
pub struct User {
    /// The user's ID in the application database.
    pub id: UserID,
    /// The unique name the user logs in with.
    pub username: Username,
    /// The user's password hash.
    pub password_hash: PasswordHash,
    /// Whether the user can manage other users.
    pub is_admin: bool,
    /// When the account was registered, in server local time.
    pub created_at: PrimitiveDateTime,
}

/// Create the user table.
///
/// # Errors
///
/// This function will return an error if the SQL query failed.
pub fn create_user_table(connection: &Connection) -> Result<(), rusqlite::Error> {
    connection.execute_batch(
        "CREATE TABLE IF NOT EXISTS user (
            id INTEGER PRIMARY KEY,
            username TEXT NOT NULL UNIQUE,
            password TEXT NOT NULL,
            is_admin INTEGER NOT NULL DEFAULT 0,
            created_at TEXT NOT NULL
        );",
    )
}

/// Insert a new user into the database.
///
/// # Errors
///
/// Returns:
/// - [Error::DuplicateUsername] if `username` is already registered,
/// - or [Error::SqlError] if another SQL error occurred.
pub fn create_user(
    username: Username,
    password_hash: PasswordHash,
    is_admin: bool,
    created_at: PrimitiveDateTime,
    connection: &Connection,
) -> Result<User, Error> {
    connection.execute(
        "INSERT INTO user (username, password, is_admin, created_at) VALUES (?1, ?2, ?3, ?4)",
        (username.as_str(), &password_hash, is_admin, created_at),
    )?;

    let id = UserID::new(connection.last_insert_rowid());

    Ok(User {
        id,
        username,
        password_hash,
        is_admin,
        created_at,
    })
}

fn map_user_row(row: &Row) -> Result<User, rusqlite::Error> {
    let username: String = row.get(1)?;

    Ok(User {
        id: row.get(0)?,
        username: Username(username),
        password_hash: row.get(2)?,
        is_admin: row.get(3)?,
        created_at: row.get(4)?,
    })
}

/// Get the user with the ID `user_id`.
///
/// # Errors
///
/// Returns [Error::NotFound] if there is no such user, or [Error::SqlError] for
/// any other SQL error.
pub fn get_user_by_id(user_id: UserID, connection: &Connection) -> Result<User, Error> {
    connection
        .prepare(
            "SELECT id, username, password, is_admin, created_at FROM user WHERE id = :id",
        )?
        .query_row(&[(":id", &user_id)], map_user_row)
        .map_err(|error| error.into())
}

/// Get the user registered with `username`.
///
/// The username is trimmed before the lookup.
///
/// # Errors
///
/// Returns [Error::NotFound] if there is no such user, or [Error::SqlError] for
/// any other SQL error.
pub fn get_user_by_username(username: &str, connection: &Connection) -> Result<User, Error> {
    connection
        .prepare(
            "SELECT id, username, password, is_admin, created_at FROM user \
            WHERE username = :username",
        )?
        .query_row(&[(":username", &username.trim())], map_user_row)
        .map_err(|error| error.into())
}

/// Get every user, ordered by ID.
///
/// # Errors
///
/// Returns a [Error::SqlError] if an SQL related error occurred.
pub fn get_all_users(connection: &Connection) -> Result<Vec<User>, Error> {
    connection
        .prepare("SELECT id, username, password, is_admin, created_at FROM user ORDER BY id")?
        .query_map([], map_user_row)?
        .map(|maybe_user| maybe_user.map_err(Error::from))
        .collect()
}

/// Get the number of users in the database.
///
/// # Errors
///
/// Returns a [Error::SqlError] if an SQL related error occurred.
pub fn count_users(connection: &Connection) -> Result<usize, Error> {
    connection
        .query_row("SELECT COUNT(id) FROM user;", [], |row| {
            let count: i64 = row.get(0)?;
            usize::try_from(count).map_err(|_| rusqlite::Error::IntegralValueOutOfRange(0, count))
        })
        .map_err(|error| error.into())
}

/// Replace the password hash of the user with the ID `user_id`.
///
/// # Errors
///
/// Returns [Error::UpdateMissingUser] if there is no such user, or
/// [Error::SqlError] for any other SQL error.
pub fn update_password(
    user_id: UserID,
    password_hash: &PasswordHash,
    connection: &Connection,
) -> Result<(), Error> {
    let rows_affected = connection.execute(
        "UPDATE user SET password = ?1 WHERE id = ?2",
        (password_hash, user_id),
    )?;

    if rows_affected == 0 {
        return Err(Error::UpdateMissingUser);
    }

    Ok(())
}


#[cfg(test)]
mod user_tests {
    use rusqlite::Connection;
    use time::macros::datetime;

    use crate::{
        Error,
        auth::{
            PasswordHash, UserID, Username, count_users, create_user, create_user_table,
            get_all_users, get_user_by_id, get_user_by_username, update_password,
        },
    };

    fn get_db_connection() -> Connection {
        let conn =
            Connection::open_in_memory().expect("Could not create in-memory SQLite database");
        create_user_table(&conn).expect("Could not create user table");

        conn
    }

    fn insert_user(username: &str, is_admin: bool, connection: &Connection) -> crate::auth::User {
        create_user(
            Username::new(username).unwrap(),
            PasswordHash::new_unchecked("hunter2"),
            is_admin,
            datetime!(2025-06-01 09:30:00),
            connection,
        )
        .unwrap()
    }

    #[test]
    fn insert_user_succeeds() {
        let connection = get_db_connection();

        let user = insert_user("alice", true, &connection);

        assert!(user.id.as_i64() > 0);
        assert_eq!(user.username.as_str(), "alice");
        assert!(user.is_admin);
    }

    #[test]
    fn insert_duplicate_username_fails() {
        let connection = get_db_connection();
        insert_user("alice", false, &connection);

        let result = create_user(
            Username::new("alice").unwrap(),
            PasswordHash::new_unchecked("hunter3"),
            false,
            datetime!(2025-06-02 09:30:00),
            &connection,
        );

        assert_eq!(result, Err(Error::DuplicateUsername));
    }

    #[test]
    fn get_user_fails_with_non_existent_id() {
        let connection = get_db_connection();

        assert_eq!(
            get_user_by_id(UserID::new(42), &connection),
            Err(Error::NotFound)
        );
    }

    #[test]
    fn get_user_by_id_and_username_round_trip() {
        let connection = get_db_connection();
        let user = insert_user("bob", false, &connection);

        assert_eq!(get_user_by_id(user.id, &connection), Ok(user.clone()));
        assert_eq!(get_user_by_username(" bob ", &connection), Ok(user));
        assert_eq!(
            get_user_by_username("carol", &connection),
            Err(Error::NotFound)
        );
    }

    #[test]
    fn lists_users_in_id_order() {
        let connection = get_db_connection();
        let alice = insert_user("alice", true, &connection);
        let bob = insert_user("bob", false, &connection);

        assert_eq!(get_all_users(&connection), Ok(vec![alice, bob]));
        assert_eq!(count_users(&connection), Ok(2));
    }

    #[test]
    fn update_password_replaces_hash() {
        let connection = get_db_connection();
        let user = insert_user("alice", false, &connection);
        let new_hash = PasswordHash::new_unchecked("new-hash");

        update_password(user.id, &new_hash, &connection).unwrap();

        let got = get_user_by_id(user.id, &connection).unwrap();
        assert_eq!(got.password_hash, new_hash);
    }

    #[test]
    fn update_password_for_missing_user_fails() {
        let connection = get_db_connection();

        let result = update_password(
            UserID::new(7),
            &PasswordHash::new_unchecked("new-hash"),
            &connection,
        );

        assert_eq!(result, Err(Error::UpdateMissingUser));
    }
}
