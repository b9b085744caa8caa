use rusqlite::{Connection, Transaction, TransactionBehavior};

use crate::{Error, auth::UserID, auth::get_user_by_id};

/// Delete the user `target_id` along with all of their income entries and settlements.
///
/// Everything is deleted in one transaction, so a failure leaves the user's data untouched.
///
/// # Errors
///
/// Returns:
/// - [Error::CannotDeleteAdmin] if `target_id` is `admin_id` or another administrator,
/// - [Error::DeleteMissingUser] if there is no user with the ID `target_id`,
/// - or [Error::SqlError] if there is some other SQL error.
pub fn delete_user(admin_id: UserID, target_id: UserID, connection: &Connection) -> Result<(), Error> {
    if admin_id == target_id {
        return Err(Error::CannotDeleteAdmin);
    }

    let transaction = Transaction::new_unchecked(connection, TransactionBehavior::Immediate)?;

    let target = match get_user_by_id(target_id, &transaction) {
        Ok(user) => user,
        Err(Error::NotFound) => return Err(Error::DeleteMissingUser),
        Err(error) => return Err(error),
    };

    if target.is_admin {
        return Err(Error::CannotDeleteAdmin);
    }

    let entry_count = transaction.execute(
        "DELETE FROM income_entry WHERE user_id = ?1",
        [target_id],
    )?;
    let settlement_count =
        transaction.execute("DELETE FROM settlement WHERE user_id = ?1", [target_id])?;
    transaction.execute("DELETE FROM user WHERE id = ?1", [target_id])?;

    transaction.commit()?;

    tracing::info!(
        "admin {admin_id} deleted user {target_id} with {entry_count} income entries \
        and {settlement_count} settlements"
    );

    Ok(())
}
