//! Code for creating the user table and fetching users from the database.

use std::fmt::Display;

use email_address::{EmailAddress, Options};
use rusqlite::{Connection, Row};
use serde::{Deserialize, Serialize};
use time::OffsetDateTime;

use crate::Error;

/// A newtype wrapper for integer user IDs.
///
/// This helps disambiguate user IDs from other types of IDs, leading to better compile time
/// errors, and more flexible generics that can have distinct implementations for multiple ID types.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize, Hash)]
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

/// A validated, normalised email address.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Email(String);

impl Email {
    /// Create and validate an email address.
    ///
    /// Surrounding whitespace is removed and the address is lowercased so
    /// that "A@B.com" and "a@b.com" are treated as the same address.
    /// Display names such as "A <a@b.com>" are not accepted.
    ///
    /// # Errors
    ///
    /// Returns [Error::InvalidEmail] if `raw_email` is not a valid address.
    pub fn new(raw_email: &str) -> Result<Self, Error> {
        let email = raw_email.trim().to_lowercase();

        EmailAddress::parse_with_options(&email, Options::default().without_display_text())
            .map(|address| Self(address.as_str().to_owned()))
            .map_err(|error| {
                tracing::debug!("rejected email address {raw_email:?}: {error}");
                Error::InvalidEmail(raw_email.to_owned())
            })
    }

    /// Create a new `Email` without any validation.
    ///
    /// The caller should ensure that `raw_email` is a correctly formatted email address,
    /// e.g. one that was read back from the database.
    pub fn new_unchecked(raw_email: String) -> Self {
        Self(raw_email)
    }

    /// The email address as a string slice.
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl Display for Email {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// A user of the application.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct User {
    /// The user's ID in the application database.
    pub id: UserID,
    /// The user's unique email address.
    pub email: Email,
    /// The name shown on the dashboard.
    pub name: String,
    /// The sum of the amounts of all of the user's transactions.
    ///
    /// Only changed as a side effect of creating or deleting a transaction.
    pub balance: f64,
    /// When the user registered.
    #[serde(with = "time::serde::rfc3339")]
    pub created_at: OffsetDateTime,
}

/// Create the user table.
///
/// # Errors
///
/// This function will return an error if the SQL query failed.
pub fn create_user_table(connection: &Connection) -> Result<(), rusqlite::Error> {
    connection.execute(
        "CREATE TABLE IF NOT EXISTS user (
                id INTEGER PRIMARY KEY,
                email TEXT NOT NULL UNIQUE,
                name TEXT NOT NULL,
                balance REAL NOT NULL DEFAULT 0,
                created_at TEXT NOT NULL
                )",
        (),
    )?;

    Ok(())
}

/// Create and insert a new user with a zero balance into the database.
///
/// # Errors
///
/// Returns a:
/// - [Error::EmptyName] if `name` is blank,
/// - [Error::DuplicateEmail] if `email` belongs to another user,
/// - or [Error::SqlError] if some other SQL related error occurred.
pub fn create_user(email: Email, name: &str, connection: &Connection) -> Result<User, Error> {
    let name = name.trim();

    if name.is_empty() {
        return Err(Error::EmptyName);
    }

    connection
        .prepare(
            "INSERT INTO user (email, name, balance, created_at) VALUES (?1, ?2, 0, ?3)
             RETURNING id, email, name, balance, created_at",
        )?
        .query_row(
            (email.as_str(), name, OffsetDateTime::now_utc()),
            map_user_row,
        )
        .map_err(|error| match error {
            rusqlite::Error::SqliteFailure(
                rusqlite::ffi::Error {
                    code: _,
                    extended_code: rusqlite::ffi::SQLITE_CONSTRAINT_UNIQUE,
                },
                _,
            ) => Error::DuplicateEmail(email.to_string()),
            error => error.into(),
        })
}

/// Get the user from the database with an ID equal to `user_id`.
///
/// # Errors
///
/// This function will return an error if:
/// - `user_id` does not belong to a registered user.
/// - there was an error trying to access the store.
pub fn get_user_by_id(user_id: UserID, connection: &Connection) -> Result<User, Error> {
    connection
        .prepare("SELECT id, email, name, balance, created_at FROM user WHERE id = :id")?
        .query_row(&[(":id", &user_id.as_i64())], map_user_row)
        .map_err(|error| error.into())
}

/// Add `delta` to the balance of the user `user_id` and return the new balance.
///
/// The addition happens inside the database, so it is not a read-modify-write
/// race between concurrent callers. Callers that pair this with another write
/// should run both inside one SQL transaction.
///
/// # Errors
///
/// Returns [Error::NotFound] if `user_id` does not belong to a registered user,
/// or [Error::SqlError] if some other SQL related error occurred.
pub fn adjust_balance(user_id: UserID, delta: f64, connection: &Connection) -> Result<f64, Error> {
    connection
        .prepare("UPDATE user SET balance = balance + ?1 WHERE id = ?2 RETURNING balance")?
        .query_row((delta, user_id.as_i64()), |row| row.get(0))
        .map_err(|error| error.into())
}

fn map_user_row(row: &Row) -> Result<User, rusqlite::Error> {
    let raw_email: String = row.get(1)?;

    Ok(User {
        id: UserID::new(row.get(0)?),
        email: Email::new_unchecked(raw_email),
        name: row.get(2)?,
        balance: row.get(3)?,
        created_at: row.get(4)?,
    })
}

#[cfg(test)]
mod user_tests {
    use rusqlite::Connection;

    use crate::{
        Error,
        user::{Email, UserID, adjust_balance, create_user, get_user_by_id},
    };

    use super::create_user_table;

    fn get_db_connection() -> Connection {
        let conn =
            Connection::open_in_memory().expect("Could not create in-memory SQLite database");
        create_user_table(&conn).expect("Could not create user table");

        conn
    }

    #[test]
    fn email_is_normalised() {
        let email = Email::new("  Foo@Bar.BAZ ").unwrap();

        assert_eq!(email.as_str(), "foo@bar.baz");
    }

    #[test]
    fn email_without_at_symbol_is_rejected() {
        assert_eq!(
            Email::new("foobar.baz"),
            Err(Error::InvalidEmail("foobar.baz".to_owned()))
        );
    }

    #[test]
    fn email_with_empty_parts_is_rejected() {
        assert!(Email::new("@bar.baz").is_err());
        assert!(Email::new("foo@").is_err());
        assert!(Email::new("foo@bar@baz").is_err());
        assert!(Email::new("foo bar@baz").is_err());
    }

    #[test]
    fn malformed_email_is_rejected() {
        for raw_email in ["a@.", "a@b..c", "<x>@y", "a,b@c", "A <a@b.com>"] {
            assert_eq!(
                Email::new(raw_email),
                Err(Error::InvalidEmail(raw_email.to_owned())),
                "{raw_email:?} should be rejected"
            );
        }
    }

    #[test]
    fn insert_user_succeeds() {
        let db_connection = get_db_connection();
        let email = Email::new("a@b.com").unwrap();

        let inserted_user = create_user(email.clone(), "A", &db_connection).unwrap();

        assert!(inserted_user.id.as_i64() > 0);
        assert_eq!(inserted_user.email, email);
        assert_eq!(inserted_user.name, "A");
        assert_eq!(inserted_user.balance, 0.0);
    }

    #[test]
    fn insert_user_fails_with_duplicate_email() {
        let db_connection = get_db_connection();
        create_user(Email::new("a@b.com").unwrap(), "A", &db_connection).unwrap();

        let result = create_user(Email::new("A@b.com").unwrap(), "Other A", &db_connection);

        assert_eq!(result, Err(Error::DuplicateEmail("a@b.com".to_owned())));
    }

    #[test]
    fn insert_user_fails_with_blank_name() {
        let db_connection = get_db_connection();

        let result = create_user(Email::new("a@b.com").unwrap(), "   ", &db_connection);

        assert_eq!(result, Err(Error::EmptyName));
    }

    #[test]
    fn get_user_fails_with_non_existent_id() {
        let db_connection = get_db_connection();

        let id = UserID::new(42);

        assert_eq!(get_user_by_id(id, &db_connection), Err(Error::NotFound));
    }

    #[test]
    fn get_user_succeeds_with_existing_id() {
        let db_connection = get_db_connection();
        let test_user = create_user(Email::new("a@b.com").unwrap(), "A", &db_connection).unwrap();

        let retrieved_user = get_user_by_id(test_user.id, &db_connection).unwrap();

        assert_eq!(retrieved_user, test_user);
    }

    #[test]
    fn adjust_balance_accumulates() {
        let db_connection = get_db_connection();
        let user = create_user(Email::new("a@b.com").unwrap(), "A", &db_connection).unwrap();

        adjust_balance(user.id, 100.0, &db_connection).unwrap();
        let balance = adjust_balance(user.id, -30.5, &db_connection).unwrap();

        assert_eq!(balance, 69.5);
        assert_eq!(get_user_by_id(user.id, &db_connection).unwrap().balance, 69.5);
    }

    #[test]
    fn adjust_balance_fails_for_missing_user() {
        let db_connection = get_db_connection();

        let result = adjust_balance(UserID::new(7), 1.0, &db_connection);

        assert_eq!(result, Err(Error::NotFound));
    }
}
