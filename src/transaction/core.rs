//! Defines the core data models and database queries for transactions.

use rusqlite::{
    Connection, Row, ToSql,
    types::{FromSql, FromSqlError, FromSqlResult, ToSqlOutput, ValueRef},
};
use serde::{Deserialize, Serialize};
use time::{Date, OffsetDateTime};

use crate::{
    Error,
    database_id::TransactionId,
    user::{UserID, adjust_balance},
};

// ============================================================================
// MODELS
// ============================================================================

/// Whether money was earned or spent.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum TransactionType {
    /// Money flowing into the user's account, stored with a positive amount.
    Income,
    /// Money flowing out of the user's account, stored with a negative amount.
    Expense,
}

impl TransactionType {
    /// Infer the type from the sign of `amount`, negative amounts are expenses.
    pub fn from_amount(amount: f64) -> Self {
        if amount < 0.0 {
            TransactionType::Expense
        } else {
            TransactionType::Income
        }
    }

    /// Apply the sign convention for this type to the magnitude of `amount`.
    pub fn signed_amount(self, amount: f64) -> f64 {
        match self {
            TransactionType::Income => amount.abs(),
            TransactionType::Expense => -amount.abs(),
        }
    }

    /// The name used for this type on the wire and in the database.
    pub fn as_str(&self) -> &'static str {
        match self {
            TransactionType::Income => "income",
            TransactionType::Expense => "expense",
        }
    }
}

impl ToSql for TransactionType {
    fn to_sql(&self) -> rusqlite::Result<ToSqlOutput<'_>> {
        Ok(ToSqlOutput::from(self.as_str()))
    }
}

impl FromSql for TransactionType {
    fn column_result(value: ValueRef<'_>) -> FromSqlResult<Self> {
        match value.as_str()? {
            "income" => Ok(TransactionType::Income),
            "expense" => Ok(TransactionType::Expense),
            _ => Err(FromSqlError::InvalidType),
        }
    }
}

/// An expense or income, i.e. an event where money was either spent or earned.
///
/// To create a new `Transaction`, use [Transaction::build].
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Transaction {
    /// The ID of the transaction.
    pub id: TransactionId,
    /// The user the transaction belongs to.
    pub user_id: UserID,
    /// A text description of what the transaction was for.
    pub description: String,
    /// The amount of money spent (negative) or earned (positive).
    pub amount: f64,
    /// The category label, e.g. "🍔 Comida".
    pub category: String,
    /// Whether the transaction is income or an expense. Always agrees with
    /// the sign of `amount`.
    #[serde(rename = "type")]
    pub transaction_type: TransactionType,
    /// When the transaction happened.
    pub date: Date,
    /// When the transaction was recorded.
    #[serde(with = "time::serde::rfc3339")]
    pub created_at: OffsetDateTime,
}

impl Transaction {
    /// Create a new transaction.
    ///
    /// Shortcut for [TransactionBuilder] for discoverability.
    pub fn build(user_id: UserID, amount: f64, date: Date, description: &str) -> TransactionBuilder {
        TransactionBuilder {
            user_id,
            amount,
            date,
            description: description.to_owned(),
            transaction_type: None,
            category: None,
        }
    }
}

/// A builder for creating [Transaction] instances.
///
/// # Examples
///
/// ```ignore
/// use time::macros::date;
///
/// let builder = Transaction::build(user.id, 45.99, date!(2025 - 01 - 15), "Coffee")
///     .transaction_type(Some(TransactionType::Expense))
///     .category("🍔 Comida");
///
/// assert_eq!(builder.resolved_amount(), -45.99);
/// ```
#[derive(Debug, PartialEq, Clone)]
pub struct TransactionBuilder {
    /// The user that owns the transaction.
    pub user_id: UserID,

    /// The monetary amount of the transaction as submitted by the client.
    ///
    /// When a type is set only the magnitude is used, the sign is taken from
    /// the type. Otherwise, negative values are expenses and positive values
    /// are income.
    pub amount: f64,

    /// The date when the transaction occurred.
    pub date: Date,

    /// A human-readable description of the transaction.
    pub description: String,

    /// Whether the transaction is income or an expense.
    pub transaction_type: Option<TransactionType>,

    /// The category label, defaults to the fallback category.
    pub category: Option<String>,
}

impl TransactionBuilder {
    /// Set the transaction type.
    pub fn transaction_type(mut self, transaction_type: Option<TransactionType>) -> Self {
        self.transaction_type = transaction_type;
        self
    }

    /// Set the category label.
    pub fn category(mut self, category: &str) -> Self {
        self.category = Some(category.to_owned());
        self
    }

    /// The type of the transaction, inferred from the amount when not set.
    pub fn resolved_type(&self) -> TransactionType {
        self.transaction_type
            .unwrap_or_else(|| TransactionType::from_amount(self.amount))
    }

    /// The amount with the sign dictated by [TransactionBuilder::resolved_type].
    pub fn resolved_amount(&self) -> f64 {
        self.resolved_type().signed_amount(self.amount)
    }
}

// ============================================================================
// DATABASE FUNCTIONS
// ============================================================================

/// Create a transaction and add its amount to the owner's balance.
///
/// Both writes happen in one SQL transaction, so either both succeed or
/// nothing is written.
///
/// # Errors
/// This function will return a:
/// - [Error::EmptyDescription] if the description is blank,
/// - [Error::InvalidAmount] if the amount is zero or not finite,
/// - [Error::NotFound] if the user does not exist,
/// - or [Error::SqlError] if there is some other SQL error.
pub fn record_transaction(
    builder: TransactionBuilder,
    connection: &mut Connection,
) -> Result<Transaction, Error> {
    let sql_transaction = connection.transaction()?;

    let transaction = insert_transaction(builder, &sql_transaction)?;
    adjust_balance(transaction.user_id, transaction.amount, &sql_transaction)?;

    sql_transaction.commit()?;

    Ok(transaction)
}

/// Delete a transaction and subtract its amount from the owner's balance.
///
/// Both writes happen in one SQL transaction, so either both succeed or
/// nothing is written.
///
/// Returns the deleted transaction.
///
/// # Errors
/// This function will return a:
/// - [Error::NotFound] if `id` does not refer to a valid transaction,
/// - or [Error::SqlError] if there is some other SQL error.
pub fn remove_transaction(
    id: TransactionId,
    connection: &mut Connection,
) -> Result<Transaction, Error> {
    let sql_transaction = connection.transaction()?;

    let transaction = get_transaction(id, &sql_transaction)?;
    adjust_balance(transaction.user_id, -transaction.amount, &sql_transaction)?;
    sql_transaction.execute(
        "DELETE FROM \"transaction\" WHERE id = :id",
        &[(":id", &id)],
    )?;

    sql_transaction.commit()?;

    Ok(transaction)
}

/// Insert a transaction without touching the owner's balance.
///
/// Use [record_transaction] unless the caller manages the balance itself.
fn insert_transaction(
    builder: TransactionBuilder,
    connection: &Connection,
) -> Result<Transaction, Error> {
    let description = builder.description.trim();

    if description.is_empty() {
        return Err(Error::EmptyDescription);
    }

    if builder.amount == 0.0 || !builder.amount.is_finite() {
        return Err(Error::InvalidAmount(builder.amount));
    }

    let transaction_type = builder.resolved_type();
    let amount = builder.resolved_amount();
    let category = builder
        .category
        .as_deref()
        .unwrap_or(crate::classify::FALLBACK_CATEGORY);

    let transaction = connection
        .prepare(
            "INSERT INTO \"transaction\" (user_id, description, amount, category, type, date, created_at)
             VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7)
             RETURNING id, user_id, description, amount, category, type, date, created_at",
        )?
        .query_row(
            (
                builder.user_id.as_i64(),
                description,
                amount,
                category,
                transaction_type,
                builder.date,
                OffsetDateTime::now_utc(),
            ),
            map_transaction_row,
        )?;

    Ok(transaction)
}

/// Retrieve a transaction from the database by its `id`.
///
/// # Errors
/// This function will return a:
/// - [Error::NotFound] if `id` does not refer to a valid transaction,
/// - or [Error::SqlError] there is some other SQL error.
pub fn get_transaction(id: TransactionId, connection: &Connection) -> Result<Transaction, Error> {
    let transaction = connection
        .prepare(
            "SELECT id, user_id, description, amount, category, type, date, created_at
             FROM \"transaction\" WHERE id = :id",
        )?
        .query_row(&[(":id", &id)], map_transaction_row)?;

    Ok(transaction)
}

/// Get a page of the user's transactions, most recent first.
///
/// Transactions on the same date are ordered by descending ID so that the
/// order is stable.
///
/// # Errors
/// This function will return a [Error::SqlError] if there is an SQL error.
pub fn get_user_transactions(
    user_id: UserID,
    limit: u32,
    offset: u32,
    connection: &Connection,
) -> Result<Vec<Transaction>, Error> {
    connection
        .prepare(
            "SELECT id, user_id, description, amount, category, type, date, created_at
             FROM \"transaction\" WHERE user_id = ?1
             ORDER BY date DESC, id DESC
             LIMIT ?2 OFFSET ?3",
        )?
        .query_map((user_id.as_i64(), limit, offset), map_transaction_row)?
        .map(|transaction_result| transaction_result.map_err(Error::SqlError))
        .collect()
}

/// Get all of the user's transactions dated between `start` and `end`
/// (inclusive), most recent first.
///
/// A bound of `None` leaves that side of the range open.
///
/// # Errors
/// This function will return a [Error::SqlError] if there is an SQL error.
pub fn get_transactions_in_range(
    user_id: UserID,
    start: Option<Date>,
    end: Option<Date>,
    connection: &Connection,
) -> Result<Vec<Transaction>, Error> {
    connection
        .prepare(
            "SELECT id, user_id, description, amount, category, type, date, created_at
             FROM \"transaction\"
             WHERE user_id = ?1
                AND (?2 IS NULL OR date >= ?2)
                AND (?3 IS NULL OR date <= ?3)
             ORDER BY date DESC, id DESC",
        )?
        .query_map((user_id.as_i64(), start, end), map_transaction_row)?
        .map(|transaction_result| transaction_result.map_err(Error::SqlError))
        .collect()
}

/// Get the total number of transactions in the database.
///
/// # Errors
/// This function will return a [Error::SqlError] there is some SQL error.
#[cfg(test)]
pub fn count_transactions(connection: &Connection) -> Result<u32, Error> {
    connection
        .query_row("SELECT COUNT(id) FROM \"transaction\";", [], |row| {
            row.get(0)
        })
        .map_err(|error| error.into())
}

/// Create the transaction table in the database.
///
/// # Errors
/// Returns an error if the table cannot be created or if there is an SQL error.
pub fn create_transaction_table(connection: &Connection) -> Result<(), rusqlite::Error> {
    connection.execute(
        "CREATE TABLE IF NOT EXISTS \"transaction\" (
                id INTEGER PRIMARY KEY AUTOINCREMENT,
                user_id INTEGER NOT NULL,
                description TEXT NOT NULL,
                amount REAL NOT NULL,
                category TEXT NOT NULL,
                type TEXT NOT NULL CHECK (type IN ('income', 'expense')),
                date TEXT NOT NULL,
                created_at TEXT NOT NULL,
                FOREIGN KEY(user_id) REFERENCES user(id) ON UPDATE CASCADE ON DELETE CASCADE
                )",
        (),
    )?;

    // Listing and statistics filter by user and sort or filter by date.
    connection.execute(
        "CREATE INDEX IF NOT EXISTS idx_transaction_user_date ON \"transaction\"(user_id, date);",
        (),
    )?;

    Ok(())
}

/// Map a database row to a Transaction.
pub fn map_transaction_row(row: &Row) -> Result<Transaction, rusqlite::Error> {
    Ok(Transaction {
        id: row.get(0)?,
        user_id: UserID::new(row.get(1)?),
        description: row.get(2)?,
        amount: row.get(3)?,
        category: row.get(4)?,
        transaction_type: row.get(5)?,
        date: row.get(6)?,
        created_at: row.get(7)?,
    })
}

// ============================================================================
// TESTS
// ============================================================================
