//! Summary statistics over a user's transactions.

use std::{
    collections::BTreeMap,
    sync::{Arc, Mutex},
};

use axum::{
    Json,
    extract::{FromRef, Path, Query, State},
};
use rusqlite::Connection;
use serde::{Deserialize, Serialize};
use time::Date;

use crate::{
    AppState, Error,
    db::lock_connection,
    transaction::{Transaction, TransactionType, get_transactions_in_range},
    user::{UserID, get_user_by_id},
};

/// Income and expense totals for a set of transactions.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Statistics {
    /// The sum of all income.
    pub total_income: f64,
    /// The sum of all expenses as a positive number.
    pub total_expenses: f64,
    /// Income minus expenses.
    pub balance: f64,
    /// The absolute value of transactions summed per category label.
    pub by_category: BTreeMap<String, f64>,
    /// How many transactions were counted.
    pub transaction_count: usize,
}

/// Reduce `transactions` into income, expense and per category totals.
pub fn compute_statistics(transactions: &[Transaction]) -> Statistics {
    let mut statistics = Statistics {
        transaction_count: transactions.len(),
        ..Default::default()
    };

    for transaction in transactions {
        let magnitude = transaction.amount.abs();

        match transaction.transaction_type {
            TransactionType::Income => statistics.total_income += magnitude,
            TransactionType::Expense => statistics.total_expenses += magnitude,
        }

        *statistics
            .by_category
            .entry(transaction.category.clone())
            .or_insert(0.0) += magnitude;
    }

    statistics.balance = statistics.total_income - statistics.total_expenses;
    statistics
}

/// The state needed to compute statistics.
#[derive(Debug, Clone)]
pub struct StatsState {
    /// The database connection for reading transactions.
    pub db_connection: Arc<Mutex<Connection>>,
}

impl FromRef<AppState> for StatsState {
    fn from_ref(state: &AppState) -> Self {
        Self {
            db_connection: state.db_connection.clone(),
        }
    }
}

/// The optional, inclusive date range to compute statistics over.
#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct StatsQuery {
    /// Ignore transactions before this date.
    pub start_date: Option<Date>,
    /// Ignore transactions after this date.
    pub end_date: Option<Date>,
}

/// A route handler for a user's income and expense statistics.
///
/// Responds with 404 if the user does not exist.
pub async fn get_stats_endpoint(
    State(state): State<StatsState>,
    Path(user_id): Path<i64>,
    Query(query): Query<StatsQuery>,
) -> Result<Json<Statistics>, Error> {
    let user_id = UserID::new(user_id);
    let connection = lock_connection(&state.db_connection)?;

    get_user_by_id(user_id, &connection)?;
    let transactions =
        get_transactions_in_range(user_id, query.start_date, query.end_date, &connection)?;

    Ok(Json(compute_statistics(&transactions)))
}
