//! Defines the endpoint for listing a user's transactions.
use std::sync::{Arc, Mutex};

use axum::{
    Json,
    extract::{FromRef, Path, Query, State},
};
use rusqlite::Connection;
use serde::Deserialize;

use crate::{
    AppState, Error,
    db::lock_connection,
    pagination::PaginationConfig,
    transaction::{Transaction, get_user_transactions},
    user::UserID,
};

/// The state needed to list transactions.
#[derive(Debug, Clone)]
pub struct ListTransactionsState {
    /// The database connection for managing transactions.
    pub db_connection: Arc<Mutex<Connection>>,
    /// The page size and offset to use when the request does not specify them.
    pub pagination_config: PaginationConfig,
}

impl FromRef<AppState> for ListTransactionsState {
    fn from_ref(state: &AppState) -> Self {
        Self {
            db_connection: state.db_connection.clone(),
            pagination_config: state.pagination_config.clone(),
        }
    }
}

/// The query parameters for paging through transactions.
#[derive(Debug, Default, Deserialize)]
pub struct ListTransactionsQuery {
    /// The maximum number of transactions to return.
    pub limit: Option<u32>,
    /// The number of transactions to skip.
    pub skip: Option<u32>,
}

/// A route handler for listing a user's transactions, most recent first.
pub async fn list_transactions_endpoint(
    State(state): State<ListTransactionsState>,
    Path(user_id): Path<i64>,
    Query(query): Query<ListTransactionsQuery>,
) -> Result<Json<Vec<Transaction>>, Error> {
    let limit = query.limit.unwrap_or(state.pagination_config.default_limit);
    let skip = query.skip.unwrap_or(state.pagination_config.default_skip);

    let connection = lock_connection(&state.db_connection)?;

    get_user_transactions(UserID::new(user_id), limit, skip, &connection).map(Json)
}
