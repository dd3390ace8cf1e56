//! Defines the endpoint for deleting a transaction.
use std::sync::{Arc, Mutex};

use axum::{
    Json,
    extract::{FromRef, Path, State},
};
use rusqlite::Connection;
use serde::{Deserialize, Serialize};

use crate::{
    AppState, Error,
    database_id::TransactionId,
    db::lock_connection,
    transaction::{Transaction, remove_transaction},
};

/// The state needed to delete a transaction.
#[derive(Debug, Clone)]
pub struct DeleteTransactionState {
    /// The database connection for managing transactions.
    db_connection: Arc<Mutex<Connection>>,
}

impl FromRef<AppState> for DeleteTransactionState {
    fn from_ref(state: &AppState) -> Self {
        Self {
            db_connection: state.db_connection.clone(),
        }
    }
}

/// The response body for a deleted transaction.
#[derive(Debug, Serialize, Deserialize, PartialEq)]
pub struct DeletedTransaction {
    /// A confirmation message.
    pub message: String,
    /// The transaction as it was before it was deleted.
    pub transaction: Transaction,
}

/// A route handler for deleting a transaction and reverting its effect on the owner's balance.
///
/// Responds with 404 if the transaction does not exist.
pub async fn delete_transaction_endpoint(
    State(state): State<DeleteTransactionState>,
    Path(transaction_id): Path<TransactionId>,
) -> Result<Json<DeletedTransaction>, Error> {
    let mut connection = lock_connection(&state.db_connection)?;

    let transaction = remove_transaction(transaction_id, &mut connection).inspect_err(|error| {
        if *error != Error::NotFound {
            tracing::error!("Could not delete transaction {transaction_id}: {error}");
        }
    })?;

    Ok(Json(DeletedTransaction {
        message: "Transaction deleted".to_owned(),
        transaction,
    }))
}

#[cfg(test)]
mod tests {
    use axum::{Router, http::StatusCode, routing::delete};
    use axum_test::TestServer;
    use time::macros::date;

    use crate::{
        endpoints::{self, format_endpoint},
        test_utils::get_test_state,
        transaction::{Transaction, record_transaction},
        user::{Email, create_user, get_user_by_id},
    };

    use super::{DeletedTransaction, delete_transaction_endpoint};

    #[tokio::test]
    async fn deletes_transaction_and_reverts_balance() {
        let state = get_test_state("http://127.0.0.1:1", "http://127.0.0.1:1");
        let (user, transaction) = {
            let mut connection = state.db_connection.lock().unwrap();
            let user = create_user(Email::new("a@b.com").unwrap(), "A", &connection).unwrap();
            record_transaction(
                Transaction::build(user.id, 200.0, date!(2025 - 10 - 01), "Salary"),
                &mut connection,
            )
            .unwrap();
            let transaction = record_transaction(
                Transaction::build(user.id, -50.0, date!(2025 - 10 - 02), "Dinner"),
                &mut connection,
            )
            .unwrap();
            (user, transaction)
        };
        let app = Router::new()
            .route(endpoints::TRANSACTION, delete(delete_transaction_endpoint))
            .with_state(state.clone());
        let server = TestServer::try_new(app).expect("Could not create test server.");

        let response = server
            .delete(&format_endpoint(endpoints::TRANSACTION, transaction.id))
            .await;

        response.assert_status_ok();
        assert_eq!(response.json::<DeletedTransaction>().transaction, transaction);
        let connection = state.db_connection.lock().unwrap();
        assert_eq!(get_user_by_id(user.id, &connection).unwrap().balance, 200.0);
    }

    #[tokio::test]
    async fn deleting_missing_transaction_is_not_found() {
        let state = get_test_state("http://127.0.0.1:1", "http://127.0.0.1:1");
        let app = Router::new()
            .route(endpoints::TRANSACTION, delete(delete_transaction_endpoint))
            .with_state(state);
        let server = TestServer::try_new(app).expect("Could not create test server.");

        let response = server
            .delete(&format_endpoint(endpoints::TRANSACTION, 42))
            .await;

        response.assert_status(StatusCode::NOT_FOUND);
    }
}
