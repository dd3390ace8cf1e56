//! Defines the endpoint for creating a new transaction.
use std::sync::{Arc, Mutex};

use axum::{
    Json,
    extract::{FromRef, State},
    http::StatusCode,
};
use rusqlite::Connection;
use serde::{Deserialize, Serialize};
use time::Date;

use crate::{
    AppState, Error,
    classify::classify_or_fallback,
    db::lock_connection,
    json_body::JsonBody,
    llm::LanguageModelClient,
    timezone::local_today,
    transaction::{Transaction, TransactionType, record_transaction},
    user::{UserID, get_user_by_id},
};

/// The state needed to create a transaction.
#[derive(Debug, Clone)]
pub struct CreateTransactionState {
    /// The database connection for managing transactions.
    pub db_connection: Arc<Mutex<Connection>>,
    /// The local timezone as a canonical timezone name, e.g. "Pacific/Auckland".
    pub local_timezone: String,
    /// The language model used to categorize the transaction.
    pub language_model: LanguageModelClient,
}

impl FromRef<AppState> for CreateTransactionState {
    fn from_ref(state: &AppState) -> Self {
        Self {
            db_connection: state.db_connection.clone(),
            local_timezone: state.local_timezone.clone(),
            language_model: state.language_model.clone(),
        }
    }
}

/// The request body for creating a transaction.
#[derive(Debug, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct NewTransactionRequest {
    /// The user the transaction belongs to.
    pub user_id: UserID,
    /// Text detailing the transaction.
    pub description: String,
    /// The value of the transaction. Only the magnitude is used when `type` is given.
    pub amount: f64,
    /// Whether the transaction is income or an expense, inferred from the sign of
    /// `amount` when omitted.
    #[serde(rename = "type", default)]
    pub transaction_type: Option<TransactionType>,
    /// The category label, the description is classified when omitted.
    #[serde(default)]
    pub category: Option<String>,
    /// When the transaction happened, defaults to today.
    #[serde(default)]
    pub date: Option<Date>,
}

/// A route handler for creating a new transaction and updating the owner's balance.
///
/// Responds with 201 and the created transaction.
pub async fn create_transaction_endpoint(
    State(state): State<CreateTransactionState>,
    JsonBody(request): JsonBody<NewTransactionRequest>,
) -> Result<(StatusCode, Json<Transaction>), Error> {
    let description = request.description.trim();

    if description.is_empty() {
        return Err(Error::EmptyDescription);
    }

    if request.amount == 0.0 || !request.amount.is_finite() {
        return Err(Error::InvalidAmount(request.amount));
    }

    // Check the user before spending a language model call on them.
    {
        let connection = lock_connection(&state.db_connection)?;
        get_user_by_id(request.user_id, &connection)?;
    }

    let date = match request.date {
        Some(date) => date,
        None => local_today(&state.local_timezone)?,
    };

    let category = match request
        .category
        .as_deref()
        .map(str::trim)
        .filter(|category| !category.is_empty())
    {
        Some(category) => category.to_owned(),
        None => classify_or_fallback(description, &state.language_model).await,
    };

    let builder = Transaction::build(request.user_id, request.amount, date, description)
        .transaction_type(request.transaction_type)
        .category(&category);

    let mut connection = lock_connection(&state.db_connection)?;
    let transaction = record_transaction(builder, &mut connection).inspect_err(|error| {
        tracing::error!("could not create transaction: {error}");
    })?;

    Ok((StatusCode::CREATED, Json(transaction)))
}
