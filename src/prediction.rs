//! Relays a user's recent transactions to the external prediction service.
//!
//! The service's responses are opaque here and passed back to the client
//! unchanged.

use std::{
    sync::{Arc, Mutex},
    time::Duration,
};

use axum::{
    Json,
    extract::{FromRef, State},
};
use rusqlite::Connection;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use time::Date;

use crate::{
    AppState, Error,
    db::lock_connection,
    json_body::JsonBody,
    transaction::{Transaction, TransactionType, get_user_transactions},
    user::{UserID, get_user_by_id},
};

/// The prediction service address used when none is configured.
pub const DEFAULT_PREDICTION_URL: &str = "http://localhost:5000";
/// How long to wait for the prediction service before giving up.
pub const PREDICTION_TIMEOUT: Duration = Duration::from_secs(30);
/// How many of the most recent transactions are sent to the prediction service.
pub const PREDICTION_HISTORY_LENGTH: u32 = 100;

const DEFAULT_PREDICTION_DAYS: u32 = 30;

/// The fields of a transaction the prediction service works with.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct PredictionInput {
    /// The signed amount.
    pub amount: f64,
    /// Income or expense.
    #[serde(rename = "type")]
    pub transaction_type: TransactionType,
    /// The category label.
    pub category: String,
    /// When the transaction happened.
    pub date: Date,
}

impl From<&Transaction> for PredictionInput {
    fn from(transaction: &Transaction) -> Self {
        Self {
            amount: transaction.amount,
            transaction_type: transaction.transaction_type,
            category: transaction.category.clone(),
            date: transaction.date,
        }
    }
}

#[derive(Debug, Serialize)]
struct PredictBody<'a> {
    transactions: &'a [PredictionInput],
    days: u32,
}

#[derive(Debug, Serialize)]
struct CategoryInsightsBody<'a> {
    transactions: &'a [PredictionInput],
}

/// A client for the prediction service.
#[derive(Debug, Clone)]
pub struct PredictionClient {
    http: reqwest::Client,
    base_url: String,
}

impl PredictionClient {
    /// Create a client for the prediction service at `base_url`.
    ///
    /// # Errors
    /// Returns [Error::Prediction] if the HTTP client cannot be built.
    pub fn new(base_url: &str, timeout: Duration) -> Result<Self, Error> {
        let http = reqwest::Client::builder()
            .timeout(timeout)
            .build()
            .map_err(|error| Error::Prediction {
                message: format!("could not build HTTP client: {error}"),
                details: None,
            })?;

        Ok(Self {
            http,
            base_url: base_url.trim_end_matches('/').to_owned(),
        })
    }

    /// Ask for a forecast of the next `days` days based on `transactions`.
    ///
    /// # Errors
    /// Returns [Error::Prediction] if the service cannot be reached, times out
    /// or responds with an error status.
    pub async fn predict(&self, transactions: &[PredictionInput], days: u32) -> Result<Value, Error> {
        self.post("/predict", &PredictBody { transactions, days })
            .await
    }

    /// Ask for a per category breakdown of the expenses in `transactions`.
    ///
    /// # Errors
    /// Returns [Error::Prediction] if the service cannot be reached, times out
    /// or responds with an error status.
    pub async fn category_insights(&self, transactions: &[PredictionInput]) -> Result<Value, Error> {
        self.post("/category-insights", &CategoryInsightsBody { transactions })
            .await
    }

    async fn post<T: Serialize>(&self, path: &str, body: &T) -> Result<Value, Error> {
        let url = format!("{}{path}", self.base_url);

        let response = self
            .http
            .post(&url)
            .json(body)
            .send()
            .await
            .map_err(|error| Error::Prediction {
                message: format!("could not reach {url}: {error}"),
                details: None,
            })?;

        let status = response.status();
        let text = response.text().await.map_err(|error| Error::Prediction {
            message: format!("could not read the response from {url}: {error}"),
            details: None,
        })?;
        let payload = serde_json::from_str::<Value>(&text);

        if !status.is_success() {
            return Err(Error::Prediction {
                message: format!("{url} responded with status {status}"),
                details: payload.ok(),
            });
        }

        payload.map_err(|error| Error::Prediction {
            message: format!("{url} returned invalid JSON: {error}"),
            details: None,
        })
    }
}

/// The state needed to request predictions.
#[derive(Debug, Clone)]
pub struct PredictionState {
    /// The database connection for reading transactions.
    pub db_connection: Arc<Mutex<Connection>>,
    /// The client for the prediction service.
    pub prediction_service: PredictionClient,
}

impl FromRef<AppState> for PredictionState {
    fn from_ref(state: &AppState) -> Self {
        Self {
            db_connection: state.db_connection.clone(),
            prediction_service: state.prediction_service.clone(),
        }
    }
}

/// The request body for a prediction.
#[derive(Debug, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PredictionRequest {
    /// The user to forecast for.
    pub user_id: UserID,
    /// How many days ahead to forecast.
    #[serde(default = "default_prediction_days")]
    pub days: u32,
}

fn default_prediction_days() -> u32 {
    DEFAULT_PREDICTION_DAYS
}

/// The request body for category insights.
#[derive(Debug, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CategoryInsightsRequest {
    /// The user to analyse.
    pub user_id: UserID,
}

/// Load the user's most recent transactions in the shape the prediction service expects.
fn load_prediction_inputs(
    user_id: UserID,
    db_connection: &Mutex<Connection>,
) -> Result<Vec<PredictionInput>, Error> {
    let connection = lock_connection(db_connection)?;

    get_user_by_id(user_id, &connection)?;
    let transactions = get_user_transactions(user_id, PREDICTION_HISTORY_LENGTH, 0, &connection)?;

    if transactions.is_empty() {
        return Err(Error::NoTransactions(user_id));
    }

    Ok(transactions.iter().map(PredictionInput::from).collect())
}

/// A route handler that forwards the user's recent transactions to the
/// prediction service and relays its forecast.
pub async fn predict_endpoint(
    State(state): State<PredictionState>,
    JsonBody(request): JsonBody<PredictionRequest>,
) -> Result<Json<Value>, Error> {
    let inputs = load_prediction_inputs(request.user_id, &state.db_connection)?;

    state
        .prediction_service
        .predict(&inputs, request.days)
        .await
        .map(Json)
}

/// A route handler that forwards the user's recent transactions to the
/// prediction service and relays its per category analysis.
pub async fn category_insights_endpoint(
    State(state): State<PredictionState>,
    JsonBody(request): JsonBody<CategoryInsightsRequest>,
) -> Result<Json<Value>, Error> {
    let inputs = load_prediction_inputs(request.user_id, &state.db_connection)?;

    state
        .prediction_service
        .category_insights(&inputs)
        .await
        .map(Json)
}
