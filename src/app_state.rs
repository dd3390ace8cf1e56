//! Implements a struct that holds the state of the REST server.

use std::{
    sync::{Arc, Mutex},
    time::Duration,
};

use axum::extract::FromRef;
use rusqlite::Connection;

use crate::{
    Error,
    config::Config,
    db::initialize,
    llm::LanguageModelClient,
    pagination::PaginationConfig,
    prediction::{PREDICTION_TIMEOUT, PredictionClient},
    timezone::get_local_offset,
};

/// The state of the REST server.
#[derive(Debug, Clone)]
pub struct AppState {
    /// The database connection
    pub db_connection: Arc<Mutex<Connection>>,

    /// The local timezone as a canonical timezone name, e.g. "Pacific/Auckland".
    pub local_timezone: String,

    /// The config that controls how to page lists of transactions.
    pub pagination_config: PaginationConfig,

    /// The client for the language model used for classification and recommendations.
    pub language_model: LanguageModelClient,

    /// The client for the external prediction service.
    pub prediction_service: PredictionClient,
}

impl AppState {
    /// Create a new [AppState] with a SQLite database connection.
    ///
    /// This function will initialize the database by adding the tables for the domain models.
    /// `local_timezone` should be a valid, canonical timezone name, e.g. "Pacific/Auckland".
    ///
    /// # Errors
    /// Returns an error if the database cannot be initialized or the timezone is invalid.
    pub fn new(
        db_connection: Connection,
        local_timezone: &str,
        pagination_config: PaginationConfig,
        language_model: LanguageModelClient,
        prediction_service: PredictionClient,
    ) -> Result<Self, Error> {
        initialize(&db_connection)?;

        if get_local_offset(local_timezone).is_none() {
            return Err(Error::InvalidTimezone(local_timezone.to_owned()));
        }

        Ok(Self {
            db_connection: Arc::new(Mutex::new(db_connection)),
            local_timezone: local_timezone.to_owned(),
            pagination_config,
            language_model,
            prediction_service,
        })
    }

    /// Create a new [AppState] from the server's command line configuration.
    ///
    /// # Errors
    /// Returns an error if the database cannot be initialized, the timezone is
    /// invalid, or an HTTP client cannot be built.
    pub fn from_config(db_connection: Connection, config: &Config) -> Result<Self, Error> {
        let language_model = LanguageModelClient::new(
            &config.llm_api_url,
            &config.llm_api_key,
            &config.llm_model,
            Duration::from_secs(config.llm_timeout_secs),
        )?;
        let prediction_service = PredictionClient::new(&config.prediction_url, PREDICTION_TIMEOUT)?;

        Self::new(
            db_connection,
            &config.timezone,
            PaginationConfig::default(),
            language_model,
            prediction_service,
        )
    }
}

impl FromRef<AppState> for LanguageModelClient {
    fn from_ref(state: &AppState) -> Self {
        state.language_model.clone()
    }
}
