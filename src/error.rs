//! Defines the app level error type and its conversion to JSON error responses.
use axum::{
    Json,
    extract::rejection::JsonRejection,
    http::StatusCode,
    response::{IntoResponse, Response},
};
use serde_json::{Value, json};

use crate::user::UserID;

/// The errors that may occur in the application.
#[derive(Debug, thiserror::Error, PartialEq)]
pub enum Error {
    /// The email address used to register a user is already taken.
    #[error("the email address \"{0}\" is already registered")]
    DuplicateEmail(String),

    /// The user provided a malformed email address.
    #[error("\"{0}\" is not a valid email address")]
    InvalidEmail(String),

    /// An empty string was used as a user's display name.
    #[error("name cannot be empty")]
    EmptyName,

    /// An empty string was used as a transaction description.
    #[error("description cannot be empty")]
    EmptyDescription,

    /// A transaction amount of zero, or one that is not a finite number.
    #[error("{0} is not a valid transaction amount")]
    InvalidAmount(f64),

    /// The request body was not JSON or did not have the expected fields.
    #[error("invalid request body: {0}")]
    InvalidRequestBody(String),

    /// An operation needed at least one transaction, but the user has none.
    #[error("user {0} has no transactions")]
    NoTransactions(UserID),

    /// The requested resource was not found.
    ///
    /// For HTTP request handlers, the client should check that the parameters
    /// (e.g., ID) are correct and that the resource has been created.
    ///
    /// Internally, this error may occur when a query returns no rows or
    /// refers to a user that does not exist.
    #[error("the requested resource could not be found")]
    NotFound,

    /// The language model API could not be reached or returned an unusable
    /// response.
    ///
    /// The error string should only be logged on the server.
    #[error("language model request failed: {0}")]
    LanguageModel(String),

    /// The prediction service could not be reached, timed out or returned an
    /// error status.
    ///
    /// `details` holds the JSON error body from the prediction service, if
    /// it sent one.
    #[error("prediction request failed: {message}")]
    Prediction {
        /// A description of what went wrong.
        message: String,
        /// The error payload returned by the prediction service.
        details: Option<Value>,
    },

    /// An unhandled/unexpected SQL error.
    #[error("an unexpected SQL error occurred: {0}")]
    SqlError(rusqlite::Error),

    /// Could not acquire the database lock
    #[error("could not acquire the database lock")]
    DatabaseLockError,

    /// An error occurred while getting the local timezone from a canonical timezone string.
    #[error("invalid timezone {0}")]
    InvalidTimezone(String),
}

impl From<rusqlite::Error> for Error {
    fn from(value: rusqlite::Error) -> Self {
        match value {
            rusqlite::Error::QueryReturnedNoRows => Error::NotFound,
            rusqlite::Error::SqliteFailure(
                rusqlite::ffi::Error {
                    code: _,
                    extended_code: rusqlite::ffi::SQLITE_CONSTRAINT_FOREIGNKEY,
                },
                _,
            ) => Error::NotFound,
            error => {
                tracing::error!("an unhandled SQL error occurred: {}", error);
                Error::SqlError(error)
            }
        }
    }
}

impl From<JsonRejection> for Error {
    fn from(rejection: JsonRejection) -> Self {
        Error::InvalidRequestBody(rejection.body_text())
    }
}

impl Error {
    /// The HTTP status code that best describes the error.
    pub fn status_code(&self) -> StatusCode {
        match self {
            Error::DuplicateEmail(_) => StatusCode::CONFLICT,
            Error::InvalidEmail(_)
            | Error::EmptyName
            | Error::EmptyDescription
            | Error::InvalidAmount(_)
            | Error::InvalidRequestBody(_)
            | Error::NoTransactions(_) => StatusCode::BAD_REQUEST,
            Error::NotFound => StatusCode::NOT_FOUND,
            Error::LanguageModel(_) | Error::Prediction { .. } => StatusCode::BAD_GATEWAY,
            Error::SqlError(_) | Error::DatabaseLockError | Error::InvalidTimezone(_) => {
                StatusCode::INTERNAL_SERVER_ERROR
            }
        }
    }
}

impl IntoResponse for Error {
    fn into_response(self) -> Response {
        let status_code = self.status_code();

        let body = match self {
            Error::LanguageModel(error) => {
                tracing::error!("language model request failed: {error}");
                json!({ "error": "The AI service is unavailable, try again later." })
            }
            Error::Prediction { message, details } => {
                tracing::error!("prediction request failed: {message}");
                json!({
                    "error": "Error en la predicción",
                    "details": details.unwrap_or(Value::String(message)),
                })
            }
            // Any errors that are not handled above are not intended to be shown to the client.
            error if status_code.is_server_error() => {
                tracing::error!("An unexpected error occurred: {}", error);
                json!({ "error": "An unexpected error occurred, check the server logs for more details." })
            }
            error => json!({ "error": error.to_string() }),
        };

        (status_code, Json(body)).into_response()
    }
}
