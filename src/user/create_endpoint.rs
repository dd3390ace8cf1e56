//! Defines the endpoint for registering a new user.
use std::sync::{Arc, Mutex};

use axum::{
    Json,
    extract::{FromRef, State},
    http::StatusCode,
};
use rusqlite::Connection;
use serde::{Deserialize, Serialize};

use crate::{
    AppState, Error,
    db::lock_connection,
    json_body::JsonBody,
    user::{Email, User, create_user},
};

/// The state needed to register a user.
#[derive(Debug, Clone)]
pub struct RegistrationState {
    /// The database connection for managing users.
    pub db_connection: Arc<Mutex<Connection>>,
}

impl FromRef<AppState> for RegistrationState {
    fn from_ref(state: &AppState) -> Self {
        Self {
            db_connection: state.db_connection.clone(),
        }
    }
}

/// The request body for registering a user.
#[derive(Debug, Serialize, Deserialize)]
pub struct NewUserRequest {
    /// The user's email address, must not belong to another user.
    pub email: String,
    /// The name to show on the dashboard.
    pub name: String,
}

/// A route handler for registering a new user with a zero balance.
///
/// Responds with 201 and the new user, or 409 if the email is taken.
pub async fn create_user_endpoint(
    State(state): State<RegistrationState>,
    JsonBody(request): JsonBody<NewUserRequest>,
) -> Result<(StatusCode, Json<User>), Error> {
    let email = Email::new(&request.email)?;
    let connection = lock_connection(&state.db_connection)?;

    let user = create_user(email, &request.name, &connection).inspect_err(|error| {
        tracing::warn!("could not create user: {error}");
    })?;

    tracing::info!("registered user {}", user.id);

    Ok((StatusCode::CREATED, Json(user)))
}
