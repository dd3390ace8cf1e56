//! Defines the endpoint for fetching a user and their balance.
use std::sync::{Arc, Mutex};

use axum::{
    Json,
    extract::{FromRef, Path, State},
};
use rusqlite::Connection;

use crate::{
    AppState, Error,
    db::lock_connection,
    user::{User, UserID, get_user_by_id},
};

/// The state needed to fetch a user.
#[derive(Debug, Clone)]
pub struct GetUserState {
    /// The database connection for managing users.
    pub db_connection: Arc<Mutex<Connection>>,
}

impl FromRef<AppState> for GetUserState {
    fn from_ref(state: &AppState) -> Self {
        Self {
            db_connection: state.db_connection.clone(),
        }
    }
}

/// A route handler for fetching a user by ID, responds with 404 if there is no such user.
pub async fn get_user_endpoint(
    State(state): State<GetUserState>,
    Path(user_id): Path<i64>,
) -> Result<Json<User>, Error> {
    let connection = lock_connection(&state.db_connection)?;

    get_user_by_id(UserID::new(user_id), &connection).map(Json)
}
