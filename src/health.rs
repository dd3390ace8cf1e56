//! The liveness check.

use axum::Json;
use serde::{Deserialize, Serialize};
use time::OffsetDateTime;

/// The response body for the health check.
#[derive(Debug, Serialize, Deserialize)]
pub struct Health {
    /// Always "OK" while the server is able to respond.
    pub status: String,
    /// The current time.
    #[serde(with = "time::serde::rfc3339")]
    pub timestamp: OffsetDateTime,
}

/// A route handler that reports the server is up.
pub async fn get_health() -> Json<Health> {
    Json(Health {
        status: "OK".to_owned(),
        timestamp: OffsetDateTime::now_utc(),
    })
}
