//! The API endpoints URIs.
//!
//! Paths with a parameter, e.g., '/api/users/{user_id}', are filled in by
//! the tests with `format_endpoint`.

/// The route for checking that the server is up.
pub const HEALTH: &str = "/health";
/// The route for registering a user.
pub const USERS: &str = "/api/users";
/// The route for fetching a single user.
pub const USER: &str = "/api/users/{user_id}";
/// The route for classifying a transaction description.
pub const CLASSIFY: &str = "/api/classify";
/// The route for creating a transaction.
pub const TRANSACTIONS: &str = "/api/transactions";
/// The route for listing a user's transactions (GET, the parameter is a user
/// ID) and deleting a transaction (DELETE, the parameter is a transaction ID).
///
/// Both methods share one path because the router does not allow differently
/// named parameters in the same position.
pub const TRANSACTION: &str = "/api/transactions/{id}";
/// The route for a user's transaction statistics.
pub const STATS: &str = "/api/stats/{user_id}";
/// The route for requesting a balance prediction.
pub const PREDICT: &str = "/api/predict";
/// The route for requesting per-category spending insights.
pub const CATEGORY_INSIGHTS: &str = "/api/category-insights";
/// The route for requesting savings recommendations.
pub const RECOMMENDATIONS: &str = "/api/recommendations";
/// The dashboard page for a user.
pub const DASHBOARD_VIEW: &str = "/dashboard/{user_id}";

/// Replace the first `{name}` parameter in `endpoint_path` with `id`.
///
/// Paths without a parameter are returned unchanged. An unclosed brace
/// swallows the rest of the path.
#[cfg(test)]
pub fn format_endpoint(endpoint_path: &str, id: i64) -> String {
    let Some(param_start) = endpoint_path.find('{') else {
        return endpoint_path.to_owned();
    };
    let param_end = endpoint_path[param_start..]
        .find('}')
        .map_or(endpoint_path.len(), |offset| param_start + offset + 1);

    format!(
        "{}{id}{}",
        &endpoint_path[..param_start],
        &endpoint_path[param_end..]
    )
}
