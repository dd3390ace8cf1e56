//! Application router configuration.

use axum::{
    Json, Router,
    http::StatusCode,
    middleware,
    response::{IntoResponse, Response},
    routing::{get, post},
};
use serde_json::json;
use tower_http::cors::CorsLayer;

use crate::{
    AppState,
    classify::classify_endpoint,
    dashboard::get_dashboard_page,
    endpoints,
    health::get_health,
    logging::logging_middleware,
    prediction::{category_insights_endpoint, predict_endpoint},
    recommendation::recommendations_endpoint,
    stats::get_stats_endpoint,
    transaction::{
        create_transaction_endpoint, delete_transaction_endpoint, list_transactions_endpoint,
    },
    user::{create_user_endpoint, get_user_endpoint},
};

/// Return a router with all the app's routes.
pub fn build_router(state: AppState) -> Router {
    Router::new()
        .route(endpoints::HEALTH, get(get_health))
        .route(endpoints::USERS, post(create_user_endpoint))
        .route(endpoints::USER, get(get_user_endpoint))
        .route(endpoints::CLASSIFY, post(classify_endpoint))
        .route(endpoints::TRANSACTIONS, post(create_transaction_endpoint))
        .route(
            endpoints::TRANSACTION,
            get(list_transactions_endpoint).delete(delete_transaction_endpoint),
        )
        .route(endpoints::STATS, get(get_stats_endpoint))
        .route(endpoints::PREDICT, post(predict_endpoint))
        .route(endpoints::CATEGORY_INSIGHTS, post(category_insights_endpoint))
        .route(endpoints::RECOMMENDATIONS, post(recommendations_endpoint))
        .route(endpoints::DASHBOARD_VIEW, get(get_dashboard_page))
        .fallback(get_404_not_found)
        .layer(middleware::from_fn(logging_middleware))
        .layer(CorsLayer::permissive())
        .with_state(state)
}

async fn get_404_not_found() -> Response {
    (
        StatusCode::NOT_FOUND,
        Json(json!({ "error": "Route not found" })),
    )
        .into_response()
}

#[cfg(test)]
mod tests {
    use axum::http::StatusCode;
    use axum_test::TestServer;
    use serde_json::{Value, json};
    use tokio::task::JoinSet;

    use crate::{
        endpoints::{self, format_endpoint},
        test_utils::{fake_llm, get_test_state, spawn_upstream},
        transaction::{Transaction, count_transactions},
        user::{Email, User, create_user, get_user_by_id},
    };

    use super::build_router;

    async fn get_test_server() -> TestServer {
        let llm_url = spawn_upstream(fake_llm("🍔 Comida")).await;
        let state = get_test_state(&llm_url, "http://127.0.0.1:1");

        TestServer::try_new(build_router(state)).expect("Could not create test server.")
    }

    #[tokio::test]
    async fn unknown_route_is_json_not_found() {
        let server = get_test_server().await;

        let response = server.get("/api/nope").await;

        response.assert_status(StatusCode::NOT_FOUND);
        assert!(response.json::<Value>()["error"].is_string());
    }

    #[tokio::test]
    async fn health_check_is_routed() {
        let server = get_test_server().await;

        server.get(endpoints::HEALTH).await.assert_status_ok();
    }

    #[tokio::test]
    async fn create_then_delete_restores_balance() {
        let server = get_test_server().await;

        let user = server
            .post(endpoints::USERS)
            .json(&json!({ "email": "a@b.com", "name": "A" }))
            .await
            .json::<User>();

        let response = server
            .post(endpoints::TRANSACTIONS)
            .json(&json!({
                "userId": user.id,
                "description": "Supermercado",
                "amount": -50.0,
                "type": "expense",
            }))
            .await;
        response.assert_status(StatusCode::CREATED);
        let transaction = response.json::<Transaction>();
        assert_eq!(transaction.category, "🍔 Comida");

        let user_endpoint = format_endpoint(endpoints::USER, user.id.as_i64());
        assert_eq!(server.get(&user_endpoint).await.json::<User>().balance, -50.0);

        let listed = server
            .get(&format_endpoint(endpoints::TRANSACTION, user.id.as_i64()))
            .await
            .json::<Vec<Transaction>>();
        assert_eq!(listed, vec![transaction.clone()]);

        server
            .delete(&format_endpoint(endpoints::TRANSACTION, transaction.id))
            .await
            .assert_status_ok();
        assert_eq!(server.get(&user_endpoint).await.json::<User>().balance, 0.0);
    }

    #[tokio::test]
    async fn cors_headers_are_sent() {
        let server = get_test_server().await;

        let response = server
            .get(endpoints::HEALTH)
            .add_header("origin", "http://example.com")
            .await;

        response.assert_status_ok();
        assert!(response.headers().contains_key("access-control-allow-origin"));
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 4)]
    async fn concurrent_creates_do_not_lose_balance_updates() {
        const REQUEST_COUNT: i64 = 20;

        let llm_url = spawn_upstream(fake_llm("🍔 Comida")).await;
        let state = get_test_state(&llm_url, "http://127.0.0.1:1");
        let user = create_user(
            Email::new("a@b.com").unwrap(),
            "A",
            &state.db_connection.lock().unwrap(),
        )
        .unwrap();
        let base_url = spawn_upstream(build_router(state.clone())).await;
        let client = reqwest::Client::new();

        let mut requests = JoinSet::new();
        for i in 1..=REQUEST_COUNT {
            let amount = if i % 2 == 0 { i } else { -i };
            let request = client
                .post(format!("{base_url}{}", endpoints::TRANSACTIONS))
                .json(&json!({
                    "userId": user.id,
                    "description": format!("Transaction {i}"),
                    "amount": amount as f64,
                }));
            requests.spawn(async move { request.send().await.unwrap().status() });
        }
        while let Some(status) = requests.join_next().await {
            assert_eq!(status.unwrap(), reqwest::StatusCode::CREATED);
        }

        let expected_balance: i64 = (1..=REQUEST_COUNT)
            .map(|i| if i % 2 == 0 { i } else { -i })
            .sum();
        let connection = state.db_connection.lock().unwrap();
        assert_eq!(
            get_user_by_id(user.id, &connection).unwrap().balance,
            expected_balance as f64
        );
        assert_eq!(
            count_transactions(&connection).unwrap(),
            REQUEST_COUNT as u32
        );
    }
}
