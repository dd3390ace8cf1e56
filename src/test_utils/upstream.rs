//! Fake upstream services for exercising the HTTP clients end to end.

use axum::{
    Json, Router,
    http::{HeaderMap, StatusCode, header::AUTHORIZATION},
    routing::post,
};
use serde_json::json;

pub(crate) const TEST_API_KEY: &str = "test-api-key";

/// Serve `router` on a random local port and return its base URL.
pub(crate) async fn spawn_upstream(router: Router) -> String {
    let listener = tokio::net::TcpListener::bind("127.0.0.1:0")
        .await
        .expect("Could not bind fake upstream");
    let address = listener
        .local_addr()
        .expect("Could not get fake upstream address");

    tokio::spawn(async move {
        axum::serve(listener, router)
            .await
            .expect("Fake upstream crashed");
    });

    format!("http://{address}")
}

/// The chat completion URL for a fake language model at `base_url`.
pub(crate) fn fake_llm_url(base_url: &str) -> String {
    format!("{base_url}/v1/chat/completions")
}

/// A chat completion API that always replies with `reply`.
///
/// Requests without the bearer token [TEST_API_KEY] are rejected with 401.
pub(crate) fn fake_llm(reply: &str) -> Router {
    let reply = reply.to_owned();

    Router::new().route(
        "/v1/chat/completions",
        post(move |headers: HeaderMap| {
            let reply = reply.clone();
            async move {
                let expected = format!("Bearer {TEST_API_KEY}");
                if headers.get(AUTHORIZATION).and_then(|value| value.to_str().ok())
                    != Some(expected.as_str())
                {
                    return (
                        StatusCode::UNAUTHORIZED,
                        Json(json!({ "error": { "message": "Incorrect API key provided" } })),
                    );
                }

                (
                    StatusCode::OK,
                    Json(json!({
                        "choices": [{
                            "index": 0,
                            "message": { "role": "assistant", "content": reply },
                            "finish_reason": "stop",
                        }]
                    })),
                )
            }
        }),
    )
}

/// An upstream that answers every request with a 500 and a JSON error.
pub(crate) fn failing_upstream() -> Router {
    Router::new().fallback(|| async {
        (
            StatusCode::INTERNAL_SERVER_ERROR,
            Json(json!({ "error": "upstream exploded" })),
        )
    })
}
