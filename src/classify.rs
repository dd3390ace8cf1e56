//! Assigns a category label to a transaction description using the language model.

use axum::{
    Json,
    extract::State,
    http::StatusCode,
    response::{IntoResponse, Response},
};
use serde::{Deserialize, Serialize};
use serde_json::json;

use crate::{
    Error,
    json_body::JsonBody,
    llm::{CompletionRequest, LanguageModelClient},
};

/// The category labels the language model is asked to choose from.
pub const CATEGORIES: [&str; 11] = [
    "🍔 Comida",
    "🚗 Transporte",
    "🏠 Vivienda",
    "💡 Servicios",
    "🎬 Entretenimiento",
    "🛒 Compras",
    "💊 Salud",
    "📚 Educación",
    "💰 Ingresos",
    "💸 Transferencias",
    "💳 Otros",
];

/// The category used when classification fails.
pub const FALLBACK_CATEGORY: &str = "💳 Otros";

fn classification_request(description: &str) -> CompletionRequest {
    let labels = CATEGORIES.join("\n");

    CompletionRequest {
        system: "Eres un asistente que clasifica transacciones financieras personales.".to_owned(),
        prompt: format!(
            "Clasifica la siguiente transacción en exactamente una de estas categorías:\n\
            {labels}\n\n\
            Transacción: \"{description}\"\n\n\
            Responde únicamente con la categoría, incluyendo el emoji, sin texto adicional."
        ),
        temperature: 0.3,
        max_tokens: 20,
        json_output: false,
    }
}

/// Pull the category label out of the model's reply.
///
/// The earliest known label mentioned in the reply wins, so chatter such as
/// "Categoría: 🍔 Comida." still yields the exact label. Otherwise the
/// trimmed reply is used as-is, and an empty reply gives [FALLBACK_CATEGORY].
pub fn extract_category(reply: &str) -> String {
    let reply = reply.trim();

    let earliest_label = CATEGORIES
        .iter()
        .filter_map(|label| reply.find(label).map(|position| (position, *label)))
        .min_by_key(|(position, _)| *position);

    if let Some((_, label)) = earliest_label {
        return label.to_owned();
    }

    if reply.is_empty() {
        FALLBACK_CATEGORY.to_owned()
    } else {
        reply.to_owned()
    }
}

/// Ask the language model for the category of `description`.
///
/// # Errors
/// Returns [Error::LanguageModel] if the language model could not be reached.
pub async fn classify_description(
    description: &str,
    client: &LanguageModelClient,
) -> Result<String, Error> {
    let reply = client.complete(&classification_request(description)).await?;

    Ok(extract_category(&reply))
}

/// Classify `description`, or use [FALLBACK_CATEGORY] if the language model fails.
pub async fn classify_or_fallback(description: &str, client: &LanguageModelClient) -> String {
    classify_description(description, client)
        .await
        .unwrap_or_else(|error| {
            tracing::warn!("could not classify \"{description}\", using \"{FALLBACK_CATEGORY}\": {error}");
            FALLBACK_CATEGORY.to_owned()
        })
}

/// The request body for classifying a description.
#[derive(Debug, Serialize, Deserialize)]
pub struct ClassifyRequest {
    /// The transaction description to classify.
    pub description: String,
}

/// The response body for a successful classification.
#[derive(Debug, Serialize, Deserialize, PartialEq)]
pub struct ClassifyResponse {
    /// The category label.
    pub category: String,
}

/// A route handler for classifying a transaction description.
///
/// If the language model fails the response has an error status but still
/// carries [FALLBACK_CATEGORY] in the `category` field.
pub async fn classify_endpoint(
    State(client): State<LanguageModelClient>,
    JsonBody(request): JsonBody<ClassifyRequest>,
) -> Response {
    let description = request.description.trim();

    if description.is_empty() {
        return Error::EmptyDescription.into_response();
    }

    match classify_description(description, &client).await {
        Ok(category) => Json(ClassifyResponse { category }).into_response(),
        Err(error) => {
            tracing::error!("could not classify transaction: {error}");
            (
                StatusCode::INTERNAL_SERVER_ERROR,
                Json(json!({
                    "error": "Could not classify the transaction",
                    "category": FALLBACK_CATEGORY,
                })),
            )
                .into_response()
        }
    }
}

#[cfg(test)]
mod tests {
    use axum::{Router, http::StatusCode, routing::post};
    use axum_test::TestServer;
    use serde_json::{Value, json};

    use crate::{
        endpoints,
        test_utils::{failing_upstream, fake_llm, get_test_state, spawn_upstream},
    };

    use super::{ClassifyRequest, ClassifyResponse, FALLBACK_CATEGORY, classify_endpoint, extract_category};

    async fn get_test_server(llm: Router) -> TestServer {
        let llm_url = spawn_upstream(llm).await;
        let state = get_test_state(&llm_url, "http://127.0.0.1:1");
        let app = Router::new()
            .route(endpoints::CLASSIFY, post(classify_endpoint))
            .with_state(state);

        TestServer::try_new(app).expect("Could not create test server.")
    }

    #[test]
    fn exact_label_is_kept() {
        assert_eq!(extract_category("  🚗 Transporte\n"), "🚗 Transporte");
    }

    #[test]
    fn known_label_is_found_in_chatter() {
        assert_eq!(extract_category("Categoría: 🍔 Comida."), "🍔 Comida");
    }

    #[test]
    fn earliest_label_in_reply_wins() {
        assert_eq!(
            extract_category("🛒 Compras, aunque también podría ser 🍔 Comida"),
            "🛒 Compras"
        );
    }

    #[test]
    fn unknown_label_is_passed_through() {
        assert_eq!(extract_category(" 🐶 Mascotas "), "🐶 Mascotas");
    }

    #[test]
    fn empty_reply_falls_back() {
        assert_eq!(extract_category("   "), FALLBACK_CATEGORY);
    }

    #[tokio::test]
    async fn classifies_description() {
        let server = get_test_server(fake_llm("🍔 Comida")).await;

        let response = server
            .post(endpoints::CLASSIFY)
            .json(&ClassifyRequest {
                description: "Supermercado".to_owned(),
            })
            .await;

        response.assert_status_ok();
        assert_eq!(
            response.json::<ClassifyResponse>(),
            ClassifyResponse {
                category: "🍔 Comida".to_owned()
            }
        );
    }

    #[tokio::test]
    async fn upstream_failure_returns_fallback_category() {
        let server = get_test_server(failing_upstream()).await;

        let response = server
            .post(endpoints::CLASSIFY)
            .json(&json!({ "description": "Supermercado" }))
            .await;

        response.assert_status(StatusCode::INTERNAL_SERVER_ERROR);
        let body = response.json::<Value>();
        assert_eq!(body["category"], FALLBACK_CATEGORY);
        assert!(body["error"].is_string());
    }

    #[tokio::test]
    async fn empty_description_is_rejected() {
        let server = get_test_server(fake_llm("🍔 Comida")).await;

        let response = server
            .post(endpoints::CLASSIFY)
            .json(&json!({ "description": " " }))
            .await;

        response.assert_status(StatusCode::BAD_REQUEST);
    }
}
