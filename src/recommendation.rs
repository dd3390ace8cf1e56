//! Personalised savings advice from the language model.

use std::sync::{Arc, Mutex};

use axum::{
    Json,
    extract::{FromRef, State},
};
use rusqlite::Connection;
use serde::{Deserialize, Serialize};
use time::{Date, Duration};

use crate::{
    AppState, Error,
    db::lock_connection,
    json_body::JsonBody,
    llm::{CompletionRequest, LanguageModelClient},
    timezone::local_today,
    transaction::{Transaction, TransactionType, get_user_transactions},
    user::{User, UserID, get_user_by_id},
};

/// How many of the most recent transactions are shown to the language model.
const RECOMMENDATION_HISTORY_LENGTH: u32 = 30;
/// The window, in days, used for the recent expense total.
const RECENT_EXPENSE_DAYS: i64 = 30;

/// How precarious the user's finances look.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum RiskLevel {
    /// Spending is well under income.
    #[serde(rename = "bajo")]
    Low,
    /// Spending is close to income.
    #[serde(rename = "medio")]
    Medium,
    /// Spending exceeds or nearly exceeds income.
    #[serde(rename = "alto")]
    High,
}

/// Advice for the user along with an overall risk assessment.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Recommendations {
    /// Short, actionable pieces of advice.
    pub recommendations: Vec<String>,
    /// The overall risk level.
    pub risk_level: RiskLevel,
    /// A suggested amount to save each month.
    pub savings_goal: f64,
}

impl Recommendations {
    /// The advice given when the language model is unavailable or its reply
    /// cannot be used.
    pub fn fallback() -> Self {
        Self {
            recommendations: vec![
                "Revisa tus gastos en entretenimiento y compras para identificar ahorros."
                    .to_owned(),
                "Establece un presupuesto mensual y aparta un porcentaje fijo de tus ingresos."
                    .to_owned(),
            ],
            risk_level: RiskLevel::Medium,
            savings_goal: 500.0,
        }
    }
}

/// The first day of the [RECENT_EXPENSE_DAYS] day window that ends on `today`.
fn recent_window_start(today: Date) -> Date {
    today.saturating_sub(Duration::days(RECENT_EXPENSE_DAYS - 1))
}

/// The sum of the magnitudes of the expenses dated on or after `since`.
pub fn expenses_since(transactions: &[Transaction], since: Date) -> f64 {
    transactions
        .iter()
        .filter(|transaction| {
            transaction.transaction_type == TransactionType::Expense && transaction.date >= since
        })
        .map(|transaction| transaction.amount.abs())
        .sum()
}

fn build_prompt(user: &User, transactions: &[Transaction], recent_expenses: f64) -> String {
    let history = transactions
        .iter()
        .map(|transaction| {
            format!(
                "- {}: {} {:.2} ({}, {})",
                transaction.date,
                transaction.description,
                transaction.amount,
                transaction.category,
                transaction.transaction_type.as_str(),
            )
        })
        .collect::<Vec<_>>()
        .join("\n");

    format!(
        "Analiza la situación financiera de {name} y genera recomendaciones personalizadas.\n\n\
        Balance actual: {balance:.2}\n\
        Gastos de los últimos {RECENT_EXPENSE_DAYS} días: {recent_expenses:.2}\n\n\
        Transacciones recientes:\n{history}\n\n\
        Responde solo con un objeto JSON con este formato:\n\
        {{\"recommendations\": [\"...\", \"...\", \"...\", \"...\", \"...\"], \
        \"riskLevel\": \"bajo\" | \"medio\" | \"alto\", \"savingsGoal\": número}}\n\
        Incluye exactamente 5 recomendaciones breves y prácticas en español.",
        name = user.name,
        balance = user.balance,
    )
}

fn recommendation_request(prompt: String) -> CompletionRequest {
    CompletionRequest {
        system: "Eres un asesor financiero personal experto.".to_owned(),
        prompt,
        temperature: 0.7,
        max_tokens: 500,
        json_output: true,
    }
}

/// Find the first complete top level JSON object in `text`.
///
/// Braces inside string literals, including escaped quotes, do not count
/// towards the nesting depth. Returns `None` if no object is closed.
pub fn extract_json_object(text: &str) -> Option<&str> {
    let start = text.find('{')?;
    let mut depth = 0usize;
    let mut in_string = false;
    let mut escaped = false;

    for (offset, c) in text[start..].char_indices() {
        if in_string {
            match c {
                _ if escaped => escaped = false,
                '\\' => escaped = true,
                '"' => in_string = false,
                _ => {}
            }
            continue;
        }

        match c {
            '"' => in_string = true,
            '{' => depth += 1,
            '}' => {
                depth -= 1;
                if depth == 0 {
                    return Some(&text[start..=start + offset]);
                }
            }
            _ => {}
        }
    }

    None
}

/// Parse the language model's reply, or fall back to [Recommendations::fallback].
pub fn parse_recommendations(reply: &str) -> Recommendations {
    let Some(object) = extract_json_object(reply) else {
        tracing::warn!("no JSON object in the recommendation reply, using the fallback");
        return Recommendations::fallback();
    };

    match serde_json::from_str::<Recommendations>(object) {
        Ok(recommendations) if !recommendations.recommendations.is_empty() => recommendations,
        Ok(_) => {
            tracing::warn!("the recommendation reply had no recommendations, using the fallback");
            Recommendations::fallback()
        }
        Err(error) => {
            tracing::warn!("could not parse the recommendation reply, using the fallback: {error}");
            Recommendations::fallback()
        }
    }
}

/// The state needed to generate recommendations.
#[derive(Debug, Clone)]
pub struct RecommendationState {
    /// The database connection for reading the user and their transactions.
    pub db_connection: Arc<Mutex<Connection>>,
    /// The local timezone as a canonical timezone name, e.g. "Pacific/Auckland".
    pub local_timezone: String,
    /// The language model that writes the advice.
    pub language_model: LanguageModelClient,
}

impl FromRef<AppState> for RecommendationState {
    fn from_ref(state: &AppState) -> Self {
        Self {
            db_connection: state.db_connection.clone(),
            local_timezone: state.local_timezone.clone(),
            language_model: state.language_model.clone(),
        }
    }
}

/// The request body for recommendations.
#[derive(Debug, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RecommendationRequest {
    /// The user to advise.
    pub user_id: UserID,
}

/// A route handler for savings recommendations.
///
/// Responds with 404 for unknown users. Language model failures are not
/// surfaced, the fallback advice is returned instead.
pub async fn recommendations_endpoint(
    State(state): State<RecommendationState>,
    JsonBody(request): JsonBody<RecommendationRequest>,
) -> Result<Json<Recommendations>, Error> {
    let (user, transactions) = {
        let connection = lock_connection(&state.db_connection)?;
        let user = get_user_by_id(request.user_id, &connection)?;
        let transactions = get_user_transactions(
            request.user_id,
            RECOMMENDATION_HISTORY_LENGTH,
            0,
            &connection,
        )?;

        (user, transactions)
    };

    let today = local_today(&state.local_timezone)?;
    let recent_expenses = expenses_since(&transactions, recent_window_start(today));

    let prompt = build_prompt(&user, &transactions, recent_expenses);
    let recommendations = match state
        .language_model
        .complete(&recommendation_request(prompt))
        .await
    {
        Ok(reply) => parse_recommendations(&reply),
        Err(error) => {
            tracing::warn!("could not get recommendations for user {}, using the fallback: {error}", user.id);
            Recommendations::fallback()
        }
    };

    Ok(Json(recommendations))
}

#[cfg(test)]
mod tests {
    use axum::{Router, http::StatusCode, routing::post};
    use axum_test::TestServer;
    use serde_json::json;
    use time::{OffsetDateTime, macros::date};

    use crate::{
        endpoints,
        test_utils::{failing_upstream, fake_llm, get_test_state, spawn_upstream},
        transaction::{Transaction, TransactionType},
        user::{Email, UserID, create_user},
    };

    use super::{
        Recommendations, RiskLevel, expenses_since, extract_json_object, parse_recommendations,
        recent_window_start, recommendations_endpoint,
    };

    fn transaction(amount: f64, date: time::Date) -> Transaction {
        Transaction {
            id: 0,
            user_id: UserID::new(1),
            description: "test".to_owned(),
            amount,
            category: "💳 Otros".to_owned(),
            transaction_type: TransactionType::from_amount(amount),
            date,
            created_at: OffsetDateTime::now_utc(),
        }
    }

    #[test]
    fn finds_object_surrounded_by_prose() {
        let reply = "Claro, aquí tienes:\n{\"a\": {\"b\": 1}} Espero que ayude. {\"c\": 2}";

        assert_eq!(extract_json_object(reply), Some("{\"a\": {\"b\": 1}}"));
    }

    #[test]
    fn braces_in_strings_are_ignored() {
        let reply = r#"{"recommendations": ["usa {llaves} y \"comillas}\""], "x": 1} trailing }"#;

        assert_eq!(
            extract_json_object(reply),
            Some(r#"{"recommendations": ["usa {llaves} y \"comillas}\""], "x": 1}"#)
        );
    }

    #[test]
    fn unbalanced_object_is_not_found() {
        assert_eq!(extract_json_object("{\"a\": {\"b\": 1}"), None);
        assert_eq!(extract_json_object("no json here"), None);
    }

    #[test]
    fn reply_without_json_gives_fallback_unchanged() {
        assert_eq!(
            parse_recommendations("Lo siento, no puedo ayudar."),
            Recommendations::fallback()
        );
    }

    #[test]
    fn reply_with_wrong_shape_gives_fallback() {
        assert_eq!(
            parse_recommendations(r#"{"recommendations": "ahorra", "riskLevel": "extremo"}"#),
            Recommendations::fallback()
        );
        assert_eq!(
            parse_recommendations(r#"{"recommendations": [], "riskLevel": "bajo", "savingsGoal": 1}"#),
            Recommendations::fallback()
        );
    }

    #[test]
    fn valid_reply_is_parsed() {
        let reply = r#"Resultado: {"recommendations": ["Cocina en casa"], "riskLevel": "alto", "savingsGoal": 250.5}"#;

        assert_eq!(
            parse_recommendations(reply),
            Recommendations {
                recommendations: vec!["Cocina en casa".to_owned()],
                risk_level: RiskLevel::High,
                savings_goal: 250.5,
            }
        );
    }

    #[test]
    fn fallback_matches_wire_format() {
        let value = serde_json::to_value(Recommendations::fallback()).unwrap();

        assert_eq!(value["riskLevel"], "medio");
        assert_eq!(value["savingsGoal"], 500.0);
        assert_eq!(value["recommendations"].as_array().unwrap().len(), 2);
    }

    #[test]
    fn expenses_since_ignores_income_and_older_expenses() {
        let transactions = [
            transaction(1000.0, date!(2025 - 10 - 20)),
            transaction(-40.0, date!(2025 - 10 - 20)),
            transaction(-60.0, date!(2025 - 09 - 21)),
            transaction(-500.0, date!(2025 - 09 - 20)),
        ];

        assert_eq!(expenses_since(&transactions, date!(2025 - 09 - 21)), 100.0);
    }

    #[test]
    fn recent_window_spans_thirty_days_including_today() {
        let today = date!(2025 - 10 - 20);
        let transactions = [
            transaction(-1.0, today),
            transaction(-10.0, date!(2025 - 09 - 21)),
            transaction(-100.0, date!(2025 - 09 - 20)),
        ];

        assert_eq!(recent_window_start(today), date!(2025 - 09 - 21));
        assert_eq!(expenses_since(&transactions, recent_window_start(today)), 11.0);
    }

    async fn get_test_server(llm: Router) -> TestServer {
        let llm_url = spawn_upstream(llm).await;
        let state = get_test_state(&llm_url, "http://127.0.0.1:1");
        create_user(
            Email::new("a@b.com").unwrap(),
            "A",
            &state.db_connection.lock().unwrap(),
        )
        .unwrap();
        let app = Router::new()
            .route(endpoints::RECOMMENDATIONS, post(recommendations_endpoint))
            .with_state(state);

        TestServer::try_new(app).expect("Could not create test server.")
    }

    #[tokio::test]
    async fn returns_model_recommendations() {
        let reply = json!({
            "recommendations": ["a", "b", "c", "d", "e"],
            "riskLevel": "bajo",
            "savingsGoal": 800.0,
        })
        .to_string();
        let server = get_test_server(fake_llm(&reply)).await;

        let response = server
            .post(endpoints::RECOMMENDATIONS)
            .json(&json!({ "userId": 1 }))
            .await;

        response.assert_status_ok();
        let recommendations = response.json::<Recommendations>();
        assert_eq!(recommendations.recommendations.len(), 5);
        assert_eq!(recommendations.risk_level, RiskLevel::Low);
        assert_eq!(recommendations.savings_goal, 800.0);
    }

    #[tokio::test]
    async fn model_failure_gives_fallback() {
        let server = get_test_server(failing_upstream()).await;

        let response = server
            .post(endpoints::RECOMMENDATIONS)
            .json(&json!({ "userId": 1 }))
            .await;

        response.assert_status_ok();
        assert_eq!(response.json::<Recommendations>(), Recommendations::fallback());
    }

    #[tokio::test]
    async fn unknown_user_is_not_found() {
        let server = get_test_server(fake_llm("{}")).await;

        let response = server
            .post(endpoints::RECOMMENDATIONS)
            .json(&json!({ "userId": 999 }))
            .await;

        response.assert_status(StatusCode::NOT_FOUND);
    }
}
