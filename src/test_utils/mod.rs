#![allow(missing_docs)]

pub(crate) mod html;
pub(crate) mod upstream;

use rusqlite::Connection;

use crate::{
    AppState,
    llm::{DEFAULT_LLM_TIMEOUT, LanguageModelClient},
    pagination::PaginationConfig,
    prediction::{PREDICTION_TIMEOUT, PredictionClient},
};

pub(crate) use html::{assert_valid_html, parse_html_document, select_text};
pub(crate) use upstream::{
    TEST_API_KEY, failing_upstream, fake_llm, fake_llm_url, spawn_upstream,
};

/// Create app state backed by an in-memory database.
///
/// `llm_base_url` and `prediction_base_url` are the base URLs of fake
/// upstreams started with [spawn_upstream].
pub(crate) fn get_test_state(llm_base_url: &str, prediction_base_url: &str) -> AppState {
    let connection =
        Connection::open_in_memory().expect("Could not open in-memory SQLite database");

    AppState::new(
        connection,
        "Etc/UTC",
        PaginationConfig::default(),
        LanguageModelClient::new(
            &fake_llm_url(llm_base_url),
            TEST_API_KEY,
            "test-model",
            DEFAULT_LLM_TIMEOUT,
        )
        .expect("Could not create language model client"),
        PredictionClient::new(prediction_base_url, PREDICTION_TIMEOUT)
            .expect("Could not create prediction client"),
    )
    .expect("Could not create app state")
}
