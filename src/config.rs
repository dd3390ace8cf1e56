//! Command line and environment configuration for the server.

use std::{net::IpAddr, path::PathBuf};

use clap::Parser;

use crate::{
    llm::{DEFAULT_LLM_API_URL, DEFAULT_LLM_MODEL, DEFAULT_LLM_TIMEOUT},
    prediction::DEFAULT_PREDICTION_URL,
};

/// The REST API server for the finance tracker.
///
/// Every option can also be set with the environment variable shown in
/// `--help`, a `.env` file in the working directory is loaded first.
#[derive(Parser, Debug, Clone)]
#[command(version, about, long_about = None)]
pub struct Config {
    /// File path to the application SQLite database.
    #[arg(long, env = "DATABASE_PATH", default_value = "finance_tracker.db")]
    pub db_path: PathBuf,

    /// The address to listen on.
    #[arg(long, env = "HOST", default_value = "127.0.0.1")]
    pub host: IpAddr,

    /// The port to serve the API from.
    #[arg(short, long, env = "PORT", default_value_t = 3000)]
    pub port: u16,

    /// The bearer token for the language model API.
    #[arg(long, env = "LLM_API_KEY", default_value = "", hide_env_values = true)]
    pub llm_api_key: String,

    /// The chat completion endpoint of the language model API.
    #[arg(long, env = "LLM_API_URL", default_value = DEFAULT_LLM_API_URL)]
    pub llm_api_url: String,

    /// The language model to use for classification and recommendations.
    #[arg(long, env = "LLM_MODEL", default_value = DEFAULT_LLM_MODEL)]
    pub llm_model: String,

    /// Seconds to wait for the language model before giving up.
    #[arg(long, env = "LLM_TIMEOUT_SECS", default_value_t = DEFAULT_LLM_TIMEOUT.as_secs())]
    pub llm_timeout_secs: u64,

    /// The base URL of the prediction service.
    #[arg(long, env = "PREDICTION_SERVICE_URL", default_value = DEFAULT_PREDICTION_URL)]
    pub prediction_url: String,

    /// The local timezone as a canonical timezone name, e.g. "Pacific/Auckland".
    #[arg(long, env = "TIMEZONE", default_value = "Etc/UTC")]
    pub timezone: String,
}
