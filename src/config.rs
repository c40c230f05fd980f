//! # Configuration Module
//!
//! Loads the research agent's settings from the environment (and an optional
//! `.env` file) into a single `Config` value. That value is built once in
//! `main` and handed to every collaborator that needs it; nothing reads the
//! environment after startup.

use std::env;
use std::path::PathBuf;
use thiserror::Error;

// =============================================================================
// ENVIRONMENT KEYS
// =============================================================================
pub const GEMINI_API_KEY: &str = "GEMINI_API_KEY";
pub const JINA_API_KEY: &str = "JINA_API_KEY";

const DEFAULT_MODEL: &str = "gemini-1.5-flash";
const DEFAULT_SEARCH_URL: &str = "https://s.jina.ai/";
const DEFAULT_OUTPUT_DIR: &str = "reports";

// =============================================================================
// ERRORS
// =============================================================================
/// Startup failures. Any of these stops the process before research begins.
#[derive(Error, Debug, PartialEq)]
pub enum ConfigError {
    #[error("Missing required API keys: {}. Please check your .env file.", .0.join(", "))]
    MissingKeys(Vec<String>),

    #[error("Invalid value for {key}: {message}")]
    InvalidValue { key: String, message: String },
}

// =============================================================================
// CONFIGURATION STRUCT
// =============================================================================
/// Main configuration for the research agent.
#[derive(Debug, Clone)]
pub struct Config {
    /// Credential for the Gemini model provider
    pub gemini_api_key: String,

    /// Credential for the Jina search provider
    pub jina_api_key: String,

    /// Gemini model used for every analysis call
    pub model: String,

    /// Search endpoint; the url-encoded query is appended to it
    pub search_base_url: String,

    /// Result cap for a plain `search` call without an explicit limit
    pub max_search_results: usize,

    /// Result cap for each social-content query
    pub max_social_results: usize,

    /// Directory that receives saved reports when no explicit path is given
    pub output_dir: PathBuf,
}

/// # Rust Concept: The Default Trait
///
/// Defaults carry empty credentials. `validate()` is what turns a missing key
/// into an error, so tests can build a `Config` without touching the
/// environment.
impl Default for Config {
    fn default() -> Self {
        Self {
            gemini_api_key: String::new(),
            jina_api_key: String::new(),
            model: DEFAULT_MODEL.to_string(),
            search_base_url: DEFAULT_SEARCH_URL.to_string(),
            max_search_results: 10,
            max_social_results: 3,
            output_dir: PathBuf::from(DEFAULT_OUTPUT_DIR),
        }
    }
}

// =============================================================================
// CONFIGURATION LOADING
// =============================================================================
impl Config {
    /// Load configuration from environment variables.
    ///
    /// A `.env` file in the working directory is read first if present.
    /// Credentials are not checked here; call [`Config::validate`] next.
    pub fn from_env() -> Result<Self, ConfigError> {
        let _ = dotenvy::dotenv();
        Self::from_lookup(|key| env::var(key).ok())
    }

    /// Build a configuration from an arbitrary key lookup.
    ///
    /// `from_env` is a thin wrapper around this; tests feed it a map instead
    /// of mutating the process environment.
    pub fn from_lookup<F>(lookup: F) -> Result<Self, ConfigError>
    where
        F: Fn(&str) -> Option<String>,
    {
        let mut config = Config::default();

        if let Some(val) = lookup(GEMINI_API_KEY) {
            config.gemini_api_key = val.trim().to_string();
        }

        if let Some(val) = lookup(JINA_API_KEY) {
            config.jina_api_key = val.trim().to_string();
        }

        if let Some(val) = lookup("GEMINI_MODEL") {
            config.model = val;
        }

        if let Some(val) = lookup("JINA_SEARCH_URL") {
            config.search_base_url = val;
        }

        if let Some(val) = lookup("MAX_SEARCH_RESULTS") {
            config.max_search_results = parse_count("MAX_SEARCH_RESULTS", &val)?;
        }

        if let Some(val) = lookup("MAX_SOCIAL_RESULTS") {
            config.max_social_results = parse_count("MAX_SOCIAL_RESULTS", &val)?;
        }

        if let Some(val) = lookup("REPORT_OUTPUT_DIR") {
            config.output_dir = PathBuf::from(val);
        }

        Ok(config)
    }

    /// Validate the configuration.
    ///
    /// Every missing credential is reported at once so the user can fix the
    /// `.env` file in a single pass.
    pub fn validate(&self) -> Result<(), ConfigError> {
        let mut missing = Vec::new();
        if self.gemini_api_key.is_empty() {
            missing.push(GEMINI_API_KEY.to_string());
        }
        if self.jina_api_key.is_empty() {
            missing.push(JINA_API_KEY.to_string());
        }
        if !missing.is_empty() {
            return Err(ConfigError::MissingKeys(missing));
        }

        if self.model.trim().is_empty() {
            return Err(invalid("GEMINI_MODEL", "cannot be empty"));
        }

        if self.max_search_results == 0 {
            return Err(invalid("MAX_SEARCH_RESULTS", "must be at least 1"));
        }

        if self.max_social_results == 0 {
            return Err(invalid("MAX_SOCIAL_RESULTS", "must be at least 1"));
        }

        Ok(())
    }
}

fn parse_count(key: &str, raw: &str) -> Result<usize, ConfigError> {
    raw.trim()
        .parse()
        .map_err(|_| invalid(key, "must be a valid positive integer"))
}

fn invalid(key: &str, message: &str) -> ConfigError {
    ConfigError::InvalidValue {
        key: key.to_string(),
        message: message.to_string(),
    }
}
