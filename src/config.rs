use std::path::PathBuf;
use std::time::Duration;
use std::{env, io};

use secrecy::SecretString;
use serde::Serialize;
use tracing::debug;

pub const DEFAULT_BATCH_SIZE: usize = 30;
pub const DEFAULT_LLM_REQUEST_DELAY_SECS: f64 = 6.0;
pub const DEFAULT_PLACES_REQUEST_DELAY_SECS: f64 = 0.5;
pub const DEFAULT_PLACES_API_BASE: &str = "https://places.googleapis.com/v1";
pub const GEMINI_OPENAI_BASE: &str = "https://generativelanguage.googleapis.com/v1beta/openai";
pub const OPENAI_BASE: &str = "https://api.openai.com/v1";
const DEFAULT_GEMINI_MODEL: &str = "gemini-2.5-flash";
const DEFAULT_OPENAI_MODEL: &str = "gpt-4o-mini";
const DEFAULT_LLM_MAX_TOKENS: u32 = 200_000;

#[derive(Clone, Debug)]
pub struct AppConfig {
    pub google_maps_api_key: Option<SecretString>,
    pub gemini_api_key: Option<SecretString>,
    pub openai_api_key: Option<SecretString>,
    pub llm_base_url: Option<String>,
    pub llm_model: Option<String>,
    pub llm_max_tokens: u32,
    pub llm_request_delay: Duration,
    pub categorize_batch_size: usize,
    pub places_api_base: String,
    pub places_request_delay: Duration,
    pub data_dir: PathBuf,
    pub input_file: Option<String>,
}

#[derive(Clone, Debug, Serialize)]
pub struct PublicAppConfig {
    pub llm_base_url: Option<String>,
    pub llm_model: Option<String>,
    pub llm_request_delay_secs: f64,
    pub categorize_batch_size: usize,
    pub places_api_base: String,
    pub places_request_delay_secs: f64,
    pub data_dir: String,
    pub input_file: Option<String>,
    pub has_google_maps_key: bool,
    pub has_gemini_key: bool,
    pub has_openai_key: bool,
}

impl Default for AppConfig {
    fn default() -> Self {
        Self {
            google_maps_api_key: None,
            gemini_api_key: None,
            openai_api_key: None,
            llm_base_url: None,
            llm_model: None,
            llm_max_tokens: DEFAULT_LLM_MAX_TOKENS,
            llm_request_delay: Duration::from_secs_f64(DEFAULT_LLM_REQUEST_DELAY_SECS),
            categorize_batch_size: DEFAULT_BATCH_SIZE,
            places_api_base: DEFAULT_PLACES_API_BASE.to_string(),
            places_request_delay: Duration::from_secs_f64(DEFAULT_PLACES_REQUEST_DELAY_SECS),
            data_dir: PathBuf::from("data"),
            input_file: None,
        }
    }
}

impl AppConfig {
    pub fn from_env() -> Self {
        load_dotenv_if_applicable();
        Self {
            google_maps_api_key: parse_secret("GOOGLE_MAPS_API_KEY"),
            gemini_api_key: parse_secret("GEMINI_API_KEY"),
            openai_api_key: parse_secret("OPENAI_API_KEY"),
            llm_base_url: parse_string("LLM_BASE_URL"),
            llm_model: parse_string("LLM_MODEL"),
            llm_max_tokens: parse_u32("LLM_MAX_TOKENS", DEFAULT_LLM_MAX_TOKENS),
            llm_request_delay: parse_delay("LLM_REQUEST_DELAY", DEFAULT_LLM_REQUEST_DELAY_SECS),
            categorize_batch_size: parse_usize("CATEGORIZE_BATCH_SIZE", DEFAULT_BATCH_SIZE)
                .max(1),
            places_api_base: parse_string("PLACES_API_BASE")
                .unwrap_or_else(|| DEFAULT_PLACES_API_BASE.to_string()),
            places_request_delay: parse_delay(
                "PLACES_REQUEST_DELAY",
                DEFAULT_PLACES_REQUEST_DELAY_SECS,
            ),
            data_dir: parse_string("DATA_DIR")
                .map(PathBuf::from)
                .unwrap_or_else(|| PathBuf::from("data")),
            input_file: parse_string("INPUT_FILE"),
        }
    }

    /// Key used for categorization requests; Gemini wins when both are set.
    pub fn llm_key(&self) -> Option<&SecretString> {
        self.gemini_api_key
            .as_ref()
            .or(self.openai_api_key.as_ref())
    }

    pub fn resolved_llm_base_url(&self) -> String {
        if let Some(base) = &self.llm_base_url {
            return base.trim_end_matches('/').to_string();
        }
        if self.gemini_api_key.is_none() && self.openai_api_key.is_some() {
            OPENAI_BASE.to_string()
        } else {
            GEMINI_OPENAI_BASE.to_string()
        }
    }

    pub fn resolved_llm_model(&self) -> String {
        if let Some(model) = &self.llm_model {
            return model.clone();
        }
        if self.gemini_api_key.is_none() && self.openai_api_key.is_some() {
            DEFAULT_OPENAI_MODEL.to_string()
        } else {
            DEFAULT_GEMINI_MODEL.to_string()
        }
    }

    pub fn public_profile(&self) -> PublicAppConfig {
        PublicAppConfig {
            llm_base_url: self.llm_base_url.clone(),
            llm_model: self.llm_model.clone(),
            llm_request_delay_secs: self.llm_request_delay.as_secs_f64(),
            categorize_batch_size: self.categorize_batch_size,
            places_api_base: self.places_api_base.clone(),
            places_request_delay_secs: self.places_request_delay.as_secs_f64(),
            data_dir: self.data_dir.to_string_lossy().to_string(),
            input_file: self.input_file.clone(),
            has_google_maps_key: self.google_maps_api_key.is_some(),
            has_gemini_key: self.gemini_api_key.is_some(),
            has_openai_key: self.openai_api_key.is_some(),
        }
    }
}

/// Masks all but the first `visible` characters of a key for display.
pub fn mask_key(key: &str, visible: usize) -> String {
    let total = key.chars().count();
    if total <= visible {
        return "***".to_string();
    }
    let head: String = key.chars().take(visible).collect();
    format!("{head}{}", "*".repeat(total - visible))
}

fn load_dotenv_if_applicable() {
    if !should_load_dotenv() {
        debug!("skipping .env load outside dev mode");
        return;
    }

    if let Err(err) = dotenvy::dotenv() {
        match &err {
            dotenvy::Error::Io(io_err) if io_err.kind() == io::ErrorKind::NotFound => {}
            _ => debug!(?err, "unable to load .env file"),
        }
    }
}

fn should_load_dotenv() -> bool {
    cfg!(debug_assertions) || parse_bool("ALLOW_DOTENV", false)
}

fn parse_bool(key: &str, default: bool) -> bool {
    env::var(key)
        .map(|v| matches!(v.trim(), "1" | "true" | "TRUE" | "True"))
        .unwrap_or(default)
}

fn parse_string(key: &str) -> Option<String> {
    env::var(key)
        .ok()
        .map(|v| v.trim().to_string())
        .filter(|v| !v.is_empty())
}

fn parse_secret(key: &str) -> Option<SecretString> {
    parse_string(key).map(SecretString::from)
}

fn parse_usize(key: &str, default: usize) -> usize {
    env::var(key)
        .ok()
        .and_then(|v| v.trim().parse::<usize>().ok())
        .unwrap_or(default)
}

fn parse_u32(key: &str, default: u32) -> u32 {
    env::var(key)
        .ok()
        .and_then(|v| v.trim().parse::<u32>().ok())
        .unwrap_or(default)
}

fn parse_delay(key: &str, default_secs: f64) -> Duration {
    let secs = env::var(key)
        .ok()
        .and_then(|v| v.trim().parse::<f64>().ok())
        .filter(|v| v.is_finite())
        .unwrap_or(default_secs);
    Duration::from_secs_f64(secs.max(0.0))
}
