use std::env;

use once_cell::sync::Lazy;
use tracing::warn;

#[derive(Debug, Clone)]
pub struct Config {
    pub log_level: String,
    pub gemini_api_key: String,
    pub gemini_model: String,
    pub gemini_temperature: f32,
    pub gemini_top_k: i32,
    pub gemini_top_p: f32,
    pub gemini_max_output_tokens: i32,
    pub gemini_safety_settings: String,
    pub youtube_api_key: String,
    pub youtube_search_endpoint: String,
    pub flow_max_tool_rounds: usize,
}

pub static CONFIG: Lazy<Config> = Lazy::new(Config::load);

fn env_string(name: &str, default: &str) -> String {
    env::var(name).unwrap_or_else(|_| default.to_string())
}

fn env_f32(name: &str, default: f32) -> f32 {
    env::var(name)
        .ok()
        .and_then(|value| value.parse::<f32>().ok())
        .unwrap_or(default)
}

fn env_i32(name: &str, default: i32) -> i32 {
    env::var(name)
        .ok()
        .and_then(|value| value.parse::<i32>().ok())
        .unwrap_or(default)
}

fn env_usize(name: &str, default: usize) -> usize {
    env::var(name)
        .ok()
        .and_then(|value| value.parse::<usize>().ok())
        .unwrap_or(default)
}

fn normalize_safety_settings(value: String) -> String {
    let trimmed = value.trim();
    if trimmed.is_empty() {
        return "permissive".to_string();
    }

    let lowered = trimmed.to_lowercase();
    match lowered.as_str() {
        "permissive" | "off" | "none" => "permissive".to_string(),
        "standard" => "standard".to_string(),
        _ => {
            warn!(
                "Unknown GEMINI_SAFETY_SETTINGS value '{}'; defaulting to permissive.",
                value
            );
            "permissive".to_string()
        }
    }
}

impl Config {
    fn load() -> Config {
        Config {
            log_level: env_string("LOG_LEVEL", "info"),
            gemini_api_key: env_string("GEMINI_API_KEY", ""),
            gemini_model: env_string("GEMINI_MODEL", "gemini-2.0-flash"),
            gemini_temperature: env_f32("GEMINI_TEMPERATURE", 0.7),
            gemini_top_k: env_i32("GEMINI_TOP_K", 40),
            gemini_top_p: env_f32("GEMINI_TOP_P", 0.95),
            gemini_max_output_tokens: env_i32("GEMINI_MAX_OUTPUT_TOKENS", 8192),
            gemini_safety_settings: normalize_safety_settings(env_string(
                "GEMINI_SAFETY_SETTINGS",
                "standard",
            )),
            youtube_api_key: env_string("YOUTUBE_API_KEY", ""),
            youtube_search_endpoint: env_string(
                "YOUTUBE_SEARCH_ENDPOINT",
                "https://www.googleapis.com/youtube/v3/search",
            ),
            flow_max_tool_rounds: env_usize("FLOW_MAX_TOOL_ROUNDS", 8),
        }
    }
}
