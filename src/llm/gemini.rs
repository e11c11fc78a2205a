use std::time::{Duration, SystemTime, UNIX_EPOCH};

use base64::{engine::general_purpose, Engine as _};
use reqwest::StatusCode;
use serde_json::{json, Map, Value};
use tracing::{debug, warn};

use crate::config::CONFIG;
use crate::flow::model::{FlowMessage, GenerateRequest, ModelClient, ModelReply, ToolCall};
use crate::flow::template::{Prompt, PromptPart};
use crate::flow::FlowError;
use crate::utils::http::get_http_client;
use crate::utils::timing::log_llm_timing;

const GEMINI_MAX_RETRY_ATTEMPTS: usize = 2;
const GEMINI_RETRY_BASE_DELAY_MS: u64 = 900;
const GEMINI_REQUEST_TIMEOUT_SECS: u64 = 90;

fn redact_gemini_api_key(text: &str) -> String {
    let key = CONFIG.gemini_api_key.trim();
    if key.is_empty() {
        return text.to_string();
    }
    text.replace(key, "[redacted]")
}

fn gemini_should_retry_error(err: &reqwest::Error) -> bool {
    err.is_timeout() || err.is_connect()
}

fn gemini_should_retry_status(status: StatusCode) -> bool {
    status == StatusCode::TOO_MANY_REQUESTS
        || status == StatusCode::REQUEST_TIMEOUT
        || status.is_server_error()
}

fn gemini_retry_delay(attempt: usize) -> Duration {
    let attempt = attempt.max(1) as u64;
    Duration::from_millis(GEMINI_RETRY_BASE_DELAY_MS.saturating_mul(attempt))
}

fn now_nanos() -> u128 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .unwrap_or_default()
        .as_nanos()
}

fn truncate_for_log(value: &str, limit: usize) -> String {
    if value.chars().count() <= limit {
        return value.to_string();
    }
    let truncated: String = value.chars().take(limit).collect();
    format!("{truncated}... (truncated)")
}

fn summarize_error_body(body: &str) -> (Option<String>, String) {
    let trimmed = body.trim();
    if trimmed.is_empty() {
        return (None, "empty response body".to_string());
    }

    if let Ok(value) = serde_json::from_str::<Value>(trimmed) {
        let message = value
            .pointer("/error/message")
            .and_then(|v| v.as_str())
            .map(|v| v.to_string())
            .or_else(|| {
                value
                    .get("message")
                    .and_then(|v| v.as_str())
                    .map(|v| v.to_string())
            });
        return (message, truncate_for_log(&value.to_string(), 2000));
    }

    (None, truncate_for_log(trimmed, 2000))
}

fn build_safety_settings() -> Vec<Value> {
    let profile = CONFIG.gemini_safety_settings.as_str();
    let threshold = match profile {
        "standard" => "BLOCK_MEDIUM_AND_ABOVE",
        "permissive" => "OFF",
        _ => {
            warn!(
                "Unknown GEMINI_SAFETY_SETTINGS value '{}', using permissive defaults.",
                profile
            );
            "OFF"
        }
    };

    vec![
        json!({ "category": "HARM_CATEGORY_HARASSMENT", "threshold": threshold }),
        json!({ "category": "HARM_CATEGORY_HATE_SPEECH", "threshold": threshold }),
        json!({ "category": "HARM_CATEGORY_SEXUALLY_EXPLICIT", "threshold": threshold }),
        json!({ "category": "HARM_CATEGORY_DANGEROUS_CONTENT", "threshold": threshold }),
        json!({ "category": "HARM_CATEGORY_CIVIC_INTEGRITY", "threshold": threshold }),
    ]
}

fn prompt_to_parts(prompt: &Prompt) -> Vec<Value> {
    prompt
        .parts
        .iter()
        .map(|part| match part {
            PromptPart::Text(text) => json!({ "text": text }),
            PromptPart::Inline { mime_type, data } => json!({
                "inlineData": {
                    "mimeType": mime_type,
                    "data": general_purpose::STANDARD.encode(data),
                }
            }),
        })
        .collect()
}

fn messages_to_contents(messages: &[FlowMessage]) -> Vec<Value> {
    let mut contents = Vec::with_capacity(messages.len());
    for message in messages {
        match message {
            FlowMessage::User(prompt) => {
                contents.push(json!({ "role": "user", "parts": prompt_to_parts(prompt) }));
            }
            FlowMessage::Assistant(content) => contents.push(content.clone()),
            FlowMessage::ToolResults(results) => {
                let parts: Vec<Value> = results
                    .iter()
                    .map(|result| {
                        let payload = match &result.payload {
                            Ok(value) => json!({ "name": result.name, "content": value }),
                            Err(error) => json!({ "name": result.name, "error": error }),
                        };
                        json!({
                            "functionResponse": {
                                "name": result.name,
                                "response": payload,
                            }
                        })
                    })
                    .collect();
                contents.push(json!({ "role": "user", "parts": parts }));
            }
        }
    }
    contents
}

fn summarize_parts(parts: &[Value]) -> Vec<Value> {
    parts
        .iter()
        .map(|part| {
            if let Some(text) = part.get("text").and_then(|value| value.as_str()) {
                json!({ "text": truncate_for_log(text, 200) })
            } else if let Some(inline_data) = part.get("inlineData") {
                let mime_type = inline_data
                    .get("mimeType")
                    .and_then(|value| value.as_str())
                    .unwrap_or("unknown");
                let data_len = inline_data
                    .get("data")
                    .and_then(|value| value.as_str())
                    .map(|value| value.len())
                    .unwrap_or(0);
                json!({ "inlineData": { "mimeType": mime_type, "dataLen": data_len } })
            } else if part.get("functionCall").is_some() {
                json!({ "functionCall": part["functionCall"].get("name") })
            } else if part.get("functionResponse").is_some() {
                json!({ "functionResponse": part["functionResponse"].get("name") })
            } else {
                json!({ "unknownPart": true })
            }
        })
        .collect()
}

fn summarize_payload(payload: &Value) -> Value {
    let mut summary = Map::new();

    if let Some(contents) = payload.get("contents").and_then(|value| value.as_array()) {
        let summarized: Vec<Value> = contents
            .iter()
            .map(|content| {
                let role = content
                    .get("role")
                    .and_then(|value| value.as_str())
                    .unwrap_or("user");
                let parts = content
                    .get("parts")
                    .and_then(|value| value.as_array())
                    .map(|parts| summarize_parts(parts))
                    .unwrap_or_default();
                json!({ "role": role, "parts": parts })
            })
            .collect();
        summary.insert("contents".to_string(), Value::Array(summarized));
    }

    if let Some(config) = payload.get("generationConfig") {
        summary.insert("generationConfig".to_string(), config.clone());
    }
    if let Some(tools) = payload.get("tools") {
        summary.insert("tools".to_string(), tools.clone());
    }
    if let Some(safety) = payload.get("safetySettings").and_then(|value| value.as_array()) {
        summary.insert("safetySettingsCount".to_string(), json!(safety.len()));
    }

    Value::Object(summary)
}

async fn call_gemini_api(model: &str, payload: &Value) -> Result<Value, FlowError> {
    if CONFIG.gemini_api_key.trim().is_empty() {
        return Err(FlowError::ModelInvocation(
            "Gemini is not configured. Set GEMINI_API_KEY.".to_string(),
        ));
    }

    let client = get_http_client();
    let url = format!(
        "https://generativelanguage.googleapis.com/v1beta/models/{}:generateContent?key={}",
        model, CONFIG.gemini_api_key
    );

    if tracing::enabled!(tracing::Level::DEBUG) {
        debug!(target: "llm.gemini", model = model, payload = %summarize_payload(payload));
    }

    let mut attempt = 0usize;
    loop {
        attempt += 1;
        let response = match client
            .post(&url)
            .timeout(Duration::from_secs(GEMINI_REQUEST_TIMEOUT_SECS))
            .json(payload)
            .send()
            .await
        {
            Ok(response) => response,
            Err(err) => {
                let err_text = redact_gemini_api_key(&err.to_string());
                let should_retry =
                    gemini_should_retry_error(&err) && attempt < GEMINI_MAX_RETRY_ATTEMPTS;
                warn!(
                    "Gemini request failed to send: {} (timeout={}, connect={}, retrying={})",
                    err_text,
                    err.is_timeout(),
                    err.is_connect(),
                    should_retry
                );
                if should_retry {
                    tokio::time::sleep(gemini_retry_delay(attempt)).await;
                    continue;
                }
                return Err(FlowError::ModelInvocation(format!(
                    "Gemini request failed: {}",
                    err_text
                )));
            }
        };

        if !response.status().is_success() {
            let status = response.status();
            let body = response.text().await.unwrap_or_default();
            let (message, body_summary) = summarize_error_body(&body);
            let should_retry =
                gemini_should_retry_status(status) && attempt < GEMINI_MAX_RETRY_ATTEMPTS;
            warn!(
                "Gemini API error: status={}, body={}, retrying={}",
                status, body_summary, should_retry
            );
            if should_retry {
                tokio::time::sleep(gemini_retry_delay(attempt)).await;
                continue;
            }
            let detail = message.unwrap_or(body_summary);
            return Err(FlowError::ModelInvocation(format!(
                "Gemini request failed with status {}: {}",
                status, detail
            )));
        }

        return response.json::<Value>().await.map_err(|err| {
            FlowError::ModelInvocation(format!("Failed to decode Gemini response: {err}"))
        });
    }
}

fn parse_reply(response: &Value) -> Result<ModelReply, FlowError> {
    let content = response
        .pointer("/candidates/0/content")
        .cloned()
        .ok_or_else(|| {
            FlowError::ModelInvocation(
                "Gemini response is missing candidates[0].content".to_string(),
            )
        })?;

    let parts = content
        .get("parts")
        .and_then(|value| value.as_array())
        .cloned()
        .unwrap_or_default();

    let mut text_parts = Vec::new();
    let mut tool_calls = Vec::new();
    for (index, part) in parts.iter().enumerate() {
        if let Some(text) = part.get("text").and_then(|value| value.as_str()) {
            let trimmed = text.trim();
            if !trimmed.is_empty() {
                text_parts.push(trimmed.to_string());
            }
        }

        if let Some(call) = part.get("functionCall") {
            let name = call
                .get("name")
                .and_then(|value| value.as_str())
                .unwrap_or("")
                .trim()
                .to_string();
            if name.is_empty() {
                continue;
            }
            let args = call.get("args").cloned().unwrap_or_else(|| json!({}));
            let id = call
                .get("id")
                .and_then(|value| value.as_str())
                .map(|value| value.to_string())
                .unwrap_or_else(|| format!("gemini_call_{}_{}", index, now_nanos()));
            tool_calls.push(ToolCall { id, name, args });
        }
    }

    Ok(ModelReply {
        content,
        text: text_parts.join("\n"),
        tool_calls,
    })
}

/// Gemini-backed implementation of the model boundary. Transport retries,
/// the per-request timeout and wire-format concerns all live here; the
/// executor never sees provider JSON.
#[derive(Debug, Clone, Copy, Default)]
pub struct GeminiClient;

impl GeminiClient {
    pub fn new() -> Self {
        GeminiClient
    }

    fn build_payload(&self, request: &GenerateRequest<'_>) -> Value {
        let mut generation_config = json!({
            "temperature": CONFIG.gemini_temperature,
            "topK": CONFIG.gemini_top_k,
            "topP": CONFIG.gemini_top_p,
            "maxOutputTokens": CONFIG.gemini_max_output_tokens,
        });

        // Gemini rejects constrained JSON output combined with function
        // declarations; with tools bound, the output schema is enforced by
        // the executor's validation instead.
        if request.tools.is_empty() {
            if let Some(config) = generation_config.as_object_mut() {
                config.insert("responseMimeType".to_string(), json!("application/json"));
                config.insert("responseSchema".to_string(), request.output_schema.clone());
            }
        }

        let mut payload = json!({
            "contents": messages_to_contents(request.messages),
            "generationConfig": generation_config,
            "safetySettings": build_safety_settings(),
        });
        if !request.tools.is_empty() {
            payload["tools"] = json!([{ "functionDeclarations": request.tools }]);
        }
        payload
    }
}

impl ModelClient for GeminiClient {
    async fn generate(&self, request: GenerateRequest<'_>) -> Result<ModelReply, FlowError> {
        let payload = self.build_payload(&request);
        let model = CONFIG.gemini_model.as_str();
        log_llm_timing("gemini", model, "generate_content", || async {
            let response = call_gemini_api(model, &payload).await?;
            parse_reply(&response)
        })
        .await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::flow::model::ToolResult;

    #[test]
    fn prompt_parts_become_text_and_inline_data() {
        let prompt = Prompt {
            parts: vec![
                PromptPart::Text("Analyze this image.".to_string()),
                PromptPart::Inline {
                    mime_type: "image/png".to_string(),
                    data: vec![0, 0, 0],
                },
            ],
        };
        let parts = prompt_to_parts(&prompt);
        assert_eq!(parts[0]["text"], "Analyze this image.");
        assert_eq!(parts[1]["inlineData"]["mimeType"], "image/png");
        assert_eq!(parts[1]["inlineData"]["data"], "AAAA");
    }

    #[test]
    fn tool_results_become_function_responses() {
        let messages = vec![FlowMessage::ToolResults(vec![
            ToolResult {
                call_id: "call_1".to_string(),
                name: "search_youtube".to_string(),
                payload: Ok(json!("https://www.youtube.com/embed/abc")),
            },
            ToolResult {
                call_id: "call_2".to_string(),
                name: "find_similar_products".to_string(),
                payload: Err("lookup failed".to_string()),
            },
        ])];
        let contents = messages_to_contents(&messages);
        assert_eq!(contents.len(), 1);
        assert_eq!(contents[0]["role"], "user");
        let parts = contents[0]["parts"].as_array().unwrap();
        assert_eq!(parts[0]["functionResponse"]["name"], "search_youtube");
        assert_eq!(
            parts[1]["functionResponse"]["response"]["error"],
            "lookup failed"
        );
    }

    #[test]
    fn parse_reply_extracts_text_and_function_calls() {
        let response = json!({
            "candidates": [{
                "content": {
                    "role": "model",
                    "parts": [
                        { "text": "Looking that up." },
                        { "functionCall": { "name": "search_youtube", "args": { "query": "blush" } } }
                    ]
                }
            }]
        });
        let reply = parse_reply(&response).unwrap();
        assert_eq!(reply.text, "Looking that up.");
        assert_eq!(reply.tool_calls.len(), 1);
        assert_eq!(reply.tool_calls[0].name, "search_youtube");
        assert_eq!(reply.tool_calls[0].args, json!({ "query": "blush" }));
        assert_eq!(reply.content["role"], "model");
    }

    #[test]
    fn parse_reply_without_candidates_is_a_model_error() {
        let err = parse_reply(&json!({ "candidates": [] })).unwrap_err();
        assert!(matches!(err, FlowError::ModelInvocation(_)));
    }
}
