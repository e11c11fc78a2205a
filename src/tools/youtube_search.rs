use anyhow::{anyhow, Result};
use serde_json::Value;
use tracing::info;
use url::Url;

use crate::config::CONFIG;
use crate::flow::schema::{FieldDescriptor, FieldKind, Schema};
use crate::flow::tool::{ToolDefinition, ToolFuture};
use crate::flow::FlowError;
use crate::utils::http::get_http_client;

pub const SEARCH_YOUTUBE_TOOL: &str = "search_youtube";

pub fn definition() -> Result<ToolDefinition, FlowError> {
    Ok(ToolDefinition {
        name: SEARCH_YOUTUBE_TOOL,
        description: "Search for a youtube video.",
        input: Schema::define(vec![FieldDescriptor::string(
            "query",
            "The search query for the video.",
        )])?,
        output: FieldKind::String,
        output_description: "The embed URL of the best-matching video.",
        handler: run,
    })
}

fn run(args: Value) -> ToolFuture {
    Box::pin(async move {
        let query = args
            .get("query")
            .and_then(|value| value.as_str())
            .unwrap_or_default();
        search_youtube(query).await
    })
}

/// Extracts the first video id from a YouTube Data API search response.
/// The result set from the external source may be empty or oddly shaped, so
/// every step is checked rather than indexed.
fn extract_video_id(response: &Value) -> Result<String> {
    let items = response
        .get("items")
        .and_then(|value| value.as_array())
        .ok_or_else(|| anyhow!("response has no items array"))?;
    let first = items.first().ok_or_else(|| anyhow!("no videos found"))?;
    let video_id = first
        .pointer("/id/videoId")
        .and_then(|value| value.as_str())
        .ok_or_else(|| anyhow!("first item has no video id"))?;
    if video_id.trim().is_empty() {
        return Err(anyhow!("first item has an empty video id"));
    }
    Ok(video_id.to_string())
}

async fn search_youtube(query: &str) -> Result<Value> {
    if query.trim().is_empty() {
        anyhow::bail!("query must not be empty");
    }
    if CONFIG.youtube_api_key.trim().is_empty() {
        anyhow::bail!("YouTube search is not configured. Set YOUTUBE_API_KEY.");
    }

    let url = Url::parse_with_params(
        &CONFIG.youtube_search_endpoint,
        &[
            ("part", "snippet"),
            ("maxResults", "1"),
            ("q", query),
            ("key", CONFIG.youtube_api_key.as_str()),
        ],
    )?;

    info!("Searching YouTube for: {}", query);
    let response = get_http_client().get(url).send().await?;
    if !response.status().is_success() {
        anyhow::bail!("YouTube search failed with status {}", response.status());
    }

    let body = response.json::<Value>().await?;
    let video_id = extract_video_id(&body)?;
    Ok(Value::String(format!(
        "https://www.youtube.com/embed/{}",
        video_id
    )))
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn extracts_the_first_video_id() {
        let response = json!({
            "items": [
                { "id": { "kind": "youtube#video", "videoId": "abc123" } },
                { "id": { "kind": "youtube#video", "videoId": "def456" } }
            ]
        });
        assert_eq!(extract_video_id(&response).unwrap(), "abc123");
    }

    #[test]
    fn empty_result_set_is_an_error_not_a_panic() {
        assert!(extract_video_id(&json!({ "items": [] })).is_err());
        assert!(extract_video_id(&json!({})).is_err());
        assert!(extract_video_id(&json!({ "items": [{ "id": {} }] })).is_err());
        assert!(extract_video_id(&json!({ "items": [{ "id": { "videoId": "" } }] })).is_err());
    }

    #[tokio::test]
    async fn empty_query_is_rejected_before_any_request() {
        let err = search_youtube("  ").await.unwrap_err();
        assert!(err.to_string().contains("query must not be empty"));
    }
}
