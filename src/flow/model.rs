use serde_json::Value;

use crate::flow::error::FlowError;
use crate::flow::template::Prompt;

/// One message in a flow's transcript. Assistant content is provider-native
/// and is echoed back verbatim on the next round so the model sees its own
/// tool requests.
#[derive(Debug, Clone)]
pub enum FlowMessage {
    User(Prompt),
    Assistant(Value),
    ToolResults(Vec<ToolResult>),
}

/// A tool call requested by the model.
#[derive(Debug, Clone)]
pub struct ToolCall {
    pub id: String,
    pub name: String,
    pub args: Value,
}

/// Outcome of one tool round, fed back to the model. Failures carry the
/// short error text so the model can reason around a missing result.
#[derive(Debug, Clone)]
pub struct ToolResult {
    /// Provider call id. Gemini keys function responses by name; the id is
    /// preserved for providers that key by call.
    #[allow(dead_code)]
    pub call_id: String,
    pub name: String,
    pub payload: Result<Value, String>,
}

/// One model turn. Empty `tool_calls` means `text` is the final structured
/// output (as JSON text); otherwise the executor must answer every call
/// before the model will continue.
#[derive(Debug, Clone)]
pub struct ModelReply {
    pub content: Value,
    pub text: String,
    pub tool_calls: Vec<ToolCall>,
}

#[derive(Debug)]
pub struct GenerateRequest<'a> {
    pub messages: &'a [FlowMessage],
    pub output_schema: &'a Value,
    pub tools: &'a [Value],
}

/// The opaque generative capability. Retry, backoff and request timeouts
/// live behind this boundary, not in the executor.
pub trait ModelClient: Send + Sync {
    fn generate(
        &self,
        request: GenerateRequest<'_>,
    ) -> impl std::future::Future<Output = Result<ModelReply, FlowError>> + Send;
}
