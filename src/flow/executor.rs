use serde_json::Value;
use tracing::{debug, warn};

use crate::config::CONFIG;
use crate::flow::error::FlowError;
use crate::flow::model::{FlowMessage, GenerateRequest, ModelClient, ToolResult};
use crate::flow::{tool, TaskDefinition};
use crate::utils::timing::FlowTimer;

/// Execution states of one flow. Terminal states have no outgoing
/// transitions; the record they belong to is dropped when the call returns.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FlowState {
    Idle,
    InputValidated,
    PromptRendered,
    Generating,
    ToolCallPending,
    OutputValidated,
    Failed,
}

impl FlowState {
    pub const fn as_str(self) -> &'static str {
        match self {
            FlowState::Idle => "idle",
            FlowState::InputValidated => "input_validated",
            FlowState::PromptRendered => "prompt_rendered",
            FlowState::Generating => "generating",
            FlowState::ToolCallPending => "tool_call_pending",
            FlowState::OutputValidated => "output_validated",
            FlowState::Failed => "failed",
        }
    }
}

/// Ephemeral per-call bookkeeping, owned by exactly one invocation.
struct ExecutionRecord {
    task: &'static str,
    state: FlowState,
    tool_rounds: usize,
    tool_calls: usize,
}

impl ExecutionRecord {
    fn new(task: &'static str) -> Self {
        ExecutionRecord {
            task,
            state: FlowState::Idle,
            tool_rounds: 0,
            tool_calls: 0,
        }
    }

    fn enter(&mut self, next: FlowState) {
        debug!(
            target: "flow.executor",
            task = self.task,
            from = self.state.as_str(),
            to = next.as_str(),
            "state transition"
        );
        self.state = next;
    }
}

/// Strips a Markdown code fence around a JSON body, if present. With a
/// response schema Gemini returns bare JSON, but fenced output still shows
/// up often enough to handle.
fn strip_code_fences(text: &str) -> &str {
    let trimmed = text.trim();
    let Some(rest) = trimmed.strip_prefix("```") else {
        return trimmed;
    };
    let Some(rest) = rest.strip_suffix("```") else {
        return trimmed;
    };
    let rest = rest.strip_prefix("json").unwrap_or(rest);
    rest.trim()
}

fn parse_final_output(task: &TaskDefinition, text: &str) -> Result<Value, FlowError> {
    let body = strip_code_fences(text);
    let parsed: Value = serde_json::from_str(body).map_err(|err| {
        FlowError::OutputSchemaViolation(format!("output is not valid JSON ({err})"))
    })?;
    task.output
        .validate(&parsed)
        .map_err(|err| FlowError::OutputSchemaViolation(err.to_string()))
}

/// Runs one complete flow: validate input, render the prompt, drive the
/// model (answering tool calls as they come), validate the final output.
/// A response that fails output validation is never returned to the caller.
pub async fn run_flow<M: ModelClient>(
    model: &M,
    task: &TaskDefinition,
    raw_input: &Value,
) -> Result<Value, FlowError> {
    let mut record = ExecutionRecord::new(task.name);
    let timer = FlowTimer::start(task.name);

    let result = drive(model, task, raw_input, &mut record).await;
    match &result {
        Ok(_) => record.enter(FlowState::OutputValidated),
        Err(_) => record.enter(FlowState::Failed),
    }
    timer.complete(
        record.state.as_str(),
        record.tool_rounds,
        record.tool_calls,
        result.as_ref().err().map(|err| err.to_string()),
    );
    result
}

async fn drive<M: ModelClient>(
    model: &M,
    task: &TaskDefinition,
    raw_input: &Value,
    record: &mut ExecutionRecord,
) -> Result<Value, FlowError> {
    let input = task.input.validate(raw_input)?;
    record.enter(FlowState::InputValidated);

    let prompt = task.template.render(&input)?;
    record.enter(FlowState::PromptRendered);
    debug!(
        target: "flow.executor",
        task = task.name,
        text_chars = prompt.text_len(),
        attachments = prompt.inline_count(),
        "prompt rendered"
    );

    let output_schema = task.output.to_parameters_json();
    let tool_declarations: Vec<Value> =
        task.tools.iter().map(|tool| tool.to_declaration()).collect();

    let mut messages = vec![FlowMessage::User(prompt)];

    // Tool-round budget. The engine's only bound; wall-clock limits belong
    // to the model client and the caller.
    let max_rounds = CONFIG.flow_max_tool_rounds.max(1);
    for _round in 0..max_rounds {
        record.enter(FlowState::Generating);
        let reply = model
            .generate(GenerateRequest {
                messages: &messages,
                output_schema: &output_schema,
                tools: &tool_declarations,
            })
            .await?;

        if reply.tool_calls.is_empty() {
            return parse_final_output(task, &reply.text);
        }

        record.enter(FlowState::ToolCallPending);
        record.tool_rounds += 1;
        messages.push(FlowMessage::Assistant(reply.content));

        // Sequential dispatch; no caller-observable ordering exists among
        // results within a round.
        let mut results = Vec::with_capacity(reply.tool_calls.len());
        for call in reply.tool_calls {
            record.tool_calls += 1;
            let payload = match task.tool(&call.name) {
                Some(definition) => tool::invoke(definition, call.args).await,
                None => Err(FlowError::tool(&call.name, "unknown tool")),
            };
            let payload = match payload {
                Ok(value) => Ok(value),
                Err(err) => {
                    // Tool failures go back to the model as data so it can
                    // reason around the missing result.
                    warn!(
                        target: "flow.executor",
                        task = task.name,
                        tool = call.name.as_str(),
                        call_id = call.id.as_str(),
                        error = %err,
                        "tool call failed; reporting to model"
                    );
                    Err(err.to_string())
                }
            };
            results.push(ToolResult {
                call_id: call.id,
                name: call.name,
                payload,
            });
        }
        messages.push(FlowMessage::ToolResults(results));
    }

    Err(FlowError::ModelInvocation(format!(
        "tool round budget of {} exhausted without a final response",
        max_rounds
    )))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::flow::model::{ModelReply, ToolCall};
    use crate::flow::schema::{FieldDescriptor, FieldKind, Schema};
    use crate::flow::template::PromptTemplate;
    use crate::flow::ToolDefinition;
    use serde_json::json;
    use std::sync::Mutex;

    /// Replays a fixed sequence of model turns; panics if the executor asks
    /// for more turns than were scripted.
    struct ScriptedModel {
        replies: Mutex<Vec<ModelReply>>,
        seen_tool_results: Mutex<Vec<ToolResult>>,
    }

    impl ScriptedModel {
        fn new(replies: Vec<ModelReply>) -> Self {
            ScriptedModel {
                replies: Mutex::new(replies),
                seen_tool_results: Mutex::new(Vec::new()),
            }
        }

        fn final_reply(text: &str) -> ModelReply {
            ModelReply {
                content: Value::Null,
                text: text.to_string(),
                tool_calls: Vec::new(),
            }
        }

        fn tool_reply(name: &str, args: Value) -> ModelReply {
            ModelReply {
                content: Value::Null,
                text: String::new(),
                tool_calls: vec![ToolCall {
                    id: "call_1".to_string(),
                    name: name.to_string(),
                    args,
                }],
            }
        }
    }

    impl ModelClient for ScriptedModel {
        async fn generate(&self, request: GenerateRequest<'_>) -> Result<ModelReply, FlowError> {
            for message in request.messages {
                if let FlowMessage::ToolResults(results) = message {
                    let mut seen = self.seen_tool_results.lock().unwrap();
                    seen.clear();
                    seen.extend(results.iter().cloned());
                }
            }
            let mut replies = self.replies.lock().unwrap();
            if replies.is_empty() {
                return Err(FlowError::ModelInvocation("script exhausted".to_string()));
            }
            Ok(replies.remove(0))
        }
    }

    fn explanation_task() -> TaskDefinition {
        TaskDefinition {
            name: "explanation",
            input: Schema::define(vec![
                FieldDescriptor::string("topic", "The topic to explain."),
                FieldDescriptor::string("context", "Additional context.").optional(),
            ])
            .unwrap(),
            output: Schema::define(vec![FieldDescriptor::string(
                "explanation",
                "A detailed explanation of the topic.",
            )])
            .unwrap(),
            template: PromptTemplate::parse(
                "Explain the topic.\n\nTopic: {{{topic}}}\nContext: {{{context}}}",
            ),
            tools: Vec::new(),
        }
    }

    fn face_task() -> TaskDefinition {
        TaskDefinition {
            name: "face_analysis",
            input: Schema::define(vec![FieldDescriptor::string(
                "photoDataUri",
                "A photo of a face as a data URI.",
            )])
            .unwrap(),
            output: Schema::define(vec![
                FieldDescriptor::string("faceShape", "The face shape."),
                FieldDescriptor::string("skinTone", "The skin tone."),
                FieldDescriptor::string("currentMakeup", "Makeup currently applied."),
                FieldDescriptor::string("eyeColor", "The eye color."),
                FieldDescriptor::string("lipShape", "The lip shape."),
                FieldDescriptor::string("recommendations", "Routine recommendations."),
            ])
            .unwrap(),
            template: PromptTemplate::parse("Analyze the face.\n\nImage: {{media url=photoDataUri}}"),
            tools: Vec::new(),
        }
    }

    fn lookup_tool(handler: crate::flow::tool::ToolHandler) -> ToolDefinition {
        ToolDefinition {
            name: "search_youtube",
            description: "Search for a youtube video.",
            input: Schema::define(vec![FieldDescriptor::string("query", "Search query.")])
                .unwrap(),
            output: FieldKind::String,
            output_description: "The video embed URL.",
            handler,
        }
    }

    fn ok_lookup(_args: Value) -> crate::flow::tool::ToolFuture {
        Box::pin(async { Ok(Value::String("https://www.youtube.com/embed/abc".to_string())) })
    }

    fn failing_lookup(_args: Value) -> crate::flow::tool::ToolFuture {
        Box::pin(async { anyhow::bail!("lookup timed out") })
    }

    #[tokio::test]
    async fn explanation_with_empty_context_yields_explanation() {
        let model = ScriptedModel::new(vec![ScriptedModel::final_reply(
            r#"{"explanation": "Baking sets makeup with translucent powder."}"#,
        )]);
        let task = explanation_task();
        let output = run_flow(&model, &task, &json!({ "topic": "baking", "context": "" }))
            .await
            .unwrap();
        let explanation = output["explanation"].as_str().unwrap();
        assert!(!explanation.is_empty());
    }

    #[tokio::test]
    async fn face_analysis_yields_all_required_fields() {
        let model = ScriptedModel::new(vec![ScriptedModel::final_reply(
            r#"{
                "faceShape": "oval",
                "skinTone": "warm beige",
                "currentMakeup": "light foundation",
                "eyeColor": "brown",
                "lipShape": "full",
                "recommendations": "Try a peach blush."
            }"#,
        )]);
        let task = face_task();
        let output = run_flow(
            &model,
            &task,
            &json!({ "photoDataUri": "data:image/png;base64,AAAA" }),
        )
        .await
        .unwrap();
        for field in [
            "faceShape",
            "skinTone",
            "currentMakeup",
            "eyeColor",
            "lipShape",
            "recommendations",
        ] {
            assert!(!output[field].as_str().unwrap().is_empty(), "{field} empty");
        }
    }

    #[tokio::test]
    async fn look_iteration_round_trip() {
        let model = ScriptedModel::new(vec![ScriptedModel::final_reply(
            r#"{"refinedLook": "Soft matte base, single eye color.", "reasoning": "Fewer steps."}"#,
        )]);
        let task = TaskDefinition {
            name: "look_iteration",
            input: Schema::define(vec![
                FieldDescriptor::string("originalLook", "The original look."),
                FieldDescriptor::string("feedbackPrompt", "User feedback."),
            ])
            .unwrap(),
            output: Schema::define(vec![
                FieldDescriptor::string("refinedLook", "The refined look."),
                FieldDescriptor::string("reasoning", "Why it changed."),
            ])
            .unwrap(),
            template: PromptTemplate::parse(
                "Original: {{{originalLook}}}\nFeedback: {{{feedbackPrompt}}}",
            ),
            tools: Vec::new(),
        };
        let output = run_flow(
            &model,
            &task,
            &json!({ "originalLook": "smokey eye", "feedbackPrompt": "simpler" }),
        )
        .await
        .unwrap();
        assert!(!output["refinedLook"].as_str().unwrap().is_empty());
        assert!(!output["reasoning"].as_str().unwrap().is_empty());
    }

    #[tokio::test]
    async fn invalid_input_fails_before_any_model_call() {
        let model = ScriptedModel::new(Vec::new());
        let task = explanation_task();
        let err = run_flow(&model, &task, &json!({ "context": "x" }))
            .await
            .unwrap_err();
        assert!(matches!(err, FlowError::MissingField { .. }));
    }

    #[tokio::test]
    async fn output_missing_required_field_is_a_schema_violation() {
        let model = ScriptedModel::new(vec![ScriptedModel::final_reply(r#"{"wrong": 1}"#)]);
        let task = explanation_task();
        let err = run_flow(&model, &task, &json!({ "topic": "baking" }))
            .await
            .unwrap_err();
        assert!(matches!(err, FlowError::OutputSchemaViolation(_)));
    }

    #[tokio::test]
    async fn non_json_output_is_a_schema_violation() {
        let model = ScriptedModel::new(vec![ScriptedModel::final_reply("I cannot help.")]);
        let task = explanation_task();
        let err = run_flow(&model, &task, &json!({ "topic": "baking" }))
            .await
            .unwrap_err();
        assert!(matches!(err, FlowError::OutputSchemaViolation(_)));
    }

    #[tokio::test]
    async fn fenced_json_output_is_accepted() {
        let model = ScriptedModel::new(vec![ScriptedModel::final_reply(
            "```json\n{\"explanation\": \"Primer first.\"}\n```",
        )]);
        let task = explanation_task();
        let output = run_flow(&model, &task, &json!({ "topic": "primer" }))
            .await
            .unwrap();
        assert_eq!(output["explanation"], "Primer first.");
    }

    #[tokio::test]
    async fn tool_results_flow_back_to_the_model() {
        let model = ScriptedModel::new(vec![
            ScriptedModel::tool_reply("search_youtube", json!({ "query": "contour tutorial" })),
            ScriptedModel::final_reply(r#"{"explanation": "See the linked tutorial."}"#),
        ]);
        let mut task = explanation_task();
        task.tools.push(lookup_tool(ok_lookup));

        let output = run_flow(&model, &task, &json!({ "topic": "contouring" }))
            .await
            .unwrap();
        assert_eq!(output["explanation"], "See the linked tutorial.");
        let seen = model.seen_tool_results.lock().unwrap();
        assert_eq!(seen.len(), 1);
        assert_eq!(
            seen[0].payload.as_ref().unwrap(),
            &Value::String("https://www.youtube.com/embed/abc".to_string())
        );
    }

    #[tokio::test]
    async fn failing_tool_does_not_abort_the_flow() {
        let model = ScriptedModel::new(vec![
            ScriptedModel::tool_reply("search_youtube", json!({ "query": "contour tutorial" })),
            ScriptedModel::final_reply(r#"{"explanation": "No tutorial found, here is a summary."}"#),
        ]);
        let mut task = explanation_task();
        task.tools.push(lookup_tool(failing_lookup));

        let output = run_flow(&model, &task, &json!({ "topic": "contouring" }))
            .await
            .unwrap();
        assert_eq!(output["explanation"], "No tutorial found, here is a summary.");
        let seen = model.seen_tool_results.lock().unwrap();
        assert!(seen[0].payload.as_ref().unwrap_err().contains("lookup timed out"));
    }

    #[tokio::test]
    async fn unknown_tool_name_is_reported_not_fatal() {
        let model = ScriptedModel::new(vec![
            ScriptedModel::tool_reply("delete_everything", json!({})),
            ScriptedModel::final_reply(r#"{"explanation": "Proceeding without that tool."}"#),
        ]);
        let task = explanation_task();
        let output = run_flow(&model, &task, &json!({ "topic": "contouring" }))
            .await
            .unwrap();
        assert_eq!(output["explanation"], "Proceeding without that tool.");
    }

    #[tokio::test]
    async fn endless_tool_requests_terminate_with_model_error() {
        let replies: Vec<ModelReply> = (0..64)
            .map(|_| ScriptedModel::tool_reply("search_youtube", json!({ "query": "loop" })))
            .collect();
        let model = ScriptedModel::new(replies);
        let mut task = explanation_task();
        task.tools.push(lookup_tool(ok_lookup));

        let err = run_flow(&model, &task, &json!({ "topic": "loops" }))
            .await
            .unwrap_err();
        assert!(matches!(err, FlowError::ModelInvocation(_)));
    }

    #[test]
    fn strip_code_fences_handles_plain_and_fenced_bodies() {
        assert_eq!(strip_code_fences("{\"a\":1}"), "{\"a\":1}");
        assert_eq!(strip_code_fences("```json\n{\"a\":1}\n```"), "{\"a\":1}");
        assert_eq!(strip_code_fences("```\n{\"a\":1}\n```"), "{\"a\":1}");
        assert_eq!(strip_code_fences("  {\"a\":1}  "), "{\"a\":1}");
    }
}
