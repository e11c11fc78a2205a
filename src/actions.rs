use serde::Serialize;
use serde_json::{json, Value};
use tracing::{error, info, warn};

use crate::flow::{run_flow, FlowError, FlowRegistry, ModelClient};
use crate::tasks;

/// The two-shape result every caller-facing entry point returns. Callers
/// never see raw unvalidated model output and never see a panic; failures
/// carry a short human-readable message, the detail stays in the log.
#[derive(Debug, Clone, Serialize)]
#[serde(untagged)]
pub enum ActionResult {
    Success { success: bool, data: Value },
    Failure { success: bool, error: String },
}

impl ActionResult {
    fn ok(data: Value) -> Self {
        ActionResult::Success {
            success: true,
            data,
        }
    }

    fn err(message: impl Into<String>) -> Self {
        ActionResult::Failure {
            success: false,
            error: message.into(),
        }
    }

    pub fn is_success(&self) -> bool {
        matches!(self, ActionResult::Success { .. })
    }

    #[allow(dead_code)]
    pub fn data(&self) -> Option<&Value> {
        match self {
            ActionResult::Success { data, .. } => Some(data),
            ActionResult::Failure { .. } => None,
        }
    }

    #[allow(dead_code)]
    pub fn error(&self) -> Option<&str> {
        match self {
            ActionResult::Success { .. } => None,
            ActionResult::Failure { error, .. } => Some(error),
        }
    }
}

async fn run_action<M: ModelClient>(
    registry: &FlowRegistry,
    model: &M,
    task_name: &str,
    input: Value,
) -> ActionResult {
    let Some(task) = registry.get(task_name) else {
        error!("Action requested unregistered task '{}'", task_name);
        return ActionResult::err("An unknown error occurred.");
    };

    info!(task = task_name, "running action");
    match run_flow(model, task, &input).await {
        Ok(output) => ActionResult::ok(output),
        Err(err) => {
            if err.is_input_defect() {
                warn!(task = task_name, error = ?err, "action rejected caller input");
            } else {
                error!(task = task_name, error = ?err, "action failed");
            }
            ActionResult::err(err.to_string())
        }
    }
}

/// Analyzes a face photo for shape, tone, current makeup and
/// recommendations.
pub async fn analyze_face_action<M: ModelClient>(
    registry: &FlowRegistry,
    model: &M,
    photo_data_uri: &str,
) -> ActionResult {
    run_action(
        registry,
        model,
        tasks::FACE_ANALYSIS_TASK,
        json!({ "photoDataUri": photo_data_uri }),
    )
    .await
}

/// Identifies a makeup product from a photo.
pub async fn recognize_product_action<M: ModelClient>(
    registry: &FlowRegistry,
    model: &M,
    product_photo_data_uri: &str,
) -> ActionResult {
    run_action(
        registry,
        model,
        tasks::PRODUCT_RECOGNITION_TASK,
        json!({ "productPhotoDataUri": product_photo_data_uri }),
    )
    .await
}

/// Refines a described makeup look according to user feedback.
pub async fn iterate_look_action<M: ModelClient>(
    registry: &FlowRegistry,
    model: &M,
    original_look: &str,
    feedback_prompt: &str,
) -> ActionResult {
    run_action(
        registry,
        model,
        tasks::LOOK_ITERATION_TASK,
        json!({ "originalLook": original_look, "feedbackPrompt": feedback_prompt }),
    )
    .await
}

/// Explains a makeup topic. `None` context omits the field entirely, which
/// the model sees differently from an explicit empty string.
pub async fn get_explanation_action<M: ModelClient>(
    registry: &FlowRegistry,
    model: &M,
    topic: &str,
    context: Option<&str>,
) -> ActionResult {
    let input = match context {
        Some(context) => json!({ "topic": topic, "context": context }),
        None => json!({ "topic": topic }),
    };
    run_action(registry, model, tasks::EXPLANATION_TASK, input).await
}

/// Produces a general product review with pros/cons and company background.
pub async fn analyze_product_action<M: ModelClient>(
    registry: &FlowRegistry,
    model: &M,
    photo_data_uri: &str,
) -> ActionResult {
    run_action(
        registry,
        model,
        tasks::PRODUCT_ANALYSIS_TASK,
        json!({ "photoDataUri": photo_data_uri }),
    )
    .await
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::flow::model::{GenerateRequest, ModelReply};
    use std::sync::Mutex;

    /// Returns the same canned final reply for every generate call.
    struct CannedModel {
        text: String,
        calls: Mutex<usize>,
    }

    impl CannedModel {
        fn new(text: &str) -> Self {
            CannedModel {
                text: text.to_string(),
                calls: Mutex::new(0),
            }
        }
    }

    impl ModelClient for CannedModel {
        async fn generate(&self, _request: GenerateRequest<'_>) -> Result<ModelReply, FlowError> {
            *self.calls.lock().unwrap() += 1;
            Ok(ModelReply {
                content: Value::Null,
                text: self.text.clone(),
                tool_calls: Vec::new(),
            })
        }
    }

    struct FailingModel;

    impl ModelClient for FailingModel {
        async fn generate(&self, _request: GenerateRequest<'_>) -> Result<ModelReply, FlowError> {
            Err(FlowError::ModelInvocation("boundary unavailable".to_string()))
        }
    }

    #[tokio::test]
    async fn successful_action_wraps_validated_output() {
        let registry = tasks::build_registry().unwrap();
        let model = CannedModel::new(r#"{"explanation": "Use a damp sponge."}"#);
        let result = get_explanation_action(&registry, &model, "baking", Some("")).await;
        assert!(result.is_success());
        assert_eq!(result.data().unwrap()["explanation"], "Use a damp sponge.");
    }

    #[tokio::test]
    async fn invalid_caller_input_becomes_a_failure_shape() {
        let registry = tasks::build_registry().unwrap();
        let model = CannedModel::new("{}");
        let result = analyze_face_action(&registry, &model, "not-a-data-uri").await;
        assert!(!result.is_success());
        assert!(result.error().unwrap().contains("photoDataUri"));
        // The model boundary is never reached for bad input.
        assert_eq!(*model.calls.lock().unwrap(), 0);
    }

    #[tokio::test]
    async fn model_failure_becomes_a_failure_shape_not_a_panic() {
        let registry = tasks::build_registry().unwrap();
        let result =
            iterate_look_action(&registry, &FailingModel, "smokey eye", "simpler").await;
        assert!(!result.is_success());
        assert!(result.error().unwrap().contains("Model invocation failed"));
    }

    #[tokio::test]
    async fn non_conforming_model_output_never_reaches_the_caller() {
        let registry = tasks::build_registry().unwrap();
        let model = CannedModel::new(r#"{"surprise": 42}"#);
        let result =
            iterate_look_action(&registry, &model, "smokey eye", "simpler").await;
        assert!(!result.is_success());
        assert!(result.data().is_none());
    }

    #[test]
    fn result_serializes_to_the_two_shape_contract() {
        let ok = ActionResult::ok(json!({ "explanation": "x" }));
        assert_eq!(
            serde_json::to_value(&ok).unwrap(),
            json!({ "success": true, "data": { "explanation": "x" } })
        );

        let err = ActionResult::err("short message");
        assert_eq!(
            serde_json::to_value(&err).unwrap(),
            json!({ "success": false, "error": "short message" })
        );
    }
}
