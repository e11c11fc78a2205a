use std::future::Future;
use std::pin::Pin;

use serde_json::{json, Value};
use tracing::debug;

use crate::flow::error::FlowError;
use crate::flow::schema::{validate_kind, FieldKind, Schema};

pub type ToolFuture = Pin<Box<dyn Future<Output = anyhow::Result<Value>> + Send>>;

/// Tool implementations are plain function pointers over a fixed set of
/// async functions; the model picks among them by name, never by reflection.
pub type ToolHandler = fn(Value) -> ToolFuture;

/// A callable auxiliary function the model may invoke mid-generation.
/// Arguments and results are both validated against the declared schemas
/// before they cross the boundary in either direction.
#[derive(Debug, Clone)]
pub struct ToolDefinition {
    pub name: &'static str,
    pub description: &'static str,
    pub input: Schema,
    pub output: FieldKind,
    pub output_description: &'static str,
    pub handler: ToolHandler,
}

impl ToolDefinition {
    /// Function declaration in the shape the model boundary consumes. The
    /// output description rides along in the description text since the
    /// declaration format has no slot for a result schema.
    pub fn to_declaration(&self) -> Value {
        let description = if self.output_description.is_empty() {
            self.description.to_string()
        } else {
            format!("{} Returns: {}", self.description, self.output_description)
        };
        json!({
            "name": self.name,
            "description": description,
            "parameters": self.input.to_parameters_json(),
        })
    }
}

/// Runs a tool call end to end: argument validation, implementation, result
/// validation. Every failure surfaces as `ToolInvocation` so the executor can
/// hand it back to the model instead of aborting the flow.
pub async fn invoke(tool: &ToolDefinition, args: Value) -> Result<Value, FlowError> {
    let validated = tool
        .input
        .validate(&args)
        .map_err(|err| FlowError::tool(tool.name, err))?;

    debug!(target: "flow.tool", tool = tool.name, "invoking tool");
    let result = (tool.handler)(validated)
        .await
        .map_err(|err| FlowError::tool(tool.name, err))?;

    validate_kind(&tool.output, "<output>", &result)
        .map_err(|err| FlowError::tool(tool.name, format!("result rejected: {err}")))?;
    Ok(result)
}
