use thiserror::Error;

/// Unified error type for the structured generation engine. Display strings
/// are short and safe to surface to callers; anything richer (cause chains,
/// response bodies) is logged at the site that produced the error.
#[derive(Debug, Error)]
pub enum FlowError {
    #[error("Invalid schema definition: {0}")]
    SchemaDefinition(String),

    #[error("Missing required field '{field}'")]
    MissingField { field: String },

    #[error("Field '{field}' expected {expected}, got {actual}")]
    TypeMismatch {
        field: String,
        expected: &'static str,
        actual: &'static str,
    },

    #[error("Template references unknown field '{field}'")]
    UnknownFieldReference { field: String },

    #[error("Field '{field}' is not a valid data URI")]
    InvalidMediaReference { field: String },

    #[error("Tool '{tool}' failed: {cause}")]
    ToolInvocation { tool: String, cause: String },

    #[error("Model invocation failed: {0}")]
    ModelInvocation(String),

    #[error("Model output did not match the expected schema: {0}")]
    OutputSchemaViolation(String),
}

impl FlowError {
    pub fn tool(tool: &str, cause: impl ToString) -> Self {
        FlowError::ToolInvocation {
            tool: tool.to_string(),
            cause: cause.to_string(),
        }
    }

    /// Whether the error is a defect in the caller-supplied input record, as
    /// opposed to a configuration bug or an external-boundary failure.
    pub fn is_input_defect(&self) -> bool {
        matches!(
            self,
            FlowError::MissingField { .. }
                | FlowError::TypeMismatch { .. }
                | FlowError::InvalidMediaReference { .. }
        )
    }
}
