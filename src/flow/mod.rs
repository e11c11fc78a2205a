pub mod error;
pub mod executor;
pub mod model;
pub mod schema;
pub mod template;
pub mod tool;

pub use error::FlowError;
pub use executor::run_flow;
pub use model::{FlowMessage, GenerateRequest, ModelClient, ModelReply, ToolCall, ToolResult};
pub use schema::{FieldDescriptor, FieldKind, Schema};
pub use template::{Prompt, PromptPart, PromptTemplate};
pub use tool::ToolDefinition;

/// A named, statically configured flow: schema pair, prompt template and
/// optional tool set. Adding a task never touches the executor.
#[derive(Debug, Clone)]
pub struct TaskDefinition {
    pub name: &'static str,
    pub input: Schema,
    pub output: Schema,
    pub template: PromptTemplate,
    pub tools: Vec<ToolDefinition>,
}

impl TaskDefinition {
    pub fn tool(&self, name: &str) -> Option<&ToolDefinition> {
        self.tools.iter().find(|tool| tool.name == name)
    }
}

/// Registry of task definitions, built once during process setup and passed
/// by reference to callers. Registration is the fail-fast point: a template
/// that references a field missing from its input schema is rejected here,
/// before any call using the task can run.
#[derive(Debug, Default)]
pub struct FlowRegistry {
    tasks: Vec<TaskDefinition>,
}

impl FlowRegistry {
    pub fn new() -> Self {
        FlowRegistry { tasks: Vec::new() }
    }

    pub fn register(&mut self, task: TaskDefinition) -> Result<(), FlowError> {
        if self.tasks.iter().any(|existing| existing.name == task.name) {
            return Err(FlowError::SchemaDefinition(format!(
                "task '{}' is already registered",
                task.name
            )));
        }
        task.template.check(&task.input)?;
        for (index, tool) in task.tools.iter().enumerate() {
            if task.tools[..index].iter().any(|prior| prior.name == tool.name) {
                return Err(FlowError::SchemaDefinition(format!(
                    "task '{}' declares tool '{}' twice",
                    task.name, tool.name
                )));
            }
        }
        self.tasks.push(task);
        Ok(())
    }

    pub fn get(&self, name: &str) -> Option<&TaskDefinition> {
        self.tasks.iter().find(|task| task.name == name)
    }

    pub fn task_names(&self) -> Vec<&'static str> {
        self.tasks.iter().map(|task| task.name).collect()
    }
}
