use crate::flow::schema::{FieldDescriptor, Schema};
use crate::flow::template::PromptTemplate;
use crate::flow::{FlowError, TaskDefinition};

pub const LOOK_ITERATION_TASK: &str = "look_iteration";

const PROMPT: &str = "You are an expert makeup artist who refines makeup looks based on user \
feedback.\n\n\
You are given a description of the original makeup look and the user's feedback prompt.\n\
Your goal is to create a refined makeup look that incorporates the feedback while maintaining \
the user's preferences.\n\n\
Original Look: {{{originalLook}}}\n\
Feedback Prompt: {{{feedbackPrompt}}}\n\n\
Based on the feedback, please provide a description of the refined makeup look, including \
specific product recommendations (if possible) and application techniques. Also, explain the \
reasoning behind the changes you made to the original look.";

/// Refines a described makeup look according to free-form user feedback.
pub fn task() -> Result<TaskDefinition, FlowError> {
    Ok(TaskDefinition {
        name: LOOK_ITERATION_TASK,
        input: Schema::define(vec![
            FieldDescriptor::string(
                "originalLook",
                "Description of the original makeup look, including products used and \
                 application techniques.",
            ),
            FieldDescriptor::string(
                "feedbackPrompt",
                "User's feedback prompt, e.g., 'show another', 'simpler', 'different vibe'.",
            ),
        ])?,
        output: Schema::define(vec![
            FieldDescriptor::string(
                "refinedLook",
                "Description of the refined makeup look based on the user's feedback.",
            ),
            FieldDescriptor::string(
                "reasoning",
                "Explanation of the changes made to the original look based on the feedback.",
            ),
        ])?,
        template: PromptTemplate::parse(PROMPT),
        tools: Vec::new(),
    })
}
