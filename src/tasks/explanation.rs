use crate::flow::schema::{FieldDescriptor, Schema};
use crate::flow::template::PromptTemplate;
use crate::flow::{FlowError, TaskDefinition};
use crate::tools::youtube_search;

pub const EXPLANATION_TASK: &str = "explanation";

const PROMPT: &str = "You are a helpful assistant that provides educational explanations about \
makeup.\n\n\
Topic: {{{topic}}}\n\
Context: {{{context}}}\n\n\
Provide a detailed explanation of the topic, including ingredient information, brand background, \
technique definitions, and tutorial suggestions when relevant. When a video tutorial would help, \
use the search_youtube tool to find one and include its link.\n\
Make sure to include the most important and relevant information to the user's needs, to help \
the user make informed choices.";

/// Provides educational explanations about makeup products, techniques, or
/// routine steps. The context field is optional on purpose: omitting it and
/// passing an empty string mean different things to the model.
pub fn task() -> Result<TaskDefinition, FlowError> {
    Ok(TaskDefinition {
        name: EXPLANATION_TASK,
        input: Schema::define(vec![
            FieldDescriptor::string(
                "topic",
                "The topic for which an explanation is needed (e.g., product name, technique, \
                 routine step).",
            ),
            FieldDescriptor::string(
                "context",
                "Additional context or user question related to the topic.",
            )
            .optional(),
        ])?,
        output: Schema::define(vec![FieldDescriptor::string(
            "explanation",
            "A detailed explanation of the topic, including ingredient information, brand \
             background, technique definitions, and tutorial suggestions.",
        )])?,
        template: PromptTemplate::parse(PROMPT),
        tools: vec![youtube_search::definition()?],
    })
}
