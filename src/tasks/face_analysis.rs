use crate::flow::schema::{FieldDescriptor, Schema};
use crate::flow::template::PromptTemplate;
use crate::flow::{FlowError, TaskDefinition};

pub const FACE_ANALYSIS_TASK: &str = "face_analysis";

const PROMPT: &str = "You are a professional makeup artist. Analyze the provided image of a face \
to determine the face shape, skin tone, current makeup, eye color, and lip shape. Based on this \
analysis, provide personalized makeup routine recommendations.\n\n\
Image: {{media url=photoDataUri}}";

/// Analyzes a face photo and produces personalized makeup recommendations.
pub fn task() -> Result<TaskDefinition, FlowError> {
    Ok(TaskDefinition {
        name: FACE_ANALYSIS_TASK,
        input: Schema::define(vec![FieldDescriptor::string(
            "photoDataUri",
            "A photo of a face, as a data URI that must include a MIME type and use Base64 \
             encoding. Expected format: 'data:<mimetype>;base64,<encoded_data>'.",
        )])?,
        output: Schema::define(vec![
            FieldDescriptor::string("faceShape", "The shape of the face in the image."),
            FieldDescriptor::string("skinTone", "The skin tone of the face in the image."),
            FieldDescriptor::string(
                "currentMakeup",
                "A description of the makeup currently on the face in the image.",
            ),
            FieldDescriptor::string("eyeColor", "The eye color of the person in the image."),
            FieldDescriptor::string("lipShape", "The shape of the lips in the image."),
            FieldDescriptor::string(
                "recommendations",
                "Personalized makeup routine recommendations based on the analysis.",
            ),
        ])?,
        template: PromptTemplate::parse(PROMPT),
        tools: Vec::new(),
    })
}
