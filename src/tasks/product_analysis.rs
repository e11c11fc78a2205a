use crate::flow::schema::{FieldDescriptor, Schema};
use crate::flow::template::PromptTemplate;
use crate::flow::{FlowError, TaskDefinition};

pub const PRODUCT_ANALYSIS_TASK: &str = "product_analysis";

const PROMPT: &str = "You are an expert product analyst. Your task is to identify the product in \
the provided image and conduct a thorough analysis.\n\n\
Based on the image, please provide the following information:\n\
1. Product Identification: What is the full name of the product and who is the manufacturer?\n\
2. Summary: Briefly describe the product's primary function.\n\
3. Pros: List a few key benefits or positive aspects.\n\
4. Cons: List a few key drawbacks or negative aspects.\n\
5. Company Analysis: Provide a comprehensive and neutral analysis of the manufacturing company. \
Research and include details about their reputation, any known ethical concerns (e.g., animal \
testing, environmental impact, labor practices), political ties if significant and public, or \
major positive contributions and initiatives. The goal is to give the user a well-rounded \
understanding of the company behind the product.\n\n\
Image: {{media url=photoDataUri}}";

/// General product review from a photo: identification, pros/cons and a
/// background analysis of the manufacturer.
pub fn task() -> Result<TaskDefinition, FlowError> {
    Ok(TaskDefinition {
        name: PRODUCT_ANALYSIS_TASK,
        input: Schema::define(vec![FieldDescriptor::string(
            "photoDataUri",
            "A photo of a product, as a data URI that must include a MIME type and use Base64 \
             encoding. Expected format: 'data:<mimetype>;base64,<encoded_data>'.",
        )])?,
        output: Schema::define(vec![
            FieldDescriptor::string("productName", "The identified name of the product."),
            FieldDescriptor::string(
                "manufacturer",
                "The name of the company that manufactures the product.",
            ),
            FieldDescriptor::string(
                "summary",
                "A brief, neutral summary of what the product is and what it does.",
            ),
            FieldDescriptor::string_array(
                "pros",
                "A list of potential positive aspects or benefits of the product.",
            ),
            FieldDescriptor::string_array(
                "cons",
                "A list of potential negative aspects or drawbacks of the product.",
            ),
            FieldDescriptor::string(
                "companyAnalysis",
                "An analysis of the manufacturing company, including information on public \
                 perception, ethical practices (like animal testing, labor practices), or any \
                 notable controversies or positive contributions. This should be a balanced \
                 overview based on publicly available information.",
            ),
        ])?,
        template: PromptTemplate::parse(PROMPT),
        tools: Vec::new(),
    })
}
