use crate::flow::schema::{FieldDescriptor, Schema};
use crate::flow::template::PromptTemplate;
use crate::flow::{FlowError, TaskDefinition};
use crate::tools::similar_products;

pub const PRODUCT_RECOGNITION_TASK: &str = "product_recognition";

const PROMPT: &str = "You are an AI makeup assistant. You will identify a makeup product from an \
image and provide information about it.\n\n\
Analyze the following makeup product and provide details such as brand, product name, use case, \
and usage guidance. Also, find similar products using the find_similar_products tool.\n\n\
Product Image: {{media url=productPhotoDataUri}}";

/// Identifies a makeup product from a photo; the model may call the
/// similar-products tool mid-generation.
pub fn task() -> Result<TaskDefinition, FlowError> {
    let product_information = Schema::define(vec![
        FieldDescriptor::string("brand", "The brand of the makeup product."),
        FieldDescriptor::string("productName", "The name of the makeup product."),
        FieldDescriptor::string("useCase", "The primary use case of the makeup product."),
        FieldDescriptor::string(
            "usageGuidance",
            "Instructions on how to use the product effectively.",
        ),
        FieldDescriptor::string(
            "ingredients",
            "A list of ingredients in the product, if available.",
        )
        .optional(),
    ])?;

    Ok(TaskDefinition {
        name: PRODUCT_RECOGNITION_TASK,
        input: Schema::define(vec![FieldDescriptor::string(
            "productPhotoDataUri",
            "A photo of the makeup product, as a data URI that must include a MIME type and use \
             Base64 encoding. Expected format: 'data:<mimetype>;base64,<encoded_data>'.",
        )])?,
        output: Schema::define(vec![
            FieldDescriptor::object(
                "productInformation",
                product_information,
                "Detailed information about the makeup product.",
            ),
            FieldDescriptor::string_array("similarProducts", "A list of similar makeup products."),
            FieldDescriptor::string_array(
                "trustedArticles",
                "Links to trusted articles or reviews about the product.",
            ),
        ])?,
        template: PromptTemplate::parse(PROMPT),
        tools: vec![similar_products::definition()?],
    })
}
