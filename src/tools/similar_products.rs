use serde_json::Value;

use crate::flow::schema::{FieldDescriptor, FieldKind, Schema};
use crate::flow::tool::{ToolDefinition, ToolFuture};
use crate::flow::FlowError;

pub const FIND_SIMILAR_PRODUCTS_TOOL: &str = "find_similar_products";

// Small built-in catalog keyed by use case. A real deployment would back
// this with a product database; the lookup stays total either way.
const CATALOG: &[(&str, &[&str])] = &[
    (
        "foundation",
        &[
            "Maybelline Fit Me Matte + Poreless Foundation",
            "L'Oreal True Match Super-Blendable Foundation",
            "Fenty Beauty Pro Filt'r Soft Matte Foundation",
        ],
    ),
    (
        "mascara",
        &[
            "Maybelline Lash Sensational Mascara",
            "L'Oreal Voluminous Original Mascara",
            "Essence Lash Princess False Lash Effect Mascara",
        ],
    ),
    (
        "lipstick",
        &[
            "MAC Retro Matte Lipstick",
            "Maybelline SuperStay Matte Ink",
            "NYX Soft Matte Lip Cream",
        ],
    ),
    (
        "blush",
        &[
            "Milani Baked Blush",
            "NARS Blush",
            "Rare Beauty Soft Pinch Liquid Blush",
        ],
    ),
    (
        "eyeshadow",
        &[
            "Urban Decay Naked Palette",
            "ColourPop Super Shock Shadow",
            "Natasha Denona Mini Palette",
        ],
    ),
];

pub fn definition() -> Result<ToolDefinition, FlowError> {
    Ok(ToolDefinition {
        name: FIND_SIMILAR_PRODUCTS_TOOL,
        description: "Finds similar makeup products based on brand, type and other information.",
        input: Schema::define(vec![
            FieldDescriptor::string("brand", "The brand of the makeup product."),
            FieldDescriptor::string("productName", "The name of the makeup product."),
            FieldDescriptor::string("useCase", "The primary use case of the makeup product."),
        ])?,
        output: FieldKind::Array(Box::new(FieldKind::String)),
        output_description: "A list of similar makeup products.",
        handler: run,
    })
}

fn run(args: Value) -> ToolFuture {
    Box::pin(async move {
        let brand = args
            .get("brand")
            .and_then(|value| value.as_str())
            .unwrap_or_default();
        let product_name = args
            .get("productName")
            .and_then(|value| value.as_str())
            .unwrap_or_default();
        let use_case = args
            .get("useCase")
            .and_then(|value| value.as_str())
            .unwrap_or_default();
        Ok(find_similar(brand, product_name, use_case))
    })
}

fn find_similar(brand: &str, product_name: &str, use_case: &str) -> Value {
    let lowered = use_case.to_lowercase();
    let matches = CATALOG
        .iter()
        .find(|(key, _)| lowered.contains(key))
        .map(|(_, products)| *products);

    let suggestions: Vec<Value> = match matches {
        Some(products) => products
            .iter()
            // Avoid recommending the product back to itself.
            .filter(|candidate| {
                product_name.is_empty()
                    || !candidate.to_lowercase().contains(&product_name.to_lowercase())
            })
            .map(|candidate| Value::String(candidate.to_string()))
            .collect(),
        None => vec![
            Value::String(format!(
                "Products comparable to {} from {}",
                product_name, brand
            )),
            Value::String(format!("Alternatives to {} in the same category", product_name)),
        ],
    };

    Value::Array(suggestions)
}
