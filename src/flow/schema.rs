use serde_json::{json, Map, Value};

use crate::flow::error::FlowError;

/// Primitive shape of a single field. Nested objects carry a full schema so
/// the same recursive checker covers every level.
#[derive(Debug, Clone)]
pub enum FieldKind {
    String,
    Boolean,
    Number,
    Array(Box<FieldKind>),
    Object(Schema),
}

impl FieldKind {
    pub fn name(&self) -> &'static str {
        match self {
            FieldKind::String => "string",
            FieldKind::Boolean => "boolean",
            FieldKind::Number => "number",
            FieldKind::Array(_) => "array",
            FieldKind::Object(_) => "object",
        }
    }
}

/// One declared field. The description is load-bearing: it is forwarded to
/// the model inside the response schema and is the only steering signal the
/// model gets about the intended content of the field.
#[derive(Debug, Clone)]
pub struct FieldDescriptor {
    pub name: String,
    pub kind: FieldKind,
    pub description: String,
    pub required: bool,
}

impl FieldDescriptor {
    fn new(name: &str, kind: FieldKind, description: &str) -> Self {
        FieldDescriptor {
            name: name.to_string(),
            kind,
            description: description.to_string(),
            required: true,
        }
    }

    pub fn string(name: &str, description: &str) -> Self {
        Self::new(name, FieldKind::String, description)
    }

    #[allow(dead_code)]
    pub fn boolean(name: &str, description: &str) -> Self {
        Self::new(name, FieldKind::Boolean, description)
    }

    #[allow(dead_code)]
    pub fn number(name: &str, description: &str) -> Self {
        Self::new(name, FieldKind::Number, description)
    }

    pub fn string_array(name: &str, description: &str) -> Self {
        Self::new(name, FieldKind::Array(Box::new(FieldKind::String)), description)
    }

    pub fn object(name: &str, schema: Schema, description: &str) -> Self {
        Self::new(name, FieldKind::Object(schema), description)
    }

    pub fn optional(mut self) -> Self {
        self.required = false;
        self
    }
}

/// Ordered record schema. Field order is preserved so rendered parameter
/// JSON and validation errors are stable.
#[derive(Debug, Clone)]
pub struct Schema {
    fields: Vec<FieldDescriptor>,
}

impl Schema {
    /// Builds a schema, rejecting duplicate field names and empty
    /// descriptions at every nesting level.
    pub fn define(fields: Vec<FieldDescriptor>) -> Result<Schema, FlowError> {
        check_fields(&fields, "")?;
        Ok(Schema { fields })
    }

    pub fn field(&self, name: &str) -> Option<&FieldDescriptor> {
        self.fields.iter().find(|field| field.name == name)
    }

    /// Validates a record against this schema. Valid input passes through
    /// unchanged: absent optional fields stay absent (never defaulted to
    /// null) and unknown extra fields are left untouched.
    pub fn validate(&self, value: &Value) -> Result<Value, FlowError> {
        validate_record(self, "", value)?;
        Ok(value.clone())
    }

    /// Renders the schema as an OpenAPI-style object, the shape Gemini
    /// accepts both as `responseSchema` and as tool `parameters`.
    pub fn to_parameters_json(&self) -> Value {
        let mut properties = Map::new();
        let mut required = Vec::new();
        for field in &self.fields {
            properties.insert(field.name.clone(), kind_to_json(&field.kind, &field.description));
            if field.required {
                required.push(Value::String(field.name.clone()));
            }
        }

        let mut object = Map::new();
        object.insert("type".to_string(), json!("object"));
        object.insert("properties".to_string(), Value::Object(properties));
        if !required.is_empty() {
            object.insert("required".to_string(), Value::Array(required));
        }
        Value::Object(object)
    }
}

fn check_fields(fields: &[FieldDescriptor], path: &str) -> Result<(), FlowError> {
    for (index, field) in fields.iter().enumerate() {
        let full_name = join_path(path, &field.name);
        if field.name.trim().is_empty() {
            return Err(FlowError::SchemaDefinition(format!(
                "field at position {} has an empty name",
                index
            )));
        }
        if field.description.trim().is_empty() {
            return Err(FlowError::SchemaDefinition(format!(
                "field '{}' has no description",
                full_name
            )));
        }
        if fields[..index].iter().any(|prior| prior.name == field.name) {
            return Err(FlowError::SchemaDefinition(format!(
                "duplicate field name '{}'",
                full_name
            )));
        }
        if let FieldKind::Object(nested) = &field.kind {
            check_fields(&nested.fields, &full_name)?;
        }
    }
    Ok(())
}

fn join_path(path: &str, name: &str) -> String {
    if path.is_empty() {
        name.to_string()
    } else {
        format!("{}.{}", path, name)
    }
}

fn json_type_name(value: &Value) -> &'static str {
    match value {
        Value::Null => "null",
        Value::Bool(_) => "boolean",
        Value::Number(_) => "number",
        Value::String(_) => "string",
        Value::Array(_) => "array",
        Value::Object(_) => "object",
    }
}

fn validate_record(schema: &Schema, path: &str, value: &Value) -> Result<(), FlowError> {
    let Some(object) = value.as_object() else {
        return Err(FlowError::TypeMismatch {
            field: if path.is_empty() { "<root>".to_string() } else { path.to_string() },
            expected: "object",
            actual: json_type_name(value),
        });
    };

    for field in &schema.fields {
        let full_name = join_path(path, &field.name);
        match object.get(&field.name) {
            Some(present) => validate_kind(&field.kind, &full_name, present)?,
            None if field.required => {
                return Err(FlowError::MissingField { field: full_name });
            }
            None => {}
        }
    }
    Ok(())
}

/// Single recursive type checker, shared by record validation and by tool
/// output validation (tool outputs may be bare scalars or arrays).
pub fn validate_kind(kind: &FieldKind, path: &str, value: &Value) -> Result<(), FlowError> {
    let mismatch = || FlowError::TypeMismatch {
        field: path.to_string(),
        expected: kind.name(),
        actual: json_type_name(value),
    };

    match kind {
        FieldKind::String => value.as_str().map(|_| ()).ok_or_else(mismatch),
        FieldKind::Boolean => value.as_bool().map(|_| ()).ok_or_else(mismatch),
        FieldKind::Number => value.as_f64().map(|_| ()).ok_or_else(mismatch),
        FieldKind::Array(element) => {
            let items = value.as_array().ok_or_else(mismatch)?;
            for (index, item) in items.iter().enumerate() {
                validate_kind(element, &format!("{}[{}]", path, index), item)?;
            }
            Ok(())
        }
        FieldKind::Object(nested) => validate_record(nested, path, value),
    }
}

fn kind_to_json(kind: &FieldKind, description: &str) -> Value {
    let mut rendered = match kind {
        FieldKind::String => json!({ "type": "string" }),
        FieldKind::Boolean => json!({ "type": "boolean" }),
        FieldKind::Number => json!({ "type": "number" }),
        FieldKind::Array(element) => json!({
            "type": "array",
            "items": kind_to_json(element, ""),
        }),
        FieldKind::Object(nested) => nested.to_parameters_json(),
    };
    if !description.is_empty() {
        if let Some(object) = rendered.as_object_mut() {
            object.insert("description".to_string(), json!(description));
        }
    }
    rendered
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sample_schema() -> Schema {
        Schema::define(vec![
            FieldDescriptor::string("topic", "The topic to explain."),
            FieldDescriptor::string("context", "Additional context for the topic.").optional(),
        ])
        .unwrap()
    }

    #[test]
    fn duplicate_field_names_are_rejected() {
        let result = Schema::define(vec![
            FieldDescriptor::string("topic", "The topic."),
            FieldDescriptor::string("topic", "The topic again."),
        ]);
        assert!(matches!(result, Err(FlowError::SchemaDefinition(_))));
    }

    #[test]
    fn empty_descriptions_are_rejected() {
        let result = Schema::define(vec![FieldDescriptor::string("topic", "  ")]);
        assert!(matches!(result, Err(FlowError::SchemaDefinition(_))));
    }

    #[test]
    fn nested_duplicate_names_are_rejected() {
        let nested = Schema {
            fields: vec![
                FieldDescriptor::string("brand", "Brand."),
                FieldDescriptor::string("brand", "Brand again."),
            ],
        };
        let result = Schema::define(vec![FieldDescriptor::object(
            "product",
            nested,
            "Product details.",
        )]);
        assert!(matches!(result, Err(FlowError::SchemaDefinition(_))));
    }

    #[test]
    fn valid_input_passes_through_unchanged() {
        let schema = sample_schema();
        let input = serde_json::json!({ "topic": "baking", "context": "" });
        let validated = schema.validate(&input).unwrap();
        assert_eq!(validated, input);
    }

    #[test]
    fn missing_required_field_names_the_field() {
        let schema = sample_schema();
        let err = schema.validate(&serde_json::json!({ "context": "x" })).unwrap_err();
        match err {
            FlowError::MissingField { field } => assert_eq!(field, "topic"),
            other => panic!("unexpected error: {other:?}"),
        }
    }

    #[test]
    fn wrong_kind_reports_expected_and_actual() {
        let schema = sample_schema();
        let err = schema.validate(&serde_json::json!({ "topic": 7 })).unwrap_err();
        match err {
            FlowError::TypeMismatch { field, expected, actual } => {
                assert_eq!(field, "topic");
                assert_eq!(expected, "string");
                assert_eq!(actual, "number");
            }
            other => panic!("unexpected error: {other:?}"),
        }
    }

    #[test]
    fn explicit_null_is_not_treated_as_absent() {
        let schema = sample_schema();
        let err = schema
            .validate(&serde_json::json!({ "topic": "baking", "context": null }))
            .unwrap_err();
        match err {
            FlowError::TypeMismatch { field, actual, .. } => {
                assert_eq!(field, "context");
                assert_eq!(actual, "null");
            }
            other => panic!("unexpected error: {other:?}"),
        }
    }

    #[test]
    fn omitted_optional_field_stays_absent() {
        let schema = sample_schema();
        let validated = schema.validate(&serde_json::json!({ "topic": "baking" })).unwrap();
        assert!(validated.get("context").is_none());

        let validated = schema
            .validate(&serde_json::json!({ "topic": "baking", "context": "" }))
            .unwrap();
        assert_eq!(validated.get("context"), Some(&serde_json::json!("")));
    }

    #[test]
    fn array_elements_are_checked_with_indexed_paths() {
        let schema = Schema::define(vec![FieldDescriptor::string_array(
            "pros",
            "Positive aspects.",
        )])
        .unwrap();
        let err = schema
            .validate(&serde_json::json!({ "pros": ["good", 3] }))
            .unwrap_err();
        match err {
            FlowError::TypeMismatch { field, .. } => assert_eq!(field, "pros[1]"),
            other => panic!("unexpected error: {other:?}"),
        }
    }

    #[test]
    fn nested_objects_validate_recursively() {
        let info = Schema::define(vec![
            FieldDescriptor::string("brand", "Brand name."),
            FieldDescriptor::string("ingredients", "Ingredient list.").optional(),
        ])
        .unwrap();
        let schema = Schema::define(vec![FieldDescriptor::object(
            "productInformation",
            info,
            "Product details.",
        )])
        .unwrap();

        let ok = serde_json::json!({ "productInformation": { "brand": "Acme" } });
        assert!(schema.validate(&ok).is_ok());

        let err = schema
            .validate(&serde_json::json!({ "productInformation": {} }))
            .unwrap_err();
        match err {
            FlowError::MissingField { field } => assert_eq!(field, "productInformation.brand"),
            other => panic!("unexpected error: {other:?}"),
        }
    }

    #[test]
    fn parameters_json_carries_descriptions_and_required() {
        let schema = sample_schema();
        let rendered = schema.to_parameters_json();
        assert_eq!(rendered["type"], "object");
        assert_eq!(rendered["properties"]["topic"]["type"], "string");
        assert_eq!(
            rendered["properties"]["topic"]["description"],
            "The topic to explain."
        );
        assert_eq!(rendered["required"], serde_json::json!(["topic"]));
    }
}
