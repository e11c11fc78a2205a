use once_cell::sync::Lazy;
use regex::Regex;
use serde_json::Value;

use crate::flow::error::FlowError;
use crate::flow::schema::{FieldKind, Schema};
use crate::utils::data_uri::parse_data_uri;

/// One piece of a rendered prompt. Media parts are opaque attachments for
/// the model invocation layer, never inlined as text.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PromptPart {
    Text(String),
    Inline { mime_type: String, data: Vec<u8> },
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Prompt {
    pub parts: Vec<PromptPart>,
}

impl Prompt {
    pub fn text_len(&self) -> usize {
        self.parts
            .iter()
            .map(|part| match part {
                PromptPart::Text(text) => text.chars().count(),
                PromptPart::Inline { .. } => 0,
            })
            .sum()
    }

    pub fn inline_count(&self) -> usize {
        self.parts
            .iter()
            .filter(|part| matches!(part, PromptPart::Inline { .. }))
            .count()
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
enum Segment {
    Literal(String),
    Field(String),
    Media(String),
}

// `{{media url=photo}}` attaches the field as media; `{{{field}}}`
// substitutes its textual value.
static REFERENCE: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"\{\{media url=([A-Za-z_][A-Za-z0-9_]*)\}\}|\{\{\{([A-Za-z_][A-Za-z0-9_]*)\}\}\}")
        .expect("template reference pattern is valid")
});

/// A prompt template, parsed once into an ordered sequence of literal text
/// and field references.
#[derive(Debug, Clone)]
pub struct PromptTemplate {
    segments: Vec<Segment>,
}

impl PromptTemplate {
    pub fn parse(template: &str) -> Self {
        let mut segments = Vec::new();
        let mut cursor = 0;
        for captures in REFERENCE.captures_iter(template) {
            let matched = captures.get(0).expect("capture 0 always present");
            if matched.start() > cursor {
                segments.push(Segment::Literal(template[cursor..matched.start()].to_string()));
            }
            if let Some(media) = captures.get(1) {
                segments.push(Segment::Media(media.as_str().to_string()));
            } else if let Some(field) = captures.get(2) {
                segments.push(Segment::Field(field.as_str().to_string()));
            }
            cursor = matched.end();
        }
        if cursor < template.len() {
            segments.push(Segment::Literal(template[cursor..].to_string()));
        }
        PromptTemplate { segments }
    }

    /// Checks every field reference against the input schema. Run eagerly at
    /// task registration so a mismatched template can never reach a call.
    pub fn check(&self, schema: &Schema) -> Result<(), FlowError> {
        for segment in &self.segments {
            match segment {
                Segment::Literal(_) => {}
                Segment::Field(name) => {
                    if schema.field(name).is_none() {
                        return Err(FlowError::UnknownFieldReference { field: name.clone() });
                    }
                }
                Segment::Media(name) => {
                    let Some(descriptor) = schema.field(name) else {
                        return Err(FlowError::UnknownFieldReference { field: name.clone() });
                    };
                    // Media references carry data URIs, which are strings.
                    if !matches!(descriptor.kind, FieldKind::String) {
                        return Err(FlowError::UnknownFieldReference { field: name.clone() });
                    }
                }
            }
        }
        Ok(())
    }

    /// Binds a validated input record into a prompt. Absent optional fields
    /// render as empty text; adjacent text coalesces into a single part.
    pub fn render(&self, input: &Value) -> Result<Prompt, FlowError> {
        let mut parts: Vec<PromptPart> = Vec::new();
        let mut push_text = |parts: &mut Vec<PromptPart>, text: &str| {
            if text.is_empty() {
                return;
            }
            if let Some(PromptPart::Text(existing)) = parts.last_mut() {
                existing.push_str(text);
            } else {
                parts.push(PromptPart::Text(text.to_string()));
            }
        };

        for segment in &self.segments {
            match segment {
                Segment::Literal(text) => push_text(&mut parts, text),
                Segment::Field(name) => {
                    let rendered = match input.get(name) {
                        None | Some(Value::Null) => String::new(),
                        Some(Value::String(text)) => text.clone(),
                        Some(other) => other.to_string(),
                    };
                    push_text(&mut parts, &rendered);
                }
                Segment::Media(name) => {
                    let raw = input.get(name).and_then(|value| value.as_str()).unwrap_or("");
                    let payload = parse_data_uri(raw).ok_or_else(|| {
                        FlowError::InvalidMediaReference { field: name.clone() }
                    })?;
                    parts.push(PromptPart::Inline {
                        mime_type: payload.mime_type,
                        data: payload.data,
                    });
                }
            }
        }

        Ok(Prompt { parts })
    }
}
