use base64::{engine::general_purpose, Engine as _};

/// Decoded media payload carried in an input field. The engine treats it as
/// an opaque attachment; only the model consumes the bytes.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MediaPayload {
    pub mime_type: String,
    pub data: Vec<u8>,
}

/// Parses a `data:<mimetype>;base64,<encoded_data>` URI. Returns None for
/// anything that does not match that shape exactly.
pub fn parse_data_uri(value: &str) -> Option<MediaPayload> {
    let rest = value.strip_prefix("data:")?;
    let (header, encoded) = rest.split_once(',')?;
    let mime_type = header.strip_suffix(";base64")?;
    if mime_type.is_empty() {
        return None;
    }
    let data = general_purpose::STANDARD.decode(encoded.trim()).ok()?;
    Some(MediaPayload {
        mime_type: mime_type.to_string(),
        data,
    })
}

pub fn encode_data_uri(mime_type: &str, data: &[u8]) -> String {
    format!(
        "data:{};base64,{}",
        mime_type,
        general_purpose::STANDARD.encode(data)
    )
}

/// Reads a file into a data URI, sniffing the MIME type from the bytes.
pub fn file_to_data_uri(path: &std::path::Path) -> anyhow::Result<String> {
    let bytes = std::fs::read(path)?;
    let mime_type = infer::get(&bytes)
        .map(|kind| kind.mime_type().to_string())
        .unwrap_or_else(|| "application/octet-stream".to_string());
    Ok(encode_data_uri(&mime_type, &bytes))
}
