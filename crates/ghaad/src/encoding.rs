//! Base64 transport encoding shared by the provider adapters.

use base64::Engine;

use crate::adapter::AdapterError;

/// Encode UTF-8 text for a provider write.
pub fn encode_content(content: &str) -> String {
    base64::engine::general_purpose::STANDARD.encode(content.as_bytes())
}

/// Decode a provider's base64 payload into UTF-8 text.
pub fn decode_content(encoded: &str) -> Result<String, AdapterError> {
    // Providers wrap base64 at 60/76 columns
    let cleaned: String = encoded.chars().filter(|c| !c.is_whitespace()).collect();

    let bytes = base64::engine::general_purpose::STANDARD
        .decode(&cleaned)
        .map_err(|e| AdapterError::Parse(format!("base64 decode failed: {e}")))?;

    String::from_utf8(bytes).map_err(|e| AdapterError::Parse(format!("invalid UTF-8: {e}")))
}
