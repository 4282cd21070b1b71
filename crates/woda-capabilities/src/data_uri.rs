//! Decoding binary payloads sent from script.
//!
//! Script hands binary data over as `scheme:[mediatype][;base64],<data>`
//! data URIs, as bare base64, or as plain text.

use base64::Engine as _;
use woda_common::CapabilityError;

/// How a payload was interpreted.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PayloadEncoding {
    DataUri,
    Base64,
    Text,
}

/// A parsed data URI borrowing from its input.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct DataUri<'a> {
    pub media_type: &'a str,
    pub base64: bool,
    pub data: &'a str,
}

impl<'a> DataUri<'a> {
    /// Parse `input` as a data URI. The header (everything before the first
    /// comma) must carry a scheme and either be a `data:` header or end in
    /// `;base64`. A bare `scheme:` with no comma is an empty payload; that is
    /// what `FileReader.readAsDataURL` yields for an empty file.
    pub fn parse(input: &'a str) -> Option<Self> {
        let (header, data) = match input.split_once(',') {
            Some(parts) => parts,
            None if input.ends_with(':') => (input, ""),
            None => return None,
        };
        let (scheme, rest) = header.split_once(':')?;
        if scheme.is_empty() || header.chars().any(char::is_whitespace) {
            return None;
        }
        if rest.is_empty() && data.is_empty() {
            return Some(Self {
                media_type: "",
                base64: false,
                data,
            });
        }

        let base64 = rest.to_ascii_lowercase().ends_with(";base64");
        if !base64 && !scheme.eq_ignore_ascii_case("data") {
            return None;
        }

        let media_type = if base64 {
            &rest[..rest.len() - ";base64".len()]
        } else {
            rest
        };

        Some(Self {
            media_type,
            base64,
            data,
        })
    }

    pub fn decode(&self) -> Result<Vec<u8>, CapabilityError> {
        if self.base64 {
            decode_base64(self.data)
        } else {
            Ok(self.data.as_bytes().to_vec())
        }
    }
}

/// Standard base64, ignoring embedded whitespace and line breaks.
pub fn decode_base64(data: &str) -> Result<Vec<u8>, CapabilityError> {
    let compact: String = data.chars().filter(|c| !c.is_whitespace()).collect();
    base64::engine::general_purpose::STANDARD
        .decode(compact.as_bytes())
        .map_err(|e| CapabilityError::Decode(format!("invalid base64: {e}")))
}

/// Shape check only: alphabet, padding position and length.
pub fn looks_like_base64(data: &str) -> bool {
    let compact: Vec<u8> = data.bytes().filter(|b| !b.is_ascii_whitespace()).collect();
    if compact.is_empty() || compact.len() % 4 != 0 {
        return false;
    }
    let body_len = compact.iter().rposition(|&b| b != b'=').map_or(0, |i| i + 1);
    if compact.len() - body_len > 2 {
        return false;
    }
    compact[..body_len]
        .iter()
        .all(|&b| b.is_ascii_alphanumeric() || b == b'+' || b == b'/')
}

/// Interpret dropped-file content: data URI first, then bare base64, then
/// plain text. A malformed data URI is an error; base64 that fails to
/// decode falls through to text.
pub fn decode_payload(content: &str) -> Result<(Vec<u8>, PayloadEncoding), CapabilityError> {
    if let Some(uri) = DataUri::parse(content) {
        return Ok((uri.decode()?, PayloadEncoding::DataUri));
    }
    if looks_like_base64(content) {
        if let Ok(bytes) = decode_base64(content) {
            return Ok((bytes, PayloadEncoding::Base64));
        }
    }
    Ok((content.as_bytes().to_vec(), PayloadEncoding::Text))
}
