use base64::Engine;
use base64::engine::general_purpose::STANDARD;
use sha2::{Digest, Sha256};

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum DataUriError {
    #[error("missing 'data:' scheme")]
    MissingScheme,
    #[error("missing ',' separator")]
    MissingSeparator,
    #[error("payload is not base64-encoded")]
    NotBase64,
    #[error("media type '{0}' is not an image")]
    NotAnImage(String),
    #[error("payload is empty")]
    EmptyPayload,
    #[error("payload is not valid base64: {0}")]
    InvalidBase64(String),
}

/// A `data:<media type>;base64,<payload>` image, validated on construction.
#[derive(Clone, PartialEq, Eq)]
pub struct DataUri {
    media_type: String,
    data: String,
    decoded_len: usize,
}

impl DataUri {
    pub fn parse(input: &str) -> Result<Self, DataUriError> {
        let rest = input
            .trim()
            .strip_prefix("data:")
            .ok_or(DataUriError::MissingScheme)?;
        let (header, data) = rest.split_once(',').ok_or(DataUriError::MissingSeparator)?;

        let mut params = header.split(';');
        let media_type = params.next().unwrap_or_default().trim().to_ascii_lowercase();
        if !params.any(|p| p.trim().eq_ignore_ascii_case("base64")) {
            return Err(DataUriError::NotBase64);
        }
        if !media_type.starts_with("image/") || media_type.len() == "image/".len() {
            return Err(DataUriError::NotAnImage(media_type));
        }
        if data.is_empty() {
            return Err(DataUriError::EmptyPayload);
        }

        let decoded = STANDARD
            .decode(data)
            .map_err(|e| DataUriError::InvalidBase64(e.to_string()))?;
        if decoded.is_empty() {
            return Err(DataUriError::EmptyPayload);
        }

        Ok(Self {
            media_type,
            data: data.to_string(),
            decoded_len: decoded.len(),
        })
    }

    /// Encodes raw image bytes, e.g. from a multipart file part.
    pub fn from_bytes(media_type: &str, bytes: &[u8]) -> Result<Self, DataUriError> {
        let media_type = media_type.trim().to_ascii_lowercase();
        if !media_type.starts_with("image/") {
            return Err(DataUriError::NotAnImage(media_type));
        }
        if bytes.is_empty() {
            return Err(DataUriError::EmptyPayload);
        }
        Ok(Self {
            media_type,
            data: STANDARD.encode(bytes),
            decoded_len: bytes.len(),
        })
    }

    pub fn media_type(&self) -> &str {
        &self.media_type
    }

    pub fn base64_data(&self) -> &str {
        &self.data
    }

    pub fn decoded_len(&self) -> usize {
        self.decoded_len
    }

    /// Short SHA-256 prefix of the payload, for logs.
    pub fn fingerprint(&self) -> String {
        let mut hasher = Sha256::new();
        hasher.update(self.data.as_bytes());
        hex::encode(&hasher.finalize()[..8])
    }
}

impl std::fmt::Display for DataUri {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "data:{};base64,{}", self.media_type, self.data)
    }
}

// Payloads run to megabytes; keep them out of debug output.
impl std::fmt::Debug for DataUri {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("DataUri")
            .field("media_type", &self.media_type)
            .field("bytes", &self.decoded_len)
            .finish()
    }
}
