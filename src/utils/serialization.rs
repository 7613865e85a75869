// Wire helpers: one JSON object per line, byte fields as standard base64.
use crate::error::{BlockchainError, Result};
use serde::de::DeserializeOwned;
use serde::Serialize;

/// Serialize a message as a single newline-terminated JSON frame
pub fn encode_frame<T: Serialize>(message: &T) -> Result<Vec<u8>> {
    let mut bytes = serde_json::to_vec(message)
        .map_err(|e| BlockchainError::Serialization(format!("Serialization failed: {e}")))?;
    bytes.push(b'\n');
    Ok(bytes)
}

/// Parse one received frame; surrounding whitespace (including the
/// terminating newline) is ignored
pub fn decode_frame<T: DeserializeOwned>(frame: &[u8]) -> Result<T> {
    serde_json::from_slice(frame.trim_ascii())
        .map_err(|e| BlockchainError::MalformedMessage(format!("Failed to parse frame: {e}")))
}

/// `#[serde(with = "base64_bytes")]` for `Vec<u8>` fields
pub mod base64_bytes {
    use data_encoding::BASE64;
    use serde::{Deserialize, Deserializer, Serializer};

    pub fn serialize<S: Serializer>(bytes: &[u8], serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_str(&BASE64.encode(bytes))
    }

    pub fn deserialize<'de, D: Deserializer<'de>>(deserializer: D) -> Result<Vec<u8>, D::Error> {
        let encoded = String::deserialize(deserializer)?;
        BASE64
            .decode(encoded.as_bytes())
            .map_err(serde::de::Error::custom)
    }
}

/// Accepts `null` wherever an empty collection is meant; peers that never
/// filled a map send it as `null`
pub fn null_as_default<'de, D, T>(deserializer: D) -> std::result::Result<T, D::Error>
where
    D: serde::Deserializer<'de>,
    T: Default + serde::Deserialize<'de>,
{
    use serde::Deserialize;
    Ok(Option::<T>::deserialize(deserializer)?.unwrap_or_default())
}
