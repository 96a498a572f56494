use serde::{Deserialize, Serialize, de::DeserializeOwned};
use std::fmt;
use std::str::FromStr;
use thiserror::Error;

#[derive(Error, Debug)]
pub enum SerializationError {
    #[error("Unsupported format: {0}")]
    UnsupportedFormat(String),

    #[error("JSON error: {0}")]
    JsonError(#[from] serde_json::Error),

    #[error("Msgpack error: {0}")]
    MsgpackError(#[from] rmp_serde::encode::Error),

    #[error("Msgpack decode error: {0}")]
    MsgpackDecodeError(#[from] rmp_serde::decode::Error),
}

/// Encoding used for reply payloads
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Codec {
    #[default]
    Json,
    Msgpack,
}

impl Codec {
    /// Data serialization
    ///
    /// Msgpack encodes structs as maps so that field names survive the boundary.
    pub fn encode<T: Serialize + ?Sized>(&self, data: &T) -> Result<Vec<u8>, SerializationError> {
        match self {
            Codec::Msgpack => {
                let mut buf = Vec::new();
                data.serialize(&mut rmp_serde::Serializer::new(&mut buf).with_struct_map())?;
                Ok(buf)
            }
            Codec::Json => Ok(serde_json::to_vec(data)?),
        }
    }

    /// Deserialization of data
    pub fn decode<T: DeserializeOwned>(&self, data: &[u8]) -> Result<T, SerializationError> {
        match self {
            Codec::Msgpack => Ok(rmp_serde::from_slice(data)?),
            Codec::Json => Ok(serde_json::from_slice(data)?),
        }
    }
}

impl FromStr for Codec {
    type Err = SerializationError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "json" => Ok(Codec::Json),
            "msgpack" => Ok(Codec::Msgpack),
            other => Err(SerializationError::UnsupportedFormat(other.to_string())),
        }
    }
}

impl fmt::Display for Codec {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            Codec::Json => "json",
            Codec::Msgpack => "msgpack",
        };
        write!(f, "{}", s)
    }
}
