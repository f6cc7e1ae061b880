use serde::{de::DeserializeOwned, Serialize};

use crate::protocol::InitializationError;

/// Encode an arbitrary serializable value into a vec.
pub fn encode<T: Serialize + ?Sized>(val: &T) -> Result<Vec<u8>, InitializationError> {
    rmp_serde::encode::to_vec(val).map_err(|e| InitializationError::BadEncoding(e.to_string()))
}

/// Decode a value produced by [encode].
pub fn decode<T: DeserializeOwned>(bytes: &[u8]) -> Result<T, InitializationError> {
    rmp_serde::decode::from_slice(bytes).map_err(|e| InitializationError::BadEncoding(e.to_string()))
}
