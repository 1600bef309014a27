//! Binary codec backed by `bincode`. Byte-exact across identical builds
//! only — never claimed to be cross-version stable.

use serde::{de::DeserializeOwned, Serialize};

use crate::error::WireError;

pub fn to_bytes<T: Serialize>(value: &T) -> Result<Vec<u8>, WireError> {
    bincode::serialize(value).map_err(|e| WireError::Serialize(e.to_string()))
}

pub fn from_bytes<T: DeserializeOwned>(bytes: &[u8]) -> Result<T, WireError> {
    bincode::deserialize(bytes).map_err(|e| WireError::Serialize(e.to_string()))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_round_trip_vec() {
        let original = vec![1u32, 2, 3];
        let bytes = to_bytes(&original).unwrap();
        let back: Vec<u32> = from_bytes(&bytes).unwrap();
        assert_eq!(original, back);
    }
}
