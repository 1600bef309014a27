//! XML codec backed by `quick-xml`'s serde integration.

use serde::{de::DeserializeOwned, Serialize};

use crate::error::WireError;

pub fn to_bytes<T: Serialize>(value: &T) -> Result<Vec<u8>, WireError> {
    quick_xml::se::to_string(value)
        .map(|s| s.into_bytes())
        .map_err(|e| WireError::Serialize(e.to_string()))
}

pub fn from_bytes<T: DeserializeOwned>(bytes: &[u8]) -> Result<T, WireError> {
    let s = std::str::from_utf8(bytes).map_err(|e| WireError::Serialize(e.to_string()))?;
    quick_xml::de::from_str(s).map_err(|e| WireError::Serialize(e.to_string()))
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde::Deserialize;

    #[derive(Debug, PartialEq, Serialize, Deserialize)]
    struct Point {
        x: i32,
        y: i32,
    }

    #[test]
    fn test_round_trip_struct() {
        let original = Point { x: 1, y: -2 };
        let bytes = to_bytes(&original).unwrap();
        let back: Point = from_bytes(&bytes).unwrap();
        assert_eq!(original, back);
    }
}
