//! The datastore stores arbitrary-precision numerics as canonical decimal strings, while [`U256`]
//! serializes as hex by default. This helper (de)serializes through the decimal
//! [`Display`](std::fmt::Display)/[`FromStr`](std::str::FromStr) implementations instead, which
//! also normalizes any parseable input back to canonical decimal on the way out.

use alloy::primitives::U256;
use serde::{Deserialize, Deserializer, Serializer, de::Error};

/// Serializes a [`U256`] as a canonical decimal string.
pub fn serialize<S>(value: &U256, serializer: S) -> Result<S::Ok, S::Error>
where
    S: Serializer,
{
    serializer.collect_str(value)
}

/// Deserializes a [`U256`] from a decimal string.
pub fn deserialize<'de, D>(deserializer: D) -> Result<U256, D::Error>
where
    D: Deserializer<'de>,
{
    let raw = String::deserialize(deserializer)?;
    raw.parse::<U256>().map_err(D::Error::custom)
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde::Serialize;

    #[derive(Debug, PartialEq, Serialize, Deserialize)]
    struct Wrapper(#[serde(with = "super")] U256);

    #[test]
    fn round_trips_canonical_decimal() {
        let value = Wrapper(U256::from(1_000_000_000_000_000_000u128));
        let encoded = serde_json::to_string(&value).unwrap();
        assert_eq!(encoded, "\"1000000000000000000\"");
        assert_eq!(serde_json::from_str::<Wrapper>(&encoded).unwrap(), value);
    }

    #[test]
    fn rejects_garbage() {
        assert!(serde_json::from_str::<Wrapper>("\"12abc\"").is_err());
    }
}
