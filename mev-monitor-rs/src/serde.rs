//! Helpers for the beacon API convention of quoting integers in JSON.

use serde::{de, Deserialize, Deserializer};

#[derive(Deserialize)]
#[serde(untagged)]
enum StringOrNumber {
    String(String),
    Number(u64),
}

/// Accepts `"123"` or `123`.
pub mod as_str {
    use super::*;

    pub fn deserialize<'de, D>(deserializer: D) -> Result<u64, D::Error>
    where
        D: Deserializer<'de>,
    {
        match StringOrNumber::deserialize(deserializer)? {
            StringOrNumber::String(value) => value.trim().parse().map_err(de::Error::custom),
            StringOrNumber::Number(value) => Ok(value),
        }
    }
}

/// Accepts `"123"` or `123` and keeps the decimal string form.
pub mod as_string {
    use super::*;

    pub fn deserialize<'de, D>(deserializer: D) -> Result<String, D::Error>
    where
        D: Deserializer<'de>,
    {
        match StringOrNumber::deserialize(deserializer)? {
            StringOrNumber::String(value) => Ok(value),
            StringOrNumber::Number(value) => Ok(value.to_string()),
        }
    }
}
