//! Size limits enforced by stores on keys, values and node names.

use serde::{Deserialize, Serialize};

use crate::error::{Error, Result};

pub const MAX_KEY_LENGTH: usize = 80;
pub const MAX_VALUE_LENGTH: usize = 8 * 1024;
pub const MAX_NAME_LENGTH: usize = 80;

/// Lengths are counted in chars, not bytes.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct Limits {
    pub max_key_length: usize,
    pub max_value_length: usize,
    pub max_name_length: usize,
}

impl Default for Limits {
    fn default() -> Self {
        Self {
            max_key_length: MAX_KEY_LENGTH,
            max_value_length: MAX_VALUE_LENGTH,
            max_name_length: MAX_NAME_LENGTH,
        }
    }
}

impl Limits {
    pub fn check_key(&self, key: &str) -> Result<()> {
        if key.is_empty() {
            return Err(Error::validation("key must not be empty"));
        }
        let len = key.chars().count();
        if len > self.max_key_length {
            return Err(Error::validation(format!(
                "key is {} characters long (limit {})",
                len, self.max_key_length
            )));
        }
        Ok(())
    }

    /// Checked against the raw text form, so byte sequences count their base64 length.
    pub fn check_value(&self, raw_text: &str) -> Result<()> {
        let len = raw_text.chars().count();
        if len > self.max_value_length {
            return Err(Error::validation(format!(
                "value is {} characters long (limit {})",
                len, self.max_value_length
            )));
        }
        Ok(())
    }

    pub fn check_name(&self, name: &str) -> Result<()> {
        let len = name.chars().count();
        if len > self.max_name_length {
            return Err(Error::validation(format!(
                "node name '{}' is {} characters long (limit {})",
                name, len, self.max_name_length
            )));
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_match_constants() {
        let limits = Limits::default();
        assert_eq!(limits.max_key_length, 80);
        assert_eq!(limits.max_value_length, 8192);
        assert_eq!(limits.max_name_length, 80);
    }

    #[test]
    fn key_limits() {
        let limits = Limits::default();
        assert!(limits.check_key("k").is_ok());
        assert!(limits.check_key(&"k".repeat(80)).is_ok());
        assert!(matches!(
            limits.check_key(&"k".repeat(81)),
            Err(Error::Validation { .. })
        ));
        assert!(limits.check_key("").is_err());
    }

    #[test]
    fn counts_chars_not_bytes() {
        let limits = Limits {
            max_key_length: 2,
            ..Limits::default()
        };
        assert!(limits.check_key("éé").is_ok());
        assert!(limits.check_key("ééé").is_err());
    }

    #[test]
    fn value_and_name_limits() {
        let limits = Limits::default();
        assert!(limits.check_value(&"v".repeat(8192)).is_ok());
        assert!(limits.check_value(&"v".repeat(8193)).is_err());
        assert!(limits.check_value("").is_ok());
        assert!(limits.check_name(&"n".repeat(81)).is_err());
    }

    #[test]
    fn partial_config_deserializes() {
        let limits: Limits = serde_json::from_str(r#"{"max_key_length": 10}"#).unwrap();
        assert_eq!(limits.max_key_length, 10);
        assert_eq!(limits.max_value_length, MAX_VALUE_LENGTH);
    }
}
