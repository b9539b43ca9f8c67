use once_cell::sync::Lazy;
use regex::Regex;

use crate::error::RequestError;

// Compile path parameter rules once at startup
pub static HASHTAG_RULE: Lazy<FormatRule> =
    Lazy::new(|| FormatRule::new("hashtag", r"[a-zA-Z0-9_]+"));

pub static USERNAME_RULE: Lazy<FormatRule> =
    Lazy::new(|| FormatRule::new("username", r"[a-zA-Z0-9_]{1,15}"));

/// A named path parameter paired with the pattern its value must match.
#[derive(Debug)]
pub struct FormatRule {
    field: &'static str,
    pattern: Regex,
}

impl FormatRule {
    /// The pattern is anchored on both ends, so only whole-value matches pass.
    pub fn new(field: &'static str, pattern: &str) -> Self {
        Self {
            field,
            pattern: Regex::new(&format!(r"\A(?:{})\z", pattern)).unwrap(),
        }
    }

    pub fn field(&self) -> &'static str {
        self.field
    }

    pub fn validate(&self, value: &str) -> bool {
        self.pattern.is_match(value)
    }

    pub fn ensure(&self, value: &str) -> Result<(), RequestError> {
        if self.validate(value) {
            Ok(())
        } else {
            Err(RequestError::Format { field: self.field })
        }
    }
}
