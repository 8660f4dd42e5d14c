// ABOUTME: Validated compose service / container name.
// ABOUTME: Follows the runtime naming rule [a-zA-Z0-9][a-zA-Z0-9_.-]*.

use serde::{Deserialize, Deserializer};
use std::fmt;
use thiserror::Error;

#[derive(Debug, Error, PartialEq, Eq)]
pub enum ServiceNameError {
    #[error("service name cannot be empty")]
    Empty,

    #[error("service name exceeds maximum length of 128 characters")]
    TooLong,

    #[error("service name must start with a letter or digit")]
    BadStart,

    #[error("invalid character in service name: '{0}'")]
    InvalidChar(char),
}

/// Name of a compose service or container backing a slot or the edge.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct ServiceName(String);

impl ServiceName {
    pub fn new(value: &str) -> Result<Self, ServiceNameError> {
        let first = value.chars().next().ok_or(ServiceNameError::Empty)?;

        if value.len() > 128 {
            return Err(ServiceNameError::TooLong);
        }

        if !first.is_ascii_alphanumeric() {
            return Err(ServiceNameError::BadStart);
        }

        if let Some(c) = value
            .chars()
            .find(|c| !c.is_ascii_alphanumeric() && !matches!(c, '_' | '.' | '-'))
        {
            return Err(ServiceNameError::InvalidChar(c));
        }

        Ok(Self(value.to_string()))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for ServiceName {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl<'de> Deserialize<'de> for ServiceName {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let s = String::deserialize(deserializer)?;
        ServiceName::new(&s).map_err(serde::de::Error::custom)
    }
}
