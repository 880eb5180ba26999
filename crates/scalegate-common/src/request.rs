use std::collections::BTreeMap;
use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};
use thiserror::Error;
use typed_builder::TypedBuilder;

/// HTTP methods the upstream API accepts.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum HttpMethod {
    #[default]
    Get,
    Post,
    Put,
    Delete,
}

impl HttpMethod {
    /// Returns the canonical uppercase method name.
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Get => "GET",
            Self::Post => "POST",
            Self::Put => "PUT",
            Self::Delete => "DELETE",
        }
    }

    /// Whether a JSON payload is forwarded for this method.
    #[must_use]
    pub const fn sends_body(self) -> bool {
        matches!(self, Self::Post | Self::Put)
    }
}

impl fmt::Display for HttpMethod {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Returned when a method name is outside the supported set.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("Unsupported HTTP method: {0}")]
pub struct ParseMethodError(pub String);

impl FromStr for HttpMethod {
    type Err = ParseMethodError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_uppercase().as_str() {
            "GET" => Ok(Self::Get),
            "POST" => Ok(Self::Post),
            "PUT" => Ok(Self::Put),
            "DELETE" => Ok(Self::Delete),
            _ => Err(ParseMethodError(s.to_string())),
        }
    }
}

/// A single call to forward upstream.
///
/// # Example
///
/// ```
/// use scalegate_common::{HttpMethod, ProxyRequest};
/// use serde_json::json;
///
/// let request = ProxyRequest::builder()
///     .path("/VirDomain")
///     .method(HttpMethod::Post)
///     .payload(json!({"name": "vm01"}))
///     .build();
/// assert_eq!(request.method, HttpMethod::Post);
/// ```
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, TypedBuilder)]
pub struct ProxyRequest {
    /// Path relative to the upstream base URL. Untrusted.
    #[builder(setter(into))]
    pub path: String,

    #[builder(default)]
    pub method: HttpMethod,

    /// JSON body, forwarded for POST and PUT.
    #[builder(default, setter(strip_option))]
    pub payload: Option<serde_json::Value>,

    /// Extra query parameters appended to the target URL.
    #[builder(default, setter(strip_option))]
    pub query: Option<BTreeMap<String, String>>,
}

#[cfg(test)]
mod tests {
    #![allow(clippy::unwrap_used)]

    use super::*;

    #[test]
    fn test_parse_method_case_insensitive() {
        assert_eq!("get".parse::<HttpMethod>().unwrap(), HttpMethod::Get);
        assert_eq!(" Post ".parse::<HttpMethod>().unwrap(), HttpMethod::Post);
        assert_eq!("DELETE".parse::<HttpMethod>().unwrap(), HttpMethod::Delete);
    }

    #[test]
    fn test_parse_method_rejects_unknown() {
        let err = "PATCH".parse::<HttpMethod>().unwrap_err();
        assert_eq!(err, ParseMethodError("PATCH".to_string()));
        assert!("".parse::<HttpMethod>().is_err());
    }

    #[test]
    fn test_sends_body() {
        assert!(HttpMethod::Post.sends_body());
        assert!(HttpMethod::Put.sends_body());
        assert!(!HttpMethod::Get.sends_body());
        assert!(!HttpMethod::Delete.sends_body());
    }

    #[test]
    fn test_builder_defaults_to_get() {
        let request = ProxyRequest::builder().path("/ping").build();
        assert_eq!(request.method, HttpMethod::Get);
        assert!(request.payload.is_none());
        assert!(request.query.is_none());
    }
}
