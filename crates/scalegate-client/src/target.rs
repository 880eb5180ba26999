//! Target URL construction for untrusted request paths.
//!
//! The upstream host is fixed by configuration. Callers only choose the path,
//! so the builder refuses anything that could move the request to another
//! host or climb above the configured base path.

use std::collections::BTreeMap;

use url::Url;

use crate::error::ClientError;

/// Validates a configured base URL.
///
/// # Errors
///
/// Returns [`ClientError::Configuration`] if the URL does not parse, is not
/// http(s), has no host, or carries a query or fragment.
pub fn parse_base_url(base_url: &str) -> Result<Url, ClientError> {
    let url = Url::parse(base_url)
        .map_err(|e| ClientError::Configuration(format!("Invalid base URL '{base_url}': {e}")))?;

    if !matches!(url.scheme(), "http" | "https") {
        return Err(ClientError::Configuration(format!(
            "Base URL must use http or https, got '{}'",
            url.scheme()
        )));
    }
    if url.host_str().is_none() {
        return Err(ClientError::Configuration(
            "Base URL has no host".to_string(),
        ));
    }
    if url.query().is_some() || url.fragment().is_some() {
        return Err(ClientError::Configuration(
            "Base URL must not contain a query or fragment".to_string(),
        ));
    }

    Ok(url)
}

/// Joins `path` onto `base` and appends `query`.
///
/// `path` must start with `/` and may carry an inline `?query`. Dot segments,
/// encoded separators, backslashes, fragments and whitespace are rejected.
///
/// # Errors
///
/// Returns [`ClientError::InvalidPath`] if the path is rejected or the result
/// escapes the base URL.
pub fn resolve(
    base: &Url,
    path: &str,
    query: Option<&BTreeMap<String, String>>,
) -> Result<Url, ClientError> {
    check_path(path)?;

    let joined = format!("{}{path}", base.as_str().trim_end_matches('/'));
    let mut url = Url::parse(&joined)
        .map_err(|e| ClientError::InvalidPath(format!("{path}: {e}")))?;

    if let Some(query) = query
        && !query.is_empty()
    {
        let mut pairs = url.query_pairs_mut();
        for (key, value) in query {
            pairs.append_pair(key, value);
        }
    }

    let base_path = base.path().trim_end_matches('/');
    let same_origin = url.scheme() == base.scheme()
        && url.host_str() == base.host_str()
        && url.port_or_known_default() == base.port_or_known_default();
    let under_base = url.path() == base_path || url.path().starts_with(&format!("{base_path}/"));

    if !same_origin || !under_base {
        return Err(ClientError::InvalidPath(format!(
            "{path} resolves outside the upstream API"
        )));
    }

    Ok(url)
}

fn check_path(path: &str) -> Result<(), ClientError> {
    if !path.starts_with('/') {
        return Err(ClientError::InvalidPath(format!(
            "'{path}' must start with '/'"
        )));
    }

    if path
        .chars()
        .any(|c| c.is_control() || c.is_whitespace() || c == '\\' || c == '#')
    {
        return Err(ClientError::InvalidPath(format!(
            "'{path}' contains forbidden characters"
        )));
    }

    let raw_path = path.split_once('?').map_or(path, |(p, _)| p);
    for segment in raw_path.split('/') {
        let lowered = segment.to_ascii_lowercase();
        if lowered.contains("%2f") || lowered.contains("%5c") {
            return Err(ClientError::InvalidPath(format!(
                "'{path}' contains an encoded path separator"
            )));
        }
        let decoded = lowered.replace("%2e", ".");
        if decoded == "." || decoded == ".." {
            return Err(ClientError::InvalidPath(format!(
                "'{path}' contains a dot segment"
            )));
        }
    }

    Ok(())
}
