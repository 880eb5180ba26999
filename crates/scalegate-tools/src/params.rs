use std::collections::BTreeMap;

use schemars::JsonSchema;
use serde::Deserialize;
use serde_json::Value;

#[derive(Debug, Clone, Deserialize, JsonSchema)]
pub struct RunApiParams {
    /// Path relative to the upstream API root, starting with '/', e.g. "/VirDomain".
    pub query: String,

    /// HTTP method: GET, POST, PUT or DELETE (case-insensitive).
    pub method: String,

    /// JSON body, sent for POST and PUT only.
    #[serde(default)]
    pub payload: Option<Value>,

    /// Extra query string parameters.
    #[serde(default)]
    pub params: Option<BTreeMap<String, String>>,
}

#[derive(Debug, Clone, Deserialize, JsonSchema)]
pub struct QueryApiParams {
    /// Path relative to the upstream API root, starting with '/'.
    pub query: String,
}

#[derive(Debug, Clone, Default, Deserialize, JsonSchema)]
pub struct KillSessionParams {
    /// Session to kill. Defaults to the stored session.
    #[serde(default)]
    pub session_id: Option<String>,
}
