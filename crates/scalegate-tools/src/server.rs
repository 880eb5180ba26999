use std::sync::Arc;

use rmcp::handler::server::router::tool::ToolRouter;
use rmcp::handler::server::wrapper::Parameters;
use rmcp::model::{
    CallToolResult, Content, ErrorData, Implementation, ServerCapabilities, ServerInfo,
};
use rmcp::{ServerHandler, ServiceExt, tool, tool_handler, tool_router};
use scalegate::{ProxyError, ScaleProxy, session_message, status_message};
use serde_json::Value;

use crate::params::{KillSessionParams, QueryApiParams, RunApiParams};

/// MCP server that exposes a [`ScaleProxy`] as five tools.
///
/// Domain failures come back as tool results with `is_error` set and the
/// error JSON as text, so the calling model can read and react to them.
#[derive(Clone)]
pub struct ScaleToolServer {
    proxy: Arc<ScaleProxy>,
    tool_router: ToolRouter<Self>,
}

impl ScaleToolServer {
    #[must_use]
    pub fn new(proxy: Arc<ScaleProxy>) -> Self {
        Self {
            proxy,
            tool_router: Self::tool_router(),
        }
    }
}

fn success(value: &Value) -> CallToolResult {
    CallToolResult::success(vec![Content::text(value.to_string())])
}

fn failure(operation: &str, err: &ProxyError) -> CallToolResult {
    log::warn!("{operation} failed: {err}");
    CallToolResult::error(vec![Content::text(err.to_json().to_string())])
}

#[tool_router]
impl ScaleToolServer {
    #[tool(
        description = "Call the upstream REST API with the stored session. `query` is the path (e.g. /VirDomain), `method` one of GET, POST, PUT, DELETE. `payload` is the JSON body for POST/PUT."
    )]
    async fn run_api(
        &self,
        Parameters(params): Parameters<RunApiParams>,
    ) -> Result<CallToolResult, ErrorData> {
        Ok(self
            .proxy
            .run_api(&params.query, &params.method, params.payload, params.params)
            .await
            .map_or_else(|e| failure("run_api", &e), |value| success(&value)))
    }

    #[tool(description = "GET a path from the upstream REST API with the stored session.")]
    async fn query_api(
        &self,
        Parameters(params): Parameters<QueryApiParams>,
    ) -> Result<CallToolResult, ErrorData> {
        Ok(self
            .proxy
            .query_api(&params.query)
            .await
            .map_or_else(|e| failure("query_api", &e), |value| success(&value)))
    }

    #[tool(description = "Log in to the upstream API and store the new session, replacing any existing one.")]
    async fn generate_session(&self) -> Result<CallToolResult, ErrorData> {
        Ok(self.proxy.generate_session().await.map_or_else(
            |e| failure("generate_session", &e),
            |generated| success(&session_message(&generated, &generated.session_id)),
        ))
    }

    #[tool(description = "Report the stored session and whether it is still valid (younger than 12 hours).")]
    async fn get_session(&self) -> Result<CallToolResult, ErrorData> {
        Ok(self.proxy.get_session().await.map_or_else(
            |e| failure("get_session", &e),
            |status| success(&status_message(&status)),
        ))
    }

    #[tool(description = "Log out a session. Without `session_id` the stored session is killed and cleared.")]
    async fn kill_session(
        &self,
        Parameters(params): Parameters<KillSessionParams>,
    ) -> Result<CallToolResult, ErrorData> {
        Ok(self
            .proxy
            .kill_session(params.session_id.as_deref())
            .await
            .map_or_else(
                |e| failure("kill_session", &e),
                |killed| success(&session_message(&killed, &killed.session_id)),
            ))
    }
}

#[tool_handler(router = self.tool_router)]
impl ServerHandler for ScaleToolServer {
    fn get_info(&self) -> ServerInfo {
        ServerInfo {
            capabilities: ServerCapabilities::builder().enable_tools().build(),
            server_info: Implementation {
                name: "scalegate".to_string(),
                version: env!("CARGO_PKG_VERSION").to_string(),
                ..Default::default()
            },
            instructions: Some(
                "Proxy to a cluster REST API. Call get_session first; if there is no valid \
                 session, call generate_session. Then use query_api for reads and run_api for \
                 writes. kill_session logs the session out."
                    .to_string(),
            ),
            ..Default::default()
        }
    }
}

/// Serves MCP over stdin/stdout until the peer disconnects.
///
/// # Errors
///
/// Returns an error if the MCP handshake fails or the service task panics.
pub async fn serve_stdio(proxy: Arc<ScaleProxy>) -> anyhow::Result<()> {
    let service = ScaleToolServer::new(proxy)
        .serve(rmcp::transport::stdio())
        .await?;
    let reason = service.waiting().await?;
    log::info!("MCP session ended: {reason:?}");
    Ok(())
}

#[cfg(test)]
mod tests {
    #![allow(clippy::unwrap_used)]
    #![allow(clippy::expect_used)]

    use async_trait::async_trait;
    use scalegate::{
        CredentialError, CredentialProvider, Credentials, MemorySessionStore, SessionManager,
    };
    use scalegate_client::{UpstreamClient, UpstreamConfig};
    use serde_json::json;
    use wiremock::matchers::{header, method, path};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    use super::*;

    struct FixedProvider;

    #[async_trait]
    impl CredentialProvider for FixedProvider {
        async fn acquire(&self) -> Result<Credentials, CredentialError> {
            Ok(Credentials::from_session_id("S1"))
        }

        async fn revoke(&self, _session_id: &str) -> Result<(), CredentialError> {
            Ok(())
        }

        fn name(&self) -> &'static str {
            "fixed"
        }
    }

    fn setup(server: &MockServer) -> ScaleToolServer {
        let sessions = Arc::new(SessionManager::new(
            Arc::new(MemorySessionStore::new()),
            Arc::new(FixedProvider),
        ));
        let config = UpstreamConfig::new(&format!("{}/rest/v1", server.uri())).unwrap();
        let proxy = ScaleProxy::new(sessions, UpstreamClient::new(config).unwrap());
        ScaleToolServer::new(Arc::new(proxy))
    }

    fn text_json(result: &CallToolResult) -> Value {
        let text = &result.content[0].as_text().unwrap().text;
        serde_json::from_str(text).unwrap()
    }

    #[tokio::test]
    async fn test_no_session_is_error_result() {
        let mock_server = MockServer::start().await;
        let server = setup(&mock_server);

        let result = server
            .query_api(Parameters(QueryApiParams {
                query: "/ping".to_string(),
            }))
            .await
            .unwrap();

        assert_eq!(result.is_error, Some(true));
        assert_eq!(text_json(&result)["kind"], "no_session");
    }

    #[tokio::test]
    async fn test_session_lifecycle_through_tools() {
        let mock_server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/rest/v1/Node"))
            .and(header("cookie", "sessionID=S1"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!([{"uuid": "n1"}])))
            .expect(1)
            .mount(&mock_server)
            .await;

        let server = setup(&mock_server);

        let result = server.generate_session().await.unwrap();
        assert_eq!(result.is_error, Some(false));
        assert_eq!(text_json(&result)["message"], "Generated Session: S1");

        let result = server.get_session().await.unwrap();
        assert_eq!(text_json(&result)["status"], "fresh");

        let result = server
            .run_api(Parameters(RunApiParams {
                query: "/Node".to_string(),
                method: "get".to_string(),
                payload: None,
                params: None,
            }))
            .await
            .unwrap();
        assert_eq!(text_json(&result), json!([{"uuid": "n1"}]));

        let result = server
            .kill_session(Parameters(KillSessionParams::default()))
            .await
            .unwrap();
        assert_eq!(
            text_json(&result)["message"],
            "Session S1 killed successfully."
        );

        let result = server.get_session().await.unwrap();
        assert_eq!(result.is_error, Some(true));
    }

    #[tokio::test]
    async fn test_invalid_path_is_error_result() {
        let mock_server = MockServer::start().await;
        let server = setup(&mock_server);
        server.generate_session().await.unwrap();

        let result = server
            .run_api(Parameters(RunApiParams {
                query: "/../admin".to_string(),
                method: "GET".to_string(),
                payload: None,
                params: None,
            }))
            .await
            .unwrap();

        assert_eq!(result.is_error, Some(true));
        assert_eq!(text_json(&result)["kind"], "invalid_path");
    }

    #[test]
    fn test_info_enables_tools() {
        let config = UpstreamConfig::new("https://scale.local/rest/v1").unwrap();
        let sessions = Arc::new(SessionManager::new(
            Arc::new(MemorySessionStore::new()),
            Arc::new(FixedProvider),
        ));
        let proxy = ScaleProxy::new(sessions, UpstreamClient::new(config).unwrap());
        let info = ScaleToolServer::new(Arc::new(proxy)).get_info();

        assert!(info.capabilities.tools.is_some());
        assert_eq!(info.server_info.name, "scalegate");
    }
}
