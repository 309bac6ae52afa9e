use std::net::Ipv6Addr;

use async_trait::async_trait;
use reqwest::{Client, StatusCode};
use serde::{Deserialize, Serialize};

use super::{Credentials, Session, Transport, TransportOptions};
use crate::error::DeviceError;

// --- eAPI JSON-RPC types ---

#[derive(Debug, Serialize)]
pub struct RunCmdsRequest<'a> {
    pub jsonrpc: &'static str,
    pub method: &'static str,
    pub params: RunCmdsParams<'a>,
    pub id: String,
}

#[derive(Debug, Serialize)]
pub struct RunCmdsParams<'a> {
    pub version: u32,
    pub cmds: &'a [String],
    pub format: &'static str,
}

#[derive(Debug, Deserialize)]
pub struct RunCmdsResponse {
    #[serde(default)]
    pub result: Option<Vec<serde_json::Value>>,
    #[serde(default)]
    pub error: Option<RpcError>,
}

#[derive(Debug, Deserialize)]
pub struct RpcError {
    pub code: i64,
    pub message: String,
    #[serde(default)]
    pub data: Vec<serde_json::Value>,
}

/// Build the `runCmds` body. The batch starts with `enable` since eAPI
/// sessions begin in unprivileged exec mode.
pub fn run_cmds_request<'a>(cmds: &'a [String], id: String) -> RunCmdsRequest<'a> {
    RunCmdsRequest {
        jsonrpc: "2.0",
        method: "runCmds",
        params: RunCmdsParams {
            version: 1,
            cmds,
            format: "json",
        },
        id,
    }
}

/// Configures switches through the eAPI command endpoint
pub struct EapiTransport {
    credentials: Credentials,
    options: TransportOptions,
    client: Client,
}

impl EapiTransport {
    pub fn new(credentials: Credentials, options: TransportOptions) -> Result<Self, DeviceError> {
        let client = Client::builder()
            .timeout(options.timeout)
            .danger_accept_invalid_certs(!options.verify_ssl)
            .danger_accept_invalid_hostnames(!options.verify_ssl)
            .build()
            .map_err(|e| DeviceError::Connection(format!("Failed to build HTTP client: {}", e)))?;

        if !options.verify_ssl && options.eapi_protocol == "https" {
            tracing::warn!("TLS certificate verification is disabled for eAPI");
        }

        Ok(Self {
            credentials,
            options,
            client,
        })
    }

    fn api_url(&self, host: &str) -> String {
        let host = match host.parse::<Ipv6Addr>() {
            Ok(_) => format!("[{}]", host),
            Err(_) => host.to_string(),
        };
        format!("{}://{}:{}/command-api", self.options.eapi_protocol, host, self.options.eapi_port)
    }
}

#[async_trait]
impl Transport for EapiTransport {
    fn name(&self) -> &'static str {
        "eapi"
    }

    async fn connect(&self, host: &str) -> Result<Box<dyn Session>, DeviceError> {
        Ok(Box::new(EapiSession {
            host: host.to_string(),
            url: self.api_url(host),
            client: self.client.clone(),
            credentials: self.credentials.clone(),
        }))
    }
}

struct EapiSession {
    host: String,
    url: String,
    client: Client,
    credentials: Credentials,
}

#[async_trait]
impl Session for EapiSession {
    async fn run_config(&mut self, commands: &[String]) -> Result<String, DeviceError> {
        let mut cmds = Vec::with_capacity(commands.len() + 1);
        cmds.push("enable".to_string());
        cmds.extend_from_slice(commands);

        let body = run_cmds_request(&cmds, format!("arista-vtep-{}", self.host));

        let resp = self
            .client
            .post(&self.url)
            .basic_auth(&self.credentials.username, Some(&self.credentials.password))
            .json(&body)
            .send()
            .await
            .map_err(classify_request_error)?;

        let status = resp.status();
        let text = resp
            .text()
            .await
            .map_err(|e| DeviceError::Connection(format!("Failed to read eAPI response: {}", e)))?;
        parse_response(status, &text)
    }

    async fn close(self: Box<Self>) {
        // HTTP is stateless; the pooled client is dropped with the session
        tracing::debug!("{}: eAPI session closed", self.host);
    }
}

fn classify_request_error(e: reqwest::Error) -> DeviceError {
    if e.is_timeout() {
        DeviceError::Connection(format!("eAPI request timed out: {}", e))
    } else if e.is_connect() {
        DeviceError::Connection(format!("eAPI connection failed: {}", e))
    } else {
        DeviceError::Connection(format!("eAPI request failed: {}", e))
    }
}

/// Map an eAPI HTTP reply onto the device error kinds
pub fn parse_response(status: StatusCode, body: &str) -> Result<String, DeviceError> {
    if status == StatusCode::UNAUTHORIZED || status == StatusCode::FORBIDDEN {
        return Err(DeviceError::Authentication(format!("eAPI returned HTTP {}", status.as_u16())));
    }
    if !status.is_success() {
        return Err(DeviceError::Connection(format!("eAPI error {}: {}", status, body.trim())));
    }

    let parsed: RunCmdsResponse = serde_json::from_str(body)
        .map_err(|e| DeviceError::Connection(format!("Malformed eAPI response: {}", e)))?;

    if let Some(err) = parsed.error {
        tracing::debug!("eAPI error code {} with {} result entries", err.code, err.data.len());
        return Err(DeviceError::Command(err.message));
    }

    let result = parsed.result.unwrap_or_default();
    serde_json::to_string(&result)
        .map_err(|e| DeviceError::Connection(format!("Malformed eAPI result: {}", e)))
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::http::HeaderMap;
    use axum::response::IntoResponse;
    use axum::routing::post;
    use axum::{Json, Router};
    use std::time::Duration;

    #[test]
    fn test_run_cmds_request_shape() {
        let cmds = vec!["enable".to_string(), "configure".to_string()];
        let body = serde_json::to_value(run_cmds_request(&cmds, "1".into())).unwrap();
        assert_eq!(body["jsonrpc"], "2.0");
        assert_eq!(body["method"], "runCmds");
        assert_eq!(body["params"]["version"], 1);
        assert_eq!(body["params"]["cmds"], serde_json::json!(["enable", "configure"]));
    }

    #[test]
    fn test_parse_response_success() {
        let out = parse_response(StatusCode::OK, r#"{"jsonrpc":"2.0","id":"x","result":[{},{}]}"#).unwrap();
        assert_eq!(out, "[{},{}]");
    }

    #[test]
    fn test_parse_response_command_error() {
        let body = r#"{"jsonrpc":"2.0","id":"x","error":{"code":1002,"message":"CLI command 3 of 4 'interface Bogus' failed: invalid command","data":[{},{}]}}"#;
        let err = parse_response(StatusCode::OK, body).unwrap_err();
        assert_eq!(
            err,
            DeviceError::Command("CLI command 3 of 4 'interface Bogus' failed: invalid command".into())
        );
    }

    #[test]
    fn test_parse_response_auth_and_http_errors() {
        assert_eq!(parse_response(StatusCode::UNAUTHORIZED, "").unwrap_err().kind(), "authentication");
        assert_eq!(parse_response(StatusCode::INTERNAL_SERVER_ERROR, "boom").unwrap_err().kind(), "connection");
        assert_eq!(parse_response(StatusCode::OK, "not json").unwrap_err().kind(), "connection");
    }

    fn options(port: u16) -> TransportOptions {
        TransportOptions {
            ssh_port: 22,
            eapi_protocol: "http".into(),
            eapi_port: port,
            verify_ssl: false,
            timeout: Duration::from_secs(5),
        }
    }

    #[test]
    fn test_api_url_brackets_ipv6() {
        let creds = Credentials { username: "admin".into(), password: "pw".into() };
        let transport = EapiTransport::new(creds, options(8080)).unwrap();
        assert_eq!(transport.api_url("leaf1"), "http://leaf1:8080/command-api");
        assert_eq!(transport.api_url("2001:db8::1"), "http://[2001:db8::1]:8080/command-api");
    }

    /// Minimal stand-in for a switch's /command-api endpoint
    async fn fake_command_api(headers: HeaderMap, Json(req): Json<serde_json::Value>) -> axum::response::Response {
        let auth = headers
            .get("authorization")
            .and_then(|v| v.to_str().ok())
            .unwrap_or_default();
        if auth != "Basic YWRtaW46cHc=" {
            return axum::http::StatusCode::UNAUTHORIZED.into_response();
        }

        let cmds: Vec<String> = serde_json::from_value(req["params"]["cmds"].clone()).unwrap_or_default();
        if cmds.first().map(String::as_str) != Some("enable") {
            return Json(serde_json::json!({
                "jsonrpc": "2.0", "id": req["id"],
                "error": {"code": 1005, "message": "privileged mode required", "data": []}
            }))
            .into_response();
        }
        if let Some(pos) = cmds.iter().position(|c| c == "interface Bogus") {
            return Json(serde_json::json!({
                "jsonrpc": "2.0", "id": req["id"],
                "error": {
                    "code": 1002,
                    "message": format!("CLI command {} of {} 'interface Bogus' failed: invalid command", pos + 1, cmds.len()),
                    "data": []
                }
            }))
            .into_response();
        }

        let result: Vec<serde_json::Value> = cmds.iter().map(|_| serde_json::json!({})).collect();
        Json(serde_json::json!({"jsonrpc": "2.0", "id": req["id"], "result": result})).into_response()
    }

    async fn spawn_fake_switch() -> u16 {
        let app = Router::new().route("/command-api", post(fake_command_api));
        let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
        let port = listener.local_addr().unwrap().port();
        tokio::spawn(async move {
            let _ = axum::serve(listener, app).await;
        });
        port
    }

    #[tokio::test]
    async fn test_eapi_session_against_fake_switch() {
        let port = spawn_fake_switch().await;
        let creds = Credentials { username: "admin".into(), password: "pw".into() };
        let transport = EapiTransport::new(creds, options(port)).unwrap();

        let mut session = transport.connect("127.0.0.1").await.unwrap();
        let cmds = vec![
            "configure".to_string(),
            "interface Vxlan1".to_string(),
            "vxlan flood vtep add 10.0.0.2".to_string(),
            "end".to_string(),
        ];
        let out = session.run_config(&cmds).await.unwrap();
        assert_eq!(out, "[{},{},{},{},{}]");

        let bad = vec!["configure".to_string(), "interface Bogus".to_string(), "end".to_string()];
        let err = session.run_config(&bad).await.unwrap_err();
        assert_eq!(err.kind(), "command");
        assert!(err.message().contains("interface Bogus"));
        session.close().await;
    }

    #[tokio::test]
    async fn test_eapi_wrong_password() {
        let port = spawn_fake_switch().await;
        let creds = Credentials { username: "admin".into(), password: "wrong".into() };
        let transport = EapiTransport::new(creds, options(port)).unwrap();

        let mut session = transport.connect("127.0.0.1").await.unwrap();
        let err = session.run_config(&["configure".to_string()]).await.unwrap_err();
        assert_eq!(err, DeviceError::Authentication("eAPI returned HTTP 401".into()));
    }

    /// Accept one request, answer with headers promising more body than is sent, then hang up
    async fn spawn_truncating_switch() -> u16 {
        use tokio::io::{AsyncReadExt, AsyncWriteExt};

        let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
        let port = listener.local_addr().unwrap().port();
        tokio::spawn(async move {
            let (mut sock, _) = listener.accept().await.unwrap();
            let mut buf = Vec::new();
            let mut chunk = [0u8; 4096];
            // drain headers and body so the close is a clean FIN
            loop {
                let n = sock.read(&mut chunk).await.unwrap();
                if n == 0 {
                    return;
                }
                buf.extend_from_slice(&chunk[..n]);
                let text = String::from_utf8_lossy(&buf).to_string();
                if let Some(end) = text.find("\r\n\r\n") {
                    let length = text[..end]
                        .lines()
                        .find_map(|l| l.to_ascii_lowercase().strip_prefix("content-length:").map(|v| v.trim().to_string()))
                        .and_then(|v| v.parse::<usize>().ok())
                        .unwrap_or(0);
                    if buf.len() >= end + 4 + length {
                        break;
                    }
                }
            }
            sock.write_all(b"HTTP/1.1 200 OK\r\ncontent-type: application/json\r\ncontent-length: 1000\r\n\r\n{\"jsonrpc\"")
                .await
                .unwrap();
            sock.shutdown().await.unwrap();
        });
        port
    }

    #[tokio::test]
    async fn test_truncated_body_is_connection_error() {
        let port = spawn_truncating_switch().await;
        let creds = Credentials { username: "admin".into(), password: "pw".into() };
        let transport = EapiTransport::new(creds, options(port)).unwrap();

        let mut session = transport.connect("127.0.0.1").await.unwrap();
        let err = session.run_config(&["configure".to_string()]).await.unwrap_err();
        assert_eq!(err.kind(), "connection");
        assert!(err.message().starts_with("Failed to read eAPI response"), "{}", err.message());
    }
}
