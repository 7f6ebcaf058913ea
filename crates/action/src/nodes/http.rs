//! `http.request` — dispatches an HTTP request built from templated
//! config. Retries only on transport errors and 5xx responses, up to
//! `retry.attempts - 1` further attempts, sleeping `retry.delay_ms`
//! between them. Grounded on the teacher's `nebula-engine::request`
//! module's method/response shape, scaled down to what this node needs
//! and rebuilt on async `reqwest` (the teacher's engine uses a
//! synchronous client).

use std::collections::HashMap;
use std::str::FromStr;
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use nebula_core::{InputRequirements, NodeId, NodeResult, NodeTypeKey};
use nebula_expression::ExpressionEngine;
use reqwest::Method;
use serde::Deserialize;
use serde_json::Value;

use crate::context::ActionContext;
use crate::error::ActionError;
use crate::node::{Node, NodeFactory};
use crate::port::{InputPort, OutputPort, PortKey, ERROR_PORT};
use crate::registry::{NodeRegistry, RegistryError};
use crate::result::NodeOutput;

pub const TYPE_KEY: &str = "http.request";

const DEFAULT_TIMEOUT_SECS: u64 = 30;

fn default_timeout_secs() -> u64 {
    DEFAULT_TIMEOUT_SECS
}

fn default_attempts() -> u32 {
    1
}

#[derive(Debug, Clone, Default, Deserialize)]
struct RetryConfig {
    #[serde(default = "default_attempts")]
    attempts: u32,
    #[serde(default)]
    delay_ms: u64,
}

#[derive(Debug, Clone, Deserialize)]
struct HttpConfig {
    method: String,
    #[serde(default)]
    url: Option<String>,
    #[serde(default)]
    host: Option<String>,
    #[serde(default)]
    protocol: Option<String>,
    #[serde(default)]
    path: Option<String>,
    #[serde(default)]
    headers: HashMap<String, String>,
    #[serde(default)]
    body: Option<Value>,
    #[serde(default = "default_timeout_secs")]
    timeout_secs: u64,
    #[serde(default)]
    retry: RetryConfig,
}

fn parse_config(config: &Value) -> Result<HttpConfig, ActionError> {
    let config: HttpConfig = serde_json::from_value(config.clone())
        .map_err(|e| ActionError::validation(format!("invalid http.request config: {e}")))?;
    Method::from_str(&config.method.to_uppercase())
        .map_err(|_| ActionError::validation(format!("unknown HTTP method: {}", config.method)))?;
    if config.url.is_none() && config.host.is_none() {
        return Err(ActionError::validation("http.request needs either `url` or `host`"));
    }
    Ok(config)
}

pub struct HttpNode {
    id: NodeId,
    node_type: NodeTypeKey,
    config: HttpConfig,
    engine: Arc<ExpressionEngine>,
    client: reqwest::Client,
}

impl HttpNode {
    fn build_url(&self, rendered: &RenderedConfig) -> Result<String, ActionError> {
        if let Some(url) = &rendered.url {
            return Ok(url.clone());
        }
        let protocol = rendered.protocol.as_deref().unwrap_or("https");
        let host = rendered.host.as_deref().ok_or_else(|| ActionError::fatal("missing host"))?;
        let path = rendered.path.as_deref().unwrap_or("");
        Ok(format!("{protocol}://{host}{path}"))
    }
}

struct RenderedConfig {
    url: Option<String>,
    host: Option<String>,
    protocol: Option<String>,
    path: Option<String>,
    headers: HashMap<String, String>,
    body: Option<Value>,
}

#[async_trait]
impl Node for HttpNode {
    fn id(&self) -> &NodeId {
        &self.id
    }

    fn node_type(&self) -> &NodeTypeKey {
        &self.node_type
    }

    fn input_ports(&self) -> Vec<InputPort> {
        vec![InputPort::optional("in")]
    }

    fn output_ports(&self) -> Vec<OutputPort> {
        vec![OutputPort::new("success"), OutputPort::error(ERROR_PORT)]
    }

    fn input_requirements(&self) -> InputRequirements {
        InputRequirements::new(vec![])
    }

    fn validate(&self, config: &Value) -> Result<(), ActionError> {
        parse_config(config).map(|_| ())
    }

    async fn execute(
        &self,
        ctx: &ActionContext,
        inputs: HashMap<PortKey, NodeResult>,
    ) -> Result<NodeOutput, ActionError> {
        ctx.check_cancelled()?;
        let ectx = super::build_context(ctx, &inputs);

        let render_opt = |s: &Option<String>| -> Result<Option<String>, ActionError> {
            s.as_deref()
                .map(|s| super::render_template_str(s, &self.engine, &ectx))
                .transpose()
                .map_err(|e| ActionError::fatal(format!("http.request template render failed: {e}")))
        };

        let mut headers = HashMap::with_capacity(self.config.headers.len());
        for (key, value) in &self.config.headers {
            let rendered = super::render_template_str(value, &self.engine, &ectx)
                .map_err(|e| ActionError::fatal(format!("http.request header render failed: {e}")))?;
            headers.insert(key.clone(), rendered);
        }

        let body = self
            .config
            .body
            .as_ref()
            .map(|b| super::render_value_templates(b, &self.engine, &ectx))
            .transpose()
            .map_err(|e| ActionError::fatal(format!("http.request body render failed: {e}")))?;

        let rendered = RenderedConfig {
            url: render_opt(&self.config.url)?,
            host: render_opt(&self.config.host)?,
            protocol: render_opt(&self.config.protocol)?,
            path: render_opt(&self.config.path)?,
            headers,
            body,
        };

        let url = self.build_url(&rendered)?;
        let method = Method::from_str(&self.config.method.to_uppercase())
            .expect("method validated at construction");

        let attempts = self.config.retry.attempts.max(1);
        let delay = Duration::from_millis(self.config.retry.delay_ms);

        let mut last_error = String::new();
        for attempt in 0..attempts {
            ctx.check_cancelled()?;
            let mut request = self
                .client
                .request(method.clone(), url.as_str())
                .timeout(Duration::from_secs(self.config.timeout_secs));
            for (key, value) in &rendered.headers {
                request = request.header(key, value);
            }
            if let Some(body) = &rendered.body {
                request = request.json(body);
            }

            match request.send().await {
                Ok(response) => {
                    let status = response.status();
                    if status.is_server_error() && attempt + 1 < attempts {
                        last_error = format!("server error: {status}");
                        tokio::time::sleep(delay).await;
                        continue;
                    }

                    let status_code = status.as_u16();
                    let response_headers: HashMap<String, String> = response
                        .headers()
                        .iter()
                        .filter_map(|(k, v)| v.to_str().ok().map(|v| (k.to_string(), v.to_string())))
                        .collect();
                    let text = response
                        .text()
                        .await
                        .map_err(|e| ActionError::fatal(format!("failed to read response body: {e}")))?;
                    let body = serde_json::from_str::<Value>(&text).unwrap_or(Value::String(text));

                    if status.is_server_error() {
                        return Err(ActionError::fatal_with_details(
                            format!("http request failed after {attempts} attempt(s): server error {status}"),
                            serde_json::json!({ "status_code": status_code, "headers": response_headers, "body": body }),
                        ));
                    }

                    return Ok(NodeOutput::single(
                        "success",
                        serde_json::json!({
                            "status_code": status_code,
                            "headers": response_headers,
                            "body": body,
                        }),
                    ));
                }
                Err(e) => {
                    last_error = e.to_string();
                    if attempt + 1 < attempts {
                        tokio::time::sleep(delay).await;
                        continue;
                    }
                }
            }
        }

        Err(ActionError::fatal(format!(
            "http request failed after {attempts} attempt(s): {last_error}"
        )))
    }
}

struct HttpFactory;

impl NodeFactory for HttpFactory {
    fn create(&self, id: NodeId, config: Value) -> Result<Box<dyn Node>, ActionError> {
        let config = parse_config(&config)?;
        Ok(Box::new(HttpNode {
            id,
            node_type: NodeTypeKey::new(TYPE_KEY).expect("static type key is valid"),
            config,
            engine: Arc::new(ExpressionEngine::new()),
            client: reqwest::Client::new(),
        }))
    }

    fn schema(&self) -> Option<Value> {
        Some(serde_json::json!({
            "type": "object",
            "required": ["method"],
            "properties": {
                "method": { "type": "string" },
                "url": { "type": "string" },
                "host": { "type": "string" },
                "protocol": { "type": "string" },
                "path": { "type": "string" },
                "headers": { "type": "object" },
                "body": {},
                "timeout_secs": { "type": "integer" },
                "retry": {
                    "type": "object",
                    "properties": {
                        "attempts": { "type": "integer" },
                        "delay_ms": { "type": "integer" }
                    }
                }
            }
        }))
    }
}

pub fn register(registry: &mut NodeRegistry) -> Result<(), RegistryError> {
    registry.register(NodeTypeKey::new(TYPE_KEY).expect("static type key is valid"), Arc::new(HttpFactory))
}

#[cfg(test)]
mod tests {
    use super::*;
    use nebula_core::{ExecutionId, WorkflowId};
    use wiremock::matchers::{method, path};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    fn node(config: HttpConfig) -> HttpNode {
        HttpNode {
            id: NodeId::new("n1").unwrap(),
            node_type: NodeTypeKey::new(TYPE_KEY).unwrap(),
            config,
            engine: Arc::new(ExpressionEngine::new()),
            client: reqwest::Client::new(),
        }
    }

    fn ctx() -> ActionContext {
        ActionContext::new(ExecutionId::v4(), NodeId::new("n1").unwrap(), WorkflowId::v4())
    }

    fn base_config(url: String) -> HttpConfig {
        HttpConfig {
            method: "GET".into(),
            url: Some(url),
            host: None,
            protocol: None,
            path: None,
            headers: HashMap::new(),
            body: None,
            timeout_secs: DEFAULT_TIMEOUT_SECS,
            retry: RetryConfig { attempts: 1, delay_ms: 0 },
        }
    }

    #[test]
    fn rejects_unknown_method() {
        let err = HttpFactory
            .create(NodeId::new("n1").unwrap(), serde_json::json!({ "method": "FETCH", "url": "https://x" }))
            .unwrap_err();
        assert!(matches!(err, ActionError::Validation(_)));
    }

    #[test]
    fn requires_url_or_host() {
        let err = HttpFactory
            .create(NodeId::new("n1").unwrap(), serde_json::json!({ "method": "GET" }))
            .unwrap_err();
        assert!(matches!(err, ActionError::Validation(_)));
    }

    #[tokio::test]
    async fn successful_response_emits_on_success_port() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/users"))
            .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!({ "id": 1 })))
            .mount(&server)
            .await;

        let node = node(base_config(format!("{}/users", server.uri())));
        let out = node.execute(&ctx(), HashMap::new()).await.unwrap();
        let payload = out.get("success").unwrap();
        assert_eq!(payload["status_code"], 200);
        assert_eq!(payload["body"]["id"], 1);
    }

    #[tokio::test]
    async fn retries_on_server_error_then_succeeds() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/flaky"))
            .respond_with(ResponseTemplate::new(500))
            .up_to_n_times(1)
            .mount(&server)
            .await;
        Mock::given(method("GET"))
            .and(path("/flaky"))
            .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!({ "ok": true })))
            .mount(&server)
            .await;

        let mut config = base_config(format!("{}/flaky", server.uri()));
        config.retry = RetryConfig { attempts: 2, delay_ms: 0 };
        let node = node(config);

        let out = node.execute(&ctx(), HashMap::new()).await.unwrap();
        assert_eq!(out.get("success").unwrap()["body"]["ok"], true);
    }

    #[tokio::test]
    async fn exhausted_retries_return_fatal_error() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/down"))
            .respond_with(ResponseTemplate::new(503))
            .mount(&server)
            .await;

        let mut config = base_config(format!("{}/down", server.uri()));
        config.retry = RetryConfig { attempts: 2, delay_ms: 0 };
        let node = node(config);

        let err = node.execute(&ctx(), HashMap::new()).await.unwrap_err();
        assert!(matches!(err, ActionError::Fatal { .. }));
    }

    #[tokio::test]
    async fn renders_templated_url_and_headers() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/prod/ping"))
            .respond_with(ResponseTemplate::new(200).set_body_string("pong"))
            .mount(&server)
            .await;

        let mut config = base_config(format!("{}/{{{{ $execution.variables.env }}}}/ping", server.uri()));
        config.headers.insert("x-env".to_string(), "{{ $execution.variables.env }}".to_string());
        let node = node(config);

        let mut ctx = ctx();
        let mut vars = serde_json::Map::new();
        vars.insert("env".to_string(), serde_json::json!("prod"));
        ctx = ctx.with_variables(vars);

        let out = node.execute(&ctx, HashMap::new()).await.unwrap();
        assert_eq!(out.get("success").unwrap()["status_code"], 200);
    }
}
