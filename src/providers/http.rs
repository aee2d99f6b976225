use super::transport::{ActionTransport, Service};
use super::ProviderError;

use anyhow::Result;
use async_trait::async_trait;
use reqwest::{Client, StatusCode};
use serde::Deserialize;
use std::time::Duration;
use tracing::{debug, warn};

/// Header carrying the target region to the action endpoint.
pub const REGION_HEADER: &str = "x-reconciler-region";

/// Posts `{endpoint}/{service}/{Action}` with the parameters as a JSON body.
pub struct HttpActionTransport {
    endpoint: String,
    token: Option<String>,
    region: Option<String>,
    client: Client,
}

impl HttpActionTransport {
    pub fn new(
        endpoint: String,
        token: Option<String>,
        region: Option<String>,
        timeout: Duration,
    ) -> Result<Self> {
        let client = Client::builder().timeout(timeout).build()?;
        Ok(Self {
            endpoint: endpoint.trim_end_matches('/').to_string(),
            token,
            region,
            client,
        })
    }
}

/// Error body shapes seen from action endpoints: our own `{code, message}`,
/// the AWS JSON-protocol `{__type, message}`, or both at once.
#[derive(Debug, Default, Deserialize)]
struct ErrorBody {
    code: Option<String>,
    #[serde(rename = "Code")]
    code_upper: Option<String>,
    #[serde(rename = "__type")]
    error_type: Option<String>,
    message: Option<String>,
    #[serde(rename = "Message")]
    message_upper: Option<String>,
}

impl ErrorBody {
    fn parse(text: &str) -> Self {
        serde_json::from_str(text).unwrap_or_default()
    }

    fn code(&self) -> Option<&str> {
        [&self.code, &self.code_upper, &self.error_type]
            .into_iter()
            .flatten()
            .map(|c| strip_namespace(c.as_str()))
            .find(|c| !c.is_empty())
    }

    fn message(&self) -> Option<&str> {
        self.message.as_deref().or(self.message_upper.as_deref())
    }
}

/// AWS JSON error types may be namespaced, e.g. `com.amazonaws.iot#ResourceNotFoundException`.
fn strip_namespace(code: &str) -> &str {
    code.rsplit('#').next().unwrap_or(code)
}

/// Error code for a failed call: the one in the body, else `NotFound` for a
/// bare 404.
fn error_code(status: StatusCode, body: &ErrorBody) -> Option<String> {
    match body.code() {
        Some(code) => Some(code.to_string()),
        None if status == StatusCode::NOT_FOUND => Some("NotFound".to_string()),
        None => None,
    }
}

#[async_trait]
impl ActionTransport for HttpActionTransport {
    async fn send(
        &self,
        service: Service,
        action: &str,
        params: serde_json::Value,
        region: Option<&str>,
    ) -> Result<serde_json::Value, ProviderError> {
        let url = format!("{}/{}/{}", self.endpoint, service.as_str(), action);
        debug!("POST {}", url);

        let mut request = self
            .client
            .post(&url)
            .header("Content-Type", "application/json")
            .json(&params);
        if let Some(token) = &self.token {
            request = request.header("Authorization", format!("Bearer {token}"));
        }
        if let Some(region) = region.or(self.region.as_deref()) {
            request = request.header(REGION_HEADER, region);
        }

        let resp = request
            .send()
            .await
            .map_err(|e| ProviderError::new(action, e.to_string()))?;

        let status = resp.status();
        let text = resp
            .text()
            .await
            .map_err(|e| ProviderError::new(action, e.to_string()).with_status(status.as_u16()))?;

        if !status.is_success() {
            let body = ErrorBody::parse(&text);
            let mut err = ProviderError::new(
                action,
                body.message()
                    .map(str::to_string)
                    .unwrap_or_else(|| format!("HTTP {status}: {text}")),
            )
            .with_status(status.as_u16());
            if let Some(code) = error_code(status, &body) {
                err = err.with_code(code);
            }
            warn!("{}/{} returned {}", service.as_str(), action, status);
            return Err(err);
        }

        if text.trim().is_empty() {
            return Ok(serde_json::Value::Object(Default::default()));
        }
        serde_json::from_str(&text).map_err(|e| ProviderError::malformed(action, e))
    }
}
