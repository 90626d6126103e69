// HTTP client wrapper for the ACI backend

use aci_core::config::PortalConfig;
use aci_core::error::{PortalError, Result};
use aci_core::traits::AccessToken;
use reqwest::{Method, RequestBuilder, Response};
use serde::{de::DeserializeOwned, Serialize};
use serde_json::Value;
use tracing::debug;

pub(crate) const API_KEY_HEADER: &str = "X-API-KEY";
pub(crate) const ORG_ID_HEADER: &str = "X-ACI-ORG-ID";

/// Credentials attached to a request
#[derive(Debug, Clone, Copy)]
pub enum Auth<'a> {
    /// Agent API key, sent as `X-API-KEY`
    ApiKey(&'a str),
    /// Identity token, sent as a bearer token plus the org header when set
    Bearer(&'a AccessToken),
}

#[derive(Debug, Clone)]
pub struct PortalClient {
    base_url: String,
    http: reqwest::Client,
}

impl PortalClient {
    pub fn new(base_url: &str) -> Self {
        Self::with_http(base_url, reqwest::Client::new())
    }

    pub fn with_http(base_url: &str, http: reqwest::Client) -> Self {
        Self {
            base_url: base_url.trim_end_matches('/').to_string(),
            http,
        }
    }

    pub fn from_config(config: &PortalConfig) -> Self {
        Self::new(&config.api_url)
    }

    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    pub(crate) fn request(&self, method: Method, path: &str, auth: Auth<'_>) -> RequestBuilder {
        let url = format!("{}{}", self.base_url, path);
        debug!(method = %method, url = %url, "Backend request");
        let builder = self.http.request(method, url);
        match auth {
            Auth::ApiKey(key) => builder.header(API_KEY_HEADER, key),
            Auth::Bearer(token) => {
                let builder = builder.bearer_auth(&token.token);
                match &token.org_id {
                    Some(org_id) => builder.header(ORG_ID_HEADER, org_id),
                    None => builder,
                }
            }
        }
    }

    /// Send without inspecting the status
    pub(crate) async fn send_raw(&self, builder: RequestBuilder) -> Result<Response> {
        builder
            .send()
            .await
            .map_err(|e| PortalError::transport(e.to_string()))
    }

    /// Send and turn non-success statuses into `PortalError::Http`
    pub(crate) async fn send(&self, builder: RequestBuilder) -> Result<Response> {
        let response = self.send_raw(builder).await?;
        if !response.status().is_success() {
            return Err(error_from_response(response).await);
        }
        Ok(response)
    }

    pub(crate) async fn get<T: DeserializeOwned>(
        &self,
        path: &str,
        query: &[(&str, String)],
        auth: Auth<'_>,
    ) -> Result<T> {
        let mut builder = self.request(Method::GET, path, auth);
        if !query.is_empty() {
            builder = builder.query(query);
        }
        let response = self.send(builder).await?;
        decode(response).await
    }

    pub(crate) async fn post<T: DeserializeOwned, B: Serialize + ?Sized>(
        &self,
        path: &str,
        body: Option<&B>,
        auth: Auth<'_>,
    ) -> Result<T> {
        let mut builder = self.request(Method::POST, path, auth);
        if let Some(body) = body {
            builder = builder.json(body);
        }
        let response = self.send(builder).await?;
        decode(response).await
    }

    pub(crate) async fn patch<T: DeserializeOwned, B: Serialize + ?Sized>(
        &self,
        path: &str,
        body: &B,
        auth: Auth<'_>,
    ) -> Result<T> {
        let response = self
            .send(self.request(Method::PATCH, path, auth).json(body))
            .await?;
        decode(response).await
    }

    pub(crate) async fn delete(&self, path: &str, auth: Auth<'_>) -> Result<()> {
        self.send(self.request(Method::DELETE, path, auth)).await?;
        Ok(())
    }
}

pub(crate) async fn decode<T: DeserializeOwned>(response: Response) -> Result<T> {
    let body = response
        .bytes()
        .await
        .map_err(|e| PortalError::transport(e.to_string()))?;
    serde_json::from_slice(&body).map_err(|e| PortalError::invalid_response(e.to_string()))
}

/// Message carried in an error body, if the backend sent one
pub(crate) fn error_message(body: &str) -> Option<String> {
    let value: Value = serde_json::from_str(body).ok()?;
    ["error", "detail", "message"]
        .iter()
        .find_map(|key| value.get(key).and_then(Value::as_str))
        .map(str::to_string)
}

pub(crate) async fn error_from_response(response: Response) -> PortalError {
    let status = response.status();
    let status_text = status.canonical_reason().unwrap_or_default().to_string();
    let body = response.text().await.unwrap_or_default();
    let message = error_message(&body).unwrap_or(body);
    PortalError::http(status.as_u16(), status_text, message)
}

/// Path segment with reserved characters escaped
pub(crate) fn segment(value: &str) -> String {
    let mut out = String::with_capacity(value.len());
    for byte in value.bytes() {
        match byte {
            b'A'..=b'Z' | b'a'..=b'z' | b'0'..=b'9' | b'-' | b'_' | b'.' | b'~' => {
                out.push(byte as char)
            }
            _ => out.push_str(&format!("%{:02X}", byte)),
        }
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_message_keys() {
        assert_eq!(error_message(r#"{"error":"denied"}"#).as_deref(), Some("denied"));
        assert_eq!(error_message(r#"{"detail":"missing"}"#).as_deref(), Some("missing"));
        assert_eq!(error_message("plain text"), None);
    }

    #[test]
    fn test_segment_escapes() {
        assert_eq!(segment("GMAIL__SEND_EMAIL"), "GMAIL__SEND_EMAIL");
        assert_eq!(segment("a b/c"), "a%20b%2Fc");
    }

    #[test]
    fn test_base_url_is_trimmed() {
        assert_eq!(PortalClient::new("http://localhost:8000/").base_url(), "http://localhost:8000");
    }
}
