use std::sync::Arc;
use std::time::Duration;

use reqwest::{header::AUTHORIZATION, Client, RequestBuilder};
use serde_json::Value;
use thiserror::Error;
use url::Url;

use crate::config::{AppConfig, UpstreamConfig};

#[derive(Debug, Error)]
pub enum UpstreamError {
    #[error("{service} responded with status {status}")]
    Status {
        service: &'static str,
        status: u16,
        body: String,
    },

    #[error("{service} request failed: {source}")]
    Transport {
        service: &'static str,
        #[source]
        source: reqwest::Error,
    },

    #[error("invalid {service} url: {url}")]
    InvalidUrl { service: &'static str, url: String },

    #[error("{service} returned an unexpected payload: {message}")]
    Payload {
        service: &'static str,
        message: String,
    },
}

impl UpstreamError {
    /// HTTP status reported by the remote service, if it answered at all
    pub fn status(&self) -> Option<u16> {
        match self {
            UpstreamError::Status { status, .. } => Some(*status),
            _ => None,
        }
    }

    pub(crate) fn payload(service: &'static str, message: impl Into<String>) -> Self {
        UpstreamError::Payload {
            service,
            message: message.into(),
        }
    }
}

pub fn build_http_client(config: &UpstreamConfig) -> reqwest::Result<Client> {
    Client::builder()
        .timeout(Duration::from_secs(config.timeout_secs))
        .gzip(true)
        .build()
}

/// Everything a remote call needs for one inbound request: the shared client,
/// the configured base URLs and the caller's `Authorization` header, which is
/// forwarded verbatim.
#[derive(Clone)]
pub struct Upstream {
    http: Client,
    config: Arc<AppConfig>,
    authorization: Option<String>,
}

impl Upstream {
    pub fn new(http: Client, config: Arc<AppConfig>, authorization: Option<String>) -> Self {
        Self {
            http,
            config,
            authorization,
        }
    }

    /// Same context, authenticated with the microservice token instead of the caller's
    pub fn as_service(&self) -> Self {
        Self {
            http: self.http.clone(),
            config: self.config.clone(),
            authorization: Some(format!("Bearer {}", self.config.upstream.service_token)),
        }
    }

    pub fn config(&self) -> &AppConfig {
        &self.config
    }

    /// `base` may carry a path prefix (e.g. `https://host/v2`). Each segment is
    /// percent-encoded onto it, so ids taken from a request path cannot add
    /// queries, fragments or extra path levels. Empty and dot segments are refused.
    pub(crate) fn url(
        &self,
        service: &'static str,
        base: &str,
        segments: &[&str],
    ) -> Result<Url, UpstreamError> {
        let invalid = || UpstreamError::InvalidUrl {
            service,
            url: format!("{}/{}", base.trim_end_matches('/'), segments.join("/")),
        };

        if segments.iter().any(|s| matches!(*s, "" | "." | "..")) {
            return Err(invalid());
        }
        let mut url = Url::parse(base).map_err(|_| invalid())?;
        url.path_segments_mut()
            .map_err(|_| invalid())?
            .pop_if_empty()
            .extend(segments);
        Ok(url)
    }

    pub(crate) fn request(&self, method: reqwest::Method, url: Url) -> RequestBuilder {
        let request = self.http.request(method, url);
        match &self.authorization {
            Some(auth) => request.header(AUTHORIZATION, auth),
            None => request,
        }
    }

    pub(crate) async fn get_json(
        &self,
        service: &'static str,
        url: Url,
    ) -> Result<Value, UpstreamError> {
        self.send_json(service, self.request(reqwest::Method::GET, url))
            .await
    }

    /// Send a request and decode the JSON body. Non-2xx answers become `Status` errors;
    /// an empty 2xx body decodes to `null`.
    pub(crate) async fn send_json(
        &self,
        service: &'static str,
        request: RequestBuilder,
    ) -> Result<Value, UpstreamError> {
        let response = request
            .send()
            .await
            .map_err(|source| UpstreamError::Transport { service, source })?;

        let status = response.status();
        let bytes = response
            .bytes()
            .await
            .map_err(|source| UpstreamError::Transport { service, source })?;

        if !status.is_success() {
            let body = String::from_utf8_lossy(&bytes).into_owned();
            tracing::warn!(service, status = status.as_u16(), "Upstream error: {}", body);
            return Err(UpstreamError::Status {
                service,
                status: status.as_u16(),
                body,
            });
        }

        if bytes.is_empty() {
            return Ok(Value::Null);
        }
        serde_json::from_slice(&bytes).map_err(|e| UpstreamError::payload(service, e.to_string()))
    }
}
