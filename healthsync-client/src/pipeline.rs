//! Authenticated request execution against the configured base endpoint.
//!
//! The pipeline owns transport details only: URL joining, bearer-auth
//! injection, the two body encodings, typed response decoding, and the
//! status-code-to-[`RequestError`] table. Domain semantics live in the typed
//! API layer on top of it.

use std::sync::Arc;
use std::time::Duration;

use reqwest::{Client, Method, StatusCode, Url};
use serde::Deserialize;
use serde::de::DeserializeOwned;
use serde_json::Value;
use tracing::{debug, error, warn};

use crate::error::{RequestError, Result};
use crate::vault::CredentialVault;

const REQUEST_TIMEOUT: Duration = Duration::from_secs(30);

/// Marker type for endpoints that answer 2xx with no body. Any other
/// declared response shape treats an empty body as a failure.
#[derive(Debug, Clone, Copy, Deserialize)]
pub struct NoContent;

/// Request body with its wire encoding.
///
/// The authentication endpoint only accepts form-encoded credentials; every
/// other endpoint speaks JSON.
#[derive(Debug, Clone)]
pub enum Payload {
    Json(Value),
    Form(Vec<(&'static str, String)>),
}

/// Builds and executes HTTP requests, decoding typed responses and mapping
/// failures into the closed [`RequestError`] taxonomy.
pub struct RequestPipeline {
    client: Client,
    base: Url,
    vault: Arc<dyn CredentialVault>,
}

impl RequestPipeline {
    /// Creates a pipeline against `base_url`. Fails with
    /// [`RequestError::InvalidEndpoint`] when the string is not a usable
    /// absolute URL.
    pub fn new(base_url: &str, vault: Arc<dyn CredentialVault>) -> Result<Self> {
        let base = Url::parse(base_url).map_err(|err| {
            error!(base_url, %err, "base endpoint is not a valid absolute URL");
            RequestError::InvalidEndpoint
        })?;
        if base.cannot_be_a_base() {
            error!(base_url, "base endpoint cannot serve as a base URL");
            return Err(RequestError::InvalidEndpoint);
        }
        let client = Client::builder()
            .timeout(REQUEST_TIMEOUT)
            .build()
            .map_err(|err| {
                error!(%err, "failed to construct HTTP client");
                RequestError::Transport(err.to_string())
            })?;
        Ok(Self {
            client,
            base,
            vault,
        })
    }

    /// Executes one request and decodes the declared response shape.
    ///
    /// With `requires_auth`, the vault's bearer token is attached; a missing
    /// or empty token fails before any network traffic. A 401 clears the
    /// vault here, inside the pipeline, so every call site is protected
    /// uniformly rather than by caller discipline.
    pub async fn execute<T: DeserializeOwned>(
        &self,
        method: Method,
        path: &str,
        payload: Option<Payload>,
        requires_auth: bool,
    ) -> Result<T> {
        let url = self.endpoint(path)?;

        let mut request = self.client.request(method.clone(), url.clone());
        if requires_auth {
            let token = self.vault.token().filter(|token| !token.is_empty());
            let Some(token) = token else {
                warn!(path, "auth required but no token is stored");
                self.vault.clear_credentials();
                return Err(RequestError::Unauthorized);
            };
            request = request.bearer_auth(token);
        }

        request = match payload {
            Some(Payload::Json(body)) => request
                .header(reqwest::header::ACCEPT, "application/json")
                .json(&body),
            Some(Payload::Form(fields)) => {
                let mut form = reqwest::multipart::Form::new();
                for (name, value) in fields {
                    form = form.text(name, value);
                }
                request.multipart(form)
            }
            None => request.header(reqwest::header::ACCEPT, "application/json"),
        };

        debug!(%method, %url, "issuing request");
        let response = request.send().await.map_err(|err| {
            warn!(%url, %err, "request failed before a response arrived");
            RequestError::Transport(err.to_string())
        })?;

        let status = response.status();
        let body = response.bytes().await.map_err(|err| {
            error!(%url, %err, "failed to read response body");
            RequestError::MalformedResponse
        })?;
        debug!(%url, status = status.as_u16(), bytes = body.len(), "response received");

        if status.is_success() {
            return decode_body(&body);
        }
        Err(self.fail_for_status(status, &body))
    }

    fn endpoint(&self, path: &str) -> Result<Url> {
        let relative = path.strip_prefix('/').unwrap_or(path);
        self.base.join(relative).map_err(|err| {
            error!(path, %err, "could not join path onto base endpoint");
            RequestError::InvalidEndpoint
        })
    }

    /// Fixed status-code table from the backend contract.
    fn fail_for_status(&self, status: StatusCode, body: &[u8]) -> RequestError {
        let detail = extract_error_message(body);
        match status.as_u16() {
            401 => {
                warn!("401 received; clearing stored credentials");
                self.vault.clear_credentials();
                RequestError::Unauthorized
            }
            400 => RequestError::Domain(detail.unwrap_or_else(|| "Bad Request".to_string())),
            403 => RequestError::Domain(detail.unwrap_or_else(|| "Forbidden".to_string())),
            404 => RequestError::Domain(detail.unwrap_or_else(|| "Resource not found".to_string())),
            422 => RequestError::Domain(detail.unwrap_or_else(|| "Validation Error".to_string())),
            code @ 500..=599 => RequestError::Domain(format!(
                "Server Error ({code}): {}",
                detail.unwrap_or_else(|| "Internal Server Error".to_string())
            )),
            code => RequestError::Domain(format!(
                "Server returned status code {code}: {}",
                detail.unwrap_or_else(|| "Unknown server error".to_string())
            )),
        }
    }
}

fn decode_body<T: DeserializeOwned>(body: &[u8]) -> Result<T> {
    if body.is_empty() {
        // Only a type that decodes from null (the NoContent marker) may
        // accept an empty body.
        return serde_json::from_slice(b"null").map_err(|_| {
            RequestError::Domain("received empty response body but expected content".to_string())
        });
    }
    serde_json::from_slice(body).map_err(|err| {
        error!(
            %err,
            body = %String::from_utf8_lossy(body),
            "response decoding failed"
        );
        RequestError::Decoding {
            cause: err.to_string(),
            body: body.to_vec(),
        }
    })
}

#[derive(Deserialize)]
struct DetailItem {
    msg: Option<String>,
}

#[derive(Deserialize)]
struct StructuredErrorBody {
    detail: Option<Vec<DetailItem>>,
}

#[derive(Deserialize)]
struct FlatErrorBody {
    detail: Option<String>,
    message: Option<String>,
    error: Option<String>,
}

/// Best-effort extraction of a human message from an error body.
///
/// Order matters: the structured validation shape is tried first, then the
/// flat `{detail|message|error}` shape, then the raw body text — backends
/// return either shape for the same status code.
fn extract_error_message(body: &[u8]) -> Option<String> {
    if body.is_empty() {
        return None;
    }
    if let Ok(structured) = serde_json::from_slice::<StructuredErrorBody>(body) {
        if let Some(items) = structured.detail {
            let joined = items
                .iter()
                .filter_map(|item| item.msg.as_deref())
                .collect::<Vec<_>>()
                .join("; ");
            if !joined.is_empty() {
                return Some(joined);
            }
        }
    }
    if let Ok(flat) = serde_json::from_slice::<FlatErrorBody>(body) {
        if let Some(detail) = flat.detail {
            return Some(detail);
        }
        if let Some(message) = flat.message {
            return Some(message);
        }
        if let Some(error) = flat.error {
            return Some(error);
        }
    }
    let raw = String::from_utf8_lossy(body).trim().to_string();
    (!raw.is_empty()).then_some(raw)
}
