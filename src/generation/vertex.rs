//! Vertex AI generateContent transport

use async_trait::async_trait;
use google_gmail1::{hyper_rustls, hyper_util};
use http_body_util::{BodyExt, Full};
use hyper::body::Bytes;
use hyper::{header, Method, Request};
use serde_json::{json, Value};
use std::sync::Arc;
use tracing::debug;

use super::response::GenerationResponse;
use super::transport::{RegionClient, RegionClientFactory, ServiceError, ServiceErrorKind};
use crate::auth::GoogleAuthenticator;
use crate::error::{Result, TriageError};
use crate::models::GenerationRequest;

/// Scope needed to call Vertex AI
pub const CLOUD_PLATFORM_SCOPE: &str = "https://www.googleapis.com/auth/cloud-platform";

type HttpsConnector =
    hyper_rustls::HttpsConnector<hyper_util::client::legacy::connect::HttpConnector>;

/// HTTP client used for Vertex AI requests
pub type VertexHttpClient = hyper_util::client::legacy::Client<HttpsConnector, Full<Bytes>>;

/// Shared pieces of every regional client
struct VertexTransport {
    http: VertexHttpClient,
    auth: GoogleAuthenticator,
    project_id: String,
}

/// Builds one [`VertexRegionClient`] per region, all sharing a connection pool
/// and credentials
pub struct VertexClientFactory {
    transport: Arc<VertexTransport>,
}

impl VertexClientFactory {
    pub fn new(http: VertexHttpClient, auth: GoogleAuthenticator, project_id: impl Into<String>) -> Self {
        Self {
            transport: Arc::new(VertexTransport {
                http,
                auth,
                project_id: project_id.into(),
            }),
        }
    }

    /// Authenticate with Application Default Credentials and build the factory
    pub async fn connect(project_id: &str) -> Result<Self> {
        let auth = crate::auth::application_default_authenticator().await?;

        // Fail at startup rather than on the first message when ADC is unusable
        auth.token(&[CLOUD_PLATFORM_SCOPE])
            .await
            .map_err(|e| TriageError::AuthError(format!("Failed to obtain Vertex AI token: {}", e)))?;

        let http = hyper_util::client::legacy::Client::builder(hyper_util::rt::TokioExecutor::new())
            .build(
                hyper_rustls::HttpsConnectorBuilder::new()
                    .with_native_roots()
                    .map_err(|e| TriageError::AuthError(format!("Failed to load TLS roots: {}", e)))?
                    .https_only()
                    .enable_http1()
                    .build(),
            );

        Ok(Self::new(http, auth, project_id))
    }
}

impl RegionClientFactory for VertexClientFactory {
    fn client_for(&self, region: &str) -> Arc<dyn RegionClient> {
        debug!(region = %region, "Creating Vertex AI client");
        Arc::new(VertexRegionClient {
            transport: Arc::clone(&self.transport),
            region: region.to_string(),
        })
    }
}

/// generateContent client for a single region
pub struct VertexRegionClient {
    transport: Arc<VertexTransport>,
    region: String,
}

impl VertexRegionClient {
    async fn bearer_token(&self) -> std::result::Result<String, ServiceError> {
        let token = self
            .transport
            .auth
            .token(&[CLOUD_PLATFORM_SCOPE])
            .await
            .map_err(|e| ServiceError::other(format!("failed to obtain access token: {}", e)))?;

        token
            .token()
            .map(str::to_string)
            .ok_or_else(|| ServiceError::other("access token is empty"))
    }
}

#[async_trait]
impl RegionClient for VertexRegionClient {
    async fn generate_content(
        &self,
        model: &str,
        request: &GenerationRequest,
    ) -> std::result::Result<GenerationResponse, ServiceError> {
        let url = endpoint(&self.transport.project_id, &self.region, model);
        let body = serde_json::to_vec(&request_body(request))
            .map_err(|e| ServiceError::other(format!("failed to encode request: {}", e)))?;
        let token = self.bearer_token().await?;

        let http_request = Request::builder()
            .method(Method::POST)
            .uri(url)
            .header(header::AUTHORIZATION, format!("Bearer {}", token))
            .header(header::CONTENT_TYPE, "application/json")
            .body(Full::new(Bytes::from(body)))
            .map_err(|e| ServiceError::other(format!("failed to build request: {}", e)))?;

        let response = self
            .transport
            .http
            .request(http_request)
            .await
            .map_err(|e| ServiceError::transient(format!("connection error: {}", e)))?;

        let status = response.status();
        let bytes = response
            .into_body()
            .collect()
            .await
            .map_err(|e| ServiceError::transient(format!("failed to read response body: {}", e)))?
            .to_bytes();

        if !status.is_success() {
            return Err(error_from_response(status.as_u16(), &bytes));
        }

        let raw: Value = serde_json::from_slice(&bytes)
            .map_err(|e| ServiceError::other(format!("malformed response body: {}", e)))?;
        Ok(GenerationResponse::from_json(raw))
    }
}

/// generateContent URL for a publisher model in a region
pub fn endpoint(project_id: &str, region: &str, model: &str) -> String {
    let host = if region == "global" {
        "aiplatform.googleapis.com".to_string()
    } else {
        format!("{}-aiplatform.googleapis.com", region)
    };

    format!(
        "https://{}/v1/projects/{}/locations/{}/publishers/google/models/{}:generateContent",
        host, project_id, region, model
    )
}

/// JSON body of a generateContent call
pub fn request_body(request: &GenerationRequest) -> Value {
    json!({
        "contents": [{
            "role": "user",
            "parts": [{"text": request.user_text()}]
        }],
        "systemInstruction": {
            "parts": [{"text": request.instruction_text()}]
        },
        "generationConfig": {
            "temperature": request.temperature(),
            "maxOutputTokens": request.max_output_tokens(),
            "responseMimeType": request.output_format().mime_type()
        }
    })
}

/// Classify a failed call from its HTTP status and the `error.status` field
pub fn classify_failure(status: u16, api_status: Option<&str>) -> ServiceErrorKind {
    match api_status {
        Some("NOT_FOUND") => return ServiceErrorKind::NotFound,
        Some("PERMISSION_DENIED") | Some("UNAUTHENTICATED") => return ServiceErrorKind::AccessDenied,
        Some("RESOURCE_EXHAUSTED") => return ServiceErrorKind::RateLimited,
        Some("UNAVAILABLE") | Some("DEADLINE_EXCEEDED") | Some("INTERNAL") => {
            return ServiceErrorKind::Transient
        }
        _ => {}
    }

    match status {
        404 => ServiceErrorKind::NotFound,
        401 | 403 => ServiceErrorKind::AccessDenied,
        429 => ServiceErrorKind::RateLimited,
        500..=599 => ServiceErrorKind::Transient,
        _ => ServiceErrorKind::Other,
    }
}

fn error_from_response(status: u16, body: &[u8]) -> ServiceError {
    let parsed: Option<Value> = serde_json::from_slice(body).ok();
    let api_error = parsed.as_ref().and_then(|value| value.get("error"));

    let api_status = api_error
        .and_then(|error| error.get("status"))
        .and_then(Value::as_str);
    let message = api_error
        .and_then(|error| error.get("message"))
        .and_then(Value::as_str)
        .map(str::to_string)
        .unwrap_or_else(|| String::from_utf8_lossy(body).trim().to_string());

    ServiceError::new(
        classify_failure(status, api_status),
        format!("HTTP {}: {}", status, message),
    )
}
