//! Seam between the fallback loop and the remote generation service

use async_trait::async_trait;
use std::fmt;
use std::sync::Arc;
use std::time::Duration;
use thiserror::Error;

use super::response::GenerationResponse;
use crate::models::GenerationRequest;

/// Failure classes reported by a region client
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ServiceErrorKind {
    NotFound,
    AccessDenied,
    RateLimited,
    Transient,
    Other,
}

impl ServiceErrorKind {
    /// The model or region is not available to this project
    pub fn is_unavailable_candidate(self) -> bool {
        matches!(self, ServiceErrorKind::NotFound | ServiceErrorKind::AccessDenied)
    }

    pub fn as_str(self) -> &'static str {
        match self {
            ServiceErrorKind::NotFound => "not_found",
            ServiceErrorKind::AccessDenied => "access_denied",
            ServiceErrorKind::RateLimited => "rate_limited",
            ServiceErrorKind::Transient => "transient",
            ServiceErrorKind::Other => "other",
        }
    }
}

impl fmt::Display for ServiceErrorKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Error returned by one generation attempt
#[derive(Error, Debug, Clone, PartialEq, Eq)]
#[error("{kind}: {message}")]
pub struct ServiceError {
    pub kind: ServiceErrorKind,
    pub message: String,
}

impl ServiceError {
    pub fn new(kind: ServiceErrorKind, message: impl Into<String>) -> Self {
        Self {
            kind,
            message: message.into(),
        }
    }

    pub fn not_found(message: impl Into<String>) -> Self {
        Self::new(ServiceErrorKind::NotFound, message)
    }

    pub fn access_denied(message: impl Into<String>) -> Self {
        Self::new(ServiceErrorKind::AccessDenied, message)
    }

    pub fn rate_limited(message: impl Into<String>) -> Self {
        Self::new(ServiceErrorKind::RateLimited, message)
    }

    pub fn transient(message: impl Into<String>) -> Self {
        Self::new(ServiceErrorKind::Transient, message)
    }

    pub fn other(message: impl Into<String>) -> Self {
        Self::new(ServiceErrorKind::Other, message)
    }

    /// The attempt did not finish within the per-attempt budget
    pub fn timeout(after: Duration) -> Self {
        Self::transient(format!("attempt timed out after {:?}", after))
    }
}

/// Client bound to one deployment region
#[async_trait]
pub trait RegionClient: Send + Sync {
    async fn generate_content(
        &self,
        model: &str,
        request: &GenerationRequest,
    ) -> Result<GenerationResponse, ServiceError>;
}

/// Creates region clients on demand
pub trait RegionClientFactory: Send + Sync {
    fn client_for(&self, region: &str) -> Arc<dyn RegionClient>;
}
