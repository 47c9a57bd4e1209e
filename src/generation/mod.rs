//! Generation client with region/model fallback
//!
//! [`GenerationClient::generate`] walks the [`CandidateList`] (every model under
//! every region) until one attempt succeeds. Per-candidate failures are logged
//! and recorded, never raised; exhaustion is reported as
//! [`GenerationOutcome::Failure`].

pub mod candidates;
pub mod response;
pub mod transport;
pub mod vertex;

pub use candidates::{parse_list, CandidateList, FALLBACK_MODELS, FALLBACK_REGIONS};
pub use response::{extract_text, GenerationResponse};
pub use transport::{RegionClient, RegionClientFactory, ServiceError, ServiceErrorKind};

use std::collections::HashMap;
use std::sync::{Arc, Mutex, PoisonError};
use std::time::Duration;
use tracing::{error, info, warn};

use crate::models::{AttemptRecord, GenerationFailure, GenerationOutcome, GenerationRequest};
use crate::redact::truncate_for_log;

/// Maximum characters of an upstream error message kept in logs and attempt records
pub const ERROR_SUMMARY_LIMIT: usize = 200;

/// Default per-attempt budget
pub const DEFAULT_ATTEMPT_TIMEOUT: Duration = Duration::from_secs(60);

pub struct GenerationClient {
    factory: Arc<dyn RegionClientFactory>,
    candidates: CandidateList,
    attempt_timeout: Duration,
    log_selection: bool,
    clients: Mutex<HashMap<String, Arc<dyn RegionClient>>>,
}

impl GenerationClient {
    pub fn new(factory: Arc<dyn RegionClientFactory>, candidates: CandidateList) -> Self {
        Self {
            factory,
            candidates,
            attempt_timeout: DEFAULT_ATTEMPT_TIMEOUT,
            log_selection: false,
            clients: Mutex::new(HashMap::new()),
        }
    }

    pub fn with_attempt_timeout(mut self, attempt_timeout: Duration) -> Self {
        self.attempt_timeout = attempt_timeout;
        self
    }

    /// Log which region/model answered each request
    pub fn with_selection_logging(mut self, enabled: bool) -> Self {
        self.log_selection = enabled;
        self
    }

    pub fn candidates(&self) -> &CandidateList {
        &self.candidates
    }

    /// Run one request through the candidate list
    pub async fn generate(&self, request: &GenerationRequest) -> GenerationOutcome {
        let mut attempts = Vec::with_capacity(self.candidates.len());
        let mut last_error = None;

        for region in self.candidates.regions() {
            let client = self.client_for(region);

            for model in self.candidates.models() {
                match self.attempt(client.as_ref(), model, request).await {
                    Ok(response) => {
                        if self.log_selection {
                            info!(step = "model_used", region = %region, model = %model, "Generation succeeded");
                        }
                        return GenerationOutcome::Success(response.extract_text());
                    }
                    Err(err) => {
                        let summary = truncate_for_log(&err.message, ERROR_SUMMARY_LIMIT);
                        if err.kind.is_unavailable_candidate() {
                            warn!(
                                step = "model_try_fail",
                                region = %region,
                                model = %model,
                                kind = %err.kind,
                                error = %summary,
                                "Candidate unavailable, trying next"
                            );
                        } else {
                            warn!(
                                step = "model_try_error",
                                region = %region,
                                model = %model,
                                kind = %err.kind,
                                error = %summary,
                                "Candidate failed, trying next"
                            );
                        }

                        attempts.push(AttemptRecord {
                            region: region.clone(),
                            model: model.clone(),
                            kind: err.kind,
                            error_summary: summary,
                        });
                        last_error = Some(err);
                    }
                }
            }
        }

        error!(
            step = "generation_exhausted",
            attempts = attempts.len(),
            last_kind = %last_error.as_ref().map(|e| e.kind.as_str()).unwrap_or("none"),
            "No region/model candidate produced a response"
        );

        GenerationOutcome::Failure(GenerationFailure {
            last_error,
            attempts,
        })
    }

    async fn attempt(
        &self,
        client: &dyn RegionClient,
        model: &str,
        request: &GenerationRequest,
    ) -> Result<GenerationResponse, ServiceError> {
        match tokio::time::timeout(self.attempt_timeout, client.generate_content(model, request)).await {
            Ok(result) => result,
            Err(_) => Err(ServiceError::timeout(self.attempt_timeout)),
        }
    }

    /// Cached client for a region, created on first use
    fn client_for(&self, region: &str) -> Arc<dyn RegionClient> {
        let mut clients = self.clients.lock().unwrap_or_else(PoisonError::into_inner);
        Arc::clone(
            clients
                .entry(region.to_string())
                .or_insert_with(|| self.factory.client_for(region)),
        )
    }
}
