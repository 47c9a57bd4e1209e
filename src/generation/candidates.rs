//! Ordered (region, model) candidates for the generation service

/// Regions tried after the configured default when no override list is given
pub const FALLBACK_REGIONS: &[&str] = &["us-central1", "asia-northeast1"];

/// Models tried after the configured default when no override list is given
pub const FALLBACK_MODELS: &[&str] = &["gemini-1.5-flash", "gemini-1.5-flash-8b", "gemini-1.5-pro"];

/// De-duplicated region and model lists, defaults first
///
/// Every model is attempted under every region, so the effective candidate
/// sequence is the cross product with regions as the outer loop.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CandidateList {
    regions: Vec<String>,
    models: Vec<String>,
}

impl CandidateList {
    /// Merge the configured default with the override list (or the built-in
    /// fallbacks when the override list is empty)
    pub fn new(
        default_region: &str,
        default_model: &str,
        region_overrides: &[String],
        model_overrides: &[String],
    ) -> Self {
        Self {
            regions: merge(default_region, region_overrides, FALLBACK_REGIONS),
            models: merge(default_model, model_overrides, FALLBACK_MODELS),
        }
    }

    /// Use the given lists as-is, apart from removing blanks and duplicates
    pub fn from_lists<R, M>(regions: R, models: M) -> Self
    where
        R: IntoIterator,
        R::Item: Into<String>,
        M: IntoIterator,
        M::Item: Into<String>,
    {
        Self {
            regions: dedup(regions.into_iter().map(Into::into)),
            models: dedup(models.into_iter().map(Into::into)),
        }
    }

    pub fn regions(&self) -> &[String] {
        &self.regions
    }

    pub fn models(&self) -> &[String] {
        &self.models
    }

    /// Number of (region, model) pairs
    pub fn len(&self) -> usize {
        self.regions.len() * self.models.len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// All pairs in attempt order
    pub fn pairs(&self) -> impl Iterator<Item = (&str, &str)> + '_ {
        self.regions.iter().flat_map(move |region| {
            self.models
                .iter()
                .map(move |model| (region.as_str(), model.as_str()))
        })
    }
}

/// Split a comma-separated list, trimming entries and dropping blanks and repeats
pub fn parse_list(raw: &str) -> Vec<String> {
    dedup(raw.split(',').map(|item| item.to_string()))
}

fn merge(default: &str, overrides: &[String], fallbacks: &[&str]) -> Vec<String> {
    let tail: Vec<String> = if overrides.iter().any(|item| !item.trim().is_empty()) {
        overrides.to_vec()
    } else {
        fallbacks.iter().map(|item| item.to_string()).collect()
    };

    dedup(std::iter::once(default.to_string()).chain(tail))
}

fn dedup(items: impl Iterator<Item = String>) -> Vec<String> {
    let mut out: Vec<String> = Vec::new();
    for item in items {
        let item = item.trim();
        if !item.is_empty() && !out.iter().any(|seen| seen == item) {
            out.push(item.to_string());
        }
    }
    out
}
