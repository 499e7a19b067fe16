//! The page processor: the pipeline's unit of work and of failure isolation.
//!
//! For one page: cache lookup → extraction call (on miss) → response parse →
//! cache write. Every call either returns fragments consistent with what is
//! durably cached, or returns nothing without touching the cache. A page is
//! cached only after a successful parse, so failed pages stay eligible for
//! retry on the next run — that asymmetry is the whole recovery story.
//!
//! ## Retry strategy
//!
//! Transport errors get bounded in-run retries with exponential backoff
//! (`retry_backoff_ms * 2^attempt`). Malformed content does not: at
//! temperature 0 the model would return the same bytes, so re-asking within
//! the run only burns tokens. Either way the page ends the run uncached and
//! a later run re-attempts it.

use crate::cache::ResultCache;
use crate::error::PageError;
use crate::model::{ArtifactKind, Fragment};
use crate::pipeline::client::ExtractionClient;
use edgequake_llm::ImageData;
use once_cell::sync::Lazy;
use regex::Regex;
use std::sync::Arc;
use tokio::time::{sleep, Duration};
use tracing::{debug, error, warn};

/// How a page's fragments were obtained.
#[derive(Debug)]
pub enum PageOutcome<T> {
    /// Served from the result cache; no extraction call was made.
    Cached(Vec<T>),
    /// Extracted, parsed, and written to the cache in this run.
    Extracted(Vec<T>),
    /// Extraction or parsing failed; nothing cached, retried next run.
    Failed(PageError),
}

impl<T> PageOutcome<T> {
    /// Collapse to the fragment list; a failed page yields no fragments.
    pub fn into_fragments(self) -> Vec<T> {
        match self {
            PageOutcome::Cached(f) | PageOutcome::Extracted(f) => f,
            PageOutcome::Failed(_) => Vec::new(),
        }
    }
}

/// Orchestrates cache, extraction client, and response parsing for single
/// pages.
pub struct PageProcessor {
    client: Arc<dyn ExtractionClient>,
    cache: ResultCache,
    max_retries: u32,
    retry_backoff_ms: u64,
}

impl PageProcessor {
    pub fn new(
        client: Arc<dyn ExtractionClient>,
        cache: ResultCache,
        max_retries: u32,
        retry_backoff_ms: u64,
    ) -> Self {
        PageProcessor {
            client,
            cache,
            max_retries,
            retry_backoff_ms,
        }
    }

    pub fn cache(&self) -> &ResultCache {
        &self.cache
    }

    /// Process one page of one document.
    ///
    /// A cache hit short-circuits all extraction work. On a miss the page is
    /// extracted, parsed as a JSON fragment array, validated, and cached.
    /// All per-page failures degrade to [`PageOutcome::Failed`] — they never
    /// propagate and never write a cache entry.
    pub async fn process<T: Fragment>(
        &self,
        exam: &str,
        kind: ArtifactKind,
        page_index: usize,
        image: ImageData,
        instruction: &str,
    ) -> PageOutcome<T> {
        if let Some(cached) = self.cache.get::<T>(exam, kind, page_index) {
            debug!(exam, %kind, page_index, count = cached.len(), "cache hit");
            return PageOutcome::Cached(cached);
        }

        let raw = match self.extract_with_retry(page_index, &image, instruction).await {
            Ok(raw) => raw,
            Err(page_err) => {
                error!(exam, %kind, page_index, "{page_err}");
                return PageOutcome::Failed(page_err);
            }
        };

        let fragments = match parse_fragments::<T>(&raw) {
            Ok(fragments) => fragments,
            Err(detail) => {
                let page_err = PageError::MalformedResponse {
                    page: page_index,
                    detail,
                    raw: raw.clone(),
                };
                error!(exam, %kind, page_index, raw_response = %raw, "{page_err}");
                return PageOutcome::Failed(page_err);
            }
        };

        // Store failures degrade to "not cached": the fragments are still
        // returned for this run and the page is re-extracted next run.
        if let Err(e) = self.cache.store(exam, kind, page_index, &fragments) {
            warn!(exam, %kind, page_index, "cache write failed: {e}");
        }

        PageOutcome::Extracted(fragments)
    }

    async fn extract_with_retry(
        &self,
        page_index: usize,
        image: &ImageData,
        instruction: &str,
    ) -> Result<String, PageError> {
        let mut last_err = String::new();

        for attempt in 0..=self.max_retries {
            if attempt > 0 {
                let backoff = self.retry_backoff_ms * 2u64.pow(attempt - 1);
                warn!(
                    "page {}: retry {}/{} after {}ms",
                    page_index, attempt, self.max_retries, backoff
                );
                sleep(Duration::from_millis(backoff)).await;
            }

            match self.client.extract(instruction, image.clone()).await {
                Ok(raw) => return Ok(raw),
                Err(e) => {
                    warn!("page {}: attempt {} failed — {}", page_index, attempt + 1, e);
                    last_err = e.to_string();
                }
            }
        }

        Err(PageError::ExtractionFailed {
            page: page_index,
            retries: self.max_retries,
            detail: last_err,
        })
    }
}

// Models occasionally fence the array despite the prompt saying not to;
// tolerate exactly that and nothing else.
static RE_OUTER_FENCE: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"(?s)^```(?:json)?\s*\n(.*)\n```\s*$").unwrap());

/// Parse the raw response text as a validated fragment array.
pub fn parse_fragments<T: Fragment>(raw: &str) -> Result<Vec<T>, String> {
    let trimmed = raw.trim();
    let body = match RE_OUTER_FENCE.captures(trimmed) {
        Some(caps) => caps[1].to_string(),
        None => trimmed.to_string(),
    };

    let fragments: Vec<T> =
        serde_json::from_str(&body).map_err(|e| format!("not a fragment array: {e}"))?;

    for (i, fragment) in fragments.iter().enumerate() {
        fragment
            .validate()
            .map_err(|e| format!("fragment {i} failed validation: {e}"))?;
    }

    Ok(fragments)
}
