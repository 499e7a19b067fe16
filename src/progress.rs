//! Progress-callback trait for per-page pipeline events.
//!
//! Inject an [`Arc<dyn ExamProgressCallback>`] via
//! [`crate::config::ExtractionConfigBuilder::progress_callback`] to receive
//! events as the pipeline walks an exam's pages. The callback approach keeps
//! the library ignorant of how the host reports progress — terminal bar,
//! channel, database row — and tests can count events without any terminal.
//!
//! All methods default to no-ops so implementations override only what they
//! care about. The pipeline is sequential, but the trait is `Send + Sync` so
//! the same callback can be shared with logging or metrics tasks.

use crate::model::ArtifactKind;
use std::sync::Arc;

/// Convenience alias for the shared callback handle.
pub type ProgressCallback = Arc<dyn ExamProgressCallback>;

/// Called by the pipeline as it processes each document page.
pub trait ExamProgressCallback: Send + Sync {
    /// Called once per (exam, artifact kind) document, before any page.
    fn on_document_start(&self, exam: &str, kind: ArtifactKind, total_pages: usize) {
        let _ = (exam, kind, total_pages);
    }

    /// Called when a page is served from the result cache.
    fn on_page_cached(&self, page_index: usize, fragments: usize) {
        let _ = (page_index, fragments);
    }

    /// Called when a page was extracted, parsed, and cached.
    fn on_page_extracted(&self, page_index: usize, fragments: usize) {
        let _ = (page_index, fragments);
    }

    /// Called when a page failed (extraction or parse) and yielded nothing.
    fn on_page_failed(&self, page_index: usize, error: &str) {
        let _ = (page_index, error);
    }

    /// Called after the merge step with the final record count.
    fn on_exam_complete(&self, exam: &str, records: usize) {
        let _ = (exam, records);
    }
}
