//! Error types for the exam2json library.
//!
//! Two distinct error types reflect two distinct failure modes:
//!
//! * [`ExamError`] — **Fatal**: an exam run cannot proceed at all (unknown
//!   exam code, missing API credential, unreadable PDF). Returned as
//!   `Err(ExamError)` from the top-level `process_exam*` functions. A fatal
//!   error aborts that exam only; a batch run logs it and continues with the
//!   remaining exams.
//!
//! * [`PageError`] — **Non-fatal**: a single page failed (extraction call
//!   errored, response was not the expected JSON). The page yields an empty
//!   fragment list, nothing is cached for it, and the next run retries it.
//!
//! The separation is what makes the pipeline resumable: only the page level
//! degrades, and it degrades to "no fragments, retry later" rather than to a
//! corrupted cache entry.

use std::path::PathBuf;
use thiserror::Error;

/// All fatal errors returned by the exam2json library.
///
/// Page-level failures use [`PageError`] and are logged by the
/// [`crate::pipeline::page::PageProcessor`] rather than propagated here.
#[derive(Debug, Error)]
pub enum ExamError {
    // ── Configuration errors ──────────────────────────────────────────────
    /// The exam code is not present in the configured registry.
    #[error("Unknown exam code '{code}'\nConfigured exams: {known:?}")]
    UnknownExam { code: String, known: Vec<String> },

    /// No extraction provider could be resolved (missing API key etc.).
    #[error("Extraction provider '{provider}' is not configured.\n{hint}")]
    ProviderNotConfigured { provider: String, hint: String },

    /// Builder validation failed.
    #[error("Invalid configuration: {0}")]
    InvalidConfig(String),

    // ── Document errors ───────────────────────────────────────────────────
    /// A configured source PDF was not found at the given path.
    #[error("PDF file not found: '{path}'\nCheck the path exists and is readable.")]
    PdfNotFound { path: PathBuf },

    /// PDF header/trailer/xref is corrupt and cannot be parsed.
    #[error("PDF '{path}' is corrupt: {detail}")]
    CorruptPdf { path: PathBuf, detail: String },

    /// pdfium-render returned an error for a specific page.
    #[error("Rasterisation failed for page {page}: {detail}")]
    RasterisationFailed { page: usize, detail: String },

    /// The requested page range does not intersect the document.
    #[error("Page {page} is out of range (document has {total} pages)")]
    PageOutOfRange { page: usize, total: usize },

    // ── I/O errors ────────────────────────────────────────────────────────
    /// Could not create or write the per-exam output JSON file.
    #[error("Failed to write output file '{path}': {source}")]
    OutputWriteFailed {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    /// Cache directory could not be created or listed.
    #[error("Cache I/O error at '{path}': {source}")]
    CacheIo {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    // ── Catch-all ─────────────────────────────────────────────────────────
    /// Unexpected internal error.
    #[error("Internal error: {0}")]
    Internal(String),
}

/// A non-fatal error for a single page.
///
/// The affected page yields no fragments and is left uncached so a later run
/// retries it. The raw response is carried for diagnosis; it is logged, never
/// persisted.
#[derive(Debug, Clone, Error)]
pub enum PageError {
    /// The extraction call itself failed (transport or service error),
    /// including after bounded retries.
    #[error("Page {page}: extraction failed after {retries} retries: {detail}")]
    ExtractionFailed {
        page: usize,
        retries: u32,
        detail: String,
    },

    /// The response arrived but is not a valid JSON fragment array.
    #[error("Page {page}: malformed response: {detail}")]
    MalformedResponse {
        page: usize,
        detail: String,
        raw: String,
    },
}
