//! Configuration types for exam digitization.
//!
//! Every knob lives in [`ExtractionConfig`], built via its
//! [`ExtractionConfigBuilder`]. The exam registry is an explicit immutable
//! value passed into the pipeline rather than a process-wide table, so tests
//! can run several registries side by side and the library never touches
//! global state.
//!
//! # Design choice: builder over constructor
//! A dozen-field constructor is unreadable and breaks on every new field.
//! The builder lets callers set only what they care about and rely on
//! documented defaults for the rest.

use crate::error::ExamError;
use crate::pipeline::client::ExtractionClient;
use crate::progress::ProgressCallback;
use std::collections::BTreeMap;
use std::fmt;
use std::path::{Path, PathBuf};
use std::sync::Arc;

/// Source documents and syllabus for one exam.
#[derive(Debug, Clone, PartialEq)]
pub struct ExamEntry {
    /// PDF containing the question document.
    pub questions: PathBuf,
    /// PDF containing the answer/solutions document.
    pub answers: PathBuf,
    /// Syllabus categories the extractor must choose from.
    pub syllabus: Vec<String>,
}

/// Immutable map from exam code to its [`ExamEntry`].
#[derive(Debug, Clone, Default)]
pub struct ExamRegistry {
    entries: BTreeMap<String, ExamEntry>,
}

impl ExamRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Builder-style insertion.
    pub fn with_exam(mut self, code: impl Into<String>, entry: ExamEntry) -> Self {
        self.entries.insert(code.into(), entry);
        self
    }

    pub fn get(&self, code: &str) -> Option<&ExamEntry> {
        self.entries.get(code)
    }

    /// Look up an exam, failing with the configured codes listed so the
    /// operator can see what would have been valid.
    pub fn resolve(&self, code: &str) -> Result<&ExamEntry, ExamError> {
        self.entries.get(code).ok_or_else(|| ExamError::UnknownExam {
            code: code.to_string(),
            known: self.codes(),
        })
    }

    /// Configured exam codes in sorted order.
    pub fn codes(&self) -> Vec<String> {
        self.entries.keys().cloned().collect()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = (&String, &ExamEntry)> {
        self.entries.iter()
    }

    /// The SOA sample-exam registry (exams P and FM) with documents resolved
    /// relative to `pdf_dir`.
    pub fn actuarial_samples(pdf_dir: impl AsRef<Path>) -> Self {
        let pdf_dir = pdf_dir.as_ref();
        Self::new()
            .with_exam(
                "P",
                ExamEntry {
                    questions: pdf_dir.join("edu-exam-p-sample-quest.pdf"),
                    answers: pdf_dir.join("edu-exam-p-sample-sol.pdf"),
                    syllabus: vec![
                        "General Probability".into(),
                        "Univariate Random Variables".into(),
                        "Multivariate Random Variables".into(),
                    ],
                },
            )
            .with_exam(
                "FM",
                ExamEntry {
                    questions: pdf_dir.join("exam-fm-sample-questions.pdf"),
                    answers: pdf_dir.join("2018-10-exam-fm-sample-solutions.pdf"),
                    syllabus: vec![
                        "Time Value of Money".into(),
                        "Annuities".into(),
                        "Bonds".into(),
                        "Cash Flows, Portfolios, and Asset Liability Management".into(),
                    ],
                },
            )
    }
}

/// Configuration for a digitization run.
///
/// Built via [`ExtractionConfig::builder()`] or [`ExtractionConfig::default()`].
///
/// # Example
/// ```rust
/// use exam2json::{ExamRegistry, ExtractionConfig};
///
/// let config = ExtractionConfig::builder()
///     .exams(ExamRegistry::actuarial_samples("pdf"))
///     .test_mode(true)
///     .model("claude-sonnet-4-20250514")
///     .build()
///     .unwrap();
/// ```
#[derive(Clone)]
pub struct ExtractionConfig {
    /// Exam registry: code → source documents + syllabus.
    pub exams: ExamRegistry,

    /// Directory holding the per-page result cache. Default: `interim`.
    pub cache_dir: PathBuf,

    /// Directory receiving the per-exam output JSON files. Default: `processed`.
    pub output_dir: PathBuf,

    /// Vision model identifier, e.g. "claude-sonnet-4-20250514".
    /// If None, uses the provider default.
    pub model: Option<String>,

    /// Provider name (e.g. "anthropic", "openai").
    /// If None along with `client`, auto-detects from the environment.
    pub provider_name: Option<String>,

    /// Pre-constructed extraction client. Takes precedence over
    /// `provider_name`; this is how tests inject a mock.
    pub client: Option<Arc<dyn ExtractionClient>>,

    /// Maximum tokens the model may generate per page. Default: 4096.
    ///
    /// A dense question page with five KaTeX-heavy items runs well past
    /// 2 000 output tokens; too low a cap truncates the JSON mid-array and
    /// the whole page degrades to a malformed-response retry.
    pub max_tokens: usize,

    /// Sampling temperature. Default: 0.0.
    ///
    /// Transcription wants determinism: the same page should produce the
    /// same fragments, and rerunning a malformed page should not be a dice
    /// roll on formatting.
    pub temperature: f32,

    /// Retry attempts on a transport failure. Default: 2.
    ///
    /// Only the call itself is retried; a response that parsed badly is not
    /// (at temperature 0 it would come back byte-identical). The page stays
    /// uncached either way, so the next run retries it for free.
    pub max_retries: u32,

    /// Initial retry delay in milliseconds (doubles per attempt). Default: 500.
    pub retry_backoff_ms: u64,

    /// Maximum rendered image dimension (width or height) in pixels.
    /// Default: 2000.
    ///
    /// Caps pdfium's allocation regardless of physical page size and keeps
    /// the PNG below typical multimodal upload limits.
    pub max_rendered_pixels: u32,

    /// Restrict each document to its first `test_pages` pages. Default: false.
    pub test_mode: bool,

    /// Page count used in test mode. Default: 2.
    pub test_pages: usize,

    /// Optional per-page progress events (used by the CLI progress bar).
    pub progress_callback: Option<ProgressCallback>,
}

impl Default for ExtractionConfig {
    fn default() -> Self {
        Self {
            exams: ExamRegistry::default(),
            cache_dir: PathBuf::from("interim"),
            output_dir: PathBuf::from("processed"),
            model: None,
            provider_name: None,
            client: None,
            max_tokens: 4096,
            temperature: 0.0,
            max_retries: 2,
            retry_backoff_ms: 500,
            max_rendered_pixels: 2000,
            test_mode: false,
            test_pages: 2,
            progress_callback: None,
        }
    }
}

impl fmt::Debug for ExtractionConfig {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ExtractionConfig")
            .field("exams", &self.exams.codes())
            .field("cache_dir", &self.cache_dir)
            .field("output_dir", &self.output_dir)
            .field("model", &self.model)
            .field("provider_name", &self.provider_name)
            .field("client", &self.client.as_ref().map(|_| "<dyn ExtractionClient>"))
            .field("max_tokens", &self.max_tokens)
            .field("temperature", &self.temperature)
            .field("max_retries", &self.max_retries)
            .field("max_rendered_pixels", &self.max_rendered_pixels)
            .field("test_mode", &self.test_mode)
            .field("test_pages", &self.test_pages)
            .finish()
    }
}

impl ExtractionConfig {
    /// Create a new builder for `ExtractionConfig`.
    pub fn builder() -> ExtractionConfigBuilder {
        ExtractionConfigBuilder {
            config: Self::default(),
        }
    }

    /// Page indices processed per document: `0..test_pages` in test mode,
    /// the full document otherwise.
    pub fn page_limit(&self) -> Option<usize> {
        self.test_mode.then_some(self.test_pages)
    }
}

/// Builder for [`ExtractionConfig`].
pub struct ExtractionConfigBuilder {
    config: ExtractionConfig,
}

impl ExtractionConfigBuilder {
    pub fn exams(mut self, registry: ExamRegistry) -> Self {
        self.config.exams = registry;
        self
    }

    pub fn cache_dir(mut self, dir: impl Into<PathBuf>) -> Self {
        self.config.cache_dir = dir.into();
        self
    }

    pub fn output_dir(mut self, dir: impl Into<PathBuf>) -> Self {
        self.config.output_dir = dir.into();
        self
    }

    pub fn model(mut self, model: impl Into<String>) -> Self {
        self.config.model = Some(model.into());
        self
    }

    pub fn provider_name(mut self, name: impl Into<String>) -> Self {
        self.config.provider_name = Some(name.into());
        self
    }

    pub fn client(mut self, client: Arc<dyn ExtractionClient>) -> Self {
        self.config.client = Some(client);
        self
    }

    pub fn max_tokens(mut self, n: usize) -> Self {
        self.config.max_tokens = n;
        self
    }

    pub fn temperature(mut self, t: f32) -> Self {
        self.config.temperature = t.clamp(0.0, 2.0);
        self
    }

    pub fn max_retries(mut self, n: u32) -> Self {
        self.config.max_retries = n;
        self
    }

    pub fn retry_backoff_ms(mut self, ms: u64) -> Self {
        self.config.retry_backoff_ms = ms;
        self
    }

    pub fn max_rendered_pixels(mut self, px: u32) -> Self {
        self.config.max_rendered_pixels = px.max(100);
        self
    }

    pub fn test_mode(mut self, v: bool) -> Self {
        self.config.test_mode = v;
        self
    }

    pub fn test_pages(mut self, n: usize) -> Self {
        self.config.test_pages = n;
        self
    }

    pub fn progress_callback(mut self, cb: ProgressCallback) -> Self {
        self.config.progress_callback = Some(cb);
        self
    }

    /// Build the configuration, validating constraints.
    pub fn build(self) -> Result<ExtractionConfig, ExamError> {
        let c = &self.config;
        if c.max_tokens == 0 {
            return Err(ExamError::InvalidConfig("max_tokens must be ≥ 1".into()));
        }
        if c.test_pages == 0 {
            return Err(ExamError::InvalidConfig("test_pages must be ≥ 1".into()));
        }
        Ok(self.config)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn builder_defaults_build() {
        let config = ExtractionConfig::builder().build().unwrap();
        assert_eq!(config.max_tokens, 4096);
        assert_eq!(config.temperature, 0.0);
        assert!(!config.test_mode);
        assert_eq!(config.page_limit(), None);
    }

    #[test]
    fn test_mode_limits_pages() {
        let config = ExtractionConfig::builder()
            .test_mode(true)
            .test_pages(3)
            .build()
            .unwrap();
        assert_eq!(config.page_limit(), Some(3));
    }

    #[test]
    fn zero_test_pages_rejected() {
        let result = ExtractionConfig::builder().test_pages(0).build();
        assert!(matches!(result, Err(ExamError::InvalidConfig(_))));
    }

    #[test]
    fn temperature_is_clamped() {
        let config = ExtractionConfig::builder().temperature(-1.0).build().unwrap();
        assert_eq!(config.temperature, 0.0);
    }

    #[test]
    fn registry_resolves_known_and_rejects_unknown() {
        let registry = ExamRegistry::actuarial_samples("pdf");
        assert!(registry.resolve("P").is_ok());
        assert!(registry.resolve("FM").is_ok());

        let err = registry.resolve("XX").unwrap_err();
        match err {
            ExamError::UnknownExam { code, known } => {
                assert_eq!(code, "XX");
                assert_eq!(known, vec!["FM".to_string(), "P".to_string()]);
            }
            other => panic!("expected UnknownExam, got {other:?}"),
        }
    }

    #[test]
    fn sample_registry_paths_live_under_pdf_dir() {
        let registry = ExamRegistry::actuarial_samples("/data/pdf");
        let p = registry.get("P").unwrap();
        assert!(p.questions.starts_with("/data/pdf"));
        assert_eq!(p.syllabus.len(), 3);
    }
}
