//! # exam2json
//!
//! Digitize multi-page scanned exam PDFs into structured, machine-readable
//! question/answer records using Vision Language Models.
//!
//! ## Why this crate?
//!
//! Scanned exam documents defeat text extraction: the questions are dense
//! with mathematical notation, the answer keys are letter grids, and plain
//! OCR garbles both. Instead this crate rasterises each page into a PNG and
//! lets a VLM transcribe it into JSON fragments, then joins question
//! fragments with answer fragments by question number into complete,
//! answer-linked records.
//!
//! ## Pipeline Overview
//!
//! ```text
//! exam PDFs (questions + answers)
//!  │
//!  ├─ 1. Render   rasterise pages via pdfium (CPU-bound, spawn_blocking)
//!  ├─ 2. Encode   PNG → base64 ImageData
//!  ├─ 3. Extract  per-page VLM call, short-circuited by the result cache
//!  ├─ 4. Cache    one JSON file per (exam, artifact type, page index)
//!  ├─ 5. Merge    join questions with answers by question number
//!  └─ 6. Output   one JSON file per exam
//! ```
//!
//! ## Resumability
//!
//! Every successfully parsed page is cached on disk before the pipeline
//! moves on. Rerunning an exam re-extracts only the pages that never made
//! it into the cache — a failed page costs one page, never the exam.
//! Entries are never invalidated automatically; delete a cache file to
//! force that page through extraction again.
//!
//! ## Quick Start
//!
//! ```rust,no_run
//! use exam2json::{process_exam, ExamRegistry, ExtractionConfig};
//!
//! #[tokio::main]
//! async fn main() -> Result<(), Box<dyn std::error::Error>> {
//!     // Provider auto-detected from ANTHROPIC_API_KEY / OPENAI_API_KEY / …
//!     let config = ExtractionConfig::builder()
//!         .exams(ExamRegistry::actuarial_samples("pdf"))
//!         .build()?;
//!     let records = process_exam("P", &config).await?;
//!     println!("{} records", records.len());
//!     Ok(())
//! }
//! ```
//!
//! ## Feature Flags
//!
//! | Feature | Default | Description |
//! |---------|---------|-------------|
//! | `cli`   | on      | Enables the `exam2json` binary (clap + anyhow + indicatif + tracing-subscriber) |
//!
//! Disable `cli` when using only the library:
//! ```toml
//! exam2json = { version = "0.3", default-features = false }
//! ```

// ── Modules ──────────────────────────────────────────────────────────────

pub mod cache;
pub mod config;
pub mod digitize;
pub mod error;
pub mod model;
pub mod pipeline;
pub mod progress;
pub mod prompts;

// ── Re-exports ───────────────────────────────────────────────────────────

pub use cache::ResultCache;
pub use config::{ExamEntry, ExamRegistry, ExtractionConfig, ExtractionConfigBuilder};
pub use digitize::{process_exam, process_exam_to_file, run_batch, BatchReport, ExamOutput};
pub use error::{ExamError, PageError};
pub use model::{AnswerFragment, ArtifactKind, Choice, Fragment, MergedRecord, QuestionFragment};
pub use pipeline::client::{resolve_client, ExtractionClient, TransportError, VisionClient};
pub use pipeline::merge::{merge, MergeOutcome};
pub use pipeline::page::{PageOutcome, PageProcessor};
pub use progress::{ExamProgressCallback, ProgressCallback};
