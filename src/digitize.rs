//! Exam pipeline: drive the page processor across both documents of an
//! exam, merge, and persist the result.
//!
//! One exam run is strictly sequential — question pages in order, then
//! answer pages in order, then the merge — because the page index doubles as
//! a cache-key component and must be stable across runs. A fatal error
//! (unknown exam, unreadable PDF) aborts that exam only; [`run_batch`] logs
//! it and continues with the remaining exams.

use crate::cache::ResultCache;
use crate::config::ExtractionConfig;
use crate::error::ExamError;
use crate::model::{AnswerFragment, ArtifactKind, Fragment, MergedRecord, QuestionFragment};
use crate::pipeline::client::{resolve_client, ExtractionClient};
use crate::pipeline::page::{PageOutcome, PageProcessor};
use crate::pipeline::{encode, merge, render};
use crate::prompts;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tracing::{error, info, warn};

/// Summary of one exam's persisted output.
#[derive(Debug, Clone)]
pub struct ExamOutput {
    pub exam: String,
    /// Number of merged records written.
    pub records: usize,
    /// The per-exam output JSON file.
    pub path: PathBuf,
}

/// Outcome of a multi-exam batch run.
#[derive(Debug, Clone, Default)]
pub struct BatchReport {
    pub succeeded: Vec<ExamOutput>,
    /// (exam code, error description) for exams whose run aborted.
    pub failed: Vec<(String, String)>,
}

impl BatchReport {
    pub fn all_succeeded(&self) -> bool {
        self.failed.is_empty()
    }
}

/// Process one exam end to end, returning the merged records.
///
/// Resolves the extraction client first; a missing credential fails here,
/// before any page work.
pub async fn process_exam(
    exam: &str,
    config: &ExtractionConfig,
) -> Result<Vec<MergedRecord>, ExamError> {
    let client = resolve_client(config)?;
    process_exam_with_client(exam, config, client).await
}

/// Process one exam and write `{exam}_exam.json` to the output directory.
pub async fn process_exam_to_file(
    exam: &str,
    config: &ExtractionConfig,
) -> Result<ExamOutput, ExamError> {
    let client = resolve_client(config)?;
    process_exam_to_file_with_client(exam, config, client).await
}

/// Process every configured exam strictly in sequence.
///
/// The client is resolved once up front — no credential means no partial
/// processing. Per-exam failures are logged, recorded in the report, and do
/// not stop the remaining exams.
pub async fn run_batch(config: &ExtractionConfig) -> Result<BatchReport, ExamError> {
    if config.exams.is_empty() {
        return Err(ExamError::InvalidConfig("no exams configured".into()));
    }
    let client = resolve_client(config)?;

    let mut report = BatchReport::default();
    for code in config.exams.codes() {
        info!("Processing {code} exam…");
        match process_exam_to_file_with_client(&code, config, Arc::clone(&client)).await {
            Ok(output) => {
                info!("Saved {} records to {}", output.records, output.path.display());
                report.succeeded.push(output);
            }
            Err(e) => {
                error!("Failed processing {code}: {e}");
                report.failed.push((code, e.to_string()));
            }
        }
    }
    Ok(report)
}

async fn process_exam_with_client(
    exam: &str,
    config: &ExtractionConfig,
    client: Arc<dyn ExtractionClient>,
) -> Result<Vec<MergedRecord>, ExamError> {
    let entry = config.exams.resolve(exam)?;
    let processor = PageProcessor::new(
        client,
        ResultCache::new(&config.cache_dir),
        config.max_retries,
        config.retry_backoff_ms,
    );

    let question_instruction = prompts::question_instruction(exam, &entry.syllabus);
    let questions: Vec<QuestionFragment> = process_document(
        &processor,
        exam,
        ArtifactKind::Questions,
        &entry.questions,
        &question_instruction,
        config,
    )
    .await?;

    let answer_instruction = prompts::answer_instruction(exam);
    let answers: Vec<AnswerFragment> = process_document(
        &processor,
        exam,
        ArtifactKind::Answers,
        &entry.answers,
        &answer_instruction,
        config,
    )
    .await?;

    let outcome = merge::merge(questions, &answers);
    for number in &outcome.duplicate_answers {
        warn!(
            exam,
            question = *number,
            "multiple answer fragments share this question number; check the transcription"
        );
    }

    if let Some(ref cb) = config.progress_callback {
        cb.on_exam_complete(exam, outcome.records.len());
    }
    info!(
        "{exam}: merged {} records ({} duplicate answer numbers flagged)",
        outcome.records.len(),
        outcome.duplicate_answers.len()
    );
    Ok(outcome.records)
}

async fn process_exam_to_file_with_client(
    exam: &str,
    config: &ExtractionConfig,
    client: Arc<dyn ExtractionClient>,
) -> Result<ExamOutput, ExamError> {
    let records = process_exam_with_client(exam, config, client).await?;
    let path = config
        .output_dir
        .join(format!("{}_exam.json", exam.to_lowercase()));
    write_records(&path, &records).await?;
    Ok(ExamOutput {
        exam: exam.to_string(),
        records: records.len(),
        path,
    })
}

/// Walk every page of one document through the page processor, in page
/// order, concatenating the per-page fragment lists.
async fn process_document<T: Fragment>(
    processor: &PageProcessor,
    exam: &str,
    kind: ArtifactKind,
    pdf_path: &Path,
    instruction: &str,
    config: &ExtractionConfig,
) -> Result<Vec<T>, ExamError> {
    let total = render::page_count(pdf_path).await?;
    let pages = match config.page_limit() {
        Some(limit) => total.min(limit),
        None => total,
    };
    if pages == 0 {
        warn!(exam, %kind, "document has no pages");
        return Ok(Vec::new());
    }

    let cached = processor.cache().lookup::<T>(exam, kind)?;
    let cached_pages = (0..pages).filter(|i| cached.contains_key(i)).count();
    info!(exam, %kind, pages, cached_pages, "processing document");

    if let Some(ref cb) = config.progress_callback {
        cb.on_document_start(exam, kind, pages);
    }

    // Fully cached document: serve everything from disk without opening the
    // PDF again. Rendering is cheap but not free, and a second run of an
    // already-digitized exam should touch nothing but the cache.
    if cached_pages == pages {
        let mut fragments = Vec::new();
        for page_index in 0..pages {
            let entry = &cached[&page_index];
            if let Some(ref cb) = config.progress_callback {
                cb.on_page_cached(page_index, entry.len());
            }
            fragments.extend(entry.iter().cloned());
        }
        return Ok(fragments);
    }

    let images = render::render_range(pdf_path, config.max_rendered_pixels, 1, pages).await?;

    let mut fragments = Vec::new();
    for (page_index, image) in images.iter().enumerate() {
        let encoded =
            encode::encode_page(image).map_err(|e| ExamError::RasterisationFailed {
                page: page_index + 1,
                detail: format!("image encoding failed: {e}"),
            })?;

        let outcome = processor
            .process::<T>(exam, kind, page_index, encoded, instruction)
            .await;

        if let Some(ref cb) = config.progress_callback {
            match &outcome {
                PageOutcome::Cached(f) => cb.on_page_cached(page_index, f.len()),
                PageOutcome::Extracted(f) => cb.on_page_extracted(page_index, f.len()),
                PageOutcome::Failed(e) => cb.on_page_failed(page_index, &e.to_string()),
            }
        }
        fragments.extend(outcome.into_fragments());
    }
    Ok(fragments)
}

/// Atomic output write: temp file + rename, so a crash never leaves a
/// half-written exam file behind.
async fn write_records(path: &Path, records: &[MergedRecord]) -> Result<(), ExamError> {
    if let Some(parent) = path.parent() {
        tokio::fs::create_dir_all(parent)
            .await
            .map_err(|e| ExamError::OutputWriteFailed {
                path: path.to_path_buf(),
                source: e,
            })?;
    }

    let json = serde_json::to_string_pretty(records)
        .map_err(|e| ExamError::Internal(format!("output serialisation: {e}")))?;

    let tmp_path = path.with_extension("json.tmp");
    tokio::fs::write(&tmp_path, json)
        .await
        .map_err(|e| ExamError::OutputWriteFailed {
            path: path.to_path_buf(),
            source: e,
        })?;

    tokio::fs::rename(&tmp_path, path)
        .await
        .map_err(|e| ExamError::OutputWriteFailed {
            path: path.to_path_buf(),
            source: e,
        })?;

    Ok(())
}
