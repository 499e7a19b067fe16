//! Integration tests for the extraction-and-merge pipeline.
//!
//! These use a scripted [`ExtractionClient`] and tempdir-backed cache/output
//! directories, so they exercise the real page processor, cache, and merge
//! code paths without pdfium or a live API.

use async_trait::async_trait;
use edgequake_llm::ImageData;
use exam2json::{
    merge, ArtifactKind, AnswerFragment, ExamEntry, ExamError, ExamRegistry, ExtractionClient,
    ExtractionConfig, PageOutcome, PageProcessor, QuestionFragment, ResultCache, TransportError,
};
use std::collections::VecDeque;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};

// ── Test helpers ─────────────────────────────────────────────────────────────

/// Extraction client that replays a scripted sequence of responses and
/// counts how many calls it received.
struct ScriptedClient {
    responses: Mutex<VecDeque<Result<String, TransportError>>>,
    calls: AtomicUsize,
}

impl ScriptedClient {
    fn new(responses: Vec<Result<String, TransportError>>) -> Arc<Self> {
        Arc::new(Self {
            responses: Mutex::new(responses.into()),
            calls: AtomicUsize::new(0),
        })
    }

    fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl ExtractionClient for ScriptedClient {
    async fn extract(&self, _instruction: &str, _image: ImageData) -> Result<String, TransportError> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        self.responses
            .lock()
            .unwrap()
            .pop_front()
            .unwrap_or_else(|| Err(TransportError("script exhausted".into())))
    }
}

fn page_image() -> ImageData {
    // The mock never decodes it; any base64 will do.
    ImageData::new("Zm9v".to_string(), "image/png")
}

fn processor(client: Arc<ScriptedClient>, cache: &ResultCache) -> PageProcessor {
    // 1 ms backoff keeps retry tests fast.
    PageProcessor::new(client, cache.clone(), 0, 1)
}

const QUESTION_PAGE: &str = r#"[{
    "exam": "P",
    "question": 1,
    "content": "Calculate $P(X > 3)$ where $X$ follows...",
    "choices": [
        {"letter": "A", "content": "$0.25$"},
        {"letter": "B", "content": "$0.35$"}
    ],
    "syllabus_category": "General Probability",
    "severity": 1
}]"#;

const ANSWER_PAGE: &str =
    r#"[{"question": 1, "answer": "B", "explanation": "Integrate the density."}]"#;

// ── Idempotence ──────────────────────────────────────────────────────────────

#[tokio::test]
async fn second_run_is_served_from_cache_with_zero_calls() {
    let dir = tempfile::tempdir().unwrap();
    let cache = ResultCache::new(dir.path());
    let client = ScriptedClient::new(vec![Ok(QUESTION_PAGE.to_string())]);
    let proc = processor(Arc::clone(&client), &cache);

    let first = proc
        .process::<QuestionFragment>("P", ArtifactKind::Questions, 0, page_image(), "q")
        .await;
    let first = match first {
        PageOutcome::Extracted(f) => f,
        other => panic!("expected Extracted, got {other:?}"),
    };
    assert_eq!(client.calls(), 1);

    let second = proc
        .process::<QuestionFragment>("P", ArtifactKind::Questions, 0, page_image(), "q")
        .await;
    match second {
        PageOutcome::Cached(f) => assert_eq!(f, first),
        other => panic!("expected Cached, got {other:?}"),
    }
    assert_eq!(client.calls(), 1, "cache hit must not call the service");
}

// ── Resumability ─────────────────────────────────────────────────────────────

#[tokio::test]
async fn failed_page_stays_uncached_and_is_retried_next_run() {
    let dir = tempfile::tempdir().unwrap();
    let cache = ResultCache::new(dir.path());

    // Run 1: page 0 succeeds, page 1 fails at the transport level.
    let client = ScriptedClient::new(vec![
        Ok(ANSWER_PAGE.to_string()),
        Err(TransportError("503 overloaded".into())),
    ]);
    let proc = processor(Arc::clone(&client), &cache);

    let ok = proc
        .process::<AnswerFragment>("P", ArtifactKind::Answers, 0, page_image(), "a")
        .await;
    assert!(matches!(ok, PageOutcome::Extracted(_)));
    let failed = proc
        .process::<AnswerFragment>("P", ArtifactKind::Answers, 1, page_image(), "a")
        .await;
    assert!(matches!(failed, PageOutcome::Failed(_)));
    assert_eq!(client.calls(), 2);

    assert!(cache.get::<AnswerFragment>("P", ArtifactKind::Answers, 0).is_some());
    assert!(
        cache.get::<AnswerFragment>("P", ArtifactKind::Answers, 1).is_none(),
        "failed page must not be cached"
    );

    // Run 2: page 0 is a cache hit, only page 1 goes back to the service.
    let client = ScriptedClient::new(vec![Ok(r#"[{"question": 2, "answer": "C"}]"#.to_string())]);
    let proc = processor(Arc::clone(&client), &cache);

    let hit = proc
        .process::<AnswerFragment>("P", ArtifactKind::Answers, 0, page_image(), "a")
        .await;
    assert!(matches!(hit, PageOutcome::Cached(_)));
    let recovered = proc
        .process::<AnswerFragment>("P", ArtifactKind::Answers, 1, page_image(), "a")
        .await;
    assert!(matches!(recovered, PageOutcome::Extracted(_)));
    assert_eq!(client.calls(), 1, "only the failed page re-invokes extraction");
}

#[tokio::test]
async fn transport_errors_are_retried_with_bounded_attempts() {
    let dir = tempfile::tempdir().unwrap();
    let cache = ResultCache::new(dir.path());
    let client = ScriptedClient::new(vec![
        Err(TransportError("reset".into())),
        Err(TransportError("reset".into())),
        Ok(ANSWER_PAGE.to_string()),
    ]);
    let proc = PageProcessor::new(Arc::clone(&client) as Arc<dyn ExtractionClient>, cache.clone(), 2, 1);

    let outcome = proc
        .process::<AnswerFragment>("P", ArtifactKind::Answers, 0, page_image(), "a")
        .await;
    assert!(matches!(outcome, PageOutcome::Extracted(_)));
    assert_eq!(client.calls(), 3);
}

// ── Malformed-response safety ────────────────────────────────────────────────

#[tokio::test]
async fn malformed_response_returns_empty_and_writes_nothing() {
    let dir = tempfile::tempdir().unwrap();
    let cache = ResultCache::new(dir.path());
    let client = ScriptedClient::new(vec![
        Ok("I could not find any questions on this page.".to_string()),
        Ok(QUESTION_PAGE.to_string()),
    ]);
    let proc = processor(Arc::clone(&client), &cache);

    let outcome = proc
        .process::<QuestionFragment>("P", ArtifactKind::Questions, 0, page_image(), "q")
        .await;
    match outcome {
        PageOutcome::Failed(e) => assert!(e.to_string().contains("malformed")),
        other => panic!("expected Failed, got {other:?}"),
    }
    assert!(
        cache.get::<QuestionFragment>("P", ArtifactKind::Questions, 0).is_none(),
        "malformed page must not be cached"
    );

    // A later run with a valid response caches normally.
    let outcome = proc
        .process::<QuestionFragment>("P", ArtifactKind::Questions, 0, page_image(), "q")
        .await;
    assert!(matches!(outcome, PageOutcome::Extracted(_)));
    let cached = cache.get::<QuestionFragment>("P", ArtifactKind::Questions, 0).unwrap();
    assert_eq!(cached[0].question, 1);
}

#[tokio::test]
async fn malformed_content_is_not_retried_in_run() {
    let dir = tempfile::tempdir().unwrap();
    let cache = ResultCache::new(dir.path());
    let client = ScriptedClient::new(vec![Ok("not json".to_string())]);
    // Retries configured, but they only apply to transport failures.
    let proc = PageProcessor::new(Arc::clone(&client) as Arc<dyn ExtractionClient>, cache.clone(), 3, 1);

    let outcome = proc
        .process::<AnswerFragment>("P", ArtifactKind::Answers, 0, page_image(), "a")
        .await;
    assert!(matches!(outcome, PageOutcome::Failed(_)));
    assert_eq!(client.calls(), 1);
}

// ── Cache-key isolation ──────────────────────────────────────────────────────

#[tokio::test]
async fn exams_kinds_and_pages_do_not_cross_contaminate() {
    let dir = tempfile::tempdir().unwrap();
    let cache = ResultCache::new(dir.path());

    let client = ScriptedClient::new(vec![Ok(QUESTION_PAGE.to_string())]);
    let proc = processor(Arc::clone(&client), &cache);
    proc.process::<QuestionFragment>("P", ArtifactKind::Questions, 0, page_image(), "q")
        .await;

    // Same page index, different exam: miss.
    assert!(cache.get::<QuestionFragment>("FM", ArtifactKind::Questions, 0).is_none());
    // Same exam and page, different kind: miss.
    assert!(cache.get::<AnswerFragment>("P", ArtifactKind::Answers, 0).is_none());
    // Same exam and kind, different page: miss.
    assert!(cache.get::<QuestionFragment>("P", ArtifactKind::Questions, 1).is_none());
    // The original key: hit.
    assert!(cache.get::<QuestionFragment>("P", ArtifactKind::Questions, 0).is_some());
}

// ── End-to-end scenario (mocked documents) ───────────────────────────────────

#[tokio::test]
async fn two_page_question_document_merges_with_answer_document() {
    let dir = tempfile::tempdir().unwrap();
    let cache = ResultCache::new(dir.path());

    // Question document: page 0 has a question, page 1 is a cover page.
    let client = ScriptedClient::new(vec![
        Ok(QUESTION_PAGE.to_string()),
        Ok("[]".to_string()),
        Ok(ANSWER_PAGE.to_string()),
    ]);
    let proc = processor(Arc::clone(&client), &cache);

    let mut questions: Vec<QuestionFragment> = Vec::new();
    for page in 0..2 {
        let outcome = proc
            .process::<QuestionFragment>("P", ArtifactKind::Questions, page, page_image(), "q")
            .await;
        questions.extend(outcome.into_fragments());
    }

    let mut answers: Vec<AnswerFragment> = Vec::new();
    let outcome = proc
        .process::<AnswerFragment>("P", ArtifactKind::Answers, 0, page_image(), "a")
        .await;
    answers.extend(outcome.into_fragments());

    let merged = merge(questions, &answers);
    assert_eq!(merged.records.len(), 1);
    let record = &merged.records[0];
    assert_eq!(record.question, 1);
    assert_eq!(record.answer.as_deref(), Some("B"));
    assert_eq!(record.explanation.as_deref(), Some("Integrate the density."));
    assert_eq!(record.severity, 1);
    assert!(merged.duplicate_answers.is_empty());

    // The empty page 1 is cached as [], so a rerun is entirely cache-served.
    assert_eq!(
        cache.get::<QuestionFragment>("P", ArtifactKind::Questions, 1),
        Some(vec![])
    );
}

// ── Unknown-exam scenario ────────────────────────────────────────────────────

#[tokio::test]
async fn unknown_exam_fails_before_any_work_and_writes_no_output() {
    let cache_dir = tempfile::tempdir().unwrap();
    let output_dir = tempfile::tempdir().unwrap();
    let client = ScriptedClient::new(vec![Ok(QUESTION_PAGE.to_string())]);

    let config = ExtractionConfig::builder()
        .exams(ExamRegistry::new().with_exam(
            "P",
            ExamEntry {
                questions: "pdf/p-quest.pdf".into(),
                answers: "pdf/p-sol.pdf".into(),
                syllabus: vec!["General Probability".into()],
            },
        ))
        .cache_dir(cache_dir.path())
        .output_dir(output_dir.path())
        .client(Arc::clone(&client) as Arc<dyn ExtractionClient>)
        .build()
        .unwrap();

    let err = exam2json::process_exam_to_file("XX", &config).await.unwrap_err();
    assert!(matches!(err, ExamError::UnknownExam { .. }));
    assert_eq!(client.calls(), 0, "no extraction work for an unknown exam");

    let outputs: Vec<_> = std::fs::read_dir(output_dir.path()).unwrap().collect();
    assert!(outputs.is_empty(), "no output file may be produced");
}
