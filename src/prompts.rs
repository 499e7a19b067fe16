//! Extraction instructions sent alongside each page image.
//!
//! Centralising every prompt here serves two purposes:
//!
//! 1. **Single source of truth** — tightening the schema or the "always
//!    return a JSON array" rule happens in exactly one place.
//!
//! 2. **Testability** — unit tests can inspect the built instructions
//!    without spinning up a real VLM, so schema regressions are caught
//!    before they cost API calls.
//!
//! Both instructions demand a bare JSON array with no commentary; the page
//! processor still tolerates a fenced response (models occasionally disobey)
//! but anything else is treated as malformed.

/// Build the question-extraction instruction for one exam.
///
/// `categories` is the exam's syllabus list; the model must pick
/// `syllabus_category` from it verbatim.
pub fn question_instruction(exam: &str, categories: &[String]) -> String {
    format!(
        r#"Process this {exam} exam page. Return a JSON array of exam questions. If no questions are found on the page (e.g., cover pages, introductions), return an empty array [].

Each question object must have this exact structure:
{{
    "exam": "{exam}",
    "question": number,
    "content": "string with KaTeX math",
    "choices": [
        {{
            "letter": "A",
            "content": "choice text with KaTeX"
        }},
        ...
    ],
    "syllabus_category": "string from {categories:?}",
    "severity": number (1-5, where 5=lowest confidence)
}}

IMPORTANT: You must ALWAYS return a valid JSON array, even if empty. Do not include any explanatory text or messages.

Example responses:
1. For a page with no questions: []
2. For a page with questions:
[
    {{
        "exam": "{exam}",
        "question": 1,
        "content": "Calculate $P(X > 3)$ where $X$ follows...",
        "choices": [
            {{
                "letter": "A",
                "content": "$0.25$"
            }},
            {{
                "letter": "B",
                "content": "$0.35$"
            }}
        ],
        "syllabus_category": "{first_category}",
        "severity": 1
    }}
]"#,
        exam = exam,
        categories = categories,
        first_category = categories.first().map(String::as_str).unwrap_or(""),
    )
}

/// Build the answer-extraction instruction for one exam.
///
/// `explanation` is optional on purpose: answer-key documents carry a bare
/// letter grid, solutions documents carry worked rationale.
pub fn answer_instruction(exam: &str) -> String {
    format!(
        r#"Process this {exam} exam page for answers. Return a JSON array of answers. If no answers are found on the page (e.g., cover pages, introductions), return an empty array [].

Each answer object must have this exact structure:
{{
    "question": number,
    "answer": "letter",
    "explanation": "worked solution with KaTeX math, omit if the page shows only the answer letter"
}}

IMPORTANT: You must ALWAYS return a valid JSON array, even if empty. Do not include any explanatory text or messages.

Example responses:
1. For a page with no answers: []
2. For a page with answers:
[
    {{
        "question": 1,
        "answer": "B",
        "explanation": "Since $X \sim \text{{Exp}}(\lambda)$..."
    }}
]"#,
        exam = exam,
    )
}
