//! Data model: per-page fragments and the merged exam record.
//!
//! Extraction produces *fragments* — partial records scoped to a single page.
//! A question document page yields [`QuestionFragment`]s, an answer document
//! page yields [`AnswerFragment`]s, and the merge step joins the two by
//! question number into [`MergedRecord`]s.
//!
//! All types derive `Serialize`/`Deserialize` because they cross three
//! boundaries in the same shape: the extraction response (JSON array), the
//! per-page cache entry, and the final per-exam output file.

use serde::{Deserialize, Serialize};
use std::fmt;

/// Discriminator between question-extraction and answer-extraction jobs.
///
/// The lowercase string form is part of the on-disk cache layout
/// (`{exam}_{kind}_{page}.json`), so the `Display` output is stable.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ArtifactKind {
    Questions,
    Answers,
}

impl ArtifactKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            ArtifactKind::Questions => "questions",
            ArtifactKind::Answers => "answers",
        }
    }

    /// Reverse of [`ArtifactKind::as_str`], used by the cache loader.
    pub fn parse(s: &str) -> Option<Self> {
        match s {
            "questions" => Some(ArtifactKind::Questions),
            "answers" => Some(ArtifactKind::Answers),
            _ => None,
        }
    }
}

impl fmt::Display for ArtifactKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// One multiple-choice option of a question.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Choice {
    /// Single uppercase letter A–Z.
    pub letter: char,
    /// Choice text, markdown with KaTeX math.
    pub content: String,
}

/// A question transcribed from one page of the question document.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct QuestionFragment {
    /// Exam code this question belongs to (e.g. "P", "FM").
    pub exam: String,
    /// Question number as printed on the page. Must be unique within the
    /// final merged set; the merge step reports collisions on the answer side.
    pub question: u32,
    /// Question text, markdown with KaTeX math.
    pub content: String,
    /// Ordered answer options; empty for non-multiple-choice items.
    #[serde(default)]
    pub choices: Vec<Choice>,
    /// Category from the exam's syllabus list.
    pub syllabus_category: String,
    /// Transcription confidence, 1 (confident) to 5 (needs manual review).
    pub severity: u8,
}

/// An answer transcribed from one page of the answer/solutions document.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AnswerFragment {
    /// Question number this answer resolves.
    pub question: u32,
    /// The correct choice, usually a single letter.
    pub answer: String,
    /// Worked rationale when the solutions document provides one.
    #[serde(default)]
    pub explanation: Option<String>,
}

/// A [`QuestionFragment`] joined with its answer, the unit of final output.
///
/// `answer`/`explanation` are `None` (serialized as `null`) when no answer
/// fragment matched the question number. Unanswered records are kept — a
/// partially-resolved record is still useful output, flagged for manual
/// review via `severity`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MergedRecord {
    pub exam: String,
    pub question: u32,
    pub content: String,
    #[serde(default)]
    pub choices: Vec<Choice>,
    pub syllabus_category: String,
    pub severity: u8,
    pub answer: Option<String>,
    pub explanation: Option<String>,
}

impl MergedRecord {
    /// Join a question fragment with its (optional) matching answer.
    pub fn from_parts(q: QuestionFragment, a: Option<&AnswerFragment>) -> Self {
        MergedRecord {
            exam: q.exam,
            question: q.question,
            content: q.content,
            choices: q.choices,
            syllabus_category: q.syllabus_category,
            severity: q.severity,
            answer: a.map(|a| a.answer.clone()),
            explanation: a.and_then(|a| a.explanation.clone()),
        }
    }
}

/// Shared shape constraints for fragment types parsed from extraction
/// responses.
///
/// A page whose response deserializes but fails validation is treated as a
/// malformed response: the page yields no fragments and nothing is cached,
/// so a later run retries it.
pub trait Fragment: Serialize + for<'de> Deserialize<'de> + Clone + Send + Sync {
    /// Check shape constraints the JSON schema cannot express.
    fn validate(&self) -> Result<(), String>;
}

impl Fragment for QuestionFragment {
    fn validate(&self) -> Result<(), String> {
        if self.question == 0 {
            return Err("question number must be >= 1".into());
        }
        if !(1..=5).contains(&self.severity) {
            return Err(format!("severity {} out of range 1-5", self.severity));
        }
        for c in &self.choices {
            if !c.letter.is_ascii_uppercase() {
                return Err(format!("choice letter '{}' is not A-Z", c.letter));
            }
        }
        Ok(())
    }
}

impl Fragment for AnswerFragment {
    fn validate(&self) -> Result<(), String> {
        if self.question == 0 {
            return Err("question number must be >= 1".into());
        }
        if self.answer.trim().is_empty() {
            return Err("answer must not be empty".into());
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn question(n: u32, severity: u8) -> QuestionFragment {
        QuestionFragment {
            exam: "P".into(),
            question: n,
            content: "Calculate $P(X > 3)$".into(),
            choices: vec![
                Choice {
                    letter: 'A',
                    content: "$0.25$".into(),
                },
                Choice {
                    letter: 'B',
                    content: "$0.35$".into(),
                },
            ],
            syllabus_category: "General Probability".into(),
            severity,
        }
    }

    #[test]
    fn artifact_kind_round_trips_through_str() {
        for kind in [ArtifactKind::Questions, ArtifactKind::Answers] {
            assert_eq!(ArtifactKind::parse(kind.as_str()), Some(kind));
        }
        assert_eq!(ArtifactKind::parse("solutions"), None);
    }

    #[test]
    fn valid_question_passes() {
        assert!(question(1, 1).validate().is_ok());
        assert!(question(1, 5).validate().is_ok());
    }

    #[test]
    fn zero_question_number_rejected() {
        assert!(question(0, 1).validate().is_err());
    }

    #[test]
    fn severity_out_of_range_rejected() {
        assert!(question(1, 0).validate().is_err());
        assert!(question(1, 6).validate().is_err());
    }

    #[test]
    fn lowercase_choice_letter_rejected() {
        let mut q = question(1, 1);
        q.choices[0].letter = 'a';
        assert!(q.validate().is_err());
    }

    #[test]
    fn answer_without_explanation_deserializes() {
        // The original solutions prompt returned {question, answer} only;
        // explanation is optional on the wire.
        let a: AnswerFragment = serde_json::from_str(r#"{"question": 1, "answer": "B"}"#).unwrap();
        assert_eq!(a.question, 1);
        assert_eq!(a.answer, "B");
        assert!(a.explanation.is_none());
    }

    #[test]
    fn empty_answer_rejected() {
        let a = AnswerFragment {
            question: 1,
            answer: "  ".into(),
            explanation: None,
        };
        assert!(a.validate().is_err());
    }

    #[test]
    fn merged_record_serializes_null_answer() {
        let rec = MergedRecord::from_parts(question(7, 2), None);
        let json = serde_json::to_value(&rec).unwrap();
        assert_eq!(json["answer"], serde_json::Value::Null);
        assert_eq!(json["question"], 7);
    }
}
