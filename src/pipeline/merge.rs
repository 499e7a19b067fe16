//! The merge step: join question fragments with answer fragments by
//! question number.
//!
//! Pure function, no side effects — the caller decides what to do about
//! duplicate answers; this module only detects and reports them.

use crate::model::{AnswerFragment, MergedRecord, QuestionFragment};
use std::collections::HashMap;

/// Result of a merge: the records plus anything worth flagging.
#[derive(Debug, Clone, PartialEq)]
pub struct MergeOutcome {
    /// One record per question fragment, in the questions' original order.
    pub records: Vec<MergedRecord>,
    /// Question numbers that appeared more than once in the answer list.
    ///
    /// Duplicate answers usually mean the extractor misread a question
    /// number somewhere; the later fragment wins in the join, but silently
    /// keeping that would mask the transcription error, so callers are
    /// handed the collision list to report. Sorted, deduplicated.
    pub duplicate_answers: Vec<u32>,
}

/// Join questions with their answers.
///
/// Produces exactly `questions.len()` records. A question with no matching
/// answer is retained with `answer: None` — a partially-resolved record is
/// still reviewable output.
pub fn merge(questions: Vec<QuestionFragment>, answers: &[AnswerFragment]) -> MergeOutcome {
    let mut by_number: HashMap<u32, &AnswerFragment> = HashMap::with_capacity(answers.len());
    let mut duplicate_answers = Vec::new();

    for answer in answers {
        if by_number.insert(answer.question, answer).is_some() {
            duplicate_answers.push(answer.question);
        }
    }
    duplicate_answers.sort_unstable();
    duplicate_answers.dedup();

    let records = questions
        .into_iter()
        .map(|q| {
            let matched = by_number.get(&q.question).copied();
            MergedRecord::from_parts(q, matched)
        })
        .collect();

    MergeOutcome {
        records,
        duplicate_answers,
    }
}
