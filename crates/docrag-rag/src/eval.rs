//! Canned-question quality report for a built index.

use std::fs;
use std::path::Path;

use serde::{Deserialize, Serialize};

use docrag_core::types::ContextRecord;
use docrag_core::Result;

/// Scores above this count a context as relevant.
pub const RELEVANCE_THRESHOLD: f32 = 0.3;

pub const DEFAULT_QUESTIONS: [&str; 12] = [
    "What factors affect construction project delays?",
    "What are the payment terms for construction projects?",
    "How do I handle change orders?",
    "What safety requirements must be followed?",
    "What are the quality standards for materials?",
    "How long does the approval process take?",
    "What documentation is required for permits?",
    "What are the warranty terms?",
    "How are disputes resolved?",
    "What insurance is required for contractors?",
    "What are the environmental compliance requirements?",
    "How do I request a project inspection?",
];

const DONT_KNOW_PHRASES: [&str; 7] = [
    "don't know",
    "i don't know",
    "not found",
    "no information",
    "cannot find",
    "not present in",
    "not mentioned",
];

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "status", rename_all = "snake_case")]
pub enum RetrievalEvaluation {
    NoContexts,
    Ok { num_contexts: usize, avg_score: f32, relevant_count: usize, top_score: f32 },
}

impl RetrievalEvaluation {
    pub fn avg_score(&self) -> f32 {
        match self {
            RetrievalEvaluation::NoContexts => 0.0,
            RetrievalEvaluation::Ok { avg_score, .. } => *avg_score,
        }
    }

    pub fn num_contexts(&self) -> usize {
        match self {
            RetrievalEvaluation::NoContexts => 0,
            RetrievalEvaluation::Ok { num_contexts, .. } => *num_contexts,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AnswerEvaluation {
    pub length: usize,
    pub has_error: bool,
    pub says_dont_know: bool,
}

fn round3(x: f32) -> f32 {
    (x * 1000.0).round() / 1000.0
}

pub fn evaluate_retrieval(contexts: &[ContextRecord]) -> RetrievalEvaluation {
    let Some(first) = contexts.first() else {
        return RetrievalEvaluation::NoContexts;
    };
    let avg = contexts.iter().map(|c| c.score).sum::<f32>() / contexts.len() as f32;
    RetrievalEvaluation::Ok {
        num_contexts: contexts.len(),
        avg_score: round3(avg),
        relevant_count: contexts.iter().filter(|c| c.score > RELEVANCE_THRESHOLD).count(),
        top_score: round3(first.score),
    }
}

pub fn evaluate_answer(answer: &str) -> AnswerEvaluation {
    let lower = answer.to_lowercase();
    AnswerEvaluation {
        length: answer.chars().count(),
        has_error: false,
        says_dont_know: DONT_KNOW_PHRASES.iter().any(|p| lower.contains(p)),
    }
}

/// One question's outcome; failures are recorded rather than aborting the run.
///
/// A question whose retrieval worked stays a `Success` even when answer
/// generation failed; the error goes to `answer_error`.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(untagged)]
pub enum EvalRecord {
    Success {
        question: String,
        contexts: Vec<ContextRecord>,
        #[serde(skip_serializing_if = "Option::is_none")]
        answer: Option<String>,
        retrieval_evaluation: RetrievalEvaluation,
        #[serde(skip_serializing_if = "Option::is_none")]
        answer_evaluation: Option<AnswerEvaluation>,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        answer_error: Option<String>,
    },
    Failure {
        question: String,
        error: String,
    },
}

impl EvalRecord {
    pub fn success(question: &str, contexts: Vec<ContextRecord>, answer: Option<String>) -> Self {
        let retrieval_evaluation = evaluate_retrieval(&contexts);
        let answer_evaluation = answer.as_deref().map(evaluate_answer);
        EvalRecord::Success {
            question: question.to_string(),
            contexts,
            answer,
            retrieval_evaluation,
            answer_evaluation,
            answer_error: None,
        }
    }

    /// Retrieval succeeded but no answer could be generated.
    pub fn answer_failed(question: &str, contexts: Vec<ContextRecord>, error: impl std::fmt::Display) -> Self {
        EvalRecord::Success {
            question: question.to_string(),
            retrieval_evaluation: evaluate_retrieval(&contexts),
            contexts,
            answer: None,
            answer_evaluation: Some(AnswerEvaluation { length: 0, has_error: true, says_dont_know: false }),
            answer_error: Some(error.to_string()),
        }
    }

    pub fn failure(question: &str, error: impl std::fmt::Display) -> Self {
        EvalRecord::Failure { question: question.to_string(), error: error.to_string() }
    }

    pub fn question(&self) -> &str {
        match self {
            EvalRecord::Success { question, .. } | EvalRecord::Failure { question, .. } => question,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct EvalSummary {
    pub total: usize,
    pub successful: usize,
    pub avg_retrieval_score: f32,
    pub answered: usize,
    pub answer_errors: usize,
    pub dont_know: usize,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(transparent)]
pub struct EvalReport {
    pub results: Vec<EvalRecord>,
}

impl EvalReport {
    pub fn push(&mut self, record: EvalRecord) {
        self.results.push(record);
    }

    pub fn summary(&self) -> EvalSummary {
        let mut successful = 0usize;
        let mut score_sum = 0f32;
        let mut answered = 0usize;
        let mut answer_errors = 0usize;
        let mut dont_know = 0usize;
        for record in &self.results {
            if let EvalRecord::Success { retrieval_evaluation, answer_evaluation, .. } = record {
                successful += 1;
                score_sum += retrieval_evaluation.avg_score();
                match answer_evaluation {
                    Some(a) if a.has_error => answer_errors += 1,
                    Some(a) => {
                        answered += 1;
                        dont_know += usize::from(a.says_dont_know);
                    }
                    None => {}
                }
            }
        }
        EvalSummary {
            total: self.results.len(),
            successful,
            avg_retrieval_score: if successful == 0 { 0.0 } else { round3(score_sum / successful as f32) },
            answered,
            answer_errors,
            dont_know,
        }
    }

    /// Writes the report as a pretty JSON array.
    pub fn write_json(&self, path: &Path) -> Result<()> {
        if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
            fs::create_dir_all(parent)?;
        }
        let bytes = serde_json::to_vec_pretty(self).map_err(std::io::Error::from)?;
        fs::write(path, bytes)?;
        Ok(())
    }
}
