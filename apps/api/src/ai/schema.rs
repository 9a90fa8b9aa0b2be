//! Output contracts for every task.
//!
//! Validation runs in two phases. The raw vendor value is first deserialized into
//! the task's output struct (shape and types), then every field constraint is
//! checked and all violations are collected. Cross-field invariants only run once
//! the fields they combine are individually valid.

use std::fmt;

use serde::{de::DeserializeOwned, Deserialize, Serialize};
use serde_json::Value;
use thiserror::Error;

use crate::ai::task::{Task, TaskRequest, TaskResult};
use crate::ai::timing::Difficulty;

// ────────────────────────────────────────────────────────────────────────────
// Output models
// ────────────────────────────────────────────────────────────────────────────

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct QuestionOutput {
    pub question: String,
    pub difficulty: Difficulty,
    pub duration_ms: u64,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ScoreOutput {
    pub accuracy: i64,
    pub completeness: i64,
    pub relevance: i64,
    pub timeliness: i64,
    pub total: i64,
    pub rationale: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SummaryOutput {
    pub final_score: i64,
    pub summary: String,
    pub strengths: Vec<String>,
    pub gap: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ResumeSections {
    pub contact: bool,
    pub summary: bool,
    pub experience: bool,
    pub education: bool,
    pub skills: bool,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ResumeAnalysis {
    pub skills: Vec<String>,
    pub sections: ResumeSections,
    pub quality_score: i64,
    pub suggestions: Vec<String>,
}

// ────────────────────────────────────────────────────────────────────────────
// Errors
// ────────────────────────────────────────────────────────────────────────────

/// One violated constraint. `path` is the dotted field path, empty for the root.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct SchemaIssue {
    pub path: String,
    pub message: String,
}

impl fmt::Display for SchemaIssue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.path.is_empty() {
            f.write_str(&self.message)
        } else {
            write!(f, "{}: {}", self.path, self.message)
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub struct SchemaError {
    pub task: Task,
    pub issues: Vec<SchemaIssue>,
}

impl fmt::Display for SchemaError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} output failed validation: ", self.task)?;
        for (i, issue) in self.issues.iter().enumerate() {
            if i > 0 {
                f.write_str("; ")?;
            }
            write!(f, "{issue}")?;
        }
        Ok(())
    }
}

#[derive(Default)]
struct Issues(Vec<SchemaIssue>);

impl Issues {
    fn push(&mut self, path: impl Into<String>, message: impl Into<String>) {
        self.0.push(SchemaIssue {
            path: path.into(),
            message: message.into(),
        });
    }

    fn int_range(&mut self, path: &str, value: i64, min: i64, max: i64) {
        if value < min || value > max {
            self.push(path, format!("must be an integer in [{min}, {max}], got {value}"));
        }
    }

    fn text_len(&mut self, path: &str, value: &str, min: usize, max: usize) {
        let len = value.chars().count();
        if len < min || len > max {
            self.push(path, format!("must be {min}-{max} characters, got {len}"));
        }
    }

    fn min_len(&mut self, path: &str, value: &str, min: usize) {
        let len = value.chars().count();
        if len < min {
            self.push(path, format!("must be at least {min} characters, got {len}"));
        }
    }

    fn count(&mut self, path: &str, len: usize, min: usize, max: usize) {
        if len < min || len > max {
            self.push(path, format!("must contain {min}-{max} items, got {len}"));
        }
    }

    fn is_empty(&self) -> bool {
        self.0.is_empty()
    }
}

// ────────────────────────────────────────────────────────────────────────────
// Contracts
// ────────────────────────────────────────────────────────────────────────────

trait OutputContract: DeserializeOwned {
    fn check(&self, issues: &mut Issues);
}

/// `round(0.4a + 0.3c + 0.2r + 0.1t)`, computed exactly in tenths and rounded half up.
pub fn weighted_total(accuracy: i64, completeness: i64, relevance: i64, timeliness: i64) -> i64 {
    let tenths = 4 * accuracy + 3 * completeness + 2 * relevance + timeliness;
    (tenths + 5).div_euclid(10)
}

impl OutputContract for ScoreOutput {
    fn check(&self, issues: &mut Issues) {
        issues.int_range("accuracy", self.accuracy, 0, 100);
        issues.int_range("completeness", self.completeness, 0, 100);
        issues.int_range("relevance", self.relevance, 0, 100);
        issues.int_range("timeliness", self.timeliness, 0, 100);
        issues.int_range("total", self.total, 0, 100);
        issues.text_len("rationale", &self.rationale, 1, 200);

        if issues.is_empty() {
            let expected = weighted_total(
                self.accuracy,
                self.completeness,
                self.relevance,
                self.timeliness,
            );
            if self.total != expected {
                issues.push(
                    "total",
                    format!(
                        "must equal round(0.4*accuracy + 0.3*completeness + 0.2*relevance + 0.1*timeliness) = {expected}, got {}",
                        self.total
                    ),
                );
            }
        }
    }
}

impl OutputContract for SummaryOutput {
    fn check(&self, issues: &mut Issues) {
        issues.int_range("finalScore", self.final_score, 0, 100);
        issues.text_len("summary", &self.summary, 20, 400);
        issues.count("strengths", self.strengths.len(), 1, 3);
        for (i, strength) in self.strengths.iter().enumerate() {
            issues.min_len(&format!("strengths.{i}"), strength, 3);
        }
        issues.text_len("gap", &self.gap, 3, 120);
    }
}

impl OutputContract for QuestionOutput {
    fn check(&self, issues: &mut Issues) {
        issues.text_len("question", &self.question, 10, 500);
        let expected = self.difficulty.duration_ms();
        if self.duration_ms != expected {
            issues.push(
                "durationMs",
                format!(
                    "must be {expected} for {} questions, got {}",
                    self.difficulty, self.duration_ms
                ),
            );
        }
    }
}

impl OutputContract for ResumeAnalysis {
    fn check(&self, issues: &mut Issues) {
        issues.count("skills", self.skills.len(), 0, 50);
        for (i, skill) in self.skills.iter().enumerate() {
            issues.min_len(&format!("skills.{i}"), skill.trim(), 1);
        }
        issues.int_range("qualityScore", self.quality_score, 0, 100);
        issues.count("suggestions", self.suggestions.len(), 0, 10);
        for (i, suggestion) in self.suggestions.iter().enumerate() {
            issues.min_len(&format!("suggestions.{i}"), suggestion.trim(), 1);
        }
    }
}

fn validate_as<T: OutputContract>(task: Task, raw: &Value) -> Result<T, SchemaError> {
    let output: T = T::deserialize(raw).map_err(|e| SchemaError {
        task,
        issues: vec![SchemaIssue {
            path: String::new(),
            message: e.to_string(),
        }],
    })?;

    let mut issues = Issues::default();
    output.check(&mut issues);
    if issues.is_empty() {
        Ok(output)
    } else {
        Err(SchemaError {
            task,
            issues: issues.0,
        })
    }
}

/// Validates a raw vendor value against the output contract of `task`.
pub fn validate(task: Task, raw: &Value) -> Result<TaskResult, SchemaError> {
    match task {
        Task::GenerateQuestion => validate_as(task, raw).map(TaskResult::GenerateQuestion),
        Task::Score => validate_as(task, raw).map(TaskResult::Score),
        Task::Summary => validate_as(task, raw).map(TaskResult::Summary),
        Task::AnalyzeResume => validate_as(task, raw).map(TaskResult::AnalyzeResume),
    }
}

/// Validates a raw vendor value for a specific request. On top of the task
/// contract, a generated question must carry the difficulty it was asked for.
pub fn validate_response(request: &TaskRequest, raw: &Value) -> Result<TaskResult, SchemaError> {
    let result = validate(request.task(), raw)?;

    if let (TaskRequest::GenerateQuestion(req), TaskResult::GenerateQuestion(out)) =
        (request, &result)
    {
        if out.difficulty != req.difficulty {
            return Err(SchemaError {
                task: Task::GenerateQuestion,
                issues: vec![SchemaIssue {
                    path: "difficulty".to_string(),
                    message: format!("must be {}, got {}", req.difficulty, out.difficulty),
                }],
            });
        }
    }

    Ok(result)
}
