//! Task identifiers, typed task inputs and typed task results.

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::ai::error::GatewayError;
use crate::ai::schema::{QuestionOutput, ResumeAnalysis, ScoreOutput, SummaryOutput};
use crate::ai::timing::{plan_slot, Difficulty, DEFAULT_PLAN_LENGTH};

/// The fixed set of AI operations the gateway understands.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Task {
    GenerateQuestion,
    Score,
    Summary,
    AnalyzeResume,
}

impl Task {
    pub const ALL: [Task; 4] = [
        Task::GenerateQuestion,
        Task::Score,
        Task::Summary,
        Task::AnalyzeResume,
    ];

    pub const fn as_str(self) -> &'static str {
        match self {
            Task::GenerateQuestion => "generate_question",
            Task::Score => "score",
            Task::Summary => "summary",
            Task::AnalyzeResume => "analyze_resume",
        }
    }
}

impl fmt::Display for Task {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Task {
    type Err = GatewayError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Task::ALL
            .into_iter()
            .find(|t| t.as_str() == s)
            .ok_or_else(|| GatewayError::UnsupportedTask(s.to_string()))
    }
}

// ────────────────────────────────────────────────────────────────────────────
// Inputs
// ────────────────────────────────────────────────────────────────────────────

/// Caller-facing input for `generate_question`. Difficulty is never supplied by
/// the caller; it is derived from the question's position in the plan.
#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
struct QuestionInput {
    role: String,
    question_index: usize,
    #[serde(default = "default_plan_length")]
    total_questions: usize,
    #[serde(default)]
    previous_questions: Vec<String>,
    #[serde(default)]
    resume_summary: Option<String>,
}

fn default_plan_length() -> usize {
    DEFAULT_PLAN_LENGTH
}

/// Input handed to vendors for `generate_question`, with derived timing filled in.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct QuestionRequest {
    pub role: String,
    pub question_index: usize,
    pub total_questions: usize,
    pub previous_questions: Vec<String>,
    pub resume_summary: Option<String>,
    pub difficulty: Difficulty,
    pub duration_ms: u64,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ScoreRequest {
    pub question: String,
    pub answer: String,
    #[serde(default)]
    pub difficulty: Option<Difficulty>,
    #[serde(default)]
    pub time_taken_ms: Option<u64>,
    #[serde(default)]
    pub time_limit_ms: Option<u64>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AnsweredQuestion {
    pub question: String,
    pub answer: String,
    pub total: u32,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SummaryRequest {
    #[serde(default)]
    pub candidate_name: Option<String>,
    pub answers: Vec<AnsweredQuestion>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ResumeRequest {
    pub resume_text: String,
}

/// A fully typed unit of work. Vendors receive this, never raw JSON.
#[derive(Debug, Clone, PartialEq)]
pub enum TaskRequest {
    GenerateQuestion(QuestionRequest),
    Score(ScoreRequest),
    Summary(SummaryRequest),
    AnalyzeResume(ResumeRequest),
}

impl TaskRequest {
    /// Builds the typed request for `task` from an untyped payload.
    /// Fails with `InvalidPayload` before any vendor is involved.
    pub fn from_payload(task: Task, payload: Value) -> Result<Self, GatewayError> {
        match task {
            Task::GenerateQuestion => {
                let input: QuestionInput = from_value(task, payload)?;
                require_text(task, "role", &input.role)?;
                let slot = plan_slot(input.question_index, input.total_questions)
                    .map_err(|e| GatewayError::InvalidPayload(format!("{task}: {e}")))?;
                Ok(TaskRequest::GenerateQuestion(QuestionRequest {
                    role: input.role,
                    question_index: input.question_index,
                    total_questions: input.total_questions,
                    previous_questions: input.previous_questions,
                    resume_summary: input.resume_summary,
                    difficulty: slot.difficulty,
                    duration_ms: slot.duration_ms,
                }))
            }
            Task::Score => {
                let input: ScoreRequest = from_value(task, payload)?;
                require_text(task, "question", &input.question)?;
                Ok(TaskRequest::Score(input))
            }
            Task::Summary => {
                let input: SummaryRequest = from_value(task, payload)?;
                if input.answers.is_empty() {
                    return Err(GatewayError::InvalidPayload(format!(
                        "{task}: answers must contain at least one entry"
                    )));
                }
                Ok(TaskRequest::Summary(input))
            }
            Task::AnalyzeResume => {
                let input: ResumeRequest = from_value(task, payload)?;
                require_text(task, "resumeText", &input.resume_text)?;
                Ok(TaskRequest::AnalyzeResume(input))
            }
        }
    }

    pub fn task(&self) -> Task {
        match self {
            TaskRequest::GenerateQuestion(_) => Task::GenerateQuestion,
            TaskRequest::Score(_) => Task::Score,
            TaskRequest::Summary(_) => Task::Summary,
            TaskRequest::AnalyzeResume(_) => Task::AnalyzeResume,
        }
    }

    /// The request input as JSON, as embedded in vendor prompts.
    pub fn input_json(&self) -> Value {
        let value = match self {
            TaskRequest::GenerateQuestion(r) => serde_json::to_value(r),
            TaskRequest::Score(r) => serde_json::to_value(r),
            TaskRequest::Summary(r) => serde_json::to_value(r),
            TaskRequest::AnalyzeResume(r) => serde_json::to_value(r),
        };
        // plain data structs with string keys always serialize
        value.unwrap_or(Value::Null)
    }
}

fn from_value<T: serde::de::DeserializeOwned>(task: Task, payload: Value) -> Result<T, GatewayError> {
    serde_json::from_value(payload)
        .map_err(|e| GatewayError::InvalidPayload(format!("{task}: {e}")))
}

fn require_text(task: Task, field: &str, value: &str) -> Result<(), GatewayError> {
    if value.trim().is_empty() {
        return Err(GatewayError::InvalidPayload(format!(
            "{task}: {field} cannot be empty"
        )));
    }
    Ok(())
}

// ────────────────────────────────────────────────────────────────────────────
// Results
// ────────────────────────────────────────────────────────────────────────────

/// A validated task output, tagged by task.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "task", content = "output", rename_all = "snake_case")]
pub enum TaskResult {
    GenerateQuestion(QuestionOutput),
    Score(ScoreOutput),
    Summary(SummaryOutput),
    AnalyzeResume(ResumeAnalysis),
}

impl TaskResult {
    pub fn task(&self) -> Task {
        match self {
            TaskResult::GenerateQuestion(_) => Task::GenerateQuestion,
            TaskResult::Score(_) => Task::Score,
            TaskResult::Summary(_) => Task::Summary,
            TaskResult::AnalyzeResume(_) => Task::AnalyzeResume,
        }
    }
}
