// Prompt templates shared by the live vendors.
// Vendors are black boxes to the gateway; these only describe the output contract
// so the model has a chance of meeting it. The schema validator is the real gate.

use crate::ai::task::{Task, TaskRequest};

/// System prompt that enforces JSON-only output.
pub const JSON_ONLY_SYSTEM: &str = "You are a precise, structured assistant for a technical \
    interview platform. You MUST respond with valid JSON only. \
    Do NOT include any text outside the JSON object. \
    Do NOT use markdown code fences. \
    Do NOT include explanations or apologies.";

const QUESTION_CONTRACT: &str = r#"Return an object:
{"question": string (10-500 chars), "difficulty": "easy"|"medium"|"hard", "durationMs": integer}
Use exactly the difficulty and durationMs given in the input. Do not repeat any of previousQuestions."#;

const SCORE_CONTRACT: &str = r#"Return an object:
{"accuracy": int 0-100, "completeness": int 0-100, "relevance": int 0-100, "timeliness": int 0-100,
 "total": int, "rationale": string (1-200 chars)}
total MUST equal round(0.4*accuracy + 0.3*completeness + 0.2*relevance + 0.1*timeliness).
timeliness reflects timeTakenMs against timeLimitMs when both are given."#;

const SUMMARY_CONTRACT: &str = r#"Return an object:
{"finalScore": int 0-100, "summary": string (20-400 chars), "strengths": 1-3 strings (each >= 3 chars),
 "gap": string (3-120 chars)}
finalScore should reflect the per-answer totals provided."#;

const RESUME_CONTRACT: &str = r#"Return an object:
{"skills": up to 50 strings, "sections": {"contact": bool, "summary": bool, "experience": bool,
 "education": bool, "skills": bool}, "qualityScore": int 0-100, "suggestions": up to 10 strings}"#;

fn instruction(task: Task) -> &'static str {
    match task {
        Task::GenerateQuestion => "Write one interview question for the role described below.",
        Task::Score => "Score the candidate's answer to the interview question below.",
        Task::Summary => "Summarize the candidate's interview performance below.",
        Task::AnalyzeResume => "Analyze the resume text below.",
    }
}

fn contract(task: Task) -> &'static str {
    match task {
        Task::GenerateQuestion => QUESTION_CONTRACT,
        Task::Score => SCORE_CONTRACT,
        Task::Summary => SUMMARY_CONTRACT,
        Task::AnalyzeResume => RESUME_CONTRACT,
    }
}

/// Builds the user prompt for a request: instruction, output contract, then input JSON.
pub fn build_prompt(request: &TaskRequest) -> String {
    let task = request.task();
    let input = serde_json::to_string_pretty(&request.input_json()).unwrap_or_default();
    format!(
        "{}\n\n{}\n\nInput:\n{}",
        instruction(task),
        contract(task),
        input
    )
}
