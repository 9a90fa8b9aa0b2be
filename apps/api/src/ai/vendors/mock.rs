//! Deterministic mock vendor.
//!
//! A first-class backend for tests and offline operation: the same request always
//! yields the same output, and every output satisfies its task contract.

use async_trait::async_trait;
use serde_json::{json, Value};

use super::{VendorAdapter, VendorError, VendorId};
use crate::ai::schema::weighted_total;
use crate::ai::task::{QuestionRequest, ResumeRequest, ScoreRequest, SummaryRequest, TaskRequest};
use crate::ai::timing::Difficulty;

const EASY_QUESTIONS: &[&str] = &[
    "What is the difference between a process and a thread?",
    "Explain what an HTTP status code in the 4xx range means.",
    "How does a hash map handle two keys that hash to the same bucket?",
    "What problem does version control solve for a team?",
];

const MEDIUM_QUESTIONS: &[&str] = &[
    "How would you design pagination for an API that serves millions of records?",
    "Describe how you would find and fix a memory leak in a long-running service.",
    "Explain the trade-offs between optimistic and pessimistic locking.",
    "How would you add caching to a read-heavy endpoint without serving stale data for long?",
];

const HARD_QUESTIONS: &[&str] = &[
    "Design a rate limiter that works across several server instances. What consistency do you need?",
    "How would you migrate a large table to a new schema with zero downtime?",
    "Design a job queue that guarantees at-least-once processing. How do you make handlers idempotent?",
    "A p99 latency regression appears only under load. Walk through how you would isolate it.",
];

const KNOWN_SKILLS: &[&str] = &[
    "Rust", "Go", "Python", "Java", "Kotlin", "TypeScript", "JavaScript", "C++", "SQL",
    "PostgreSQL", "MySQL", "Redis", "Kafka", "Docker", "Kubernetes", "Terraform", "AWS", "GCP",
    "Azure", "React", "Node.js", "GraphQL", "gRPC", "Linux", "Git", "CI/CD",
];

pub struct MockVendor;

#[async_trait]
impl VendorAdapter for MockVendor {
    fn vendor(&self) -> VendorId {
        VendorId::Mock
    }

    async fn execute(&self, request: &TaskRequest) -> Result<Value, VendorError> {
        Ok(match request {
            TaskRequest::GenerateQuestion(r) => generate_question(r),
            TaskRequest::Score(r) => score(r),
            TaskRequest::Summary(r) => summary(r),
            TaskRequest::AnalyzeResume(r) => analyze_resume(r),
        })
    }
}

/// FNV-1a. Stable across builds and platforms, unlike `DefaultHasher`.
fn stable_hash(parts: &[&str]) -> u64 {
    let mut hash: u64 = 0xcbf2_9ce4_8422_2325;
    for part in parts {
        for byte in part.bytes().chain(std::iter::once(0)) {
            hash ^= u64::from(byte);
            hash = hash.wrapping_mul(0x0000_0100_0000_01b3);
        }
    }
    hash
}

fn truncate_chars(text: &str, max: usize) -> String {
    text.trim().chars().take(max).collect()
}

fn words(text: &str) -> Vec<String> {
    text.split(|c: char| !c.is_alphanumeric())
        .filter(|w| !w.is_empty())
        .map(str::to_lowercase)
        .collect()
}

fn contains_any(text: &str, needles: &[&str]) -> bool {
    needles.iter().any(|n| text.contains(n))
}

fn generate_question(r: &QuestionRequest) -> Value {
    let bank = match r.difficulty {
        Difficulty::Easy => EASY_QUESTIONS,
        Difficulty::Medium => MEDIUM_QUESTIONS,
        Difficulty::Hard => HARD_QUESTIONS,
    };
    let index = r.question_index.to_string();
    let start = (stable_hash(&[r.role.as_str(), index.as_str()]) % bank.len() as u64) as usize;

    // first bank entry not already asked, wrapping around
    let base = (0..bank.len())
        .map(|offset| bank[(start + offset) % bank.len()])
        .find(|q| !r.previous_questions.iter().any(|p| p.contains(q)))
        .unwrap_or(bank[start]);

    let question = format!("As a {} candidate: {}", truncate_chars(&r.role, 80), base);

    json!({
        "question": question,
        "difficulty": r.difficulty,
        "durationMs": r.duration_ms,
    })
}

fn score(r: &ScoreRequest) -> Value {
    let answer_words = words(&r.answer);
    if answer_words.is_empty() {
        return json!({
            "accuracy": 0,
            "completeness": 0,
            "relevance": 0,
            "timeliness": 0,
            "total": 0,
            "rationale": "No answer was provided.",
        });
    }

    let question_terms: Vec<String> = words(&r.question)
        .into_iter()
        .filter(|w| w.len() > 3)
        .collect();
    let overlap = question_terms
        .iter()
        .filter(|t| answer_words.contains(t))
        .count() as i64;

    let completeness = (answer_words.len() as i64 * 2).min(100);
    let relevance = (30 + overlap * 15).min(100);
    let accuracy = (completeness + relevance) / 2;
    let timeliness = match (r.time_taken_ms, r.time_limit_ms) {
        (Some(taken), Some(limit)) if limit > 0 && taken <= limit => {
            // taken <= limit keeps the ratio term within 0..=40
            100 - (u128::from(taken) * 40 / u128::from(limit)) as i64
        }
        (Some(_), Some(_)) => 0,
        _ => 70,
    };
    let total = weighted_total(accuracy, completeness, relevance, timeliness);

    json!({
        "accuracy": accuracy,
        "completeness": completeness,
        "relevance": relevance,
        "timeliness": timeliness,
        "total": total,
        "rationale": format!(
            "Answer has {} words and addresses {} of {} key question terms.",
            answer_words.len(),
            overlap,
            question_terms.len()
        ),
    })
}

fn summary(r: &SummaryRequest) -> Value {
    let count = r.answers.len().max(1) as u64;
    let sum: u64 = r.answers.iter().map(|a| u64::from(a.total.min(100))).sum();
    let average = ((sum as f64) / (count as f64)).round() as u64;

    let name = r
        .candidate_name
        .as_deref()
        .map(|n| truncate_chars(n, 60))
        .filter(|n| !n.is_empty())
        .unwrap_or_else(|| "The candidate".to_string());

    let mut strengths = vec!["Completed every question".to_string()];
    if average >= 70 {
        strengths.push("Strong technical accuracy".to_string());
    }
    if r.answers.iter().any(|a| words(&a.answer).len() >= 50) {
        strengths.push("Thorough explanations".to_string());
    }

    let weakest = r
        .answers
        .iter()
        .min_by_key(|a| a.total)
        .map(|a| truncate_chars(&a.question, 100))
        .filter(|q| !q.is_empty())
        .unwrap_or_else(|| "general depth".to_string());

    json!({
        "finalScore": average,
        "summary": format!(
            "{name} answered {} questions with an average score of {average}/100.",
            r.answers.len()
        ),
        "strengths": strengths,
        "gap": format!("Revisit: {weakest}"),
    })
}

fn analyze_resume(r: &ResumeRequest) -> Value {
    let text = r.resume_text.to_lowercase();
    let tokens = words(&r.resume_text);

    let skills: Vec<&str> = KNOWN_SKILLS
        .iter()
        .copied()
        .filter(|skill| {
            let lower = skill.to_lowercase();
            if lower.chars().all(char::is_alphanumeric) {
                tokens.contains(&lower)
            } else {
                text.contains(&lower)
            }
        })
        .collect();

    let contact = text.contains('@') || contains_any(&text, &["phone", "linkedin"]);
    let summary = contains_any(&text, &["summary", "objective", "profile"]);
    let experience = contains_any(&text, &["experience", "employment", "work history"]);
    let education = contains_any(&text, &["education", "university", "degree"]);
    let skills_section = text.contains("skills");

    let mut suggestions = Vec::new();
    for (present, hint) in [
        (contact, "Add contact details such as an email address"),
        (summary, "Add a short professional summary"),
        (experience, "Add an experience section with measurable outcomes"),
        (education, "Add an education section"),
        (skills_section, "Add a dedicated skills section"),
    ] {
        if !present {
            suggestions.push(hint);
        }
    }

    let sections_found = 5 - suggestions.len() as i64;
    let quality_score = (sections_found * 15 + (skills.len().min(5) as i64) * 5).min(100);

    json!({
        "skills": skills,
        "sections": {
            "contact": contact,
            "summary": summary,
            "experience": experience,
            "education": education,
            "skills": skills_section,
        },
        "qualityScore": quality_score,
        "suggestions": suggestions,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ai::schema::{validate_response, ScoreOutput};
    use crate::ai::task::{Task, TaskResult};
    use serde_json::json;

    async fn run(task: Task, payload: Value) -> (TaskRequest, Value) {
        let request = TaskRequest::from_payload(task, payload).unwrap();
        let raw = MockVendor.execute(&request).await.unwrap();
        (request, raw)
    }

    #[tokio::test]
    async fn test_every_task_output_passes_its_contract() {
        let cases = vec![
            (
                Task::GenerateQuestion,
                json!({"role": "Backend Engineer", "questionIndex": 4}),
            ),
            (
                Task::Score,
                json!({
                    "question": "How does a hash map handle collisions?",
                    "answer": "Collisions are handled by chaining entries in a bucket or by probing.",
                    "timeTakenMs": 15000,
                    "timeLimitMs": 20000
                }),
            ),
            (
                Task::Summary,
                json!({
                    "candidateName": "Ada",
                    "answers": [
                        {"question": "Q1 about threads", "answer": "a", "total": 80},
                        {"question": "Q2 about locking", "answer": "b", "total": 41}
                    ]
                }),
            ),
            (
                Task::AnalyzeResume,
                json!({"resumeText": "Ada Lovelace\nada@example.com\nExperience\nRust, Kafka"}),
            ),
        ];

        for (task, payload) in cases {
            let (request, raw) = run(task, payload).await;
            let result = validate_response(&request, &raw);
            assert!(result.is_ok(), "{task}: {result:?} from {raw}");
        }
    }

    #[tokio::test]
    async fn test_output_is_deterministic() {
        let payload = json!({"role": "SRE", "questionIndex": 2, "totalQuestions": 6});
        let (_, first) = run(Task::GenerateQuestion, payload.clone()).await;
        let (_, second) = run(Task::GenerateQuestion, payload).await;
        assert_eq!(first, second);
    }

    #[tokio::test]
    async fn test_question_avoids_previous_questions() {
        let (_, first) = run(
            Task::GenerateQuestion,
            json!({"role": "SRE", "questionIndex": 0}),
        )
        .await;
        let asked = first["question"].as_str().unwrap().to_string();
        let (_, second) = run(
            Task::GenerateQuestion,
            json!({"role": "SRE", "questionIndex": 0, "previousQuestions": [asked.clone()]}),
        )
        .await;
        assert_ne!(second["question"].as_str().unwrap(), asked);
    }

    #[tokio::test]
    async fn test_empty_answer_scores_zero() {
        let (request, raw) = run(
            Task::Score,
            json!({"question": "Explain ownership.", "answer": "   "}),
        )
        .await;
        match validate_response(&request, &raw).unwrap() {
            TaskResult::Score(ScoreOutput { total, .. }) => assert_eq!(total, 0),
            other => panic!("unexpected result: {other:?}"),
        }
    }

    #[tokio::test]
    async fn test_overtime_answer_gets_zero_timeliness() {
        let (_, raw) = run(
            Task::Score,
            json!({
                "question": "Explain ownership.",
                "answer": "Each value has a single owner.",
                "timeTakenMs": 30000,
                "timeLimitMs": 20000
            }),
        )
        .await;
        assert_eq!(raw["timeliness"], 0);
    }

    #[tokio::test]
    async fn test_huge_time_values_stay_in_range() {
        let (request, raw) = run(
            Task::Score,
            json!({
                "question": "Explain ownership.",
                "answer": "Each value has a single owner.",
                "timeTakenMs": u64::MAX - 1,
                "timeLimitMs": u64::MAX
            }),
        )
        .await;
        let timeliness = raw["timeliness"].as_i64().unwrap();
        assert!((60..=100).contains(&timeliness), "timeliness {timeliness}");
        assert!(validate_response(&request, &raw).is_ok(), "{raw}");

        let (_, raw) = run(
            Task::Score,
            json!({
                "question": "Explain ownership.",
                "answer": "Each value has a single owner.",
                "timeTakenMs": 1_000_000_000_000_000_000u64,
                "timeLimitMs": 1_000_000_000_000_000_000u64
            }),
        )
        .await;
        assert_eq!(raw["timeliness"], 60);
    }

    #[tokio::test]
    async fn test_resume_detects_skills_and_missing_sections() {
        let (_, raw) = run(
            Task::AnalyzeResume,
            json!({"resumeText": "Experience: built services in Rust and Go on Kubernetes."}),
        )
        .await;
        let skills: Vec<&str> = raw["skills"]
            .as_array()
            .unwrap()
            .iter()
            .map(|s| s.as_str().unwrap())
            .collect();
        assert_eq!(skills, vec!["Rust", "Go", "Kubernetes"]);
        assert_eq!(raw["sections"]["experience"], true);
        assert_eq!(raw["sections"]["education"], false);
        assert!(!raw["suggestions"].as_array().unwrap().is_empty());
    }

    #[test]
    fn test_stable_hash_separates_parts() {
        assert_ne!(stable_hash(&["ab", "c"]), stable_hash(&["a", "bc"]));
        assert_eq!(stable_hash(&["x"]), stable_hash(&["x"]));
    }
}
