//! services/api/src/adapters/scoring_llm.rs
//!
//! This module contains the adapter for the interview-scoring LLM.
//! It implements the `ScoringService` port from the `core` crate.
//!
//! The adapter is stateless and never touches storage: it turns a transcript
//! into a validated `ScoreReport` or an error, nothing else. Model output
//! that does not match the contract exactly is rejected rather than patched.

const SYSTEM_INSTRUCTIONS: &str = "You are a professional interviewer analyzing a mock \
interview. Your task is to evaluate the candidate based on structured categories.";

const USER_INPUT_TEMPLATE: &str = r#"You are an AI interviewer analyzing a mock interview. Your task is to evaluate the candidate based on structured categories. Be thorough and detailed in your analysis. Don't be lenient with the candidate. If there are mistakes or areas for improvement, point them out.

Transcript:
{transcript}

Please score the candidate from 0 to 100 in the following areas. Do not add categories other than the ones provided:
- **Communication Skills**: Clarity, articulation, structured responses.
- **Technical Knowledge**: Understanding of key concepts for the role.
- **Problem Solving**: Ability to analyze problems and propose solutions.
- **Cultural Fit**: Alignment with company values and job role.
- **Confidence and Clarity**: Confidence in responses, engagement, and clarity.

Respond with ONLY a JSON object in exactly this shape, with the category names exactly as written above and in the same order:
{
  "totalScore": <number 0-100>,
  "categoryScores": [
    { "name": "Communication Skills", "score": <number 0-100>, "comment": "<string>" },
    { "name": "Technical Knowledge", "score": <number 0-100>, "comment": "<string>" },
    { "name": "Problem Solving", "score": <number 0-100>, "comment": "<string>" },
    { "name": "Cultural Fit", "score": <number 0-100>, "comment": "<string>" },
    { "name": "Confidence and Clarity", "score": <number 0-100>, "comment": "<string>" }
  ],
  "strengths": ["<string>", ...],
  "areasForImprovement": ["<string>", ...],
  "finalAssessment": "<string>"
}"#;

use async_openai::{
    config::OpenAIConfig,
    error::OpenAIError,
    types::chat::{
        ChatCompletionRequestSystemMessageArgs, ChatCompletionRequestUserMessageArgs,
        CreateChatCompletionRequestArgs,
    },
    Client,
};
use async_trait::async_trait;
use interview_prep_core::domain::{CategoryName, CategoryScore, ScoreReport, TranscriptEntry};
use interview_prep_core::ports::{ScoringError, ScoringService};
use regex::Regex;
use serde::Deserialize;
use std::time::Duration;

//=========================================================================================
// The Main Adapter Struct
//=========================================================================================

/// An adapter that implements `ScoringService` using an OpenAI-compatible LLM.
#[derive(Clone)]
pub struct OpenAiScoringAdapter {
    client: Client<OpenAIConfig>,
    model: String,
    timeout_secs: u64,
}

impl OpenAiScoringAdapter {
    /// Creates a new `OpenAiScoringAdapter`.
    pub fn new(client: Client<OpenAIConfig>, model: String, timeout_secs: u64) -> Self {
        Self {
            client,
            model,
            timeout_secs,
        }
    }
}

fn format_transcript(transcript: &[TranscriptEntry]) -> String {
    transcript
        .iter()
        .map(|entry| format!("- {}: {}\n", entry.role.as_str(), entry.content))
        .collect()
}

//=========================================================================================
// Response Parsing and Validation
//=========================================================================================

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
struct ScoreReportWire {
    total_score: i64,
    category_scores: Vec<CategoryScoreWire>,
    strengths: Vec<String>,
    areas_for_improvement: Vec<String>,
    final_assessment: String,
}

#[derive(Deserialize)]
struct CategoryScoreWire {
    name: String,
    score: i64,
    comment: String,
}

/// Models sometimes wrap their JSON answer in Markdown code fences even when
/// told not to. Remove them before parsing.
pub(crate) fn strip_code_fences(text: &str) -> String {
    let fence = Regex::new(r"^```[a-zA-Z]*\s*|\s*```$").unwrap();
    fence.replace_all(text.trim(), "").to_string()
}

fn score_in_range(value: i64, field: &str) -> Result<u8, ScoringError> {
    u8::try_from(value)
        .ok()
        .filter(|v| *v <= 100)
        .ok_or_else(|| {
            ScoringError::Malformed(format!("{} score {} is outside 0-100", field, value))
        })
}

/// Parses raw model output into a `ScoreReport`, enforcing the full contract:
/// exactly five categories, the fixed names in the fixed order, all scores
/// within 0-100. Anything less is rejected outright.
pub(crate) fn parse_score_report(raw: &str) -> Result<ScoreReport, ScoringError> {
    let cleaned = strip_code_fences(raw);
    let wire: ScoreReportWire = serde_json::from_str(&cleaned)
        .map_err(|e| ScoringError::Malformed(format!("response is not valid JSON: {}", e)))?;

    let total_score = score_in_range(wire.total_score, "total")?;

    if wire.category_scores.len() != CategoryName::ALL.len() {
        return Err(ScoringError::Malformed(format!(
            "expected {} category scores, got {}",
            CategoryName::ALL.len(),
            wire.category_scores.len()
        )));
    }

    let mut category_scores = Vec::with_capacity(CategoryName::ALL.len());
    for (expected, got) in CategoryName::ALL.iter().zip(wire.category_scores) {
        if got.name != expected.as_str() {
            return Err(ScoringError::Malformed(format!(
                "unexpected category '{}', expected '{}'",
                got.name,
                expected.as_str()
            )));
        }
        category_scores.push(CategoryScore {
            name: *expected,
            score: score_in_range(got.score, expected.as_str())?,
            comment: got.comment,
        });
    }

    Ok(ScoreReport {
        total_score,
        category_scores,
        strengths: wire.strengths,
        areas_for_improvement: wire.areas_for_improvement,
        final_assessment: wire.final_assessment,
    })
}

//=========================================================================================
// `ScoringService` Trait Implementation
//=========================================================================================

#[async_trait]
impl ScoringService for OpenAiScoringAdapter {
    /// Scores a completed interview transcript against the fixed category set.
    async fn score_transcript(
        &self,
        transcript: &[TranscriptEntry],
    ) -> Result<ScoreReport, ScoringError> {
        let user_input =
            USER_INPUT_TEMPLATE.replace("{transcript}", &format_transcript(transcript));

        let messages = vec![
            ChatCompletionRequestSystemMessageArgs::default()
                .content(SYSTEM_INSTRUCTIONS)
                .build()
                .map_err(|e| ScoringError::Unavailable(e.to_string()))?
                .into(),
            ChatCompletionRequestUserMessageArgs::default()
                .content(user_input)
                .build()
                .map_err(|e| ScoringError::Unavailable(e.to_string()))?
                .into(),
        ];

        let request = CreateChatCompletionRequestArgs::default()
            .model(&self.model)
            .messages(messages)
            .n(1)
            .build()
            .map_err(|e| ScoringError::Unavailable(e.to_string()))?;

        // The call is bounded: past the deadline the attempt fails with a
        // distinct, retryable timeout instead of hanging the session.
        let chat = self.client.chat();
        let call = chat.create(request);
        let response = tokio::time::timeout(Duration::from_secs(self.timeout_secs), call)
            .await
            .map_err(|_| ScoringError::Timeout(self.timeout_secs))?
            .map_err(|e: OpenAIError| ScoringError::Unavailable(e.to_string()))?;

        let content = response
            .choices
            .into_iter()
            .next()
            .and_then(|choice| choice.message.content)
            .ok_or_else(|| {
                ScoringError::Malformed("scoring response contained no text content".to_string())
            })?;

        parse_score_report(&content)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use interview_prep_core::domain::TranscriptRole;

    fn valid_json() -> String {
        let categories: Vec<String> = CategoryName::ALL
            .iter()
            .map(|c| {
                format!(
                    r#"{{ "name": "{}", "score": 72, "comment": "Fine." }}"#,
                    c.as_str()
                )
            })
            .collect();
        format!(
            r#"{{
                "totalScore": 74,
                "categoryScores": [{}],
                "strengths": ["Structured answers"],
                "areasForImprovement": ["More depth on system design"],
                "finalAssessment": "A capable candidate."
            }}"#,
            categories.join(",")
        )
    }

    #[test]
    fn accepts_conforming_output() {
        let report = parse_score_report(&valid_json()).unwrap();
        assert_eq!(report.total_score, 74);
        assert_eq!(report.category_scores.len(), 5);
        assert_eq!(
            report.category_scores[4].name,
            CategoryName::ConfidenceAndClarity
        );
        assert_eq!(report.final_assessment, "A capable candidate.");
    }

    #[test]
    fn accepts_fenced_output() {
        let fenced = format!("```json\n{}\n```", valid_json());
        let report = parse_score_report(&fenced).unwrap();
        assert_eq!(report.total_score, 74);
    }

    #[test]
    fn rejects_missing_category() {
        // Drop the final "Confidence and Clarity" entry.
        let truncated = valid_json().replacen(
            r#",{ "name": "Confidence and Clarity", "score": 72, "comment": "Fine." }"#,
            "",
            1,
        );
        let err = parse_score_report(&truncated).unwrap_err();
        assert!(matches!(err, ScoringError::Malformed(msg) if msg.contains("5 category")));
    }

    #[test]
    fn rejects_renamed_category() {
        let renamed = valid_json().replacen("Cultural Fit", "Culture Add", 1);
        let err = parse_score_report(&renamed).unwrap_err();
        assert!(matches!(err, ScoringError::Malformed(msg) if msg.contains("Culture Add")));
    }

    #[test]
    fn rejects_out_of_range_score() {
        let inflated = valid_json().replacen(r#""totalScore": 74"#, r#""totalScore": 140"#, 1);
        let err = parse_score_report(&inflated).unwrap_err();
        assert!(matches!(err, ScoringError::Malformed(msg) if msg.contains("140")));
    }

    #[test]
    fn rejects_non_numeric_score() {
        let corrupted =
            valid_json().replacen(r#""totalScore": 74"#, r#""totalScore": "great""#, 1);
        assert!(matches!(
            parse_score_report(&corrupted),
            Err(ScoringError::Malformed(_))
        ));
    }

    #[test]
    fn formats_transcript_lines() {
        let transcript = vec![
            TranscriptEntry {
                role: TranscriptRole::Assistant,
                content: "What is ownership?".to_string(),
            },
            TranscriptEntry {
                role: TranscriptRole::User,
                content: "A move semantics model.".to_string(),
            },
        ];
        assert_eq!(
            format_transcript(&transcript),
            "- assistant: What is ownership?\n- user: A move semantics model.\n"
        );
    }
}
