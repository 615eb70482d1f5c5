//! services/api/src/adapters/question_llm.rs
//!
//! This module contains the adapter for the question-generating LLM.
//! It implements the `QuestionGenerationService` port from the `core` crate.

const USER_INPUT_TEMPLATE: &str = r#"Prepare questions for a job interview.
The job role is {role}.
The job experience level is {level}.
The tech stack used in the job is: {techstack}.
The focus between behavioural and technical questions should lean towards: {type}.
The amount of questions required is: {amount}.
Please return only the questions, without any additional text.
The questions are going to be read by a voice assistant so do not use "/" or "*" or any other special characters which might break the voice assistant.
Return the questions formatted like this:
["Question 1", "Question 2", "Question 3"]"#;

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
use interview_prep_core::domain::QuestionRequest;
use interview_prep_core::ports::{PortError, PortResult, QuestionGenerationService};

use crate::adapters::scoring_llm::strip_code_fences;

//=========================================================================================
// The Main Adapter Struct
//=========================================================================================

/// An adapter that implements `QuestionGenerationService` using an
/// OpenAI-compatible LLM.
#[derive(Clone)]
pub struct OpenAiQuestionAdapter {
    client: Client<OpenAIConfig>,
    model: String,
}

impl OpenAiQuestionAdapter {
    /// Creates a new `OpenAiQuestionAdapter`.
    pub fn new(client: Client<OpenAIConfig>, model: String) -> Self {
        Self { client, model }
    }
}

/// The model answers with a bare JSON array of question strings.
pub(crate) fn parse_question_list(raw: &str) -> PortResult<Vec<String>> {
    let cleaned = strip_code_fences(raw);
    let questions: Vec<String> = serde_json::from_str(&cleaned).map_err(|e| {
        PortError::Unexpected(format!("Question list is not a valid JSON array: {}", e))
    })?;
    if questions.is_empty() {
        return Err(PortError::Unexpected(
            "Question generation returned an empty list".to_string(),
        ));
    }
    Ok(questions)
}

//=========================================================================================
// `QuestionGenerationService` Trait Implementation
//=========================================================================================

#[async_trait]
impl QuestionGenerationService for OpenAiQuestionAdapter {
    /// Generates the ordered question list for a new interview.
    async fn generate_questions(&self, request: &QuestionRequest) -> PortResult<Vec<String>> {
        let user_input = USER_INPUT_TEMPLATE
            .replace("{role}", &request.role)
            .replace("{level}", &request.level)
            .replace("{techstack}", &request.techstack.join(", "))
            .replace("{type}", request.interview_type.as_str())
            .replace("{amount}", &request.amount.to_string());

        let messages = vec![
            ChatCompletionRequestSystemMessageArgs::default()
                .content(
                    "You are an interview preparation assistant generating questions for a \
                     mock job interview.",
                )
                .build()
                .map_err(|e| PortError::Unexpected(e.to_string()))?
                .into(),
            ChatCompletionRequestUserMessageArgs::default()
                .content(user_input)
                .build()
                .map_err(|e| PortError::Unexpected(e.to_string()))?
                .into(),
        ];

        let request = CreateChatCompletionRequestArgs::default()
            .model(&self.model)
            .messages(messages)
            .n(1)
            .build()
            .map_err(|e| PortError::Unexpected(e.to_string()))?;

        // Call the API and manually map the error if it occurs, which respects the orphan rule.
        let response = self
            .client
            .chat()
            .create(request)
            .await
            .map_err(|e: OpenAIError| PortError::Unexpected(e.to_string()))?;

        let content = response
            .choices
            .into_iter()
            .next()
            .and_then(|choice| choice.message.content)
            .ok_or_else(|| {
                PortError::Unexpected(
                    "Question generation LLM response contained no text content.".to_string(),
                )
            })?;

        parse_question_list(&content)
    }
}
