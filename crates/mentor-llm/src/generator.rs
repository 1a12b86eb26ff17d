//! The four generation kinds on top of an [`LlmClient`].
//!
//! Batch kinds ask the model for JSON matching a declared response schema
//! and then validate every item strictly. A batch either decodes completely
//! or is replaced by an empty one carrying a [`SchemaViolation`]; partially
//! shaped items never reach the caller.

use crate::{GeminiClient, LlmClient};
use mentor_core::{
    Flashcard, GenerateRequest, GenerationKind, InlineAttachment, LlmConfig, QuizQuestion,
    StudyPlanItem,
};
use serde::de::DeserializeOwned;
use serde_json::{Value, json};
use thiserror::Error;

const FLASHCARDS_PROMPT: &str = "Based on the following information, generate 5 high-quality flashcards for active recall. Focus on key concepts, definitions, and relationships:";
const QUIZ_PROMPT: &str = "Generate a challenging 5-question multiple-choice quiz based on this content. Include one correct answer and three plausible distractors per question:";
const STUDY_PLAN_PROMPT: &str =
    "Create a structured study plan with 4 key milestones based on this content:";

#[derive(Debug, Error)]
pub enum GenerationError {
    /// Auth, network, HTTP status, or an unusable provider payload.
    #[error(transparent)]
    Transport(#[from] anyhow::Error),
    #[error("malformed {kind} response: {detail}")]
    Malformed {
        kind: GenerationKind,
        detail: String,
    },
}

/// Why a batch response was rejected.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
#[error("{kind} response rejected{}: {detail}", item_suffix(.index))]
pub struct SchemaViolation {
    pub kind: GenerationKind,
    pub index: Option<usize>,
    pub detail: String,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Batch<T> {
    pub items: Vec<T>,
    /// Set when the response was malformed and `items` is the empty fallback.
    pub violation: Option<SchemaViolation>,
}

impl<T> Batch<T> {
    pub fn accepted(items: Vec<T>) -> Self {
        Self {
            items,
            violation: None,
        }
    }

    pub fn recovered(violation: SchemaViolation) -> Self {
        Self {
            items: Vec::new(),
            violation: Some(violation),
        }
    }

    pub fn is_recovered(&self) -> bool {
        self.violation.is_some()
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ReasoningReply {
    pub text: String,
    pub thinking: Option<String>,
}

pub struct Generator {
    client: Box<dyn LlmClient>,
    reasoning_model: String,
    speed_model: String,
    thinking_budget: u32,
    system_instruction: String,
}

impl Generator {
    pub fn new(client: Box<dyn LlmClient>, cfg: &LlmConfig) -> Self {
        Self {
            client,
            reasoning_model: cfg.reasoning_model.clone(),
            speed_model: cfg.speed_model.clone(),
            thinking_budget: cfg.thinking_budget,
            system_instruction: cfg.system_instruction.clone(),
        }
    }

    /// Generator backed by the Gemini REST client.
    pub fn from_config(cfg: &LlmConfig) -> anyhow::Result<Self> {
        Ok(Self::new(Box::new(GeminiClient::new(cfg.clone())?), cfg))
    }

    pub fn reasoning_reply(
        &self,
        prompt: &str,
        attachments: &[InlineAttachment],
    ) -> Result<ReasoningReply, GenerationError> {
        let response = self.client.generate(&GenerateRequest {
            model: self.reasoning_model.clone(),
            prompt: prompt.to_string(),
            attachments: attachments.to_vec(),
            system_instruction: Some(self.system_instruction.clone()),
            response_schema: None,
            thinking_budget: (self.thinking_budget > 0).then_some(self.thinking_budget),
        })?;
        if response.text.trim().is_empty() {
            return Err(GenerationError::Malformed {
                kind: GenerationKind::ReasoningReply,
                detail: format!("reply has no text (finish reason {})", response.finish_reason),
            });
        }
        Ok(ReasoningReply {
            text: response.text,
            thinking: response.thinking.filter(|t| !t.trim().is_empty()),
        })
    }

    pub fn flashcards(&self, content: &str) -> Result<Batch<Flashcard>, GenerationError> {
        let body = self.request_batch(FLASHCARDS_PROMPT, content, flashcard_schema())?;
        Ok(decode_batch(GenerationKind::Flashcards, &body, |_| Ok(())))
    }

    pub fn quiz(&self, content: &str) -> Result<Batch<QuizQuestion>, GenerationError> {
        let body = self.request_batch(QUIZ_PROMPT, content, quiz_schema())?;
        Ok(decode_batch(GenerationKind::Quiz, &body, QuizQuestion::validate))
    }

    pub fn study_plan(&self, content: &str) -> Result<Batch<StudyPlanItem>, GenerationError> {
        let body = self.request_batch(STUDY_PLAN_PROMPT, content, study_plan_schema())?;
        Ok(decode_batch(GenerationKind::StudyPlan, &body, |_| Ok(())))
    }

    fn request_batch(
        &self,
        instruction: &str,
        content: &str,
        schema: Value,
    ) -> Result<String, GenerationError> {
        let response = self.client.generate(&GenerateRequest {
            model: self.speed_model.clone(),
            prompt: format!("{instruction}\n\n{content}"),
            attachments: Vec::new(),
            system_instruction: None,
            response_schema: Some(schema),
            thinking_budget: None,
        })?;
        Ok(response.text)
    }
}

/// Decodes a JSON array of `T`, rejecting the whole batch on the first bad item.
pub(crate) fn decode_batch<T, F>(kind: GenerationKind, body: &str, validate: F) -> Batch<T>
where
    T: DeserializeOwned,
    F: Fn(&T) -> Result<(), String>,
{
    let body = strip_code_fences(body);
    if body.is_empty() {
        return Batch::accepted(Vec::new());
    }
    let violation = |index: Option<usize>, detail: String| {
        Batch::recovered(SchemaViolation {
            kind,
            index,
            detail,
        })
    };

    let raw_items = match serde_json::from_str::<Value>(body) {
        Ok(Value::Array(items)) => items,
        Ok(other) => {
            return violation(None, format!("expected a JSON array, got {}", json_type(&other)));
        }
        Err(err) => return violation(None, format!("invalid JSON: {err}")),
    };

    let mut items = Vec::with_capacity(raw_items.len());
    for (index, raw) in raw_items.into_iter().enumerate() {
        let item = match serde_json::from_value::<T>(raw) {
            Ok(item) => item,
            Err(err) => return violation(Some(index), err.to_string()),
        };
        if let Err(detail) = validate(&item) {
            return violation(Some(index), detail);
        }
        items.push(item);
    }
    Batch::accepted(items)
}

fn item_suffix(index: &Option<usize>) -> String {
    index.map(|i| format!(" at item {i}")).unwrap_or_default()
}

fn strip_code_fences(body: &str) -> &str {
    let trimmed = body.trim();
    let Some(rest) = trimmed.strip_prefix("```") else {
        return trimmed;
    };
    let rest = rest.strip_suffix("```").unwrap_or(rest);
    match rest.split_once('\n') {
        Some((info, inner)) if !info.contains(['[', '{']) => inner.trim(),
        _ => rest.trim(),
    }
}

fn json_type(value: &Value) -> &'static str {
    match value {
        Value::Null => "null",
        Value::Bool(_) => "a boolean",
        Value::Number(_) => "a number",
        Value::String(_) => "a string",
        Value::Array(_) => "an array",
        Value::Object(_) => "an object",
    }
}

fn string_props(names: &[&str]) -> serde_json::Map<String, Value> {
    names
        .iter()
        .map(|name| (name.to_string(), json!({ "type": "STRING" })))
        .collect()
}

pub fn flashcard_schema() -> Value {
    json!({
        "type": "ARRAY",
        "items": {
            "type": "OBJECT",
            "properties": string_props(&["id", "question", "answer", "category"]),
            "required": ["id", "question", "answer", "category"]
        }
    })
}

pub fn quiz_schema() -> Value {
    let mut properties = string_props(&["id", "question", "explanation"]);
    properties.insert(
        "options".into(),
        json!({ "type": "ARRAY", "items": { "type": "STRING" } }),
    );
    properties.insert("correctAnswer".into(), json!({ "type": "INTEGER" }));
    json!({
        "type": "ARRAY",
        "items": {
            "type": "OBJECT",
            "properties": properties,
            "required": ["id", "question", "options", "correctAnswer", "explanation"]
        }
    })
}

pub fn study_plan_schema() -> Value {
    let mut properties = string_props(&["id", "title", "duration"]);
    properties.insert(
        "tasks".into(),
        json!({ "type": "ARRAY", "items": { "type": "STRING" } }),
    );
    json!({
        "type": "ARRAY",
        "items": {
            "type": "OBJECT",
            "properties": properties,
            "required": ["id", "title", "duration", "tasks"]
        }
    })
}
