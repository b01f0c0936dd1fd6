//! Structured generation through an external language model.
//!
//! Callers describe a request (system prompt, ordered contents, optional
//! JSON response schema) and get back either parsed JSON or plain text.
//! `Ok(None)` means the model produced nothing usable.

pub mod gemini;
pub mod retry;
pub mod schema;
#[cfg(test)]
pub mod scripted;

use async_trait::async_trait;
use serde::de::DeserializeOwned;
use serde_json::Value;

use crate::error::{Error, Result};

pub use gemini::GeminiClient;
pub use retry::{retry_n_times, with_timeout};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Role {
    User,
    Model,
}

impl Role {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::User => "user",
            Self::Model => "model",
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub enum Part {
    Text(String),
    /// Uploaded image or document
    Media { mime_type: String, data: Vec<u8> },
}

#[derive(Debug, Clone, PartialEq)]
pub struct Content {
    pub role: Role,
    pub parts: Vec<Part>,
}

impl Content {
    pub fn user_text(text: impl Into<String>) -> Self {
        Self {
            role: Role::User,
            parts: vec![Part::Text(text.into())],
        }
    }

    pub fn model_text(text: impl Into<String>) -> Self {
        Self {
            role: Role::Model,
            parts: vec![Part::Text(text.into())],
        }
    }

    pub fn media(mime_type: impl Into<String>, data: Vec<u8>) -> Self {
        Self {
            role: Role::User,
            parts: vec![Part::Media {
                mime_type: mime_type.into(),
                data,
            }],
        }
    }

    /// Concatenated text parts, used by logs and fakes
    pub fn text(&self) -> String {
        self.parts
            .iter()
            .filter_map(|p| match p {
                Part::Text(t) => Some(t.as_str()),
                Part::Media { .. } => None,
            })
            .collect::<Vec<_>>()
            .join("\n")
    }
}

#[derive(Debug, Clone, Default)]
pub struct GenerationRequest {
    pub system_prompt: String,
    pub contents: Vec<Content>,
    /// JSON schema the response must follow; plain text when absent
    pub response_schema: Option<Value>,
    pub disable_thinking: bool,
    /// Overrides the service's default model
    pub model: Option<String>,
}

impl GenerationRequest {
    pub fn new(system_prompt: impl Into<String>, contents: Vec<Content>) -> Self {
        Self {
            system_prompt: system_prompt.into(),
            contents,
            ..Default::default()
        }
    }

    pub fn with_model(mut self, model: impl Into<String>) -> Self {
        self.model = Some(model.into());
        self
    }

    pub fn with_thinking_disabled(mut self, disabled: bool) -> Self {
        self.disable_thinking = disabled;
        self
    }
}

/// The model service the planner, critic and task generators talk to.
#[async_trait]
pub trait GenerationService: Send + Sync {
    /// Parsed JSON for structured requests, `Value::String` for text requests.
    async fn generate(&self, request: GenerationRequest) -> Result<Option<Value>>;
}

/// A response shape the model can be asked for.
pub trait StructuredOutput: DeserializeOwned {
    fn response_schema() -> Value;

    /// Checks beyond what the schema can express
    fn validate(&self) -> Result<()> {
        Ok(())
    }
}

impl<T: StructuredOutput> StructuredOutput for Vec<T> {
    fn response_schema() -> Value {
        schema::array(T::response_schema())
    }

    fn validate(&self) -> Result<()> {
        if self.is_empty() {
            return Err(Error::Validation("empty list".to_string()));
        }
        self.iter().try_for_each(StructuredOutput::validate)
    }
}

/// Ask for a `T`, deserialize and validate it.
pub async fn generate_structured<T: StructuredOutput>(
    service: &dyn GenerationService,
    mut request: GenerationRequest,
) -> Result<Option<T>> {
    request.response_schema = Some(T::response_schema());
    let Some(value) = service.generate(request).await? else {
        return Ok(None);
    };

    let parsed: T = serde_json::from_value(value)
        .map_err(|e| Error::Validation(format!("response does not match schema: {}", e)))?;
    parsed.validate()?;
    Ok(Some(parsed))
}

/// Ask for free text.
pub async fn generate_text(service: &dyn GenerationService, mut request: GenerationRequest) -> Result<Option<String>> {
    request.response_schema = None;
    match service.generate(request).await? {
        Some(Value::String(text)) if !text.trim().is_empty() => Ok(Some(text)),
        Some(Value::String(_)) | None => Ok(None),
        Some(other) => Ok(Some(other.to_string())),
    }
}

#[cfg(test)]
mod tests {
    use super::scripted::ScriptedService;
    use super::*;
    use serde::Deserialize;
    use serde_json::json;

    #[derive(Debug, Deserialize)]
    struct Verdict {
        ok: bool,
        reason: String,
    }

    impl StructuredOutput for Verdict {
        fn response_schema() -> Value {
            schema::object(
                &[("ok", schema::boolean()), ("reason", schema::string())],
                &["ok", "reason"],
            )
        }

        fn validate(&self) -> Result<()> {
            if self.reason.is_empty() {
                return Err(Error::Validation("reason missing".into()));
            }
            Ok(())
        }
    }

    #[tokio::test]
    async fn test_generate_structured_parses_and_sets_schema() {
        let service = ScriptedService::new(vec![Ok(Some(json!({"ok": true, "reason": "fine"})))]);
        let request = GenerationRequest::new("judge", vec![Content::user_text("hi")]);

        let verdict: Verdict = generate_structured(&service, request).await.unwrap().unwrap();
        assert!(verdict.ok);

        let seen = service.requests();
        assert_eq!(seen.len(), 1);
        assert_eq!(seen[0].response_schema, Some(Verdict::response_schema()));
    }

    #[tokio::test]
    async fn test_generate_structured_schema_mismatch_is_validation() {
        let service = ScriptedService::new(vec![Ok(Some(json!({"ok": "yes"})))]);
        let result = generate_structured::<Verdict>(&service, GenerationRequest::default()).await;
        assert!(matches!(result, Err(Error::Validation(_))));
    }

    #[tokio::test]
    async fn test_generate_structured_runs_validate() {
        let service = ScriptedService::new(vec![Ok(Some(json!({"ok": false, "reason": ""})))]);
        let result = generate_structured::<Verdict>(&service, GenerationRequest::default()).await;
        assert!(matches!(result, Err(Error::Validation(_))));
    }

    #[tokio::test]
    async fn test_generate_structured_empty_list_invalid() {
        let service = ScriptedService::new(vec![Ok(Some(json!([])))]);
        let result = generate_structured::<Vec<Verdict>>(&service, GenerationRequest::default()).await;
        assert!(matches!(result, Err(Error::Validation(_))));
    }

    #[tokio::test]
    async fn test_generate_text() {
        let service = ScriptedService::new(vec![
            Ok(Some(Value::String("A summary".into()))),
            Ok(Some(Value::String("  ".into()))),
            Ok(None),
        ]);
        let request = GenerationRequest::new("summarize", vec![]);
        assert_eq!(
            generate_text(&service, request.clone()).await.unwrap().as_deref(),
            Some("A summary")
        );
        assert_eq!(generate_text(&service, request.clone()).await.unwrap(), None);
        assert_eq!(generate_text(&service, request).await.unwrap(), None);
        assert!(service.requests().iter().all(|r| r.response_schema.is_none()));
    }

    #[test]
    fn test_content_text_skips_media() {
        let content = Content {
            role: Role::User,
            parts: vec![
                Part::Text("look".into()),
                Part::Media {
                    mime_type: "image/png".into(),
                    data: vec![0],
                },
            ],
        };
        assert_eq!(content.text(), "look");
    }
}
