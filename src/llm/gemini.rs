//! Gemini REST client (`generateContent`).

use async_trait::async_trait;
use base64::engine::general_purpose::STANDARD as BASE64;
use base64::Engine;
use chrono::Utc;
use reqwest::Client;
use serde::Serialize;
use serde_json::Value;

use super::{Content, GenerationRequest, GenerationService, Part};
use crate::config::LlmSettings;
use crate::db::{self, DbPool, ModelUsage};
use crate::error::{Error, LogOnError, Result};

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
struct GeminiRequest {
    contents: Vec<GeminiContent>,
    #[serde(skip_serializing_if = "Option::is_none")]
    system_instruction: Option<GeminiContent>,
    #[serde(skip_serializing_if = "Option::is_none")]
    generation_config: Option<GeminiGenerationConfig>,
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
struct GeminiContent {
    #[serde(skip_serializing_if = "Option::is_none")]
    role: Option<String>,
    parts: Vec<GeminiPart>,
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
struct GeminiPart {
    #[serde(skip_serializing_if = "Option::is_none")]
    text: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    inline_data: Option<GeminiInlineData>,
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
struct GeminiInlineData {
    mime_type: String,
    data: String,
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
struct GeminiGenerationConfig {
    #[serde(skip_serializing_if = "Option::is_none")]
    response_mime_type: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    response_schema: Option<Value>,
    #[serde(skip_serializing_if = "Option::is_none")]
    thinking_config: Option<GeminiThinkingConfig>,
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
struct GeminiThinkingConfig {
    thinking_budget: i32,
}

impl From<&Part> for GeminiPart {
    fn from(part: &Part) -> Self {
        match part {
            Part::Text(text) => Self {
                text: Some(text.clone()),
                inline_data: None,
            },
            Part::Media { mime_type, data } => Self {
                text: None,
                inline_data: Some(GeminiInlineData {
                    mime_type: mime_type.clone(),
                    data: BASE64.encode(data),
                }),
            },
        }
    }
}

/// Gemini wants alternating roles, so consecutive same-role contents are merged
fn to_gemini_contents(contents: &[Content]) -> Vec<GeminiContent> {
    let mut merged: Vec<GeminiContent> = Vec::new();
    for content in contents {
        let role = content.role.as_str();
        let parts: Vec<GeminiPart> = content.parts.iter().map(GeminiPart::from).collect();
        let same_role = merged
            .last()
            .is_some_and(|last| last.role.as_deref() == Some(role));
        if same_role {
            if let Some(last) = merged.last_mut() {
                last.parts.extend(parts);
            }
        } else {
            merged.push(GeminiContent {
                role: Some(role.to_string()),
                parts,
            });
        }
    }
    merged
}

fn build_request_body(request: &GenerationRequest) -> GeminiRequest {
    let system_instruction = (!request.system_prompt.is_empty()).then(|| GeminiContent {
        role: None,
        parts: vec![GeminiPart {
            text: Some(request.system_prompt.clone()),
            inline_data: None,
        }],
    });

    let structured = request.response_schema.is_some();
    let generation_config = (structured || request.disable_thinking).then(|| GeminiGenerationConfig {
        response_mime_type: structured.then(|| "application/json".to_string()),
        response_schema: request.response_schema.clone(),
        thinking_config: request
            .disable_thinking
            .then_some(GeminiThinkingConfig { thinking_budget: 0 }),
    });

    GeminiRequest {
        contents: to_gemini_contents(&request.contents),
        system_instruction,
        generation_config,
    }
}

/// Pull the candidate text out of a response; parse it when structured output was requested.
fn extract_response(response: &Value, structured: bool) -> Result<Option<Value>> {
    let text = response
        .pointer("/candidates/0/content/parts")
        .and_then(Value::as_array)
        .map(|parts| {
            parts
                .iter()
                .filter_map(|p| p.get("text").and_then(Value::as_str))
                .collect::<String>()
        })
        .unwrap_or_default();

    if text.trim().is_empty() {
        if let Some(reason) = response.pointer("/candidates/0/finishReason").and_then(Value::as_str) {
            tracing::warn!("Gemini returned no text (finish reason: {})", reason);
        }
        return Ok(None);
    }

    if structured {
        let parsed = serde_json::from_str(&text)
            .map_err(|e| Error::Validation(format!("model returned invalid JSON: {}", e)))?;
        Ok(Some(parsed))
    } else {
        Ok(Some(Value::String(text)))
    }
}

fn usage_from_response(response: &Value, model: &str) -> Option<ModelUsage> {
    let meta = response.get("usageMetadata")?;
    let count = |key: &str| meta.get(key).and_then(Value::as_i64).unwrap_or(0);
    Some(ModelUsage {
        model_name: model.to_string(),
        prompt_tokens: count("promptTokenCount"),
        response_tokens: count("candidatesTokenCount"),
        thoughts_tokens: count("thoughtsTokenCount"),
        total_tokens: count("totalTokenCount"),
    })
}

pub struct GeminiClient {
    http: Client,
    base_url: String,
    api_key: Option<String>,
    model: String,
    usage_db: Option<DbPool>,
}

impl GeminiClient {
    pub fn new(settings: &LlmSettings) -> Self {
        Self {
            http: Client::new(),
            base_url: settings.base_url.trim_end_matches('/').to_string(),
            api_key: settings.api_key.clone(),
            model: settings.model.clone(),
            usage_db: None,
        }
    }

    /// Record token usage of every call in `model_usage`.
    pub fn with_usage_log(mut self, db: DbPool) -> Self {
        self.usage_db = Some(db);
        self
    }

    fn record_usage(&self, usage: &ModelUsage) {
        let Some(pool) = &self.usage_db else {
            return;
        };
        if let Some(conn) = db::try_lock(pool).log_warn("Usage log unavailable") {
            db::record_usage(&conn, usage, Utc::now()).log_warn("Failed to record model usage");
        }
    }
}

#[async_trait]
impl GenerationService for GeminiClient {
    async fn generate(&self, request: GenerationRequest) -> Result<Option<Value>> {
        let api_key = self
            .api_key
            .as_deref()
            .ok_or_else(|| Error::Config("GEMINI_KEY is not set".to_string()))?;
        let model = request.model.clone().unwrap_or_else(|| self.model.clone());
        let url = format!("{}/v1beta/models/{}:generateContent", self.base_url, model);
        let body = build_request_body(&request);

        tracing::debug!(
            "Gemini request: model={}, contents={}, structured={}",
            model,
            body.contents.len(),
            request.response_schema.is_some()
        );

        let response = self
            .http
            .post(&url)
            .query(&[("key", api_key)])
            .json(&body)
            .send()
            .await?;

        if !response.status().is_success() {
            let status = response.status();
            let error_text = response.text().await.unwrap_or_default();
            return Err(Error::Generation(format!(
                "Gemini API error: {} - {}",
                status, error_text
            )));
        }

        let response_json: Value = response.json().await?;
        if let Some(usage) = usage_from_response(&response_json, &model) {
            self.record_usage(&usage);
        }
        extract_response(&response_json, request.response_schema.is_some())
    }
}
