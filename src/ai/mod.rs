// 提示词优化的上游生成服务

use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use serde::Deserialize;

use crate::config::Config;

const OPTIMIZE_INSTRUCTION: &str = "You are a prompt engineering assistant. Rewrite the user's prompt so it is clear, specific and well structured for a large language model. Keep the original intent and language. Reply with the improved prompt only.";

#[derive(Debug, thiserror::Error)]
pub enum AiError {
    #[error("generation service is not configured")]
    NotConfigured,

    #[error("request to generation service timed out: {0}")]
    Timeout(String),

    #[error("network error: {0}")]
    Network(String),

    #[error("generation service returned {status}: {message}")]
    Api { status: u16, message: String },

    #[error("unexpected response: {0}")]
    InvalidResponse(String),
}

/// 提示词优化接口
#[async_trait]
pub trait PromptGenerator: Send + Sync {
    async fn optimize(&self, prompt: &str) -> Result<String, AiError>;
}

/// 未配置密钥时使用，所有请求都返回 `NotConfigured`
#[derive(Debug, Default, Clone, Copy)]
pub struct DisabledGenerator;

#[async_trait]
impl PromptGenerator for DisabledGenerator {
    async fn optimize(&self, _prompt: &str) -> Result<String, AiError> {
        Err(AiError::NotConfigured)
    }
}

#[derive(Debug, Deserialize)]
struct GeminiPart {
    text: Option<String>,
}

#[derive(Debug, Deserialize)]
struct GeminiContent {
    parts: Vec<GeminiPart>,
}

#[derive(Debug, Deserialize)]
struct GeminiCandidate {
    content: Option<GeminiContent>,
}

#[derive(Debug, Deserialize)]
struct GeminiResponse {
    #[serde(default)]
    candidates: Vec<GeminiCandidate>,
}

/// 调用 Gemini generateContent 接口
pub struct GeminiGenerator {
    client: reqwest::Client,
    base_url: String,
    model: String,
    api_key: String,
}

impl GeminiGenerator {
    pub fn new(
        base_url: impl Into<String>,
        model: impl Into<String>,
        api_key: impl Into<String>,
        timeout: Duration,
    ) -> Result<Self, AiError> {
        let client = reqwest::Client::builder()
            .timeout(timeout)
            .build()
            .map_err(|e| AiError::Network(e.to_string()))?;

        Ok(Self {
            client,
            base_url: base_url.into(),
            model: model.into(),
            api_key: api_key.into(),
        })
    }

    fn map_error(err: reqwest::Error) -> AiError {
        if err.is_timeout() {
            AiError::Timeout(err.to_string())
        } else {
            AiError::Network(err.to_string())
        }
    }
}

#[async_trait]
impl PromptGenerator for GeminiGenerator {
    async fn optimize(&self, prompt: &str) -> Result<String, AiError> {
        let body = serde_json::json!({
            "systemInstruction": { "parts": [{ "text": OPTIMIZE_INSTRUCTION }] },
            "contents": [{ "role": "user", "parts": [{ "text": prompt }] }],
            "generationConfig": { "temperature": 0.4 }
        });

        let url = format!(
            "{}/v1beta/models/{}:generateContent",
            self.base_url.trim_end_matches('/'),
            self.model
        );

        let resp = self
            .client
            .post(&url)
            .query(&[("key", self.api_key.as_str())])
            .json(&body)
            .send()
            .await
            .map_err(Self::map_error)?;

        let status = resp.status();
        let text = resp.text().await.map_err(Self::map_error)?;

        if !status.is_success() {
            return Err(AiError::Api {
                status: status.as_u16(),
                message: text,
            });
        }

        extract_text(&text)
    }
}

/// 取第一个候选结果的文本
fn extract_text(body: &str) -> Result<String, AiError> {
    let parsed: GeminiResponse =
        serde_json::from_str(body).map_err(|e| AiError::InvalidResponse(e.to_string()))?;

    parsed
        .candidates
        .into_iter()
        .find_map(|c| c.content)
        .and_then(|c| c.parts.into_iter().find_map(|p| p.text))
        .map(|text| text.trim().to_string())
        .filter(|text| !text.is_empty())
        .ok_or_else(|| AiError::InvalidResponse("no candidate text".into()))
}

/// 根据配置选择生成服务实现
pub fn from_config(config: &Config) -> Result<Arc<dyn PromptGenerator>, AiError> {
    match &config.ai_api_key {
        Some(key) => Ok(Arc::new(GeminiGenerator::new(
            &config.ai_api_base,
            &config.ai_model,
            key,
            config.ai_timeout(),
        )?)),
        None => {
            tracing::warn!("AI_API_KEY not set, prompt optimization is disabled");
            Ok(Arc::new(DisabledGenerator))
        }
    }
}
