//! DeepSeek chat-completions 클라이언트.
//!
//! `LlmClient` trait의 기본 구현입니다. 응답 content는 그대로
//! 반환하며 해석은 정규화 단계에 맡깁니다.

use std::time::Duration;

use async_trait::async_trait;
use serde::Deserialize;
use tracing::debug;

use crate::analyzer::{LlmClient, SignalError};

/// DeepSeek 클라이언트 설정.
#[derive(Debug, Clone)]
pub struct DeepSeekConfig {
    /// API 키
    pub api_key: String,
    /// API 베이스 URL
    pub base_url: String,
    /// 모델 이름
    pub model: String,
    /// 샘플링 온도
    pub temperature: f64,
    /// 요청 타임아웃
    pub timeout: Duration,
}

impl DeepSeekConfig {
    /// 기본값으로 생성.
    pub fn new(api_key: impl Into<String>) -> Self {
        Self {
            api_key: api_key.into(),
            base_url: "https://api.deepseek.com".to_string(),
            model: "deepseek-chat".to_string(),
            temperature: 0.1,
            timeout: Duration::from_secs(60),
        }
    }
}

/// DeepSeek HTTP 클라이언트.
pub struct DeepSeekClient {
    config: DeepSeekConfig,
    http: reqwest::Client,
}

impl DeepSeekClient {
    /// 새 클라이언트 생성.
    pub fn new(config: DeepSeekConfig) -> Result<Self, SignalError> {
        let http = reqwest::Client::builder()
            .timeout(config.timeout)
            .build()
            .map_err(|e| SignalError::Llm(format!("HTTP 클라이언트 생성 실패: {}", e)))?;

        Ok(Self { config, http })
    }
}

#[derive(Debug, Deserialize)]
struct ChatResponse {
    choices: Vec<ChatChoice>,
}

#[derive(Debug, Deserialize)]
struct ChatChoice {
    message: ChatMessage,
}

#[derive(Debug, Deserialize)]
struct ChatMessage {
    content: String,
}

#[async_trait]
impl LlmClient for DeepSeekClient {
    async fn complete(
        &self,
        system_prompt: &str,
        user_prompt: &str,
    ) -> Result<String, SignalError> {
        let body = serde_json::json!({
            "model": self.config.model,
            "messages": [
                { "role": "system", "content": system_prompt },
                { "role": "user", "content": user_prompt },
            ],
            "stream": false,
            "temperature": self.config.temperature,
        });

        let url = format!("{}/chat/completions", self.config.base_url);
        let response = self
            .http
            .post(&url)
            .bearer_auth(&self.config.api_key)
            .json(&body)
            .send()
            .await
            .map_err(|e| {
                if e.is_timeout() {
                    SignalError::Timeout(e.to_string())
                } else {
                    SignalError::Llm(e.to_string())
                }
            })?;

        let status = response.status();
        if !status.is_success() {
            let detail = response.text().await.unwrap_or_default();
            return Err(SignalError::Llm(format!("HTTP {}: {}", status, detail)));
        }

        let payload: ChatResponse = response
            .json()
            .await
            .map_err(|e| SignalError::Response(e.to_string()))?;

        let content = payload
            .choices
            .into_iter()
            .next()
            .map(|choice| choice.message.content)
            .ok_or_else(|| SignalError::Response("choices가 비어 있음".to_string()))?;

        debug!(model = %self.config.model, length = content.len(), "LLM 응답 수신");
        Ok(content)
    }

    fn client_name(&self) -> &str {
        "deepseek"
    }
}
