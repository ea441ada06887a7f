//! LLM 모듈 - Gemini API 텍스트 생성
//!
//! 프롬프트 문자열을 넣고 생성 텍스트를 받는 완성(completion) 클라이언트.
//! 파티션 에이전트용 워커 모델과 통합 답변용 헤드 모델을 구분합니다.
//!
//! ## 사용법
//! ```rust,ignore
//! let llm = GeminiClient::worker_from_env()?;
//! let answer = llm.complete("플라스틱 용기의 HS 코드는?").await?;
//! ```

pub mod prompts;

use std::sync::Arc;
use std::time::{Duration, Instant};

use anyhow::{Context, Result};
use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use thiserror::Error;
use tokio::sync::Mutex;

// ============================================================================
// LlmProvider Trait
// ============================================================================

/// 텍스트 완성 프로바이더 트레이트
///
/// 프롬프트 문자열 입력, 생성 텍스트 출력. 실패는 호출자에게 그대로
/// 전파되며 이 계층에서는 복구하지 않습니다.
#[async_trait]
pub trait LlmProvider: Send + Sync {
    /// 단일 프롬프트 완성
    async fn complete(&self, prompt: &str) -> Result<String, LlmError>;

    /// 모델 이름
    fn model(&self) -> &str;
}

/// LLM 호출 실패 분류
#[derive(Debug, Error)]
pub enum LlmError {
    #[error("HTTP 요청 실패: {0}")]
    Http(String),

    #[error("Gemini API 오류 ({status}): {message}")]
    Api { status: String, message: String },

    #[error("응답 파싱 실패: {0}")]
    Parse(String),

    #[error("재시도 한도 초과 (rate limit)")]
    RateLimited,

    #[error("응답에 생성 텍스트가 없습니다")]
    EmptyResponse,
}

// ============================================================================
// Google Gemini Client
// ============================================================================

/// Gemini 생성 API 엔드포인트
/// source: https://ai.google.dev/gemini-api/docs/text-generation
const GEMINI_GENERATE_URL: &str = "https://generativelanguage.googleapis.com/v1beta/models";

/// 파티션 에이전트용 워커 모델
pub const WORKER_MODEL: &str = "gemini-2.0-flash";
/// 통합 답변용 헤드 모델
pub const HEAD_MODEL: &str = "gemini-2.5-flash";

/// Rate Limiter 설정 (무료 티어 RPM 준수)
const RATE_LIMIT_RPM: u32 = 60;
const RATE_LIMIT_WINDOW: Duration = Duration::from_secs(60);
/// 호출 간 최소 딜레이 (버스트 방지)
const MIN_DELAY_MS: u64 = 200;
/// 429 에러 시 최대 재시도 횟수
const MAX_RETRIES: u32 = 3;
/// 재시도 시 초기 백오프 (ms)
const INITIAL_BACKOFF_MS: u64 = 2000;

/// Google Gemini 완성 클라이언트
#[derive(Debug)]
pub struct GeminiClient {
    api_key: String,
    client: reqwest::Client,
    model: String,
    rate_limiter: Arc<Mutex<RateLimiter>>,
}

/// 최소 딜레이 + 슬라이딩 윈도우 rate limiter
#[derive(Debug)]
struct RateLimiter {
    requests: Vec<Instant>,
    max_requests: u32,
    window: Duration,
    min_delay: Duration,
    last_request: Option<Instant>,
}

impl RateLimiter {
    fn new(max_requests: u32, window: Duration) -> Self {
        Self {
            requests: Vec::new(),
            max_requests,
            window,
            min_delay: Duration::from_millis(MIN_DELAY_MS),
            last_request: None,
        }
    }

    /// 요청 가능 시점까지 대기
    async fn acquire(&mut self) {
        if let Some(last) = self.last_request {
            let elapsed = last.elapsed();
            if elapsed < self.min_delay {
                tokio::time::sleep(self.min_delay - elapsed).await;
            }
        }

        let now = Instant::now();
        self.requests.retain(|&t| now.duration_since(t) < self.window);

        if self.requests.len() >= self.max_requests as usize {
            if let Some(&oldest) = self.requests.first() {
                let wait_time = self.window - now.duration_since(oldest);
                if !wait_time.is_zero() {
                    tracing::debug!("Rate limit reached, waiting {:?}", wait_time);
                    tokio::time::sleep(wait_time).await;
                }
                let now = Instant::now();
                self.requests.retain(|&t| now.duration_since(t) < self.window);
            }
        }

        let now = Instant::now();
        self.requests.push(now);
        self.last_request = Some(now);
    }
}

impl GeminiClient {
    /// 새 클라이언트 생성
    ///
    /// # Arguments
    /// * `api_key` - Google AI API 키
    /// * `model` - 모델 이름 (예: "gemini-2.0-flash")
    pub fn new(api_key: String, model: &str) -> Result<Self> {
        let client = reqwest::Client::builder()
            .timeout(Duration::from_secs(120))
            .build()
            .context("Failed to create HTTP client")?;

        let rate_limiter = Arc::new(Mutex::new(RateLimiter::new(
            RATE_LIMIT_RPM,
            RATE_LIMIT_WINDOW,
        )));

        Ok(Self {
            api_key,
            client,
            model: model.to_string(),
            rate_limiter,
        })
    }

    /// 환경변수에서 API 키를 읽어 생성
    pub fn from_env(model: &str) -> Result<Self> {
        let api_key = get_api_key()?;
        Self::new(api_key, model)
    }

    /// 워커 모델 클라이언트
    pub fn worker_from_env() -> Result<Self> {
        Self::from_env(WORKER_MODEL)
    }

    /// 헤드 모델 클라이언트
    pub fn head_from_env() -> Result<Self> {
        Self::from_env(HEAD_MODEL)
    }
}

/// Gemini API 요청 본문
/// source: https://ai.google.dev/gemini-api/docs/text-generation
#[derive(Debug, Serialize)]
struct GenerateRequest {
    contents: Vec<RequestContent>,
}

#[derive(Debug, Serialize)]
struct RequestContent {
    parts: Vec<TextPart>,
}

#[derive(Debug, Serialize, Deserialize)]
struct TextPart {
    text: String,
}

/// Gemini API 응답
#[derive(Debug, Deserialize)]
struct GenerateResponse {
    #[serde(default)]
    candidates: Vec<ResponseCandidate>,
}

#[derive(Debug, Deserialize)]
struct ResponseCandidate {
    content: ResponseContent,
}

#[derive(Debug, Deserialize)]
struct ResponseContent {
    #[serde(default)]
    parts: Vec<TextPart>,
}

/// Gemini API 에러 응답
#[derive(Debug, Deserialize)]
struct GeminiError {
    error: GeminiErrorDetail,
}

#[derive(Debug, Deserialize)]
struct GeminiErrorDetail {
    message: String,
    #[serde(default)]
    status: String,
}

#[async_trait]
impl LlmProvider for GeminiClient {
    async fn complete(&self, prompt: &str) -> Result<String, LlmError> {
        let request = GenerateRequest {
            contents: vec![RequestContent {
                parts: vec![TextPart {
                    text: prompt.to_string(),
                }],
            }],
        };

        let url = format!("{}/{}:generateContent", GEMINI_GENERATE_URL, self.model);
        let mut last_error: Option<LlmError> = None;

        // 재시도 루프 (전송 실패·429는 지수 백오프 후 재시도)
        for attempt in 0..=MAX_RETRIES {
            {
                let mut limiter = self.rate_limiter.lock().await;
                limiter.acquire().await;
            }

            // API 키는 URL이 아닌 헤더로 전송
            let response = match self
                .client
                .post(&url)
                .header("x-goog-api-key", &self.api_key)
                .json(&request)
                .send()
                .await
            {
                Ok(resp) => resp,
                Err(e) => {
                    last_error = Some(LlmError::Http(e.to_string()));
                    if attempt < MAX_RETRIES {
                        let backoff = Duration::from_millis(INITIAL_BACKOFF_MS * 2u64.pow(attempt));
                        tracing::warn!(
                            "LLM 요청 실패, {:?} 후 재시도 ({}/{})",
                            backoff,
                            attempt + 1,
                            MAX_RETRIES
                        );
                        tokio::time::sleep(backoff).await;
                        continue;
                    }
                    break;
                }
            };

            let status = response.status();
            let body = response
                .text()
                .await
                .map_err(|e| LlmError::Http(e.to_string()))?;

            if status.is_success() {
                let parsed: GenerateResponse =
                    serde_json::from_str(&body).map_err(|e| LlmError::Parse(e.to_string()))?;

                let text: String = parsed
                    .candidates
                    .into_iter()
                    .flat_map(|c| c.content.parts)
                    .map(|p| p.text)
                    .collect::<Vec<_>>()
                    .join("");

                if text.is_empty() {
                    return Err(LlmError::EmptyResponse);
                }
                return Ok(text);
            }

            if status.as_u16() == 429 {
                let backoff = Duration::from_millis(INITIAL_BACKOFF_MS * 2u64.pow(attempt));
                tracing::warn!(
                    "Rate limit (429), {:?} 백오프 ({}/{})",
                    backoff,
                    attempt + 1,
                    MAX_RETRIES
                );
                last_error = Some(LlmError::RateLimited);

                if attempt < MAX_RETRIES {
                    tokio::time::sleep(backoff).await;
                    continue;
                }
            } else {
                if let Ok(error) = serde_json::from_str::<GeminiError>(&body) {
                    return Err(LlmError::Api {
                        status: error.error.status,
                        message: error.error.message,
                    });
                }
                return Err(LlmError::Api {
                    status: status.to_string(),
                    message: body,
                });
            }
        }

        Err(last_error.unwrap_or(LlmError::RateLimited))
    }

    fn model(&self) -> &str {
        &self.model
    }
}

// ============================================================================
// API Key Management
// ============================================================================

/// API 키 로드 (환경변수에서)
///
/// 우선순위:
/// 1. `GEMINI_API_KEY`
/// 2. `GOOGLE_AI_API_KEY`
pub fn get_api_key() -> Result<String> {
    if let Ok(key) = std::env::var("GEMINI_API_KEY") {
        if !key.is_empty() {
            return Ok(key);
        }
    }

    if let Ok(key) = std::env::var("GOOGLE_AI_API_KEY") {
        if !key.is_empty() {
            return Ok(key);
        }
    }

    anyhow::bail!(
        "API key not found. Set GEMINI_API_KEY or GOOGLE_AI_API_KEY environment variable.\n\
         Get your API key at: https://aistudio.google.com/app/apikey"
    )
}

/// API 키 존재 여부 확인
pub fn has_api_key() -> bool {
    get_api_key().is_ok()
}

// ============================================================================
// Tests
// ============================================================================

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_client_creation() {
        let client = GeminiClient::new("fake_key".to_string(), WORKER_MODEL);
        assert!(client.is_ok());
        assert_eq!(client.unwrap().model(), "gemini-2.0-flash");
    }

    #[test]
    fn test_generate_request_shape() {
        let request = GenerateRequest {
            contents: vec![RequestContent {
                parts: vec![TextPart {
                    text: "질문".to_string(),
                }],
            }],
        };

        let json = serde_json::to_value(&request).unwrap();
        assert_eq!(json["contents"][0]["parts"][0]["text"], "질문");
    }

    #[test]
    fn test_parse_generate_response() {
        let body = r#"{
            "candidates": [
                {"content": {"parts": [{"text": "HS 3923에 "}, {"text": "분류됩니다"}], "role": "model"}}
            ]
        }"#;

        let parsed: GenerateResponse = serde_json::from_str(body).unwrap();
        let text: String = parsed
            .candidates
            .into_iter()
            .flat_map(|c| c.content.parts)
            .map(|p| p.text)
            .collect();
        assert_eq!(text, "HS 3923에 분류됩니다");
    }

    #[test]
    fn test_parse_error_response() {
        let body = r#"{"error": {"message": "invalid key", "status": "UNAUTHENTICATED"}}"#;
        let parsed: GeminiError = serde_json::from_str(body).unwrap();
        assert_eq!(parsed.error.status, "UNAUTHENTICATED");
    }

    #[test]
    fn test_empty_candidates_tolerated_by_parser() {
        let parsed: GenerateResponse = serde_json::from_str("{}").unwrap();
        assert!(parsed.candidates.is_empty());
    }
}
