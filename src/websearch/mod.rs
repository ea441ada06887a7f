//! 웹 검색 모듈 - Serper API
//!
//! 물품개요·무역동향 등 일반 정보 질문을 위한 검색 결과 수집.
//! Serper의 organic 결과(제목/링크/스니펫)를 프롬프트 컨텍스트 블록으로
//! 정리합니다.

use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};

/// Serper 검색 엔드포인트
/// source: https://serper.dev/
const SERPER_URL: &str = "https://google.serper.dev/search";

/// 기본 검색 결과 수
pub const DEFAULT_SEARCH_HITS: usize = 5;

// ============================================================================
// Types
// ============================================================================

/// 검색 결과 한 건
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SearchHit {
    #[serde(default)]
    pub title: String,
    #[serde(default)]
    pub link: String,
    #[serde(default)]
    pub snippet: String,
}

#[derive(Debug, Serialize)]
struct SearchRequest<'a> {
    q: &'a str,
    num: usize,
}

#[derive(Debug, Deserialize)]
struct SearchResponse {
    #[serde(default)]
    organic: Vec<SearchHit>,
}

// ============================================================================
// SerperClient
// ============================================================================

/// Serper 웹 검색 클라이언트
pub struct SerperClient {
    client: reqwest::Client,
    api_key: String,
}

impl SerperClient {
    /// 새 클라이언트 생성
    pub fn new(api_key: String) -> Result<Self> {
        let client = reqwest::Client::builder()
            .user_agent("hscode-rag/0.1")
            .timeout(std::time::Duration::from_secs(30))
            .build()
            .context("HTTP 클라이언트 생성 실패")?;

        Ok(Self { client, api_key })
    }

    /// 환경변수(SERPER_API_KEY)에서 키를 읽어 생성
    pub fn from_env() -> Result<Self> {
        let api_key = get_serper_key()?;
        Self::new(api_key)
    }

    /// 웹 검색 수행
    pub async fn search(&self, query: &str, num: usize) -> Result<Vec<SearchHit>> {
        tracing::info!("웹 검색: {}", query);

        let response = self
            .client
            .post(SERPER_URL)
            .header("X-API-KEY", &self.api_key)
            .json(&SearchRequest { q: query, num })
            .send()
            .await
            .context("웹 검색 요청 실패")?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            anyhow::bail!("Serper API 오류 ({}): {}", status, body);
        }

        let parsed: SearchResponse = response
            .json()
            .await
            .context("웹 검색 응답 파싱 실패")?;

        Ok(parsed.organic)
    }
}

/// 검색 결과를 프롬프트 컨텍스트 블록으로 정리
pub fn render_hits(hits: &[SearchHit]) -> String {
    if hits.is_empty() {
        return "웹 검색 결과가 없습니다.".to_string();
    }

    hits.iter()
        .enumerate()
        .map(|(i, hit)| {
            format!(
                "{}. {}\n   {}\n   출처: {}",
                i + 1,
                hit.title,
                hit.snippet,
                hit.link
            )
        })
        .collect::<Vec<_>>()
        .join("\n\n")
}

// ============================================================================
// API Key Management
// ============================================================================

/// Serper API 키 로드 (환경변수에서)
pub fn get_serper_key() -> Result<String> {
    if let Ok(key) = std::env::var("SERPER_API_KEY") {
        if !key.is_empty() {
            return Ok(key);
        }
    }

    anyhow::bail!("SERPER_API_KEY 환경변수가 설정되지 않았습니다")
}

/// Serper API 키 존재 여부
pub fn has_serper_key() -> bool {
    get_serper_key().is_ok()
}

// ============================================================================
// Tests
// ============================================================================

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_client_creation() {
        assert!(SerperClient::new("fake_key".to_string()).is_ok());
    }

    #[test]
    fn test_parse_search_response() {
        let body = r#"{
            "organic": [
                {"title": "플라스틱 용기 시장", "link": "https://example.com", "snippet": "동향"}
            ],
            "searchParameters": {"q": "ignored"}
        }"#;

        let parsed: SearchResponse = serde_json::from_str(body).unwrap();
        assert_eq!(parsed.organic.len(), 1);
        assert_eq!(parsed.organic[0].title, "플라스틱 용기 시장");
    }

    #[test]
    fn test_parse_response_without_organic() {
        let parsed: SearchResponse = serde_json::from_str("{}").unwrap();
        assert!(parsed.organic.is_empty());
    }

    #[test]
    fn test_render_hits() {
        let hits = vec![SearchHit {
            title: "제목".to_string(),
            link: "https://example.com".to_string(),
            snippet: "요약".to_string(),
        }];

        let block = render_hits(&hits);
        assert!(block.contains("1. 제목"));
        assert!(block.contains("출처: https://example.com"));

        assert!(render_hits(&[]).contains("검색 결과가 없습니다"));
    }
}
