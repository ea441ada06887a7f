//! 검색 모듈 - 키워드 인덱스, 관세율표 퍼지 검색, 이중 경로 통합
//!
//! - keyword: 분류사례 역색인 + 스코어 검색
//! - tariff: 품명 유사도 검색 (시퀀스 매칭 비율)
//! - hscode: 자유 텍스트 HS 코드 추출
//! - consolidate: 두 검색 경로의 가중 합산 순위 통합

mod consolidate;
mod hscode;
mod keyword;
mod tariff;

// Re-exports
pub use consolidate::{
    render_context, CandidateResult, Confidence, ConsolidatorConfig, DualPathConsolidator,
    DEFAULT_MANUAL_WEIGHT, DEFAULT_TARIFF_WEIGHT, PATH_MANUAL, PATH_TARIFF,
    SUMMARY_THRESHOLD_CHARS,
};
pub use hscode::extract_hs_codes;
pub use keyword::{extract_keywords, KeywordIndex, ScoredRecord, SourceFilter};
pub use tariff::{MatchedName, TariffCandidate, TariffRow, TariffSearcher};
