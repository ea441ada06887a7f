//! 이중 경로 품목분류 통합 검색
//!
//! 하나의 질의를 두 개의 독립 검색 경로로 보냅니다:
//!
//! 1. 관세율표 경로 - 품명 퍼지 검색 후 각 후보 코드를 해설서 체계
//!    (부/류/호)로 해석. 점수 = 유사도 × 관세율표 가중치
//! 2. 해설서 직접 경로 - 해설서 항목 텍스트와의 키워드 겹침 검색 후
//!    헤더에서 코드 추출. 점수 = 고정 기본값 × 해설서 가중치
//!    (이 경로는 키워드 동시 출현을 재므로 유사도 가중을 하지 않음)
//!
//! 두 경로의 점수를 HS 코드 단위로 합산해 최종 순위를 만들고,
//! 복수 경로가 기여한 코드에 HIGH 신뢰도를 부여합니다.

use std::collections::{BTreeMap, HashMap, HashSet};

use regex::Regex;
use serde::Serialize;

use crate::knowledge::{ExplanatoryEntry, ManualTable};

use super::keyword::extract_keywords;
use super::tariff::TariffSearcher;

// ============================================================================
// Constants
// ============================================================================

/// 관세율표 경로 기본 가중치
pub const DEFAULT_TARIFF_WEIGHT: f64 = 0.4;
/// 해설서 경로 기본 가중치
pub const DEFAULT_MANUAL_WEIGHT: f64 = 0.6;

/// 관세율표 퍼지 검색 폭
const TARIFF_SEARCH_LIMIT: usize = 15;
/// 해설서 체계까지 해석하는 상위 후보 수
const TARIFF_RESOLVE_LIMIT: usize = 10;
/// 해설서 직접 경로에서 살아남는 항목 수
const MANUAL_MATCH_LIMIT: usize = 10;
/// 최종 후보 수
const MAX_CANDIDATES: usize = 5;
/// 해설서 경로 고정 기본 점수
const MANUAL_PATH_BASE_SCORE: f64 = 0.5;

/// 이 길이(문자)를 넘는 해설 내용은 모델 요약 대상으로 표시됩니다.
/// 요약 호출 자체는 호출자 몫입니다.
pub const SUMMARY_THRESHOLD_CHARS: usize = 1000;

/// 경로 이름
pub const PATH_TARIFF: &str = "tariff";
pub const PATH_MANUAL: &str = "manual";

// ============================================================================
// Types
// ============================================================================

/// 후보 신뢰도: 복수 경로 교차 검증 여부
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum Confidence {
    High,
    Medium,
}

impl Confidence {
    pub fn as_str(&self) -> &'static str {
        match self {
            Confidence::High => "HIGH",
            Confidence::Medium => "MEDIUM",
        }
    }
}

/// 통합 검색 후보 하나
#[derive(Debug, Clone, Serialize)]
pub struct CandidateResult {
    pub hs_code: String,
    pub tariff_name: Option<String>,
    pub manual_content: Option<String>,
    /// 경로 이름 → 해당 경로 기여 점수
    pub path_scores: BTreeMap<&'static str, f64>,
    pub final_score: f64,
    pub confidence: Confidence,
}

impl CandidateResult {
    /// 기여한 경로 이름들
    pub fn sources(&self) -> Vec<&'static str> {
        self.path_scores.keys().copied().collect()
    }

    /// 해설 내용이 모델 요약 대상인지
    pub fn needs_summary(&self) -> bool {
        self.manual_content
            .as_ref()
            .is_some_and(|c| c.chars().count() > SUMMARY_THRESHOLD_CHARS)
    }
}

/// 경로 가중치 설정
///
/// 합이 1 이하이기만 하면 되고 정확히 1일 필요는 없습니다.
#[derive(Debug, Clone)]
pub struct ConsolidatorConfig {
    pub tariff_weight: f64,
    pub manual_weight: f64,
}

impl Default for ConsolidatorConfig {
    fn default() -> Self {
        Self {
            tariff_weight: DEFAULT_TARIFF_WEIGHT,
            manual_weight: DEFAULT_MANUAL_WEIGHT,
        }
    }
}

// ============================================================================
// DualPathConsolidator
// ============================================================================

/// 이중 경로 통합 검색기
pub struct DualPathConsolidator<'a> {
    tariff: &'a TariffSearcher,
    manual: &'a ManualTable,
    config: ConsolidatorConfig,
    heading_re: Regex,
    chapter_re: Regex,
}

impl<'a> DualPathConsolidator<'a> {
    pub fn new(tariff: &'a TariffSearcher, manual: &'a ManualTable) -> Self {
        Self::with_config(tariff, manual, ConsolidatorConfig::default())
    }

    pub fn with_config(
        tariff: &'a TariffSearcher,
        manual: &'a ManualTable,
        config: ConsolidatorConfig,
    ) -> Self {
        Self {
            tariff,
            manual,
            config,
            heading_re: Regex::new(r"^(\d{2})\.(\d{2})$").unwrap(),
            chapter_re: Regex::new(r"^제(\d+)류$").unwrap(),
        }
    }

    /// 질의 하나에 대한 통합 후보 목록 (최대 5건, 점수 내림차순)
    ///
    /// 한쪽 경로가 비어도 남은 경로만으로 순위를 만듭니다.
    /// 빈 질의는 빈 결과입니다.
    pub fn consolidate(&self, query: &str) -> Vec<CandidateResult> {
        let mut fusion = FusionAccumulator::default();

        self.run_tariff_path(query, &mut fusion);
        self.run_manual_path(query, &mut fusion);

        fusion.into_ranked(MAX_CANDIDATES)
    }

    /// 경로 1: 관세율표 퍼지 검색 → 해설서 체계 해석
    fn run_tariff_path(&self, query: &str, fusion: &mut FusionAccumulator) {
        let candidates = self.tariff.search(query, TARIFF_SEARCH_LIMIT);

        for candidate in candidates.iter().take(TARIFF_RESOLVE_LIMIT) {
            // 개별 코드 해석 실패는 전체 통합을 막지 않는다 -
            // 찾은 단계만 이어 붙이고, 전부 비면 내용 없이 진행
            let manual_content = self.manual.lookup(&candidate.row.code).combined_text();

            let score = candidate.similarity * self.config.tariff_weight;
            fusion.add(
                &candidate.row.code,
                PATH_TARIFF,
                score,
                Some(candidate.row.name_ko.clone()),
                manual_content,
            );
        }
    }

    /// 경로 2: 해설서 항목 키워드 겹침 검색 → 헤더에서 코드 추출
    fn run_manual_path(&self, query: &str, fusion: &mut FusionAccumulator) {
        let query_keywords: HashSet<String> = extract_keywords(query).into_iter().collect();
        if query_keywords.is_empty() {
            return;
        }

        // 항목별 겹친 질의 키워드 수
        let mut matched: Vec<(&ExplanatoryEntry, usize)> = Vec::new();
        for entry in self.manual.entries() {
            let haystack = format!(
                "{} {} {}",
                entry.header_primary, entry.header_secondary, entry.text
            );
            let entry_keywords: HashSet<String> =
                extract_keywords(&haystack).into_iter().collect();

            let overlap = query_keywords
                .iter()
                .filter(|k| entry_keywords.contains(*k))
                .count();
            if overlap > 0 {
                matched.push((entry, overlap));
            }
        }

        // 겹침 수 내림차순, 동점은 항목 순서 유지 (stable sort)
        matched.sort_by(|a, b| b.1.cmp(&a.1));
        matched.truncate(MANUAL_MATCH_LIMIT);

        let score = MANUAL_PATH_BASE_SCORE * self.config.manual_weight;
        for (entry, _) in matched {
            let Some(code) = self.code_from_header(&entry.header_secondary) else {
                continue;
            };
            fusion.add(&code, PATH_MANUAL, score, None, Some(entry.text.clone()));
        }
    }

    /// 하위 헤더에서 후보 코드 추출
    ///
    /// "NN.NN" → 4자리 연결, "제N류" → 류 번호를 2자리로 0 패딩한 뒤
    /// "00"을 붙인 4자리 (제5류 → "0500"). 둘 다 아니면 None.
    fn code_from_header(&self, header_secondary: &str) -> Option<String> {
        let header = header_secondary.trim();

        if let Some(caps) = self.heading_re.captures(header) {
            return Some(format!("{}{}", &caps[1], &caps[2]));
        }

        if let Some(caps) = self.chapter_re.captures(header) {
            let chapter: u32 = caps[1].parse().ok()?;
            return Some(format!("{:02}00", chapter));
        }

        None
    }
}

// ============================================================================
// Rank Fusion
// ============================================================================

/// 코드별 점수 누적 슬롯
#[derive(Debug)]
struct FusionSlot {
    /// 최초 등장 순서 (동점 정렬용)
    order: usize,
    path_scores: BTreeMap<&'static str, f64>,
    tariff_name: Option<String>,
    manual_content: Option<String>,
}

/// 가중 합산 순위 통합
///
/// 코드 하나가 두 경로 모두에서 나오면 점수가 합산되고 두 경로가
/// 기여자로 기록됩니다. 이름·해설 내용은 먼저 기록된 값이 이깁니다.
#[derive(Debug, Default)]
struct FusionAccumulator {
    slots: HashMap<String, FusionSlot>,
    next_order: usize,
}

impl FusionAccumulator {
    fn add(
        &mut self,
        hs_code: &str,
        path: &'static str,
        score: f64,
        tariff_name: Option<String>,
        manual_content: Option<String>,
    ) {
        let next_order = &mut self.next_order;
        let slot = self.slots.entry(hs_code.to_string()).or_insert_with(|| {
            let order = *next_order;
            *next_order += 1;
            FusionSlot {
                order,
                path_scores: BTreeMap::new(),
                tariff_name: None,
                manual_content: None,
            }
        });

        *slot.path_scores.entry(path).or_insert(0.0) += score;
        if slot.tariff_name.is_none() {
            slot.tariff_name = tariff_name;
        }
        if slot.manual_content.is_none() {
            slot.manual_content = manual_content;
        }
    }

    fn into_ranked(self, limit: usize) -> Vec<CandidateResult> {
        let mut ranked: Vec<(String, FusionSlot, f64)> = self
            .slots
            .into_iter()
            .map(|(code, slot)| {
                let total: f64 = slot.path_scores.values().sum();
                (code, slot, total)
            })
            .collect();

        ranked.sort_by(|a, b| {
            b.2.partial_cmp(&a.2)
                .unwrap_or(std::cmp::Ordering::Equal)
                .then(a.1.order.cmp(&b.1.order))
        });
        ranked.truncate(limit);

        ranked
            .into_iter()
            .map(|(hs_code, slot, total)| {
                let confidence = if slot.path_scores.len() > 1 {
                    Confidence::High
                } else {
                    Confidence::Medium
                };
                CandidateResult {
                    hs_code,
                    tariff_name: slot.tariff_name,
                    manual_content: slot.manual_content,
                    path_scores: slot.path_scores,
                    final_score: total,
                    confidence,
                }
            })
            .collect()
    }
}

// ============================================================================
// Context Rendering
// ============================================================================

/// 후보 목록을 모델 프롬프트용 컨텍스트 블록으로 직렬화
///
/// 요약이 필요한 해설 내용은 호출자가 `manual_content`를 요약문으로
/// 교체한 뒤 이 함수를 호출합니다.
pub fn render_context(results: &[CandidateResult]) -> String {
    if results.is_empty() {
        return "관련 HS 코드 후보를 찾지 못했습니다.".to_string();
    }

    let mut blocks = Vec::with_capacity(results.len());
    for (i, result) in results.iter().enumerate() {
        let mut lines = vec![format!(
            "후보 {}. HS {} [신뢰도: {}] (점수: {:.4})",
            i + 1,
            result.hs_code,
            result.confidence.as_str(),
            result.final_score
        )];

        if let Some(ref name) = result.tariff_name {
            lines.push(format!("  관세율표 품명: {}", name));
        }
        lines.push(format!("  기여 경로: {}", result.sources().join(", ")));
        if let Some(ref content) = result.manual_content {
            lines.push(format!("  해설서: {}", content));
        }

        blocks.push(lines.join("\n"));
    }

    blocks.join("\n\n")
}

// ============================================================================
// Tests
// ============================================================================
