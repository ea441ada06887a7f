//! 관세율표 퍼지 검색
//!
//! 품목번호·품명(한/영) 테이블에 대해 문자열 유사도 기반 후보 검색을
//! 제공합니다. 유사도는 최장 공통 매칭 블록 정렬 비율
//! `2·M / (len(a)+len(b))`로, 대소문자를 무시하고 문자 단위로 계산합니다.

use std::collections::HashMap;

use serde::{Deserialize, Serialize};

/// 유사도 하한 (경계값 제외 - 정확히 0.1인 후보는 버려짐)
const SIMILARITY_THRESHOLD: f64 = 0.1;

// ============================================================================
// Types
// ============================================================================

/// 관세율표 한 행
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TariffRow {
    /// 품목번호 (4~10자리, 점 구분 가능)
    #[serde(alias = "품목번호")]
    pub code: String,
    /// 한글품명
    #[serde(alias = "한글품명")]
    pub name_ko: String,
    /// 영문품명
    #[serde(alias = "영문품명")]
    pub name_en: String,
}

/// 최고 유사도를 기록한 품명 필드 (진단용)
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MatchedName {
    Korean,
    English,
}

/// 검색 후보 한 건
#[derive(Debug, Clone)]
pub struct TariffCandidate {
    pub row: TariffRow,
    pub similarity: f64,
    pub matched: MatchedName,
}

// ============================================================================
// TariffSearcher
// ============================================================================

/// 관세율표 검색기
///
/// 테이블은 생성 시 한 번 적재되며 이후 불변입니다.
/// 적재에 실패한 경우 빈 테이블로 동작합니다 (검색은 항상 빈 결과).
pub struct TariffSearcher {
    rows: Vec<TariffRow>,
}

impl TariffSearcher {
    pub fn new(rows: Vec<TariffRow>) -> Self {
        Self { rows }
    }

    /// 빈 테이블 (적재 실패 폴백)
    pub fn empty() -> Self {
        Self { rows: Vec::new() }
    }

    pub fn len(&self) -> usize {
        self.rows.len()
    }

    pub fn is_empty(&self) -> bool {
        self.rows.is_empty()
    }

    /// 품명 퍼지 검색
    ///
    /// 한글·영문 품명 각각에 대해 유사도를 계산해 큰 쪽을 후보 점수로
    /// 삼고, 0.1 초과인 후보만 유사도 내림차순으로 `top_n`건 반환합니다.
    pub fn search(&self, query: &str, top_n: usize) -> Vec<TariffCandidate> {
        let query = query.trim();
        if query.is_empty() || self.rows.is_empty() {
            return Vec::new();
        }

        let mut candidates: Vec<TariffCandidate> = self
            .rows
            .iter()
            .filter_map(|row| {
                let sim_ko = similarity_ratio(query, &row.name_ko);
                let sim_en = similarity_ratio(query, &row.name_en);

                let (similarity, matched) = if sim_ko >= sim_en {
                    (sim_ko, MatchedName::Korean)
                } else {
                    (sim_en, MatchedName::English)
                };

                if similarity > SIMILARITY_THRESHOLD {
                    Some(TariffCandidate {
                        row: row.clone(),
                        similarity,
                        matched,
                    })
                } else {
                    None
                }
            })
            .collect();

        candidates.sort_by(|a, b| {
            b.similarity
                .partial_cmp(&a.similarity)
                .unwrap_or(std::cmp::Ordering::Equal)
        });
        candidates.truncate(top_n);
        candidates
    }
}

// ============================================================================
// Sequence-Matcher Ratio
// ============================================================================

/// 정규화 문자열 유사도 (0.0 ~ 1.0)
///
/// 두 문자열의 최장 공통 매칭 블록 분해에서 매칭된 총 문자 수 M에 대해
/// `2·M / (len(a)+len(b))`. 편집 거리가 아니라 시퀀스 정렬 비율입니다.
pub fn similarity_ratio(a: &str, b: &str) -> f64 {
    let a: Vec<char> = a.to_lowercase().chars().collect();
    let b: Vec<char> = b.to_lowercase().chars().collect();

    if a.is_empty() && b.is_empty() {
        return 1.0;
    }
    if a.is_empty() || b.is_empty() {
        return 0.0;
    }

    let matched = total_matched(&a, &b);
    2.0 * matched as f64 / (a.len() + b.len()) as f64
}

/// 매칭 블록 총 길이
///
/// 최장 공통 부분열 블록을 찾아 그 좌우 구간에 대해 재귀적으로
/// 반복합니다 (명시적 스택 사용). 블록 길이의 합이 M이 됩니다.
fn total_matched(a: &[char], b: &[char]) -> usize {
    // b의 문자 → 등장 위치 목록
    let mut b2j: HashMap<char, Vec<usize>> = HashMap::new();
    for (j, &c) in b.iter().enumerate() {
        b2j.entry(c).or_default().push(j);
    }

    let mut total = 0;
    let mut pending = vec![(0, a.len(), 0, b.len())];

    while let Some((alo, ahi, blo, bhi)) = pending.pop() {
        let (i, j, size) = longest_match(a, alo, ahi, &b2j, blo, bhi);
        if size > 0 {
            total += size;
            pending.push((alo, i, blo, j));
            pending.push((i + size, ahi, j + size, bhi));
        }
    }

    total
}

/// `a[alo..ahi]`와 `b[blo..bhi]` 사이 최장 매칭 블록
///
/// 반환: (a 시작, b 시작, 길이). 동일 길이 블록이 여럿이면
/// a에서 먼저 시작하는 블록을 택합니다.
fn longest_match(
    a: &[char],
    alo: usize,
    ahi: usize,
    b2j: &HashMap<char, Vec<usize>>,
    blo: usize,
    bhi: usize,
) -> (usize, usize, usize) {
    let mut best_i = alo;
    let mut best_j = blo;
    let mut best_size = 0;

    // j2len[j] = a[..i]와 b[..j]가 해당 위치에서 끝나는 매칭 런 길이
    let mut j2len: HashMap<usize, usize> = HashMap::new();

    for (i, &c) in a.iter().enumerate().take(ahi).skip(alo) {
        let mut new_j2len: HashMap<usize, usize> = HashMap::new();

        if let Some(positions) = b2j.get(&c) {
            for &j in positions {
                if j < blo {
                    continue;
                }
                if j >= bhi {
                    break;
                }

                let run = j
                    .checked_sub(1)
                    .and_then(|prev| j2len.get(&prev).copied())
                    .unwrap_or(0)
                    + 1;
                new_j2len.insert(j, run);

                if run > best_size {
                    best_i = i + 1 - run;
                    best_j = j + 1 - run;
                    best_size = run;
                }
            }
        }

        j2len = new_j2len;
    }

    (best_i, best_j, best_size)
}

// ============================================================================
// Tests
// ============================================================================

#[cfg(test)]
mod tests {
    use super::*;

    fn sample_rows() -> Vec<TariffRow> {
        vec![
            TariffRow {
                code: "392310".to_string(),
                name_ko: "플라스틱 용기".to_string(),
                name_en: "plastic container".to_string(),
            },
            TariffRow {
                code: "701090".to_string(),
                name_ko: "유리 용기".to_string(),
                name_en: "glass container".to_string(),
            },
            TariffRow {
                code: "870120".to_string(),
                name_ko: "도로주행식 트랙터".to_string(),
                name_en: "road tractor".to_string(),
            },
        ]
    }

    #[test]
    fn test_exact_match_is_one() {
        assert_eq!(similarity_ratio("플라스틱 용기", "플라스틱 용기"), 1.0);
        // 대소문자 무시
        assert_eq!(similarity_ratio("Plastic", "plastic"), 1.0);
    }

    #[test]
    fn test_ratio_formula() {
        // "abcd" vs "bcde": 매칭 블록 "bcd" (M=3), 2*3/(4+4) = 0.75
        let ratio = similarity_ratio("abcd", "bcde");
        assert!((ratio - 0.75).abs() < 1e-9);
    }

    #[test]
    fn test_ratio_disjoint_is_zero() {
        assert_eq!(similarity_ratio("abc", "xyz"), 0.0);
    }

    #[test]
    fn test_ratio_empty_inputs() {
        assert_eq!(similarity_ratio("", ""), 1.0);
        assert_eq!(similarity_ratio("abc", ""), 0.0);
    }

    #[test]
    fn test_search_ranks_best_first() {
        let searcher = TariffSearcher::new(sample_rows());
        let results = searcher.search("플라스틱 용기", 10);

        assert!(!results.is_empty());
        assert_eq!(results[0].row.code, "392310");
        assert_eq!(results[0].similarity, 1.0);
        assert_eq!(results[0].matched, MatchedName::Korean);

        // 내림차순 정렬 확인
        for pair in results.windows(2) {
            assert!(pair[0].similarity >= pair[1].similarity);
        }
    }

    #[test]
    fn test_search_matches_english_name() {
        let searcher = TariffSearcher::new(sample_rows());
        let results = searcher.search("plastic container", 10);

        assert_eq!(results[0].row.code, "392310");
        assert_eq!(results[0].matched, MatchedName::English);
    }

    #[test]
    fn test_threshold_is_exclusive() {
        // 질의 1자 + 품명 19자, 매칭 1자 → 2*1/20 = 정확히 0.1 → 제외
        let rows = vec![TariffRow {
            code: "000000".to_string(),
            name_ko: "x123456789012345678".to_string(),
            name_en: "zzz".to_string(),
        }];
        let searcher = TariffSearcher::new(rows);
        let results = searcher.search("x", 10);
        assert!(results.is_empty());
    }

    #[test]
    fn test_search_never_returns_below_threshold() {
        let searcher = TariffSearcher::new(sample_rows());
        for result in searcher.search("용기", 10) {
            assert!(result.similarity > SIMILARITY_THRESHOLD);
        }
    }

    #[test]
    fn test_search_empty_query() {
        let searcher = TariffSearcher::new(sample_rows());
        assert!(searcher.search("", 10).is_empty());
        assert!(searcher.search("   ", 10).is_empty());
    }

    #[test]
    fn test_empty_table_never_fails() {
        let searcher = TariffSearcher::empty();
        assert!(searcher.search("플라스틱", 10).is_empty());
    }

    #[test]
    fn test_top_n_limit() {
        let searcher = TariffSearcher::new(sample_rows());
        let results = searcher.search("용기", 1);
        assert_eq!(results.len(), 1);
    }
}
