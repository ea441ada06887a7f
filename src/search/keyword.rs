//! 키워드 인덱스 - 분류사례 역색인 및 스코어 검색
//!
//! 레코드 집합에서 키워드를 추출해 역색인을 구축하고,
//! 질의 키워드와 겹치는 레코드를 겹침 횟수 기준으로 정렬해 반환합니다.
//! 인덱스는 프로세스 시작 시 한 번 구축되며 이후 읽기 전용입니다.

use std::collections::{BTreeMap, HashMap, HashSet};
use std::sync::Arc;

use crate::knowledge::CaseRecord;

/// 키워드 최소 길이 (문자 수)
const MIN_KEYWORD_CHARS: usize = 2;

// ============================================================================
// Keyword Extraction
// ============================================================================

/// 텍스트에서 검색 키워드 추출
///
/// 소문자화 → 문자·숫자 외 문자를 공백으로 치환 → 공백 분할 →
/// 2자 미만 제거 → 최초 등장 순서를 유지한 중복 제거.
/// 한글 음절은 유니코드 문자·숫자 판정에 포함되므로 그대로 살아남고,
/// 직렬화 레코드의 구두점은 토큰 경계가 됩니다.
pub fn extract_keywords(text: &str) -> Vec<String> {
    let cleaned: String = text
        .to_lowercase()
        .chars()
        .map(|c| if c.is_alphanumeric() { c } else { ' ' })
        .collect();

    let mut seen = HashSet::new();
    let mut keywords = Vec::new();

    for token in cleaned.split_whitespace() {
        if token.chars().count() < MIN_KEYWORD_CHARS {
            continue;
        }
        if seen.insert(token.to_string()) {
            keywords.push(token.to_string());
        }
    }

    keywords
}

// ============================================================================
// Types
// ============================================================================

/// 역색인에 매달린 레코드 참조
#[derive(Debug, Clone)]
struct IndexedRecord {
    /// 소스 내 레코드 위치 (파티션 범위 제한에 사용)
    index: usize,
    record: Arc<CaseRecord>,
}

/// 스코어 검색 결과 한 건
#[derive(Debug, Clone)]
pub struct ScoredRecord {
    pub record: Arc<CaseRecord>,
    /// 질의와 겹친 키워드 수
    pub count: usize,
}

/// 검색 범위 제한
///
/// 소스 이름 집합과, 소스별 선택적 레코드 구간 `[start, end)`을 지정합니다.
/// 구간이 없는 소스는 전체 레코드가 대상입니다.
#[derive(Debug, Clone, Default)]
pub struct SourceFilter {
    allowed: HashMap<String, Option<(usize, usize)>>,
}

impl SourceFilter {
    pub fn new() -> Self {
        Self::default()
    }

    /// 소스 허용 (전체 구간)
    pub fn allow(mut self, source: &str) -> Self {
        self.allowed.insert(source.to_string(), None);
        self
    }

    /// 소스 허용 (레코드 구간 `[start, end)` 제한)
    pub fn allow_range(mut self, source: &str, start: usize, end: usize) -> Self {
        self.allowed.insert(source.to_string(), Some((start, end)));
        self
    }

    fn permits(&self, source: &str, index: usize) -> bool {
        match self.allowed.get(source) {
            Some(Some((start, end))) => index >= *start && index < *end,
            Some(None) => true,
            None => false,
        }
    }
}

// ============================================================================
// KeywordIndex
// ============================================================================

/// 키워드 역색인
///
/// 키워드 → (소스, 레코드) 목록. 구축 후 불변이며,
/// 버킷은 레코드 삽입 순서를 유지합니다.
pub struct KeywordIndex {
    buckets: HashMap<String, Vec<IndexedRecord>>,
    record_count: usize,
}

impl KeywordIndex {
    /// 이름 붙은 레코드 집합들로부터 인덱스 구축
    ///
    /// 레코드마다 직렬화 텍스트에서 키워드를 추출하고, 각 키워드의
    /// 버킷에 (소스, 레코드)를 추가합니다. 레코드당 키워드는 중복
    /// 제거되므로 한 레코드는 버킷마다 최대 한 번 등장합니다.
    pub fn build(record_sets: &BTreeMap<String, Vec<Arc<CaseRecord>>>) -> Self {
        let mut buckets: HashMap<String, Vec<IndexedRecord>> = HashMap::new();
        let mut record_count = 0;

        for records in record_sets.values() {
            for (index, record) in records.iter().enumerate() {
                record_count += 1;
                for keyword in extract_keywords(&record.serialized) {
                    buckets.entry(keyword).or_default().push(IndexedRecord {
                        index,
                        record: Arc::clone(record),
                    });
                }
            }
        }

        tracing::debug!(
            "키워드 인덱스 구축 완료: {} 레코드, {} 키워드",
            record_count,
            buckets.len()
        );

        Self {
            buckets,
            record_count,
        }
    }

    /// 인덱싱된 전체 레코드 수
    pub fn record_count(&self) -> usize {
        self.record_count
    }

    /// 고유 키워드 수
    pub fn keyword_count(&self) -> usize {
        self.buckets.len()
    }

    /// 스코어 검색
    ///
    /// 질의에서 추출한 키워드마다 해당 버킷의 레코드에 1점씩 가산해,
    /// 총점 내림차순으로 반환합니다. 동점은 처음 집계된 순서를
    /// 유지합니다. 빈 질의나 겹침 없음은 빈 결과이며 오류가 아닙니다.
    pub fn score(&self, query: &str, restrict: Option<&SourceFilter>) -> Vec<ScoredRecord> {
        let keywords = extract_keywords(query);
        if keywords.is_empty() {
            return Vec::new();
        }

        // (소스, 직렬화 키) → (겹침 수, 최초 등장 순서, 레코드)
        let mut tally: HashMap<(&str, &str), (usize, usize, &Arc<CaseRecord>)> = HashMap::new();
        let mut next_order = 0usize;

        for keyword in &keywords {
            let Some(bucket) = self.buckets.get(keyword) else {
                continue;
            };

            for entry in bucket {
                if let Some(filter) = restrict {
                    if !filter.permits(&entry.record.source, entry.index) {
                        continue;
                    }
                }

                let key = (entry.record.source.as_str(), entry.record.serialized.as_str());
                match tally.get_mut(&key) {
                    Some(slot) => slot.0 += 1,
                    None => {
                        tally.insert(key, (1, next_order, &entry.record));
                        next_order += 1;
                    }
                }
            }
        }

        let mut results: Vec<(usize, usize, &Arc<CaseRecord>)> =
            tally.into_values().collect();
        results.sort_by(|a, b| b.0.cmp(&a.0).then(a.1.cmp(&b.1)));

        results
            .into_iter()
            .map(|(count, _, record)| ScoredRecord {
                record: Arc::clone(record),
                count,
            })
            .collect()
    }
}

// ============================================================================
// Tests
// ============================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn record(source: &str, value: serde_json::Value) -> Arc<CaseRecord> {
        Arc::new(CaseRecord::new(source, value))
    }

    fn build_index() -> KeywordIndex {
        let mut sets = BTreeMap::new();
        sets.insert(
            "case_a".to_string(),
            vec![
                record("case_a", json!({"품명": "플라스틱 용기", "결정": "3923"})),
                record("case_a", json!({"품명": "유리 용기", "결정": "7010"})),
            ],
        );
        sets.insert(
            "case_b".to_string(),
            vec![record("case_b", json!({"품명": "플라스틱 필름", "결정": "3920"}))],
        );
        KeywordIndex::build(&sets)
    }

    #[test]
    fn test_extract_keywords_basic() {
        let keywords = extract_keywords("플라스틱 용기, 포장용!");
        assert_eq!(keywords, vec!["플라스틱", "용기", "포장용"]);
    }

    #[test]
    fn test_extract_keywords_short_tokens_dropped() {
        // 1자 토큰은 버려짐
        let keywords = extract_keywords("a 큰 용기 b");
        assert_eq!(keywords, vec!["용기"]);
    }

    #[test]
    fn test_extract_keywords_dedup_preserves_order() {
        let keywords = extract_keywords("용기 플라스틱 용기");
        assert_eq!(keywords, vec!["용기", "플라스틱"]);
    }

    #[test]
    fn test_extract_keywords_empty() {
        assert!(extract_keywords("").is_empty());
        assert!(extract_keywords("  !@# ").is_empty());
    }

    #[test]
    fn test_score_ranks_by_overlap() {
        let index = build_index();
        let results = index.score("플라스틱 용기", None);

        // "플라스틱 용기" 레코드는 2개 키워드 겹침, 나머지는 1개
        assert_eq!(results[0].count, 2);
        assert!(results[0].record.serialized.contains("3923"));
        assert!(results.iter().skip(1).all(|r| r.count == 1));
    }

    #[test]
    fn test_keyword_symmetry() {
        // 대소문자·구두점이 달라도 키워드 집합이 같으면 결과도 같음
        let index = build_index();
        let a = index.score("플라스틱, 용기!", None);
        let b = index.score("플라스틱 용기", None);

        assert_eq!(a.len(), b.len());
        for (x, y) in a.iter().zip(b.iter()) {
            assert_eq!(x.record.serialized, y.record.serialized);
            assert_eq!(x.count, y.count);
        }
    }

    #[test]
    fn test_score_empty_query() {
        let index = build_index();
        assert!(index.score("", None).is_empty());
    }

    #[test]
    fn test_score_no_overlap() {
        let index = build_index();
        assert!(index.score("자동차 엔진", None).is_empty());
    }

    #[test]
    fn test_score_with_source_filter() {
        let index = build_index();
        let filter = SourceFilter::new().allow("case_b");
        let results = index.score("플라스틱", Some(&filter));

        assert_eq!(results.len(), 1);
        assert_eq!(results[0].record.source, "case_b");
    }

    #[test]
    fn test_score_with_range_filter() {
        let index = build_index();

        // case_a의 두 번째 레코드만 허용
        let filter = SourceFilter::new().allow_range("case_a", 1, 2);
        let results = index.score("용기", Some(&filter));

        assert_eq!(results.len(), 1);
        assert!(results[0].record.serialized.contains("7010"));
    }
}
