//! HS 해설서 테이블 - 부/류/호 체계 조회
//!
//! 해설서 항목은 (상위 헤더, 하위 헤더) 쌍으로 적재 시 한 번 그룹핑되며,
//! 같은 쌍의 본문은 등장 순서대로 이어 붙습니다. 조회는 류("제N류"),
//! 호("NN.NN"), 부("제N부") 세 단계를 해석하고, 찾지 못한 단계는
//! `None`으로 반환합니다. 조회는 어떤 입력에도 실패하지 않습니다.

use std::collections::HashMap;

use regex::Regex;
use serde::{Deserialize, Serialize};

// ============================================================================
// Types
// ============================================================================

/// 해설서 원본 행 (그룹핑 전, JSON 적재용)
#[derive(Debug, Clone, Deserialize)]
pub struct RawManualRow {
    /// 부 단위 헤더, 예) "제12부"
    #[serde(alias = "header1")]
    pub header_primary: String,
    /// 류("제12류") 또는 호("12.34") 헤더
    #[serde(alias = "header2")]
    pub header_secondary: String,
    pub text: String,
    #[serde(default)]
    pub page: Option<u32>,
}

/// 그룹핑된 해설서 항목
#[derive(Debug, Clone, Serialize)]
pub struct ExplanatoryEntry {
    pub header_primary: String,
    pub header_secondary: String,
    /// 같은 헤더 쌍의 본문을 등장 순서대로 이어 붙인 텍스트
    pub text: String,
    /// 출처 페이지 번호 (등장 순서 유지)
    pub pages: Vec<u32>,
}

/// 부/류/호 조회 결과
///
/// 찾지 못한 단계는 `None`. "찾을 수 없음" 문구는 표시 계층에서만
/// 만들어지며 검색 컨텍스트로는 새어 나가지 않습니다.
#[derive(Debug, Clone, Copy)]
pub struct ManualLookupResult<'a> {
    pub section: Option<&'a ExplanatoryEntry>,
    pub chapter: Option<&'a ExplanatoryEntry>,
    pub heading: Option<&'a ExplanatoryEntry>,
}

impl ManualLookupResult<'_> {
    /// 세 단계 모두 비었는지
    pub fn is_empty(&self) -> bool {
        self.section.is_none() && self.chapter.is_none() && self.heading.is_none()
    }

    /// 찾은 단계의 본문만 이어 붙인 텍스트 (모두 비면 `None`)
    pub fn combined_text(&self) -> Option<String> {
        let mut parts = Vec::new();
        for entry in [self.section, self.chapter, self.heading].into_iter().flatten() {
            parts.push(format!("[{}] {}", entry.header_secondary, entry.text));
        }
        if parts.is_empty() {
            None
        } else {
            Some(parts.join("\n\n"))
        }
    }
}

// ============================================================================
// ManualTable
// ============================================================================

/// 해설서 테이블
pub struct ManualTable {
    entries: Vec<ExplanatoryEntry>,
    section_re: Regex,
}

impl ManualTable {
    /// 원본 행들로부터 테이블 구축
    ///
    /// (header_primary, header_secondary) 쌍마다 항목 하나.
    /// 본문은 줄바꿈으로 이어 붙이고 페이지 번호를 수집합니다.
    pub fn from_rows(rows: Vec<RawManualRow>) -> Self {
        let mut order: HashMap<(String, String), usize> = HashMap::new();
        let mut entries: Vec<ExplanatoryEntry> = Vec::new();

        for row in rows {
            let key = (row.header_primary.clone(), row.header_secondary.clone());
            match order.get(&key) {
                Some(&idx) => {
                    let entry = &mut entries[idx];
                    if !entry.text.is_empty() && !row.text.is_empty() {
                        entry.text.push('\n');
                    }
                    entry.text.push_str(&row.text);
                    if let Some(page) = row.page {
                        entry.pages.push(page);
                    }
                }
                None => {
                    order.insert(key, entries.len());
                    entries.push(ExplanatoryEntry {
                        header_primary: row.header_primary,
                        header_secondary: row.header_secondary,
                        text: row.text,
                        pages: row.page.into_iter().collect(),
                    });
                }
            }
        }

        Self {
            entries,
            section_re: Regex::new(r"제\s*(\d+)\s*부").unwrap(),
        }
    }

    /// 빈 테이블 (적재 실패 폴백)
    pub fn empty() -> Self {
        Self::from_rows(Vec::new())
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// 그룹핑된 전체 항목 (삽입 순서)
    pub fn entries(&self) -> &[ExplanatoryEntry] {
        &self.entries
    }

    /// HS 코드의 부/류/호 체계 조회
    ///
    /// - 류 키: 앞 2자리를 "제{N}류"로 (선행 0 제거, 05 → "제5류")
    /// - 호 키: 앞 4자리를 "NN.NN"으로 (0 패딩 유지, 040510 → "04.05")
    /// - 부 키: 찾은 류 항목의 header_primary를 "제 N 부" → "제N부"로
    ///   정규화한 뒤 같은 값으로 정규화되는 첫 항목
    ///
    /// 자릿수 정책: 2자리 이상이면 류까지, 4자리 이상이면 호까지 해석.
    /// 4자리를 넘는 코드는 앞 4자리로 절단합니다. 해석 불가능한 단계는
    /// `None`이며 오류를 내지 않습니다.
    pub fn lookup(&self, hs_code: &str) -> ManualLookupResult<'_> {
        let digits: String = hs_code.chars().filter(|c| c.is_ascii_digit()).collect();

        let chapter = if digits.len() >= 2 {
            digits[..2]
                .parse::<u32>()
                .ok()
                .and_then(|n| self.find_by_secondary(&format!("제{}류", n)))
        } else {
            None
        };

        let heading = if digits.len() >= 4 {
            let key = format!("{}.{}", &digits[..2], &digits[2..4]);
            self.find_by_secondary(&key)
        } else {
            None
        };

        let section = chapter.and_then(|ch| {
            let target = self.normalize_section_header(&ch.header_primary);
            self.entries
                .iter()
                .find(|e| self.normalize_section_header(&e.header_primary) == target)
        });

        ManualLookupResult {
            section,
            chapter,
            heading,
        }
    }

    fn find_by_secondary(&self, key: &str) -> Option<&ExplanatoryEntry> {
        self.entries.iter().find(|e| e.header_secondary == key)
    }

    /// "제 12 부" 류의 가변 공백을 "제12부"로 정규화
    fn normalize_section_header(&self, header: &str) -> String {
        self.section_re.replace_all(header.trim(), "제$1부").to_string()
    }
}

// ============================================================================
// Tests
// ============================================================================

#[cfg(test)]
mod tests {
    use super::*;

    fn row(h1: &str, h2: &str, text: &str, page: Option<u32>) -> RawManualRow {
        RawManualRow {
            header_primary: h1.to_string(),
            header_secondary: h2.to_string(),
            text: text.to_string(),
            page,
        }
    }

    fn sample_table() -> ManualTable {
        ManualTable::from_rows(vec![
            // 부 항목은 공백이 섞인 헤더로 적재됨
            row("제 7 부", "플라스틱과 고무", "제7부 총설", Some(1)),
            row("제7부", "제39류", "플라스틱과 그 제품", Some(10)),
            row("제7부", "제39류", "추가 해설", Some(11)),
            row("제7부", "39.23", "플라스틱 포장용기", Some(20)),
            row("제16부", "제85류", "전기기기", Some(100)),
            row("제1부", "제4류", "낙농품", Some(5)),
            row("제1부", "04.05", "버터와 유지", Some(6)),
        ])
    }

    #[test]
    fn test_grouping_concatenates_text() {
        let table = sample_table();
        let entry = table
            .entries()
            .iter()
            .find(|e| e.header_secondary == "제39류")
            .unwrap();

        assert_eq!(entry.text, "플라스틱과 그 제품\n추가 해설");
        assert_eq!(entry.pages, vec![10, 11]);
    }

    #[test]
    fn test_chapter_key_strips_leading_zero() {
        let table = sample_table();

        // 04 → "제4류" ("제04류" 아님)
        let result = table.lookup("040510");
        assert_eq!(result.chapter.unwrap().header_secondary, "제4류");

        // 85 → "제85류" ("제8류" 아님)
        let result = table.lookup("850440");
        assert_eq!(result.chapter.unwrap().header_secondary, "제85류");
    }

    #[test]
    fn test_heading_key_keeps_zero_padding() {
        let table = sample_table();
        let result = table.lookup("040510");
        assert_eq!(result.heading.unwrap().header_secondary, "04.05");
    }

    #[test]
    fn test_long_code_truncated_to_heading() {
        let table = sample_table();
        let result = table.lookup("3923101234");
        assert_eq!(result.heading.unwrap().header_secondary, "39.23");
    }

    #[test]
    fn test_section_matched_via_normalized_header() {
        let table = sample_table();
        let result = table.lookup("392310");

        // 류 항목의 "제7부"가 공백 섞인 "제 7 부" 항목과 연결됨
        let section = result.section.unwrap();
        assert_eq!(section.text, "제7부 총설");
    }

    #[test]
    fn test_section_skipped_without_chapter() {
        let table = sample_table();
        // 류 항목이 없는 코드는 부도 조회하지 않음
        let result = table.lookup("990000");
        assert!(result.section.is_none());
        assert!(result.chapter.is_none());
    }

    #[test]
    fn test_short_code_policy() {
        let table = sample_table();

        // 2~3자리: 류까지만 해석
        let result = table.lookup("39");
        assert!(result.chapter.is_some());
        assert!(result.heading.is_none());

        // 1자리 이하: 아무것도 해석하지 않음
        let result = table.lookup("3");
        assert!(result.is_empty());
    }

    #[test]
    fn test_empty_and_malformed_input() {
        let table = sample_table();
        assert!(table.lookup("").is_empty());
        assert!(table.lookup("abc").is_empty());
    }

    #[test]
    fn test_combined_text_skips_missing_levels() {
        let table = sample_table();

        // 류는 있으나 호가 없는 코드
        let result = table.lookup("8504");
        let text = result.combined_text().unwrap();
        assert!(text.contains("전기기기"));
        assert!(!text.contains("찾을 수 없"));

        // 아무 단계도 없으면 None
        assert!(table.lookup("990000").combined_text().is_none());
    }
}
