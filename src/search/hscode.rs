//! HS 코드 추출
//!
//! 자유 텍스트에서 HS 코드 후보를 뽑아내는 단일 추출 함수.
//! 패턴: 선택적 "HS" 접두사 + 점/대시 구분 가능한 4~10자리 숫자.
//! 숫자 외 문자는 제거하고, 최초 등장 순서를 유지해 중복을 제거하며,
//! 정제 후 4자리 미만(부분 입력)이거나 10자리를 넘는 결과는 버립니다.

use std::collections::HashSet;

use regex::Regex;

/// 텍스트에서 HS 코드 후보 추출
///
/// ```
/// use hscode_rag::search::extract_hs_codes;
///
/// let codes = extract_hs_codes("HS 8517.12 또는 392310을 검토");
/// assert_eq!(codes, vec!["851712", "392310"]);
/// ```
pub fn extract_hs_codes(text: &str) -> Vec<String> {
    // 숫자로 시작·종료하고 내부에 점/대시를 허용하는 4문자 이상 런
    let pattern = Regex::new(r"(?i)(?:HS\s*)?\d[\d.\-]{2,}\d").unwrap();

    let mut seen = HashSet::new();
    let mut codes = Vec::new();

    for found in pattern.find_iter(text) {
        let digits: String = found
            .as_str()
            .chars()
            .filter(|c| c.is_ascii_digit())
            .collect();

        if digits.len() < 4 || digits.len() > 10 {
            continue;
        }
        if seen.insert(digits.clone()) {
            codes.push(digits);
        }
    }

    codes
}

// ============================================================================
// Tests
// ============================================================================

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_plain_code() {
        assert_eq!(extract_hs_codes("392310"), vec!["392310"]);
    }

    #[test]
    fn test_hs_prefix_and_segments() {
        assert_eq!(extract_hs_codes("HS 8517.12.00"), vec!["85171200"]);
        assert_eq!(extract_hs_codes("hs8517-12"), vec!["851712"]);
    }

    #[test]
    fn test_dedup_preserves_first_seen_order() {
        let codes = extract_hs_codes("8517.12와 3923, 그리고 851712");
        assert_eq!(codes, vec!["851712", "3923"]);
    }

    #[test]
    fn test_short_fragments_discarded() {
        // 2~3자리 부분 입력은 코드로 취급하지 않음
        assert!(extract_hs_codes("제85류 중 85 또는 851").is_empty());
    }

    #[test]
    fn test_overlong_runs_discarded() {
        assert!(extract_hs_codes("123456789012345").is_empty());
    }

    #[test]
    fn test_embedded_in_korean_text() {
        let codes = extract_hs_codes("플라스틱 용기는 3923.10호에 분류됩니다");
        assert_eq!(codes, vec!["392310"]);
    }

    #[test]
    fn test_empty_input() {
        assert!(extract_hs_codes("").is_empty());
        assert!(extract_hs_codes("숫자 없는 문장").is_empty());
    }
}
