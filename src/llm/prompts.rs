//! 프롬프트 템플릿
//!
//! 질문 라우팅, 파티션 에이전트, 헤드 통합, 해설 요약, 최종 분류 답변에
//! 쓰이는 프롬프트 빌더. 모든 프롬프트는 한국어로 작성됩니다.

// ============================================================================
// Question Routing
// ============================================================================

/// 질문 유형
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum QuestionType {
    /// 물품개요·용도·무역동향 등 일반 정보 탐색
    WebSearch,
    /// HS 코드·품목분류·세율 등 분류사례 검색
    HsClassification,
    /// 해설서·규정 심층 분석
    HsManual,
}

impl QuestionType {
    pub fn as_str(&self) -> &'static str {
        match self {
            QuestionType::WebSearch => "web_search",
            QuestionType::HsClassification => "hs_classification",
            QuestionType::HsManual => "hs_manual",
        }
    }
}

/// 질문 유형 분류 프롬프트
pub fn classify_question(question: &str) -> String {
    format!(
        r#"당신은 HS 품목분류 전문가입니다. 사용자의 질문을 아래 세 가지 유형 중 하나로 분류해주세요.

질문: "{question}"

질문 유형:
1. web_search: 물품개요, 용도, 뉴스, 무역동향, 산업동향 등 일반 정보 탐색이 필요한 경우
2. hs_classification: HS 코드, 품목분류, 관세, 세율 등 분류사례 검색이 필요한 경우
3. hs_manual: HS 해설서, 규정, 판례 등 심층 분석이 필요한 경우

반드시 다음 형식으로만 답변해주세요:
"유형: [web_search|hs_classification|hs_manual]"
"#
    )
}

/// 분류 응답에서 질문 유형 추출
///
/// 해석할 수 없으면 기본값인 분류사례 검색으로 폴백합니다.
pub fn parse_question_type(response: &str) -> QuestionType {
    let lowered = response.to_lowercase();
    if lowered.contains("web_search") {
        QuestionType::WebSearch
    } else if lowered.contains("hs_manual") {
        QuestionType::HsManual
    } else {
        QuestionType::HsClassification
    }
}

// ============================================================================
// Partition Agent / Head Merge
// ============================================================================

/// 파티션 에이전트 프롬프트
///
/// 그룹 하나의 검색 컨텍스트만으로 독립 답변을 생성합니다.
pub fn partition_agent(group_name: &str, question: &str, history: &str, context: &str) -> String {
    let context = if context.is_empty() {
        "(이 그룹에는 관련 분류사례가 없습니다)"
    } else {
        context
    };

    format!(
        r#"당신은 관세청에서 오랜 경력을 가진 HS 품목분류 전문가입니다.

아래는 분류사례 그룹 [{group_name}]에서 검색된 질문 관련 사례입니다. 반드시 다음 사례를 기반으로 답변해주세요:
{context}

이전 대화:
{history}

질문: {question}

# 응답 지침
1. 제공된 분류사례에 기반하여 정확하게 답변해주세요.
2. 답변에 사용한 사례의 HS 코드와 결정 근거를 명확히 인용해주세요.
3. 사례에 없는 내용은 추측하지 말고, 알 수 없다고 정직하게 답변해주세요.
"#
    )
}

/// 헤드 통합 프롬프트
///
/// 그룹별 부분 답변을 그룹 번호 순서로 엮어 최종 답변을 만듭니다.
/// 그룹 번호는 추적 가능성을 위한 것이므로 순서가 보존되어야 합니다.
pub fn head_merge(question: &str, history: &str, group_answers: &[(String, String)]) -> String {
    let combined = group_answers
        .iter()
        .map(|(name, answer)| format!("=== 그룹 [{}] 답변 ===\n{}", name, answer))
        .collect::<Vec<_>>()
        .join("\n\n");

    format!(
        r#"당신은 HS 품목분류 분야 전문성을 갖춘 전문가이자 여러 자료를 통합하여 종합적인 답변을 제공하는 전문가입니다.

{combined}

이전 대화:
{history}

질문: {question}

# 응답 지침
1. 여러 그룹으로부터 받은 답변을 분석하고 통합하여 사용자의 질문에 가장 적합한 최종 답변을 제공합니다.
2. 제공된 분류사례 정보에 기반하여 정확하게 답변해주세요.
3. 답변에 사용한 모든 사례 출처(그룹, HS 코드)를 명확히 인용해주세요.
4. 사례에 명시되지 않은 내용은 추측하지 말고, 알 수 없다고 정직하게 답변해주세요.
5. 모든 답변은 두괄식으로 작성합니다.
"#
    )
}

// ============================================================================
// Manual Analysis
// ============================================================================

/// 해설서 내용 요약 프롬프트
pub fn summarize_manual(hs_code: &str, content: &str) -> String {
    format!(
        r#"다음은 HS {hs_code} 관련 해설서 내용입니다. 품목분류 판단에 필요한 핵심만 5문장 이내로 요약해주세요.

{content}

요약문만 출력하고 다른 설명은 하지 마세요.
"#
    )
}

/// 통합 검색 결과 기반 최종 분류 답변 프롬프트
pub fn classification_answer(question: &str, history: &str, context: &str) -> String {
    format!(
        r#"당신은 관세청에서 오랜 경력을 가진 HS 품목분류 전문가입니다.

아래는 관세율표 검색과 해설서 검색을 통합한 HS 코드 후보입니다:
{context}

이전 대화:
{history}

질문: {question}

# 응답 지침
1. 후보 목록과 신뢰도를 근거로 가장 적합한 HS 코드를 제시해주세요.
2. 품목의 성분, 용도, 가공상태 등을 고려하여 상세히 설명해주세요.
3. 관련어, 유사품목, 대체품목도 함께 고려해주세요.
4. 답변은 간결하면서도 전문적으로 제공해주세요.
"#
    )
}

// ============================================================================
// Tests
// ============================================================================

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_question_type() {
        assert_eq!(parse_question_type("유형: web_search"), QuestionType::WebSearch);
        assert_eq!(parse_question_type("유형: HS_MANUAL"), QuestionType::HsManual);
        assert_eq!(
            parse_question_type("유형: hs_classification"),
            QuestionType::HsClassification
        );
    }

    #[test]
    fn test_parse_question_type_defaults_to_classification() {
        assert_eq!(parse_question_type("모르겠음"), QuestionType::HsClassification);
        assert_eq!(parse_question_type(""), QuestionType::HsClassification);
    }

    #[test]
    fn test_partition_agent_handles_empty_context() {
        let prompt = partition_agent("domestic-1", "질문", "", "");
        assert!(prompt.contains("관련 분류사례가 없습니다"));
        assert!(prompt.contains("[domestic-1]"));
    }

    #[test]
    fn test_head_merge_preserves_group_order() {
        let answers = vec![
            ("domestic-1".to_string(), "답변1".to_string()),
            ("domestic-2".to_string(), "답변2".to_string()),
        ];
        let prompt = head_merge("질문", "", &answers);

        let first = prompt.find("그룹 [domestic-1]").unwrap();
        let second = prompt.find("그룹 [domestic-2]").unwrap();
        assert!(first < second);
    }
}
