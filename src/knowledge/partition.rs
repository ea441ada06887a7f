//! 분류사례 파티션 인덱스
//!
//! 사례 컬렉션을 설계 시점에 고정된 그룹으로 나누어, 그룹별로 독립
//! 질의가 가능하게 합니다. 파티션 경계는 분기 로직이 아니라 선언적
//! 테이블(소스 목록 + 선택적 레코드 구간)로 기술되며, 같은 데이터에
//! 대해 실행 간 재현 가능합니다.
//!
//! - 국내: 사례 분할 파일 10개 + 위원회·협의회 결정을 5개 그룹으로
//! - 해외: 미국 데이터를 연속 3등분, EU 데이터를 연속 2등분

use anyhow::{bail, Result};

use crate::search::{KeywordIndex, SourceFilter};

use super::loader::{
    case_part_source, KnowledgeBase, SOURCE_COMMITTEE, SOURCE_COUNCIL, SOURCE_EU, SOURCE_US,
};

/// 그룹당 기본 검색 결과 수
pub const DEFAULT_GROUP_RESULTS: usize = 5;

// ============================================================================
// Partition Scheme
// ============================================================================

/// 파티션 구성원: 소스 하나와 선택적 레코드 구간 `[start, end)`
#[derive(Debug, Clone)]
pub struct PartitionMember {
    pub source: String,
    pub range: Option<(usize, usize)>,
}

/// 파티션 그룹 하나
#[derive(Debug, Clone)]
pub struct PartitionSpec {
    pub name: String,
    /// 컨텍스트에 표기되는 관할 레이블
    pub label: String,
    pub members: Vec<PartitionMember>,
}

/// 질의 대상 컬렉션
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CaseScope {
    /// 국내 분류사례 (관세청 사례 + 위원회·협의회 결정)
    Domestic,
    /// 해외 분류사례 (미국, EU)
    Overseas,
}

/// 국내 파티션 테이블: 12개 소스를 5개 그룹으로
fn domestic_partitions() -> Vec<PartitionSpec> {
    let committee = SOURCE_COMMITTEE.to_string();
    let council = SOURCE_COUNCIL.to_string();

    let table: [(&str, Vec<String>); 5] = [
        ("domestic-1", vec![case_part_source(0), case_part_source(1), committee]),
        ("domestic-2", vec![case_part_source(2), case_part_source(3), council]),
        ("domestic-3", vec![case_part_source(4), case_part_source(5)]),
        ("domestic-4", vec![case_part_source(6), case_part_source(7)]),
        ("domestic-5", vec![case_part_source(8), case_part_source(9)]),
    ];

    table
        .into_iter()
        .map(|(name, sources)| PartitionSpec {
            name: name.to_string(),
            label: "국내 분류사례".to_string(),
            members: sources
                .into_iter()
                .map(|source| PartitionMember {
                    source,
                    range: None,
                })
                .collect(),
        })
        .collect()
}

/// 해외 파티션 테이블: 미국 3분할 + EU 2분할
///
/// 분할 경계는 레코드 수로부터 계산되는 연속·최대한 균등한 구간입니다.
fn overseas_partitions(us_len: usize, eu_len: usize) -> Vec<PartitionSpec> {
    let mut specs = Vec::with_capacity(5);

    for (i, (start, end)) in slice_bounds(us_len, 3).into_iter().enumerate() {
        specs.push(PartitionSpec {
            name: format!("overseas-{}", i + 1),
            label: "미국 분류사례".to_string(),
            members: vec![PartitionMember {
                source: SOURCE_US.to_string(),
                range: Some((start, end)),
            }],
        });
    }

    for (i, (start, end)) in slice_bounds(eu_len, 2).into_iter().enumerate() {
        specs.push(PartitionSpec {
            name: format!("overseas-{}", i + 4),
            label: "EU 분류사례".to_string(),
            members: vec![PartitionMember {
                source: SOURCE_EU.to_string(),
                range: Some((start, end)),
            }],
        });
    }

    specs
}

/// n개 레코드를 k개의 연속 구간으로 최대한 균등하게 분할
///
/// 앞쪽 `n % k`개 구간이 한 개씩 더 가져갑니다.
fn slice_bounds(n: usize, k: usize) -> Vec<(usize, usize)> {
    let base = n / k;
    let extra = n % k;

    let mut bounds = Vec::with_capacity(k);
    let mut start = 0;
    for i in 0..k {
        let len = base + usize::from(i < extra);
        bounds.push((start, start + len));
        start += len;
    }
    bounds
}

// ============================================================================
// PartitionedCaseIndex
// ============================================================================

/// 파티션 인식 사례 인덱스
///
/// 공유 키워드 인덱스 하나 위에 고정 파티션 스킴을 얹습니다.
/// 그룹 질의는 부수효과 없는 읽기이며 병렬 실행에 안전합니다.
pub struct PartitionedCaseIndex {
    index: KeywordIndex,
    domestic: Vec<PartitionSpec>,
    overseas: Vec<PartitionSpec>,
}

impl PartitionedCaseIndex {
    /// 지식 베이스로부터 인덱스 구축 (프로세스당 한 번)
    pub fn build(kb: &KnowledgeBase) -> Self {
        let index = KeywordIndex::build(&kb.cases);
        let domestic = domestic_partitions();
        let overseas = overseas_partitions(kb.source_len(SOURCE_US), kb.source_len(SOURCE_EU));

        tracing::debug!(
            "파티션 인덱스 구축: 국내 {} 그룹, 해외 {} 그룹",
            domestic.len(),
            overseas.len()
        );

        Self {
            index,
            domestic,
            overseas,
        }
    }

    pub fn groups(&self, scope: CaseScope) -> &[PartitionSpec] {
        match scope {
            CaseScope::Domestic => &self.domestic,
            CaseScope::Overseas => &self.overseas,
        }
    }

    /// 그룹 하나에 대한 질의
    ///
    /// 해당 그룹의 소스(및 구간)로 제한한 키워드 스코어 검색 상위
    /// `max_results`건을 "소스 (관할): 직렬화-레코드" 형식으로 빈 줄
    /// 구분해 반환합니다. 겹치는 사례가 없으면 빈 문자열이며, 호출자는
    /// 이를 "관련 사례 없음"으로 다룹니다.
    pub fn query_group(
        &self,
        query: &str,
        scope: CaseScope,
        group_index: usize,
        max_results: usize,
    ) -> Result<String> {
        let groups = self.groups(scope);
        let Some(spec) = groups.get(group_index) else {
            bail!(
                "그룹 인덱스 범위 초과: {} (그룹 수 {})",
                group_index,
                groups.len()
            );
        };

        let mut filter = SourceFilter::new();
        for member in &spec.members {
            filter = match member.range {
                Some((start, end)) => filter.allow_range(&member.source, start, end),
                None => filter.allow(&member.source),
            };
        }

        let scored = self.index.score(query, Some(&filter));

        let blocks: Vec<String> = scored
            .iter()
            .take(max_results)
            .map(|s| format!("{} ({}): {}", s.record.source, spec.label, s.record.serialized))
            .collect();

        Ok(blocks.join("\n\n"))
    }
}

// ============================================================================
// Tests
// ============================================================================
