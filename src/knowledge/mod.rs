//! Knowledge 모듈 - 지식 적재, 해설서 체계, 파티션 인덱스
//!
//! - loader: 이름 붙은 JSON 레코드 컬렉션 적재 (누락 허용)
//! - manual: HS 해설서 부/류/호 테이블
//! - partition: 고정 파티션 스킴의 사례 인덱스

mod loader;
mod manual;
mod partition;

// Re-exports
pub use loader::{
    case_part_source, case_sources, default_knowledge_dir, get_data_dir, CaseRecord,
    KnowledgeBase, KnowledgeStats, CASE_PART_COUNT, SOURCE_COMMITTEE, SOURCE_COUNCIL, SOURCE_EU,
    SOURCE_US,
};
pub use manual::{ExplanatoryEntry, ManualLookupResult, ManualTable, RawManualRow};
pub use partition::{
    CaseScope, PartitionMember, PartitionSpec, PartitionedCaseIndex, DEFAULT_GROUP_RESULTS,
};
