//! 지식 파일 적재 - 이름 붙은 레코드 컬렉션
//!
//! 데이터 디렉토리의 JSON 지식 파일들을 프로세스 시작 시 한 번 메모리에
//! 적재합니다. 파일이 없거나 읽기에 실패한 소스는 경고 후 빈 컬렉션으로
//! 동작하며, 적재는 어떤 경우에도 실패하지 않습니다. 적재 후 모든
//! 테이블은 읽기 전용입니다.

use std::collections::BTreeMap;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use serde_json::Value;

use crate::search::{TariffRow, TariffSearcher};

use super::manual::{ManualTable, RawManualRow};

// ============================================================================
// Source Names
// ============================================================================

/// 국내 분류사례 분할 파일 수
pub const CASE_PART_COUNT: usize = 10;

/// 품목분류위원회 결정
pub const SOURCE_COMMITTEE: &str = "committee_decisions";
/// 품목분류협의회 결정
pub const SOURCE_COUNCIL: &str = "council_decisions";
/// 미국 관세청 분류사례
pub const SOURCE_US: &str = "us_rulings";
/// EU 분류사례
pub const SOURCE_EU: &str = "eu_rulings";

const FILE_TARIFF: &str = "tariff_table.json";
const FILE_MANUAL: &str = "manual_notes.json";

/// 국내 분류사례 소스 이름 ("case_part_1" ~ "case_part_10")
pub fn case_part_source(index: usize) -> String {
    format!("case_part_{}", index + 1)
}

/// 적재 대상 사례 소스 전체 목록
pub fn case_sources() -> Vec<String> {
    let mut sources: Vec<String> = (0..CASE_PART_COUNT).map(case_part_source).collect();
    sources.push(SOURCE_COMMITTEE.to_string());
    sources.push(SOURCE_COUNCIL.to_string());
    sources.push(SOURCE_US.to_string());
    sources.push(SOURCE_EU.to_string());
    sources
}

// ============================================================================
// Data Directory
// ============================================================================

/// 데이터 디렉토리 경로 (~/.hscode-rag/)
pub fn get_data_dir() -> PathBuf {
    dirs::data_local_dir()
        .or_else(dirs::home_dir)
        .unwrap_or_else(|| PathBuf::from("."))
        .join(".hscode-rag")
}

/// 기본 지식 파일 디렉토리 (~/.hscode-rag/knowledge/)
pub fn default_knowledge_dir() -> PathBuf {
    get_data_dir().join("knowledge")
}

// ============================================================================
// CaseRecord
// ============================================================================

/// 분류사례 레코드
///
/// 임의 구조의 JSON 문서 하나. `serialized`는 적재 시 한 번 계산되는
/// 결정적 직렬화 문자열로(키 정렬), 중복 제거와 정렬의 키로만 쓰입니다.
/// 구조가 필요한 곳은 항상 `value`를 직접 사용합니다. 직렬화 문자열을
/// 되파싱하지 않습니다.
#[derive(Debug, Clone)]
pub struct CaseRecord {
    pub source: String,
    pub value: Value,
    pub serialized: String,
}

impl CaseRecord {
    pub fn new(source: &str, value: Value) -> Self {
        let serialized = value.to_string();
        Self {
            source: source.to_string(),
            value,
            serialized,
        }
    }
}

// ============================================================================
// KnowledgeBase
// ============================================================================

/// 소스별 레코드 수 통계
#[derive(Debug, Clone)]
pub struct KnowledgeStats {
    pub case_counts: Vec<(String, usize)>,
    pub tariff_rows: usize,
    pub manual_entries: usize,
}

/// 적재된 지식 전체
///
/// 애플리케이션 시작 시 한 번 만들어 필요한 컴포넌트에 참조로 전달합니다
/// (전역 상태 없음).
pub struct KnowledgeBase {
    data_dir: PathBuf,
    /// 소스 이름 → 레코드 (이름 순서 고정)
    pub cases: BTreeMap<String, Vec<Arc<CaseRecord>>>,
    pub tariff: TariffSearcher,
    pub manual: ManualTable,
}

impl KnowledgeBase {
    /// 디렉토리에서 전체 지식 적재
    ///
    /// 누락·손상 파일은 소스 단위로 빈 컬렉션 처리됩니다.
    pub fn load(data_dir: &Path) -> Self {
        let mut cases = BTreeMap::new();
        for source in case_sources() {
            let records = load_case_records(data_dir, &source);
            cases.insert(source, records);
        }

        let tariff = load_tariff_table(data_dir);
        let manual = load_manual_table(data_dir);

        let total: usize = cases.values().map(Vec::len).sum();
        tracing::info!(
            "지식 적재 완료: 사례 {} 건, 관세율표 {} 행, 해설서 {} 항목",
            total,
            tariff.len(),
            manual.len()
        );

        Self {
            data_dir: data_dir.to_path_buf(),
            cases,
            tariff,
            manual,
        }
    }

    /// 기본 디렉토리에서 적재
    pub fn load_default() -> Self {
        Self::load(&default_knowledge_dir())
    }

    pub fn data_dir(&self) -> &Path {
        &self.data_dir
    }

    /// 소스 하나의 레코드 수
    pub fn source_len(&self, source: &str) -> usize {
        self.cases.get(source).map_or(0, Vec::len)
    }

    pub fn stats(&self) -> KnowledgeStats {
        KnowledgeStats {
            case_counts: self
                .cases
                .iter()
                .map(|(name, records)| (name.clone(), records.len()))
                .collect(),
            tariff_rows: self.tariff.len(),
            manual_entries: self.manual.len(),
        }
    }
}

// ============================================================================
// File Loading
// ============================================================================

/// JSON 배열 파일 읽기 (실패 시 경고 후 None)
fn read_json_array(path: &Path) -> Option<Vec<Value>> {
    let raw = match std::fs::read_to_string(path) {
        Ok(raw) => raw,
        Err(e) => {
            tracing::warn!("지식 파일을 읽을 수 없습니다 ({}): {}", path.display(), e);
            return None;
        }
    };

    match serde_json::from_str::<Vec<Value>>(&raw) {
        Ok(values) => Some(values),
        Err(e) => {
            tracing::warn!("지식 파일 파싱 실패 ({}): {}", path.display(), e);
            None
        }
    }
}

fn load_case_records(data_dir: &Path, source: &str) -> Vec<Arc<CaseRecord>> {
    let path = data_dir.join(format!("{}.json", source));
    let values = read_json_array(&path).unwrap_or_default();

    values
        .into_iter()
        .map(|value| Arc::new(CaseRecord::new(source, value)))
        .collect()
}

fn load_tariff_table(data_dir: &Path) -> TariffSearcher {
    let path = data_dir.join(FILE_TARIFF);
    let Some(values) = read_json_array(&path) else {
        return TariffSearcher::empty();
    };

    let mut rows: Vec<TariffRow> = Vec::with_capacity(values.len());
    for value in values {
        match serde_json::from_value::<TariffRow>(value) {
            Ok(row) => rows.push(row),
            Err(e) => tracing::warn!("관세율표 행 파싱 실패: {}", e),
        }
    }

    TariffSearcher::new(rows)
}

fn load_manual_table(data_dir: &Path) -> ManualTable {
    let path = data_dir.join(FILE_MANUAL);
    let Some(values) = read_json_array(&path) else {
        return ManualTable::empty();
    };

    let mut rows: Vec<RawManualRow> = Vec::with_capacity(values.len());
    for value in values {
        match serde_json::from_value::<RawManualRow>(value) {
            Ok(row) => rows.push(row),
            Err(e) => tracing::warn!("해설서 행 파싱 실패: {}", e),
        }
    }

    ManualTable::from_rows(rows)
}

// ============================================================================
// Tests
// ============================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;
    use tempfile::TempDir;

    fn write_json(dir: &Path, name: &str, value: serde_json::Value) {
        std::fs::write(dir.join(name), value.to_string()).unwrap();
    }

    #[test]
    fn test_load_with_missing_files_degrades_to_empty() {
        let dir = TempDir::new().unwrap();
        let kb = KnowledgeBase::load(dir.path());

        // 어떤 파일도 없어도 적재는 성공하고 전부 빈 컬렉션
        assert_eq!(kb.source_len("case_part_1"), 0);
        assert!(kb.tariff.is_empty());
        assert!(kb.manual.is_empty());
    }

    #[test]
    fn test_load_case_records() {
        let dir = TempDir::new().unwrap();
        write_json(
            dir.path(),
            "case_part_1.json",
            json!([{"품명": "플라스틱 용기"}, {"품명": "유리병"}]),
        );

        let kb = KnowledgeBase::load(dir.path());
        assert_eq!(kb.source_len("case_part_1"), 2);

        let records = &kb.cases["case_part_1"];
        assert_eq!(records[0].source, "case_part_1");
        assert!(records[0].serialized.contains("플라스틱 용기"));
    }

    #[test]
    fn test_serialized_key_is_deterministic() {
        // 키 순서가 달라도 같은 레코드는 같은 직렬화 키를 가짐
        let a = CaseRecord::new("s", json!({"b": 1, "a": 2}));
        let b = CaseRecord::new("s", json!({"a": 2, "b": 1}));
        assert_eq!(a.serialized, b.serialized);
    }

    #[test]
    fn test_load_tariff_table() {
        let dir = TempDir::new().unwrap();
        write_json(
            dir.path(),
            FILE_TARIFF,
            json!([
                {"code": "392310", "name_ko": "플라스틱 용기", "name_en": "plastic container"},
                {"품목번호": "701090", "한글품명": "유리 용기", "영문품명": "glass container"}
            ]),
        );

        let kb = KnowledgeBase::load(dir.path());
        assert_eq!(kb.tariff.len(), 2);
    }

    #[test]
    fn test_load_manual_groups_rows() {
        let dir = TempDir::new().unwrap();
        write_json(
            dir.path(),
            FILE_MANUAL,
            json!([
                {"header1": "제7부", "header2": "제39류", "text": "플라스틱", "page": 1},
                {"header1": "제7부", "header2": "제39류", "text": "추가", "page": 2}
            ]),
        );

        let kb = KnowledgeBase::load(dir.path());
        assert_eq!(kb.manual.len(), 1);
        assert_eq!(kb.manual.entries()[0].pages, vec![1, 2]);
    }

    #[test]
    fn test_corrupt_file_degrades_to_empty() {
        let dir = TempDir::new().unwrap();
        std::fs::write(dir.path().join("case_part_2.json"), "not json").unwrap();

        let kb = KnowledgeBase::load(dir.path());
        assert_eq!(kb.source_len("case_part_2"), 0);
    }

    #[test]
    fn test_case_sources_list() {
        let sources = case_sources();
        assert_eq!(sources.len(), CASE_PART_COUNT + 4);
        assert_eq!(sources[0], "case_part_1");
        assert!(sources.contains(&SOURCE_US.to_string()));
    }
}
