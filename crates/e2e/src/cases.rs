//! Test case table
//!
//! Cases are plain data loaded once from YAML into an immutable,
//! partitioned repository. The partition decides how strictly a case is
//! asserted: exact match for positive and negative cases, liveness then exact
//! match for incremental-typing cases.

use serde::{Deserialize, Serialize};
use std::collections::HashSet;
use std::fmt;
use std::path::Path;

use crate::error::{E2eError, E2eResult};

/// Expected output meaning "no translation produced"
pub const NO_TRANSLATION_SENTINEL: &str = "කිසිදු සිංහල පරිවර්තනයක් නොමැත";

const BUILTIN_CASES: &str = include_str!("../cases/swifttranslator.yaml");

/// A single input/oracle pair
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TestCase {
    /// Unique identifier, e.g. `Pos_Fun_001`
    pub id: String,

    /// Human-readable description
    pub name: String,

    /// Singlish text typed into the widget
    pub input: String,

    /// Exact expected output
    pub expected: String,

    #[serde(default)]
    pub category: String,

    #[serde(default)]
    pub grammar: String,

    #[serde(default)]
    pub length: LengthClass,
}

impl TestCase {
    /// Whether the oracle is the "no translation" sentinel
    pub fn expects_no_translation(&self) -> bool {
        self.expected == NO_TRANSLATION_SENTINEL
    }
}

/// Incremental-typing case: the prefix is typed first and checked for liveness
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct IncrementalCase {
    #[serde(flatten)]
    pub case: TestCase,

    /// Prefix of `case.input` typed before the liveness check
    pub partial_input: String,
}

impl IncrementalCase {
    /// The rest of the input typed after the liveness check
    pub fn remaining_input(&self) -> &str {
        self.case
            .input
            .strip_prefix(self.partial_input.as_str())
            .unwrap_or_default()
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum LengthClass {
    #[default]
    #[serde(rename = "S", alias = "short")]
    Short,
    #[serde(rename = "M", alias = "medium")]
    Medium,
    #[serde(rename = "L", alias = "long")]
    Long,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Partition {
    Positive,
    Negative,
    Incremental,
}

impl Partition {
    pub fn as_str(&self) -> &'static str {
        match self {
            Partition::Positive => "positive",
            Partition::Negative => "negative",
            Partition::Incremental => "incremental",
        }
    }
}

impl fmt::Display for Partition {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl std::str::FromStr for Partition {
    type Err = E2eError;

    fn from_str(s: &str) -> E2eResult<Self> {
        match s {
            "positive" | "pos" => Ok(Partition::Positive),
            "negative" | "neg" => Ok(Partition::Negative),
            "incremental" | "ui" => Ok(Partition::Incremental),
            other => Err(E2eError::CaseParse(format!("Unknown partition: {}", other))),
        }
    }
}

/// One entry of an execution plan
#[derive(Debug, Clone)]
pub enum PlannedCase {
    Exact {
        partition: Partition,
        case: TestCase,
    },
    Incremental(IncrementalCase),
}

impl PlannedCase {
    pub fn case(&self) -> &TestCase {
        match self {
            PlannedCase::Exact { case, .. } => case,
            PlannedCase::Incremental(inc) => &inc.case,
        }
    }

    pub fn partition(&self) -> Partition {
        match self {
            PlannedCase::Exact { partition, .. } => *partition,
            PlannedCase::Incremental(_) => Partition::Incremental,
        }
    }
}

/// Selection applied when building a plan
#[derive(Debug, Clone, Default)]
pub struct CaseFilter {
    pub partition: Option<Partition>,
    pub id: Option<String>,
}

impl CaseFilter {
    fn accepts(&self, partition: Partition, case: &TestCase) -> bool {
        self.partition.map_or(true, |p| p == partition)
            && self.id.as_deref().map_or(true, |id| id == case.id)
    }
}

/// Immutable, partitioned table of cases
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct CaseRepository {
    #[serde(default)]
    positive: Vec<TestCase>,

    #[serde(default)]
    negative: Vec<TestCase>,

    #[serde(default)]
    incremental: Vec<IncrementalCase>,
}

impl CaseRepository {
    /// The table shipped with the crate
    pub fn builtin() -> E2eResult<Self> {
        Self::from_yaml(BUILTIN_CASES)
    }

    /// Parse and validate a table from a YAML string
    pub fn from_yaml(yaml: &str) -> E2eResult<Self> {
        let repo: Self = serde_yaml::from_str(yaml)?;
        repo.validate()?;
        Ok(repo)
    }

    /// Parse a table from a YAML file
    pub fn from_file(path: &Path) -> E2eResult<Self> {
        let content = std::fs::read_to_string(path)?;
        Self::from_yaml(&content).map_err(|e| match e {
            E2eError::CaseParse(msg) => E2eError::CaseParse(format!("{}: {}", path.display(), msg)),
            E2eError::Yaml(err) => E2eError::CaseParse(format!("{}: {}", path.display(), err)),
            other => other,
        })
    }

    /// Merge every YAML table found under a directory
    pub fn load_dir(dir: &Path) -> E2eResult<Self> {
        let mut paths = Vec::new();
        for entry in walkdir::WalkDir::new(dir) {
            let entry = entry?;
            let is_yaml = entry
                .path()
                .extension()
                .map(|ext| ext == "yaml" || ext == "yml")
                .unwrap_or(false);
            if is_yaml {
                paths.push(entry.into_path());
            }
        }
        paths.sort();

        let mut merged = Self::default();
        for path in &paths {
            let part = Self::from_file(path)?;
            merged.positive.extend(part.positive);
            merged.negative.extend(part.negative);
            merged.incremental.extend(part.incremental);
        }

        merged.validate()?;
        Ok(merged)
    }

    /// Load from a file or a directory
    pub fn load(path: &Path) -> E2eResult<Self> {
        if path.is_dir() {
            Self::load_dir(path)
        } else {
            Self::from_file(path)
        }
    }

    pub fn validate(&self) -> E2eResult<()> {
        let mut seen = HashSet::new();

        for case in self.all_cases() {
            if case.id.trim().is_empty() {
                return Err(E2eError::CaseParse("case with empty id".to_string()));
            }
            if !seen.insert(case.id.as_str()) {
                return Err(E2eError::CaseParse(format!("duplicate case id: {}", case.id)));
            }
            if case.input.is_empty() {
                return Err(E2eError::CaseParse(format!("{}: empty input", case.id)));
            }
            if case.expected.trim().is_empty() {
                return Err(E2eError::CaseParse(format!("{}: empty expected output", case.id)));
            }
        }

        for inc in &self.incremental {
            let partial = inc.partial_input.as_str();
            if partial.is_empty()
                || partial.len() >= inc.case.input.len()
                || !inc.case.input.starts_with(partial)
            {
                return Err(E2eError::CaseParse(format!(
                    "{}: partial input {:?} is not a strict prefix of {:?}",
                    inc.case.id, partial, inc.case.input
                )));
            }
        }

        Ok(())
    }

    pub fn positive(&self) -> &[TestCase] {
        &self.positive
    }

    pub fn negative(&self) -> &[TestCase] {
        &self.negative
    }

    pub fn incremental(&self) -> &[IncrementalCase] {
        &self.incremental
    }

    pub fn len(&self) -> usize {
        self.positive.len() + self.negative.len() + self.incremental.len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Every case in plan order, incremental cases included
    pub fn all_cases(&self) -> impl Iterator<Item = &TestCase> {
        self.positive
            .iter()
            .chain(self.negative.iter())
            .chain(self.incremental.iter().map(|inc| &inc.case))
    }

    pub fn get(&self, id: &str) -> Option<&TestCase> {
        self.all_cases().find(|c| c.id == id)
    }

    /// Ordered plan: positive, then negative, then incremental
    pub fn plan(&self, filter: &CaseFilter) -> Vec<PlannedCase> {
        let exact = |partition: Partition, cases: &[TestCase]| -> Vec<PlannedCase> {
            cases
                .iter()
                .filter(|c| filter.accepts(partition, c))
                .map(|c| PlannedCase::Exact {
                    partition,
                    case: c.clone(),
                })
                .collect()
        };

        let mut plan = exact(Partition::Positive, &self.positive);
        plan.extend(exact(Partition::Negative, &self.negative));
        plan.extend(
            self.incremental
                .iter()
                .filter(|inc| filter.accepts(Partition::Incremental, &inc.case))
                .cloned()
                .map(PlannedCase::Incremental),
        );
        plan
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use test_case::test_case;

    const SMALL_TABLE: &str = r#"
positive:
  - id: Pos_Fun_002
    name: Convert simple present tense statement
    input: api dhaen vaeda karanavaa.
    expected: අපි දැන් වැඩ කරනවා.
    category: Daily language usage
    grammar: Present tense
    length: S
negative:
  - id: Neg_Fun_010
    name: Numeric-only input without linguistic content
    input: '202520262027'
    expected: කිසිදු සිංහල පරිවර්තනයක් නොමැත
    length: short
incremental:
  - id: Pos_UI_001
    name: Real-time translation updates as typing
    input: mama gedhara yanavaa.
    partial_input: 'mama gedhara '
    expected: මම ගෙදර යනවා.
    length: S
"#;

    #[test]
    fn test_builtin_table_loads() {
        let repo = CaseRepository::builtin().unwrap();
        assert_eq!(repo.positive().len(), 24);
        assert_eq!(repo.negative().len(), 10);
        assert_eq!(repo.incremental().len(), 1);
        assert_eq!(repo.len(), 35);
    }

    #[test]
    fn test_parse_small_table() {
        let repo = CaseRepository::from_yaml(SMALL_TABLE).unwrap();
        let neg = &repo.negative()[0];
        assert!(neg.expects_no_translation());
        assert_eq!(neg.length, LengthClass::Short);
        assert_eq!(neg.category, "");

        let inc = &repo.incremental()[0];
        assert_eq!(inc.case.expected, "මම ගෙදර යනවා.");
        assert_eq!(inc.remaining_input(), "yanavaa.");
    }

    #[test]
    fn test_duplicate_ids_rejected() {
        let yaml = r#"
positive:
  - { id: A, name: a, input: x, expected: y }
negative:
  - { id: A, name: b, input: x, expected: y }
"#;
        let err = CaseRepository::from_yaml(yaml).unwrap_err();
        assert!(err.to_string().contains("duplicate case id: A"));
    }

    #[test_case("mama gedhara yanavaa." ; "whole input")]
    #[test_case("" ; "empty prefix")]
    #[test_case("oya gedhara " ; "not a prefix")]
    fn test_bad_partial_input_rejected(partial: &str) {
        let yaml = format!(
            "incremental:\n  - id: UI\n    name: ui\n    input: mama gedhara yanavaa.\n    partial_input: '{}'\n    expected: z\n",
            partial
        );
        assert!(matches!(
            CaseRepository::from_yaml(&yaml),
            Err(E2eError::CaseParse(_))
        ));
    }

    #[test]
    fn test_plan_order_and_filters() {
        let repo = CaseRepository::from_yaml(SMALL_TABLE).unwrap();

        let ids: Vec<_> = repo
            .plan(&CaseFilter::default())
            .iter()
            .map(|p| p.case().id.clone())
            .collect();
        assert_eq!(ids, ["Pos_Fun_002", "Neg_Fun_010", "Pos_UI_001"]);

        let negative = repo.plan(&CaseFilter {
            partition: Some(Partition::Negative),
            id: None,
        });
        assert_eq!(negative.len(), 1);
        assert_eq!(negative[0].partition(), Partition::Negative);

        let by_id = repo.plan(&CaseFilter {
            partition: None,
            id: Some("Pos_UI_001".to_string()),
        });
        assert!(matches!(by_id.as_slice(), [PlannedCase::Incremental(_)]));
    }

    #[test_case("positive", Partition::Positive)]
    #[test_case("neg", Partition::Negative)]
    #[test_case("ui", Partition::Incremental)]
    fn test_partition_from_str(raw: &str, expected: Partition) {
        assert_eq!(raw.parse::<Partition>().unwrap(), expected);
    }

    #[test]
    fn test_load_dir_merges_sorted_files() {
        let dir = tempfile::tempdir().unwrap();
        std::fs::write(
            dir.path().join("b.yaml"),
            "negative:\n  - { id: N1, name: n, input: x, expected: y }\n",
        )
        .unwrap();
        std::fs::write(
            dir.path().join("a.yml"),
            "positive:\n  - { id: P1, name: p, input: x, expected: y }\n",
        )
        .unwrap();
        std::fs::write(dir.path().join("notes.txt"), "ignored").unwrap();

        let repo = CaseRepository::load(dir.path()).unwrap();
        assert_eq!(repo.len(), 2);
        assert!(repo.get("P1").is_some());
        assert!(repo.get("N1").is_some());
    }
    #[test]
    fn test_load_dir_names_the_broken_file() {
        let dir = tempfile::tempdir().unwrap();
        std::fs::write(
            dir.path().join("a.yaml"),
            "positive:\n  - { id: P1, name: p, input: x, expected: y }\n",
        )
        .unwrap();
        std::fs::write(dir.path().join("b.yaml"), "positive: [ { id: P2, name: \n").unwrap();

        match CaseRepository::load_dir(dir.path()) {
            Err(E2eError::CaseParse(msg)) => assert!(msg.contains("b.yaml"), "{}", msg),
            other => panic!("expected parse error, got {other:?}"),
        }
    }

    #[test]
    fn test_load_dir_rejects_duplicates_across_files() {
        let dir = tempfile::tempdir().unwrap();
        for name in ["a.yaml", "b.yaml"] {
            std::fs::write(
                dir.path().join(name),
                "positive:\n  - { id: P1, name: p, input: x, expected: y }\n",
            )
            .unwrap();
        }
        let err = CaseRepository::load_dir(dir.path()).unwrap_err();
        assert!(err.to_string().contains("duplicate case id: P1"));
    }

    #[test]
    fn test_load_dir_reports_walk_errors() {
        let dir = tempfile::tempdir().unwrap();
        let missing = dir.path().join("absent");
        let err = CaseRepository::load_dir(&missing).unwrap_err();
        assert_eq!(err.kind(), "walk");
    }
}
