//! Survey template schema.
//!
//! A template is loaded once per run and never mutated. Question elements are
//! an exhaustive tagged union: an element whose `type` is not one of the six
//! known variants fails deserialization instead of being skipped.

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

use crate::error::TemplateError;

/// Sentinel grouping: cohorts use the same column layout as the tables
pub const ALL: &str = "ALL";

/// Normalizer value meaning "divide by the number of submitters"
pub const SELF: &str = "SELF";

#[derive(Debug, Clone, Deserialize)]
pub struct Template {
    pub tables: Vec<TableDef>,
    /// Pairs of table indices; each produces a `"A : B"` pseudo-table
    #[serde(default)]
    pub ratios: Vec<(usize, usize)>,
    #[serde(rename = "surveyjs-1", default)]
    pub survey: Option<Survey>,
    #[serde(default)]
    pub usability: Vec<UsabilityMetric>,
    #[serde(default)]
    pub cohort_group_by: CohortGrouping,
}

impl Template {
    pub fn from_json(json: &str) -> Result<Self, TemplateError> {
        Ok(serde_json::from_str(json)?)
    }
}

#[derive(Debug, Clone, Deserialize)]
pub struct TableDef {
    pub name: String,
    /// Tables with `submit: false` are display-only
    #[serde(default = "default_submit")]
    pub submit: bool,
    #[serde(default)]
    pub rows: Vec<Label>,
    /// Column header levels, coarsest first; cells use the last level
    #[serde(default)]
    pub cols: Vec<Vec<Label>>,
    #[serde(default)]
    pub operations: Operations,
    #[serde(rename = "cohortOperations", default)]
    pub cohort_operations: Operations,
}

fn default_submit() -> bool {
    true
}

impl TableDef {
    /// Most detailed column level
    pub fn leaf_cols(&self) -> Option<&[Label]> {
        self.cols.last().map(Vec::as_slice)
    }
}

#[derive(Debug, Clone, Deserialize)]
pub struct Label {
    pub key: String,
    #[serde(default)]
    pub label: Option<String>,
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct Operations {
    #[serde(rename = "AVG", default)]
    pub avg: Option<Normalizer>,
    /// Presence requests a deviation; the value itself is not consulted
    #[serde(rename = "STD", default)]
    pub std: Option<Normalizer>,
    #[serde(rename = "LIN", default)]
    pub lin: Vec<LinPair>,
}

/// Divisor used when turning a sum into a mean
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(from = "String", into = "String")]
pub enum Normalizer {
    /// Divide by the number of submitters in scope
    SelfNormalizing,
    /// Divide by the opened sum of the named table at the matching index
    Reference(String),
}

impl From<String> for Normalizer {
    fn from(value: String) -> Self {
        if value == SELF {
            Normalizer::SelfNormalizing
        } else {
            Normalizer::Reference(value)
        }
    }
}

impl From<Normalizer> for String {
    fn from(value: Normalizer) -> Self {
        match value {
            Normalizer::SelfNormalizing => SELF.to_string(),
            Normalizer::Reference(table) => table,
        }
    }
}

/// A `(row, col)` cell address within one table
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(from = "(String, String)", into = "(String, String)")]
pub struct CellRef {
    pub row: String,
    pub col: String,
}

impl CellRef {
    pub fn new(row: impl Into<String>, col: impl Into<String>) -> Self {
        Self {
            row: row.into(),
            col: col.into(),
        }
    }
}

impl From<(String, String)> for CellRef {
    fn from((row, col): (String, String)) -> Self {
        Self { row, col }
    }
}

impl From<CellRef> for (String, String) {
    fn from(cell: CellRef) -> Self {
        (cell.row, cell.col)
    }
}

/// Independent/dependent cell pair for a linear regression
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(from = "(CellRef, CellRef)", into = "(CellRef, CellRef)")]
pub struct LinPair {
    pub independent: CellRef,
    pub dependent: CellRef,
}

impl From<(CellRef, CellRef)> for LinPair {
    fn from((independent, dependent): (CellRef, CellRef)) -> Self {
        Self {
            independent,
            dependent,
        }
    }
}

impl From<LinPair> for (CellRef, CellRef) {
    fn from(pair: LinPair) -> Self {
        (pair.independent, pair.dependent)
    }
}

/// `ALL` or an explicit, ordered list of cohort column labels
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(try_from = "GroupingRepr")]
pub enum CohortGrouping {
    #[default]
    All,
    Labels(Vec<String>),
}

#[derive(Deserialize)]
#[serde(untagged)]
enum GroupingRepr {
    Sentinel(String),
    Labels(Vec<String>),
}

impl TryFrom<GroupingRepr> for CohortGrouping {
    type Error = String;

    fn try_from(value: GroupingRepr) -> Result<Self, Self::Error> {
        match value {
            GroupingRepr::Sentinel(s) if s == ALL => Ok(CohortGrouping::All),
            GroupingRepr::Sentinel(s) => Err(format!("unknown cohort grouping `{s}`")),
            GroupingRepr::Labels(labels) => Ok(CohortGrouping::Labels(labels)),
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
#[serde(untagged)]
pub enum UsabilityMetric {
    /// Scalar metric, single slot with an empty field name
    Plain(String),
    /// Metric broken into named fields, one slot each
    Fields(BTreeMap<String, Vec<String>>),
}

#[derive(Debug, Clone, Deserialize)]
pub struct Survey {
    #[serde(default)]
    pub pages: Vec<Page>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct Page {
    #[serde(default)]
    pub elements: Vec<Element>,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(tag = "type", rename_all = "lowercase")]
pub enum Element {
    Panel {
        #[serde(default)]
        elements: Vec<Element>,
    },
    /// Single choice
    Radiogroup {
        name: String,
        #[serde(default)]
        title: Option<String>,
        #[serde(default)]
        choices: Vec<Choice>,
    },
    /// Multiple choice
    Checkbox {
        name: String,
        #[serde(default)]
        title: Option<String>,
        #[serde(default)]
        choices: Vec<Choice>,
    },
    Text {
        name: String,
        #[serde(default)]
        title: Option<String>,
    },
    /// Several numeric text fields under one question
    Multipletext {
        name: String,
        #[serde(default)]
        title: Option<String>,
        #[serde(default)]
        items: Vec<TextItem>,
    },
    /// Rows answered on a shared column scale
    Matrixdropdown {
        name: String,
        #[serde(default)]
        title: Option<String>,
        #[serde(default)]
        columns: Vec<MatrixColumn>,
        #[serde(default)]
        rows: Vec<Choice>,
    },
}

/// Choice text; accepts either `"text"` or `{ "value": .., "text": .. }`
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(from = "ChoiceRepr")]
pub struct Choice {
    pub text: String,
}

#[derive(Deserialize)]
#[serde(untagged)]
enum ChoiceRepr {
    Plain(String),
    Labeled { text: String },
    Valued { value: serde_json::Value },
}

impl From<ChoiceRepr> for Choice {
    fn from(value: ChoiceRepr) -> Self {
        let text = match value {
            ChoiceRepr::Plain(text) | ChoiceRepr::Labeled { text } => text,
            ChoiceRepr::Valued { value } => match value {
                serde_json::Value::String(s) => s,
                other => other.to_string(),
            },
        };
        Self { text }
    }
}

#[derive(Debug, Clone, Deserialize)]
pub struct TextItem {
    pub name: String,
}

#[derive(Debug, Clone, Deserialize)]
pub struct MatrixColumn {
    #[serde(default)]
    pub choices: Vec<Choice>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_operations_parse() {
        let ops: Operations = serde_json::from_str(
            r#"{"AVG": "SELF", "STD": "SELF", "LIN": [[["r1", "c1"], ["r2", "c1"]]]}"#,
        )
        .unwrap();
        assert_eq!(ops.avg, Some(Normalizer::SelfNormalizing));
        assert!(ops.std.is_some());
        assert_eq!(ops.lin[0].independent, CellRef::new("r1", "c1"));
        assert_eq!(ops.lin[0].dependent, CellRef::new("r2", "c1"));

        let by_ref: Operations = serde_json::from_str(r#"{"AVG": "Headcount"}"#).unwrap();
        assert_eq!(
            by_ref.avg,
            Some(Normalizer::Reference("Headcount".to_string()))
        );
    }

    #[test]
    fn test_grouping_parse() {
        let all: CohortGrouping = serde_json::from_str(r#""ALL""#).unwrap();
        assert_eq!(all, CohortGrouping::All);

        let labels: CohortGrouping = serde_json::from_str(r#"["Female", "Male"]"#).unwrap();
        assert_eq!(
            labels,
            CohortGrouping::Labels(vec!["Female".into(), "Male".into()])
        );

        assert!(serde_json::from_str::<CohortGrouping>(r#""SOME""#).is_err());
    }

    #[test]
    fn test_unknown_question_type_rejected() {
        let json = r#"{
            "tables": [],
            "surveyjs-1": { "pages": [ { "elements": [
                { "type": "rating", "name": "q1" }
            ] } ] }
        }"#;
        assert!(matches!(
            Template::from_json(json),
            Err(TemplateError::Parse(_))
        ));
    }

    #[test]
    fn test_choice_shapes() {
        let choices: Vec<Choice> =
            serde_json::from_str(r#"["Yes", {"value": 2, "text": "No"}, {"value": 3}]"#).unwrap();
        let texts: Vec<&str> = choices.iter().map(|c| c.text.as_str()).collect();
        assert_eq!(texts, vec!["Yes", "No", "3"]);
    }
}
