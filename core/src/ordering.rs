//! Consistent Ordering
//!
//! Flattens a template into the fixed-index layout every party derives on its
//! own. No party ever sends its layout to another, so `order` must be a pure
//! function of the template: same template, same descriptors, same slot count.
//!
//! ```text
//! ┌──────────┬──────────┬─────────────┬──────────────────┬─────────────────┐
//! │  values  │ squares  │ linProducts │ questionAnswers  │ usabilityMetrics│
//! │ |cells|  │ |cells|  │ Σ LIN pairs │ Σ question slots │ |usability|     │
//! └──────────┴──────────┴─────────────┴──────────────────┴─────────────────┘
//! ```

use std::collections::{BTreeMap, BTreeSet};
use std::ops::Range;

use serde::Serialize;
use tracing::debug;

use crate::error::TemplateError;
use crate::template::{
    CohortGrouping, Element, Label, LinPair, Normalizer, Operations, TableDef, Template,
    UsabilityMetric,
};

/// Cohort buckets per row when grouping by labels
pub const COHORT_SUBGROUPS: usize = 2;

/// One table cell in flattened order
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct CellDescriptor {
    pub table: String,
    pub row: String,
    pub col: String,
    pub avg_op: Option<Normalizer>,
    pub std_op: bool,
    pub lin_pairs: Vec<LinPair>,
    pub cohort_avg_op: Option<Normalizer>,
    pub cohort_std_op: bool,
}

impl CellDescriptor {
    fn new(table: &str, row: &str, col: &str, ops: &Operations, cohort_ops: &Operations) -> Self {
        Self {
            table: table.to_string(),
            row: row.to_string(),
            col: col.to_string(),
            avg_op: ops.avg.clone(),
            std_op: ops.std.is_some(),
            lin_pairs: ops.lin.clone(),
            cohort_avg_op: cohort_ops.avg.clone(),
            cohort_std_op: cohort_ops.std.is_some(),
        }
    }
}

/// The five supported question shapes
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum QuestionKind {
    SingleChoice { options: Vec<String> },
    MultiChoice { options: Vec<String> },
    Text,
    MultiText { fields: Vec<String> },
    Matrix { rows: Vec<String>, columns: Vec<String> },
}

impl QuestionKind {
    /// Number of slots this question occupies in the answers segment
    pub fn slot_count(&self) -> usize {
        match self {
            QuestionKind::SingleChoice { options } | QuestionKind::MultiChoice { options } => {
                options.len()
            }
            QuestionKind::Text => 1,
            QuestionKind::MultiText { fields } => fields.len(),
            // every row carries the full column scale
            QuestionKind::Matrix { rows, columns } => rows.len() * columns.len(),
        }
    }

    /// Label of each slot, in slot order
    pub fn slot_labels(&self) -> Vec<String> {
        match self {
            QuestionKind::SingleChoice { options } | QuestionKind::MultiChoice { options } => {
                options.clone()
            }
            QuestionKind::Text => vec!["responses".to_string()],
            QuestionKind::MultiText { fields } => fields.clone(),
            QuestionKind::Matrix { rows, columns } => rows
                .iter()
                .flat_map(|row| columns.iter().map(move |col| format!("{row}: {col}")))
                .collect(),
        }
    }

    pub fn name(&self) -> &'static str {
        match self {
            QuestionKind::SingleChoice { .. } => "single-choice",
            QuestionKind::MultiChoice { .. } => "multi-choice",
            QuestionKind::Text => "text",
            QuestionKind::MultiText { .. } => "multi-text",
            QuestionKind::Matrix { .. } => "matrix",
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct QuestionDescriptor {
    pub id: String,
    pub title: Option<String>,
    pub kind: QuestionKind,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct UsabilityDescriptor {
    pub metric: String,
    /// Empty for scalar metrics
    pub field: String,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct TableMeta {
    /// Slots in the global scope
    pub total: usize,
    /// Slots in a cohort scope
    pub cohort: usize,
}

/// A table with regression pairs, in first-occurrence order
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct RegressionTable {
    pub table: String,
    pub pairs: Vec<LinPair>,
    /// Index of the first pair's product within the products segment
    pub product_offset: usize,
}

/// A `"A : B"` pseudo-table and the tables it divides
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct RatioTable {
    pub name: String,
    pub numerator: String,
    pub denominator: String,
}

/// Index ranges of each segment within a party's share vector
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SegmentLayout {
    pub values: Range<usize>,
    pub squares: Range<usize>,
    pub products: Range<usize>,
    pub questions: Range<usize>,
    pub usability: Range<usize>,
}

impl SegmentLayout {
    pub fn total(&self) -> usize {
        self.usability.end
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ConsistentOrdering {
    pub cells: Vec<CellDescriptor>,
    pub questions: Vec<QuestionDescriptor>,
    pub usability: Vec<UsabilityDescriptor>,
    pub table_meta: BTreeMap<String, TableMeta>,
    pub regressions: Vec<RegressionTable>,
    pub ratios: Vec<RatioTable>,
    pub grouping: CohortGrouping,
    /// Leaf column count of the last primary table; drives cohort bucketing
    pub cols_count: usize,
}

impl ConsistentOrdering {
    pub fn lin_product_count(&self) -> usize {
        self.regressions.iter().map(|r| r.pairs.len()).sum()
    }

    pub fn question_slot_count(&self) -> usize {
        self.questions.iter().map(|q| q.kind.slot_count()).sum()
    }

    /// `2·|cells| + Σ linPairs + Σ questionSlots + |usability|`
    pub fn total_slots(&self) -> usize {
        self.layout().total()
    }

    pub fn layout(&self) -> SegmentLayout {
        let cells = self.cells.len();
        let values = 0..cells;
        let squares = values.end..values.end + cells;
        let products = squares.end..squares.end + self.lin_product_count();
        let questions = products.end..products.end + self.question_slot_count();
        let usability = questions.end..questions.end + self.usability.len();
        SegmentLayout {
            values,
            squares,
            products,
            questions,
            usability,
        }
    }

    /// Whether cohort scopes use the coarse label buckets
    pub fn is_grouped(&self) -> bool {
        matches!(self.grouping, CohortGrouping::Labels(_))
    }

    /// Length of a cohort accumulator for the values/squares segments
    pub fn cohort_slots(&self) -> usize {
        match &self.grouping {
            CohortGrouping::All => self.cells.len(),
            CohortGrouping::Labels(_) => COHORT_SUBGROUPS * (self.cells.len() / self.cols_count),
        }
    }
}

/// Flatten `template` into its consistent ordering
pub fn order(template: &Template) -> Result<ConsistentOrdering, TemplateError> {
    let grouping = template.cohort_group_by.clone();
    let mut cells = Vec::new();
    let mut table_meta = BTreeMap::new();
    let mut widths = Vec::new();

    for table in template.tables.iter().filter(|t| t.submit) {
        let width = push_block(&mut cells, &mut table_meta, &grouping, &table.name, table)?;
        widths.push((table.name.clone(), width));
    }
    let cols_count = widths.last().map_or(0, |(_, width)| *width);

    let mut ratios = Vec::new();
    for &(first, second) in &template.ratios {
        let numerator = ratio_table(template, first)?;
        let denominator = ratio_table(template, second)?;
        let name = format!("{} : {}", numerator.name, denominator.name);
        let width = push_block(&mut cells, &mut table_meta, &grouping, &name, numerator)?;
        widths.push((name.clone(), width));
        ratios.push(RatioTable {
            name,
            numerator: numerator.name.clone(),
            denominator: denominator.name.clone(),
        });
    }

    validate_references(&cells, &table_meta)?;
    let regressions = regression_tables(&cells)?;

    if let CohortGrouping::Labels(labels) = &grouping {
        validate_grouping(labels, cols_count, &widths)?;
    }

    let mut questions = Vec::new();
    if let Some(survey) = &template.survey {
        for page in &survey.pages {
            collect_questions(&page.elements, &mut questions)?;
        }
    }

    let usability = template
        .usability
        .iter()
        .flat_map(|metric| match metric {
            UsabilityMetric::Plain(name) => vec![UsabilityDescriptor {
                metric: name.clone(),
                field: String::new(),
            }],
            UsabilityMetric::Fields(fields) => fields
                .iter()
                .flat_map(|(metric, names)| {
                    names.iter().map(move |field| UsabilityDescriptor {
                        metric: metric.clone(),
                        field: field.clone(),
                    })
                })
                .collect(),
        })
        .collect();

    let ordering = ConsistentOrdering {
        cells,
        questions,
        usability,
        table_meta,
        regressions,
        ratios,
        grouping,
        cols_count,
    };
    debug!(
        cells = ordering.cells.len(),
        questions = ordering.questions.len(),
        usability = ordering.usability.len(),
        slots = ordering.total_slots(),
        "template ordered"
    );
    Ok(ordering)
}

fn leaf_cols(table: &TableDef) -> Result<&[Label], TemplateError> {
    table
        .leaf_cols()
        .filter(|cols| !cols.is_empty())
        .ok_or_else(|| TemplateError::MissingField {
            table: table.name.clone(),
            field: "cols",
        })
}

fn ratio_table(template: &Template, index: usize) -> Result<&TableDef, TemplateError> {
    template
        .tables
        .get(index)
        .ok_or(TemplateError::UnknownRatioTable {
            index,
            tables: template.tables.len(),
        })
}

/// Append `rows × leaf cols` descriptors for one (pseudo-)table and return
/// its leaf column count
fn push_block(
    cells: &mut Vec<CellDescriptor>,
    table_meta: &mut BTreeMap<String, TableMeta>,
    grouping: &CohortGrouping,
    name: &str,
    source: &TableDef,
) -> Result<usize, TemplateError> {
    let cols = leaf_cols(source)?;
    let total = source.rows.len() * cols.len();
    let cohort = match grouping {
        CohortGrouping::All => total,
        CohortGrouping::Labels(labels) => labels.len() * (total / cols.len()),
    };
    table_meta.insert(name.to_string(), TableMeta { total, cohort });

    for row in &source.rows {
        for col in cols {
            cells.push(CellDescriptor::new(
                name,
                &row.key,
                &col.key,
                &source.operations,
                &source.cohort_operations,
            ));
        }
    }
    Ok(cols.len())
}

/// Label buckets fold `2·row + col mod 2` with one shared column count, so
/// every block must be exactly that wide
fn validate_grouping(
    labels: &[String],
    cols_count: usize,
    widths: &[(String, usize)],
) -> Result<(), TemplateError> {
    let unsupported = |table: &str, cols: usize| TemplateError::UnsupportedGrouping {
        table: table.to_string(),
        labels: labels.len(),
        cols,
    };
    if labels.len() != COHORT_SUBGROUPS || cols_count < COHORT_SUBGROUPS {
        let table = widths.last().map_or("", |(name, _)| name.as_str());
        return Err(unsupported(table, cols_count));
    }
    match widths.iter().find(|(_, width)| *width != cols_count) {
        Some((table, width)) => Err(unsupported(table, *width)),
        None => Ok(()),
    }
}

fn validate_references(
    cells: &[CellDescriptor],
    table_meta: &BTreeMap<String, TableMeta>,
) -> Result<(), TemplateError> {
    for cell in cells {
        for op in [&cell.avg_op, &cell.cohort_avg_op].into_iter().flatten() {
            if let Normalizer::Reference(reference) = op {
                if !table_meta.contains_key(reference) {
                    return Err(TemplateError::UnknownReference {
                        table: cell.table.clone(),
                        reference: reference.clone(),
                    });
                }
            }
        }
    }
    Ok(())
}

/// First occurrence of each table carrying regression pairs; every pair must
/// name a cell that exists in that table
fn regression_tables(
    cells: &[CellDescriptor],
) -> Result<Vec<RegressionTable>, TemplateError> {
    let mut seen = BTreeSet::new();
    let mut regressions = Vec::new();
    let mut offset = 0;

    for cell in cells {
        if cell.lin_pairs.is_empty() || !seen.insert(cell.table.as_str()) {
            continue;
        }
        let present: BTreeSet<(&str, &str)> = cells
            .iter()
            .filter(|c| c.table == cell.table)
            .map(|c| (c.row.as_str(), c.col.as_str()))
            .collect();
        for pair in &cell.lin_pairs {
            for end in [&pair.independent, &pair.dependent] {
                if !present.contains(&(end.row.as_str(), end.col.as_str())) {
                    return Err(TemplateError::UnknownCell {
                        table: cell.table.clone(),
                        row: end.row.clone(),
                        col: end.col.clone(),
                    });
                }
            }
        }
        regressions.push(RegressionTable {
            table: cell.table.clone(),
            pairs: cell.lin_pairs.clone(),
            product_offset: offset,
        });
        offset += cell.lin_pairs.len();
    }
    Ok(regressions)
}

/// Depth-first over panels, preserving declaration order
fn collect_questions(
    elements: &[Element],
    out: &mut Vec<QuestionDescriptor>,
) -> Result<(), TemplateError> {
    for element in elements {
        let (id, title, kind) = match element {
            Element::Panel { elements } => {
                collect_questions(elements, out)?;
                continue;
            }
            Element::Radiogroup {
                name,
                title,
                choices,
            } => (
                name,
                title,
                QuestionKind::SingleChoice {
                    options: choices.iter().map(|c| c.text.clone()).collect(),
                },
            ),
            Element::Checkbox {
                name,
                title,
                choices,
            } => (
                name,
                title,
                QuestionKind::MultiChoice {
                    options: choices.iter().map(|c| c.text.clone()).collect(),
                },
            ),
            Element::Text { name, title } => (name, title, QuestionKind::Text),
            Element::Multipletext { name, title, items } => (
                name,
                title,
                QuestionKind::MultiText {
                    fields: items.iter().map(|i| i.name.clone()).collect(),
                },
            ),
            Element::Matrixdropdown {
                name,
                title,
                columns,
                rows,
            } => {
                let scale = columns
                    .first()
                    .ok_or_else(|| TemplateError::MissingQuestionField {
                        question: name.clone(),
                        field: "columns",
                    })?;
                (
                    name,
                    title,
                    QuestionKind::Matrix {
                        rows: rows.iter().map(|r| r.text.clone()).collect(),
                        columns: scale.choices.iter().map(|c| c.text.clone()).collect(),
                    },
                )
            }
        };
        out.push(QuestionDescriptor {
            id: id.clone(),
            title: title.clone(),
            kind,
        });
    }
    Ok(())
}
