//! Statistics Formatter
//!
//! Turns opened plaintext sums into the report handed to the presentation
//! layer. Pure: everything it reads has already been revealed. A sum that is
//! short or missing is an error, never a zero.
//!
//! ```text
//!   values[scope] ──┬── mean ─────► averages    scope → table → row → col
//!   squares[scope] ─┴── stddev ───► deviations  scope → table → row → col
//!   products ────────── lsq ──────► linear_regressions  table → [entry]
//!   questions ───────────────────► questions   question → option → count
//!   usability ───────────────────► usability   metric → field → value
//! ```

use std::collections::hash_map::Entry;
use std::collections::{BTreeMap, HashMap};

use serde::Serialize;

use crate::accumulator::Scope;
use crate::error::RevealError;
use crate::ordering::{COHORT_SUBGROUPS, ConsistentOrdering, RegressionTable};
use crate::partition::SubmitterPartition;
use crate::reveal::{RevealedSum, SumKind};
use crate::stats::{self, Rounding};
use crate::template::{CellRef, CohortGrouping, Normalizer};

/// `table → row → col → value`
pub type Grid = BTreeMap<String, BTreeMap<String, BTreeMap<String, String>>>;

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct RegressionEntry {
    pub independent: CellRef,
    pub dependent: CellRef,
    pub slope: f64,
    pub intercept: f64,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct FormattedOutput {
    pub averages: BTreeMap<Scope, Grid>,
    pub deviations: BTreeMap<Scope, Grid>,
    pub linear_regressions: BTreeMap<String, Vec<RegressionEntry>>,
    /// Raw opened counts, never normalized
    pub questions: BTreeMap<String, BTreeMap<String, i64>>,
    pub usability: BTreeMap<String, BTreeMap<String, String>>,
    pub has_questions: bool,
    pub has_usability: bool,
    pub cohorts: SubmitterPartition,
}

/// Every plaintext sum of a run, sorted by what it carries
#[derive(Debug, Clone, Default, PartialEq)]
pub struct RevealedSums {
    pub values: BTreeMap<Scope, Vec<i64>>,
    pub squares: BTreeMap<Scope, Vec<i64>>,
    pub products: Vec<i64>,
    pub questions: Vec<i64>,
    pub usability: Vec<i64>,
}

impl RevealedSums {
    pub fn insert(&mut self, sum: RevealedSum) {
        match sum.kind {
            SumKind::Values => {
                self.values.insert(sum.scope, sum.values);
            }
            SumKind::Squares => {
                self.squares.insert(sum.scope, sum.values);
            }
            SumKind::Products => self.products = sum.values,
            SumKind::Questions => self.questions = sum.values,
            SumKind::Usability => self.usability = sum.values,
        }
    }
}

impl Extend<RevealedSum> for RevealedSums {
    fn extend<I: IntoIterator<Item = RevealedSum>>(&mut self, iter: I) {
        for sum in iter {
            self.insert(sum);
        }
    }
}

/// What a slot of a scope's values vector means
struct SlotView<'o> {
    table: &'o str,
    row: &'o str,
    col: &'o str,
    avg: Option<&'o Normalizer>,
    std: bool,
}

pub struct StatisticsFormatter<'a> {
    ordering: &'a ConsistentOrdering,
    partition: &'a SubmitterPartition,
    sums: &'a RevealedSums,
    /// First flattened cell of each (pseudo-)table
    offsets: HashMap<&'a str, usize>,
    /// Slot positions of each regression pair, resolved once per table
    positions: HashMap<String, Vec<(usize, usize)>>,
}

impl<'a> StatisticsFormatter<'a> {
    pub fn new(
        ordering: &'a ConsistentOrdering,
        partition: &'a SubmitterPartition,
        sums: &'a RevealedSums,
    ) -> Self {
        let mut offsets = HashMap::new();
        for (i, cell) in ordering.cells.iter().enumerate() {
            offsets.entry(cell.table.as_str()).or_insert(i);
        }
        Self {
            ordering,
            partition,
            sums,
            offsets,
            positions: HashMap::new(),
        }
    }

    fn submitters(&self, scope: &Scope) -> usize {
        match scope {
            Scope::All => self.partition.submitter_count(),
            Scope::Cohort(id) => self.partition.members(id).len(),
        }
    }

    fn labels(&self) -> Option<&'a [String]> {
        let ordering: &'a ConsistentOrdering = self.ordering;
        match &ordering.grouping {
            CohortGrouping::Labels(labels) => Some(labels),
            CohortGrouping::All => None,
        }
    }

    fn slot(&self, scope: &Scope, index: usize) -> Option<SlotView<'a>> {
        let ordering: &'a ConsistentOrdering = self.ordering;
        let cells = &ordering.cells;
        match (scope, self.labels()) {
            (Scope::All, _) => cells.get(index).map(|cell| SlotView {
                table: &cell.table,
                row: &cell.row,
                col: &cell.col,
                avg: cell.avg_op.as_ref(),
                std: cell.std_op,
            }),
            (Scope::Cohort(_), None) => cells.get(index).map(|cell| SlotView {
                table: &cell.table,
                row: &cell.row,
                col: &cell.col,
                avg: cell.cohort_avg_op.as_ref(),
                std: cell.cohort_std_op,
            }),
            (Scope::Cohort(_), Some(labels)) => {
                let row = index / COHORT_SUBGROUPS;
                let cell = cells.get(row * self.ordering.cols_count)?;
                Some(SlotView {
                    table: &cell.table,
                    row: &cell.row,
                    col: labels.get(index % COHORT_SUBGROUPS)?,
                    avg: cell.cohort_avg_op.as_ref(),
                    std: cell.cohort_std_op,
                })
            }
        }
    }

    /// Where `table` starts in a scope's values vector
    fn table_offset(&self, scope: &Scope, table: &str) -> Option<usize> {
        let offset = *self.offsets.get(table)?;
        Some(match (scope, self.labels()) {
            (Scope::Cohort(_), Some(_)) => offset / self.ordering.cols_count * COHORT_SUBGROUPS,
            _ => offset,
        })
    }

    /// Slots a scope's values and squares must carry
    fn expected_slots(&self, scope: &Scope) -> usize {
        match scope {
            Scope::Cohort(_) => self.ordering.cohort_slots(),
            Scope::All => self.ordering.cells.len(),
        }
    }

    /// Mean of slot `index` in `scope`, two decimals.
    ///
    /// Cells without an average operator report the raw sum.
    pub fn mean(&self, scope: &Scope, index: usize) -> Result<String, RevealError> {
        let values = self
            .sums
            .values
            .get(scope)
            .ok_or_else(|| missing(scope, SumKind::Values, index))?;
        let sum = opened(&self.sums.values, scope, SumKind::Values, index)?;
        let slot = self
            .slot(scope, index)
            .ok_or_else(|| missing(scope, SumKind::Values, index))?;

        let formatted = match slot.avg {
            None => stats::fixed2(sum as f64, Rounding::Nearest),
            Some(Normalizer::SelfNormalizing) => stats::fixed2(
                stats::mean(sum, self.submitters(scope) as f64),
                Rounding::Nearest,
            ),
            Some(Normalizer::Reference(reference)) => {
                let divisor = self.reference_sum(scope, values, slot.table, reference, index)?;
                stats::fixed2(stats::mean(sum, divisor as f64), Rounding::Truncate)
            }
        };
        Ok(formatted)
    }

    /// Opened sum of the reference cell matching `index`, wrapping over the
    /// reference table's own width
    fn reference_sum(
        &self,
        scope: &Scope,
        values: &[i64],
        table: &str,
        reference: &str,
        index: usize,
    ) -> Result<i64, RevealError> {
        let meta = self
            .ordering
            .table_meta
            .get(reference)
            .ok_or_else(|| missing(scope, SumKind::Values, index))?;
        let width = match scope {
            Scope::All => meta.total,
            Scope::Cohort(_) => meta.cohort,
        };
        if width == 0 {
            return Ok(0);
        }
        let position = match (
            self.table_offset(scope, table),
            self.table_offset(scope, reference),
        ) {
            (Some(own), Some(start)) if index >= own => start + (index - own) % width,
            _ => return Err(missing(scope, SumKind::Values, index)),
        };
        values
            .get(position)
            .copied()
            .ok_or_else(|| missing(scope, SumKind::Values, position))
    }

    /// Population deviation of slot `index`, only where requested
    pub fn stddev(&self, scope: &Scope, index: usize) -> Result<Option<String>, RevealError> {
        let slot = self
            .slot(scope, index)
            .ok_or_else(|| missing(scope, SumKind::Values, index))?;
        if !slot.std {
            return Ok(None);
        }
        let sum = opened(&self.sums.values, scope, SumKind::Values, index)?;
        let sum_sq = opened(&self.sums.squares, scope, SumKind::Squares, index)?;
        let deviation = stats::population_stddev(sum, sum_sq, self.submitters(scope));
        Ok(Some(stats::fixed2(deviation, Rounding::Nearest)))
    }

    /// Least-squares fits for every pair declared on `table`, over the whole
    /// population
    pub fn regression(&mut self, table: &str) -> Result<Vec<RegressionEntry>, RevealError> {
        let ordering = self.ordering;
        let Some(declared) = ordering.regressions.iter().find(|r| r.table == table) else {
            return Ok(Vec::new());
        };
        let positions = match self.positions.entry(table.to_string()) {
            Entry::Occupied(entry) => entry.into_mut(),
            Entry::Vacant(entry) => entry.insert(resolve_positions(ordering, declared)?),
        };

        let sums = self.sums;
        let n = self.partition.submitter_count();
        let all = Scope::All;

        declared
            .pairs
            .iter()
            .zip(positions.iter())
            .enumerate()
            .map(|(k, (pair, &(x, y)))| -> Result<RegressionEntry, RevealError> {
                let product = declared.product_offset + k;
                let sum_xy = sums
                    .products
                    .get(product)
                    .copied()
                    .ok_or_else(|| missing(&all, SumKind::Products, product))?;
                let fit = stats::least_squares(
                    n,
                    opened(&sums.values, &all, SumKind::Values, x)?,
                    opened(&sums.values, &all, SumKind::Values, y)?,
                    sum_xy,
                    opened(&sums.squares, &all, SumKind::Squares, x)?,
                );
                Ok(RegressionEntry {
                    independent: pair.independent.clone(),
                    dependent: pair.dependent.clone(),
                    slope: fit.slope,
                    intercept: fit.intercept,
                })
            })
            .collect()
    }

    /// Every opened vector must match the ordering before anything is read
    fn check_lengths(&self) -> Result<(), RevealError> {
        let ordering = self.ordering;
        let sums = self.sums;
        let scoped_sums = [
            (SumKind::Values, &sums.values),
            (SumKind::Squares, &sums.squares),
        ];
        for (kind, scoped) in scoped_sums {
            for (scope, vector) in scoped {
                check_length(scope, kind, self.expected_slots(scope), vector.len())?;
            }
        }
        check_length(
            &Scope::All,
            SumKind::Products,
            ordering.lin_product_count(),
            sums.products.len(),
        )?;
        check_length(
            &Scope::All,
            SumKind::Questions,
            ordering.question_slot_count(),
            sums.questions.len(),
        )?;
        check_length(
            &Scope::All,
            SumKind::Usability,
            ordering.usability.len(),
            sums.usability.len(),
        )
    }

    pub fn tabulate(mut self) -> Result<FormattedOutput, RevealError> {
        self.check_lengths()?;
        let ordering = self.ordering;
        let sums = self.sums;

        let mut averages = BTreeMap::new();
        let mut deviations = BTreeMap::new();
        for (scope, values) in &sums.values {
            let mut means = Grid::new();
            let mut spreads = Grid::new();
            for index in 0..values.len() {
                let slot = self
                    .slot(scope, index)
                    .ok_or_else(|| missing(scope, SumKind::Values, index))?;
                place(&mut means, &slot, self.mean(scope, index)?);
                if let Some(deviation) = self.stddev(scope, index)? {
                    place(&mut spreads, &slot, deviation);
                }
            }
            averages.insert(scope.clone(), means);
            if !spreads.is_empty() {
                deviations.insert(scope.clone(), spreads);
            }
        }

        let mut linear_regressions = BTreeMap::new();
        for declared in &ordering.regressions {
            let entries = self.regression(&declared.table)?;
            linear_regressions.insert(declared.table.clone(), entries);
        }

        let mut questions = BTreeMap::new();
        let mut offset = 0;
        for question in &ordering.questions {
            let mut counts = BTreeMap::new();
            for (k, label) in question.kind.slot_labels().into_iter().enumerate() {
                let count = sums
                    .questions
                    .get(offset + k)
                    .copied()
                    .ok_or_else(|| missing(&Scope::All, SumKind::Questions, offset + k))?;
                counts.insert(label, count);
            }
            offset += question.kind.slot_count();
            questions.insert(question.id.clone(), counts);
        }

        // lengths were checked, so the zip covers every descriptor
        let mut usability: BTreeMap<String, BTreeMap<String, String>> = BTreeMap::new();
        for (descriptor, value) in ordering.usability.iter().zip(&sums.usability) {
            usability
                .entry(descriptor.metric.clone())
                .or_default()
                .insert(descriptor.field.clone(), value.to_string());
        }

        Ok(FormattedOutput {
            averages,
            deviations,
            linear_regressions,
            questions,
            usability,
            has_questions: !ordering.questions.is_empty(),
            has_usability: !ordering.usability.is_empty(),
            cohorts: self.partition.clone(),
        })
    }
}

fn missing(scope: &Scope, kind: SumKind, index: usize) -> RevealError {
    RevealError::MissingSlot {
        scope: scope.clone(),
        sum: kind.as_str(),
        index,
    }
}

fn opened(
    sums: &BTreeMap<Scope, Vec<i64>>,
    scope: &Scope,
    kind: SumKind,
    index: usize,
) -> Result<i64, RevealError> {
    sums.get(scope)
        .and_then(|values| values.get(index))
        .copied()
        .ok_or_else(|| missing(scope, kind, index))
}

fn check_length(
    scope: &Scope,
    kind: SumKind,
    expected: usize,
    got: usize,
) -> Result<(), RevealError> {
    if expected == got {
        return Ok(());
    }
    Err(RevealError::Malformed {
        scope: scope.clone(),
        sum: kind.as_str(),
        expected,
        got,
    })
}

fn place(grid: &mut Grid, slot: &SlotView<'_>, value: String) {
    grid.entry(slot.table.to_string())
        .or_default()
        .entry(slot.row.to_string())
        .or_default()
        .insert(slot.col.to_string(), value);
}

/// Value slots of each regression pair of `declared`
fn resolve_positions(
    ordering: &ConsistentOrdering,
    declared: &RegressionTable,
) -> Result<Vec<(usize, usize)>, RevealError> {
    let find = |cell: &CellRef| {
        ordering
            .cells
            .iter()
            .position(|c| c.table == declared.table && c.row == cell.row && c.col == cell.col)
    };
    declared
        .pairs
        .iter()
        .enumerate()
        .map(|(k, pair)| {
            find(&pair.independent)
                .zip(find(&pair.dependent))
                .ok_or_else(|| missing(&Scope::All, SumKind::Products, declared.product_offset + k))
        })
        .collect()
}
