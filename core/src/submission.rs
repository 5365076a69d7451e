//! Submitter-side encoding of plaintext answers into the slot layout.
//!
//! Runs before sharing: the vector produced here is what a submitter splits
//! into shares, so it must follow the ordering exactly.

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

use crate::error::SubmissionError;
use crate::ordering::{ConsistentOrdering, QuestionDescriptor, QuestionKind};

/// Scale applied to derived ratio cells before truncation
pub const RATIO_SCALE: i64 = 1000;

/// Largest magnitude of any encoded slot, squares and products included
pub const MAX_SLOT_MAGNITUDE: i64 = 1 << 44;

/// Most contributions one opened sum may carry. With every slot bounded by
/// [`MAX_SLOT_MAGNITUDE`] the sum stays inside the sharing field's signed
/// range.
pub const MAX_CONTRIBUTIONS: usize = (1 << 16) - 1;

/// `table → row → col → value`
pub type TableValues = BTreeMap<String, BTreeMap<String, BTreeMap<String, i64>>>;

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Submission {
    #[serde(default)]
    pub tables: TableValues,
    #[serde(default)]
    pub questions: BTreeMap<String, Answer>,
    #[serde(default)]
    pub usability: BTreeMap<String, UsabilityValue>,
}

/// A survey answer as entered. Choice indexes are 1-based.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum Answer {
    /// Single choice, or a numeric text answer
    Index(usize),
    /// Multiple choice, or one column per matrix row
    Indices(Vec<usize>),
    Text(String),
    /// Multi-field text
    Fields(BTreeMap<String, i64>),
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum UsabilityValue {
    Number(i64),
    Fields(BTreeMap<String, i64>),
}

/// Lay `submission` out as `[values][squares][linProducts][questionAnswers][usabilityMetrics]`
pub fn encode_submission(
    ordering: &ConsistentOrdering,
    submission: &Submission,
) -> Result<Vec<i64>, SubmissionError> {
    let mut encoded = Vec::with_capacity(ordering.total_slots());

    let values = ordering
        .cells
        .iter()
        .map(|cell| cell_value(ordering, submission, &cell.table, &cell.row, &cell.col))
        .collect::<Result<Vec<_>, _>>()?;

    let squares = ordering
        .cells
        .iter()
        .zip(&values)
        .map(|(cell, v)| {
            v.checked_mul(*v).ok_or_else(|| SubmissionError::Overflow {
                what: format!("square of {} ({}, {})", cell.table, cell.row, cell.col),
            })
        })
        .collect::<Result<Vec<_>, _>>()?;

    encoded.extend(values);
    encoded.extend(squares);

    for regression in &ordering.regressions {
        for pair in &regression.pairs {
            let (x, y) = (&pair.independent, &pair.dependent);
            let x_value = cell_value(ordering, submission, &regression.table, &x.row, &x.col)?;
            let y_value = cell_value(ordering, submission, &regression.table, &y.row, &y.col)?;
            let product = x_value
                .checked_mul(y_value)
                .ok_or_else(|| SubmissionError::Overflow {
                    what: format!("product in {}", regression.table),
                })?;
            encoded.push(product);
        }
    }

    for question in &ordering.questions {
        encoded.extend(encode_answer(question, submission.questions.get(&question.id))?);
    }

    for descriptor in &ordering.usability {
        let value = match submission.usability.get(&descriptor.metric) {
            Some(UsabilityValue::Number(n)) if descriptor.field.is_empty() => *n,
            Some(UsabilityValue::Fields(fields)) => {
                fields.get(&descriptor.field).copied().unwrap_or(0)
            }
            _ => 0,
        };
        encoded.push(value);
    }

    if let Some((slot, &value)) = encoded
        .iter()
        .enumerate()
        .find(|(_, v)| v.unsigned_abs() > MAX_SLOT_MAGNITUDE.unsigned_abs())
    {
        return Err(SubmissionError::OutOfRange {
            slot,
            value,
            max: MAX_SLOT_MAGNITUDE,
        });
    }
    Ok(encoded)
}

fn lookup(submission: &Submission, table: &str, row: &str, col: &str) -> Option<i64> {
    submission.tables.get(table)?.get(row)?.get(col).copied()
}

/// Entered value of a cell. Ratio cells not entered directly are derived
/// from their two source tables, scaled and truncated.
fn cell_value(
    ordering: &ConsistentOrdering,
    submission: &Submission,
    table: &str,
    row: &str,
    col: &str,
) -> Result<i64, SubmissionError> {
    if submission.tables.contains_key(table) {
        return Ok(lookup(submission, table, row, col).unwrap_or(0));
    }
    let Some(ratio) = ordering.ratios.iter().find(|r| r.name == table) else {
        return Ok(0);
    };

    let numerator = lookup(submission, &ratio.numerator, row, col).unwrap_or(0);
    let denominator = lookup(submission, &ratio.denominator, row, col).unwrap_or(0);
    if denominator == 0 {
        return Ok(0);
    }
    let scaled = numerator
        .checked_mul(RATIO_SCALE)
        .ok_or_else(|| SubmissionError::Overflow {
            what: format!("ratio {table} ({row}, {col})"),
        })?;
    Ok(scaled / denominator)
}

fn encode_answer(
    question: &QuestionDescriptor,
    answer: Option<&Answer>,
) -> Result<Vec<i64>, SubmissionError> {
    let mut slots = vec![0; question.kind.slot_count()];
    let Some(answer) = answer else {
        return Ok(slots);
    };
    let wrong_shape = || SubmissionError::AnswerShape {
        question: question.id.clone(),
        expected: question.kind.name(),
    };

    match (&question.kind, answer) {
        (QuestionKind::SingleChoice { options }, Answer::Index(choice))
        | (QuestionKind::MultiChoice { options }, Answer::Index(choice)) => {
            mark(&mut slots, 0, &question.id, *choice, options.len())?;
        }
        (QuestionKind::MultiChoice { options }, Answer::Indices(choices)) => {
            for &choice in choices {
                mark(&mut slots, 0, &question.id, choice, options.len())?;
            }
        }
        (QuestionKind::Text, Answer::Text(text)) => {
            slots[0] = i64::from(!text.trim().is_empty());
        }
        (QuestionKind::Text, Answer::Index(number)) => {
            slots[0] = i64::try_from(*number).map_err(|_| SubmissionError::Overflow {
                what: format!("answer to {}", question.id),
            })?;
        }
        (QuestionKind::MultiText { fields }, Answer::Fields(entered)) => {
            for (slot, field) in slots.iter_mut().zip(fields) {
                *slot = entered.get(field).copied().unwrap_or(0);
            }
        }
        (QuestionKind::Matrix { rows, columns }, Answer::Indices(choices)) => {
            if choices.len() > rows.len() {
                return Err(wrong_shape());
            }
            for (row, &choice) in choices.iter().enumerate() {
                // 0 leaves the row unanswered
                if choice != 0 {
                    mark(&mut slots, row * columns.len(), &question.id, choice, columns.len())?;
                }
            }
        }
        _ => return Err(wrong_shape()),
    }
    Ok(slots)
}

/// Set the one-hot slot for a 1-based `choice` among `options`
fn mark(
    slots: &mut [i64],
    base: usize,
    question: &str,
    choice: usize,
    options: usize,
) -> Result<(), SubmissionError> {
    if choice == 0 || choice > options {
        return Err(SubmissionError::AnswerOutOfRange {
            question: question.to_string(),
            answer: choice,
            options,
        });
    }
    slots[base + choice - 1] = 1;
    Ok(())
}
