//! Error taxonomy for a run. Every variant is fatal to the whole run.

use tally_sharing::{PartyId, SharingError};
use thiserror::Error;

use crate::accumulator::{CohortId, Scope};

/// Template could not be turned into a consistent ordering
#[derive(Debug, Error)]
pub enum TemplateError {
    #[error("template is not valid JSON for the survey schema: {0}")]
    Parse(#[from] serde_json::Error),

    #[error("table `{table}` is missing {field}")]
    MissingField { table: String, field: &'static str },

    #[error("question `{question}` is missing {field}")]
    MissingQuestionField {
        question: String,
        field: &'static str,
    },

    #[error("ratio references table index {index}, template has {tables}")]
    UnknownRatioTable { index: usize, tables: usize },

    #[error("table `{table}` normalizes by unknown table `{reference}`")]
    UnknownReference { table: String, reference: String },

    #[error("table `{table}` regresses on unknown cell ({row}, {col})")]
    UnknownCell {
        table: String,
        row: String,
        col: String,
    },

    #[error("grouping into {labels} labels is not supported for `{table}` with {cols} columns")]
    UnsupportedGrouping {
        table: String,
        labels: usize,
        cols: usize,
    },
}

/// A party's share vector does not match the ordering's layout
#[derive(Debug, Error)]
#[error("party {party} returned {got} shares, layout expects {expected}")]
pub struct ShareProtocolError {
    pub party: PartyId,
    pub expected: usize,
    pub got: usize,
}

/// An open resolved without a usable payload
#[derive(Debug, Error)]
pub enum RevealError {
    #[error("open of {sum} for scope {scope} resolved with no payload")]
    NullPayload { scope: Scope, sum: &'static str },

    #[error("open of {sum} for scope {scope} returned {got} values, expected {expected}")]
    Malformed {
        scope: Scope,
        sum: &'static str,
        expected: usize,
        got: usize,
    },

    #[error("opened {sum} for scope {scope} has no slot {index}")]
    MissingSlot {
        scope: Scope,
        sum: &'static str,
        index: usize,
    },
}

/// Plaintext submission does not fit the ordering
#[derive(Debug, Error)]
pub enum SubmissionError {
    #[error("answer {answer} to question `{question}` is outside 1..={options}")]
    AnswerOutOfRange {
        question: String,
        answer: usize,
        options: usize,
    },

    #[error("answer to question `{question}` has the wrong shape for a {expected} question")]
    AnswerShape {
        question: String,
        expected: &'static str,
    },

    #[error("value overflow while encoding {what}")]
    Overflow { what: String },

    #[error("slot {slot} holds {value}, outside ±{max}")]
    OutOfRange { slot: usize, value: i64, max: i64 },
}

/// Submitter partition cannot be reported without ambiguity
#[derive(Debug, Error)]
pub enum PartitionError {
    #[error("cohort id `{0}` is reserved for the whole population")]
    ReservedCohort(CohortId),
}

#[derive(Debug, Error)]
pub enum EngineError {
    #[error(transparent)]
    Template(#[from] TemplateError),

    #[error(transparent)]
    ShareProtocol(#[from] ShareProtocolError),

    #[error(transparent)]
    Reveal(#[from] RevealError),

    #[error(transparent)]
    Submission(#[from] SubmissionError),

    #[error(transparent)]
    Partition(#[from] PartitionError),

    #[error("sharing backend: {0}")]
    Sharing(#[from] SharingError),

    #[error("accumulator for scope {scope} holds {expected} slots, merge brought {got}")]
    AccumulatorLength {
        scope: Scope,
        expected: usize,
        got: usize,
    },

    #[error("no parties submitted")]
    NoSubmitters,

    #[error("{submitters} submitters would overflow the sharing field, at most {max} fit")]
    TooManySubmitters { submitters: usize, max: usize },
}
