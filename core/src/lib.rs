//! Tally Engine
//!
//! Aggregation and ordering over secret-shared survey submissions.
//!
//! # Architecture
//!
//! ```text
//! ┌─────────────────────────────────────────────────────────────────┐
//! │                          One Run                                 │
//! │                                                                  │
//! │  Template ──order──▶ ConsistentOrdering (slot layout, pure)      │
//! │                              │                                   │
//! │            ┌─────────────────┼──────────────────┐                │
//! │            ▼                 ▼                  ▼                │
//! │     ┌────────────┐   ┌──────────────┐   ┌──────────────┐         │
//! │     │ collect    │──▶│ accumulate   │──▶│ reveal       │         │
//! │     │ per party  │   │ All | Cohort │   │ finished sums│         │
//! │     └────────────┘   └──────────────┘   └──────┬───────┘         │
//! │                                                ▼                 │
//! │                                        StatisticsFormatter       │
//! │                                                │                 │
//! │                                                ▼                 │
//! │                                         FormattedOutput          │
//! └─────────────────────────────────────────────────────────────────┘
//! ```
//!
//! Nothing is opened before its scope is complete, and only sums are opened.
//! A run either yields a full [`FormattedOutput`] or an [`EngineError`].

pub mod accumulator;
pub mod collector;
pub mod engine;
pub mod error;
pub mod format;
pub mod ordering;
pub mod partition;
pub mod reveal;
pub mod stats;
pub mod submission;
pub mod template;

#[cfg(test)]
mod fixtures;

pub use accumulator::{CohortId, RunSums, Scope, ScopedSums};
pub use collector::{PartyShareVector, collect};
pub use engine::run;
pub use error::{
    EngineError, PartitionError, RevealError, ShareProtocolError, SubmissionError, TemplateError,
};
pub use format::{FormattedOutput, RegressionEntry, RevealedSums, StatisticsFormatter};
pub use ordering::{ConsistentOrdering, QuestionKind, order};
pub use partition::SubmitterPartition;
pub use reveal::{Progress, RevealCoordinator, RevealedSum, SumKind};
pub use submission::{
    Answer, MAX_CONTRIBUTIONS, MAX_SLOT_MAGNITUDE, Submission, UsabilityValue, encode_submission,
};
pub use template::Template;
