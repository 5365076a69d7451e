//! Tally Secret Sharing
//!
//! The secret-sharing boundary consumed by the aggregation engine.
//!
//! # Architecture
//!
//! ```text
//! ┌─────────────────────────────────────────────────────────────────┐
//! │                     Secret-Shared Aggregation                    │
//! │                                                                  │
//! │  1. Submitter              2. Engine               3. Analyst    │
//! │  ┌──────────┐            ┌──────────────┐        ┌──────────┐    │
//! │  │  Split   │──shares──▶ │  add / sub   │──────▶ │  Open    │    │
//! │  │  K-of-N  │            │  (blind)     │ after  │  (K-of-N)│    │
//! │  └──────────┘            └──────────────┘  sum   └──────────┘    │
//! │                                                                  │
//! │  • Only finished sums are ever opened                            │
//! │  • Opens are directed at named receiving parties only            │
//! └─────────────────────────────────────────────────────────────────┘
//! ```
//!
//! [`SharingBackend`] is the seam. [`LocalCommittee`] is an in-process
//! Shamir committee over GF(2^61 - 1); [`PlainBackend`] keeps plaintext
//! integers as stand-in shares for tests and dry runs.

pub mod backend;
pub mod committee;
pub mod field;
pub mod plain;
pub mod shares;

pub use backend::{PartyId, RevealHandle, Revealed, SharingBackend};
pub use committee::{CommitteeConfig, LocalCommittee, SharedValue};
pub use field::{Fp, MAX_PLAINTEXT};
pub use plain::PlainBackend;
pub use shares::{Share, ShareId, SharingError, combine_shares, split_secret};
