//! Reveal Coordinator
//!
//! Issues opens for finished accumulators without waiting on them, so later
//! cohorts keep accumulating while earlier reveals are in flight. A phase's
//! outstanding reveals are joined together before anything reads them.

use std::fmt;

use futures::future::{BoxFuture, FutureExt, try_join_all};
use tally_sharing::{PartyId, SharingBackend, SharingError};
use tracing::{debug, error};

use crate::accumulator::Scope;
use crate::error::{EngineError, RevealError};

/// Fraction of the run spent folding party vectors
pub const FOLD_SHARE: f64 = 0.94;
pub const COHORTS_REVEALED: f64 = 0.96;
pub const GLOBALS_REVEALED: f64 = 0.98;
pub const COMPLETE: f64 = 1.0;

/// Which running sum an open carries
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum SumKind {
    Values,
    Squares,
    Products,
    Questions,
    Usability,
}

impl SumKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            SumKind::Values => "values",
            SumKind::Squares => "squares",
            SumKind::Products => "products",
            SumKind::Questions => "questions",
            SumKind::Usability => "usability",
        }
    }
}

impl fmt::Display for SumKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A plaintext sum for one scope
#[derive(Debug, Clone, PartialEq)]
pub struct RevealedSum {
    pub scope: Scope,
    pub kind: SumKind,
    pub values: Vec<i64>,
}

type PendingReveal = BoxFuture<'static, Result<RevealedSum, EngineError>>;

pub struct RevealCoordinator<'a, B> {
    backend: &'a B,
    receivers: Vec<PartyId>,
    pending: Vec<PendingReveal>,
}

impl<'a, B: SharingBackend> RevealCoordinator<'a, B> {
    pub fn new(backend: &'a B, receivers: &[PartyId]) -> Self {
        Self {
            backend,
            receivers: receivers.to_vec(),
            pending: Vec::new(),
        }
    }

    /// Issue the open for a finished accumulator. The accumulator is moved in
    /// and cannot be touched again.
    pub fn open_scope(&mut self, scope: Scope, kind: SumKind, accumulator: Vec<B::Secret>) {
        let expected = accumulator.len();
        debug!(%scope, %kind, len = expected, "issuing open");

        let handle = if accumulator.is_empty() {
            futures::future::ready(Ok::<_, SharingError>(Some(Vec::new()))).boxed()
        } else {
            self.backend.open(&accumulator, &self.receivers)
        };

        let pending = async move {
            let payload = handle.await?;
            let values = validate(&scope, kind, expected, payload)?;
            Ok::<_, EngineError>(RevealedSum {
                scope,
                kind,
                values,
            })
        }
        .boxed();
        self.pending.push(pending);
    }

    pub fn outstanding(&self) -> usize {
        self.pending.len()
    }

    /// Wait for every outstanding reveal of the current phase.
    ///
    /// Fails on the first bad payload; no partial phase is returned.
    pub async fn join(&mut self) -> Result<Vec<RevealedSum>, EngineError> {
        let pending = std::mem::take(&mut self.pending);
        try_join_all(pending).await
    }
}

fn validate(
    scope: &Scope,
    kind: SumKind,
    expected: usize,
    payload: Option<Vec<i64>>,
) -> Result<Vec<i64>, RevealError> {
    let Some(values) = payload else {
        error!(%scope, %kind, "open resolved with no payload");
        return Err(RevealError::NullPayload {
            scope: scope.clone(),
            sum: kind.as_str(),
        });
    };
    if values.len() != expected {
        error!(%scope, %kind, expected, got = values.len(), "open payload malformed");
        return Err(RevealError::Malformed {
            scope: scope.clone(),
            sum: kind.as_str(),
            expected,
            got: values.len(),
        });
    }
    Ok(values)
}

/// Optional progress sink. Reported fractions never decrease.
///
/// Observational only; nothing in the run reads it back.
pub struct Progress<'a> {
    sink: Option<Box<dyn FnMut(f64) + Send + 'a>>,
    last: f64,
}

impl<'a> Progress<'a> {
    pub fn new(sink: impl FnMut(f64) + Send + 'a) -> Self {
        Self {
            sink: Some(Box::new(sink)),
            last: 0.0,
        }
    }

    pub fn silent() -> Self {
        Self {
            sink: None,
            last: 0.0,
        }
    }

    pub fn report(&mut self, fraction: f64) {
        let fraction = fraction.clamp(self.last, COMPLETE);
        self.last = fraction;
        if let Some(sink) = self.sink.as_mut() {
            sink(fraction);
        }
    }

    /// Checkpoint after folding `done` of `total` parties
    pub fn folded(&mut self, done: usize, total: usize) {
        if total > 0 {
            self.report(done as f64 / total as f64 * FOLD_SHARE);
        }
    }

    pub fn last(&self) -> f64 {
        self.last
    }
}

impl Default for Progress<'_> {
    fn default() -> Self {
        Self::silent()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tally_sharing::PlainBackend;

    #[tokio::test]
    async fn test_outstanding_reveals_join_in_issue_order() {
        let backend = PlainBackend::new();
        let mut coordinator = RevealCoordinator::new(&backend, &[1]);

        coordinator.open_scope(Scope::Cohort("a".into()), SumKind::Values, vec![1, 2]);
        coordinator.open_scope(Scope::Cohort("a".into()), SumKind::Squares, vec![1, 4]);
        coordinator.open_scope(Scope::Cohort("b".into()), SumKind::Values, vec![7, 8]);
        assert_eq!(coordinator.outstanding(), 3);

        let revealed = coordinator.join().await.unwrap();
        assert_eq!(coordinator.outstanding(), 0);
        assert_eq!(revealed.len(), 3);
        assert_eq!(revealed[1].kind, SumKind::Squares);
        assert_eq!(revealed[2].scope, Scope::Cohort("b".into()));
        assert_eq!(revealed[2].values, vec![7, 8]);
    }

    #[tokio::test]
    async fn test_null_payload_is_reveal_error() {
        let backend = PlainBackend::withholding_reveals();
        let mut coordinator = RevealCoordinator::new(&backend, &[1]);
        coordinator.open_scope(Scope::All, SumKind::Values, vec![3]);

        let err = coordinator.join().await.unwrap_err();
        assert!(matches!(
            err,
            EngineError::Reveal(RevealError::NullPayload { .. })
        ));
    }

    #[tokio::test]
    async fn test_empty_accumulator_skips_backend() {
        let backend = PlainBackend::new();
        let mut coordinator = RevealCoordinator::new(&backend, &[1]);
        coordinator.open_scope(Scope::All, SumKind::Products, Vec::new());

        let revealed = coordinator.join().await.unwrap();
        assert!(revealed[0].values.is_empty());
        assert!(backend.opened().is_empty());
    }

    #[test]
    fn test_malformed_payload() {
        let err = validate(&Scope::All, SumKind::Usability, 3, Some(vec![1, 2])).unwrap_err();
        assert!(matches!(
            err,
            RevealError::Malformed {
                expected: 3,
                got: 2,
                ..
            }
        ));
    }

    #[test]
    fn test_progress_never_decreases() {
        let mut seen = Vec::new();
        {
            let mut progress = Progress::new(|f| seen.push(f));
            progress.folded(1, 2);
            progress.report(0.1);
            progress.report(COHORTS_REVEALED);
            progress.report(1.5);
        }
        assert_eq!(seen, vec![0.47, 0.47, COHORTS_REVEALED, COMPLETE]);
    }
}
