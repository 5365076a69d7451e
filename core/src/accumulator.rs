//! Cohort Accumulator
//!
//! Homomorphic running sums keyed by an explicit [`Scope`]. The map is owned
//! by one run and threaded through it; nothing here is global.

use std::collections::BTreeMap;
use std::fmt;

use serde::Serialize;
use tally_sharing::SharingBackend;

use crate::error::EngineError;
use crate::ordering::{COHORT_SUBGROUPS, ConsistentOrdering};

pub type CohortId = String;

/// Population a running sum covers
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize)]
#[serde(into = "String")]
pub enum Scope {
    All,
    Cohort(CohortId),
}

impl Scope {
    pub fn key(&self) -> &str {
        match self {
            Scope::All => "all",
            Scope::Cohort(id) => id,
        }
    }
}

impl fmt::Display for Scope {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.key())
    }
}

impl From<Scope> for String {
    fn from(scope: Scope) -> Self {
        scope.key().to_string()
    }
}

/// Running sums for one segment kind, one accumulator per scope
pub struct ScopedSums<S> {
    scopes: BTreeMap<Scope, Vec<S>>,
}

impl<S> Default for ScopedSums<S> {
    fn default() -> Self {
        Self {
            scopes: BTreeMap::new(),
        }
    }
}

impl<S: Clone> ScopedSums<S> {
    pub fn new() -> Self {
        Self::default()
    }

    /// Elementwise secret addition into `scope`.
    ///
    /// The first merge clones `vector`; afterwards the length is fixed and
    /// index `i` keeps its meaning across every merge.
    pub fn accumulate<B>(
        &mut self,
        backend: &B,
        scope: &Scope,
        vector: &[S],
    ) -> Result<(), EngineError>
    where
        B: SharingBackend<Secret = S>,
    {
        let Some(sums) = self.scopes.get_mut(scope) else {
            self.scopes.insert(scope.clone(), vector.to_vec());
            return Ok(());
        };

        if sums.len() != vector.len() {
            return Err(EngineError::AccumulatorLength {
                scope: scope.clone(),
                expected: sums.len(),
                got: vector.len(),
            });
        }
        for (sum, share) in sums.iter_mut().zip(vector) {
            *sum = backend.add(sum, share)?;
        }
        Ok(())
    }

    /// Fold raw cell slots onto the coarse cohort buckets, then accumulate.
    ///
    /// Slot `i` lands in bucket `2·row + (col mod 2)` with `row = i / cols`
    /// and `col = i mod cols`: two sub-groups per row.
    pub fn accumulate_cohort<B>(
        &mut self,
        backend: &B,
        scope: &Scope,
        vector: &[S],
        ordering: &ConsistentOrdering,
    ) -> Result<(), EngineError>
    where
        B: SharingBackend<Secret = S>,
    {
        let cols = ordering.cols_count;
        let mut buckets: Vec<Option<S>> = vec![None; ordering.cohort_slots()];

        for (i, share) in vector.iter().enumerate() {
            let row = i / cols;
            let index = COHORT_SUBGROUPS * row + (i % cols) % COHORT_SUBGROUPS;
            let slot = buckets
                .get_mut(index)
                .ok_or_else(|| EngineError::AccumulatorLength {
                    scope: scope.clone(),
                    expected: ordering.cohort_slots(),
                    got: index + 1,
                })?;
            *slot = Some(match slot.take() {
                Some(sum) => backend.add(&sum, share)?,
                None => share.clone(),
            });
        }

        let folded: Vec<S> = buckets.into_iter().collect::<Option<_>>().ok_or(
            EngineError::AccumulatorLength {
                scope: scope.clone(),
                expected: ordering.cohort_slots(),
                got: vector.len(),
            },
        )?;
        self.accumulate(backend, scope, &folded)
    }

    pub fn get(&self, scope: &Scope) -> Option<&[S]> {
        self.scopes.get(scope).map(Vec::as_slice)
    }

    /// Hand a finished accumulator over for reveal
    pub fn take(&mut self, scope: &Scope) -> Option<Vec<S>> {
        self.scopes.remove(scope)
    }
}

/// All running sums of one run.
///
/// Values and squares are kept per scope; products, question answers and
/// usability metrics only exist for the whole population.
pub struct RunSums<S> {
    pub values: ScopedSums<S>,
    pub squares: ScopedSums<S>,
    pub products: ScopedSums<S>,
    pub questions: ScopedSums<S>,
    pub usability: ScopedSums<S>,
}

impl<S: Clone> Default for RunSums<S> {
    fn default() -> Self {
        Self {
            values: ScopedSums::new(),
            squares: ScopedSums::new(),
            products: ScopedSums::new(),
            questions: ScopedSums::new(),
            usability: ScopedSums::new(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::fixtures::FIXTURE;
    use crate::ordering::order;
    use crate::template::Template;
    use tally_sharing::PlainBackend;

    fn sum_in_order(order: &[usize], vectors: &[Vec<i64>]) -> Vec<i64> {
        let backend = PlainBackend::new();
        let mut sums = ScopedSums::new();
        for &i in order {
            sums.accumulate(&backend, &Scope::All, &vectors[i]).unwrap();
        }
        sums.take(&Scope::All).unwrap()
    }

    #[test]
    fn test_accumulation_is_order_independent() {
        let vectors = vec![vec![1, 5, -2, 8], vec![3, 0, 4, 1], vec![10, 2, 2, -7]];
        let expected = vec![14, 7, 4, 2];

        for permutation in [
            [0, 1, 2],
            [0, 2, 1],
            [1, 0, 2],
            [1, 2, 0],
            [2, 0, 1],
            [2, 1, 0],
        ] {
            assert_eq!(sum_in_order(&permutation, &vectors), expected);
        }
    }

    #[test]
    fn test_length_fixed_after_first_merge() {
        let backend = PlainBackend::new();
        let mut sums = ScopedSums::new();
        sums.accumulate(&backend, &Scope::All, &[1, 2, 3]).unwrap();

        let err = sums.accumulate(&backend, &Scope::All, &[1, 2]).unwrap_err();
        assert!(matches!(
            err,
            EngineError::AccumulatorLength {
                expected: 3,
                got: 2,
                ..
            }
        ));
    }

    #[test]
    fn test_scopes_are_independent() {
        let backend = PlainBackend::new();
        let mut sums = ScopedSums::new();
        let cohort = Scope::Cohort("1".into());

        sums.accumulate(&backend, &Scope::All, &[1, 1]).unwrap();
        sums.accumulate(&backend, &cohort, &[5, 5]).unwrap();
        sums.accumulate(&backend, &Scope::All, &[2, 2]).unwrap();

        assert_eq!(sums.get(&Scope::All), Some(&[3, 3][..]));
        assert_eq!(sums.get(&cohort), Some(&[5, 5][..]));
    }

    #[test]
    fn test_cohort_buckets_collapse_columns() {
        let json = FIXTURE.replace(
            r#""cohort_group_by": "ALL""#,
            r#""cohort_group_by": ["Female", "Male"]"#,
        );
        let ordering = order(&Template::from_json(&json).unwrap()).unwrap();
        assert_eq!(ordering.cols_count, 2);

        let backend = PlainBackend::new();
        let mut sums = ScopedSums::new();
        let scope = Scope::Cohort("1".into());
        let values: Vec<i64> = (1..=12).collect();

        sums.accumulate_cohort(&backend, &scope, &values, &ordering).unwrap();
        sums.accumulate_cohort(&backend, &scope, &values, &ordering).unwrap();

        // two columns per row: buckets line up with the raw slots
        let expected: Vec<i64> = values.iter().map(|v| v * 2).collect();
        assert_eq!(sums.get(&scope).unwrap(), expected.as_slice());
    }

    #[test]
    fn test_cohort_buckets_fold_by_column_parity() {
        let json = r#"{
            "tables": [{
                "name": "Pay",
                "rows": [{"key": "a"}, {"key": "b"}],
                "cols": [[{"key": "c1"}, {"key": "c2"}, {"key": "c3"}, {"key": "c4"}]]
            }],
            "cohort_group_by": ["F", "M"]
        }"#;
        let ordering = order(&Template::from_json(json).unwrap()).unwrap();
        assert_eq!(ordering.cohort_slots(), 4);

        let backend = PlainBackend::new();
        let mut sums = ScopedSums::new();
        let scope = Scope::Cohort("2".into());
        let values: Vec<i64> = (1..=8).collect();
        sums.accumulate_cohort(&backend, &scope, &values, &ordering).unwrap();

        assert_eq!(sums.get(&scope).unwrap(), &[1 + 3, 2 + 4, 5 + 7, 6 + 8]);
    }

    #[test]
    fn test_scope_keys() {
        assert_eq!(Scope::All.to_string(), "all");
        assert_eq!(Scope::Cohort("7".into()).key(), "7");
        assert!(Scope::All < Scope::Cohort("0".into()));
    }
}
