//! Submitter partition: who is folded into which scope, and in what order.

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};
use tally_sharing::PartyId;

use crate::accumulator::{CohortId, Scope};
use crate::error::PartitionError;

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct SubmitterPartition {
    /// Ungrouped parties, or members of cohorts too small to report
    pub none: Vec<PartyId>,
    /// Reported cohorts, in processing order
    pub cohorts: Vec<CohortId>,
    pub members: BTreeMap<CohortId, Vec<PartyId>>,
    /// Every submitter: `none` first, then cohort by cohort
    pub all: Vec<PartyId>,
}

impl SubmitterPartition {
    /// Build from an explicit split. Cohorts keep the given order.
    pub fn new(
        none: Vec<PartyId>,
        cohorts: Vec<(CohortId, Vec<PartyId>)>,
    ) -> Result<Self, PartitionError> {
        let mut all = none.clone();
        let mut order = Vec::with_capacity(cohorts.len());
        let mut members = BTreeMap::new();
        for (cohort, parties) in cohorts {
            all.extend(parties.iter().copied());
            order.push(cohort.clone());
            members.insert(cohort, parties);
        }
        let partition = Self {
            none,
            cohorts: order,
            members,
            all,
        };
        partition.validate()?;
        Ok(partition)
    }

    /// A cohort keyed like the whole population would collide with it in
    /// the report
    pub fn validate(&self) -> Result<(), PartitionError> {
        let reserved = Scope::All.key();
        match self.cohorts.iter().find(|cohort| cohort.as_str() == reserved) {
            Some(cohort) => Err(PartitionError::ReservedCohort(cohort.clone())),
            None => Ok(()),
        }
    }

    /// Build from per-party cohort assignments in submission order.
    ///
    /// Cohorts with fewer than `min_cohort_size` members are not reported;
    /// their parties join `none` and only count towards `all`. The id `all`
    /// is rejected whatever its size.
    pub fn from_assignments(
        assignments: &[(PartyId, Option<CohortId>)],
        min_cohort_size: usize,
    ) -> Result<Self, PartitionError> {
        let mut none = Vec::new();
        let mut grouped: BTreeMap<CohortId, Vec<PartyId>> = BTreeMap::new();
        for (party, cohort) in assignments {
            match cohort {
                Some(cohort) => grouped.entry(cohort.clone()).or_default().push(*party),
                None => none.push(*party),
            }
        }

        let mut cohorts = Vec::new();
        for (cohort, parties) in grouped {
            if cohort == Scope::All.key() {
                return Err(PartitionError::ReservedCohort(cohort));
            }
            if parties.len() < min_cohort_size {
                none.extend(parties);
            } else {
                cohorts.push((cohort, parties));
            }
        }
        Self::new(none, cohorts)
    }

    pub fn members(&self, cohort: &str) -> &[PartyId] {
        self.members.get(cohort).map(Vec::as_slice).unwrap_or(&[])
    }

    pub fn submitter_count(&self) -> usize {
        self.all.len()
    }
}
