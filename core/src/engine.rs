//! Run driver: collect, accumulate, reveal, format.
//!
//! ```text
//!   none ──► fold(all) ─┐
//!   cohort 1 ─► fold(c1, all) ─► open c1 ──┐          (in flight)
//!   cohort 2 ─► fold(c2, all) ─► open c2 ──┤
//!   ...                                   join ─► open all ─► join
//!                                               ─► open questions/usability ─► join
//!                                               ─► tabulate
//! ```
//!
//! Parties are folded one at a time in partition order. A cohort's sums are
//! opened as soon as its last member is folded; the global sums only once
//! every party is in.

use tally_sharing::{PartyId, SharingBackend};
use tracing::{debug, error, info, warn};

use crate::accumulator::{RunSums, Scope};
use crate::collector::{PartyShareVector, collect};
use crate::error::EngineError;
use crate::format::{FormattedOutput, RevealedSums, StatisticsFormatter};
use crate::ordering::{COHORT_SUBGROUPS, ConsistentOrdering};
use crate::partition::SubmitterPartition;
use crate::reveal::{
    COHORTS_REVEALED, COMPLETE, GLOBALS_REVEALED, Progress, RevealCoordinator, SumKind,
};
use crate::submission::MAX_CONTRIBUTIONS;

/// Aggregate every party in `partition` and report the opened statistics.
///
/// All-or-nothing: the first error aborts the run and nothing is returned.
pub async fn run<B: SharingBackend>(
    backend: &B,
    ordering: &ConsistentOrdering,
    partition: &SubmitterPartition,
    receivers: &[PartyId],
    progress: &mut Progress<'_>,
) -> Result<FormattedOutput, EngineError> {
    let total = partition.submitter_count();
    if total == 0 {
        error!("run started without submitters");
        return Err(EngineError::NoSubmitters);
    }
    partition.validate()?;

    // label buckets add several columns of each party into one slot
    let per_party = if ordering.is_grouped() {
        ordering.cols_count.div_ceil(COHORT_SUBGROUPS)
    } else {
        1
    };
    let max = MAX_CONTRIBUTIONS / per_party.max(1);
    if total > max {
        error!(submitters = total, max, "run exceeds the field bound");
        return Err(EngineError::TooManySubmitters {
            submitters: total,
            max,
        });
    }
    info!(
        submitters = total,
        cohorts = partition.cohorts.len(),
        slots = ordering.total_slots(),
        "aggregation started"
    );

    let mut sums = RunSums::default();
    let mut coordinator = RevealCoordinator::new(backend, receivers);
    let mut folded = 0;

    for &party in &partition.none {
        let vector = collect(backend, party, ordering).await?;
        fold_global(backend, &mut sums, &vector)?;
        debug!(party, "folded ungrouped party");

        folded += 1;
        progress.folded(folded, total);
        tokio::task::yield_now().await;
    }

    for cohort in &partition.cohorts {
        let scope = Scope::Cohort(cohort.clone());
        let members = partition.members(cohort);
        if members.is_empty() {
            warn!(%scope, "cohort has no members, skipped");
            continue;
        }

        for &party in members {
            let vector = collect(backend, party, ordering).await?;
            if ordering.is_grouped() {
                sums.values.accumulate_cohort(backend, &scope, &vector.values, ordering)?;
                sums.squares.accumulate_cohort(backend, &scope, &vector.squares, ordering)?;
            } else {
                sums.values.accumulate(backend, &scope, &vector.values)?;
                sums.squares.accumulate(backend, &scope, &vector.squares)?;
            }
            fold_global(backend, &mut sums, &vector)?;
            debug!(party, %scope, "folded cohort member");

            folded += 1;
            progress.folded(folded, total);
            tokio::task::yield_now().await;
        }

        // the cohort is complete; its sums go out while the next one folds
        for (kind, accumulator) in [
            (SumKind::Values, sums.values.take(&scope)),
            (SumKind::Squares, sums.squares.take(&scope)),
        ] {
            if let Some(accumulator) = accumulator {
                coordinator.open_scope(scope.clone(), kind, accumulator);
            }
        }
    }

    let mut revealed = RevealedSums::default();

    let cohort_sums = coordinator.join().await?;
    info!(opened = cohort_sums.len(), "cohort sums revealed");
    revealed.extend(cohort_sums);
    progress.report(COHORTS_REVEALED);

    for (kind, accumulator) in [
        (SumKind::Values, sums.values.take(&Scope::All)),
        (SumKind::Squares, sums.squares.take(&Scope::All)),
        (SumKind::Products, sums.products.take(&Scope::All)),
    ] {
        coordinator.open_scope(Scope::All, kind, accumulator.unwrap_or_default());
    }
    revealed.extend(coordinator.join().await?);
    info!("global sums revealed");
    progress.report(GLOBALS_REVEALED);

    for (kind, accumulator) in [
        (SumKind::Questions, sums.questions.take(&Scope::All)),
        (SumKind::Usability, sums.usability.take(&Scope::All)),
    ] {
        coordinator.open_scope(Scope::All, kind, accumulator.unwrap_or_default());
    }
    revealed.extend(coordinator.join().await?);
    info!("survey answers revealed");
    progress.report(COMPLETE);

    let output = StatisticsFormatter::new(ordering, partition, &revealed).tabulate()?;
    Ok(output)
}

/// Merge every segment of one party into the whole-population sums
fn fold_global<B: SharingBackend>(
    backend: &B,
    sums: &mut RunSums<B::Secret>,
    vector: &PartyShareVector<B::Secret>,
) -> Result<(), EngineError> {
    sums.values.accumulate(backend, &Scope::All, &vector.values)?;
    sums.squares.accumulate(backend, &Scope::All, &vector.squares)?;
    sums.products.accumulate(backend, &Scope::All, &vector.products)?;
    sums.questions.accumulate(backend, &Scope::All, &vector.questions)?;
    sums.usability.accumulate(backend, &Scope::All, &vector.usability)?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::fixtures::FIXTURE;
    use crate::ordering::order;
    use crate::template::Template;
    use tally_sharing::PlainBackend;

    #[tokio::test]
    async fn test_no_submitters() {
        let ordering = order(&Template::from_json(FIXTURE).unwrap()).unwrap();
        let backend = PlainBackend::new();
        let err = run(
            &backend,
            &ordering,
            &SubmitterPartition::default(),
            &[1],
            &mut Progress::silent(),
        )
        .await
        .unwrap_err();
        assert!(matches!(err, EngineError::NoSubmitters));
        assert!(backend.opened().is_empty());
    }

    #[tokio::test]
    async fn test_progress_checkpoints() {
        let ordering = order(&Template::from_json(FIXTURE).unwrap()).unwrap();
        let backend = PlainBackend::new();
        let slots = ordering.total_slots();
        for party in [2, 3] {
            backend.submit(party, vec![1; slots]);
        }
        let partition = SubmitterPartition::new(vec![2, 3], Vec::new()).unwrap();

        let mut seen = Vec::new();
        {
            let mut progress = Progress::new(|f| seen.push(f));
            run(&backend, &ordering, &partition, &[1], &mut progress)
                .await
                .unwrap();
        }
        assert_eq!(seen, vec![0.47, 0.94, 0.96, 0.98, 1.0]);
    }

    #[tokio::test]
    async fn test_submitter_cap() {
        let ordering = order(&Template::from_json(FIXTURE).unwrap()).unwrap();
        let backend = PlainBackend::new();
        let parties: Vec<_> = (2..=MAX_CONTRIBUTIONS as u32 + 2).collect();
        let partition = SubmitterPartition::new(parties, Vec::new()).unwrap();

        let err = run(&backend, &ordering, &partition, &[1], &mut Progress::silent())
            .await
            .unwrap_err();
        assert!(matches!(
            err,
            EngineError::TooManySubmitters { max, .. } if max == MAX_CONTRIBUTIONS
        ));
        assert!(backend.opened().is_empty());
    }

    #[tokio::test]
    async fn test_reserved_cohort_rejected() {
        let ordering = order(&Template::from_json(FIXTURE).unwrap()).unwrap();
        let backend = PlainBackend::new();
        let mut partition = SubmitterPartition::new(vec![2], Vec::new()).unwrap();
        partition.cohorts.push("all".into());

        let err = run(&backend, &ordering, &partition, &[1], &mut Progress::silent())
            .await
            .unwrap_err();
        assert!(matches!(err, EngineError::Partition(_)));
    }
}
