mod common;

use common::{ANALYST, TEMPLATE, committee, ordering, partition, plain_backend, submissions};
use tally_engine::{
    EngineError, FormattedOutput, Progress, RevealError, Scope, SubmitterPartition,
    encode_submission, run,
};
use tally_sharing::{PartyId, PlainBackend, SharingBackend};

async fn run_with<B: SharingBackend>(
    backend: &B,
    template: &str,
    receivers: &[PartyId],
) -> Result<FormattedOutput, EngineError> {
    let ordering = ordering(template);
    run(
        backend,
        &ordering,
        &partition(),
        receivers,
        &mut Progress::silent(),
    )
    .await
}

#[tokio::test]
async fn test_committee_matches_plaintext() {
    let ordering = ordering(TEMPLATE);
    let shared = run_with(&committee(&ordering), TEMPLATE, &[ANALYST])
        .await
        .unwrap();
    let plain = run_with(&plain_backend(&ordering), TEMPLATE, &[ANALYST])
        .await
        .unwrap();
    assert_eq!(shared, plain);
}

#[tokio::test]
async fn test_global_statistics() {
    let ordering = ordering(TEMPLATE);
    let output = run_with(&committee(&ordering), TEMPLATE, &[ANALYST])
        .await
        .unwrap();

    let all = &output.averages[&Scope::All]["Pay"];
    assert_eq!(all["exec"]["f"], "4.00");
    assert_eq!(all["staff"]["m"], "4.80");
    // exec f: [1, 3, 5, 7, 4]
    assert_eq!(output.deviations[&Scope::All]["Pay"]["exec"]["f"], "2.00");

    // staff f = exec f + 2 for every submitter
    let fit = &output.linear_regressions["Pay"][0];
    assert_eq!(fit.slope, 1.0);
    assert_eq!(fit.intercept, 2.0);

    assert_eq!(output.questions["q1"]["Yes"], 3);
    assert_eq!(output.questions["q1"]["No"], 1);
    assert_eq!(output.usability["time_spent"][""], "65");
    assert_eq!(output.cohorts.cohorts, vec!["a".to_string(), "b".to_string()]);
    assert_eq!(output.cohorts.none, vec![6]);
}

#[tokio::test]
async fn test_cohort_sums_add_up_to_global_sums() {
    let ordering = ordering(TEMPLATE);
    let backend = plain_backend(&ordering);
    let assignments: Vec<_> = submissions()
        .into_iter()
        .filter(|(_, cohort, _)| cohort.is_some())
        .map(|(party, cohort, _)| (party, cohort))
        .collect();
    let partition = SubmitterPartition::from_assignments(&assignments, 2).unwrap();
    assert!(partition.none.is_empty());

    run(
        &backend,
        &ordering,
        &partition,
        &[ANALYST],
        &mut Progress::silent(),
    )
    .await
    .unwrap();

    // cohort a values and squares, cohort b, then the global ones
    let opened = backend.opened_sums();
    let [a, a_sq, b, b_sq, all, all_sq] = &opened[..6] else {
        panic!("expected six value/square opens, got {opened:?}");
    };
    assert_eq!(all.len(), ordering.cells.len());
    for i in 0..all.len() {
        assert_eq!(a[i] + b[i], all[i], "values slot {i}");
        assert_eq!(a_sq[i] + b_sq[i], all_sq[i], "squares slot {i}");
    }
    // exec f over parties 2 to 5
    assert_eq!(all[0], 1 + 3 + 5 + 7);
}

#[tokio::test]
async fn test_short_vector_aborts_run() {
    let ordering = ordering(TEMPLATE);
    let backend = plain_backend(&ordering);
    backend.submit(4, vec![1; ordering.total_slots() - 1]);

    let err = run_with(&backend, TEMPLATE, &[ANALYST]).await.unwrap_err();
    match err {
        EngineError::ShareProtocol(e) => assert_eq!(e.party, 4),
        other => panic!("unexpected error: {other}"),
    }
}

#[tokio::test]
async fn test_null_payload_fails_run() {
    let ordering = ordering(TEMPLATE);
    let backend = PlainBackend::withholding_reveals();
    for (party, _, submission) in submissions() {
        backend.submit(party, encode_submission(&ordering, &submission).unwrap());
    }
    let err = run_with(&backend, TEMPLATE, &[ANALYST]).await.unwrap_err();
    assert!(matches!(
        err,
        EngineError::Reveal(RevealError::NullPayload { .. })
    ));
}

#[tokio::test]
async fn test_committee_withholds_from_non_analyst() {
    let ordering = ordering(TEMPLATE);
    let err = run_with(&committee(&ordering), TEMPLATE, &[7])
        .await
        .unwrap_err();
    assert!(matches!(err, EngineError::Reveal(_)));
}

#[tokio::test]
async fn test_only_finished_sums_are_opened() {
    let ordering = ordering(TEMPLATE);
    let backend = plain_backend(&ordering);
    run_with(&backend, TEMPLATE, &[ANALYST]).await.unwrap();

    // two per cohort, then global values, squares, products, questions, usability
    assert_eq!(backend.opened(), vec![4, 4, 4, 4, 4, 4, 1, 2, 1]);
}

#[tokio::test]
async fn test_grouped_cohort_labels() {
    let template = TEMPLATE.replace(
        r#""cohort_group_by": "ALL""#,
        r#""cohort_group_by": ["Female", "Male"]"#,
    );
    let ordering = ordering(&template);
    let output = run_with(&plain_backend(&ordering), &template, &[ANALYST])
        .await
        .unwrap();

    let cohort = &output.averages[&Scope::Cohort("a".into())]["Pay"];
    assert_eq!(cohort["exec"]["Female"], "2.00");
    assert_eq!(cohort["staff"]["Male"], "4.00");
}

#[tokio::test]
async fn test_grouped_labels_fold_wide_tables() {
    let template = r#"{
        "tables": [{
            "name": "Pay",
            "rows": [{"key": "exec"}, {"key": "staff"}],
            "cols": [[{"key": "c1"}, {"key": "c2"}, {"key": "c3"}, {"key": "c4"}]],
            "operations": {"AVG": "SELF"},
            "cohortOperations": {"AVG": "SELF"}
        }],
        "cohort_group_by": ["F", "M"]
    }"#;
    let ordering = ordering(template);
    let backend = PlainBackend::new();
    for (party, first) in [(2, 1), (3, 11)] {
        let values: Vec<i64> = (first..first + 8).collect();
        let squares = values.iter().map(|v| v * v);
        backend.submit(party, values.iter().copied().chain(squares).collect());
    }
    let partition = SubmitterPartition::new(Vec::new(), vec![("a".into(), vec![2, 3])]).unwrap();

    let output = run(
        &backend,
        &ordering,
        &partition,
        &[ANALYST],
        &mut Progress::silent(),
    )
    .await
    .unwrap();

    // F folds c1 and c3, M folds c2 and c4, per row
    let cohort = &output.averages[&Scope::Cohort("a".into())]["Pay"];
    assert_eq!(cohort["exec"]["F"], "14.00");
    assert_eq!(cohort["exec"]["M"], "16.00");
    assert_eq!(cohort["staff"]["F"], "22.00");
    assert_eq!(cohort["staff"]["M"], "24.00");
    assert_eq!(cohort["exec"].len(), 2);

    assert_eq!(output.averages[&Scope::All]["Pay"]["exec"]["c3"], "8.00");
    assert_eq!(backend.opened()[..2], [4, 4]);
}

#[tokio::test]
async fn test_reference_normalizer_zero_guard() {
    let template = r#"{
        "tables": [
            {"name": "Headcount", "rows": [{"key": "exec"}], "cols": [[{"key": "f"}]],
             "operations": {"AVG": "SELF"}},
            {"name": "Pay", "rows": [{"key": "exec"}], "cols": [[{"key": "f"}]],
             "operations": {"AVG": "Headcount"}}
        ]
    }"#;
    let ordering = ordering(template);
    let backend = PlainBackend::new();
    // Headcount 0, Pay 500, squares after
    backend.submit(2, vec![0, 500, 0, 250_000]);
    let partition = SubmitterPartition::new(vec![2], Vec::new()).unwrap();

    let output = run(
        &backend,
        &ordering,
        &partition,
        &[ANALYST],
        &mut Progress::silent(),
    )
    .await
    .unwrap();
    assert_eq!(output.averages[&Scope::All]["Pay"]["exec"]["f"], "0.00");
    assert!(!output.has_questions);
    assert!(!output.has_usability);
}
