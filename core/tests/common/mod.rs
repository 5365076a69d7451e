#![allow(dead_code)]

use tally_engine::{
    ConsistentOrdering, SubmitterPartition, Submission, Template, encode_submission, order,
};
use tally_sharing::{CommitteeConfig, LocalCommittee, PartyId, PlainBackend};

pub const ANALYST: PartyId = 1;

pub const TEMPLATE: &str = r#"{
    "tables": [
        {
            "name": "Pay",
            "rows": [{"key": "exec"}, {"key": "staff"}],
            "cols": [[{"key": "f"}, {"key": "m"}]],
            "operations": {"AVG": "SELF", "STD": "SELF", "LIN": [[["exec", "f"], ["staff", "f"]]]},
            "cohortOperations": {"AVG": "SELF", "STD": "SELF"}
        }
    ],
    "surveyjs-1": {"pages": [{"elements": [
        {"type": "radiogroup", "name": "q1", "choices": ["Yes", "No"]}
    ]}]},
    "usability": ["time_spent"],
    "cohort_group_by": "ALL"
}"#;

/// `(party, cohort, submission)` in submission order
pub fn submissions() -> Vec<(PartyId, Option<String>, Submission)> {
    let rows = [
        (2, Some("a"), [1, 2, 3, 4], Some(1), 10),
        (3, Some("a"), [3, 2, 5, 4], Some(2), 20),
        (4, Some("b"), [5, 6, 7, 8], Some(1), 30),
        (5, Some("b"), [7, 6, 9, 8], None, 0),
        (6, None, [4, 4, 6, 0], Some(1), 5),
    ];
    rows.into_iter()
        .map(|(party, cohort, [ef, em, sf, sm], q1, time)| {
            let mut json = serde_json::json!({
                "tables": {"Pay": {
                    "exec": {"f": ef, "m": em},
                    "staff": {"f": sf, "m": sm}
                }},
                "usability": {"time_spent": time}
            });
            if let Some(answer) = q1 {
                json["questions"] = serde_json::json!({"q1": answer});
            }
            let submission: Submission = serde_json::from_value(json).unwrap();
            (party, cohort.map(String::from), submission)
        })
        .collect()
}

pub fn ordering(template: &str) -> ConsistentOrdering {
    order(&Template::from_json(template).unwrap()).unwrap()
}

pub fn partition() -> SubmitterPartition {
    let assignments: Vec<_> = submissions()
        .into_iter()
        .map(|(party, cohort, _)| (party, cohort))
        .collect();
    SubmitterPartition::from_assignments(&assignments, 2).unwrap()
}

pub fn plain_backend(ordering: &ConsistentOrdering) -> PlainBackend {
    let backend = PlainBackend::new();
    for (party, _, submission) in submissions() {
        backend.submit(party, encode_submission(ordering, &submission).unwrap());
    }
    backend
}

pub fn committee(ordering: &ConsistentOrdering) -> LocalCommittee {
    let committee = LocalCommittee::new(CommitteeConfig::new(2, 3, ANALYST)).unwrap();
    for (party, _, submission) in submissions() {
        let encoded = encode_submission(ordering, &submission).unwrap();
        committee.submit(party, &encoded).unwrap();
    }
    committee
}
