//! Shared template fixture for unit tests.

pub const FIXTURE: &str = r#"{
    "tables": [
        {
            "name": "Headcount",
            "rows": [{"key": "exec"}, {"key": "staff"}],
            "cols": [
                [{"key": "all"}],
                [{"key": "f"}, {"key": "m"}]
            ],
            "operations": {"AVG": "SELF", "STD": "SELF", "LIN": [[["exec", "f"], ["staff", "f"]]]},
            "cohortOperations": {"AVG": "SELF"}
        },
        {
            "name": "Pay",
            "rows": [{"key": "exec"}, {"key": "staff"}],
            "cols": [[{"key": "f"}, {"key": "m"}]],
            "operations": {"AVG": "Headcount", "STD": "SELF"},
            "cohortOperations": {"AVG": "Headcount"}
        },
        {
            "name": "Notes",
            "submit": false,
            "rows": [{"key": "x"}],
            "cols": [[{"key": "y"}]]
        }
    ],
    "ratios": [[1, 0]],
    "surveyjs-1": {
        "pages": [
            {"elements": [
                {"type": "radiogroup", "name": "q1", "choices": ["Yes", "No"]},
                {"type": "panel", "elements": [
                    {"type": "checkbox", "name": "q2", "choices": [{"value": 1, "text": "A"}, {"value": 2, "text": "B"}, {"value": 3, "text": "C"}]},
                    {"type": "text", "name": "q3"}
                ]}
            ]},
            {"elements": [
                {"type": "multipletext", "name": "q4", "items": [{"name": "hours"}, {"name": "days"}]},
                {"type": "matrixdropdown", "name": "q5",
                 "columns": [{"choices": ["Disagree", "Neutral", "Agree"]}],
                 "rows": ["Pay", "Culture"]}
            ]}
        ]
    },
    "usability": ["time_spent", {"browser": ["chrome", "firefox"]}],
    "cohort_group_by": "ALL"
}"#;
