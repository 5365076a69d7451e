//! Local simulation of a full session.
//!
//! Each submitter's plaintext is encoded, split across an in-process
//! committee, and the engine then aggregates as the analyst. Useful for
//! dry runs of a template before a real collection.

use std::collections::BTreeSet;
use std::fs;
use std::path::PathBuf;

use anyhow::{Context, Result, bail};
use log::{debug, info};
use serde::Deserialize;
use tally_config::TallyConfig;
use tally_engine::{
    CohortId, Progress, Submission, SubmitterPartition, Template, encode_submission, order,
};
use tally_sharing::{CommitteeConfig, LocalCommittee, PartyId};

/// Command-line overrides; anything unset comes from config
#[derive(Debug, Default)]
pub struct RunOptions {
    pub config_path: Option<PathBuf>,
    pub template: Option<String>,
    pub submissions: Option<String>,
    pub output: Option<String>,
    pub min_cohort_size: Option<usize>,
}

/// One entry of the submissions file
#[derive(Debug, Deserialize)]
pub struct SubmissionRecord {
    pub party: PartyId,
    #[serde(default)]
    pub cohort: Option<CohortId>,
    pub data: Submission,
}

fn load_config(options: &RunOptions) -> Result<TallyConfig> {
    let mut config = match &options.config_path {
        Some(path) => TallyConfig::load_from(path)?,
        None => TallyConfig::load()?,
    };
    if let Some(path) = &options.template {
        config.io.template_path = path.clone();
    }
    if let Some(path) = &options.submissions {
        config.io.submissions_path = path.clone();
    }
    if let Some(path) = &options.output {
        config.io.output_path = Some(path.clone());
    }
    if let Some(size) = options.min_cohort_size {
        config.aggregation.min_cohort_size = size;
    }
    Ok(config)
}

pub async fn run(options: RunOptions) -> Result<()> {
    let config = load_config(&options)?;
    let analyst = config.committee.analyst;

    let template_json = fs::read_to_string(&config.io.template_path)
        .with_context(|| format!("Failed to read template: {}", config.io.template_path))?;
    let template = Template::from_json(&template_json).context("Failed to parse template")?;
    let ordering = order(&template)?;
    info!(
        "Template ordered: {} cells, {} questions, {} slots",
        ordering.cells.len(),
        ordering.questions.len(),
        ordering.total_slots()
    );

    let submissions_json = fs::read_to_string(&config.io.submissions_path).with_context(|| {
        format!(
            "Failed to read submissions: {}",
            config.io.submissions_path
        )
    })?;
    let records: Vec<SubmissionRecord> =
        serde_json::from_str(&submissions_json).context("Failed to parse submissions")?;

    let committee = LocalCommittee::new(CommitteeConfig::new(
        config.committee.threshold,
        config.committee.holders,
        analyst,
    ))?;

    let mut seen = BTreeSet::new();
    let mut assignments = Vec::with_capacity(records.len());
    for record in &records {
        if record.party == analyst {
            bail!("party {} is the analyst and cannot submit", record.party);
        }
        if !seen.insert(record.party) {
            bail!("party {} submitted more than once", record.party);
        }
        let encoded = encode_submission(&ordering, &record.data)
            .with_context(|| format!("Failed to encode submission of party {}", record.party))?;
        committee.submit(record.party, &encoded)?;
        assignments.push((record.party, record.cohort.clone()));
    }

    let partition =
        SubmitterPartition::from_assignments(&assignments, config.aggregation.min_cohort_size)?;
    info!(
        "{} submitters, {} reported cohorts, {} ungrouped",
        partition.submitter_count(),
        partition.cohorts.len(),
        partition.none.len()
    );

    let mut progress = Progress::new(|fraction| debug!("Progress {:.0}%", fraction * 100.0));
    let output =
        tally_engine::run(&committee, &ordering, &partition, &[analyst], &mut progress).await?;

    let report = serde_json::to_string_pretty(&output)?;
    match &config.io.output_path {
        Some(path) => {
            fs::write(path, report).with_context(|| format!("Failed to write report: {path}"))?;
            info!("Report written to {}", path);
        }
        None => println!("{report}"),
    }
    Ok(())
}
