use std::collections::BTreeSet;
use std::io::{self, IsTerminal};
use std::path::Path;

use anyhow::{Context, Result};
use comfy_table::Table;
use tracing::info_span;

use cohort_ingest::{ColumnSpec, EVENT_SOURCE_COLUMNS, SourceTable, read_id_list, resolve_source};
use cohort_model::{
    Admission, CohortOptions, ContiguityMode, DiagnosisAssignment, DiagnosisTitle, IcuStay,
    PartitionOptions, Patient, StayCountRange, SubjectId,
};

use crate::cli::{ContiguityArg, RunArgs, SourcesArgs};
use crate::pipeline::{Pipeline, PipelineConfig, RunOutcome};
use crate::summary::apply_table_style;

/// Source tables with their projected columns, in load order.
pub fn source_catalogue(event_sources: &[String]) -> Vec<(String, &'static [ColumnSpec])> {
    let mut catalogue = vec![
        (IcuStay::SOURCE.to_string(), IcuStay::COLUMNS),
        (Admission::SOURCE.to_string(), Admission::COLUMNS),
        (Patient::SOURCE.to_string(), Patient::COLUMNS),
        (DiagnosisAssignment::SOURCE.to_string(), DiagnosisAssignment::COLUMNS),
        (DiagnosisTitle::SOURCE.to_string(), DiagnosisTitle::COLUMNS),
    ];
    catalogue.extend(
        event_sources
            .iter()
            .map(|name| (name.clone(), EVENT_SOURCE_COLUMNS)),
    );
    catalogue
}

fn describe_columns(columns: &[ColumnSpec]) -> String {
    columns
        .iter()
        .map(|column| {
            if column.optional {
                format!("{}?", column.name)
            } else {
                column.name.to_string()
            }
        })
        .collect::<Vec<_>>()
        .join(", ")
}

pub fn run_sources(args: &SourcesArgs) -> Result<()> {
    let event_sources: Vec<String> = cohort_model::DEFAULT_EVENT_SOURCES
        .iter()
        .map(|name| (*name).to_string())
        .collect();
    let mut table = Table::new();
    let mut header = vec!["Source", "Columns"];
    if args.mimic_root.is_some() {
        header.push("Resolved");
    }
    table.set_header(header);
    apply_table_style(&mut table);
    for (name, columns) in source_catalogue(&event_sources) {
        let mut row = vec![name.clone(), describe_columns(columns)];
        if let Some(root) = &args.mimic_root {
            row.push(match resolve_source(root, &name) {
                Ok(path) => path.display().to_string(),
                Err(_) => "missing".to_string(),
            });
        }
        table.add_row(row);
    }
    println!("{table}");
    Ok(())
}

fn read_allow_list(path: Option<&Path>, what: &str) -> Result<Option<BTreeSet<i64>>> {
    path.map(|path| {
        read_id_list(path).with_context(|| format!("read {what} from {}", path.display()))
    })
    .transpose()
}

/// Translates command-line arguments into a pipeline configuration.
pub fn pipeline_config(args: &RunArgs) -> Result<PipelineConfig> {
    let stays = StayCountRange::new(args.min_stays, args.max_stays)
        .context("invalid --min-stays/--max-stays")?;
    let cohort = CohortOptions::default()
        .with_stays_per_admission(stays)
        .with_age_range(args.min_age, args.max_age)
        .context("invalid --min-age/--max-age")?;

    let items = read_allow_list(args.itemids_file.as_deref(), "item ids")?;
    let subjects = read_allow_list(args.subjects_file.as_deref(), "subject ids")?
        .map(|ids| ids.into_iter().map(SubjectId::new).collect());
    let contiguity = match args.contiguity {
        ContiguityArg::Ascending => ContiguityMode::Ascending,
        ContiguityArg::Verified => ContiguityMode::Verified,
        ContiguityArg::Unchecked => ContiguityMode::Unchecked,
    };
    let partition = PartitionOptions::default()
        .with_event_sources(args.event_tables.clone())
        .with_item_allow_list(items)
        .with_subject_allow_list(subjects)
        .with_contiguity(contiguity)
        .with_progress(!args.no_progress && io::stderr().is_terminal());

    Ok(PipelineConfig {
        mimic_root: args.mimic_root.clone(),
        output_root: args.output_root.clone(),
        crosswalk: args.crosswalk.clone(),
        cohort,
        partition,
        skip_events: args.skip_events,
    })
}

pub fn run_extract(args: &RunArgs) -> Result<RunOutcome> {
    let span = info_span!("extract", root = %args.mimic_root.display());
    let _guard = span.enter();
    let config = pipeline_config(args)?;
    Pipeline::new(config).run()
}
