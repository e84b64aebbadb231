//! Extraction pipeline with explicit stages.
//!
//! The stages run in this order:
//! 1. **Load**: read icustays, admissions, patients and the diagnosis tables
//! 2. **Cohort**: apply the eligibility filters
//! 3. **Diagnoses**: attach titles, normalize onto ICD-9, keep cohort admissions
//! 4. **Tables**: write the whole-cohort tables (and phenotype labels)
//! 5. **Subjects**: write per-subject stays and diagnoses files
//! 6. **Events**: partition each event log into per-subject events files
//! 7. **Summary**: write `summary.json`
//!
//! A fatal load error in any stage aborts the run before later stages write.

use std::fs;
use std::path::{Path, PathBuf};
use std::time::Instant;

use anyhow::{Context, Result};
use tracing::{debug, info, info_span, warn};

use cohort_core::{
    Cohort, CohortBuild, CohortFilterEngine, CohortSources, Crosswalk, DiagnosisDictionary,
    LabelMatrix, NormalizedDiagnoses, PartitionStats, PhenotypeDefinitions, PhenotypeLabeler,
    cohort_event_filter, diagnosis_counts, filter_diagnoses_on_cohort, normalize_assignments,
    partition_event_source, write_subject_diagnoses, write_subject_stays,
};
use cohort_ingest::TableLoader;
use cohort_model::{
    CohortDiagnosis, CohortOptions, DiagnosisAssignment, DiagnosisTitle, PartitionOptions,
};
use cohort_output::{
    CohortTables, RunSummary, write_cohort_tables, write_phenotype_labels, write_summary_json,
};

/// Everything a run needs to know.
#[derive(Debug, Clone)]
pub struct PipelineConfig {
    pub mimic_root: PathBuf,
    pub output_root: PathBuf,
    pub crosswalk: Option<PathBuf>,
    pub cohort: CohortOptions,
    pub partition: PartitionOptions,
    pub skip_events: bool,
}

impl PipelineConfig {
    pub fn new(mimic_root: impl Into<PathBuf>, output_root: impl Into<PathBuf>) -> Self {
        Self {
            mimic_root: mimic_root.into(),
            output_root: output_root.into(),
            crosswalk: None,
            cohort: CohortOptions::default(),
            partition: PartitionOptions::default(),
            skip_events: false,
        }
    }
}

/// Paths written by a run together with its summary.
#[derive(Debug, Clone)]
pub struct RunOutcome {
    pub summary: RunSummary,
    pub tables: CohortTables,
    pub phenotype_labels: Option<PathBuf>,
    pub summary_path: PathBuf,
}

struct Phenotyping {
    labeler: Box<dyn PhenotypeLabeler>,
    definitions: PhenotypeDefinitions,
}

pub struct Pipeline {
    config: PipelineConfig,
    phenotyping: Option<Phenotyping>,
}

// ============================================================================
// Stage 1: Load
// ============================================================================

/// Source relations read by the load stage.
#[derive(Debug)]
pub struct LoadedTables {
    pub cohort_sources: CohortSources,
    pub assignments: Vec<DiagnosisAssignment>,
    pub titles: Vec<DiagnosisTitle>,
    pub crosswalk: Crosswalk,
}

pub fn load_tables(config: &PipelineConfig) -> Result<LoadedTables> {
    let span = info_span!("load", root = %config.mimic_root.display());
    let _guard = span.enter();
    let start = Instant::now();
    let loader = TableLoader::new(&config.mimic_root);
    let cohort_sources = CohortSources::load(&loader).context("load cohort tables")?;
    let assignments = loader
        .load::<DiagnosisAssignment>()
        .context("load diagnosis assignments")?;
    let titles = loader
        .load::<DiagnosisTitle>()
        .context("load diagnosis dictionary")?;
    let crosswalk = match &config.crosswalk {
        Some(path) => Crosswalk::load(path)
            .with_context(|| format!("load crosswalk {}", path.display()))?,
        None => {
            warn!("no crosswalk given; ICD-10 diagnoses will be dropped as unmapped");
            Crosswalk::default()
        }
    };
    info!(
        stays = cohort_sources.stays.len(),
        admissions = cohort_sources.admissions.len(),
        patients = cohort_sources.patients.len(),
        diagnoses = assignments.len(),
        titles = titles.len(),
        crosswalk_entries = crosswalk.len(),
        duration_ms = start.elapsed().as_millis(),
        "tables loaded"
    );
    Ok(LoadedTables {
        cohort_sources,
        assignments,
        titles,
        crosswalk,
    })
}

// ============================================================================
// Stage 3: Diagnoses
// ============================================================================

#[derive(Debug)]
pub struct DiagnosisStage {
    pub normalized: NormalizedDiagnoses,
    pub cohort_diagnoses: Vec<CohortDiagnosis>,
}

pub fn process_diagnoses(
    assignments: Vec<DiagnosisAssignment>,
    titles: Vec<DiagnosisTitle>,
    crosswalk: &Crosswalk,
    cohort: &Cohort,
) -> DiagnosisStage {
    let span = info_span!("diagnoses");
    let _guard = span.enter();
    let dictionary = DiagnosisDictionary::new(titles);
    let normalized = normalize_assignments(assignments, &dictionary, crosswalk);
    let cohort_diagnoses = filter_diagnoses_on_cohort(&normalized.records, cohort);
    DiagnosisStage {
        normalized,
        cohort_diagnoses,
    }
}

// ============================================================================
// Stage 6: Events
// ============================================================================

pub fn partition_events(config: &PipelineConfig, cohort: &Cohort) -> Result<Vec<PartitionStats>> {
    let span = info_span!("events");
    let _guard = span.enter();
    let subjects = cohort.subject_ids();
    let mut all_stats = Vec::with_capacity(config.partition.event_sources.len());
    for source in &config.partition.event_sources {
        let filter = cohort_event_filter(&subjects, &config.partition);
        let stats = partition_event_source(
            &config.mimic_root,
            source,
            &config.output_root,
            filter,
            &config.partition,
        )
        .with_context(|| format!("partition {source}"))?;
        all_stats.push(stats);
    }
    Ok(all_stats)
}

impl Pipeline {
    pub fn new(config: PipelineConfig) -> Self {
        Self {
            config,
            phenotyping: None,
        }
    }

    /// Adds phenotype labeling of the cohort diagnoses.
    pub fn with_labeler(
        mut self,
        labeler: impl PhenotypeLabeler + 'static,
        definitions: PhenotypeDefinitions,
    ) -> Self {
        self.phenotyping = Some(Phenotyping {
            labeler: Box::new(labeler),
            definitions,
        });
        self
    }

    pub fn config(&self) -> &PipelineConfig {
        &self.config
    }

    pub fn run(&self) -> Result<RunOutcome> {
        let config = &self.config;
        let span = info_span!("run", output = %config.output_root.display());
        let _guard = span.enter();
        let start = Instant::now();

        let loaded = load_tables(config)?;
        let crosswalk_stats = config.crosswalk.as_ref().map(|_| loaded.crosswalk.stats());

        let CohortBuild { cohort, stages } =
            CohortFilterEngine::new(config.cohort.clone()).build(loaded.cohort_sources);

        let diagnoses = process_diagnoses(
            loaded.assignments,
            loaded.titles,
            &loaded.crosswalk,
            &cohort,
        );
        let counts = diagnosis_counts(&diagnoses.cohort_diagnoses);

        fs::create_dir_all(&config.output_root)
            .with_context(|| format!("create {}", config.output_root.display()))?;
        let tables = write_cohort_tables(
            &config.output_root,
            &cohort,
            &diagnoses.cohort_diagnoses,
            &counts,
        )
        .context("write cohort tables")?;
        let labels = self.phenotyping.as_ref().map(|phenotyping| {
            phenotyping
                .labeler
                .label(&diagnoses.cohort_diagnoses, &phenotyping.definitions)
        });
        let phenotype_labels = match &labels {
            Some(labels) => Some(
                write_phenotype_labels(&config.output_root, labels)
                    .context("write phenotype labels")?,
            ),
            None => None,
        };

        write_subject_files(
            &config.output_root,
            &cohort,
            &diagnoses.cohort_diagnoses,
            labels.as_ref(),
        )?;

        let partitions = if config.skip_events {
            debug!("event partitioning skipped");
            Vec::new()
        } else {
            partition_events(config, &cohort)?
        };

        let summary = RunSummary {
            mimic_root: config.mimic_root.clone(),
            output_root: config.output_root.clone(),
            crosswalk: crosswalk_stats,
            icd10_coverage: diagnoses.normalized.report.icd10_coverage(),
            diagnoses: diagnoses.normalized.report,
            cohort_stages: stages,
            cohort_stays: cohort.len(),
            cohort_subjects: cohort.subject_ids().len(),
            cohort_diagnoses: diagnoses.cohort_diagnoses.len(),
            partitions,
        };
        let summary_path =
            write_summary_json(&config.output_root, &summary).context("write summary")?;
        info!(
            stays = summary.cohort_stays,
            subjects = summary.cohort_subjects,
            events = summary.events_written(),
            duration_ms = start.elapsed().as_millis(),
            "run complete"
        );
        Ok(RunOutcome {
            summary,
            tables,
            phenotype_labels,
            summary_path,
        })
    }
}

// ============================================================================
// Stage 5: Subjects
// ============================================================================

fn write_subject_files(
    output_root: &Path,
    cohort: &Cohort,
    diagnoses: &[CohortDiagnosis],
    labels: Option<&LabelMatrix>,
) -> Result<()> {
    let span = info_span!("subjects");
    let _guard = span.enter();
    let start = Instant::now();
    let subjects = write_subject_stays(output_root, cohort).context("write subject stays")?;
    write_subject_diagnoses(output_root, diagnoses, labels).context("write subject diagnoses")?;
    info!(
        subjects,
        duration_ms = start.elapsed().as_millis(),
        "subject files written"
    );
    Ok(())
}
