//! Single-pass partitioning of an event log into per-subject files.
//!
//! # Input precondition
//!
//! [`StreamingEventPartitioner`] performs *contiguous-run grouping*, not a
//! general group-by. It holds only the current subject id and that subject's
//! buffered rows. When the subject id changes, the buffered rows are flushed
//! to the sink and the buffer restarts for the new subject. The input must
//! therefore deliver all rows of a subject as one contiguous run.
//!
//! What happens when it does not depends on [`ContiguityMode`]:
//!
//! - `Ascending` (default) fails with [`PartitionError::DescendingSubject`]
//!   when the subject id decreases. It keeps nothing beyond the previous id,
//!   so extra memory stays constant.
//! - `Verified` fails with [`PartitionError::NonContiguousSubject`] as soon
//!   as an already-flushed subject reappears. It accepts grouped input in any
//!   subject order but holds one id per completed subject, so its memory
//!   grows with the number of distinct subjects in the log.
//! - `Unchecked` silently splits the subject: its rows are flushed as several
//!   groups appended to the same file, in arrival order per group.
//!
//! Rows failing the subject or item allow-list are discarded before they
//! take part in grouping.

use std::collections::{BTreeSet, HashSet};
use std::path::{Path, PathBuf};
use std::time::Instant;

use indicatif::ProgressBar;
use serde::Serialize;
use tracing::{debug, info, info_span, warn};

use cohort_ingest::{EventReader, EventRow, LoadError};
use cohort_model::{ContiguityMode, EVENT_COLUMNS, EventRecord, PartitionOptions, SubjectId};

use crate::error::{PartitionError, Result};
use crate::progress::{PROGRESS_STRIDE, event_progress, finish_message};
use crate::subject_files::{EVENTS_FILE, append_records, ensure_file_with_header, ensure_partition_dir};

/// Destination of flushed subject runs.
pub trait PartitionSink {
    /// Persists one contiguous run of rows of `subject_id`, in order.
    fn write_group(&mut self, subject_id: SubjectId, rows: &[EventRecord]) -> Result<()>;
}

/// Appends each run to `<root>/<subject_id>/<file_name>`, creating the
/// directory and the file with its header on first use.
#[derive(Debug, Clone)]
pub struct SubjectFileSink {
    root: PathBuf,
    file_name: String,
}

impl SubjectFileSink {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self::with_file_name(root, EVENTS_FILE)
    }

    pub fn with_file_name(root: impl Into<PathBuf>, file_name: impl Into<String>) -> Self {
        Self {
            root: root.into(),
            file_name: file_name.into(),
        }
    }

    pub fn root(&self) -> &Path {
        &self.root
    }
}

impl PartitionSink for SubjectFileSink {
    fn write_group(&mut self, subject_id: SubjectId, rows: &[EventRecord]) -> Result<()> {
        let (dir, _) = ensure_partition_dir(&self.root, subject_id)?;
        let path = dir.join(&self.file_name);
        ensure_file_with_header(&path, &EVENT_COLUMNS)?;
        append_records(&path, rows.iter().map(EventRecord::to_record))?;
        Ok(())
    }
}

/// Membership filters applied to every event before grouping.
#[derive(Debug, Clone, Default)]
pub struct EventFilter {
    subjects: Option<HashSet<SubjectId>>,
    items: Option<HashSet<i64>>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FilterDecision {
    Keep,
    SubjectExcluded,
    ItemExcluded,
}

impl EventFilter {
    pub fn new<S, I>(subjects: Option<S>, items: Option<I>) -> Self
    where
        S: IntoIterator<Item = SubjectId>,
        I: IntoIterator<Item = i64>,
    {
        Self {
            subjects: subjects.map(|ids| ids.into_iter().collect()),
            items: items.map(|ids| ids.into_iter().collect()),
        }
    }

    pub fn check(&self, event: &EventRecord) -> FilterDecision {
        if let Some(subjects) = &self.subjects
            && !subjects.contains(&event.subject_id)
        {
            return FilterDecision::SubjectExcluded;
        }
        if let Some(items) = &self.items
            && !items.contains(&event.itemid)
        {
            return FilterDecision::ItemExcluded;
        }
        FilterDecision::Keep
    }
}

/// Counters of one partitioning pass.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct PartitionStats {
    pub source: String,
    pub rows_read: u64,
    pub rows_written: u64,
    pub subject_filtered: u64,
    pub item_filtered: u64,
    pub malformed_rows: u64,
    /// Number of subject runs written. Equals the number of distinct
    /// subjects unless the input was split under `Unchecked`.
    pub subjects_flushed: u64,
    /// Number of sink writes, including repeated flushes of one run.
    pub flush_groups: u64,
}

impl PartitionStats {
    /// Rows accepted by the filters.
    pub fn rows_kept(&self) -> u64 {
        self.rows_read - self.subject_filtered - self.item_filtered - self.malformed_rows
    }
}

#[derive(Debug)]
enum ContiguityGuard {
    Verified(HashSet<SubjectId>),
    Ascending,
    Unchecked,
}

impl ContiguityGuard {
    fn new(mode: ContiguityMode) -> Self {
        match mode {
            ContiguityMode::Verified => ContiguityGuard::Verified(HashSet::new()),
            ContiguityMode::Ascending => ContiguityGuard::Ascending,
            ContiguityMode::Unchecked => ContiguityGuard::Unchecked,
        }
    }

    /// Validates a switch of the current subject from `previous` to `next`.
    fn switch(&mut self, previous: Option<SubjectId>, next: SubjectId, row: u64) -> Result<()> {
        match self {
            ContiguityGuard::Verified(completed) => {
                if let Some(previous) = previous {
                    completed.insert(previous);
                }
                if completed.contains(&next) {
                    return Err(PartitionError::NonContiguousSubject {
                        subject_id: next,
                        row,
                    });
                }
            }
            ContiguityGuard::Ascending => {
                if let Some(previous) = previous
                    && next < previous
                {
                    return Err(PartitionError::DescendingSubject {
                        subject_id: next,
                        previous,
                        row,
                    });
                }
            }
            ContiguityGuard::Unchecked => {}
        }
        Ok(())
    }
}

/// Groups a stream of events into per-subject runs and hands each run to a
/// [`PartitionSink`]. See the module documentation for the input contract.
#[derive(Debug)]
pub struct StreamingEventPartitioner<S> {
    sink: S,
    filter: EventFilter,
    guard: ContiguityGuard,
    current: Option<SubjectId>,
    current_flushed: bool,
    buffer: Vec<EventRecord>,
    stats: PartitionStats,
}

impl<S: PartitionSink> StreamingEventPartitioner<S> {
    pub fn new(
        source: impl Into<String>,
        sink: S,
        filter: EventFilter,
        contiguity: ContiguityMode,
    ) -> Self {
        Self {
            sink,
            filter,
            guard: ContiguityGuard::new(contiguity),
            current: None,
            current_flushed: false,
            buffer: Vec::new(),
            stats: PartitionStats {
                source: source.into(),
                ..PartitionStats::default()
            },
        }
    }

    pub fn stats(&self) -> &PartitionStats {
        &self.stats
    }

    /// Feeds one event. Flushes the previous subject when the subject changes.
    pub fn observe(&mut self, event: EventRecord) -> Result<()> {
        self.stats.rows_read += 1;
        match self.filter.check(&event) {
            FilterDecision::Keep => {}
            FilterDecision::SubjectExcluded => {
                self.stats.subject_filtered += 1;
                return Ok(());
            }
            FilterDecision::ItemExcluded => {
                self.stats.item_filtered += 1;
                return Ok(());
            }
        }
        if self.current != Some(event.subject_id) {
            self.flush()?;
            self.guard
                .switch(self.current, event.subject_id, self.stats.rows_read)?;
            self.current = Some(event.subject_id);
            self.current_flushed = false;
        }
        self.buffer.push(event);
        Ok(())
    }

    /// Counts a row the reader could not convert.
    pub fn skip_malformed(&mut self) {
        self.stats.rows_read += 1;
        self.stats.malformed_rows += 1;
    }

    /// Writes the buffered rows of the current subject and clears the buffer.
    pub fn flush(&mut self) -> Result<()> {
        let Some(subject_id) = self.current else {
            return Ok(());
        };
        if self.buffer.is_empty() {
            return Ok(());
        }
        self.sink.write_group(subject_id, &self.buffer)?;
        self.stats.rows_written += self.buffer.len() as u64;
        self.stats.flush_groups += 1;
        if !self.current_flushed {
            self.stats.subjects_flushed += 1;
            self.current_flushed = true;
        }
        self.buffer.clear();
        Ok(())
    }

    /// Flushes the last subject and returns the sink with the pass counters.
    pub fn finish(mut self) -> Result<(S, PartitionStats)> {
        self.flush()?;
        Ok((self.sink, self.stats))
    }

    /// Drives a full scan of `rows`, then finishes.
    pub fn run<I>(mut self, rows: I, progress: &ProgressBar) -> Result<(S, PartitionStats)>
    where
        I: IntoIterator<Item = std::result::Result<EventRow, LoadError>>,
    {
        let span = info_span!("partition", source = %self.stats.source);
        let _guard = span.enter();
        let start = Instant::now();
        for row in rows {
            match row? {
                EventRow::Event(event) => self.observe(event)?,
                EventRow::Malformed { line, column } => {
                    if self.stats.malformed_rows == 0 {
                        warn!(line, column = column.as_deref().unwrap_or(""), "skipping malformed event row");
                    }
                    self.skip_malformed();
                }
            }
            if self.stats.rows_read % PROGRESS_STRIDE == 0 {
                progress.set_position(self.stats.rows_read);
            }
        }
        let (sink, stats) = self.finish()?;
        progress.set_position(stats.rows_read);
        progress.finish_with_message(finish_message(&stats.source, stats.rows_read));
        info!(
            rows_read = stats.rows_read,
            rows_written = stats.rows_written,
            subject_filtered = stats.subject_filtered,
            item_filtered = stats.item_filtered,
            malformed_rows = stats.malformed_rows,
            subjects_flushed = stats.subjects_flushed,
            flush_groups = stats.flush_groups,
            duration_ms = start.elapsed().as_millis(),
            "event source partitioned"
        );
        if stats.malformed_rows > 0 {
            warn!(
                malformed_rows = stats.malformed_rows,
                "malformed event rows were skipped"
            );
        }
        Ok((sink, stats))
    }
}

/// Builds the event filter for a run: the subject filter is the cohort's
/// subjects, narrowed to the subject allow-list when one is configured.
pub fn cohort_event_filter(
    cohort_subjects: &BTreeSet<SubjectId>,
    options: &PartitionOptions,
) -> EventFilter {
    let subjects = cohort_subjects.iter().copied().filter(|subject| {
        options
            .subject_allow_list
            .as_ref()
            .is_none_or(|allowed| allowed.contains(subject))
    });
    EventFilter::new(Some(subjects), options.item_allow_list.clone())
}

/// Partitions one event source found under `mimic_root` into
/// `<output_root>/<subject_id>/events.csv`.
pub fn partition_event_source(
    mimic_root: &Path,
    source: &str,
    output_root: &Path,
    filter: EventFilter,
    options: &PartitionOptions,
) -> Result<PartitionStats> {
    let reader = EventReader::open_source(mimic_root, source)?;
    debug!(
        source,
        path = %reader.path().display(),
        has_stay_ids = reader.has_stay_ids(),
        "opened event source"
    );
    let progress = event_progress(source, options.show_progress);
    let partitioner = StreamingEventPartitioner::new(
        source,
        SubjectFileSink::new(output_root),
        filter,
        options.contiguity,
    );
    let (_, stats) = partitioner.run(reader, &progress)?;
    Ok(stats)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[derive(Debug, Default)]
    struct MemorySink {
        groups: Vec<(SubjectId, Vec<i64>)>,
    }

    impl PartitionSink for MemorySink {
        fn write_group(&mut self, subject_id: SubjectId, rows: &[EventRecord]) -> Result<()> {
            self.groups
                .push((subject_id, rows.iter().map(|row| row.itemid).collect()));
            Ok(())
        }
    }

    fn event(subject: i64, itemid: i64) -> EventRecord {
        EventRecord {
            subject_id: SubjectId::new(subject),
            hadm_id: None,
            stay_id: None,
            charttime: String::new(),
            itemid,
            value: String::new(),
            valueuom: String::new(),
        }
    }

    fn partitioner(mode: ContiguityMode) -> StreamingEventPartitioner<MemorySink> {
        StreamingEventPartitioner::new("test", MemorySink::default(), EventFilter::default(), mode)
    }

    fn feed(
        mut partitioner: StreamingEventPartitioner<MemorySink>,
        events: &[(i64, i64)],
    ) -> Result<(MemorySink, PartitionStats)> {
        for (subject, item) in events {
            partitioner.observe(event(*subject, *item))?;
        }
        partitioner.finish()
    }

    #[test]
    fn flushes_on_subject_change_and_at_end() {
        let (sink, stats) = feed(
            partitioner(ContiguityMode::Verified),
            &[(1, 10), (1, 11), (2, 20), (3, 30), (3, 31)],
        )
        .expect("partition");
        assert_eq!(
            sink.groups,
            vec![
                (SubjectId::new(1), vec![10, 11]),
                (SubjectId::new(2), vec![20]),
                (SubjectId::new(3), vec![30, 31]),
            ]
        );
        assert_eq!(stats.rows_written, 5);
        assert_eq!(stats.flush_groups, 3);
    }

    #[test]
    fn unchecked_mode_silently_splits_non_contiguous_subjects() {
        let (sink, stats) = feed(
            partitioner(ContiguityMode::Unchecked),
            &[(1, 10), (2, 20), (1, 11)],
        )
        .expect("partition");
        assert_eq!(
            sink.groups,
            vec![
                (SubjectId::new(1), vec![10]),
                (SubjectId::new(2), vec![20]),
                (SubjectId::new(1), vec![11]),
            ]
        );
        assert_eq!(stats.flush_groups, 3);
        assert_eq!(stats.subjects_flushed, 3);
    }

    #[test]
    fn verified_mode_rejects_reappearing_subject() {
        let err = feed(
            partitioner(ContiguityMode::Verified),
            &[(1, 10), (2, 20), (1, 11)],
        )
        .unwrap_err();
        assert!(matches!(
            err,
            PartitionError::NonContiguousSubject { subject_id, row: 3 } if subject_id == SubjectId::new(1)
        ));
    }

    #[test]
    fn ascending_mode_rejects_decreasing_subject() {
        let err = feed(
            partitioner(ContiguityMode::Ascending),
            &[(2, 20), (1, 10)],
        )
        .unwrap_err();
        assert!(matches!(err, PartitionError::DescendingSubject { row: 2, .. }));
    }

    #[test]
    fn filtered_rows_do_not_break_runs() {
        let filter = EventFilter::new(
            Some([SubjectId::new(1), SubjectId::new(2)]),
            Some([10, 11, 20]),
        );
        let mut partitioner = StreamingEventPartitioner::new(
            "test",
            MemorySink::default(),
            filter,
            ContiguityMode::Verified,
        );
        for (subject, item) in [(1, 10), (9, 10), (1, 99), (1, 11), (2, 20)] {
            partitioner.observe(event(subject, item)).expect("observe");
        }
        partitioner.skip_malformed();
        let (sink, stats) = partitioner.finish().expect("finish");
        assert_eq!(
            sink.groups,
            vec![
                (SubjectId::new(1), vec![10, 11]),
                (SubjectId::new(2), vec![20]),
            ]
        );
        assert_eq!(stats.rows_read, 6);
        assert_eq!(stats.subject_filtered, 1);
        assert_eq!(stats.item_filtered, 1);
        assert_eq!(stats.malformed_rows, 1);
        assert_eq!(stats.rows_kept(), 3);
    }

    #[test]
    fn explicit_flush_keeps_current_subject() {
        let mut partitioner = partitioner(ContiguityMode::Verified);
        partitioner.observe(event(1, 10)).expect("observe");
        partitioner.flush().expect("flush");
        partitioner.flush().expect("empty flush");
        partitioner.observe(event(1, 11)).expect("same subject after flush");
        let (sink, stats) = partitioner.finish().expect("finish");
        assert_eq!(sink.groups.len(), 2);
        assert_eq!(stats.flush_groups, 2);
        assert_eq!(stats.subjects_flushed, 1);
    }
}
