//! Property tests for partition completeness and crosswalk accounting.

use std::collections::BTreeMap;

use cohort_core::{
    Crosswalk, EventFilter, PartitionSink, StreamingEventPartitioner,
    normalize_diagnoses,
};
use cohort_model::{
    ContiguityMode, DiagnosisRecord, EventRecord, HadmId, IcdVersion, SubjectId,
};
use proptest::prelude::*;

#[derive(Default)]
struct Collect {
    files: BTreeMap<SubjectId, Vec<EventRecord>>,
}

impl PartitionSink for Collect {
    fn write_group(&mut self, subject_id: SubjectId, rows: &[EventRecord]) -> cohort_core::Result<()> {
        self.files.entry(subject_id).or_default().extend_from_slice(rows);
        Ok(())
    }
}

fn event(subject: i64, itemid: i64, seq: usize) -> EventRecord {
    EventRecord {
        subject_id: SubjectId::new(subject),
        hadm_id: None,
        stay_id: None,
        charttime: seq.to_string(),
        itemid,
        value: String::new(),
        valueuom: String::new(),
    }
}

proptest! {
    #[test]
    fn sorted_stream_is_partitioned_completely(
        mut rows in prop::collection::vec((0i64..20, 0i64..5), 0..200),
        allowed_items in prop::collection::btree_set(0i64..5, 0..5),
        allowed_subjects in prop::collection::btree_set(0i64..20, 0..20),
    ) {
        rows.sort_by_key(|(subject, _)| *subject);
        let events: Vec<EventRecord> = rows
            .iter()
            .enumerate()
            .map(|(seq, (subject, item))| event(*subject, *item, seq))
            .collect();
        let filter = EventFilter::new(
            Some(allowed_subjects.iter().copied().map(SubjectId::new)),
            Some(allowed_items.iter().copied()),
        );
        let mut partitioner = StreamingEventPartitioner::new(
            "prop",
            Collect::default(),
            filter,
            ContiguityMode::Ascending,
        );
        for event in events.clone() {
            partitioner.observe(event).unwrap();
        }
        let (sink, stats) = partitioner.finish().unwrap();

        let surviving: Vec<&EventRecord> = events
            .iter()
            .filter(|event| {
                allowed_subjects.contains(&event.subject_id.get())
                    && allowed_items.contains(&event.itemid)
            })
            .collect();
        let written: usize = sink.files.values().map(Vec::len).sum();
        prop_assert_eq!(written, surviving.len());
        prop_assert_eq!(stats.rows_written as usize, surviving.len());
        prop_assert_eq!(stats.subjects_flushed as usize, sink.files.len());
        for (subject, file) in &sink.files {
            prop_assert!(file.iter().all(|event| event.subject_id == *subject));
            let expected: Vec<&EventRecord> = surviving
                .iter()
                .copied()
                .filter(|event| event.subject_id == *subject)
                .collect();
            prop_assert_eq!(file.iter().collect::<Vec<_>>(), expected);
        }
    }

    #[test]
    fn crosswalk_accounts_for_every_row(
        rows in prop::collection::vec((any::<bool>(), 0u8..6), 0..100),
        mapped in prop::collection::btree_set(0u8..6, 0..6),
    ) {
        let crosswalk = Crosswalk::from_pairs(
            mapped.iter().map(|code| (format!("A{code}"), format!("9{code}"))),
        );
        let records: Vec<DiagnosisRecord> = rows
            .iter()
            .enumerate()
            .map(|(seq, (icd10, code))| DiagnosisRecord {
                subject_id: SubjectId::new(1),
                hadm_id: HadmId::new(1),
                sequence_number: seq as i64,
                icd_code: format!("A{code}"),
                icd_version: if *icd10 { IcdVersion::Icd10 } else { IcdVersion::Icd9 },
                long_title: String::new(),
            })
            .collect();
        let icd9_rows = rows.iter().filter(|(icd10, _)| !icd10).count();
        let icd10_rows = rows.len() - icd9_rows;

        let normalized = normalize_diagnoses(records, &crosswalk);
        let report = &normalized.report;
        prop_assert_eq!(report.output_rows + report.unmapped_rows, icd10_rows + icd9_rows);
        prop_assert_eq!(normalized.records.len(), report.output_rows);
        prop_assert!(report.is_balanced());
        prop_assert!(normalized.records.iter().all(|record| record.icd_version == IcdVersion::Icd9));
        prop_assert!(
            normalized
                .records
                .windows(2)
                .all(|pair| pair[0].sequence_number <= pair[1].sequence_number)
        );
    }
}
