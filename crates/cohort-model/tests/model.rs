use std::collections::BTreeSet;

use cohort_model::{
    CohortOptions, ContiguityMode, PartitionOptions, StayCountRange, StayKey, SubjectId, HadmId,
    StayId,
};

#[test]
fn partition_options_default_to_ascending_contiguity() {
    let options = PartitionOptions::default();
    assert_eq!(options.contiguity, ContiguityMode::Ascending);
    assert_eq!(
        options.event_sources,
        vec!["chartevents", "labevents", "outputevents"]
    );
    assert!(options.item_allow_list.is_none());
}

#[test]
fn partition_options_builders_apply() {
    let items: BTreeSet<i64> = [220045, 220210].into_iter().collect();
    let options = PartitionOptions::default()
        .with_event_sources(vec!["labevents".to_string()])
        .with_item_allow_list(Some(items.clone()))
        .with_contiguity(ContiguityMode::Unchecked)
        .with_progress(false);
    assert_eq!(options.event_sources, vec!["labevents"]);
    assert_eq!(options.item_allow_list, Some(items));
    assert_eq!(options.contiguity, ContiguityMode::Unchecked);
    assert!(!options.show_progress);
}

#[test]
fn cohort_options_serialize() {
    let options = CohortOptions::default()
        .with_stays_per_admission(StayCountRange::new(1, 2).expect("range"));
    let json = serde_json::to_string(&options).expect("serialize options");
    let round: CohortOptions = serde_json::from_str(&json).expect("deserialize options");
    assert_eq!(round, options);
}

#[test]
fn stay_keys_order_by_subject_first() {
    let a = StayKey {
        subject_id: SubjectId::new(1),
        hadm_id: HadmId::new(99),
        stay_id: StayId::new(999),
    };
    let b = StayKey {
        subject_id: SubjectId::new(2),
        hadm_id: HadmId::new(1),
        stay_id: StayId::new(1),
    };
    assert!(a < b);
    assert_eq!(a.admission().hadm_id, HadmId::new(99));
}
