//! End-to-end slot copies through the service

use lims_model::{
    LabwareState, SlideCosting, TransferDestination, TransferRequest, TransferSource,
};
use lims_test_utils::{
    copy, user, Lab, RecordingStore, ACTIVE_WORK, LIBRARY_PREP, TRANSFER, TRANSFER_DISCARD,
    TRANSFER_USED,
};
use lims_transfer::execute::{NOTE_COSTING, NOTE_LOT, NOTE_PROBE_LOT};
use lims_transfer::validate::{CYTASSIST_OP, CYTASSIST_SLIDE, CYTASSIST_SLIDE_XL};
use lims_transfer::{StorageError, TransferError, VALIDATION_MESSAGE};
use pretty_assertions::assert_eq;
use std::sync::Arc;

fn problems(err: &TransferError) -> Vec<String> {
    err.problems().expect("validation error").to_vec()
}

#[tokio::test]
async fn test_copy_into_new_plate_marks_source_used() {
    let lab = Lab::new();
    let source = lab.tube_with_sample("STAN-1", 1);
    let s1 = source.slots[0].samples[0].clone();
    let store = Arc::new(RecordingStore::new());
    let service = lab.service(store.clone());

    let request = TransferRequest::new(TRANSFER_USED).with_destination(
        TransferDestination::new_labware("96 well plate").with_content(copy("STAN-1", "A1", "A1")),
    );
    let result = service.perform(&user(), &request).await.unwrap();

    assert_eq!(result.labware.len(), 1);
    assert_eq!(result.operations.len(), 1);
    let plate = &result.labware[0];
    assert_eq!(plate.labware_type.name, "96 well plate");
    assert!(plate.barcode.starts_with("STAN-"));
    assert_eq!(plate.slot("A1".parse().unwrap()).unwrap().samples, vec![s1.clone()]);
    assert_eq!(plate.samples().count(), 1);

    let op = &result.operations[0];
    assert_eq!(op.operation_type.name, TRANSFER_USED);
    assert_eq!(op.user.username, "dr6");
    assert_eq!(op.actions.len(), 1);
    assert_eq!(op.actions[0].source_sample, s1);
    assert_eq!(op.actions[0].sample, s1);
    assert_eq!(op.actions[0].source.labware_id, source.id);
    assert_eq!(op.actions[0].destination.labware_id, plate.id);

    assert_eq!(lab.db.labware("STAN-1").unwrap().state, LabwareState::Used);
    assert_eq!(store.call_count(), 0);
}

#[tokio::test]
async fn test_validation_failure_reports_everything_and_writes_nothing() {
    let lab = Lab::new();
    lab.tube_with_sample("STAN-1", 1);
    let labware_before = lab.db.labware_count();
    let samples_before = lab.db.sample_count();
    let store = Arc::new(RecordingStore::new());
    let service = lab.service(store.clone());

    let request = TransferRequest::new(LIBRARY_PREP)
        .with_work_number("SGP404")
        .with_destination(
            TransferDestination::new_labware("96 well plate")
                .with_content(copy("STAN-1", "A1", "A1")),
        )
        .with_destination(
            TransferDestination::new_labware("Flask").with_content(copy("STAN-404", "A1", "A1")),
        );
    let err = service.perform(&user(), &request).await.unwrap_err();

    assert!(err.is_validation());
    assert!(!err.is_retryable());
    assert_eq!(err.to_string(), VALIDATION_MESSAGE);
    assert_eq!(
        problems(&err),
        vec![
            "Unknown labware types: [\"Flask\"]",
            "Unknown source barcode: [\"STAN-404\"]",
            "Unknown work number: \"SGP404\"",
        ]
    );
    assert_eq!(lab.db.labware_count(), labware_before);
    assert_eq!(lab.db.sample_count(), samples_before);
    assert!(lab.db.operations().is_empty());
    assert_eq!(store.call_count(), 0);
}

#[tokio::test]
async fn test_bio_state_change_creates_one_sample_per_source_sample() {
    let lab = Lab::new();
    let source = lab.tube_with_sample("STAN-1", 1);
    let original = source.slots[0].samples[0].clone();
    let samples_before = lab.db.sample_count();
    let service = lab.service(Arc::new(RecordingStore::new()));

    let request = TransferRequest::new(LIBRARY_PREP).with_destination(
        TransferDestination::new_labware("96 well plate")
            .with_content(copy("STAN-1", "A1", "A1"))
            .with_content(copy("STAN-1", "A1", "B1"))
            .with_content(copy("STAN-1", "A1", "C1")),
    );
    let result = service.perform(&user(), &request).await.unwrap();

    assert_eq!(lab.db.sample_count(), samples_before + 1);
    let plate = &result.labware[0];
    let made: Vec<_> = ["A1", "B1", "C1"]
        .iter()
        .map(|a| plate.slot(a.parse().unwrap()).unwrap().samples[0].clone())
        .collect();
    assert!(made.iter().all(|s| s == &made[0]));
    assert_ne!(made[0].id, original.id);
    assert_eq!(made[0].bio_state, lab.library);
    assert_eq!(made[0].tissue, original.tissue);
    assert_eq!(made[0].section, original.section);
    for action in &result.operations[0].actions {
        assert_eq!(action.source_sample, original);
        assert_eq!(action.sample, made[0]);
    }
}

#[tokio::test]
async fn test_bio_state_change_shares_new_sample_across_destinations() {
    let lab = Lab::new();
    let source = lab.tube_with_sample("STAN-1", 1);
    let original = source.slots[0].samples[0].clone();
    let samples_before = lab.db.sample_count();
    let service = lab.service(Arc::new(RecordingStore::new()));

    let request = TransferRequest::new(LIBRARY_PREP)
        .with_destination(
            TransferDestination::new_labware("Tube").with_content(copy("STAN-1", "A1", "A1")),
        )
        .with_destination(
            TransferDestination::new_labware("Tube").with_content(copy("STAN-1", "A1", "A1")),
        );
    let result = service.perform(&user(), &request).await.unwrap();

    assert_eq!(result.labware.len(), 2);
    assert_eq!(lab.db.sample_count(), samples_before + 1);
    let first = &result.labware[0].slots[0].samples;
    let second = &result.labware[1].slots[0].samples;
    assert_eq!(first.len(), 1);
    assert_eq!(first, second);
    assert_ne!(first[0].id, original.id);
    assert_eq!(first[0].bio_state, lab.library);
}

#[tokio::test]
async fn test_requested_bio_state_equal_to_current_keeps_sample() {
    let lab = Lab::new();
    let source = lab.tube_with_sample("STAN-1", 1);
    let original = source.slots[0].samples[0].clone();
    let samples_before = lab.db.sample_count();
    let service = lab.service(Arc::new(RecordingStore::new()));

    let request = TransferRequest::new(TRANSFER).with_destination(
        TransferDestination::new_labware("Tube")
            .with_bio_state("cdna")
            .with_content(copy("stan-1", "A1", "A1")),
    );
    let result = service.perform(&user(), &request).await.unwrap();
    assert_eq!(lab.db.sample_count(), samples_before);
    assert_eq!(result.labware[0].slots[0].samples, vec![original]);
}

#[tokio::test]
async fn test_repeated_copy_is_rejected() {
    let lab = Lab::new();
    lab.tube_with_sample("STAN-1", 1);
    let service = lab.service(Arc::new(RecordingStore::new()));

    let request = TransferRequest::new(TRANSFER).with_destination(
        TransferDestination::new_labware("96 well plate")
            .with_content(copy("STAN-1", "A1", "A1"))
            .with_content(copy("stan-1", "A1", "A1")),
    );
    let err = service.perform(&user(), &request).await.unwrap_err();
    assert_eq!(
        problems(&err),
        vec!["Repeated copy specified: {sourceBarcode=stan-1, sourceAddress=A1, destinationAddress=A1}"]
    );
}

#[tokio::test]
async fn test_same_sample_from_two_slots_is_not_duplicated() {
    let lab = Lab::new();
    let sample = lab.sample(1);
    lab.labware(
        &lab.plate,
        "STAN-P",
        &[("A1", vec![sample.clone()]), ("A2", vec![sample.clone()])],
    );
    let service = lab.service(Arc::new(RecordingStore::new()));

    let request = TransferRequest::new(TRANSFER).with_destination(
        TransferDestination::new_labware("Tube")
            .with_content(copy("STAN-P", "A1", "A1"))
            .with_content(copy("STAN-P", "A2", "A1")),
    );
    let result = service.perform(&user(), &request).await.unwrap();
    assert_eq!(result.labware[0].slots[0].samples, vec![sample]);
    assert_eq!(result.operations[0].actions.len(), 2);
}

#[tokio::test]
async fn test_reused_destination_fills_only_the_named_slot() {
    let lab = Lab::new();
    lab.tube_with_sample("STAN-1", 1);
    let held = lab.sample(2);
    let dest = lab.labware(&lab.plate, "STAN-D", &[("A1", vec![held.clone()])]);
    let labware_before = lab.db.labware_count();
    let service = lab.service(Arc::new(RecordingStore::new()));

    let request = TransferRequest::new(TRANSFER).with_destination(
        TransferDestination::existing("stan-d").with_content(copy("STAN-1", "A1", "B1")),
    );
    let result = service.perform(&user(), &request).await.unwrap();

    assert_eq!(lab.db.labware_count(), labware_before);
    assert_eq!(result.labware[0].id, dest.id);
    let after = lab.db.labware("STAN-D").unwrap();
    assert_eq!(after.slot("A1".parse().unwrap()).unwrap().samples, vec![held]);
    assert_eq!(after.slot("B1".parse().unwrap()).unwrap().samples.len(), 1);
    assert_eq!(after.samples().count(), 2);
}

#[tokio::test]
async fn test_reused_destination_rejects_occupied_slot() {
    let lab = Lab::new();
    lab.tube_with_sample("STAN-1", 1);
    let held = lab.sample(2);
    lab.labware(&lab.plate, "STAN-D", &[("A1", vec![held])]);
    let service = lab.service(Arc::new(RecordingStore::new()));

    let request = TransferRequest::new(TRANSFER).with_destination(
        TransferDestination::existing("STAN-D").with_content(copy("STAN-1", "A1", "A1")),
    );
    let err = service.perform(&user(), &request).await.unwrap_err();
    assert_eq!(problems(&err), vec!["Slot A1 in labware STAN-D is not empty."]);
}

#[tokio::test]
async fn test_library_requested_for_cdna_destination_is_rejected() {
    let lab = Lab::new();
    lab.tube_with_sample("STAN-1", 1);
    let held = lab.sample(2);
    lab.labware(&lab.plate, "STAN-D", &[("A1", vec![held])]);
    let service = lab.service(Arc::new(RecordingStore::new()));

    let request = TransferRequest::new(TRANSFER).with_destination(
        TransferDestination::existing("STAN-D")
            .with_bio_state("Library")
            .with_content(copy("STAN-1", "A1", "B1")),
    );
    let err = service.perform(&user(), &request).await.unwrap_err();
    assert_eq!(
        problems(&err),
        vec!["Bio state Library specified for labware STAN-D, which already uses bio state cDNA."]
    );

    let without_bio_state = TransferRequest::new(TRANSFER).with_destination(
        TransferDestination::existing("STAN-D").with_content(copy("STAN-1", "A1", "B1")),
    );
    assert!(service.perform(&user(), &without_bio_state).await.is_ok());
}

#[tokio::test]
async fn test_cytassist_rejects_middle_slots_of_standard_slide() {
    let lab = Lab::new();
    lab.tube_with_sample("STAN-1", 1);
    let service = lab.service(Arc::new(RecordingStore::new()));

    let request = TransferRequest::new(CYTASSIST_OP).with_destination(
        TransferDestination::new_labware(CYTASSIST_SLIDE)
            .with_pre_barcode("SLIDE-01")
            .with_content(copy("STAN-1", "A1", "B1")),
    );
    let err = service.perform(&user(), &request).await.unwrap_err();
    assert_eq!(
        problems(&err),
        vec!["Slots B1 and C1 are disallowed for use in this operation."]
    );

    let xl = TransferRequest::new(CYTASSIST_OP).with_destination(
        TransferDestination::new_labware(CYTASSIST_SLIDE_XL)
            .with_pre_barcode("SLIDE-02")
            .with_content(copy("STAN-1", "A1", "B1")),
    );
    let result = service.perform(&user(), &xl).await.unwrap();
    assert_eq!(result.labware[0].barcode, "SLIDE-02");
}

#[tokio::test]
async fn test_prebarcoded_destination_takes_its_prebarcode() {
    let lab = Lab::new();
    lab.tube_with_sample("STAN-1", 1);
    let service = lab.service(Arc::new(RecordingStore::new()));

    let request = TransferRequest::new(TRANSFER).with_destination(
        TransferDestination::new_labware("Prebarcoded tube")
            .with_pre_barcode("ext-0001")
            .with_content(copy("STAN-1", "A1", "A1")),
    );
    let result = service.perform(&user(), &request).await.unwrap();
    assert_eq!(result.labware[0].barcode, "EXT-0001");
    assert_eq!(result.labware[0].external_barcode.as_deref(), Some("EXT-0001"));

    let again = service.perform(&user(), &request).await.unwrap_err();
    assert_eq!(
        problems(&again),
        vec!["Labware already exists with barcode EXT-0001."]
    );
}

#[tokio::test]
async fn test_notes_and_work_are_recorded() {
    let lab = Lab::new();
    lab.tube_with_sample("STAN-1", 1);
    let service = lab.service(Arc::new(RecordingStore::new()));

    let request = TransferRequest::new(TRANSFER)
        .with_work_number("sgp1")
        .with_destination(
            TransferDestination::new_labware("Tube")
                .with_costing(SlideCosting::WarrantyReplacement)
                .with_lot_number("lot_1")
                .with_probe_lot_number("probe-9")
                .with_content(copy("STAN-1", "A1", "A1")),
        );
    let result = service.perform(&user(), &request).await.unwrap();
    let op = &result.operations[0];

    let notes: Vec<(String, String)> = lab
        .db
        .notes_for(result.labware[0].id)
        .into_iter()
        .inspect(|note| assert_eq!(note.operation_id, op.id))
        .map(|note| (note.name, note.value))
        .collect();
    assert_eq!(
        notes,
        vec![
            (NOTE_COSTING.to_string(), SlideCosting::WarrantyReplacement.to_string()),
            (NOTE_LOT.to_string(), "LOT_1".to_string()),
            (NOTE_PROBE_LOT.to_string(), "PROBE-9".to_string()),
        ]
    );
    assert_eq!(lab.db.work_operations(ACTIVE_WORK), vec![op.id]);
}

#[tokio::test]
async fn test_discarded_source_is_evicted_once() {
    let lab = Lab::new();
    lab.tube_with_sample("STAN-1", 1);
    let store = Arc::new(RecordingStore::new());
    let service = lab.service(store.clone());

    let request = TransferRequest::new(TRANSFER_DISCARD)
        .with_destination(
            TransferDestination::new_labware("Tube").with_content(copy("STAN-1", "A1", "A1")),
        )
        .with_destination(
            TransferDestination::new_labware("Tube").with_content(copy("stan-1", "A1", "A1")),
        );
    let outcome = service.perform_detailed(&user(), &request).await.unwrap();

    assert_eq!(outcome.result.operations.len(), 2);
    assert_eq!(outcome.evicted, vec!["STAN-1".to_string()]);
    assert_eq!(
        store.calls(),
        vec![("dr6".to_string(), vec!["STAN-1".to_string()])]
    );
    assert_eq!(lab.db.labware("STAN-1").unwrap().state, LabwareState::Discarded);
}

#[tokio::test]
async fn test_declared_state_overrides_discard() {
    let lab = Lab::new();
    lab.tube_with_sample("STAN-1", 1);
    lab.tube_with_sample("STAN-2", 2);
    let store = Arc::new(RecordingStore::new());
    let service = lab.service(store.clone());

    let request = TransferRequest::new(TRANSFER_DISCARD)
        .with_destination(
            TransferDestination::new_labware("96 well plate")
                .with_content(copy("STAN-1", "A1", "A1"))
                .with_content(copy("STAN-2", "A1", "A2")),
        )
        .with_source(TransferSource::new("STAN-1", LabwareState::Active));
    service.perform(&user(), &request).await.unwrap();

    assert_eq!(lab.db.labware("STAN-1").unwrap().state, LabwareState::Active);
    assert_eq!(lab.db.labware("STAN-2").unwrap().state, LabwareState::Discarded);
    assert_eq!(store.evicted(), vec!["STAN-2".to_string()]);
}

#[tokio::test]
async fn test_storage_failure_is_reported_without_undoing_transfer() {
    let lab = Lab::new();
    lab.tube_with_sample("STAN-1", 1);
    let store = Arc::new(RecordingStore::failing(StorageError::Rejected(
        "unknown location".into(),
    )));
    let service = lab.service(store.clone());

    let request = TransferRequest::new(TRANSFER_DISCARD).with_destination(
        TransferDestination::new_labware("Tube").with_content(copy("STAN-1", "A1", "A1")),
    );
    let outcome = service.perform_detailed(&user(), &request).await.unwrap();

    assert_eq!(
        outcome.eviction_error,
        Some(StorageError::Rejected("unknown location".into()))
    );
    assert_eq!(store.call_count(), 1);
    assert_eq!(lab.db.operations().len(), 1);
    assert_eq!(lab.db.labware("STAN-1").unwrap().state, LabwareState::Discarded);
}

#[tokio::test]
async fn test_unusable_sources_are_rejected() {
    let lab = Lab::new();
    let sample = lab.sample(1);
    lab.labware_in_state(
        &lab.tube,
        "STAN-OLD",
        LabwareState::Discarded,
        &[("A1", vec![sample])],
    );
    lab.labware(&lab.tube, "STAN-E", &[]);
    let service = lab.service(Arc::new(RecordingStore::new()));

    let request = TransferRequest::new(TRANSFER).with_destination(
        TransferDestination::new_labware("96 well plate")
            .with_content(copy("STAN-OLD", "A1", "A1"))
            .with_content(copy("STAN-E", "A1", "A2")),
    );
    let err = service.perform(&user(), &request).await.unwrap_err();
    let problems = problems(&err);
    assert!(problems.contains(&"Labware is empty: [STAN-E]".to_string()));
    assert!(problems.contains(&"Labware is discarded: [STAN-OLD]".to_string()));
    assert!(problems.contains(&"Slot A1 in labware STAN-E is empty.".to_string()));
}
