//! Single-slot undo of the last ingest batch.

use std::fs;

use storyme_engine::{
    IngestMode, IngestRequest, TargetDescriptor, TransactionId, UndoOutcome, UndoReport,
};

use crate::common::{FaultyFs, Fixture, engine, engine_on, listing, scene_card};

#[test]
fn undo_restores_the_companion_document_and_removes_imports() {
    let fx = Fixture::new();
    let doc = fx.project_file(
        "script/EP01/scenes/01-Opening.md",
        "# Opening\n\n## Linked Assets\n- [[old]] 01-Opening/media/images/old.png\n",
    );
    let before = fs::read_to_string(&doc).unwrap();
    let a = fx.source("day1/photo.png", b"first");
    let b = fx.source("day2/photo.png", b"second");
    let mut engine = engine();

    engine
        .ingest_batch(&IngestRequest::new(
            fx.root(),
            scene_card("1", "01-Opening"),
            [a.clone(), b],
        ))
        .unwrap();
    assert_ne!(fs::read_to_string(&doc).unwrap(), before);

    let outcome = engine.undo_last_import();

    // One document restore, two sidecars, two copies.
    assert_eq!(
        outcome,
        UndoOutcome::Undone(UndoReport {
            transaction_id: TransactionId::new("id-1"),
            reverted_count: 5,
            failed_steps: 0,
        })
    );
    assert_eq!(fs::read_to_string(&doc).unwrap(), before);
    assert!(listing(&fx.root().join("script/EP01/scenes/01-Opening/media/images")).is_empty());
    assert_eq!(fs::read(a).unwrap(), b"first");
}

#[test]
fn undo_removes_a_companion_document_the_batch_created() {
    let fx = Fixture::new();
    let photo = fx.source("photo.png", b"png");
    let doc = fx.root().join("script/EP02/scenes/Rooftop.md");
    let mut engine = engine();

    engine
        .ingest_batch(&IngestRequest::new(fx.root(), scene_card("2", "Rooftop"), [photo]))
        .unwrap();
    assert!(doc.exists());

    engine.undo_last_import();

    assert!(!doc.exists());
}

#[test]
fn undo_moves_sources_back() {
    let fx = Fixture::new();
    let clip = fx.source("shots/clip.mp4", b"clip");
    let mut engine = engine();

    engine
        .ingest_batch(
            &IngestRequest::new(fx.root(), TargetDescriptor::new("assets"), [clip.clone()])
                .with_mode(IngestMode::Move),
        )
        .unwrap();
    assert!(!clip.exists());

    let UndoOutcome::Undone(report) = engine.undo_last_import() else {
        panic!("expected undo");
    };

    assert_eq!(report.failed_steps, 0);
    assert_eq!(fs::read(&clip).unwrap(), b"clip");
    assert!(listing(&fx.root().join("assets/videos")).is_empty());
}

#[test]
fn undo_of_cross_device_move_copies_back() {
    let fx = Fixture::new();
    let clip = fx.source("clip.mp4", b"clip");
    let mut engine = engine_on(FaultyFs::cross_device());

    engine
        .ingest_batch(
            &IngestRequest::new(fx.root(), TargetDescriptor::new("assets"), [clip.clone()])
                .with_mode(IngestMode::Move),
        )
        .unwrap();
    engine.undo_last_import();

    assert_eq!(fs::read(&clip).unwrap(), b"clip");
    assert!(!fx.root().join("assets/videos/clip.mp4").exists());
}

#[test]
fn undo_is_single_use() {
    let fx = Fixture::new();
    let photo = fx.source("photo.png", b"png");
    let mut engine = engine();

    engine
        .ingest_batch(&IngestRequest::new(fx.root(), TargetDescriptor::new("prop"), [photo]))
        .unwrap();

    assert!(matches!(engine.undo_last_import(), UndoOutcome::Undone(_)));
    assert_eq!(engine.undo_last_import(), UndoOutcome::NothingToUndo);
    assert_eq!(
        serde_json::to_value(engine.undo_last_import()).unwrap(),
        serde_json::json!({"undone": false, "reason": "no-transaction"})
    );
}

#[test]
fn only_the_latest_batch_can_be_undone() {
    let fx = Fixture::new();
    let first = fx.source("first.png", b"1");
    let second = fx.source("second.png", b"2");
    let mut engine = engine();
    let images = fx.root().join("assets/props/images");

    engine
        .ingest_batch(&IngestRequest::new(fx.root(), TargetDescriptor::new("prop"), [first]))
        .unwrap();
    engine
        .ingest_batch(&IngestRequest::new(fx.root(), TargetDescriptor::new("prop"), [second]))
        .unwrap();
    engine.undo_last_import();

    assert_eq!(listing(&images), vec!["first.png", "first.png.meta.json"]);
}

#[test]
fn failed_undo_steps_are_counted_and_skipped() {
    let fx = Fixture::new();
    let a = fx.source("a.png", b"a");
    let b = fx.source("b.png", b"b");
    let fs_impl = FaultyFs {
        fail_removes_ending_with: Some("a.png".to_string()),
        ..FaultyFs::default()
    };
    let mut engine = engine_on(fs_impl);

    engine
        .ingest_batch(&IngestRequest::new(fx.root(), TargetDescriptor::new("assets"), [a, b]))
        .unwrap();
    let UndoOutcome::Undone(report) = engine.undo_last_import() else {
        panic!("expected undo");
    };

    // Two sidecars and b.png revert; a.png stays.
    assert_eq!(report.reverted_count, 3);
    assert_eq!(report.failed_steps, 1);
    assert_eq!(listing(&fx.root().join("assets/images")), vec!["a.png"]);
    assert!(engine.pending_transaction().is_none());
}

#[test]
fn undo_removes_the_copy_a_failed_cross_device_move_left_behind() {
    let fx = Fixture::new();
    let clip = fx.source("shoot/clip.mov", b"clip");
    let fs_impl = FaultyFs {
        cross_device: true,
        fail_removes_ending_with: Some(clip.to_string_lossy().into_owned()),
        ..FaultyFs::default()
    };
    let mut engine = engine_on(fs_impl);
    let stored = fx.root().join("assets/videos/clip.mov");

    let result = engine
        .ingest_batch(
            &IngestRequest::new(fx.root(), TargetDescriptor::new("assets"), [clip.clone()])
                .with_mode(IngestMode::Move),
        )
        .unwrap();
    assert_eq!(result.summary.failed, 1);
    assert!(stored.exists());
    assert_eq!(
        engine.pending_transaction().unwrap().copy_destinations,
        vec![stored.clone()]
    );

    let UndoOutcome::Undone(report) = engine.undo_last_import() else {
        panic!("expected undo");
    };

    assert_eq!(report.reverted_count, 1);
    assert_eq!(report.failed_steps, 0);
    assert!(!stored.exists());
    assert_eq!(fs::read(&clip).unwrap(), b"clip");
}
