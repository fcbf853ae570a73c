//! Batch ingest: naming, sidecars, backlinks, failure isolation.

use std::fs;

use serde_json::Value;
use storyme_engine::{
    AssetId, BatchProgress, IngestError, IngestMode, IngestRequest, ItemResult, NodeType,
    TargetDescriptor, ValidationError,
};

use crate::common::{FaultyFs, Fixture, engine, engine_on, listing, scene_card};

#[test]
fn duplicate_names_get_numeric_suffixes() {
    let fx = Fixture::new();
    let a = fx.source("day1/photo.png", b"first");
    let b = fx.source("day2/photo.png", b"second");

    let result = engine()
        .ingest_batch(&IngestRequest::new(fx.root(), scene_card("1", "01-Opening"), [a, b]))
        .unwrap();

    let images = fx.root().join("script/EP01/scenes/01-Opening/media/images");
    assert_eq!(result.summary.completed, 2);
    assert_eq!(result.summary.failed, 0);
    assert_eq!(
        listing(&images),
        vec![
            "photo-2.png",
            "photo-2.png.meta.json",
            "photo.png",
            "photo.png.meta.json"
        ]
    );
    assert_eq!(fs::read(images.join("photo.png")).unwrap(), b"first");
    assert_eq!(fs::read(images.join("photo-2.png")).unwrap(), b"second");
    assert_eq!(result.transaction_id.as_str(), "id-1");
}

#[test]
fn scene_card_document_and_sidecar_are_linked() {
    let fx = Fixture::new();
    let doc = fx.project_file("script/EP01/scenes/01-Opening.md", "# Opening\n");
    let clip = fx.source("take.mp4", b"video");

    let result = engine()
        .ingest_batch(&IngestRequest::new(fx.root(), scene_card("EP1", "01-Opening"), [clip]))
        .unwrap();

    let ItemResult::Success {
        destination_path,
        metadata_path,
        asset_id,
        ..
    } = &result.results[0]
    else {
        panic!("expected success, got {:?}", result.results[0]);
    };
    assert_eq!(asset_id, &AssetId::new("id-2"));
    assert!(destination_path.ends_with("01-Opening/media/videos/take.mp4"));

    let content = fs::read_to_string(&doc).unwrap();
    assert_eq!(
        content,
        "# Opening\n\n## Linked Assets\n- [[id-2]] 01-Opening/media/videos/take.mp4\n"
    );

    let sidecar: Value = serde_json::from_str(&fs::read_to_string(metadata_path).unwrap()).unwrap();
    assert_eq!(sidecar["schema_version"], 1);
    assert_eq!(sidecar["asset_id"], "id-2");
    assert_eq!(sidecar["media_type"], "video");
    assert_eq!(sidecar["target_node"], "scene_card");
    assert_eq!(sidecar["target_logical_path"], "script/EP01/scenes/01-Opening");
    assert_eq!(sidecar["backlinks"][0], "script/EP01/scenes/01-Opening.md");
}

#[test]
fn asset_category_targets_have_no_companion() {
    let fx = Fixture::new();
    let portrait = fx.source("mira.jpg", b"jpg");

    let result = engine()
        .ingest_batch(&IngestRequest::new(
            fx.root(),
            TargetDescriptor::new("角色"),
            [portrait],
        ))
        .unwrap();

    assert_eq!(result.target.node_type, NodeType::Character);
    assert_eq!(result.target.companion_document_path, None);
    let stored = fx.root().join("assets/characters/images/mira.jpg");
    assert!(stored.exists());
    let sidecar: Value =
        serde_json::from_str(&fs::read_to_string(stored.with_extension("jpg.meta.json")).unwrap())
            .unwrap();
    assert_eq!(sidecar["backlinks"], serde_json::json!([]));
}

#[test]
fn explicit_companion_document_overrides_target() {
    let fx = Fixture::new();
    let notes = fx.root().join("notes/board.md");
    let sketch = fx.source("sketch.png", b"png");

    engine()
        .ingest_batch(
            &IngestRequest::new(fx.root(), TargetDescriptor::new("prop"), [sketch])
                .with_companion_document(&notes),
        )
        .unwrap();

    let content = fs::read_to_string(&notes).unwrap();
    assert!(content.contains("- [[id-2]] ../assets/props/images/sketch.png"));
}

#[test]
fn failing_items_do_not_stop_the_batch() {
    let fx = Fixture::new();
    let good = fx.source("a.wav", b"a");
    let missing = fx.inbox.path().join("missing.wav");
    let also_good = fx.source("b.wav", b"b");
    let mut seen: Vec<BatchProgress> = Vec::new();

    let result = engine()
        .ingest_batch_with_progress(
            &IngestRequest::new(
                fx.root(),
                TargetDescriptor::new("episode").with_episode("3"),
                [good, missing.clone(), also_good],
            ),
            |progress| seen.push(*progress),
        )
        .unwrap();

    assert_eq!(result.summary.total, 3);
    assert_eq!(result.summary.completed, 2);
    assert_eq!(result.summary.failed, 1);
    assert!(!result.results[1].is_success());
    assert_eq!(result.results[1].source_path(), missing.as_path());

    assert_eq!(seen.len(), 3);
    assert_eq!(
        seen[2],
        BatchProgress {
            processed: 3,
            total: 3,
            completed: 2,
            failed: 1
        }
    );
    assert_eq!(
        listing(&fx.root().join("script/EP03/resources/audio")),
        vec!["a.wav", "a.wav.meta.json", "b.wav", "b.wav.meta.json"]
    );
}

#[test]
fn sidecar_write_failure_is_an_item_failure() {
    let fx = Fixture::new();
    let photo = fx.source("photo.png", b"png");
    let fs_impl = FaultyFs {
        fail_writes_ending_with: Some(".meta.json".to_string()),
        ..FaultyFs::default()
    };

    let result = engine_on(fs_impl)
        .ingest_batch(&IngestRequest::new(fx.root(), TargetDescriptor::new("assets"), [photo]))
        .unwrap();

    assert_eq!(result.summary.failed, 1);
    let ItemResult::Failed { error, .. } = &result.results[0] else {
        panic!("expected failure");
    };
    assert!(error.contains("sidecar"), "{error}");
}

#[test]
fn move_mode_relocates_sources() {
    let fx = Fixture::new();
    let folder = fx.inbox.path().join("refs");
    fx.source("refs/one.png", b"1");

    let result = engine()
        .ingest_batch(
            &IngestRequest::new(fx.root(), TargetDescriptor::new("scene"), [folder.clone()])
                .with_mode(IngestMode::Move),
        )
        .unwrap();

    assert_eq!(result.mode, IngestMode::Move);
    assert!(!folder.exists());
    assert!(fx.root().join("assets/scenes/files/refs/one.png").exists());
}

#[test]
fn cross_device_moves_fall_back_to_copy() {
    let fx = Fixture::new();
    let clip = fx.source("clip.mov", b"mov");
    let mut engine = engine_on(FaultyFs::cross_device());

    let result = engine
        .ingest_batch(
            &IngestRequest::new(fx.root(), TargetDescriptor::new("assets"), [clip.clone()])
                .with_mode(IngestMode::Move),
        )
        .unwrap();

    assert_eq!(result.summary.completed, 1);
    assert!(engine.filesystem().renames.get() >= 1);
    assert!(!clip.exists());
    assert_eq!(
        fs::read(fx.root().join("assets/videos/clip.mov")).unwrap(),
        b"mov"
    );
}

#[test]
fn invalid_requests_touch_nothing() {
    let fx = Fixture::new();
    let photo = fx.source("photo.png", b"png");
    let mut engine = engine();

    let err = engine
        .ingest_batch(&IngestRequest::new(
            fx.root(),
            TargetDescriptor::new("storyboard"),
            [photo.clone()],
        ))
        .unwrap_err();
    assert!(matches!(err, IngestError::Validation(ValidationError::Target(_))));

    let err = engine
        .ingest_batch(&IngestRequest::new(
            fx.root(),
            TargetDescriptor::new("scene_card").with_episode("1"),
            [photo],
        ))
        .unwrap_err();
    assert!(matches!(err, IngestError::Validation(ValidationError::Target(_))));

    assert!(listing(fx.root()).is_empty());
    assert!(engine.pending_transaction().is_none());
}

#[test]
fn batch_result_serializes_in_camel_case() {
    let fx = Fixture::new();
    let photo = fx.source("photo.png", b"png");

    let result = engine()
        .ingest_batch(&IngestRequest::new(fx.root(), scene_card("2", "Rooftop"), [photo]))
        .unwrap();
    let value = serde_json::to_value(&result).unwrap();

    assert_eq!(value["mode"], "copy");
    assert_eq!(value["transactionId"], "id-1");
    assert_eq!(value["summary"]["completed"], 1);
    assert_eq!(value["target"]["nodeType"], "scene_card");
    assert_eq!(value["target"]["logicalPath"], "script/EP02/scenes/Rooftop");
    assert_eq!(value["results"][0]["status"], "success");
    assert_eq!(value["results"][0]["assetId"], "id-2");
}
