//! Revision-checked saves through a workspace.

use std::fs;

use storyme_engine::{EngineConfig, SaveOutcome, SaveRequest, Workspace};

use crate::common::{Fixture, listing};

#[test]
fn sequential_saves_advance_the_revision() {
    let fx = Fixture::new();
    let ws = Workspace::with_config(fx.root(), EngineConfig::default());
    let card = ws.create_scene_card("EP01", "01-Opening", None).unwrap();

    let first = ws
        .save_document(&card.document_path, &SaveRequest::new("Draft one\n", 1))
        .unwrap();
    let second = ws
        .save_document(
            "script/EP01/scenes/01-Opening.md",
            &SaveRequest::new("Draft two\n", 2).updated_by("kai"),
        )
        .unwrap();

    assert_eq!(first, SaveOutcome::Saved { rev: 2 });
    assert_eq!(second, SaveOutcome::Saved { rev: 3 });
    let content = fs::read_to_string(&card.document_path).unwrap();
    assert!(content.starts_with("---\nrev: 3\n"));
    assert!(content.contains("updated_by: \"kai\"\n"));
    assert!(content.ends_with("---\nDraft two\n"));
}

#[test]
fn concurrent_editors_produce_a_conflict_artifact() {
    let fx = Fixture::new();
    let mut config = EngineConfig::default();
    config.documents.conflicts_dir = "_merge".to_string();
    let ws = Workspace::with_config(fx.root(), config);
    let doc = fx.project_file("script/EP01/outline.md", "---\nrev: 1\n---\nBase\n");

    // Both editors start from rev 1; the second save loses.
    let winner = ws
        .save_document(&doc, &SaveRequest::new("Editor A\n", 1))
        .unwrap();
    let loser = ws
        .save_document(&doc, &SaveRequest::new("Editor B\n", 1))
        .unwrap();

    assert!(winner.is_saved());
    let SaveOutcome::Conflict {
        current_rev,
        conflict_path,
    } = loser
    else {
        panic!("expected conflict");
    };
    assert_eq!(current_rev, 2);
    assert!(conflict_path.starts_with(fx.root().join("script/EP01/_merge")));
    assert_eq!(listing(&fx.root().join("script/EP01/_merge")).len(), 1);

    let artifact = fs::read_to_string(&conflict_path).unwrap();
    assert!(artifact.contains("- expected_rev: 1\n- current_rev: 2\n"));
    assert!(artifact.contains("## Current\nEditor A\n"));
    assert!(artifact.contains("## Incoming\nEditor B\n"));
    assert!(fs::read_to_string(&doc).unwrap().ends_with("---\nEditor A\n"));
}
