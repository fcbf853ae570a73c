//! Workspace flows combined with ingest.

use std::fs;

use storyme_engine::{
    EngineConfig, IngestEngine, IngestRequest, ItemResult, SequentialIds, Workspace,
};

use crate::common::{Fixture, scene_card};

#[test]
fn project_config_drives_layout_and_authorship() {
    let fx = Fixture::new();
    fx.project_file(
        ".storyme/config.toml",
        "[layout]\nscript_dir = \"剧本\"\n\n[documents]\ndefault_author = \"writer\"\n",
    );

    let ws = Workspace::open(fx.root()).unwrap();
    let card = ws.create_scene_card("EP04", "Harbor", None).unwrap();
    let asset = ws.create_asset("prop", "Lantern", "Brass.").unwrap();

    assert_eq!(
        card.document_path,
        fx.root().join("剧本/EP04/scenes/Harbor.md")
    );
    let doc = fs::read_to_string(&asset.document_path).unwrap();
    assert!(doc.contains("updated_by: \"writer\"\n"));
    assert!(doc.contains("type: \"prop\"\n"));
}

#[test]
fn ingested_media_is_found_by_backlink_lookup() {
    let fx = Fixture::new();
    let ws = Workspace::with_config(fx.root(), EngineConfig::default());
    ws.create_scene_card("EP01", "01-Opening", None).unwrap();
    ws.create_scene_card("EP01", "02-Chase", None).unwrap();
    let photo = fx.source("photo.png", b"png");
    let mut engine = IngestEngine::from_config(ws.config()).with_ids(SequentialIds::new("id"));

    let result = engine
        .ingest_batch(&IngestRequest::new(
            fx.root(),
            scene_card("EP01", "02-Chase"),
            [photo],
        ))
        .unwrap();
    let ItemResult::Success { asset_id, .. } = &result.results[0] else {
        panic!("expected success");
    };

    let found = ws.asset_backlinks(asset_id).unwrap();
    assert_eq!(
        found,
        vec![fx.root().join("script/EP01/scenes/02-Chase.md")]
    );

    engine.undo_last_import();
    assert!(ws.asset_backlinks(asset_id).unwrap().is_empty());
}
