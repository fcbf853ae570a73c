//! Scene reordering through a workspace.

use std::fs;

use storyme_engine::{EngineConfig, ReorderError, Workspace};

use crate::common::{Fixture, listing};

fn seeded(fx: &Fixture, scenes: &[&str]) -> Workspace {
    let ws = Workspace::with_config(fx.root(), EngineConfig::default());
    for scene in scenes {
        let card = ws.create_scene_card("EP01", scene, None).unwrap();
        fs::write(card.media_dir.join("frame.png"), scene.as_bytes()).unwrap();
    }
    ws
}

#[test]
fn swapping_two_scenes_renames_documents_and_folders() {
    let fx = Fixture::new();
    let ws = seeded(&fx, &["01-Opening", "02-Chase"]);

    let report = ws.reorder_scenes("1", &["02-Chase", "01-Opening"]).unwrap();

    let scenes = fx.root().join("script/EP01/scenes");
    assert_eq!(
        listing(&scenes),
        vec![
            ".scene-order.json",
            "01-Chase",
            "01-Chase.md",
            "02-Opening",
            "02-Opening.md"
        ]
    );
    assert_eq!(
        fs::read_to_string(scenes.join("01-Chase.md")).unwrap(),
        "# 02-Chase\n\n"
    );
    assert_eq!(
        fs::read(scenes.join("02-Opening/media/frame.png")).unwrap(),
        b"01-Opening"
    );
    assert_eq!(report.manifest_path, scenes.join(".scene-order.json"));

    let bindings = ws.episode_bindings("EP01").unwrap();
    assert_eq!(bindings.ordered_scenes, vec!["01-Chase", "02-Opening"]);
}

#[test]
fn unprefixed_scenes_get_ranks() {
    let fx = Fixture::new();
    let ws = seeded(&fx, &["Rooftop", "Alley", "Docks"]);

    let report = ws.reorder_scenes("EP01", &["Docks", "Rooftop", "Alley"]).unwrap();

    let names: Vec<&str> = report
        .manifest
        .iter()
        .map(|e| e.scene_name.as_str())
        .collect();
    assert_eq!(names, vec!["01-Docks", "02-Rooftop", "03-Alley"]);
    let orders: Vec<u32> = report.manifest.iter().map(|e| e.order).collect();
    assert_eq!(orders, vec![1, 2, 3]);
}

#[test]
fn manifest_is_written_in_camel_case() {
    let fx = Fixture::new();
    let ws = seeded(&fx, &["A"]);

    let report = ws.reorder_scenes("EP01", &["A"]).unwrap();

    let raw: serde_json::Value =
        serde_json::from_str(&fs::read_to_string(&report.manifest_path).unwrap()).unwrap();
    assert_eq!(raw, serde_json::json!([{"order": 1, "sceneName": "01-A"}]));
}

#[test]
fn collision_with_an_outside_entry_changes_nothing() {
    let fx = Fixture::new();
    let ws = seeded(&fx, &["Opening", "Chase"]);
    let scenes = fx.root().join("script/EP01/scenes");
    fs::write(scenes.join("02-Opening.md"), "stray").unwrap();
    let before = listing(&scenes);

    let err = ws.reorder_scenes("EP01", &["Chase", "Opening"]).unwrap_err();

    assert!(matches!(err, ReorderError::PathOccupied { .. }));
    assert_eq!(listing(&scenes), before);
}
