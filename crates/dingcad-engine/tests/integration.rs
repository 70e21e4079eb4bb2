//! Integration tests for load, reload and export through the engine

// Tests are allowed to use expect/unwrap for cleaner error messages
#![allow(clippy::expect_used)]
#![allow(clippy::unwrap_used)]

use approx::assert_relative_eq;
use dingcad_engine::{ChangeKind, Engine, ExportOptions, ReloadOutcome, SceneError, Settings};
use std::fs::{self, File};
use std::path::{Path, PathBuf};
use std::time::{Duration, SystemTime};

/// Write `text` and push the mtime forward so a poll always sees the edit
fn edit(path: &Path, text: &str, generation: u64) {
    fs::write(path, text).unwrap();
    File::options()
        .write(true)
        .open(path)
        .unwrap()
        .set_modified(SystemTime::UNIX_EPOCH + Duration::from_secs(2_000_000 + generation))
        .unwrap();
}

fn canonical(path: &Path) -> PathBuf {
    dingcad_script::normalize_path(path)
}

#[test]
fn reload_follows_import_edits() {
    let dir = tempfile::tempdir().unwrap();
    let entry = dir.path().join("scene.rhai");
    let part = dir.path().join("part.rhai");
    edit(&entry, "import \"part\" as p;\nlet scene = p::make();", 0);
    edit(&part, "fn make() { cube(#{ size: [1, 1, 1] }) }", 0);

    let mut engine = Engine::new();
    engine.load_scene(&entry).expect("initial load");
    assert_eq!(engine.dependencies().len(), 2);
    assert!(engine.poll().unwrap().is_none());

    edit(&part, "fn make() { cube(#{ size: [2, 2, 2] }) }", 1);
    let reload = engine.poll().unwrap().expect("edit should trigger a reload");
    assert_eq!(reload.changed.len(), 1);
    assert_eq!(reload.changed[0].path, canonical(&part));
    assert_eq!(reload.changed[0].kind, ChangeKind::Modified);
    assert!(matches!(reload.outcome, ReloadOutcome::Reloaded { triangles: 12, .. }));
    assert_relative_eq!(engine.solid().unwrap().volume(), 8.0, epsilon = 1e-9);
}

#[test]
fn failed_reload_keeps_previous_scene_and_keeps_watching() {
    let dir = tempfile::tempdir().unwrap();
    let entry = dir.path().join("scene.rhai");
    edit(&entry, "let scene = cube(#{ size: [3, 3, 3] });", 0);

    let mut engine = Engine::new();
    engine.load_scene(&entry).unwrap();
    let before = engine.solid().cloned().unwrap();

    edit(&entry, "let scene = cube(", 1);
    let reload = engine.poll().unwrap().unwrap();
    assert!(matches!(reload.outcome, ReloadOutcome::Failed { .. }));
    assert!(engine.last_error().is_some());
    let kept = engine.solid().unwrap();
    assert!(kept.ptr_eq(&before));
    assert_relative_eq!(kept.volume(), 27.0, epsilon = 1e-9);
    assert_eq!(engine.dependencies(), vec![canonical(&entry)]);

    edit(&entry, "let scene = tetrahedron();", 2);
    let reload = engine.poll().unwrap().unwrap();
    assert!(matches!(reload.outcome, ReloadOutcome::Reloaded { triangles: 4, .. }));
    assert!(engine.last_error().is_none());
}

#[test]
fn watch_on_error_sees_new_imports() {
    let dir = tempfile::tempdir().unwrap();
    let entry = dir.path().join("scene.rhai");
    let helper = dir.path().join("helper.rhai");
    edit(&entry, "import \"helper\" as h;\nlet scene = h::part();", 0);

    let mut engine = Engine::new();
    let err = engine.load_scene(&entry).unwrap_err();
    assert!(err.downcast_ref::<SceneError>().is_some());
    assert!(!engine.has_scene());
    assert_eq!(engine.dependencies().len(), 2);

    edit(&helper, "fn part() { sphere(#{ radius: 1 }) }", 1);
    let reload = engine.poll().unwrap().unwrap();
    assert_eq!(reload.changed[0].kind, ChangeKind::Appeared);
    assert!(matches!(reload.outcome, ReloadOutcome::Reloaded { .. }));
    assert!(engine.has_scene());
}

#[test]
fn missing_entry_is_tracked() {
    let dir = tempfile::tempdir().unwrap();
    let entry = dir.path().join("later.rhai");
    let mut engine = Engine::new();
    let err = engine.load_scene(&entry).unwrap_err();
    assert!(err.to_string().starts_with("Scene file not found: "));

    edit(&entry, "let scene = cube();", 0);
    let reload = engine.poll().unwrap().unwrap();
    assert!(matches!(reload.outcome, ReloadOutcome::Reloaded { .. }));
}

#[test]
fn export_writes_current_scene() {
    let dir = tempfile::tempdir().unwrap();
    let entry = dir.path().join("scene.rhai");
    edit(&entry, "let scene = cube(#{ size: [10, 10, 10] });", 0);

    let settings = Settings {
        export_dir: dir.path().join("exports"),
        ..Settings::default()
    };
    let mut engine = Engine::with_settings(settings);
    engine.load_scene(&entry).unwrap();

    let result = engine.export_to(None).unwrap();
    assert_eq!(result.path, dir.path().join("exports").join("ding.stl"));
    assert_eq!(fs::metadata(&result.path).unwrap().len(), 84 + 50 * 12);

    let named = engine
        .export(&ExportOptions::new(dir.path().join("named")).with_header("bracket v2"))
        .unwrap();
    let bytes = fs::read(&named.path).unwrap();
    assert!(named.path.ends_with("named.stl"));
    assert!(bytes.starts_with(b"bracket v2"));
    assert_eq!(bytes[10], b' ');
}

#[test]
fn explicit_scene_path_wins_over_discovery() {
    let engine = Engine::new();
    let path = engine.resolve_scene_path(Some(Path::new("x/scene.rhai"))).unwrap();
    assert_eq!(path, PathBuf::from("x/scene.rhai"));

    let settings = Settings {
        scene_file_name: "no-such-scene-file-anywhere.rhai".to_string(),
        ..Settings::default()
    };
    let err = Engine::with_settings(settings).resolve_scene_path(None).unwrap_err();
    assert!(err.to_string().starts_with("No scene file given and none found"));
}
