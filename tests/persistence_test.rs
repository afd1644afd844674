//! Blob round-trip and determinism tests across service instances.

use std::fs;
use std::path::Path;
use std::sync::Arc;

use depscan::{DependencyService, Settings};
use tempfile::TempDir;

const ID_SCENE: &str = "aaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaa";
const ID_MAT: &str = "bbbbbbbbbbbbbbbbbbbbbbbbbbbbbbbb";
const ID_MISSING: &str = "eeeeeeeeeeeeeeeeeeeeeeeeeeeeeeee";

fn write_asset(root: &Path, name: &str, guid: &str, body: &str) {
    fs::write(root.join(name), body).unwrap();
    fs::write(
        root.join(format!("{name}.meta")),
        format!("fileFormatVersion: 2\nguid: {guid}\n"),
    )
    .unwrap();
}

fn write_project(root: &Path) {
    write_asset(
        root,
        "scene.unity",
        ID_SCENE,
        &format!("%YAML 1.1\nm_Material: {{guid: {ID_MAT}}}\nm_Gone: {{guid: {ID_MISSING}}}\n"),
    );
    write_asset(root, "rock.mat", ID_MAT, "binary");
}

fn settings_for(root: &Path) -> Arc<Settings> {
    let mut settings = Settings::default();
    settings.workspace_root = Some(root.to_path_buf());
    settings.scan.project_root = Some(root.to_path_buf());
    settings.scan.parallel_threads = 2;
    Arc::new(settings)
}

#[test]
fn test_rebuild_over_identical_inputs_is_byte_identical() {
    let dir = TempDir::new().unwrap();
    write_project(dir.path());

    let settings = settings_for(dir.path());
    let blob_path = settings.blob_path();

    DependencyService::new(settings.clone()).build().unwrap();
    let first = fs::read(&blob_path).unwrap();

    DependencyService::new(settings).build().unwrap();
    let second = fs::read(&blob_path).unwrap();

    assert_eq!(first, second);
}

#[test]
fn test_loaded_blob_answers_like_the_builder() {
    let dir = TempDir::new().unwrap();
    write_project(dir.path());

    let settings = settings_for(dir.path());
    let builder_service = DependencyService::new(settings.clone());
    builder_service.build().unwrap();

    let loader_service = DependencyService::new(settings);
    loader_service.ensure_ready().unwrap();

    for query in ["all", "is:missing", "is:broken", "t:mat", "in=1", ID_MAT] {
        let built = builder_service.query(query, None).unwrap();
        let loaded = loader_service.query(query, None).unwrap();
        assert_eq!(built, loaded, "diverged on '{query}'");
    }
}

#[test]
fn test_corrupt_blob_triggers_full_rebuild() {
    let dir = TempDir::new().unwrap();
    write_project(dir.path());

    let settings = settings_for(dir.path());
    DependencyService::new(settings.clone()).build().unwrap();

    let blob_path = settings.blob_path();
    fs::write(&blob_path, b"garbage that is not an index").unwrap();

    let service = DependencyService::new(settings);
    service.ensure_ready().unwrap();

    assert_eq!(service.query("all", None).unwrap().len(), 2);
    // The rebuild rewrote a readable blob over the corrupt one.
    assert_eq!(&fs::read(&blob_path).unwrap()[..4], b"DIDX");
}

#[test]
fn test_stale_format_version_triggers_full_rebuild() {
    let dir = TempDir::new().unwrap();
    write_project(dir.path());

    let settings = settings_for(dir.path());
    DependencyService::new(settings.clone()).build().unwrap();

    let blob_path = settings.blob_path();
    let original = fs::read(&blob_path).unwrap();
    let mut blob = original.clone();
    blob[4] = 0xFF;
    fs::write(&blob_path, &blob).unwrap();

    let service = DependencyService::new(settings);
    service.ensure_ready().unwrap();

    assert_eq!(fs::read(&blob_path).unwrap(), original);
}

#[test]
fn test_blob_survives_removal_of_source_files() {
    let dir = TempDir::new().unwrap();
    write_project(dir.path());

    let settings = settings_for(dir.path());
    DependencyService::new(settings.clone()).build().unwrap();

    // Queries answer from the blob even after the tree changes.
    fs::remove_file(dir.path().join("rock.mat")).unwrap();
    fs::remove_file(dir.path().join("rock.mat.meta")).unwrap();

    let service = DependencyService::new(settings);
    let results = service.query("t:mat", None).unwrap();
    assert_eq!(results.len(), 1);
    assert_eq!(results[0].path.as_deref(), Some("rock.mat"));
}
