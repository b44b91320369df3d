use std::path::PathBuf;

use tempfile::TempDir;

use coredata_model::bundle::resolve_contents_path;
use coredata_model::{
    BundleError, DocumentStatus, FileDiscovery, ModelChecker, ModelError, load_model_source,
};

use crate::common::fixtures::*;
use crate::common::test_helpers::{write_bundle, write_document};

#[tokio::test]
async fn test_bundle_loads_current_version() {
    let temp = TempDir::new().unwrap();
    let bundle = write_bundle(
        temp.path(),
        "Library",
        &[("Library", PERSON_PET), ("Library 2", MUSIC_LIBRARY)],
        Some("Library 2"),
    )
    .await;

    let checker = ModelChecker::new(Default::default(), Default::default(), 1);
    let loaded = checker.load(&bundle).await.unwrap();
    assert_eq!(loaded.source.resolved.version.as_deref(), Some("Library 2.xcdatamodel"));
    assert_eq!(loaded.source.resolved.bundle.as_deref(), Some(bundle.as_path()));
    assert!(loaded.outcome.model.entity("Song").is_some());
}

#[tokio::test]
async fn test_bundle_without_current_version_takes_last_by_name() {
    let temp = TempDir::new().unwrap();
    let bundle = write_bundle(
        temp.path(),
        "Library",
        &[("Library", MUSIC_LIBRARY), ("Library 2", PERSON_PET)],
        None,
    )
    .await;

    // "Library 2.xcdatamodel" sorts before "Library.xcdatamodel"
    let resolved = resolve_contents_path(&bundle).await.unwrap();
    assert_eq!(resolved.version.as_deref(), Some("Library.xcdatamodel"));
    assert_eq!(
        resolved.contents,
        bundle.join("Library.xcdatamodel").join("contents")
    );
}

#[tokio::test]
async fn test_missing_current_version_is_an_error() {
    let temp = TempDir::new().unwrap();
    let bundle = write_bundle(temp.path(), "Library", &[("Library", PERSON_PET)], Some("Gone")).await;

    let err = load_model_source(&bundle).await.unwrap_err();
    assert!(matches!(err, BundleError::VersionNotFound { ref version, .. } if version == "Gone.xcdatamodel"));
}

#[tokio::test]
async fn test_version_directory_and_plain_file() {
    let temp = TempDir::new().unwrap();
    let bundle = write_bundle(temp.path(), "Zoo", &[("Zoo", PERSON_PET)], None).await;
    let version = bundle.join("Zoo.xcdatamodel");
    let plain = write_document(temp.path(), "plain.xml", PERSON_PET).await;

    let checker = ModelChecker::new(Default::default(), Default::default(), 1);
    let from_version = checker.load(&version).await.unwrap();
    let from_file = checker.load(&plain).await.unwrap();
    assert_eq!(from_version.outcome.model, from_file.outcome.model);
    assert_eq!(from_file.source.resolved.bundle, None);

    let err = checker.load(&temp.path().join("absent.xml")).await.unwrap_err();
    assert!(matches!(err, ModelError::Bundle(BundleError::Io { .. })));
}

#[tokio::test]
async fn test_checker_walks_project_directory() {
    let temp = TempDir::new().unwrap();
    let project = temp.path().join("App");
    write_bundle(&project, "Store", &[("Store", MUSIC_LIBRARY)], Some("Store")).await;
    write_document(
        &project,
        "Legacy/Old.xcdatamodel/contents",
        DANGLING_DESTINATION,
    )
    .await;
    write_document(&project, "Broken.xcdatamodel/contents", MALFORMED).await;
    write_document(&project, "notes.txt", "not a model").await;

    let checker = ModelChecker::new(Default::default(), Default::default(), 2);
    let results = checker
        .check_paths(&[project.clone()], &FileDiscovery::new())
        .await
        .unwrap();

    let found: Vec<(PathBuf, DocumentStatus)> = results
        .documents
        .iter()
        .map(|d| (d.path.strip_prefix(&project).unwrap().to_path_buf(), d.status()))
        .collect();
    assert_eq!(
        found,
        vec![
            (PathBuf::from("Broken.xcdatamodel"), DocumentStatus::Failed),
            (PathBuf::from("Legacy/Old.xcdatamodel"), DocumentStatus::Invalid),
            (PathBuf::from("Store.xcdatamodeld"), DocumentStatus::Clean),
        ]
    );
    assert_eq!(results.exit_code(false), 2);
}
