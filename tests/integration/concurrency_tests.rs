use rayon::prelude::*;
use tempfile::TempDir;

use coredata_model::{FileDiscovery, Model, ModelChecker, validate_model};

use crate::common::fixtures::*;
use crate::common::test_helpers::{parse, write_document};

const FIXTURES: [&str; 6] = [
    PERSON_PET,
    MUSIC_LIBRARY,
    TWO_ENTITY_CYCLE,
    DANGLING_DESTINATION,
    ONE_SIDED_INVERSE,
    UNKNOWN_ELEMENTS,
];

#[test]
fn test_parallel_parsing_matches_sequential() {
    let inputs: Vec<&str> = FIXTURES.iter().cycle().take(60).copied().collect();

    let sequential: Vec<_> = inputs.iter().map(|xml| parse(xml).into_parts()).collect();
    let parallel: Vec<_> = inputs.par_iter().map(|xml| parse(xml).into_parts()).collect();
    assert_eq!(parallel, sequential);
}

#[test]
fn test_shared_model_validates_from_many_threads() {
    let model: Model = parse(MUSIC_LIBRARY).model;
    let expected = validate_model(&model);
    let all: Vec<_> = (0..32).into_par_iter().map(|_| validate_model(&model)).collect();
    assert!(all.iter().all(|diagnostics| *diagnostics == expected));
}

#[tokio::test]
async fn test_report_order_is_input_order() {
    let temp = TempDir::new().unwrap();
    let mut paths = Vec::new();
    for (i, fixture) in FIXTURES.iter().enumerate().rev() {
        paths.push(write_document(temp.path(), &format!("model-{i}.xml"), fixture).await);
    }

    let single = ModelChecker::new(Default::default(), Default::default(), 1);
    let pooled = ModelChecker::new(Default::default(), Default::default(), 4);
    let discovery = FileDiscovery::new();
    let a = single.check_paths(&paths, &discovery).await.unwrap();
    let b = pooled.check_paths(&paths, &discovery).await.unwrap();

    let order: Vec<_> = b.documents.iter().map(|d| d.path.clone()).collect();
    assert_eq!(order, paths);
    for (x, y) in a.documents.iter().zip(&b.documents) {
        assert_eq!(x.diagnostics, y.diagnostics);
        assert_eq!(x.status(), y.status());
    }
    assert_eq!(b.threads, 4);
}
