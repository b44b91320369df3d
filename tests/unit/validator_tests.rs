use coredata_model::parser::parse_with;
use coredata_model::validator::validate_with;
use coredata_model::{
    AttributeType, DiagnosticKind, DiagnosticPath, Entity, Model, ModelBuilder, Relationship,
    Severity, ValidationPolicy, Vocabulary, XmlDocument, validate_model,
};

use crate::common::fixtures::*;
use crate::common::test_helpers::{count_kind, parse};

#[test]
fn test_two_entity_cycle_is_reported_once() {
    let outcome = parse(TWO_ENTITY_CYCLE);
    assert_eq!(outcome.diagnostics.len(), 1);
    assert_eq!(outcome.diagnostics[0].kind, DiagnosticKind::InheritanceCycle);

    // ancestry queries terminate on the cyclic model
    let a = outcome.model.entity("A").unwrap();
    assert!(outcome.model.ancestors(a).count() <= 2);
    assert!(outcome.model.resolve_attribute(a, "missing").is_none());
}

#[test]
fn test_dangling_destination_keeps_relationship() {
    let outcome = parse(DANGLING_DESTINATION);
    assert_eq!(outcome.diagnostics.len(), 1);
    let diagnostic = &outcome.diagnostics[0];
    assert_eq!(diagnostic.kind, DiagnosticKind::DanglingReference);
    assert_eq!(diagnostic.path, DiagnosticPath::member("Person", "pets"));
    assert!(diagnostic.offset.is_some());

    let person = outcome.model.entity("Person").unwrap();
    let pets = person.relationship("pets").unwrap();
    assert_eq!(pets.destination, "Pet");
    assert!(outcome.model.destination(pets).is_none());
}

#[test]
fn test_one_sided_inverse_follows_policy() {
    let outcome = parse(ONE_SIDED_INVERSE);
    assert_eq!(outcome.diagnostics.len(), 1);
    assert_eq!(outcome.diagnostics[0].kind, DiagnosticKind::InverseAsymmetry);
    assert_eq!(outcome.diagnostics[0].severity, Severity::Warning);
    assert_eq!(outcome.diagnostics[0].path, DiagnosticPath::member("Pet", "owner"));

    let document = XmlDocument::parse(ONE_SIDED_INVERSE.as_bytes()).unwrap();
    let strict = parse_with(&document, &Vocabulary::default(), &ValidationPolicy::strict());
    assert_eq!(strict.diagnostics.len(), 1);
    assert_eq!(strict.diagnostics[0].severity, Severity::Error);
}

#[test]
fn test_removing_an_inverse_gives_one_asymmetry() {
    let symmetric = parse(PERSON_PET);
    assert!(validate_model(&symmetric.model).is_empty());

    let mut entities: Vec<Entity> = symmetric.model.entities().to_vec();
    let pet = entities.iter_mut().find(|e| e.name == "Pet").unwrap();
    pet.relationships[0].inverse = None;
    let broken = Model::from_parts(
        symmetric.model.version_identifier().map(str::to_string),
        symmetric.model.metadata().to_vec(),
        entities,
        Vec::new(),
    );

    let diagnostics = validate_model(&broken);
    assert_eq!(diagnostics.len(), 1);
    assert_eq!(diagnostics[0].kind, DiagnosticKind::InverseAsymmetry);
    assert_eq!(diagnostics[0].path, DiagnosticPath::member("Person", "pets"));
}

#[test]
fn test_missing_inverse_warning_is_opt_in() {
    let mut builder = ModelBuilder::new();
    let node = builder.add_entity("Node", None).unwrap();
    builder.add_relationship(node, "next", "Node").unwrap();
    let model = builder.seal();

    assert!(validate_model(&model).is_empty());

    let policy = ValidationPolicy {
        warn_missing_inverse: true,
        ..ValidationPolicy::default()
    };
    let diagnostics = validate_with(&model, &policy);
    assert_eq!(count_kind(&diagnostics, DiagnosticKind::MissingInverse), 1);
    assert_eq!(diagnostics[0].severity, Severity::Warning);
}

#[test]
fn test_programmatic_model_with_problems() {
    let mut builder = ModelBuilder::new();
    let song = builder.add_entity("Song", Some("Media")).unwrap();
    builder
        .add_attribute(song, "title", AttributeType::String)
        .unwrap();
    builder
        .add_relationship_with(
            song,
            Relationship::new("album", "Song")
                .with_inverse("tracks")
                .with_ordered(true),
        )
        .unwrap();
    let local = builder.add_configuration("Local").unwrap();
    builder.add_configuration_member(local, "Playlist").unwrap();
    let model = builder.seal();

    let diagnostics = validate_model(&model);
    let described: Vec<(DiagnosticKind, String)> = diagnostics
        .iter()
        .map(|d| (d.kind, d.path.to_string()))
        .collect();
    assert_eq!(
        described,
        vec![
            (DiagnosticKind::DanglingReference, "Song".to_string()),
            (DiagnosticKind::IneffectiveFlag, "Song.album".to_string()),
            (DiagnosticKind::DanglingReference, "Song.album".to_string()),
            (
                DiagnosticKind::DanglingReference,
                "configuration Local: Playlist".to_string()
            ),
        ]
    );
}

#[test]
fn test_validation_is_read_only_and_repeatable() {
    let outcome = parse(MUSIC_LIBRARY);
    let before = outcome.model.clone();
    let first = validate_model(&outcome.model);
    let second = validate_model(&outcome.model);
    assert_eq!(first, second);
    assert_eq!(outcome.model, before);
}
