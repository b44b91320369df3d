use coredata_model::parser::parse_with;
use coredata_model::{
    AttributeType, DefaultValue, DeleteRule, DiagnosticKind, DiagnosticPath, Severity,
    ValidationPolicy, Vocabulary, XmlDocument,
};

use crate::common::fixtures::*;
use crate::common::test_helpers::{count_kind, kinds, parse};

#[test]
fn test_person_pet_scenario() {
    let outcome = parse(PERSON_PET);
    assert!(outcome.diagnostics.is_empty(), "{:?}", outcome.diagnostics);

    let model = &outcome.model;
    assert_eq!(model.entities().len(), 2);

    let person = model.entity("Person").unwrap();
    let pets = person.relationship("pets").unwrap();
    assert!(pets.to_many);
    assert_eq!(pets.delete_rule, DeleteRule::Cascade);
    assert_eq!(model.destination(pets).unwrap().name, "Pet");

    let owner = model.inverse_of(pets).unwrap();
    assert_eq!(owner.name, "owner");
    assert!(!owner.to_many);
    assert_eq!(owner.max_count, Some(1));
    assert_eq!(model.inverse_of(owner).unwrap().name, "pets");
}

#[test]
fn test_full_document_is_read() {
    let outcome = parse(MUSIC_LIBRARY);
    assert!(outcome.diagnostics.is_empty(), "{:?}", outcome.diagnostics);
    let model = &outcome.model;

    assert_eq!(model.version_identifier(), Some("2.1"));
    let media = model.entity("Media").unwrap();
    assert!(media.is_abstract);
    assert_eq!(media.user_info.get("owner"), Some("catalog"));
    assert_eq!(
        media.attribute("added").unwrap().default_value,
        Some(DefaultValue::Date(694224000.0))
    );

    let song = model.entity("Song").unwrap();
    assert_eq!(song.class_name.as_deref(), Some("SongMO"));
    assert_eq!(song.parent.as_deref(), Some("Media"));
    let plays = song.attribute("plays").unwrap();
    assert_eq!(plays.attribute_type, AttributeType::Integer32);
    assert_eq!(plays.default_value, Some(DefaultValue::Integer(0)));
    assert_eq!(
        plays.extra_attributes,
        vec![("usesScalarValueType".to_string(), "YES".to_string())]
    );
    assert_eq!(
        song.attribute("explicit").unwrap().default_value,
        Some(DefaultValue::Boolean(false))
    );
    assert!(song.attribute("cachedLength").unwrap().transient);
    assert_eq!(song.fetch_index("byPlays").unwrap().elements[0].property, "plays");

    let (owner, title) = model.resolve_attribute(song, "title").unwrap();
    assert_eq!(owner.name, "Media");
    assert!(title.optional);

    let songs = model.entity("Album").unwrap().relationship("songs").unwrap();
    assert!(songs.to_many && songs.ordered);

    let cloud = model.configuration("Cloud").unwrap();
    assert_eq!(cloud.entities, vec!["Song", "Album"]);
}

#[test]
fn test_unknown_elements_are_warnings_in_document_order() {
    let outcome = parse(UNKNOWN_ELEMENTS);
    assert_eq!(outcome.diagnostics.len(), 2);
    assert!(outcome
        .diagnostics
        .iter()
        .all(|d| d.kind == DiagnosticKind::UnknownElement && d.severity == Severity::Warning));
    assert_eq!(outcome.diagnostics[0].path, DiagnosticPath::entity("Person"));
    assert_eq!(outcome.diagnostics[1].path, DiagnosticPath::model());
    assert!(outcome.diagnostics[0].offset < outcome.diagnostics[1].offset);
    assert!(outcome.model.entity("Person").unwrap().attribute("name").is_some());
}

#[test]
fn test_missing_name_excludes_element() {
    let outcome = parse(MISSING_NAMES);
    assert_eq!(
        kinds(&outcome.diagnostics),
        vec![DiagnosticKind::MissingAttribute, DiagnosticKind::MissingAttribute]
    );
    assert!(outcome.has_errors());
    assert_eq!(outcome.model.entities().len(), 1);
    let person = outcome.model.entity("Person").unwrap();
    assert_eq!(person.attributes.len(), 1);
    assert_eq!(person.attributes[0].name, "age");
}

#[test]
fn test_malformed_input_reports_offset() {
    let err = coredata_model::parse_model(MALFORMED.as_bytes()).unwrap_err();
    assert!(err.offset > 0);
    assert!(err.offset <= MALFORMED.len());
}

#[test]
fn test_wrong_root_gives_empty_model() {
    let outcome = parse("<plist><dict/></plist>");
    assert_eq!(kinds(&outcome.diagnostics), vec![DiagnosticKind::UnknownElement]);
    assert_eq!(outcome.diagnostics[0].severity, Severity::Error);
    assert!(outcome.model.entities().is_empty());
}

#[test]
fn test_duplicate_entity_keeps_first() {
    let outcome = parse(
        r#"<model><entity name="A"><attribute name="x" attributeType="String"/></entity><entity name="A"/></model>"#,
    );
    assert_eq!(kinds(&outcome.diagnostics), vec![DiagnosticKind::NameCollision]);
    assert_eq!(outcome.model.entities().len(), 1);
    assert!(outcome.model.entity("A").unwrap().attribute("x").is_some());
}

#[test]
fn test_inherited_collision_rejects_redeclaration() {
    let outcome = parse(
        r#"<model>
    <entity name="Animal"><attribute name="name" attributeType="String"/></entity>
    <entity name="Dog" parentEntity="Animal"><attribute name="name" attributeType="String"/></entity>
</model>"#,
    );
    assert_eq!(count_kind(&outcome.diagnostics, DiagnosticKind::NameCollision), 1);
    assert_eq!(outcome.diagnostics.len(), 1);
    assert!(outcome.model.entity("Dog").unwrap().attributes.is_empty());
}

#[test]
fn test_attribute_type_and_default_problems() {
    let outcome = parse(
        r#"<model><entity name="E">
    <attribute name="a" attributeType="Complex" defaultValueString="1"/>
    <attribute name="b" attributeType="Integer 32" defaultValueString="abc"/>
    <attribute name="c" attributeType="Integer 16" defaultValueString="70000"/>
    <attribute name="d"/>
</entity></model>"#,
    );
    assert_eq!(
        kinds(&outcome.diagnostics),
        vec![
            DiagnosticKind::InvalidValue,
            DiagnosticKind::TypeMismatch,
            DiagnosticKind::TypeMismatch,
        ]
    );
    let entity = outcome.model.entity("E").unwrap();
    let a = entity.attribute("a").unwrap();
    assert_eq!(a.attribute_type, AttributeType::Undefined);
    assert_eq!(a.default_value, None);
    assert_eq!(entity.attribute("b").unwrap().default_value, None);
    // out of range values are kept so the document can be fixed and rewritten
    assert_eq!(
        entity.attribute("c").unwrap().default_value,
        Some(DefaultValue::Integer(70000))
    );
    assert_eq!(entity.attribute("d").unwrap().attribute_type, AttributeType::Undefined);
}

#[test]
fn test_relationship_value_problems() {
    let outcome = parse(
        r#"<model><entity name="E">
    <relationship name="r" destinationEntity="E" deletionRule="Explode" toMany="maybe" maxCount="-1"/>
    <relationship name="s"/>
</entity></model>"#,
    );
    assert_eq!(
        kinds(&outcome.diagnostics),
        vec![
            DiagnosticKind::InvalidValue,
            DiagnosticKind::InvalidValue,
            DiagnosticKind::InvalidValue,
            DiagnosticKind::MissingAttribute,
        ]
    );
    let r = outcome.model.entity("E").unwrap().relationship("r").unwrap();
    assert_eq!(r.delete_rule, DeleteRule::Nullify);
    assert!(!r.to_many);
    assert!(outcome.model.entity("E").unwrap().relationship("s").is_none());
}

#[test]
fn test_to_many_inferred_from_max_count() {
    let outcome = parse(
        r#"<model><entity name="E"><relationship name="r" destinationEntity="E" maxCount="5"/></entity></model>"#,
    );
    assert!(outcome.model.entity("E").unwrap().relationship("r").unwrap().to_many);
}

#[test]
fn test_custom_vocabulary() {
    let mut vocabulary = Vocabulary::default();
    vocabulary.tags.model = "Schema".to_string();
    vocabulary.tags.entity = "Table".to_string();
    vocabulary.attributes.attribute_type = "kind".to_string();

    let document = XmlDocument::parse(
        br#"<Schema><Table name="Person"><attribute name="age" kind="Integer 64"/></Table></Schema>"#,
    )
    .unwrap();
    let outcome = parse_with(&document, &vocabulary, &ValidationPolicy::default());
    assert!(outcome.diagnostics.is_empty(), "{:?}", outcome.diagnostics);
    let age = outcome.model.entity("Person").unwrap().attribute("age").unwrap();
    assert_eq!(age.attribute_type, AttributeType::Integer64);
}

#[test]
fn test_redeclared_property_blames_subentity_in_any_order() {
    let parent_last = r#"<model>
    <entity name="Dog" parentEntity="Animal"><attribute name="name" attributeType="String"/></entity>
    <entity name="Animal"><attribute name="name" attributeType="String"/></entity>
    <entity name="Cat" parentEntity="Animal"/>
</model>"#;
    let parent_first = r#"<model>
    <entity name="Animal"><attribute name="name" attributeType="String"/></entity>
    <entity name="Dog" parentEntity="Animal"><attribute name="name" attributeType="String"/></entity>
    <entity name="Cat" parentEntity="Animal"/>
</model>"#;

    for document in [parent_last, parent_first] {
        let outcome = parse(document);
        assert_eq!(kinds(&outcome.diagnostics), vec![DiagnosticKind::NameCollision]);
        assert_eq!(outcome.diagnostics[0].path, DiagnosticPath::member("Dog", "name"));

        let model = &outcome.model;
        assert_eq!(model.entity("Animal").unwrap().attributes.len(), 1);
        assert!(model.entity("Dog").unwrap().attributes.is_empty());
        let cat = model.entity("Cat").unwrap();
        assert!(model.resolve_attribute(cat, "name").is_some());

        let reparsed = coredata_model::parse_model(&coredata_model::serialize_model(model)).unwrap();
        assert_eq!(&reparsed.model, model);
        assert!(reparsed.diagnostics.is_empty());
    }
}

#[test]
fn test_mismatched_inverse_entity_is_reported() {
    let outcome = parse(
        r#"<model>
    <entity name="A"><relationship name="b" destinationEntity="B" inverseName="a" inverseEntity="C"/></entity>
    <entity name="B"><relationship name="a" destinationEntity="A" inverseName="b" inverseEntity="A"/></entity>
    <entity name="C"/>
</model>"#,
    );
    assert_eq!(kinds(&outcome.diagnostics), vec![DiagnosticKind::InverseAsymmetry]);
    assert_eq!(outcome.diagnostics[0].severity, Severity::Error);

    let xml = coredata_model::serializer::serialize(&outcome.model);
    assert!(xml.contains(r#"inverseName="a" inverseEntity="C""#));
    assert!(xml.contains(r#"inverseName="b" inverseEntity="A""#));
}

#[test]
fn test_diagnostic_offsets_point_at_indented_elements() {
    let outcome = parse(DANGLING_DESTINATION);
    let offset = outcome.diagnostics[0].offset.unwrap();
    assert!(DANGLING_DESTINATION[offset..].starts_with("<relationship name=\"pets\""));
}
