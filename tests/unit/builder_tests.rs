use coredata_model::{
    Attribute, AttributeType, BuildError, Entity, FetchIndex, FetchIndexElement, ModelBuilder, Relationship,
    serialize_model, validate_model,
};

#[test]
fn test_builder_produces_person_pet() {
    let mut builder = ModelBuilder::new();
    let person = builder.add_entity("Person", None).unwrap();
    let name = builder
        .add_attribute(person, "name", AttributeType::String)
        .unwrap();
    builder.attribute_mut(name).unwrap().optional = true;
    let pets = builder.add_relationship(person, "pets", "Pet").unwrap();
    {
        let pets = builder.relationship_mut(pets).unwrap();
        pets.to_many = true;
        pets.inverse = Some("owner".to_string());
    }
    let pet = builder.add_entity("Pet", None).unwrap();
    builder
        .add_relationship_with(pet, Relationship::new("owner", "Person").with_inverse("pets"))
        .unwrap();
    let model = builder.seal();

    assert!(validate_model(&model).is_empty());
    assert!(model.entity("Person").unwrap().attribute("name").unwrap().optional);

    let reparsed = coredata_model::parse_model(&serialize_model(&model)).unwrap();
    assert_eq!(reparsed.model, model);
}

#[test]
fn test_collisions_in_scope() {
    let mut builder = ModelBuilder::new();
    let animal = builder.add_entity("Animal", None).unwrap();
    builder
        .add_attribute(animal, "name", AttributeType::String)
        .unwrap();

    assert!(matches!(
        builder.add_entity("Animal", None),
        Err(BuildError::NameCollision { .. })
    ));
    assert!(matches!(
        builder.add_relationship(animal, "name", "Animal"),
        Err(BuildError::NameCollision { .. })
    ));

    let dog = builder.add_entity("Dog", Some("Animal")).unwrap();
    let err = builder
        .add_attribute(dog, "name", AttributeType::String)
        .unwrap_err();
    assert!(matches!(err, BuildError::NameCollision { ref name, .. } if name == "name"));

    builder
        .add_attribute(dog, "breed", AttributeType::String)
        .unwrap();
    let err = builder
        .add_attribute(animal, "breed", AttributeType::String)
        .unwrap_err();
    assert!(matches!(err, BuildError::NameCollision { ref scope, .. } if scope.contains("Dog")));

    // same name in an unrelated entity is fine
    let toy = builder.add_entity("Toy", None).unwrap();
    assert!(builder.add_attribute(toy, "name", AttributeType::String).is_ok());
}

#[test]
fn test_fetch_index_and_configuration_names() {
    let mut builder = ModelBuilder::new();
    let song = builder.add_entity("Song", None).unwrap();
    builder
        .add_attribute(song, "plays", AttributeType::Integer64)
        .unwrap();
    let index = FetchIndex::new("byPlays").with_element(FetchIndexElement::new("plays"));
    let handle = builder.add_fetch_index(song, index.clone()).unwrap();
    assert!(builder.fetch_index_mut(handle).is_ok());
    assert!(matches!(
        builder.add_fetch_index(song, index),
        Err(BuildError::NameCollision { .. })
    ));

    let cloud = builder.add_configuration("Cloud").unwrap();
    builder.add_configuration_member(cloud, "Song").unwrap();
    assert!(builder.add_configuration_member(cloud, "Song").is_err());
    assert!(builder.add_configuration("Cloud").is_err());

    let model = builder.seal();
    assert!(validate_model(&model).is_empty());
    assert_eq!(model.configuration("Cloud").unwrap().entities, vec!["Song"]);
}

#[test]
fn test_reparenting_checks_the_new_chain() {
    let mut builder = ModelBuilder::new();
    let dog = builder.add_entity("Dog", None).unwrap();
    builder
        .add_attribute(dog, "name", AttributeType::String)
        .unwrap();
    let animal = builder.add_entity("Animal", None).unwrap();
    builder
        .add_attribute(animal, "name", AttributeType::String)
        .unwrap();

    let err = builder.set_parent(dog, Some("Animal")).unwrap_err();
    assert!(matches!(err, BuildError::NameCollision { ref scope, .. } if scope.contains("Animal")));
    assert_eq!(builder.entity(dog).unwrap().parent, None);

    let model = builder.seal();
    let reparsed = coredata_model::parse_model(&serialize_model(&model)).unwrap();
    assert_eq!(reparsed.model, model);
}

#[test]
fn test_reparenting_checks_subentities() {
    let mut builder = ModelBuilder::new();
    let dog = builder.add_entity("Dog", None).unwrap();
    let puppy = builder.add_entity("Puppy", Some("Dog")).unwrap();
    builder
        .add_attribute(puppy, "legs", AttributeType::Integer16)
        .unwrap();
    let animal = builder.add_entity("Animal", None).unwrap();
    builder
        .add_attribute(animal, "legs", AttributeType::Integer16)
        .unwrap();

    let err = builder.set_parent(dog, Some("Animal")).unwrap_err();
    assert!(matches!(err, BuildError::NameCollision { ref scope, ref name } if name == "legs" && scope.contains("Puppy")));

    builder
        .add_attribute(animal, "name", AttributeType::String)
        .unwrap();
    let model = builder.seal();
    assert!(validate_model(&model).is_empty());
}

#[test]
fn test_described_entity_checked_against_declared_subentities() {
    let mut builder = ModelBuilder::new();
    let mut dog = Entity::new("Dog");
    dog.parent = Some("Animal".to_string());
    dog.attributes.push(Attribute::new("name", AttributeType::String));
    builder.add_entity_with(dog).unwrap();

    let mut animal = Entity::new("Animal");
    animal.attributes.push(Attribute::new("name", AttributeType::String));
    let err = builder.add_entity_with(animal).unwrap_err();
    assert!(matches!(err, BuildError::NameCollision { ref scope, .. } if scope.contains("subentity")));
    assert!(builder.entity_handle("Animal").is_none());

    let mut animal = Entity::new("Animal");
    animal.attributes.push(Attribute::new("legs", AttributeType::Integer16));
    assert!(builder.add_entity_with(animal).is_ok());
    let model = builder.seal();
    assert!(validate_model(&model).is_empty());
}
