//! Objective-C header and Swift companion generation
//!
//! One header per entity declaring a managed object subclass with a
//! property per non-transient attribute and relationship. Root entities
//! derive from the generated `JOManagedObject` base class. An umbrella
//! header imports every entity header, and `ModelUtilities-Generated.swift`
//! carries per-entity key classes and `CoreDataEntity` conformance.

use serde::Serialize;

use crate::model::{Attribute, AttributeType, Entity, Model, Relationship};

const BANNER: &str = "// Generated by coredata-model. Do not edit.";
const BASE_CLASS: &str = "JOManagedObject";
const UMBRELLA: &str = "Model-All.h";
const SWIFT_COMPANION: &str = "ModelUtilities-Generated.swift";

/// Shared declarations the per-entity Swift extensions build on
const SWIFT_SUPPORT: &str = r#"import CoreData

@objc protocol CoreDataEntity {
    static func entityName() -> String
    static func properties() -> [CoreDataProperty]
}

@objc class CoreDataProperty: NSObject {
    let key: String

    init(key: String) {
        self.key = key
    }
}

class CoreDataAttribute: CoreDataProperty {}

class CoreDataRelationship: CoreDataProperty {
    let toMany: Bool

    init(key: String, toMany: Bool) {
        self.toMany = toMany
        super.init(key: key)
    }
}

enum KeyPath {
    static func build(_ properties: [CoreDataProperty]) -> String {
        return properties.map { $0.key }.joined(separator: ".")
    }
}
"#;

/// Swift keywords that need backticks when used as member names
const SWIFT_KEYWORDS: [&str; 24] = [
    "as", "associatedtype", "break", "case", "class", "continue", "default", "defer", "deinit",
    "do", "else", "enum", "extension", "for", "func", "if", "import", "in", "init", "is",
    "protocol", "return", "self", "where",
];

/// A generated source file
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct GeneratedFile {
    pub name: String,
    pub contents: String,
}

/// Entity headers in model order, then the Swift companion, the umbrella
/// header and the base class header
pub fn generate_headers(model: &Model) -> Vec<GeneratedFile> {
    let mut files: Vec<GeneratedFile> = model
        .entities()
        .iter()
        .map(|entity| entity_header(model, entity))
        .collect();
    files.push(swift_companion(model));
    files.push(umbrella_header(model));
    files.push(base_class_header());
    files
}

fn base_class_header() -> GeneratedFile {
    let lines = [
        BANNER,
        "#import <CoreData/CoreData.h>",
        "",
        "@interface JOManagedObject : NSManagedObject",
        "@end",
        "",
        "@implementation JOManagedObject",
        "@end",
    ];
    GeneratedFile {
        name: format!("{}.h", BASE_CLASS),
        contents: finish(lines.into_iter().map(str::to_string).collect()),
    }
}

fn umbrella_header(model: &Model) -> GeneratedFile {
    let mut lines = vec![BANNER.to_string()];
    lines.extend(
        model
            .entities()
            .iter()
            .map(|entity| format!("#import \"{}.h\"", entity.class_name_or_name())),
    );
    GeneratedFile {
        name: UMBRELLA.to_string(),
        contents: finish(lines),
    }
}

fn swift_companion(model: &Model) -> GeneratedFile {
    let mut lines = vec![BANNER.to_string(), String::new(), SWIFT_SUPPORT.to_string()];
    for entity in model.entities() {
        lines.extend(key_classes(entity));
        lines.extend(entity_extension(model, entity));
    }
    GeneratedFile {
        name: SWIFT_COMPANION.to_string(),
        contents: finish(lines),
    }
}

/// `<Entity>Properties`, `<Entity>Relationships` and `<Entity>Attributes`
fn key_classes(entity: &Entity) -> Vec<String> {
    let mut lines = vec![format!("@objc class {}Properties: NSObject {{", entity.name)];
    for property in sorted_properties(entity, true) {
        lines.push(match property {
            Property::Attribute(attribute) => format!(
                "    class var {}: CoreDataAttribute {{ return CoreDataAttribute(key: \"{}\") }}",
                swift_identifier(&attribute.name),
                attribute.name
            ),
            Property::Relationship(relationship) => format!(
                "    class var {}: CoreDataRelationship {{ return CoreDataRelationship(key: \"{}\", toMany: {}) }}",
                swift_identifier(&relationship.name),
                relationship.name,
                relationship.to_many
            ),
        });
    }
    lines.push("}".to_string());
    lines.push(String::new());

    let relationships = entity.relationships.iter().map(|r| r.name.as_str());
    lines.extend(string_keys(&format!("{}Relationships", entity.name), relationships));
    let attributes = entity.attributes.iter().map(|a| a.name.as_str());
    lines.extend(string_keys(&format!("{}Attributes", entity.name), attributes));
    lines
}

fn string_keys<'a>(class: &str, names: impl Iterator<Item = &'a str>) -> Vec<String> {
    let mut lines = vec![format!("@objc class {}: NSObject {{", class)];
    lines.extend(names.map(|name| {
        format!(
            "    class var {}: String {{ return \"{}\" }}",
            swift_identifier(name),
            name
        )
    }));
    lines.push("}".to_string());
    lines.push(String::new());
    lines
}

/// Root entities adopt `CoreDataEntity`; subentities override their parent's
fn entity_extension(model: &Model, entity: &Entity) -> Vec<String> {
    let class_name = entity.class_name_or_name();
    let is_root = entity
        .parent
        .as_deref()
        .and_then(|name| model.entity(name))
        .is_none();
    let (conformance, modifier) = if is_root {
        (": CoreDataEntity", "")
    } else {
        ("", "override ")
    };
    let keys: Vec<String> = sorted_properties(entity, true)
        .iter()
        .map(|property| format!("{}Properties.{}", entity.name, swift_identifier(property.name())))
        .collect();

    vec![
        format!("extension {class_name}{conformance} {{"),
        format!(
            "    {modifier}class func entityName() -> String {{ return \"{}\" }}",
            entity.name
        ),
        format!(
            "    {modifier}class func insert(into context: NSManagedObjectContext) -> {class_name} {{"
        ),
        format!(
            "        return NSEntityDescription.insertNewObject(forEntityName: \"{}\", into: context) as! {class_name}",
            entity.name
        ),
        "    }".to_string(),
        format!(
            "    {modifier}class func properties() -> [CoreDataProperty] {{ return [{}] }}",
            keys.join(", ")
        ),
        "}".to_string(),
        String::new(),
    ]
}

fn swift_identifier(name: &str) -> String {
    if SWIFT_KEYWORDS.contains(&name) {
        format!("`{}`", name)
    } else {
        name.to_string()
    }
}

enum Property<'a> {
    Attribute(&'a Attribute),
    Relationship(&'a Relationship),
}

impl Property<'_> {
    fn name(&self) -> &str {
        match self {
            Property::Attribute(attribute) => &attribute.name,
            Property::Relationship(relationship) => &relationship.name,
        }
    }
}

/// Own attributes and relationships sorted by name
fn sorted_properties(entity: &Entity, with_transients: bool) -> Vec<Property<'_>> {
    let mut properties: Vec<Property<'_>> = entity
        .attributes
        .iter()
        .filter(|a| with_transients || !a.transient)
        .map(Property::Attribute)
        .chain(
            entity
                .relationships
                .iter()
                .filter(|r| with_transients || !r.transient)
                .map(Property::Relationship),
        )
        .collect();
    properties.sort_by(|a, b| a.name().cmp(b.name()));
    properties
}

fn entity_header(model: &Model, entity: &Entity) -> GeneratedFile {
    let class_name = entity.class_name_or_name();
    let parent = entity.parent.as_deref().and_then(|name| model.entity(name));
    let superclass = parent.map_or(BASE_CLASS, Entity::class_name_or_name);

    let properties = sorted_properties(entity, false);

    let mut lines = vec![BANNER.to_string(), "#import <CoreData/CoreData.h>".to_string()];
    lines.push(format!("#import \"{}.h\"", superclass));
    lines.push(String::new());

    let mut forward: Vec<&str> = Vec::new();
    for relationship in &entity.relationships {
        let destination = destination_class(model, relationship);
        if destination != class_name && !forward.contains(&destination) {
            forward.push(destination);
        }
    }
    for destination in &forward {
        lines.push(format!("@class {};", destination));
    }
    if !forward.is_empty() {
        lines.push(String::new());
    }

    lines.push("NS_ASSUME_NONNULL_BEGIN".to_string());
    lines.push(String::new());
    lines.push(format!("@interface {} : {}", class_name, superclass));
    lines.push(String::new());
    for property in &properties {
        lines.push(match property {
            Property::Attribute(attribute) => attribute_line(attribute),
            Property::Relationship(relationship) => relationship_line(model, relationship),
        });
    }
    lines.push(String::new());
    lines.push("@end".to_string());

    let accessors: Vec<String> = entity
        .relationships
        .iter()
        .filter(|r| r.to_many && !r.transient)
        .flat_map(|r| accessor_lines(model, r))
        .collect();
    if !accessors.is_empty() {
        lines.push(String::new());
        lines.push(format!("@interface {} (CoreDataGeneratedAccessors)", class_name));
        lines.push(String::new());
        lines.extend(accessors);
        lines.push(String::new());
        lines.push("@end".to_string());
    }

    lines.push(String::new());
    lines.push("NS_ASSUME_NONNULL_END".to_string());
    lines.push(String::new());
    lines.push(format!("@implementation {}", class_name));
    lines.push(String::new());
    for property in &properties {
        lines.push(format!("@dynamic {};", property.name()));
    }
    lines.push(String::new());
    lines.push("@end".to_string());

    GeneratedFile {
        name: format!("{}.h", class_name),
        contents: finish(lines),
    }
}

/// Objective-C type spelling and whether it is an object pointer
fn attribute_type(attribute: &Attribute) -> (String, bool) {
    let object = |class: &str| (format!("{} *", class), true);
    match attribute.attribute_type {
        AttributeType::Integer16 => ("int16_t ".to_string(), false),
        AttributeType::Integer32 => ("int32_t ".to_string(), false),
        AttributeType::Integer64 => ("int64_t ".to_string(), false),
        AttributeType::Double => ("double ".to_string(), false),
        AttributeType::Float => ("float ".to_string(), false),
        AttributeType::Boolean => ("BOOL ".to_string(), false),
        AttributeType::Decimal => object("NSDecimalNumber"),
        AttributeType::String => object("NSString"),
        AttributeType::Date => object("NSDate"),
        AttributeType::BinaryData => object("NSData"),
        AttributeType::Uuid => object("NSUUID"),
        AttributeType::Uri => object("NSURL"),
        AttributeType::ObjectId => object("NSManagedObjectID"),
        AttributeType::Transformable => match attribute
            .custom_class_name
            .as_deref()
            .or_else(|| attribute.user_info.get("attributeValueClassName"))
        {
            Some(class) => object(class),
            None => ("id ".to_string(), true),
        },
        AttributeType::Undefined => ("id ".to_string(), true),
    }
}

fn modifiers(optional: bool, is_object: bool) -> String {
    let mut annotations = Vec::new();
    if optional && is_object {
        annotations.push("nullable");
    }
    annotations.push("nonatomic");
    if is_object {
        annotations.push("retain");
    }
    format!("({})", annotations.join(", "))
}

fn attribute_line(attribute: &Attribute) -> String {
    let (spelling, is_object) = attribute_type(attribute);
    format!(
        "@property {} {}{};",
        modifiers(attribute.optional, is_object),
        spelling,
        attribute.name
    )
}

fn destination_class<'a>(model: &'a Model, relationship: &'a Relationship) -> &'a str {
    model
        .destination(relationship)
        .map_or(relationship.destination.as_str(), Entity::class_name_or_name)
}

fn collection_type(model: &Model, relationship: &Relationship) -> String {
    let set = if relationship.ordered { "NSOrderedSet" } else { "NSSet" };
    format!("{}<{} *> *", set, destination_class(model, relationship))
}

fn relationship_line(model: &Model, relationship: &Relationship) -> String {
    let spelling = if relationship.to_many {
        collection_type(model, relationship)
    } else {
        format!("{} *", destination_class(model, relationship))
    };
    format!(
        "@property {} {}{};",
        modifiers(relationship.optional, true),
        spelling,
        relationship.name
    )
}

fn accessor_lines(model: &Model, relationship: &Relationship) -> [String; 2] {
    let suffix = format!(
        "{}:({})values;",
        uppercase_first(&relationship.name),
        collection_type(model, relationship)
    );
    [
        format!("- (void)add{}", suffix),
        format!("- (void)remove{}", suffix),
    ]
}

fn uppercase_first(name: &str) -> String {
    let mut chars = name.chars();
    match chars.next() {
        Some(first) => first.to_uppercase().chain(chars).collect(),
        None => String::new(),
    }
}

fn finish(lines: Vec<String>) -> String {
    let mut contents = lines.join("\n");
    contents.push('\n');
    contents
}
