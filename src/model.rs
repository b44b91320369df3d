//! Schema Model
//!
//! Typed in-memory representation of a Core Data model. Ownership is strictly
//! tree-shaped: a [`Model`] owns its entities and configurations, an
//! [`Entity`] owns its attributes, relationships and fetch indexes. Parent,
//! destination, inverse and configuration member references are names that
//! are resolved through the model's name index.
//!
//! A [`Model`] has no mutating API. Programmatic construction goes through
//! [`ModelBuilder`], which rejects name collisions immediately and is then
//! sealed into a [`Model`].

use std::collections::{HashMap, HashSet};
use std::fmt;

use serde::Serialize;

use crate::error::{BuildError, BuildResult};

/// Scalar value type of an attribute
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
pub enum AttributeType {
    Integer16,
    Integer32,
    Integer64,
    Decimal,
    Double,
    Float,
    String,
    Boolean,
    Date,
    BinaryData,
    Uuid,
    Uri,
    Transformable,
    ObjectId,
    Undefined,
}

impl AttributeType {
    /// Parse the `attributeType` spelling used in model documents
    pub fn from_xml(value: &str) -> Option<Self> {
        match value {
            "Integer 16" => Some(Self::Integer16),
            "Integer 32" => Some(Self::Integer32),
            "Integer 64" => Some(Self::Integer64),
            "Decimal" => Some(Self::Decimal),
            "Double" => Some(Self::Double),
            "Float" => Some(Self::Float),
            "String" => Some(Self::String),
            "Boolean" => Some(Self::Boolean),
            "Date" => Some(Self::Date),
            "Binary" | "Binary Data" => Some(Self::BinaryData),
            "UUID" => Some(Self::Uuid),
            "URI" => Some(Self::Uri),
            "Transformable" => Some(Self::Transformable),
            "Object ID" | "ObjectID" => Some(Self::ObjectId),
            "Undefined" => Some(Self::Undefined),
            _ => None,
        }
    }

    pub fn as_xml(&self) -> &'static str {
        match self {
            Self::Integer16 => "Integer 16",
            Self::Integer32 => "Integer 32",
            Self::Integer64 => "Integer 64",
            Self::Decimal => "Decimal",
            Self::Double => "Double",
            Self::Float => "Float",
            Self::String => "String",
            Self::Boolean => "Boolean",
            Self::Date => "Date",
            Self::BinaryData => "Binary",
            Self::Uuid => "UUID",
            Self::Uri => "URI",
            Self::Transformable => "Transformable",
            Self::ObjectId => "Object ID",
            Self::Undefined => "Undefined",
        }
    }

    /// Inclusive value range for the fixed-width integer types
    pub fn integer_range(&self) -> Option<(i64, i64)> {
        match self {
            Self::Integer16 => Some((i16::MIN as i64, i16::MAX as i64)),
            Self::Integer32 => Some((i32::MIN as i64, i32::MAX as i64)),
            Self::Integer64 => Some((i64::MIN, i64::MAX)),
            _ => None,
        }
    }
}

impl fmt::Display for AttributeType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_xml())
    }
}

/// Typed default value of an attribute
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "kind", content = "value", rename_all = "snake_case")]
pub enum DefaultValue {
    Integer(i64),
    Real(f64),
    /// Decimal literal, kept verbatim to avoid float rounding
    Decimal(String),
    Text(String),
    Boolean(bool),
    /// Seconds since the Core Data reference date (2001-01-01T00:00:00Z)
    Date(f64),
    Uuid(String),
}

impl DefaultValue {
    /// Parse a `defaultValueString` for the given attribute type.
    ///
    /// Only the lexical form is checked here; range checks belong to the
    /// validator so programmatic models get the same treatment.
    pub fn parse(attribute_type: AttributeType, raw: &str) -> Result<Self, String> {
        let trimmed = raw.trim();
        match attribute_type {
            AttributeType::Integer16 | AttributeType::Integer32 | AttributeType::Integer64 => {
                trimmed
                    .parse::<i64>()
                    .map(Self::Integer)
                    .map_err(|_| format!("'{}' is not an integer", raw))
            }
            AttributeType::Double | AttributeType::Float => trimmed
                .parse::<f64>()
                .map(Self::Real)
                .map_err(|_| format!("'{}' is not a number", raw)),
            AttributeType::Decimal => {
                if is_decimal_literal(trimmed) {
                    Ok(Self::Decimal(trimmed.to_string()))
                } else {
                    Err(format!("'{}' is not a decimal number", raw))
                }
            }
            AttributeType::String | AttributeType::Uri => Ok(Self::Text(raw.to_string())),
            AttributeType::Boolean => parse_flag(trimmed)
                .map(Self::Boolean)
                .ok_or_else(|| format!("'{}' is not a boolean", raw)),
            AttributeType::Date => trimmed
                .parse::<f64>()
                .map(Self::Date)
                .map_err(|_| format!("'{}' is not a time interval", raw)),
            AttributeType::Uuid => {
                if is_uuid(trimmed) {
                    Ok(Self::Uuid(trimmed.to_string()))
                } else {
                    Err(format!("'{}' is not a UUID", raw))
                }
            }
            AttributeType::BinaryData
            | AttributeType::Transformable
            | AttributeType::ObjectId
            | AttributeType::Undefined => Err(format!(
                "attributes of type {} cannot have a default value",
                attribute_type
            )),
        }
    }

    /// The textual form written back to the document
    pub fn to_xml_string(&self) -> String {
        match self {
            Self::Integer(value) => value.to_string(),
            Self::Real(value) | Self::Date(value) => value.to_string(),
            Self::Decimal(value) | Self::Text(value) | Self::Uuid(value) => value.clone(),
            Self::Boolean(true) => "YES".to_string(),
            Self::Boolean(false) => "NO".to_string(),
        }
    }

    /// Whether this value can be stored by an attribute of the given type
    pub fn is_compatible_with(&self, attribute_type: AttributeType) -> bool {
        match self {
            Self::Integer(value) => attribute_type
                .integer_range()
                .is_some_and(|(min, max)| (min..=max).contains(value)),
            Self::Real(value) => match attribute_type {
                AttributeType::Double => true,
                AttributeType::Float => !value.is_finite() || value.abs() <= f32::MAX as f64,
                _ => false,
            },
            Self::Decimal(_) => attribute_type == AttributeType::Decimal,
            Self::Text(_) => matches!(attribute_type, AttributeType::String | AttributeType::Uri),
            Self::Boolean(_) => attribute_type == AttributeType::Boolean,
            Self::Date(_) => attribute_type == AttributeType::Date,
            Self::Uuid(_) => attribute_type == AttributeType::Uuid,
        }
    }
}

/// Parse the `YES`/`NO` flags used throughout model documents
pub fn parse_flag(value: &str) -> Option<bool> {
    match value {
        "YES" | "yes" | "true" | "1" => Some(true),
        "NO" | "no" | "false" | "0" => Some(false),
        _ => None,
    }
}

fn is_decimal_literal(value: &str) -> bool {
    let digits = value.strip_prefix(['-', '+']).unwrap_or(value);
    let mut parts = digits.splitn(2, '.');
    let whole = parts.next().unwrap_or("");
    let fraction = parts.next().unwrap_or("");
    !(whole.is_empty() && fraction.is_empty())
        && whole.chars().all(|c| c.is_ascii_digit())
        && fraction.chars().all(|c| c.is_ascii_digit())
}

fn is_uuid(value: &str) -> bool {
    let groups: Vec<&str> = value.split('-').collect();
    let lengths = [8, 4, 4, 4, 12];
    groups.len() == lengths.len()
        && groups
            .iter()
            .zip(lengths)
            .all(|(group, len)| group.len() == len && group.chars().all(|c| c.is_ascii_hexdigit()))
}

/// What happens to the destination objects when the source is deleted
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize)]
pub enum DeleteRule {
    NoAction,
    #[default]
    Nullify,
    Cascade,
    Deny,
}

impl DeleteRule {
    pub fn from_xml(value: &str) -> Option<Self> {
        match value {
            "No Action" | "NoAction" => Some(Self::NoAction),
            "Nullify" => Some(Self::Nullify),
            "Cascade" => Some(Self::Cascade),
            "Deny" => Some(Self::Deny),
            _ => None,
        }
    }

    pub fn as_xml(&self) -> &'static str {
        match self {
            Self::NoAction => "No Action",
            Self::Nullify => "Nullify",
            Self::Cascade => "Cascade",
            Self::Deny => "Deny",
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize)]
pub enum IndexKind {
    #[default]
    Binary,
    RTree,
}

impl IndexKind {
    pub fn from_xml(value: &str) -> Option<Self> {
        match value {
            "Binary" => Some(Self::Binary),
            "R-Tree" | "RTree" => Some(Self::RTree),
            _ => None,
        }
    }

    pub fn as_xml(&self) -> &'static str {
        match self {
            Self::Binary => "Binary",
            Self::RTree => "R-Tree",
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize)]
pub enum IndexOrder {
    #[default]
    Ascending,
    Descending,
}

impl IndexOrder {
    pub fn from_xml(value: &str) -> Option<Self> {
        match value {
            "ascending" => Some(Self::Ascending),
            "descending" => Some(Self::Descending),
            _ => None,
        }
    }

    pub fn as_xml(&self) -> &'static str {
        match self {
            Self::Ascending => "ascending",
            Self::Descending => "descending",
        }
    }
}

/// Ordered key/value pairs from a `<userInfo>` block
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct UserInfo {
    entries: Vec<(String, String)>,
}

impl UserInfo {
    pub fn new() -> Self {
        Self::default()
    }

    /// Insert or replace; a replaced key keeps its position
    pub fn insert(&mut self, key: impl Into<String>, value: impl Into<String>) {
        let key = key.into();
        let value = value.into();
        match self.entries.iter_mut().find(|(k, _)| *k == key) {
            Some(slot) => slot.1 = value,
            None => self.entries.push((key, value)),
        }
    }

    pub fn get(&self, key: &str) -> Option<&str> {
        self.entries
            .iter()
            .find(|(k, _)| k == key)
            .map(|(_, v)| v.as_str())
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, &str)> {
        self.entries.iter().map(|(k, v)| (k.as_str(), v.as_str()))
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }
}

/// A scalar field of an entity
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Attribute {
    pub name: String,
    pub attribute_type: AttributeType,
    pub optional: bool,
    pub default_value: Option<DefaultValue>,
    pub indexed: bool,
    pub transient: bool,
    /// Class of the value for transformable attributes
    pub custom_class_name: Option<String>,
    pub renaming_identifier: Option<String>,
    pub user_info: UserInfo,
    /// Unrecognized XML attributes, written back verbatim
    pub extra_attributes: Vec<(String, String)>,
}

impl Attribute {
    pub fn new(name: impl Into<String>, attribute_type: AttributeType) -> Self {
        Self {
            name: name.into(),
            attribute_type,
            optional: false,
            default_value: None,
            indexed: false,
            transient: false,
            custom_class_name: None,
            renaming_identifier: None,
            user_info: UserInfo::new(),
            extra_attributes: Vec::new(),
        }
    }

    pub fn with_optional(mut self, optional: bool) -> Self {
        self.optional = optional;
        self
    }

    pub fn with_default(mut self, value: DefaultValue) -> Self {
        self.default_value = Some(value);
        self
    }

    pub fn with_indexed(mut self, indexed: bool) -> Self {
        self.indexed = indexed;
        self
    }

    pub fn with_transient(mut self, transient: bool) -> Self {
        self.transient = transient;
        self
    }
}

/// A reference field linking one entity to another
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Relationship {
    pub name: String,
    pub destination: String,
    pub inverse: Option<String>,
    /// `inverseEntity` when it names something other than the destination
    pub inverse_entity: Option<String>,
    pub to_many: bool,
    /// Only meaningful when `to_many` is set
    pub ordered: bool,
    pub delete_rule: DeleteRule,
    pub optional: bool,
    pub transient: bool,
    pub min_count: Option<u32>,
    pub max_count: Option<u32>,
    pub renaming_identifier: Option<String>,
    pub user_info: UserInfo,
    pub extra_attributes: Vec<(String, String)>,
}

impl Relationship {
    pub fn new(name: impl Into<String>, destination: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            destination: destination.into(),
            inverse: None,
            inverse_entity: None,
            to_many: false,
            ordered: false,
            delete_rule: DeleteRule::default(),
            optional: false,
            transient: false,
            min_count: None,
            max_count: None,
            renaming_identifier: None,
            user_info: UserInfo::new(),
            extra_attributes: Vec::new(),
        }
    }

    pub fn with_inverse(mut self, inverse: impl Into<String>) -> Self {
        self.inverse = Some(inverse.into());
        self
    }

    pub fn with_to_many(mut self, to_many: bool) -> Self {
        self.to_many = to_many;
        self
    }

    pub fn with_ordered(mut self, ordered: bool) -> Self {
        self.ordered = ordered;
        self
    }

    pub fn with_delete_rule(mut self, rule: DeleteRule) -> Self {
        self.delete_rule = rule;
        self
    }

    pub fn with_optional(mut self, optional: bool) -> Self {
        self.optional = optional;
        self
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct FetchIndexElement {
    pub property: String,
    pub kind: IndexKind,
    pub order: IndexOrder,
}

impl FetchIndexElement {
    pub fn new(property: impl Into<String>) -> Self {
        Self {
            property: property.into(),
            kind: IndexKind::default(),
            order: IndexOrder::default(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct FetchIndex {
    pub name: String,
    pub elements: Vec<FetchIndexElement>,
}

impl FetchIndex {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            elements: Vec::new(),
        }
    }

    pub fn with_element(mut self, element: FetchIndexElement) -> Self {
        self.elements.push(element);
        self
    }
}

/// A persistent type description
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Entity {
    pub name: String,
    pub parent: Option<String>,
    pub is_abstract: bool,
    pub class_name: Option<String>,
    pub renaming_identifier: Option<String>,
    pub syncable: bool,
    pub attributes: Vec<Attribute>,
    pub relationships: Vec<Relationship>,
    pub fetch_indexes: Vec<FetchIndex>,
    pub user_info: UserInfo,
    pub extra_attributes: Vec<(String, String)>,
}

impl Entity {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            parent: None,
            is_abstract: false,
            class_name: None,
            renaming_identifier: None,
            syncable: false,
            attributes: Vec::new(),
            relationships: Vec::new(),
            fetch_indexes: Vec::new(),
            user_info: UserInfo::new(),
            extra_attributes: Vec::new(),
        }
    }

    pub fn attribute(&self, name: &str) -> Option<&Attribute> {
        self.attributes.iter().find(|a| a.name == name)
    }

    pub fn relationship(&self, name: &str) -> Option<&Relationship> {
        self.relationships.iter().find(|r| r.name == name)
    }

    pub fn fetch_index(&self, name: &str) -> Option<&FetchIndex> {
        self.fetch_indexes.iter().find(|i| i.name == name)
    }

    /// Whether an attribute or relationship with this name is declared here
    pub fn declares_property(&self, name: &str) -> bool {
        self.attribute(name).is_some() || self.relationship(name).is_some()
    }

    /// Class name used for generated code, falling back to the entity name
    pub fn class_name_or_name(&self) -> &str {
        self.class_name.as_deref().unwrap_or(&self.name)
    }
}

/// A named subset of entities
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Configuration {
    pub name: String,
    pub entities: Vec<String>,
    pub extra_attributes: Vec<(String, String)>,
}

impl Configuration {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            entities: Vec::new(),
            extra_attributes: Vec::new(),
        }
    }
}

/// Root container of a parsed or built model
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Model {
    version_identifier: Option<String>,
    metadata: Vec<(String, String)>,
    entities: Vec<Entity>,
    configurations: Vec<Configuration>,
    #[serde(skip)]
    index: HashMap<String, usize>,
}

impl Default for Model {
    fn default() -> Self {
        Self::from_parts(None, Vec::new(), Vec::new(), Vec::new())
    }
}

impl Model {
    /// Assemble a model without any uniqueness checks.
    ///
    /// Duplicate entity names are kept; lookups resolve to the first one and
    /// the validator reports the rest.
    pub fn from_parts(
        version_identifier: Option<String>,
        metadata: Vec<(String, String)>,
        entities: Vec<Entity>,
        configurations: Vec<Configuration>,
    ) -> Self {
        let mut index = HashMap::with_capacity(entities.len());
        for (position, entity) in entities.iter().enumerate() {
            index.entry(entity.name.clone()).or_insert(position);
        }
        Self {
            version_identifier,
            metadata,
            entities,
            configurations,
            index,
        }
    }

    pub fn version_identifier(&self) -> Option<&str> {
        self.version_identifier.as_deref()
    }

    /// Attributes of the root element other than the version identifier
    pub fn metadata(&self) -> &[(String, String)] {
        &self.metadata
    }

    pub fn entities(&self) -> &[Entity] {
        &self.entities
    }

    pub fn configurations(&self) -> &[Configuration] {
        &self.configurations
    }

    pub fn entity(&self, name: &str) -> Option<&Entity> {
        self.index.get(name).map(|&position| &self.entities[position])
    }

    pub fn entity_position(&self, name: &str) -> Option<usize> {
        self.index.get(name).copied()
    }

    pub fn configuration(&self, name: &str) -> Option<&Configuration> {
        self.configurations.iter().find(|c| c.name == name)
    }

    /// Walk up the parent chain.
    ///
    /// Stops at the first unresolved parent and at the first entity already
    /// visited, so a cyclic parent link behaves as if it were absent.
    pub fn ancestors<'a>(&'a self, entity: &'a Entity) -> Ancestors<'a> {
        let mut visited = HashSet::new();
        visited.insert(entity.name.as_str());
        Ancestors {
            model: self,
            next: entity.parent.as_deref(),
            visited,
        }
    }

    /// Entities whose direct parent is `name`, in document order
    pub fn sub_entities<'a>(&'a self, name: &'a str) -> impl Iterator<Item = &'a Entity> {
        self.entities
            .iter()
            .filter(move |e| e.parent.as_deref() == Some(name))
    }

    /// Find an attribute on the entity or the nearest ancestor declaring it
    pub fn resolve_attribute<'a>(
        &'a self,
        entity: &'a Entity,
        name: &str,
    ) -> Option<(&'a Entity, &'a Attribute)> {
        std::iter::once(entity)
            .chain(self.ancestors(entity))
            .find_map(|owner| owner.attribute(name).map(|a| (owner, a)))
    }

    /// Find a relationship on the entity or the nearest ancestor declaring it
    pub fn resolve_relationship<'a>(
        &'a self,
        entity: &'a Entity,
        name: &str,
    ) -> Option<(&'a Entity, &'a Relationship)> {
        std::iter::once(entity)
            .chain(self.ancestors(entity))
            .find_map(|owner| owner.relationship(name).map(|r| (owner, r)))
    }

    pub fn destination(&self, relationship: &Relationship) -> Option<&Entity> {
        self.entity(&relationship.destination)
    }

    /// The inverse relationship as declared, looked up on the destination chain
    pub fn inverse_of(&self, relationship: &Relationship) -> Option<&Relationship> {
        let inverse = relationship.inverse.as_deref()?;
        let destination = self.destination(relationship)?;
        self.resolve_relationship(destination, inverse)
            .map(|(_, r)| r)
    }

    /// Whether `ancestor` is `entity` itself or one of its ancestors
    pub fn is_kind_of(&self, entity: &Entity, ancestor: &str) -> bool {
        entity.name == ancestor || self.ancestors(entity).any(|e| e.name == ancestor)
    }

    pub fn attribute_count(&self) -> usize {
        self.entities.iter().map(|e| e.attributes.len()).sum()
    }

    pub fn relationship_count(&self) -> usize {
        self.entities.iter().map(|e| e.relationships.len()).sum()
    }
}

/// Iterator returned by [`Model::ancestors`]
pub struct Ancestors<'a> {
    model: &'a Model,
    next: Option<&'a str>,
    visited: HashSet<&'a str>,
}

impl<'a> Iterator for Ancestors<'a> {
    type Item = &'a Entity;

    fn next(&mut self) -> Option<Self::Item> {
        let name = self.next.take()?;
        if !self.visited.insert(name) {
            return None;
        }
        let entity = self.model.entity(name)?;
        self.next = entity.parent.as_deref();
        Some(entity)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct EntityHandle(usize);

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct AttributeHandle {
    entity: usize,
    index: usize,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct RelationshipHandle {
    entity: usize,
    index: usize,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct FetchIndexHandle {
    entity: usize,
    index: usize,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct ConfigurationHandle(usize);

/// Checked construction API for [`Model`]
///
/// Names must be unique in scope: entity names across the model, attribute
/// and relationship names across an entity's inheritance chain (ancestors and
/// descendants already declared), fetch index names within an entity, and
/// configuration names across the model.
#[derive(Debug, Clone, Default)]
pub struct ModelBuilder {
    version_identifier: Option<String>,
    metadata: Vec<(String, String)>,
    entities: Vec<Entity>,
    configurations: Vec<Configuration>,
    index: HashMap<String, usize>,
}

impl ModelBuilder {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn set_version_identifier(&mut self, identifier: Option<String>) {
        self.version_identifier = identifier;
    }

    /// Append a root metadata attribute; an existing key keeps its position
    pub fn set_metadata(&mut self, key: impl Into<String>, value: impl Into<String>) {
        let key = key.into();
        let value = value.into();
        match self.metadata.iter_mut().find(|(k, _)| *k == key) {
            Some(slot) => slot.1 = value,
            None => self.metadata.push((key, value)),
        }
    }

    pub fn add_entity(&mut self, name: &str, parent: Option<&str>) -> BuildResult<EntityHandle> {
        let mut entity = Entity::new(name);
        entity.parent = parent.map(str::to_string);
        self.add_entity_with(entity)
    }

    /// Add a fully described entity. Its members are checked against its own
    /// declarations and the rest of its inheritance chain.
    pub fn add_entity_with(&mut self, entity: Entity) -> BuildResult<EntityHandle> {
        if self.index.contains_key(&entity.name) {
            return Err(BuildError::NameCollision {
                scope: "model".to_string(),
                name: entity.name,
            });
        }
        if let Some(name) = first_duplicate(
            entity
                .attributes
                .iter()
                .map(|a| a.name.as_str())
                .chain(entity.relationships.iter().map(|r| r.name.as_str())),
        ) {
            return Err(BuildError::NameCollision {
                scope: format!("entity '{}'", entity.name),
                name: name.to_string(),
            });
        }
        if let Some(name) = first_duplicate(entity.fetch_indexes.iter().map(|i| i.name.as_str())) {
            return Err(BuildError::NameCollision {
                scope: format!("fetch indexes of entity '{}'", entity.name),
                name: name.to_string(),
            });
        }

        self.check_entity_scope(&entity, entity.parent.as_deref())?;

        let position = self.entities.len();
        self.index.insert(entity.name.clone(), position);
        self.entities.push(entity);
        Ok(EntityHandle(position))
    }

    pub fn entity_handle(&self, name: &str) -> Option<EntityHandle> {
        self.index.get(name).copied().map(EntityHandle)
    }

    pub fn entity(&self, handle: EntityHandle) -> BuildResult<&Entity> {
        self.entities
            .get(handle.0)
            .ok_or_else(|| BuildError::UnknownHandle(format!("entity #{}", handle.0)))
    }

    fn entity_slot(&mut self, handle: EntityHandle) -> BuildResult<&mut Entity> {
        self.entities
            .get_mut(handle.0)
            .ok_or_else(|| BuildError::UnknownHandle(format!("entity #{}", handle.0)))
    }

    /// Re-parent an entity; its members must not collide with the new chain
    pub fn set_parent(&mut self, handle: EntityHandle, parent: Option<&str>) -> BuildResult<()> {
        let entity = self.entity(handle)?;
        self.check_entity_scope(entity, parent)?;
        self.check_descendants_under(&entity.name, parent)?;
        self.entity_slot(handle)?.parent = parent.map(str::to_string);
        Ok(())
    }

    pub fn set_abstract(&mut self, handle: EntityHandle, is_abstract: bool) -> BuildResult<()> {
        self.entity_slot(handle)?.is_abstract = is_abstract;
        Ok(())
    }

    pub fn set_class_name(
        &mut self,
        handle: EntityHandle,
        class_name: Option<String>,
    ) -> BuildResult<()> {
        self.entity_slot(handle)?.class_name = class_name;
        Ok(())
    }

    pub fn set_entity_user_info(
        &mut self,
        handle: EntityHandle,
        key: &str,
        value: &str,
    ) -> BuildResult<()> {
        self.entity_slot(handle)?.user_info.insert(key, value);
        Ok(())
    }

    pub fn add_attribute(
        &mut self,
        entity: EntityHandle,
        name: &str,
        attribute_type: AttributeType,
    ) -> BuildResult<AttributeHandle> {
        self.add_attribute_with(entity, Attribute::new(name, attribute_type))
    }

    pub fn add_attribute_with(
        &mut self,
        entity: EntityHandle,
        attribute: Attribute,
    ) -> BuildResult<AttributeHandle> {
        self.check_property_scope(entity, &attribute.name)?;
        let owner = self.entity_slot(entity)?;
        owner.attributes.push(attribute);
        Ok(AttributeHandle {
            entity: entity.0,
            index: owner.attributes.len() - 1,
        })
    }

    pub fn add_relationship(
        &mut self,
        entity: EntityHandle,
        name: &str,
        destination: &str,
    ) -> BuildResult<RelationshipHandle> {
        self.add_relationship_with(entity, Relationship::new(name, destination))
    }

    pub fn add_relationship_with(
        &mut self,
        entity: EntityHandle,
        relationship: Relationship,
    ) -> BuildResult<RelationshipHandle> {
        self.check_property_scope(entity, &relationship.name)?;
        let owner = self.entity_slot(entity)?;
        owner.relationships.push(relationship);
        Ok(RelationshipHandle {
            entity: entity.0,
            index: owner.relationships.len() - 1,
        })
    }

    pub fn add_fetch_index(
        &mut self,
        entity: EntityHandle,
        fetch_index: FetchIndex,
    ) -> BuildResult<FetchIndexHandle> {
        let owner = self.entity_slot(entity)?;
        if owner.fetch_index(&fetch_index.name).is_some() {
            return Err(BuildError::NameCollision {
                scope: format!("fetch indexes of entity '{}'", owner.name),
                name: fetch_index.name,
            });
        }
        owner.fetch_indexes.push(fetch_index);
        Ok(FetchIndexHandle {
            entity: entity.0,
            index: owner.fetch_indexes.len() - 1,
        })
    }

    pub fn attribute_mut(&mut self, handle: AttributeHandle) -> BuildResult<&mut Attribute> {
        self.entities
            .get_mut(handle.entity)
            .and_then(|e| e.attributes.get_mut(handle.index))
            .ok_or_else(|| {
                BuildError::UnknownHandle(format!(
                    "attribute #{} of entity #{}",
                    handle.index, handle.entity
                ))
            })
    }

    pub fn relationship_mut(
        &mut self,
        handle: RelationshipHandle,
    ) -> BuildResult<&mut Relationship> {
        self.entities
            .get_mut(handle.entity)
            .and_then(|e| e.relationships.get_mut(handle.index))
            .ok_or_else(|| {
                BuildError::UnknownHandle(format!(
                    "relationship #{} of entity #{}",
                    handle.index, handle.entity
                ))
            })
    }

    pub fn fetch_index_mut(&mut self, handle: FetchIndexHandle) -> BuildResult<&mut FetchIndex> {
        self.entities
            .get_mut(handle.entity)
            .and_then(|e| e.fetch_indexes.get_mut(handle.index))
            .ok_or_else(|| {
                BuildError::UnknownHandle(format!(
                    "fetch index #{} of entity #{}",
                    handle.index, handle.entity
                ))
            })
    }

    pub fn add_configuration(&mut self, name: &str) -> BuildResult<ConfigurationHandle> {
        self.add_configuration_with(Configuration::new(name))
    }

    pub fn add_configuration_with(
        &mut self,
        configuration: Configuration,
    ) -> BuildResult<ConfigurationHandle> {
        if self
            .configurations
            .iter()
            .any(|c| c.name == configuration.name)
        {
            return Err(BuildError::NameCollision {
                scope: "configurations".to_string(),
                name: configuration.name,
            });
        }
        if let Some(name) = first_duplicate(configuration.entities.iter().map(String::as_str)) {
            return Err(BuildError::NameCollision {
                scope: format!("configuration '{}'", configuration.name),
                name: name.to_string(),
            });
        }
        self.configurations.push(configuration);
        Ok(ConfigurationHandle(self.configurations.len() - 1))
    }

    /// Add an entity name to a configuration. The name may be declared later.
    pub fn add_configuration_member(
        &mut self,
        handle: ConfigurationHandle,
        entity: &str,
    ) -> BuildResult<()> {
        let configuration = self
            .configurations
            .get_mut(handle.0)
            .ok_or_else(|| BuildError::UnknownHandle(format!("configuration #{}", handle.0)))?;
        if configuration.entities.iter().any(|e| e == entity) {
            return Err(BuildError::NameCollision {
                scope: format!("configuration '{}'", configuration.name),
                name: entity.to_string(),
            });
        }
        configuration.entities.push(entity.to_string());
        Ok(())
    }

    /// Finish construction
    pub fn seal(self) -> Model {
        Model::from_parts(
            self.version_identifier,
            self.metadata,
            self.entities,
            self.configurations,
        )
    }

    /// Names up the parent chain of `own`, stopping at the first name
    /// that is not declared yet, at `own` itself, or at a revisit
    fn ancestor_names<'a>(&'a self, own: &str, parent: Option<&'a str>) -> Vec<&'a str> {
        let mut visited = HashSet::new();
        let mut names = Vec::new();
        let mut next = parent;
        while let Some(name) = next {
            if name == own || !visited.insert(name) {
                break;
            }
            names.push(name);
            next = self
                .index
                .get(name)
                .and_then(|&position| self.entities[position].parent.as_deref());
        }
        names
    }

    /// `property` must not be declared by an ancestor reached through
    /// `parent`, nor by any declared entity that inherits from `own`
    fn check_inherited_scope(
        &self,
        own: &str,
        parent: Option<&str>,
        property: &str,
    ) -> BuildResult<()> {
        for ancestor in self.ancestor_names(own, parent) {
            let Some(&position) = self.index.get(ancestor) else {
                continue;
            };
            if self.entities[position].declares_property(property) {
                return Err(BuildError::NameCollision {
                    scope: format!("entity '{}' (inherited by '{}')", ancestor, own),
                    name: property.to_string(),
                });
            }
        }

        for other in &self.entities {
            if other.name != own
                && other.declares_property(property)
                && self
                    .ancestor_names(&other.name, other.parent.as_deref())
                    .contains(&own)
            {
                return Err(BuildError::NameCollision {
                    scope: format!("entity '{}' (subentity of '{}')", other.name, own),
                    name: property.to_string(),
                });
            }
        }

        Ok(())
    }

    fn check_property_scope(&self, entity: EntityHandle, name: &str) -> BuildResult<()> {
        let owner = self.entity(entity)?;
        if owner.declares_property(name) {
            return Err(BuildError::NameCollision {
                scope: format!("entity '{}'", owner.name),
                name: name.to_string(),
            });
        }
        self.check_inherited_scope(&owner.name, owner.parent.as_deref(), name)
    }

    fn check_entity_scope(&self, entity: &Entity, parent: Option<&str>) -> BuildResult<()> {
        entity
            .attributes
            .iter()
            .map(|a| a.name.as_str())
            .chain(entity.relationships.iter().map(|r| r.name.as_str()))
            .try_for_each(|property| self.check_inherited_scope(&entity.name, parent, property))
    }

    /// Members of entities below `own` must stay clear of the chain above it
    fn check_descendants_under(&self, own: &str, parent: Option<&str>) -> BuildResult<()> {
        let ancestors = self.ancestor_names(own, parent);
        for descendant in self.entities.iter().filter(|other| {
            other.name != own
                && self
                    .ancestor_names(&other.name, other.parent.as_deref())
                    .contains(&own)
        }) {
            let properties = descendant
                .attributes
                .iter()
                .map(|a| a.name.as_str())
                .chain(descendant.relationships.iter().map(|r| r.name.as_str()));
            for property in properties {
                if let Some(ancestor) = ancestors.iter().find(|&&ancestor| {
                    self.index
                        .get(ancestor)
                        .is_some_and(|&position| self.entities[position].declares_property(property))
                }) {
                    return Err(BuildError::NameCollision {
                        scope: format!("entity '{}' (inherited by '{}')", ancestor, descendant.name),
                        name: property.to_string(),
                    });
                }
            }
        }
        Ok(())
    }
}

fn first_duplicate<'a>(names: impl Iterator<Item = &'a str>) -> Option<&'a str> {
    let mut seen = HashSet::new();
    names.into_iter().find(|name| !seen.insert(*name))
}
