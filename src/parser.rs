//! Model Parser
//!
//! Two passes over an [`XmlDocument`]:
//!
//! 1. Walk the tree and build entities, attributes, relationships, fetch
//!    indexes and configurations by value. Names referring to other elements
//!    are stored unresolved. Once every entity is known, properties that
//!    redeclare an ancestor's property are excluded from the subentity, and
//!    the rest goes through a [`ModelBuilder`].
//! 2. Seal the model and run the validator, which resolves every reference
//!    through the model's name index.
//!
//! Recoverable problems never abort the walk. Unknown elements are skipped
//! with a warning, elements missing a required attribute are excluded with
//! an error, and unparseable values fall back to the field's default.

use std::collections::{HashMap, HashSet};

use tracing::debug;

use crate::diagnostic::{Diagnostic, DiagnosticKind, DiagnosticPath, sort_by_offset};
use crate::error::BuildError;
use crate::model::{
    Attribute, AttributeType, Configuration, DefaultValue, DeleteRule, Entity, FetchIndex,
    FetchIndexElement, IndexKind, IndexOrder, Model, ModelBuilder, Relationship, UserInfo,
    parse_flag,
};
use crate::validator::{ValidationPolicy, validate_with};
use crate::vocabulary::Vocabulary;
use crate::xml::{XmlDocument, XmlElement};

/// Best-effort model plus everything found along the way
#[derive(Debug, Clone)]
pub struct ParseOutcome {
    pub model: Model,
    /// Sorted into document order
    pub diagnostics: Vec<Diagnostic>,
}

impl ParseOutcome {
    pub fn has_errors(&self) -> bool {
        crate::diagnostic::has_errors(&self.diagnostics)
    }

    pub fn into_parts(self) -> (Model, Vec<Diagnostic>) {
        (self.model, self.diagnostics)
    }
}

pub fn parse(document: &XmlDocument) -> ParseOutcome {
    parse_with(document, &Vocabulary::default(), &ValidationPolicy::default())
}

pub fn parse_with(
    document: &XmlDocument,
    vocabulary: &Vocabulary,
    policy: &ValidationPolicy,
) -> ParseOutcome {
    let mut parser = ModelParser {
        vocabulary,
        builder: ModelBuilder::new(),
        entities: Vec::new(),
        diagnostics: Vec::new(),
        sources: SourceMap::default(),
    };
    parser.parse_root(&document.root);
    parser.finish_entities();

    let ModelParser {
        builder,
        mut diagnostics,
        sources,
        ..
    } = parser;
    let model = builder.seal();

    for diagnostic in validate_with(&model, policy) {
        let offset = sources.offset_of(&diagnostic.path);
        diagnostics.push(diagnostic.at(offset));
    }
    sort_by_offset(&mut diagnostics);

    debug!(
        entities = model.entities().len(),
        configurations = model.configurations().len(),
        diagnostics = diagnostics.len(),
        "parsed model"
    );

    ParseOutcome { model, diagnostics }
}

/// Source offsets of accepted elements, used to place validator findings
#[derive(Debug, Default)]
struct SourceMap {
    entities: HashMap<String, usize>,
    members: HashMap<String, HashMap<String, usize>>,
    configurations: HashMap<String, usize>,
    configuration_members: HashMap<String, HashMap<String, usize>>,
}

impl SourceMap {
    fn offset_of(&self, path: &DiagnosticPath) -> Option<usize> {
        if let Some(configuration) = &path.configuration {
            let member = path.entity.as_ref().and_then(|entity| {
                self.configuration_members
                    .get(configuration)
                    .and_then(|members| members.get(entity))
            });
            return member
                .or_else(|| self.configurations.get(configuration))
                .copied();
        }

        let entity = path.entity.as_ref()?;
        let member = path.member.as_ref().and_then(|member| {
            self.members
                .get(entity)
                .and_then(|members| members.get(member))
        });
        member.or_else(|| self.entities.get(entity)).copied()
    }

    fn record_member(&mut self, entity: &str, member: &str, offset: Option<usize>) {
        if let Some(offset) = offset {
            self.members
                .entry(entity.to_string())
                .or_default()
                .entry(member.to_string())
                .or_insert(offset);
        }
    }
}

struct ModelParser<'v> {
    vocabulary: &'v Vocabulary,
    builder: ModelBuilder,
    /// Entities read so far, before inherited names are checked
    entities: Vec<Entity>,
    diagnostics: Vec<Diagnostic>,
    sources: SourceMap,
}

impl<'v> ModelParser<'v> {
    fn report(&mut self, diagnostic: Diagnostic) {
        self.diagnostics.push(diagnostic);
    }

    fn parse_root(&mut self, root: &XmlElement) {
        let vocabulary = self.vocabulary;
        let tags = &vocabulary.tags;
        let names = &vocabulary.attributes;

        if root.name() != tags.model {
            self.report(
                Diagnostic::error(
                    DiagnosticKind::UnknownElement,
                    DiagnosticPath::model(),
                    format!(
                        "root element is <{}>, expected <{}>",
                        root.name(),
                        tags.model
                    ),
                )
                .at(root.offset()),
            );
            return;
        }

        for (key, value) in root.attributes() {
            if *key == names.version_identifier {
                self.builder.set_version_identifier(Some(value.clone()));
            } else {
                self.builder.set_metadata(key.as_str(), value.as_str());
            }
        }

        for child in root.children() {
            if child.name() == tags.entity {
                self.parse_entity(child);
            } else if child.name() == tags.configuration {
                self.parse_configuration(child);
            } else {
                self.skip(child, DiagnosticPath::model());
            }
        }
    }

    fn parse_entity(&mut self, element: &XmlElement) {
        let vocabulary = self.vocabulary;
        let tags = &vocabulary.tags;
        let names = &vocabulary.attributes;

        let Some(name) = self.required(element, &names.name, DiagnosticPath::model()) else {
            return;
        };
        let path = DiagnosticPath::entity(name);

        if self.entities.iter().any(|entity| entity.name == name) {
            self.build_error(
                BuildError::NameCollision {
                    scope: "model".to_string(),
                    name: name.to_string(),
                },
                path,
                element,
            );
            return;
        }

        let mut entity = Entity::new(name);
        entity.parent = element.attribute(&names.parent_entity).map(str::to_string);
        entity.class_name = element
            .attribute(&names.represented_class_name)
            .map(str::to_string);
        entity.renaming_identifier = element
            .attribute(&names.renaming_identifier)
            .map(str::to_string);
        entity.is_abstract = self.flag(element, &names.is_abstract, &path);
        entity.syncable = self.flag(element, &names.syncable, &path);
        entity.extra_attributes = extra_attributes(
            element,
            &[
                &names.name,
                &names.parent_entity,
                &names.represented_class_name,
                &names.renaming_identifier,
                &names.is_abstract,
                &names.syncable,
            ],
        );
        if let Some(offset) = element.offset() {
            self.sources.entities.insert(name.to_string(), offset);
        }

        // only the entity's own scope is known here; inherited names are
        // checked once every entity has been read
        for child in element.children() {
            let tag = child.name();
            if tag == tags.attribute {
                let Some(attribute) = self.parse_attribute(name, child) else {
                    continue;
                };
                if self.own_property_free(&entity, &attribute.name, child) {
                    self.sources.record_member(name, &attribute.name, child.offset());
                    entity.attributes.push(attribute);
                }
            } else if tag == tags.relationship {
                let Some(relationship) = self.parse_relationship(name, child) else {
                    continue;
                };
                if self.own_property_free(&entity, &relationship.name, child) {
                    self.sources.record_member(name, &relationship.name, child.offset());
                    entity.relationships.push(relationship);
                }
            } else if tag == tags.fetch_index {
                let Some(fetch_index) = self.parse_fetch_index(name, child) else {
                    continue;
                };
                if entity.fetch_index(&fetch_index.name).is_some() {
                    self.build_error(
                        BuildError::NameCollision {
                            scope: format!("fetch indexes of entity '{}'", name),
                            name: fetch_index.name.clone(),
                        },
                        DiagnosticPath::member(name, &fetch_index.name),
                        child,
                    );
                } else {
                    self.sources.record_member(name, &fetch_index.name, child.offset());
                    entity.fetch_indexes.push(fetch_index);
                }
            } else if tag == tags.user_info {
                self.parse_user_info(child, &path, &mut entity.user_info);
            } else {
                self.skip(child, path.clone());
            }
        }

        self.entities.push(entity);
    }

    fn own_property_free(&mut self, entity: &Entity, property: &str, element: &XmlElement) -> bool {
        if !entity.declares_property(property) {
            return true;
        }
        self.build_error(
            BuildError::NameCollision {
                scope: format!("entity '{}'", entity.name),
                name: property.to_string(),
            },
            DiagnosticPath::member(&entity.name, property),
            element,
        );
        false
    }

    /// Drop subentity properties that redeclare an ancestor's property,
    /// wherever the ancestor appears in the document
    fn exclude_inherited_collisions(&mut self) {
        let index: HashMap<&str, usize> = self
            .entities
            .iter()
            .enumerate()
            .map(|(position, entity)| (entity.name.as_str(), position))
            .collect();

        let mut excluded: Vec<(usize, String, String)> = Vec::new();
        for (position, entity) in self.entities.iter().enumerate() {
            let ancestors = ancestor_positions(&self.entities, &index, position);
            let properties = entity
                .attributes
                .iter()
                .map(|a| a.name.as_str())
                .chain(entity.relationships.iter().map(|r| r.name.as_str()));
            for property in properties {
                if let Some(&ancestor) = ancestors
                    .iter()
                    .find(|&&ancestor| self.entities[ancestor].declares_property(property))
                {
                    excluded.push((
                        position,
                        property.to_string(),
                        self.entities[ancestor].name.clone(),
                    ));
                }
            }
        }

        for (position, property, ancestor) in excluded {
            let entity = &mut self.entities[position];
            entity.attributes.retain(|a| a.name != property);
            entity.relationships.retain(|r| r.name != property);

            let path = DiagnosticPath::member(&entity.name, &property);
            let err = BuildError::NameCollision {
                scope: format!("entity '{}' (inherited by '{}')", ancestor, entity.name),
                name: property,
            };
            debug!(%path, "excluding redeclared property: {}", err);
            let offset = self.sources.offset_of(&path);
            self.report(
                Diagnostic::error(DiagnosticKind::NameCollision, path, err.to_string()).at(offset),
            );
        }
    }

    /// Hand the collected entities to the builder, in document order
    fn finish_entities(&mut self) {
        self.exclude_inherited_collisions();
        for entity in std::mem::take(&mut self.entities) {
            let path = DiagnosticPath::entity(&entity.name);
            if let Err(err) = self.builder.add_entity_with(entity) {
                let offset = self.sources.offset_of(&path);
                self.report(
                    Diagnostic::error(DiagnosticKind::NameCollision, path, err.to_string())
                        .at(offset),
                );
            }
        }
    }

    fn parse_attribute(&mut self, entity: &str, element: &XmlElement) -> Option<Attribute> {
        let vocabulary = self.vocabulary;
        let tags = &vocabulary.tags;
        let names = &vocabulary.attributes;

        let name = self.required(element, &names.name, DiagnosticPath::entity(entity))?;
        let path = DiagnosticPath::member(entity, name);

        let (attribute_type, type_known) = match element.attribute(&names.attribute_type) {
            None => (AttributeType::Undefined, true),
            Some(raw) => match AttributeType::from_xml(raw) {
                Some(parsed) => (parsed, true),
                None => {
                    self.invalid_value(element, &path, format!("unknown attribute type '{}'", raw));
                    (AttributeType::Undefined, false)
                }
            },
        };

        let mut attribute = Attribute::new(name, attribute_type);
        attribute.optional = self.flag(element, &names.optional, &path);
        attribute.transient = self.flag(element, &names.transient, &path);
        attribute.indexed = self.flag(element, &names.indexed, &path);
        attribute.custom_class_name = element
            .attribute(&names.custom_class_name)
            .map(str::to_string);
        attribute.renaming_identifier = element
            .attribute(&names.renaming_identifier)
            .map(str::to_string);
        if type_known {
            attribute.default_value = self.default_value(element, attribute_type, &path);
        }
        attribute.extra_attributes = extra_attributes(
            element,
            &[
                &names.name,
                &names.optional,
                &names.transient,
                &names.attribute_type,
                &names.default_value,
                &names.default_date,
                &names.indexed,
                &names.custom_class_name,
                &names.renaming_identifier,
            ],
        );

        for child in element.children() {
            if child.name() == tags.user_info {
                self.parse_user_info(child, &path, &mut attribute.user_info);
            } else {
                self.skip(child, path.clone());
            }
        }

        Some(attribute)
    }

    fn default_value(
        &mut self,
        element: &XmlElement,
        attribute_type: AttributeType,
        path: &DiagnosticPath,
    ) -> Option<DefaultValue> {
        let vocabulary = self.vocabulary;
        let names = &vocabulary.attributes;

        if let Some(raw) = element.attribute(&names.default_date) {
            return match raw.trim().parse::<f64>() {
                Ok(interval) => Some(DefaultValue::Date(interval)),
                Err(_) => {
                    self.type_mismatch(element, path, format!("'{}' is not a time interval", raw));
                    None
                }
            };
        }

        let raw = element.attribute(&names.default_value)?;
        match DefaultValue::parse(attribute_type, raw) {
            Ok(value) => Some(value),
            Err(message) => {
                self.type_mismatch(element, path, message);
                None
            }
        }
    }

    fn parse_relationship(&mut self, entity: &str, element: &XmlElement) -> Option<Relationship> {
        let vocabulary = self.vocabulary;
        let tags = &vocabulary.tags;
        let names = &vocabulary.attributes;

        let name = self.required(element, &names.name, DiagnosticPath::entity(entity))?;
        let path = DiagnosticPath::member(entity, name);
        let destination = self.required(element, &names.destination_entity, path.clone())?;

        let mut relationship = Relationship::new(name, destination);
        relationship.inverse = element.attribute(&names.inverse_name).map(str::to_string);
        relationship.inverse_entity = element
            .attribute(&names.inverse_entity)
            .filter(|entity| *entity != destination)
            .map(str::to_string);
        relationship.min_count = self.count(element, &names.min_count, &path);
        relationship.max_count = self.count(element, &names.max_count, &path);
        relationship.to_many = if element.attribute(&names.to_many).is_some() {
            self.flag(element, &names.to_many, &path)
        } else {
            relationship.max_count.is_some_and(|max| max != 1)
        };
        relationship.ordered = self.flag(element, &names.ordered, &path);
        relationship.optional = self.flag(element, &names.optional, &path);
        relationship.transient = self.flag(element, &names.transient, &path);
        relationship.renaming_identifier = element
            .attribute(&names.renaming_identifier)
            .map(str::to_string);
        if let Some(raw) = element.attribute(&names.deletion_rule) {
            match DeleteRule::from_xml(raw) {
                Some(rule) => relationship.delete_rule = rule,
                None => {
                    self.invalid_value(element, &path, format!("unknown deletion rule '{}'", raw))
                }
            }
        }
        relationship.extra_attributes = extra_attributes(
            element,
            &[
                &names.name,
                &names.optional,
                &names.transient,
                &names.destination_entity,
                &names.inverse_name,
                &names.inverse_entity,
                &names.to_many,
                &names.ordered,
                &names.deletion_rule,
                &names.min_count,
                &names.max_count,
                &names.renaming_identifier,
            ],
        );

        for child in element.children() {
            if child.name() == tags.user_info {
                self.parse_user_info(child, &path, &mut relationship.user_info);
            } else {
                self.skip(child, path.clone());
            }
        }

        Some(relationship)
    }

    fn parse_fetch_index(&mut self, entity: &str, element: &XmlElement) -> Option<FetchIndex> {
        let vocabulary = self.vocabulary;
        let tags = &vocabulary.tags;
        let names = &vocabulary.attributes;

        let name = self.required(element, &names.name, DiagnosticPath::entity(entity))?;
        let path = DiagnosticPath::member(entity, name);
        let mut fetch_index = FetchIndex::new(name);

        for child in element.children() {
            if child.name() != tags.fetch_index_element {
                self.skip(child, path.clone());
                continue;
            }
            let Some(property) = self.required(child, &names.property, path.clone()) else {
                continue;
            };
            let mut index_element = FetchIndexElement::new(property);
            if let Some(raw) = child.attribute(&names.index_type) {
                match IndexKind::from_xml(raw) {
                    Some(kind) => index_element.kind = kind,
                    None => self.invalid_value(child, &path, format!("unknown index type '{}'", raw)),
                }
            }
            if let Some(raw) = child.attribute(&names.order) {
                match IndexOrder::from_xml(raw) {
                    Some(order) => index_element.order = order,
                    None => self.invalid_value(child, &path, format!("unknown index order '{}'", raw)),
                }
            }
            fetch_index.elements.push(index_element);
        }

        Some(fetch_index)
    }

    fn parse_user_info(&mut self, element: &XmlElement, path: &DiagnosticPath, info: &mut UserInfo) {
        let vocabulary = self.vocabulary;
        let names = &vocabulary.attributes;

        for child in element.children() {
            if child.name() != vocabulary.tags.user_info_entry {
                self.skip(child, path.clone());
                continue;
            }
            let Some(key) = self.required(child, &names.key, path.clone()) else {
                continue;
            };
            info.insert(key, child.attribute(&names.value).unwrap_or_default());
        }
    }

    fn parse_configuration(&mut self, element: &XmlElement) {
        let vocabulary = self.vocabulary;
        let tags = &vocabulary.tags;
        let names = &vocabulary.attributes;

        let Some(name) = self.required(element, &names.name, DiagnosticPath::model()) else {
            return;
        };
        let path = DiagnosticPath::configuration(name);

        let mut configuration = Configuration::new(name);
        configuration.extra_attributes = extra_attributes(element, &[&names.name]);
        let handle = match self.builder.add_configuration_with(configuration) {
            Ok(handle) => handle,
            Err(err) => {
                self.build_error(err, path, element);
                return;
            }
        };
        if let Some(offset) = element.offset() {
            self.sources.configurations.insert(name.to_string(), offset);
        }

        for child in element.children() {
            if child.name() != tags.member_entity {
                self.skip(child, path.clone());
                continue;
            }
            let Some(member) = self.required(child, &names.name, path.clone()) else {
                continue;
            };
            let member_path = DiagnosticPath {
                entity: Some(member.to_string()),
                member: None,
                configuration: Some(name.to_string()),
            };
            match self.builder.add_configuration_member(handle, member) {
                Ok(()) => {
                    if let Some(offset) = child.offset() {
                        self.sources
                            .configuration_members
                            .entry(name.to_string())
                            .or_default()
                            .insert(member.to_string(), offset);
                    }
                }
                Err(err) => self.build_error(err, member_path, child),
            }
        }
    }

    /// Skip an element the vocabulary does not describe here
    fn skip(&mut self, element: &XmlElement, path: DiagnosticPath) {
        if self.vocabulary.is_ignored(element.name()) {
            debug!(tag = element.name(), "skipping ignored element");
            return;
        }
        debug!(tag = element.name(), %path, "skipping unknown element");
        self.report(
            Diagnostic::warning(
                DiagnosticKind::UnknownElement,
                path,
                format!("unknown element <{}>", element.name()),
            )
            .at(element.offset()),
        );
    }

    fn required<'e>(
        &mut self,
        element: &'e XmlElement,
        attribute: &str,
        path: DiagnosticPath,
    ) -> Option<&'e str> {
        let value = element.attribute(attribute);
        if value.is_none() {
            debug!(tag = element.name(), attribute, "excluding element without required attribute");
            self.report(
                Diagnostic::error(
                    DiagnosticKind::MissingAttribute,
                    path,
                    format!(
                        "<{}> is missing required attribute '{}'",
                        element.name(),
                        attribute
                    ),
                )
                .at(element.offset()),
            );
        }
        value
    }

    fn flag(&mut self, element: &XmlElement, attribute: &str, path: &DiagnosticPath) -> bool {
        let Some(raw) = element.attribute(attribute) else {
            return false;
        };
        match parse_flag(raw) {
            Some(value) => value,
            None => {
                self.invalid_value(
                    element,
                    path,
                    format!("'{}' is not a valid value for '{}', expected YES or NO", raw, attribute),
                );
                false
            }
        }
    }

    fn count(&mut self, element: &XmlElement, attribute: &str, path: &DiagnosticPath) -> Option<u32> {
        let raw = element.attribute(attribute)?;
        match raw.trim().parse::<u32>() {
            Ok(count) => Some(count),
            Err(_) => {
                self.invalid_value(
                    element,
                    path,
                    format!("'{}' is not a valid count for '{}'", raw, attribute),
                );
                None
            }
        }
    }

    fn invalid_value(&mut self, element: &XmlElement, path: &DiagnosticPath, message: String) {
        self.report(
            Diagnostic::error(DiagnosticKind::InvalidValue, path.clone(), message).at(element.offset()),
        );
    }

    fn type_mismatch(&mut self, element: &XmlElement, path: &DiagnosticPath, message: String) {
        self.report(
            Diagnostic::error(DiagnosticKind::TypeMismatch, path.clone(), message).at(element.offset()),
        );
    }

    fn build_error(&mut self, err: BuildError, path: DiagnosticPath, element: &XmlElement) {
        let kind = match err {
            BuildError::NameCollision { .. } => DiagnosticKind::NameCollision,
            BuildError::UnknownHandle(_) => DiagnosticKind::InvalidValue,
        };
        debug!(tag = element.name(), %path, "skipping element: {}", err);
        self.report(Diagnostic::error(kind, path, err.to_string()).at(element.offset()));
    }
}

/// Positions up the parent chain, stopping at a missing name or a revisit
fn ancestor_positions(entities: &[Entity], index: &HashMap<&str, usize>, start: usize) -> Vec<usize> {
    let mut visited = HashSet::from([start]);
    let mut chain = Vec::new();
    let mut next = entities[start].parent.as_deref();
    while let Some(&position) = next.and_then(|name| index.get(name)) {
        if !visited.insert(position) {
            break;
        }
        chain.push(position);
        next = entities[position].parent.as_deref();
    }
    chain
}

fn extra_attributes(element: &XmlElement, known: &[&String]) -> Vec<(String, String)> {
    element
        .attributes()
        .iter()
        .filter(|(key, _)| !known.iter().any(|name| *name == key))
        .cloned()
        .collect()
}
