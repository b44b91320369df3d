//! Semantic Validator
//!
//! Read-only checks over a built [`Model`]. Callable on parser output and on
//! programmatically built models alike; it never mutates the model, it only
//! accumulates diagnostics. Results are returned sorted into model order
//! (entities in declaration order, then configurations).

use std::collections::{BTreeSet, HashSet};

use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::diagnostic::{Diagnostic, DiagnosticKind, DiagnosticPath, Severity};
use crate::model::{Configuration, Entity, Model, Relationship};

/// Tunable validation rules
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct ValidationPolicy {
    /// Report an inverse that does not point back as a warning instead of an error
    pub allow_one_directional_inverses: bool,
    /// Warn about relationships that declare no inverse at all
    pub warn_missing_inverse: bool,
}

impl Default for ValidationPolicy {
    fn default() -> Self {
        Self {
            allow_one_directional_inverses: true,
            warn_missing_inverse: false,
        }
    }
}

impl ValidationPolicy {
    /// Every inverse must be declared on both sides
    pub fn strict() -> Self {
        Self {
            allow_one_directional_inverses: false,
            ..Self::default()
        }
    }
}

pub fn validate(model: &Model) -> Vec<Diagnostic> {
    validate_with(model, &ValidationPolicy::default())
}

pub fn validate_with(model: &Model, policy: &ValidationPolicy) -> Vec<Diagnostic> {
    let mut validator = Validator {
        model,
        policy,
        findings: Vec::new(),
        reported_cycles: HashSet::new(),
    };
    validator.run();

    let mut findings = validator.findings;
    findings.sort_by_key(|(position, _)| *position);
    debug!(
        entities = model.entities().len(),
        diagnostics = findings.len(),
        "validated model"
    );
    findings.into_iter().map(|(_, d)| d).collect()
}

/// Sort key: (entity or configuration slot, member slot)
type Position = (usize, usize);

struct Validator<'a> {
    model: &'a Model,
    policy: &'a ValidationPolicy,
    findings: Vec<(Position, Diagnostic)>,
    reported_cycles: HashSet<BTreeSet<&'a str>>,
}

impl<'a> Validator<'a> {
    fn run(&mut self) {
        let model = self.model;
        for (position, entity) in model.entities().iter().enumerate() {
            self.check_entity(position, entity);
        }
        for (position, configuration) in model.configurations().iter().enumerate() {
            self.check_configuration(model.entities().len() + position, configuration);
        }
    }

    fn push(&mut self, position: Position, diagnostic: Diagnostic) {
        self.findings.push((position, diagnostic));
    }

    fn check_entity(&mut self, position: usize, entity: &'a Entity) {
        let model = self.model;
        let path = || DiagnosticPath::entity(&entity.name);

        if model.entity_position(&entity.name) != Some(position) {
            self.push(
                (position, 0),
                Diagnostic::error(
                    DiagnosticKind::NameCollision,
                    path(),
                    format!("entity '{}' is declared more than once", entity.name),
                ),
            );
        }

        if let Some(parent) = entity.parent.as_deref() {
            if model.entity(parent).is_none() {
                self.push(
                    (position, 0),
                    Diagnostic::error(
                        DiagnosticKind::DanglingReference,
                        path(),
                        format!("parent entity '{}' does not exist", parent),
                    ),
                );
            }
        }

        self.check_inheritance_cycle(position, entity);
        self.check_property_names(position, entity);

        for (index, attribute) in entity.attributes.iter().enumerate() {
            if let Some(default) = &attribute.default_value {
                if !default.is_compatible_with(attribute.attribute_type) {
                    self.push(
                        (position, 1 + index),
                        Diagnostic::error(
                            DiagnosticKind::TypeMismatch,
                            DiagnosticPath::member(&entity.name, &attribute.name),
                            format!(
                                "default value '{}' does not fit type {}",
                                default.to_xml_string(),
                                attribute.attribute_type
                            ),
                        ),
                    );
                }
            }
        }

        let base = 1 + entity.attributes.len();
        for (index, relationship) in entity.relationships.iter().enumerate() {
            self.check_relationship((position, base + index), entity, relationship);
        }

        let base = base + entity.relationships.len();
        for (index, fetch_index) in entity.fetch_indexes.iter().enumerate() {
            for element in &fetch_index.elements {
                let known = model.resolve_attribute(entity, &element.property).is_some()
                    || model.resolve_relationship(entity, &element.property).is_some();
                if !known {
                    self.push(
                        (position, base + index),
                        Diagnostic::error(
                            DiagnosticKind::DanglingReference,
                            DiagnosticPath::member(&entity.name, &fetch_index.name),
                            format!(
                                "fetch index '{}' refers to unknown property '{}'",
                                fetch_index.name, element.property
                            ),
                        ),
                    );
                }
            }
        }
    }

    /// Walk the parent chain with a visited list; report each cycle once
    fn check_inheritance_cycle(&mut self, position: usize, entity: &'a Entity) {
        let model = self.model;
        let mut path: Vec<&'a str> = vec![entity.name.as_str()];
        let mut next = entity.parent.as_deref();

        while let Some(current) = next.and_then(|name| model.entity(name)) {
            if let Some(start) = path.iter().position(|name| *name == current.name) {
                let members: BTreeSet<&'a str> = path[start..].iter().copied().collect();
                if self.reported_cycles.insert(members) {
                    let mut rendered: Vec<&str> = path[start..].to_vec();
                    rendered.push(current.name.as_str());
                    let owner = model.entity_position(&current.name).unwrap_or(position);
                    self.push(
                        (owner, 0),
                        Diagnostic::error(
                            DiagnosticKind::InheritanceCycle,
                            DiagnosticPath::entity(&current.name),
                            format!("inheritance cycle: {}", rendered.join(" -> ")),
                        ),
                    );
                }
                return;
            }
            path.push(current.name.as_str());
            next = current.parent.as_deref();
        }
    }

    fn check_property_names(&mut self, position: usize, entity: &'a Entity) {
        let model = self.model;
        let names = entity
            .attributes
            .iter()
            .map(|a| a.name.as_str())
            .chain(entity.relationships.iter().map(|r| r.name.as_str()));

        let mut seen = HashSet::new();
        for (slot, name) in names.enumerate() {
            let diagnostic = if !seen.insert(name) {
                Some(format!("property '{}' is declared more than once", name))
            } else {
                model
                    .ancestors(entity)
                    .find(|ancestor| ancestor.declares_property(name))
                    .map(|ancestor| {
                        format!(
                            "property '{}' redeclares a property inherited from '{}'",
                            name, ancestor.name
                        )
                    })
            };
            if let Some(message) = diagnostic {
                self.push(
                    (position, 1 + slot),
                    Diagnostic::error(
                        DiagnosticKind::NameCollision,
                        DiagnosticPath::member(&entity.name, name),
                        message,
                    ),
                );
            }
        }

        let base = 1 + entity.attributes.len() + entity.relationships.len();
        let mut seen = HashSet::new();
        for (slot, fetch_index) in entity.fetch_indexes.iter().enumerate() {
            let name = fetch_index.name.as_str();
            let inherited = model
                .ancestors(entity)
                .find(|ancestor| ancestor.fetch_index(name).is_some());
            let message = if !seen.insert(name) {
                Some(format!("fetch index '{}' is declared more than once", name))
            } else {
                inherited.map(|ancestor| {
                    format!(
                        "fetch index '{}' is already declared by ancestor '{}'",
                        name, ancestor.name
                    )
                })
            };
            if let Some(message) = message {
                self.push(
                    (position, base + slot),
                    Diagnostic::error(
                        DiagnosticKind::NameCollision,
                        DiagnosticPath::member(&entity.name, name),
                        message,
                    ),
                );
            }
        }
    }

    fn check_relationship(
        &mut self,
        position: Position,
        entity: &'a Entity,
        relationship: &'a Relationship,
    ) {
        let model = self.model;
        let path = || DiagnosticPath::member(&entity.name, &relationship.name);

        if relationship.ordered && !relationship.to_many {
            self.push(
                position,
                Diagnostic::warning(
                    DiagnosticKind::IneffectiveFlag,
                    path(),
                    "ordered has no effect on a to-one relationship",
                ),
            );
        }

        let Some(destination) = model.destination(relationship) else {
            self.push(
                position,
                Diagnostic::error(
                    DiagnosticKind::DanglingReference,
                    path(),
                    format!(
                        "destination entity '{}' does not exist",
                        relationship.destination
                    ),
                ),
            );
            return;
        };

        if let Some(inverse_entity) = relationship.inverse_entity.as_deref()
            && inverse_entity != relationship.destination
        {
            self.push(
                position,
                Diagnostic::error(
                    DiagnosticKind::InverseAsymmetry,
                    path(),
                    format!(
                        "inverse entity '{}' differs from destination '{}'",
                        inverse_entity, relationship.destination
                    ),
                ),
            );
            return;
        }

        let Some(inverse_name) = relationship.inverse.as_deref() else {
            if self.policy.warn_missing_inverse {
                self.push(
                    position,
                    Diagnostic::warning(
                        DiagnosticKind::MissingInverse,
                        path(),
                        "relationship has no inverse",
                    ),
                );
            }
            return;
        };

        let Some((_, inverse)) = model.resolve_relationship(destination, inverse_name) else {
            self.push(
                position,
                Diagnostic::error(
                    DiagnosticKind::DanglingReference,
                    path(),
                    format!(
                        "inverse relationship '{}' does not exist on '{}'",
                        inverse_name, destination.name
                    ),
                ),
            );
            return;
        };

        if !model.is_kind_of(entity, &inverse.destination) {
            self.push(
                position,
                Diagnostic::error(
                    DiagnosticKind::InverseAsymmetry,
                    path(),
                    format!(
                        "inverse '{}.{}' points to '{}', not '{}'",
                        destination.name, inverse.name, inverse.destination, entity.name
                    ),
                ),
            );
            return;
        }

        match inverse.inverse.as_deref() {
            Some(back) if back == relationship.name => {}
            Some(back) => self.push(
                position,
                Diagnostic::error(
                    DiagnosticKind::InverseAsymmetry,
                    path(),
                    format!(
                        "inverse '{}.{}' names '{}' as its inverse, not '{}'",
                        destination.name, inverse.name, back, relationship.name
                    ),
                ),
            ),
            None => {
                let severity = if self.policy.allow_one_directional_inverses {
                    Severity::Warning
                } else {
                    Severity::Error
                };
                self.push(
                    position,
                    Diagnostic::new(
                        severity,
                        DiagnosticKind::InverseAsymmetry,
                        path(),
                        format!(
                            "inverse '{}.{}' does not declare '{}' as its inverse",
                            destination.name, inverse.name, relationship.name
                        ),
                    ),
                );
            }
        }
    }

    fn check_configuration(&mut self, position: usize, configuration: &'a Configuration) {
        let model = self.model;
        let first = model
            .configurations()
            .iter()
            .position(|c| c.name == configuration.name);
        if first != Some(position - model.entities().len()) {
            self.push(
                (position, 0),
                Diagnostic::error(
                    DiagnosticKind::NameCollision,
                    DiagnosticPath::configuration(&configuration.name),
                    format!(
                        "configuration '{}' is declared more than once",
                        configuration.name
                    ),
                ),
            );
        }

        let mut seen = HashSet::new();
        for (slot, member) in configuration.entities.iter().enumerate() {
            let path = DiagnosticPath {
                entity: Some(member.clone()),
                member: None,
                configuration: Some(configuration.name.clone()),
            };
            if !seen.insert(member.as_str()) {
                self.push(
                    (position, 1 + slot),
                    Diagnostic::error(
                        DiagnosticKind::NameCollision,
                        path,
                        format!("entity '{}' is listed more than once", member),
                    ),
                );
            } else if model.entity(member).is_none() {
                self.push(
                    (position, 1 + slot),
                    Diagnostic::error(
                        DiagnosticKind::DanglingReference,
                        path,
                        format!("member entity '{}' does not exist", member),
                    ),
                );
            }
        }
    }
}
