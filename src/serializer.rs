//! Model Serializer
//!
//! Writes a [`Model`] back to canonical XML. Output is a pure function of the
//! model: `<model>` metadata first, then entities in declaration order (each
//! with attributes, relationships, fetch indexes and userInfo), then
//! configurations. Each element writes its attributes in a fixed order with
//! passthrough attributes last.

use crate::model::{
    Attribute, Configuration, DefaultValue, Entity, FetchIndex, Model, Relationship, UserInfo,
};
use crate::vocabulary::Vocabulary;
use crate::xml::{XmlDocument, XmlElement};

const YES: &str = "YES";

pub fn serialize(model: &Model) -> String {
    serialize_with(model, &Vocabulary::default())
}

pub fn serialize_with(model: &Model, vocabulary: &Vocabulary) -> String {
    to_document(model, vocabulary).render()
}

pub fn serialize_bytes(model: &Model) -> Vec<u8> {
    serialize(model).into_bytes()
}

/// Build the element tree without rendering it
pub fn to_document(model: &Model, vocabulary: &Vocabulary) -> XmlDocument {
    let writer = ModelWriter { vocabulary };
    XmlDocument::new(writer.model(model))
}

struct ModelWriter<'v> {
    vocabulary: &'v Vocabulary,
}

impl ModelWriter<'_> {
    fn model(&self, model: &Model) -> XmlElement {
        let mut root = XmlElement::new(&self.vocabulary.tags.model);
        for (key, value) in model.metadata() {
            root.set_attribute(key, value);
        }
        if let Some(identifier) = model.version_identifier() {
            root.set_attribute(&self.vocabulary.attributes.version_identifier, identifier);
        }

        for entity in model.entities() {
            root.append_child(self.entity(entity));
        }
        for configuration in model.configurations() {
            root.append_child(self.configuration(configuration));
        }
        root
    }

    fn entity(&self, entity: &Entity) -> XmlElement {
        let names = &self.vocabulary.attributes;
        let mut element = XmlElement::new(&self.vocabulary.tags.entity);
        element.set_attribute(&names.name, &entity.name);
        set_optional(&mut element, &names.represented_class_name, &entity.class_name);
        set_optional(&mut element, &names.parent_entity, &entity.parent);
        set_flag(&mut element, &names.is_abstract, entity.is_abstract);
        set_flag(&mut element, &names.syncable, entity.syncable);
        set_optional(&mut element, &names.renaming_identifier, &entity.renaming_identifier);
        set_extra(&mut element, &entity.extra_attributes);

        for attribute in &entity.attributes {
            element.append_child(self.attribute(attribute));
        }
        for relationship in &entity.relationships {
            element.append_child(self.relationship(relationship));
        }
        for fetch_index in &entity.fetch_indexes {
            element.append_child(self.fetch_index(fetch_index));
        }
        self.append_user_info(&mut element, &entity.user_info);
        element
    }

    fn attribute(&self, attribute: &Attribute) -> XmlElement {
        let names = &self.vocabulary.attributes;
        let mut element = XmlElement::new(&self.vocabulary.tags.attribute);
        element.set_attribute(&names.name, &attribute.name);
        set_flag(&mut element, &names.optional, attribute.optional);
        set_flag(&mut element, &names.transient, attribute.transient);
        element.set_attribute(&names.attribute_type, attribute.attribute_type.as_xml());
        match &attribute.default_value {
            Some(DefaultValue::Date(interval)) => {
                element.set_attribute(&names.default_date, interval.to_string());
            }
            Some(value) => element.set_attribute(&names.default_value, value.to_xml_string()),
            None => {}
        }
        set_flag(&mut element, &names.indexed, attribute.indexed);
        set_optional(&mut element, &names.custom_class_name, &attribute.custom_class_name);
        set_optional(&mut element, &names.renaming_identifier, &attribute.renaming_identifier);
        set_extra(&mut element, &attribute.extra_attributes);
        self.append_user_info(&mut element, &attribute.user_info);
        element
    }

    fn relationship(&self, relationship: &Relationship) -> XmlElement {
        let names = &self.vocabulary.attributes;
        let mut element = XmlElement::new(&self.vocabulary.tags.relationship);
        element.set_attribute(&names.name, &relationship.name);
        set_flag(&mut element, &names.optional, relationship.optional);
        set_flag(&mut element, &names.transient, relationship.transient);
        if relationship.to_many {
            element.set_attribute(&names.to_many, YES);
        } else if relationship.max_count.is_some_and(|max| max != 1) {
            // an absent toMany would be inferred from maxCount on reading
            element.set_attribute(&names.to_many, "NO");
        }
        set_flag(&mut element, &names.ordered, relationship.ordered);
        if let Some(min) = relationship.min_count {
            element.set_attribute(&names.min_count, min.to_string());
        }
        if let Some(max) = relationship.max_count {
            element.set_attribute(&names.max_count, max.to_string());
        }
        element.set_attribute(&names.deletion_rule, relationship.delete_rule.as_xml());
        element.set_attribute(&names.destination_entity, &relationship.destination);
        if let Some(inverse) = &relationship.inverse {
            element.set_attribute(&names.inverse_name, inverse);
        }
        match &relationship.inverse_entity {
            Some(entity) => element.set_attribute(&names.inverse_entity, entity),
            None if relationship.inverse.is_some() => {
                element.set_attribute(&names.inverse_entity, &relationship.destination)
            }
            None => {}
        }
        set_optional(&mut element, &names.renaming_identifier, &relationship.renaming_identifier);
        set_extra(&mut element, &relationship.extra_attributes);
        self.append_user_info(&mut element, &relationship.user_info);
        element
    }

    fn fetch_index(&self, fetch_index: &FetchIndex) -> XmlElement {
        let names = &self.vocabulary.attributes;
        let mut element = XmlElement::new(&self.vocabulary.tags.fetch_index);
        element.set_attribute(&names.name, &fetch_index.name);
        for index_element in &fetch_index.elements {
            element.append_child(
                XmlElement::new(&self.vocabulary.tags.fetch_index_element)
                    .with_attribute(&names.property, &index_element.property)
                    .with_attribute(&names.index_type, index_element.kind.as_xml())
                    .with_attribute(&names.order, index_element.order.as_xml()),
            );
        }
        element
    }

    fn configuration(&self, configuration: &Configuration) -> XmlElement {
        let names = &self.vocabulary.attributes;
        let mut element = XmlElement::new(&self.vocabulary.tags.configuration);
        element.set_attribute(&names.name, &configuration.name);
        set_extra(&mut element, &configuration.extra_attributes);
        for member in &configuration.entities {
            element.append_child(
                XmlElement::new(&self.vocabulary.tags.member_entity)
                    .with_attribute(&names.name, member),
            );
        }
        element
    }

    fn append_user_info(&self, element: &mut XmlElement, info: &UserInfo) {
        if info.is_empty() {
            return;
        }
        let names = &self.vocabulary.attributes;
        let block = element.append_child(XmlElement::new(&self.vocabulary.tags.user_info));
        for (key, value) in info.iter() {
            block.append_child(
                XmlElement::new(&self.vocabulary.tags.user_info_entry)
                    .with_attribute(&names.key, key)
                    .with_attribute(&names.value, value),
            );
        }
    }
}

fn set_flag(element: &mut XmlElement, name: &str, value: bool) {
    if value {
        element.set_attribute(name, YES);
    }
}

fn set_optional(element: &mut XmlElement, name: &str, value: &Option<String>) {
    if let Some(value) = value {
        element.set_attribute(name, value);
    }
}

fn set_extra(element: &mut XmlElement, extra: &[(String, String)]) {
    for (key, value) in extra {
        element.set_attribute(key, value);
    }
}
