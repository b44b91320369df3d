//! Tag and attribute names used by Core Data model documents.
//!
//! Defaults match the `contents` file Xcode writes inside an `.xcdatamodel`
//! directory. Every name can be overridden from the `[vocabulary]` section of
//! the configuration file, so documents written by other tools (or future
//! Xcode releases) can be read without code changes.

use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct Vocabulary {
    pub tags: TagNames,
    pub attributes: AttributeNames,
    /// Known elements that carry no model semantics and are skipped quietly
    pub ignored_elements: Vec<String>,
}

impl Default for Vocabulary {
    fn default() -> Self {
        Self {
            tags: TagNames::default(),
            attributes: AttributeNames::default(),
            ignored_elements: vec!["elements".to_string()],
        }
    }
}

impl Vocabulary {
    pub fn is_ignored(&self, tag: &str) -> bool {
        self.ignored_elements.iter().any(|ignored| ignored == tag)
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct TagNames {
    pub model: String,
    pub entity: String,
    pub attribute: String,
    pub relationship: String,
    pub fetch_index: String,
    pub fetch_index_element: String,
    pub user_info: String,
    pub user_info_entry: String,
    pub configuration: String,
    pub member_entity: String,
}

impl Default for TagNames {
    fn default() -> Self {
        Self {
            model: "model".to_string(),
            entity: "entity".to_string(),
            attribute: "attribute".to_string(),
            relationship: "relationship".to_string(),
            fetch_index: "fetchIndex".to_string(),
            fetch_index_element: "fetchIndexElement".to_string(),
            user_info: "userInfo".to_string(),
            user_info_entry: "entry".to_string(),
            configuration: "configuration".to_string(),
            member_entity: "memberEntity".to_string(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct AttributeNames {
    pub name: String,
    pub version_identifier: String,
    pub represented_class_name: String,
    pub parent_entity: String,
    pub is_abstract: String,
    pub syncable: String,
    pub renaming_identifier: String,
    pub optional: String,
    pub transient: String,
    pub attribute_type: String,
    pub default_value: String,
    pub default_date: String,
    pub indexed: String,
    pub custom_class_name: String,
    pub destination_entity: String,
    pub inverse_name: String,
    pub inverse_entity: String,
    pub to_many: String,
    pub ordered: String,
    pub deletion_rule: String,
    pub min_count: String,
    pub max_count: String,
    pub property: String,
    pub index_type: String,
    pub order: String,
    pub key: String,
    pub value: String,
}

impl Default for AttributeNames {
    fn default() -> Self {
        Self {
            name: "name".to_string(),
            version_identifier: "userDefinedModelVersionIdentifier".to_string(),
            represented_class_name: "representedClassName".to_string(),
            parent_entity: "parentEntity".to_string(),
            is_abstract: "isAbstract".to_string(),
            syncable: "syncable".to_string(),
            renaming_identifier: "renamingIdentifier".to_string(),
            optional: "optional".to_string(),
            transient: "transient".to_string(),
            attribute_type: "attributeType".to_string(),
            default_value: "defaultValueString".to_string(),
            default_date: "defaultDateTimeInterval".to_string(),
            indexed: "indexed".to_string(),
            custom_class_name: "customClassName".to_string(),
            destination_entity: "destinationEntity".to_string(),
            inverse_name: "inverseName".to_string(),
            inverse_entity: "inverseEntity".to_string(),
            to_many: "toMany".to_string(),
            ordered: "ordered".to_string(),
            deletion_rule: "deletionRule".to_string(),
            min_count: "minCount".to_string(),
            max_count: "maxCount".to_string(),
            property: "property".to_string(),
            index_type: "type".to_string(),
            order: "order".to_string(),
            key: "key".to_string(),
            value: "value".to_string(),
        }
    }
}
