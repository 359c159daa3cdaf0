//! Output records of a resolution pass.

use super::context::AttributeContext;
use indexmap::IndexMap;
use serde::Serialize;
use serde_json::Value;

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ResolvedArgument {
    pub parameter: String,
    pub value: ResolvedValue,
}

/// A trait with every argument bound to a parameter.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ResolvedTrait {
    pub name: String,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub arguments: Vec<ResolvedArgument>,
    #[serde(skip_serializing_if = "std::ops::Not::not")]
    pub elevated: bool,
    #[serde(skip_serializing_if = "std::ops::Not::not")]
    pub modifies_attributes: bool,
    #[serde(skip_serializing_if = "std::ops::Not::not")]
    pub ugly: bool,
}

impl ResolvedTrait {
    /// A trait produced by the engine itself rather than declared in the corpus.
    pub fn generated<I, S>(name: &str, arguments: I) -> Self
    where
        I: IntoIterator<Item = (S, ResolvedValue)>,
        S: Into<String>,
    {
        Self {
            name: name.to_string(),
            arguments: arguments
                .into_iter()
                .map(|(parameter, value)| ResolvedArgument {
                    parameter: parameter.into(),
                    value,
                })
                .collect(),
            elevated: false,
            modifies_attributes: false,
            ugly: false,
        }
    }

    pub fn argument(&self, parameter: &str) -> Option<&ResolvedValue> {
        self.arguments
            .iter()
            .find(|a| a.parameter == parameter)
            .map(|a| &a.value)
    }

    /// Fold a later application of the same trait into this one.
    pub fn merge(&mut self, later: ResolvedTrait) {
        for argument in later.arguments {
            match self
                .arguments
                .iter_mut()
                .find(|a| a.parameter == argument.parameter)
            {
                Some(existing) => existing.value = argument.value,
                None => self.arguments.push(argument),
            }
        }
        self.elevated = later.elevated;
        self.modifies_attributes = later.modifies_attributes;
        self.ugly = later.ugly;
    }
}

/// A fixed table carried by a constant entity argument.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ConstantTable {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub constant_entity: Option<String>,
    pub entity_shape: String,
    pub columns: Vec<String>,
    pub rows: Vec<Vec<String>>,
}

/// A bound trait argument.
///
/// Each object form is told apart by its key, so the JSON output stays
/// unambiguous without a tag.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(untagged)]
pub enum ResolvedValue {
    Text(String),
    Entity {
        entity: String,
    },
    Table(ConstantTable),
    Trait {
        #[serde(rename = "traitReference")]
        reference: ResolvedTrait,
    },
    Purpose {
        #[serde(rename = "purposeReference")]
        name: String,
    },
    DataType {
        #[serde(rename = "dataTypeReference")]
        name: String,
    },
    AttributeGroup {
        #[serde(rename = "attributeGroupReference")]
        name: String,
    },
    Attribute(Box<ResolvedAttribute>),
    EntityAttribute {
        name: String,
        entities: Vec<String>,
    },
}

impl ResolvedValue {
    pub fn text(value: impl Into<String>) -> Self {
        ResolvedValue::Text(value.into())
    }
}

/// One attribute of a resolved entity.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ResolvedAttribute {
    pub name: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub data_type: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub purpose: Option<String>,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub traits: Vec<ResolvedTrait>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub is_primary_key: Option<bool>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub is_read_only: Option<bool>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub is_nullable: Option<bool>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub default_value: Option<Value>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub maximum_length: Option<u32>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub maximum_value: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub minimum_value: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub value_constrained_to_list: Option<bool>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub data_format: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub display_name: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub source_name: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub source_ordering: Option<i64>,
    /// Nested attributes of a structured entity attribute.
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub members: Vec<ResolvedAttribute>,
}

impl ResolvedAttribute {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            data_type: None,
            purpose: None,
            traits: Vec::new(),
            is_primary_key: None,
            is_read_only: None,
            is_nullable: None,
            default_value: None,
            maximum_length: None,
            maximum_value: None,
            minimum_value: None,
            value_constrained_to_list: None,
            data_format: None,
            display_name: None,
            description: None,
            source_name: None,
            source_ordering: None,
            members: Vec::new(),
        }
    }

    pub fn group(name: impl Into<String>, members: Vec<ResolvedAttribute>) -> Self {
        Self {
            members,
            ..Self::new(name)
        }
    }

    pub fn trait_named(&self, name: &str) -> Option<&ResolvedTrait> {
        self.traits.iter().find(|t| t.name == name)
    }

    pub fn has_trait(&self, name: &str) -> bool {
        self.trait_named(name).is_some()
    }

    /// Add a trait, merging it into an earlier one with the same name.
    pub fn add_trait(&mut self, resolved: ResolvedTrait) {
        match self.traits.iter_mut().find(|t| t.name == resolved.name) {
            Some(existing) => existing.merge(resolved),
            None => self.traits.push(resolved),
        }
    }

    /// Traits a presentation layer should show.
    pub fn presentable_traits(&self) -> impl Iterator<Item = &ResolvedTrait> {
        self.traits.iter().filter(|t| !t.ugly)
    }

    /// Fold a later declaration of the same attribute into this one.
    ///
    /// Explicit values of `later` win; traits and members merge by name.
    pub fn merge(&mut self, later: ResolvedAttribute) {
        macro_rules! take_some {
            ($($field:ident),*) => {
                $(if later.$field.is_some() {
                    self.$field = later.$field;
                })*
            };
        }
        take_some!(
            data_type,
            purpose,
            is_primary_key,
            is_read_only,
            is_nullable,
            default_value,
            maximum_length,
            maximum_value,
            minimum_value,
            value_constrained_to_list,
            data_format,
            display_name,
            description,
            source_name,
            source_ordering
        );
        for t in later.traits {
            self.add_trait(t);
        }
        for member in later.members {
            match self.members.iter_mut().find(|m| m.name == member.name) {
                Some(existing) => existing.merge(member),
                None => self.members.push(member),
            }
        }
    }
}

/// Ordered attribute list with unique names.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ResolvedAttributeSet {
    attributes: IndexMap<String, ResolvedAttribute>,
}

impl ResolvedAttributeSet {
    pub fn new() -> Self {
        Self::default()
    }

    /// Append `attribute`, or merge it in place when its name is already present.
    pub fn push(&mut self, attribute: ResolvedAttribute) {
        match self.attributes.get_mut(&attribute.name) {
            Some(existing) => existing.merge(attribute),
            None => {
                self.attributes.insert(attribute.name.clone(), attribute);
            }
        }
    }

    pub fn extend(&mut self, other: ResolvedAttributeSet) {
        for attribute in other.attributes.into_values() {
            self.push(attribute);
        }
    }

    pub fn remove(&mut self, name: &str) -> Option<ResolvedAttribute> {
        self.attributes.shift_remove(name)
    }

    pub fn retain(&mut self, mut keep: impl FnMut(&ResolvedAttribute) -> bool) {
        self.attributes.retain(|_, attribute| keep(attribute));
    }

    pub fn get(&self, name: &str) -> Option<&ResolvedAttribute> {
        self.attributes.get(name)
    }

    pub fn contains(&self, name: &str) -> bool {
        self.attributes.contains_key(name)
    }

    pub fn names(&self) -> impl Iterator<Item = &str> {
        self.attributes.keys().map(String::as_str)
    }

    pub fn iter(&self) -> impl Iterator<Item = &ResolvedAttribute> {
        self.attributes.values()
    }

    pub fn len(&self) -> usize {
        self.attributes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.attributes.is_empty()
    }

    pub fn into_vec(self) -> Vec<ResolvedAttribute> {
        self.attributes.into_values().collect()
    }
}

/// The result of resolving one entity.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ResolvedEntity {
    pub entity_name: String,
    pub attributes: Vec<ResolvedAttribute>,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub traits: Vec<ResolvedTrait>,
    pub context: AttributeContext,
}

impl ResolvedEntity {
    pub fn attribute(&self, name: &str) -> Option<&ResolvedAttribute> {
        self.attributes.iter().find(|a| a.name == name)
    }

    pub fn attribute_names(&self) -> Vec<&str> {
        self.attributes.iter().map(|a| a.name.as_str()).collect()
    }

    pub fn trait_named(&self, name: &str) -> Option<&ResolvedTrait> {
        self.traits.iter().find(|t| t.name == name)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn redeclared_attribute_merges_in_place() {
        let mut set = ResolvedAttributeSet::new();
        let mut id = ResolvedAttribute::new("id");
        id.data_type = Some("string".into());
        id.add_trait(ResolvedTrait::generated(
            "is.constrained",
            [("maximumLength", ResolvedValue::text("10"))],
        ));
        set.push(id);
        set.push(ResolvedAttribute::new("name"));

        let mut again = ResolvedAttribute::new("id");
        again.is_nullable = Some(false);
        again.add_trait(ResolvedTrait::generated(
            "is.constrained",
            [("maximumLength", ResolvedValue::text("20"))],
        ));
        set.push(again);

        assert_eq!(set.names().collect::<Vec<_>>(), vec!["id", "name"]);
        let id = set.get("id").unwrap();
        assert_eq!(id.data_type.as_deref(), Some("string"));
        assert_eq!(id.is_nullable, Some(false));
        assert_eq!(id.traits.len(), 1);
        assert_eq!(
            id.traits[0].argument("maximumLength"),
            Some(&ResolvedValue::text("20"))
        );
    }

    #[test]
    fn group_members_merge_by_name() {
        let mut owner = ResolvedAttribute::group(
            "owner",
            vec![ResolvedAttribute::new("id"), ResolvedAttribute::new("fullName")],
        );
        let mut id = ResolvedAttribute::new("id");
        id.is_nullable = Some(false);
        owner.merge(ResolvedAttribute::group(
            "owner",
            vec![id, ResolvedAttribute::new("legalName")],
        ));

        let members: Vec<&str> = owner.members.iter().map(|m| m.name.as_str()).collect();
        assert_eq!(members, vec!["id", "fullName", "legalName"]);
        assert_eq!(owner.members[0].is_nullable, Some(false));
    }

    #[test]
    fn ugly_traits_are_not_presentable() {
        let mut attribute = ResolvedAttribute::new("code");
        attribute.add_trait(ResolvedTrait::generated("is.readOnly", Vec::<(String, ResolvedValue)>::new()));
        let mut ugly = ResolvedTrait::generated("is.internal", Vec::<(String, ResolvedValue)>::new());
        ugly.ugly = true;
        attribute.add_trait(ugly);

        let shown: Vec<&str> = attribute.presentable_traits().map(|t| t.name.as_str()).collect();
        assert_eq!(shown, vec!["is.readOnly"]);
        assert!(attribute.has_trait("is.internal"));
    }

    #[test]
    fn values_serialize_by_shape() {
        let value = ResolvedValue::Purpose {
            name: "identifiedBy".into(),
        };
        assert_eq!(
            serde_json::to_value(&value).unwrap(),
            serde_json::json!({ "purposeReference": "identifiedBy" })
        );
        assert_eq!(
            serde_json::to_value(ResolvedValue::text("5")).unwrap(),
            serde_json::json!("5")
        );
    }
}
