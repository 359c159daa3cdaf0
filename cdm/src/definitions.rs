//! Definition node shapes
//!
//! Typed, immutable form of the six definition kinds (purpose, trait, data type,
//! attribute group, entity, constant entity) and of the two attribute kinds that
//! compose entities. Field names follow the CDM folder JSON layout, so a corpus
//! snapshot can be deserialized straight into these types.
//!
//! Every "string or object" slot of the document format is an explicit variant
//! type ([`ClassRef`], [`Reference`], [`AttributeItem`], ...). Those shapes are
//! decoded through `serde_json::Value` so the variant is picked by the key that
//! identifies it instead of by trial and error.

use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use std::fmt;

/// The six kinds of named definitions a document can hold.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum DefinitionKind {
    Purpose,
    Trait,
    DataType,
    AttributeGroup,
    Entity,
    ConstantEntity,
}

impl fmt::Display for DefinitionKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let label = match self {
            DefinitionKind::Purpose => "purpose",
            DefinitionKind::Trait => "trait",
            DefinitionKind::DataType => "dataType",
            DefinitionKind::AttributeGroup => "attributeGroup",
            DefinitionKind::Entity => "entity",
            DefinitionKind::ConstantEntity => "constantEntity",
        };
        f.write_str(label)
    }
}

fn from_json<T: DeserializeOwned>(value: Value) -> Result<T, String> {
    serde_json::from_value(value).map_err(|e| e.to_string())
}

fn take_string(map: &mut Map<String, Value>, key: &str) -> Result<Option<String>, String> {
    match map.remove(key) {
        None | Some(Value::Null) => Ok(None),
        Some(Value::String(s)) => Ok(Some(s)),
        Some(other) => Err(format!("'{}' must be a string, found {}", key, other)),
    }
}

// =============================================================================
// REFERENCES
// =============================================================================

/// A reference to a definition: either a name to look up, or the definition inline.
#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(try_from = "Value", bound(deserialize = "T: DeserializeOwned"))]
pub enum ClassRef<T> {
    Name(String),
    Inline(Box<T>),
}

impl<T> ClassRef<T> {
    pub fn named(name: impl Into<String>) -> Self {
        ClassRef::Name(name.into())
    }

    /// The referenced name, when this is a by-name reference.
    pub fn name(&self) -> Option<&str> {
        match self {
            ClassRef::Name(name) => Some(name),
            ClassRef::Inline(_) => None,
        }
    }
}

impl<T: DeserializeOwned> TryFrom<Value> for ClassRef<T> {
    type Error = String;

    fn try_from(value: Value) -> Result<Self, Self::Error> {
        match value {
            Value::String(name) => Ok(ClassRef::Name(name)),
            other @ Value::Object(_) => Ok(ClassRef::Inline(Box::new(from_json(other)?))),
            other => Err(format!("expected a name or an inline definition, found {}", other)),
        }
    }
}

/// Definitions that can sit behind a [`Reference`]; names the key of the object form.
pub trait ReferenceTarget: DeserializeOwned {
    const REFERENCE_KEY: &'static str;
}

/// `"name"` or `{ "<kind>Reference": name|definition, "appliedTraits": [...] }`.
#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(try_from = "Value", bound(deserialize = "T: ReferenceTarget"))]
pub struct Reference<T> {
    pub target: ClassRef<T>,
    pub applied_traits: Vec<TraitReference>,
}

impl<T> Reference<T> {
    pub fn named(name: impl Into<String>) -> Self {
        Self {
            target: ClassRef::named(name),
            applied_traits: Vec::new(),
        }
    }
}

impl<T: ReferenceTarget> TryFrom<Value> for Reference<T> {
    type Error = String;

    fn try_from(value: Value) -> Result<Self, Self::Error> {
        match value {
            Value::String(name) => Ok(Self::named(name)),
            Value::Object(mut map) => {
                let target = map
                    .remove(T::REFERENCE_KEY)
                    .ok_or_else(|| format!("reference object is missing '{}'", T::REFERENCE_KEY))?;
                let applied_traits = match map.remove("appliedTraits") {
                    Some(Value::Null) | None => Vec::new(),
                    Some(traits) => from_json(traits)?,
                };
                Ok(Self {
                    target: ClassRef::try_from(target)?,
                    applied_traits,
                })
            }
            other => Err(format!(
                "expected a name or a '{}' object, found {}",
                T::REFERENCE_KEY,
                other
            )),
        }
    }
}

pub type PurposeReference = Reference<PurposeDefinition>;
pub type DataTypeReference = Reference<DataTypeDefinition>;
pub type AttributeGroupReference = Reference<AttributeGroupDefinition>;
pub type EntityReference = Reference<EntityLike>;

impl ReferenceTarget for PurposeDefinition {
    const REFERENCE_KEY: &'static str = "purposeReference";
}

impl ReferenceTarget for DataTypeDefinition {
    const REFERENCE_KEY: &'static str = "dataTypeReference";
}

impl ReferenceTarget for AttributeGroupDefinition {
    const REFERENCE_KEY: &'static str = "attributeGroupReference";
}

impl ReferenceTarget for EntityLike {
    const REFERENCE_KEY: &'static str = "entityReference";
}

/// `"traitName"` or `{ "traitReference": name|definition, "arguments": [...] }`.
#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(try_from = "Value")]
pub struct TraitReference {
    pub target: ClassRef<TraitDefinition>,
    pub arguments: Vec<Argument>,
}

impl TraitReference {
    pub fn named(name: impl Into<String>) -> Self {
        Self {
            target: ClassRef::named(name),
            arguments: Vec::new(),
        }
    }
}

impl TryFrom<Value> for TraitReference {
    type Error = String;

    fn try_from(value: Value) -> Result<Self, Self::Error> {
        match value {
            Value::String(name) => Ok(Self::named(name)),
            Value::Object(mut map) => {
                let target = map
                    .remove("traitReference")
                    .ok_or_else(|| "trait reference object is missing 'traitReference'".to_string())?;
                let arguments = match map.remove("arguments") {
                    Some(Value::Null) | None => Vec::new(),
                    Some(args) => from_json(args)?,
                };
                Ok(Self {
                    target: ClassRef::try_from(target)?,
                    arguments,
                })
            }
            other => Err(format!("expected a trait name or reference, found {}", other)),
        }
    }
}

/// One argument of a trait application. Unnamed arguments bind by position.
#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(try_from = "Value")]
pub struct Argument {
    pub name: Option<String>,
    pub value: ArgumentValue,
    pub explanation: Option<String>,
}

impl Argument {
    pub fn positional(value: ArgumentValue) -> Self {
        Self {
            name: None,
            value,
            explanation: None,
        }
    }
}

impl TryFrom<Value> for Argument {
    type Error = String;

    fn try_from(value: Value) -> Result<Self, Self::Error> {
        match value {
            Value::Object(mut map) if map.contains_key("value") => {
                let name = take_string(&mut map, "name")?;
                let explanation = take_string(&mut map, "explanation")?;
                let value = map.remove("value").unwrap_or(Value::Null);
                Ok(Self {
                    name,
                    value: ArgumentValue::try_from(value)?,
                    explanation,
                })
            }
            other => Ok(Self::positional(ArgumentValue::try_from(other)?)),
        }
    }
}

/// A trait argument or parameter default.
#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(try_from = "Value")]
pub enum ArgumentValue {
    Text(String),
    Constant(Box<ConstantValue>),
}

impl TryFrom<Value> for ArgumentValue {
    type Error = String;

    fn try_from(value: Value) -> Result<Self, Self::Error> {
        match value {
            Value::String(s) => Ok(ArgumentValue::Text(s)),
            Value::Number(n) => Ok(ArgumentValue::Text(n.to_string())),
            Value::Bool(b) => Ok(ArgumentValue::Text(b.to_string())),
            object @ Value::Object(_) => Ok(ArgumentValue::Constant(Box::new(
                ConstantValue::try_from(object)?,
            ))),
            other => Err(format!("unsupported argument value {}", other)),
        }
    }
}

/// The object forms an argument value can take.
#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(try_from = "Value")]
pub enum ConstantValue {
    Trait(TraitReference),
    Entity(EntityReference),
    Purpose(PurposeReference),
    DataType(DataTypeReference),
    AttributeGroup(AttributeGroupReference),
    EntityAttribute(EntityAttribute),
    TypeAttribute(TypeAttribute),
}

impl TryFrom<Value> for ConstantValue {
    type Error = String;

    fn try_from(value: Value) -> Result<Self, Self::Error> {
        let has = |key: &str| value.get(key).is_some();
        if has("traitReference") {
            Ok(ConstantValue::Trait(TraitReference::try_from(value)?))
        } else if has("entityReference") {
            Ok(ConstantValue::Entity(Reference::try_from(value)?))
        } else if has("purposeReference") {
            Ok(ConstantValue::Purpose(Reference::try_from(value)?))
        } else if has("dataTypeReference") {
            Ok(ConstantValue::DataType(Reference::try_from(value)?))
        } else if has("attributeGroupReference") {
            Ok(ConstantValue::AttributeGroup(Reference::try_from(value)?))
        } else if has("entity") {
            Ok(ConstantValue::EntityAttribute(from_json(value)?))
        } else if has("name") {
            Ok(ConstantValue::TypeAttribute(from_json(value)?))
        } else {
            Err(format!("unrecognised constant value {}", value))
        }
    }
}

// =============================================================================
// DEFINITIONS
// =============================================================================

#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PurposeDefinition {
    pub purpose_name: String,
    pub explanation: Option<String>,
    pub extends_purpose: Option<PurposeReference>,
    #[serde(default)]
    pub exhibits_traits: Vec<TraitReference>,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ParameterDirection {
    #[default]
    In,
    Out,
    Both,
}

#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Parameter {
    pub name: String,
    pub explanation: Option<String>,
    pub default_value: Option<ArgumentValue>,
    #[serde(default)]
    pub required: bool,
    #[serde(default)]
    pub direction: ParameterDirection,
    pub data_type: Option<DataTypeReference>,
}

#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TraitDefinition {
    pub trait_name: String,
    pub explanation: Option<String>,
    pub extends_trait: Option<TraitReference>,
    #[serde(default)]
    pub has_parameters: Vec<Parameter>,
    pub elevated: Option<bool>,
    pub modifies_attributes: Option<bool>,
    pub ugly: Option<bool>,
    #[serde(default)]
    pub associated_properties: Vec<String>,
}

#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DataTypeDefinition {
    pub data_type_name: String,
    pub explanation: Option<String>,
    pub extends_data_type: Option<DataTypeReference>,
    #[serde(default)]
    pub exhibits_traits: Vec<TraitReference>,
}

#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AttributeGroupDefinition {
    pub attribute_group_name: String,
    pub explanation: Option<String>,
    #[serde(default)]
    pub members: Vec<AttributeItem>,
    #[serde(default)]
    pub exhibits_traits: Vec<TraitReference>,
}

#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct EntityDefinition {
    pub entity_name: String,
    pub explanation: Option<String>,
    pub extends_entity: Option<EntityReference>,
    pub extends_entity_resolution_guidance: Option<ResolutionGuidance>,
    #[serde(default)]
    pub exhibits_traits: Vec<TraitReference>,
    #[serde(default)]
    pub has_attributes: Vec<AttributeItem>,
    /// Path of the attribute context this entity was resolved from, if it is
    /// itself the output of an earlier resolution.
    pub attribute_context: Option<String>,
    pub source_name: Option<String>,
    pub display_name: Option<String>,
    pub description: Option<String>,
    pub version: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ConstantEntityDefinition {
    pub constant_entity_name: Option<String>,
    pub explanation: Option<String>,
    pub entity_shape: EntityReference,
    #[serde(default)]
    pub constant_values: Vec<Vec<String>>,
}

/// What an entity reference may point at.
#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(try_from = "Value")]
pub enum EntityLike {
    Entity(EntityDefinition),
    Constant(ConstantEntityDefinition),
}

impl TryFrom<Value> for EntityLike {
    type Error = String;

    fn try_from(value: Value) -> Result<Self, Self::Error> {
        if value.get("entityShape").is_some() {
            Ok(EntityLike::Constant(from_json(value)?))
        } else {
            Ok(EntityLike::Entity(from_json(value)?))
        }
    }
}

/// A top-level definition of a document.
#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(try_from = "Value")]
pub enum Definition {
    Purpose(PurposeDefinition),
    Trait(TraitDefinition),
    DataType(DataTypeDefinition),
    AttributeGroup(AttributeGroupDefinition),
    Entity(EntityDefinition),
    ConstantEntity(ConstantEntityDefinition),
}

impl Definition {
    pub fn kind(&self) -> DefinitionKind {
        match self {
            Definition::Purpose(_) => DefinitionKind::Purpose,
            Definition::Trait(_) => DefinitionKind::Trait,
            Definition::DataType(_) => DefinitionKind::DataType,
            Definition::AttributeGroup(_) => DefinitionKind::AttributeGroup,
            Definition::Entity(_) => DefinitionKind::Entity,
            Definition::ConstantEntity(_) => DefinitionKind::ConstantEntity,
        }
    }

    /// The declared name; anonymous constant entities have none.
    pub fn name(&self) -> Option<&str> {
        match self {
            Definition::Purpose(d) => Some(&d.purpose_name),
            Definition::Trait(d) => Some(&d.trait_name),
            Definition::DataType(d) => Some(&d.data_type_name),
            Definition::AttributeGroup(d) => Some(&d.attribute_group_name),
            Definition::Entity(d) => Some(&d.entity_name),
            Definition::ConstantEntity(d) => d.constant_entity_name.as_deref(),
        }
    }
}

impl TryFrom<Value> for Definition {
    type Error = String;

    fn try_from(value: Value) -> Result<Self, Self::Error> {
        let has = |key: &str| value.get(key).is_some();
        if has("traitName") {
            Ok(Definition::Trait(from_json(value)?))
        } else if has("purposeName") {
            Ok(Definition::Purpose(from_json(value)?))
        } else if has("dataTypeName") {
            Ok(Definition::DataType(from_json(value)?))
        } else if has("attributeGroupName") {
            Ok(Definition::AttributeGroup(from_json(value)?))
        } else if has("entityShape") {
            Ok(Definition::ConstantEntity(from_json(value)?))
        } else if has("entityName") {
            Ok(Definition::Entity(from_json(value)?))
        } else {
            Err(format!("unrecognised definition {}", value))
        }
    }
}

// =============================================================================
// ATTRIBUTES
// =============================================================================

/// A member of `hasAttributes` or of an attribute group's `members`.
#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(try_from = "Value")]
pub enum AttributeItem {
    /// Bare name; resolves to an attribute group.
    Name(String),
    Group(AttributeGroupReference),
    Entity(Box<EntityAttribute>),
    Type(Box<TypeAttribute>),
}

impl TryFrom<Value> for AttributeItem {
    type Error = String;

    fn try_from(value: Value) -> Result<Self, Self::Error> {
        match value {
            Value::String(name) => Ok(AttributeItem::Name(name)),
            object @ Value::Object(_) => {
                if object.get("attributeGroupReference").is_some() {
                    Ok(AttributeItem::Group(Reference::try_from(object)?))
                } else if object.get("entity").is_some() {
                    Ok(AttributeItem::Entity(Box::new(from_json(object)?)))
                } else {
                    Ok(AttributeItem::Type(Box::new(from_json(object)?)))
                }
            }
            other => Err(format!("unsupported attribute {}", other)),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TypeAttribute {
    pub name: String,
    pub explanation: Option<String>,
    pub purpose: Option<PurposeReference>,
    pub data_type: Option<DataTypeReference>,
    #[serde(default)]
    pub applied_traits: Vec<TraitReference>,
    pub attribute_context: Option<String>,
    pub is_primary_key: Option<bool>,
    pub is_read_only: Option<bool>,
    pub is_nullable: Option<bool>,
    pub data_format: Option<String>,
    pub source_name: Option<String>,
    pub source_ordering: Option<i64>,
    pub display_name: Option<String>,
    pub description: Option<String>,
    pub maximum_value: Option<String>,
    pub minimum_value: Option<String>,
    pub maximum_length: Option<u32>,
    pub value_constrained_to_list: Option<bool>,
    pub default_value: Option<Value>,
    pub resolution_guidance: Option<ResolutionGuidance>,
}

#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct EntityAttribute {
    pub name: String,
    pub explanation: Option<String>,
    pub description: Option<String>,
    pub display_name: Option<String>,
    pub purpose: Option<PurposeReference>,
    pub entity: EntityTarget,
    #[serde(default)]
    pub applied_traits: Vec<TraitReference>,
    pub resolution_guidance: Option<ResolutionGuidance>,
}

/// The `entity` slot of an entity attribute: one reference or an array of them.
#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(try_from = "Value")]
pub enum EntityTarget {
    One(EntityReference),
    Many(Vec<EntityReference>),
}

impl EntityTarget {
    pub fn references(&self) -> Vec<&EntityReference> {
        match self {
            EntityTarget::One(reference) => vec![reference],
            EntityTarget::Many(references) => references.iter().collect(),
        }
    }
}

impl TryFrom<Value> for EntityTarget {
    type Error = String;

    fn try_from(value: Value) -> Result<Self, Self::Error> {
        match value {
            Value::Array(items) => items
                .into_iter()
                .map(Reference::try_from)
                .collect::<Result<Vec<_>, _>>()
                .map(EntityTarget::Many),
            other => Reference::try_from(other).map(EntityTarget::One),
        }
    }
}

// =============================================================================
// RESOLUTION GUIDANCE
// =============================================================================

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Cardinality {
    #[default]
    One,
    Many,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Selects {
    One,
    Some,
    #[default]
    All,
}

#[derive(Debug, Clone, Default, PartialEq, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ExpansionGuidance {
    pub starting_ordinal: Option<i64>,
    pub maximum_expansion: Option<usize>,
    pub count_attribute: Option<Box<TypeAttribute>>,
}

#[derive(Debug, Clone, Default, PartialEq, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct EntityByReferenceGuidance {
    pub allow_reference: Option<bool>,
    pub always_include_foreign_key: Option<bool>,
    pub reference_only_after_depth: Option<usize>,
    pub foreign_key_attribute: Option<Box<TypeAttribute>>,
}

#[derive(Debug, Clone, Default, PartialEq, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SelectsSubAttributeGuidance {
    pub selects: Option<Selects>,
    pub selected_type_attribute: Option<Box<TypeAttribute>>,
    #[serde(default)]
    pub selects_some_take_names: Vec<String>,
    #[serde(default)]
    pub selects_some_avoid_names: Vec<String>,
}

#[derive(Debug, Clone, Default, PartialEq, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ResolutionGuidance {
    pub remove_attribute: Option<bool>,
    #[serde(default)]
    pub imposed_directives: Vec<String>,
    #[serde(default)]
    pub removed_directives: Vec<String>,
    pub add_supporting_attribute: Option<Box<TypeAttribute>>,
    pub cardinality: Option<Cardinality>,
    pub rename_format: Option<String>,
    pub expansion: Option<ExpansionGuidance>,
    pub entity_by_reference: Option<EntityByReferenceGuidance>,
    pub selects_sub_attribute: Option<SelectsSubAttributeGuidance>,
}
