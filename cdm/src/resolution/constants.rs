//! Constant values used as trait arguments.

use super::resolved::{ConstantTable, ResolvedValue};
use super::Pass;
use crate::corpus::{DocumentId, Located, LocatedEntityLike};
use crate::definitions::{ArgumentValue, ConstantEntityDefinition, ConstantValue};
use crate::error::ResolutionResult;
use itertools::Itertools;

const ANONYMOUS_CONSTANT: &str = "<constant>";

impl<'c> Pass<'c> {
    /// Resolve an argument value written in `document`.
    pub(super) fn resolve_value(
        &mut self,
        document: DocumentId,
        value: &'c ArgumentValue,
    ) -> ResolutionResult<ResolvedValue> {
        match value {
            ArgumentValue::Text(text) => Ok(ResolvedValue::Text(text.clone())),
            ArgumentValue::Constant(constant) => self.resolve_constant(document, constant),
        }
    }

    fn resolve_constant(
        &mut self,
        document: DocumentId,
        constant: &'c ConstantValue,
    ) -> ResolutionResult<ResolvedValue> {
        let corpus = self.corpus;
        match constant {
            ConstantValue::Trait(reference) => {
                let entry = self.apply_trait(document, reference)?;
                let reference = self.check(entry.finish())?;
                Ok(ResolvedValue::Trait { reference })
            }
            ConstantValue::Entity(reference) => {
                match self.check(corpus.resolve_entity_like(document, &reference.target))? {
                    LocatedEntityLike::Entity(entity) => Ok(ResolvedValue::Entity {
                        entity: entity.definition.entity_name.clone(),
                    }),
                    LocatedEntityLike::Constant(table) => {
                        self.constant_table(table).map(ResolvedValue::Table)
                    }
                }
            }
            ConstantValue::Purpose(reference) => {
                let purpose = self.check(corpus.resolve(document, &reference.target))?;
                Ok(ResolvedValue::Purpose {
                    name: purpose.definition.purpose_name.clone(),
                })
            }
            ConstantValue::DataType(reference) => {
                let data_type = self.check(corpus.resolve(document, &reference.target))?;
                Ok(ResolvedValue::DataType {
                    name: data_type.definition.data_type_name.clone(),
                })
            }
            ConstantValue::AttributeGroup(reference) => {
                let group = self.check(corpus.resolve(document, &reference.target))?;
                Ok(ResolvedValue::AttributeGroup {
                    name: group.definition.attribute_group_name.clone(),
                })
            }
            ConstantValue::EntityAttribute(attribute) => {
                let mut entities = Vec::new();
                for reference in attribute.entity.references() {
                    let name = match self
                        .check(corpus.resolve_entity_like(document, &reference.target))?
                    {
                        LocatedEntityLike::Entity(entity) => entity.definition.entity_name.clone(),
                        LocatedEntityLike::Constant(table) => table
                            .definition
                            .constant_entity_name
                            .clone()
                            .unwrap_or_else(|| ANONYMOUS_CONSTANT.to_string()),
                    };
                    entities.push(name);
                }
                Ok(ResolvedValue::EntityAttribute {
                    name: attribute.name.clone(),
                    entities,
                })
            }
            ConstantValue::TypeAttribute(attribute) => self
                .descend(&attribute.name, |pass| {
                    pass.type_attribute_record(document, attribute)
                })
                .map(|record| ResolvedValue::Attribute(Box::new(record))),
        }
    }

    /// Rows of a constant entity, with columns taken from its shape's declared attributes.
    pub(super) fn constant_table(
        &mut self,
        constant: Located<'c, ConstantEntityDefinition>,
    ) -> ResolutionResult<ConstantTable> {
        let corpus = self.corpus;
        let definition = constant.definition;
        let label = definition
            .constant_entity_name
            .as_deref()
            .unwrap_or(ANONYMOUS_CONSTANT);

        self.descend(label, |pass| {
            let shape = pass.check(
                corpus.resolve_entity(constant.document, &definition.entity_shape.target),
            )?;
            let columns = pass
                .declared_attributes(shape)?
                .iter()
                .map(|attribute| attribute.name().to_string())
                .unique()
                .collect();
            Ok(ConstantTable {
                constant_entity: definition.constant_entity_name.clone(),
                entity_shape: shape.definition.entity_name.clone(),
                columns,
                rows: definition.constant_values.clone(),
            })
        })
    }
}
