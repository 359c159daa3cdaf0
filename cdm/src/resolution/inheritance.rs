//! Inheritance linearization for `extends*` chains.

use super::Pass;
use crate::corpus::{DefinitionShape, DocumentId, Located};
use crate::definitions::{
    AttributeGroupDefinition, AttributeItem, ClassRef, DataTypeDefinition, EntityAttribute,
    EntityDefinition, Parameter, PurposeDefinition, TraitDefinition, TypeAttribute,
};
use crate::error::{ErrorKind, ResolutionResult};

/// Walk a single-parent chain from `start` towards its root and return it base-first.
///
/// Revisiting a definition already on the chain is reported as
/// [`ErrorKind::CyclicInheritance`] with the chain in walk order. A chain
/// longer than `limit` is [`ErrorKind::RecursionLimitExceeded`].
pub(crate) fn linearize<'c, T, F>(
    start: Located<'c, T>,
    limit: usize,
    mut parent: F,
) -> Result<Vec<Located<'c, T>>, ErrorKind>
where
    T: DefinitionShape,
    F: FnMut(Located<'c, T>) -> Result<Option<Located<'c, T>>, ErrorKind>,
{
    let mut chain = vec![start];
    let mut current = start;
    while let Some(next) = parent(current)? {
        if chain.len() >= limit {
            return Err(ErrorKind::RecursionLimitExceeded { limit });
        }
        if chain
            .iter()
            .any(|seen| std::ptr::eq(seen.definition, next.definition))
        {
            let mut names: Vec<String> = chain
                .iter()
                .map(|l| l.definition.definition_name().to_string())
                .collect();
            names.push(next.definition.definition_name().to_string());
            return Err(ErrorKind::CyclicInheritance { chain: names });
        }
        chain.push(next);
        current = next;
    }
    chain.reverse();
    Ok(chain)
}

/// A trait with its `extendsTrait` chain folded in.
#[derive(Debug)]
pub(crate) struct LinearTrait<'c> {
    /// Parameters in declaration order, base first. A derived parameter
    /// replaces the base parameter of the same name in place.
    pub parameters: Vec<(&'c Parameter, DocumentId)>,
    pub elevated: bool,
    pub modifies_attributes: bool,
    pub ugly: bool,
}

#[derive(Debug, Clone, Copy)]
pub(crate) enum DeclaredAttribute<'c> {
    Type(&'c TypeAttribute),
    Entity(&'c EntityAttribute),
}

impl DeclaredAttribute<'_> {
    pub fn name(&self) -> &str {
        match self {
            DeclaredAttribute::Type(t) => &t.name,
            DeclaredAttribute::Entity(e) => &e.name,
        }
    }
}

const IDENTIFIED_BY: &str = "identifiedBy";

impl<'c> Pass<'c> {
    pub(super) fn entity_chain(
        &self,
        entity: Located<'c, EntityDefinition>,
    ) -> ResolutionResult<Vec<Located<'c, EntityDefinition>>> {
        let corpus = self.corpus;
        self.check(linearize(entity, self.config.max_recursion_depth, |level| {
            level
                .definition
                .extends_entity
                .as_ref()
                .map(|base| corpus.resolve_entity(level.document, &base.target))
                .transpose()
        }))
    }

    pub(super) fn data_type_chain(
        &self,
        data_type: Located<'c, DataTypeDefinition>,
    ) -> ResolutionResult<Vec<Located<'c, DataTypeDefinition>>> {
        let corpus = self.corpus;
        self.check(linearize(data_type, self.config.max_recursion_depth, |level| {
            level
                .definition
                .extends_data_type
                .as_ref()
                .map(|base| corpus.resolve(level.document, &base.target))
                .transpose()
        }))
    }

    pub(super) fn purpose_chain(
        &self,
        purpose: Located<'c, PurposeDefinition>,
    ) -> ResolutionResult<Vec<Located<'c, PurposeDefinition>>> {
        let corpus = self.corpus;
        self.check(linearize(purpose, self.config.max_recursion_depth, |level| {
            level
                .definition
                .extends_purpose
                .as_ref()
                .map(|base| corpus.resolve(level.document, &base.target))
                .transpose()
        }))
    }

    pub(super) fn linearize_trait(
        &self,
        start: Located<'c, TraitDefinition>,
    ) -> ResolutionResult<LinearTrait<'c>> {
        let corpus = self.corpus;
        let chain = self.check(linearize(start, self.config.max_recursion_depth, |level| {
            level
                .definition
                .extends_trait
                .as_ref()
                .map(|base| corpus.resolve(level.document, &base.target))
                .transpose()
        }))?;

        let mut linear = LinearTrait {
            parameters: Vec::new(),
            elevated: false,
            modifies_attributes: false,
            ugly: false,
        };
        for level in chain {
            let definition = level.definition;
            for parameter in &definition.has_parameters {
                match linear
                    .parameters
                    .iter_mut()
                    .find(|(p, _)| p.name == parameter.name)
                {
                    Some(slot) => *slot = (parameter, level.document),
                    None => linear.parameters.push((parameter, level.document)),
                }
            }
            if let Some(elevated) = definition.elevated {
                linear.elevated = elevated;
            }
            if let Some(modifies) = definition.modifies_attributes {
                linear.modifies_attributes = modifies;
            }
            if let Some(ugly) = definition.ugly {
                linear.ugly = ugly;
            }
        }
        Ok(linear)
    }

    /// Declared attributes of an entity and its bases, base first, groups inlined.
    ///
    /// This is the shape view used for constant tables and key lookup; no
    /// guidance is applied.
    pub(super) fn declared_attributes(
        &mut self,
        entity: Located<'c, EntityDefinition>,
    ) -> ResolutionResult<Vec<DeclaredAttribute<'c>>> {
        let mut out = Vec::new();
        for level in self.entity_chain(entity)? {
            for item in &level.definition.has_attributes {
                self.collect_declared(level.document, item, &mut out)?;
            }
        }
        Ok(out)
    }

    fn collect_declared(
        &mut self,
        document: DocumentId,
        item: &'c AttributeItem,
        out: &mut Vec<DeclaredAttribute<'c>>,
    ) -> ResolutionResult<()> {
        let corpus = self.corpus;
        let group: Located<'c, AttributeGroupDefinition> = match item {
            AttributeItem::Type(attribute) => {
                out.push(DeclaredAttribute::Type(attribute));
                return Ok(());
            }
            AttributeItem::Entity(attribute) => {
                out.push(DeclaredAttribute::Entity(attribute));
                return Ok(());
            }
            AttributeItem::Name(name) => self.check(corpus.resolve_name(document, name))?,
            AttributeItem::Group(reference) => {
                self.check(corpus.resolve(document, &reference.target))?
            }
        };
        self.with_group(group, |pass| {
            for member in &group.definition.members {
                pass.collect_declared(group.document, member, out)?;
            }
            Ok(())
        })
    }

    /// Name of the entity's key attribute: flagged `isPrimaryKey`, or with purpose `identifiedBy`.
    pub(super) fn primary_key(
        &mut self,
        entity: Located<'c, EntityDefinition>,
    ) -> ResolutionResult<Option<String>> {
        let declared = self.declared_attributes(entity)?;
        Ok(declared.iter().find_map(|attribute| match attribute {
            DeclaredAttribute::Type(t) if is_key(t) => Some(t.name.clone()),
            _ => None,
        }))
    }
}

fn is_key(attribute: &TypeAttribute) -> bool {
    if attribute.is_primary_key == Some(true) {
        return true;
    }
    attribute
        .purpose
        .as_ref()
        .is_some_and(|purpose| match &purpose.target {
            ClassRef::Name(name) => name == IDENTIFIED_BY,
            ClassRef::Inline(inline) => inline.purpose_name == IDENTIFIED_BY,
        })
}
