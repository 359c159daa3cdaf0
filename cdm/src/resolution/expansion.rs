//! Attribute expansion: the depth-first walk that materializes attributes.

use super::context::{ContextId, ContextKind};
use super::guidance::{self, rename};
use super::resolved::{
    ConstantTable, ResolvedAttribute, ResolvedAttributeSet, ResolvedTrait, ResolvedValue,
};
use super::traits::{
    TraitSet, COUNT_TRAIT, EXPANSION_TRAIT, FOREIGN_KEY_TRAIT, SELECTED_ATTRIBUTE_TRAIT,
    SUPPORTING_TRAIT,
};
use super::{Pass, Scope};
use crate::corpus::{DocumentId, Located};
use crate::definitions::{
    AttributeGroupDefinition, AttributeItem, Cardinality, DataTypeReference, EntityAttribute,
    EntityDefinition, PurposeReference, ResolutionGuidance, Selects, SelectsSubAttributeGuidance,
    TraitReference, TypeAttribute,
};
use crate::error::{ErrorKind, ResolutionResult};
use std::collections::HashMap;
use tracing::{debug, trace};

const DEFAULT_KEY: &str = "id";
const KEY_TABLE_SHAPE: &str = "entityGroupSet";
const KEY_TABLE_ARGUMENT: &str = "entityReferences";

/// What expanding one entity produced.
#[derive(Debug, Default)]
pub(super) struct Expansion {
    pub attributes: ResolvedAttributeSet,
    /// Exhibited and elevated traits of the entity.
    pub traits: TraitSet,
    /// Context node holding the inherited attributes, if the entity has a base.
    pub inherited: Option<ContextId>,
}

fn expansion_trait(attribute: &str, ordinal: i64, member: &str) -> ResolvedTrait {
    ResolvedTrait::generated(
        EXPANSION_TRAIT,
        [
            ("expansionName", ResolvedValue::text(attribute)),
            ("ordinal", ResolvedValue::text(ordinal.to_string())),
            ("memberAttribute", ResolvedValue::text(member)),
        ],
    )
}

/// Keep the attributes named in `take` (in that order, or all when empty) minus `avoid`.
fn select_some(
    attributes: ResolvedAttributeSet,
    selection: &SelectsSubAttributeGuidance,
) -> (ResolvedAttributeSet, Vec<String>) {
    let avoided = |name: &str| selection.selects_some_avoid_names.iter().any(|a| a == name);
    let mut dropped = Vec::new();
    if selection.selects_some_take_names.is_empty() {
        let mut kept = attributes;
        kept.retain(|a| {
            let keep = !avoided(&a.name);
            if !keep {
                dropped.push(a.name.clone());
            }
            keep
        });
        return (kept, dropped);
    }

    let mut remaining = attributes;
    let mut kept = ResolvedAttributeSet::new();
    for name in &selection.selects_some_take_names {
        if avoided(name) {
            continue;
        }
        if let Some(attribute) = remaining.remove(name) {
            kept.push(attribute);
        }
    }
    dropped.extend(remaining.names().map(String::from));
    (kept, dropped)
}

/// The sub-attribute picked by `selects: one`.
fn select_one<'a>(
    attributes: &'a ResolvedAttributeSet,
    selection: Option<&SelectsSubAttributeGuidance>,
) -> Option<&'a ResolvedAttribute> {
    let (take, avoid): (&[String], &[String]) = match selection {
        Some(s) => (&s.selects_some_take_names, &s.selects_some_avoid_names),
        None => (&[], &[]),
    };
    let eligible = |a: &&ResolvedAttribute| !avoid.contains(&a.name);
    if take.is_empty() {
        attributes.iter().find(eligible)
    } else {
        take.iter()
            .filter_map(|name| attributes.get(name))
            .find(eligible)
    }
}

fn key_rows(attribute: &ResolvedAttribute) -> Option<&Vec<Vec<String>>> {
    match attribute.trait_named(FOREIGN_KEY_TRAIT)?.argument(KEY_TABLE_ARGUMENT)? {
        ResolvedValue::Table(table) => Some(&table.rows),
        _ => None,
    }
}

fn key_rows_mut(attribute: &mut ResolvedAttribute) -> Option<&mut Vec<Vec<String>>> {
    let link = attribute
        .traits
        .iter_mut()
        .find(|t| t.name == FOREIGN_KEY_TRAIT)?;
    let argument = link
        .arguments
        .iter_mut()
        .find(|a| a.parameter == KEY_TABLE_ARGUMENT)?;
    match &mut argument.value {
        ResolvedValue::Table(table) => Some(&mut table.rows),
        _ => None,
    }
}

/// Put the key rows of `earlier` in front of those of `later`, members included.
fn carry_key_rows(earlier: &ResolvedAttribute, later: &mut ResolvedAttribute) {
    if let (Some(previous), Some(rows)) = (key_rows(earlier), key_rows_mut(later)) {
        let mut merged = previous.clone();
        for row in rows.drain(..) {
            if !merged.contains(&row) {
                merged.push(row);
            }
        }
        *rows = merged;
    }
    for member in &mut later.members {
        if let Some(previous) = earlier.members.iter().find(|m| m.name == member.name) {
            carry_key_rows(previous, member);
        }
    }
}

/// Merge the attributes of one target of an entity attribute into those of the
/// targets before it; a shared key lists every target.
fn fold_target(targets: &mut ResolvedAttributeSet, attributes: ResolvedAttributeSet) {
    for mut attribute in attributes.into_vec() {
        if let Some(earlier) = targets.get(&attribute.name) {
            carry_key_rows(earlier, &mut attribute);
        }
        targets.push(attribute);
    }
}

impl<'c> Pass<'c> {
    /// Expand `entity` with its bases into context node `ctx`.
    pub(super) fn expand_entity(
        &mut self,
        entity: Located<'c, EntityDefinition>,
        scope: &Scope,
        ctx: ContextId,
    ) -> ResolutionResult<Expansion> {
        let name = entity.definition.entity_name.as_str();
        self.descend(name, |pass| {
            debug!(entity = name, depth = scope.depth, directives = %scope.directives, "expanding entity");
            let chain = pass.entity_chain(entity)?;
            let out = pass.expand_levels(&chain, scope, ctx)?;
            debug!(entity = name, attributes = out.attributes.len(), "entity expanded");
            Ok(out)
        })
    }

    /// Expand a base-first `chain`, each base nested under the level that extends it.
    fn expand_levels(
        &mut self,
        chain: &[Located<'c, EntityDefinition>],
        scope: &Scope,
        ctx: ContextId,
    ) -> ResolutionResult<Expansion> {
        // context node and scope of every level, the entity itself first
        let mut frames = Vec::with_capacity(chain.len());
        let mut node = ctx;
        let mut current = scope.clone();
        for pair in chain.windows(2).rev() {
            let (base, level) = (pair[0], pair[1]);
            let base_guidance = level.definition.extends_entity_resolution_guidance.as_ref();
            let base_name = base.definition.entity_name.as_str();
            let base_node = self.context.add_child(
                node,
                ContextKind::ExtendedEntity,
                base_name,
                Some(self.corpus.qualified_name(base.document, base_name)),
            );
            if let Some(extends) = level.definition.extends_entity.as_ref() {
                let reference_traits = self.apply_traits(level.document, &extends.applied_traits)?;
                let reference_traits = self.check(reference_traits.finish())?;
                self.context.set_traits(base_node, reference_traits);
            }

            let base_scope = Scope {
                document: base.document,
                directives: match base_guidance {
                    Some(g) => current
                        .directives
                        .with_changes(&g.imposed_directives, &g.removed_directives),
                    None => current.directives.clone(),
                },
                depth: current.depth,
                guidance: current.guidance.overlay(base_guidance),
            };
            frames.push((node, current));
            node = base_node;
            current = base_scope;
        }
        frames.push((node, current));

        let mut inherited: Option<(ContextId, Expansion)> = None;
        for (level, (node, level_scope)) in chain.iter().zip(frames.into_iter().rev()) {
            let definition = level.definition;
            let mut out = Expansion::default();
            if let Some((base_node, base)) = inherited.take() {
                let base_guidance = definition.extends_entity_resolution_guidance.as_ref();
                let mut attributes = base.attributes;
                if guidance::removes(base_guidance) {
                    trace!(entity = %definition.entity_name, "inherited attributes removed");
                    self.context.mark_removed(base_node);
                    attributes = ResolvedAttributeSet::new();
                } else if let (Selects::Some, Some(selection)) = (
                    guidance::selects(base_guidance),
                    guidance::selection(base_guidance),
                ) {
                    attributes = self.select_members(base_node, 0, attributes, selection);
                }
                out.attributes = attributes;
                out.traits = base.traits;
                out.inherited = Some(base_node);
            }

            let exhibited = self.apply_traits(level.document, &definition.exhibits_traits)?;
            out.traits.extend(exhibited);

            let level_scope = level_scope.in_document(level.document);
            for item in &definition.has_attributes {
                self.expand_item(item, &level_scope, node, &mut out)?;
            }
            inherited = Some((node, out));
        }
        Ok(inherited.map(|(_, out)| out).unwrap_or_default())
    }

    /// Apply `selects: some` to `attributes`, whose leaves live under `node`
    /// past its first `from` contents.
    fn select_members(
        &mut self,
        node: ContextId,
        from: usize,
        attributes: ResolvedAttributeSet,
        selection: &SelectsSubAttributeGuidance,
    ) -> ResolvedAttributeSet {
        let (kept, dropped) = select_some(attributes, selection);
        self.context.rewrite_leaves_from(node, from, &|leaf| {
            dropped.iter().any(|d| d == leaf).then_some(None)
        });
        let order: Vec<String> = kept.names().map(String::from).collect();
        self.context.order_leaves(node, &order);
        kept
    }

    fn expand_item(
        &mut self,
        item: &'c AttributeItem,
        scope: &Scope,
        ctx: ContextId,
        out: &mut Expansion,
    ) -> ResolutionResult<()> {
        let corpus = self.corpus;
        match item {
            AttributeItem::Type(attribute) => self.expand_type_attribute(attribute, scope, ctx, out),
            AttributeItem::Entity(attribute) => {
                self.expand_entity_attribute(attribute, scope, ctx, out)
            }
            AttributeItem::Name(name) => {
                let group = self.check(corpus.resolve_name(scope.document, name))?;
                self.expand_group(group, &[], scope, ctx, out)
            }
            AttributeItem::Group(reference) => {
                let group = self.check(corpus.resolve(scope.document, &reference.target))?;
                self.expand_group(group, &reference.applied_traits, scope, ctx, out)
            }
        }
    }

    fn expand_group(
        &mut self,
        group: Located<'c, AttributeGroupDefinition>,
        applied: &'c [TraitReference],
        scope: &Scope,
        ctx: ContextId,
        out: &mut Expansion,
    ) -> ResolutionResult<()> {
        let corpus = self.corpus;
        self.with_group(group, |pass| {
            let definition = group.definition;
            let name = definition.attribute_group_name.as_str();
            let node = pass.context.add_child(
                ctx,
                ContextKind::AttributeGroup,
                name,
                Some(corpus.qualified_name(group.document, name)),
            );
            let mut traits = pass.apply_traits(group.document, &definition.exhibits_traits)?;
            traits.extend(pass.apply_traits(scope.document, applied)?);
            let traits = pass.check(traits.finish())?;
            pass.context.set_traits(node, traits);

            let inner = scope.in_document(group.document);
            for member in &definition.members {
                pass.expand_item(member, &inner, node, out)?;
            }
            Ok(())
        })
    }

    fn expand_type_attribute(
        &mut self,
        attribute: &'c TypeAttribute,
        scope: &Scope,
        ctx: ContextId,
        out: &mut Expansion,
    ) -> ResolutionResult<()> {
        let local = attribute.resolution_guidance.as_ref();
        if guidance::removes(local) {
            trace!(attribute = %attribute.name, "attribute removed");
            if out.attributes.remove(&attribute.name).is_some() {
                if let Some(base) = out.inherited {
                    self.context.drop_leaf(base, &attribute.name);
                }
            }
            let node =
                self.context
                    .add_child(ctx, ContextKind::AttributeDefinition, &attribute.name, None);
            self.context.mark_removed(node);
            return Ok(());
        }

        let record = self.descend(&attribute.name, |pass| {
            pass.type_attribute_record(scope.document, attribute)
        })?;
        for elevated in record.traits.iter().filter(|t| t.elevated) {
            out.traits.add_resolved(elevated);
        }

        match guidance::cardinality(local) {
            Cardinality::One => {
                // a redeclared attribute keeps the leaf of its first declaration
                if !out.attributes.contains(&record.name) {
                    self.context.add_attribute(ctx, &record.name);
                }
                out.attributes.push(record);
            }
            Cardinality::Many => {
                let scope = Scope {
                    guidance: scope.guidance.overlay(local),
                    ..scope.clone()
                };
                self.expand_rounds(&attribute.name, vec![record], false, &scope, local, ctx, out)?;
            }
        }

        self.supporting_attribute(&attribute.name, local, scope.document, ctx, out)
    }

    fn expand_entity_attribute(
        &mut self,
        attribute: &'c EntityAttribute,
        scope: &Scope,
        ctx: ContextId,
        out: &mut Expansion,
    ) -> ResolutionResult<()> {
        let corpus = self.corpus;
        let local = attribute.resolution_guidance.as_ref();
        let name = attribute.name.as_str();
        let node = self
            .context
            .add_child(ctx, ContextKind::EntityAsAttribute, name, None);

        let directives = match local {
            Some(g) => scope
                .directives
                .with_changes(&g.imposed_directives, &g.removed_directives),
            None => scope.directives.clone(),
        };
        let cardinality = guidance::cardinality(local);
        if guidance::removes(local) || (directives.normalized() && cardinality == Cardinality::Many)
        {
            trace!(attribute = name, "entity attribute removed");
            self.context.mark_removed(node);
            return Ok(());
        }

        let scope = Scope {
            document: scope.document,
            directives,
            depth: scope.depth,
            guidance: scope.guidance.overlay(local),
        };
        self.descend(name, |pass| {
            let (_, mut traits) = pass.purpose_traits(scope.document, attribute.purpose.as_ref())?;
            traits.extend(pass.apply_traits(scope.document, &attribute.applied_traits)?);

            let mut boundary = TraitSet::default();
            let mut targets = ResolvedAttributeSet::new();
            for reference in attribute.entity.references() {
                let target = pass.check(corpus.resolve_entity(scope.document, &reference.target))?;
                let mut link = traits.clone();
                link.extend(pass.apply_traits(scope.document, &reference.applied_traits)?);
                let link = pass.check(link.finish())?;
                for t in &link {
                    boundary.add_resolved(t);
                }
                let mut expanded = Expansion::default();
                pass.expand_target(attribute, target, &link, &scope, node, &mut expanded)?;
                fold_target(&mut targets, expanded.attributes);
            }
            pass.context.dedupe_leaves(node);
            out.attributes.extend(targets);

            let boundary = pass.check(boundary.finish())?;
            for elevated in boundary.iter().filter(|t| t.elevated) {
                out.traits.add_resolved(elevated);
            }
            pass.context.set_traits(node, boundary);
            Ok(())
        })?;

        self.supporting_attribute(name, local, scope.document, ctx, out)
    }

    /// Expand one target entity of an entity attribute, by value or by reference.
    fn expand_target(
        &mut self,
        attribute: &'c EntityAttribute,
        target: Located<'c, EntityDefinition>,
        link: &[ResolvedTrait],
        scope: &Scope,
        node: ContextId,
        out: &mut Expansion,
    ) -> ResolutionResult<()> {
        let local = attribute.resolution_guidance.as_ref();
        let target_name = target.definition.entity_name.as_str();
        let directives = &scope.directives;
        let by_reference = scope.guidance.allow_reference
            && (directives.reference_only()
                || (scope.depth >= scope.guidance.reference_only_after_depth
                    && !directives.no_max_depth()));
        debug!(
            attribute = %attribute.name,
            target = target_name,
            depth = scope.depth,
            by_reference,
            "entity attribute"
        );

        // earlier targets of the same attribute own the contents before `first`
        let first = self.context.node(node).contents.len();
        let mut members = ResolvedAttributeSet::new();
        // names that are not rewritten by the rename format
        let mut fixed_name = None;
        if by_reference || scope.guidance.always_include_foreign_key {
            let (key, supplied) = self.foreign_key(attribute, target, link, scope.document)?;
            if supplied {
                fixed_name = Some(key.name.clone());
            }
            self.context.add_attribute(node, &key.name);
            members.push(key);
        }

        if !by_reference {
            let unbounded = !scope.guidance.allow_reference || directives.no_max_depth();
            if unbounded
                && self
                    .embed_stack
                    .iter()
                    .any(|open| std::ptr::eq(*open, target.definition))
            {
                let mut chain: Vec<String> = self
                    .embed_stack
                    .iter()
                    .map(|e| e.entity_name.clone())
                    .collect();
                chain.push(target_name.to_string());
                return Err(self.fail(ErrorKind::CyclicEmbedding { chain }));
            }

            let entity_node = self.context.add_child(
                node,
                ContextKind::Entity,
                target_name,
                Some(self.corpus.qualified_name(target.document, target_name)),
            );
            let child = Scope {
                document: target.document,
                directives: directives.clone(),
                depth: scope.depth + 1,
                guidance: scope.guidance.clone(),
            };
            self.embed_stack.push(target.definition);
            let expanded = self.expand_entity(target, &child, entity_node);
            self.embed_stack.pop();
            let expanded = expanded?;

            let entity_traits = self.check(expanded.traits.finish())?;
            self.context.set_traits(entity_node, entity_traits);
            members.extend(expanded.attributes);
            // a key embedded next to its foreign key shares one leaf
            self.context.dedupe_leaves(node);
        }

        let selection = guidance::selection(local);
        match guidance::selects(local) {
            Selects::All => {}
            Selects::Some => {
                if let Some(selection) = selection {
                    members = self.select_members(node, first, members, selection);
                }
            }
            Selects::One => {
                let Some(chosen) = select_one(&members, selection).map(|a| a.name.clone()) else {
                    return Err(self.fail(ErrorKind::NoEligibleAttribute {
                        attribute: attribute.name.clone(),
                    }));
                };
                match selection.and_then(|s| s.selected_type_attribute.as_deref()) {
                    Some(stand_in) => {
                        let mut record = self.type_attribute_record(scope.document, stand_in)?;
                        record.add_trait(ResolvedTrait::generated(
                            SELECTED_ATTRIBUTE_TRAIT,
                            [("attribute", ResolvedValue::text(chosen))],
                        ));
                        self.context.rewrite_leaves_from(node, first, &|_| Some(None));
                        self.context.add_attribute(node, &record.name);
                        fixed_name = Some(record.name.clone());
                        members = ResolvedAttributeSet::new();
                        members.push(record);
                    }
                    None => {
                        members.retain(|a| a.name == chosen);
                        self.context.rewrite_leaves_from(node, first, &|leaf| {
                            (leaf != chosen).then_some(None)
                        });
                    }
                }
            }
        }

        // keys of the target do not key the entity holding the attribute
        let members: Vec<ResolvedAttribute> = members
            .into_vec()
            .into_iter()
            .map(|mut member| {
                member.is_primary_key = None;
                member
            })
            .collect();

        let cardinality = guidance::cardinality(local);
        if directives.structured() {
            let mut group = ResolvedAttribute::group(&attribute.name, members);
            for t in link {
                group.add_trait(t.clone());
            }
            return match cardinality {
                Cardinality::One => {
                    out.attributes.push(group);
                    Ok(())
                }
                Cardinality::Many => self.expand_rounds(
                    &attribute.name,
                    vec![group],
                    false,
                    scope,
                    local,
                    node,
                    out,
                ),
            };
        }

        match cardinality {
            Cardinality::One => {
                let mut renamed = HashMap::new();
                for mut member in members {
                    let original = member.name.clone();
                    if fixed_name.as_deref() != Some(original.as_str()) {
                        member.name =
                            rename(&scope.guidance.rename_format, &attribute.name, None, &original);
                    }
                    renamed.insert(original, member.name.clone());
                    out.attributes.push(member);
                }
                self.context.rewrite_leaves_from(node, first, &|leaf| {
                    renamed.get(leaf).map(|n| Some(n.clone()))
                });
                Ok(())
            }
            Cardinality::Many => {
                // the rounds replace the members' own leaves
                let originals: Vec<String> = members.iter().map(|m| m.name.clone()).collect();
                self.context.rewrite_leaves_from(node, first, &|leaf| {
                    originals.iter().any(|o| o == leaf).then_some(None)
                });
                self.expand_rounds(
                    &attribute.name,
                    members,
                    true,
                    scope,
                    local,
                    node,
                    out,
                )
            }
        }
    }

    /// Emit `members` once per ordinal, then the count attribute.
    ///
    /// With `member_names` the member name takes part in renaming (`{m}`/`{M}`);
    /// otherwise each member stands for the attribute itself.
    #[allow(clippy::too_many_arguments)]
    fn expand_rounds(
        &mut self,
        attribute: &str,
        members: Vec<ResolvedAttribute>,
        member_names: bool,
        scope: &Scope,
        local: Option<&'c ResolutionGuidance>,
        node: ContextId,
        out: &mut Expansion,
    ) -> ResolutionResult<()> {
        let format = scope.guidance.rename_format.as_str();
        let mut count = 0usize;
        for ordinal in scope.guidance.ordinals() {
            let round = self.context.add_child(
                node,
                ContextKind::GeneratedRound,
                &format!("_generatedAttributeRound{}", ordinal),
                None,
            );
            for member in &members {
                let mut copy = member.clone();
                let label = if member_names { member.name.as_str() } else { "" };
                copy.name = rename(format, attribute, Some(ordinal), label);
                copy.add_trait(expansion_trait(attribute, ordinal, &member.name));
                self.context.add_attribute(round, &copy.name);
                out.attributes.push(copy);
            }
            count += 1;
        }

        let supplied = local
            .and_then(|g| g.expansion.as_ref())
            .and_then(|e| e.count_attribute.as_deref());
        let mut counter = match supplied {
            Some(count_attribute) => self.type_attribute_record(scope.document, count_attribute)?,
            None => {
                let mut generated = ResolvedAttribute::new(format!("{}Count", attribute));
                generated.data_type = Some(self.config.count_data_type.clone());
                generated
            }
        };
        counter.default_value = Some(serde_json::Value::from(count));
        counter.add_trait(ResolvedTrait::generated(
            COUNT_TRAIT,
            [("attribute", ResolvedValue::text(attribute))],
        ));
        trace!(attribute, count, "expanded rounds");
        self.context.add_attribute(node, &counter.name);
        out.attributes.push(counter);
        Ok(())
    }

    /// The key attribute standing in for (or accompanying) an embedded entity.
    ///
    /// Returns the attribute and whether it came from `foreignKeyAttribute`.
    fn foreign_key(
        &mut self,
        attribute: &'c EntityAttribute,
        target: Located<'c, EntityDefinition>,
        link: &[ResolvedTrait],
        document: DocumentId,
    ) -> ResolutionResult<(ResolvedAttribute, bool)> {
        let supplied = attribute
            .resolution_guidance
            .as_ref()
            .and_then(|g| g.entity_by_reference.as_ref())
            .and_then(|r| r.foreign_key_attribute.as_deref());
        let key = self
            .primary_key(target)?
            .unwrap_or_else(|| DEFAULT_KEY.to_string());

        let (mut record, is_supplied) = match supplied {
            Some(fk) => (self.type_attribute_record(document, fk)?, true),
            None => {
                let mut generated = ResolvedAttribute::new(key.as_str());
                generated.data_type = Some(self.config.foreign_key_data_type.clone());
                (generated, false)
            }
        };
        record.add_trait(ResolvedTrait::generated(
            FOREIGN_KEY_TRAIT,
            [(
                KEY_TABLE_ARGUMENT,
                ResolvedValue::Table(ConstantTable {
                    constant_entity: None,
                    entity_shape: KEY_TABLE_SHAPE.to_string(),
                    columns: vec!["entityReference".to_string(), "attributeReference".to_string()],
                    rows: vec![vec![target.definition.entity_name.clone(), key]],
                }),
            )],
        ));
        for t in link {
            record.add_trait(t.clone());
        }
        Ok((record, is_supplied))
    }

    fn supporting_attribute(
        &mut self,
        attribute: &str,
        local: Option<&'c ResolutionGuidance>,
        document: DocumentId,
        ctx: ContextId,
        out: &mut Expansion,
    ) -> ResolutionResult<()> {
        let Some(supporting) = local.and_then(|g| g.add_supporting_attribute.as_deref()) else {
            return Ok(());
        };
        let mut record = self.type_attribute_record(document, supporting)?;
        record.add_trait(ResolvedTrait::generated(
            SUPPORTING_TRAIT,
            [("inSupportOf", ResolvedValue::text(attribute))],
        ));
        self.context.add_attribute(ctx, &record.name);
        out.attributes.push(record);
        Ok(())
    }

    /// A type attribute with its traits and fields resolved, as declared.
    ///
    /// Trait order: data type chain, data type reference, purpose chain,
    /// purpose reference, then the attribute's own applied traits.
    pub(super) fn type_attribute_record(
        &mut self,
        document: DocumentId,
        attribute: &'c TypeAttribute,
    ) -> ResolutionResult<ResolvedAttribute> {
        let (data_type, mut traits) = self.data_type_traits(document, attribute.data_type.as_ref())?;
        let (purpose, purpose_traits) = self.purpose_traits(document, attribute.purpose.as_ref())?;
        traits.extend(purpose_traits);
        traits.extend(self.apply_traits(document, &attribute.applied_traits)?);

        Ok(ResolvedAttribute {
            name: attribute.name.clone(),
            data_type,
            purpose,
            traits: self.check(traits.finish())?,
            is_primary_key: attribute.is_primary_key,
            is_read_only: attribute.is_read_only,
            is_nullable: attribute.is_nullable,
            default_value: attribute.default_value.clone(),
            maximum_length: attribute.maximum_length,
            maximum_value: attribute.maximum_value.clone(),
            minimum_value: attribute.minimum_value.clone(),
            value_constrained_to_list: attribute.value_constrained_to_list,
            data_format: attribute.data_format.clone(),
            display_name: attribute.display_name.clone(),
            description: attribute.description.clone(),
            source_name: attribute.source_name.clone(),
            source_ordering: attribute.source_ordering,
            members: Vec::new(),
        })
    }

    fn data_type_traits(
        &mut self,
        document: DocumentId,
        reference: Option<&'c DataTypeReference>,
    ) -> ResolutionResult<(Option<String>, TraitSet)> {
        let mut traits = TraitSet::default();
        let Some(reference) = reference else {
            return Ok((None, traits));
        };
        let corpus = self.corpus;
        let data_type = self.check(corpus.resolve(document, &reference.target))?;
        for level in self.data_type_chain(data_type)? {
            traits.extend(self.apply_traits(level.document, &level.definition.exhibits_traits)?);
        }
        traits.extend(self.apply_traits(document, &reference.applied_traits)?);
        Ok((Some(data_type.definition.data_type_name.clone()), traits))
    }

    fn purpose_traits(
        &mut self,
        document: DocumentId,
        reference: Option<&'c PurposeReference>,
    ) -> ResolutionResult<(Option<String>, TraitSet)> {
        let mut traits = TraitSet::default();
        let Some(reference) = reference else {
            return Ok((None, traits));
        };
        let corpus = self.corpus;
        let purpose = self.check(corpus.resolve(document, &reference.target))?;
        for level in self.purpose_chain(purpose)? {
            traits.extend(self.apply_traits(level.document, &level.definition.exhibits_traits)?);
        }
        traits.extend(self.apply_traits(document, &reference.applied_traits)?);
        Ok((Some(purpose.definition.purpose_name.clone()), traits))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn set(names: &[&str]) -> ResolvedAttributeSet {
        let mut set = ResolvedAttributeSet::new();
        for name in names {
            set.push(ResolvedAttribute::new(*name));
        }
        set
    }

    fn selection(take: &[&str], avoid: &[&str]) -> SelectsSubAttributeGuidance {
        SelectsSubAttributeGuidance {
            selects: Some(Selects::Some),
            selected_type_attribute: None,
            selects_some_take_names: take.iter().map(|s| s.to_string()).collect(),
            selects_some_avoid_names: avoid.iter().map(|s| s.to_string()).collect(),
        }
    }

    #[test]
    fn select_some_follows_take_order() {
        let (kept, dropped) = select_some(set(&["a", "b", "c"]), &selection(&["c", "a"], &[]));
        assert_eq!(kept.names().collect::<Vec<_>>(), vec!["c", "a"]);
        assert_eq!(dropped, vec!["b".to_string()]);
    }

    #[test]
    fn select_some_without_take_only_avoids() {
        let (kept, dropped) = select_some(set(&["a", "b", "c"]), &selection(&[], &["b"]));
        assert_eq!(kept.names().collect::<Vec<_>>(), vec!["a", "c"]);
        assert_eq!(dropped, vec!["b".to_string()]);
    }

    #[test]
    fn select_one_skips_avoided_names() {
        let members = set(&["a", "b"]);
        let guidance = selection(&[], &["a"]);
        assert_eq!(select_one(&members, Some(&guidance)).map(|a| a.name.as_str()), Some("b"));
        assert_eq!(select_one(&members, None).map(|a| a.name.as_str()), Some("a"));
        assert!(select_one(&members, Some(&selection(&["z"], &[]))).is_none());
    }
}
