//! Trait application and argument binding.
//!
//! Traits gathered at a node are kept in a [`TraitSet`] keyed by trait name.
//! Applying a trait that is already present merges the new arguments into the
//! earlier entry; required parameters are only checked when the set is
//! finished, so a later application can still supply them.

use super::resolved::{ResolvedArgument, ResolvedTrait, ResolvedValue};
use super::Pass;
use crate::corpus::DocumentId;
use crate::definitions::{Argument, ArgumentValue, TraitReference};
use crate::error::{ErrorKind, ResolutionResult};
use indexmap::IndexMap;
use tracing::trace;

pub const FOREIGN_KEY_TRAIT: &str = "is.linkedEntity.identifier";
pub const COUNT_TRAIT: &str = "is.linkedEntity.array.count";
pub const EXPANSION_TRAIT: &str = "has.expansionInfo.list";
pub const SUPPORTING_TRAIT: &str = "is.addedInSupportOf";
pub const SELECTED_ATTRIBUTE_TRAIT: &str = "is.linkedEntity.selectedAttribute";

#[derive(Debug, Clone, PartialEq)]
pub(crate) struct ParameterSlot {
    pub name: String,
    pub default: Option<ResolvedValue>,
    pub required: bool,
}

pub(crate) type BoundArguments = IndexMap<String, ResolvedValue>;

#[derive(Debug, Clone, PartialEq)]
pub(crate) struct TraitEntry {
    pub name: String,
    pub parameters: Vec<ParameterSlot>,
    pub supplied: BoundArguments,
    pub elevated: bool,
    pub modifies_attributes: bool,
    pub ugly: bool,
}

impl TraitEntry {
    pub fn from_resolved(resolved: &ResolvedTrait) -> Self {
        Self {
            name: resolved.name.clone(),
            parameters: resolved
                .arguments
                .iter()
                .map(|a| ParameterSlot {
                    name: a.parameter.clone(),
                    default: None,
                    required: false,
                })
                .collect(),
            supplied: resolved
                .arguments
                .iter()
                .map(|a| (a.parameter.clone(), a.value.clone()))
                .collect(),
            elevated: resolved.elevated,
            modifies_attributes: resolved.modifies_attributes,
            ugly: resolved.ugly,
        }
    }

    fn merge(&mut self, later: TraitEntry) {
        for slot in later.parameters {
            if !self.parameters.iter().any(|p| p.name == slot.name) {
                self.parameters.push(slot);
            }
        }
        // insert keeps the position of a parameter that was already supplied
        for (parameter, value) in later.supplied {
            self.supplied.insert(parameter, value);
        }
        self.elevated = later.elevated;
        self.modifies_attributes = later.modifies_attributes;
        self.ugly = later.ugly;
    }

    /// Bind every parameter to its supplied value or default.
    pub fn finish(&self) -> Result<ResolvedTrait, ErrorKind> {
        let mut arguments = Vec::with_capacity(self.parameters.len());
        for slot in &self.parameters {
            match self.supplied.get(&slot.name).or(slot.default.as_ref()) {
                Some(value) => arguments.push(ResolvedArgument {
                    parameter: slot.name.clone(),
                    value: value.clone(),
                }),
                None if slot.required => {
                    return Err(ErrorKind::MissingRequiredArgument {
                        trait_name: self.name.clone(),
                        parameter: slot.name.clone(),
                    })
                }
                None => {}
            }
        }
        Ok(ResolvedTrait {
            name: self.name.clone(),
            arguments,
            elevated: self.elevated,
            modifies_attributes: self.modifies_attributes,
            ugly: self.ugly,
        })
    }
}

/// Traits applied at one node, in application order, unique by name.
#[derive(Debug, Clone, Default, PartialEq)]
pub(crate) struct TraitSet {
    entries: IndexMap<String, TraitEntry>,
}

impl TraitSet {
    pub fn add(&mut self, entry: TraitEntry) {
        match self.entries.get_mut(&entry.name) {
            Some(existing) => {
                trace!(trait_name = %entry.name, "merging repeated trait application");
                existing.merge(entry);
            }
            None => {
                self.entries.insert(entry.name.clone(), entry);
            }
        }
    }

    pub fn add_resolved(&mut self, resolved: &ResolvedTrait) {
        self.add(TraitEntry::from_resolved(resolved));
    }

    pub fn extend(&mut self, other: TraitSet) {
        for entry in other.entries.into_values() {
            self.add(entry);
        }
    }

    pub fn finish(&self) -> Result<Vec<ResolvedTrait>, ErrorKind> {
        self.entries.values().map(TraitEntry::finish).collect()
    }
}

#[derive(Debug)]
pub(crate) enum BindError<E> {
    UnknownParameter { parameter: String },
    Eval(E),
}

/// Bind arguments to parameters, evaluating each value with `eval`.
///
/// Named arguments bind by name; an unnamed argument at index `i` binds to the
/// `i`-th parameter.
pub(crate) fn bind_arguments<'a, F, E>(
    parameters: &[ParameterSlot],
    arguments: &'a [Argument],
    mut eval: F,
) -> Result<BoundArguments, BindError<E>>
where
    F: FnMut(&'a ArgumentValue) -> Result<ResolvedValue, E>,
{
    let mut bound = BoundArguments::new();
    for (index, argument) in arguments.iter().enumerate() {
        let slot = match &argument.name {
            Some(name) => parameters.iter().find(|p| &p.name == name),
            None => parameters.get(index),
        }
        .ok_or_else(|| BindError::UnknownParameter {
            parameter: argument
                .name
                .clone()
                .unwrap_or_else(|| format!("#{}", index)),
        })?;
        let value = eval(&argument.value).map_err(BindError::Eval)?;
        bound.insert(slot.name.clone(), value);
    }
    Ok(bound)
}

impl<'c> Pass<'c> {
    /// Resolve one trait reference into an entry with its arguments bound.
    ///
    /// `document` is where the reference was written; argument values resolve there,
    /// parameter defaults resolve in the document that declares the parameter.
    pub(super) fn apply_trait(
        &mut self,
        document: DocumentId,
        reference: &'c TraitReference,
    ) -> ResolutionResult<TraitEntry> {
        let corpus = self.corpus;
        let located = self.check(corpus.resolve(document, &reference.target))?;
        let trait_name = located.definition.trait_name.as_str();

        self.descend(trait_name, |pass| {
            let linear = pass.linearize_trait(located)?;

            let mut parameters = Vec::with_capacity(linear.parameters.len());
            for (parameter, declared_in) in linear.parameters {
                let default = match &parameter.default_value {
                    Some(value) => Some(pass.resolve_value(declared_in, value)?),
                    None => None,
                };
                parameters.push(ParameterSlot {
                    name: parameter.name.clone(),
                    default,
                    required: parameter.required,
                });
            }

            let supplied = bind_arguments(&parameters, &reference.arguments, |value| {
                pass.resolve_value(document, value)
            })
            .map_err(|e| match e {
                BindError::UnknownParameter { parameter } => pass.fail(ErrorKind::UnknownParameter {
                    trait_name: trait_name.to_string(),
                    parameter,
                }),
                BindError::Eval(e) => e,
            })?;
            trace!(trait_name, arguments = supplied.len(), "applied trait");

            Ok(TraitEntry {
                name: trait_name.to_string(),
                parameters,
                supplied,
                elevated: linear.elevated,
                modifies_attributes: linear.modifies_attributes,
                ugly: linear.ugly,
            })
        })
    }

    /// Apply `references` in order into a fresh set.
    pub(super) fn apply_traits(
        &mut self,
        document: DocumentId,
        references: &'c [TraitReference],
    ) -> ResolutionResult<TraitSet> {
        let mut set = TraitSet::default();
        for reference in references {
            let entry = self.apply_trait(document, reference)?;
            set.add(entry);
        }
        Ok(set)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn slot(name: &str, default: Option<&str>, required: bool) -> ParameterSlot {
        ParameterSlot {
            name: name.to_string(),
            default: default.map(ResolvedValue::text),
            required,
        }
    }

    fn text_eval(value: &ArgumentValue) -> Result<ResolvedValue, ()> {
        match value {
            ArgumentValue::Text(s) => Ok(ResolvedValue::text(s.clone())),
            ArgumentValue::Constant(_) => Err(()),
        }
    }

    #[test]
    fn positional_then_named_binding() {
        let params = vec![slot("minimum", None, false), slot("maximum", None, false)];
        let args = vec![
            Argument::positional(ArgumentValue::Text("1".into())),
            Argument {
                name: Some("maximum".into()),
                value: ArgumentValue::Text("9".into()),
                explanation: None,
            },
        ];
        let bound = bind_arguments(&params, &args, text_eval).unwrap();
        assert_eq!(bound.get("minimum"), Some(&ResolvedValue::text("1")));
        assert_eq!(bound.get("maximum"), Some(&ResolvedValue::text("9")));
    }

    #[test]
    fn extra_positional_argument_is_unknown() {
        let params = vec![slot("only", None, false)];
        let args = vec![
            Argument::positional(ArgumentValue::Text("a".into())),
            Argument::positional(ArgumentValue::Text("b".into())),
        ];
        match bind_arguments(&params, &args, text_eval) {
            Err(BindError::UnknownParameter { parameter }) => assert_eq!(parameter, "#1"),
            other => panic!("unexpected {:?}", other),
        }
    }

    fn entry(name: &str, parameters: Vec<ParameterSlot>, supplied: &[(&str, &str)]) -> TraitEntry {
        TraitEntry {
            name: name.to_string(),
            parameters,
            supplied: supplied
                .iter()
                .map(|(k, v)| (k.to_string(), ResolvedValue::text(*v)))
                .collect(),
            elevated: false,
            modifies_attributes: false,
            ugly: false,
        }
    }

    #[test]
    fn later_application_overrides_and_satisfies_required() {
        let params = vec![slot("length", None, true), slot("unit", Some("chars"), false)];
        let mut set = TraitSet::default();
        set.add(entry("is.constrained", params.clone(), &[]));
        assert!(matches!(
            set.finish(),
            Err(ErrorKind::MissingRequiredArgument { ref parameter, .. }) if parameter == "length"
        ));

        set.add(entry("is.constrained", params, &[("length", "40")]));
        let traits = set.finish().unwrap();
        assert_eq!(traits.len(), 1);
        assert_eq!(traits[0].argument("length"), Some(&ResolvedValue::text("40")));
        assert_eq!(traits[0].argument("unit"), Some(&ResolvedValue::text("chars")));
    }
}
