//! Resolution guidance that flows down the attribute tree.
//!
//! Only the options that shape a whole subtree are inherited; options that
//! describe a single attribute (removal, cardinality, selection, supplied key
//! and count attributes, directive edits) are read straight off the node.

use crate::config::GuidanceDefaults;
use crate::definitions::{Cardinality, ResolutionGuidance, Selects, SelectsSubAttributeGuidance};

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct InheritedGuidance {
    pub allow_reference: bool,
    pub always_include_foreign_key: bool,
    pub reference_only_after_depth: usize,
    pub rename_format: String,
    pub starting_ordinal: i64,
    pub maximum_expansion: usize,
}

impl InheritedGuidance {
    pub fn from_defaults(defaults: &GuidanceDefaults) -> Self {
        Self {
            allow_reference: defaults.allow_reference,
            always_include_foreign_key: defaults.always_include_foreign_key,
            reference_only_after_depth: defaults.reference_only_after_depth,
            rename_format: defaults.rename_format.clone(),
            starting_ordinal: defaults.starting_ordinal,
            maximum_expansion: defaults.maximum_expansion,
        }
    }

    /// The guidance for a subtree whose root node carries `guidance`.
    pub fn overlay(&self, guidance: Option<&ResolutionGuidance>) -> Self {
        let mut next = self.clone();
        let Some(guidance) = guidance else {
            return next;
        };
        if let Some(format) = &guidance.rename_format {
            next.rename_format = format.clone();
        }
        if let Some(expansion) = &guidance.expansion {
            if let Some(start) = expansion.starting_ordinal {
                next.starting_ordinal = start;
            }
            if let Some(max) = expansion.maximum_expansion {
                next.maximum_expansion = max;
            }
        }
        if let Some(by_reference) = &guidance.entity_by_reference {
            if let Some(allow) = by_reference.allow_reference {
                next.allow_reference = allow;
            }
            if let Some(always) = by_reference.always_include_foreign_key {
                next.always_include_foreign_key = always;
            }
            if let Some(depth) = by_reference.reference_only_after_depth {
                next.reference_only_after_depth = depth;
            }
        }
        next
    }

    /// Ordinals generated for a `many` expansion.
    ///
    /// Stops early at the last ordinal an `i64` can hold.
    pub fn ordinals(&self) -> impl Iterator<Item = i64> {
        let start = self.starting_ordinal;
        (0..=i64::MAX)
            .take(self.maximum_expansion)
            .map_while(move |i| start.checked_add(i))
    }
}

pub(crate) fn removes(guidance: Option<&ResolutionGuidance>) -> bool {
    guidance.and_then(|g| g.remove_attribute).unwrap_or(false)
}

pub(crate) fn cardinality(guidance: Option<&ResolutionGuidance>) -> Cardinality {
    guidance.and_then(|g| g.cardinality).unwrap_or_default()
}

pub(crate) fn selection(guidance: Option<&ResolutionGuidance>) -> Option<&SelectsSubAttributeGuidance> {
    guidance.and_then(|g| g.selects_sub_attribute.as_ref())
}

pub(crate) fn selects(guidance: Option<&ResolutionGuidance>) -> Selects {
    selection(guidance).and_then(|s| s.selects).unwrap_or_default()
}

/// Expand a rename format.
///
/// `{a}` is the attribute name, `{m}` the member name, `{o}` the ordinal (empty
/// when there is none). Upper-case `{A}` and `{M}` capitalize the first letter.
/// Unknown placeholders are kept as written.
pub fn rename(format: &str, attribute: &str, ordinal: Option<i64>, member: &str) -> String {
    let mut out = String::with_capacity(format.len() + attribute.len() + member.len());
    let mut rest = format;
    while let Some(open) = rest.find('{') {
        out.push_str(&rest[..open]);
        let after = &rest[open + 1..];
        let Some(close) = after.find('}') else {
            out.push_str(&rest[open..]);
            return out;
        };
        match &after[..close] {
            "a" => out.push_str(attribute),
            "A" => out.push_str(&capitalize(attribute)),
            "m" => out.push_str(member),
            "M" => out.push_str(&capitalize(member)),
            "o" => {
                if let Some(ordinal) = ordinal {
                    out.push_str(&ordinal.to_string());
                }
            }
            other => {
                out.push('{');
                out.push_str(other);
                out.push('}');
            }
        }
        rest = &after[close + 1..];
    }
    out.push_str(rest);
    out
}

fn capitalize(s: &str) -> String {
    let mut chars = s.chars();
    match chars.next() {
        Some(first) => first.to_uppercase().chain(chars).collect(),
        None => String::new(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::definitions::{EntityByReferenceGuidance, ExpansionGuidance};

    #[test]
    fn rename_placeholders() {
        assert_eq!(rename("{a}{o}{M}", "address", None, "street"), "addressStreet");
        assert_eq!(rename("{a}{o}{M}", "phone", Some(2), "number"), "phone2Number");
        assert_eq!(rename("{a}{o}", "phone", Some(1), ""), "phone1");
        assert_eq!(rename("{A}_{m}", "billing", None, "city"), "Billing_city");
        assert_eq!(rename("{x}-{m}", "a", None, "b"), "{x}-b");
        assert_eq!(rename("{m", "a", None, "b"), "{m");
    }

    #[test]
    fn overlay_only_overrides_what_is_set() {
        let base = InheritedGuidance::from_defaults(&GuidanceDefaults::default());
        let guidance = ResolutionGuidance {
            expansion: Some(ExpansionGuidance {
                starting_ordinal: Some(1),
                ..Default::default()
            }),
            entity_by_reference: Some(EntityByReferenceGuidance {
                reference_only_after_depth: Some(1),
                ..Default::default()
            }),
            ..Default::default()
        };
        let next = base.overlay(Some(&guidance));
        assert_eq!(next.starting_ordinal, 1);
        assert_eq!(next.maximum_expansion, 5);
        assert_eq!(next.reference_only_after_depth, 1);
        assert!(next.allow_reference);
        assert_eq!(next.ordinals().collect::<Vec<_>>(), vec![1, 2, 3, 4, 5]);
        assert_eq!(base.overlay(None), base);
    }

    #[test]
    fn ordinals_stop_at_the_largest_value() {
        let mut guidance = InheritedGuidance::from_defaults(&GuidanceDefaults::default());
        guidance.starting_ordinal = i64::MAX - 1;
        guidance.maximum_expansion = 5;
        assert_eq!(guidance.ordinals().collect::<Vec<_>>(), vec![i64::MAX - 1, i64::MAX]);

        guidance.starting_ordinal = -2;
        guidance.maximum_expansion = 0;
        assert_eq!(guidance.ordinals().count(), 0);
    }
}
