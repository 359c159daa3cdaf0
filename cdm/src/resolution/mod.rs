//! Attribute resolution
//!
//! A [`Resolver`] turns an entity of a [`Corpus`] into its final attribute
//! list. Each request runs in its own pass: the pass owns every record it
//! creates (attributes, traits, context nodes) and only reads the corpus, so
//! requests can run concurrently against one shared corpus.
//!
//! The walk is a depth-first descent over the entity's linearized attributes.
//! Every nested frame (entity, entity attribute, attribute group, trait,
//! constant) goes through [`Pass::descend`], which checks for cancellation,
//! enforces the recursion limit and keeps the definition path used in errors.
//! Inheritance chains are walked in a loop and are held to the same limit.

pub mod context;
pub mod directives;
pub mod guidance;
pub mod resolved;

mod constants;
mod expansion;
mod inheritance;
mod traits;

pub use context::{AttributeContext, ContextContent, ContextId, ContextKind, ContextNode};
pub use directives::Directives;
pub use guidance::{rename, InheritedGuidance};
pub use resolved::{
    ConstantTable, ResolvedArgument, ResolvedAttribute, ResolvedAttributeSet, ResolvedEntity,
    ResolvedTrait, ResolvedValue,
};
pub use traits::{
    COUNT_TRAIT, EXPANSION_TRAIT, FOREIGN_KEY_TRAIT, SELECTED_ATTRIBUTE_TRAIT, SUPPORTING_TRAIT,
};

use crate::config::ResolverConfig;
use crate::corpus::{Corpus, DefinitionShape, DocumentId, Located};
use crate::definitions::{AttributeGroupDefinition, EntityDefinition};
use crate::error::{ErrorKind, ResolutionError, ResolutionResult};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use tracing::debug;

/// Per-request options.
#[derive(Debug, Clone, Default)]
pub struct ResolveOptions {
    /// Cooperative cancellation flag, checked at every nested frame.
    pub cancel: Option<Arc<AtomicBool>>,
}

impl ResolveOptions {
    pub fn with_cancel(flag: Arc<AtomicBool>) -> Self {
        Self { cancel: Some(flag) }
    }
}

/// Resolves entities of one corpus with one configuration.
#[derive(Debug, Clone)]
pub struct Resolver<'c> {
    corpus: &'c Corpus,
    config: ResolverConfig,
}

impl<'c> Resolver<'c> {
    pub fn new(corpus: &'c Corpus, config: ResolverConfig) -> Self {
        Self { corpus, config }
    }

    pub fn config(&self) -> &ResolverConfig {
        &self.config
    }

    /// Resolve the entity named `entity_name`, which must be defined exactly once in the corpus.
    pub fn resolve(
        &self,
        entity_name: &str,
        directives: &Directives,
    ) -> ResolutionResult<ResolvedEntity> {
        self.resolve_with(entity_name, directives, &ResolveOptions::default())
    }

    pub fn resolve_with(
        &self,
        entity_name: &str,
        directives: &Directives,
        options: &ResolveOptions,
    ) -> ResolutionResult<ResolvedEntity> {
        let entity = self
            .corpus
            .find_entity(entity_name)
            .map_err(|kind| ResolutionError::new(kind, vec![entity_name.to_string()]))?;
        self.run(entity, directives, options)
    }

    /// Resolve `entity_name` as seen from `document`, following that document's imports.
    pub fn resolve_in(
        &self,
        document: &str,
        entity_name: &str,
        directives: &Directives,
        options: &ResolveOptions,
    ) -> ResolutionResult<ResolvedEntity> {
        let path = || vec![entity_name.to_string()];
        let from = self.corpus.document_id(document).ok_or_else(|| {
            ResolutionError::new(
                ErrorKind::InvalidCorpus(format!("unknown document '{}'", document)),
                path(),
            )
        })?;
        let entity = self
            .corpus
            .resolve_name::<EntityDefinition>(from, entity_name)
            .map_err(|kind| ResolutionError::new(kind, path()))?;
        self.run(entity, directives, options)
    }

    fn run<'a>(
        &'a self,
        entity: Located<'a, EntityDefinition>,
        directives: &Directives,
        options: &ResolveOptions,
    ) -> ResolutionResult<ResolvedEntity> {
        let directives = directives.union(self.config.default_directives.iter().cloned());
        let name = entity.definition.entity_name.as_str();
        debug!(entity = name, directives = %directives, "resolution requested");

        let mut pass = Pass::new(self.corpus, &self.config, options.cancel.as_deref());
        let root = pass.context.add_root(
            ContextKind::Entity,
            name,
            Some(self.corpus.qualified_name(entity.document, name)),
        );
        if let Some(lineage) = &entity.definition.attribute_context {
            pass.context.set_lineage(root, lineage);
        }

        let scope = Scope {
            document: entity.document,
            directives,
            depth: 0,
            guidance: InheritedGuidance::from_defaults(&self.config.guidance),
        };
        pass.embed_stack.push(entity.definition);
        let expansion = pass.expand_entity(entity, &scope, root)?;
        let traits = pass.check(expansion.traits.finish())?;
        pass.context.set_traits(root, traits.clone());

        Ok(ResolvedEntity {
            entity_name: name.to_string(),
            attributes: expansion.attributes.into_vec(),
            traits,
            context: pass.context,
        })
    }
}

/// Resolve `entity_name` with the default configuration.
pub fn resolve(
    entity_name: &str,
    directives: &Directives,
    corpus: &Corpus,
) -> ResolutionResult<ResolvedEntity> {
    Resolver::new(corpus, ResolverConfig::default()).resolve(entity_name, directives)
}

/// What is in force while expanding one subtree.
#[derive(Debug, Clone)]
pub(crate) struct Scope {
    /// Document whose imports resolve the names written in this subtree.
    pub document: DocumentId,
    pub directives: Directives,
    /// Entity-attribute nesting depth; the requested entity's own attributes are at 0.
    pub depth: usize,
    pub guidance: InheritedGuidance,
}

impl Scope {
    pub fn in_document(&self, document: DocumentId) -> Scope {
        Scope {
            document,
            ..self.clone()
        }
    }
}

/// State of one resolution request.
pub(crate) struct Pass<'c> {
    corpus: &'c Corpus,
    config: &'c ResolverConfig,
    cancel: Option<&'c AtomicBool>,
    context: AttributeContext,
    /// Names of the frames currently being expanded.
    path: Vec<String>,
    /// Entities currently being embedded, outermost first.
    embed_stack: Vec<&'c EntityDefinition>,
    group_stack: Vec<&'c AttributeGroupDefinition>,
}

impl<'c> Pass<'c> {
    fn new(
        corpus: &'c Corpus,
        config: &'c ResolverConfig,
        cancel: Option<&'c AtomicBool>,
    ) -> Self {
        Self {
            corpus,
            config,
            cancel,
            context: AttributeContext::new(),
            path: Vec::new(),
            embed_stack: Vec::new(),
            group_stack: Vec::new(),
        }
    }

    fn fail(&self, kind: ErrorKind) -> ResolutionError {
        ResolutionError::new(kind, self.path.clone())
    }

    fn check<T>(&self, result: Result<T, ErrorKind>) -> ResolutionResult<T> {
        result.map_err(|kind| self.fail(kind))
    }

    /// Run `f` one frame deeper, named `segment` in error paths.
    fn descend<T>(
        &mut self,
        segment: &str,
        f: impl FnOnce(&mut Self) -> ResolutionResult<T>,
    ) -> ResolutionResult<T> {
        if self.cancel.is_some_and(|flag| flag.load(Ordering::Relaxed)) {
            return Err(self.fail(ErrorKind::Cancelled));
        }
        if self.path.len() >= self.config.max_recursion_depth {
            return Err(self.fail(ErrorKind::RecursionLimitExceeded {
                limit: self.config.max_recursion_depth,
            }));
        }
        self.path.push(segment.to_string());
        let result = f(self);
        self.path.pop();
        result
    }

    /// Run `f` inside attribute group `group`; a group that contains itself is an embedding cycle.
    fn with_group<T>(
        &mut self,
        group: Located<'c, AttributeGroupDefinition>,
        f: impl FnOnce(&mut Self) -> ResolutionResult<T>,
    ) -> ResolutionResult<T> {
        let definition = group.definition;
        if self
            .group_stack
            .iter()
            .any(|open| std::ptr::eq(*open, definition))
        {
            let mut chain: Vec<String> = self
                .group_stack
                .iter()
                .map(|g| g.definition_name().to_string())
                .collect();
            chain.push(definition.attribute_group_name.clone());
            return Err(self.fail(ErrorKind::CyclicEmbedding { chain }));
        }
        self.descend(&definition.attribute_group_name, |pass| {
            pass.group_stack.push(definition);
            let result = f(pass);
            pass.group_stack.pop();
            result
        })
    }
}
