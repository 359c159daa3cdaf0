//! Corpus view and reference resolution
//!
//! A [`Corpus`] is the already-linked set of documents the loader hands to the
//! engine. It is built once and never mutated, so any number of resolution
//! requests can share it across threads.
//!
//! # Visibility
//!
//! An unqualified name is looked up in the requesting document first, then in
//! its imports depth-first in import order. Imports that carry a moniker are
//! skipped: their definitions are only reachable through `moniker/Name`, which
//! starts the same search at the document behind that moniker. The first
//! document that defines the name wins; two definitions of the same name and
//! kind inside that document make the reference ambiguous.

use crate::definitions::{
    AttributeGroupDefinition, ClassRef, DataTypeDefinition, Definition, DefinitionKind,
    EntityDefinition, EntityLike, ConstantEntityDefinition, PurposeDefinition, TraitDefinition,
};
use crate::error::ErrorKind;
use serde::Deserialize;
use std::collections::{HashMap, HashSet};
use tracing::trace;

#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Import {
    pub corpus_path: String,
    pub moniker: Option<String>,
}

/// One definition document.
#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Document {
    pub name: String,
    #[serde(default)]
    pub imports: Vec<Import>,
    #[serde(default)]
    pub definitions: Vec<Definition>,
}

/// The on-disk snapshot format: `{ "documents": [ ... ] }`.
#[derive(Debug, Clone, Deserialize)]
pub struct CorpusSnapshot {
    pub documents: Vec<Document>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct DocumentId(usize);

/// Stable address of a top-level definition.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct DefinitionHandle {
    pub document: DocumentId,
    pub index: usize,
}

/// A definition together with the document its own references resolve in.
///
/// Inline definitions take the document of the definition that contains them.
#[derive(Debug)]
pub struct Located<'c, T> {
    pub document: DocumentId,
    pub definition: &'c T,
}

impl<T> Clone for Located<'_, T> {
    fn clone(&self) -> Self {
        *self
    }
}

impl<T> Copy for Located<'_, T> {}

/// Either flavour of entity an entity reference can land on.
#[derive(Debug, Clone, Copy)]
pub enum LocatedEntityLike<'c> {
    Entity(Located<'c, EntityDefinition>),
    Constant(Located<'c, ConstantEntityDefinition>),
}

/// Definition types that can be looked up by name.
pub trait DefinitionShape: Sized {
    const KIND: DefinitionKind;

    fn from_definition(definition: &Definition) -> Option<&Self>;

    fn definition_name(&self) -> &str;
}

macro_rules! definition_shape {
    ($ty:ty, $kind:ident, $field:ident) => {
        impl DefinitionShape for $ty {
            const KIND: DefinitionKind = DefinitionKind::$kind;

            fn from_definition(definition: &Definition) -> Option<&Self> {
                match definition {
                    Definition::$kind(d) => Some(d),
                    _ => None,
                }
            }

            fn definition_name(&self) -> &str {
                &self.$field
            }
        }
    };
}

definition_shape!(PurposeDefinition, Purpose, purpose_name);
definition_shape!(TraitDefinition, Trait, trait_name);
definition_shape!(DataTypeDefinition, DataType, data_type_name);
definition_shape!(AttributeGroupDefinition, AttributeGroup, attribute_group_name);
definition_shape!(EntityDefinition, Entity, entity_name);

#[derive(Debug)]
pub struct Corpus {
    documents: Vec<Document>,
    by_name: HashMap<String, DocumentId>,
    /// Resolved imports per document, in declaration order.
    imports: Vec<Vec<(DocumentId, Option<String>)>>,
    /// (kind, name) -> definition indexes, per document.
    index: Vec<HashMap<(DefinitionKind, String), Vec<usize>>>,
}

impl Corpus {
    /// Link a set of documents. Every import must name a document of the set.
    pub fn new(documents: Vec<Document>) -> Result<Self, ErrorKind> {
        let mut by_name = HashMap::new();
        for (i, doc) in documents.iter().enumerate() {
            if by_name.insert(doc.name.clone(), DocumentId(i)).is_some() {
                return Err(ErrorKind::InvalidCorpus(format!(
                    "document '{}' is defined more than once",
                    doc.name
                )));
            }
        }

        let mut imports = Vec::with_capacity(documents.len());
        for doc in &documents {
            let mut resolved = Vec::with_capacity(doc.imports.len());
            for import in &doc.imports {
                let id = by_name.get(&import.corpus_path).copied().ok_or_else(|| {
                    ErrorKind::InvalidCorpus(format!(
                        "document '{}' imports unknown document '{}'",
                        doc.name, import.corpus_path
                    ))
                })?;
                resolved.push((id, import.moniker.clone()));
            }
            imports.push(resolved);
        }

        let index = documents
            .iter()
            .map(|doc| {
                let mut table: HashMap<(DefinitionKind, String), Vec<usize>> = HashMap::new();
                for (i, def) in doc.definitions.iter().enumerate() {
                    if let Some(name) = def.name() {
                        table.entry((def.kind(), name.to_string())).or_default().push(i);
                    }
                }
                table
            })
            .collect();

        Ok(Self {
            documents,
            by_name,
            imports,
            index,
        })
    }

    /// Parse a JSON snapshot (`{ "documents": [...] }`) and link it.
    pub fn from_json_str(json: &str) -> Result<Self, ErrorKind> {
        let snapshot: CorpusSnapshot =
            serde_json::from_str(json).map_err(|e| ErrorKind::InvalidCorpus(e.to_string()))?;
        Self::new(snapshot.documents)
    }

    pub fn documents(&self) -> impl Iterator<Item = (DocumentId, &Document)> {
        self.documents.iter().enumerate().map(|(i, d)| (DocumentId(i), d))
    }

    pub fn document(&self, id: DocumentId) -> &Document {
        &self.documents[id.0]
    }

    pub fn document_id(&self, name: &str) -> Option<DocumentId> {
        self.by_name.get(name).copied()
    }

    pub fn definition(&self, handle: DefinitionHandle) -> &Definition {
        &self.documents[handle.document.0].definitions[handle.index]
    }

    /// `document/Name`, used for provenance and cycle reporting.
    pub fn qualified_name(&self, document: DocumentId, name: &str) -> String {
        format!("{}/{}", self.document(document).name, name)
    }

    /// Documents searched for unqualified names starting at `root`, in search order.
    fn visible_documents(&self, root: DocumentId) -> Vec<DocumentId> {
        let mut order = Vec::new();
        let mut visited = HashSet::new();
        self.collect_visible(root, &mut visited, &mut order);
        order
    }

    fn collect_visible(
        &self,
        doc: DocumentId,
        visited: &mut HashSet<DocumentId>,
        order: &mut Vec<DocumentId>,
    ) {
        if !visited.insert(doc) {
            return;
        }
        order.push(doc);
        for (import, moniker) in &self.imports[doc.0] {
            if moniker.is_none() {
                self.collect_visible(*import, visited, order);
            }
        }
    }

    fn moniker_root(&self, from: DocumentId, moniker: &str) -> Option<DocumentId> {
        self.imports[from.0]
            .iter()
            .find(|(_, m)| m.as_deref() == Some(moniker))
            .map(|(id, _)| *id)
    }

    /// Find the unique definition named `name` of one of `kinds`, as seen from `from`.
    pub fn lookup(
        &self,
        from: DocumentId,
        name: &str,
        kinds: &[DefinitionKind],
    ) -> Result<DefinitionHandle, ErrorKind> {
        let expected = kinds.first().copied().unwrap_or(DefinitionKind::Entity);
        let unresolved = || ErrorKind::UnresolvedReference {
            name: name.to_string(),
            expected,
        };

        let (root, local) = match name.split_once('/') {
            Some((moniker, local)) => match self.moniker_root(from, moniker) {
                Some(root) => (root, local),
                None => return Err(unresolved()),
            },
            None => (from, name),
        };

        for doc in self.visible_documents(root) {
            let mut found: Vec<usize> = kinds
                .iter()
                .filter_map(|kind| self.index[doc.0].get(&(*kind, local.to_string())))
                .flatten()
                .copied()
                .collect();
            found.sort_unstable();
            match found.as_slice() {
                [] => continue,
                [index] => {
                    trace!(name, document = %self.document(doc).name, "resolved reference");
                    return Ok(DefinitionHandle {
                        document: doc,
                        index: *index,
                    });
                }
                many => {
                    return Err(ErrorKind::AmbiguousReference {
                        name: name.to_string(),
                        document: self.document(doc).name.clone(),
                        count: many.len(),
                    })
                }
            }
        }
        Err(unresolved())
    }

    /// Look up an entity by name across every document; it must be defined exactly once.
    pub fn find_entity(&self, name: &str) -> Result<Located<'_, EntityDefinition>, ErrorKind> {
        let found: Vec<Located<'_, EntityDefinition>> = self
            .documents()
            .flat_map(|(id, doc)| {
                doc.definitions.iter().filter_map(move |def| match def {
                    Definition::Entity(e) if e.entity_name == name => Some(Located {
                        document: id,
                        definition: e,
                    }),
                    _ => None,
                })
            })
            .collect();
        match found.as_slice() {
            [] => Err(ErrorKind::UnresolvedReference {
                name: name.to_string(),
                expected: DefinitionKind::Entity,
            }),
            [one] => Ok(*one),
            many => Err(ErrorKind::AmbiguousReference {
                name: name.to_string(),
                document: "<corpus>".to_string(),
                count: many.len(),
            }),
        }
    }

    /// Turn a name-or-inline reference into a located definition.
    pub fn resolve<'c, T: DefinitionShape>(
        &'c self,
        from: DocumentId,
        reference: &'c ClassRef<T>,
    ) -> Result<Located<'c, T>, ErrorKind> {
        match reference {
            ClassRef::Inline(definition) => Ok(Located {
                document: from,
                definition,
            }),
            ClassRef::Name(name) => self.resolve_name(from, name),
        }
    }

    /// Look up a definition of shape `T` by (possibly moniker-qualified) name.
    pub fn resolve_name<T: DefinitionShape>(
        &self,
        from: DocumentId,
        name: &str,
    ) -> Result<Located<'_, T>, ErrorKind> {
        let handle = self.lookup(from, name, &[T::KIND])?;
        T::from_definition(self.definition(handle))
            .map(|definition| Located {
                document: handle.document,
                definition,
            })
            .ok_or_else(|| ErrorKind::UnresolvedReference {
                name: name.to_string(),
                expected: T::KIND,
            })
    }

    /// Resolve an entity reference that may also land on a constant entity.
    pub fn resolve_entity_like<'c>(
        &'c self,
        from: DocumentId,
        reference: &'c ClassRef<EntityLike>,
    ) -> Result<LocatedEntityLike<'c>, ErrorKind> {
        match reference {
            ClassRef::Inline(definition) => Ok(match &**definition {
                EntityLike::Entity(e) => LocatedEntityLike::Entity(Located {
                    document: from,
                    definition: e,
                }),
                EntityLike::Constant(c) => LocatedEntityLike::Constant(Located {
                    document: from,
                    definition: c,
                }),
            }),
            ClassRef::Name(name) => {
                let handle = self.lookup(
                    from,
                    name,
                    &[DefinitionKind::Entity, DefinitionKind::ConstantEntity],
                )?;
                match self.definition(handle) {
                    Definition::Entity(e) => Ok(LocatedEntityLike::Entity(Located {
                        document: handle.document,
                        definition: e,
                    })),
                    Definition::ConstantEntity(c) => Ok(LocatedEntityLike::Constant(Located {
                        document: handle.document,
                        definition: c,
                    })),
                    _ => Err(ErrorKind::UnresolvedReference {
                        name: name.clone(),
                        expected: DefinitionKind::Entity,
                    }),
                }
            }
        }
    }

    /// Resolve an entity reference that must land on a (non-constant) entity.
    pub fn resolve_entity<'c>(
        &'c self,
        from: DocumentId,
        reference: &'c ClassRef<EntityLike>,
    ) -> Result<Located<'c, EntityDefinition>, ErrorKind> {
        let not_entity = || ErrorKind::UnresolvedReference {
            name: reference.name().unwrap_or("<inline>").to_string(),
            expected: DefinitionKind::Entity,
        };
        match reference {
            ClassRef::Name(name) => {
                let handle = self.lookup(from, name, &[DefinitionKind::Entity])?;
                EntityDefinition::from_definition(self.definition(handle))
                    .map(|definition| Located {
                        document: handle.document,
                        definition,
                    })
                    .ok_or_else(not_entity)
            }
            ClassRef::Inline(_) => match self.resolve_entity_like(from, reference)? {
                LocatedEntityLike::Entity(e) => Ok(e),
                LocatedEntityLike::Constant(_) => Err(not_entity()),
            },
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn doc(value: serde_json::Value) -> Document {
        serde_json::from_value(value).unwrap()
    }

    #[test]
    fn own_definitions_shadow_imports() {
        let corpus = Corpus::new(vec![
            doc(json!({ "name": "base", "definitions": [{ "entityName": "Address" }] })),
            doc(json!({
                "name": "main",
                "imports": [{ "corpusPath": "base" }],
                "definitions": [{ "entityName": "Address" }]
            })),
        ])
        .unwrap();
        let main = corpus.document_id("main").unwrap();
        let handle = corpus
            .lookup(main, "Address", &[DefinitionKind::Entity])
            .unwrap();
        assert_eq!(handle.document, main);
    }

    #[test]
    fn moniker_guarded_imports_need_qualification() {
        let corpus = Corpus::new(vec![
            doc(json!({ "name": "ext", "definitions": [{ "entityName": "Thing" }] })),
            doc(json!({ "name": "main", "imports": [{ "corpusPath": "ext", "moniker": "x" }] })),
        ])
        .unwrap();
        let main = corpus.document_id("main").unwrap();
        assert!(matches!(
            corpus.lookup(main, "Thing", &[DefinitionKind::Entity]),
            Err(ErrorKind::UnresolvedReference { .. })
        ));
        let handle = corpus
            .lookup(main, "x/Thing", &[DefinitionKind::Entity])
            .unwrap();
        assert_eq!(handle.document, corpus.document_id("ext").unwrap());
    }

    #[test]
    fn import_cycles_terminate() {
        let corpus = Corpus::new(vec![
            doc(json!({ "name": "a", "imports": [{ "corpusPath": "b" }] })),
            doc(json!({ "name": "b", "imports": [{ "corpusPath": "a" }] })),
        ])
        .unwrap();
        let a = corpus.document_id("a").unwrap();
        assert!(corpus.lookup(a, "Missing", &[DefinitionKind::Trait]).is_err());
    }

    #[test]
    fn unknown_import_is_rejected() {
        let err = Corpus::new(vec![doc(
            json!({ "name": "a", "imports": [{ "corpusPath": "nowhere" }] }),
        )])
        .unwrap_err();
        assert!(matches!(err, ErrorKind::InvalidCorpus(_)));
    }
}
