// Shared fixtures for the integration tests

#![allow(dead_code)]

use cdm::{
    Corpus, Directives, Document, ResolutionError, ResolvedEntity, Resolver, ResolverConfig,
};
use serde_json::{json, Value};

/// A corpus made of the single document `main`.
pub fn corpus(definitions: Value) -> Corpus {
    corpus_of(vec![json!({ "name": "main", "definitions": definitions })])
}

pub fn corpus_of(documents: Vec<Value>) -> Corpus {
    let documents: Vec<Document> = documents
        .into_iter()
        .map(|d| serde_json::from_value(d).expect("fixture document"))
        .collect();
    Corpus::new(documents).expect("fixture corpus links")
}

pub fn directives(tags: &[&str]) -> Directives {
    tags.iter().copied().collect()
}

pub fn resolve(corpus: &Corpus, entity: &str, tags: &[&str]) -> Result<ResolvedEntity, ResolutionError> {
    cdm::resolve(entity, &directives(tags), corpus)
}

pub fn resolve_with(
    corpus: &Corpus,
    config: ResolverConfig,
    entity: &str,
    tags: &[&str],
) -> Result<ResolvedEntity, ResolutionError> {
    Resolver::new(corpus, config).resolve(entity, &directives(tags))
}

pub fn names(entity: &ResolvedEntity) -> Vec<String> {
    entity.attributes.iter().map(|a| a.name.clone()).collect()
}

/// The `string` data type most fixtures use.
pub fn string_type() -> Value {
    json!({ "dataTypeName": "string" })
}
