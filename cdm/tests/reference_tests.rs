// tests/reference_tests.rs
// Name visibility across documents: imports, monikers, shadowing, ambiguity

mod shared;

use cdm::{Corpus, DefinitionKind, ErrorKind, ResolveOptions, Resolver, ResolverConfig, ResolvedValue};
use pretty_assertions::assert_eq;
use serde_json::json;
use shared::{corpus, corpus_of, directives, names, resolve};

fn resolve_in(corpus: &Corpus, document: &str, entity: &str) -> Result<cdm::ResolvedEntity, cdm::ResolutionError> {
    Resolver::new(corpus, ResolverConfig::default()).resolve_in(
        document,
        entity,
        &directives(&[]),
        &ResolveOptions::default(),
    )
}

#[test]
fn test_imported_definitions_are_visible() {
    let corpus = corpus_of(vec![
        json!({
            "name": "foundations",
            "definitions": [{ "dataTypeName": "string" }]
        }),
        json!({
            "name": "common",
            "imports": [{ "corpusPath": "foundations" }],
            "definitions": [{
                "entityName": "Address",
                "hasAttributes": [{ "name": "street", "dataType": "string" }]
            }]
        }),
        json!({
            "name": "sales",
            "imports": [{ "corpusPath": "common" }],
            "definitions": [{
                "entityName": "Customer",
                "hasAttributes": [
                    { "name": "code", "dataType": "string" },
                    { "name": "address", "entity": "Address" }
                ]
            }]
        }),
    ]);

    let resolved = resolve(&corpus, "Customer", &[]).unwrap();
    assert_eq!(names(&resolved), vec!["code", "addressStreet"]);
    assert_eq!(
        resolved.attribute("addressStreet").unwrap().data_type.as_deref(),
        Some("string")
    );

    let root = resolved.context.root().unwrap();
    assert_eq!(
        resolved.context.node(root).definition.as_deref(),
        Some("sales/Customer")
    );
}

#[test]
fn test_moniker_imports_need_qualified_names() {
    let documents = |data_type: &str| {
        vec![
            json!({
                "name": "vendor",
                "definitions": [{ "dataTypeName": "money", "exhibitsTraits": ["is.currency"] },
                                { "traitName": "is.currency" }]
            }),
            json!({
                "name": "main",
                "imports": [{ "corpusPath": "vendor", "moniker": "v" }],
                "definitions": [{
                    "entityName": "Invoice",
                    "hasAttributes": [{ "name": "total", "dataType": data_type }]
                }]
            }),
        ]
    };

    let qualified = corpus_of(documents("v/money"));
    let resolved = resolve(&qualified, "Invoice", &[]).unwrap();
    let total = resolved.attribute("total").unwrap();
    assert_eq!(total.data_type.as_deref(), Some("money"));
    assert!(total.has_trait("is.currency"));

    let bare = corpus_of(documents("money"));
    let err = resolve(&bare, "Invoice", &[]).unwrap_err();
    assert_eq!(
        err.kind,
        ErrorKind::UnresolvedReference {
            name: "money".into(),
            expected: DefinitionKind::DataType
        }
    );
    assert_eq!(err.path.to_string(), "Invoice/total");
}

#[test]
fn test_local_definition_shadows_import() {
    let corpus = corpus_of(vec![
        json!({
            "name": "base",
            "definitions": [{ "dataTypeName": "string" }]
        }),
        json!({
            "name": "main",
            "imports": [{ "corpusPath": "base" }],
            "definitions": [
                { "traitName": "is.localized" },
                { "dataTypeName": "string", "exhibitsTraits": ["is.localized"] },
                { "entityName": "Label", "hasAttributes": [{ "name": "text", "dataType": "string" }] }
            ]
        }),
    ]);

    let resolved = resolve(&corpus, "Label", &[]).unwrap();
    assert!(resolved.attribute("text").unwrap().has_trait("is.localized"));
}

#[test]
fn test_duplicate_definition_in_one_document_is_ambiguous() {
    let corpus = corpus(json!([
        { "dataTypeName": "string" },
        { "dataTypeName": "string" },
        { "entityName": "Thing", "hasAttributes": [{ "name": "a", "dataType": "string" }] }
    ]));

    let err = resolve(&corpus, "Thing", &[]).unwrap_err();
    assert_eq!(
        err.kind,
        ErrorKind::AmbiguousReference {
            name: "string".into(),
            document: "main".into(),
            count: 2
        }
    );
}

#[test]
fn test_name_with_another_kind_is_unresolved() {
    let corpus = corpus(json!([
        { "traitName": "string" },
        { "entityName": "Thing", "hasAttributes": [{ "name": "a", "dataType": "string" }] }
    ]));

    let err = resolve(&corpus, "Thing", &[]).unwrap_err();
    assert_eq!(
        err.kind,
        ErrorKind::UnresolvedReference {
            name: "string".into(),
            expected: DefinitionKind::DataType
        }
    );
}

#[test]
fn test_entity_defined_twice_needs_a_document() {
    let corpus = corpus_of(vec![
        json!({ "name": "a", "definitions": [{ "entityName": "Thing", "hasAttributes": [{ "name": "fromA" }] }] }),
        json!({ "name": "b", "definitions": [{ "entityName": "Thing", "hasAttributes": [{ "name": "fromB" }] }] }),
    ]);

    let err = resolve(&corpus, "Thing", &[]).unwrap_err();
    assert!(matches!(err.kind, ErrorKind::AmbiguousReference { count: 2, .. }));

    let resolved = resolve_in(&corpus, "b", "Thing").unwrap();
    assert_eq!(names(&resolved), vec!["fromB"]);

    let err = resolve_in(&corpus, "nowhere", "Thing").unwrap_err();
    assert!(matches!(err.kind, ErrorKind::InvalidCorpus(_)));
}

#[test]
fn test_parameter_default_resolves_where_declared() {
    let corpus = corpus_of(vec![
        json!({
            "name": "hidden",
            "definitions": [{ "dataTypeName": "secret" }]
        }),
        json!({
            "name": "lib",
            "imports": [{ "corpusPath": "hidden", "moniker": "h" }],
            "definitions": [{
                "traitName": "has.kind",
                "hasParameters": [{ "name": "kind", "defaultValue": { "dataTypeReference": "h/secret" } }]
            }]
        }),
        json!({
            "name": "main",
            "imports": [{ "corpusPath": "lib" }],
            "definitions": [{
                "entityName": "Vault",
                "hasAttributes": [{ "name": "payload", "appliedTraits": ["has.kind"] }]
            }]
        }),
    ]);

    let resolved = resolve(&corpus, "Vault", &[]).unwrap();
    let kind = resolved
        .attribute("payload")
        .unwrap()
        .trait_named("has.kind")
        .unwrap();
    assert_eq!(
        kind.argument("kind"),
        Some(&ResolvedValue::DataType {
            name: "secret".into()
        })
    );
}

#[test]
fn test_inline_definitions_resolve_in_containing_document() {
    let corpus = corpus_of(vec![
        json!({ "name": "base", "definitions": [{ "dataTypeName": "decimal" }] }),
        json!({
            "name": "main",
            "imports": [{ "corpusPath": "base" }],
            "definitions": [{
                "entityName": "Shape",
                "hasAttributes": [{
                    "name": "size",
                    "entity": {
                        "entityReference": {
                            "entityName": "Size",
                            "hasAttributes": [{ "name": "width", "dataType": "decimal" }]
                        }
                    }
                }]
            }]
        }),
    ]);

    let resolved = resolve(&corpus, "Shape", &[]).unwrap();
    assert_eq!(
        resolved.attribute("sizeWidth").unwrap().data_type.as_deref(),
        Some("decimal")
    );
}

#[test]
fn test_snapshot_loading_rejects_broken_links() {
    let duplicate = r#"{ "documents": [ { "name": "a" }, { "name": "a" } ] }"#;
    assert!(matches!(
        Corpus::from_json_str(duplicate),
        Err(ErrorKind::InvalidCorpus(_))
    ));

    let dangling = r#"{ "documents": [ { "name": "a", "imports": [{ "corpusPath": "b" }] } ] }"#;
    assert!(matches!(
        Corpus::from_json_str(dangling),
        Err(ErrorKind::InvalidCorpus(_))
    ));

    let ok = r#"{ "documents": [ { "name": "a", "definitions": [{ "entityName": "E" }] } ] }"#;
    let corpus = Corpus::from_json_str(ok).unwrap();
    assert_eq!(corpus.documents().count(), 1);
    assert!(resolve(&corpus, "E", &[]).unwrap().attributes.is_empty());
}
