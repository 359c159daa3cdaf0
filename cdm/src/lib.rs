// CDM Library
// Attribute resolution engine for Common Data Model definitions

pub mod config;
pub mod corpus;
pub mod definitions;
pub mod error;
pub mod resolution;

pub use config::{ConfigError, GuidanceDefaults, ResolverConfig};
pub use corpus::{Corpus, CorpusSnapshot, DefinitionHandle, Document, DocumentId, Import};
pub use definitions::{Definition, DefinitionKind};
pub use error::{DefinitionPath, ErrorKind, ResolutionError, ResolutionResult};
pub use resolution::{
    resolve, AttributeContext, Directives, ResolveOptions, ResolvedAttribute, ResolvedEntity,
    ResolvedTrait, ResolvedValue, Resolver,
};
