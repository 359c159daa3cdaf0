// CDM Resolve
// Resolves one entity of a linked corpus snapshot and prints the result as JSON

use anyhow::Context;
use cdm::{Corpus, Directives, ResolveOptions, Resolver, ResolverConfig};
use clap::Parser;
use std::fs;
use std::path::PathBuf;
use tracing::info;

#[derive(Parser)]
#[command(name = "cdm-resolve")]
#[command(about = "Resolve a CDM entity into its final attribute list")]
#[command(version = "0.1.0")]
struct Args {
    /// Corpus snapshot: `{ "documents": [...] }`
    #[arg(value_name = "CORPUS")]
    corpus: PathBuf,

    /// Entity to resolve
    #[arg(value_name = "ENTITY")]
    entity: String,

    /// Directive to apply (repeatable), e.g. `referenceOnly`, `structured`, `normalized`
    #[arg(short, long = "directive", value_name = "DIRECTIVE")]
    directives: Vec<String>,

    /// Resolve the entity as seen from this document instead of looking it up corpus-wide
    #[arg(long, value_name = "DOCUMENT")]
    document: Option<String>,

    /// TOML configuration file (defaults come from CDM_* environment variables)
    #[arg(short, long, value_name = "FILE")]
    config: Option<PathBuf>,

    /// Output file (optional, defaults to stdout)
    #[arg(short, long)]
    output: Option<PathBuf>,

    /// Include the attribute context tree in the output
    #[arg(long)]
    context: bool,
}

fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(tracing_subscriber::EnvFilter::from_default_env())
        .with_writer(std::io::stderr)
        .with_ansi(false)
        .init();

    let args = Args::parse();

    let config = match &args.config {
        Some(path) => ResolverConfig::from_file(path)
            .with_context(|| format!("loading configuration {}", path.display()))?,
        None => ResolverConfig::from_env()?,
    };

    let snapshot = fs::read_to_string(&args.corpus)
        .with_context(|| format!("reading corpus {}", args.corpus.display()))?;
    let corpus = Corpus::from_json_str(&snapshot)?;
    info!(documents = corpus.documents().count(), "corpus loaded");

    let directives: Directives = args.directives.iter().cloned().collect();
    let resolver = Resolver::new(&corpus, config);
    let options = ResolveOptions::default();
    let resolved = match &args.document {
        Some(document) => resolver.resolve_in(document, &args.entity, &directives, &options)?,
        None => resolver.resolve_with(&args.entity, &directives, &options)?,
    };
    info!(
        entity = %resolved.entity_name,
        attributes = resolved.attributes.len(),
        "entity resolved"
    );

    let mut value = serde_json::to_value(&resolved)?;
    if !args.context {
        if let Some(object) = value.as_object_mut() {
            object.remove("context");
        }
    }
    let rendered = serde_json::to_string_pretty(&value)?;

    match &args.output {
        Some(path) => fs::write(path, rendered + "\n")
            .with_context(|| format!("writing {}", path.display()))?,
        None => println!("{}", rendered),
    }
    Ok(())
}
