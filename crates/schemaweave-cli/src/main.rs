//! Schemaweave CLI
//!
//! Command-line access to a corpus folder:
//! - `validate`: load every document and run the validation pipeline
//! - `resolve`: print the resolved attributes of one entity
//! - `relationships`: list the entity graph discovered from foreign keys
//! - `persist`: write the validated corpus to another directory

use std::path::{Path, PathBuf};

use anyhow::{anyhow, Result};
use clap::{Parser, Subcommand};
use colored::Colorize;
use tracing_subscriber::filter::LevelFilter;

use schemaweave_model::{Corpus, ImportLoader, ObjectKind, TraitDirectiveSet, ValidationStep};
use schemaweave_persist::{derive_resolved_document, load_corpus, persist_corpus, FsImportLoader};

mod report;
mod settings;

use settings::ConfigArgs;

#[derive(Parser)]
#[command(name = "schemaweave")]
#[command(author, version, about = "Schemaweave: semantic schema resolution")]
struct Cli {
    /// Log verbosity (-v info, -vv debug, -vvv trace).
    #[arg(short, long, action = clap::ArgAction::Count, global = true)]
    verbose: u8,

    #[command(flatten)]
    config: ConfigArgs,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Load a corpus folder and run the validation pipeline.
    Validate {
        /// Corpus root directory.
        root: PathBuf,

        /// Last stage to run (imports, integrity, declarations, references,
        /// parameters, traits, attributes, entityReferences).
        #[arg(long)]
        stop_after: Option<ValidationStep>,

        /// Directives for the run, comma separated (defaults from config).
        #[arg(long)]
        directives: Option<String>,
    },

    /// Resolve one entity and print its attributes.
    Resolve {
        /// Corpus root directory.
        root: PathBuf,

        /// Corpus path of the entity, e.g. `/core/person.cdm.json/Person`.
        entity: String,

        /// Directives, comma separated (defaults from config).
        #[arg(long)]
        directives: Option<String>,

        /// Also print the attribute context tree.
        #[arg(long)]
        context: bool,

        /// Print a document derived from the resolved entity instead.
        #[arg(long)]
        derive: bool,
    },

    /// List entity relationships found by the pipeline.
    Relationships {
        /// Corpus root directory.
        root: PathBuf,

        /// Emit JSON instead of text.
        #[arg(long)]
        json: bool,
    },

    /// Validate a corpus folder and write every document below `out`.
    Persist {
        /// Corpus root directory.
        root: PathBuf,

        /// Output directory; created if missing.
        out: PathBuf,
    },
}

fn init_tracing(verbose: u8) {
    let level = match verbose {
        0 => LevelFilter::OFF,
        1 => LevelFilter::INFO,
        2 => LevelFilter::DEBUG,
        _ => LevelFilter::TRACE,
    };
    tracing_subscriber::fmt()
        .with_max_level(level)
        .with_target(false)
        .with_writer(std::io::stderr)
        .init();
}

fn main() -> Result<()> {
    let cli = Cli::parse();
    init_tracing(cli.verbose);

    match cli.command {
        Commands::Validate {
            root,
            stop_after,
            directives,
        } => cmd_validate(&cli.config, &root, stop_after, directives.as_deref()),
        Commands::Resolve {
            root,
            entity,
            directives,
            context,
            derive,
        } => cmd_resolve(&cli.config, &root, &entity, directives.as_deref(), context, derive),
        Commands::Relationships { root, json } => cmd_relationships(&cli.config, &root, json),
        Commands::Persist { root, out } => cmd_persist(&cli.config, &root, &out),
    }
}

/// Load the folder, fetch imports that point outside it, and run the
/// pipeline up to `stop_after`.
fn open_corpus(
    args: &ConfigArgs,
    root: &Path,
    stop_after: ValidationStep,
    directives: Option<&str>,
) -> Result<(Corpus, ValidationStep)> {
    let mut config = args.load()?;
    if let Some(list) = directives {
        config.default_directives = TraitDirectiveSet::parse(list).iter().map(str::to_string).collect();
    }
    let mut corpus = load_corpus(root, config)?;
    corpus.set_status_callback(report::stderr_status());

    let loader = FsImportLoader::new(root);
    let runtime = tokio::runtime::Builder::new_current_thread()
        .enable_all()
        .build()
        .map_err(|e| anyhow!("failed to initialize tokio runtime: {e}"))?;
    let step = runtime.block_on(corpus.validate(Some(&loader as &dyn ImportLoader), stop_after))?;
    Ok((corpus, step))
}

fn ensure_valid(corpus: &Corpus, step: ValidationStep) -> Result<()> {
    if step == ValidationStep::Error {
        return Err(anyhow!(
            "validation failed with {} error(s)",
            corpus.status().error_count()
        ));
    }
    Ok(())
}

fn cmd_validate(
    args: &ConfigArgs,
    root: &Path,
    stop_after: Option<ValidationStep>,
    directives: Option<&str>,
) -> Result<()> {
    let stop_after = stop_after.unwrap_or(ValidationStep::Finished);
    let (corpus, step) = open_corpus(args, root, stop_after, directives)?;
    ensure_valid(&corpus, step)?;

    let documents = corpus
        .documents()
        .filter(|(doc, _)| Some(*doc) != corpus.builtins_document())
        .count();
    eprintln!(
        "{} validated {} ({} document(s), through {})",
        "ok".green().bold(),
        root.display(),
        documents,
        stop_after
    );
    Ok(())
}

fn cmd_resolve(
    args: &ConfigArgs,
    root: &Path,
    entity_path: &str,
    directives: Option<&str>,
    show_context: bool,
    derive: bool,
) -> Result<()> {
    let (mut corpus, step) = open_corpus(args, root, ValidationStep::Finished, None)?;
    ensure_valid(&corpus, step)?;

    let entity = corpus
        .fetch_object(entity_path)
        .ok_or_else(|| anyhow!("no object at {entity_path}"))?;
    let object = corpus
        .object(entity)
        .ok_or_else(|| anyhow!("no object at {entity_path}"))?;
    if object.kind() != ObjectKind::EntityDef {
        return Err(anyhow!("{entity_path} is a {}, not an entity", object.kind()));
    }

    let mut opts = corpus.default_options(object.in_document);
    if let Some(list) = directives {
        opts.directives = TraitDirectiveSet::parse(list);
    }
    let resolved = corpus
        .resolve_entity(entity, &opts)
        .ok_or_else(|| anyhow!("{entity_path} could not be resolved"))?;

    if derive {
        let document = derive_resolved_document(&corpus, &resolved)?;
        println!("{}", serde_json::to_string_pretty(&document)?);
        return Ok(());
    }

    report::print_entity(&corpus, &resolved);
    if show_context {
        println!();
        print!("{}", resolved.context.render(resolved.context_root));
    }
    Ok(())
}

fn cmd_relationships(args: &ConfigArgs, root: &Path, json: bool) -> Result<()> {
    let (corpus, step) = open_corpus(args, root, ValidationStep::Finished, None)?;
    ensure_valid(&corpus, step)?;

    let mut relationships: Vec<_> = corpus.relationships().all().collect();
    relationships.sort_by(|a, b| {
        (&a.from_entity, &a.from_attribute, &a.to_entity).cmp(&(&b.from_entity, &b.from_attribute, &b.to_entity))
    });

    if json {
        println!("{}", serde_json::to_string_pretty(&relationships)?);
        return Ok(());
    }
    for relationship in &relationships {
        report::print_relationship(relationship);
    }
    eprintln!("{} {} relationship(s)", "ok".green().bold(), relationships.len());
    Ok(())
}

fn cmd_persist(args: &ConfigArgs, root: &Path, out: &Path) -> Result<()> {
    let (corpus, step) = open_corpus(args, root, ValidationStep::Finished, None)?;
    ensure_valid(&corpus, step)?;

    let written = persist_corpus(&corpus, out)?;
    eprintln!(
        "{} wrote {} document(s) to {}",
        "ok".green().bold(),
        written,
        out.display()
    );
    Ok(())
}
