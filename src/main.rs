use std::path::PathBuf;
use std::process;

use clap::{Args, Parser, Subcommand};
use gltf_schema_gen::codegen::{self, GenerateOptions, IrRenderer, OutputDirs};
use gltf_schema_gen::config::{GeneratorConfig, NameOptions};
use gltf_schema_gen::error::Result;
use tracing_subscriber::EnvFilter;

/// Generate glTF model, reader and writer types from JSON Schema.
///
/// Resolves a root schema, its configured extensions and every schema they
/// reference, and writes one model, reader and writer description per
/// generated class.
#[derive(Parser)]
#[command(name = "gltf-schema-gen", version, about)]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Args)]
struct SchemaArgs {
    /// Root schema file name, e.g. glTF.schema.json.
    #[arg(long)]
    schema: String,

    /// Directory or base URL to search for schemas. Repeatable; searched in
    /// order.
    #[arg(long = "schema-path", required = true)]
    schema_paths: Vec<String>,

    /// Directory or base URL to search for extension schemas. Repeatable.
    #[arg(long = "extension-path")]
    extension_paths: Vec<String>,

    /// Generator configuration file (name overrides, assets, extensions).
    #[arg(long, env = "GLTF_SCHEMA_GEN_CONFIG")]
    config: Option<PathBuf>,

    /// Namespace of the generated model classes.
    #[arg(long, default_value = "CesiumGltf")]
    namespace: String,

    /// Namespace of the generated readers. Defaults to <namespace>Reader.
    #[arg(long)]
    reader_namespace: Option<String>,

    /// Namespace of the generated writers. Defaults to <namespace>Writer.
    #[arg(long)]
    writer_namespace: Option<String>,
}

#[derive(Subcommand)]
enum Commands {
    /// Resolve the schemas and write model, reader and writer views.
    Generate {
        #[command(flatten)]
        schema: SchemaArgs,

        /// Output directory for model views.
        #[arg(long)]
        output_model: PathBuf,

        /// Output directory for reader views.
        #[arg(long)]
        output_reader: PathBuf,

        /// Output directory for writer views.
        #[arg(long)]
        output_writer: PathBuf,

        /// Write all reader views to a single file.
        #[arg(long)]
        one_handler_file: bool,

        /// Suppress non-error output.
        #[arg(long, short)]
        quiet: bool,
    },

    /// Print the refs closure of the root schema (or of a class by title),
    /// dependencies first.
    Refs {
        #[command(flatten)]
        schema: SchemaArgs,

        /// Title or type name of the class to print instead of the root.
        #[arg(long)]
        title: Option<String>,
    },
}

fn main() {
    let cli = Cli::parse();

    let quiet = matches!(cli.command, Commands::Generate { quiet: true, .. });
    let default_level = if quiet { "warn" } else { "info" };
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default_level)),
        )
        .with_writer(std::io::stderr)
        .init();

    if let Err(e) = run(cli) {
        eprintln!("error: {e}");

        // Print cause chain.
        let mut source = std::error::Error::source(&e);
        while let Some(cause) = source {
            eprintln!("  caused by: {cause}");
            source = std::error::Error::source(cause);
        }

        process::exit(1);
    }
}

fn generate_options(args: SchemaArgs) -> Result<GenerateOptions> {
    let config = match &args.config {
        Some(path) => GeneratorConfig::load(path)?,
        None => GeneratorConfig::default(),
    };
    let mut names = NameOptions::new(&args.namespace);
    if let Some(reader) = args.reader_namespace {
        names.reader_namespace = reader;
    }
    if let Some(writer) = args.writer_namespace {
        names.writer_namespace = writer;
    }
    Ok(GenerateOptions {
        schema: args.schema,
        search_paths: args.schema_paths,
        extension_paths: args.extension_paths,
        config,
        names,
    })
}

fn run(cli: Cli) -> Result<()> {
    match cli.command {
        Commands::Generate {
            schema,
            output_model,
            output_reader,
            output_writer,
            one_handler_file,
            quiet: _,
        } => {
            let options = generate_options(schema)?;
            let mut renderer = IrRenderer::new(
                OutputDirs {
                    model: output_model,
                    reader: output_reader,
                    writer: output_writer,
                },
                one_handler_file,
            );
            let stats = codegen::generate(&options, &mut renderer)?;

            tracing::info!(
                "generated {} classes, {} enums",
                stats.classes_generated,
                stats.enums_generated
            );
            if stats.extensions_attached > 0 {
                tracing::info!("attached {} extensions", stats.extensions_attached);
            }
            if stats.classes_skipped > 0 {
                tracing::info!("skipped {} schemas without code", stats.classes_skipped);
            }
            if stats.title_collisions > 0 {
                tracing::warn!(
                    "{} schema titles were shared by different files",
                    stats.title_collisions
                );
            }
        }

        Commands::Refs { schema, title } => {
            let options = generate_options(schema)?;
            let run = codegen::resolve_all(&options)?;
            let class = match &title {
                Some(title) => run
                    .resolution
                    .find(title)
                    .ok_or_else(|| gltf_schema_gen::error::Error::SchemaNotFound {
                        name: title.clone(),
                        attempted: "resolved schema titles and type names".to_string(),
                    })?,
                None => run.resolution.get(run.root).ok_or_else(|| {
                    gltf_schema_gen::error::Error::SchemaNotFound {
                        name: options.schema.clone(),
                        attempted: options.search_paths.join(", "),
                    }
                })?,
            };
            for name in run.resolution.type_names(&class.ref_closure) {
                println!("{name}");
            }
        }
    }

    Ok(())
}
