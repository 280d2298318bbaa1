use clap::{Parser, Subcommand};
use std::path::{Path, PathBuf};
use std::process::ExitCode;
use std::sync::Arc;
use tracing::debug;
use tracing_subscriber::EnvFilter;

use brine_proto::{
    compile, compile_with_callback, load_configuration, read_sources, schema_to_json, CompatibilityChecker,
    Configuration, FileDescriptor, ProtoError, ResolvedSchema,
};

#[derive(Parser)]
#[command(name = "bproto")]
#[command(about = "Check Brine Proto schemas and compare schema versions", long_about = None)]
struct Cli {
    /// Log resolution progress (overrides RUST_LOG)
    #[arg(short, long, global = true)]
    verbose: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Parse and resolve a set of `.proto` files
    Check {
        /// Input `.proto` files
        #[arg(required = true)]
        files: Vec<PathBuf>,

        /// Directory that import paths are relative to
        #[arg(short, long, default_value = ".")]
        root: PathBuf,

        /// Annotation configuration (JSON)
        #[arg(short, long)]
        config: Option<PathBuf>,

        /// Report failing files and keep going instead of stopping at the first error
        #[arg(short, long)]
        keep_going: bool,

        /// Print the resolved schema as JSON
        #[arg(long)]
        json: bool,
    },

    /// Compare two versions of a schema
    Compat {
        /// Files of the old version
        #[arg(long, required = true, num_args = 1..)]
        old: Vec<PathBuf>,

        /// Files of the new version
        #[arg(long, required = true, num_args = 1..)]
        new: Vec<PathBuf>,

        /// Directory the old files' import paths are relative to
        #[arg(long, default_value = ".")]
        old_root: PathBuf,

        /// Directory the new files' import paths are relative to
        #[arg(long, default_value = ".")]
        new_root: PathBuf,

        /// Annotation configuration (JSON)
        #[arg(short, long)]
        config: Option<PathBuf>,

        /// Also report removed or unreserved names
        #[arg(short, long)]
        strict: bool,
    },
}

fn init_logging(verbose: bool) {
    let filter = if verbose {
        EnvFilter::new("debug")
    } else {
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("warn"))
    };
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .init();
}

fn configuration(path: Option<&Path>) -> Result<Arc<Configuration>, ProtoError> {
    match path {
        Some(path) => Ok(Arc::new(load_configuration(path)?)),
        None => Ok(Arc::new(Configuration::default())),
    }
}

fn resolve(root: &Path, files: &[PathBuf], config: Arc<Configuration>) -> Result<ResolvedSchema, ProtoError> {
    let sources = read_sources(root, files)?;
    debug!(files = sources.len(), "read sources");
    compile(sources, config)
}

fn main() -> Result<ExitCode, ProtoError> {
    let cli = Cli::parse();
    init_logging(cli.verbose);

    match &cli.command {
        Commands::Check {
            files,
            root,
            config,
            keep_going,
            json,
        } => {
            let config = configuration(config.as_deref())?;
            let schema = if *keep_going {
                let mut report = |file: &str, result: Result<&FileDescriptor, &ProtoError>| match result {
                    Ok(_) => println!("ok     {}", file),
                    Err(err) => println!("FAILED {}: {}", file, err),
                };
                compile_with_callback(read_sources(root, files)?, config, &mut report)?
            } else {
                resolve(root, files, config)?
            };

            if *json {
                println!("{}", schema_to_json(&schema)?);
            } else if !*keep_going {
                println!("Resolved {} file(s), {} type(s)", schema.len(), schema.types().count());
            }
            let failed = schema.failed_files().count();
            Ok(if failed == 0 { ExitCode::SUCCESS } else { ExitCode::FAILURE })
        }

        Commands::Compat {
            old,
            new,
            old_root,
            new_root,
            config,
            strict,
        } => {
            let config = configuration(config.as_deref())?;
            let old_schema = resolve(old_root, old, config.clone())?;
            let new_schema = resolve(new_root, new, config)?;
            let violations = CompatibilityChecker::new(*strict).check_schemas_strings(&old_schema, &new_schema);
            if violations.is_empty() {
                println!("Compatible");
                return Ok(ExitCode::SUCCESS);
            }
            for violation in &violations {
                println!("{}", violation);
            }
            Ok(ExitCode::FAILURE)
        }
    }
}
