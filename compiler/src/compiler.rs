use crate::{
    error::ProtoError,
    parser::parse_schema,
    resolver::{ResolutionContext, ResolvedSchema},
    tokenizer::tokenize_schema,
};
use brine_proto_schema::{Configuration, FileBuilder, FileDescriptor};
use rayon::prelude::*;
use std::sync::Arc;
use tracing::debug;

/// Receives the outcome of every file of a batch, in dependency order.
pub trait ProgressCallback {
    fn on_file(&mut self, file: &str, result: Result<&FileDescriptor, &ProtoError>);
}

impl<F> ProgressCallback for F
where
    F: FnMut(&str, Result<&FileDescriptor, &ProtoError>),
{
    fn on_file(&mut self, file: &str, result: Result<&FileDescriptor, &ProtoError>) {
        self(file, result)
    }
}

/// Tokenizes and parses a single file into its unresolved builder.
pub fn parse_file(name: &str, text: &str) -> Result<FileBuilder, ProtoError> {
    let tokens = tokenize_schema(name, text)?;
    parse_schema(name, &tokens)
}

/// Compiles a batch of `(file name, source text)` pairs. The first error
/// aborts the batch.
pub fn compile<N, T>(
    sources: impl IntoIterator<Item = (N, T)>,
    config: Arc<Configuration>,
) -> Result<ResolvedSchema, ProtoError>
where
    N: Into<String>,
    T: AsRef<str> + Sync,
{
    ResolutionContext::new(config).resolve(parse_all(sources))
}

/// Like `compile`, but a file that fails on its own becomes a failed stub in
/// the result and the batch goes on. Errors that span files still abort.
pub fn compile_with_callback<N, T>(
    sources: impl IntoIterator<Item = (N, T)>,
    config: Arc<Configuration>,
    callback: &mut dyn ProgressCallback,
) -> Result<ResolvedSchema, ProtoError>
where
    N: Into<String>,
    T: AsRef<str> + Sync,
{
    ResolutionContext::new(config)
        .with_callback(callback)
        .resolve(parse_all(sources))
}

/// Parses every file in parallel. Each file is independent at this stage.
fn parse_all<N, T>(sources: impl IntoIterator<Item = (N, T)>) -> Vec<(String, Result<FileBuilder, ProtoError>)>
where
    N: Into<String>,
    T: AsRef<str> + Sync,
{
    let sources: Vec<(String, T)> = sources.into_iter().map(|(n, t)| (n.into(), t)).collect();
    debug!(files = sources.len(), "parsing");
    sources
        .par_iter()
        .map(|(name, text)| (name.clone(), parse_file(name, text.as_ref())))
        .collect()
}
