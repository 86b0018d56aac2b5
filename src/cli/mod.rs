//! The hdrinc Command-Line Interface.
//!
//! This module is the main entry point for all CLI commands and orchestrates
//! the core library functions.

use std::path::PathBuf;
use std::process;

use clap::Parser;
use tracing_subscriber::{fmt, prelude::*, EnvFilter};

use crate::cli::args::{Command, HdrincArgs};
use crate::config::IncludeConfig;
use crate::errors::ExpandError;
use crate::expand::MacroClauses;
use crate::form::Form;
use crate::host::HeaderReader;
use crate::include::{FsResolver, IncludeOutcome, Includer};
use crate::session::SessionState;
use crate::syntax::read_one;

pub mod args;
pub mod output;

/// Environment variable holding the `tracing` filter directives.
pub const LOG_ENV: &str = "HDRINC_LOG";

/// The main entry point for the CLI.
pub fn run() {
    init_tracing();
    let args = HdrincArgs::parse();

    match dispatch(args) {
        Ok(true) => {}
        Ok(false) => process::exit(1),
        Err(report) => {
            eprintln!("{:?}", report);
            process::exit(1);
        }
    }
}

fn init_tracing() {
    let filter = EnvFilter::try_from_env(LOG_ENV).unwrap_or_else(|_| EnvFilter::new("error"));
    let _ = tracing_subscriber::registry()
        .with(fmt::layer().with_writer(std::io::stderr).with_target(false))
        .with(filter)
        .try_init();
}

/// Runs one subcommand. `Ok(false)` means the include failed and its errors
/// have been printed.
fn dispatch(args: HdrincArgs) -> miette::Result<bool> {
    let config = load_config(&args)?;
    let resolver = FsResolver::new(config.lib_roots.clone());
    let reader = HeaderReader::new().with_legacy_record_types(config.legacy_record_types);
    let includer = Includer::new(&resolver, &reader, &config);
    let state = SessionState::new().with_include_path(config.include_path.iter().cloned());

    match args.command {
        Command::Translate { file } => {
            let outcome = includer.file(&[Form::string(file)], state);
            output::print_outcome(&outcome, args.json);
            Ok(matches!(outcome, IncludeOutcome::Translated(..)))
        }
        Command::Lib { name } => {
            let outcome = includer.lib(&[Form::string(name)], state);
            output::print_outcome(&outcome, args.json);
            Ok(matches!(outcome, IncludeOutcome::Translated(..)))
        }
        Command::Expand {
            file,
            macro_name,
            args: macro_args,
        } => {
            let outcome = includer.file(&[Form::string(file)], state);
            let (form, state) = match outcome {
                IncludeOutcome::Translated(form, state) => (form, state),
                IncludeOutcome::Failed(state) => {
                    output::print_diagnostics(&state);
                    return Ok(false);
                }
            };
            output::print_diagnostics(&state);

            let definition = find_macro(&form, &macro_name)
                .ok_or_else(|| ExpandError::NotAMacro(macro_name.clone()))?;
            let clauses = MacroClauses::from_form(definition)?;
            let actuals = macro_args
                .iter()
                .map(|text| read_one(text))
                .collect::<Result<Vec<_>, _>>()?;
            let expansion = clauses.expand(&actuals)?;
            output::print_form(&expansion, args.json);
            Ok(true)
        }
    }
}

/// Config file first, then command-line flags, then `HDRINC_LIBS`.
fn load_config(args: &HdrincArgs) -> miette::Result<IncludeConfig> {
    let mut config = match &args.config {
        Some(path) => IncludeConfig::load(path)?,
        None => IncludeConfig::default(),
    };
    if !args.include.is_empty() {
        let mut include_path: Vec<PathBuf> = args.include.clone();
        include_path.extend(config.include_path);
        config.include_path = include_path;
    }
    config.lib_roots.extend(args.lib_roots.iter().cloned());
    config.legacy_record_types |= args.legacy_record_types;
    let config = config.with_env_lib_roots();
    if let Some(dir) = config.include_path.iter().find(|dir| !dir.is_dir()) {
        tracing::warn!(dir = %dir.display(), "include directory does not exist");
    }
    Ok(config)
}

/// The `(defmacro NAME ...)` form inside a translated `(progn ...)`.
fn find_macro<'f>(form: &'f Form, name: &str) -> Option<&'f Form> {
    form.as_list()?.iter().find(|item| {
        matches!(item.as_list(), Some([head, n, ..]) if head.is_symbol("defmacro") && n.is_symbol(name))
    })
}
