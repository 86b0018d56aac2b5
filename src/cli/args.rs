//! Defines the command-line arguments and subcommands for the hdrinc CLI.
//!
//! This module uses the `clap` crate with its "derive" feature to create a
//! declarative and type-safe argument parsing structure.

use clap::{Parser, Subcommand};
use std::path::PathBuf;

/// The main CLI argument structure.
#[derive(Debug, Parser)]
#[command(
    name = "hdrinc",
    version,
    about = "Translate host-notation headers into MacroLang forms."
)]
pub struct HdrincArgs {
    /// Add a directory to the include search path (searched before config entries).
    #[arg(short = 'I', long = "include", global = true, value_name = "DIR")]
    pub include: Vec<PathBuf>,

    /// Add a library root for `lib` includes.
    #[arg(long = "lib-root", global = true, value_name = "DIR")]
    pub lib_roots: Vec<PathBuf>,

    /// YAML configuration file.
    #[arg(long, global = true, value_name = "FILE")]
    pub config: Option<PathBuf>,

    /// Read typed records in the older combined encoding.
    #[arg(long, global = true)]
    pub legacy_record_types: bool,

    /// Print the result and diagnostics as JSON.
    #[arg(long, global = true)]
    pub json: bool,

    #[command(subcommand)]
    pub command: Command,
}

/// An enumeration of all available CLI subcommands.
#[derive(Debug, Subcommand)]
pub enum Command {
    /// Include a file found on the search path and print the translation.
    Translate {
        /// Include name, resolved against the search path.
        #[arg(required = true)]
        file: String,
    },
    /// Include a library file (`app/path`), falling back to the library roots.
    Lib {
        /// Library include name.
        #[arg(required = true)]
        name: String,
    },
    /// Translate a header and expand one of its macros with the given arguments.
    Expand {
        /// Include name of the header.
        #[arg(required = true)]
        file: String,
        /// Macro to expand.
        #[arg(required = true)]
        macro_name: String,
        /// Arguments, each written as one MacroLang form.
        args: Vec<String>,
    },
}
