//! MacroLang reader.
//!
//! Reads native-syntax include files and the text produced by
//! `form::stringify` back into `Form`s.

pub mod parser;

pub use parser::{read_forms, read_one};
