//! Handles all user-facing output for the CLI.
//!
//! Translated forms go to stdout; warnings and errors go to stderr, coloured
//! with `termcolor` when the terminal supports it. In JSON mode everything is
//! one object on stdout.

use std::io::Write;

use serde_json::json;
use termcolor::{Color, ColorChoice, ColorSpec, StandardStream, WriteColor};

use crate::errors::print_error;
use crate::form::Form;
use crate::include::IncludeOutcome;
use crate::session::SessionState;

// ============================================================================
// CORE OUTPUT FUNCTIONS
// ============================================================================

/// Prints an include outcome: the form (if any), then its diagnostics.
pub fn print_outcome(outcome: &IncludeOutcome, json: bool) {
    if json {
        print_json(outcome.form(), outcome.state());
        return;
    }
    if let Some(form) = outcome.form() {
        println!("{}", pretty(form));
    }
    print_diagnostics(outcome.state());
}

/// Prints a single form, as JSON or text.
pub fn print_form(form: &Form, json: bool) {
    if json {
        match serde_json::to_string_pretty(form) {
            Ok(text) => println!("{}", text),
            Err(e) => eprintln!("error: {}", e),
        }
        return;
    }
    println!("{}", form);
}

/// Warnings in yellow, then errors as miette reports.
pub fn print_diagnostics(state: &SessionState) {
    let mut stderr = StandardStream::stderr(ColorChoice::Auto);
    for warning in &state.warnings {
        let _ = stderr.set_color(ColorSpec::new().set_fg(Some(Color::Yellow)).set_bold(true));
        let _ = write!(stderr, "warning");
        let _ = stderr.reset();
        let _ = writeln!(stderr, ": line {}: {}", warning.line, warning.item);
    }
    for error in &state.errors {
        print_error(error.item.clone());
    }
}

// ============================================================================
// PRIVATE HELPERS
// ============================================================================

fn print_json(form: Option<&Form>, state: &SessionState) {
    let value = json!({
        "form": form,
        "text": form.map(Form::to_string),
        "warnings": state.warnings,
        "errors": state.errors,
    });
    match serde_json::to_string_pretty(&value) {
        Ok(text) => println!("{}", text),
        Err(e) => eprintln!("error: {}", e),
    }
}

/// Puts each top-level form of a `progn` on its own line.
fn pretty(form: &Form) -> String {
    match form.as_list() {
        Some([head, body @ ..]) if head.is_symbol("progn") && !body.is_empty() => {
            let lines: Vec<String> = body.iter().map(|f| format!("  {}", f)).collect();
            format!("(progn\n{})", lines.join("\n"))
        }
        _ => form.to_string(),
    }
}
