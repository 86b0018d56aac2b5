// Macro-definition translation and expansion of the translated clauses.

use std::path::PathBuf;

use hdrinc::expand::MacroClauses;
use hdrinc::form::{stringify, Form};
use hdrinc::host::lexer::tokenize;
use hdrinc::host::{HeaderReader, HostFormSupplier, MacroArity, MacroDefinition, MacroTable};
use hdrinc::session::SessionState;
use hdrinc::syntax::read_one;
use hdrinc::translate::{rewrite_tokens, translate_macros};
use hdrinc::Warning;

fn fixture(name: &str) -> PathBuf {
    PathBuf::from(env!("CARGO_MANIFEST_DIR")).join("tests/fixtures").join(name)
}

fn table(source: &str) -> MacroTable {
    HeaderReader::new().read_header(source, "m.hrl").unwrap().macros
}

fn translated(source: &str) -> (Vec<Form>, SessionState) {
    translate_macros(&table(source), SessionState::new())
}

fn macro_named<'f>(forms: &'f [Form], name: &str) -> &'f Form {
    forms
        .iter()
        .find(|f| f.as_list().is_some_and(|items| items[1].is_symbol(name)))
        .unwrap_or_else(|| panic!("no macro {}", name))
}

#[test]
fn one_parameter_macro_binds_its_argument() {
    let (forms, _) = translated("-define(FOO(X), X + 1).\n");
    assert_eq!(stringify(&forms[0]), "(defmacro FOO (((list X)) `(+ ,X 1)))");

    let clauses = MacroClauses::from_form(&forms[0]).unwrap();
    let expansion = clauses.expand(&[Form::Integer(42)]).unwrap();
    assert_eq!(expansion, read_one("(+ 42 1)").unwrap());
}

#[test]
fn arguments_are_not_evaluated() {
    let (forms, _) = translated("-define(FOO(X), X + 1).\n");
    let clauses = MacroClauses::from_form(&forms[0]).unwrap();
    let arg = read_one("(launch 'missiles)").unwrap();
    assert_eq!(
        stringify(&clauses.expand(&[arg]).unwrap()),
        "(+ (launch 'missiles) 1)"
    );
}

#[test]
fn no_argument_macro_is_a_catch_all() {
    let (forms, _) = translated("-define(BAR, 42).\n");
    assert_eq!(stringify(&forms[0]), "(defmacro BAR ((_) `42))");

    let clauses = MacroClauses::from_form(&forms[0]).unwrap();
    assert_eq!(clauses.expand(&[]).unwrap(), Form::Integer(42));
    assert_eq!(clauses.expand(&[Form::sym("ignored")]).unwrap(), Form::Integer(42));
}

#[test]
fn no_argument_clause_comes_last() {
    let (forms, _) = translated("-define(DEBUG, true).\n-define(DEBUG(Msg), io:format(\"~p~n\", [Msg])).\n");
    assert_eq!(
        stringify(&forms[0]),
        "(defmacro DEBUG (((list Msg)) `(io:format \"~p~n\" (list ,Msg))) ((_) `'true))"
    );

    let clauses = MacroClauses::from_form(&forms[0]).unwrap();
    assert_eq!(
        stringify(&clauses.expand(&[Form::sym("x")]).unwrap()),
        "(io:format \"~p~n\" (list x))"
    );
    assert_eq!(stringify(&clauses.expand(&[]).unwrap()), "'true");
}

#[test]
fn absent_and_predefined_macros_are_skipped_silently() {
    let (forms, state) = translated("-define(GONE, 1).\n-undef(GONE).\n");
    assert!(forms.is_empty());
    assert!(state.warnings.is_empty());

    let mut table = MacroTable::new();
    table.define("LINE", MacroArity::NoArgs, MacroDefinition::Predefined);
    let (forms, state) = translate_macros(&table, SessionState::new());
    assert!(forms.is_empty());
    assert!(state.warnings.is_empty());
}

#[test]
fn failing_arity_drops_only_that_clause() {
    let (forms, state) = translated("-define(M, ok).\n-define(M(X), X +).\n");
    assert_eq!(stringify(&forms[0]), "(defmacro M ((_) `'ok))");
    assert_eq!(state.warnings.len(), 1);
    let warning = &state.warnings[0].item;
    assert!(matches!(
        warning,
        Warning::Macro { name, arity: MacroArity::Fixed(1), .. } if name == "M"
    ));
    assert!(warning.to_string().starts_with("unable to translate macro M/1"));
}

#[test]
fn macro_with_every_clause_failing_emits_nothing() {
    let (forms, state) = translated("-define(BROKEN(X), X +).\n");
    assert!(forms.is_empty());
    assert_eq!(state.warnings.len(), 1);
}

#[test]
fn nested_macro_use_becomes_a_call() {
    let (forms, _) = translated("-define(TWICE(X), ?PAIR(X, X)).\n-define(NOW, ?CLOCK:now()).\n");
    assert_eq!(
        stringify(macro_named(&forms, "TWICE")),
        "(defmacro TWICE (((list X)) `(PAIR ,X ,X)))"
    );
    assert_eq!(
        stringify(macro_named(&forms, "NOW")),
        "(defmacro NOW ((_) `(call (CLOCK) 'now)))"
    );
}

#[test]
fn stringify_operator_calls_the_helper() {
    let (forms, _) = translated("-define(NAME(X), ??X).\n");
    assert_eq!(
        stringify(&forms[0]),
        "(defmacro NAME (((list X)) `(hdrinc:stringify ',X)))"
    );
    let clauses = MacroClauses::from_form(&forms[0]).unwrap();
    let arg = read_one("(+ a b)").unwrap();
    assert_eq!(
        stringify(&clauses.expand(&[arg]).unwrap()),
        "(hdrinc:stringify '(+ a b))"
    );
}

#[test]
fn parameters_are_substituted_inside_quotes() {
    let (forms, _) = translated("-define(QUOTED(X), {'X', X}).\n");
    assert_eq!(
        stringify(&forms[0]),
        "(defmacro QUOTED (((list X)) `(tuple ',X ,X)))"
    );
}

#[test]
fn tokens_without_macro_markers_pass_through() {
    for source in ["X + 1", "{a, [b | T]}", "f(X):g(Y)", "#r{a = 1}#r.a"] {
        let tokens = tokenize(source).unwrap();
        assert_eq!(rewrite_tokens(&tokens), tokens, "{}", source);
    }
}

#[test]
fn fixture_header_translates_every_shape() {
    let file = HeaderReader::new().parse_host_file(&fixture("macros.hrl")).unwrap();
    let (forms, state) = translate_macros(&file.macros, SessionState::new());

    let names: Vec<String> = forms
        .iter()
        .map(|f| f.as_list().unwrap()[1].as_symbol().unwrap().to_string())
        .collect();
    assert_eq!(names, vec!["BAR", "DEBUG", "FOO", "NAME", "PAIR", "QUOTED", "TWICE"]);
    assert_eq!(state.warnings.len(), 1);
    assert!(state.warnings[0].item.to_string().contains("BROKEN/1"));

    let pair = MacroClauses::from_form(macro_named(&forms, "PAIR")).unwrap();
    assert_eq!(
        stringify(&pair.expand(&[Form::Integer(1), Form::sym("y")]).unwrap()),
        "(tuple 1 y)"
    );
}
