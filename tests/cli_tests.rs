// End-to-end checks of the hdrinc binary.
// Requires: assert_cmd, predicates crates in [dev-dependencies]

use assert_cmd::Command;
use predicates::prelude::*;
use predicates::str::contains;

fn hdrinc() -> Command {
    let mut cmd = Command::cargo_bin("hdrinc").unwrap();
    cmd.env_remove("HDRINC_LIBS").env_remove("HDRINC_LOG");
    cmd
}

#[test]
fn translate_prints_one_form_per_line() {
    hdrinc()
        .args(["-I", "tests/fixtures", "translate", "records.hrl"])
        .assert()
        .success()
        .stdout(contains("(progn\n  (extend-module ()"))
        .stdout(contains("\n  (defrecord person name (age 0))\n"))
        .stdout(contains("(defun origin (() (make_point 0 0))))"));
}

#[test]
fn missing_include_is_a_diagnostic() {
    hdrinc()
        .args(["-I", "tests/fixtures", "translate", "absent.hrl"])
        .assert()
        .failure()
        .stdout(predicate::str::is_empty())
        .stderr(contains("hdrinc::include::no_include"));
}

#[test]
fn parse_errors_fail_the_command() {
    hdrinc()
        .args(["-I", "tests/fixtures", "translate", "broken.hrl"])
        .assert()
        .failure()
        .stderr(contains("hdrinc::include::host_parse").and(contains("MISSING")));
}

#[test]
fn warnings_go_to_stderr_and_do_not_fail() {
    hdrinc()
        .args(["-I", "tests/fixtures", "translate", "warnings.hrl"])
        .assert()
        .success()
        .stdout(contains("(defrecord r a)"))
        .stderr(contains("unable to translate type small"))
        .stderr(contains("unable to translate attribute custom"));
}

#[test]
fn lib_falls_back_to_library_roots() {
    hdrinc()
        .args(["--lib-root", "tests/fixtures/lib", "lib", "myapp/include/foo.hrl"])
        .assert()
        .success()
        .stdout(contains("(defrecord foo id)"))
        .stdout(contains("\"1.0\""));
}

#[test]
fn lib_without_roots_fails() {
    hdrinc()
        .args(["lib", "myapp/include/foo.hrl"])
        .assert()
        .failure()
        .stderr(contains("no such include lib"));
}

#[test]
fn config_file_is_honoured() {
    hdrinc()
        .args(["--config", "tests/fixtures/config.yaml", "lib", "myapp/include/foo.hrl"])
        .assert()
        .success()
        .stdout(contains("(defmacro VSN"));
}

#[test]
fn expand_applies_a_translated_macro() {
    hdrinc()
        .args(["-I", "tests/fixtures", "expand", "macros.hrl", "FOO", "42"])
        .assert()
        .success()
        .stdout("(+ 42 1)\n");
}

#[test]
fn expand_takes_forms_as_arguments() {
    hdrinc()
        .args(["-I", "tests/fixtures", "expand", "macros.hrl", "PAIR", "'a", "(f x)"])
        .assert()
        .success()
        .stdout("(tuple 'a (f x))\n");
}

#[test]
fn expand_unknown_macro_is_an_error() {
    hdrinc()
        .args(["-I", "tests/fixtures", "expand", "macros.hrl", "NOPE"])
        .assert()
        .failure()
        .stderr(contains("hdrinc::expand::not_a_macro"));
}

#[test]
fn json_output_carries_diagnostics() {
    hdrinc()
        .args(["--json", "-I", "tests/fixtures", "translate", "warnings.hrl"])
        .assert()
        .success()
        .stdout(contains("\"warnings\""))
        .stdout(contains("\"kind\": \"type\""))
        .stdout(contains("\"text\": \"(progn (defrecord r a))\""));
}

#[test]
fn json_output_tags_include_errors() {
    hdrinc()
        .args(["--json", "lib", "myapp/include/foo.hrl"])
        .assert()
        .failure()
        .stdout(contains("\"error\": \"no_include\""))
        .stdout(contains("\"kind\": \"lib\""))
        .stdout(contains("\"form\": null"));
}
