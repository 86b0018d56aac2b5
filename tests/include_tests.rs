// Include resolution: search path, library remapping, outcome shapes.

use std::cell::RefCell;
use std::path::{Path, PathBuf};

use hdrinc::config::IncludeConfig;
use hdrinc::errors::{IncludeError, IncludeKind};
use hdrinc::form::{stringify, Form};
use hdrinc::host::{HeaderReader, HostFile, HostFormSupplier};
use hdrinc::include::FsResolver;
use hdrinc::{IncludeOutcome, IncludeResolver, Includer, SessionState};

fn fixtures() -> PathBuf {
    PathBuf::from(env!("CARGO_MANIFEST_DIR")).join("tests/fixtures")
}

fn state() -> SessionState {
    SessionState::new().with_include_path([fixtures()])
}

/// Searches like `FsResolver` without library roots, and records every
/// library lookup.
#[derive(Default)]
struct RecordingResolver {
    inner: FsResolver,
    lib_lookups: RefCell<Vec<String>>,
}

impl IncludeResolver for RecordingResolver {
    fn resolve(&self, search_path: &[PathBuf], name: &str) -> Option<PathBuf> {
        self.inner.resolve(search_path, name)
    }

    fn lib_dir(&self, app: &str) -> Option<PathBuf> {
        self.lib_lookups.borrow_mut().push(app.to_string());
        self.inner.lib_dir(app)
    }
}

/// Supplier that must never be reached.
struct UnreachableSupplier;

impl HostFormSupplier for UnreachableSupplier {
    fn parse_host_file(&self, path: &Path) -> Result<HostFile, IncludeError> {
        panic!("unexpected read of {}", path.display())
    }
}

/// Supplies an empty header for any path.
struct EmptySupplier;

impl HostFormSupplier for EmptySupplier {
    fn parse_host_file(&self, _path: &Path) -> Result<HostFile, IncludeError> {
        Ok(HostFile::default())
    }
}

fn single_error(outcome: &IncludeOutcome) -> &IncludeError {
    assert!(matches!(outcome, IncludeOutcome::Failed(_)), "{:?}", outcome);
    let errors = &outcome.state().errors;
    assert_eq!(errors.len(), 1);
    &errors[0].item
}

#[test]
fn missing_library_tries_the_app_directory_once() {
    let resolver = RecordingResolver::default();
    let config = IncludeConfig::default();
    let includer = Includer::new(&resolver, &UnreachableSupplier, &config);

    let outcome = includer.lib(&[Form::string("appname/include/foo.def")], SessionState::new());
    assert_eq!(*resolver.lib_lookups.borrow(), vec!["appname".to_string()]);
    assert_eq!(
        single_error(&outcome),
        &IncludeError::NoInclude {
            kind: IncludeKind::Lib,
            name: "appname/include/foo.def".to_string(),
        }
    );
}

#[test]
fn library_name_without_a_slash_is_not_remapped() {
    let resolver = RecordingResolver::default();
    let config = IncludeConfig::default();
    let includer = Includer::new(&resolver, &UnreachableSupplier, &config);

    let outcome = includer.lib(&[Form::string("plain.hrl")], SessionState::new());
    assert!(resolver.lib_lookups.borrow().is_empty());
    assert!(matches!(
        single_error(&outcome),
        IncludeError::NoInclude { kind: IncludeKind::Lib, .. }
    ));
}

#[test]
fn library_name_with_an_empty_app_is_not_remapped() {
    let resolver = RecordingResolver::default();
    let config = IncludeConfig::default();
    let includer = Includer::new(&resolver, &UnreachableSupplier, &config);

    let outcome = includer.lib(&[Form::string("/no/such/dir/x.hrl")], SessionState::new());
    assert!(resolver.lib_lookups.borrow().is_empty());
    assert!(matches!(
        single_error(&outcome),
        IncludeError::NoInclude { kind: IncludeKind::Lib, .. }
    ));
}

#[test]
fn library_found_on_the_search_path_skips_the_remap() {
    let resolver = RecordingResolver::default();
    let config = IncludeConfig::default();
    let reader = HeaderReader::new();
    let includer = Includer::new(&resolver, &reader, &config);

    let outcome = includer.lib(&[Form::string("records.hrl")], state());
    let form = outcome.form().expect("library include");
    assert!(form.as_list().unwrap()[0].is_symbol("progn"));
    assert!(outcome.state().errors.is_empty());
    assert!(resolver.lib_lookups.borrow().is_empty());
}

#[test]
fn bad_include_names_fail_without_lookup() {
    let resolver = RecordingResolver::default();
    let config = IncludeConfig::default();
    let includer = Includer::new(&resolver, &UnreachableSupplier, &config);

    for body in [
        vec![],
        vec![Form::sym("foo.hrl")],
        vec![Form::string("a.hrl"), Form::string("b.hrl")],
    ] {
        let outcome = includer.file(&body, SessionState::new());
        assert!(matches!(single_error(&outcome), IncludeError::BadIncludeName { .. }));
        let outcome = includer.lib(&body, SessionState::new());
        assert!(matches!(single_error(&outcome), IncludeError::BadIncludeName { .. }));
    }
    assert!(resolver.lib_lookups.borrow().is_empty());
}

#[test]
fn missing_file_is_reported_by_name() {
    let resolver = FsResolver::default();
    let config = IncludeConfig::default();
    let reader = HeaderReader::new();
    let includer = Includer::new(&resolver, &reader, &config);

    let outcome = includer.file(&[Form::string("nowhere.hrl")], state());
    let error = single_error(&outcome);
    assert_eq!(error.to_string(), "no such include file: nowhere.hrl");
}

#[test]
fn header_on_the_search_path_is_translated() {
    let resolver = FsResolver::default();
    let config = IncludeConfig::default();
    let reader = HeaderReader::new();
    let includer = Includer::new(&resolver, &reader, &config);

    let outcome = includer.file(&[Form::string("macros.hrl")], state());
    let IncludeOutcome::Translated(form, state) = outcome else {
        panic!("include failed");
    };
    let items = form.as_list().unwrap();
    assert!(items[0].is_symbol("progn"));
    assert!(items[1..].iter().all(|f| f.as_list().unwrap()[0].is_symbol("defmacro")));
    assert_eq!(state.warnings.len(), 1);
}

#[test]
fn library_remap_picks_the_highest_version() {
    let resolver = FsResolver::new(vec![fixtures().join("lib")]);
    let config = IncludeConfig::default();
    let reader = HeaderReader::new();
    let includer = Includer::new(&resolver, &reader, &config);

    let outcome = includer.lib(&[Form::string("myapp/include/foo.hrl")], state());
    let form = outcome.form().expect("library include");
    assert_eq!(
        stringify(form),
        "(progn (defrecord foo id) (defmacro VSN ((_) `\"1.0\")))"
    );
}

#[test]
fn header_parse_errors_fail_the_include() {
    let resolver = FsResolver::default();
    let config = IncludeConfig::default();
    let reader = HeaderReader::new();
    let includer = Includer::new(&resolver, &reader, &config);

    let outcome = includer.file(&[Form::string("broken.hrl")], state());
    assert!(outcome.form().is_none());
    assert!(matches!(single_error(&outcome), IncludeError::HostParse(_)));
}

#[test]
fn earlier_errors_do_not_fail_a_clean_include() {
    let resolver = FsResolver::default();
    let config = IncludeConfig::default();
    let reader = HeaderReader::new();
    let includer = Includer::new(&resolver, &reader, &config);

    let state = state().with_error(IncludeError::BadIncludeName { form: "()".to_string() });
    let outcome = includer.file(&[Form::string("records.hrl")], state);
    assert!(outcome.form().is_some());
    assert_eq!(outcome.state().errors.len(), 1);
}

#[test]
fn native_files_are_read_as_forms() {
    let resolver = FsResolver::default();
    let config = IncludeConfig::default();
    let includer = Includer::new(&resolver, &UnreachableSupplier, &config);

    let outcome = includer.file(&[Form::string("native.lfe")], state());
    let form = outcome.form().expect("native include");
    assert_eq!(
        stringify(form),
        "(progn (defun hello () 'world) (defmacro m () 1))"
    );
}

#[test]
fn config_file_supplies_paths() {
    let config = IncludeConfig::load(&fixtures().join("config.yaml")).unwrap();
    assert_eq!(config.include_path, vec![PathBuf::from("tests/fixtures")]);
    assert_eq!(config.lib_roots, vec![PathBuf::from("tests/fixtures/lib")]);
    assert!(config.legacy_record_types);
    assert_eq!(config.header_suffix, ".hrl");
}

#[test]
fn header_suffix_is_configurable() {
    let config = IncludeConfig::from_yaml("header_suffix: .lfe\n").unwrap();
    let resolver = FsResolver::default();
    let includer = Includer::new(&resolver, &EmptySupplier, &config);

    let outcome = includer.file(&[Form::string("native.lfe")], state());
    assert_eq!(stringify(outcome.form().unwrap()), "(progn)");
}
