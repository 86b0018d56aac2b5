//! Include front end.
//!
//! `Includer::file` and `Includer::lib` take the body of an include directive
//! and a session state, find the named file, and return either the translated
//! aggregate form or a failure. Both carry the updated state either way.

use std::fs;
use std::path::{Path, PathBuf};

use tracing::{debug, info};

use crate::config::IncludeConfig;
use crate::errors::{IncludeError, IncludeKind};
use crate::form::Form;
use crate::host::HostFormSupplier;
use crate::session::SessionState;
use crate::syntax::read_forms;
use crate::translate::translate_header;

// ============================================================================
// RESOLUTION
// ============================================================================

/// Locates include files.
pub trait IncludeResolver {
    /// First existing file named `name` under the directories of `search_path`.
    fn resolve(&self, search_path: &[PathBuf], name: &str) -> Option<PathBuf>;

    /// Installation directory of library `app`.
    fn lib_dir(&self, app: &str) -> Option<PathBuf>;
}

/// Resolves against the local filesystem.
#[derive(Debug, Clone, Default)]
pub struct FsResolver {
    lib_roots: Vec<PathBuf>,
}

impl FsResolver {
    pub fn new(lib_roots: Vec<PathBuf>) -> Self {
        Self { lib_roots }
    }
}

impl IncludeResolver for FsResolver {
    fn resolve(&self, search_path: &[PathBuf], name: &str) -> Option<PathBuf> {
        let name = Path::new(name);
        if name.is_absolute() {
            return name.is_file().then(|| name.to_path_buf());
        }
        search_path
            .iter()
            .map(|dir| dir.join(name))
            .find(|candidate| candidate.is_file())
    }

    /// Looks in each library root for `app` itself or for `app-VERSION`
    /// directories, preferring the highest version.
    fn lib_dir(&self, app: &str) -> Option<PathBuf> {
        for root in &self.lib_roots {
            let exact = root.join(app);
            if exact.is_dir() {
                return Some(exact);
            }
            let prefix = format!("{}-", app);
            let best = fs::read_dir(root)
                .into_iter()
                .flatten()
                .filter_map(Result::ok)
                .filter(|entry| entry.path().is_dir())
                .filter_map(|entry| {
                    let name = entry.file_name().to_string_lossy().into_owned();
                    let version = parse_version(name.strip_prefix(&prefix)?)?;
                    Some((version, entry.path()))
                })
                .max_by(|a, b| a.0.cmp(&b.0));
            if let Some((_, dir)) = best {
                return Some(dir);
            }
        }
        None
    }
}

/// `1.10.2` → `[1, 10, 2]`, compared numerically.
fn parse_version(text: &str) -> Option<Vec<u64>> {
    text.split('.').map(|part| part.parse().ok()).collect()
}

// ============================================================================
// INCLUDE ENTRY POINTS
// ============================================================================

#[derive(Debug, Clone, PartialEq)]
pub enum IncludeOutcome {
    Translated(Form, SessionState),
    Failed(SessionState),
}

impl IncludeOutcome {
    pub fn state(&self) -> &SessionState {
        match self {
            IncludeOutcome::Translated(_, state) | IncludeOutcome::Failed(state) => state,
        }
    }

    pub fn form(&self) -> Option<&Form> {
        match self {
            IncludeOutcome::Translated(form, _) => Some(form),
            IncludeOutcome::Failed(_) => None,
        }
    }
}

/// Include processing over pluggable resolution and header reading.
pub struct Includer<'a> {
    resolver: &'a dyn IncludeResolver,
    supplier: &'a dyn HostFormSupplier,
    config: &'a IncludeConfig,
}

impl<'a> Includer<'a> {
    pub fn new(
        resolver: &'a dyn IncludeResolver,
        supplier: &'a dyn HostFormSupplier,
        config: &'a IncludeConfig,
    ) -> Self {
        Self {
            resolver,
            supplier,
            config,
        }
    }

    /// `(include-file "name")`: resolve on the session's search path.
    pub fn file(&self, body: &[Form], state: SessionState) -> IncludeOutcome {
        let name = match include_name(body) {
            Ok(name) => name,
            Err(error) => return IncludeOutcome::Failed(state.with_error(error)),
        };
        let search_path: Vec<PathBuf> = state.include_path.iter().cloned().collect();
        match self.resolver.resolve(&search_path, &name) {
            Some(path) => self.include(&path, &name, state),
            None => IncludeOutcome::Failed(state.with_error(IncludeError::NoInclude {
                kind: IncludeKind::File,
                name,
            })),
        }
    }

    /// `(include-lib "app/rest")`: as `file`, falling back once to
    /// `rest` under the library directory of `app`.
    pub fn lib(&self, body: &[Form], state: SessionState) -> IncludeOutcome {
        let name = match include_name(body) {
            Ok(name) => name,
            Err(error) => return IncludeOutcome::Failed(state.with_error(error)),
        };
        let search_path: Vec<PathBuf> = state.include_path.iter().cloned().collect();
        if let Some(path) = self.resolver.resolve(&search_path, &name) {
            return self.include(&path, &name, state);
        }

        let remapped = name.split_once('/').and_then(|(app, rest)| {
            if app.is_empty() {
                return None;
            }
            let dir = self.resolver.lib_dir(app)?;
            debug!(app, dir = %dir.display(), "remapping library include");
            self.resolver.resolve(&[dir], rest)
        });
        match remapped {
            Some(path) => self.include(&path, &name, state),
            None => IncludeOutcome::Failed(state.with_error(IncludeError::NoInclude {
                kind: IncludeKind::Lib,
                name,
            })),
        }
    }

    /// Routes by suffix: headers through the translators, everything else
    /// through the native reader.
    fn include(&self, path: &Path, name: &str, state: SessionState) -> IncludeOutcome {
        info!(path = %path.display(), "including");
        if self.config.is_header(name) {
            let file = match self.supplier.parse_host_file(path) {
                Ok(file) => file,
                Err(error) => return IncludeOutcome::Failed(state.with_error(error)),
            };
            let errors_before = state.errors.len();
            let (form, state) = translate_header(&file, state);
            if state.errors.len() > errors_before {
                return IncludeOutcome::Failed(state);
            }
            return IncludeOutcome::Translated(form, state);
        }

        let read = fs::read_to_string(path)
            .map_err(|e| e.to_string())
            .and_then(|text| read_forms(&text, name).map_err(|e| e.to_string()));
        match read {
            Ok(forms) => IncludeOutcome::Translated(Form::call("progn", forms), state),
            Err(reason) => IncludeOutcome::Failed(state.with_error(IncludeError::Read {
                path: path.to_path_buf(),
                reason,
            })),
        }
    }
}

/// The file name of an include directive: its body must be exactly one
/// string.
pub fn include_name(body: &[Form]) -> Result<String, IncludeError> {
    match body {
        [Form::String(name)] => Ok(name.clone()),
        _ => Err(IncludeError::BadIncludeName {
            form: Form::List(body.to_vec()).to_string(),
        }),
    }
}
