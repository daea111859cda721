//! The mutable execution environment the executor threads through AST
//! evaluation.

use indexmap::IndexMap;

use crate::openfiles::OpenFiles;

/// One simple command's (or the whole program's) view of shell state:
/// a working directory, shell parameters, and open file descriptors.
///
/// Every simple command executes against a *derived* `ExecEnv` produced by
/// [`ExecEnv::fork`]: files are shared by reference (so writes through a
/// redirected fd are visible to whoever set it up) but `params` is deep
/// copied, so assignments scoped to one command never leak to a sibling or
/// the parent.
#[derive(Clone)]
pub struct ExecEnv {
    /// The current working directory, as an absolute path.
    pub working_directory: String,
    /// Shell parameters: inherited environment plus assignments.
    pub params: IndexMap<String, String>,
    /// The fd → stream table.
    pub files: OpenFiles,
}

impl ExecEnv {
    /// Builds a root environment with the standard stdin/stdout/stderr
    /// table, the given starting parameters, and `working_directory` as
    /// reported by the host.
    pub fn new(working_directory: impl Into<String>, params: IndexMap<String, String>) -> Self {
        Self {
            working_directory: working_directory.into(),
            params,
            files: OpenFiles::standard(),
        }
    }

    /// Produces a derived environment: `files` is cloned (which shares the
    /// underlying streams by reference, since [`crate::openfiles::OpenFile`]
    /// wraps reference-counted handles) and `params` is deep-copied.
    pub fn fork(&self) -> Self {
        Self {
            working_directory: self.working_directory.clone(),
            params: self.params.clone(),
            files: self.files.clone(),
        }
    }

    /// Looks up `IFS`, falling back to the POSIX default of space, tab,
    /// and newline when unset.
    pub fn ifs(&self) -> String {
        self.params
            .get("IFS")
            .cloned()
            .unwrap_or_else(|| " \t\n".to_string())
    }
}
