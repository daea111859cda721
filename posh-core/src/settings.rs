//! Runtime-configurable policy for the executor: which collaborators it
//! calls out to and how aggressively it escalates errors.

use std::path::{Path, PathBuf};
use std::sync::Arc;

use crate::error::ErrorKind;
use crate::openfiles::OpenFile;

/// POSIX-style open flags, as a bitfield so callers can combine them (e.g.
/// `CREATE | TRUNC`) the way the host filesystem collaborator expects.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct OpenFlags(u8);

impl OpenFlags {
    /// Open for reading only.
    pub const READONLY: Self = Self(1 << 0);
    /// Open for writing only.
    pub const WRONLY: Self = Self(1 << 1);
    /// Open for both reading and writing.
    pub const RDWR: Self = Self(1 << 2);
    /// Create the file if it does not exist.
    pub const CREATE: Self = Self(1 << 3);
    /// Append writes to the end of the file rather than the current cursor.
    pub const APPEND: Self = Self(1 << 4);
    /// Truncate an existing file to zero length on open.
    pub const TRUNC: Self = Self(1 << 5);

    /// Combines two flag sets.
    pub const fn union(self, other: Self) -> Self {
        Self(self.0 | other.0)
    }

    /// Returns whether every bit set in `other` is also set in `self`.
    pub const fn contains(self, other: Self) -> bool {
        self.0 & other.0 == other.0
    }
}

impl std::ops::BitOr for OpenFlags {
    type Output = Self;

    fn bitor(self, rhs: Self) -> Self {
        self.union(rhs)
    }
}

/// The host's file-opening collaborator: given a path and access flags,
/// returns a stream (or an error describing why it couldn't be opened).
pub type OpenFn = Arc<dyn Fn(&Path, OpenFlags) -> Result<OpenFile, ErrorKind> + Send + Sync>;

/// The host's `cd` collaborator: given a target path (relative to the
/// current working directory), returns the new absolute working directory.
pub type CdFn = Arc<dyn Fn(&str, &str) -> Result<String, ErrorKind> + Send + Sync>;

/// Executor configuration, covering the external collaborators it calls
/// and its error-escalation policy. Constructed via [`Settings::new`] and
/// the `with_*` builder methods, mirroring how a derived shell state is
/// assembled one option at a time.
#[derive(Clone)]
pub struct Settings {
    no_cd: bool,
    open_fn: Option<OpenFn>,
    cd_fn: Option<CdFn>,
    disable_file_open: bool,
    stop_on_io_redirection_error: bool,
    stop_on_unknown_command: bool,
    interactive: bool,
}

impl Default for Settings {
    fn default() -> Self {
        Self {
            no_cd: false,
            open_fn: None,
            cd_fn: None,
            disable_file_open: false,
            stop_on_io_redirection_error: false,
            stop_on_unknown_command: false,
            interactive: false,
        }
    }
}

impl Settings {
    /// Returns the default settings: the built-in `cd`, the host
    /// filesystem opener, and every IO/unknown-command error suppressed
    /// rather than fatal.
    pub fn new() -> Self {
        Self::default()
    }

    /// Disables the fallback built-in `cd` handler.
    pub fn with_no_cd(mut self, no_cd: bool) -> Self {
        self.no_cd = no_cd;
        self
    }

    /// Overrides the default file opener.
    pub fn with_open_fn(mut self, open_fn: OpenFn) -> Self {
        self.open_fn = Some(open_fn);
        self
    }

    /// Overrides the default `cd` implementation.
    pub fn with_cd_fn(mut self, cd_fn: CdFn) -> Self {
        self.cd_fn = Some(cd_fn);
        self
    }

    /// When set, file redirections that require opening a file fail;
    /// fd-duplication redirections still work.
    pub fn with_disable_file_open(mut self, disable: bool) -> Self {
        self.disable_file_open = disable;
        self
    }

    /// When set, an IO redirection error is fatal to `run`.
    pub fn with_stop_on_io_redirection_error(mut self, stop: bool) -> Self {
        self.stop_on_io_redirection_error = stop;
        self
    }

    /// When set, an unknown command is fatal to `run`.
    pub fn with_stop_on_unknown_command(mut self, stop: bool) -> Self {
        self.stop_on_unknown_command = stop;
        self
    }

    /// Enables the interactive prompt loop. The core never reads this flag
    /// itself — it exists for an external driver to branch on.
    pub fn with_interactive(mut self, interactive: bool) -> Self {
        self.interactive = interactive;
        self
    }

    pub(crate) fn no_cd(&self) -> bool {
        self.no_cd
    }

    pub(crate) fn disable_file_open(&self) -> bool {
        self.disable_file_open
    }

    pub(crate) fn stop_on_io_redirection_error(&self) -> bool {
        self.stop_on_io_redirection_error
    }

    pub(crate) fn stop_on_unknown_command(&self) -> bool {
        self.stop_on_unknown_command
    }

    /// Whether an external driver should run the interactive prompt loop.
    pub fn interactive(&self) -> bool {
        self.interactive
    }

    pub(crate) fn open_file(&self, path: &str, flags: OpenFlags) -> Result<OpenFile, ErrorKind> {
        if self.disable_file_open {
            return Err(ErrorKind::IoRedirection(format!(
                "{path}: file opening is disabled"
            )));
        }
        if let Some(open_fn) = &self.open_fn {
            return open_fn(Path::new(path), flags);
        }
        default_open_file(Path::new(path), flags)
    }

    pub(crate) fn change_directory(
        &self,
        current: &str,
        target: &str,
    ) -> Result<String, ErrorKind> {
        if let Some(cd_fn) = &self.cd_fn {
            return cd_fn(current, target);
        }
        default_change_directory(current, target)
    }
}

fn default_open_file(path: &Path, flags: OpenFlags) -> Result<OpenFile, ErrorKind> {
    use std::fs::OpenOptions;

    let mut options = OpenOptions::new();
    if flags.contains(OpenFlags::RDWR) {
        options.read(true).write(true);
    } else if flags.contains(OpenFlags::WRONLY) {
        options.write(true);
    } else {
        options.read(true);
    }
    if flags.contains(OpenFlags::CREATE) {
        options.create(true);
    }
    if flags.contains(OpenFlags::APPEND) {
        options.append(true);
    }
    if flags.contains(OpenFlags::TRUNC) {
        options.truncate(true);
    }

    let file = options.open(path).map_err(|e| {
        ErrorKind::IoRedirection(format!("{}: {e}", path.display()))
    })?;
    Ok(OpenFile::from_file(file))
}

fn default_change_directory(current: &str, target: &str) -> Result<String, ErrorKind> {
    let candidate = if Path::new(target).is_absolute() {
        PathBuf::from(target)
    } else {
        Path::new(current).join(target)
    };
    let metadata = std::fs::metadata(&candidate)
        .map_err(|e| ErrorKind::IoRedirection(format!("{target}: {e}")))?;
    if !metadata.is_dir() {
        return Err(ErrorKind::IoRedirection(format!(
            "{target}: not a directory"
        )));
    }
    Ok(candidate.to_string_lossy().into_owned())
}
