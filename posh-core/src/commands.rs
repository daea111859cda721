//! The command registry: host-provided callables that simple commands
//! resolve against, plus the `Env` handle passed to them when they run.

use std::io::Write;

use indexmap::IndexMap;

use crate::error::{Error, ErrorKind};
use crate::openfiles::{OpenFile, OpenFiles, STDERR_FD, STDIN_FD, STDOUT_FD};
use crate::settings::{OpenFlags, Settings};

/// A host-provided callable a resolved command name dispatches to.
///
/// Registered commands are not external processes — `echo`, `cat`, `cd`,
/// and the like are expected to be closures or small structs the host
/// wires in as collaborators rather than subprocesses.
pub trait Command: Send + Sync {
    /// Returns whether this command should handle `word` (the unexpanded
    /// or expanded command name, at the registrant's discretion).
    fn matches(&self, word: &str) -> bool;

    /// Runs the command with `args[0]` as its own name and the rest as
    /// arguments, returning its exit status.
    fn execute(&self, args: &[String], env: &mut Env) -> Result<i32, Error>;
}

/// A single named entry in the [`CommandRegistry`]: matches by exact name
/// and dispatches to an arbitrary closure. This is the shape most hosts
/// actually register commands with; [`Command`] stays available for
/// collaborators that need custom `matches` logic (e.g. pattern-based
/// dispatch).
pub struct NamedCommand<F> {
    name: String,
    run: F,
}

impl<F> NamedCommand<F>
where
    F: Fn(&[String], &mut Env) -> Result<i32, Error> + Send + Sync,
{
    /// Registers `run` under the exact command name `name`.
    pub fn new(name: impl Into<String>, run: F) -> Self {
        Self {
            name: name.into(),
            run,
        }
    }
}

impl<F> Command for NamedCommand<F>
where
    F: Fn(&[String], &mut Env) -> Result<i32, Error> + Send + Sync,
{
    fn matches(&self, word: &str) -> bool {
        self.name == word
    }

    fn execute(&self, args: &[String], env: &mut Env) -> Result<i32, Error> {
        (self.run)(args, env)
    }
}

/// The executor's ordered list of resolvable commands. Resolution walks
/// the list in registration order and returns the first match; a
/// fallback built-in `cd` is consulted last unless [`Settings`] disables
/// it.
#[derive(Default)]
pub struct CommandRegistry {
    commands: Vec<Box<dyn Command>>,
}

impl CommandRegistry {
    /// Creates an empty registry.
    pub fn new() -> Self {
        Self::default()
    }

    /// Appends a command to the end of the resolution order.
    pub fn register(&mut self, command: impl Command + 'static) {
        self.commands.push(Box::new(command));
    }

    pub(crate) fn resolve(&self, word: &str, settings: &Settings) -> Option<&dyn Command> {
        for command in &self.commands {
            if command.matches(word) {
                return Some(command.as_ref());
            }
        }
        if !settings.no_cd() && word == "cd" {
            return Some(&BUILTIN_CD as &dyn Command);
        }
        None
    }
}

struct BuiltinCd;

impl Command for BuiltinCd {
    fn matches(&self, word: &str) -> bool {
        word == "cd"
    }

    fn execute(&self, args: &[String], env: &mut Env) -> Result<i32, Error> {
        let target = args.get(1).map(String::as_str).unwrap_or("~");
        match env.settings.change_directory(&env.working_directory, target) {
            Ok(new_dir) => {
                env.working_directory = new_dir;
                Ok(0)
            }
            Err(kind) => {
                env.error(&kind.to_string())?;
                Ok(1)
            }
        }
    }
}

static BUILTIN_CD: BuiltinCd = BuiltinCd;

/// The handle a [`Command`] receives when it runs: its file descriptors,
/// flattened environment variables, argv, and the working directory it
/// should honor for relative paths (e.g. its own `cd`-like behavior).
pub struct Env<'a> {
    /// The fd → stream table for this invocation, projected from the
    /// owning `ExecEnv` (non-closing: the command never owns these
    /// streams, it only uses them for the duration of the call).
    pub files: &'a mut OpenFiles,
    /// Flattened shell parameters, exposed as a plain environment map.
    pub vars: &'a IndexMap<String, String>,
    /// `args[0]` is the command name; the rest are its arguments.
    pub args: Vec<String>,
    /// The working directory in effect for this invocation.
    pub working_directory: String,
    settings: &'a Settings,
}

impl<'a> Env<'a> {
    pub(crate) fn new(
        files: &'a mut OpenFiles,
        vars: &'a IndexMap<String, String>,
        args: Vec<String>,
        working_directory: String,
        settings: &'a Settings,
    ) -> Self {
        Self {
            files,
            vars,
            args,
            working_directory,
            settings,
        }
    }

    /// Opens `path` with the given access flags via the host's file-open
    /// collaborator (or `Settings::with_open_fn`'s override).
    pub fn open(&self, path: &str, flags: OpenFlags) -> Result<OpenFile, ErrorKind> {
        self.settings.open_file(path, flags)
    }

    /// Returns the stream at fd 0, or a null-equivalent stdin if absent.
    pub fn stdin(&self) -> OpenFile {
        self.files.get(STDIN_FD).cloned().unwrap_or(OpenFile::Stdin)
    }

    /// Returns the stream at fd 1, or a null-equivalent stdout if absent.
    pub fn stdout(&self) -> OpenFile {
        self.files.get(STDOUT_FD).cloned().unwrap_or(OpenFile::Stdout)
    }

    /// Returns the stream at fd 2, or a null-equivalent stderr if absent.
    pub fn stderr(&self) -> OpenFile {
        self.files.get(STDERR_FD).cloned().unwrap_or(OpenFile::Stderr)
    }

    /// Writes `text` (with a trailing newline) to stdout.
    pub fn write_line(&self, text: &str) -> Result<(), Error> {
        let mut out = self.stdout();
        out.write_all(text.as_bytes())?;
        out.write_all(b"\n")?;
        Ok(())
    }

    /// Writes `"{args[0]}: {message}\n"` to stderr, the usual shell
    /// command-error convention.
    pub fn error(&self, message: &str) -> Result<(), Error> {
        let mut err = self.stderr();
        let name = self.args.first().map(String::as_str).unwrap_or("");
        writeln!(err, "{name}: {message}")?;
        Ok(())
    }
}
