//! File-descriptor-to-stream mapping carried by an [`crate::env::ExecEnv`].
//!
//! The executor only ever sees a read/write/close interface; tests
//! substitute in-memory buffers for the default filesystem-backed streams.
//! Duplication redirections (`<&`, `>&`) wrap an existing stream to expose
//! only one direction, so a command cannot accidentally read from what was
//! meant to be write-only end of a duplication.

use std::collections::BTreeMap;
use std::fs::File;
use std::io::{self, Cursor, Read, Write};
use std::sync::{Arc, Mutex};

/// Standard input's well-known file descriptor.
pub const STDIN_FD: u32 = 0;
/// Standard output's well-known file descriptor.
pub const STDOUT_FD: u32 = 1;
/// Standard error's well-known file descriptor.
pub const STDERR_FD: u32 = 2;

/// A stream installed at some file descriptor in an [`OpenFiles`] map.
///
/// Cloning an `OpenFile` shares the underlying stream (files and pipe ends
/// are reference-counted), so forking an `ExecEnv` shares file streams by
/// reference rather than duplicating the underlying descriptor.
#[derive(Clone)]
pub enum OpenFile {
    /// The host's standard input.
    Stdin,
    /// The host's standard output.
    Stdout,
    /// The host's standard error.
    Stderr,
    /// A regular file opened by the host filesystem collaborator.
    File(Arc<Mutex<File>>),
    /// The read end of an OS pipe, used to wire up a pipeline stage.
    PipeReader(Arc<Mutex<os_pipe::PipeReader>>),
    /// The write end of an OS pipe, used to wire up a pipeline stage.
    PipeWriter(Arc<Mutex<os_pipe::PipeWriter>>),
    /// An in-memory buffer, used by tests and by `Expr` evaluation to
    /// capture a command's output before field splitting.
    Memory(Arc<Mutex<Cursor<Vec<u8>>>>),
    /// A stream wrapped to permit only reads, installed by a `<&`
    /// redirection that duplicates an existing descriptor.
    ReaderOnly(Box<OpenFile>),
    /// A stream wrapped to permit only writes, installed by a `>&`
    /// redirection that duplicates an existing descriptor.
    WriterOnly(Box<OpenFile>),
}

impl OpenFile {
    /// Wraps an in-memory buffer as a fresh, empty `OpenFile`.
    pub fn memory() -> Self {
        Self::Memory(Arc::new(Mutex::new(Cursor::new(Vec::new()))))
    }

    /// Wraps an already-opened file.
    pub fn from_file(file: File) -> Self {
        Self::File(Arc::new(Mutex::new(file)))
    }

    /// Returns a clone restricted to read access, as installed by `<&`.
    pub fn into_reader_only(self) -> Self {
        Self::ReaderOnly(Box::new(self))
    }

    /// Returns a clone restricted to write access, as installed by `>&`.
    pub fn into_writer_only(self) -> Self {
        Self::WriterOnly(Box::new(self))
    }

    /// Returns the buffered contents of a `Memory` stream. Used by `Expr`
    /// evaluation once a child has finished writing to a scratch buffer.
    pub fn take_memory_contents(&self) -> Option<Vec<u8>> {
        match self {
            Self::Memory(buf) => Some(buf.lock().expect("memory buffer mutex poisoned").get_ref().clone()),
            _ => None,
        }
    }
}

impl Read for OpenFile {
    fn read(&mut self, buf: &mut [u8]) -> io::Result<usize> {
        match self {
            Self::Stdin => io::stdin().read(buf),
            Self::Stdout | Self::Stderr => {
                Err(io::Error::new(io::ErrorKind::Unsupported, "stream is not readable"))
            }
            Self::File(f) => f.lock().expect("file mutex poisoned").read(buf),
            Self::PipeReader(r) => r.lock().expect("pipe mutex poisoned").read(buf),
            Self::PipeWriter(_) => {
                Err(io::Error::new(io::ErrorKind::Unsupported, "pipe writer is not readable"))
            }
            Self::Memory(m) => m.lock().expect("memory mutex poisoned").read(buf),
            Self::ReaderOnly(inner) => inner.read(buf),
            Self::WriterOnly(_) => {
                Err(io::Error::new(io::ErrorKind::Unsupported, "write-only stream is not readable"))
            }
        }
    }
}

impl Write for OpenFile {
    fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
        match self {
            Self::Stdout => io::stdout().write(buf),
            Self::Stderr => io::stderr().write(buf),
            Self::Stdin => {
                Err(io::Error::new(io::ErrorKind::Unsupported, "stream is not writable"))
            }
            Self::File(f) => f.lock().expect("file mutex poisoned").write(buf),
            Self::PipeWriter(w) => w.lock().expect("pipe mutex poisoned").write(buf),
            Self::PipeReader(_) => {
                Err(io::Error::new(io::ErrorKind::Unsupported, "pipe reader is not writable"))
            }
            Self::Memory(m) => m.lock().expect("memory mutex poisoned").write(buf),
            Self::WriterOnly(inner) => inner.write(buf),
            Self::ReaderOnly(_) => {
                Err(io::Error::new(io::ErrorKind::Unsupported, "read-only stream is not writable"))
            }
        }
    }

    fn flush(&mut self) -> io::Result<()> {
        match self {
            Self::Stdout => io::stdout().flush(),
            Self::Stderr => io::stderr().flush(),
            Self::File(f) => f.lock().expect("file mutex poisoned").flush(),
            Self::PipeWriter(w) => w.lock().expect("pipe mutex poisoned").flush(),
            Self::Memory(m) => m.lock().expect("memory mutex poisoned").flush(),
            Self::WriterOnly(inner) => inner.flush(),
            _ => Ok(()),
        }
    }
}

/// The fd → stream mapping carried by an `ExecEnv`. A `BTreeMap` keeps
/// iteration (and thus any diagnostic dump of open descriptors)
/// deterministically ordered by fd number.
#[derive(Clone, Default)]
pub struct OpenFiles(BTreeMap<u32, OpenFile>);

impl OpenFiles {
    /// Builds the standard `{0: Stdin, 1: Stdout, 2: Stderr}` table a root
    /// `ExecEnv` starts with.
    pub fn standard() -> Self {
        let mut files = BTreeMap::new();
        files.insert(STDIN_FD, OpenFile::Stdin);
        files.insert(STDOUT_FD, OpenFile::Stdout);
        files.insert(STDERR_FD, OpenFile::Stderr);
        Self(files)
    }

    /// Returns the stream installed at `fd`, if any.
    pub fn get(&self, fd: u32) -> Option<&OpenFile> {
        self.0.get(&fd)
    }

    /// Installs `file` at `fd`, returning whatever was previously there.
    pub fn insert(&mut self, fd: u32, file: OpenFile) -> Option<OpenFile> {
        self.0.insert(fd, file)
    }

    /// Removes whatever stream is installed at `fd`.
    pub fn remove(&mut self, fd: u32) -> Option<OpenFile> {
        self.0.remove(&fd)
    }

    /// A convenience accessor for fd 0.
    pub fn stdin(&self) -> OpenFile {
        self.get(STDIN_FD).cloned().unwrap_or(OpenFile::Stdin)
    }

    /// A convenience accessor for fd 1.
    pub fn stdout(&self) -> OpenFile {
        self.get(STDOUT_FD).cloned().unwrap_or(OpenFile::Stdout)
    }

    /// A convenience accessor for fd 2.
    pub fn stderr(&self) -> OpenFile {
        self.get(STDERR_FD).cloned().unwrap_or(OpenFile::Stderr)
    }
}
