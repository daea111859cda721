//! End-to-end scenarios from the executor's worked examples, run against
//! small closure-backed [`Command`] stand-ins for `echo`/`rev`/`cat`/`env`/
//! `true`/`false` so this suite never shells out to an external process.
//!
//! File redirections target an in-memory fake filesystem (a shared
//! `HashMap<String, _>` behind [`Settings::with_open_fn`]) rather than the
//! real one, so this suite substitutes in-memory buffers for the default
//! filesystem-backed streams.

use std::collections::HashMap;
use std::io::{Cursor, Read, Write};
use std::sync::{Arc, Mutex};

use indexmap::IndexMap;
use pretty_assertions::assert_eq;

use posh_core::{
    CommandRegistry, Env, ErrorKind, ExecEnv, Executor, NamedCommand, OpenFile, OpenFlags,
    Settings, STDERR_FD, STDOUT_FD,
};

fn echo(args: &[String], env: &mut Env) -> Result<i32, posh_core::Error> {
    env.write_line(&args[1..].join(" "))?;
    Ok(0)
}

fn rev(_args: &[String], env: &mut Env) -> Result<i32, posh_core::Error> {
    let mut input = String::new();
    env.stdin().read_to_string(&mut input)?;
    let mut out = String::new();
    for line in input.lines() {
        out.extend(line.chars().rev());
        out.push('\n');
    }
    env.stdout().write_all(out.as_bytes())?;
    Ok(0)
}

fn cat(_args: &[String], env: &mut Env) -> Result<i32, posh_core::Error> {
    let mut buf = Vec::new();
    env.stdin().read_to_end(&mut buf)?;
    env.stdout().write_all(&buf)?;
    Ok(0)
}

fn env_cmd(_args: &[String], env: &mut Env) -> Result<i32, posh_core::Error> {
    for (key, value) in env.vars.iter() {
        env.write_line(&format!("{key}={value}"))?;
    }
    Ok(0)
}

fn true_cmd(_args: &[String], _env: &mut Env) -> Result<i32, posh_core::Error> {
    Ok(0)
}

fn false_cmd(_args: &[String], _env: &mut Env) -> Result<i32, posh_core::Error> {
    Ok(1)
}

fn base_registry() -> CommandRegistry {
    let mut registry = CommandRegistry::new();
    registry.register(NamedCommand::new("echo", echo));
    registry.register(NamedCommand::new("rev", rev));
    registry.register(NamedCommand::new("cat", cat));
    registry.register(NamedCommand::new("env", env_cmd));
    registry.register(NamedCommand::new("true", true_cmd));
    registry.register(NamedCommand::new("false", false_cmd));
    registry
}

/// A trivial in-memory filesystem: each path maps to a shared byte buffer,
/// so redirections across separate `run()` calls in the same test can see
/// each other's writes the way real files would.
#[derive(Clone, Default)]
struct FakeFs {
    files: Arc<Mutex<HashMap<String, Arc<Mutex<Cursor<Vec<u8>>>>>>>,
}

impl FakeFs {
    fn seed(&self, path: &str, contents: &str) {
        self.files.lock().unwrap().insert(
            path.to_string(),
            Arc::new(Mutex::new(Cursor::new(contents.as_bytes().to_vec()))),
        );
    }

    fn contents(&self, path: &str) -> String {
        let files = self.files.lock().unwrap();
        let buf = files.get(path).expect("path was written to");
        let cursor = buf.lock().unwrap();
        String::from_utf8(cursor.get_ref().clone()).unwrap()
    }

    fn open_fn(&self) -> posh_core::OpenFn {
        let files = self.files.clone();
        Arc::new(move |path, flags: OpenFlags| {
            let key = path.to_string_lossy().into_owned();
            let mut files = files.lock().unwrap();
            if flags.contains(OpenFlags::READONLY) {
                let buf = files.get(&key).cloned().ok_or_else(|| {
                    ErrorKind::IoRedirection(format!("{key}: file does not exist"))
                })?;
                return Ok(OpenFile::Memory(buf));
            }
            let entry = files
                .entry(key)
                .or_insert_with(|| Arc::new(Mutex::new(Cursor::new(Vec::new()))));
            if flags.contains(OpenFlags::TRUNC) {
                let mut cursor = entry.lock().unwrap();
                cursor.get_mut().clear();
                cursor.set_position(0);
            }
            if flags.contains(OpenFlags::APPEND) {
                let mut cursor = entry.lock().unwrap();
                let len = cursor.get_ref().len() as u64;
                cursor.set_position(len);
            }
            Ok(OpenFile::Memory(entry.clone()))
        })
    }
}

/// Runs `script` against a fresh root [`ExecEnv`], capturing stdout/stderr
/// into in-memory buffers, and returns `(status_or_error, stdout, stderr)`.
fn run(
    script: &str,
    params: IndexMap<String, String>,
    settings: Settings,
    extra_fds: Vec<(u32, OpenFile)>,
) -> (Result<i32, posh_core::Error>, String, String) {
    let program = posh_parser::parse(script).expect("script should parse");
    let mut env = ExecEnv::new("/", params);
    env.files.insert(STDOUT_FD, OpenFile::memory());
    env.files.insert(STDERR_FD, OpenFile::memory());
    for (fd, file) in extra_fds {
        env.files.insert(fd, file);
    }
    let executor = Executor::new(base_registry(), settings);
    let status = executor.run(&program, &mut env);
    let stdout = env
        .files
        .get(STDOUT_FD)
        .and_then(OpenFile::take_memory_contents)
        .unwrap_or_default();
    let stderr = env
        .files
        .get(STDERR_FD)
        .and_then(OpenFile::take_memory_contents)
        .unwrap_or_default();
    (
        status,
        String::from_utf8(stdout).unwrap(),
        String::from_utf8(stderr).unwrap(),
    )
}

#[test]
fn simple_echo() {
    let (status, stdout, _stderr) = run("echo a b c", IndexMap::new(), Settings::new(), vec![]);
    assert_eq!(status.unwrap(), 0);
    assert_eq!(stdout, "a b c\n");
}

#[test]
fn pipeline_with_reverse() {
    let (status, stdout, _stderr) = run(
        "echo a b c | rev",
        IndexMap::new(),
        Settings::new(),
        vec![],
    );
    assert_eq!(status.unwrap(), 0);
    assert_eq!(stdout, "c b a\n");
}

#[test]
fn redirection_append_across_commands() {
    let fs = FakeFs::default();
    let settings = Settings::new().with_open_fn(fs.open_fn());

    let (status, _, _) = run("echo 1 > output/1", IndexMap::new(), settings.clone(), vec![]);
    assert_eq!(status.unwrap(), 0);
    let (status, _, _) = run("echo 2 >> output/1", IndexMap::new(), settings, vec![]);
    assert_eq!(status.unwrap(), 0);

    assert_eq!(fs.contents("output/1"), "1\n2\n");
}

#[test]
fn redirection_fd_duplication_to_append_target() {
    let fs = FakeFs::default();
    let settings = Settings::new().with_open_fn(fs.open_fn());

    let (status, stdout, _) = run(
        "echo fd_io_redirect 10>>output/2 1>&10",
        IndexMap::new(),
        settings,
        vec![],
    );
    assert_eq!(status.unwrap(), 0);
    assert_eq!(stdout, "");
    assert_eq!(fs.contents("output/2"), "fd_io_redirect\n");
}

#[test]
fn redirection_reads_from_preexisting_fd() {
    let fs = FakeFs::default();
    fs.seed("input/1", "123");
    let settings = Settings::new().with_open_fn(fs.open_fn());

    // fd 10 is pre-opened by the host, exactly as a shell can inherit
    // arbitrary descriptors beyond 0/1/2; `0<&10` duplicates it before the
    // script's own `10<input/1` re-establishes fd 10 for its own purposes.
    let input_one = fs.open_fn()(std::path::Path::new("input/1"), OpenFlags::READONLY).unwrap();

    let (status, _, _) = run(
        "rev <input/1 0<&10 10<input/1 >output/3",
        IndexMap::new(),
        settings,
        vec![(10, input_one)],
    );
    assert_eq!(status.unwrap(), 0);
    assert_eq!(fs.contents("output/3"), "321\n");
}

#[test]
fn short_circuit_and() {
    let (status, stdout, _) = run("true && echo 1", IndexMap::new(), Settings::new(), vec![]);
    assert_eq!(status.unwrap(), 0);
    assert_eq!(stdout, "1\n");

    let (status, stdout, _) = run("false && echo 1", IndexMap::new(), Settings::new(), vec![]);
    assert_eq!(status.unwrap(), 1);
    assert_eq!(stdout, "");
}

#[test]
fn short_circuit_or() {
    let (status, stdout, _) = run("true || echo 1", IndexMap::new(), Settings::new(), vec![]);
    assert_eq!(status.unwrap(), 0);
    assert_eq!(stdout, "");

    let (status, stdout, _) = run("false || echo 1", IndexMap::new(), Settings::new(), vec![]);
    assert_eq!(status.unwrap(), 0);
    assert_eq!(stdout, "1\n");
}

#[test]
fn assignments_are_scoped_to_one_command() {
    let mut params = IndexMap::new();
    params.insert("X".to_string(), "Y".to_string());
    params.insert("C".to_string(), "D".to_string());

    let (status, stdout, _) = run("env A=B C=E", params, Settings::new(), vec![]);
    assert_eq!(status.unwrap(), 0);
    let mut lines: Vec<&str> = stdout.lines().collect();
    lines.sort_unstable();
    assert_eq!(lines, vec!["A=B", "C=E", "X=Y"]);
}

#[test]
fn backtick_substitution_with_field_splitting() {
    let script = r"X=`echo 1` e`echo ch`o h`echo ell`o";
    let (status, stdout, _) = run(script, IndexMap::new(), Settings::new(), vec![]);
    assert_eq!(status.unwrap(), 0);
    assert_eq!(stdout, "hello\n");
}

#[test]
fn unknown_command_fatal_when_configured() {
    let settings = Settings::new().with_stop_on_unknown_command(true);
    let (status, stdout, stderr) = run("unknown", IndexMap::new(), settings, vec![]);
    assert!(status.is_err());
    assert_eq!(stdout, "");
    assert_eq!(stderr, "unknown: command not found\n");
}

#[test]
fn unknown_command_suppressed_by_default() {
    let (status, stdout, stderr) = run("unknown", IndexMap::new(), Settings::new(), vec![]);
    assert_eq!(status.unwrap(), 127);
    assert_eq!(stdout, "");
    assert_eq!(stderr, "unknown: command not found\n");
}

#[test]
fn io_redirection_error_is_fatal_when_configured() {
    let fs = FakeFs::default();
    let settings = Settings::new()
        .with_open_fn(fs.open_fn())
        .with_stop_on_io_redirection_error(true);
    let (status, _stdout, stderr) = run("true <missing_file", IndexMap::new(), settings, vec![]);
    let err = status.unwrap_err();
    assert!(matches!(err.kind(), ErrorKind::IoRedirection(_)));
    assert_eq!(stderr, "io error: missing_file: file does not exist\n");
}

#[test]
fn unterminated_quote_is_a_syntax_error() {
    let err = posh_parser::parse(r#""abc"#).unwrap_err();
    assert!(matches!(
        err,
        posh_parser::ParseError::Tokenizing(posh_parser::TokenizerError::UnterminatedDoubleQuote(_))
    ));
}
