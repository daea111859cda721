//! Walks a parsed [`posh_parser::ast::Program`] against an [`ExecEnv`],
//! dispatching on the AST's tagged sum with a single `eval_node` function
//! rather than per-variant visitor types (per the "open recursion over
//! AST variants" design this executor follows).

use std::io::{Read, Write};
use std::sync::{Arc, Mutex};

use posh_parser::ast::{self, BinaryKind, ExprPart, Node, RedirectMode};

use crate::commands::{CommandRegistry, Env};
use crate::env::ExecEnv;
use crate::error::{Error, ErrorKind};
use crate::expansion::{join_fields, split_fields};
use crate::openfiles::OpenFile;
use crate::settings::{OpenFlags, Settings};

/// Evaluates an AST against an [`ExecEnv`], maintaining the command
/// registry and error-escalation policy a whole run shares.
pub struct Executor {
    commands: CommandRegistry,
    settings: Settings,
}

impl Executor {
    /// Builds an executor from a command registry and settings.
    pub fn new(commands: CommandRegistry, settings: Settings) -> Self {
        Self { commands, settings }
    }

    /// Evaluates every top-level command of `program` in order against
    /// `env`, returning the last status, or the first fatal error.
    pub fn run(&self, program: &ast::Program, env: &mut ExecEnv) -> Result<i32, Error> {
        self.eval_sequence(&program.commands, env, false)
    }

    fn eval_sequence(&self, commands: &[Node], env: &mut ExecEnv, background: bool) -> Result<i32, Error> {
        let mut status = 0;
        for node in commands {
            status = self.eval_node(node, env, background)?;
        }
        Ok(status)
    }

    /// The single dispatch point for every AST node. Every call site gets
    /// the same error-escalation treatment: a suppressible error becomes
    /// status `127` and evaluation continues; a fatal one propagates via
    /// `?`, unwinding every enclosing call up to `run`.
    fn eval_node(&self, node: &Node, env: &mut ExecEnv, background: bool) -> Result<i32, Error> {
        match self.dispatch(node, env, background) {
            Ok(status) => Ok(status),
            Err(err) => self.handle_error(err, env),
        }
    }

    fn dispatch(&self, node: &Node, env: &mut ExecEnv, background: bool) -> Result<i32, Error> {
        match node {
            Node::Program(program) => self.eval_sequence(&program.commands, env, background),
            Node::SimpleCommand(cmd) => self.eval_simple_command(cmd, env, background),
            Node::Pipe(pipe) => self.eval_pipe(pipe, env, background),
            Node::Binary(binary) => self.eval_binary(binary, env, background),
            Node::Background(child) => self.eval_node(child, env, true),
            Node::Not(child) => {
                let status = self.eval_node(child, env, background)?;
                Ok(if status == 0 { 1 } else { 0 })
            }
            Node::Expr(expr) => {
                let text = self.expand_expr(expr, env)?;
                env.files.stdout().write_all(text.as_bytes())?;
                Ok(0)
            }
        }
    }

    fn eval_binary(&self, binary: &ast::Binary, env: &mut ExecEnv, background: bool) -> Result<i32, Error> {
        let left_status = self.eval_node(&binary.left, env, background)?;
        let run_right = match binary.kind {
            BinaryKind::And => left_status == 0,
            BinaryKind::Or => left_status != 0,
        };
        if run_right {
            self.eval_node(&binary.right, env, background)
        } else {
            Ok(left_status)
        }
    }

    /// Applies the error-escalation policy: writes the message to stderr,
    /// then either suppresses (returning status `127`) or re-raises
    /// depending on the error kind and [`Settings`].
    fn handle_error(&self, err: Error, env: &mut ExecEnv) -> Result<i32, Error> {
        let message = err.display_message();
        if !message.is_empty() {
            let mut stderr = env.files.stderr();
            let _ = writeln!(stderr, "{message}");
        }
        match err.kind() {
            ErrorKind::IoRedirection(_) if !self.settings.stop_on_io_redirection_error() => {
                tracing::warn!("suppressed IO redirection error: {message}");
                Ok(127)
            }
            ErrorKind::UnknownCommand(_) if !self.settings.stop_on_unknown_command() => {
                tracing::warn!("suppressed unknown-command error: {message}");
                Ok(127)
            }
            _ => Err(err),
        }
    }

    // --- Pipe -----------------------------------------------------------

    fn eval_pipe(&self, pipe: &ast::Pipe, env: &mut ExecEnv, background: bool) -> Result<i32, Error> {
        let n = pipe.commands.len();
        debug_assert!(n >= 2, "parser collapses length-1 pipelines");
        tracing::debug!("spawning {} pipeline stage(s)", n - 1);

        let mut pipes = Vec::with_capacity(n - 1);
        for _ in 0..n - 1 {
            let (reader, writer) = os_pipe::pipe()?;
            pipes.push((Arc::new(Mutex::new(reader)), Arc::new(Mutex::new(writer))));
        }

        let mut stage_envs = Vec::with_capacity(n);
        for i in 0..n {
            let mut stage_env = env.fork();
            if i > 0 {
                let (reader, _) = &pipes[i - 1];
                stage_env.files.insert(0, OpenFile::PipeReader(reader.clone()));
            }
            if i < n - 1 {
                let (_, writer) = &pipes[i];
                stage_env.files.insert(1, OpenFile::PipeWriter(writer.clone()));
            }
            stage_envs.push(stage_env);
        }
        // Each end's only remaining owner is now the one stage that uses it.
        drop(pipes);

        let mut iter = pipe.commands.iter().zip(stage_envs);
        let (terminal_cmd, mut terminal_env) = iter.next_back().expect("n >= 2");

        let terminal_result = std::thread::scope(|scope| {
            // Each upstream stage's `ExecEnv` is moved into its worker
            // closure by value, not borrowed, so the stage's fd table —
            // and with it the `OpenFile::PipeWriter` installed at fd 1 —
            // drops the instant that closure returns. That's what closes
            // the stage's write end and signals EOF to whatever reads the
            // other side, rather than leaving it alive in a Vec until
            // `eval_pipe` itself returns.
            let handles: Vec<_> = iter
                .map(|(node, mut stage_env)| {
                    scope.spawn(move || self.eval_node(node, &mut stage_env, background))
                })
                .collect();

            let terminal_result = self.eval_node(terminal_cmd, &mut terminal_env, background);

            let mut upstream_results = Vec::with_capacity(handles.len());
            for handle in handles {
                upstream_results.push(handle.join().expect("pipeline stage thread panicked"));
            }
            tracing::debug!("joined {} upstream pipeline stage(s)", upstream_results.len());
            for result in upstream_results {
                if result.is_err() {
                    return result;
                }
            }
            terminal_result
        });

        terminal_result
    }

    // --- SimpleCommand ---------------------------------------------------

    fn eval_simple_command(
        &self,
        cmd: &ast::SimpleCommand,
        env: &mut ExecEnv,
        background: bool,
    ) -> Result<i32, Error> {
        let name = self.expand_expr(&cmd.word, env)?;
        let mut argv = Vec::with_capacity(cmd.args.len() + 1);
        argv.push(name.clone());
        for arg in &cmd.args {
            argv.push(self.expand_expr(arg, env)?);
        }

        let mut assignments = Vec::with_capacity(cmd.assignments.len());
        for (key, value_expr) in &cmd.assignments {
            assignments.push((key.clone(), self.expand_expr(value_expr, env)?));
        }

        let mut redirect_targets = Vec::with_capacity(cmd.redirections.len());
        for redir in &cmd.redirections {
            redirect_targets.push(self.expand_expr(&redir.target, env)?);
        }

        let mut new_env = env.fork();
        for (key, value) in assignments {
            new_env.params.insert(key, value);
        }

        for (redir, target_text) in cmd.redirections.iter().zip(redirect_targets.iter()) {
            self.apply_redirection(redir, target_text, &mut new_env)?;
        }

        if name.is_empty() && argv.len() == 1 {
            // Assignments/redirections only, no command to run.
            return Ok(0);
        }

        let resolved = self
            .commands
            .resolve(&name, &self.settings)
            .ok_or_else(|| ErrorKind::UnknownCommand(name.clone()))?;

        if background {
            return Err(ErrorKind::Unsupported(
                "running a simple command in the background".to_string(),
            )
            .into());
        }

        let call_args = argv.clone();
        let mut command_env = Env::new(
            &mut new_env.files,
            &new_env.params,
            argv,
            new_env.working_directory.clone(),
            &self.settings,
        );
        let status = resolved.execute(&call_args, &mut command_env)?;
        // `cd` is the one builtin that mutates shell state beyond its own
        // invocation; everything else touches only the scoped fork.
        env.working_directory = command_env.working_directory;
        Ok(status)
    }

    fn apply_redirection(
        &self,
        redir: &ast::IoRedirection,
        target_text: &str,
        new_env: &mut ExecEnv,
    ) -> Result<(), Error> {
        tracing::debug!("applying redirection {} {} {target_text}", redir.fd, redir.mode);
        match redir.mode {
            RedirectMode::DuplicateInput | RedirectMode::DuplicateOutput => {
                if target_text == "-" {
                    return Err(ErrorKind::IoRedirection(format!(
                        "{}: closing descriptors via '-' is not supported",
                        redir.fd
                    ))
                    .into());
                }
                let src_fd: u32 = target_text.parse().map_err(|_| {
                    ErrorKind::IoRedirection(format!("bad fd number '{target_text}'"))
                })?;
                let source = new_env.files.get(src_fd).cloned().ok_or_else(|| {
                    ErrorKind::IoRedirection(format!("{src_fd}: bad file descriptor"))
                })?;
                let wrapped = if redir.mode == RedirectMode::DuplicateInput {
                    source.into_reader_only()
                } else {
                    source.into_writer_only()
                };
                new_env.files.insert(redir.fd, wrapped);
            }
            RedirectMode::Input => {
                let stream = self.settings.open_file(target_text, OpenFlags::READONLY)?;
                new_env.files.insert(redir.fd, stream);
            }
            RedirectMode::Output => {
                let flags = OpenFlags::WRONLY | OpenFlags::CREATE | OpenFlags::TRUNC;
                let stream = self.settings.open_file(target_text, flags)?;
                new_env.files.insert(redir.fd, stream);
            }
            RedirectMode::Append => {
                let flags = OpenFlags::WRONLY | OpenFlags::CREATE | OpenFlags::APPEND;
                let stream = self.settings.open_file(target_text, flags)?;
                new_env.files.insert(redir.fd, stream);
            }
            RedirectMode::ReadWrite => {
                let flags = OpenFlags::RDWR | OpenFlags::CREATE | OpenFlags::TRUNC;
                let stream = self.settings.open_file(target_text, flags)?;
                new_env.files.insert(redir.fd, stream);
            }
            RedirectMode::Clobber => {
                // Identical to `>` here: no `noclobber` mode exists to
                // distinguish them.
                let flags = OpenFlags::WRONLY | OpenFlags::CREATE | OpenFlags::TRUNC;
                let stream = self.settings.open_file(target_text, flags)?;
                new_env.files.insert(redir.fd, stream);
            }
        }
        Ok(())
    }

    // --- Expr / backtick substitution ------------------------------------

    /// Expands a word's [`ast::Expr`] into its final text: literal runs
    /// pass through unchanged, and each backtick substitution runs its
    /// inner program with stdout captured to a scratch buffer, then
    /// field-splits and rejoins that buffer's text with single spaces.
    fn expand_expr(&self, expr: &ast::Expr, env: &mut ExecEnv) -> Result<String, Error> {
        let mut result = String::new();
        for part in &expr.parts {
            match part {
                ExprPart::Literal(s) => result.push_str(s),
                ExprPart::Backtick(backtick) => {
                    let output = self.run_captured(&backtick.inner, env)?;
                    let text = String::from_utf8_lossy(&output);
                    let ifs = env.ifs();
                    let fields = split_fields(&text, &ifs);
                    result.push_str(&join_fields(&fields));
                }
            }
        }
        Ok(result)
    }

    /// Runs `node` (always a `Node::Program` for a backtick's inner) with
    /// stdin unchanged and stdout redirected to a fresh in-memory buffer,
    /// returning that buffer's final contents.
    fn run_captured(&self, node: &Node, env: &ExecEnv) -> Result<Vec<u8>, Error> {
        let mut capture_env = env.fork();
        capture_env.files.insert(1, OpenFile::memory());
        self.eval_node(node, &mut capture_env, false)?;
        let mut buf = Vec::new();
        if let Some(OpenFile::Memory(cell)) = capture_env.files.get(1) {
            let mut cursor = cell.lock().expect("memory buffer mutex poisoned");
            cursor.set_position(0);
            cursor.read_to_end(&mut buf)?;
        }
        Ok(buf)
    }
}
